use rpn42_core::{CalcError, StackReg, Value};

// RPN STACK
// ================================================================================================

/// The RPN stack plus LASTX, covering both disciplines.
///
/// `vals` grows toward the top: X is the last element. In classic mode the length is always
/// exactly four (T, Z, Y, X bottom to top); in big-stack mode it is anything from zero up.
#[derive(Clone, Debug, PartialEq)]
pub struct Stack {
    vals: Vec<Value>,
    lastx: Value,
    big: bool,
}

impl Default for Stack {
    fn default() -> Self {
        Self::new()
    }
}

impl Stack {
    pub fn new() -> Self {
        Self { vals: vec![Value::default(); 4], lastx: Value::default(), big: false }
    }

    // ACCESSORS
    // --------------------------------------------------------------------------------------------

    pub fn is_big(&self) -> bool {
        self.big
    }

    /// Number of live stack levels.
    pub fn depth(&self) -> usize {
        self.vals.len()
    }

    pub fn levels(&self) -> &[Value] {
        &self.vals
    }

    pub fn lastx(&self) -> &Value {
        &self.lastx
    }

    pub fn set_lastx(&mut self, v: Value) {
        self.lastx = v;
    }

    /// X, the top of the stack.
    pub fn x(&self) -> Result<&Value, CalcError> {
        self.vals.last().ok_or(CalcError::StackDepthError)
    }

    pub fn x_mut(&mut self) -> Result<&mut Value, CalcError> {
        self.vals.last_mut().ok_or(CalcError::StackDepthError)
    }

    /// The value `depth` levels below X (0 = X, 1 = Y, ...).
    pub fn peek(&self, depth: usize) -> Result<&Value, CalcError> {
        if depth >= self.vals.len() {
            return Err(CalcError::StackDepthError);
        }
        Ok(&self.vals[self.vals.len() - 1 - depth])
    }

    /// Dereferences a stack register for argument resolution.
    pub fn reg(&self, reg: StackReg) -> Result<&Value, CalcError> {
        match reg.depth() {
            Some(d) => self.peek(d),
            None => Ok(&self.lastx),
        }
    }

    /// Mutable access to one stack level by absolute index (0 = bottom).
    pub fn level_mut(&mut self, idx: usize) -> &mut Value {
        &mut self.vals[idx]
    }

    /// Removes X outright (big-stack CLX); classic callers overwrite with zero instead.
    pub fn drop_x(&mut self) {
        self.vals.pop();
    }

    /// Replaces X without any lift or LASTX bookkeeping (number entry edits in place).
    pub fn overwrite_x(&mut self, v: Value) {
        if let Some(slot) = self.vals.last_mut() {
            *slot = v;
        } else {
            self.vals.push(v);
        }
    }

    // MODE SWITCHING
    // --------------------------------------------------------------------------------------------

    /// Enables the big-stack discipline; current contents carry over.
    pub fn make_big(&mut self) {
        self.big = true;
    }

    /// Returns to the classic 4-level discipline, keeping the top four levels and zero-filling
    /// a shallower big stack.
    pub fn make_classic(&mut self) {
        if self.vals.len() > 4 {
            self.vals.drain(..self.vals.len() - 4);
        } else {
            while self.vals.len() < 4 {
                self.vals.insert(0, Value::default());
            }
        }
        self.big = false;
        self.vals.shrink_to_fit();
    }

    // RESULT DISCIPLINES
    // --------------------------------------------------------------------------------------------

    /// Installs a recalled value in X: overwrite when stack lift is disabled, otherwise grow
    /// (big) or lift with T falling off (classic).
    pub fn recall_result(&mut self, v: Value, lift_disable: bool) -> Result<(), CalcError> {
        if lift_disable {
            self.overwrite_x(v);
        } else if self.big {
            self.reserve(1)?;
            self.vals.push(v);
        } else {
            self.vals.remove(0);
            self.vals.push(v);
        }
        Ok(())
    }

    /// Installs two recalled values: Y gets `y`, X gets `x`.
    pub fn recall_two_results(
        &mut self,
        x: Value,
        y: Value,
        lift_disable: bool,
    ) -> Result<(), CalcError> {
        if self.big {
            let sld = lift_disable && !self.vals.is_empty();
            let off = if sld { 1 } else { 2 };
            self.reserve(off)?;
            if sld {
                self.vals.pop();
            }
            self.vals.push(y);
            self.vals.push(x);
        } else {
            if lift_disable {
                // drop T and X, keep Y and Z shifted up
                self.vals.remove(0);
                self.vals.pop();
            } else {
                // drop T and Z
                self.vals.remove(0);
                self.vals.remove(0);
            }
            self.vals.push(y);
            self.vals.push(x);
        }
        Ok(())
    }

    /// One operand consumed, one result: LASTX gets old X, X gets the result.
    pub fn unary_result(&mut self, v: Value) -> Result<(), CalcError> {
        let old = self.vals.last_mut().ok_or(CalcError::StackDepthError)?;
        self.lastx = core::mem::replace(old, v);
        Ok(())
    }

    /// One operand consumed, no result (WSIZE, BIT?): X drops into LASTX, classic T
    /// duplicates.
    pub fn unary_no_result(&mut self) -> Result<(), CalcError> {
        if self.big {
            self.lastx = self.vals.pop().ok_or(CalcError::StackDepthError)?;
        } else {
            let t = self.vals[0].clone();
            self.lastx = self.vals.pop().expect("classic stack holds four");
            self.vals.insert(0, t);
        }
        Ok(())
    }

    /// One operand consumed, two results (LJ, →POL interplay): stack grows by one.
    pub fn unary_two_results(&mut self, x: Value, y: Value) -> Result<(), CalcError> {
        if self.big {
            self.reserve(1)?;
            self.lastx = self.vals.pop().ok_or(CalcError::StackDepthError)?;
        } else {
            self.vals.remove(0);
            self.lastx = self.vals.pop().ok_or(CalcError::StackDepthError)?;
        }
        self.vals.push(y);
        self.vals.push(x);
        Ok(())
    }

    /// Two operands consumed, one result: the stack drops one level, classic T duplicates.
    pub fn binary_result(&mut self, v: Value) -> Result<(), CalcError> {
        if self.big {
            if self.vals.len() < 2 {
                return Err(CalcError::StackDepthError);
            }
            self.lastx = self.vals.pop().expect("checked depth");
            *self.vals.last_mut().expect("checked depth") = v;
        } else {
            let t = self.vals[0].clone();
            self.lastx = self.vals.pop().expect("classic stack holds four");
            self.vals.pop();
            self.vals.insert(0, t);
            self.vals.push(v);
        }
        Ok(())
    }

    /// Two operands consumed, two results: X and Y both replaced.
    pub fn binary_two_results(&mut self, x: Value, y: Value) -> Result<(), CalcError> {
        if self.big && self.vals.len() < 2 {
            return Err(CalcError::StackDepthError);
        }
        self.lastx = self.vals.pop().expect("checked depth");
        self.vals.pop();
        self.vals.push(y);
        self.vals.push(x);
        Ok(())
    }

    /// Three operands consumed, one result.
    pub fn ternary_result(&mut self, v: Value) -> Result<(), CalcError> {
        if self.big {
            if self.vals.len() < 3 {
                return Err(CalcError::StackDepthError);
            }
            self.lastx = self.vals.pop().expect("checked depth");
            self.vals.pop();
            *self.vals.last_mut().expect("checked depth") = v;
        } else {
            let t = self.vals[0].clone();
            self.lastx = self.vals.pop().expect("classic stack holds four");
            self.vals.pop();
            self.vals.pop();
            self.vals.insert(0, t.clone());
            self.vals.insert(0, t);
            self.vals.push(v);
        }
        Ok(())
    }

    // ROTATION AND CLEARING
    // --------------------------------------------------------------------------------------------

    /// Roll down: X takes Y, the old X wraps to the bottom.
    pub fn roll_down(&mut self) {
        self.vals.rotate_right(1);
    }

    /// Roll up: the bottom wraps into X.
    pub fn roll_up(&mut self) {
        self.vals.rotate_left(1);
    }

    pub fn swap_xy(&mut self) -> Result<(), CalcError> {
        let n = self.vals.len();
        if n < 2 {
            return Err(CalcError::StackDepthError);
        }
        self.vals.swap(n - 1, n - 2);
        Ok(())
    }

    /// Installs the four result registers at once (solver output). A shallower big stack is
    /// padded first so X..T all exist.
    pub fn load_xyzt(&mut self, x: Value, y: Value, z: Value, t: Value) -> Result<(), CalcError> {
        if self.big {
            while self.vals.len() < 4 {
                self.reserve(1)?;
                self.vals.insert(0, Value::default());
            }
        }
        let n = self.vals.len();
        self.vals[n - 1] = x;
        self.vals[n - 2] = y;
        self.vals[n - 3] = z;
        self.vals[n - 4] = t;
        Ok(())
    }

    /// CLST: classic zeroes all four levels, big empties the stack.
    pub fn clear(&mut self) {
        if self.big {
            self.vals.clear();
            self.vals.shrink_to_fit();
        } else {
            self.vals.fill_with(Value::default);
        }
    }

    /// Reinstalls persisted contents. A classic stack is normalized back to four levels.
    pub fn restore(&mut self, vals: Vec<Value>, lastx: Value, big: bool) {
        self.vals = vals;
        self.lastx = lastx;
        self.big = big;
        if !big {
            self.make_classic();
        }
    }

    fn reserve(&mut self, n: usize) -> Result<(), CalcError> {
        self.vals.try_reserve(n).map_err(|_| CalcError::InsufficientMemory)
    }

    /// Ensures at least `n` operands exist: always true in classic mode.
    pub fn require(&self, n: usize) -> Result<(), CalcError> {
        if self.big && self.vals.len() < n {
            return Err(CalcError::StackDepthError);
        }
        Ok(())
    }
}

// TESTS
// ================================================================================================

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use rpn42_core::Scalar;

    use super::*;

    fn classic_with(xs: [Scalar; 4]) -> Stack {
        let mut s = Stack::new();
        s.vals = xs.into_iter().map(Value::Real).collect();
        s
    }

    fn xs(s: &Stack) -> Vec<Scalar> {
        s.levels().iter().map(|v| v.as_real().unwrap()).collect()
    }

    #[test]
    fn classic_lift_drops_t() {
        let mut s = classic_with([4.0, 3.0, 2.0, 1.0]);
        s.recall_result(Value::Real(9.0), false).unwrap();
        assert_eq!(xs(&s), vec![3.0, 2.0, 1.0, 9.0]);
    }

    #[test]
    fn lift_disable_overwrites_x() {
        let mut s = classic_with([4.0, 3.0, 2.0, 1.0]);
        s.recall_result(Value::Real(9.0), true).unwrap();
        assert_eq!(xs(&s), vec![4.0, 3.0, 2.0, 9.0]);
    }

    #[test]
    fn big_stack_grows_and_shrinks() {
        let mut s = Stack::new();
        s.make_big();
        s.clear();
        assert_eq!(s.depth(), 0);
        assert!(s.x().is_err());
        s.recall_result(Value::Real(1.0), false).unwrap();
        s.recall_result(Value::Real(2.0), false).unwrap();
        s.binary_result(Value::Real(3.0)).unwrap();
        assert_eq!(s.depth(), 1);
        assert_eq!(s.x().unwrap(), &Value::Real(3.0));
        assert_eq!(s.lastx(), &Value::Real(2.0));
        assert_eq!(s.binary_result(Value::Real(0.0)), Err(CalcError::StackDepthError));
    }

    #[test]
    fn classic_binary_duplicates_t() {
        let mut s = classic_with([4.0, 3.0, 2.0, 1.0]);
        s.binary_result(Value::Real(8.0)).unwrap();
        assert_eq!(xs(&s), vec![4.0, 4.0, 3.0, 8.0]);
        assert_eq!(s.lastx(), &Value::Real(1.0));
    }

    #[test]
    fn classic_ternary_duplicates_t_twice() {
        let mut s = classic_with([4.0, 3.0, 2.0, 1.0]);
        s.ternary_result(Value::Real(8.0)).unwrap();
        assert_eq!(xs(&s), vec![4.0, 4.0, 4.0, 8.0]);
    }

    #[test]
    fn roll_down_moves_y_into_x() {
        let mut s = classic_with([4.0, 3.0, 2.0, 1.0]);
        s.roll_down();
        assert_eq!(xs(&s), vec![1.0, 4.0, 3.0, 2.0]);
    }

    #[test]
    fn make_classic_keeps_top_four() {
        let mut s = Stack::new();
        s.make_big();
        s.clear();
        for i in 0..6 {
            s.recall_result(Value::Real(i as Scalar), false).unwrap();
        }
        s.make_classic();
        assert_eq!(xs(&s), vec![2.0, 3.0, 4.0, 5.0]);
    }

    proptest! {
        #[test]
        fn classic_rdn_four_times_is_identity(vals in proptest::array::uniform4(-1e6f64..1e6)) {
            let mut s = classic_with(vals);
            let before = s.clone();
            for _ in 0..4 {
                s.roll_down();
            }
            prop_assert_eq!(s, before);
        }

        #[test]
        fn big_rdn_cycles_all_levels(vals in proptest::collection::vec(-1e6f64..1e6, 1..12)) {
            let mut s = Stack::new();
            s.make_big();
            s.clear();
            for &v in &vals {
                s.recall_result(Value::Real(v), false).unwrap();
            }
            let before = s.clone();
            for _ in 0..vals.len() {
                s.roll_down();
            }
            prop_assert_eq!(s, before);
        }
    }
}
