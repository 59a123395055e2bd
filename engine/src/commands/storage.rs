use rpn42_core::{
    Arg, CalcError, Cell, CmdResult, ComplexMatrix, Control, Ident, RealMatrix, ScalarOps,
    StackReg, Value,
};

use crate::{Core, host::Host};

fn regs_name() -> Ident {
    Ident::try_from("REGS").unwrap()
}

// TARGETS
// ================================================================================================

/// Where a STO/RCL-family argument points after indirection is resolved.
enum Target {
    Reg(u32),
    Stk(StackReg),
    Var(Ident),
}

fn target<H: Host>(core: &Core<H>, arg: &Arg) -> Result<Target, CalcError> {
    match core.resolve_ind_arg(arg)? {
        Arg::Num(n) => Ok(Target::Reg(n)),
        Arg::Stk(r) => Ok(Target::Stk(r)),
        Arg::Str(name) => Ok(Target::Var(name)),
        _ => Err(CalcError::InternalError),
    }
}

// REGISTER ACCESS
// ================================================================================================
//
// Numbered registers live in the REGS matrix. Its existence is a variable-store question
// (SizeError when missing, like an out-of-range register), but its type is an engine
// invariant: anything other than a real or complex matrix is an internal error.

fn read_reg<H: Host>(core: &Core<H>, n: u32) -> Result<Value, CalcError> {
    let regs = core.vars.recall(&regs_name()).ok_or(CalcError::SizeError)?;
    let n = n as usize;
    match regs {
        Value::RealMatrix(m) => {
            if n >= m.size() {
                return Err(CalcError::SizeError);
            }
            Ok(match m.cell(n) {
                Cell::Num(x) => Value::Real(*x),
                Cell::Str(s) => Value::Str(rpn42_core::CalcString::from_bytes(s)),
            })
        },
        Value::ComplexMatrix(m) => {
            if n >= m.size() {
                return Err(CalcError::SizeError);
            }
            let (re, im) = m.get(n);
            Ok(Value::Complex { re, im })
        },
        _ => Err(CalcError::InternalError),
    }
}

fn write_reg<H: Host>(core: &mut Core<H>, n: u32, v: &Value) -> Result<(), CalcError> {
    let name = regs_name();
    let n = n as usize;

    // a complex store into a real register file promotes the whole file first
    if let (Some(Value::RealMatrix(m)), Value::Complex { re, im }) =
        (core.vars.recall(&name), v)
    {
        if n >= m.size() {
            return Err(CalcError::SizeError);
        }
        let mut parts = Vec::with_capacity(m.size() * 2);
        for cell in m.cells() {
            let x = cell.as_num().ok_or(CalcError::AlphaDataIsInvalid)?;
            parts.push(x);
            parts.push(0.0);
        }
        let mut cm = ComplexMatrix::from_parts(m.rows(), m.cols(), parts)?;
        let data = cm.disentangle();
        data.parts[2 * n] = *re;
        data.parts[2 * n + 1] = *im;
        core.vars.store_global(&name, Value::ComplexMatrix(cm));
        return Ok(());
    }

    let regs = core.vars.recall_mut(&name).ok_or(CalcError::SizeError)?;
    match regs {
        Value::RealMatrix(m) => {
            if n >= m.size() {
                return Err(CalcError::SizeError);
            }
            match v {
                Value::Real(x) => m.disentangle().cells[n] = Cell::Num(*x),
                Value::Str(s) => m.disentangle().cells[n] = Cell::string(s.as_bytes()),
                _ => return Err(CalcError::InvalidType),
            }
            Ok(())
        },
        Value::ComplexMatrix(m) => {
            if n >= m.size() {
                return Err(CalcError::SizeError);
            }
            let (re, im) = match v {
                Value::Real(x) => (*x, 0.0),
                Value::Complex { re, im } => (*re, *im),
                Value::Str(_) => return Err(CalcError::AlphaDataIsInvalid),
                _ => return Err(CalcError::InvalidType),
            };
            let data = m.disentangle();
            data.parts[2 * n] = re;
            data.parts[2 * n + 1] = im;
            Ok(())
        },
        _ => Err(CalcError::InternalError),
    }
}

// GENERIC TARGET ACCESS
// ================================================================================================

/// Reads the value an argument points at (VIEW, ISG, DSE share this with RCL).
pub(crate) fn read_arg_value<H: Host>(core: &Core<H>, arg: &Arg) -> Result<Value, CalcError> {
    match target(core, arg)? {
        Target::Reg(n) => read_reg(core, n),
        Target::Stk(r) => Ok(core.stack.reg(r)?.clone()),
        Target::Var(name) => {
            core.vars.recall(&name).cloned().ok_or(CalcError::Nonexistent)
        },
    }
}

/// Writes through an argument target (ISG, DSE counter updates).
pub(crate) fn write_arg_value<H: Host>(
    core: &mut Core<H>,
    arg: &Arg,
    v: Value,
) -> Result<(), CalcError> {
    match target(core, arg)? {
        Target::Reg(n) => write_reg(core, n, &v),
        Target::Stk(r) => match r.depth() {
            Some(d) => {
                core.stack.require(d + 1)?;
                let len = core.stack.depth();
                *core.stack.level_mut(len - 1 - d) = v;
                Ok(())
            },
            None => {
                core.stack.set_lastx(v);
                Ok(())
            },
        },
        Target::Var(name) => {
            core.vars.store_global(&name, v);
            Ok(())
        },
    }
}

/// The display name of an argument target, for VIEW and traces.
pub(crate) fn target_name<H: Host>(core: &Core<H>, arg: &Arg) -> Result<String, CalcError> {
    Ok(match target(core, arg)? {
        Target::Reg(n) => format!("R{n:02}"),
        Target::Stk(r) => format!("ST {}", r.letter()),
        Target::Var(name) => name.to_string(),
    })
}

// STO / RCL / CLV
// ================================================================================================

pub fn rcl<H: Host>(core: &mut Core<H>, arg: &Arg) -> CmdResult {
    let v = match target(core, arg)? {
        Target::Reg(n) => read_reg(core, n)?,
        Target::Stk(r) => core.stack.reg(r)?.clone(),
        Target::Var(name) => core.vars.recall(&name).ok_or(CalcError::Nonexistent)?.clone(),
    };
    core.recall_result(v)?;
    Ok(Control::None)
}

pub fn sto<H: Host>(core: &mut Core<H>, arg: &Arg) -> CmdResult {
    let v = core.stack.x()?.clone();
    match target(core, arg)? {
        Target::Reg(n) => write_reg(core, n, &v)?,
        Target::Stk(r) => match r.depth() {
            Some(d) => {
                core.stack.require(d + 1)?;
                let len = core.stack.depth();
                *core.stack.level_mut(len - 1 - d) = v;
            },
            None => core.stack.set_lastx(v),
        },
        Target::Var(name) => {
            if name == regs_name() && !v.is_matrix() {
                return Err(CalcError::RestrictedOperation);
            }
            core.vars.store_global(&name, v);
        },
    }
    Ok(Control::None)
}

pub fn clv<H: Host>(core: &mut Core<H>, arg: &Arg) -> CmdResult {
    let name = core.arg_to_ident(arg)?;
    core.vars.purge(&name)?;
    if core.matedit.as_ref().is_some_and(|(n, _, _)| n == &name) {
        core.matedit = None;
    }
    Ok(Control::None)
}

// SIZE AND DIM
// ================================================================================================

/// SIZE re-dimensions the register file to n×1; SIZE 0 purges it.
pub fn size<H: Host>(core: &mut Core<H>, arg: &Arg) -> CmdResult {
    let n = core.arg_to_num(arg)?;
    let name = regs_name();
    if n == 0 {
        let _ = core.vars.purge(&name);
        return Ok(Control::None);
    }
    match core.vars.recall_mut(&name) {
        Some(Value::RealMatrix(m)) => m.redim(n, 1)?,
        Some(Value::ComplexMatrix(m)) => m.redim(n, 1)?,
        Some(_) => return Err(CalcError::InternalError),
        None => {
            let m = RealMatrix::new(n, 1)?;
            core.vars.store_global(&name, Value::RealMatrix(m));
        },
    }
    Ok(Control::None)
}

/// DIM "name": Y rows × X cols, preserving contents in row-major order. A zero dimension
/// purges the variable.
pub fn dim<H: Host>(core: &mut Core<H>, arg: &Arg) -> CmdResult {
    let name = core.arg_to_ident(arg)?;
    core.stack.require(2)?;
    let cols_f = core.stack.x()?.as_real().ok_or(CalcError::InvalidType)?;
    let rows_f = core.stack.peek(1)?.as_real().ok_or(CalcError::InvalidType)?;
    if !cols_f.is_finite_real() || !rows_f.is_finite_real() {
        return Err(CalcError::InvalidData);
    }
    let rows = rows_f.abs().to_i32_sat() as u32;
    let cols = cols_f.abs().to_i32_sat() as u32;
    if rows == 0 || cols == 0 {
        let _ = core.vars.purge(&name);
        if core.matedit.as_ref().is_some_and(|(n, _, _)| n == &name) {
            core.matedit = None;
        }
        return Ok(Control::None);
    }
    match core.vars.recall_mut(&name) {
        Some(Value::RealMatrix(m)) => m.redim(rows, cols)?,
        Some(Value::ComplexMatrix(m)) => m.redim(rows, cols)?,
        Some(_) => return Err(CalcError::InvalidType),
        None => {
            let m = RealMatrix::new(rows, cols)?;
            core.vars.store_global(&name, Value::RealMatrix(m));
        },
    }
    Ok(Control::None)
}

// ELEMENT ACCESS
// ================================================================================================

pub fn index<H: Host>(core: &mut Core<H>, arg: &Arg) -> CmdResult {
    let name = core.arg_to_ident(arg)?;
    match core.vars.recall(&name) {
        Some(v) if v.is_matrix() => {
            core.matedit = Some((name, 0, 0));
            Ok(Control::None)
        },
        Some(_) => Err(CalcError::InvalidType),
        None => Err(CalcError::Nonexistent),
    }
}

fn indexed_dims<H: Host>(core: &Core<H>) -> Result<(Ident, u32, u32), CalcError> {
    let (name, _, _) = core.matedit.as_ref().ok_or(CalcError::Nonexistent)?;
    match core.vars.recall(name) {
        Some(Value::RealMatrix(m)) => Ok((name.clone(), m.rows(), m.cols())),
        Some(Value::ComplexMatrix(m)) => Ok((name.clone(), m.rows(), m.cols())),
        _ => Err(CalcError::Nonexistent),
    }
}

/// STOIJ sets the element pointer from Y (row) and X (column), 1-based; the stack is left
/// alone.
pub fn stoij<H: Host>(core: &mut Core<H>) -> CmdResult {
    let (name, rows, cols) = indexed_dims(core)?;
    core.stack.require(2)?;
    let j = core.stack.x()?.as_real().ok_or(CalcError::InvalidType)?;
    let i = core.stack.peek(1)?.as_real().ok_or(CalcError::InvalidType)?;
    let i = i.abs().to_i32_sat() as u32;
    let j = j.abs().to_i32_sat() as u32;
    if i < 1 || i > rows || j < 1 || j > cols {
        return Err(CalcError::DimensionError);
    }
    core.matedit = Some((name, i - 1, j - 1));
    Ok(Control::None)
}

pub fn rclij<H: Host>(core: &mut Core<H>) -> CmdResult {
    let (_, i, j) = core.matedit.clone().ok_or(CalcError::Nonexistent)?;
    core.recall_two_results(
        Value::Real((j + 1) as rpn42_core::Scalar),
        Value::Real((i + 1) as rpn42_core::Scalar),
    )?;
    Ok(Control::None)
}

pub fn stoel<H: Host>(core: &mut Core<H>) -> CmdResult {
    let (name, i, j) = core.matedit.clone().ok_or(CalcError::Nonexistent)?;
    let v = core.stack.x()?.clone();
    match core.vars.recall_mut(&name).ok_or(CalcError::Nonexistent)? {
        Value::RealMatrix(m) => {
            if i >= m.rows() || j >= m.cols() {
                return Err(CalcError::DimensionError);
            }
            let idx = (i * m.cols() + j) as usize;
            let cell = match v {
                Value::Real(x) => Cell::Num(x),
                Value::Str(s) => Cell::string(s.as_bytes()),
                _ => return Err(CalcError::InvalidType),
            };
            m.disentangle().cells[idx] = cell;
        },
        Value::ComplexMatrix(m) => {
            if i >= m.rows() || j >= m.cols() {
                return Err(CalcError::DimensionError);
            }
            let idx = (i * m.cols() + j) as usize;
            let (re, im) = match v {
                Value::Real(x) => (x, 0.0),
                Value::Complex { re, im } => (re, im),
                _ => return Err(CalcError::InvalidType),
            };
            let data = m.disentangle();
            data.parts[2 * idx] = re;
            data.parts[2 * idx + 1] = im;
        },
        _ => return Err(CalcError::InvalidType),
    }
    Ok(Control::None)
}

pub fn rclel<H: Host>(core: &mut Core<H>) -> CmdResult {
    let (name, i, j) = core.matedit.clone().ok_or(CalcError::Nonexistent)?;
    let v = match core.vars.recall(&name).ok_or(CalcError::Nonexistent)? {
        Value::RealMatrix(m) => {
            if i >= m.rows() || j >= m.cols() {
                return Err(CalcError::DimensionError);
            }
            match m.cell((i * m.cols() + j) as usize) {
                Cell::Num(x) => Value::Real(*x),
                Cell::Str(s) => Value::Str(rpn42_core::CalcString::from_bytes(s)),
            }
        },
        Value::ComplexMatrix(m) => {
            if i >= m.rows() || j >= m.cols() {
                return Err(CalcError::DimensionError);
            }
            let (re, im) = m.get((i * m.cols() + j) as usize);
            Value::Complex { re, im }
        },
        _ => return Err(CalcError::InvalidType),
    };
    core.recall_result(v)?;
    Ok(Control::None)
}
