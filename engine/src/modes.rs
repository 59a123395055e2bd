use rpn42_core::{AngleMode, CalcError, MAX_WORD_SIZE, Scalar};

// DISPLAY FORMAT
// ================================================================================================

/// Numeric display format.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DispFormat {
    Fix(u8),
    Sci(u8),
    Eng(u8),
    All,
}

impl Default for DispFormat {
    fn default() -> Self {
        DispFormat::Fix(4)
    }
}

// MODE STATE
// ================================================================================================

/// The non-flag mode state: display and angle modes, integer base configuration, and the
/// sub-systems' small toggles. Everything here persists with the core state.
#[derive(Clone, Debug, PartialEq)]
pub struct Modes {
    pub disp: DispFormat,
    pub angle: AngleMode,
    /// Complex display: rectangular (false) or polar (true).
    pub polar: bool,
    /// Integer display base: 2, 8, 10 or 16.
    pub base: u32,
    /// Configured word size, 1..=64.
    pub wsize: u32,
    pub base_signed: bool,
    pub base_wrap: bool,
    /// Carry bit maintained by the BASE shift/rotate/add/sub group.
    pub carry: bool,
    /// Big-stack discipline active.
    pub big_stack: bool,
    /// Length of a pending INPUT prompt target; virtual flag 53 mirrors this.
    pub input_length: u8,
}

impl Default for Modes {
    fn default() -> Self {
        Self {
            disp: DispFormat::default(),
            angle: AngleMode::default(),
            polar: false,
            base: 10,
            wsize: 36,
            base_signed: true,
            base_wrap: false,
            carry: false,
            big_stack: false,
            input_length: 0,
        }
    }
}

impl Modes {
    pub fn set_base(&mut self, base: u32) {
        debug_assert!(matches!(base, 2 | 8 | 10 | 16));
        self.base = base;
    }

    /// Word size actually used by BASE arithmetic: the binary backend loses integer precision
    /// past 53 bits, so larger configured sizes clamp.
    pub fn effective_wsize(&self) -> u32 {
        self.wsize.min(MAX_WORD_SIZE)
    }

    // BASE <-> SCALAR CONVERSION
    // --------------------------------------------------------------------------------------------

    /// Renders a word as the Real the stack carries, honoring signedness.
    pub fn base_to_scalar(&self, n: i64) -> Scalar {
        if self.base_signed { n as Scalar } else { n as u64 as Scalar }
    }

    /// Converts a Real into a word, honoring the wrap and signedness policy. `None` when the
    /// value cannot represent a word under the current policy (`InvalidData` at the call
    /// sites).
    pub fn scalar_to_base(&self, x: Scalar) -> Option<i64> {
        let wsize = self.effective_wsize();
        if x.is_nan() || x.is_infinite() {
            return None;
        }
        if self.base_wrap {
            let ip = if x < 0.0 { -(-x).floor() } else { x.floor() };
            let d = (2.0 as Scalar).powi(wsize as i32);
            let mut r = ip % d;
            if r < 0.0 {
                r += d;
            }
            let mut n = r as u64 as i64;
            if self.base_signed {
                n = sign_extend(n, wsize);
            } else if wsize < 64 {
                n &= mask(wsize) as i64;
            }
            Some(n)
        } else if self.base_signed {
            let high = (2.0 as Scalar).powi(wsize as i32 - 1);
            let low = -high;
            if x >= high || x < low {
                return None;
            }
            Some(sign_extend(x as i64, wsize))
        } else {
            if x < 0.0 {
                return None;
            }
            let high = (2.0 as Scalar).powi(wsize as i32) - 1.0;
            if x > high {
                return None;
            }
            Some(x as u64 as i64)
        }
    }

    /// Post-operation range check: wraps into the word when forced or `base_wrap` is set,
    /// otherwise saturates (flag 24) or fails with `OutOfRange`.
    pub fn base_range_check(
        &self,
        n: i64,
        force_wrap: bool,
        range_error_ignore: bool,
    ) -> Result<i64, CalcError> {
        let wsize = self.effective_wsize();
        if force_wrap || self.base_wrap {
            Ok(if self.base_signed {
                sign_extend(n, wsize)
            } else if wsize < 64 {
                n & mask(wsize) as i64
            } else {
                n
            })
        } else if self.base_signed {
            if wsize == 64 {
                return Ok(n);
            }
            let high = (1i64 << (wsize - 1)) - 1;
            let low = -(1i64 << (wsize - 1));
            if n < low {
                if range_error_ignore { Ok(low) } else { Err(CalcError::OutOfRange) }
            } else if n > high {
                if range_error_ignore { Ok(high) } else { Err(CalcError::OutOfRange) }
            } else {
                Ok(n)
            }
        } else {
            let un = n as u64;
            let high = if wsize == 64 { u64::MAX } else { mask(wsize) };
            if un > high {
                if range_error_ignore { Ok(high as i64) } else { Err(CalcError::OutOfRange) }
            } else {
                Ok(n)
            }
        }
    }
}

/// Low `wsize` one bits.
pub fn mask(wsize: u32) -> u64 {
    if wsize >= 64 { u64::MAX } else { (1u64 << wsize) - 1 }
}

/// Interprets the low `wsize` bits of `n` as a signed word.
pub fn sign_extend(n: i64, wsize: u32) -> i64 {
    if wsize >= 64 {
        return n;
    }
    if n & (1i64 << (wsize - 1)) != 0 {
        n | (!0i64 << (wsize - 1))
    } else {
        n & ((1i64 << (wsize - 1)) - 1)
    }
}

// TESTS
// ================================================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn modes(signed: bool, wrap: bool, wsize: u32) -> Modes {
        Modes { base_signed: signed, base_wrap: wrap, wsize, ..Modes::default() }
    }

    #[test]
    fn effective_wsize_caps_at_53() {
        assert_eq!(modes(true, false, 64).effective_wsize(), 53);
        assert_eq!(modes(true, false, 8).effective_wsize(), 8);
    }

    #[test]
    fn scalar_to_base_signed_bounds() {
        let m = modes(true, false, 8);
        assert_eq!(m.scalar_to_base(127.0), Some(127));
        assert_eq!(m.scalar_to_base(-128.0), Some(-128));
        assert_eq!(m.scalar_to_base(128.0), None);
        assert_eq!(m.scalar_to_base(-129.0), None);
    }

    #[test]
    fn scalar_to_base_wrapping() {
        let m = modes(true, true, 8);
        assert_eq!(m.scalar_to_base(130.0), Some(-126));
        assert_eq!(m.scalar_to_base(-1.0), Some(-1));
        let m = modes(false, true, 8);
        assert_eq!(m.scalar_to_base(257.0), Some(1));
        assert_eq!(m.scalar_to_base(-1.0), Some(255));
    }

    #[test]
    fn unsigned_rejects_negative_without_wrap() {
        let m = modes(false, false, 8);
        assert_eq!(m.scalar_to_base(-1.0), None);
        assert_eq!(m.scalar_to_base(255.0), Some(255));
        assert_eq!(m.scalar_to_base(256.0), None);
    }

    #[test]
    fn range_check_saturates_or_fails() {
        let m = modes(true, false, 8);
        assert_eq!(m.base_range_check(200, false, false), Err(CalcError::OutOfRange));
        assert_eq!(m.base_range_check(200, false, true), Ok(127));
        assert_eq!(m.base_range_check(-200, false, true), Ok(-128));
        assert_eq!(m.base_range_check(200, true, false), Ok(sign_extend(200, 8)));
    }

    #[test]
    fn sign_extension() {
        assert_eq!(sign_extend(0x80, 8), -128);
        assert_eq!(sign_extend(0x7f, 8), 127);
        assert_eq!(sign_extend(0xff, 8), -1);
    }
}
