use rpn42_core::{CalcError, CmdResult, Control};

// FLAG NUMBERS
// ================================================================================================

pub const FLAG_AUDIO: usize = 26;
pub const FLAG_CUSTOM_MENU: usize = 27;
pub const FLAG_DECIMAL_COMMA: usize = 28;
pub const FLAG_THOUSANDS_SEP: usize = 29;
pub const FLAG_STACK_LIFT_DISABLE: usize = 30;
pub const FLAG_RANGE_ERROR_IGNORE: usize = 24;
pub const FLAG_ERROR_IGNORE: usize = 25;
pub const FLAG_CONTINUOUS_ON: usize = 44;
pub const FLAG_SOLVING: usize = 45;
pub const FLAG_INTEGRATING: usize = 46;
pub const FLAG_VARIABLE_MENU: usize = 47;
pub const FLAG_ALPHA_MODE: usize = 48;
pub const FLAG_LOW_BATTERY: usize = 49;
pub const FLAG_INPUT: usize = 53;
pub const FLAG_PRINTER_EXISTS: usize = 55;
pub const FLAG_TRACE_PRINT: usize = 56;
pub const FLAG_NORMAL_PRINT: usize = 57;
pub const FLAG_MATRIX_EDITOR: usize = 65;
pub const FLAG_PROGRAMMABLE_MENU: usize = 75;

/// Flags in this inclusive range reject user writes.
pub const RESTRICTED_LOW: usize = 36;
pub const RESTRICTED_HIGH: usize = 80;

/// The flag numbers whose value is computed from live state rather than stored.
const VIRTUAL_FLAGS: &[usize] = &[
    FLAG_CUSTOM_MENU,
    FLAG_CONTINUOUS_ON,
    FLAG_SOLVING,
    FLAG_INTEGRATING,
    FLAG_VARIABLE_MENU,
    FLAG_ALPHA_MODE,
    FLAG_LOW_BATTERY,
    FLAG_INPUT,
    FLAG_MATRIX_EDITOR,
    FLAG_PROGRAMMABLE_MENU,
];

// FLAG OPERATIONS
// ================================================================================================

/// The six flag commands, shared between stored and virtual flags.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FlagOp {
    Set,
    Clear,
    IsSet,
    IsClear,
    IsSetClear,
    IsClearClear,
}

impl FlagOp {
    /// True for the operations that write the flag.
    pub fn writes(self) -> bool {
        !matches!(self, FlagOp::IsSet | FlagOp::IsClear)
    }
}

// FLAG ARRAY
// ================================================================================================

/// The 100 user flags. Virtual flags are not stored here; [`crate::Core`] routes them to the
/// live state they mirror.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Flags {
    bits: [bool; 100],
}

impl Default for Flags {
    fn default() -> Self {
        Self { bits: [false; 100] }
    }
}

impl Flags {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, num: usize) -> bool {
        self.bits[num]
    }

    pub fn set(&mut self, num: usize, value: bool) {
        self.bits[num] = value;
    }

    pub fn is_virtual(num: usize) -> bool {
        VIRTUAL_FLAGS.contains(&num)
    }

    /// Validates a flag number and enforces the read-only band for writing operations.
    pub fn check_access(num: u32, op: FlagOp) -> Result<usize, CalcError> {
        let num = num as usize;
        if num >= 100 {
            return Err(CalcError::Nonexistent);
        }
        if op.writes() && (RESTRICTED_LOW..=RESTRICTED_HIGH).contains(&num) {
            return Err(CalcError::RestrictedOperation);
        }
        Ok(num)
    }

    /// Applies a flag operation to a stored (non-virtual) flag.
    pub fn apply(&mut self, num: usize, op: FlagOp) -> CmdResult {
        let was = self.bits[num];
        match op {
            FlagOp::Set => {
                self.bits[num] = true;
                Ok(Control::None)
            },
            FlagOp::Clear => {
                self.bits[num] = false;
                Ok(Control::None)
            },
            FlagOp::IsSet => Ok(if was { Control::Yes } else { Control::No }),
            FlagOp::IsClear => Ok(if was { Control::No } else { Control::Yes }),
            FlagOp::IsSetClear => {
                self.bits[num] = false;
                Ok(if was { Control::Yes } else { Control::No })
            },
            FlagOp::IsClearClear => {
                self.bits[num] = false;
                Ok(if was { Control::No } else { Control::Yes })
            },
        }
    }

    /// Raw bit block for persistence.
    pub fn to_bytes(&self) -> [u8; 100] {
        let mut out = [0u8; 100];
        for (o, b) in out.iter_mut().zip(self.bits.iter()) {
            *o = *b as u8;
        }
        out
    }

    pub fn from_bytes(bytes: &[u8; 100]) -> Self {
        let mut flags = Self::new();
        for (bit, &b) in flags.bits.iter_mut().zip(bytes.iter()) {
            *bit = b != 0;
        }
        flags
    }
}

// TESTS
// ================================================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn restricted_band_rejects_writes_but_not_tests() {
        assert_eq!(Flags::check_access(40, FlagOp::Set), Err(CalcError::RestrictedOperation));
        assert_eq!(Flags::check_access(80, FlagOp::IsSetClear), Err(CalcError::RestrictedOperation));
        assert_eq!(Flags::check_access(40, FlagOp::IsSet), Ok(40));
        assert_eq!(Flags::check_access(100, FlagOp::IsSet), Err(CalcError::Nonexistent));
        assert_eq!(Flags::check_access(35, FlagOp::Set), Ok(35));
        assert_eq!(Flags::check_access(81, FlagOp::Clear), Ok(81));
    }

    #[test]
    fn test_and_clear_ops() {
        let mut f = Flags::new();
        f.set(11, true);
        assert_eq!(f.apply(11, FlagOp::IsSetClear), Ok(Control::Yes));
        assert!(!f.get(11));
        assert_eq!(f.apply(11, FlagOp::IsSetClear), Ok(Control::No));
        f.set(12, true);
        assert_eq!(f.apply(12, FlagOp::IsClearClear), Ok(Control::No));
        assert!(!f.get(12));
    }

    #[test]
    fn bytes_roundtrip() {
        let mut f = Flags::new();
        f.set(0, true);
        f.set(30, true);
        f.set(99, true);
        assert_eq!(Flags::from_bytes(&f.to_bytes()), f);
    }

    #[test]
    fn virtual_set_matches_spec_list() {
        for &n in &[27, 44, 45, 46, 47, 48, 49, 53, 65, 75] {
            assert!(Flags::is_virtual(n), "{n}");
        }
        assert!(!Flags::is_virtual(30));
    }
}
