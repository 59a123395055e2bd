use core::fmt;

use derive_more::From;
use smallvec::SmallVec;

use crate::{
    errors::CalcError,
    matrix::{ComplexMatrix, List, RealMatrix},
    scalar::Scalar,
};

// BOUNDED STRINGS
// ================================================================================================

/// Longest string a Value or the alpha register can hold, in bytes.
pub const MAX_STRING_LEN: usize = 44;

/// Longest variable or global label name, in bytes.
pub const MAX_NAME_LEN: usize = 7;

/// A binary-clean byte string bounded at [`MAX_STRING_LEN`].
///
/// Doubles as the storage discipline of the alpha register: appends past the bound shift the
/// oldest bytes out rather than failing.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CalcString {
    bytes: SmallVec<[u8; MAX_STRING_LEN]>,
}

impl CalcString {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a string from the given bytes, keeping only the trailing [`MAX_STRING_LEN`].
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let start = bytes.len().saturating_sub(MAX_STRING_LEN);
        Self { bytes: SmallVec::from_slice(&bytes[start..]) }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn clear(&mut self) {
        self.bytes.clear();
    }

    /// Appends one byte, dropping the oldest byte when full.
    pub fn append_char(&mut self, c: u8) {
        if self.bytes.len() == MAX_STRING_LEN {
            self.bytes.remove(0);
        }
        self.bytes.push(c);
    }

    /// Appends a byte run, shifting the oldest bytes out as needed. With `reverse` set the run
    /// is appended back to front (integer-to-string builds digits in reverse).
    pub fn append(&mut self, buf: &[u8], reverse: bool) {
        let mut buf = buf;
        if buf.len() > MAX_STRING_LEN {
            if !reverse {
                buf = &buf[buf.len() - MAX_STRING_LEN..];
            } else {
                buf = &buf[..MAX_STRING_LEN];
            }
        }
        let needed = (self.bytes.len() + buf.len()).saturating_sub(MAX_STRING_LEN);
        if needed > 0 {
            self.bytes.drain(..needed);
        }
        if reverse {
            self.bytes.extend(buf.iter().rev().copied());
        } else {
            self.bytes.extend_from_slice(buf);
        }
    }
}

impl fmt::Display for CalcString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &b in self.bytes.iter() {
            if (0x20..0x7f).contains(&b) {
                write!(f, "{}", b as char)?;
            } else {
                write!(f, "\\x{b:02x}")?;
            }
        }
        Ok(())
    }
}

// IDENTIFIERS
// ================================================================================================

/// A variable or global-label name: 1..=7 bytes.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Ident {
    bytes: SmallVec<[u8; MAX_NAME_LEN]>,
}

impl Ident {
    /// Validates length bounds: empty names are a restricted operation, over-long ones report
    /// the dedicated error so indirect resolution can distinguish the two.
    pub fn new(bytes: &[u8]) -> Result<Self, CalcError> {
        if bytes.is_empty() {
            return Err(CalcError::RestrictedOperation);
        }
        if bytes.len() > MAX_NAME_LEN {
            return Err(CalcError::NameTooLong);
        }
        Ok(Self { bytes: SmallVec::from_slice(bytes) })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }
}

impl fmt::Display for Ident {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.bytes))
    }
}

impl TryFrom<&str> for Ident {
    type Error = CalcError;

    fn try_from(s: &str) -> Result<Self, CalcError> {
        Ident::new(s.as_bytes())
    }
}

// VALUES
// ================================================================================================

/// The tagged value of the calculator: everything that can sit on the stack or in a variable.
#[derive(Clone, Debug, PartialEq, From)]
pub enum Value {
    #[from]
    Real(Scalar),
    Complex { re: Scalar, im: Scalar },
    #[from]
    Str(CalcString),
    #[from]
    RealMatrix(RealMatrix),
    #[from]
    ComplexMatrix(ComplexMatrix),
    #[from]
    List(List),
}

impl Value {
    pub fn complex(re: Scalar, im: Scalar) -> Self {
        Value::Complex { re, im }
    }

    pub fn string(s: &str) -> Self {
        Value::Str(CalcString::from_bytes(s.as_bytes()))
    }

    /// The scalar payload of a Real, if this is one.
    pub fn as_real(&self) -> Option<Scalar> {
        match self {
            Value::Real(x) => Some(*x),
            _ => None,
        }
    }

    pub fn is_matrix(&self) -> bool {
        matches!(self, Value::RealMatrix(_) | Value::ComplexMatrix(_))
    }

    /// Short type name used in traces and internal diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Real(_) => "real",
            Value::Complex { .. } => "complex",
            Value::Str(_) => "string",
            Value::RealMatrix(_) => "real matrix",
            Value::ComplexMatrix(_) => "complex matrix",
            Value::List(_) => "list",
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::Real(0.0)
    }
}

// TESTS
// ================================================================================================

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn calc_string_truncates_oldest() {
        let mut s = CalcString::new();
        for i in 0..50u8 {
            s.append_char(b'a' + (i % 26));
        }
        assert_eq!(s.len(), MAX_STRING_LEN);
        // the first six appends fell off the front
        assert_eq!(s.as_bytes()[0], b'a' + 6);
    }

    #[test]
    fn calc_string_reverse_append() {
        let mut s = CalcString::new();
        s.append(b"123", true);
        assert_eq!(s.as_bytes(), b"321");
        s.append(b"ab", false);
        assert_eq!(s.as_bytes(), b"321ab");
    }

    #[test]
    fn ident_bounds() {
        assert_eq!(Ident::new(b""), Err(CalcError::RestrictedOperation));
        assert_eq!(Ident::new(b"TOOLONGX"), Err(CalcError::NameTooLong));
        assert_eq!(Ident::new(b"REGS").unwrap().as_bytes(), b"REGS");
    }

    #[test]
    fn value_conversions() {
        let v: Value = 2.5.into();
        assert_eq!(v.as_real(), Some(2.5));
        assert_eq!(Value::complex(1.0, 2.0).type_name(), "complex");
        assert_eq!(Value::string("AB"), Value::Str(CalcString::from_bytes(b"AB")));
    }
}
