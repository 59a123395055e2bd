use crate::{command::Cmd, errors::CalcError, scalar::Scalar, value::Ident};

// STACK REGISTERS
// ================================================================================================

/// The addressable stack registers of argument syntax (`STO ST X`, `RCL IND ST L`, ...).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum StackReg {
    X,
    Y,
    Z,
    T,
    L,
}

impl StackReg {
    /// Depth below the top of stack, or `None` for LASTX.
    pub fn depth(self) -> Option<usize> {
        match self {
            StackReg::X => Some(0),
            StackReg::Y => Some(1),
            StackReg::Z => Some(2),
            StackReg::T => Some(3),
            StackReg::L => None,
        }
    }

    pub fn letter(self) -> char {
        match self {
            StackReg::X => 'X',
            StackReg::Y => 'Y',
            StackReg::Z => 'Z',
            StackReg::T => 'T',
            StackReg::L => 'L',
        }
    }

    pub fn from_letter(c: char) -> Option<Self> {
        match c {
            'X' => Some(StackReg::X),
            'Y' => Some(StackReg::Y),
            'Z' => Some(StackReg::Z),
            'T' => Some(StackReg::T),
            'L' => Some(StackReg::L),
            _ => None,
        }
    }

    fn code(self) -> u8 {
        match self {
            StackReg::X => 0,
            StackReg::Y => 1,
            StackReg::Z => 2,
            StackReg::T => 3,
            StackReg::L => 4,
        }
    }

    fn from_code(code: u8) -> Result<Self, CalcError> {
        Ok(match code {
            0 => StackReg::X,
            1 => StackReg::Y,
            2 => StackReg::Z,
            3 => StackReg::T,
            4 => StackReg::L,
            _ => return Err(CalcError::InternalError),
        })
    }
}

// ARGUMENTS
// ================================================================================================

/// A resolved or stored command argument.
#[derive(Clone, Debug, PartialEq)]
pub enum Arg {
    None,
    /// Register/flag/label number 0..99.
    Num(u32),
    /// A stack register.
    Stk(StackReg),
    /// Indirect through numbered register `REGS[n]`.
    IndNum(u32),
    /// Indirect through a stack register.
    IndStk(StackReg),
    /// A variable or global label name.
    Str(Ident),
    /// Indirect through a named variable.
    IndStr(Ident),
    /// An inline real literal (number-entry program lines).
    Literal(Scalar),
}

impl Arg {
    pub fn is_indirect(&self) -> bool {
        matches!(self, Arg::IndNum(_) | Arg::IndStk(_) | Arg::IndStr(_))
    }
}

// INSTRUCTION ENCODING
// ================================================================================================
//
// One program line: a 16-bit big-endian opcode, an argument tag byte, then the argument
// payload. This is the in-memory program representation, the raw export format, and the
// program sub-block of the state file, so it must stay stable.

const TAG_NONE: u8 = 0;
const TAG_NUM: u8 = 1;
const TAG_STK: u8 = 2;
const TAG_IND_NUM: u8 = 3;
const TAG_IND_STK: u8 = 4;
const TAG_STR: u8 = 5;
const TAG_IND_STR: u8 = 6;
const TAG_LITERAL: u8 = 7;

/// One decoded program line.
#[derive(Clone, Debug, PartialEq)]
pub struct Instruction {
    pub cmd: Cmd,
    pub arg: Arg,
}

impl Instruction {
    pub fn new(cmd: Cmd, arg: Arg) -> Self {
        Self { cmd, arg }
    }

    pub fn plain(cmd: Cmd) -> Self {
        Self { cmd, arg: Arg::None }
    }

    /// Appends the encoded form to `out`.
    pub fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.cmd.id().to_be_bytes());
        match &self.arg {
            Arg::None => out.push(TAG_NONE),
            Arg::Num(n) => {
                out.push(TAG_NUM);
                out.extend_from_slice(&n.to_be_bytes());
            },
            Arg::Stk(r) => {
                out.push(TAG_STK);
                out.push(r.code());
            },
            Arg::IndNum(n) => {
                out.push(TAG_IND_NUM);
                out.extend_from_slice(&n.to_be_bytes());
            },
            Arg::IndStk(r) => {
                out.push(TAG_IND_STK);
                out.push(r.code());
            },
            Arg::Str(name) => {
                out.push(TAG_STR);
                out.push(name.len() as u8);
                out.extend_from_slice(name.as_bytes());
            },
            Arg::IndStr(name) => {
                out.push(TAG_IND_STR);
                out.push(name.len() as u8);
                out.extend_from_slice(name.as_bytes());
            },
            Arg::Literal(x) => {
                out.push(TAG_LITERAL);
                out.extend_from_slice(&x.to_be_bytes());
            },
        }
    }

    /// Encoded length in bytes.
    pub fn encoded_len(&self) -> usize {
        3 + match &self.arg {
            Arg::None => 0,
            Arg::Num(_) | Arg::IndNum(_) => 4,
            Arg::Stk(_) | Arg::IndStk(_) => 1,
            Arg::Str(name) | Arg::IndStr(name) => 1 + name.len(),
            Arg::Literal(_) => 8,
        }
    }

    /// Decodes one instruction from the head of `data`, returning it with its byte length.
    ///
    /// # Errors
    /// `InternalError` on a truncated or malformed stream; program bytes are engine-owned, so
    /// corruption here is not a user mistake.
    pub fn decode(data: &[u8]) -> Result<(Instruction, usize), CalcError> {
        let take = |n: usize, at: usize| {
            data.get(at..at + n).ok_or(CalcError::InternalError)
        };
        let opcode = u16::from_be_bytes(take(2, 0)?.try_into().unwrap());
        let cmd = Cmd::from_id(opcode).ok_or(CalcError::InternalError)?;
        let tag = *data.get(2).ok_or(CalcError::InternalError)?;
        let (arg, len) = match tag {
            TAG_NONE => (Arg::None, 3),
            TAG_NUM => {
                (Arg::Num(u32::from_be_bytes(take(4, 3)?.try_into().unwrap())), 7)
            },
            TAG_STK => (Arg::Stk(StackReg::from_code(*take(1, 3)?.first().unwrap())?), 4),
            TAG_IND_NUM => {
                (Arg::IndNum(u32::from_be_bytes(take(4, 3)?.try_into().unwrap())), 7)
            },
            TAG_IND_STK => (Arg::IndStk(StackReg::from_code(*take(1, 3)?.first().unwrap())?), 4),
            TAG_STR | TAG_IND_STR => {
                let len = *take(1, 3)?.first().unwrap() as usize;
                let name = Ident::new(take(len, 4)?).map_err(|_| CalcError::InternalError)?;
                let arg = if tag == TAG_STR { Arg::Str(name) } else { Arg::IndStr(name) };
                (arg, 4 + len)
            },
            TAG_LITERAL => {
                (Arg::Literal(Scalar::from_be_bytes(take(8, 3)?.try_into().unwrap())), 11)
            },
            _ => return Err(CalcError::InternalError),
        };
        Ok((Instruction { cmd, arg }, len))
    }
}

// TESTS
// ================================================================================================

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(Instruction::plain(Cmd::Add))]
    #[case(Instruction::new(Cmd::Sf, Arg::Num(25)))]
    #[case(Instruction::new(Cmd::Sto, Arg::Stk(StackReg::L)))]
    #[case(Instruction::new(Cmd::Rcl, Arg::IndNum(7)))]
    #[case(Instruction::new(Cmd::Gto, Arg::IndStk(StackReg::T)))]
    #[case(Instruction::new(Cmd::Xeq, Arg::Str(Ident::new(b"FN").unwrap())))]
    #[case(Instruction::new(Cmd::Rcl, Arg::IndStr(Ident::new(b"PTR").unwrap())))]
    #[case(Instruction::new(Cmd::Number, Arg::Literal(-12.5)))]
    fn encode_decode_roundtrip(#[case] instr: Instruction) {
        let mut bytes = Vec::new();
        instr.encode(&mut bytes);
        assert_eq!(bytes.len(), instr.encoded_len());
        let (decoded, len) = Instruction::decode(&bytes).unwrap();
        assert_eq!(len, bytes.len());
        assert_eq!(decoded, instr);
    }

    #[test]
    fn decode_rejects_truncation() {
        let mut bytes = Vec::new();
        Instruction::new(Cmd::Number, Arg::Literal(1.0)).encode(&mut bytes);
        for cut in 0..bytes.len() {
            assert_eq!(
                Instruction::decode(&bytes[..cut]).unwrap_err(),
                CalcError::InternalError,
                "cut at {cut}"
            );
        }
    }

    #[test]
    fn decode_rejects_unknown_opcode() {
        let bytes = [0xff, 0xff, 0x00];
        assert_eq!(Instruction::decode(&bytes).unwrap_err(), CalcError::InternalError);
    }
}
