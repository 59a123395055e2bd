//! Core data model of the calculator: the scalar contract, the tagged value system with
//! copy-on-write arrays, generic arithmetic, the error/control taxonomy, and the command and
//! instruction encoding shared by the engine, the program store, and the persistence layer.

pub mod arith;
pub mod cmath;
pub mod command;
pub mod errors;
pub mod instruction;
pub mod matrix;
pub mod scalar;
pub mod serialization;
pub mod value;

// RE-EXPORTS
// ================================================================================================

pub use arith::{NumPolicy, StrCellPolicy};
pub use command::{ArgKind, Cmd, CommandSpec};
pub use errors::{CalcError, CmdResult, Control};
pub use instruction::{Arg, Instruction, StackReg};
pub use matrix::{Cell, ComplexMatrix, List, RealMatrix};
pub use scalar::{AngleMode, MAX_WORD_SIZE, NEG_HUGE, POS_HUGE, Scalar, ScalarOps};
pub use value::{CalcString, Ident, MAX_NAME_LEN, MAX_STRING_LEN, Value};

pub mod utils {
    //! Serialization substrate shared with the engine's persistence layer.
    pub use winter_utils::{
        ByteReader, ByteWriter, Deserializable, DeserializationError, Serializable, SliceReader,
    };
}
