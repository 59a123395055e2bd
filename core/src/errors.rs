// CONTROL CODES
// ================================================================================================

/// Non-error outcomes a command can report to the interpreter.
///
/// The original firmware folds these into its error-code space; here they are a separate type
/// so that `Result<Control, CalcError>` keeps "what the dispatcher does next" apart from "what
/// went wrong". They never display a message.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum Control {
    /// Command completed; continue normally.
    #[default]
    None,
    /// Predicate evaluated true: a running program executes the next instruction.
    Yes,
    /// Predicate evaluated false: a running program skips the next instruction.
    No,
    /// Halt a running program (R/S, STOP, program fell off the end).
    Stop,
    /// Begin (or resume) program execution at the current program counter.
    Run,
    /// Yield to the shell; a worker callback continues the command on the next cycle.
    Interruptible,
}

impl Control {
    /// True for the two predicate outcomes.
    pub fn is_predicate(self) -> bool {
        matches!(self, Control::Yes | Control::No)
    }
}

// CALCULATOR ERRORS
// ================================================================================================

/// The typed error taxonomy of the command surface.
///
/// Display strings are the canonical short messages shown on row 1 of the LCD; a running
/// program halts at the offending instruction when one of these surfaces.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CalcError {
    // operand type
    #[error("Invalid Type")]
    InvalidType,
    #[error("Alpha Data Is Invalid")]
    AlphaDataIsInvalid,
    #[error("Invalid Data")]
    InvalidData,

    // bounds
    #[error("Out of Range")]
    OutOfRange,
    #[error("Dimension Error")]
    DimensionError,
    #[error("Size Error")]
    SizeError,
    #[error("Stack Depth Error")]
    StackDepthError,

    // lookup
    #[error("Nonexistent")]
    Nonexistent,
    #[error("Label Not Found")]
    LabelNotFound,
    #[error("No Menu Variables")]
    NoMenuVariables,

    // math
    #[error("Divide by 0")]
    DivideBy0,
    #[error("Singular Matrix")]
    SingularMatrix,
    #[error("Stat Math Error")]
    StatMathError,
    #[error("Invalid Forecast Model")]
    InvalidForecastModel,

    // resources
    #[error("Insufficient Memory")]
    InsufficientMemory,
    #[error("Restricted Operation")]
    RestrictedOperation,
    #[error("Name Too Long")]
    NameTooLong,

    // system
    #[error("Internal Error")]
    InternalError,
    #[error("Printing Is Disabled")]
    PrintingIsDisabled,
    #[error("Suspicious OFF")]
    SuspiciousOff,
    #[error("Solve(Solve)")]
    SolveSolve,
    #[error("Integ(Integ)")]
    IntegInteg,
}

/// Result alias used by every command handler.
pub type CmdResult = Result<Control, CalcError>;

// TESTS
// ================================================================================================

#[cfg(test)]
mod error_assertions {
    use super::*;

    /// Asserts at compile time that the error type has Send + Sync + 'static bounds.
    fn _assert_error_is_send_sync_static<E: core::error::Error + Send + Sync + 'static>(_: E) {}

    fn _assert_calc_error_bounds(err: CalcError) {
        _assert_error_is_send_sync_static(err);
    }

    #[test]
    fn canonical_messages() {
        assert_eq!(CalcError::DivideBy0.to_string(), "Divide by 0");
        assert_eq!(CalcError::OutOfRange.to_string(), "Out of Range");
        assert_eq!(CalcError::RestrictedOperation.to_string(), "Restricted Operation");
    }
}
