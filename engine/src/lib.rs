//! The calculator execution engine: a single [`Core`] aggregate owned by the shell, driven
//! through key events and shell callbacks, with the solver and integrator re-entering the
//! interpreter through synthetic return frames.

pub mod commands;
pub mod display;
pub mod flags;
pub mod format;
pub mod host;
pub mod integ;
pub mod interp;
pub mod keys;
pub mod modes;
pub mod persist;
pub mod prgms;
pub mod solver;
pub mod stack;
pub mod vars;

use rpn42_core::{CalcString, NumPolicy, RealMatrix};

use crate::{
    display::Display,
    flags::{FLAG_PRINTER_EXISTS, FLAG_RANGE_ERROR_IGNORE, FLAG_TRACE_PRINT, Flags},
    format::Punct,
    host::Host,
    integ::IntegState,
    keys::EntryState,
    modes::Modes,
    prgms::ProgramStore,
    solver::SolveState,
    stack::Stack,
    vars::VarStore,
};

// RE-EXPORTS
// ================================================================================================

pub use crate::{
    flags::FlagOp,
    host::Host as CoreHost,
    interp::RunOutcome,
    keys::KeyResult,
    modes::DispFormat,
    persist::StateError,
};
pub use rpn42_core::{
    Arg, CalcError, Cmd, CmdResult, Control, Ident, Instruction, Scalar, Value,
};

// SETTINGS
// ================================================================================================

/// Shell-visible preferences that are not calculator flags.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Settings {
    /// Substitute a near-zero pivot instead of failing on an exactly singular divisor.
    pub matrix_singularmatrix: bool,
    /// Out-of-range matrix elements saturate instead of failing.
    pub matrix_outofrange: bool,
    pub auto_repeat: bool,
    /// The NSTK command is permitted to enable the big stack.
    pub allow_big_stack: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            matrix_singularmatrix: false,
            matrix_outofrange: false,
            auto_repeat: true,
            allow_big_stack: true,
        }
    }
}

// RETURN FRAMES
// ================================================================================================

/// Sentinel program index: halt when this frame returns.
pub(crate) const RTN_HALT: i32 = -1;
/// Sentinel: the solver owns this frame; RTN re-enters it.
pub(crate) const RTN_SOLVE: i32 = -2;
/// Sentinel: the integrator owns this frame.
pub(crate) const RTN_INTEG: i32 = -3;

/// One return-address entry: the program index (or a sentinel) and the byte offset to resume
/// at.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    pub prgm: i32,
    pub pc: usize,
}

// BACKGROUND WORKERS
// ================================================================================================

/// Resumable state of a command that yielded with `Control::Interruptible`.
#[derive(Clone, Debug, PartialEq)]
pub enum Worker {
    /// PRV over a matrix: one row of cells is printed per resume.
    PrintVar { name: Ident, index: usize },
}

// THE CORE
// ================================================================================================

/// The whole calculator. The shell owns exactly one and drives it through the key-event entry
/// points; every suspension point is a return from one of those.
pub struct Core<H: Host> {
    pub(crate) host: H,
    pub(crate) stack: Stack,
    pub(crate) flags: Flags,
    pub(crate) modes: Modes,
    pub(crate) alpha: CalcString,
    pub(crate) vars: VarStore,
    pub(crate) prgms: ProgramStore,
    pub(crate) rtn_stack: Vec<Frame>,
    pub(crate) program_running: bool,
    /// Set by a command (ENTER, CLX, SF 30) to keep `stack_lift_disable` alive past the
    /// end-of-command cleanup.
    pub(crate) mode_disable_stack_lift: bool,
    pub(crate) solve: SolveState,
    pub(crate) integ: IntegState,
    /// INDEX target and the 0-based (i, j) element pointer.
    pub(crate) matedit: Option<(Ident, u32, u32)>,
    pub(crate) display: Display,
    pub(crate) entry: EntryState,
    pub(crate) alpha_active: bool,
    pub(crate) shift: bool,
    /// Split decimal words of the RAN generator: (low 8 digits, high 7 digits).
    pub(crate) random: (i64, i64),
    pub(crate) worker: Option<Worker>,
    /// A PSE is waiting for timeout3.
    pub(crate) pause: bool,
    pub(crate) settings: Settings,
    pub(crate) prgm_mode: bool,
}

impl<H: Host> Core<H> {
    /// A powered-up core with factory state: FIX 4, DEG, classic stack, REGS sized to 25.
    pub fn new(host: H) -> Self {
        let mut core = Self {
            host,
            stack: Stack::new(),
            flags: Flags::new(),
            modes: Modes::default(),
            alpha: CalcString::new(),
            vars: VarStore::new(),
            prgms: ProgramStore::new(),
            rtn_stack: Vec::new(),
            program_running: false,
            mode_disable_stack_lift: false,
            solve: SolveState::default(),
            integ: IntegState::default(),
            matedit: None,
            display: Display::new(),
            entry: EntryState::Idle,
            alpha_active: false,
            shift: false,
            random: (0, 0),
            worker: None,
            pause: false,
            settings: Settings::default(),
            prgm_mode: false,
        };
        core.reset_regs();
        core
    }

    fn reset_regs(&mut self) {
        let regs = RealMatrix::new(25, 1).expect("default REGS dimensions are valid");
        self.vars.store_global(&Ident::try_from("REGS").unwrap(), Value::RealMatrix(regs));
    }

    // ACCESSORS
    // --------------------------------------------------------------------------------------------

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn stack(&self) -> &Stack {
        &self.stack
    }

    pub fn flags(&self) -> &Flags {
        &self.flags
    }

    pub fn modes(&self) -> &Modes {
        &self.modes
    }

    pub fn alpha(&self) -> &CalcString {
        &self.alpha
    }

    pub fn vars(&self) -> &VarStore {
        &self.vars
    }

    pub fn prgms(&self) -> &ProgramStore {
        &self.prgms
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }

    pub fn display_row(&self, idx: usize) -> &str {
        self.display.row(idx)
    }

    // PROGRAM ENTRY
    // --------------------------------------------------------------------------------------------

    pub fn prgm_mode(&self) -> bool {
        self.prgm_mode
    }

    pub fn set_prgm_mode(&mut self, on: bool) {
        self.prgm_mode = on;
    }

    /// Positions the cursor past the last program, creating a fresh one for entry.
    pub fn goto_dot_dot(&mut self) {
        self.prgms.goto_dot_dot();
    }

    /// Inserts one instruction at the program cursor and advances past it; the label index is
    /// refreshed.
    pub fn insert_instruction(&mut self, instr: &Instruction) {
        let pc = self.prgms.pc;
        self.prgms.current_prgm_mut().insert(pc, instr);
        self.prgms.pc = pc + instr.encoded_len();
        self.prgms.rebuild_labels();
    }

    /// Deletes the instruction at the program cursor.
    pub fn delete_instruction(&mut self) -> Result<(), rpn42_core::CalcError> {
        let pc = self.prgms.pc;
        self.prgms.current_prgm_mut().delete(pc)?;
        self.prgms.rebuild_labels();
        Ok(())
    }

    pub fn is_program_running(&self) -> bool {
        self.program_running
    }

    /// True when a menu owns the softkey row (only the CUSTOM menu survives in this core).
    pub fn menu(&self) -> bool {
        self.flags.get(flags::FLAG_CUSTOM_MENU)
    }

    /// True when the alpha keyboard is active.
    pub fn alpha_menu(&self) -> bool {
        self.alpha_active
    }

    /// True when the A..F softkeys should show (hex entry).
    pub fn hex_menu(&self) -> bool {
        self.modes.base == 16
    }

    // POLICY VIEWS
    // --------------------------------------------------------------------------------------------

    pub(crate) fn punct(&self) -> Punct {
        Punct {
            comma_radix: self.flags.get(flags::FLAG_DECIMAL_COMMA),
            thousands: self.flags.get(flags::FLAG_THOUSANDS_SEP),
        }
    }

    pub(crate) fn num_policy(&self) -> NumPolicy {
        NumPolicy {
            range_error_ignore: self.flags.get(FLAG_RANGE_ERROR_IGNORE),
            singular_substitute: self.settings.matrix_singularmatrix,
        }
    }

    /// Applies the range policy to one computed real.
    pub(crate) fn check_range(&self, x: Scalar) -> Result<Scalar, CalcError> {
        self.num_policy().check(x)
    }

    // TRACE PRINTING
    // --------------------------------------------------------------------------------------------

    /// Trace-mode print of the new X, emitted by the result disciplines.
    pub(crate) fn print_trace(&mut self) {
        if self.flags.get(FLAG_TRACE_PRINT) && self.flags.get(FLAG_PRINTER_EXISTS) {
            if let Ok(x) = self.stack.x() {
                let text = format::format_value(x, &self.modes, self.punct());
                self.print_line(&text);
            }
        }
    }

    pub(crate) fn print_line(&mut self, text: &str) {
        self.host.print(text.as_bytes(), &[], 0, 1);
    }

    // RESULT DISCIPLINE WRAPPERS
    // --------------------------------------------------------------------------------------------
    //
    // Thin layers over the Stack disciplines that add the flag coupling and trace printing the
    // command handlers rely on.

    pub(crate) fn recall_result_silently(&mut self, v: Value) -> Result<(), CalcError> {
        let lift_disable = self.flags.get(flags::FLAG_STACK_LIFT_DISABLE);
        self.stack.recall_result(v, lift_disable)
    }

    pub(crate) fn recall_result(&mut self, v: Value) -> Result<(), CalcError> {
        self.recall_result_silently(v)?;
        self.print_trace();
        Ok(())
    }

    pub(crate) fn recall_two_results(&mut self, x: Value, y: Value) -> Result<(), CalcError> {
        let lift_disable = self.flags.get(flags::FLAG_STACK_LIFT_DISABLE);
        self.stack.recall_two_results(x, y, lift_disable)?;
        self.print_trace();
        Ok(())
    }

    pub(crate) fn unary_result(&mut self, v: Value) -> Result<(), CalcError> {
        self.stack.unary_result(v)?;
        self.print_trace();
        Ok(())
    }

    pub(crate) fn unary_two_results(&mut self, x: Value, y: Value) -> Result<(), CalcError> {
        self.stack.unary_two_results(x, y)?;
        self.print_trace();
        Ok(())
    }

    pub(crate) fn binary_result(&mut self, v: Value) -> Result<(), CalcError> {
        self.stack.binary_result(v)?;
        self.print_trace();
        Ok(())
    }

    pub(crate) fn binary_two_results(&mut self, x: Value, y: Value) -> Result<(), CalcError> {
        self.stack.binary_two_results(x, y)?;
        self.print_trace();
        Ok(())
    }

    // DISPLAY
    // --------------------------------------------------------------------------------------------

    /// Redraws the idle display: Y on row 0, X on row 1.
    pub fn repaint_display(&mut self) {
        let punct = self.punct();
        let x = self
            .stack
            .x()
            .map(|v| format::format_value(v, &self.modes, punct))
            .unwrap_or_default();
        let y = self
            .stack
            .peek(1)
            .map(|v| format::format_value(v, &self.modes, punct))
            .unwrap_or_default();
        self.display.draw(0, &format!("y: {y}"));
        self.display.draw(1, &format!("x: {x}"));
        self.display.flush(&mut self.host);
        self.update_annunciators();
    }

    pub(crate) fn display_error(&mut self, err: &CalcError) {
        self.display.draw(0, &err.to_string());
        self.display.flush(&mut self.host);
    }

    pub(crate) fn update_annunciators(&mut self) {
        let rad = !matches!(self.modes.angle, rpn42_core::AngleMode::Degrees);
        let g = matches!(self.modes.angle, rpn42_core::AngleMode::Gradians);
        self.host.annunciators(
            -1,
            self.shift as i8,
            -1,
            self.program_running as i8,
            g as i8,
            rad as i8,
        );
    }

    // VIRTUAL FLAGS
    // --------------------------------------------------------------------------------------------

    /// Routes a flag operation on a virtual flag to the live state it mirrors.
    pub(crate) fn virtual_flag_op(&mut self, op: FlagOp, num: usize) -> CmdResult {
        use flags::*;

        let test = |on: bool, op: FlagOp| -> CmdResult {
            match op {
                FlagOp::IsSet => Ok(if on { Control::Yes } else { Control::No }),
                FlagOp::IsClear => Ok(if on { Control::No } else { Control::Yes }),
                _ => Err(CalcError::InternalError),
            }
        };

        match num {
            FLAG_CUSTOM_MENU => {
                // the only virtual flag with full set/clear semantics: it drives the CUSTOM
                // menu directly
                let on = self.flags.get(FLAG_CUSTOM_MENU);
                match op {
                    FlagOp::Set => {
                        self.flags.set(FLAG_CUSTOM_MENU, true);
                        Ok(Control::None)
                    },
                    FlagOp::Clear => {
                        self.flags.set(FLAG_CUSTOM_MENU, false);
                        Ok(Control::None)
                    },
                    FlagOp::IsSetClear => {
                        self.flags.set(FLAG_CUSTOM_MENU, false);
                        Ok(if on { Control::Yes } else { Control::No })
                    },
                    FlagOp::IsClearClear => {
                        self.flags.set(FLAG_CUSTOM_MENU, false);
                        Ok(if on { Control::No } else { Control::Yes })
                    },
                    _ => test(on, op),
                }
            },
            FLAG_CONTINUOUS_ON => test(false, op),
            FLAG_SOLVING => test(self.solve.is_active(), op),
            FLAG_INTEGRATING => test(self.integ.is_active(), op),
            FLAG_VARIABLE_MENU => test(false, op),
            FLAG_ALPHA_MODE => test(self.alpha_active, op),
            FLAG_LOW_BATTERY => {
                let low = self.host.low_battery();
                test(low, op)
            },
            FLAG_INPUT => test(self.modes.input_length > 0, op),
            FLAG_MATRIX_EDITOR => test(self.matedit.is_some(), op),
            FLAG_PROGRAMMABLE_MENU => test(false, op),
            _ => Err(CalcError::InternalError),
        }
    }

    // CLEANUP
    // --------------------------------------------------------------------------------------------

    /// Releases the core; pending solver/integrator activity is abandoned.
    pub fn cleanup(self) -> H {
        self.host
    }
}

// COMMAND NAME DISPATCH
// ================================================================================================

impl<H: Host> Core<H> {
    /// Executes a command by listing name with the given argument, as if keyed in. This is the
    /// shell's programmatic entry point and the test suite's workhorse.
    pub fn keydown_command(&mut self, name: &str, arg: Arg) -> CmdResult {
        let cmd = Cmd::from_name(name).ok_or(CalcError::Nonexistent)?;
        self.execute_checked(&Instruction::new(cmd, arg))
    }
}
