use rpn42_core::{
    Arg, CalcError, Cmd, CmdResult, Control, Ident, Instruction, ScalarOps, Value,
};
use tracing::trace;

use crate::{
    Core, Frame, RTN_HALT, RTN_INTEG, RTN_SOLVE,
    commands::{alpha, arith, base, conv, flagcmds, flow, modescmd, stackops, storage},
    flags::FLAG_STACK_LIFT_DISABLE,
    host::Host,
};

/// Instructions executed per `keydown(0)` slice before yielding back to the shell.
const RUN_SLICE_BUDGET: usize = 100;

// ARGUMENT RESOLUTION
// ================================================================================================

impl<H: Host> Core<H> {
    /// Resolves an indirect argument to the direct `Num` or `Str` it names; direct arguments
    /// pass through unchanged.
    pub(crate) fn resolve_ind_arg(&self, arg: &Arg) -> Result<Arg, CalcError> {
        let finish = |v: &Value| -> Result<Arg, CalcError> {
            match v {
                Value::Real(x) => Ok(Arg::Num(x.abs().to_i32_sat() as u32)),
                Value::Str(s) => Ok(Arg::Str(Ident::new(s.as_bytes())?)),
                _ => Err(CalcError::InvalidType),
            }
        };

        match arg {
            Arg::IndNum(num) => {
                let regs = self
                    .vars
                    .recall(&Ident::try_from("REGS").unwrap())
                    .ok_or(CalcError::SizeError)?;
                let Value::RealMatrix(rm) = regs else {
                    return Err(CalcError::InvalidType);
                };
                let num = *num as usize;
                if num >= rm.size() {
                    return Err(CalcError::SizeError);
                }
                match rm.cell(num) {
                    rpn42_core::Cell::Num(x) => Ok(Arg::Num(x.abs().to_i32_sat() as u32)),
                    rpn42_core::Cell::Str(s) => Ok(Arg::Str(Ident::new(s)?)),
                }
            },
            Arg::IndStk(reg) => finish(self.stack.reg(*reg)?),
            Arg::IndStr(name) => {
                finish(self.vars.recall(name).ok_or(CalcError::Nonexistent)?)
            },
            direct => Ok(direct.clone()),
        }
    }

    /// Resolves an argument all the way to a number (flag ops, SIZE).
    pub(crate) fn arg_to_num(&self, arg: &Arg) -> Result<u32, CalcError> {
        match self.resolve_ind_arg(arg)? {
            Arg::Num(n) => Ok(n),
            Arg::Str(_) => Err(CalcError::AlphaDataIsInvalid),
            _ => Err(CalcError::InvalidType),
        }
    }

    /// Resolves an argument to a variable/label name.
    pub(crate) fn arg_to_ident(&self, arg: &Arg) -> Result<Ident, CalcError> {
        match self.resolve_ind_arg(arg)? {
            Arg::Str(name) => Ok(name),
            Arg::Num(_) => Err(CalcError::InvalidType),
            _ => Err(CalcError::InvalidType),
        }
    }
}

// DISPATCH
// ================================================================================================

impl<H: Host> Core<H> {
    /// Raw command dispatch, keyed by the numeric command id.
    pub(crate) fn execute(&mut self, instr: &Instruction) -> CmdResult {
        use Cmd::*;

        trace!(cmd = instr.cmd.spec().name, "dispatch");
        let arg = &instr.arg;
        match instr.cmd {
            // stack and display basics
            Clx => stackops::clx(self),
            Enter => stackops::enter(self),
            Swap => stackops::swap(self),
            Rdn => stackops::rdn(self),
            Rup => stackops::rup(self),
            Chs => arith::chs(self),
            Lastx => stackops::lastx(self),
            Clst => stackops::clst(self),
            Pi => stackops::pi(self),
            Complex => stackops::complex(self),
            ToPol => stackops::to_pol(self),
            ToRec => stackops::to_rec(self),
            Abs => arith::abs(self),
            Sign => arith::sign(self),
            Rnd => arith::rnd(self),
            Ip => arith::ip(self),
            Fp => arith::fp(self),
            Mod => arith::modulo(self),
            Percent => arith::percent(self),
            PercentCh => arith::percent_ch(self),

            // arithmetic
            Add => arith::add(self),
            Sub => arith::sub(self),
            Mul => arith::mul(self),
            Div => arith::div(self),
            Ypowx => arith::y_pow_x(self),

            // one-argument functions
            Inv => arith::inv(self),
            Sqrt => arith::sqrt(self),
            Square => arith::square(self),
            Ln => arith::ln(self),
            Log => arith::log(self),
            TenPowX => arith::ten_pow_x(self),
            Exp => arith::e_pow_x(self),
            ExpM1 => arith::e_pow_x_m1(self),
            Ln1P => arith::ln1p(self),
            Sin => arith::sin(self),
            Cos => arith::cos(self),
            Tan => arith::tan(self),
            Asin => arith::asin(self),
            Acos => arith::acos(self),
            Atan => arith::atan(self),
            Sinh => arith::sinh(self),
            Cosh => arith::cosh(self),
            Tanh => arith::tanh(self),
            Asinh => arith::asinh(self),
            Acosh => arith::acosh(self),
            Atanh => arith::atanh(self),

            // random numbers
            Ran => arith::ran(self),
            Seed => arith::seed(self),

            // comparison predicates
            XEq0 => arith::x_eq_0(self),
            XNe0 => arith::x_ne_0(self),
            XLt0 => arith::x_lt_0(self),
            XGt0 => arith::x_gt_0(self),
            XLe0 => arith::x_le_0(self),
            XGe0 => arith::x_ge_0(self),
            XEqY => arith::x_eq_y(self),
            XNeY => arith::x_ne_y(self),
            XLtY => arith::x_lt_y(self),
            XGtY => arith::x_gt_y(self),
            XLeY => arith::x_le_y(self),
            XGeY => arith::x_ge_y(self),

            // flags
            Sf => flagcmds::sf(self, arg),
            Cf => flagcmds::cf(self, arg),
            FsT => flagcmds::fs_t(self, arg),
            FcT => flagcmds::fc_t(self, arg),
            FscT => flagcmds::fsc_t(self, arg),
            FccT => flagcmds::fcc_t(self, arg),

            // storage
            Sto => storage::sto(self, arg),
            Rcl => storage::rcl(self, arg),
            Clv => storage::clv(self, arg),
            Size => storage::size(self, arg),
            Dim => storage::dim(self, arg),
            Index => storage::index(self, arg),
            Stoij => storage::stoij(self),
            Rclij => storage::rclij(self),
            Stoel => storage::stoel(self),
            Rclel => storage::rclel(self),

            // program flow
            Lbl => Ok(Control::None),
            Gto => flow::gto(self, arg),
            Xeq => flow::xeq(self, arg),
            Rtn => flow::rtn(self),
            End => flow::end(self),
            RunStop => flow::run_stop(self),
            Pse => flow::pse(self),
            Isg => flow::isg(self, arg),
            Dse => flow::dse(self, arg),
            Mvar => Ok(Control::None),
            Varmenu => flow::varmenu(self, arg),
            PgmSlv => flow::pgm_slv(self, arg),
            PgmInt => flow::pgm_int(self, arg),
            Solve => flow::solve(self, arg),
            Integ => flow::integ(self, arg),
            Number => flow::number(self, arg),

            // view and alpha
            View => alpha::view(self, arg),
            Aview => alpha::aview(self),
            Cla => alpha::cla(self),
            Asto => alpha::asto(self, arg),
            Arcl => alpha::arcl(self, arg),
            Aip => alpha::aip(self),
            Xtoa => alpha::xtoa(self),
            Prv => alpha::prv(self, arg),

            // modes
            Fix => modescmd::fix(self, arg),
            Sci => modescmd::sci(self, arg),
            Eng => modescmd::eng(self, arg),
            All => modescmd::all(self),
            Deg => modescmd::deg(self),
            Rad => modescmd::rad(self),
            Grad => modescmd::grad(self),
            Polar => modescmd::polar(self),
            Rect => modescmd::rect(self),
            Binm => modescmd::binm(self),
            Octm => modescmd::octm(self),
            Decm => modescmd::decm(self),
            Hexm => modescmd::hexm(self),
            Wsize => modescmd::wsize(self),
            Bsigned => modescmd::bsigned(self),
            Bwrap => modescmd::bwrap(self),
            FourStk => modescmd::four_stk(self),
            NStk => modescmd::n_stk(self),

            // BASE arithmetic
            And => base::and(self),
            Or => base::or(self),
            Xor => base::xor(self),
            Not => base::not(self),
            BitT => base::bit_t(self),
            Rotxy => base::rotxy(self),
            BaseAdd => base::base_add(self),
            BaseSub => base::base_sub(self),
            BaseMul => base::base_mul(self),
            BaseDiv => base::base_div(self),
            BaseChs => base::base_chs(self),
            Sl => base::sl(self),
            Sr => base::sr(self),
            Asr => base::asr(self),
            Rl => base::rl(self),
            Rlc => base::rlc(self),
            Rr => base::rr(self),
            Rrc => base::rrc(self),
            Rln => base::rln(self),
            Rrn => base::rrn(self),
            Rlcn => base::rlcn(self),
            Rrcn => base::rrcn(self),
            Lj => base::lj(self),
            Sb => base::sb(self),
            Cb => base::cb(self),
            NumB => base::num_b(self),
            Maskl => base::maskl(self),
            Maskr => base::maskr(self),

            // bit-pattern conversions
            NToBs => conv::n_to_bs(self),
            NToBd => conv::n_to_bd(self),
            NToDs => conv::n_to_ds(self),
            NToDd => conv::n_to_dd(self),
            NToDq => conv::n_to_dq(self),
            BsToN => conv::bs_to_n(self),
            BdToN => conv::bd_to_n(self),
            DsToN => conv::ds_to_n(self),
            DdToN => conv::dd_to_n(self),
            DqToN => conv::dq_to_n(self),

            // misc
            Beep => {
                self.host.beeper(1661, 125);
                Ok(Control::None)
            },
            Clp => flow::clp(self, arg),
        }
    }

    /// Dispatches a command and applies the end-of-command bookkeeping: the stack-lift flag is
    /// re-enabled unless the command asked otherwise, control codes steer execution, and
    /// errors are shown.
    pub fn execute_checked(&mut self, instr: &Instruction) -> CmdResult {
        self.mode_disable_stack_lift = false;
        let res = self.execute(instr);
        if res.is_ok() && !self.mode_disable_stack_lift {
            self.flags.set(FLAG_STACK_LIFT_DISABLE, false);
        }
        match &res {
            Ok(Control::Run) => {
                self.program_running = true;
            },
            Ok(Control::Stop) => {
                self.program_running = false;
            },
            Ok(Control::Interruptible) => {},
            Ok(_) => {},
            Err(err) => {
                let err = err.clone();
                self.display_error(&err);
            },
        }
        res
    }
}

// PROGRAM RUNNER
// ================================================================================================

/// Why a run slice came back to the shell.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RunOutcome {
    /// The program is still running; call again.
    Running,
    /// Execution halted (STOP, error, or fell off the end).
    Halted,
    /// A worker yielded; resume it next cycle.
    Yielded,
}

impl<H: Host> Core<H> {
    /// Executes up to one slice of program instructions, yielding when the shell wants the
    /// CPU back.
    pub fn run_slice(&mut self) -> RunOutcome {
        if self.pause {
            return RunOutcome::Yielded;
        }
        for _ in 0..RUN_SLICE_BUDGET {
            if !self.program_running {
                return RunOutcome::Halted;
            }
            match self.step() {
                StepOutcome::Continue => {},
                StepOutcome::Halted => return RunOutcome::Halted,
                StepOutcome::Yielded => return RunOutcome::Yielded,
            }
            if self.host.wants_cpu() {
                break;
            }
        }
        if self.program_running { RunOutcome::Running } else { RunOutcome::Halted }
    }

    /// Runs the current program to completion, driving workers and pauses as the shell's
    /// event loop would; the synchronous driver used by tests and headless shells.
    pub fn run_to_completion(&mut self, max_slices: usize) -> Result<(), CalcError> {
        for _ in 0..max_slices {
            if self.pause {
                self.timeout3(false);
            }
            if self.worker.is_some() {
                self.resume_worker();
                continue;
            }
            if !self.program_running {
                return Ok(());
            }
            self.run_slice();
        }
        Err(CalcError::InternalError)
    }

    fn step(&mut self) -> StepOutcome {
        let pc_before = self.prgms.pc;
        let instr = {
            let prgm = self.prgms.current_prgm();
            if self.prgms.pc >= prgm.bytes().len() {
                // fell off the end; behave like END
                Instruction::plain(Cmd::End)
            } else {
                let mut pc = self.prgms.pc;
                match prgm.next_instruction(&mut pc, false) {
                    Ok(instr) => {
                        self.prgms.pc = pc;
                        instr
                    },
                    Err(err) => {
                        self.halt_with_error(err, pc_before);
                        return StepOutcome::Halted;
                    },
                }
            }
        };

        self.mode_disable_stack_lift = false;
        let res = self.execute(&instr);
        if res.is_ok() && !self.mode_disable_stack_lift {
            self.flags.set(FLAG_STACK_LIFT_DISABLE, false);
        }

        match res {
            Ok(Control::None) | Ok(Control::Yes) | Ok(Control::Run) => StepOutcome::Continue,
            Ok(Control::No) => {
                self.skip_next_instruction();
                StepOutcome::Continue
            },
            Ok(Control::Stop) => {
                self.program_running = false;
                StepOutcome::Halted
            },
            Ok(Control::Interruptible) => StepOutcome::Yielded,
            Err(err) => {
                if self.unwind_to_math_frame(&err) {
                    StepOutcome::Continue
                } else {
                    self.halt_with_error(err, pc_before);
                    StepOutcome::Halted
                }
            },
        }
    }

    /// The 42S "skip next step on false" convention. The END line is never skipped over.
    fn skip_next_instruction(&mut self) {
        let prgm = self.prgms.current_prgm();
        let mut pc = self.prgms.pc;
        if let Ok(next) = prgm.next_instruction(&mut pc, false) {
            if next.cmd != Cmd::End {
                self.prgms.pc = pc;
            }
        }
    }

    fn halt_with_error(&mut self, err: CalcError, pc_of_instr: usize) {
        // halt at the offending instruction
        self.prgms.pc = pc_of_instr;
        self.program_running = false;
        self.display_error(&err);
    }

    /// When a math error surfaces while a solver/integrator frame is pending, the error
    /// becomes a "failed evaluation" callback instead of halting. Returns true when the error
    /// was consumed that way.
    fn unwind_to_math_frame(&mut self, err: &CalcError) -> bool {
        let failure_class = matches!(
            err,
            CalcError::DivideBy0
                | CalcError::OutOfRange
                | CalcError::InvalidData
                | CalcError::SingularMatrix
                | CalcError::StatMathError
        );
        if !failure_class {
            return false;
        }
        let Some(pos) = self
            .rtn_stack
            .iter()
            .rposition(|f| f.prgm == RTN_SOLVE || f.prgm == RTN_INTEG)
        else {
            return false;
        };
        let frame = self.rtn_stack[pos];
        self.rtn_stack.truncate(pos);
        let res = if frame.prgm == RTN_SOLVE {
            self.return_to_solve(true, false)
        } else {
            self.return_to_integ(true, false)
        };
        match res {
            Ok(Control::Run | Control::None | Control::Yes) => true,
            Ok(_) => {
                self.program_running = false;
                true
            },
            Err(inner) => {
                self.program_running = false;
                self.display_error(&inner);
                true
            },
        }
    }

    /// Pops one return frame: a subroutine return, a halt, or a re-entry into the solver or
    /// integrator.
    pub(crate) fn pop_return(&mut self) -> CmdResult {
        match self.rtn_stack.pop() {
            None => Ok(Control::Stop),
            Some(Frame { prgm: RTN_HALT, .. }) => Ok(Control::Stop),
            Some(Frame { prgm: RTN_SOLVE, .. }) => self.return_to_solve(false, false),
            Some(Frame { prgm: RTN_INTEG, .. }) => self.return_to_integ(false, false),
            Some(Frame { prgm, pc }) => {
                self.prgms.current = prgm as usize;
                self.prgms.pc = pc;
                Ok(Control::None)
            },
        }
    }

    /// Positions the execution cursor at a global label.
    pub(crate) fn goto_global_label(&mut self, name: &Ident) -> Result<(), CalcError> {
        let (prgm, pc) = self.prgms.find_global_label(name)?;
        self.prgms.current = prgm;
        self.prgms.pc = pc;
        Ok(())
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum StepOutcome {
    Continue,
    Halted,
    Yielded,
}
