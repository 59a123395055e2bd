use rpn42_core::{
    CalcError, CmdResult, Control, Ident, POS_HUGE, Scalar, ScalarOps, Value,
};
use tracing::{debug, instrument};

use crate::{Core, Frame, RTN_SOLVE, format, host::Host};

/// Slots for remembered previous inputs per menu variable.
const NUM_SHADOWS: usize = 10;

// TERMINATION CLASSES
// ================================================================================================

pub const SOLVE_ROOT: u8 = 0;
pub const SOLVE_SIGN_REVERSAL: u8 = 1;
pub const SOLVE_EXTREMUM: u8 = 2;
pub const SOLVE_BAD_GUESSES: u8 = 3;
pub const SOLVE_CONSTANT: u8 = 4;

const SOLVE_MESSAGES: [&str; 5] =
    ["", "Sign Reversal", "Extremum", "Bad Guess(es)", "Constant?"];

// SOLVER STATE
// ================================================================================================

/// The root finder's whole state. `state` 0 means inactive; 1..=7 are the machine states of
/// the secant/bisection/Ridders loop.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SolveState {
    /// Program selected by PGMSLV.
    pub prgm_name: Option<Ident>,
    /// Program the in-flight solve is actually driving.
    pub(crate) active_prgm: Option<Ident>,
    pub(crate) var_name: Option<Ident>,
    pub(crate) keep_running: bool,
    pub(crate) prev_prgm: usize,
    pub(crate) prev_pc: usize,
    pub(crate) state: u8,
    pub(crate) which: i8,
    pub(crate) toggle: bool,
    pub(crate) retry_counter: i32,
    pub(crate) retry_value: Scalar,
    pub(crate) x1: Scalar,
    pub(crate) x2: Scalar,
    pub(crate) x3: Scalar,
    pub(crate) fx1: Scalar,
    pub(crate) fx2: Scalar,
    pub(crate) prev_x: Scalar,
    pub(crate) curr_x: Scalar,
    pub(crate) curr_f: Scalar,
    pub(crate) xm: Scalar,
    pub(crate) fxm: Scalar,
    pub(crate) shadows: Vec<(Ident, Scalar)>,
    pub(crate) last_disp_time: u32,
}

impl SolveState {
    pub fn is_active(&self) -> bool {
        self.state != 0
    }

    pub fn reset(&mut self) {
        let prgm_name = self.prgm_name.take();
        *self = SolveState { prgm_name, ..SolveState::default() };
    }

    /// Remembers the previous input a variable had when last handed to the solver; the oldest
    /// slot is evicted when all ten are taken.
    pub fn put_shadow(&mut self, name: &Ident, value: Scalar) {
        if let Some(slot) = self.shadows.iter_mut().find(|(n, _)| n == name) {
            slot.1 = value;
            return;
        }
        if self.shadows.len() == NUM_SHADOWS {
            self.shadows.remove(0);
        }
        self.shadows.push((name.clone(), value));
    }

    pub fn get_shadow(&self, name: &Ident) -> Option<Scalar> {
        self.shadows.iter().find(|(n, _)| n == name).map(|(_, v)| *v)
    }

    pub fn remove_shadow(&mut self, name: &Ident) {
        self.shadows.retain(|(n, _)| n != name);
    }
}

// DRIVING THE TARGET PROGRAM
// ================================================================================================

impl<H: Host> Core<H> {
    /// Stores the next abscissa into the solve variable, points execution at the target
    /// program, and arms the solver return frame.
    fn call_solve_fn(&mut self, which: i8, state: u8) -> CmdResult {
        let Some(prgm) = self.solve.active_prgm.clone() else {
            return Err(CalcError::Nonexistent);
        };
        let x = match which {
            1 => self.solve.x1,
            2 => self.solve.x2,
            _ => self.solve.x3,
        };
        self.solve.prev_x = self.solve.curr_x;
        self.solve.curr_x = x;
        let var = self.solve.var_name.clone().ok_or(CalcError::Nonexistent)?;
        self.vars.store_global(&var, Value::Real(x));
        self.solve.which = which;
        self.solve.state = state;
        self.goto_global_label(&prgm)?;
        self.rtn_stack.push(Frame { prgm: RTN_SOLVE, pc: 0 });
        Ok(Control::Run)
    }

    /// Begins a solve for the named variable with the given guesses.
    #[instrument(skip(self), fields(var = %name))]
    pub fn start_solve(&mut self, name: &Ident, x1: Scalar, x2: Scalar) -> CmdResult {
        if self.solve.is_active() {
            return Err(CalcError::SolveSolve);
        }
        let mut x1 = x1;
        let mut x2 = x2;
        self.solve.var_name = Some(name.clone());
        self.solve.active_prgm = self.solve.prgm_name.clone();
        self.solve.prev_prgm = self.prgms.current;
        self.solve.prev_pc = self.prgms.pc;
        if x1 == x2 {
            if x1 == 0.0 {
                x2 = 1.0;
                self.solve.retry_counter = 0;
            } else {
                x2 = x1 * 1.000001;
                if x2.is_infinite() {
                    x2 = x1 * 0.999999;
                }
                self.solve.retry_counter = -10;
            }
        } else {
            self.solve.retry_counter = 10;
            self.solve.retry_value = if x1.abs() < x2.abs() { x1 } else { x2 };
        }
        if x1 < x2 {
            self.solve.x1 = x1;
            self.solve.x2 = x2;
        } else {
            self.solve.x1 = x2;
            self.solve.x2 = x1;
        }
        self.solve.last_disp_time = 0;
        self.solve.toggle = true;
        self.solve.keep_running = self.program_running;
        // remember the input as this variable's shadow: the next solve over the same
        // variable seeds its second guess from it
        self.solve.put_shadow(name, x1);
        self.call_solve_fn(1, 1)
    }

    // FINISHING
    // --------------------------------------------------------------------------------------------

    fn finish_solve(&mut self, message: u8) -> CmdResult {
        self.solve.state = 0;

        if self.solve.which == -1 {
            // Ridders stopped for lack of progress; x3 is not necessarily the best guess, so
            // pick the candidate with the smallest residual
            let t1 = self.solve.fx1.abs();
            let t2 = self.solve.fx2.abs();
            let t3 = self.solve.curr_f.abs();
            let (mut which, t) = if t1 < t2 { (1, t1) } else { (2, t2) };
            if t3 < t {
                which = 3;
            }
            self.solve.which = which;
        }

        let root = match self.solve.which {
            1 => self.solve.x1,
            2 => self.solve.x2,
            _ => self.solve.x3,
        };
        let var = self.solve.var_name.clone().ok_or(CalcError::InternalError)?;
        self.vars.store_global(&var, Value::Real(root));

        let new_x = Value::Real(root);
        let new_y = Value::Real(self.solve.prev_x);
        let new_z = Value::Real(self.solve.curr_f);
        let new_t = Value::Real(message as Scalar);
        self.stack.load_xyzt(new_x, new_y, new_z, new_t)?;

        self.prgms.current = self.solve.prev_prgm;
        self.prgms.pc = self.solve.prev_pc;

        if !self.solve.keep_running {
            let text = format!(
                "{var}={}",
                format::format_value(&Value::Real(root), &self.modes, self.punct())
            );
            self.display.draw(0, &text);
            if message != 0 {
                self.display.clear_row(1);
                self.display.draw(1, SOLVE_MESSAGES[message as usize]);
            }
            self.display.flush(&mut self.host);
        }
        debug!(message, root, "solve finished");

        if message != 0
            && self.flags.get(crate::flags::FLAG_TRACE_PRINT)
            && self.flags.get(crate::flags::FLAG_PRINTER_EXISTS)
        {
            let text = SOLVE_MESSAGES[message as usize].to_string();
            self.print_line(&text);
        }

        Ok(if self.solve.keep_running { Control::None } else { Control::Stop })
    }

    // RE-ENTRY
    // --------------------------------------------------------------------------------------------

    /// Called whenever the target program returns to the solver frame: consumes f(x) from X
    /// and advances the state machine. `failure` marks an evaluation that errored out.
    pub fn return_to_solve(&mut self, failure: bool, stop: bool) -> CmdResult {
        if stop {
            self.solve.keep_running = false;
        }
        if self.solve.state == 0 {
            return Err(CalcError::InternalError);
        }

        let mut failure = failure;
        let mut f = 0.0;
        if !failure {
            match self.stack.x() {
                Ok(Value::Real(x)) if x.is_finite_real() => {
                    f = *x;
                    self.solve.curr_f = f;
                    if f == 0.0 {
                        return self.finish_solve(SOLVE_ROOT);
                    }
                },
                _ => {
                    self.solve.curr_f = POS_HUGE;
                    failure = true;
                },
            }
        } else {
            self.solve.curr_f = POS_HUGE;
        }

        if !failure && self.solve.retry_counter != 0 {
            if self.solve.retry_counter > 0 {
                self.solve.retry_counter -= 1;
            } else {
                self.solve.retry_counter += 1;
            }
        }

        self.show_progress(failure);

        match self.solve.state {
            1 => {
                // first evaluation of x1
                if failure {
                    if self.solve.retry_counter > 0 {
                        self.solve.retry_counter = -self.solve.retry_counter;
                    }
                    self.call_solve_fn(2, 2)
                } else {
                    self.solve.fx1 = f;
                    self.call_solve_fn(2, 3)
                }
            },
            2 => {
                // first evaluation of x2 after x1 was unsuccessful
                if failure {
                    return self.finish_solve(SOLVE_BAD_GUESSES);
                }
                self.solve.fx2 = f;
                self.solve.x1 = (self.solve.x1 + self.solve.x2) / 2.0;
                if self.solve.x1 == self.solve.x2 {
                    return self.finish_solve(SOLVE_BAD_GUESSES);
                }
                self.call_solve_fn(1, 3)
            },
            3 => {
                // make sure f(x1) != f(x2)
                if failure {
                    if self.solve.which == 1 {
                        self.solve.x1 = (self.solve.x1 + self.solve.x2) / 2.0;
                    } else {
                        self.solve.x2 = (self.solve.x1 + self.solve.x2) / 2.0;
                    }
                    if self.solve.x1 == self.solve.x2 {
                        return self.finish_solve(SOLVE_BAD_GUESSES);
                    }
                    return self.call_solve_fn(self.solve.which, 3);
                }
                if self.solve.which == 1 {
                    self.solve.fx1 = f;
                } else {
                    self.solve.fx2 = f;
                }
                if self.solve.fx1 == self.solve.fx2 {
                    // a local flat spot: widen the interval exponentially until the two
                    // endpoints evaluate to different values
                    let (which, x) = if self.solve.toggle {
                        (2, self.solve.x2 + 100.0 * (self.solve.x2 - self.solve.x1))
                    } else {
                        (1, self.solve.x1 - 100.0 * (self.solve.x2 - self.solve.x1))
                    };
                    if x.is_infinite() {
                        if self.solve.retry_counter != 0 {
                            return self.retry_solve();
                        }
                        return self.finish_solve(SOLVE_CONSTANT);
                    }
                    if which == 2 {
                        self.solve.x2 = x;
                    } else {
                        self.solve.x1 = x;
                    }
                    self.solve.toggle = !self.solve.toggle;
                    return self.call_solve_fn(which, 3);
                }
                self.do_secant()
            },
            4 | 5 => self.secant_or_bisection_result(failure, f),
            6 => {
                // Ridders midpoint evaluated
                if failure {
                    return self.do_bisection();
                }
                let s = (f * f - self.solve.fx1 * self.solve.fx2).sqrt();
                if s == 0.0 {
                    // numerically possible when f^2 underflows
                    self.solve.which = -1;
                    return self.finish_solve(SOLVE_ROOT);
                }
                self.solve.xm = self.solve.x3;
                self.solve.fxm = f;
                let s = if self.solve.fx1 < self.solve.fx2 { -s } else { s };
                let xnew = self.solve.xm + (self.solve.xm - self.solve.x1) * (self.solve.fxm / s);
                if xnew == self.solve.x1 || xnew == self.solve.x2 {
                    self.solve.which = -1;
                    return self.finish_solve(SOLVE_ROOT);
                }
                self.solve.x3 = xnew;
                self.call_solve_fn(3, 7)
            },
            7 => {
                // Ridders candidate evaluated: shrink the bracket around the sign change
                if failure {
                    return self.do_bisection();
                }
                if (f > 0.0 && self.solve.fxm < 0.0) || (f < 0.0 && self.solve.fxm > 0.0) {
                    if self.solve.xm < self.solve.x3 {
                        self.solve.x1 = self.solve.xm;
                        self.solve.fx1 = self.solve.fxm;
                        self.solve.x2 = self.solve.x3;
                        self.solve.fx2 = f;
                    } else {
                        self.solve.x1 = self.solve.x3;
                        self.solve.fx1 = f;
                        self.solve.x2 = self.solve.xm;
                        self.solve.fx2 = self.solve.fxm;
                    }
                } else if (f > 0.0 && self.solve.fx1 < 0.0) || (f < 0.0 && self.solve.fx1 > 0.0) {
                    self.solve.x2 = self.solve.x3;
                    self.solve.fx2 = f;
                } else {
                    self.solve.x1 = self.solve.x3;
                    self.solve.fx1 = f;
                }
                self.do_ridders()
            },
            _ => Err(CalcError::InternalError),
        }
    }

    // STATE MACHINE PIECES
    // --------------------------------------------------------------------------------------------

    fn secant_or_bisection_result(&mut self, failure: bool, f: Scalar) -> CmdResult {
        let was_bisection = self.solve.state == 5;
        if failure {
            if self.solve.x3 > self.solve.x2 {
                // failure outside [x1, x2]: approach x2
                self.solve.x3 = (self.solve.x2 + self.solve.x3) / 2.0;
                if self.solve.x3 == self.solve.x2 {
                    return self.finish_solve(SOLVE_EXTREMUM);
                }
            } else if self.solve.x3 < self.solve.x1 {
                self.solve.x3 = (self.solve.x1 + self.solve.x3) / 2.0;
                if self.solve.x3 == self.solve.x1 {
                    return self.finish_solve(SOLVE_EXTREMUM);
                }
            } else {
                // failure inside [x1, x2]: alternately approach x1 and x2
                if self.solve.toggle {
                    let old_x3 = self.solve.x3;
                    if self.solve.x3 <= (self.solve.x1 + self.solve.x2) / 2.0 {
                        self.solve.x3 = (self.solve.x1 + self.solve.x3) / 2.0;
                    } else {
                        self.solve.x3 = (self.solve.x2 + self.solve.x3) / 2.0;
                    }
                    if self.solve.x3 == old_x3 {
                        return self.finish_solve(SOLVE_SIGN_REVERSAL);
                    }
                } else {
                    self.solve.x3 = self.solve.x1 + self.solve.x2 - self.solve.x3;
                }
                self.solve.toggle = !self.solve.toggle;
                if self.solve.x3 == self.solve.x1 || self.solve.x3 == self.solve.x2 {
                    return self.finish_solve(SOLVE_SIGN_REVERSAL);
                }
            }
            return self.call_solve_fn(3, 4);
        }

        if self.solve.fx1 > 0.0 && self.solve.fx2 > 0.0 {
            if self.solve.fx1 > self.solve.fx2 {
                if f >= self.solve.fx1 && !was_bisection {
                    return self.do_bisection();
                }
                self.solve.x1 = self.solve.x3;
                self.solve.fx1 = f;
            } else {
                if f >= self.solve.fx2 && !was_bisection {
                    return self.do_bisection();
                }
                self.solve.x2 = self.solve.x3;
                self.solve.fx2 = f;
            }
        } else if self.solve.fx1 < 0.0 && self.solve.fx2 < 0.0 {
            if self.solve.fx1 < self.solve.fx2 {
                if f <= self.solve.fx1 && !was_bisection {
                    return self.do_bisection();
                }
                self.solve.x1 = self.solve.x3;
                self.solve.fx1 = f;
            } else {
                if f <= self.solve.fx2 && !was_bisection {
                    return self.do_bisection();
                }
                self.solve.x2 = self.solve.x3;
                self.solve.fx2 = f;
            }
        } else {
            // f(x1) and f(x2) have opposite signs: use x3 to narrow the interval even if
            // f(x3) is worse, guaranteeing progress toward the root (or a discontinuous sign
            // reversal)
            if (self.solve.fx1 > 0.0 && f > 0.0) || (self.solve.fx1 < 0.0 && f < 0.0) {
                self.solve.x1 = self.solve.x3;
                self.solve.fx1 = f;
            } else {
                self.solve.x2 = self.solve.x3;
                self.solve.fx2 = f;
            }
        }
        if self.solve.x2 < self.solve.x1 {
            core::mem::swap(&mut self.solve.x1, &mut self.solve.x2);
            core::mem::swap(&mut self.solve.fx1, &mut self.solve.fx2);
        }
        self.do_secant()
    }

    fn do_secant(&mut self) -> CmdResult {
        if self.solve.fx1 == self.solve.fx2 {
            return self.finish_solve(SOLVE_EXTREMUM);
        }
        if (self.solve.fx1 > 0.0 && self.solve.fx2 < 0.0)
            || (self.solve.fx1 < 0.0 && self.solve.fx2 > 0.0)
        {
            return self.do_ridders();
        }
        let slope = (self.solve.fx2 - self.solve.fx1) / (self.solve.x2 - self.solve.x1);
        if slope.is_infinite() {
            self.solve.x3 = (self.solve.x1 + self.solve.x2) / 2.0;
            if self.solve.x3 == self.solve.x1 || self.solve.x3 == self.solve.x2 {
                return self.finish_solve(SOLVE_ROOT);
            }
            return self.call_solve_fn(3, 4);
        }
        if slope == 0.0 {
            // underflow from x2 - x1 being too big; reorder the computation
            self.solve.x3 = self.solve.x1
                - self.solve.fx1 * (self.solve.x2 - self.solve.x1)
                    / (self.solve.fx2 - self.solve.fx1);
        } else {
            self.solve.x3 = self.solve.x1 - self.solve.fx1 / slope;
        }
        if self.solve.x3.is_infinite() {
            if self.solve.retry_counter != 0 {
                return self.retry_solve();
            }
            return self.finish_solve(SOLVE_EXTREMUM);
        }
        // a secant step that lands exactly on an endpoint means no improvement is possible,
        // unless the slope is so steep the step underflowed
        if self.solve.x3 == self.solve.x1 {
            if slope.abs() > 1e50 {
                self.solve.x3 = self.solve.x1 - (self.solve.x2 - self.solve.x1) / 100.0;
                return self.call_solve_fn(3, 4);
            }
            self.solve.which = 1;
            self.solve.curr_f = self.solve.fx1;
            self.solve.prev_x = self.solve.x2;
            return self.finish_solve(SOLVE_ROOT);
        }
        if self.solve.x3 == self.solve.x2 {
            if slope.abs() > 1e50 {
                self.solve.x3 = self.solve.x2 + (self.solve.x2 - self.solve.x1) / 100.0;
                return self.call_solve_fn(3, 4);
            }
            self.solve.which = 2;
            self.solve.curr_f = self.solve.fx2;
            self.solve.prev_x = self.solve.x1;
            return self.finish_solve(SOLVE_ROOT);
        }
        if self.solve.x3 < self.solve.x1 {
            // extrapolating: don't race away from the interval too quickly
            let min = self.solve.x1 - 100.0 * (self.solve.x2 - self.solve.x1);
            if self.solve.x3 < min {
                self.solve.x3 = min;
            }
        } else if self.solve.x3 > self.solve.x2 {
            let max = self.solve.x2 + 100.0 * (self.solve.x2 - self.solve.x1);
            if self.solve.x3 > max {
                self.solve.x3 = max;
            }
        } else {
            // interpolating: enforce a minimum distance from the endpoints so progress is
            // guaranteed
            let eps = (self.solve.x2 - self.solve.x1) / 10.0;
            if self.solve.x3 < self.solve.x1 + eps {
                self.solve.x3 = self.solve.x1 + eps;
            } else if self.solve.x3 > self.solve.x2 - eps {
                self.solve.x3 = self.solve.x2 - eps;
            }
        }
        self.call_solve_fn(3, 4)
    }

    /// Hit infinity suspiciously quickly: restart from the smaller original guess, or from
    /// 0 and 1 if the retry budget is spent.
    fn retry_solve(&mut self) -> CmdResult {
        if self.solve.retry_counter > 0 {
            self.solve.x1 = self.solve.retry_value;
            self.solve.x2 = self.solve.x1 * 1.000001;
            if self.solve.x2.is_infinite() {
                self.solve.x2 = self.solve.x1 * 0.999999;
            }
            if self.solve.x1 > self.solve.x2 {
                core::mem::swap(&mut self.solve.x1, &mut self.solve.x2);
            }
            self.solve.retry_counter = -10;
        } else {
            self.solve.x1 = 0.0;
            self.solve.x2 = 1.0;
            self.solve.retry_counter = 0;
        }
        self.call_solve_fn(1, 1)
    }

    fn do_bisection(&mut self) -> CmdResult {
        self.solve.x3 = (self.solve.x1 + self.solve.x2) / 2.0;
        self.call_solve_fn(3, 5)
    }

    fn do_ridders(&mut self) -> CmdResult {
        self.solve.x3 = (self.solve.x1 + self.solve.x2) / 2.0;
        // round-off can push the midpoint outside [x1, x2]; treat that as convergence
        if self.solve.x3 <= self.solve.x1 || self.solve.x3 >= self.solve.x2 {
            self.solve.which = -1;
            self.finish_solve(SOLVE_ROOT)
        } else {
            self.call_solve_fn(3, 6)
        }
    }

    /// Interactive solves redraw the current bracket a few times a second so long searches
    /// stay visibly alive.
    fn show_progress(&mut self, failure: bool) {
        let now = self.host.milliseconds();
        if now < self.solve.last_disp_time {
            // the millisecond clock wrapped
            self.solve.last_disp_time = 0;
        }
        if !self.solve.keep_running
            && self.solve.state > 1
            && now >= self.solve.last_disp_time + 250
        {
            self.solve.last_disp_time = now;
            let punct = self.punct();
            let fmt = |x: Scalar| format::format_scalar(x, self.modes.disp, punct);
            let marker = if failure {
                '?'
            } else if self.solve.curr_f > 0.0 {
                '+'
            } else {
                '-'
            };
            self.display.draw(0, &format!("{}{marker}", fmt(self.solve.curr_x)));
            self.display.draw(1, &fmt(self.solve.prev_x));
            self.display.flush(&mut self.host);
        }
    }
}
