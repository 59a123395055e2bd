use rpn42_core::{CalcError, CmdResult, Control, Ident, Scalar, Value};
use tracing::{debug, instrument};

use crate::{Core, Frame, RTN_INTEG, format, host::Host};

/// Depth of the Romberg extrapolation tableau.
const ROMB_K: usize = 5;

/// Level cap; half a million evaluations at most.
const ROMB_MAX: u32 = 20;

// INTEGRATOR STATE
// ================================================================================================

/// Romberg integration over the substitution x = (3u - u³)/2, which forces the sample points
/// away from the endpoints and lets mildly improper integrals converge.
///
/// `state` 0 is inactive, 1 is "just started", 2 is "waiting for a sample evaluation".
#[derive(Clone, Debug, Default, PartialEq)]
pub struct IntegState {
    /// Program selected by PGMINT.
    pub prgm_name: Option<Ident>,
    pub(crate) active_prgm: Option<Ident>,
    pub(crate) var_name: Option<Ident>,
    pub(crate) keep_running: bool,
    pub(crate) prev_prgm: usize,
    pub(crate) prev_pc: usize,
    pub(crate) state: u8,
    pub(crate) llim: Scalar,
    pub(crate) ulim: Scalar,
    pub(crate) acc: Scalar,
    pub(crate) a: Scalar,
    pub(crate) b: Scalar,
    pub(crate) eps: Scalar,
    pub(crate) n: u32,
    pub(crate) i: u32,
    pub(crate) k: usize,
    pub(crate) h: Scalar,
    pub(crate) sum: Scalar,
    pub(crate) c: [Scalar; ROMB_K],
    pub(crate) s: [Scalar; ROMB_K + 1],
    pub(crate) nsteps: u32,
    pub(crate) p: Scalar,
    pub(crate) t: Scalar,
    pub(crate) u: Scalar,
    pub(crate) prev_int: Scalar,
    pub(crate) prev_res: Scalar,
}

impl IntegState {
    pub fn is_active(&self) -> bool {
        self.state != 0
    }

    pub fn reset(&mut self) {
        let prgm_name = self.prgm_name.take();
        *self = IntegState { prgm_name, ..IntegState::default() };
    }
}

// DRIVING THE TARGET PROGRAM
// ================================================================================================

impl<H: Host> Core<H> {
    fn call_integ_fn(&mut self) -> CmdResult {
        let Some(prgm) = self.integ.active_prgm.clone() else {
            return Err(CalcError::Nonexistent);
        };
        let var = self.integ.var_name.clone().ok_or(CalcError::Nonexistent)?;
        self.vars.store_global(&var, Value::Real(self.integ.u));
        self.goto_global_label(&prgm)?;
        self.rtn_stack.push(Frame { prgm: RTN_INTEG, pc: 0 });
        Ok(Control::Run)
    }

    /// Begins integrating the PGMINT target over the named variable; LLIM, ULIM and ACC come
    /// from the variable store.
    #[instrument(skip(self), fields(var = %name))]
    pub fn start_integ(&mut self, name: &Ident) -> CmdResult {
        if self.integ.is_active() {
            return Err(CalcError::IntegInteg);
        }
        let limit = |core: &Self, var: &str| -> Result<Scalar, CalcError> {
            match core.vars.recall(&Ident::try_from(var).unwrap()) {
                None => Err(CalcError::Nonexistent),
                Some(Value::Real(x)) => Ok(*x),
                Some(Value::Str(_)) => Err(CalcError::AlphaDataIsInvalid),
                Some(_) => Err(CalcError::InvalidType),
            }
        };
        self.integ.llim = limit(self, "LLIM")?;
        self.integ.ulim = limit(self, "ULIM")?;
        self.integ.acc = match self.vars.recall(&Ident::try_from("ACC").unwrap()) {
            None => 0.0,
            Some(Value::Real(x)) => x.max(0.0),
            Some(Value::Str(_)) => return Err(CalcError::AlphaDataIsInvalid),
            Some(_) => return Err(CalcError::InvalidType),
        };
        self.integ.var_name = Some(name.clone());
        self.integ.active_prgm = self.integ.prgm_name.clone();
        self.integ.prev_prgm = self.prgms.current;
        self.integ.prev_pc = self.prgms.pc;

        self.integ.a = self.integ.llim;
        self.integ.b = self.integ.ulim - self.integ.llim;
        self.integ.h = 2.0;
        self.integ.prev_int = 0.0;
        self.integ.nsteps = 1;
        self.integ.n = 1;
        self.integ.state = 1;
        self.integ.s[0] = 0.0;
        self.integ.k = 1;
        self.integ.prev_res = 0.0;

        self.integ.keep_running = self.program_running;
        if !self.integ.keep_running {
            self.display.clear_row(0);
            self.display.draw(0, "Integrating");
            self.display.flush(&mut self.host);
        }
        self.return_to_integ(false, false)
    }

    fn finish_integ(&mut self) -> CmdResult {
        self.integ.state = 0;

        let result = self.integ.sum * self.integ.b * 0.75;
        let x = Value::Real(result);
        let y = Value::Real(self.integ.eps);
        // the integrator's own result is never trace-printed
        let lift_disable = self.flags.get(crate::flags::FLAG_STACK_LIFT_DISABLE);
        self.stack.recall_two_results(x, y, lift_disable)?;

        self.prgms.current = self.integ.prev_prgm;
        self.prgms.pc = self.integ.prev_pc;
        debug!(result, eps = self.integ.eps, "integration finished");

        if !self.integ.keep_running {
            let text = format!(
                "\u{222b}={}",
                format::format_scalar(result, self.modes.disp, self.punct())
            );
            self.display.clear_row(0);
            self.display.draw(0, &text);
            self.display.flush(&mut self.host);
            Ok(Control::Stop)
        } else {
            Ok(Control::None)
        }
    }

    // RE-ENTRY
    // --------------------------------------------------------------------------------------------

    /// Consumes one sample evaluation from X and advances the Romberg loop.
    pub fn return_to_integ(&mut self, failure: bool, stop: bool) -> CmdResult {
        if stop {
            self.integ.keep_running = false;
        }
        match self.integ.state {
            1 => {
                self.integ.state = 2;
                self.level_start();
                self.next_sample()
            },
            2 => {
                if !failure {
                    if let Ok(Value::Real(fx)) = self.stack.x() {
                        self.integ.sum += self.integ.t * fx;
                    }
                }
                self.integ.p += self.integ.h;
                self.integ.i += 1;
                if self.integ.i < self.integ.nsteps {
                    return self.next_sample();
                }

                // level complete: fold into the moving trapezoid average
                self.integ.prev_int =
                    (self.integ.prev_int + self.integ.sum * self.integ.h) / 2.0;
                self.integ.s[self.integ.k] = self.integ.prev_int;
                self.integ.k += 1;

                if self.integ.n >= ROMB_K as u32 - 1 {
                    let mut ns = ROMB_K - 1;
                    let mut dm = 1.0;
                    self.integ.c = self.integ.s[..ROMB_K].try_into().expect("tableau width");
                    self.integ.sum = self.integ.s[ns];
                    for _ in 1..ROMB_K {
                        dm /= 4.0;
                        for i in 0..ns {
                            self.integ.c[i] =
                                (self.integ.c[i + 1] - self.integ.c[i] * dm * 4.0) / (1.0 - dm);
                        }
                        ns -= 1;
                        self.integ.sum += self.integ.c[ns] * dm;
                    }

                    let res = self.integ.sum * self.integ.b * 0.75;
                    self.integ.eps = (self.integ.prev_res - res).abs();
                    self.integ.prev_res = res;
                    if self.integ.eps <= self.integ.acc * res.abs() {
                        return self.finish_integ();
                    }

                    for i in 0..ROMB_K - 1 {
                        self.integ.s[i] = self.integ.s[i + 1];
                    }
                    self.integ.k = ROMB_K - 1;
                }

                self.integ.nsteps <<= 1;
                self.integ.h /= 2.0;

                self.integ.n += 1;
                if self.integ.n >= ROMB_MAX {
                    return self.finish_integ();
                }
                self.level_start();
                self.next_sample()
            },
            _ => Err(CalcError::InternalError),
        }
    }

    // LOOP PIECES
    // --------------------------------------------------------------------------------------------

    fn level_start(&mut self) {
        self.integ.p = self.integ.h / 2.0 - 1.0;
        self.integ.sum = 0.0;
        self.integ.i = 0;
    }

    /// Computes the next non-uniform sample point and dispatches the target program at it.
    fn next_sample(&mut self) -> CmdResult {
        let p = self.integ.p;
        self.integ.t = 1.0 - p * p;
        let mut u = p + self.integ.t * p / 2.0;
        u = (u * self.integ.b + self.integ.b) / 2.0 + self.integ.a;
        self.integ.u = u;
        self.call_integ_fn()
    }
}
