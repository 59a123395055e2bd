use rpn42_core::{Arg, CalcError, CmdResult, Control, Scalar, Value};

use crate::{Core, Frame, RTN_HALT, commands::storage, host::Host};

// BRANCHING
// ================================================================================================

pub fn gto<H: Host>(core: &mut Core<H>, arg: &Arg) -> CmdResult {
    match core.resolve_ind_arg(arg)? {
        Arg::Num(n) => {
            let pc = core.prgms.find_local_label(n)?;
            core.prgms.pc = pc;
        },
        Arg::Str(name) => core.goto_global_label(&name)?,
        _ => return Err(CalcError::InvalidType),
    }
    Ok(Control::None)
}

/// XEQ pushes a return frame and starts execution at the target label. Keyed from idle it
/// seeds the return stack with a halt sentinel so the final RTN stops cleanly.
pub fn xeq<H: Host>(core: &mut Core<H>, arg: &Arg) -> CmdResult {
    // resolve the destination before touching any state, so a bad label aborts cleanly
    let (prgm, pc) = match core.resolve_ind_arg(arg)? {
        Arg::Num(n) => (core.prgms.current, core.prgms.find_local_label(n)?),
        Arg::Str(name) => core.prgms.find_global_label(&name)?,
        _ => return Err(CalcError::InvalidType),
    };
    if core.program_running {
        core.rtn_stack.push(Frame { prgm: core.prgms.current as i32, pc: core.prgms.pc });
    } else {
        core.rtn_stack.clear();
        core.rtn_stack.push(Frame { prgm: RTN_HALT, pc: 0 });
    }
    core.prgms.current = prgm;
    core.prgms.pc = pc;
    Ok(Control::Run)
}

pub fn rtn<H: Host>(core: &mut Core<H>) -> CmdResult {
    core.pop_return()
}

/// END behaves as a return; a program that falls off its end stops.
pub fn end<H: Host>(core: &mut Core<H>) -> CmdResult {
    core.pop_return()
}

/// R/S: stop a running program, start a stopped one at the current pointer.
pub fn run_stop<H: Host>(core: &mut Core<H>) -> CmdResult {
    if core.program_running {
        Ok(Control::Stop)
    } else {
        Ok(Control::Run)
    }
}

/// PSE yields for about a second; timeout3 resumes the program.
pub fn pse<H: Host>(core: &mut Core<H>) -> CmdResult {
    if core.program_running {
        core.pause = true;
        core.host.request_timeout3(1000);
        Ok(Control::Interruptible)
    } else {
        core.host.delay(1000);
        Ok(Control::None)
    }
}

// LOOP COUNTERS
// ================================================================================================

/// Splits an `iiiii.fffcc` loop counter into (int part, target, step).
fn split_counter(x: Scalar) -> (i64, i64, i64) {
    let i = x.trunc() as i64;
    let frac_digits = ((x.abs().fract() * 100_000.0) + 0.5).floor() as i64;
    let target = frac_digits / 100;
    let step = match frac_digits % 100 {
        0 => 1,
        s => s,
    };
    (i, target, step)
}

fn counter_value(i: i64, x_before: Scalar) -> Scalar {
    let frac = x_before.abs().fract();
    let mag = i.abs() as Scalar + frac;
    let neg = if i != 0 { i < 0 } else { x_before.is_sign_negative() };
    if neg { -mag } else { mag }
}

fn loop_helper<H: Host>(core: &mut Core<H>, arg: &Arg, increment: bool) -> CmdResult {
    let v = storage::read_arg_value(core, arg)?;
    let x = match v {
        Value::Real(x) => x,
        Value::Str(_) => return Err(CalcError::AlphaDataIsInvalid),
        _ => return Err(CalcError::InvalidType),
    };
    let (i, target, step) = split_counter(x);
    let new_i = if increment { i + step } else { i - step };
    storage::write_arg_value(core, arg, Value::Real(counter_value(new_i, x)))?;
    let done = if increment { new_i > target } else { new_i <= target };
    Ok(if done { Control::No } else { Control::Yes })
}

pub fn isg<H: Host>(core: &mut Core<H>, arg: &Arg) -> CmdResult {
    loop_helper(core, arg, true)
}

pub fn dse<H: Host>(core: &mut Core<H>, arg: &Arg) -> CmdResult {
    loop_helper(core, arg, false)
}

// NUMBER LINES
// ================================================================================================

/// A numeric literal program line recalls its value with the usual lift discipline.
pub fn number<H: Host>(core: &mut Core<H>, arg: &Arg) -> CmdResult {
    let Arg::Literal(x) = arg else {
        return Err(CalcError::InternalError);
    };
    core.recall_result_silently(Value::Real(*x))?;
    Ok(Control::None)
}

// SOLVER AND INTEGRATOR ENTRY
// ================================================================================================

pub fn varmenu<H: Host>(core: &mut Core<H>, arg: &Arg) -> CmdResult {
    let name = core.arg_to_ident(arg)?;
    let (prgm, pc) = core.prgms.find_global_label(&name)?;
    let vars = core.prgms.menu_vars(prgm, pc)?;
    if vars.is_empty() {
        return Err(CalcError::NoMenuVariables);
    }
    for var in &vars {
        if core.vars.recall(var).is_none() {
            core.vars.store_global(var, Value::Real(0.0));
        }
    }
    Ok(Control::None)
}

/// PGMSLV names the program the solver will drive.
pub fn pgm_slv<H: Host>(core: &mut Core<H>, arg: &Arg) -> CmdResult {
    let name = core.arg_to_ident(arg)?;
    core.prgms.find_global_label(&name)?;
    core.solve.prgm_name = Some(name);
    Ok(Control::None)
}

/// PGMINT names the program the integrator will drive.
pub fn pgm_int<H: Host>(core: &mut Core<H>, arg: &Arg) -> CmdResult {
    let name = core.arg_to_ident(arg)?;
    core.prgms.find_global_label(&name)?;
    core.integ.prgm_name = Some(name);
    Ok(Control::None)
}

/// SOLVE "X": solve the named program for variable X, seeded with the variable's current
/// value and its shadow (the previous input).
pub fn solve<H: Host>(core: &mut Core<H>, arg: &Arg) -> CmdResult {
    let name = core.arg_to_ident(arg)?;
    let x1 = match core.vars.recall(&name) {
        Some(Value::Real(x)) => *x,
        _ => 0.0,
    };
    let x2 = core.solve.get_shadow(&name).unwrap_or(x1);
    core.start_solve(&name, x1, x2)
}

pub fn integ<H: Host>(core: &mut Core<H>, arg: &Arg) -> CmdResult {
    let name = core.arg_to_ident(arg)?;
    core.start_integ(&name)
}

// PROGRAM CLEARING
// ================================================================================================

pub fn clp<H: Host>(core: &mut Core<H>, arg: &Arg) -> CmdResult {
    let name = core.arg_to_ident(arg)?;
    core.prgms.clear_prgm(&name)?;
    Ok(Control::None)
}
