use rpn42_core::{Arg, CalcError, CmdResult, Control, ScalarOps};

use crate::{Core, host::Host, modes::DispFormat};

// DISPLAY FORMAT
// ================================================================================================

fn digits<H: Host>(core: &Core<H>, arg: &Arg) -> Result<u8, CalcError> {
    let n = core.arg_to_num(arg)?;
    if n > 11 {
        return Err(CalcError::InvalidData);
    }
    Ok(n as u8)
}

pub fn fix<H: Host>(core: &mut Core<H>, arg: &Arg) -> CmdResult {
    core.modes.disp = DispFormat::Fix(digits(core, arg)?);
    Ok(Control::None)
}

pub fn sci<H: Host>(core: &mut Core<H>, arg: &Arg) -> CmdResult {
    core.modes.disp = DispFormat::Sci(digits(core, arg)?);
    Ok(Control::None)
}

pub fn eng<H: Host>(core: &mut Core<H>, arg: &Arg) -> CmdResult {
    core.modes.disp = DispFormat::Eng(digits(core, arg)?);
    Ok(Control::None)
}

pub fn all<H: Host>(core: &mut Core<H>) -> CmdResult {
    core.modes.disp = DispFormat::All;
    Ok(Control::None)
}

// ANGLE AND COMPLEX MODES
// ================================================================================================

pub fn deg<H: Host>(core: &mut Core<H>) -> CmdResult {
    core.modes.angle = rpn42_core::AngleMode::Degrees;
    core.update_annunciators();
    Ok(Control::None)
}

pub fn rad<H: Host>(core: &mut Core<H>) -> CmdResult {
    core.modes.angle = rpn42_core::AngleMode::Radians;
    core.update_annunciators();
    Ok(Control::None)
}

pub fn grad<H: Host>(core: &mut Core<H>) -> CmdResult {
    core.modes.angle = rpn42_core::AngleMode::Gradians;
    core.update_annunciators();
    Ok(Control::None)
}

pub fn polar<H: Host>(core: &mut Core<H>) -> CmdResult {
    core.modes.polar = true;
    Ok(Control::None)
}

pub fn rect<H: Host>(core: &mut Core<H>) -> CmdResult {
    core.modes.polar = false;
    Ok(Control::None)
}

// INTEGER BASE
// ================================================================================================

pub fn binm<H: Host>(core: &mut Core<H>) -> CmdResult {
    core.modes.set_base(2);
    Ok(Control::None)
}

pub fn octm<H: Host>(core: &mut Core<H>) -> CmdResult {
    core.modes.set_base(8);
    Ok(Control::None)
}

pub fn decm<H: Host>(core: &mut Core<H>) -> CmdResult {
    core.modes.set_base(10);
    Ok(Control::None)
}

pub fn hexm<H: Host>(core: &mut Core<H>) -> CmdResult {
    core.modes.set_base(16);
    Ok(Control::None)
}

/// WSIZE sets the word size from X (1..=64); the value is consumed.
pub fn wsize<H: Host>(core: &mut Core<H>) -> CmdResult {
    let x = core.stack.x()?.as_real().ok_or(CalcError::InvalidType)?;
    let w = x.abs().to_i32_sat();
    if !(1..=64).contains(&w) {
        return Err(CalcError::InvalidData);
    }
    core.modes.wsize = w as u32;
    core.stack.unary_no_result()?;
    Ok(Control::None)
}

pub fn bsigned<H: Host>(core: &mut Core<H>) -> CmdResult {
    core.modes.base_signed = !core.modes.base_signed;
    Ok(Control::None)
}

pub fn bwrap<H: Host>(core: &mut Core<H>) -> CmdResult {
    core.modes.base_wrap = !core.modes.base_wrap;
    Ok(Control::None)
}

// STACK DISCIPLINE
// ================================================================================================

pub fn four_stk<H: Host>(core: &mut Core<H>) -> CmdResult {
    core.stack.make_classic();
    core.modes.big_stack = false;
    Ok(Control::None)
}

pub fn n_stk<H: Host>(core: &mut Core<H>) -> CmdResult {
    if !core.settings.allow_big_stack {
        return Err(CalcError::RestrictedOperation);
    }
    core.stack.make_big();
    core.modes.big_stack = true;
    Ok(Control::None)
}
