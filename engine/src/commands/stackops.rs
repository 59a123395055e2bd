use core::f64::consts::PI;

use rpn42_core::{
    CalcError, CmdResult, ComplexMatrix, Control, RealMatrix, Scalar, Value,
    scalar::{angle_to_rad, rad_to_angle},
};

use crate::{Core, flags::FLAG_STACK_LIFT_DISABLE, host::Host};

// CLEARING AND LIFTING
// ================================================================================================

/// CLX clears X (classic) or drops it (big stack) and disables stack lift, so the next number
/// overwrites.
pub fn clx<H: Host>(core: &mut Core<H>) -> CmdResult {
    if core.stack.is_big() {
        core.stack.drop_x();
    } else {
        core.stack.overwrite_x(Value::Real(0.0));
    }
    core.flags.set(FLAG_STACK_LIFT_DISABLE, true);
    core.mode_disable_stack_lift = true;
    Ok(Control::None)
}

/// ENTER duplicates X with an unconditional lift and disables stack lift.
pub fn enter<H: Host>(core: &mut Core<H>) -> CmdResult {
    let v = core.stack.x().cloned().unwrap_or_default();
    core.stack.recall_result(v, false)?;
    core.flags.set(FLAG_STACK_LIFT_DISABLE, true);
    core.mode_disable_stack_lift = true;
    Ok(Control::None)
}

pub fn swap<H: Host>(core: &mut Core<H>) -> CmdResult {
    core.stack.swap_xy()?;
    core.print_trace();
    Ok(Control::None)
}

pub fn rdn<H: Host>(core: &mut Core<H>) -> CmdResult {
    core.stack.roll_down();
    core.print_trace();
    Ok(Control::None)
}

pub fn rup<H: Host>(core: &mut Core<H>) -> CmdResult {
    core.stack.roll_up();
    core.print_trace();
    Ok(Control::None)
}

pub fn lastx<H: Host>(core: &mut Core<H>) -> CmdResult {
    let v = core.stack.lastx().clone();
    core.recall_result(v)?;
    Ok(Control::None)
}

pub fn clst<H: Host>(core: &mut Core<H>) -> CmdResult {
    core.stack.clear();
    Ok(Control::None)
}

pub fn pi<H: Host>(core: &mut Core<H>) -> CmdResult {
    core.recall_result(Value::Real(PI))?;
    Ok(Control::None)
}

// COMPLEX COMPOSITION
// ================================================================================================

/// COMPLEX is its own inverse: Y and X combine into a complex (or complex matrix), a complex
/// splits back into Y and X. In polar display mode the pair is (r, θ).
pub fn complex<H: Host>(core: &mut Core<H>) -> CmdResult {
    match core.stack.x()? {
        Value::Real(_) | Value::RealMatrix(_) => {
            core.stack.require(2)?;
            let x = core.stack.x()?.clone();
            let y = core.stack.peek(1)?.clone();
            let combined = combine(core, y, x)?;
            core.binary_result(combined)?;
        },
        Value::Complex { re, im } => {
            let (y, x) = if core.modes.polar {
                let r = re.hypot(*im);
                let theta = rad_to_angle(im.atan2(*re), core.modes.angle);
                (Value::Real(r), Value::Real(theta))
            } else {
                (Value::Real(*re), Value::Real(*im))
            };
            core.unary_two_results(x, y)?;
        },
        Value::ComplexMatrix(m) => {
            let m = m.clone();
            let size = m.size();
            let mut re_cells = Vec::with_capacity(size);
            let mut im_cells = Vec::with_capacity(size);
            for i in 0..size {
                let (re, im) = m.get(i);
                re_cells.push(rpn42_core::Cell::Num(re));
                im_cells.push(rpn42_core::Cell::Num(im));
            }
            let re_m = RealMatrix::from_cells(m.rows(), m.cols(), re_cells)?;
            let im_m = RealMatrix::from_cells(m.rows(), m.cols(), im_cells)?;
            core.unary_two_results(Value::RealMatrix(im_m), Value::RealMatrix(re_m))?;
        },
        _ => return Err(CalcError::InvalidType),
    }
    Ok(Control::None)
}

fn combine<H: Host>(core: &Core<H>, y: Value, x: Value) -> Result<Value, CalcError> {
    match (y, x) {
        (Value::Real(a), Value::Real(b)) => {
            if core.modes.polar {
                let rad = angle_to_rad(b, core.modes.angle);
                Ok(Value::complex(a * rad.cos(), a * rad.sin()))
            } else {
                Ok(Value::Complex { re: a, im: b })
            }
        },
        (Value::RealMatrix(my), Value::RealMatrix(mx)) => {
            if my.rows() != mx.rows() || my.cols() != mx.cols() {
                return Err(CalcError::DimensionError);
            }
            let mut parts = Vec::with_capacity(my.size() * 2);
            for (re, im) in my.cells().iter().zip(mx.cells()) {
                let re = re.as_num().ok_or(CalcError::AlphaDataIsInvalid)?;
                let im = im.as_num().ok_or(CalcError::AlphaDataIsInvalid)?;
                parts.push(re);
                parts.push(im);
            }
            Ok(Value::ComplexMatrix(ComplexMatrix::from_parts(my.rows(), my.cols(), parts)?))
        },
        _ => Err(CalcError::InvalidType),
    }
}

// POLAR / RECTANGULAR
// ================================================================================================

fn r2p<H: Host>(core: &Core<H>, x: Scalar, y: Scalar) -> Result<(Scalar, Scalar), CalcError> {
    let r = core.check_range(x.hypot(y))?;
    let phi = rad_to_angle(y.atan2(x), core.modes.angle);
    Ok((r, phi))
}

fn p2r<H: Host>(core: &Core<H>, r: Scalar, phi: Scalar) -> Result<(Scalar, Scalar), CalcError> {
    let rad = angle_to_rad(phi, core.modes.angle);
    let x = core.check_range(r * rad.cos())?;
    let y = core.check_range(r * rad.sin())?;
    Ok((x, y))
}

/// →POL: rectangular X, Y to polar r in X, θ in Y; a complex in X converts componentwise.
pub fn to_pol<H: Host>(core: &mut Core<H>) -> CmdResult {
    match core.stack.x()? {
        Value::Real(x) => {
            core.stack.require(2)?;
            let x = *x;
            let y = core.stack.peek(1)?.as_real().ok_or(CalcError::InvalidType)?;
            let (r, phi) = r2p(core, x, y)?;
            core.binary_two_results(Value::Real(r), Value::Real(phi))?;
        },
        Value::Complex { re, im } => {
            let (r, phi) = r2p(core, *re, *im)?;
            core.unary_result(Value::Complex { re: r, im: phi })?;
        },
        _ => return Err(CalcError::InvalidType),
    }
    Ok(Control::None)
}

/// →REC: polar r in X, θ in Y to rectangular x in X, y in Y.
pub fn to_rec<H: Host>(core: &mut Core<H>) -> CmdResult {
    match core.stack.x()? {
        Value::Real(r) => {
            core.stack.require(2)?;
            let r = *r;
            let phi = core.stack.peek(1)?.as_real().ok_or(CalcError::InvalidType)?;
            let (x, y) = p2r(core, r, phi)?;
            core.binary_two_results(Value::Real(x), Value::Real(y))?;
        },
        Value::Complex { re, im } => {
            let (x, y) = p2r(core, *re, *im)?;
            core.unary_result(Value::Complex { re: x, im: y })?;
        },
        _ => return Err(CalcError::InvalidType),
    }
    Ok(Control::None)
}
