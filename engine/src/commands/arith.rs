use rpn42_core::{
    CalcError, CmdResult, Control, NumPolicy, Scalar, StrCellPolicy, Value, arith, cmath,
    scalar::{AngleMode, cos_deg, cos_grad, rad_to_angle, sin_deg, sin_grad, tan_in_mode},
};

use crate::{Core, host::Host, modes::DispFormat};

// BINARY ARITHMETIC
// ================================================================================================

fn binary_op<H: Host>(
    core: &mut Core<H>,
    f: fn(&Value, &Value, NumPolicy) -> Result<Value, CalcError>,
) -> CmdResult {
    core.stack.require(2)?;
    let x = core.stack.x()?.clone();
    let y = core.stack.peek(1)?.clone();
    let res = f(&y, &x, core.num_policy())?;
    core.binary_result(res)?;
    Ok(Control::None)
}

pub fn add<H: Host>(core: &mut Core<H>) -> CmdResult {
    binary_op(core, arith::add)
}

pub fn sub<H: Host>(core: &mut Core<H>) -> CmdResult {
    binary_op(core, arith::sub)
}

pub fn mul<H: Host>(core: &mut Core<H>) -> CmdResult {
    binary_op(core, arith::mul)
}

pub fn div<H: Host>(core: &mut Core<H>) -> CmdResult {
    binary_op(core, arith::div)
}

pub fn y_pow_x<H: Host>(core: &mut Core<H>) -> CmdResult {
    core.stack.require(2)?;
    let p = core.num_policy();
    let x = core.stack.x()?.clone();
    let y = core.stack.peek(1)?.clone();
    let res = match (&y, &x) {
        (Value::Real(a), Value::Real(b)) => Value::Real(arith::pow_real(*a, *b, p)?),
        (Value::Real(_) | Value::Complex { .. }, Value::Real(_) | Value::Complex { .. }) => {
            let (are, aim) = complex_parts(&y);
            let (bre, bim) = complex_parts(&x);
            let (re, im) = arith::pow_complex(are, aim, bre, bim, p)?;
            collapse(re, im)
        },
        (Value::Str(_), _) | (_, Value::Str(_)) => return Err(CalcError::AlphaDataIsInvalid),
        _ => return Err(CalcError::InvalidType),
    };
    core.binary_result(res)?;
    Ok(Control::None)
}

fn complex_parts(v: &Value) -> (Scalar, Scalar) {
    match v {
        Value::Real(x) => (*x, 0.0),
        Value::Complex { re, im } => (*re, *im),
        _ => unreachable!("callers filter to scalars"),
    }
}

fn collapse(re: Scalar, im: Scalar) -> Value {
    if im == 0.0 { Value::Real(re) } else { Value::Complex { re, im } }
}

// MAPPED UNARY FUNCTIONS
// ================================================================================================

type RealFn = dyn Fn(Scalar) -> Result<Scalar, CalcError>;
type CplxFn = dyn Fn(Scalar, Scalar) -> Result<(Scalar, Scalar), CalcError>;

fn map1<H: Host>(core: &mut Core<H>, fr: &RealFn, fc: &CplxFn) -> CmdResult {
    let v = core.stack.x()?.clone();
    let res = arith::map_unary(&v, fr, fc, StrCellPolicy::Reject)?;
    core.unary_result(res)?;
    Ok(Control::None)
}

pub fn chs<H: Host>(core: &mut Core<H>) -> CmdResult {
    let v = core.stack.x()?.clone();
    // sign flips propagate over string cells in matrices
    let res = arith::map_unary(&v, &|x| Ok(-x), &|re, im| Ok((-re, -im)), StrCellPolicy::Propagate)?;
    core.unary_result(res)?;
    Ok(Control::None)
}

pub fn inv<H: Host>(core: &mut Core<H>) -> CmdResult {
    let p = core.num_policy();
    // a matrix in X inverts via the linear solver
    if core.stack.x()?.is_matrix() {
        let x = core.stack.x()?.clone();
        let res = arith::div(&Value::Real(1.0), &x, p)?;
        core.unary_result(res)?;
        return Ok(Control::None);
    }
    map1(
        core,
        &move |x| {
            if x == 0.0 {
                return Err(CalcError::DivideBy0);
            }
            p.check(1.0 / x)
        },
        &move |re, im| {
            let (re, im) = cmath::inv(re, im)?;
            p.check_complex(re, im)
        },
    )
}

pub fn sqrt<H: Host>(core: &mut Core<H>) -> CmdResult {
    map1(
        core,
        &|x| {
            if x < 0.0 {
                return Err(CalcError::InvalidData);
            }
            Ok(x.sqrt())
        },
        &|re, im| Ok(cmath::sqrt(re, im)),
    )
}

pub fn square<H: Host>(core: &mut Core<H>) -> CmdResult {
    let p = core.num_policy();
    map1(core, &move |x| p.check(x * x), &move |re, im| {
        p.check_complex(re * re - im * im, 2.0 * re * im)
    })
}

pub fn ln<H: Host>(core: &mut Core<H>) -> CmdResult {
    map1(
        core,
        &|x| {
            if x <= 0.0 {
                return Err(CalcError::InvalidData);
            }
            Ok(x.ln())
        },
        &|re, im| cmath::ln(re, im),
    )
}

pub fn log<H: Host>(core: &mut Core<H>) -> CmdResult {
    let ln10 = core::f64::consts::LN_10;
    map1(
        core,
        &move |x| {
            if x <= 0.0 {
                return Err(CalcError::InvalidData);
            }
            Ok(x.log10())
        },
        &move |re, im| {
            let (re, im) = cmath::ln(re, im)?;
            Ok((re / ln10, im / ln10))
        },
    )
}

pub fn e_pow_x<H: Host>(core: &mut Core<H>) -> CmdResult {
    let p = core.num_policy();
    map1(core, &move |x| p.check(x.exp()), &move |re, im| {
        let (re, im) = cmath::exp(re, im);
        p.check_complex(re, im)
    })
}

pub fn ten_pow_x<H: Host>(core: &mut Core<H>) -> CmdResult {
    let p = core.num_policy();
    let ln10 = core::f64::consts::LN_10;
    map1(core, &move |x| p.check(10f64.powf(x)), &move |re, im| {
        let (re, im) = cmath::exp(re * ln10, im * ln10);
        p.check_complex(re, im)
    })
}

pub fn e_pow_x_m1<H: Host>(core: &mut Core<H>) -> CmdResult {
    let p = core.num_policy();
    map1(core, &move |x| p.check(x.exp_m1()), &move |re, im| {
        let (ere, eim) = cmath::exp(re, im);
        p.check_complex(ere - 1.0, eim)
    })
}

pub fn ln1p<H: Host>(core: &mut Core<H>) -> CmdResult {
    map1(
        core,
        &|x| {
            if x <= -1.0 {
                return Err(CalcError::InvalidData);
            }
            Ok(x.ln_1p())
        },
        &|re, im| cmath::ln(re + 1.0, im),
    )
}

// TRIGONOMETRY
// ================================================================================================

pub fn sin<H: Host>(core: &mut Core<H>) -> CmdResult {
    let mode = core.modes.angle;
    map1(
        core,
        &move |x| {
            Ok(match mode {
                AngleMode::Radians => x.sin(),
                AngleMode::Degrees => sin_deg(x),
                AngleMode::Gradians => sin_grad(x),
            })
        },
        // complex arguments are always radian
        &|re, im| Ok((re.sin() * im.cosh(), re.cos() * im.sinh())),
    )
}

pub fn cos<H: Host>(core: &mut Core<H>) -> CmdResult {
    let mode = core.modes.angle;
    map1(
        core,
        &move |x| {
            Ok(match mode {
                AngleMode::Radians => x.cos(),
                AngleMode::Degrees => cos_deg(x),
                AngleMode::Gradians => cos_grad(x),
            })
        },
        &|re, im| Ok((re.cos() * im.cosh(), -(re.sin() * im.sinh()))),
    )
}

pub fn tan<H: Host>(core: &mut Core<H>) -> CmdResult {
    let mode = core.modes.angle;
    let p = core.num_policy();
    map1(
        core,
        &move |x| match tan_in_mode(x, mode) {
            Some(y) => Ok(y),
            None if p.range_error_ignore => Ok(rpn42_core::POS_HUGE),
            None => Err(CalcError::OutOfRange),
        },
        &|re, im| {
            let d = (2.0 * re).cos() + (2.0 * im).cosh();
            if d == 0.0 {
                return Err(CalcError::OutOfRange);
            }
            Ok(((2.0 * re).sin() / d, (2.0 * im).sinh() / d))
        },
    )
}

pub fn asin<H: Host>(core: &mut Core<H>) -> CmdResult {
    let mode = core.modes.angle;
    map1(
        core,
        &move |x| {
            if !(-1.0..=1.0).contains(&x) {
                return Err(CalcError::InvalidData);
            }
            Ok(rad_to_angle(x.asin(), mode))
        },
        // asin(z) = -i asinh(iz)
        &|re, im| {
            let (hre, him) = cmath::asinh(-im, re);
            Ok((him, -hre))
        },
    )
}

pub fn acos<H: Host>(core: &mut Core<H>) -> CmdResult {
    let mode = core.modes.angle;
    map1(
        core,
        &move |x| {
            if !(-1.0..=1.0).contains(&x) {
                return Err(CalcError::InvalidData);
            }
            Ok(rad_to_angle(x.acos(), mode))
        },
        // acos(z) = pi/2 - asin(z)
        &|re, im| {
            let (hre, him) = cmath::asinh(-im, re);
            Ok((core::f64::consts::FRAC_PI_2 - him, hre))
        },
    )
}

pub fn atan<H: Host>(core: &mut Core<H>) -> CmdResult {
    let mode = core.modes.angle;
    map1(
        core,
        &move |x| Ok(rad_to_angle(x.atan(), mode)),
        // atan(z) = -i atanh(iz)
        &|re, im| {
            let (hre, him) = cmath::atanh(-im, re)?;
            Ok((him, -hre))
        },
    )
}

// HYPERBOLICS
// ================================================================================================

pub fn sinh<H: Host>(core: &mut Core<H>) -> CmdResult {
    let p = core.num_policy();
    map1(core, &move |x| p.check(x.sinh()), &move |re, im| {
        p.check_complex(re.sinh() * im.cos(), re.cosh() * im.sin())
    })
}

pub fn cosh<H: Host>(core: &mut Core<H>) -> CmdResult {
    let p = core.num_policy();
    map1(core, &move |x| p.check(x.cosh()), &move |re, im| {
        p.check_complex(re.cosh() * im.cos(), re.sinh() * im.sin())
    })
}

pub fn tanh<H: Host>(core: &mut Core<H>) -> CmdResult {
    map1(core, &|x| Ok(x.tanh()), &|re, im| {
        let d = (2.0 * re).cosh() + (2.0 * im).cos();
        if d == 0.0 {
            return Err(CalcError::OutOfRange);
        }
        Ok(((2.0 * re).sinh() / d, (2.0 * im).sin() / d))
    })
}

pub fn asinh<H: Host>(core: &mut Core<H>) -> CmdResult {
    map1(core, &|x| Ok(x.asinh()), &|re, im| Ok(cmath::asinh(re, im)))
}

pub fn acosh<H: Host>(core: &mut Core<H>) -> CmdResult {
    map1(
        core,
        &|x| {
            if x < 1.0 {
                return Err(CalcError::InvalidData);
            }
            Ok(x.acosh())
        },
        &|re, im| Ok(cmath::acosh(re, im)),
    )
}

pub fn atanh<H: Host>(core: &mut Core<H>) -> CmdResult {
    map1(
        core,
        &|x| {
            if x <= -1.0 || x >= 1.0 {
                return Err(CalcError::InvalidData);
            }
            Ok(x.atanh())
        },
        &|re, im| cmath::atanh(re, im),
    )
}

// SIGN-FAMILY AND ROUNDING
// ================================================================================================

pub fn abs<H: Host>(core: &mut Core<H>) -> CmdResult {
    let res = match core.stack.x()? {
        Value::Real(x) => Value::Real(x.abs()),
        Value::Complex { re, im } => Value::Real(core.check_range(re.hypot(*im))?),
        Value::RealMatrix(_) => {
            let v = core.stack.x()?.clone();
            arith::map_unary(&v, &|x| Ok(x.abs()), &|_, _| Err(CalcError::InternalError),
                StrCellPolicy::Reject)?
        },
        Value::ComplexMatrix(m) => {
            let p = core.num_policy();
            let cells = (0..m.size())
                .map(|i| {
                    let (re, im) = m.get(i);
                    p.check(re.hypot(im)).map(rpn42_core::Cell::Num)
                })
                .collect::<Result<_, _>>()?;
            Value::RealMatrix(rpn42_core::RealMatrix::from_cells(m.rows(), m.cols(), cells)?)
        },
        _ => return Err(CalcError::InvalidType),
    };
    core.unary_result(res)?;
    Ok(Control::None)
}

/// SIGN: ±1/0 for reals, the unit vector for complex, and 0 for strings (HP-41C
/// compatibility).
pub fn sign<H: Host>(core: &mut Core<H>) -> CmdResult {
    fn real_sign(x: Scalar) -> Scalar {
        if x == 0.0 {
            0.0
        } else if x > 0.0 {
            1.0
        } else {
            -1.0
        }
    }

    let res = match core.stack.x()? {
        Value::Real(x) => Value::Real(real_sign(*x)),
        Value::Str(_) => Value::Real(0.0),
        Value::Complex { re, im } => {
            let h = re.hypot(*im);
            if h == 0.0 {
                Value::Complex { re: 0.0, im: 0.0 }
            } else {
                Value::Complex { re: re / h, im: im / h }
            }
        },
        Value::RealMatrix(m) => {
            let cells = m
                .cells()
                .iter()
                .map(|c| match c {
                    rpn42_core::Cell::Num(x) => rpn42_core::Cell::Num(real_sign(*x)),
                    rpn42_core::Cell::Str(_) => rpn42_core::Cell::Num(0.0),
                })
                .collect();
            Value::RealMatrix(rpn42_core::RealMatrix::from_cells(m.rows(), m.cols(), cells)?)
        },
        _ => return Err(CalcError::InvalidType),
    };
    core.unary_result(res)?;
    Ok(Control::None)
}

/// RND rounds to the current display precision.
pub fn rnd<H: Host>(core: &mut Core<H>) -> CmdResult {
    let disp = core.modes.disp;
    let round = move |x: Scalar| -> Result<Scalar, CalcError> {
        Ok(match disp {
            DispFormat::Fix(d) => {
                let scale = 10f64.powi(d as i32);
                let r = (x * scale).round() / scale;
                if r.is_finite() { r } else { x }
            },
            DispFormat::Sci(d) | DispFormat::Eng(d) => round_sig(x, d as i32 + 1),
            DispFormat::All => x,
        })
    };
    map1(core, &round, &move |re, im| Ok((round(re)?, round(im)?)))
}

fn round_sig(x: Scalar, sig: i32) -> Scalar {
    if x == 0.0 || !x.is_finite() {
        return x;
    }
    let mag = x.abs().log10().floor() as i32;
    let scale = 10f64.powi(sig - 1 - mag);
    let r = (x * scale).round() / scale;
    if r.is_finite() { r } else { x }
}

pub fn ip<H: Host>(core: &mut Core<H>) -> CmdResult {
    map1(core, &|x| Ok(x.trunc()), &|_, _| Err(CalcError::InvalidType))
}

pub fn fp<H: Host>(core: &mut Core<H>) -> CmdResult {
    map1(core, &|x| Ok(x.fract()), &|_, _| Err(CalcError::InvalidType))
}

// PERCENTAGES AND MOD
// ================================================================================================

/// MOD: y mod x with the sign of the divisor; y mod 0 = y.
pub fn modulo<H: Host>(core: &mut Core<H>) -> CmdResult {
    core.stack.require(2)?;
    let x = core.stack.x()?.as_real().ok_or(CalcError::InvalidType)?;
    let y = core.stack.peek(1)?.as_real().ok_or(CalcError::InvalidType)?;
    let res = if x == 0.0 {
        y
    } else {
        let r = y % x;
        if r != 0.0 && (r < 0.0) != (x < 0.0) { r + x } else { r }
    };
    core.binary_result(Value::Real(res))?;
    Ok(Control::None)
}

/// % leaves Y in place: X becomes y·x/100.
pub fn percent<H: Host>(core: &mut Core<H>) -> CmdResult {
    core.stack.require(2)?;
    let x = core.stack.x()?.as_real().ok_or(CalcError::InvalidType)?;
    let y = core.stack.peek(1)?.as_real().ok_or(CalcError::InvalidType)?;
    let res = core.check_range(y * x / 100.0)?;
    core.unary_result(Value::Real(res))?;
    Ok(Control::None)
}

/// %CH leaves Y in place: X becomes (x−y)·100/y.
pub fn percent_ch<H: Host>(core: &mut Core<H>) -> CmdResult {
    core.stack.require(2)?;
    let x = core.stack.x()?.as_real().ok_or(CalcError::InvalidType)?;
    let y = core.stack.peek(1)?.as_real().ok_or(CalcError::InvalidType)?;
    if y == 0.0 {
        return Err(CalcError::DivideBy0);
    }
    let res = core.check_range((x - y) * 100.0 / y)?;
    core.unary_result(Value::Real(res))?;
    Ok(Control::None)
}

// RANDOM NUMBERS
// ================================================================================================

/// The split-decimal-word congruential generator: `low` holds 8 digits, `high` 7.
pub fn next_random(low: &mut i64, high: &mut i64) -> Scalar {
    if *low == 0 && *high == 0 {
        *low = 2787;
    }
    let temp = *low * 30928467;
    *high = (*low * 28511 + *high * 30928467 + temp / 100_000_000) % 10_000_000;
    *low = temp % 100_000_000;
    if *high >= 1_000_000 {
        let t = *low / 1000;
        t as Scalar / 1e12 + *high as Scalar / 1e7
    } else if *high >= 100_000 {
        let t = *low / 100;
        t as Scalar / 1e13 + *high as Scalar / 1e7
    } else if *high >= 10_000 {
        let t = *low / 10;
        t as Scalar / 1e14 + *high as Scalar / 1e7
    } else {
        *low as Scalar / 1e15 + *high as Scalar / 1e7
    }
}

pub fn ran<H: Host>(core: &mut Core<H>) -> CmdResult {
    let (mut low, mut high) = core.random;
    let x = next_random(&mut low, &mut high);
    core.random = (low, high);
    core.recall_result(Value::Real(x))?;
    Ok(Control::None)
}

/// SEED from X: zero asks the shell for entropy; otherwise the fractional digits become the
/// generator words.
pub fn seed<H: Host>(core: &mut Core<H>) -> CmdResult {
    let x = core.stack.x()?.as_real().ok_or(CalcError::InvalidType)?;
    if x == 0.0 {
        let r = core.host.random_seed();
        core.random = ((r % 100_000_000) as i64, ((r / 100_000_000) % 10_000_000) as i64);
    } else {
        let digits = (x.abs().fract() * 1e15) as i64;
        core.random = (digits % 100_000_000, (digits / 100_000_000) % 10_000_000);
    }
    Ok(Control::None)
}

// COMPARISON PREDICATES
// ================================================================================================

fn test(cond: bool) -> CmdResult {
    Ok(if cond { Control::Yes } else { Control::No })
}

fn x_real<H: Host>(core: &Core<H>) -> Result<Scalar, CalcError> {
    match core.stack.x()? {
        Value::Real(x) => Ok(*x),
        Value::Str(_) => Err(CalcError::AlphaDataIsInvalid),
        _ => Err(CalcError::InvalidType),
    }
}

fn xy_real<H: Host>(core: &Core<H>) -> Result<(Scalar, Scalar), CalcError> {
    core.stack.require(2)?;
    let x = match core.stack.x()? {
        Value::Real(x) => *x,
        Value::Str(_) => return Err(CalcError::AlphaDataIsInvalid),
        _ => return Err(CalcError::InvalidType),
    };
    let y = match core.stack.peek(1)? {
        Value::Real(y) => *y,
        Value::Str(_) => return Err(CalcError::AlphaDataIsInvalid),
        _ => return Err(CalcError::InvalidType),
    };
    Ok((x, y))
}

pub fn x_eq_0<H: Host>(core: &mut Core<H>) -> CmdResult {
    test(x_real(core)? == 0.0)
}

pub fn x_ne_0<H: Host>(core: &mut Core<H>) -> CmdResult {
    test(x_real(core)? != 0.0)
}

pub fn x_lt_0<H: Host>(core: &mut Core<H>) -> CmdResult {
    test(x_real(core)? < 0.0)
}

pub fn x_gt_0<H: Host>(core: &mut Core<H>) -> CmdResult {
    test(x_real(core)? > 0.0)
}

pub fn x_le_0<H: Host>(core: &mut Core<H>) -> CmdResult {
    test(x_real(core)? <= 0.0)
}

pub fn x_ge_0<H: Host>(core: &mut Core<H>) -> CmdResult {
    test(x_real(core)? >= 0.0)
}

/// X=Y? compares any pair of values: type-aware equality, never an error for mismatched
/// types.
pub fn x_eq_y<H: Host>(core: &mut Core<H>) -> CmdResult {
    core.stack.require(2)?;
    test(core.stack.x()? == core.stack.peek(1)?)
}

pub fn x_ne_y<H: Host>(core: &mut Core<H>) -> CmdResult {
    core.stack.require(2)?;
    test(core.stack.x()? != core.stack.peek(1)?)
}

pub fn x_lt_y<H: Host>(core: &mut Core<H>) -> CmdResult {
    let (x, y) = xy_real(core)?;
    test(x < y)
}

pub fn x_gt_y<H: Host>(core: &mut Core<H>) -> CmdResult {
    let (x, y) = xy_real(core)?;
    test(x > y)
}

pub fn x_le_y<H: Host>(core: &mut Core<H>) -> CmdResult {
    let (x, y) = xy_real(core)?;
    test(x <= y)
}

pub fn x_ge_y<H: Host>(core: &mut Core<H>) -> CmdResult {
    let (x, y) = xy_real(core)?;
    test(x >= y)
}
