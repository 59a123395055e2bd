use core::f64::consts::PI;

use num_traits::Float;

// SCALAR CONTRACT
// ================================================================================================

/// The concrete scalar of the binary backend.
///
/// All engine arithmetic is written against [`ScalarOps`], which extends
/// [`num_traits::Float`] with the conversions and range constants the command set needs. A
/// decimal128 backend plugs in by implementing the same trait; nothing above this module may
/// assume IEEE binary semantics beyond what the trait exposes.
pub type Scalar = f64;

/// Largest finite magnitude the backend can represent; overflow saturates here when the
/// range-error-ignore flag is set.
pub const POS_HUGE: Scalar = f64::MAX;
pub const NEG_HUGE: Scalar = -f64::MAX;

/// Word sizes beyond this lose integer precision on the binary backend, so BASE operations
/// clamp to it.
pub const MAX_WORD_SIZE: u32 = 53;

/// Extension surface over [`Float`] used throughout the engine.
pub trait ScalarOps: Float {
    /// Saturating conversion to `i32`, by magnitude: values at or beyond 2^31 map to
    /// `i32::MAX` / `i32::MIN`.
    fn to_i32_sat(self) -> i32;

    /// Saturating conversion to `i64`.
    fn to_i64_sat(self) -> i64;

    /// True when the value is neither NaN nor infinite.
    fn is_finite_real(self) -> bool;

    /// −1, 0 or +1 matching `p_isinf`: +1 for +∞, −1 for −∞, 0 otherwise.
    fn inf_sign(self) -> i32;
}

impl ScalarOps for f64 {
    fn to_i32_sat(self) -> i32 {
        if self.is_nan() {
            0
        } else if self >= 2147483648.0 {
            i32::MAX
        } else if self <= -2147483648.0 {
            i32::MIN
        } else {
            self as i32
        }
    }

    fn to_i64_sat(self) -> i64 {
        if self.is_nan() {
            0
        } else if self >= 9223372036854775808.0 {
            i64::MAX
        } else if self <= -9223372036854775808.0 {
            i64::MIN
        } else {
            self as i64
        }
    }

    fn is_finite_real(self) -> bool {
        !self.is_nan() && !self.is_infinite()
    }

    fn inf_sign(self) -> i32 {
        if self.is_infinite() { if self > 0.0 { 1 } else { -1 } } else { 0 }
    }
}

// ANGLE MODES
// ================================================================================================

/// Trigonometric argument interpretation.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum AngleMode {
    #[default]
    Degrees,
    Radians,
    Gradians,
}

pub fn rad_to_deg(x: Scalar) -> Scalar {
    x * (180.0 / PI)
}

pub fn deg_to_rad(x: Scalar) -> Scalar {
    x / (180.0 / PI)
}

/// Converts a radian result into the current angle mode.
pub fn rad_to_angle(x: Scalar, mode: AngleMode) -> Scalar {
    match mode {
        AngleMode::Radians => x,
        AngleMode::Gradians => x * (200.0 / PI),
        AngleMode::Degrees => x * (180.0 / PI),
    }
}

/// Converts an argument in the current angle mode into radians.
pub fn angle_to_rad(x: Scalar, mode: AngleMode) -> Scalar {
    match mode {
        AngleMode::Radians => x,
        AngleMode::Gradians => x / (200.0 / PI),
        AngleMode::Degrees => x / (180.0 / PI),
    }
}

// FOLDED TRIG
// ================================================================================================
//
// Sine and cosine in degree/gradian modes fold the argument into the first quadrant before
// converting to radians. The payoff is exact zeros at multiples of a quarter turn and full
// accuracy near them, where naive conversion accumulates the error of an inexact pi.

fn sin_or_cos_folded(mut x: Scalar, quarter: Scalar, do_sin: bool) -> Scalar {
    let mut neg = false;
    if x < 0.0 {
        x = -x;
        if do_sin {
            neg = true;
        }
    }
    let full = quarter * 4.0;
    x = x % full;
    let mut do_sin = do_sin;
    if x >= full / 2.0 {
        x -= full / 2.0;
        neg = !neg;
    }
    if x >= quarter {
        x = full / 2.0 - x;
        if !do_sin {
            neg = !neg;
        }
    }
    let r = if x == quarter {
        if do_sin { 1.0 } else { 0.0 }
    } else {
        // swap to the co-function near the quarter turn to keep the argument small
        if x > quarter / 2.0 {
            x = quarter - x;
            do_sin = !do_sin;
        }
        let rad = x / (quarter * 2.0 / PI);
        if do_sin { rad.sin() } else { rad.cos() }
    };
    if neg { -r } else { r }
}

pub fn sin_deg(x: Scalar) -> Scalar {
    sin_or_cos_folded(x, 90.0, true)
}

pub fn cos_deg(x: Scalar) -> Scalar {
    sin_or_cos_folded(x, 90.0, false)
}

pub fn sin_grad(x: Scalar) -> Scalar {
    sin_or_cos_folded(x, 100.0, true)
}

pub fn cos_grad(x: Scalar) -> Scalar {
    sin_or_cos_folded(x, 100.0, false)
}

/// Tangent with argument folding in degree/gradian modes.
///
/// Returns `None` at odd multiples of the quarter turn, where the true tangent is infinite;
/// the caller decides between saturation and an out-of-range error.
pub fn tan_in_mode(x: Scalar, mode: AngleMode) -> Option<Scalar> {
    let y = match mode {
        AngleMode::Radians => x.tan(),
        AngleMode::Gradians => tan_folded(x, 100.0)?,
        AngleMode::Degrees => tan_folded(x, 90.0)?,
    };
    if y.is_nan() || y.is_infinite() { None } else { Some(y) }
}

fn tan_folded(mut x: Scalar, quarter: Scalar) -> Option<Scalar> {
    let mut neg = false;
    if x < 0.0 {
        x = -x;
        neg = true;
    }
    let half = quarter * 2.0;
    x = x % half;
    if x == quarter {
        return None;
    }
    if x > quarter {
        x = half - x;
        neg = !neg;
    }
    // near the quarter turn, compute via the cotangent of the complement
    let y = if x > quarter - quarter / 9.0 {
        1.0 / ((quarter - x) / (half / PI)).tan()
    } else {
        (x / (half / PI)).tan()
    };
    Some(if neg { -y } else { y })
}

// TESTS
// ================================================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn saturating_conversions() {
        assert_eq!(3.9f64.to_i32_sat(), 3);
        assert_eq!((-3.9f64).to_i32_sat(), -3);
        assert_eq!(3.0e12f64.to_i32_sat(), i32::MAX);
        assert_eq!((-3.0e12f64).to_i32_sat(), i32::MIN);
        assert_eq!(1.0e20f64.to_i64_sat(), i64::MAX);
        assert_eq!(f64::NAN.to_i32_sat(), 0);
    }

    #[test]
    fn folded_trig_is_exact_at_cardinal_angles() {
        assert_eq!(sin_deg(180.0), 0.0);
        assert_eq!(sin_deg(360.0), 0.0);
        assert_eq!(cos_deg(90.0), 0.0);
        assert_eq!(cos_deg(270.0), 0.0);
        assert_eq!(sin_deg(90.0), 1.0);
        assert_eq!(cos_grad(100.0), 0.0);
        assert_eq!(sin_grad(200.0), 0.0);
        assert_eq!(tan_in_mode(90.0, AngleMode::Degrees), None);
        assert_eq!(tan_in_mode(100.0, AngleMode::Gradians), None);
    }

    #[test]
    fn folded_trig_matches_naive_conversion_away_from_poles() {
        for &deg in &[1.0, 17.5, 33.0, 59.9, 123.4, -77.0] {
            let naive = deg_to_rad(deg).sin();
            assert!((sin_deg(deg) - naive).abs() < 1e-12, "sin {deg}");
            let naive = deg_to_rad(deg).cos();
            assert!((cos_deg(deg) - naive).abs() < 1e-12, "cos {deg}");
        }
        let t = tan_in_mode(45.0, AngleMode::Degrees).unwrap();
        assert!((t - 1.0).abs() < 1e-15);
    }

    #[test]
    fn inf_sign_classifies() {
        assert_eq!(f64::INFINITY.inf_sign(), 1);
        assert_eq!(f64::NEG_INFINITY.inf_sign(), -1);
        assert_eq!(0.0f64.inf_sign(), 0);
        assert_eq!(f64::NAN.inf_sign(), 0);
    }
}
