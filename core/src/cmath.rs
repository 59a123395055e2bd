//! Complex elementary functions.
//!
//! These carry the branch handling the calculator needs: pure-real and pure-imaginary
//! arguments take exact paths so results land on the axes without round-off, and overflow in
//! intermediate magnitudes is rescaled rather than surfaced as spurious infinities.

use core::f64::consts::PI;

use crate::{errors::CalcError, scalar::Scalar};

/// 1/(x + iy), Smith's algorithm. `DivideBy0` on zero input; the caller applies range policy
/// to infinite components.
pub fn inv(xre: Scalar, xim: Scalar) -> Result<(Scalar, Scalar), CalcError> {
    if xre == 0.0 && xim == 0.0 {
        return Err(CalcError::DivideBy0);
    }
    let (rre, rim);
    if xim.abs() <= xre.abs() {
        let r = xim / xre;
        let t = 1.0 / (xre + xim * r);
        if r == 0.0 {
            rre = t;
            rim = -xim * (1.0 / xre) * t;
        } else {
            rre = t;
            rim = -r * t;
        }
    } else {
        let r = xre / xim;
        let t = 1.0 / (xre * r + xim);
        if r == 0.0 {
            rre = xre * (1.0 / xim) * t;
            rim = -t;
        } else {
            rre = r * t;
            rim = -t;
        }
    }
    Ok((rre, rim))
}

/// Principal square root.
pub fn sqrt(xre: Scalar, xim: Scalar) -> (Scalar, Scalar) {
    if xre == 0.0 {
        if xim == 0.0 {
            return (0.0, 0.0);
        }
        let neg = xim < 0.0;
        let aim = xim.abs();
        let r = if aim > 1.0 { (aim / 2.0).sqrt() } else { (aim * 2.0).sqrt() / 2.0 };
        return (r, if neg { -r } else { r });
    }
    if xim == 0.0 {
        return if xre > 0.0 { (xre.sqrt(), 0.0) } else { (0.0, (-xre).sqrt()) };
    }

    let r = xre.hypot(xim);
    let mut a = ((r + xre.abs()) / 2.0).sqrt();
    let mut b = xim / (a * 2.0);

    if a.is_infinite() {
        // hypot overflowed; recompute on a scaled-down argument
        let sre = xre / 100.0;
        let sim = xim / 100.0;
        let r = sre.hypot(sim);
        a = ((r + sre.abs()) / 2.0).sqrt() * 10.0;
        b = sim / (a / 10.0 * 2.0) * 10.0;
    }

    if xre >= 0.0 {
        (a, b)
    } else if xim >= 0.0 {
        (b, a)
    } else {
        (-b, -a)
    }
}

/// Principal natural logarithm. `InvalidData` at zero.
pub fn ln(xre: Scalar, xim: Scalar) -> Result<(Scalar, Scalar), CalcError> {
    if xim == 0.0 {
        if xre == 0.0 {
            return Err(CalcError::InvalidData);
        }
        return Ok(if xre > 0.0 { (xre.ln(), 0.0) } else { ((-xre).ln(), PI) });
    }
    if xre == 0.0 {
        return Ok(if xim > 0.0 { (xim.ln(), PI / 2.0) } else { ((-xim).ln(), -PI / 2.0) });
    }
    let mut h = xre * xre + xim * xim;
    let a = xim.atan2(xre);
    if h > 0.5 && h < 3.0 {
        // |x| near 1: go through log1p on |x|^2 - 1 to avoid cancellation
        let (mut big, mut small) = (xre.abs(), xim.abs());
        if big < small {
            core::mem::swap(&mut big, &mut small);
        }
        let d = big - 1.0;
        h = (2.0 * d + d * d + small * small).ln_1p() / 2.0;
    } else if h.is_normal() {
        h = h.ln() / 2.0;
    } else {
        // |x|^2 over- or underflowed; rescale by a power of two before taking the log
        let mut m = (0x2000000000000000u64 as Scalar) * 4.0; // 2^63
        let mut b = -(2.0f64.ln()) * 63.0;
        if h.is_infinite() {
            m = 1.0 / m;
            b = -b;
        }
        h = (m * xre).hypot(m * xim).ln() + b;
    }
    Ok((h, a))
}

/// e^(x + iy).
pub fn exp(xre: Scalar, xim: Scalar) -> (Scalar, Scalar) {
    let m = xre.exp();
    (m * xim.cos(), m * xim.sin())
}

/// Inverse hyperbolic sine with axis-exact branches.
pub fn asinh(xre: Scalar, xim: Scalar) -> (Scalar, Scalar) {
    if xim == 0.0 {
        return (xre.asinh(), 0.0);
    }
    if xre == 0.0 {
        if xim > 1.0 {
            return (xim.acosh(), PI / 2.0);
        } else if xim < -1.0 {
            return (-(-xim).acosh(), -PI / 2.0);
        }
        return (0.0, xim.asin());
    }

    // asinh(x) = i * asin(x / i)
    let zre = xim;
    let zim = -xre;
    let (are, aim) = sqrt(zre + 1.0, zim);
    let (bre, bim) = sqrt(-zre + 1.0, -zim);
    let x2 = (zre / (are * bre - aim * bim)).atan();
    let y2 = (are * bim - aim * bre).asinh();
    (-y2.copysign(zim), x2.copysign(zre))
}

/// Inverse hyperbolic cosine with axis-exact branches.
pub fn acosh(xre: Scalar, xim: Scalar) -> (Scalar, Scalar) {
    if xim == 0.0 {
        if xre >= 1.0 {
            return (xre.acosh(), 0.0);
        } else if xre <= -1.0 {
            return ((-xre).acosh(), PI);
        }
        return (0.0, xre.acos());
    }
    if xre == 0.0 {
        return if xim > 0.0 { (xim.asinh(), PI / 2.0) } else { (-xim.asinh(), -PI / 2.0) };
    }

    let (are, aim) = sqrt(xre - 1.0, xim);
    let (bre, bim) = sqrt(xre + 1.0, xim);
    ((are * bre + aim * bim).asinh(), (aim / bre).atan() * 2.0)
}

/// Inverse hyperbolic tangent. `InvalidData` at the real branch points ±1.
pub fn atanh(xre: Scalar, xim: Scalar) -> Result<(Scalar, Scalar), CalcError> {
    if xim == 0.0 {
        if xre == 1.0 || xre == -1.0 {
            return Err(CalcError::InvalidData);
        }
        if xre > -1.0 && xre < 1.0 {
            return Ok((xre.atanh(), 0.0));
        }
        let re = (1.0 / xre).atanh();
        return Ok((re, if xre > 1.0 { -PI / 2.0 } else { PI / 2.0 }));
    }
    if xre == 0.0 {
        return Ok((0.0, xim.atan()));
    }

    let mut x = xim.abs();
    let mut y = xre.abs();

    const BIG: Scalar = 0x8000000u32 as Scalar; // 2^27

    if x >= BIG || y >= BIG {
        // atan(1/z) ~ 1/z out here
        let (ix, iy) = inv(x, y)?;
        x = ix + PI / 2.0;
        y = iy;
    } else {
        let x2 = x * x;
        let ym = 1.0 - y;
        let nx = (2.0 * x).atan2((1.0 + y) * ym - x2) / 2.0;
        let ny = (4.0 * y / (ym * ym + x2)).ln_1p() / 4.0;
        x = nx;
        y = ny;
    }

    x = x.abs();
    if xim < 0.0 {
        x = -x;
    }
    y = y.abs();
    if xre < 0.0 {
        y = -y;
    }
    Ok((y, x))
}

// TESTS
// ================================================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: (Scalar, Scalar), b: (Scalar, Scalar)) -> bool {
        (a.0 - b.0).abs() < 1e-12 && (a.1 - b.1).abs() < 1e-12
    }

    #[test]
    fn inv_of_i_is_minus_i() {
        assert_eq!(inv(0.0, 1.0).unwrap(), (0.0, -1.0));
        assert_eq!(inv(0.0, 0.0), Err(CalcError::DivideBy0));
    }

    #[test]
    fn sqrt_branches() {
        assert_eq!(sqrt(4.0, 0.0), (2.0, 0.0));
        assert_eq!(sqrt(-4.0, 0.0), (0.0, 2.0));
        // sqrt(2i) = 1 + i
        assert!(close(sqrt(0.0, 2.0), (1.0, 1.0)));
        // third quadrant result for negative-negative input
        let (re, im) = sqrt(-3.0, -4.0);
        assert!(re > 0.0 && im < 0.0);
        assert!(close((re * re - im * im, 2.0 * re * im), (-3.0, -4.0)));
    }

    #[test]
    fn ln_branches() {
        assert_eq!(ln(0.0, 0.0), Err(CalcError::InvalidData));
        assert_eq!(ln(-1.0, 0.0).unwrap(), (0.0, PI));
        assert_eq!(ln(0.0, 1.0).unwrap(), (0.0, PI / 2.0));
        let (re, im) = ln(1.0, 1.0).unwrap();
        assert!(close((re, im), ((2.0f64).ln() / 2.0, PI / 4.0)));
    }

    #[test]
    fn ln_handles_extreme_magnitudes() {
        let (re, _) = ln(1e300, 1e300).unwrap();
        assert!((re - (1e300f64.ln() + (2.0f64).ln() / 2.0)).abs() < 1e-10);
        let (re, _) = ln(1e-300, 1e-300).unwrap();
        assert!(re < -690.0 && re.is_finite());
    }

    #[test]
    fn atanh_branch_points() {
        assert_eq!(atanh(1.0, 0.0), Err(CalcError::InvalidData));
        assert_eq!(atanh(-1.0, 0.0), Err(CalcError::InvalidData));
        let (re, im) = atanh(0.5, 0.0).unwrap();
        assert_eq!((re, im), ((0.5f64).atanh(), 0.0));
    }

    #[test]
    fn asinh_acosh_real_axis() {
        assert_eq!(asinh(2.0, 0.0), (2.0f64.asinh(), 0.0));
        assert_eq!(acosh(2.0, 0.0), (2.0f64.acosh(), 0.0));
        assert_eq!(acosh(-2.0, 0.0), (2.0f64.acosh(), PI));
        assert_eq!(acosh(0.5, 0.0), (0.0, 0.5f64.acos()));
    }
}
