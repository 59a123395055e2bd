//! Generic arithmetic across the full value lattice.
//!
//! Binary operations take their operands in calculator order: `a` is Y, `b` is X. Every
//! combination of Real, Complex, RealMatrix and ComplexMatrix is defined; strings and lists
//! in arithmetic report `AlphaDataIsInvalid` / `InvalidType`.

use crate::{
    cmath,
    errors::CalcError,
    matrix::{Cell, ComplexMatrix, RealMatrix},
    scalar::{NEG_HUGE, POS_HUGE, Scalar, ScalarOps},
    value::Value,
};

// NUMERIC POLICY
// ================================================================================================

/// Range and singularity policy threaded into arithmetic from the flag state.
#[derive(Copy, Clone, Debug, Default)]
pub struct NumPolicy {
    /// Flag 24: overflow saturates at ±HUGE instead of failing with `OutOfRange`.
    pub range_error_ignore: bool,
    /// `matrix_singularmatrix` preference: substitute a near-zero pivot instead of failing.
    pub singular_substitute: bool,
}

impl NumPolicy {
    /// Applies the range policy to a computed real.
    pub fn check(&self, x: Scalar) -> Result<Scalar, CalcError> {
        match x.inf_sign() {
            0 => Ok(x),
            s if self.range_error_ignore => Ok(if s > 0 { POS_HUGE } else { NEG_HUGE }),
            _ => Err(CalcError::OutOfRange),
        }
    }

    /// Applies the range policy to both components of a computed complex.
    pub fn check_complex(&self, re: Scalar, im: Scalar) -> Result<(Scalar, Scalar), CalcError> {
        Ok((self.check(re)?, self.check(im)?))
    }
}

// UNARY MAPPING
// ================================================================================================

/// What a pointwise map does with string cells inside a real matrix.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum StrCellPolicy {
    /// Keep the cell untouched (sign-like operations).
    Propagate,
    /// Fail the whole operation.
    Reject,
}

/// Applies `fr` over reals and real-matrix cells and `fc` over complex scalars and matrices.
pub fn map_unary(
    v: &Value,
    fr: &dyn Fn(Scalar) -> Result<Scalar, CalcError>,
    fc: &dyn Fn(Scalar, Scalar) -> Result<(Scalar, Scalar), CalcError>,
    strings: StrCellPolicy,
) -> Result<Value, CalcError> {
    match v {
        Value::Real(x) => Ok(Value::Real(fr(*x)?)),
        Value::Complex { re, im } => {
            let (re, im) = fc(*re, *im)?;
            Ok(Value::Complex { re, im })
        },
        Value::RealMatrix(m) => {
            let mut cells = Vec::with_capacity(m.size());
            for cell in m.cells() {
                match cell {
                    Cell::Num(x) => cells.push(Cell::Num(fr(*x)?)),
                    Cell::Str(_) => match strings {
                        StrCellPolicy::Propagate => cells.push(cell.clone()),
                        StrCellPolicy::Reject => return Err(CalcError::AlphaDataIsInvalid),
                    },
                }
            }
            Ok(Value::RealMatrix(RealMatrix::from_cells(m.rows(), m.cols(), cells)?))
        },
        Value::ComplexMatrix(m) => {
            let mut parts = Vec::with_capacity(m.size() * 2);
            for i in 0..m.size() {
                let (re, im) = m.get(i);
                let (re, im) = fc(re, im)?;
                parts.push(re);
                parts.push(im);
            }
            Ok(Value::ComplexMatrix(ComplexMatrix::from_parts(m.rows(), m.cols(), parts)?))
        },
        Value::Str(_) => Err(CalcError::AlphaDataIsInvalid),
        Value::List(_) => Err(CalcError::InvalidType),
    }
}

// OPERAND VIEW
// ================================================================================================

/// Numeric view of a binary operand; rejects strings and lists up front so the combination
/// match below stays total.
enum Num<'a> {
    Scalar(Scalar, Scalar),
    Rm(&'a RealMatrix),
    Cm(&'a ComplexMatrix),
}

fn numeric(v: &Value) -> Result<Num<'_>, CalcError> {
    match v {
        Value::Real(x) => Ok(Num::Scalar(*x, 0.0)),
        Value::Complex { re, im } => Ok(Num::Scalar(*re, *im)),
        Value::RealMatrix(m) => Ok(Num::Rm(m)),
        Value::ComplexMatrix(m) => Ok(Num::Cm(m)),
        Value::Str(_) => Err(CalcError::AlphaDataIsInvalid),
        Value::List(_) => Err(CalcError::InvalidType),
    }
}

fn real_cells(m: &RealMatrix) -> Result<Vec<Scalar>, CalcError> {
    m.cells().iter().map(|c| c.as_num().ok_or(CalcError::AlphaDataIsInvalid)).collect()
}

fn complex_value(re: Scalar, im: Scalar) -> Value {
    if im == 0.0 { Value::Real(re) } else { Value::Complex { re, im } }
}

fn rm_from_reals(rows: u32, cols: u32, xs: Vec<Scalar>) -> Result<Value, CalcError> {
    let cells = xs.into_iter().map(Cell::Num).collect();
    Ok(Value::RealMatrix(RealMatrix::from_cells(rows, cols, cells)?))
}

/// Complex parts of either matrix kind, interleaved, plus its shape.
fn to_complex_parts(n: &Num<'_>) -> Result<(u32, u32, Vec<Scalar>), CalcError> {
    match n {
        Num::Rm(m) => {
            let mut parts = Vec::with_capacity(m.size() * 2);
            for x in real_cells(m)? {
                parts.push(x);
                parts.push(0.0);
            }
            Ok((m.rows(), m.cols(), parts))
        },
        Num::Cm(m) => Ok((m.rows(), m.cols(), m.parts().to_vec())),
        Num::Scalar(..) => Err(CalcError::InternalError),
    }
}

// COMPLEX PRIMITIVES
// ================================================================================================

fn cmul(are: Scalar, aim: Scalar, bre: Scalar, bim: Scalar) -> (Scalar, Scalar) {
    (are * bre - aim * bim, are * bim + aim * bre)
}

fn cdiv(
    are: Scalar,
    aim: Scalar,
    bre: Scalar,
    bim: Scalar,
) -> Result<(Scalar, Scalar), CalcError> {
    let (ire, iim) = cmath::inv(bre, bim)?;
    Ok(cmul(are, aim, ire, iim))
}

// ADD / SUB
// ================================================================================================

pub fn add(a: &Value, b: &Value, p: NumPolicy) -> Result<Value, CalcError> {
    elementwise(a, b, p, &|x, y| x + y, &|xr, xi, yr, yi| Ok((xr + yr, xi + yi)))
}

pub fn sub(a: &Value, b: &Value, p: NumPolicy) -> Result<Value, CalcError> {
    elementwise(a, b, p, &|x, y| x - y, &|xr, xi, yr, yi| Ok((xr - yr, xi - yi)))
}

type RealOp = dyn Fn(Scalar, Scalar) -> Scalar;
type ComplexOp = dyn Fn(Scalar, Scalar, Scalar, Scalar) -> Result<(Scalar, Scalar), CalcError>;

/// Shared element-broadcasting skeleton of `+`, `−` and the elementwise legs of `×`/`÷`.
fn elementwise(
    a: &Value,
    b: &Value,
    p: NumPolicy,
    fr: &RealOp,
    fc: &ComplexOp,
) -> Result<Value, CalcError> {
    let (na, nb) = (numeric(a)?, numeric(b)?);
    match (&na, &nb) {
        (Num::Scalar(ar, ai), Num::Scalar(br, bi)) => {
            if *ai == 0.0 && *bi == 0.0 {
                Ok(Value::Real(p.check(fr(*ar, *br))?))
            } else {
                let (re, im) = fc(*ar, *ai, *br, *bi)?;
                let (re, im) = p.check_complex(re, im)?;
                Ok(complex_value(re, im))
            }
        },
        (Num::Rm(m), Num::Scalar(br, bi)) if *bi == 0.0 => {
            let xs = real_cells(m)?
                .into_iter()
                .map(|x| p.check(fr(x, *br)))
                .collect::<Result<_, _>>()?;
            rm_from_reals(m.rows(), m.cols(), xs)
        },
        (Num::Scalar(ar, ai), Num::Rm(m)) if *ai == 0.0 => {
            let xs = real_cells(m)?
                .into_iter()
                .map(|x| p.check(fr(*ar, x)))
                .collect::<Result<_, _>>()?;
            rm_from_reals(m.rows(), m.cols(), xs)
        },
        (Num::Scalar(ar, ai), _) => {
            let (rows, cols, parts) = to_complex_parts(&nb)?;
            let mut out = Vec::with_capacity(parts.len());
            for pair in parts.chunks_exact(2) {
                let (re, im) = fc(*ar, *ai, pair[0], pair[1])?;
                let (re, im) = p.check_complex(re, im)?;
                out.push(re);
                out.push(im);
            }
            Ok(Value::ComplexMatrix(ComplexMatrix::from_parts(rows, cols, out)?))
        },
        (_, Num::Scalar(br, bi)) => {
            let (rows, cols, parts) = to_complex_parts(&na)?;
            let mut out = Vec::with_capacity(parts.len());
            for pair in parts.chunks_exact(2) {
                let (re, im) = fc(pair[0], pair[1], *br, *bi)?;
                let (re, im) = p.check_complex(re, im)?;
                out.push(re);
                out.push(im);
            }
            Ok(Value::ComplexMatrix(ComplexMatrix::from_parts(rows, cols, out)?))
        },
        (Num::Rm(ma), Num::Rm(mb)) => {
            if ma.rows() != mb.rows() || ma.cols() != mb.cols() {
                return Err(CalcError::DimensionError);
            }
            let (xa, xb) = (real_cells(ma)?, real_cells(mb)?);
            let xs = xa
                .into_iter()
                .zip(xb)
                .map(|(x, y)| p.check(fr(x, y)))
                .collect::<Result<_, _>>()?;
            rm_from_reals(ma.rows(), ma.cols(), xs)
        },
        _ => {
            let (rows, cols, pa) = to_complex_parts(&na)?;
            let (brows, bcols, pb) = to_complex_parts(&nb)?;
            if rows != brows || cols != bcols {
                return Err(CalcError::DimensionError);
            }
            let mut out = Vec::with_capacity(pa.len());
            for (x, y) in pa.chunks_exact(2).zip(pb.chunks_exact(2)) {
                let (re, im) = fc(x[0], x[1], y[0], y[1])?;
                let (re, im) = p.check_complex(re, im)?;
                out.push(re);
                out.push(im);
            }
            Ok(Value::ComplexMatrix(ComplexMatrix::from_parts(rows, cols, out)?))
        },
    }
}

// MUL
// ================================================================================================

pub fn mul(a: &Value, b: &Value, p: NumPolicy) -> Result<Value, CalcError> {
    let (na, nb) = (numeric(a)?, numeric(b)?);
    match (&na, &nb) {
        // scalar × anything and anything × scalar distribute elementwise
        (Num::Scalar(..), _) | (_, Num::Scalar(..)) => {
            elementwise(a, b, p, &|x, y| x * y, &|xr, xi, yr, yi| Ok(cmul(xr, xi, yr, yi)))
        },
        (Num::Rm(ma), Num::Rm(mb)) => {
            if ma.cols() != mb.rows() {
                return Err(CalcError::DimensionError);
            }
            let (xa, xb) = (real_cells(ma)?, real_cells(mb)?);
            let (n, k, m) = (ma.rows() as usize, ma.cols() as usize, mb.cols() as usize);
            let mut out = vec![0.0; n * m];
            for i in 0..n {
                for j in 0..m {
                    let mut acc = 0.0;
                    for l in 0..k {
                        acc += xa[i * k + l] * xb[l * m + j];
                    }
                    out[i * m + j] = p.check(acc)?;
                }
            }
            rm_from_reals(ma.rows(), mb.cols(), out)
        },
        _ => {
            let (arows, acols, pa) = to_complex_parts(&na)?;
            let (brows, bcols, pb) = to_complex_parts(&nb)?;
            if acols != brows {
                return Err(CalcError::DimensionError);
            }
            let (n, k, m) = (arows as usize, acols as usize, bcols as usize);
            let mut out = vec![0.0; n * m * 2];
            for i in 0..n {
                for j in 0..m {
                    let (mut sre, mut sim) = (0.0, 0.0);
                    for l in 0..k {
                        let (re, im) = cmul(
                            pa[2 * (i * k + l)],
                            pa[2 * (i * k + l) + 1],
                            pb[2 * (l * m + j)],
                            pb[2 * (l * m + j) + 1],
                        );
                        sre += re;
                        sim += im;
                    }
                    let (sre, sim) = p.check_complex(sre, sim)?;
                    out[2 * (i * m + j)] = sre;
                    out[2 * (i * m + j) + 1] = sim;
                }
            }
            Ok(Value::ComplexMatrix(ComplexMatrix::from_parts(arows, bcols, out)?))
        },
    }
}

// DIV
// ================================================================================================

pub fn div(a: &Value, b: &Value, p: NumPolicy) -> Result<Value, CalcError> {
    let (na, nb) = (numeric(a)?, numeric(b)?);
    match (&na, &nb) {
        (_, Num::Scalar(br, bi)) => {
            if *br == 0.0 && *bi == 0.0 {
                return Err(CalcError::DivideBy0);
            }
            elementwise(a, b, p, &|x, y| x / y, &|xr, xi, yr, yi| cdiv(xr, xi, yr, yi))
        },
        // matrix divisor: solve b · r = a
        (_, Num::Rm(mb))
            if matches!(na, Num::Rm(_)) || matches!(na, Num::Scalar(_, im) if im == 0.0) =>
        {
            if mb.rows() != mb.cols() {
                return Err(CalcError::DimensionError);
            }
            let n = mb.rows() as usize;
            let xb = real_cells(mb)?;
            let (rhs_cols, mut rhs) = match &na {
                Num::Scalar(ar, _) => {
                    // scalar dividend: a · I, i.e. a scaled inverse
                    let mut rhs = vec![0.0; n * n];
                    for i in 0..n {
                        rhs[i * n + i] = *ar;
                    }
                    (n, rhs)
                },
                Num::Rm(ma) => {
                    if ma.rows() as usize != n {
                        return Err(CalcError::DimensionError);
                    }
                    (ma.cols() as usize, real_cells(ma)?)
                },
                _ => unreachable!(),
            };
            lu_solve_real(xb, n, &mut rhs, rhs_cols, p)?;
            rm_from_reals(n as u32, rhs_cols as u32, rhs)
        },
        _ => {
            // at least one complex operand with a matrix divisor
            let (brows, bcols, pb) = to_complex_parts(&nb)?;
            if brows != bcols {
                return Err(CalcError::DimensionError);
            }
            let n = brows as usize;
            let (rhs_cols, mut rhs) = match &na {
                Num::Scalar(ar, ai) => {
                    let mut rhs = vec![0.0; n * n * 2];
                    for i in 0..n {
                        rhs[2 * (i * n + i)] = *ar;
                        rhs[2 * (i * n + i) + 1] = *ai;
                    }
                    (n, rhs)
                },
                _ => {
                    let (arows, acols, pa) = to_complex_parts(&na)?;
                    if arows as usize != n {
                        return Err(CalcError::DimensionError);
                    }
                    (acols as usize, pa)
                },
            };
            lu_solve_complex(pb, n, &mut rhs, rhs_cols, p)?;
            Ok(Value::ComplexMatrix(ComplexMatrix::from_parts(n as u32, rhs_cols as u32, rhs)?))
        },
    }
}

// LU DECOMPOSITION
// ================================================================================================
//
// Doolittle with partial pivoting. Singularity is detected from the pivot magnitude, not a
// fixed epsilon: an exactly-zero pivot after pivoting either fails or, under the
// singular-substitute preference, is replaced with the smallest positive normal so the solve
// proceeds as if the determinant were merely near zero.

fn lu_solve_real(
    mut a: Vec<Scalar>,
    n: usize,
    rhs: &mut [Scalar],
    rhs_cols: usize,
    p: NumPolicy,
) -> Result<(), CalcError> {
    let mut perm = (0..n).collect::<Vec<_>>();
    for col in 0..n {
        let mut pivot_row = col;
        let mut pivot_mag = a[perm[col] * n + col].abs();
        for row in col + 1..n {
            let mag = a[perm[row] * n + col].abs();
            if mag > pivot_mag {
                pivot_mag = mag;
                pivot_row = row;
            }
        }
        perm.swap(col, pivot_row);
        let mut pivot = a[perm[col] * n + col];
        if pivot == 0.0 {
            if !p.singular_substitute {
                return Err(CalcError::SingularMatrix);
            }
            pivot = Scalar::MIN_POSITIVE;
            a[perm[col] * n + col] = pivot;
        }
        for row in col + 1..n {
            let factor = a[perm[row] * n + col] / pivot;
            a[perm[row] * n + col] = factor;
            for k in col + 1..n {
                a[perm[row] * n + k] -= factor * a[perm[col] * n + k];
            }
        }
    }

    let mut out = vec![0.0; n * rhs_cols];
    for j in 0..rhs_cols {
        // forward substitution on the permuted rows
        let mut y = vec![0.0; n];
        for i in 0..n {
            let mut acc = rhs[perm[i] * rhs_cols + j];
            for k in 0..i {
                acc -= a[perm[i] * n + k] * y[k];
            }
            y[i] = acc;
        }
        // back substitution
        for i in (0..n).rev() {
            let mut acc = y[i];
            for k in i + 1..n {
                acc -= a[perm[i] * n + k] * out[k * rhs_cols + j];
            }
            out[i * rhs_cols + j] = p.check(acc / a[perm[i] * n + i])?;
        }
    }
    rhs[..n * rhs_cols].copy_from_slice(&out);
    Ok(())
}

fn lu_solve_complex(
    mut a: Vec<Scalar>,
    n: usize,
    rhs: &mut [Scalar],
    rhs_cols: usize,
    p: NumPolicy,
) -> Result<(), CalcError> {
    let at = |a: &[Scalar], r: usize, c: usize| (a[2 * (r * n + c)], a[2 * (r * n + c) + 1]);
    let set = |a: &mut [Scalar], r: usize, c: usize, v: (Scalar, Scalar)| {
        a[2 * (r * n + c)] = v.0;
        a[2 * (r * n + c) + 1] = v.1;
    };

    let mut perm = (0..n).collect::<Vec<_>>();
    for col in 0..n {
        let mag = |r: usize, a: &[Scalar]| {
            let (re, im) = at(a, r, col);
            re.hypot(im)
        };
        let mut pivot_row = col;
        let mut pivot_mag = mag(perm[col], &a);
        for row in col + 1..n {
            let m = mag(perm[row], &a);
            if m > pivot_mag {
                pivot_mag = m;
                pivot_row = row;
            }
        }
        perm.swap(col, pivot_row);
        let mut pivot = at(&a, perm[col], col);
        if pivot == (0.0, 0.0) {
            if !p.singular_substitute {
                return Err(CalcError::SingularMatrix);
            }
            pivot = (Scalar::MIN_POSITIVE, 0.0);
            set(&mut a, perm[col], col, pivot);
        }
        for row in col + 1..n {
            let factor = cdiv(at(&a, perm[row], col).0, at(&a, perm[row], col).1, pivot.0, pivot.1)?;
            set(&mut a, perm[row], col, factor);
            for k in col + 1..n {
                let (pre, pim) = at(&a, perm[col], k);
                let (fre, fim) = cmul(factor.0, factor.1, pre, pim);
                let (cur_re, cur_im) = at(&a, perm[row], k);
                set(&mut a, perm[row], k, (cur_re - fre, cur_im - fim));
            }
        }
    }

    let rat = |rhs: &[Scalar], r: usize, c: usize| {
        (rhs[2 * (r * rhs_cols + c)], rhs[2 * (r * rhs_cols + c) + 1])
    };
    let mut out = vec![0.0; n * rhs_cols * 2];
    for j in 0..rhs_cols {
        let mut y = vec![(0.0, 0.0); n];
        for i in 0..n {
            let (mut acc_re, mut acc_im) = rat(rhs, perm[i], j);
            for k in 0..i {
                let f = at(&a, perm[i], k);
                let (re, im) = cmul(f.0, f.1, y[k].0, y[k].1);
                acc_re -= re;
                acc_im -= im;
            }
            y[i] = (acc_re, acc_im);
        }
        for i in (0..n).rev() {
            let (mut acc_re, mut acc_im) = y[i];
            for k in i + 1..n {
                let f = at(&a, perm[i], k);
                let prev = (out[2 * (k * rhs_cols + j)], out[2 * (k * rhs_cols + j) + 1]);
                let (re, im) = cmul(f.0, f.1, prev.0, prev.1);
                acc_re -= re;
                acc_im -= im;
            }
            let piv = at(&a, perm[i], i);
            let (re, im) = cdiv(acc_re, acc_im, piv.0, piv.1)?;
            let (re, im) = p.check_complex(re, im)?;
            out[2 * (i * rhs_cols + j)] = re;
            out[2 * (i * rhs_cols + j) + 1] = im;
        }
    }
    rhs[..n * rhs_cols * 2].copy_from_slice(&out);
    Ok(())
}

// POWER
// ================================================================================================

/// y^x in calculator order (`a` = Y base, `b` = X exponent).
///
/// A negative real base with a non-integer exponent stays an error in real mode; the engine
/// routes through the complex leg when complex results are enabled.
pub fn pow_real(a: Scalar, b: Scalar, p: NumPolicy) -> Result<Scalar, CalcError> {
    if a == 0.0 && b < 0.0 {
        return Err(CalcError::DivideBy0);
    }
    if a < 0.0 && b != b.floor() {
        return Err(CalcError::InvalidData);
    }
    p.check(a.powf(b))
}

/// Complex y^x via exp(x · ln y); 0^positive is 0, 0^nonpositive divides by zero.
pub fn pow_complex(
    are: Scalar,
    aim: Scalar,
    bre: Scalar,
    bim: Scalar,
    p: NumPolicy,
) -> Result<(Scalar, Scalar), CalcError> {
    if are == 0.0 && aim == 0.0 {
        return if bim == 0.0 && bre > 0.0 { Ok((0.0, 0.0)) } else { Err(CalcError::DivideBy0) };
    }
    let (lre, lim) = cmath::ln(are, aim)?;
    let (ere, eim) = cmul(lre, lim, bre, bim);
    let (re, im) = cmath::exp(ere, eim);
    p.check_complex(re, im)
}

// TESTS
// ================================================================================================

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    const P: NumPolicy = NumPolicy { range_error_ignore: false, singular_substitute: false };

    fn rm(rows: u32, cols: u32, xs: &[Scalar]) -> Value {
        let cells = xs.iter().map(|&x| Cell::Num(x)).collect();
        Value::RealMatrix(RealMatrix::from_cells(rows, cols, cells).unwrap())
    }

    #[test]
    fn scalar_arithmetic() {
        assert_eq!(add(&Value::Real(2.0), &Value::Real(3.0), P).unwrap(), Value::Real(5.0));
        assert_eq!(sub(&Value::Real(2.0), &Value::Real(3.0), P).unwrap(), Value::Real(-1.0));
        assert_eq!(
            div(&Value::Real(1.0), &Value::Real(0.0), P).unwrap_err(),
            CalcError::DivideBy0
        );
    }

    #[test]
    fn overflow_honors_range_policy() {
        let p_ignore = NumPolicy { range_error_ignore: true, ..P };
        let huge = Value::Real(POS_HUGE);
        assert_eq!(mul(&huge, &Value::Real(2.0), P).unwrap_err(), CalcError::OutOfRange);
        assert_eq!(mul(&huge, &Value::Real(2.0), p_ignore).unwrap(), Value::Real(POS_HUGE));
    }

    #[test]
    fn complex_mul_div_roundtrip() {
        let a = Value::complex(3.0, 4.0);
        let b = Value::complex(-1.0, 2.0);
        let prod = mul(&a, &b, P).unwrap();
        let back = div(&prod, &b, P).unwrap();
        match back {
            Value::Complex { re, im } => {
                assert!((re - 3.0).abs() < 1e-12 && (im - 4.0).abs() < 1e-12)
            },
            other => panic!("expected complex, got {other:?}"),
        }
    }

    #[test]
    fn complex_result_collapses_to_real() {
        // (0+2i) * (0+3i) = -6 exactly on the real axis
        let v = mul(&Value::complex(0.0, 2.0), &Value::complex(0.0, 3.0), P).unwrap();
        assert_eq!(v, Value::Real(-6.0));
    }

    #[test]
    fn matrix_elementwise_add_checks_dims() {
        let a = rm(2, 2, &[1.0, 2.0, 3.0, 4.0]);
        let b = rm(2, 2, &[10.0, 20.0, 30.0, 40.0]);
        assert_eq!(add(&a, &b, P).unwrap(), rm(2, 2, &[11.0, 22.0, 33.0, 44.0]));
        let c = rm(1, 2, &[0.0, 0.0]);
        assert_eq!(add(&a, &c, P).unwrap_err(), CalcError::DimensionError);
    }

    #[test]
    fn scalar_matrix_broadcast() {
        let a = rm(1, 3, &[1.0, 2.0, 3.0]);
        assert_eq!(add(&a, &Value::Real(10.0), P).unwrap(), rm(1, 3, &[11.0, 12.0, 13.0]));
        assert_eq!(sub(&Value::Real(10.0), &a, P).unwrap(), rm(1, 3, &[9.0, 8.0, 7.0]));
    }

    #[test]
    fn matrix_multiply() {
        let a = rm(2, 3, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let b = rm(3, 2, &[7.0, 8.0, 9.0, 10.0, 11.0, 12.0]);
        assert_eq!(mul(&a, &b, P).unwrap(), rm(2, 2, &[58.0, 64.0, 139.0, 154.0]));
        assert_eq!(mul(&a, &a, P).unwrap_err(), CalcError::DimensionError);
    }

    #[test]
    fn matrix_divide_solves_linear_system() {
        // solve b·r = a with b = [[2,0],[0,4]], a = [6, 8]^T
        let b = rm(2, 2, &[2.0, 0.0, 0.0, 4.0]);
        let a = rm(2, 1, &[6.0, 8.0]);
        assert_eq!(div(&a, &b, P).unwrap(), rm(2, 1, &[3.0, 2.0]));
    }

    #[test]
    fn matrix_divide_needs_pivoting() {
        // leading zero forces a row swap
        let b = rm(2, 2, &[0.0, 1.0, 1.0, 0.0]);
        let a = rm(2, 1, &[5.0, 7.0]);
        assert_eq!(div(&a, &b, P).unwrap(), rm(2, 1, &[7.0, 5.0]));
    }

    #[test]
    fn singular_matrix_policy() {
        let b = rm(2, 2, &[1.0, 2.0, 2.0, 4.0]);
        let a = rm(2, 1, &[1.0, 2.0]);
        assert_eq!(div(&a, &b, P).unwrap_err(), CalcError::SingularMatrix);
        let p_sub = NumPolicy { singular_substitute: true, range_error_ignore: true };
        assert!(div(&a, &b, p_sub).is_ok());
    }

    #[test]
    fn scalar_over_matrix_is_scaled_inverse() {
        let b = rm(2, 2, &[4.0, 7.0, 2.0, 6.0]);
        let inv = div(&Value::Real(1.0), &b, P).unwrap();
        let ident = mul(&b, &inv, P).unwrap();
        match ident {
            Value::RealMatrix(m) => {
                let cells = m.cells();
                assert!((cells[0].as_num().unwrap() - 1.0).abs() < 1e-12);
                assert!(cells[1].as_num().unwrap().abs() < 1e-12);
                assert!(cells[2].as_num().unwrap().abs() < 1e-12);
                assert!((cells[3].as_num().unwrap() - 1.0).abs() < 1e-12);
            },
            other => panic!("expected real matrix, got {other:?}"),
        }
    }

    #[test]
    fn string_cells_reject_arithmetic_but_map_can_propagate() {
        let m = RealMatrix::from_cells(1, 2, vec![Cell::Num(1.0), Cell::string(b"AB")]).unwrap();
        let v = Value::RealMatrix(m);
        assert_eq!(add(&v, &Value::Real(1.0), P).unwrap_err(), CalcError::AlphaDataIsInvalid);
        let mapped = map_unary(&v, &|x| Ok(-x), &|re, im| Ok((-re, -im)), StrCellPolicy::Propagate)
            .unwrap();
        match mapped {
            Value::RealMatrix(m) => {
                assert_eq!(m.cell(0).as_num(), Some(-1.0));
                assert!(m.cell(1).is_string());
            },
            other => panic!("expected real matrix, got {other:?}"),
        }
    }

    #[test]
    fn pow_legs() {
        assert_eq!(pow_real(2.0, 10.0, P).unwrap(), 1024.0);
        assert_eq!(pow_real(-8.0, 1.0 / 3.0, P).unwrap_err(), CalcError::InvalidData);
        assert_eq!(pow_real(0.0, -1.0, P).unwrap_err(), CalcError::DivideBy0);
        let (re, im) = pow_complex(0.0, 1.0, 2.0, 0.0, P).unwrap();
        assert!((re + 1.0).abs() < 1e-12 && im.abs() < 1e-12);
    }

    #[test]
    fn complex_matrix_divide() {
        // b = i·I, a = [1+0i, 0+2i]^T  →  r = a / i = [-i, 2]
        let b = Value::ComplexMatrix(
            ComplexMatrix::from_parts(2, 2, vec![0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0]).unwrap(),
        );
        let a = Value::ComplexMatrix(
            ComplexMatrix::from_parts(2, 1, vec![1.0, 0.0, 0.0, 2.0]).unwrap(),
        );
        match div(&a, &b, P).unwrap() {
            Value::ComplexMatrix(m) => {
                let (re, im) = m.get(0);
                assert!((re - 0.0).abs() < 1e-12 && (im + 1.0).abs() < 1e-12);
                let (re, im) = m.get(1);
                assert!((re - 2.0).abs() < 1e-12 && im.abs() < 1e-12);
            },
            other => panic!("expected complex matrix, got {other:?}"),
        }
    }
}
