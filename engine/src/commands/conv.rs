//! Bit-pattern conversions between reals and IEEE 754 interchange encodings: binary32/64 and
//! decimal32/64/128 (BID). Patterns travel on the stack as a Real when the current word size
//! can hold them, otherwise as a big-endian hex string.

use rpn42_core::{CalcError, CalcString, CmdResult, Control, Scalar, Value};

use crate::{Core, host::Host, modes::mask};

// PATTERN TRANSPORT
// ================================================================================================

fn pattern_to_value<H: Host>(core: &Core<H>, bits: u128, width: u32) -> Value {
    let wsize = core.modes.effective_wsize();
    if width <= wsize && bits <= mask(wsize) as u128 {
        Value::Real(core.modes.base_to_scalar(bits as i64))
    } else {
        let hex = format!("{bits:0width$X}", width = (width / 4) as usize);
        Value::Str(CalcString::from_bytes(hex.as_bytes()))
    }
}

fn pattern_from_x<H: Host>(core: &Core<H>, width: u32) -> Result<u128, CalcError> {
    match core.stack.x()? {
        Value::Real(x) => {
            if *x != x.trunc() {
                return Err(CalcError::InvalidData);
            }
            let n = *x as i128;
            Ok((n as u128) & width_mask(width))
        },
        Value::Str(s) => {
            let text = core::str::from_utf8(s.as_bytes()).map_err(|_| CalcError::InvalidData)?;
            if text.is_empty() || text.len() > (width / 4) as usize {
                return Err(CalcError::InvalidData);
            }
            u128::from_str_radix(text, 16).map_err(|_| CalcError::InvalidData)
        },
        _ => Err(CalcError::InvalidType),
    }
}

fn width_mask(width: u32) -> u128 {
    if width >= 128 { u128::MAX } else { (1u128 << width) - 1 }
}

// DECIMAL INTERCHANGE FORMATS
// ================================================================================================

/// Field layout of one IEEE decimal interchange format (BID encoding).
struct DecFormat {
    total_bits: u32,
    coeff_bits: u32,
    exp_bits: u32,
    bias: i32,
    max_digits: u32,
}

const DEC32: DecFormat =
    DecFormat { total_bits: 32, coeff_bits: 23, exp_bits: 8, bias: 101, max_digits: 7 };
const DEC64: DecFormat =
    DecFormat { total_bits: 64, coeff_bits: 53, exp_bits: 10, bias: 398, max_digits: 16 };
const DEC128: DecFormat =
    DecFormat { total_bits: 128, coeff_bits: 113, exp_bits: 14, bias: 6176, max_digits: 34 };

impl DecFormat {
    fn max_biased_exp(&self) -> i32 {
        (3 << (self.exp_bits - 2)) - 1
    }

    fn sign_bit(&self) -> u128 {
        1u128 << (self.total_bits - 1)
    }

    fn infinity(&self, neg: bool) -> u128 {
        let body = 0b11110u128 << (self.total_bits - 6);
        if neg { self.sign_bit() | body } else { body }
    }

    fn nan(&self) -> u128 {
        0b11111u128 << (self.total_bits - 6)
    }

    /// Encodes a binary double into this decimal format via its shortest decimal form.
    fn encode(&self, x: Scalar) -> u128 {
        if x.is_nan() {
            return self.nan();
        }
        if x.is_infinite() {
            return self.infinity(x < 0.0);
        }
        let neg = x.is_sign_negative();
        let sign = if neg { self.sign_bit() } else { 0 };
        if x == 0.0 {
            return sign | ((self.bias as u128) << self.coeff_bits);
        }

        let (mut coeff, mut dec_exp) = shortest_decimal(x.abs());
        // round away digits the format cannot hold
        while count_digits(coeff) > self.max_digits {
            coeff = (coeff + 5) / 10;
            dec_exp += 1;
        }
        let mut biased = dec_exp + self.bias;
        // renormalize into the exponent range where possible
        while biased > self.max_biased_exp() && count_digits(coeff) < self.max_digits {
            coeff *= 10;
            biased -= 1;
        }
        while biased < 0 && coeff > 0 {
            coeff = (coeff + 5) / 10;
            biased += 1;
        }
        if biased > self.max_biased_exp() {
            return self.infinity(neg);
        }
        if coeff == 0 {
            return sign | ((self.bias as u128) << self.coeff_bits);
        }

        if coeff < 1u128 << self.coeff_bits {
            sign | ((biased as u128) << self.coeff_bits) | coeff
        } else {
            // large-coefficient form: "11" marker, then the exponent, then the low bits with
            // an implicit 0b100 prefix
            let low = coeff & ((1u128 << (self.coeff_bits - 2)) - 1);
            sign | (0b11u128 << (self.total_bits - 3))
                | ((biased as u128) << (self.coeff_bits - 2))
                | low
        }
    }

    /// Decodes this format into a binary double; non-canonical coefficients read as zero.
    fn decode(&self, bits: u128) -> Scalar {
        let neg = bits & self.sign_bit() != 0;
        let top5 = (bits >> (self.total_bits - 6)) & 0b11111;
        if top5 == 0b11110 {
            return if neg { Scalar::NEG_INFINITY } else { Scalar::INFINITY };
        }
        if top5 == 0b11111 {
            return Scalar::NAN;
        }
        let exp_mask = (1u128 << self.exp_bits) - 1;
        let top2 = (bits >> (self.total_bits - 3)) & 0b11;
        let (biased, coeff) = if top2 == 0b11 {
            let biased = ((bits >> (self.coeff_bits - 2)) & exp_mask) as i32;
            let coeff =
                (0b100u128 << (self.coeff_bits - 2)) | (bits & ((1u128 << (self.coeff_bits - 2)) - 1));
            (biased, coeff)
        } else {
            let biased = ((bits >> self.coeff_bits) & exp_mask) as i32;
            (biased, bits & ((1u128 << self.coeff_bits) - 1))
        };
        let coeff = if count_digits(coeff) > self.max_digits { 0 } else { coeff };
        let magnitude = (coeff as Scalar) * 10f64.powi(biased - self.bias);
        if neg { -magnitude } else { magnitude }
    }
}

/// Shortest-roundtrip decimal form of a positive double: (coefficient, exponent).
fn shortest_decimal(x: Scalar) -> (u128, i32) {
    let s = format!("{x:e}");
    let (mant, exp) = s.split_once('e').expect("exponential format");
    let exp: i32 = exp.parse().expect("exponent parses");
    let digits: String = mant.chars().filter(|c| c.is_ascii_digit()).collect();
    let coeff: u128 = digits.parse().expect("mantissa digits parse");
    (coeff, exp - (digits.len() as i32 - 1))
}

fn count_digits(mut n: u128) -> u32 {
    let mut count = 1;
    while n >= 10 {
        n /= 10;
        count += 1;
    }
    count
}

// COMMANDS
// ================================================================================================

fn x_to_pattern<H: Host>(core: &mut Core<H>, encode: fn(Scalar) -> u128, width: u32) -> CmdResult {
    let x = core.stack.x()?.as_real().ok_or(CalcError::InvalidType)?;
    let v = pattern_to_value(core, encode(x), width);
    core.unary_result(v)?;
    Ok(Control::None)
}

fn pattern_to_x<H: Host>(core: &mut Core<H>, decode: fn(u128) -> Scalar, width: u32) -> CmdResult {
    let bits = pattern_from_x(core, width)?;
    let v = Value::Real(decode(bits));
    core.unary_result(v)?;
    Ok(Control::None)
}

pub fn n_to_bs<H: Host>(core: &mut Core<H>) -> CmdResult {
    x_to_pattern(core, |x| (x as f32).to_bits() as u128, 32)
}

pub fn n_to_bd<H: Host>(core: &mut Core<H>) -> CmdResult {
    x_to_pattern(core, |x| x.to_bits() as u128, 64)
}

pub fn n_to_ds<H: Host>(core: &mut Core<H>) -> CmdResult {
    x_to_pattern(core, |x| DEC32.encode(x), 32)
}

pub fn n_to_dd<H: Host>(core: &mut Core<H>) -> CmdResult {
    x_to_pattern(core, |x| DEC64.encode(x), 64)
}

pub fn n_to_dq<H: Host>(core: &mut Core<H>) -> CmdResult {
    x_to_pattern(core, |x| DEC128.encode(x), 128)
}

pub fn bs_to_n<H: Host>(core: &mut Core<H>) -> CmdResult {
    pattern_to_x(core, |bits| f32::from_bits(bits as u32) as Scalar, 32)
}

pub fn bd_to_n<H: Host>(core: &mut Core<H>) -> CmdResult {
    pattern_to_x(core, |bits| Scalar::from_bits(bits as u64), 64)
}

pub fn ds_to_n<H: Host>(core: &mut Core<H>) -> CmdResult {
    pattern_to_x(core, |bits| DEC32.decode(bits), 32)
}

pub fn dd_to_n<H: Host>(core: &mut Core<H>) -> CmdResult {
    pattern_to_x(core, |bits| DEC64.decode(bits), 64)
}

pub fn dq_to_n<H: Host>(core: &mut Core<H>) -> CmdResult {
    pattern_to_x(core, |bits| DEC128.decode(bits), 128)
}

// TESTS
// ================================================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decimal64_roundtrips_simple_values() {
        for &x in &[0.0, 1.0, -1.0, 0.1, 12345.6789, -2.5e10, 1e-20] {
            let bits = DEC64.encode(x);
            let back = DEC64.decode(bits);
            assert!(
                (back - x).abs() <= x.abs() * 1e-12,
                "{x} -> {bits:#x} -> {back}"
            );
        }
    }

    #[test]
    fn decimal64_one_is_canonical() {
        // 1 = coefficient 1, exponent 0: biased exponent 398 in the low-coefficient form
        assert_eq!(DEC64.encode(1.0), (398u128 << 53) | 1);
    }

    #[test]
    fn decimal32_rounds_to_seven_digits() {
        let bits = DEC32.encode(1.23456789);
        let back = DEC32.decode(bits);
        assert!((back - 1.234568).abs() < 1e-6, "{back}");
    }

    #[test]
    fn decimal_specials() {
        assert!(DEC64.decode(DEC64.encode(Scalar::INFINITY)).is_infinite());
        assert!(DEC64.decode(DEC64.encode(Scalar::NEG_INFINITY)) < 0.0);
        assert!(DEC64.decode(DEC64.encode(Scalar::NAN)).is_nan());
        assert_eq!(DEC128.decode(DEC128.encode(0.0)), 0.0);
    }

    #[test]
    fn decimal128_roundtrips() {
        for &x in &[1.0, 3.141592653589793, -6.02e23] {
            let back = DEC128.decode(DEC128.encode(x));
            assert!((back - x).abs() <= x.abs() * 1e-12, "{x} -> {back}");
        }
    }

    #[test]
    fn shortest_decimal_extraction() {
        assert_eq!(shortest_decimal(1.0), (1, 0));
        assert_eq!(shortest_decimal(0.1), (1, -1));
        assert_eq!(shortest_decimal(1234.5), (12345, -1));
    }
}
