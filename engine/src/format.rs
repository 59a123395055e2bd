use rpn42_core::{Arg, Instruction, Scalar, Value};

use crate::modes::{DispFormat, Modes, mask};

// NUMBER FORMATTING
// ================================================================================================

/// Punctuation configuration lifted from flags 28/29.
#[derive(Copy, Clone, Debug, Default)]
pub struct Punct {
    /// Radix mark is the comma (flag 28); the thousands separator is then the period.
    pub comma_radix: bool,
    /// Group integer digits in threes (flag 29).
    pub thousands: bool,
}

/// Renders a real in the given display format.
pub fn format_scalar(x: Scalar, disp: DispFormat, punct: Punct) -> String {
    if x.is_nan() {
        return "<Not a Number>".into();
    }
    if x.is_infinite() {
        return if x > 0.0 { "<Infinity>".into() } else { "-<Infinity>".into() };
    }
    let raw = match disp {
        DispFormat::Fix(d) => {
            let mag = x.abs();
            if mag != 0.0 && (mag >= 1e12 || mag < 0.5 * 10f64.powi(-(d as i32))) {
                sci_string(x, 11)
            } else {
                group_thousands(format!("{:.*}", d as usize, x), punct)
            }
        },
        DispFormat::Sci(d) => sci_string(x, d),
        DispFormat::Eng(d) => eng_string(x, d),
        DispFormat::All => {
            let s = format!("{x}");
            if s.contains('e') {
                sci_string(x, 11)
            } else {
                group_thousands(s, punct)
            }
        },
    };
    punctuate(raw, punct)
}

fn sci_string(x: Scalar, digits: u8) -> String {
    let s = format!("{:.*e}", digits as usize, x);
    // Rust renders exponents as "e5" / "e-5"; the calculator shows "E5" / "E-5"
    let (mant, exp) = s.split_once('e').expect("exponential format");
    let mant = trim_mantissa(mant);
    format!("{mant}E{exp}")
}

fn eng_string(x: Scalar, digits: u8) -> String {
    if x == 0.0 {
        return format!("{:.*}E0", digits as usize, 0.0);
    }
    let exp = x.abs().log10().floor() as i32;
    let eng_exp = (exp.div_euclid(3)) * 3;
    let mant = x / 10f64.powi(eng_exp);
    let mant_digits = (digits as i32 - (exp - eng_exp)).max(0) as usize;
    format!("{:.*}E{}", mant_digits, mant, eng_exp)
}

fn trim_mantissa(mant: &str) -> String {
    if !mant.contains('.') {
        return mant.to_string();
    }
    let trimmed = mant.trim_end_matches('0');
    trimmed.trim_end_matches('.').to_string()
}

fn group_thousands(s: String, punct: Punct) -> String {
    if !punct.thousands {
        return s;
    }
    let (sign, rest) = match s.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", s.as_str()),
    };
    let (int_part, frac_part) = match rest.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (rest, None),
    };
    let mut grouped = String::new();
    let len = int_part.len();
    for (i, c) in int_part.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    match frac_part {
        Some(f) => format!("{sign}{grouped}.{f}"),
        None => format!("{sign}{grouped}"),
    }
}

/// Swaps the radix and separator marks when the comma-radix flag is set. Done last so the
/// grouping pass can assume '.' and ','.
fn punctuate(s: String, punct: Punct) -> String {
    if !punct.comma_radix {
        return s;
    }
    s.chars()
        .map(|c| match c {
            '.' => ',',
            ',' => '.',
            other => other,
        })
        .collect()
}

// BASE RENDERING
// ================================================================================================

/// Renders X in the active integer base when it holds a representable word; decimal rendering
/// is the fallback for everything else.
pub fn format_in_base(x: Scalar, modes: &Modes, punct: Punct) -> String {
    if modes.base == 10 || x != x.floor() {
        return format_scalar(x, modes.disp, punct);
    }
    match modes.scalar_to_base(x) {
        Some(n) => {
            let bits = (n as u64) & mask(modes.effective_wsize());
            match modes.base {
                2 => format!("{bits:b}"),
                8 => format!("{bits:o}"),
                16 => format!("{bits:X}"),
                _ => unreachable!("base is 2, 8, 10 or 16"),
            }
        },
        None => format_scalar(x, modes.disp, punct),
    }
}

// VALUE RENDERING
// ================================================================================================

/// Renders any value the way the display and ARCL do.
pub fn format_value(v: &Value, modes: &Modes, punct: Punct) -> String {
    match v {
        Value::Real(x) => format_in_base(*x, modes, punct),
        Value::Complex { re, im } => {
            if modes.polar {
                let r = re.hypot(*im);
                let theta = rpn42_core::scalar::rad_to_angle(im.atan2(*re), modes.angle);
                format!(
                    "{} \u{2221}{}",
                    format_scalar(r, modes.disp, punct),
                    format_scalar(theta, modes.disp, punct)
                )
            } else {
                let re_s = format_scalar(*re, modes.disp, punct);
                let im_s = format_scalar(im.abs(), modes.disp, punct);
                let sign = if im.is_sign_negative() { '-' } else { '+' };
                format!("{re_s} {sign}{im_s}i")
            }
        },
        Value::Str(s) => format!("\"{s}\""),
        Value::RealMatrix(m) => format!("[ {}x{} Matrix ]", m.rows(), m.cols()),
        Value::ComplexMatrix(m) => format!("[ {}x{} Cpx Matrix ]", m.rows(), m.cols()),
        Value::List(l) => format!("{{ {}-Elem List }}", l.len()),
    }
}

// NUMBER PARSING
// ================================================================================================

/// Parses the calculator's numeric text ("1.5", "-2.3E-4", comma radix tolerated).
pub fn parse_number(text: &str) -> Option<Scalar> {
    let cleaned: String = text
        .trim()
        .chars()
        .filter_map(|c| match c {
            ',' => Some('.'),
            'E' => Some('e'),
            c if c.is_ascii_digit() || matches!(c, '.' | '-' | '+' | 'e') => Some(c),
            _ => None,
        })
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<Scalar>().ok().filter(|x| !x.is_nan())
}

/// The reversed decimal digits of the integer part of `x`, for AIP-style appends.
pub fn ip_rev_digits(x: Scalar) -> Vec<u8> {
    let mut n = x.abs().floor();
    let mut out = Vec::new();
    if n == 0.0 {
        return vec![b'0'];
    }
    while n >= 1.0 && out.len() < 18 {
        let digit = (n % 10.0) as u8;
        out.push(b'0' + digit);
        n = (n / 10.0).floor();
    }
    if x < 0.0 {
        out.push(b'-');
    }
    out
}

// PROGRAM LISTING TEXT
// ================================================================================================

/// One listing line: command name plus argument in export syntax.
pub fn format_instruction(instr: &Instruction) -> String {
    let name = instr.cmd.spec().name;
    match &instr.arg {
        Arg::None => name.to_string(),
        Arg::Num(n) => format!("{name} {n:02}"),
        Arg::Stk(r) => format!("{name} ST {}", r.letter()),
        Arg::IndNum(n) => format!("{name} IND {n:02}"),
        Arg::IndStk(r) => format!("{name} IND ST {}", r.letter()),
        Arg::Str(s) => format!("{name} \"{s}\""),
        Arg::IndStr(s) => format!("{name} IND \"{s}\""),
        Arg::Literal(x) => {
            // number lines carry no command name
            let mut s = format!("{x}");
            if let Some(rest) = s.strip_prefix("inf") {
                s = format!("1E500{rest}");
            }
            s.replace('e', "E")
        },
    }
}

/// Parses one listing line back into an instruction.
pub fn parse_instruction(line: &str) -> Option<Instruction> {
    use rpn42_core::{Cmd, Ident, StackReg};

    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    // number lines first: they have no command name. Only lines made purely of numeric
    // syntax qualify, so "-" stays SUB and "10^X" stays a command.
    let numeric_syntax = line
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '.' | ',' | '-' | '+' | 'E' | 'e'));
    if numeric_syntax {
        if let Some(x) = parse_number(line) {
            return Some(Instruction::new(Cmd::Number, Arg::Literal(x)));
        }
    }
    let (name, rest) = match line.split_once(' ') {
        Some((n, r)) => (n, r.trim()),
        None => (line, ""),
    };
    let cmd = Cmd::from_name(name)?;
    if rest.is_empty() {
        return Some(Instruction::plain(cmd));
    }
    let (indirect, rest) = match rest.strip_prefix("IND ") {
        Some(r) => (true, r.trim()),
        None => (false, rest),
    };
    let arg = if let Some(r) = rest.strip_prefix("ST ") {
        let reg = StackReg::from_letter(r.trim().chars().next()?)?;
        if indirect { Arg::IndStk(reg) } else { Arg::Stk(reg) }
    } else if let Some(quoted) = rest.strip_prefix('"') {
        let name = Ident::new(quoted.strip_suffix('"')?.as_bytes()).ok()?;
        if indirect { Arg::IndStr(name) } else { Arg::Str(name) }
    } else {
        let n: u32 = rest.parse().ok()?;
        if indirect { Arg::IndNum(n) } else { Arg::Num(n) }
    };
    Some(Instruction::new(cmd, arg))
}

// TESTS
// ================================================================================================

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rpn42_core::{Cmd, Ident, StackReg};
    use rstest::rstest;

    use super::*;

    const PLAIN: Punct = Punct { comma_radix: false, thousands: false };

    #[test]
    fn fix_mode() {
        assert_eq!(format_scalar(3.14159, DispFormat::Fix(2), PLAIN), "3.14");
        assert_eq!(format_scalar(-0.5, DispFormat::Fix(4), PLAIN), "-0.5000");
    }

    #[test]
    fn fix_falls_back_to_sci_when_out_of_range() {
        let s = format_scalar(1.5e15, DispFormat::Fix(2), PLAIN);
        assert!(s.contains('E'), "{s}");
        let s = format_scalar(1.5e-9, DispFormat::Fix(2), PLAIN);
        assert!(s.contains("E-"), "{s}");
    }

    #[test]
    fn sci_and_eng() {
        assert_eq!(format_scalar(12345.0, DispFormat::Sci(3), PLAIN), "1.234E4");
        assert_eq!(format_scalar(12300.0, DispFormat::Eng(3), PLAIN), "12.30E3");
        assert_eq!(format_scalar(0.0, DispFormat::Eng(2), PLAIN), "0.00E0");
    }

    #[test]
    fn thousands_grouping_and_comma_radix() {
        let p = Punct { comma_radix: false, thousands: true };
        assert_eq!(format_scalar(1234567.5, DispFormat::Fix(2), p), "1,234,567.50");
        let p = Punct { comma_radix: true, thousands: true };
        assert_eq!(format_scalar(1234567.5, DispFormat::Fix(2), p), "1.234.567,50");
    }

    #[test]
    fn all_mode_is_shortest_roundtrip() {
        assert_eq!(format_scalar(0.1, DispFormat::All, PLAIN), "0.1");
        assert_eq!(format_scalar(3.0, DispFormat::All, PLAIN), "3");
    }

    #[test]
    fn base_rendering() {
        let modes = Modes { base: 16, wsize: 16, ..Modes::default() };
        assert_eq!(format_in_base(255.0, &modes, PLAIN), "FF");
        let modes = Modes { base: 2, wsize: 8, ..Modes::default() };
        assert_eq!(format_in_base(-1.0, &modes, PLAIN), "11111111");
    }

    #[test]
    fn complex_rendering() {
        let modes = Modes::default();
        let v = Value::complex(1.0, -2.0);
        let s = format_value(&v, &modes, PLAIN);
        assert!(s.ends_with("i"), "{s}");
        assert!(s.contains('-'), "{s}");
        let polar = Modes { polar: true, ..Modes::default() };
        assert!(format_value(&v, &polar, PLAIN).contains('\u{2221}'));
    }

    #[rstest]
    #[case("1.5", Some(1.5))]
    #[case("-2.25E-3", Some(-0.00225))]
    #[case("3,5", Some(3.5))]
    #[case("junk", None)]
    fn number_parsing(#[case] text: &str, #[case] expected: Option<Scalar>) {
        assert_eq!(parse_number(text), expected);
    }

    #[test]
    fn ip_digits_reversed() {
        assert_eq!(ip_rev_digits(1234.9), b"4321".to_vec());
        assert_eq!(ip_rev_digits(-42.0), b"24-".to_vec());
        assert_eq!(ip_rev_digits(0.7), b"0".to_vec());
    }

    #[rstest]
    #[case(Instruction::plain(Cmd::Add), "+")]
    #[case(Instruction::new(Cmd::Sf, Arg::Num(7)), "SF 07")]
    #[case(Instruction::new(Cmd::Sto, Arg::Stk(StackReg::L)), "STO ST L")]
    #[case(Instruction::new(Cmd::Rcl, Arg::IndNum(3)), "RCL IND 03")]
    #[case(
        Instruction::new(Cmd::Xeq, Arg::Str(Ident::new(b"FN").unwrap())),
        "XEQ \"FN\""
    )]
    #[case(Instruction::new(Cmd::Number, Arg::Literal(-4.5)), "-4.5")]
    fn listing_roundtrip(#[case] instr: Instruction, #[case] text: &str) {
        assert_eq!(format_instruction(&instr), text);
        assert_eq!(parse_instruction(text), Some(instr));
    }

    #[test]
    fn parse_rejects_garbage() {
        assert_eq!(parse_instruction("WAT 33"), None);
        assert_eq!(parse_instruction(""), None);
    }
}
