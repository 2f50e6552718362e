//! Hexadecimal floating-point text (`0x1.8p-1`).
//!
//! Chances cross the exec boundary as hex floats because the representation
//! is exact: every finite `f64` formats to a string that parses back to the
//! same bits. The output matches glibc's `%a` conversion so blobs written by
//! other encoders decode identically.

use thiserror::Error;

const MANTISSA_BITS: u32 = 52;
const MANTISSA_MASK: u64 = (1 << MANTISSA_BITS) - 1;
const EXPONENT_BIAS: i64 = 1023;
const MIN_EXPONENT: i64 = -1022;
const MAX_EXPONENT: i64 = 1023;

/// Errors from [`parse`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HexFloatError {
    #[error("empty number")]
    Empty,

    #[error("no hexadecimal digits")]
    NoDigits,

    #[error("invalid character {0:?}")]
    InvalidCharacter(char),

    #[error("missing binary exponent digits")]
    MissingExponent,

    #[error("value out of range")]
    Overflow,

    #[error("invalid decimal number")]
    InvalidDecimal,
}

/// Formats `value` the way C's `printf("%a")` does.
pub fn format(value: f64) -> String {
    let mut out = String::with_capacity(24);
    if value.is_sign_negative() {
        out.push('-');
    }
    if value.is_nan() {
        out.push_str("nan");
        return out;
    }
    if value.is_infinite() {
        out.push_str("inf");
        return out;
    }

    let bits = value.to_bits();
    let biased = ((bits >> MANTISSA_BITS) & 0x7ff) as i64;
    let mantissa = bits & MANTISSA_MASK;

    let (lead, exponent) = match (biased, mantissa) {
        (0, 0) => (0, 0),
        (0, _) => (0, MIN_EXPONENT),
        _ => (1, biased - EXPONENT_BIAS),
    };

    out.push_str(&format!("0x{lead}"));
    if mantissa != 0 {
        let digits = format!("{mantissa:013x}");
        out.push('.');
        out.push_str(digits.trim_end_matches('0'));
    }
    let sign = if exponent < 0 { '-' } else { '+' };
    out.push_str(&format!("p{sign}{}", exponent.unsigned_abs()));
    out
}

/// Parses a hexadecimal floating-point literal, rounding to nearest-even.
///
/// Text without a `0x` prefix is accepted as a decimal number, as `strtod`
/// would.
pub fn parse(text: &str) -> Result<f64, HexFloatError> {
    if text.is_empty() {
        return Err(HexFloatError::Empty);
    }

    let (negative, unsigned) = match text.as_bytes()[0] {
        b'-' => (true, &text[1..]),
        b'+' => (false, &text[1..]),
        _ => (false, text),
    };

    let Some(body) = unsigned
        .strip_prefix("0x")
        .or_else(|| unsigned.strip_prefix("0X"))
    else {
        return text.parse::<f64>().map_err(|_| HexFloatError::InvalidDecimal);
    };

    let magnitude = parse_hex_body(body)?;
    Ok(if negative { -magnitude } else { magnitude })
}

fn parse_hex_body(body: &str) -> Result<f64, HexFloatError> {
    let mut mantissa: u64 = 0;
    let mut exponent: i64 = 0;
    let mut sticky = false;
    let mut seen_digit = false;
    let mut seen_point = false;

    let mut chars = body.char_indices().peekable();
    while let Some(&(_, c)) = chars.peek() {
        match c {
            '.' if !seen_point => seen_point = true,
            'p' | 'P' => break,
            _ => {
                let digit = c.to_digit(16).ok_or(HexFloatError::InvalidCharacter(c))?;
                seen_digit = true;
                if mantissa >> 60 == 0 {
                    mantissa = (mantissa << 4) | u64::from(digit);
                    if seen_point {
                        exponent -= 4;
                    }
                } else {
                    // Out of room: the digit only affects rounding.
                    sticky |= digit != 0;
                    if !seen_point {
                        exponent += 4;
                    }
                }
            }
        }
        chars.next();
    }

    if !seen_digit {
        return Err(HexFloatError::NoDigits);
    }

    if let Some((index, _)) = chars.next() {
        exponent = exponent.saturating_add(parse_binary_exponent(&body[index + 1..])?);
    }

    compose(mantissa, exponent, sticky)
}

fn parse_binary_exponent(text: &str) -> Result<i64, HexFloatError> {
    let (negative, digits) = match text.as_bytes().first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    };
    if digits.is_empty() {
        return Err(HexFloatError::MissingExponent);
    }

    let mut value: i64 = 0;
    for c in digits.chars() {
        let digit = c.to_digit(10).ok_or(HexFloatError::InvalidCharacter(c))?;
        // Clamp well past the representable range; the result is the same.
        value = (value * 10 + i64::from(digit)).min(1 << 20);
    }
    Ok(if negative { -value } else { value })
}

/// Builds the nearest `f64` to `mantissa * 2^exponent`, with `sticky`
/// standing for nonzero digits that did not fit in `mantissa`.
fn compose(mantissa: u64, exponent: i64, sticky: bool) -> Result<f64, HexFloatError> {
    if mantissa == 0 {
        return Ok(0.0);
    }

    let shift = mantissa.leading_zeros();
    let normalized = mantissa << shift;
    // Exponent of the leading one bit.
    let mut leading = exponent + 63 - i64::from(shift);

    if leading > MAX_EXPONENT {
        return Err(HexFloatError::Overflow);
    }

    if leading >= MIN_EXPONENT {
        let mut kept = round_shift(normalized, 63 - MANTISSA_BITS, sticky);
        if kept == 1 << (MANTISSA_BITS + 1) {
            kept >>= 1;
            leading += 1;
            if leading > MAX_EXPONENT {
                return Err(HexFloatError::Overflow);
            }
        }
        let biased = (leading + EXPONENT_BIAS) as u64;
        return Ok(f64::from_bits((biased << MANTISSA_BITS) | (kept & MANTISSA_MASK)));
    }

    // Subnormal: drop the extra bits below 2^-1074. A carry into bit 52
    // yields the smallest normal number, which the bit pattern encodes
    // directly.
    let deficit = (MIN_EXPONENT - leading).min(128) as u32;
    let kept = round_shift(normalized, 63 - MANTISSA_BITS + deficit, sticky);
    Ok(f64::from_bits(kept))
}

/// Shifts `value` right by `shift` bits, rounding to nearest, ties to even.
fn round_shift(value: u64, shift: u32, sticky: bool) -> u64 {
    if shift == 0 {
        return value;
    }
    if shift > 64 {
        return 0;
    }

    let kept = if shift == 64 { 0 } else { value >> shift };
    let remainder = if shift == 64 {
        value
    } else {
        value & ((1 << shift) - 1)
    };
    let half = 1u64 << (shift - 1);

    let round_up = remainder > half || (remainder == half && (sticky || kept & 1 == 1));
    kept + u64::from(round_up)
}
