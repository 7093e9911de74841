use atoi::{FromRadix10Checked, FromRadix10SignedChecked};

use crate::{Error, sys::Numeric};

/// Maximum number of digits a packed decimal holds.
pub const MAX_PRECISION: u8 = 38;

/// Decimal parsed from its text representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedDecimal {
    pub negative: bool,
    /// Absolute value times ten to the power of the requested scale.
    pub scaled: u128,
    /// `true` if non zero digits beyond the requested scale have been dropped.
    pub fraction_truncated: bool,
}

impl ParsedDecimal {
    /// Signed integer part, with the fraction removed.
    pub fn signed_scaled(&self) -> Option<i128> {
        let magnitude = i128::try_from(self.scaled).ok()?;
        Some(if self.negative { -magnitude } else { magnitude })
    }
}

/// Convert the text representation of a decimal into an integer representation. The integer
/// representation is not truncating the fraction, but is instead the value of the decimal times 10
/// to the power of scale. E.g. 123.45 of a Decimal with scale 3 is thought of as 123.450 and
/// represented as 123450. Digits beyond `scale` are dropped and reported.
///
/// Leading and trailing whitespace is ignored. Anything but an optional sign, digits and a single
/// `.` is an [`Error::InvalidCharacterValue`]. Values too large for 128 Bit are an
/// [`Error::ConversionRange`].
pub fn parse_decimal(text: &[u8], scale: usize) -> Result<ParsedDecimal, Error> {
    let text = text.trim_ascii();
    let invalid = || Error::InvalidCharacterValue(String::from_utf8_lossy(text).into_owned());
    let out_of_range = || Error::ConversionRange(String::from_utf8_lossy(text).into_owned());

    let (negative, unsigned) = match text.first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    };
    let (integer, fraction) = match unsigned.iter().position(|&b| b == b'.') {
        Some(dot) => (&unsigned[..dot], &unsigned[dot + 1..]),
        None => (unsigned, &[][..]),
    };
    if integer.is_empty() && fraction.is_empty() {
        return Err(invalid());
    }
    if !integer.iter().chain(fraction).all(u8::is_ascii_digit) {
        return Err(invalid());
    }

    let (high, _) = u128::from_radix_10_checked(integer);
    let mut scaled = high.ok_or_else(out_of_range)?;
    for position in 0..scale {
        let digit = fraction.get(position).map_or(0, |d| u128::from(d - b'0'));
        scaled = scaled
            .checked_mul(10)
            .and_then(|n| n.checked_add(digit))
            .ok_or_else(out_of_range)?;
    }
    let fraction_truncated = fraction
        .get(scale..)
        .is_some_and(|rest| rest.iter().any(|&d| d != b'0'));

    Ok(ParsedDecimal {
        negative: negative && scaled != 0,
        scaled,
        fraction_truncated,
    })
}

/// Parses an integer, accepting a fraction which is truncated. The second element reports whether
/// non zero fractional digits have been dropped.
pub fn parse_integer(text: &[u8]) -> Result<(i128, bool), Error> {
    let trimmed = text.trim_ascii();
    // Fast path for the common case of plain integers.
    let (value, digits) = i64::from_radix_10_signed_checked(trimmed);
    if digits == trimmed.len() && digits != 0 {
        if let Some(value) = value {
            return Ok((i128::from(value), false));
        }
    }
    let parsed = parse_decimal(trimmed, 0)?;
    let value = parsed
        .signed_scaled()
        .ok_or_else(|| Error::ConversionRange(String::from_utf8_lossy(trimmed).into_owned()))?;
    Ok((value, parsed.fraction_truncated))
}

/// Number of decimal digits of `n`. Zero has one digit.
fn num_digits(mut n: u128) -> u8 {
    let mut digits = 1;
    while n >= 10 {
        n /= 10;
        digits += 1;
    }
    digits
}

/// Packs the decimal text into a numeric struct of the given precision and scale.
///
/// Fails with [`Error::ConversionRange`] before producing anything if the value needs more digits
/// than `precision`. The second element reports fractional truncation.
pub fn text_to_numeric(text: &[u8], precision: u8, scale: i8) -> Result<(Numeric, bool), Error> {
    let out_of_range = || Error::ConversionRange(String::from_utf8_lossy(text).into_owned());
    // Sign, radix character and the digits of the largest precision.
    if text.trim_ascii().len() > usize::from(MAX_PRECISION) + 2 {
        return Err(out_of_range());
    }
    let precision = if precision == 0 || precision > MAX_PRECISION {
        MAX_PRECISION
    } else {
        precision
    };
    let scale = scale.max(0);
    let parsed = parse_decimal(text, scale as usize)?;
    if num_digits(parsed.scaled) > precision {
        return Err(out_of_range());
    }
    let numeric = Numeric {
        precision,
        scale,
        sign: if parsed.negative { 0 } else { 1 },
        val: parsed.scaled.to_le_bytes(),
    };
    Ok((numeric, parsed.fraction_truncated))
}

/// Text representation of a numeric struct, e.g. `-12.50` for scale 2.
pub fn numeric_to_text(numeric: &Numeric) -> String {
    let magnitude = u128::from_le_bytes(numeric.val);
    let digits = magnitude.to_string();
    let sign = if numeric.sign == 0 && magnitude != 0 {
        "-"
    } else {
        ""
    };
    if numeric.scale <= 0 {
        let zeros = "0".repeat(numeric.scale.unsigned_abs() as usize);
        let zeros = if magnitude == 0 { "" } else { zeros.as_str() };
        return format!("{sign}{digits}{zeros}");
    }
    let scale = numeric.scale as usize;
    let padded = format!("{digits:0>width$}", width = scale + 1);
    let (integer, fraction) = padded.split_at(padded.len() - scale);
    format!("{sign}{integer}.{fraction}")
}
