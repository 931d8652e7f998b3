use thiserror::Error;

/// Money is held as integer minor units (paise for INR, cents for USD/EUR).
/// ₹1,250.50 = 125050.
pub type Cents = i64;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseCentsError {
    #[error("empty amount")]
    Empty,
    #[error("invalid money format")]
    InvalidFormat,
    #[error("amount out of range")]
    OutOfRange,
}

/// Format minor units as a plain decimal string: 125050 -> "1250.50".
pub fn format_cents(cents: Cents) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    format!("{}{}.{:02}", sign, abs / 100, abs % 100)
}

/// Parse a decimal string into minor units.
/// Digits past the second decimal place are truncated, thousands separators
/// (`,` and `_`) are ignored: "1,250.5" -> 125050.
pub fn parse_cents(input: &str) -> Result<Cents, ParseCentsError> {
    let cleaned: String = input
        .trim()
        .chars()
        .filter(|c| *c != ',' && *c != '_')
        .collect();
    if cleaned.is_empty() {
        return Err(ParseCentsError::Empty);
    }

    let (negative, digits) = match cleaned.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, cleaned.strip_prefix('+').unwrap_or(cleaned.as_str())),
    };

    let (whole, fraction) = digits.split_once('.').unwrap_or((digits, ""));
    if whole.is_empty() && fraction.is_empty() {
        return Err(ParseCentsError::InvalidFormat);
    }
    if !whole.chars().chain(fraction.chars()).all(|c| c.is_ascii_digit()) {
        return Err(ParseCentsError::InvalidFormat);
    }

    let units: i64 = if whole.is_empty() {
        0
    } else {
        whole.parse().map_err(|_| ParseCentsError::OutOfRange)?
    };

    let mut fraction_cents = 0;
    for (i, digit) in fraction.chars().take(2).enumerate() {
        let value = i64::from(digit.to_digit(10).ok_or(ParseCentsError::InvalidFormat)?);
        fraction_cents += if i == 0 { value * 10 } else { value };
    }

    let cents = units
        .checked_mul(100)
        .and_then(|c| c.checked_add(fraction_cents))
        .ok_or(ParseCentsError::OutOfRange)?;

    Ok(if negative { -cents } else { cents })
}

/// Share of `part` in `total` as a percentage; 0 when `total` is 0.
pub fn percentage_of(part: Cents, total: Cents) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64 * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_cents() {
        assert_eq!(format_cents(125050), "1250.50");
        assert_eq!(format_cents(1250), "12.50");
        assert_eq!(format_cents(7), "0.07");
        assert_eq!(format_cents(0), "0.00");
        assert_eq!(format_cents(-2500), "-25.00");
    }

    #[test]
    fn test_parse_cents() {
        assert_eq!(parse_cents("180"), Ok(18000));
        assert_eq!(parse_cents("12.5"), Ok(1250));
        assert_eq!(parse_cents("12.50"), Ok(1250));
        assert_eq!(parse_cents(".25"), Ok(25));
        assert_eq!(parse_cents("1,250.50"), Ok(125050));
        assert_eq!(parse_cents("-4.2"), Ok(-420));
        assert_eq!(parse_cents("+3"), Ok(300));
        assert_eq!(parse_cents("99.999"), Ok(9999)); // Truncates
    }

    #[test]
    fn test_parse_cents_invalid() {
        assert_eq!(parse_cents(""), Err(ParseCentsError::Empty));
        assert_eq!(parse_cents("abc"), Err(ParseCentsError::InvalidFormat));
        assert_eq!(parse_cents("1.2.3"), Err(ParseCentsError::InvalidFormat));
        assert_eq!(parse_cents("."), Err(ParseCentsError::InvalidFormat));
        assert_eq!(parse_cents("NaN"), Err(ParseCentsError::InvalidFormat));
        assert_eq!(
            parse_cents("99999999999999999999"),
            Err(ParseCentsError::OutOfRange)
        );
    }

    #[test]
    fn test_percentage_of_zero_total() {
        assert_eq!(percentage_of(0, 0), 0.0);
        assert_eq!(percentage_of(50, 200), 25.0);
    }
}
