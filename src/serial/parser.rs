/// Parsing of the ASCII weight frames sent by the scale
use crate::models::{Reading, MAX_WEIGHT, MIN_WEIGHT, WEIGHT_UNIT};

/// Why a line did not produce a reading
///
/// Rejections are routine noise (the scale sends partial frames while
/// settling) and never count as a connection fault.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParseRejection {
    #[error("line is not ASCII")]
    NotAscii,

    #[error("empty line")]
    Empty,

    #[error("missing 'kg' unit")]
    MissingUnit,

    #[error("negative weight '{0}'")]
    NegativeValue(String),

    #[error("invalid number '{0}'")]
    InvalidNumber(String),

    #[error("weight {0} out of expected range")]
    OutOfRange(f64),
}

/// Parse one frame such as `+0012.45kg` into a weight
///
/// Frame handling:
/// - Surrounding whitespace and control characters are trimmed
/// - The unit token is matched case-insensitively and removed
/// - A single leading `+` is accepted, a leading `-` is rejected
/// - The value must lie within the device bounds, inclusive
///
/// # Arguments
/// * `line` - Raw bytes of one line, with or without the terminator
///
/// # Returns
/// The weight in kilograms, or the reason the line was rejected
pub fn parse_weight(line: &[u8]) -> Result<f64, ParseRejection> {
    if !line.is_ascii() {
        return Err(ParseRejection::NotAscii);
    }
    // ASCII is valid UTF-8
    let text = String::from_utf8_lossy(line);
    let text = text.trim_matches(|c: char| c.is_ascii_whitespace() || c.is_ascii_control());
    if text.is_empty() {
        return Err(ParseRejection::Empty);
    }

    let lower = text.to_ascii_lowercase();
    if !lower.contains(WEIGHT_UNIT) {
        return Err(ParseRejection::MissingUnit);
    }

    let stripped = lower.replace(WEIGHT_UNIT, "");
    let number = stripped.trim();
    let number = number.strip_prefix('+').unwrap_or(number).trim_start();
    if number.starts_with('-') {
        return Err(ParseRejection::NegativeValue(number.to_string()));
    }

    let weight: f64 = number
        .parse()
        .map_err(|_| ParseRejection::InvalidNumber(number.to_string()))?;

    if !weight.is_finite() || !(MIN_WEIGHT..=MAX_WEIGHT).contains(&weight) {
        return Err(ParseRejection::OutOfRange(weight));
    }

    Ok(weight)
}

/// Parse a line into a timestamped reading
pub fn parse_reading(line: &[u8]) -> Result<Reading, ParseRejection> {
    parse_weight(line).map(Reading::new)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_signed_frame() {
        assert_eq!(parse_weight(b"+0012.45kg\n"), Ok(12.45));
    }

    #[test]
    fn parses_frame_variants() {
        assert_eq!(parse_weight(b"0012.45kg"), Ok(12.45));
        assert_eq!(parse_weight(b"  +0100.00 KG\r\n"), Ok(100.0));
        assert_eq!(parse_weight(b"\x02+0007.50Kg\x03\r\n"), Ok(7.5));
        assert_eq!(parse_weight(b"0042kg"), Ok(42.0));
    }

    #[test]
    fn accepts_bounds_inclusive() {
        assert_eq!(parse_weight(b"+0000.00kg"), Ok(0.0));
        assert_eq!(parse_weight(b"+0500.00kg"), Ok(500.0));
    }

    #[test]
    fn rejects_out_of_range() {
        assert_eq!(
            parse_weight(b"0600.00kg\n"),
            Err(ParseRejection::OutOfRange(600.0))
        );
        assert_eq!(
            parse_weight(b"+0500.01kg"),
            Err(ParseRejection::OutOfRange(500.01))
        );
        assert!(matches!(
            parse_weight(b"infkg"),
            Err(ParseRejection::OutOfRange(_))
        ));
        assert!(matches!(
            parse_weight(b"nankg"),
            Err(ParseRejection::OutOfRange(_))
        ));
    }

    #[test]
    fn rejects_negative_sign() {
        assert_eq!(
            parse_weight(b"-0005.00kg\n"),
            Err(ParseRejection::NegativeValue("-0005.00".to_string()))
        );
        assert!(matches!(
            parse_weight(b"-0000.00kg"),
            Err(ParseRejection::NegativeValue(_))
        ));
    }

    #[test]
    fn rejects_missing_unit() {
        assert_eq!(parse_weight(b"abcxyz\n"), Err(ParseRejection::MissingUnit));
        assert_eq!(parse_weight(b"+0012.45\n"), Err(ParseRejection::MissingUnit));
    }

    #[test]
    fn rejects_garbage_number() {
        assert_eq!(
            parse_weight(b"+00x2.45kg"),
            Err(ParseRejection::InvalidNumber("00x2.45".to_string()))
        );
        assert_eq!(
            parse_weight(b"kg"),
            Err(ParseRejection::InvalidNumber(String::new()))
        );
        assert!(matches!(
            parse_weight(b"12.4.5kg"),
            Err(ParseRejection::InvalidNumber(_))
        ));
    }

    #[test]
    fn rejects_non_ascii_and_empty() {
        assert_eq!(parse_weight(b"+0012.45\xffkg"), Err(ParseRejection::NotAscii));
        assert_eq!(parse_weight(b"\r\n"), Err(ParseRejection::Empty));
        assert_eq!(parse_weight(b""), Err(ParseRejection::Empty));
    }

    #[test]
    fn reading_carries_unit_and_weight() {
        let reading = parse_reading(b"+0012.45kg\n").unwrap();
        assert_eq!(reading.weight, 12.45);
        assert_eq!(reading.unit, "kg");
        assert_eq!(reading.captured_at.offset(), time::UtcOffset::UTC);
    }
}
