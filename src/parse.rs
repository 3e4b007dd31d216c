//! Line parsing: `<key>;<sign>?<digits>(.<digit>)?` into a key and a value in tenths.

use memchr::memrchr;

use crate::error::ParseError;

const DELIMITER: u8 = b';';

/// One parsed record. The key borrows from the chunk it was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Line<'a> {
    pub key: &'a str,
    /// Fixed-point value scaled by 10.
    pub value: i64,
}

/// Parse a single line without its terminator.
///
/// The key ends at the *last* `;` so keys may contain the delimiter themselves.
pub fn parse_line(line: &[u8]) -> Result<Line<'_>, ParseError> {
    let split = memrchr(DELIMITER, line).ok_or(ParseError::MissingDelimiter)?;
    let key = std::str::from_utf8(&line[..split]).map_err(|_| ParseError::InvalidKey)?;
    let value = parse_value(&line[split + 1..])?;
    Ok(Line { key, value })
}

/// Parse a decimal with at most one fractional digit into tenths.
///
/// `"-3.2"` is `-32`, `"12"` is `120`.
pub fn parse_value(bytes: &[u8]) -> Result<i64, ParseError> {
    let mut negative = false;
    let mut value: i64 = 0;
    let mut digits = 0usize;
    // Number of digits seen after the '.', once there is one.
    let mut fraction: Option<u8> = None;

    for (position, &byte) in bytes.iter().enumerate() {
        match byte {
            b'-' if position == 0 => negative = true,
            b'.' if fraction.is_none() => fraction = Some(0),
            b'0'..=b'9' => {
                if let Some(seen) = fraction.as_mut() {
                    if *seen == 1 {
                        return Err(ParseError::ExcessPrecision);
                    }
                    *seen += 1;
                }
                value = value
                    .checked_mul(10)
                    .and_then(|v| v.checked_add(i64::from(byte - b'0')))
                    .ok_or(ParseError::Overflow)?;
                digits += 1;
            }
            _ => return Err(ParseError::InvalidByte { byte, position }),
        }
    }

    if digits == 0 {
        return Err(ParseError::EmptyValue);
    }
    if fraction.unwrap_or(0) == 0 {
        value = value.checked_mul(10).ok_or(ParseError::Overflow)?;
    }
    Ok(if negative { -value } else { value })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::FixedPoint;

    #[test]
    fn parses_key_and_tenths() {
        assert_eq!(
            parse_line(b"Tokyo;35.6"),
            Ok(Line {
                key: "Tokyo",
                value: 356
            })
        );
        assert_eq!(parse_line(b"Paris;-3.2").map(|l| l.value), Ok(-32));
        assert_eq!(parse_line(b"Oslo;0.0").map(|l| l.value), Ok(0));
        assert_eq!(parse_line(b"Oslo;-0.7").map(|l| l.value), Ok(-7));
    }

    #[test]
    fn splits_on_last_delimiter() {
        let line = parse_line(b"a;b;c;1.5").unwrap();
        assert_eq!(line.key, "a;b;c");
        assert_eq!(line.value, 15);
    }

    #[test]
    fn integer_values_are_scaled() {
        assert_eq!(parse_value(b"12"), Ok(120));
        assert_eq!(parse_value(b"12."), Ok(120));
        assert_eq!(parse_value(b"-4"), Ok(-40));
    }

    #[test]
    fn malformed_values() {
        assert_eq!(parse_line(b"Tokyo 35.6"), Err(ParseError::MissingDelimiter));
        assert_eq!(parse_line(b""), Err(ParseError::MissingDelimiter));
        assert_eq!(parse_value(b""), Err(ParseError::EmptyValue));
        assert_eq!(parse_value(b"-"), Err(ParseError::EmptyValue));
        assert_eq!(parse_value(b"."), Err(ParseError::EmptyValue));
        assert_eq!(parse_value(b"1.25"), Err(ParseError::ExcessPrecision));
        assert_eq!(
            parse_value(b"1x"),
            Err(ParseError::InvalidByte {
                byte: b'x',
                position: 1
            })
        );
        assert_eq!(
            parse_value(b"1-2"),
            Err(ParseError::InvalidByte {
                byte: b'-',
                position: 1
            })
        );
        assert_eq!(
            parse_value(b"1.2.3"),
            Err(ParseError::InvalidByte {
                byte: b'.',
                position: 3
            })
        );
        assert_eq!(
            parse_value(b"99999999999999999999"),
            Err(ParseError::Overflow)
        );
        assert_eq!(parse_line(b"\xff\xfe;1.0"), Err(ParseError::InvalidKey));
    }

    #[test]
    fn one_decimal_values_round_trip() {
        for tenths in -999i64..=999 {
            let text = FixedPoint(tenths).to_string();
            let line = format!("Station;{text}");
            let parsed = parse_line(line.as_bytes()).unwrap();
            assert_eq!(parsed.value, tenths, "{line}");
            assert_eq!(FixedPoint(parsed.value).to_string(), text);
        }
    }
}
