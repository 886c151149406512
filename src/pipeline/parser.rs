//! Decodes the comma-delimited wire payload into numbers.

use crate::error::ParseError;

use super::types::NumericVector;

const DELIMITER: char = ',';

/// Parse a payload like `"0.0,1.2,3.4"` into its numeric fields.
///
/// An empty (or whitespace-only) payload yields an empty vector; rejecting
/// it is the splitter's job. A single bad token fails the whole payload.
pub fn parse(payload: &str) -> Result<NumericVector, ParseError> {
    if payload.trim().is_empty() {
        return Ok(Vec::new());
    }

    payload
        .split(DELIMITER)
        .enumerate()
        .map(|(position, raw)| parse_field(position, raw))
        .collect()
}

fn parse_field(position: usize, raw: &str) -> Result<f64, ParseError> {
    let token = raw.trim();
    match token.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(ParseError::InvalidNumber {
            position,
            token: token.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_in_order() {
        let v = parse("0.0,1.2,3.4,5.6").unwrap();
        assert_eq!(v, vec![0.0, 1.2, 3.4, 5.6]);
    }

    #[test]
    fn tolerates_whitespace_and_trailing_newline() {
        let v = parse(" 1, -2.5e1 ,3\n").unwrap();
        assert_eq!(v, vec![1.0, -25.0, 3.0]);
    }

    #[test]
    fn empty_payload_is_empty_vector() {
        assert!(parse("").unwrap().is_empty());
        assert!(parse("  \r\n").unwrap().is_empty());
    }

    #[test]
    fn bad_token_fails_whole_payload() {
        let err = parse("1.0,abc,3.0").unwrap_err();
        assert_eq!(
            err,
            ParseError::InvalidNumber {
                position: 1,
                token: "abc".into()
            }
        );
    }

    #[test]
    fn empty_field_between_delimiters_is_invalid() {
        let err = parse("1.0,,3.0").unwrap_err();
        assert!(matches!(err, ParseError::InvalidNumber { position: 1, .. }));
    }

    #[test]
    fn non_finite_values_are_rejected() {
        assert!(parse("NaN,1").is_err());
        assert!(parse("1,inf").is_err());
    }
}
