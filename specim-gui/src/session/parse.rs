//! Parsing of the numeric text fields.

use specim_core::{Error, Result};

/// Parse a single finite number.
///
/// # Errors
/// Returns an error if the text is not a finite number.
pub fn parse_number(text: &str) -> Result<f64> {
    let trimmed = text.trim();
    let value: f64 = trimmed
        .parse()
        .map_err(|_| Error::InvalidParameter(format!("'{trimmed}' is not a number")))?;
    if value.is_finite() {
        Ok(value)
    } else {
        Err(Error::InvalidParameter(format!("'{trimmed}' is not finite")))
    }
}

/// Parse a pair such as `(5, 95)`, `[5 95]` or `5,95`.
///
/// # Errors
/// Returns an error unless the text holds exactly two finite numbers.
pub fn parse_pair(text: &str) -> Result<(f64, f64)> {
    let inner = text
        .trim()
        .trim_start_matches(['(', '['])
        .trim_end_matches([')', ']']);
    let parts: Vec<&str> = inner
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|p| !p.is_empty())
        .collect();
    match parts.as_slice() {
        [a, b] => Ok((parse_number(a)?, parse_number(b)?)),
        _ => Err(Error::InvalidParameter(format!(
            "expected two numbers, got '{}'",
            text.trim()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pair_formats() {
        assert_eq!(parse_pair("(5, 95)").unwrap(), (5.0, 95.0));
        assert_eq!(parse_pair("[10 90]").unwrap(), (10.0, 90.0));
        assert_eq!(parse_pair(" 1,2 ").unwrap(), (1.0, 2.0));
    }

    #[test]
    fn test_rejects_expressions() {
        assert!(parse_pair("(5, 95, 3)").is_err());
        assert!(parse_pair("__import__('os')").is_err());
        assert!(parse_number("2*3").is_err());
        assert!(parse_number("inf").is_err());
        assert_eq!(parse_number(" 7.5 ").unwrap(), 7.5);
    }
}
