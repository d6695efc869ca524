use regex::Regex;
use std::sync::LazyLock;

use crate::error::{GatewayError, Result};

/// TMDB refuses pages past this index.
pub const MAX_PAGE: u32 = 500;

static NUMERIC: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[0-9]+$").unwrap());

/// Request validation utilities
pub struct RequestValidator;

impl RequestValidator {
    /// Parses a path identifier. Anything that is not a plain non-negative
    /// integer is reported the same way as an id that does not exist.
    pub fn parse_id(raw: &str) -> Result<u64> {
        if !NUMERIC.is_match(raw) {
            return Err(GatewayError::NotFound(format!("no resource with id '{}'", raw)));
        }

        raw.parse::<u64>()
            .map_err(|_| GatewayError::NotFound(format!("no resource with id '{}'", raw)))
    }

    /// Resolves the `page` query parameter.
    ///
    /// Absent, empty, zero and overflowing values select the first page;
    /// values past [`MAX_PAGE`] are clamped. Non-numeric values are rejected.
    pub fn parse_page(raw: Option<&str>) -> Result<u32> {
        let raw = match raw.map(str::trim) {
            None | Some("") => return Ok(1),
            Some(raw) => raw,
        };

        if !NUMERIC.is_match(raw) {
            return Err(GatewayError::NotFound(format!("no page '{}'", raw)));
        }

        match raw.parse::<u32>() {
            Ok(0) | Err(_) => Ok(1),
            Ok(page) => Ok(page.min(MAX_PAGE)),
        }
    }

    /// Rate limiter keys are short route names such as `movie:detail`
    pub fn validate_key(key: &str) -> Result<()> {
        if key.is_empty() {
            return Err(GatewayError::ValidationError(
                "Rate limit key cannot be empty".to_string(),
            ));
        }

        if key.len() > 128 {
            return Err(GatewayError::ValidationError(
                "Rate limit key is too long".to_string(),
            ));
        }

        if !key.chars().all(|c| c.is_alphanumeric() || c == ':' || c == '-' || c == '_') {
            return Err(GatewayError::ValidationError(
                "Rate limit key may only contain letters, digits, ':', '-' and '_'".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_id() {
        assert_eq!(RequestValidator::parse_id("550").unwrap(), 550);
        assert_eq!(RequestValidator::parse_id("0").unwrap(), 0);
    }

    #[test]
    fn test_invalid_ids_are_not_found() {
        for raw in ["-1", "somestring", "", "5.5", "+7", " 1", "99999999999999999999999"] {
            let err = RequestValidator::parse_id(raw).unwrap_err();
            assert!(matches!(err, GatewayError::NotFound(_)), "{raw:?} gave {err:?}");
        }
    }

    #[test]
    fn test_page_defaults_to_first() {
        assert_eq!(RequestValidator::parse_page(None).unwrap(), 1);
        assert_eq!(RequestValidator::parse_page(Some("")).unwrap(), 1);
        assert_eq!(RequestValidator::parse_page(Some("0")).unwrap(), 1);
        assert_eq!(RequestValidator::parse_page(Some("00")).unwrap(), 1);
        assert_eq!(RequestValidator::parse_page(Some("99999999999")).unwrap(), 1);
    }

    #[test]
    fn test_page_values() {
        assert_eq!(RequestValidator::parse_page(Some("2")).unwrap(), 2);
        assert_eq!(RequestValidator::parse_page(Some("501")).unwrap(), MAX_PAGE);
    }

    #[test]
    fn test_non_numeric_page_is_not_found() {
        for raw in ["somestring", "-1", "1a"] {
            let err = RequestValidator::parse_page(Some(raw)).unwrap_err();
            assert!(matches!(err, GatewayError::NotFound(_)));
        }
    }

    #[test]
    fn test_validate_key() {
        assert!(RequestValidator::validate_key("movie:detail").is_ok());
        assert!(RequestValidator::validate_key("").is_err());
        assert!(RequestValidator::validate_key("invalid key!").is_err());
    }
}
