//! Identifier rules shared by pipelines and consumers
//!
//! Ids are embedded in store keys separated by `:`, so the separator must never appear
//! inside an id.

use validator::ValidationError;

use crate::ContractError;

/// Maximum identifier length in characters
pub const MAX_IDENTIFIER_LEN: usize = 128;

/// Check a pipeline or consumer id
///
/// Allowed: 1..=128 characters from `[A-Za-z0-9_.-]`.
pub fn validate_identifier(id: &str) -> Result<(), ValidationError> {
    if id.is_empty() {
        return Err(error("identifier_empty", "identifier must not be empty"));
    }
    if id.chars().count() > MAX_IDENTIFIER_LEN {
        return Err(error(
            "identifier_too_long",
            "identifier must be at most 128 characters",
        ));
    }
    if !id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
    {
        return Err(error(
            "identifier_charset",
            "identifier may only contain [A-Za-z0-9_.-]",
        ));
    }
    Ok(())
}

/// Check an id, reporting failures as `ContractError::Validation` on `field`
pub fn ensure_identifier(field: &str, id: &str) -> Result<(), ContractError> {
    validate_identifier(id).map_err(|e| {
        let message = e
            .message
            .map_or_else(|| e.code.to_string(), |m| m.to_string());
        ContractError::validation(field, message)
    })
}

fn error(code: &'static str, message: &'static str) -> ValidationError {
    ValidationError::new(code).with_message(message.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_uuid_and_names() {
        assert!(validate_identifier("p1").is_ok());
        assert!(validate_identifier("0f8fad5b-d9cb-469f-a165-70867728950e").is_ok());
        assert!(validate_identifier("orders.eu_west-1").is_ok());
    }

    #[test]
    fn test_rejects_separator_and_empty() {
        assert!(validate_identifier("").is_err());
        assert!(validate_identifier("a:b").is_err());
        assert!(validate_identifier("with space").is_err());
        assert!(validate_identifier(&"x".repeat(129)).is_err());
    }

    #[test]
    fn test_ensure_identifier_names_field() {
        let err = ensure_identifier("consumer", "a:b").unwrap_err();
        assert!(matches!(err, ContractError::Validation { ref field, .. } if field == "consumer"));
    }
}
