use crate::error::ApiError;
use serde_json::Value;

/// Inbound-form contract for anonymous messages, enforced server-side.
pub(crate) fn validate_message_content(content: &str) -> Result<(), &'static str> {
    let len = content.chars().count();
    if len < 10 {
        return Err("Message must be at least 10 characters long");
    }
    if len > 500 {
        return Err("Message must be less than 500 characters long");
    }
    Ok(())
}

/// The acceptance flag must arrive as a JSON boolean; anything else is
/// rejected rather than coerced.
pub(crate) fn parse_accept_flag(body: &Value) -> Result<bool, ApiError> {
    body.get("acceptMessages")
        .and_then(Value::as_bool)
        .ok_or_else(|| {
            ApiError::InvalidInput("Invalid input for acceptMessages. Must be a boolean.".into())
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn content_length_bounds() {
        assert!(validate_message_content("123456789").is_err());
        assert!(validate_message_content("1234567890").is_ok());
        assert!(validate_message_content(&"a".repeat(500)).is_ok());
        assert!(validate_message_content(&"a".repeat(501)).is_err());
    }

    #[test]
    fn content_length_counts_characters_not_bytes() {
        // ten multi-byte characters pass even though the byte length is larger
        assert!(validate_message_content("éééééééééé").is_ok());
    }

    #[test]
    fn accept_flag_accepts_booleans_only() {
        assert!(parse_accept_flag(&json!({ "acceptMessages": true })).unwrap());
        assert!(!parse_accept_flag(&json!({ "acceptMessages": false })).unwrap());

        assert!(parse_accept_flag(&json!({ "acceptMessages": "true" })).is_err());
        assert!(parse_accept_flag(&json!({ "acceptMessages": 1 })).is_err());
        assert!(parse_accept_flag(&json!({ "acceptMessages": null })).is_err());
        assert!(parse_accept_flag(&json!({})).is_err());
    }
}
