//! Error types for the Killwatch core crate.

use thiserror::Error;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while decoding feed data or building a watchlist.
#[derive(Error, Debug)]
pub enum Error {
    /// A watchlist entry is not a valid entity id.
    #[error("invalid entity id '{value}': {reason}")]
    InvalidEntityId {
        /// The raw value as it appeared in the input.
        value: String,
        /// Description of what's wrong.
        reason: String,
    },

    /// JSON parsing error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_entity_id_display() {
        let err = Error::InvalidEntityId {
            value: "abc".to_string(),
            reason: "invalid digit found in string".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("'abc'"));
        assert!(msg.contains("invalid digit"));
    }

    #[test]
    fn test_from_json_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Json(_)));
        assert!(err.to_string().starts_with("JSON error"));
    }
}
