//! Error types for the relay.

use thiserror::Error;

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum RelayError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// The selected provider could not be reached or answered with a non-2xx
    /// status. `details` is the upstream body (parsed when it is JSON) or the
    /// transport error message.
    #[error("Upstream error: {details}")]
    Upstream {
        status: Option<u16>,
        details: serde_json::Value,
    },

    #[error("Translation error: {message}")]
    Translation { message: String },

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl RelayError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Upstream failure from a response body. JSON bodies are kept as JSON so
    /// the client sees exactly what the provider returned.
    pub fn upstream(status: u16, body: &str) -> Self {
        let details = serde_json::from_str(body)
            .unwrap_or_else(|_| serde_json::Value::String(body.to_string()));
        Self::Upstream {
            status: Some(status),
            details,
        }
    }

    /// Upstream failure with no response, e.g. connection refused.
    pub fn unreachable(msg: impl Into<String>) -> Self {
        Self::Upstream {
            status: None,
            details: serde_json::Value::String(msg.into()),
        }
    }

    pub fn translation(msg: impl Into<String>) -> Self {
        Self::Translation {
            message: msg.into(),
        }
    }

    /// Value placed in the `details` field of a failed relay response.
    pub fn details(&self) -> serde_json::Value {
        match self {
            Self::Upstream { details, .. } => details.clone(),
            Self::Translation { message } => serde_json::Value::String(message.clone()),
            other => serde_json::Value::String(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, RelayError>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_upstream_json_body_kept_as_json() {
        let err = RelayError::upstream(401, r#"{"error":{"message":"bad key"}}"#);
        assert_eq!(err.details(), json!({"error": {"message": "bad key"}}));
    }

    #[test]
    fn test_upstream_plain_body_kept_as_string() {
        let err = RelayError::upstream(502, "Bad Gateway");
        assert_eq!(err.details(), json!("Bad Gateway"));
        assert!(matches!(err, RelayError::Upstream { status: Some(502), .. }));
    }

    #[test]
    fn test_unreachable_has_no_status() {
        let err = RelayError::unreachable("connection refused");
        assert!(matches!(err, RelayError::Upstream { status: None, .. }));
        assert_eq!(err.details(), json!("connection refused"));
    }

    #[test]
    fn test_other_errors_render_message() {
        let err = RelayError::config("no port");
        assert_eq!(err.details(), json!("Configuration error: no port"));
    }

    #[test]
    fn test_toml_errors_convert() {
        let err: RelayError = toml::from_str::<toml::Value>("port = ").unwrap_err().into();
        assert!(err.to_string().starts_with("TOML parse error"));
    }
}
