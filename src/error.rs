use serde_json::Value;
use thiserror::Error;

/// Error codes a provider returns when the bearer token is no longer valid.
const GRAPH_EXPIRED_TOKEN_CODE: &str = "InvalidAuthenticationToken";
const OAUTH_EXPIRED_TOKEN_CODE: &str = "invalid_token";

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Malformed cell address: {0}")]
    MalformedAddress(String),

    #[error("Unsupported source: {0}")]
    UnsupportedSource(String),

    #[error("Workbook session error: {0}")]
    Session(String),

    #[error("Unexpected status {status} while trying to {operation}: {body}")]
    UnexpectedStatus {
        status: u16,
        operation: String,
        body: Value,
    },

    #[error("Google Sheets API error: {0}")]
    Sheets(String),

    #[error("OAuth2 authentication error: {0}")]
    Auth(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// True for a 401 whose body says the access token is invalid or expired.
    pub fn is_auth_expired(&self) -> bool {
        let AppError::UnexpectedStatus {
            status: 401, body, ..
        } = self
        else {
            return false;
        };

        match body.get("error") {
            Some(Value::Object(error)) => {
                error.get("code").and_then(Value::as_str) == Some(GRAPH_EXPIRED_TOKEN_CODE)
            }
            Some(Value::String(code)) => code == OAUTH_EXPIRED_TOKEN_CODE,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn unexpected(status: u16, body: Value) -> AppError {
        AppError::UnexpectedStatus {
            status,
            operation: "read sheet".to_string(),
            body,
        }
    }

    #[test]
    fn test_graph_expired_token_is_recognised() {
        let err = unexpected(
            401,
            json!({"error": {"code": "InvalidAuthenticationToken", "message": "expired"}}),
        );
        assert!(err.is_auth_expired());
    }

    #[test]
    fn test_oauth_invalid_token_is_recognised() {
        let err = unexpected(401, json!({"error": "invalid_token"}));
        assert!(err.is_auth_expired());
    }

    #[test]
    fn test_other_unauthorized_bodies_are_not_expiry() {
        assert!(!unexpected(401, json!({"error": {"code": "AccessDenied"}})).is_auth_expired());
        assert!(!unexpected(401, Value::Null).is_auth_expired());
        assert!(
            !unexpected(403, json!({"error": {"code": "InvalidAuthenticationToken"}}))
                .is_auth_expired()
        );
        assert!(!AppError::Auth("nope".to_string()).is_auth_expired());
    }
}
