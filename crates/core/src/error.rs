use serde::Serialize;
use thiserror::Error;

/// Transport-level error surfaced by the HTTP boundary.
///
/// Stremio resources never use it; core failures render as empty payloads.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("not found: {0}")]
    NotFound(String),
}

impl ApiError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
        }
    }

    pub fn status_code(&self) -> u16 {
        match self {
            Self::NotFound(_) => 404,
        }
    }
}

/// JSON error envelope: `{ "error": { "code": "…", "message": "…", "details": {} } }`
#[derive(Serialize)]
pub struct ErrorEnvelope {
    pub error: ErrorBody,
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    pub details: serde_json::Value,
}

impl From<&ApiError> for ErrorEnvelope {
    fn from(e: &ApiError) -> Self {
        Self {
            error: ErrorBody {
                code: e.code().to_string(),
                message: e.to_string(),
                details: serde_json::Value::Object(serde_json::Map::new()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_carries_code_and_message() {
        let err = ApiError::NotFound("no route for /x".into());
        let value = serde_json::to_value(ErrorEnvelope::from(&err)).unwrap();
        assert_eq!(err.status_code(), 404);
        assert_eq!(value["error"]["code"], "not_found");
        assert_eq!(value["error"]["message"], "not found: no route for /x");
        assert_eq!(value["error"]["details"], serde_json::json!({}));
    }
}
