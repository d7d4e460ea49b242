use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    Unauthorized,
    Forbidden,
    NotFound,
    Validation,
    RateLimited,
    Internal,
    Unexpected,
}

impl ErrorCode {
    pub fn from_status(status: u16) -> Self {
        match status {
            401 => Self::Unauthorized,
            403 => Self::Forbidden,
            404 => Self::NotFound,
            400 | 409 | 422 => Self::Validation,
            429 => Self::RateLimited,
            500..=599 => Self::Internal,
            _ => Self::Unexpected,
        }
    }
}

/// Failed response from the manager or trade service. The body is kept as-is
/// because the services do not share one error envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    pub code: ErrorCode,
    pub status: u16,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

impl ApiError {
    pub fn from_response(status: u16, payload: Option<Value>) -> Self {
        let message = payload
            .as_ref()
            .and_then(|body| body.get("message"))
            .and_then(Value::as_str)
            .filter(|message| !message.trim().is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| "Request failed".to_string());

        Self {
            code: ErrorCode::from_status(status),
            status,
            message,
            payload,
        }
    }
}

#[derive(Debug, Error)]
#[error("{code:?} ({status}): {message}")]
pub struct ApiException {
    pub code: ErrorCode,
    pub status: u16,
    pub message: String,
    pub payload: Option<Value>,
}

impl From<ApiError> for ApiException {
    fn from(value: ApiError) -> Self {
        Self {
            code: value.code,
            status: value.status,
            message: value.message,
            payload: value.payload,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn message_is_taken_from_body_when_present() {
        let error = ApiError::from_response(403, Some(json!({ "message": "no access" })));
        assert_eq!(error.code, ErrorCode::Forbidden);
        assert_eq!(error.message, "no access");
        assert!(error.payload.is_some());
    }

    #[test]
    fn message_defaults_when_body_is_missing_or_blank() {
        assert_eq!(ApiError::from_response(502, None).message, "Request failed");
        let blank = ApiError::from_response(418, Some(json!({ "message": "  " })));
        assert_eq!(blank.message, "Request failed");
        assert_eq!(blank.code, ErrorCode::Unexpected);
    }

    #[test]
    fn exception_keeps_status_and_payload() {
        let exception = ApiException::from(ApiError::from_response(
            429,
            Some(json!({ "message": "slow down", "retryAfter": 3 })),
        ));
        assert_eq!(exception.code, ErrorCode::RateLimited);
        assert_eq!(exception.to_string(), "RateLimited (429): slow down");
        assert_eq!(exception.payload, Some(json!({ "message": "slow down", "retryAfter": 3 })));
    }
}
