use serde::Deserialize;
use serde_json::{Map, Value};

/// Why a remote call failed. Stores log this and report it, they never hand it to callers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    #[error("network error: {0}")]
    Network(String),
    #[error("unauthorized")]
    Unauthorized,
    #[error("forbidden")]
    Forbidden,
    #[error("not found")]
    NotFound,
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("internal server error")]
    Server,
    #[error("request failed with status {status}: {message}")]
    Status { status: u16, message: String },
    #[error("request rejected: {0}")]
    Rejected(String),
    #[error("failed to encode request: {0}")]
    Encode(String),
    #[error("malformed response: {0}")]
    Decode(String),
    #[error("i/o error: {0}")]
    Io(String),
}

const GENERIC_FAILURE: &str = "Request failed";

impl ApiError {
    /// Text suitable for showing to the user.
    pub fn user_message(&self) -> String {
        match self {
            Self::Network(_) => "Network connection failed, please check your network settings".into(),
            Self::Unauthorized => "Your session has expired, please log in again".into(),
            Self::Forbidden => "You do not have permission to do that".into(),
            Self::NotFound => "The requested resource does not exist".into(),
            Self::Validation(msg) => msg.clone(),
            Self::Server => "Internal server error".into(),
            Self::Status { message, .. } | Self::Rejected(message) => message.clone(),
            Self::Encode(_) | Self::Decode(_) => "Unexpected response from server".into(),
            Self::Io(msg) => msg.clone(),
        }
    }

    /// Map a non-2xx response to an error.
    pub(crate) fn from_status(status: u16, body: &[u8]) -> Self {
        let body: ErrorBody = serde_json::from_slice(body).unwrap_or_default();
        match status {
            401 => Self::Unauthorized,
            403 => Self::Forbidden,
            404 => Self::NotFound,
            422 => Self::Validation(
                body.first_field_error()
                    .or(body.message)
                    .unwrap_or_else(|| "Validation failed".to_string()),
            ),
            500 => Self::Server,
            _ => Self::Status {
                status,
                message: body
                    .message
                    .or_else(|| body.detail.as_ref().and_then(Value::as_str).map(str::to_string))
                    .unwrap_or_else(|| GENERIC_FAILURE.to_string()),
            },
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    detail: Option<Value>,
    #[serde(default)]
    errors: Option<Map<String, Value>>,
}

impl ErrorBody {
    /// First message of the first field in `errors`, falling back to the first
    /// `detail[].msg` entry that FastAPI-style servers send.
    fn first_field_error(&self) -> Option<String> {
        let from_errors = self
            .errors
            .as_ref()
            .and_then(|errors| errors.values().next())
            .and_then(|field| match field {
                Value::Array(messages) => messages.first().and_then(Value::as_str),
                Value::String(message) => Some(message.as_str()),
                _ => None,
            });
        let from_detail = || {
            self.detail
                .as_ref()
                .and_then(Value::as_array)
                .and_then(|items| items.first())
                .and_then(|item| item.get("msg"))
                .and_then(Value::as_str)
        };
        from_errors.or_else(from_detail).map(str::to_string)
    }
}
