use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

/// Errors surfaced to callers of [`ApiClient`](super::ApiClient).
///
/// Clone so that one refresh outcome can be shared by concurrent callers.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ApiError {
    /// No response was received (connect/DNS failure or deadline expiry)
    #[error("Network error: {0}")]
    Network(String),

    /// Non-2xx response other than a recoverable 401
    #[error("{message}")]
    Application {
        status: u16,
        message: String,
        code: Option<String>,
    },

    /// 401 that the refresh protocol could not resolve. The session has
    /// already been cleared when this is returned by the client.
    #[error("Session expired - please log in again")]
    AuthExpired,

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

/// Maximum length for response bodies in error messages and debug logs
const MAX_ERROR_BODY_LENGTH: usize = 500;

/// Error fields the backend may put in a JSON error body
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ErrorBody {
    message: Option<String>,
    error: Option<String>,
    detail: Option<serde_json::Value>,
    code: Option<String>,
}

impl ErrorBody {
    fn message(self) -> Option<String> {
        let detail = self.detail.and_then(|d| match d {
            serde_json::Value::String(s) => Some(s),
            // Validation errors arrive as [{"msg": ...}, ...]
            serde_json::Value::Array(items) => items
                .first()
                .and_then(|item| item.get("msg"))
                .and_then(|msg| msg.as_str())
                .map(str::to_string),
            _ => None,
        });
        self.message
            .or(self.error)
            .or(detail)
            .filter(|m| !m.trim().is_empty())
    }
}

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    pub(crate) fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let mut end = MAX_ERROR_BODY_LENGTH;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
        }
    }

    /// Build an application error from a non-success status and its body.
    ///
    /// The message comes from `message`, `error` or `detail` in a JSON body,
    /// falling back to the status line.
    pub fn from_status(status: StatusCode, body: &str) -> Self {
        let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
        let code = parsed.code.clone();
        let message = parsed.message().unwrap_or_else(|| {
            format!(
                "HTTP {}: {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown Status")
            )
        });

        ApiError::Application {
            status: status.as_u16(),
            message,
            code,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Application { status, .. } => Some(*status),
            ApiError::AuthExpired => Some(StatusCode::UNAUTHORIZED.as_u16()),
            _ => None,
        }
    }

    /// Machine-readable code for display layers
    pub fn code(&self) -> Option<&str> {
        match self {
            ApiError::Application { code, .. } => code.as_deref(),
            ApiError::Network(_) => Some("NETWORK_ERROR"),
            ApiError::AuthExpired => Some("AUTH_EXPIRED"),
            ApiError::InvalidResponse(_) | ApiError::InvalidRequest(_) => None,
        }
    }

    /// The caller must send the user back to the login screen
    pub fn is_auth_expired(&self) -> bool {
        matches!(self, ApiError::AuthExpired)
    }
}
