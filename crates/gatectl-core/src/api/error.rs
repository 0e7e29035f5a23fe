//! Structured errors for gateway API calls.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Categories of API errors for consistent handling and display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiErrorKind {
    /// Transport failure: connect, timeout, broken body
    Network,
    /// HTTP 401/403
    Unauthorized,
    /// HTTP 5xx
    Server,
    /// Any other non-2xx status
    HttpStatus,
    /// 2xx with an envelope `code` other than 0
    Rejected,
    /// Response body did not decode
    Parse,
    /// Caught client-side before any request was made
    Validation,
    /// Password encoding could not be set up
    Encryption,
}

impl fmt::Display for ApiErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ApiErrorKind::Network => "network",
            ApiErrorKind::Unauthorized => "unauthorized",
            ApiErrorKind::Server => "server",
            ApiErrorKind::HttpStatus => "http_status",
            ApiErrorKind::Rejected => "rejected",
            ApiErrorKind::Parse => "parse",
            ApiErrorKind::Validation => "validation",
            ApiErrorKind::Encryption => "encryption",
        };
        f.write_str(label)
    }
}

/// Structured error from the gateway API with kind and details.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiError {
    /// Error category
    pub kind: ApiErrorKind,
    /// HTTP status, when a response was received
    pub status: Option<u16>,
    /// Envelope code, for `Rejected`
    pub code: Option<i64>,
    /// One-line summary suitable for display
    pub message: String,
}

impl ApiError {
    /// Creates a new API error.
    pub fn new(kind: ApiErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            status: None,
            code: None,
            message: message.into(),
        }
    }

    /// Creates the error for a non-2xx response.
    ///
    /// The message comes from the body's `message` field when the body is JSON,
    /// otherwise a generic "HTTP error" line.
    pub fn request_failed(status: u16, body: &str) -> Self {
        let kind = match status {
            401 | 403 => ApiErrorKind::Unauthorized,
            500..=599 => ApiErrorKind::Server,
            _ => ApiErrorKind::HttpStatus,
        };
        let message = serde_json::from_str::<Value>(body)
            .ok()
            .and_then(|json| {
                json.get("message")
                    .and_then(Value::as_str)
                    .map(str::trim)
                    .filter(|m| !m.is_empty())
                    .map(ToString::to_string)
            })
            .unwrap_or_else(|| format!("HTTP error! status: {status}"));

        Self {
            kind,
            status: Some(status),
            code: None,
            message,
        }
    }

    /// Creates an envelope rejection (`code != 0`).
    pub fn rejected(code: i64, message: Option<&str>) -> Self {
        let message = message
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .map_or_else(|| format!("request rejected (code {code})"), ToString::to_string);
        Self {
            kind: ApiErrorKind::Rejected,
            status: None,
            code: Some(code),
            message,
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::Network, message)
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::Parse, message)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::Validation, message)
    }

    pub fn encryption(message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::Encryption, message)
    }

    pub fn is_unauthorized(&self) -> bool {
        self.kind == ApiErrorKind::Unauthorized
    }

    /// Text shown to the user after a failed login.
    pub fn login_message(&self) -> String {
        match self.kind {
            ApiErrorKind::Unauthorized => "用户名或密码错误".to_string(),
            ApiErrorKind::Network => "网络连接失败".to_string(),
            ApiErrorKind::Server => "服务器内部错误".to_string(),
            _ if !self.message.trim().is_empty() => self.message.clone(),
            _ => "登录失败".to_string(),
        }
    }

    /// Text shown to the user after any other failed call.
    pub fn user_message(&self) -> String {
        match self.kind {
            ApiErrorKind::Network => "网络连接失败".to_string(),
            ApiErrorKind::Unauthorized => "认证失败，请重新登录".to_string(),
            ApiErrorKind::Server => "服务器内部错误".to_string(),
            _ => self.message.clone(),
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ApiError {}

/// Result type for API operations.
pub type ApiResult<T> = std::result::Result<T, ApiError>;

pub(crate) fn classify_reqwest_error(e: &reqwest::Error) -> ApiError {
    if e.is_timeout() {
        ApiError::network(format!("Request timed out: {e}"))
    } else if e.is_connect() {
        ApiError::network(format!("Connection failed: {e}"))
    } else if e.is_decode() {
        ApiError::parse(format!("Failed to decode response: {e}"))
    } else {
        ApiError::network(format!("Network error: {e}"))
    }
}
