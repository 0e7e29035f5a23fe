//! Wire types for the gateway admin API.

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};

use super::error::{ApiError, ApiResult};

/// The `{code, message, data}` wrapper every admin endpoint answers with.
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope<T> {
    pub code: i64,
    #[serde(default)]
    pub message: Option<String>,
    pub data: Option<T>,
}

impl<T> Envelope<T> {
    pub fn is_success(&self) -> bool {
        self.code == 0
    }

    /// Returns the payload of a successful envelope.
    ///
    /// # Errors
    /// Returns a `Rejected` error if `code != 0` or the payload is missing.
    pub fn into_data(self) -> ApiResult<T> {
        match self {
            Envelope {
                code: 0,
                data: Some(data),
                ..
            } => Ok(data),
            Envelope { code, message, .. } => Err(ApiError::rejected(code, message.as_deref())),
        }
    }

    /// Accepts a successful envelope whether or not it carries a payload.
    ///
    /// # Errors
    /// Returns a `Rejected` error if `code != 0`.
    pub fn ack(self) -> ApiResult<()> {
        if self.is_success() {
            Ok(())
        } else {
            Err(ApiError::rejected(self.code, self.message.as_deref()))
        }
    }
}

/// Payload of `/api/signin` and `/api/refresh`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AuthPayload {
    pub token: String,
    #[serde(rename = "refreshToken")]
    pub refresh_token: String,
    pub user: UserInfo,
}

/// The signed-in account as the backend describes it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UserInfo {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub username: String,
    pub email: String,
    pub role: String,
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permissions: Option<Vec<String>>,
}

/// Some backends emit numeric ids.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        serde_json::Value::Null => Ok(String::new()),
        other => Err(de::Error::custom(format!(
            "expected string or number, got {other}"
        ))),
    }
}
