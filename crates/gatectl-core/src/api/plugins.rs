//! Plugin catalogue calls.
//!
//! The backend answers with loosely-typed maps, sometimes wrapped in the
//! standard envelope and sometimes bare. Everything is normalized into
//! [`PluginInfo`] with the console's defaults filled in.

use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};

use super::error::{ApiError, ApiErrorKind, ApiResult};
use crate::session::Session;

const PLUGINS_PATH: &str = "/api/plugins";

/// One entry of the plugin catalogue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PluginInfo {
    pub id: String,
    pub name: String,
    pub category: String,
    pub version: String,
    pub priority: i64,
    pub description: String,
    #[serde(rename = "type")]
    pub plugin_type: String,
    pub scope: String,
    pub enabled: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl PluginInfo {
    /// Normalizes a raw backend map.
    pub fn from_raw(raw: &Value) -> Self {
        let empty = Map::new();
        let map = raw.as_object().unwrap_or(&empty);
        let text = |key: &str| {
            map.get(key)
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(ToString::to_string)
        };

        let name = text("name").unwrap_or_default();
        Self {
            id: text("id")
                .or_else(|| map.get("id").and_then(Value::as_i64).map(|n| n.to_string()))
                .unwrap_or_else(|| name.clone()),
            category: text("category").unwrap_or_else(|| "general".to_string()),
            version: text("version").unwrap_or_else(|| "1.0.0".to_string()),
            priority: map
                .get("priority")
                .and_then(Value::as_i64)
                .unwrap_or(1000),
            description: text("description").unwrap_or_default(),
            plugin_type: text("type").unwrap_or_else(|| "normal".to_string()),
            scope: text("scope").unwrap_or_else(|| "route".to_string()),
            enabled: map.get("enabled").and_then(Value::as_bool) != Some(false),
            created_at: text("created_at")
                .or_else(|| text("create_time"))
                .unwrap_or_default(),
            updated_at: text("updated_at")
                .or_else(|| text("update_time"))
                .unwrap_or_default(),
            name,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PluginList {
    pub plugins: Vec<PluginInfo>,
    pub total: usize,
}

/// Unwraps `{code, message, data}` if present, otherwise passes the body through.
fn unwrap_response(raw: Value) -> ApiResult<Value> {
    let Value::Object(mut map) = raw else {
        return Ok(raw);
    };

    if let Some(code) = map.get("code") {
        let code = code.as_i64();
        if code != Some(0) {
            let message = map
                .get("message")
                .and_then(Value::as_str)
                .filter(|m| !m.is_empty())
                .unwrap_or("操作失败");
            return Err(ApiError::rejected(code.unwrap_or(-1), Some(message)));
        }
        match map.remove("data") {
            Some(data) if !data.is_null() => return Ok(data),
            Some(data) => {
                map.insert("data".to_string(), data);
            }
            None => {}
        }
    }

    Ok(Value::Object(map))
}

/// Display text for a failed plugin call.
pub fn plugin_error_message(err: &ApiError) -> String {
    match (err.kind, err.status) {
        (_, Some(400)) => "请求参数错误".to_string(),
        (_, Some(401)) => "认证失败，请重新登录".to_string(),
        (_, Some(403)) => "权限不足，无法访问插件管理".to_string(),
        (_, Some(404)) => "插件不存在或已被删除".to_string(),
        (_, Some(500)) => "服务器内部错误".to_string(),
        (_, Some(status)) => format!("请求失败 ({status})"),
        (ApiErrorKind::Network, None) => "网络连接失败，请检查网络设置".to_string(),
        _ if err.message.is_empty() => "未知错误".to_string(),
        _ => err.message.clone(),
    }
}

fn validate_plugin_id(id: &str) -> ApiResult<&str> {
    let id = id.trim();
    if id.is_empty() {
        return Err(ApiError::validation("plugin id must not be empty"));
    }
    if !id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    {
        return Err(ApiError::validation(format!(
            "plugin id contains invalid characters: {id}"
        )));
    }
    Ok(id)
}

/// Plugin catalogue on top of a live session.
///
/// A 401 triggers one refresh and one retry. If the refresh fails the session
/// is expired and the original error returned.
#[derive(Clone)]
pub struct PluginService {
    session: Arc<Session>,
}

impl PluginService {
    pub fn new(session: Arc<Session>) -> Self {
        Self { session }
    }

    /// `GET /api/plugins/simple`.
    ///
    /// # Errors
    /// Returns the request error, or a `Parse` error if the body is not a list.
    pub async fn list(&self) -> ApiResult<PluginList> {
        let raw = self.get_with_reauth(&format!("{PLUGINS_PATH}/simple")).await?;
        let Value::Array(items) = unwrap_response(raw)? else {
            return Err(ApiError::parse("expected a list of plugins"));
        };

        let plugins: Vec<PluginInfo> = items.iter().map(PluginInfo::from_raw).collect();
        tracing::debug!(count = plugins.len(), "loaded plugin list");
        Ok(PluginList {
            total: plugins.len(),
            plugins,
        })
    }

    /// `GET /api/plugins/{id}`.
    ///
    /// # Errors
    /// Returns a `Validation` error for a malformed id, else the request error.
    pub async fn get(&self, id: &str) -> ApiResult<PluginInfo> {
        let id = validate_plugin_id(id)?;
        let raw = self.get_with_reauth(&format!("{PLUGINS_PATH}/{id}")).await?;
        Ok(PluginInfo::from_raw(&unwrap_response(raw)?))
    }

    async fn get_with_reauth(&self, endpoint: &str) -> ApiResult<Value> {
        match self.session.api().get::<Value>(endpoint).await {
            Err(err) if err.status == Some(401) => {
                tracing::info!(endpoint, "plugin request unauthorized, refreshing token");
                if self.session.refresh_token_if_needed().await {
                    self.session.api().get(endpoint).await
                } else {
                    self.session.expire();
                    Err(err)
                }
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_from_raw_fills_defaults() {
        let plugin = PluginInfo::from_raw(&json!({"name": "limit-req"}));

        assert_eq!(plugin.id, "limit-req");
        assert_eq!(plugin.name, "limit-req");
        assert_eq!(plugin.category, "general");
        assert_eq!(plugin.version, "1.0.0");
        assert_eq!(plugin.priority, 1000);
        assert_eq!(plugin.plugin_type, "normal");
        assert_eq!(plugin.scope, "route");
        assert!(plugin.enabled);
        assert_eq!(plugin.created_at, "");
    }

    #[test]
    fn test_from_raw_keeps_provided_values() {
        let plugin = PluginInfo::from_raw(&json!({
            "id": "p-7",
            "name": "key-auth",
            "category": "auth",
            "priority": 2500,
            "type": "auth",
            "scope": "global",
            "enabled": false,
            "create_time": "2024-03-01 10:00:00",
            "updated_at": "2024-03-02 10:00:00"
        }));

        assert_eq!(plugin.id, "p-7");
        assert_eq!(plugin.category, "auth");
        assert_eq!(plugin.priority, 2500);
        assert_eq!(plugin.plugin_type, "auth");
        assert_eq!(plugin.scope, "global");
        assert!(!plugin.enabled);
        assert_eq!(plugin.created_at, "2024-03-01 10:00:00");
        assert_eq!(plugin.updated_at, "2024-03-02 10:00:00");
    }

    #[test]
    fn test_from_raw_non_object_is_all_defaults() {
        let plugin = PluginInfo::from_raw(&json!("cors"));
        assert_eq!(plugin.id, "");
        assert!(plugin.enabled);
    }

    #[test]
    fn test_unwrap_response_variants() {
        assert_eq!(
            unwrap_response(json!([{"name": "cors"}])).unwrap(),
            json!([{"name": "cors"}])
        );
        assert_eq!(
            unwrap_response(json!({"code": 0, "data": [1, 2]})).unwrap(),
            json!([1, 2])
        );
        assert_eq!(
            unwrap_response(json!({"name": "cors", "enabled": true})).unwrap(),
            json!({"name": "cors", "enabled": true})
        );

        let err = unwrap_response(json!({"code": 5})).unwrap_err();
        assert_eq!(err.code, Some(5));
        assert_eq!(err.message, "操作失败");
    }

    #[test]
    fn test_plugin_error_messages() {
        let cases = [
            (400, "请求参数错误"),
            (401, "认证失败，请重新登录"),
            (403, "权限不足，无法访问插件管理"),
            (404, "插件不存在或已被删除"),
            (500, "服务器内部错误"),
            (502, "请求失败 (502)"),
        ];
        for (status, expected) in cases {
            assert_eq!(
                plugin_error_message(&ApiError::request_failed(status, "")),
                expected
            );
        }
        assert_eq!(
            plugin_error_message(&ApiError::network("connection refused")),
            "网络连接失败，请检查网络设置"
        );
        assert_eq!(
            plugin_error_message(&ApiError::rejected(3, Some("插件已禁用"))),
            "插件已禁用"
        );
    }

    #[test]
    fn test_validate_plugin_id() {
        assert_eq!(validate_plugin_id(" limit-req ").unwrap(), "limit-req");
        assert!(validate_plugin_id("").is_err());
        assert!(validate_plugin_id("../admin").is_err());
    }
}
