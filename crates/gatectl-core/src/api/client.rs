//! HTTP client for the gateway admin API.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use super::error::{ApiError, ApiResult, classify_reqwest_error};
use super::types::{AuthPayload, Envelope, UserInfo};
use crate::auth::{CredentialStore, PasswordEncoder};
use crate::config::{self, Config};

/// Issues authenticated JSON requests against one gateway.
///
/// The bearer token is read from the credential store on every request, so a
/// refresh performed elsewhere is picked up without rebuilding the client.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    store: Arc<dyn CredentialStore>,
    password: PasswordEncoder,
}

impl ApiClient {
    /// # Errors
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(
        base_url: impl Into<String>,
        store: Arc<dyn CredentialStore>,
        password: PasswordEncoder,
        timeout: Option<Duration>,
    ) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().context("Failed to build HTTP client")?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            store,
            password,
        })
    }

    /// Builds a client from loaded configuration.
    ///
    /// # Errors
    /// Returns an error if the base URL is malformed, the password cipher is
    /// misconfigured, or the HTTP client cannot be constructed.
    pub fn from_config(config: &Config, store: Arc<dyn CredentialStore>) -> Result<Self> {
        let env_url = std::env::var(config::ENV_API_BASE_URL).ok();
        let base_url = config.api.resolve_base_url(env_url.as_deref())?;
        let password = PasswordEncoder::from_config(&config.auth)
            .context("Invalid [auth] password settings")?;

        Self::new(base_url, store, password, config.api.timeout())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// The store this client reads bearer tokens from.
    pub fn store(&self) -> &Arc<dyn CredentialStore> {
        &self.store
    }

    /// Sends a request and decodes the JSON response body.
    ///
    /// # Errors
    /// Returns a `Network` error on transport failure, an HTTP-class error for
    /// non-2xx responses, and a `Parse` error for undecodable bodies.
    pub async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<&Value>,
    ) -> ApiResult<T> {
        let url = format!("{}{endpoint}", self.base_url);
        tracing::debug!(%method, %url, "api request");

        let mut builder = self
            .http
            .request(method, &url)
            .header("Content-Type", "application/json");
        if let Some(credentials) = self.store.load() {
            builder = builder.header(
                "Authorization",
                format!("Bearer {}", credentials.access_token),
            );
        }
        if let Some(body) = body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| classify_reqwest_error(&e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::debug!(status = status.as_u16(), %url, "api request failed");
            return Err(ApiError::request_failed(status.as_u16(), &body));
        }

        let text = response
            .text()
            .await
            .map_err(|e| classify_reqwest_error(&e))?;
        serde_json::from_str(&text)
            .map_err(|e| ApiError::parse(format!("Failed to parse response from {endpoint}: {e}")))
    }

    pub async fn get<T: DeserializeOwned>(&self, endpoint: &str) -> ApiResult<T> {
        self.request(Method::GET, endpoint, None).await
    }

    pub async fn post<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        body: Option<&Value>,
    ) -> ApiResult<T> {
        self.request(Method::POST, endpoint, body).await
    }

    /// `POST /api/signin` with the password run through the configured cipher.
    ///
    /// # Errors
    /// Returns the request error; the envelope is returned as-is.
    pub async fn login(&self, username: &str, password: &str) -> ApiResult<Envelope<AuthPayload>> {
        if self.base_url.starts_with("http://") {
            tracing::warn!(
                base_url = %self.base_url,
                "sending credentials over plain http; the password cipher is not a substitute for TLS"
            );
        }

        let body = json!({
            "username": username,
            "password": self.password.encode(password),
        });
        self.post("/api/signin", Some(&body)).await
    }

    /// `POST /api/signout`.
    ///
    /// # Errors
    /// Returns the request error.
    pub async fn logout(&self) -> ApiResult<Envelope<Value>> {
        self.post("/api/signout", None).await
    }

    /// `GET /api/user`.
    ///
    /// # Errors
    /// Returns the request error.
    pub async fn user_info(&self) -> ApiResult<Envelope<UserInfo>> {
        self.get("/api/user").await
    }

    /// `POST /api/refresh` exchanging `refresh_token` for a new pair.
    ///
    /// # Errors
    /// Returns the request error.
    pub async fn refresh_token(&self, refresh_token: &str) -> ApiResult<Envelope<AuthPayload>> {
        let body = json!({ "refreshToken": refresh_token });
        self.post("/api/refresh", Some(&body)).await
    }
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{body_json, header, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::api::ApiErrorKind;
    use crate::auth::{Credentials, MemoryCredentialStore};

    fn client(server: &MockServer, store: Arc<dyn CredentialStore>) -> ApiClient {
        ApiClient::new(
            server.uri(),
            store,
            PasswordEncoder::Plain,
            Some(Duration::from_secs(5)),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_request_attaches_bearer_from_store() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/user"))
            .and(header("Authorization", "Bearer T1"))
            .and(header("Content-Type", "application/json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": 0,
                "data": {"id": "1", "username": "alice"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let store = Arc::new(MemoryCredentialStore::with(Credentials::new("T1", "R1")));
        let user = client(&server, store)
            .user_info()
            .await
            .unwrap()
            .into_data()
            .unwrap();
        assert_eq!(user.username, "alice");
    }

    #[tokio::test]
    async fn test_request_without_token_sends_no_auth_header() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/signin"))
            .and(header_exists("Authorization"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/signin"))
            .and(body_json(json!({"username": "alice", "password": "p@ss"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": 0,
                "data": {"token": "T1", "refreshToken": "R1", "user": {"username": "alice"}}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let store = Arc::new(MemoryCredentialStore::new());
        let payload = client(&server, store)
            .login("alice", "p@ss")
            .await
            .unwrap()
            .into_data()
            .unwrap();
        assert_eq!(payload.token, "T1");
    }

    #[tokio::test]
    async fn test_non_2xx_uses_body_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/refresh"))
            .respond_with(
                ResponseTemplate::new(401).set_body_json(json!({"message": "refresh expired"})),
            )
            .mount(&server)
            .await;

        let store = Arc::new(MemoryCredentialStore::new());
        let err = client(&server, store).refresh_token("R1").await.unwrap_err();
        assert_eq!(err.kind, ApiErrorKind::Unauthorized);
        assert_eq!(err.status, Some(401));
        assert_eq!(err.message, "refresh expired");
    }

    #[tokio::test]
    async fn test_undecodable_body_is_parse_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/user"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
            .mount(&server)
            .await;

        let store = Arc::new(MemoryCredentialStore::new());
        let err = client(&server, store).user_info().await.unwrap_err();
        assert_eq!(err.kind, ApiErrorKind::Parse);
    }

    #[tokio::test]
    async fn test_unreachable_server_is_network_error() {
        let store = Arc::new(MemoryCredentialStore::new());
        let api = ApiClient::new(
            "http://127.0.0.1:1",
            store,
            PasswordEncoder::Plain,
            Some(Duration::from_secs(2)),
        )
        .unwrap();

        let err = api.user_info().await.unwrap_err();
        assert_eq!(err.kind, ApiErrorKind::Network);
        assert_eq!(err.login_message(), "网络连接失败");
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let store = Arc::new(MemoryCredentialStore::new());
        let api = ApiClient::new("http://gw:9000/", store, PasswordEncoder::Plain, None).unwrap();
        assert_eq!(api.base_url(), "http://gw:9000");
    }
}
