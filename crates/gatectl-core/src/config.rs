//! Configuration management for gatectl.
//!
//! Loads configuration from ${GATECTL_HOME}/config.toml with sensible defaults,
//! then applies `GATECTL_*` environment overrides.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Port the gateway admin API listens on when the base URL is derived from a host.
const DEFAULT_API_PORT: u16 = 9000;

/// Environment variable overriding the API base URL.
pub const ENV_API_BASE_URL: &str = "GATECTL_API_BASE_URL";
const ENV_APP_NAME: &str = "GATECTL_APP_NAME";
const ENV_VERSION: &str = "GATECTL_VERSION";
const ENV_DEBUG: &str = "GATECTL_DEBUG";
const ENV_ENCRYPTION_KEY: &str = "GATECTL_ENCRYPTION_KEY";

/// Returns the default config template with comments.
///
/// This is embedded from default_config.toml at compile time.
/// To update, edit default_config.toml directly.
fn default_config_template() -> &'static str {
    include_str!("../default_config.toml")
}

pub mod paths {
    //! Path resolution for gatectl configuration and data directories.
    //!
    //! GATECTL_HOME resolution order:
    //! 1. GATECTL_HOME environment variable (if set)
    //! 2. ~/.config/gatectl (default)
    //! 3. ./.gatectl when no home directory can be determined

    use std::path::PathBuf;

    /// Returns the gatectl home directory.
    pub fn gatectl_home() -> PathBuf {
        if let Ok(home) = std::env::var("GATECTL_HOME") {
            return PathBuf::from(home);
        }

        dirs::home_dir().map_or_else(
            || PathBuf::from(".gatectl"),
            |h| h.join(".config").join("gatectl"),
        )
    }

    /// Returns the path to the config.toml file.
    pub fn config_path() -> PathBuf {
        gatectl_home().join("config.toml")
    }

    /// Returns the path to the persisted credentials.
    pub fn credentials_path() -> PathBuf {
        gatectl_home().join("credentials.json")
    }

    /// Returns the directory for rolling log files.
    pub fn logs_dir() -> PathBuf {
        gatectl_home().join("logs")
    }
}

/// How the login password is transformed before it leaves the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum PasswordCipher {
    /// AES-256-CBC with a random IV, base64(iv || ciphertext).
    #[default]
    AesCbc,
    /// Send the password as typed; rely on TLS alone.
    None,
}

/// Application identity shown by `status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub name: String,
    pub version: String,
    /// Enables debug-level logging.
    pub debug: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            name: "Shiny AI Gate Dashboard".to_string(),
            version: "1.0.0".to_string(),
            debug: false,
        }
    }
}

/// Gateway admin API connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Explicit base URL (wins over `host`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Host the console is served from; the API is expected on port 9000.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    /// Request timeout in seconds (0 disables)
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            host: None,
            timeout_secs: 10,
        }
    }
}

impl ApiConfig {
    /// Returns the effective request timeout, or None if disabled.
    pub fn timeout(&self) -> Option<Duration> {
        if self.timeout_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(self.timeout_secs))
        }
    }

    /// Resolves the base URL with precedence: env > config `base_url` > derived from `host`.
    ///
    /// # Errors
    /// Returns an error if an explicit URL is malformed.
    pub fn resolve_base_url(&self, env_url: Option<&str>) -> Result<String> {
        resolve_base_url(env_url, self.base_url.as_deref(), self.host.as_deref())
    }
}

/// Session lifecycle tuning and the login password scheme.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub password_cipher: PasswordCipher,
    /// AES-256 key; must be exactly 32 bytes and match the backend.
    pub encryption_key: String,
    pub keepalive_interval_secs: u64,
    pub guard_debounce_secs: u64,
    pub guard_settle_ms: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            password_cipher: PasswordCipher::AesCbc,
            encryption_key: AuthConfig::DEFAULT_ENCRYPTION_KEY.to_string(),
            keepalive_interval_secs: 5 * 60,
            guard_debounce_secs: 5,
            guard_settle_ms: 100,
        }
    }
}

impl AuthConfig {
    /// Key shipped with the stock backend. Public; obfuscation only.
    pub const DEFAULT_ENCRYPTION_KEY: &str = "your-32-byte-encryption-key-here";

    pub fn keepalive_interval(&self) -> Duration {
        Duration::from_secs(self.keepalive_interval_secs.max(1))
    }

    pub fn guard_debounce(&self) -> Duration {
        Duration::from_secs(self.guard_debounce_secs)
    }

    pub fn guard_settle(&self) -> Duration {
        Duration::from_millis(self.guard_settle_ms)
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub app: AppConfig,
    pub api: ApiConfig,
    pub auth: AuthConfig,
}

impl Config {
    /// Loads configuration from the default config path and applies env overrides.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&paths::config_path())?;
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Loads configuration from a specific path.
    /// Returns defaults if file doesn't exist.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config from {}", path.display()))?;
            toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config from {}", path.display()))
        } else {
            Ok(Config::default())
        }
    }

    /// Applies `GATECTL_*` overrides. Empty values are ignored.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        if let Some(url) = get(ENV_API_BASE_URL) {
            self.api.base_url = Some(url);
        }
        if let Some(name) = get(ENV_APP_NAME) {
            self.app.name = name;
        }
        if let Some(version) = get(ENV_VERSION) {
            self.app.version = version;
        }
        if let Some(debug) = get(ENV_DEBUG) {
            self.app.debug = debug.eq_ignore_ascii_case("true") || debug == "1";
        }
        if let Some(key) = get(ENV_ENCRYPTION_KEY) {
            self.auth.encryption_key = key;
        }
    }

    /// Creates a default config file at the given path.
    ///
    /// # Errors
    /// Returns an error if the file already exists or cannot be written.
    pub fn init(path: &Path) -> Result<()> {
        if path.exists() {
            anyhow::bail!("Config file already exists at {}", path.display());
        }

        Self::write_config(path, default_config_template())
    }

    /// Generates a fresh config TOML from Rust defaults.
    ///
    /// Uses the embedded template for structure/comments and merges
    /// generated values from `Config::default()` into it.
    ///
    /// # Errors
    /// Returns an error if serialization or template parsing fails.
    pub fn generate() -> Result<String> {
        use toml_edit::DocumentMut;

        let config = Config::default();
        let generated_toml =
            toml::to_string(&config).context("Failed to serialize default config to TOML")?;

        // Parse template as base (preserves comments)
        let mut doc: DocumentMut = default_config_template()
            .parse()
            .context("Failed to parse default config template")?;

        let generated_doc: DocumentMut = generated_toml
            .parse()
            .context("Failed to parse generated config")?;

        merge_items(doc.as_table_mut(), generated_doc.as_table());

        Ok(doc.to_string())
    }

    /// Writes config content to a file, creating parent directories as needed.
    /// Uses atomic write (temp file + rename) to prevent corruption.
    fn write_config(path: &Path, content: &str) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }

        let tmp_path = path.with_extension("toml.tmp");
        fs::write(&tmp_path, content)
            .with_context(|| format!("Failed to write config to {}", tmp_path.display()))?;
        fs::rename(&tmp_path, path).with_context(|| {
            format!(
                "Failed to rename {} to {}",
                tmp_path.display(),
                path.display()
            )
        })?;

        Ok(())
    }
}

/// Recursively merges items from source table into target table.
fn merge_items(target: &mut toml_edit::Table, source: &toml_edit::Table) {
    use toml_edit::Item;

    for (key, value) in source.iter() {
        match value {
            Item::Value(v) => {
                target[key] = Item::Value(v.clone());
            }
            Item::Table(src_table) => {
                if let Some(Item::Table(target_table)) = target.get_mut(key) {
                    merge_items(target_table, src_table);
                } else {
                    target[key] = Item::Table(src_table.clone());
                }
            }
            Item::ArrayOfTables(src_arr) => {
                target[key] = Item::ArrayOfTables(src_arr.clone());
            }
            Item::None => {}
        }
    }
}

/// Resolves the API base URL with precedence: env > config > host-derived default.
///
/// A missing host, `localhost` or `127.0.0.1` means local access on
/// `http://localhost:9000`; any other host maps to `http://<host>:9000`.
///
/// # Errors
/// Returns an error if an explicit URL is malformed.
pub fn resolve_base_url(
    env_url: Option<&str>,
    config_url: Option<&str>,
    host: Option<&str>,
) -> Result<String> {
    for candidate in [env_url, config_url].into_iter().flatten() {
        let trimmed = candidate.trim();
        if !trimmed.is_empty() {
            url::Url::parse(trimmed)
                .with_context(|| format!("Invalid API base URL: {trimmed}"))?;
            return Ok(trimmed.trim_end_matches('/').to_string());
        }
    }

    let host = host.map(str::trim).unwrap_or_default();
    if host.is_empty() || host == "localhost" || host == "127.0.0.1" {
        return Ok(format!("http://localhost:{DEFAULT_API_PORT}"));
    }
    Ok(format!("http://{host}:{DEFAULT_API_PORT}"))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::fs;

    use tempfile::tempdir;

    use super::*;

    #[test]
    fn test_load_missing_file_returns_defaults() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("nonexistent.toml");

        let config = Config::load_from(&config_path).unwrap();
        assert_eq!(config.app.name, "Shiny AI Gate Dashboard");
        assert_eq!(config.api.timeout_secs, 10);
        assert_eq!(config.auth.keepalive_interval_secs, 300);
        assert_eq!(config.auth.password_cipher, PasswordCipher::AesCbc);
    }

    #[test]
    fn test_load_partial_config_merges_defaults() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.toml");

        fs::write(
            &config_path,
            "[api]\nhost = \"10.0.0.8\"\n\n[auth]\npassword_cipher = \"none\"\n",
        )
        .unwrap();

        let config = Config::load_from(&config_path).unwrap();
        assert_eq!(config.api.host.as_deref(), Some("10.0.0.8"));
        assert_eq!(config.api.timeout_secs, 10);
        assert_eq!(config.auth.password_cipher, PasswordCipher::None);
        assert_eq!(config.auth.guard_debounce_secs, 5);
    }

    #[test]
    fn test_init_creates_config_with_defaults() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("subdir").join("config.toml");

        Config::init(&config_path).unwrap();

        assert!(config_path.exists());
        let contents = fs::read_to_string(&config_path).unwrap();
        assert!(contents.contains("[auth]"));
        assert!(contents.contains("# base_url ="));

        let loaded = Config::load_from(&config_path).unwrap();
        assert_eq!(loaded.auth.guard_settle_ms, 100);
    }

    #[test]
    fn test_init_fails_if_exists() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.toml");

        fs::write(&config_path, "").unwrap();

        assert!(Config::init(&config_path).is_err());
    }

    #[test]
    fn test_generate_keeps_comments_and_defaults() {
        let generated = Config::generate().unwrap();
        assert!(generated.contains("# base_url ="));

        let parsed: Config = toml::from_str(&generated).unwrap();
        assert_eq!(parsed.app.version, "1.0.0");
        assert_eq!(parsed.auth.keepalive_interval_secs, 300);
        assert_eq!(parsed.api.base_url, None);
    }

    #[test]
    fn test_env_overrides_file_values() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("GATECTL_API_BASE_URL", "https://gw.example.com"),
            ("GATECTL_APP_NAME", "Gate"),
            ("GATECTL_DEBUG", "true"),
            ("GATECTL_VERSION", "  "),
        ]);

        let mut config = Config::default();
        config.apply_env(|key| env.get(key).map(ToString::to_string));

        assert_eq!(config.api.base_url.as_deref(), Some("https://gw.example.com"));
        assert_eq!(config.app.name, "Gate");
        assert!(config.app.debug);
        // Blank values are ignored.
        assert_eq!(config.app.version, "1.0.0");
    }

    #[test]
    fn test_resolve_base_url_env_wins() {
        let url = resolve_base_url(
            Some("https://env.example.com/"),
            Some("https://config.example.com"),
            Some("10.1.1.1"),
        )
        .unwrap();
        assert_eq!(url, "https://env.example.com");
    }

    #[test]
    fn test_resolve_base_url_config_over_host() {
        let url = resolve_base_url(None, Some("http://gw:8080"), Some("10.1.1.1")).unwrap();
        assert_eq!(url, "http://gw:8080");
    }

    #[test]
    fn test_resolve_base_url_local_hosts() {
        for host in [None, Some(""), Some("localhost"), Some("127.0.0.1")] {
            assert_eq!(
                resolve_base_url(None, None, host).unwrap(),
                "http://localhost:9000"
            );
        }
    }

    #[test]
    fn test_resolve_base_url_remote_host() {
        assert_eq!(
            resolve_base_url(None, None, Some("192.168.1.20")).unwrap(),
            "http://192.168.1.20:9000"
        );
    }

    #[test]
    fn test_resolve_base_url_rejects_garbage() {
        assert!(resolve_base_url(Some("not a url"), None, None).is_err());
    }

    #[test]
    fn test_zero_timeout_disables() {
        let api = ApiConfig {
            timeout_secs: 0,
            ..ApiConfig::default()
        };
        assert_eq!(api.timeout(), None);
        assert_eq!(
            ApiConfig::default().timeout(),
            Some(Duration::from_secs(10))
        );
    }
}
