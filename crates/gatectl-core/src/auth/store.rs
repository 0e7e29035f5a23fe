//! Credential storage and retrieval.
//!
//! Stores the access/refresh token pair in `<base>/credentials.json` with
//! restricted permissions (0600). Tokens are never logged or displayed in full.

use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::config::paths;

/// The access/refresh token pair, always written and erased together.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub access_token: String,
    pub refresh_token: String,
}

impl Credentials {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_token", &mask_token(&self.access_token))
            .field("refresh_token", &mask_token(&self.refresh_token))
            .finish()
    }
}

/// Persistent home of the current token pair.
///
/// Shared by the API client (reads the bearer token) and the session (writes on
/// login/refresh, erases on logout). Writes are last-writer-wins. An unavailable
/// medium reads as "no credentials" and never fails the caller.
pub trait CredentialStore: Send + Sync {
    /// Persists both tokens, replacing whatever was stored.
    fn save(&self, credentials: &Credentials);

    /// Returns the stored pair, or None if nothing (readable) is stored.
    fn load(&self) -> Option<Credentials>;

    /// Erases both tokens. Safe to call when nothing is stored.
    fn clear(&self);
}

/// On-disk shape. Keys match the console's storage keys.
#[derive(Debug, Default, Serialize, Deserialize)]
struct StoredTokens {
    #[serde(rename = "authToken", default, skip_serializing_if = "Option::is_none")]
    auth_token: Option<String>,
    #[serde(
        rename = "refreshToken",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    refresh_token: Option<String>,
}

impl StoredTokens {
    fn into_credentials(self) -> Option<Credentials> {
        match (self.auth_token, self.refresh_token) {
            (Some(access), Some(refresh)) if !access.is_empty() && !refresh.is_empty() => {
                Some(Credentials::new(access, refresh))
            }
            _ => None,
        }
    }
}

/// File-backed store at `$GATECTL_HOME/credentials.json`.
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at the default credentials path.
    pub fn at_default_location() -> Self {
        Self::new(paths::credentials_path())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the credential file.
    /// Returns `Ok(None)` if the file doesn't exist or lacks either token.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn read(&self) -> Result<Option<Credentials>> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| {
                    format!("Failed to read credentials from {}", self.path.display())
                });
            }
        };

        let stored: StoredTokens = serde_json::from_str(&contents).with_context(|| {
            format!("Failed to parse credentials from {}", self.path.display())
        })?;
        Ok(stored.into_credentials())
    }

    /// Writes the credential file with restricted permissions (0600).
    ///
    /// # Errors
    /// Returns an error if the directory or file cannot be written.
    pub fn write(&self, credentials: &Credentials) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }

        let stored = StoredTokens {
            auth_token: Some(credentials.access_token.clone()),
            refresh_token: Some(credentials.refresh_token.clone()),
        };
        let contents =
            serde_json::to_string_pretty(&stored).context("Failed to serialize credentials")?;

        // Write to a sibling temp file, then rename over the real one.
        let tmp_path = self.path.with_extension("json.tmp");
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            let mut file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .mode(0o600)
                .open(&tmp_path)
                .with_context(|| format!("Failed to open {} for writing", tmp_path.display()))?;
            file.write_all(contents.as_bytes())
                .with_context(|| format!("Failed to write to {}", tmp_path.display()))?;
        }

        #[cfg(not(unix))]
        {
            let mut file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&tmp_path)
                .with_context(|| format!("Failed to open {} for writing", tmp_path.display()))?;
            file.write_all(contents.as_bytes())
                .with_context(|| format!("Failed to write to {}", tmp_path.display()))?;
        }

        fs::rename(&tmp_path, &self.path).with_context(|| {
            format!(
                "Failed to rename {} to {}",
                tmp_path.display(),
                self.path.display()
            )
        })?;

        Ok(())
    }

    /// Deletes the credential file.
    /// Returns whether a file was removed.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be removed.
    pub fn remove(&self) -> Result<bool> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e)
                .with_context(|| format!("Failed to remove {}", self.path.display())),
        }
    }
}

impl CredentialStore for FileCredentialStore {
    fn save(&self, credentials: &Credentials) {
        if let Err(e) = self.write(credentials) {
            tracing::warn!(error = %format!("{e:#}"), "credential store unavailable, tokens not persisted");
        }
    }

    fn load(&self) -> Option<Credentials> {
        match self.read() {
            Ok(creds) => creds,
            Err(e) => {
                tracing::warn!(error = %format!("{e:#}"), "credential store unreadable, treating as empty");
                None
            }
        }
    }

    fn clear(&self) {
        if let Err(e) = self.remove() {
            tracing::warn!(error = %format!("{e:#}"), "failed to erase stored credentials");
        }
    }
}

/// Process-local store. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    slot: Mutex<Option<Credentials>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that already holds `credentials`.
    pub fn with(credentials: Credentials) -> Self {
        Self {
            slot: Mutex::new(Some(credentials)),
        }
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn save(&self, credentials: &Credentials) {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(credentials.clone());
    }

    fn load(&self) -> Option<Credentials> {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn clear(&self) {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

/// Returns a masked version of a token for display (first 12 chars + ...).
pub fn mask_token(token: &str) -> String {
    if token.len() <= 16 {
        return "***".to_string();
    }
    match token.get(..12) {
        Some(prefix) => format!("{prefix}..."),
        None => "***".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn test_file_store_roundtrip_and_overwrite() {
        let dir = tempdir().unwrap();
        let store = FileCredentialStore::new(dir.path().join("credentials.json"));

        store.save(&Credentials::new("T1", "R1"));
        store.save(&Credentials::new("T2", "R2"));

        assert_eq!(store.load(), Some(Credentials::new("T2", "R2")));
    }

    #[test]
    fn test_file_store_uses_console_keys() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("credentials.json");
        let store = FileCredentialStore::new(&path);

        store.save(&Credentials::new("access-abc", "refresh-xyz"));

        let raw: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["authToken"], "access-abc");
        assert_eq!(raw["refreshToken"], "refresh-xyz");
    }

    #[cfg(unix)]
    #[test]
    fn test_file_store_restricts_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let path = dir.path().join("credentials.json");
        FileCredentialStore::new(&path).save(&Credentials::new("T1", "R1"));

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_file_store_load_missing_is_none() {
        let dir = tempdir().unwrap();
        let store = FileCredentialStore::new(dir.path().join("nope").join("credentials.json"));
        assert_eq!(store.load(), None);
    }

    #[test]
    fn test_file_store_corrupt_file_reads_as_absent() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("credentials.json");
        fs::write(&path, "{not json").unwrap();

        let store = FileCredentialStore::new(&path);
        assert!(store.read().is_err());
        assert_eq!(store.load(), None);
    }

    #[test]
    fn test_file_store_half_written_pair_is_absent() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("credentials.json");
        fs::write(&path, r#"{"authToken": "T1"}"#).unwrap();

        assert_eq!(FileCredentialStore::new(&path).load(), None);
    }

    #[test]
    fn test_file_store_unavailable_medium_is_absent() {
        let dir = tempdir().unwrap();
        // A directory where the file should be: reads and writes both fail.
        let path = dir.path().join("credentials.json");
        fs::create_dir_all(&path).unwrap();

        let store = FileCredentialStore::new(&path);
        store.save(&Credentials::new("T1", "R1"));
        assert_eq!(store.load(), None);
    }

    #[test]
    fn test_file_store_clear_is_idempotent() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("credentials.json");
        let store = FileCredentialStore::new(&path);

        store.clear();
        store.save(&Credentials::new("T1", "R1"));
        assert!(store.remove().unwrap());
        assert!(!store.remove().unwrap());
        store.clear();

        assert!(!path.exists());
        assert_eq!(store.load(), None);
    }

    #[test]
    fn test_memory_store_lifecycle() {
        let store = MemoryCredentialStore::new();
        assert_eq!(store.load(), None);

        store.save(&Credentials::new("T1", "R1"));
        assert_eq!(store.load(), Some(Credentials::new("T1", "R1")));

        store.clear();
        store.clear();
        assert_eq!(store.load(), None);
    }

    #[test]
    fn test_debug_masks_tokens() {
        let creds = Credentials::new("eyJhbGciOiJIUzI1NiJ9.payload.signature", "short");
        let rendered = format!("{creds:?}");
        assert!(rendered.contains("eyJhbGciOiJI..."));
        assert!(!rendered.contains("signature"));
        assert!(!rendered.contains("short"));
    }
}
