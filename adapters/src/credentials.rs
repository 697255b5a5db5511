//! Persistence for the file store's OAuth user credentials.
//!
//! The Drive client never touches disk itself; it loads and saves through a
//! [`CredentialStore`], so the backing medium (a JSON file, memory, a secret
//! manager) can be swapped without changing the client.

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::errors::AdapterError;

/// Seconds before expiry at which an access token is treated as stale.
pub const EXPIRY_MARGIN_SECS: u64 = 60;

#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoredCredentials {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    pub refresh_token: String,
    /// Unix seconds at which `access_token` stops being valid.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<u64>,
}

impl std::fmt::Debug for StoredCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoredCredentials")
            .field("access_token", &self.access_token.as_ref().map(|_| "[REDACTED]"))
            .field("refresh_token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

impl StoredCredentials {
    /// Credentials holding only a refresh token; the first use refreshes.
    pub fn from_refresh_token(refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: None,
            refresh_token: refresh_token.into(),
            expires_at: None,
        }
    }

    /// Returns the access token if it stays valid past the expiry margin.
    pub fn usable_access_token(&self, now: u64) -> Option<&str> {
        let token = self.access_token.as_deref()?;
        match self.expires_at {
            Some(expires_at) if expires_at > now + EXPIRY_MARGIN_SECS => Some(token),
            _ => None,
        }
    }
}

pub(crate) fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Returns `None` when nothing has been stored yet.
    async fn load(&self) -> Result<Option<StoredCredentials>, AdapterError>;

    async fn save(&self, credentials: &StoredCredentials) -> Result<(), AdapterError>;
}

/// Stores credentials as a JSON document at a fixed path.
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl CredentialStore for FileCredentialStore {
    async fn load(&self) -> Result<Option<StoredCredentials>, AdapterError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(AdapterError::CredentialStore(format!(
                    "cannot read {}: {err}",
                    self.path.display()
                )))
            }
        };

        serde_json::from_slice(&bytes).map(Some).map_err(|err| {
            AdapterError::CredentialStore(format!("cannot parse {}: {err}", self.path.display()))
        })
    }

    async fn save(&self, credentials: &StoredCredentials) -> Result<(), AdapterError> {
        let bytes = serde_json::to_vec_pretty(credentials)
            .map_err(|err| AdapterError::CredentialStore(err.to_string()))?;
        tokio::fs::write(&self.path, bytes).await.map_err(|err| {
            AdapterError::CredentialStore(format!("cannot write {}: {err}", self.path.display()))
        })?;
        tracing::debug!(path = %self.path.display(), "saved drive credentials");
        Ok(())
    }
}

/// Keeps credentials for the lifetime of the process only.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    inner: Mutex<Option<StoredCredentials>>,
}

impl MemoryCredentialStore {
    pub fn new(initial: Option<StoredCredentials>) -> Self {
        Self {
            inner: Mutex::new(initial),
        }
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn load(&self) -> Result<Option<StoredCredentials>, AdapterError> {
        Ok(self.inner.lock().await.clone())
    }

    async fn save(&self, credentials: &StoredCredentials) -> Result<(), AdapterError> {
        *self.inner.lock().await = Some(credentials.clone());
        Ok(())
    }
}
