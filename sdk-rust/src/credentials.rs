//! Key-value storage for secrets kept on the device.
//!
//! Veemee clients persist two strings: the bearer token and the id of the
//! active context. Both live behind [`CredentialStore`] so that platform
//! keychains, files, or an in-memory map can back them.

use crate::{ApiError, ApiResult};
use std::{
    collections::{BTreeMap, HashMap},
    path::{Path, PathBuf},
    sync::Mutex,
};

/// Key of the bearer token.
pub const JWT_KEY: &str = "veemee-jwt";
/// Key of the persisted active context id.
pub const ACTIVE_CONTEXT_KEY: &str = "veemee-active-context-id";

#[async_trait::async_trait]
pub trait CredentialStore: Send + Sync {
    /// Returns `Ok(None)` if nothing is stored under `key`.
    async fn get(&self, key: &str) -> ApiResult<Option<String>>;

    /// Overwrites any existing value.
    async fn set(&self, key: &str, value: &str) -> ApiResult<()>;

    /// Returns `Ok(())` even if nothing was stored.
    async fn delete(&self, key: &str) -> ApiResult<()>;
}

/// In-memory store for tests and temporary sessions. Nothing survives a
/// restart.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryCredentialStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with `values`.
    pub fn with_values<I, K, V>(values: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            values: Mutex::new(
                values
                    .into_iter()
                    .map(|(key, value)| (key.into(), value.into()))
                    .collect(),
            ),
        }
    }

    fn lock(&self) -> ApiResult<std::sync::MutexGuard<'_, HashMap<String, String>>> {
        self.values
            .lock()
            .map_err(|_| ApiError::Credential("memory store poisoned".to_string()))
    }
}

#[async_trait::async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn get(&self, key: &str) -> ApiResult<Option<String>> {
        Ok(self.lock()?.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> ApiResult<()> {
        self.lock()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn delete(&self, key: &str) -> ApiResult<()> {
        self.lock()?.remove(key);
        Ok(())
    }
}

/// Store backed by a JSON object on disk. The file is created on first write
/// and, on Unix, restricted to the owner (0600).
#[derive(Debug)]
pub struct FileCredentialStore {
    file_path: PathBuf,
    write_lock: tokio::sync::Mutex<()>,
}

impl FileCredentialStore {
    pub fn new(file_path: impl Into<PathBuf>) -> Self {
        Self {
            file_path: file_path.into(),
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.file_path
    }

    async fn load(&self) -> ApiResult<BTreeMap<String, String>> {
        let contents = match tokio::fs::read_to_string(&self.file_path).await {
            Ok(contents) => contents,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                return Ok(BTreeMap::new())
            }
            Err(error) => {
                return Err(ApiError::Credential(format!(
                    "Cannot read {}: {error}",
                    self.file_path.display()
                )))
            }
        };

        serde_json::from_str(&contents).map_err(|error| {
            ApiError::Credential(format!(
                "Corrupted credentials file {}: {error}",
                self.file_path.display()
            ))
        })
    }

    async fn save(&self, values: &BTreeMap<String, String>) -> ApiResult<()> {
        let io_error = |error: std::io::Error| {
            ApiError::Credential(format!(
                "Cannot write {}: {error}",
                self.file_path.display()
            ))
        };

        if let Some(parent) = self.file_path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.map_err(io_error)?;
            }
        }

        let contents = serde_json::to_string_pretty(values).map_err(|error| {
            ApiError::Credential(format!("Failed to serialize credentials: {error}"))
        })?;
        tokio::fs::write(&self.file_path, contents)
            .await
            .map_err(io_error)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(&self.file_path, std::fs::Permissions::from_mode(0o600))
                .await
                .map_err(io_error)?;
        }

        Ok(())
    }
}

#[async_trait::async_trait]
impl CredentialStore for FileCredentialStore {
    async fn get(&self, key: &str) -> ApiResult<Option<String>> {
        Ok(self.load().await?.remove(key))
    }

    async fn set(&self, key: &str, value: &str) -> ApiResult<()> {
        let _guard = self.write_lock.lock().await;
        let mut values = self.load().await?;
        values.insert(key.to_string(), value.to_string());
        self.save(&values).await
    }

    async fn delete(&self, key: &str) -> ApiResult<()> {
        let _guard = self.write_lock.lock().await;
        let mut values = self.load().await?;
        if values.remove(key).is_some() {
            self.save(&values).await?;
        }
        Ok(())
    }
}
