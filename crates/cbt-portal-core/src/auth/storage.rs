//! Durable backends for the persisted session record.
//!
//! Storage is a rehydration cache only: it is read once when a
//! [`SessionStore`](super::SessionStore) is opened and written after each
//! state transition. It is never consulted while the process runs.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::User;

/// Namespace the persisted record is keyed under
pub const STORAGE_NAMESPACE: &str = "auth-storage";

/// The record holds bearer credentials: owner read/write only
#[cfg(unix)]
const FILE_MODE: u32 = 0o600;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid session record: {0}")]
    Format(#[from] serde_json::Error),

    #[error("Keychain error: {0}")]
    Keyring(#[from] keyring::Error),
}

/// The durable subset of a session. The transient `error` is never persisted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PersistedSession {
    pub user: Option<User>,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub is_authenticated: bool,
}

pub trait SessionStorage: Send + Sync {
    fn load(&self) -> Result<Option<PersistedSession>, StorageError>;
    fn save(&self, record: &PersistedSession) -> Result<(), StorageError>;
    fn remove(&self) -> Result<(), StorageError>;
}

/// Pretty JSON file at `<dir>/auth-storage.json`.
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            path: dir.as_ref().join(format!("{}.json", STORAGE_NAMESPACE)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SessionStorage for FileStorage {
    fn load(&self) -> Result<Option<PersistedSession>, StorageError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&self.path)?;
        Ok(Some(serde_json::from_str(&contents)?))
    }

    fn save(&self, record: &PersistedSession) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(record)?;

        let mut options = std::fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(FILE_MODE);
        }
        let mut file = options.open(&self.path)?;

        // A file created by an older build keeps its mode unless reset
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            file.set_permissions(std::fs::Permissions::from_mode(FILE_MODE))?;
        }

        file.write_all(contents.as_bytes())?;
        Ok(())
    }

    fn remove(&self) -> Result<(), StorageError> {
        if self.path.exists() {
            std::fs::remove_file(&self.path)?;
        }
        Ok(())
    }
}

/// Process-local storage. Nothing survives a restart.
#[derive(Default)]
pub struct MemoryStorage {
    record: Mutex<Option<PersistedSession>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_record(record: PersistedSession) -> Self {
        Self {
            record: Mutex::new(Some(record)),
        }
    }

    /// Current stored record, for inspection
    pub fn stored(&self) -> Option<PersistedSession> {
        self.record
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl SessionStorage for MemoryStorage {
    fn load(&self) -> Result<Option<PersistedSession>, StorageError> {
        Ok(self.stored())
    }

    fn save(&self, record: &PersistedSession) -> Result<(), StorageError> {
        *self.record.lock().unwrap_or_else(PoisonError::into_inner) = Some(record.clone());
        Ok(())
    }

    fn remove(&self) -> Result<(), StorageError> {
        *self.record.lock().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }
}
