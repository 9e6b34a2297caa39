//! Authentication state for the portal client.
//!
//! This module provides:
//! - `SessionStore`: the injectable, shared session (user, tokens, flag)
//! - `SessionStorage` backends: JSON file, OS keychain, or memory
//!
//! Storage is only read when a store is opened; afterwards the in-memory
//! session is authoritative and writes are best-effort.

pub mod credentials;
pub mod session;
pub mod storage;

use std::sync::Arc;

use anyhow::Result;

pub use credentials::KeyringStorage;
pub use session::{Session, SessionStore};
pub use storage::{FileStorage, MemoryStorage, PersistedSession, SessionStorage, StorageError};

use crate::config::{Config, StorageKind};

/// Build the storage backend selected in `config`
pub fn storage_for(config: &Config) -> Result<Arc<dyn SessionStorage>> {
    let storage: Arc<dyn SessionStorage> = match config.session_storage {
        StorageKind::File => Arc::new(FileStorage::new(config.data_dir()?)),
        StorageKind::Keyring => Arc::new(KeyringStorage::new()?),
        StorageKind::Memory => Arc::new(MemoryStorage::new()),
    };
    Ok(storage)
}
