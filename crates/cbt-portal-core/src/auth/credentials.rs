use keyring::Entry;

use super::storage::{PersistedSession, SessionStorage, StorageError, STORAGE_NAMESPACE};

const SERVICE_NAME: &str = "cbt-portal";

/// Session record kept in the OS keychain as a JSON string.
pub struct KeyringStorage {
    entry: Entry,
}

impl KeyringStorage {
    pub fn new() -> Result<Self, StorageError> {
        Self::with_account(STORAGE_NAMESPACE)
    }

    /// Use a separate keychain account, e.g. one per backend profile
    pub fn with_account(account: &str) -> Result<Self, StorageError> {
        Ok(Self {
            entry: Entry::new(SERVICE_NAME, account)?,
        })
    }

    #[cfg(test)]
    fn from_entry(entry: Entry) -> Self {
        Self { entry }
    }
}

impl SessionStorage for KeyringStorage {
    fn load(&self) -> Result<Option<PersistedSession>, StorageError> {
        match self.entry.get_password() {
            Ok(secret) => Ok(Some(serde_json::from_str(&secret)?)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, record: &PersistedSession) -> Result<(), StorageError> {
        let secret = serde_json::to_string(record)?;
        self.entry.set_password(&secret)?;
        Ok(())
    }

    fn remove(&self) -> Result<(), StorageError> {
        match self.entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keyring::credential::CredentialBuilderApi;

    fn record() -> PersistedSession {
        PersistedSession {
            user: None,
            access_token: Some("a1".to_string()),
            refresh_token: Some("r1".to_string()),
            is_authenticated: true,
        }
    }

    #[test]
    fn test_save_load_remove_with_mock_credential() {
        let credential = keyring::mock::default_credential_builder()
            .build(None, SERVICE_NAME, "test-account")
            .expect("mock credential");
        let storage = KeyringStorage::from_entry(Entry::new_with_credential(credential));

        assert!(storage.load().expect("empty load").is_none());
        storage.save(&record()).expect("save");
        assert_eq!(storage.load().expect("load"), Some(record()));

        storage.remove().expect("remove");
        assert!(storage.load().expect("load after remove").is_none());
        storage.remove().expect("second remove");
    }

    /// Needs a real platform keychain
    #[test]
    #[ignore]
    fn test_record_survives_new_storage_instance() {
        let account = "cbt-portal-test-roundtrip";
        let first = KeyringStorage::with_account(account).expect("keyring");
        first.save(&record()).expect("save");

        let second = KeyringStorage::with_account(account).expect("keyring");
        assert_eq!(second.load().expect("load"), Some(record()));
        second.remove().expect("cleanup");
    }
}
