use anyhow::{Context, Result};
use keyring::Entry;

use super::store::{StorageKey, TokenStore};

/// Token store backed by the OS keychain, one entry per storage key.
///
/// Entries are opened once and reused, so every read sees earlier writes
/// through the same credential handle.
#[derive(Debug)]
pub struct KeyringTokenStore {
    access_token: Entry,
    refresh_token: Entry,
}

impl KeyringTokenStore {
    pub fn new(service: &str) -> Result<Self> {
        let open = |key: StorageKey| {
            Entry::new(service, key.name())
                .with_context(|| format!("Failed to create keyring entry for {}", key))
        };
        Ok(Self {
            access_token: open(StorageKey::AccessToken)?,
            refresh_token: open(StorageKey::RefreshToken)?,
        })
    }

    fn entry(&self, key: StorageKey) -> &Entry {
        match key {
            StorageKey::AccessToken => &self.access_token,
            StorageKey::RefreshToken => &self.refresh_token,
        }
    }
}

impl TokenStore for KeyringTokenStore {
    fn get(&self, key: StorageKey) -> Result<Option<String>> {
        match self.entry(key).get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e).context("Failed to retrieve token from keychain"),
        }
    }

    fn set(&self, key: StorageKey, value: &str) -> Result<()> {
        self.entry(key)
            .set_password(value)
            .context("Failed to store token in keychain")
    }

    fn remove(&self, key: StorageKey) -> Result<()> {
        match self.entry(key).delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e).context("Failed to delete token from keychain"),
        }
    }
}
