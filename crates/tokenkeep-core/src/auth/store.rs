//! Persistent credential store.
//!
//! The session manager writes exactly two keys through [`TokenStore`]: the
//! access token and the refresh token. Writes of the two keys are not
//! transactional; the manager always writes or removes both together.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

/// Token file name in the data directory
const TOKEN_FILE: &str = "tokens.json";

/// The keys the session manager persists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StorageKey {
    AccessToken,
    RefreshToken,
}

impl StorageKey {
    pub const ALL: [StorageKey; 2] = [StorageKey::AccessToken, StorageKey::RefreshToken];

    /// Stable name used in every backend.
    pub fn name(&self) -> &'static str {
        match self {
            StorageKey::AccessToken => "auth_token",
            StorageKey::RefreshToken => "refresh_token",
        }
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Durable key-value storage that survives process restarts.
pub trait TokenStore: Send + Sync {
    fn get(&self, key: StorageKey) -> Result<Option<String>>;

    fn set(&self, key: StorageKey, value: &str) -> Result<()>;

    /// Remove a key. Removing an absent key succeeds.
    fn remove(&self, key: StorageKey) -> Result<()>;
}

impl<T: TokenStore + ?Sized> TokenStore for Box<T> {
    fn get(&self, key: StorageKey) -> Result<Option<String>> {
        (**self).get(key)
    }

    fn set(&self, key: StorageKey, value: &str) -> Result<()> {
        (**self).set(key, value)
    }

    fn remove(&self, key: StorageKey) -> Result<()> {
        (**self).remove(key)
    }
}

// ============================================================================
// In-memory store
// ============================================================================

/// Process-local store for tests and embedders that persist elsewhere.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    entries: Mutex<HashMap<StorageKey, String>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with a token pair.
    pub fn with_tokens(access_token: &str, refresh_token: &str) -> Self {
        let entries = HashMap::from([
            (StorageKey::AccessToken, access_token.to_string()),
            (StorageKey::RefreshToken, refresh_token.to_string()),
        ]);
        Self {
            entries: Mutex::new(entries),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().map(|e| e.is_empty()).unwrap_or(false)
    }

    fn entries(&self) -> Result<std::sync::MutexGuard<'_, HashMap<StorageKey, String>>> {
        self.entries
            .lock()
            .map_err(|_| anyhow::anyhow!("Token store lock poisoned"))
    }
}

impl TokenStore for MemoryTokenStore {
    fn get(&self, key: StorageKey) -> Result<Option<String>> {
        Ok(self.entries()?.get(&key).cloned())
    }

    fn set(&self, key: StorageKey, value: &str) -> Result<()> {
        self.entries()?.insert(key, value.to_string());
        Ok(())
    }

    fn remove(&self, key: StorageKey) -> Result<()> {
        self.entries()?.remove(&key);
        Ok(())
    }
}

// ============================================================================
// File store
// ============================================================================

/// Stores both tokens in one JSON document, readable only by the owner.
/// The file is deleted once it holds no keys.
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    dir: PathBuf,
}

impl FileTokenStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(TOKEN_FILE)
    }

    fn load(&self) -> Result<BTreeMap<String, String>> {
        let path = self.path();
        if !path.exists() {
            return Ok(BTreeMap::new());
        }
        let contents = std::fs::read_to_string(&path).context("Failed to read token file")?;
        serde_json::from_str(&contents).context("Failed to parse token file")
    }

    fn save(&self, entries: &BTreeMap<String, String>) -> Result<()> {
        let path = self.path();
        if entries.is_empty() {
            if path.exists() {
                std::fs::remove_file(&path).context("Failed to remove token file")?;
            }
            return Ok(());
        }

        std::fs::create_dir_all(&self.dir).context("Failed to create data directory")?;
        let contents = serde_json::to_string_pretty(entries)?;
        std::fs::write(&path, contents).context("Failed to write token file")?;
        restrict_permissions(&path)?;
        Ok(())
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> Result<()> {
    let mut perms = std::fs::metadata(path)?.permissions();
    perms.set_mode(0o600);
    std::fs::set_permissions(path, perms)?;
    Ok(())
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> Result<()> {
    Ok(())
}

impl TokenStore for FileTokenStore {
    fn get(&self, key: StorageKey) -> Result<Option<String>> {
        Ok(self.load()?.remove(key.name()))
    }

    fn set(&self, key: StorageKey, value: &str) -> Result<()> {
        let mut entries = self.load()?;
        entries.insert(key.name().to_string(), value.to_string());
        self.save(&entries)
    }

    fn remove(&self, key: StorageKey) -> Result<()> {
        let mut entries = self.load()?;
        if entries.remove(key.name()).is_some() {
            self.save(&entries)?;
        }
        Ok(())
    }
}
