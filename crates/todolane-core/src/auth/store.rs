use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use thiserror::Error;
use tracing::{debug, warn};

use super::Session;

/// Token file name in the cache directory
const TOKEN_FILE: &str = "tokens.json";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Keychain error: {0}")]
    Keyring(#[from] keyring::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Token file is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),

    #[error("Token store lock poisoned")]
    Poisoned,
}

/// Keys the client persists. Values are opaque strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum StoreKey {
    AccessToken,
    RefreshToken,
    /// Held between registration/reset steps only
    Username,
}

impl StoreKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreKey::AccessToken => "accessToken",
            StoreKey::RefreshToken => "refreshToken",
            StoreKey::Username => "username",
        }
    }
}

/// Raw key/value persistence behind the token store.
pub trait TokenBackend: Send + Sync {
    fn read(&self, key: StoreKey) -> Result<Option<String>, StoreError>;
    fn write(&self, key: StoreKey, value: &str) -> Result<(), StoreError>;
    /// Removing a missing key is not an error.
    fn remove(&self, key: StoreKey) -> Result<(), StoreError>;
}

/// Owner of the persisted credentials.
///
/// Either both tokens are stored or neither is; `clear` is the only way to
/// get back to an empty session. Writes are serialized so a check-then-write
/// against the current refresh token can't interleave with a login or clear.
pub struct TokenStore {
    backend: Box<dyn TokenBackend>,
    writes: Mutex<()>,
}

impl TokenStore {
    pub fn new(backend: impl TokenBackend + 'static) -> Self {
        Self {
            backend: Box::new(backend),
            writes: Mutex::new(()),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(MemoryBackend::default())
    }

    /// Read the current session. Unreadable entries count as absent.
    pub fn get(&self) -> Session {
        let access = self.read_or_absent(StoreKey::AccessToken);
        let refresh = self.read_or_absent(StoreKey::RefreshToken);
        Session::from_tokens(access, refresh)
    }

    /// Replace the access token after a refresh.
    pub fn set_access(&self, access_token: &str) -> Result<(), StoreError> {
        let _guard = self.lock_writes();
        self.backend.write(StoreKey::AccessToken, access_token)?;
        debug!("Access token updated");
        Ok(())
    }

    /// Replace the access token only if `refresh_token` is still the stored
    /// refresh token. Returns `false` and writes nothing otherwise.
    pub fn set_access_for(
        &self,
        refresh_token: &str,
        access_token: &str,
    ) -> Result<bool, StoreError> {
        let _guard = self.lock_writes();
        if !self.holds_refresh(refresh_token) {
            debug!("Session changed, discarding refreshed access token");
            return Ok(false);
        }
        self.backend.write(StoreKey::AccessToken, access_token)?;
        debug!("Access token updated");
        Ok(true)
    }

    /// Store a fresh token pair after login.
    pub fn set_tokens(&self, access_token: &str, refresh_token: &str) -> Result<(), StoreError> {
        let _guard = self.lock_writes();
        self.backend.write(StoreKey::RefreshToken, refresh_token)?;
        if let Err(e) = self.backend.write(StoreKey::AccessToken, access_token) {
            // Never leave a refresh token without its access token
            if let Err(rollback) = self.backend.remove(StoreKey::RefreshToken) {
                warn!(error = %rollback, "Failed to roll back refresh token");
            }
            return Err(e);
        }
        debug!("Token pair stored");
        Ok(())
    }

    /// Remove both tokens and any pending username.
    ///
    /// Every removal is attempted; the first failure is returned.
    pub fn clear(&self) -> Result<(), StoreError> {
        let _guard = self.lock_writes();
        self.clear_all()
    }

    /// Clear only if `refresh_token` is still the stored refresh token.
    /// Returns whether anything was cleared.
    pub fn clear_for(&self, refresh_token: &str) -> Result<bool, StoreError> {
        let _guard = self.lock_writes();
        if !self.holds_refresh(refresh_token) {
            return Ok(false);
        }
        self.clear_all().map(|()| true)
    }

    fn clear_all(&self) -> Result<(), StoreError> {
        let results = [
            self.backend.remove(StoreKey::AccessToken),
            self.backend.remove(StoreKey::RefreshToken),
            self.backend.remove(StoreKey::Username),
        ];
        debug!("Token store cleared");
        results.into_iter().collect()
    }

    pub fn set_username(&self, username: &str) -> Result<(), StoreError> {
        self.backend.write(StoreKey::Username, username)
    }

    pub fn username(&self) -> Option<String> {
        self.read_or_absent(StoreKey::Username)
    }

    pub fn clear_username(&self) -> Result<(), StoreError> {
        self.backend.remove(StoreKey::Username)
    }

    fn lock_writes(&self) -> MutexGuard<'_, ()> {
        self.writes.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn holds_refresh(&self, refresh_token: &str) -> bool {
        self.read_or_absent(StoreKey::RefreshToken).as_deref() == Some(refresh_token)
    }

    fn read_or_absent(&self, key: StoreKey) -> Option<String> {
        match self.backend.read(key) {
            Ok(value) => value.filter(|v| !v.is_empty()),
            Err(e) => {
                warn!(key = key.as_str(), error = %e, "Failed to read token store");
                None
            }
        }
    }
}

// ============================================================================
// Backends
// ============================================================================

/// In-process storage. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: Mutex<BTreeMap<StoreKey, String>>,
}

impl TokenBackend for MemoryBackend {
    fn read(&self, key: StoreKey) -> Result<Option<String>, StoreError> {
        let entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(entries.get(&key).cloned())
    }

    fn write(&self, key: StoreKey, value: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        entries.insert(key, value.to_string());
        Ok(())
    }

    fn remove(&self, key: StoreKey) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        entries.remove(&key);
        Ok(())
    }
}

/// JSON map persisted in the cache directory.
#[derive(Debug)]
pub struct FileBackend {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileBackend {
    pub fn new(cache_dir: impl AsRef<Path>) -> Self {
        Self {
            path: cache_dir.as_ref().join(TOKEN_FILE),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<BTreeMap<String, String>, StoreError> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => Ok(serde_json::from_str(&contents)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, entries: &BTreeMap<String, String>) -> Result<(), StoreError> {
        if entries.is_empty() {
            return match fs::remove_file(&self.path) {
                Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e.into()),
                _ => Ok(()),
            };
        }
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(entries)?;
        fs::write(&self.path, contents)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&self.path, fs::Permissions::from_mode(0o600))?;
        }
        Ok(())
    }
}

impl TokenBackend for FileBackend {
    fn read(&self, key: StoreKey) -> Result<Option<String>, StoreError> {
        let _guard = self.lock.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(self.load()?.remove(key.as_str()))
    }

    fn write(&self, key: StoreKey, value: &str) -> Result<(), StoreError> {
        let _guard = self.lock.lock().map_err(|_| StoreError::Poisoned)?;
        let mut entries = self.load()?;
        entries.insert(key.as_str().to_string(), value.to_string());
        self.save(&entries)
    }

    fn remove(&self, key: StoreKey) -> Result<(), StoreError> {
        let _guard = self.lock.lock().map_err(|_| StoreError::Poisoned)?;
        let mut entries = self.load()?;
        if entries.remove(key.as_str()).is_some() {
            self.save(&entries)?;
        }
        Ok(())
    }
}
