//! Durable credential storage.
//!
//! The store is a dumb key-value layer: it performs no validation and knows
//! nothing about tokens. The session manager is its only writer.

use std::collections::{BTreeMap, HashMap};
use std::ffi::OsString;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use thiserror::Error;

/// Slot holding the access token.
pub const ACCESS_TOKEN_KEY: &str = "access_token";
/// Slot holding the refresh token.
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";
/// Slot holding the JSON-serialized user record.
pub const USER_KEY: &str = "user";

/// Every slot that makes up a session; cleared together.
pub const SESSION_KEYS: [&str; 3] = [ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, USER_KEY];

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("credential store IO error: {0}")]
    Io(#[from] io::Error),

    #[error("credential store serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Synchronous key-value persistence for session credentials.
///
/// A missing key is `Ok(None)`, never an error.
pub trait CredentialStore: Send + Sync {
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

/// File-backed credential store.
///
/// All slots live in a single JSON document. Every mutation rewrites the
/// document to a temporary sibling and renames it over the original, so a
/// crash leaves either the old or the new document, never a torn one.
///
/// The document is the only state: every read and every mutation loads it
/// afresh, so several handles on one path (other windows, other CLI runs)
/// see each other's writes instead of replaying a stale snapshot.
#[derive(Debug)]
pub struct FileCredentialStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileCredentialStore {
    /// Open (or lazily create) the store at `path`.
    ///
    /// A document that cannot be parsed is treated as empty so a damaged
    /// store degrades to "no session" instead of blocking startup.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let store = Self {
            path,
            lock: Mutex::new(()),
        };
        store.load()?;

        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = OsString::from(".");
        if let Some(file_name) = self.path.file_name() {
            name.push(file_name);
        }
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn load(&self) -> Result<BTreeMap<String, String>, StoreError> {
        match fs::read_to_string(&self.path) {
            Ok(text) => match serde_json::from_str(&text) {
                Ok(slots) => Ok(slots),
                Err(err) => {
                    tracing::warn!(path = ?self.path, error = %err, "credential store unreadable; treating as empty");
                    Ok(BTreeMap::new())
                }
            },
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(err) => Err(err.into()),
        }
    }

    fn persist(&self, slots: &BTreeMap<String, String>) -> Result<(), StoreError> {
        let json = serde_json::to_vec_pretty(slots)?;
        let temp_path = self.temp_path();

        write_private(&temp_path, &json)?;
        fs::rename(&temp_path, &self.path)?;

        Ok(())
    }

    fn update<F>(&self, mutate: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut BTreeMap<String, String>) -> bool,
    {
        let _guard = self.lock.lock();
        let mut slots = self.load()?;
        if !mutate(&mut slots) {
            return Ok(());
        }

        self.persist(&slots)
    }
}

impl CredentialStore for FileCredentialStore {
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.update(|slots| {
            slots.insert(key.to_string(), value.to_string());
            true
        })
    }

    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let _guard = self.lock.lock();
        Ok(self.load()?.remove(key))
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.update(|slots| slots.remove(key).is_some())
    }
}

/// Credentials are written owner-readable only where the platform allows it.
fn write_private(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);

    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}

/// In-process credential store.
///
/// Not durable; for tests and for embedders that persist elsewhere.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    slots: Mutex<HashMap<String, String>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.lock().is_empty()
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.slots.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.slots.lock().get(key).cloned())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.slots.lock().remove(key);
        Ok(())
    }
}
