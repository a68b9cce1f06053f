//! Key-value storage backends behind the token store.
//!
//! DESIGN
//! ======
//! The portal keeps credentials in two string-keyed stores: one that survives
//! restarts and one that lives only as long as the session. Both sit behind
//! `KeyValueStorage` so the token store never touches a concrete backend and
//! tests can swap in plain memory.
//!
//! `FileStorage` rewrites the whole JSON object on every write through a
//! uniquely named temp file plus rename, so a crash mid-write leaves the
//! previous contents intact and concurrent writers never share a temp file.
//! The file is readable by its owner only; directories it creates are 0700.

pub mod token_store;

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

pub use token_store::{CredentialPair, StorageScope, TokenStore};

/// Errors raised while writing to a storage backend.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Filesystem access failed.
    #[error("storage io failed for {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The entries could not be serialized.
    #[error("storage encode failed: {0}")]
    Encode(#[from] serde_json::Error),
}

/// A string-keyed store with browser-storage semantics.
///
/// Reads never fail: an unreadable backend reads as empty. Removal never fails
/// either; backends log what they could not delete.
pub trait KeyValueStorage: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;

    /// # Errors
    ///
    /// Returns an error if the backend cannot persist the value.
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    fn remove(&self, key: &str);
}

// =============================================================================
// MEMORY STORAGE
// =============================================================================

/// In-process storage, dropped with the process. Backs the ephemeral scope.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, String>> {
        self.entries.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl KeyValueStorage for MemoryStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.entries().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entries().insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove(&self, key: &str) {
        self.entries().remove(key);
    }
}

// =============================================================================
// FILE STORAGE
// =============================================================================

/// Storage persisted as a flat JSON object on disk. Backs the persistent scope.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), lock: Mutex::new(()) }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> BTreeMap<String, String> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return BTreeMap::new(),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "storage file unreadable; treating as empty");
                return BTreeMap::new();
            }
        };
        serde_json::from_str(&raw).unwrap_or_else(|e| {
            tracing::warn!(path = %self.path.display(), error = %e, "storage file corrupt; treating as empty");
            BTreeMap::new()
        })
    }

    fn store(&self, entries: &BTreeMap<String, String>) -> Result<(), StorageError> {
        let io_err = |source| StorageError::Io { path: self.path.display().to_string(), source };

        let dir = match self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            Some(parent) => {
                create_private_dir(parent).map_err(io_err)?;
                parent
            }
            None => Path::new("."),
        };
        let encoded = serde_json::to_vec_pretty(entries)?;

        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(io_err)?;
        restrict_to_owner(tmp.path(), SECURE_FILE_MODE).map_err(io_err)?;
        tmp.write_all(&encoded).map_err(io_err)?;
        tmp.as_file().sync_all().map_err(io_err)?;
        tmp.persist(&self.path).map_err(|e| io_err(e.error))?;
        Ok(())
    }
}

/// Owner read/write only.
const SECURE_FILE_MODE: u32 = 0o600;
/// Owner-only access for directories this crate creates.
const SECURE_DIR_MODE: u32 = 0o700;

#[cfg(unix)]
fn create_private_dir(dir: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::DirBuilderExt;
    std::fs::DirBuilder::new().recursive(true).mode(SECURE_DIR_MODE).create(dir)
}

#[cfg(not(unix))]
fn create_private_dir(dir: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(dir)
}

#[cfg(unix)]
fn restrict_to_owner(path: &Path, mode: u32) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
fn restrict_to_owner(_path: &Path, _mode: u32) -> std::io::Result<()> {
    Ok(())
}

impl KeyValueStorage for FileStorage {
    fn get(&self, key: &str) -> Option<String> {
        let _guard = self.lock.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        self.load().remove(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let _guard = self.lock.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let mut entries = self.load();
        entries.insert(key.to_owned(), value.to_owned());
        self.store(&entries)
    }

    fn remove(&self, key: &str) {
        let _guard = self.lock.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let mut entries = self.load();
        if entries.remove(key).is_none() {
            return;
        }
        if let Err(e) = self.store(&entries) {
            tracing::warn!(key, error = %e, "storage remove failed");
        }
    }
}
