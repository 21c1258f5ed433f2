//! Persisted session storage
//!
//! The session store and the gateway share one key-value record as their
//! source of truth. Writes are fire-and-forget like browser storage: a backend
//! that cannot persist logs the failure and keeps serving its in-memory copy.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

/// Key holding the access token
pub const TOKEN_KEY: &str = "token";
/// Key holding the refresh token
pub const REFRESH_TOKEN_KEY: &str = "refreshToken";
/// Key holding the JSON-serialized user
pub const USER_KEY: &str = "user";

/// Key-value persistence for session credentials
pub trait SessionPersistence: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
    fn remove(&self, key: &str);

    /// Remove every session key
    fn clear_session(&self) {
        self.remove(TOKEN_KEY);
        self.remove(USER_KEY);
        self.remove(REFRESH_TOKEN_KEY);
    }
}

/// Process-local storage, lost on exit
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SessionPersistence for MemoryStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn set(&self, key: &str, value: &str) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.to_string());
    }

    fn remove(&self, key: &str) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
    }
}

/// Storage backed by a JSON object on disk
///
/// The whole file is rewritten on every change.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    entries: Mutex<HashMap<String, String>>,
}

impl FileStorage {
    /// Open the file at `path`, starting empty if it does not exist.
    ///
    /// A file that is not a JSON object of strings is treated as empty and
    /// replaced on the next write.
    pub fn open(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();
        let entries = match fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                warn!(path = %path.display(), "Ignoring unreadable session file: {e}");
                HashMap::new()
            }),
            Err(e) if e.kind() == io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(e),
        };
        debug!(path = %path.display(), keys = entries.len(), "Opened session file");

        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self, entries: &HashMap<String, String>) {
        if let Err(e) = self.write(entries) {
            warn!(path = %self.path.display(), "Failed to persist session: {e}");
        }
    }

    /// Replace the file atomically: a crash mid-write leaves the previous
    /// record intact
    fn write(&self, entries: &HashMap<String, String>) -> io::Result<()> {
        let dir = self
            .path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(dir)?;

        let mut file = NamedTempFile::new_in(dir)?;
        serde_json::to_writer_pretty(&mut file, entries)?;
        file.as_file().sync_all()?;
        file.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }
}

impl SessionPersistence for FileStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn set(&self, key: &str, value: &str) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.insert(key.to_string(), value.to_string());
        self.flush(&entries);
    }

    fn remove(&self, key: &str) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if entries.remove(key).is_some() {
            self.flush(&entries);
        }
    }
}

// Mock implementation for testing
#[cfg(test)]
pub mod mock {
    use super::SessionPersistence;
    use mockall::mock;

    mock! {
        pub Persistence {}

        impl SessionPersistence for Persistence {
            fn get(&self, key: &str) -> Option<String>;
            fn set(&self, key: &str, value: &str);
            fn remove(&self, key: &str);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_storage_clear_session() {
        let storage = MemoryStorage::new();
        storage.set(TOKEN_KEY, "t1");
        storage.set(REFRESH_TOKEN_KEY, "r1");
        storage.set(USER_KEY, r#"{"id":1}"#);
        storage.set("theme", "dark");

        storage.clear_session();

        assert_eq!(storage.get(TOKEN_KEY), None);
        assert_eq!(storage.get(REFRESH_TOKEN_KEY), None);
        assert_eq!(storage.get(USER_KEY), None);
        assert_eq!(storage.get("theme").as_deref(), Some("dark"));
        assert_eq!(storage.len(), 1);
    }

    #[test]
    fn test_file_storage_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("session.json");

        let storage = FileStorage::open(&path).unwrap();
        storage.set(TOKEN_KEY, "t1");
        storage.set(USER_KEY, r#"{"id":1}"#);
        storage.remove(USER_KEY);
        drop(storage);

        let reopened = FileStorage::open(&path).unwrap();
        assert_eq!(reopened.get(TOKEN_KEY).as_deref(), Some("t1"));
        assert_eq!(reopened.get(USER_KEY), None);
    }

    #[test]
    fn test_file_storage_ignores_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        fs::write(&path, "not json").unwrap();

        let storage = FileStorage::open(&path).unwrap();
        assert_eq!(storage.get(TOKEN_KEY), None);

        storage.set(TOKEN_KEY, "t2");
        let reopened = FileStorage::open(&path).unwrap();
        assert_eq!(reopened.get(TOKEN_KEY).as_deref(), Some("t2"));
    }

    #[test]
    fn test_file_storage_leaves_no_temporary_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");

        let storage = FileStorage::open(&path).unwrap();
        storage.set(TOKEN_KEY, "t1");
        storage.set(REFRESH_TOKEN_KEY, "r1");
        storage.clear_session();
        storage.set(TOKEN_KEY, "t2");

        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("session.json")]);
        let saved: HashMap<String, String> =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(saved.get(TOKEN_KEY).map(String::as_str), Some("t2"));
        assert_eq!(saved.len(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_file_storage_replaces_instead_of_truncating() {
        use std::io::Read;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        let storage = FileStorage::open(&path).unwrap();
        storage.set(TOKEN_KEY, "t1");
        let before = fs::read_to_string(&path).unwrap();

        let mut previous = fs::File::open(&path).unwrap();
        storage.set(TOKEN_KEY, "t2");

        let mut content = String::new();
        previous.read_to_string(&mut content).unwrap();
        assert_eq!(content, before);
        assert!(fs::read_to_string(&path).unwrap().contains("t2"));
    }
}
