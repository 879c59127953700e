//! Local persistence of the admin session token.

use std::fmt::Debug;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tracing::debug;

/// Name of the token file inside the data directory.
pub const TOKEN_FILE_NAME: &str = "adminToken";

/// Storage for a single opaque session token.
///
/// The presence of a token is all that matters,
/// its content is never interpreted.
pub trait TokenStore {
    fn load(&self) -> io::Result<Option<String>>;
    fn save(&self, token: &str) -> io::Result<()>;
    fn remove(&self) -> io::Result<()>;
}

/// A token stored as a file in the data directory.
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self {
            path: data_dir.as_ref().join(TOKEN_FILE_NAME),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self) -> io::Result<Option<String>> {
        match std::fs::read_to_string(&self.path) {
            Ok(token) => Ok(Some(token)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn save(&self, token: &str) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        debug!(path = %self.path.display(), "writing session token");
        std::fs::write(&self.path, token)
    }

    fn remove(&self) -> io::Result<()> {
        match std::fs::remove_file(&self.path) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }
}

/// An in-memory token store, clones share the same token.
#[derive(Debug, Clone, Default)]
pub struct MemoryTokenStore {
    token: Arc<Mutex<Option<String>>>,
}

impl MemoryTokenStore {
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: Arc::new(Mutex::new(Some(token.into()))),
        }
    }

    fn lock(&self) -> io::Result<std::sync::MutexGuard<'_, Option<String>>> {
        self.token
            .lock()
            .map_err(|_| io::Error::other("token store lock poisoned"))
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> io::Result<Option<String>> {
        Ok(self.lock()?.clone())
    }

    fn save(&self, token: &str) -> io::Result<()> {
        *self.lock()? = Some(token.to_string());
        Ok(())
    }

    fn remove(&self) -> io::Result<()> {
        *self.lock()? = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_store_round_trip() {
        let tempdir = tempfile::tempdir().unwrap();
        let store = FileTokenStore::new(tempdir.path().join("nested"));

        assert_eq!(store.load().unwrap(), None);
        store.save("admin_token_1").unwrap();
        assert_eq!(store.load().unwrap().as_deref(), Some("admin_token_1"));
        assert!(store.path().ends_with(TOKEN_FILE_NAME));

        store.remove().unwrap();
        assert_eq!(store.load().unwrap(), None);
        // removing twice is fine
        store.remove().unwrap();
    }

    #[test]
    fn memory_store_clones_share_token() {
        let store = MemoryTokenStore::default();
        let clone = store.clone();
        store.save("token").unwrap();
        assert_eq!(clone.load().unwrap().as_deref(), Some("token"));
    }
}
