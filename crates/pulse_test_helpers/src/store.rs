//! Temp-backed local store builders

use pulse_core::LocalStore;
use std::sync::Arc;
use tempfile::TempDir;

/// An initialized [`LocalStore`] backed by a temp directory that lives as
/// long as this value.
pub struct TempStore {
    pub store: Arc<LocalStore>,
    _dir: TempDir,
}

impl TempStore {
    /// The on-disk path of the database, for reopen tests.
    pub fn db_path(&self) -> std::path::PathBuf {
        self._dir.path().join("pulse.db")
    }
}

/// Create and initialize a local store in a fresh temp directory.
pub async fn temp_store() -> TempStore {
    let dir = TempDir::new().expect("temp dir");
    let store = Arc::new(LocalStore::new(dir.path().join("pulse.db")));
    store.init().await.expect("store init");
    TempStore { store, _dir: dir }
}

/// Create an uninitialized store handle in a fresh temp directory.
pub async fn uninitialized_store() -> TempStore {
    let dir = TempDir::new().expect("temp dir");
    let store = Arc::new(LocalStore::new(dir.path().join("pulse.db")));
    TempStore { store, _dir: dir }
}
