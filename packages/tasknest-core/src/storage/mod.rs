pub mod hydrate;
pub mod local;

use crate::store::BoardStore;
use crate::types::WorkspaceSnapshot;

pub use local::LocalStorage;

/// Persistence backend for the whole workspace.
/// Implementations: LocalStorage (JSON file).
pub trait BoardRepository: Send + Sync {
    /// Read the stored workspace. `Ok(None)` when nothing has been saved yet.
    fn load(&self) -> Result<Option<WorkspaceSnapshot>, StorageError>;

    /// Persist the workspace. Returns false when the stored content was
    /// already identical and nothing was written.
    fn save(&self, snapshot: &WorkspaceSnapshot) -> Result<bool, StorageError>;
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid snapshot: {0}")]
    InvalidSnapshot(String),
}

/// Build a store from whatever the repository holds, or an empty one.
pub fn load_store(
    repo: &dyn BoardRepository,
    event_capacity: usize,
) -> Result<BoardStore, StorageError> {
    let store = match repo.load()? {
        Some(snapshot) => BoardStore::from_snapshot(snapshot, event_capacity),
        None => BoardStore::with_event_capacity(event_capacity),
    };
    log::info!(
        "[tasknest.storage.load] Loaded {} boards",
        store.boards().len()
    );
    Ok(store)
}

/// Persist the full store.
pub fn save_store(repo: &dyn BoardRepository, store: &BoardStore) -> Result<bool, StorageError> {
    repo.save(&store.to_snapshot())
}
