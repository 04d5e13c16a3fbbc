pub mod config;
pub mod drag;
pub mod reorder;
pub mod storage;
pub mod store;
pub mod types;

pub use config::{load_config, EngineConfig};
pub use drag::{DragCoordinator, DragOutcome, DragStart, DragTarget, DropPolicy, TargetKind};
pub use reorder::OrderedItem;
pub use storage::{BoardRepository, LocalStorage, StorageError};
pub use store::{BoardChangeEvent, BoardSnapshot, BoardStore, StoreError};
