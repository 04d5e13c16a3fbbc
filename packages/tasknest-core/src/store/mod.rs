pub mod engine;
pub mod snapshot;

use serde::{Deserialize, Serialize};

pub use engine::BoardStore;
pub use snapshot::BoardSnapshot;

/// Failure of a store operation. A failed operation never changes state.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("Board not found: {0}")]
    BoardNotFound(String),

    #[error("Column not found: {0}")]
    ColumnNotFound(String),

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Comment {comment_id} not found on task {task_id}")]
    CommentNotFound { task_id: String, comment_id: String },

    #[error("Id already in use: {0}")]
    DuplicateId(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl StoreError {
    /// True for every variant that names a missing entity.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            StoreError::BoardNotFound(_)
                | StoreError::ColumnNotFound(_)
                | StoreError::TaskNotFound(_)
                | StoreError::CommentNotFound { .. }
        )
    }

    /// True for rejected input: malformed permutations, writes to derived
    /// fields, reused ids.
    pub fn is_invalid_argument(&self) -> bool {
        matches!(
            self,
            StoreError::InvalidArgument(_) | StoreError::DuplicateId(_)
        )
    }
}

/// Notification sent to subscribers after every committed mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum BoardChangeEvent {
    BoardAdded { board_id: String, version: u64 },
    BoardUpdated { board_id: String, version: u64 },
    BoardDeleted { board_id: String },
    /// The workspace's selected board changed. `None` clears the selection.
    CurrentBoardChanged { board_id: Option<String> },
}

impl BoardChangeEvent {
    /// The board the event is about; `None` only for a cleared selection.
    pub fn board_id(&self) -> Option<&str> {
        match self {
            BoardChangeEvent::BoardAdded { board_id, .. }
            | BoardChangeEvent::BoardUpdated { board_id, .. }
            | BoardChangeEvent::BoardDeleted { board_id } => Some(board_id),
            BoardChangeEvent::CurrentBoardChanged { board_id } => board_id.as_deref(),
        }
    }
}
