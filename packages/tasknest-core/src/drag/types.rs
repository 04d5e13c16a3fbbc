use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::store::BoardSnapshot;
use crate::types::ItemKind;

/// Drag-start gesture: the item picked up and what kind it is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DragStart {
    pub item_id: String,
    pub item_kind: ItemKind,
}

impl DragStart {
    pub fn task(id: impl Into<String>) -> Self {
        Self {
            item_id: id.into(),
            item_kind: ItemKind::Task,
        }
    }

    pub fn column(id: impl Into<String>) -> Self {
        Self {
            item_id: id.into(),
            item_kind: ItemKind::Column,
        }
    }
}

/// What the pointer is over. A column target doubles as the task container,
/// so gesture layers that report `"container"` land on `Column`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    Task,
    #[serde(alias = "container")]
    Column,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DragTarget {
    pub target_id: String,
    pub target_kind: TargetKind,
}

impl DragTarget {
    pub fn task(id: impl Into<String>) -> Self {
        Self {
            target_id: id.into(),
            target_kind: TargetKind::Task,
        }
    }

    pub fn column(id: impl Into<String>) -> Self {
        Self {
            target_id: id.into(),
            target_kind: TargetKind::Column,
        }
    }
}

/// What happens when a gesture ends outside any target.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropPolicy {
    /// Leave the last tentative move applied.
    #[default]
    KeepLastMove,
    /// Put the board back as it was at drag start.
    RevertOnCancel,
}

/// The item currently held by a gesture.
#[derive(Debug, Clone)]
pub struct Lifted {
    pub item_id: String,
    pub item_kind: ItemKind,
    /// Column of a task, or board of a column, when the drag began.
    pub origin_container_id: String,
    pub(crate) last_target: Option<DragTarget>,
    pub(crate) checkpoint: Option<Arc<BoardSnapshot>>,
}

#[derive(Debug, Clone, Default)]
pub enum DragState {
    #[default]
    Idle,
    Lifted(Lifted),
}

/// Result of feeding one gesture event to the coordinator.
#[derive(Debug, Clone)]
pub enum DragOutcome {
    /// Event did not apply: no drag in progress, a cross-kind or self
    /// target, or a repeat of the previous hover target.
    Ignored,
    /// Event was valid but the board already matched it.
    Unchanged,
    /// The store committed a new snapshot.
    Moved(Arc<BoardSnapshot>),
}

impl DragOutcome {
    pub fn is_moved(&self) -> bool {
        matches!(self, DragOutcome::Moved(_))
    }

    pub fn snapshot(&self) -> Option<&Arc<BoardSnapshot>> {
        match self {
            DragOutcome::Moved(snap) => Some(snap),
            _ => None,
        }
    }
}
