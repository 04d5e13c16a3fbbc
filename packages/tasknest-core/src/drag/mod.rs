/// Drag coordinator.
///
/// Turns a stream of gesture events (start, hover, end) into store moves.
/// Hover moves are committed immediately, so the board always shows where
/// the item would land. Events for one gesture must arrive in order.
pub mod types;

use std::sync::Arc;

pub use types::{DragOutcome, DragStart, DragState, DragTarget, DropPolicy, Lifted, TargetKind};

use crate::config::EngineConfig;
use crate::store::{BoardSnapshot, BoardStore, StoreError};
use crate::types::ItemKind;

#[derive(Debug)]
pub struct DragCoordinator {
    board_id: String,
    policy: DropPolicy,
    state: DragState,
}

impl DragCoordinator {
    pub fn new(board_id: impl Into<String>, policy: DropPolicy) -> Self {
        Self {
            board_id: board_id.into(),
            policy,
            state: DragState::Idle,
        }
    }

    pub fn from_config(board_id: impl Into<String>, config: &EngineConfig) -> Self {
        Self::new(board_id, config.drop_policy)
    }

    pub fn board_id(&self) -> &str {
        &self.board_id
    }

    pub fn policy(&self) -> DropPolicy {
        self.policy
    }

    pub fn state(&self) -> &DragState {
        &self.state
    }

    pub fn lifted(&self) -> Option<&Lifted> {
        match &self.state {
            DragState::Lifted(lifted) => Some(lifted),
            DragState::Idle => None,
        }
    }

    pub fn is_dragging(&self) -> bool {
        self.lifted().is_some()
    }

    /// Lift an item. The origin container is read from the store, not taken
    /// from the gesture layer.
    pub fn drag_start(&mut self, store: &BoardStore, start: DragStart) -> Result<(), StoreError> {
        let board = store
            .board(&self.board_id)
            .ok_or_else(|| StoreError::BoardNotFound(self.board_id.clone()))?;
        let origin_container_id = match start.item_kind {
            ItemKind::Task => board
                .tasks
                .get(&start.item_id)
                .map(|t| t.column_id.clone())
                .ok_or_else(|| StoreError::TaskNotFound(start.item_id.clone()))?,
            ItemKind::Column => {
                if !board.columns.contains_key(&start.item_id) {
                    return Err(StoreError::ColumnNotFound(start.item_id));
                }
                board.id.clone()
            }
        };

        if let DragState::Lifted(previous) = &self.state {
            log::warn!(
                "[tasknest.drag] Drag of {} started while {} was still lifted; dropping the old gesture",
                start.item_id,
                previous.item_id
            );
        }
        log::debug!(
            "[tasknest.drag] Lifted {:?} {} from {}",
            start.item_kind,
            start.item_id,
            origin_container_id
        );

        let checkpoint = match self.policy {
            DropPolicy::RevertOnCancel => Some(board),
            DropPolicy::KeepLastMove => None,
        };
        self.state = DragState::Lifted(Lifted {
            item_id: start.item_id,
            item_kind: start.item_kind,
            origin_container_id,
            last_target: None,
            checkpoint,
        });
        Ok(())
    }

    /// Hover changed. Applies the tentative move right away.
    ///
    /// A repeat of the previous target is ignored: after a swap with a
    /// neighbour the pointer is still over that neighbour, and re-applying
    /// would swap the pair back.
    pub fn drag_over(
        &mut self,
        store: &mut BoardStore,
        target: &DragTarget,
    ) -> Result<DragOutcome, StoreError> {
        let DragState::Lifted(lifted) = &self.state else {
            log::debug!("[tasknest.drag] Hover over {} with nothing lifted", target.target_id);
            return Ok(DragOutcome::Ignored);
        };
        if lifted.last_target.as_ref() == Some(target) {
            return Ok(DragOutcome::Ignored);
        }

        let outcome = apply(&self.board_id, store, lifted, target)?;
        if !matches!(outcome, DragOutcome::Ignored) {
            if let DragState::Lifted(lifted) = &mut self.state {
                lifted.last_target = Some(target.clone());
            }
        }
        Ok(outcome)
    }

    /// Release. With a target the placement is settled (re-applied only if
    /// it differs from the last hover). Without one, the drop policy decides.
    /// The coordinator is idle afterwards even if the final move fails.
    pub fn drag_end(
        &mut self,
        store: &mut BoardStore,
        target: Option<&DragTarget>,
    ) -> Result<DragOutcome, StoreError> {
        let DragState::Lifted(lifted) = std::mem::take(&mut self.state) else {
            return Ok(DragOutcome::Ignored);
        };
        log::debug!(
            "[tasknest.drag] Dropped {} on {}",
            lifted.item_id,
            target.map_or("nothing", |t| t.target_id.as_str())
        );

        match target {
            Some(t) if lifted.last_target.as_ref() == Some(t) => Ok(DragOutcome::Unchanged),
            Some(t) => apply(&self.board_id, store, &lifted, t),
            None => self.settle_cancel(store, lifted),
        }
    }

    /// Same as `drag_end` with no target.
    pub fn drag_cancel(&mut self, store: &mut BoardStore) -> Result<DragOutcome, StoreError> {
        self.drag_end(store, None)
    }

    fn settle_cancel(
        &self,
        store: &mut BoardStore,
        lifted: Lifted,
    ) -> Result<DragOutcome, StoreError> {
        let Some(checkpoint) = lifted.checkpoint else {
            return Ok(DragOutcome::Unchanged);
        };
        let restored = store.restore_board(&checkpoint)?;
        if Arc::ptr_eq(&restored, &checkpoint) {
            return Ok(DragOutcome::Unchanged);
        }
        log::debug!(
            "[tasknest.drag] Reverted board {} after cancelled drag of {}",
            self.board_id,
            lifted.item_id
        );
        Ok(DragOutcome::Moved(restored))
    }
}

/// Resolve a target to a store move and run it.
fn apply(
    board_id: &str,
    store: &mut BoardStore,
    lifted: &Lifted,
    target: &DragTarget,
) -> Result<DragOutcome, StoreError> {
    // Ids are only unique per kind; a task and a column may share one.
    let same_kind = matches!(
        (lifted.item_kind, target.target_kind),
        (ItemKind::Task, TargetKind::Task) | (ItemKind::Column, TargetKind::Column)
    );
    if same_kind && target.target_id == lifted.item_id {
        return Ok(DragOutcome::Ignored);
    }
    let board = store
        .board(board_id)
        .ok_or_else(|| StoreError::BoardNotFound(board_id.to_string()))?;
    let item_id = lifted.item_id.as_str();

    let next = match (lifted.item_kind, target.target_kind) {
        (ItemKind::Task, TargetKind::Task) => {
            let from = current_column(&board, item_id)?;
            let over = board
                .tasks
                .get(&target.target_id)
                .ok_or_else(|| StoreError::TaskNotFound(target.target_id.clone()))?;
            store.move_task(board_id, item_id, &from, &over.column_id, over.order as i64)?
        }
        (ItemKind::Task, TargetKind::Column) => {
            let from = current_column(&board, item_id)?;
            let column_id = target.target_id.as_str();
            if !board.columns.contains_key(column_id) {
                return Err(StoreError::ColumnNotFound(column_id.to_string()));
            }
            if from == column_id {
                return Ok(DragOutcome::Unchanged);
            }
            let end = board
                .tasks
                .values()
                .filter(|t| t.column_id == column_id)
                .count();
            store.move_task(board_id, item_id, &from, column_id, end as i64)?
        }
        (ItemKind::Column, TargetKind::Column) => {
            let over = board
                .column(&target.target_id)
                .ok_or_else(|| StoreError::ColumnNotFound(target.target_id.clone()))?;
            store.move_column(board_id, item_id, over.order as i64)?
        }
        (ItemKind::Column, TargetKind::Task) => return Ok(DragOutcome::Ignored),
    };

    if Arc::ptr_eq(&board, &next) {
        Ok(DragOutcome::Unchanged)
    } else {
        Ok(DragOutcome::Moved(next))
    }
}

fn current_column(board: &BoardSnapshot, task_id: &str) -> Result<String, StoreError> {
    board
        .tasks
        .get(task_id)
        .map(|t| t.column_id.clone())
        .ok_or_else(|| StoreError::TaskNotFound(task_id.to_string()))
}
