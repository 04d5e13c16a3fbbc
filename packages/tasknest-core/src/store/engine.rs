/// Board aggregate store.
///
/// Owns every board snapshot and is the only place they change. Each
/// operation validates against the current snapshot, builds the next one on a
/// shallow clone, and swaps it in whole. Readers holding an older
/// `Arc<BoardSnapshot>` never observe a partial write.
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::broadcast;

use super::snapshot::BoardSnapshot;
use super::{BoardChangeEvent, StoreError};
use crate::config::EngineConfig;
use crate::reorder;
use crate::types::*;

const DEFAULT_EVENT_CAPACITY: usize = 64;

pub struct BoardStore {
    boards: HashMap<String, Arc<BoardSnapshot>>,
    /// Insertion order of boards, for listing.
    board_order: Vec<String>,
    current_board_id: Option<String>,
    next_version: u64,
    event_tx: broadcast::Sender<BoardChangeEvent>,
}

impl std::fmt::Debug for BoardStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoardStore")
            .field("boards", &self.board_order)
            .field("current_board_id", &self.current_board_id)
            .field("next_version", &self.next_version)
            .finish_non_exhaustive()
    }
}

impl Default for BoardStore {
    fn default() -> Self {
        Self::new()
    }
}

impl BoardStore {
    pub fn new() -> Self {
        Self::with_event_capacity(DEFAULT_EVENT_CAPACITY)
    }

    pub fn with_event_capacity(capacity: usize) -> Self {
        let (event_tx, _) = broadcast::channel(capacity.max(1));
        Self {
            boards: HashMap::new(),
            board_order: Vec::new(),
            current_board_id: None,
            next_version: 1,
            event_tx,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::with_event_capacity(config.event_capacity)
    }

    /// Rebuild a store from a persisted workspace. Damaged ordering is
    /// repaired on the way in (see `BoardSnapshot::from_board`).
    pub fn from_snapshot(snapshot: WorkspaceSnapshot, event_capacity: usize) -> Self {
        let mut store = Self::with_event_capacity(event_capacity);
        for board in snapshot.boards {
            if store.boards.contains_key(&board.id) {
                log::warn!(
                    "[tasknest.store.load] Skipping duplicate board {}",
                    board.id
                );
                continue;
            }
            let (mut snap, repairs) = BoardSnapshot::from_board(board);
            if repairs > 0 {
                log::warn!(
                    "[tasknest.store.load] Board {} needed {} repairs",
                    snap.id,
                    repairs
                );
            }
            snap.version = store.next_version();
            store.board_order.push(snap.id.clone());
            store.boards.insert(snap.id.clone(), Arc::new(snap));
        }
        store.current_board_id = snapshot
            .current_board_id
            .filter(|id| store.boards.contains_key(id))
            .or_else(|| store.board_order.first().cloned());
        store
    }

    /// Plain serializable tree of everything in the store.
    pub fn to_snapshot(&self) -> WorkspaceSnapshot {
        WorkspaceSnapshot {
            boards: self
                .board_order
                .iter()
                .filter_map(|id| self.boards.get(id))
                .map(|snap| snap.to_board())
                .collect(),
            current_board_id: self.current_board_id.clone(),
        }
    }

    /// Receive a `BoardChangeEvent` after every committed mutation.
    pub fn subscribe(&self) -> broadcast::Receiver<BoardChangeEvent> {
        self.event_tx.subscribe()
    }

    // ── Reads ────────────────────────────────────────────────────────────────

    pub fn board(&self, board_id: &str) -> Option<Arc<BoardSnapshot>> {
        self.boards.get(board_id).cloned()
    }

    pub fn boards(&self) -> Vec<Arc<BoardSnapshot>> {
        self.board_order
            .iter()
            .filter_map(|id| self.boards.get(id).cloned())
            .collect()
    }

    pub fn current_board_id(&self) -> Option<&str> {
        self.current_board_id.as_deref()
    }

    pub fn current_board(&self) -> Option<Arc<BoardSnapshot>> {
        self.current_board_id
            .as_deref()
            .and_then(|id| self.board(id))
    }

    /// Select a board. Sends `CurrentBoardChanged` when the selection moves.
    pub fn set_current_board(&mut self, board_id: Option<&str>) -> Result<(), StoreError> {
        if let Some(id) = board_id {
            if !self.boards.contains_key(id) {
                return Err(StoreError::BoardNotFound(id.to_string()));
            }
        }
        if self.current_board_id.as_deref() == board_id {
            return Ok(());
        }
        self.current_board_id = board_id.map(str::to_string);
        self.notify(BoardChangeEvent::CurrentBoardChanged {
            board_id: self.current_board_id.clone(),
        });
        Ok(())
    }

    // ── Internals ────────────────────────────────────────────────────────────

    fn next_version(&mut self) -> u64 {
        let v = self.next_version;
        self.next_version += 1;
        v
    }

    fn notify(&self, event: BoardChangeEvent) {
        // No receivers is not an error.
        let _ = self.event_tx.send(event);
    }

    fn snapshot(&self, board_id: &str) -> Result<Arc<BoardSnapshot>, StoreError> {
        self.boards
            .get(board_id)
            .cloned()
            .ok_or_else(|| StoreError::BoardNotFound(board_id.to_string()))
    }

    fn commit(&mut self, mut next: BoardSnapshot) -> Arc<BoardSnapshot> {
        next.version = self.next_version();
        let board_id = next.id.clone();
        let version = next.version;
        let snap = Arc::new(next);
        self.boards.insert(board_id.clone(), Arc::clone(&snap));
        self.notify(BoardChangeEvent::BoardUpdated { board_id, version });
        snap
    }

    fn ensure_unique_task(current: &BoardSnapshot, task_id: &str) -> Result<(), StoreError> {
        if current.tasks.contains_key(task_id) {
            return Err(StoreError::DuplicateId(task_id.to_string()));
        }
        Ok(())
    }

    fn find_comment<'a>(
        current: &'a BoardSnapshot,
        task_id: &str,
        comment_id: &str,
    ) -> Result<&'a Comment, StoreError> {
        if !current.tasks.contains_key(task_id) {
            return Err(StoreError::TaskNotFound(task_id.to_string()));
        }
        current
            .comments
            .get(comment_id)
            .map(Arc::as_ref)
            .filter(|c| c.task_id == task_id)
            .ok_or_else(|| StoreError::CommentNotFound {
                task_id: task_id.to_string(),
                comment_id: comment_id.to_string(),
            })
    }

    // ── Boards ───────────────────────────────────────────────────────────────

    pub fn add_board(&mut self, board: NewBoard) -> Result<Arc<BoardSnapshot>, StoreError> {
        if self.boards.contains_key(&board.id) {
            return Err(StoreError::DuplicateId(board.id));
        }
        let mut snap = BoardSnapshot::empty(
            board.id,
            board.title,
            board.description,
            board.background_color,
            Utc::now(),
        );
        snap.version = self.next_version();
        let board_id = snap.id.clone();
        let version = snap.version;
        let snap = Arc::new(snap);

        self.boards.insert(board_id.clone(), Arc::clone(&snap));
        self.board_order.push(board_id.clone());
        if self.current_board_id.is_none() {
            self.current_board_id = Some(board_id.clone());
        }
        log::debug!("[tasknest.store.add_board] Added board {}", board_id);
        self.notify(BoardChangeEvent::BoardAdded { board_id, version });
        Ok(snap)
    }

    pub fn update_board(
        &mut self,
        board_id: &str,
        update: BoardUpdate,
    ) -> Result<Arc<BoardSnapshot>, StoreError> {
        let current = self.snapshot(board_id)?;
        let mut next = BoardSnapshot::clone(&current);
        if let Some(title) = update.title {
            next.title = title;
        }
        if let Some(description) = update.description {
            next.description = description;
        }
        if let Some(color) = update.background_color {
            next.background_color = color;
        }
        next.updated_at = Utc::now();
        Ok(self.commit(next))
    }

    /// Remove a board and everything in it.
    pub fn delete_board(&mut self, board_id: &str) -> Result<(), StoreError> {
        if self.boards.remove(board_id).is_none() {
            return Err(StoreError::BoardNotFound(board_id.to_string()));
        }
        self.board_order.retain(|id| id != board_id);
        if self.current_board_id.as_deref() == Some(board_id) {
            self.current_board_id = None;
        }
        log::debug!("[tasknest.store.delete_board] Deleted board {}", board_id);
        self.notify(BoardChangeEvent::BoardDeleted {
            board_id: board_id.to_string(),
        });
        Ok(())
    }

    /// Put an earlier snapshot of an existing board back in place.
    /// The restored snapshot gets a fresh version.
    pub fn restore_board(
        &mut self,
        snapshot: &Arc<BoardSnapshot>,
    ) -> Result<Arc<BoardSnapshot>, StoreError> {
        let current = self.snapshot(&snapshot.id)?;
        if Arc::ptr_eq(&current, snapshot) {
            return Ok(current);
        }
        log::debug!(
            "[tasknest.store.restore_board] Restoring board {} to version {}",
            snapshot.id,
            snapshot.version
        );
        Ok(self.commit(BoardSnapshot::clone(snapshot)))
    }

    // ── Columns ──────────────────────────────────────────────────────────────

    /// Append a column at the end of the board.
    pub fn add_column(
        &mut self,
        board_id: &str,
        column: NewColumn,
    ) -> Result<Arc<BoardSnapshot>, StoreError> {
        let current = self.snapshot(board_id)?;
        if current.columns.contains_key(&column.id) {
            return Err(StoreError::DuplicateId(column.id));
        }
        let now = Utc::now();
        let mut next = BoardSnapshot::clone(&current);
        let column = Column {
            order: next.columns.len(),
            id: column.id,
            title: column.title,
            board_id: board_id.to_string(),
            created_at: now,
            updated_at: now,
        };
        log::debug!(
            "[tasknest.store.add_column] Added column {} at {} on board {}",
            column.id,
            column.order,
            board_id
        );
        next.columns.insert(column.id.clone(), Arc::new(column));
        next.updated_at = now;
        Ok(self.commit(next))
    }

    pub fn update_column(
        &mut self,
        board_id: &str,
        column_id: &str,
        update: ColumnUpdate,
    ) -> Result<Arc<BoardSnapshot>, StoreError> {
        if update.order.is_some() {
            return Err(StoreError::InvalidArgument(
                "column order changes only through reorder_columns".to_string(),
            ));
        }
        if update.board_id.is_some() {
            return Err(StoreError::InvalidArgument(
                "a column cannot change boards".to_string(),
            ));
        }
        let current = self.snapshot(board_id)?;
        if !current.columns.contains_key(column_id) {
            return Err(StoreError::ColumnNotFound(column_id.to_string()));
        }
        let now = Utc::now();
        let mut next = BoardSnapshot::clone(&current);
        if let Some(col) = next.columns.get_mut(column_id) {
            let col = Arc::make_mut(col);
            if let Some(title) = update.title {
                col.title = title;
            }
            col.updated_at = now;
        }
        next.updated_at = now;
        Ok(self.commit(next))
    }

    /// Remove a column with all of its tasks and their comments, then close
    /// the gap in column order.
    pub fn delete_column(
        &mut self,
        board_id: &str,
        column_id: &str,
    ) -> Result<Arc<BoardSnapshot>, StoreError> {
        let current = self.snapshot(board_id)?;
        if !current.columns.contains_key(column_id) {
            return Err(StoreError::ColumnNotFound(column_id.to_string()));
        }
        let now = Utc::now();
        let mut next = BoardSnapshot::clone(&current);
        next.columns.remove(column_id);

        let doomed: HashSet<String> = next
            .tasks
            .values()
            .filter(|t| t.column_id == column_id)
            .map(|t| t.id.clone())
            .collect();
        next.tasks.retain(|id, _| !doomed.contains(id));
        next.comments.retain(|_, c| !doomed.contains(&c.task_id));

        let mut remaining = next.columns();
        reorder::renumber(&mut remaining);
        next.write_columns(remaining, now);
        next.updated_at = now;

        log::debug!(
            "[tasknest.store.delete_column] Deleted column {} and {} tasks from board {}",
            column_id,
            doomed.len(),
            board_id
        );
        Ok(self.commit(next))
    }

    /// Apply a full permutation of the board's column ids.
    ///
    /// The list must name every column exactly once; anything else is
    /// rejected without touching the board.
    pub fn reorder_columns<S: AsRef<str>>(
        &mut self,
        board_id: &str,
        column_ids: &[S],
    ) -> Result<Arc<BoardSnapshot>, StoreError> {
        let current = self.snapshot(board_id)?;

        let mut seen = HashSet::with_capacity(column_ids.len());
        let mut ordered = Vec::with_capacity(column_ids.len());
        for id in column_ids {
            let id = id.as_ref();
            if !seen.insert(id) {
                return Err(StoreError::InvalidArgument(format!(
                    "duplicate column id {} in permutation",
                    id
                )));
            }
            let col = current.columns.get(id).ok_or_else(|| {
                StoreError::InvalidArgument(format!("unknown column id {} in permutation", id))
            })?;
            ordered.push(Column::clone(col));
        }
        if ordered.len() != current.columns.len() {
            return Err(StoreError::InvalidArgument(format!(
                "permutation names {} of {} columns",
                ordered.len(),
                current.columns.len()
            )));
        }

        reorder::renumber(&mut ordered);
        let now = Utc::now();
        let mut next = BoardSnapshot::clone(&current);
        let changed = next.write_columns(ordered, now);
        if changed.is_empty() {
            return Ok(current);
        }
        next.updated_at = now;
        log::debug!(
            "[tasknest.store.reorder_columns] Reordered {} columns on board {}",
            changed.len(),
            board_id
        );
        Ok(self.commit(next))
    }

    /// Move one column to `requested_index` (clamped) and apply the result
    /// through `reorder_columns`.
    pub fn move_column(
        &mut self,
        board_id: &str,
        column_id: &str,
        requested_index: i64,
    ) -> Result<Arc<BoardSnapshot>, StoreError> {
        let current = self.snapshot(board_id)?;
        let moved = reorder::move_within(&current.columns(), column_id, requested_index)
            .ok_or_else(|| StoreError::ColumnNotFound(column_id.to_string()))?;
        let ids: Vec<&str> = moved.iter().map(|c| c.id.as_str()).collect();
        self.reorder_columns(board_id, &ids[..])
    }

    // ── Tasks ────────────────────────────────────────────────────────────────

    /// Append a task at the end of its column.
    pub fn add_task(
        &mut self,
        board_id: &str,
        task: NewTask,
    ) -> Result<Arc<BoardSnapshot>, StoreError> {
        let current = self.snapshot(board_id)?;
        if !current.columns.contains_key(&task.column_id) {
            return Err(StoreError::ColumnNotFound(task.column_id));
        }
        Self::ensure_unique_task(&current, &task.id)?;

        let now = Utc::now();
        let order = current
            .tasks
            .values()
            .filter(|t| t.column_id == task.column_id)
            .count();
        let mut next = BoardSnapshot::clone(&current);
        let task = Task {
            id: task.id,
            title: task.title,
            description: task.description,
            column_id: task.column_id,
            order,
            tags: task.tags,
            assignee: task.assignee,
            priority: task.priority,
            due_date: task.due_date,
            comments: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        let task_id = task.id.clone();
        log::debug!(
            "[tasknest.store.add_task] Added task {} to column {} at {}",
            task.id,
            task.column_id,
            order
        );
        next.tasks.insert(task_id.clone(), Arc::new(task));
        next.touch_task(&task_id, now);
        Ok(self.commit(next))
    }

    pub fn update_task(
        &mut self,
        board_id: &str,
        task_id: &str,
        update: TaskUpdate,
    ) -> Result<Arc<BoardSnapshot>, StoreError> {
        if update.order.is_some() {
            return Err(StoreError::InvalidArgument(
                "task order changes only through move_task".to_string(),
            ));
        }
        if update.column_id.is_some() {
            return Err(StoreError::InvalidArgument(
                "task column changes only through move_task".to_string(),
            ));
        }
        let current = self.snapshot(board_id)?;
        if !current.tasks.contains_key(task_id) {
            return Err(StoreError::TaskNotFound(task_id.to_string()));
        }
        let now = Utc::now();
        let mut next = BoardSnapshot::clone(&current);
        if let Some(task) = next.tasks.get_mut(task_id) {
            let task = Arc::make_mut(task);
            if let Some(title) = update.title {
                task.title = title;
            }
            if let Some(description) = update.description {
                task.description = description;
            }
            if let Some(tags) = update.tags {
                task.tags = tags;
            }
            if let Some(assignee) = update.assignee {
                task.assignee = assignee;
            }
            if let Some(priority) = update.priority {
                task.priority = priority;
            }
            if let Some(due_date) = update.due_date {
                task.due_date = due_date;
            }
        }
        next.touch_task(task_id, now);
        Ok(self.commit(next))
    }

    /// Remove a task and its comments, closing the gap in its column.
    pub fn delete_task(
        &mut self,
        board_id: &str,
        task_id: &str,
    ) -> Result<Arc<BoardSnapshot>, StoreError> {
        let current = self.snapshot(board_id)?;
        let column_id = current
            .tasks
            .get(task_id)
            .map(|t| t.column_id.clone())
            .ok_or_else(|| StoreError::TaskNotFound(task_id.to_string()))?;

        let now = Utc::now();
        let mut next = BoardSnapshot::clone(&current);
        next.tasks.remove(task_id);
        next.comments.retain(|_, c| c.task_id != task_id);

        let mut siblings = next.tasks_in(&column_id);
        reorder::renumber(&mut siblings);
        next.write_tasks(siblings, now);
        next.touch_column(&column_id, now);
        next.updated_at = now;

        log::debug!(
            "[tasknest.store.delete_task] Deleted task {} from column {}",
            task_id,
            column_id
        );
        Ok(self.commit(next))
    }

    /// Move a task within its column or into another column.
    ///
    /// `from_column_id` is what the caller believes the task's column to be.
    /// If it is stale the move is computed against the task's stored column
    /// instead. A move that lands the task where it already is returns the
    /// current snapshot untouched.
    pub fn move_task(
        &mut self,
        board_id: &str,
        task_id: &str,
        from_column_id: &str,
        to_column_id: &str,
        requested_index: i64,
    ) -> Result<Arc<BoardSnapshot>, StoreError> {
        let current = self.snapshot(board_id)?;
        let task = current
            .tasks
            .get(task_id)
            .ok_or_else(|| StoreError::TaskNotFound(task_id.to_string()))?;
        for col in [from_column_id, to_column_id] {
            if !current.columns.contains_key(col) {
                return Err(StoreError::ColumnNotFound(col.to_string()));
            }
        }

        let from = if task.column_id != from_column_id {
            log::warn!(
                "[tasknest.store.move_task] Task {} is in column {}, not {}; using stored column",
                task_id,
                task.column_id,
                from_column_id
            );
            task.column_id.as_str()
        } else {
            from_column_id
        };

        let now = Utc::now();
        let mut next = BoardSnapshot::clone(&current);
        let missing = || StoreError::TaskNotFound(task_id.to_string());
        let changed = if from == to_column_id {
            let moved = reorder::move_within(&current.tasks_in(from), task_id, requested_index)
                .ok_or_else(missing)?;
            next.write_tasks(moved, now)
        } else {
            let (source, destination) = reorder::move_across(
                &current.tasks_in(from),
                &current.tasks_in(to_column_id),
                task_id,
                to_column_id,
                requested_index,
            )
            .ok_or_else(missing)?;
            let mut changed = next.write_tasks(source, now);
            changed.extend(next.write_tasks(destination, now));
            changed
        };

        if changed.is_empty() {
            return Ok(current);
        }
        next.touch_column(from, now);
        next.touch_column(to_column_id, now);
        next.updated_at = now;

        log::debug!(
            "[tasknest.store.move_task] Moved task {} from {} to {} at {} ({} tasks renumbered)",
            task_id,
            from,
            to_column_id,
            requested_index,
            changed.len()
        );
        Ok(self.commit(next))
    }

    // ── Comments ─────────────────────────────────────────────────────────────

    /// Append a comment to a task.
    pub fn add_comment(
        &mut self,
        board_id: &str,
        task_id: &str,
        comment: NewComment,
    ) -> Result<Arc<BoardSnapshot>, StoreError> {
        let current = self.snapshot(board_id)?;
        if !current.tasks.contains_key(task_id) {
            return Err(StoreError::TaskNotFound(task_id.to_string()));
        }
        if current.comments.contains_key(&comment.id) {
            return Err(StoreError::DuplicateId(comment.id));
        }
        let now = Utc::now();
        let order = current
            .comments
            .values()
            .filter(|c| c.task_id == task_id)
            .count();
        let mut next = BoardSnapshot::clone(&current);
        let comment = Comment {
            id: comment.id,
            task_id: task_id.to_string(),
            content: comment.content,
            author: comment.author,
            order,
            created_at: now,
            updated_at: now,
        };
        next.comments.insert(comment.id.clone(), Arc::new(comment));
        next.touch_task(task_id, now);
        Ok(self.commit(next))
    }

    pub fn update_comment(
        &mut self,
        board_id: &str,
        task_id: &str,
        comment_id: &str,
        update: CommentUpdate,
    ) -> Result<Arc<BoardSnapshot>, StoreError> {
        if update.order.is_some() || update.task_id.is_some() {
            return Err(StoreError::InvalidArgument(
                "comment order and task cannot be set through update".to_string(),
            ));
        }
        let current = self.snapshot(board_id)?;
        Self::find_comment(&current, task_id, comment_id)?;

        let now = Utc::now();
        let mut next = BoardSnapshot::clone(&current);
        if let Some(comment) = next.comments.get_mut(comment_id) {
            let comment = Arc::make_mut(comment);
            if let Some(content) = update.content {
                comment.content = content;
            }
            if let Some(author) = update.author {
                comment.author = author;
            }
            comment.updated_at = now;
        }
        next.touch_task(task_id, now);
        Ok(self.commit(next))
    }

    pub fn delete_comment(
        &mut self,
        board_id: &str,
        task_id: &str,
        comment_id: &str,
    ) -> Result<Arc<BoardSnapshot>, StoreError> {
        let current = self.snapshot(board_id)?;
        Self::find_comment(&current, task_id, comment_id)?;

        let now = Utc::now();
        let mut next = BoardSnapshot::clone(&current);
        next.comments.remove(comment_id);
        let mut siblings = next.comments_of(task_id);
        reorder::renumber(&mut siblings);
        next.write_comments(siblings, now);
        next.touch_task(task_id, now);
        Ok(self.commit(next))
    }
}
