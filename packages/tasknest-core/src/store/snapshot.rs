/// Arena-style board snapshot.
///
/// Columns, tasks and comments live in flat maps keyed by id, each entry
/// behind an `Arc`. Cloning a snapshot copies the maps shallowly, so the store
/// can build the next snapshot and swap it in while readers keep the old one.
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::reorder::{self, OrderedItem};
use crate::types::{Board, Column, Comment, Task};

#[derive(Debug, Clone, PartialEq)]
pub struct BoardSnapshot {
    pub(crate) id: String,
    pub(crate) title: String,
    pub(crate) description: Option<String>,
    pub(crate) background_color: Option<String>,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) updated_at: DateTime<Utc>,
    pub(crate) version: u64,
    pub(crate) columns: HashMap<String, Arc<Column>>,
    /// Tasks here always carry an empty `comments` vec.
    pub(crate) tasks: HashMap<String, Arc<Task>>,
    pub(crate) comments: HashMap<String, Arc<Comment>>,
}

impl BoardSnapshot {
    pub(crate) fn empty(
        id: String,
        title: String,
        description: Option<String>,
        background_color: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            title,
            description,
            background_color,
            created_at: now,
            updated_at: now,
            version: 0,
            columns: HashMap::new(),
            tasks: HashMap::new(),
            comments: HashMap::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn background_color(&self) -> Option<&str> {
        self.background_color.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Store-wide monotonic version, bumped on every committed mutation.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn column(&self, column_id: &str) -> Option<&Column> {
        self.columns.get(column_id).map(Arc::as_ref)
    }

    /// A task with its comments attached in order.
    pub fn task(&self, task_id: &str) -> Option<Task> {
        let task = self.tasks.get(task_id)?;
        let mut full = Task::clone(task);
        full.comments = self.comments_of(task_id);
        Some(full)
    }

    pub fn comment(&self, comment_id: &str) -> Option<&Comment> {
        self.comments.get(comment_id).map(Arc::as_ref)
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    /// Columns sorted by `order`.
    pub fn columns(&self) -> Vec<Column> {
        let mut cols: Vec<Column> = self.columns.values().map(|c| Column::clone(c)).collect();
        cols.sort_by(|a, b| a.order.cmp(&b.order).then_with(|| a.id.cmp(&b.id)));
        cols
    }

    /// Tasks of one column sorted by `order`, without comments.
    pub fn tasks_in(&self, column_id: &str) -> Vec<Task> {
        let mut tasks: Vec<Task> = self
            .tasks
            .values()
            .filter(|t| t.column_id == column_id)
            .map(|t| Task::clone(t))
            .collect();
        tasks.sort_by(|a, b| a.order.cmp(&b.order).then_with(|| a.id.cmp(&b.id)));
        tasks
    }

    /// Comments of one task sorted by `order`.
    pub fn comments_of(&self, task_id: &str) -> Vec<Comment> {
        let mut comments: Vec<Comment> = self
            .comments
            .values()
            .filter(|c| c.task_id == task_id)
            .map(|c| Comment::clone(c))
            .collect();
        comments.sort_by(|a, b| a.order.cmp(&b.order).then_with(|| a.id.cmp(&b.id)));
        comments
    }

    /// Current position of a task inside its column.
    pub fn index_of_task(&self, task_id: &str) -> Option<usize> {
        self.tasks.get(task_id).map(|t| t.order)
    }

    /// Materialize the plain tree: columns by order, tasks grouped by column
    /// order then task order, comments nested.
    pub fn to_board(&self) -> Board {
        let columns = self.columns();
        let tasks = columns
            .iter()
            .flat_map(|col| self.tasks_in(&col.id))
            .map(|mut task| {
                task.comments = self.comments_of(&task.id);
                task
            })
            .collect();
        Board {
            id: self.id.clone(),
            title: self.title.clone(),
            description: self.description.clone(),
            background_color: self.background_color.clone(),
            columns,
            tasks,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    /// Build an arena from a plain tree, repairing anything that would break
    /// the ordering invariants. Returns the snapshot and the number of repairs.
    ///
    /// Repairs: column/comment back-references are pointed at their actual
    /// parent, tasks naming a missing column are dropped, duplicate ids keep
    /// their first occurrence, and every container is re-densified.
    pub fn from_board(board: Board) -> (Self, usize) {
        let mut repairs = 0;
        let mut snap = Self::empty(
            board.id.clone(),
            board.title,
            board.description,
            board.background_color,
            board.created_at,
        );
        snap.updated_at = board.updated_at;

        let mut columns = Vec::with_capacity(board.columns.len());
        for mut col in board.columns {
            if columns.iter().any(|c: &Column| c.id == col.id) {
                log::warn!("[tasknest.store.load] Dropping duplicate column {}", col.id);
                repairs += 1;
                continue;
            }
            if col.board_id != board.id {
                col.board_id = board.id.clone();
                repairs += 1;
            }
            columns.push(col);
        }
        if reorder::repair(&mut columns) {
            repairs += 1;
        }
        for col in columns {
            snap.columns.insert(col.id.clone(), Arc::new(col));
        }

        let mut by_column: HashMap<String, Vec<Task>> = HashMap::new();
        let mut comments_by_task: HashMap<String, Vec<Comment>> = HashMap::new();
        let mut seen_tasks = HashSet::new();
        let mut seen_comments = HashSet::new();
        for mut task in board.tasks {
            if !snap.columns.contains_key(&task.column_id) {
                log::warn!(
                    "[tasknest.store.load] Dropping task {} of missing column {}",
                    task.id,
                    task.column_id
                );
                repairs += 1;
                continue;
            }
            if !seen_tasks.insert(task.id.clone()) {
                log::warn!("[tasknest.store.load] Dropping duplicate task {}", task.id);
                repairs += 1;
                continue;
            }
            let mut comments = std::mem::take(&mut task.comments);
            comments.retain(|c| {
                let fresh = seen_comments.insert(c.id.clone());
                if !fresh {
                    repairs += 1;
                }
                fresh
            });
            for comment in comments.iter_mut() {
                if comment.task_id != task.id {
                    comment.task_id = task.id.clone();
                    repairs += 1;
                }
            }
            if reorder::repair(&mut comments) {
                repairs += 1;
            }
            comments_by_task.insert(task.id.clone(), comments);
            by_column.entry(task.column_id.clone()).or_default().push(task);
        }
        for (_, mut tasks) in by_column {
            if reorder::repair(&mut tasks) {
                repairs += 1;
            }
            for task in tasks {
                snap.tasks.insert(task.id.clone(), Arc::new(task));
            }
        }
        for (_, comments) in comments_by_task {
            for comment in comments {
                snap.comments.insert(comment.id.clone(), Arc::new(comment));
            }
        }

        (snap, repairs)
    }

    /// Write back a sibling list produced by the reordering algorithm.
    /// Only entries whose position or parent changed are replaced (and
    /// stamped). Returns the ids that changed.
    pub(crate) fn write_tasks(&mut self, tasks: Vec<Task>, now: DateTime<Utc>) -> Vec<String> {
        write_back(&mut self.tasks, tasks, now, |t, now| t.updated_at = now)
    }

    pub(crate) fn write_columns(&mut self, columns: Vec<Column>, now: DateTime<Utc>) -> Vec<String> {
        write_back(&mut self.columns, columns, now, |c, now| c.updated_at = now)
    }

    pub(crate) fn write_comments(&mut self, comments: Vec<Comment>, now: DateTime<Utc>) -> Vec<String> {
        write_back(&mut self.comments, comments, now, |c, now| c.updated_at = now)
    }

    pub(crate) fn touch_column(&mut self, column_id: &str, now: DateTime<Utc>) {
        if let Some(col) = self.columns.get_mut(column_id) {
            Arc::make_mut(col).updated_at = now;
        }
    }

    /// Stamp a task and every ancestor up to the board.
    pub(crate) fn touch_task(&mut self, task_id: &str, now: DateTime<Utc>) {
        let column_id = match self.tasks.get_mut(task_id) {
            Some(task) => {
                let task = Arc::make_mut(task);
                task.updated_at = now;
                task.column_id.clone()
            }
            None => return,
        };
        self.touch_column(&column_id, now);
        self.updated_at = now;
    }

    /// Every container must be dense and every back-reference must resolve.
    #[cfg(test)]
    pub(crate) fn assert_invariants(&self) {
        let cols: Vec<Column> = self.columns();
        assert!(reorder::is_dense(&cols), "columns not dense: {:?}", cols);
        for col in &cols {
            assert_eq!(col.board_id, self.id);
            let tasks = self.tasks_in(&col.id);
            assert!(reorder::is_dense(&tasks), "tasks of {} not dense", col.id);
        }
        for task in self.tasks.values() {
            assert!(self.columns.contains_key(&task.column_id), "orphan task {}", task.id);
            assert!(task.comments.is_empty());
            let comments = self.comments_of(&task.id);
            assert!(reorder::is_dense(&comments), "comments of {} not dense", task.id);
        }
        for comment in self.comments.values() {
            assert!(self.tasks.contains_key(&comment.task_id), "orphan comment {}", comment.id);
        }
    }
}

fn write_back<T: OrderedItem>(
    map: &mut HashMap<String, Arc<T>>,
    items: Vec<T>,
    now: DateTime<Utc>,
    stamp: impl Fn(&mut T, DateTime<Utc>),
) -> Vec<String> {
    let mut changed = Vec::new();
    for mut item in items {
        let differs = map
            .get(item.id())
            .map_or(true, |old| old.order() != item.order() || old.parent_id() != item.parent_id());
        if differs {
            stamp(&mut item, now);
            changed.push(item.id().to_string());
            map.insert(item.id().to_string(), Arc::new(item));
        }
    }
    changed
}
