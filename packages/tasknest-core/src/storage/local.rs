/// Local filesystem storage backend.
///
/// Keeps the whole workspace in one JSON file with:
/// - Atomic writes (write to .tmp, fsync, rename, fsync directory)
/// - SHA-256 change detection so unchanged saves skip the disk
/// - Lenient date handling and order repair on load
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use sha2::{Digest, Sha256};

use super::{BoardRepository, StorageError};
use crate::types::WorkspaceSnapshot;

pub struct LocalStorage {
    path: PathBuf,
    /// SHA-256 of the last content read from or written to `path`.
    last_hash: Mutex<Option<String>>,
}

impl LocalStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            last_hash: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Compute SHA-256 hash of content (for change detection).
    fn content_hash(content: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(content.replace("\r\n", "\n").as_bytes());
        hex::encode(hasher.finalize())
    }

    fn remember(&self, hash: String) {
        let mut last = self.last_hash.lock().unwrap_or_else(|e| e.into_inner());
        *last = Some(hash);
    }

    fn is_current(&self, hash: &str) -> bool {
        let last = self.last_hash.lock().unwrap_or_else(|e| e.into_inner());
        last.as_deref() == Some(hash)
    }

    /// Atomic write with fsync: write to .tmp, fsync, rename, fsync directory.
    fn atomic_write(path: &Path, content: &str) -> Result<(), std::io::Error> {
        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() {
                fs::create_dir_all(dir)?;
            }
        }

        let tmp_path = path.with_extension("tasknest.tmp");
        let mut file = fs::File::create(&tmp_path)?;
        file.write_all(content.as_bytes())?;
        file.sync_all()?;
        fs::rename(&tmp_path, path)?;

        // fsync directory for rename durability
        if let Some(dir) = path.parent() {
            if let Ok(d) = fs::File::open(dir) {
                let _ = d.sync_all();
            }
        }
        Ok(())
    }
}

impl BoardRepository for LocalStorage {
    fn load(&self) -> Result<Option<WorkspaceSnapshot>, StorageError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::info!(
                    "[tasknest.storage.load] No data file at {}, starting empty",
                    self.path.display()
                );
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };
        if content.trim().is_empty() {
            return Ok(None);
        }

        let value: serde_json::Value = serde_json::from_str(&content)?;
        if !value.is_object() {
            return Err(StorageError::InvalidSnapshot(format!(
                "{}: expected a JSON object at the top level",
                self.path.display()
            )));
        }
        let snapshot: WorkspaceSnapshot = serde_json::from_value(value)?;
        // Hash what `save` would write, so a file that only differs in
        // formatting is not rewritten on the next save.
        let canonical = serde_json::to_string_pretty(&snapshot)?;
        self.remember(Self::content_hash(&canonical));

        log::info!(
            "[tasknest.storage.load] Read {} boards from {}",
            snapshot.boards.len(),
            self.path.display()
        );
        Ok(Some(snapshot))
    }

    fn save(&self, snapshot: &WorkspaceSnapshot) -> Result<bool, StorageError> {
        let content = serde_json::to_string_pretty(snapshot)?;
        let hash = Self::content_hash(&content);
        if self.is_current(&hash) {
            log::debug!(
                "[tasknest.storage.save] Unchanged, skipping write to {}",
                self.path.display()
            );
            return Ok(false);
        }

        Self::atomic_write(&self.path, &content)?;
        self.remember(hash);
        log::info!(
            "[tasknest.storage.save] Wrote {} boards to {}",
            snapshot.boards.len(),
            self.path.display()
        );
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::load_store;
    use crate::store::BoardStore;
    use crate::types::{NewBoard, NewColumn, NewTask};
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    fn sample_store() -> BoardStore {
        let mut store = BoardStore::new();
        store.add_board(NewBoard::new("b1", "Board")).unwrap();
        store.add_column("b1", NewColumn::new("todo", "Todo")).unwrap();
        store.add_column("b1", NewColumn::new("done", "Done")).unwrap();
        store.add_task("b1", NewTask::new("t1", "First", "todo")).unwrap();
        store.add_task("b1", NewTask::new("t2", "Second", "todo")).unwrap();
        store
    }

    #[test]
    fn test_load_missing_file_is_none() {
        let dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(dir.path().join("boards.json"));
        assert!(storage.load().unwrap().is_none());
    }

    #[test]
    fn test_save_and_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("boards.json");
        let storage = LocalStorage::new(&path);
        let store = sample_store();

        assert!(storage.save(&store.to_snapshot()).unwrap());
        assert!(path.exists());
        assert!(!path.with_extension("tasknest.tmp").exists());

        let fresh = LocalStorage::new(&path);
        let loaded = load_store(&fresh, 8).unwrap();
        assert_eq!(loaded.to_snapshot(), store.to_snapshot());
        assert_eq!(loaded.current_board_id(), Some("b1"));
    }

    #[test]
    fn test_unchanged_save_is_skipped() {
        let dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(dir.path().join("boards.json"));
        let mut store = sample_store();

        assert!(storage.save(&store.to_snapshot()).unwrap());
        assert!(!storage.save(&store.to_snapshot()).unwrap());

        store.move_task("b1", "t2", "todo", "done", 0).unwrap();
        assert!(storage.save(&store.to_snapshot()).unwrap());
    }

    #[test]
    fn test_load_repairs_damaged_file() {
        let started = Utc::now();
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("boards.json");
        let json = r#"{
            "boards": [{
                "id": "b1",
                "title": "Imported",
                "createdAt": "Invalid Date",
                "updatedAt": 1767225600000,
                "columns": [
                    {"id": "c1", "title": "One", "order": 3, "boardId": "b1",
                     "createdAt": "2026-01-05T08:00:00Z", "updatedAt": "garbage"},
                    {"id": "c2", "title": "Two", "order": 3, "boardId": "b1",
                     "createdAt": {"bad": true}}
                ],
                "tasks": [
                    {"id": "t1", "title": "A", "columnId": "c1", "order": 5,
                     "dueDate": "someday", "createdAt": "2026-02-01", "updatedAt": "",
                     "comments": [
                        {"id": "m1", "taskId": "t1", "content": "hi", "author": "ann",
                         "createdAt": "not a date", "updatedAt": null}
                     ]},
                    {"id": "t2", "title": "B", "columnId": "c1", "order": 9},
                    {"id": "t3", "title": "Orphan", "columnId": "gone", "order": 0}
                ]
            }],
            "currentBoardId": "b1"
        }"#;
        fs::write(&path, json).unwrap();

        let store = load_store(&LocalStorage::new(&path), 8).unwrap();
        let board = store.board("b1").unwrap();
        board.assert_invariants();
        assert_eq!(board.task_count(), 2);
        assert!(board.task("t3").is_none());
        assert!(board.task("t1").unwrap().due_date.is_none());
        assert_eq!(board.task("t2").unwrap().order, 1);

        // Unparseable required timestamps become the load time at every level.
        assert!(board.created_at() >= started);
        assert!(board.column("c1").unwrap().updated_at >= started);
        assert!(board.column("c2").unwrap().created_at >= started);
        let t1 = board.task("t1").unwrap();
        assert!(t1.updated_at >= started);
        let m1 = board.comment("m1").unwrap();
        assert!(m1.created_at >= started);
        assert!(m1.updated_at >= started);

        // Valid ones survive as written.
        let jan_first = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(board.updated_at(), jan_first);
        assert_eq!(
            board.column("c1").unwrap().created_at,
            Utc.with_ymd_and_hms(2026, 1, 5, 8, 0, 0).unwrap()
        );
        assert_eq!(t1.created_at, Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_reformatted_file_is_not_rewritten() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("boards.json");
        let snapshot = sample_store().to_snapshot();
        fs::write(&path, serde_json::to_string(&snapshot).unwrap()).unwrap();

        let storage = LocalStorage::new(&path);
        let loaded = storage.load().unwrap().unwrap();
        assert!(!storage.save(&loaded).unwrap());
    }

    #[test]
    fn test_load_rejects_non_object() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("boards.json");
        fs::write(&path, "[1, 2, 3]").unwrap();
        let err = LocalStorage::new(&path).load().unwrap_err();
        assert!(matches!(err, StorageError::InvalidSnapshot(_)));

        fs::write(&path, "{ not json").unwrap();
        let err = LocalStorage::new(&path).load().unwrap_err();
        assert!(matches!(err, StorageError::Serialization(_)));
    }

    #[test]
    fn test_content_hash_ignores_line_endings() {
        assert_eq!(
            LocalStorage::content_hash("a\r\nb"),
            LocalStorage::content_hash("a\nb")
        );
    }
}
