use std::sync::Arc;

use proptest::prelude::*;
use tasknest_core::reorder::is_dense;
use tasknest_core::types::{NewBoard, NewColumn, NewComment, NewTask};
use tasknest_core::{
    BoardChangeEvent, BoardRepository, BoardSnapshot, BoardStore, DragCoordinator, DragStart,
    DragTarget, DropPolicy, LocalStorage, StoreError,
};

/// Board "b" with the given columns; tasks are listed space-separated.
fn board_with(columns: &[(&str, &str)]) -> BoardStore {
    let mut store = BoardStore::new();
    store.add_board(NewBoard::new("b", "Board")).unwrap();
    for &(col, tasks) in columns {
        store.add_column("b", NewColumn::new(col, col)).unwrap();
        for task in tasks.split_whitespace() {
            store.add_task("b", NewTask::new(task, task, col)).unwrap();
        }
    }
    store
}

fn tasks_of(snap: &BoardSnapshot, column_id: &str) -> Vec<(String, usize)> {
    snap.tasks_in(column_id)
        .into_iter()
        .map(|t| (t.id, t.order))
        .collect()
}

fn pairs(items: &[(&str, usize)]) -> Vec<(String, usize)> {
    items.iter().map(|(id, o)| (id.to_string(), *o)).collect()
}

fn assert_dense(snap: &BoardSnapshot) {
    let columns = snap.columns();
    assert!(is_dense(&columns));
    for col in &columns {
        let tasks = snap.tasks_in(&col.id);
        assert!(is_dense(&tasks), "column {} not dense", col.id);
        for task in &tasks {
            assert!(is_dense(&snap.comments_of(&task.id)));
        }
    }
}

#[test]
fn test_cross_column_move_scenario() {
    let mut store = board_with(&[("A", "x y"), ("B", "z")]);
    let snap = store.move_task("b", "x", "A", "B", 1).unwrap();
    assert_eq!(tasks_of(&snap, "A"), pairs(&[("y", 0)]));
    assert_eq!(tasks_of(&snap, "B"), pairs(&[("z", 0), ("x", 1)]));
    assert_eq!(snap.task("x").unwrap().column_id, "B");
    assert_eq!(snap.task_count(), 3);
}

#[test]
fn test_same_column_move_scenario() {
    let mut store = board_with(&[("A", "p q r")]);
    let snap = store.move_task("b", "r", "A", "A", 0).unwrap();
    assert_eq!(tasks_of(&snap, "A"), pairs(&[("r", 0), ("p", 1), ("q", 2)]));
}

#[test]
fn test_delete_column_scenario() {
    let mut store = board_with(&[("A", ""), ("B", "z"), ("C", "")]);
    store
        .add_comment("b", "z", NewComment::new("m", "note", "me"))
        .unwrap();
    let snap = store.delete_column("b", "B").unwrap();
    let cols: Vec<(String, usize)> = snap.columns().into_iter().map(|c| (c.id, c.order)).collect();
    assert_eq!(cols, pairs(&[("A", 0), ("C", 1)]));
    assert!(snap.tasks_in("B").is_empty());
    assert!(snap.task("z").is_none());
    assert!(snap.comment("m").is_none());
    assert_eq!(snap.to_board().tasks.len(), 0);
}

#[test]
fn test_self_target_move_is_identity() {
    let mut store = board_with(&[("A", "p q r"), ("B", "s")]);
    let before = store.board("b").unwrap();
    let idx = before.index_of_task("q").unwrap() as i64;
    let after = store.move_task("b", "q", "A", "A", idx).unwrap();
    assert!(Arc::ptr_eq(&before, &after));
    assert_eq!(before.to_board(), after.to_board());
}

#[test]
fn test_permutation_rejection() {
    let mut store = board_with(&[("A", ""), ("B", ""), ("C", "")]);
    let before = store.board("b").unwrap();
    for bad in [
        vec!["A", "B"],
        vec!["A", "A", "B", "C"],
        vec!["A", "B", "C", "D"],
    ] {
        match store.reorder_columns("b", &bad[..]) {
            Err(StoreError::InvalidArgument(_)) => {}
            other => panic!("expected InvalidArgument for {:?}, got {:?}", bad, other),
        }
    }
    assert!(Arc::ptr_eq(&before, &store.board("b").unwrap()));
}

#[test]
fn test_drag_gesture_end_to_end() {
    let mut store = board_with(&[("A", "x y"), ("B", "z")]);
    let mut events = store.subscribe();
    let mut drag = DragCoordinator::new("b", DropPolicy::KeepLastMove);

    drag.drag_start(&store, DragStart::task("x")).unwrap();
    drag.drag_over(&mut store, &DragTarget::column("B")).unwrap();
    drag.drag_over(&mut store, &DragTarget::task("z")).unwrap();
    drag.drag_end(&mut store, Some(&DragTarget::task("z"))).unwrap();

    let snap = store.board("b").unwrap();
    assert_eq!(tasks_of(&snap, "B"), pairs(&[("x", 0), ("z", 1)]));
    assert_dense(&snap);

    let mut updates = 0;
    while let Ok(event) = events.try_recv() {
        assert!(matches!(event, BoardChangeEvent::BoardUpdated { .. }));
        updates += 1;
    }
    assert_eq!(updates, 2);
}

#[test]
fn test_persist_and_resume() {
    let dir = tempfile::TempDir::new().unwrap();
    let repo = LocalStorage::new(dir.path().join("boards.json"));
    let mut store = board_with(&[("A", "x y"), ("B", "")]);
    store.move_task("b", "y", "A", "B", 0).unwrap();
    repo.save(&store.to_snapshot()).unwrap();

    let reloaded = BoardStore::from_snapshot(repo.load().unwrap().unwrap(), 16);
    let snap = reloaded.board("b").unwrap();
    assert_eq!(tasks_of(&snap, "B"), pairs(&[("y", 0)]));
    assert_eq!(reloaded.to_snapshot(), store.to_snapshot());
}

#[derive(Debug, Clone)]
enum Op {
    Move { task: usize, to: usize, index: i64 },
    Add { column: usize },
    DeleteTask { task: usize },
    MoveColumn { column: usize, index: i64 },
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (0usize..16, 0usize..4, -2i64..10).prop_map(|(task, to, index)| Op::Move { task, to, index }),
        2 => (0usize..4).prop_map(|column| Op::Add { column }),
        1 => (0usize..16).prop_map(|task| Op::DeleteTask { task }),
        1 => (0usize..4, -1i64..5).prop_map(|(column, index)| Op::MoveColumn { column, index }),
    ]
}

proptest! {
    #[test]
    fn prop_random_operations_keep_board_dense(ops in prop::collection::vec(op(), 1..40)) {
        let cols = ["A", "B", "C", "D"];
        let mut store = board_with(&[("A", "t0 t1"), ("B", "t2"), ("C", ""), ("D", "t3")]);
        let mut next_id = 4;

        for op in ops {
            let snap = store.board("b").unwrap();
            let all: Vec<_> = snap.to_board().tasks;
            match op {
                Op::Move { task, to, index } if !all.is_empty() => {
                    let t = &all[task % all.len()];
                    let before = snap.task_count();
                    let after = store.move_task("b", &t.id, &t.column_id, cols[to], index).unwrap();
                    prop_assert_eq!(after.task_count(), before);
                    prop_assert_eq!(after.task(&t.id).unwrap().column_id, cols[to]);
                }
                Op::Add { column } => {
                    let id = format!("t{next_id}");
                    next_id += 1;
                    store.add_task("b", NewTask::new(id, "new", cols[column])).unwrap();
                }
                Op::DeleteTask { task } if !all.is_empty() => {
                    store.delete_task("b", &all[task % all.len()].id).unwrap();
                }
                Op::MoveColumn { column, index } => {
                    store.move_column("b", cols[column], index).unwrap();
                }
                _ => {}
            }
            assert_dense(&store.board("b").unwrap());
        }
    }
}
