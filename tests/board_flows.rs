use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use serde_json::json;

use planboard::board::{Board, BoardOptions, MoveState, NoticeKind};
use planboard::error::Error;
use planboard::file_store::FileStore;
use planboard::group::GroupView;
use planboard::item::{Item, ItemDraft, StatusSet, TASKS_COLLECTION};
use planboard::remote::{MemoryStore, RemoteStore};
use planboard::reorder::MoveIntent;
use planboard::session::{SessionContext, StaticAuth};
use planboard::storage::Storage;
use planboard::sync::SyncAdapter;

fn ts(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).single().expect("timestamp")
}

fn session(user: &str) -> SessionContext {
    SessionContext::establish(&StaticAuth::signed_in(user)).expect("session")
}

fn row(id: &str, status: &str, order: u32) -> serde_json::Value {
    Item::from_draft(id, ItemDraft::new(id), "u", status, order, ts(0))
        .to_row()
        .expect("row")
}

async fn board(remote: Arc<dyn RemoteStore>, options: BoardOptions) -> Board {
    let mut board = Board::new(SyncAdapter::new(remote, StatusSet::default()), options);
    board.refresh(&session("u")).await.expect("refresh");
    board
}

fn memory(rows: Vec<serde_json::Value>) -> Arc<MemoryStore> {
    let remote = Arc::new(MemoryStore::new());
    remote.seed(TASKS_COLLECTION, rows);
    remote
}

fn assert_dense(view: &GroupView) {
    for group in &view.groups {
        let orders: Vec<u32> = group.items.iter().map(|item| item.group_order).collect();
        let expected: Vec<u32> = (0..orders.len() as u32).collect();
        assert_eq!(orders, expected, "column {} is not dense", group.status);
    }
}

#[tokio::test]
async fn cross_column_move_persists_every_changed_row() {
    let remote = memory(vec![row("1", "todo", 0), row("2", "todo", 1), row("3", "done", 0)]);
    let mut board = board(remote.clone(), BoardOptions::default()).await;

    let report = board
        .move_item(&session("u"), MoveIntent::new("1", "done", 0), ts(100))
        .await
        .expect("move");
    assert_eq!(report.state, MoveState::Confirmed);
    assert_eq!(report.updates, 3);
    assert_eq!(remote.write_count(), 3);

    let view = board.view();
    assert_eq!(view.ids("done"), vec!["1", "3"]);
    assert_eq!(view.ids("todo"), vec!["2"]);

    let stored = |id: &str| remote.row(TASKS_COLLECTION, id).expect("row");
    assert_eq!(stored("1")["status"], json!("done"));
    assert_eq!(stored("1")["order_index"], json!(0));
    assert_eq!(stored("3")["order_index"], json!(1));
    assert_eq!(stored("2")["order_index"], json!(0));
}

#[tokio::test]
async fn partial_failure_reverts_whole_move() {
    let remote = memory(vec![row("1", "todo", 0), row("2", "todo", 1), row("3", "done", 0)]);
    let mut board = board(remote.clone(), BoardOptions::default()).await;
    let before = board.store().snapshot();
    remote.fail_writes_for("2");

    let err = board
        .move_item(&session("u"), MoveIntent::new("1", "done", 0), ts(100))
        .await
        .expect_err("write refused");
    match &err {
        Error::RemoteFailure { failed, .. } => assert_eq!(failed, &vec!["2".to_string()]),
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(board.store().snapshot(), before);

    let notices = board.drain_notices();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].kind, NoticeKind::MoveRolledBack);

    // The store stays as the partial writes left it; a retry converges.
    remote.clear_failures();
    board
        .move_item(&session("u"), MoveIntent::new("1", "done", 0), ts(101))
        .await
        .expect("retry");
    board.refresh(&session("u")).await.expect("refresh");
    assert_eq!(board.view().ids("done"), vec!["1", "3"]);
    assert_eq!(board.view().ids("todo"), vec!["2"]);
}

#[tokio::test]
async fn refetch_after_move_picks_up_remote_changes() {
    let remote = memory(vec![row("1", "todo", 0)]);
    let mut board = board(
        remote.clone(),
        BoardOptions {
            refetch_after_move: true,
            ..Default::default()
        },
    )
    .await;

    // Another session adds a task behind our back.
    remote.seed(TASKS_COLLECTION, vec![row("2", "done", 0)]);
    board
        .move_item(&session("u"), MoveIntent::new("1", "in-progress", 0), ts(5))
        .await
        .expect("move");
    assert!(board.store().contains("2"));
}

#[tokio::test]
async fn overlapping_moves_settle_out_of_order() {
    let remote = memory(vec![row("a", "todo", 0), row("b", "todo", 1), row("c", "todo", 2)]);
    let mut board = board(remote.clone(), BoardOptions::default()).await;
    let ctx = session("u");

    let first = board
        .begin_move(&ctx, MoveIntent::new("a", "done", 0), ts(10))
        .expect("first");
    let second = board
        .begin_move(&ctx, MoveIntent::new("a", "in-progress", 0), ts(11))
        .expect("second");
    assert_eq!(board.in_flight(), 2);

    // The newer move confirms first; the older one then fails.
    let second_outcome = SyncAdapter::new(remote.clone(), StatusSet::default())
        .persist(&ctx, second.patches(), ts(11))
        .await;
    board.finish_move(second, second_outcome).expect("second");
    let failure = Error::RemoteFailure {
        failed: vec!["a".to_string()],
        message: "timeout".to_string(),
    };
    assert!(board.finish_move(first, Err(failure)).is_err());

    assert_eq!(board.store().get("a").expect("a").status, "in-progress");
    // b and c revert to their old slots, then the column closes a's gap.
    assert_eq!(board.view().ids("todo"), vec!["b", "c"]);
    assert_eq!(board.store().get("b").expect("b").group_order, 0);
    assert_dense(&board.view());
    assert!(board.needs_refresh());
    assert_eq!(board.in_flight(), 0);
}

#[tokio::test]
async fn rollback_under_newer_move_keeps_columns_dense() {
    let remote = memory(vec![row("a", "todo", 0), row("b", "todo", 1), row("c", "todo", 2)]);
    let mut board = board(remote.clone(), BoardOptions::default()).await;
    let ctx = session("u");

    let first = board
        .begin_move(&ctx, MoveIntent::new("a", "done", 0), ts(10))
        .expect("first");
    let second = board
        .begin_move(&ctx, MoveIntent::new("c", "todo", 0), ts(11))
        .expect("second");

    let failure = Error::RemoteFailure {
        failed: vec!["a".to_string()],
        message: "timeout".to_string(),
    };
    assert!(board.finish_move(first, Err(failure)).is_err());
    assert_dense(&board.view());
    assert_eq!(board.view().ids("todo"), vec!["a", "c", "b"]);

    let outcome = SyncAdapter::new(remote.clone(), StatusSet::default())
        .persist(&ctx, second.patches(), ts(11))
        .await;
    board.finish_move(second, outcome).expect("second");
    assert_dense(&board.view());
    assert_eq!(board.pending_repairs(), vec!["done".to_string(), "todo".to_string()]);

    // The remote column still holds a and c both at 0.
    let stored = |id: &str| remote.row(TASKS_COLLECTION, id).expect("row")["order_index"].clone();
    assert_eq!(stored("a"), stored("c"));

    remote.fail_writes_for("b");
    assert!(board.flush_repairs(&ctx, ts(12)).await.is_err());
    let notices = board.drain_notices();
    assert_eq!(notices.last().expect("notice").kind, NoticeKind::RepairFailed);
    assert_eq!(notices.last().expect("notice").item_ids, vec!["b".to_string()]);
    assert_eq!(board.pending_repairs().len(), 2);

    remote.clear_failures();
    board.flush_repairs(&ctx, ts(13)).await.expect("repair");
    assert!(board.pending_repairs().is_empty());

    board.refresh(&ctx).await.expect("refresh");
    assert_dense(&board.view());
    assert_eq!(board.view().ids("todo"), vec!["a", "c", "b"]);
    assert!(!board.needs_refresh());
}

#[tokio::test]
async fn foreign_rows_never_reach_the_board() {
    let mut foreign = Item::from_draft("x", ItemDraft::new("x"), "mallory", "todo", 0, ts(0));
    foreign.title = "not yours".to_string();
    let remote = memory(vec![row("1", "todo", 0), foreign.to_row().expect("row")]);
    let board = board(remote, BoardOptions::default()).await;
    assert_eq!(board.items().len(), 1);
    assert!(board.store().get("x").is_none());
}

#[tokio::test]
async fn file_store_backed_board_round_trip() {
    let dir = tempfile::tempdir().expect("tempdir");
    let storage = Storage::new(dir.path());
    storage.init().expect("init");
    let remote: Arc<dyn RemoteStore> = Arc::new(FileStore::new(storage, 1000));
    let ctx = session("u");

    let mut first = board(remote.clone(), BoardOptions::default()).await;
    let a = first
        .create_item(&ctx, ItemDraft::new("a"), ts(1))
        .await
        .expect("create a");
    let b = first
        .create_item(&ctx, ItemDraft::new("b"), ts(2))
        .await
        .expect("create b");
    first
        .move_item(&ctx, MoveIntent::new(b.id.clone(), "todo", 0), ts(3))
        .await
        .expect("move");

    let second = board(remote, BoardOptions::default()).await;
    assert_eq!(second.view().ids("todo"), vec![b.id.as_str(), a.id.as_str()]);
    assert_eq!(second.store().get(&b.id).expect("b").updated_at, ts(3));
}
