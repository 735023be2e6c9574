//! Orchestrator and undo/redo tests over a scratch store and mock server.

use reget_core::{CommandHistory, DownloadManager, RegetError, TaskAction, TaskStatus};
use std::path::Path;
use std::time::{Duration, Instant};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn scratch_manager() -> (tempfile::TempDir, DownloadManager) {
    let dir = tempfile::tempdir().unwrap();
    let manager = DownloadManager::open(dir.path().join("tasks.db"))
        .await
        .unwrap();
    (dir, manager)
}

async fn wait_for_status(manager: &DownloadManager, id: i64, status: TaskStatus) {
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        let task = manager.store().find_by_id(id).await.unwrap().unwrap();
        if task.status == status {
            return;
        }
        if Instant::now() > deadline {
            panic!("task {id} stuck in {:?}, wanted {status:?}", task.status);
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
}

#[tokio::test]
async fn add_runs_a_task_to_completion() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/a.bin"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"hello".to_vec()))
        .mount(&server)
        .await;

    let (dir, manager) = scratch_manager().await;
    let target = dir.path().join("downloads/a.bin");

    let id = manager
        .add(&format!("{}/a.bin", server.uri()), &target)
        .await
        .unwrap();

    wait_for_status(&manager, id, TaskStatus::Completed).await;

    let task = manager.store().find_by_id(id).await.unwrap().unwrap();
    assert_eq!(task.last_byte, 5);
    assert_eq!(task.total_bytes, 5);
    assert_eq!(tokio::fs::read(&target).await.unwrap(), b"hello");

    manager.close().await;
}

#[tokio::test]
async fn failed_transfer_is_recorded_as_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/gone.bin"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let (dir, manager) = scratch_manager().await;
    let id = manager
        .add(
            &format!("{}/gone.bin", server.uri()),
            &dir.path().join("gone.bin"),
        )
        .await
        .unwrap();

    wait_for_status(&manager, id, TaskStatus::Error).await;

    let task = manager.store().find_by_id(id).await.unwrap().unwrap();
    assert_eq!(task.last_byte, 0);

    manager.close().await;
}

#[tokio::test]
async fn resume_continues_from_the_persisted_offset() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/a.bin"))
        .and(header("Range", "bytes=5-"))
        .respond_with(ResponseTemplate::new(206).set_body_bytes(b" world".to_vec()))
        .mount(&server)
        .await;

    let (dir, manager) = scratch_manager().await;
    let target = dir.path().join("a.bin");
    tokio::fs::write(&target, b"hello").await.unwrap();

    let id = manager
        .store()
        .create(&format!("{}/a.bin", server.uri()), &target)
        .await
        .unwrap();
    manager
        .store()
        .update_status(id, TaskStatus::Paused, 5)
        .await
        .unwrap();

    manager.resume(id).await.unwrap();
    wait_for_status(&manager, id, TaskStatus::Completed).await;

    let task = manager.store().find_by_id(id).await.unwrap().unwrap();
    assert_eq!(task.last_byte, 11);
    assert_eq!(tokio::fs::read(&target).await.unwrap(), b"hello world");

    manager.close().await;
}

#[tokio::test]
async fn pause_mid_transfer_keeps_the_paused_state() {
    let server = MockServer::start().await;
    // 512 KiB at a 64 KiB/s cap: the throttle sleeps between chunks give the
    // pause plenty of room to land mid-body.
    Mock::given(method("GET"))
        .and(path("/big.bin"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![9u8; 512 * 1024]))
        .mount(&server)
        .await;

    let (dir, manager) = scratch_manager().await;
    manager.set_limit(64 * 1024);
    let target = dir.path().join("big.bin");

    let id = manager
        .add(&format!("{}/big.bin", server.uri()), &target)
        .await
        .unwrap();

    // wait until the first chunk's progress is persisted
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        let task = manager.store().find_by_id(id).await.unwrap().unwrap();
        if task.last_byte > 0 {
            break;
        }
        if Instant::now() > deadline {
            panic!("no progress recorded");
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    manager.pause(id).await.unwrap();

    // long enough for the job to observe the flag, and for the transfer to
    // have finished had the stop been ignored
    tokio::time::sleep(Duration::from_secs(3)).await;

    let task = manager.store().find_by_id(id).await.unwrap().unwrap();
    assert_eq!(task.status, TaskStatus::Paused);

    let on_disk = tokio::fs::metadata(&target).await.unwrap().len();
    assert!(task.last_byte as u64 <= on_disk);
    assert!(on_disk < 512 * 1024, "transfer ran to completion despite the stop");

    manager.close().await;
}

#[tokio::test]
async fn resume_of_unknown_task_is_not_found() {
    let (_dir, manager) = scratch_manager().await;
    match manager.resume(99).await {
        Err(RegetError::NotFound(99)) => {}
        other => panic!("expected NotFound, got {other:?}"),
    }
    manager.close().await;
}

#[tokio::test]
async fn invalid_url_is_rejected_before_a_task_exists() {
    let (dir, manager) = scratch_manager().await;
    let err = manager
        .add("not a url", &dir.path().join("x.bin"))
        .await
        .unwrap_err();
    assert!(matches!(err, RegetError::InvalidUrl(_)));
    assert!(manager.store().list_all().await.unwrap().is_empty());
    manager.close().await;
}

#[tokio::test]
async fn undo_of_a_pause_restores_a_running_task() {
    let server = MockServer::start().await;
    // The response stalls long enough for the task to stay observable as
    // RUNNING after the undo resumes it.
    Mock::given(method("GET"))
        .and(path("/slow.bin"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(vec![0u8; 1024])
                .set_delay(Duration::from_secs(30)),
        )
        .mount(&server)
        .await;

    let (dir, manager) = scratch_manager().await;
    let mut history = CommandHistory::new();

    let id = manager
        .store()
        .create(&format!("{}/slow.bin", server.uri()), &dir.path().join("slow.bin"))
        .await
        .unwrap();
    manager
        .store()
        .update_status(id, TaskStatus::Running, 0)
        .await
        .unwrap();

    history
        .execute(&manager, TaskAction::pause(id))
        .await
        .unwrap();
    let task = manager.store().find_by_id(id).await.unwrap().unwrap();
    assert_eq!(task.status, TaskStatus::Paused);

    let undone = history.undo(&manager).await.unwrap();
    assert_eq!(undone, Some(format!("pause task #{id}")));
    let task = manager.store().find_by_id(id).await.unwrap().unwrap();
    assert_eq!(task.status, TaskStatus::Running);

    let redone = history.redo(&manager).await.unwrap();
    assert!(redone.is_some());
    let task = manager.store().find_by_id(id).await.unwrap().unwrap();
    assert_eq!(task.status, TaskStatus::Paused);

    manager.close().await;
}

#[tokio::test]
async fn undo_is_a_noop_when_the_precondition_moved_on() {
    let (_dir, manager) = scratch_manager().await;
    let mut history = CommandHistory::new();

    let id = manager
        .store()
        .create("http://example.com/a", Path::new("a.bin"))
        .await
        .unwrap();
    manager
        .store()
        .update_status(id, TaskStatus::Paused, 0)
        .await
        .unwrap();

    // pausing an already-paused task: the captured prior status is PAUSED,
    // so undoing must not resume it
    history
        .execute(&manager, TaskAction::pause(id))
        .await
        .unwrap();
    let undone = history.undo(&manager).await.unwrap();
    assert!(undone.is_some());

    let task = manager.store().find_by_id(id).await.unwrap().unwrap();
    assert_eq!(task.status, TaskStatus::Paused);

    manager.close().await;
}

#[tokio::test]
async fn a_fresh_action_clears_the_redo_branch() {
    let (_dir, manager) = scratch_manager().await;
    let mut history = CommandHistory::new();

    let id = manager
        .store()
        .create("http://example.com/a", Path::new("a.bin"))
        .await
        .unwrap();
    manager
        .store()
        .update_status(id, TaskStatus::Paused, 0)
        .await
        .unwrap();

    history
        .execute(&manager, TaskAction::pause(id))
        .await
        .unwrap();
    history.undo(&manager).await.unwrap();
    assert!(history.can_redo());

    history
        .execute(&manager, TaskAction::pause(id))
        .await
        .unwrap();
    assert!(!history.can_redo());
    assert!(history.redo(&manager).await.unwrap().is_none());

    manager.close().await;
}

#[tokio::test]
async fn failed_undo_keeps_the_action_retryable() {
    let (_dir, manager) = scratch_manager().await;
    let mut history = CommandHistory::new();

    let id = manager
        .store()
        .create("http://example.com/a", Path::new("a.bin"))
        .await
        .unwrap();
    manager
        .store()
        .update_status(id, TaskStatus::Running, 0)
        .await
        .unwrap();

    history
        .execute(&manager, TaskAction::pause(id))
        .await
        .unwrap();

    // the compensating resume now hits a closed pool and fails
    manager.store().close().await;
    assert!(history.undo(&manager).await.is_err());

    // the action stays on the applied stack rather than vanishing
    assert!(history.can_undo());
    assert!(!history.can_redo());
    assert_eq!(history.descriptions(), vec![format!("pause task #{id}")]);

    manager.close().await;
}

#[tokio::test]
async fn empty_history_reports_nothing_to_do() {
    let (_dir, manager) = scratch_manager().await;
    let mut history = CommandHistory::new();

    assert!(history.undo(&manager).await.unwrap().is_none());
    assert!(history.redo(&manager).await.unwrap().is_none());
    assert!(history.descriptions().is_empty());

    manager.close().await;
}

#[tokio::test]
async fn history_lists_applied_actions_in_order() {
    let (_dir, manager) = scratch_manager().await;
    let mut history = CommandHistory::new();

    let id = manager
        .store()
        .create("http://example.com/a", Path::new("a.bin"))
        .await
        .unwrap();
    manager
        .store()
        .update_status(id, TaskStatus::Paused, 0)
        .await
        .unwrap();

    history
        .execute(&manager, TaskAction::pause(id))
        .await
        .unwrap();
    history
        .execute(&manager, TaskAction::pause(id))
        .await
        .unwrap();

    assert_eq!(
        history.descriptions(),
        vec![format!("pause task #{id}"), format!("pause task #{id}")]
    );
    assert!(history.can_undo());

    manager.close().await;
}

#[tokio::test]
async fn pause_of_unknown_task_is_not_found() {
    let (_dir, manager) = scratch_manager().await;
    match manager.pause(7).await {
        Err(RegetError::NotFound(7)) => {}
        other => panic!("expected NotFound, got {other:?}"),
    }
    manager.close().await;
}
