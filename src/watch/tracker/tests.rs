use std::path::{Path, PathBuf};
use std::time::Duration;

use super::SUBSCRIBER_BUFFER;
use super::testing::{Op, modify_kind, recording_tracker, wait_until};
use crate::watch::error::WatchError;

fn log_path() -> PathBuf {
    crate::utils::path::normalize_path(Path::new("/logs/app.log"))
}

fn other_path() -> PathBuf {
    crate::utils::path::normalize_path(Path::new("/logs/other.log"))
}

#[tokio::test]
async fn test_one_os_watch_per_path() {
    let (tracker, backend, _feed) = recording_tracker();
    let path = log_path();

    let a = tracker.create_watch(&path).await.unwrap();
    let b = tracker.create_watch(&path).await.unwrap();
    let c = tracker.create_watch(&path).await.unwrap();
    assert_eq!(backend.watch_count(&path), 1);
    assert_eq!(tracker.subscriber_count(&path), 3);

    tracker.remove_watch(&a).await.unwrap();
    tracker.remove_watch(&b).await.unwrap();
    assert_eq!(backend.unwatch_count(&path), 0);
    assert_eq!(tracker.subscriber_count(&path), 1);

    tracker.remove_watch(&c).await.unwrap();
    assert_eq!(backend.unwatch_count(&path), 1);
    assert_eq!(tracker.subscriber_count(&path), 0);
    assert!(tracker.watched_paths().is_empty());
}

#[tokio::test]
async fn test_sole_subscriber_unwatches_once() {
    let (tracker, backend, _feed) = recording_tracker();
    let path = log_path();

    let sub = tracker.create_watch(&path).await.unwrap();
    tracker.remove_watch(&sub).await.unwrap();

    assert_eq!(
        backend.ops(),
        vec![Op::Watch(path.clone()), Op::Unwatch(path.clone())]
    );
}

#[tokio::test]
async fn test_remaining_subscriber_keeps_receiving() {
    let (tracker, backend, feed) = recording_tracker();
    let path = log_path();

    let leaving = tracker.create_watch(&path).await.unwrap();
    let mut staying = tracker.create_watch(&path).await.unwrap();
    tracker.remove_watch(&leaving).await.unwrap();

    feed.send(&path, modify_kind());
    let event = staying.recv().await.unwrap();
    assert_eq!(event.path, path);
    assert_eq!(event.kind, modify_kind());

    assert_eq!(backend.ops(), vec![Op::Watch(path.clone())]);
    assert_eq!(tracker.watched_paths(), vec![path]);
}

#[tokio::test]
async fn test_double_remove_is_not_found() {
    let (tracker, _backend, feed) = recording_tracker();
    let path = log_path();

    let mut removed = tracker.create_watch(&path).await.unwrap();
    let mut other = tracker.create_watch(&path).await.unwrap();
    tracker.remove_watch(&removed).await.unwrap();

    let err = tracker.remove_watch(&removed).await.unwrap_err();
    assert!(matches!(err, WatchError::SubscriberNotFound { .. }));

    // The removed channel is closed; the other subscriber is untouched
    assert!(removed.recv().await.is_none());
    assert_eq!(tracker.subscriber_count(&path), 1);
    feed.send(&path, modify_kind());
    assert!(other.recv().await.is_some());
}

#[tokio::test]
async fn test_parent_directory_sees_child_events() {
    let (tracker, _backend, feed) = recording_tracker();
    let path = log_path();
    let dir = path.parent().unwrap().to_path_buf();

    let mut dir_sub = tracker.create_watch(&dir).await.unwrap();
    let mut file_sub = tracker.create_watch(&path).await.unwrap();

    feed.send(&path, modify_kind());
    assert_eq!(file_sub.recv().await.unwrap().path, path);
    assert_eq!(dir_sub.recv().await.unwrap().path, path);
}

#[tokio::test]
async fn test_event_paths_are_normalized() {
    let (tracker, _backend, feed) = recording_tracker();
    let path = log_path();

    let mut sub = tracker.create_watch(&path).await.unwrap();
    let dotted = path.parent().unwrap().join(".").join("app.log");
    feed.send(&dotted, modify_kind());

    assert_eq!(sub.recv().await.unwrap().path, path);
}

#[tokio::test]
async fn test_registration_error_leaves_nothing_behind() {
    let (tracker, backend, _feed) = recording_tracker();
    let path = log_path();
    backend.reject(&path);

    let err = tracker.create_watch(&path).await.unwrap_err();
    assert!(matches!(err, WatchError::Register { .. }));
    assert_eq!(tracker.subscriber_count(&path), 0);

    // The next subscriber retries the registration
    backend.accept(&path);
    let _sub = tracker.create_watch(&path).await.unwrap();
    assert_eq!(backend.watch_count(&path), 1);
}

#[tokio::test]
async fn test_cleanup_drops_all_subscribers() {
    let (tracker, backend, _feed) = recording_tracker();
    let path = log_path();

    let mut a = tracker.create_watch(&path).await.unwrap();
    let mut b = tracker.create_watch(&path).await.unwrap();
    tracker.cleanup(&path).await.unwrap();

    assert!(a.recv().await.is_none());
    assert!(b.recv().await.is_none());
    assert_eq!(backend.unwatch_count(&path), 1);
    assert_eq!(tracker.subscriber_count(&path), 0);

    let err = tracker.remove_watch(&a).await.unwrap_err();
    assert!(matches!(err, WatchError::SubscriberNotFound { .. }));
}

#[tokio::test]
async fn test_cleanup_of_unknown_path_is_noop() {
    let (tracker, backend, _feed) = recording_tracker();
    tracker.cleanup(log_path()).await.unwrap();
    assert!(backend.ops().is_empty());
}

#[tokio::test]
async fn test_remove_aborts_blocked_broadcast() {
    let (tracker, backend, feed) = recording_tracker();
    let path = log_path();
    let other = other_path();

    // Never read: its buffer fills and the next broadcast blocks on it
    let stalled = tracker.create_watch(&path).await.unwrap();
    let mut witness = tracker.create_watch(&other).await.unwrap();

    for _ in 0..SUBSCRIBER_BUFFER {
        feed.send(&path, modify_kind());
    }
    feed.send(&other, modify_kind());
    // Delivered in OS order, so the stalled buffer is now full
    witness.recv().await.unwrap();

    feed.send(&path, modify_kind());
    feed.send(&other, modify_kind());
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(witness.try_recv().is_none(), "broadcast should be blocked");

    let removed = tokio::time::timeout(Duration::from_secs(5), tracker.remove_watch(&stalled)).await;
    assert!(removed.expect("remove must not deadlock").is_ok());
    assert_eq!(backend.unwatch_count(&path), 1);

    // The aborted broadcast moved on to the next event
    let resumed = tokio::time::timeout(Duration::from_secs(5), witness.recv()).await;
    assert_eq!(resumed.unwrap().unwrap().path, other);
}

#[tokio::test]
async fn test_shutdown_with_stalled_subscriber() {
    let (tracker, backend, feed) = recording_tracker();
    let path = log_path();

    let _stalled = tracker.create_watch(&path).await.unwrap();
    for _ in 0..SUBSCRIBER_BUFFER + 1 {
        feed.send(&path, modify_kind());
    }
    tokio::time::sleep(Duration::from_millis(20)).await;

    let stopped = tokio::time::timeout(Duration::from_secs(5), tracker.shutdown()).await;
    assert!(stopped.is_ok(), "shutdown must not wait on a stalled subscriber");
    assert_eq!(backend.unwatch_count(&path), 1);
}

#[tokio::test]
async fn test_dropped_subscription_unsubscribes() {
    let (tracker, backend, _feed) = recording_tracker();
    let path = log_path();

    let first = tracker.create_watch(&path).await.unwrap();
    let second = tracker.create_watch(&path).await.unwrap();

    drop(first);
    wait_until(|| tracker.subscriber_count(&path) == 1).await;
    assert_eq!(backend.unwatch_count(&path), 0);

    drop(second);
    wait_until(|| backend.unwatch_count(&path) == 1).await;
    assert!(tracker.watched_paths().is_empty());
}

#[tokio::test]
async fn test_drop_after_remove_unwatches_once() {
    let (tracker, backend, _feed) = recording_tracker();
    let path = log_path();

    let sub = tracker.create_watch(&path).await.unwrap();
    tracker.remove_watch(&sub).await.unwrap();
    drop(sub);

    // A fresh subscriber proves the task has handled anything queued by the drop
    let _next = tracker.create_watch(&path).await.unwrap();
    assert_eq!(
        backend.ops(),
        vec![
            Op::Watch(path.clone()),
            Op::Unwatch(path.clone()),
            Op::Watch(path.clone())
        ]
    );
}

#[tokio::test]
async fn test_interrupted_backend_errors_are_ignored() {
    let (tracker, _backend, feed) = recording_tracker();
    let path = log_path();
    let mut sub = tracker.create_watch(&path).await.unwrap();

    feed.send_error(notify::Error::io(std::io::Error::from(
        std::io::ErrorKind::Interrupted,
    )));
    feed.send_error(notify::Error::generic("queue overflow"));
    feed.send(&path, modify_kind());

    assert!(sub.recv().await.is_some());
}

#[tokio::test]
async fn test_shutdown_releases_everything() {
    let (tracker, backend, _feed) = recording_tracker();
    let path = log_path();
    let dir = path.parent().unwrap().to_path_buf();

    let mut sub = tracker.create_watch(&path).await.unwrap();
    let _dir_sub = tracker.create_watch(&dir).await.unwrap();
    tracker.shutdown().await;

    assert!(sub.recv().await.is_none());
    assert_eq!(backend.unwatch_count(&path), 1);
    assert_eq!(backend.unwatch_count(&dir), 1);

    let err = tracker.create_watch(&path).await.unwrap_err();
    assert!(matches!(err, WatchError::Closed));
}
