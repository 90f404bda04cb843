//! Test backend that records registrations and lets tests inject OS events.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashSet;
use tokio::sync::mpsc;

use super::{Tracker, WatchBackend};
use crate::watch::error::{Result, WatchError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Op {
    Watch(PathBuf),
    Unwatch(PathBuf),
}

#[derive(Clone, Default)]
pub(crate) struct RecordingBackend {
    ops: Arc<Mutex<Vec<Op>>>,
    rejected: Arc<Mutex<FxHashSet<PathBuf>>>,
}

impl RecordingBackend {
    pub(crate) fn ops(&self) -> Vec<Op> {
        self.ops.lock().clone()
    }

    pub(crate) fn watch_count(&self, path: &Path) -> usize {
        self.count(|op| *op == Op::Watch(path.to_path_buf()))
    }

    pub(crate) fn unwatch_count(&self, path: &Path) -> usize {
        self.count(|op| *op == Op::Unwatch(path.to_path_buf()))
    }

    /// Make registration of `path` fail until further notice.
    pub(crate) fn reject(&self, path: &Path) {
        self.rejected.lock().insert(path.to_path_buf());
    }

    pub(crate) fn accept(&self, path: &Path) {
        self.rejected.lock().remove(path);
    }

    fn count(&self, pred: impl Fn(&Op) -> bool) -> usize {
        self.ops.lock().iter().filter(|op| pred(op)).count()
    }
}

impl WatchBackend for RecordingBackend {
    fn watch(&mut self, path: &Path) -> Result<()> {
        if self.rejected.lock().contains(path) {
            return Err(WatchError::Register {
                path: path.to_path_buf(),
                source: notify::Error::path_not_found(),
            });
        }
        self.ops.lock().push(Op::Watch(path.to_path_buf()));
        Ok(())
    }

    fn unwatch(&mut self, path: &Path) -> Result<()> {
        self.ops.lock().push(Op::Unwatch(path.to_path_buf()));
        Ok(())
    }
}

/// Injects raw OS events into a tracker under test.
pub(crate) struct OsFeed(mpsc::UnboundedSender<notify::Result<notify::Event>>);

impl OsFeed {
    pub(crate) fn send(&self, path: &Path, kind: notify::EventKind) {
        let event = notify::Event {
            kind,
            paths: vec![path.to_path_buf()],
            attrs: Default::default(),
        };
        self.0.send(Ok(event)).unwrap();
    }

    pub(crate) fn send_error(&self, err: notify::Error) {
        self.0.send(Err(err)).unwrap();
    }
}

pub(crate) fn recording_tracker() -> (Tracker, RecordingBackend, OsFeed) {
    let backend = RecordingBackend::default();
    let (tx, rx) = mpsc::unbounded_channel();
    let tracker = Tracker::with_backend(backend.clone(), rx);
    (tracker, backend, OsFeed(tx))
}

pub(crate) fn modify_kind() -> notify::EventKind {
    notify::EventKind::Modify(notify::event::ModifyKind::Data(
        notify::event::DataChange::Any,
    ))
}

pub(crate) fn attrib_kind() -> notify::EventKind {
    notify::EventKind::Modify(notify::event::ModifyKind::Metadata(
        notify::event::MetadataKind::Any,
    ))
}

pub(crate) fn create_kind() -> notify::EventKind {
    notify::EventKind::Create(notify::event::CreateKind::File)
}

pub(crate) fn remove_kind() -> notify::EventKind {
    notify::EventKind::Remove(notify::event::RemoveKind::File)
}

pub(crate) fn rename_kind() -> notify::EventKind {
    notify::EventKind::Modify(notify::event::ModifyKind::Name(
        notify::event::RenameMode::From,
    ))
}

/// Yield until `cond` holds, or panic after a generous deadline.
pub(crate) async fn wait_until(mut cond: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + std::time::Duration::from_secs(5);
    while !cond() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not reached in time"
        );
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
    }
}
