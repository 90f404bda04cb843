//! Polling engine.
//!
//! Detects changes by comparing successive `stat` snapshots of one file.
//! Shares no state with any other watcher and needs no OS facility.

use std::fs::Metadata;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime};

use tokio_util::sync::CancellationToken;

use super::FileWatcher;
use super::changes::{self, Change, ChangeSender, FileChanges};
use super::error::{Result, WatchError};
use crate::utils::path::normalize_path;
use crate::utils::platform::{DeletionPredicate, FileIdentity, stat_means_deleted};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Watches one file by periodic `stat`.
pub struct PollingFileWatcher {
    path: PathBuf,
    poll_interval: Duration,
    size: Arc<AtomicU64>,
    is_deleted: DeletionPredicate,
}

impl PollingFileWatcher {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: normalize_path(path.as_ref()),
            poll_interval: DEFAULT_POLL_INTERVAL,
            size: Arc::new(AtomicU64::new(0)),
            is_deleted: stat_means_deleted,
        }
    }

    pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Replace the rule deciding which `stat` errors mean the file is gone.
    pub const fn with_deletion_predicate(mut self, is_deleted: DeletionPredicate) -> Self {
        self.is_deleted = is_deleted;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub const fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Size observed on the most recent tick.
    pub fn size(&self) -> u64 {
        self.size.load(Ordering::SeqCst)
    }
}

impl FileWatcher for PollingFileWatcher {
    async fn block_until_exists(&self, cancel: &CancellationToken) -> Result<()> {
        loop {
            match tokio::fs::metadata(&self.path).await {
                Ok(_) => return Ok(()),
                Err(err) if err.kind() == io::ErrorKind::NotFound => {}
                Err(err) => return Err(WatchError::stat(&self.path, err)),
            }

            tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(WatchError::Cancelled),
                () = tokio::time::sleep(self.poll_interval) => {}
            }
        }
    }

    async fn change_events(
        &self,
        cancel: &CancellationToken,
        start_offset: u64,
    ) -> Result<FileChanges> {
        let meta = tokio::fs::metadata(&self.path)
            .await
            .map_err(|err| WatchError::stat(&self.path, err))?;
        self.size.store(start_offset, Ordering::SeqCst);

        let (sender, changes) = changes::channel();
        let task = PollTask {
            path: self.path.clone(),
            poll_interval: self.poll_interval,
            size: Arc::clone(&self.size),
            is_deleted: self.is_deleted,
            state: PollState::new(&meta, start_offset),
        };
        tokio::spawn(task.run(cancel.clone(), sender));

        Ok(changes)
    }
}

/// The parts of a `stat` result the engine compares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Snapshot {
    identity: FileIdentity,
    len: u64,
    modified: Option<SystemTime>,
}

impl Snapshot {
    fn of(meta: &Metadata) -> Self {
        Self {
            identity: FileIdentity::of(meta),
            len: meta.len(),
            modified: meta.modified().ok(),
        }
    }
}

/// Comparison state carried from tick to tick.
#[derive(Debug)]
struct PollState {
    identity: FileIdentity,
    last_size: u64,
    last_modified: Option<SystemTime>,
}

impl PollState {
    fn new(meta: &Metadata, start_offset: u64) -> Self {
        let initial = Snapshot::of(meta);
        Self {
            identity: initial.identity,
            last_size: start_offset,
            last_modified: initial.modified,
        }
    }

    /// Compare a fresh snapshot against the previous tick and record it.
    fn observe(&mut self, snap: Snapshot) -> Option<Change> {
        if snap.identity != self.identity {
            return Some(Change::Deleted);
        }

        let prev_size = std::mem::replace(&mut self.last_size, snap.len);
        let prev_modified = std::mem::replace(&mut self.last_modified, snap.modified);

        if prev_size > 0 && snap.len < prev_size {
            Some(Change::Truncated)
        } else if prev_size > 0 && snap.len > prev_size {
            Some(Change::Modified)
        } else if snap.modified != prev_modified {
            Some(Change::Modified)
        } else {
            None
        }
    }
}

struct PollTask {
    path: PathBuf,
    poll_interval: Duration,
    size: Arc<AtomicU64>,
    is_deleted: DeletionPredicate,
    state: PollState,
}

impl PollTask {
    async fn run(mut self, cancel: CancellationToken, sender: ChangeSender) {
        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => return,
                () = sender.closed() => return,
                () = tokio::time::sleep(self.poll_interval) => {}
            }

            let meta = match tokio::fs::metadata(&self.path).await {
                Ok(meta) => meta,
                Err(err) if (self.is_deleted)(&err) => {
                    crate::debug!("watch"; "deleted: {}", self.path.display());
                    sender.notify_deleted();
                    return;
                }
                Err(err) => {
                    let err = WatchError::stat(&self.path, err);
                    crate::log!("watch"; "{}: {}", err, self.path.display());
                    sender.notify_failed(err);
                    return;
                }
            };

            let snap = Snapshot::of(&meta);
            let change = self.state.observe(snap);
            // Size lands before the consumer can observe the signal
            self.size.store(snap.len, Ordering::SeqCst);

            let Some(change) = change else {
                continue;
            };
            crate::debug!("watch"; "{}: {}", change.label(), self.path.display());
            match change {
                Change::Modified => sender.notify_modified(),
                Change::Truncated => sender.notify_truncated(),
                Change::Deleted => {
                    sender.notify_deleted();
                    return;
                }
            }
        }
    }
}
