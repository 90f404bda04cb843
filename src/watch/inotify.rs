//! Push-notification engine.
//!
//! Per-file facade over the shared [`Tracker`]: subscribes through it,
//! turns raw OS events into [`Change`]s and keeps the last known size.
//!
//! ```text
//! Tracker --RawEvent--> ChangeTask --stat + compare--> ChangeSender --> FileChanges
//! ```

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use notify::EventKind;
use notify::event::ModifyKind;
use tokio_util::sync::CancellationToken;

use super::FileWatcher;
use super::changes::{self, Change, ChangeSender, FileChanges};
use super::error::{Result, WatchError};
use super::tracker::{Subscription, Tracker};
use crate::utils::path::{normalize_path, parent_dir};

/// Watches one file through OS push notifications.
pub struct InotifyFileWatcher {
    path: PathBuf,
    size: Arc<AtomicU64>,
    tracker: Tracker,
}

impl InotifyFileWatcher {
    pub fn new(path: impl AsRef<Path>, tracker: Tracker) -> Self {
        Self {
            path: normalize_path(path.as_ref()),
            size: Arc::new(AtomicU64::new(0)),
            tracker,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Size seen by the most recent write or attribute event.
    pub fn size(&self) -> u64 {
        self.size.load(Ordering::SeqCst)
    }

    async fn wait_for_creation(
        &self,
        subscription: &mut Subscription,
        cancel: &CancellationToken,
    ) -> Result<()> {
        // The file may have appeared before the subscription took effect
        if exists(&self.path).await? {
            return Ok(());
        }

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(WatchError::Cancelled),
                event = subscription.recv() => {
                    let Some(event) = event else {
                        return Err(WatchError::Closed);
                    };
                    if event.path == self.path
                        && is_creation(event.kind)
                        && exists(&self.path).await?
                    {
                        return Ok(());
                    }
                }
            }
        }
    }
}

impl FileWatcher for InotifyFileWatcher {
    async fn block_until_exists(&self, cancel: &CancellationToken) -> Result<()> {
        // The root always exists
        let Some(parent) = parent_dir(&self.path) else {
            return Ok(());
        };

        let mut subscription = self.tracker.create_watch(parent).await?;
        let result = self.wait_for_creation(&mut subscription, cancel).await;

        if let Err(err) = self.tracker.remove_watch(&subscription).await {
            crate::debug!("watch"; "unsubscribe {}: {}", parent.display(), err);
        }
        result
    }

    async fn change_events(
        &self,
        cancel: &CancellationToken,
        start_offset: u64,
    ) -> Result<FileChanges> {
        let subscription = self.tracker.create_watch(&self.path).await?;
        self.size.store(start_offset, Ordering::SeqCst);

        let (sender, changes) = changes::channel();
        let task = ChangeTask {
            path: self.path.clone(),
            size: Arc::clone(&self.size),
            tracker: self.tracker.clone(),
            subscription,
        };
        tokio::spawn(task.run(cancel.clone(), sender));

        Ok(changes)
    }
}

/// How a raw event bears on the watched file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EventClass {
    /// Removed or renamed away
    Gone,
    /// Content or attributes changed; re-stat to find out how
    Touched,
    Ignored,
}

fn classify(kind: EventKind) -> EventClass {
    match kind {
        EventKind::Remove(_) | EventKind::Modify(ModifyKind::Name(_)) => EventClass::Gone,
        // Unlinking a file that is still held open surfaces as an attribute
        // change rather than a remove
        EventKind::Modify(
            ModifyKind::Metadata(_) | ModifyKind::Data(_) | ModifyKind::Any | ModifyKind::Other,
        ) => EventClass::Touched,
        _ => EventClass::Ignored,
    }
}

fn is_creation(kind: EventKind) -> bool {
    matches!(
        kind,
        EventKind::Create(_) | EventKind::Modify(ModifyKind::Name(_))
    )
}

/// `Ok(false)` only for not-found; other stat errors are returned.
async fn exists(path: &Path) -> Result<bool> {
    match tokio::fs::metadata(path).await {
        Ok(_) => Ok(true),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(err) => Err(WatchError::stat(path, err)),
    }
}

/// How a change task ended.
enum Outcome {
    Deleted,
    Failed(WatchError),
    /// Cancelled, consumer gone, or subscription torn down
    Stopped,
}

struct ChangeTask {
    path: PathBuf,
    size: Arc<AtomicU64>,
    tracker: Tracker,
    subscription: Subscription,
}

impl ChangeTask {
    async fn run(mut self, cancel: CancellationToken, sender: ChangeSender) {
        let outcome = self.translate(&cancel, &sender).await;

        // Unsubscribe before the terminal signal reaches the consumer
        if let Err(err) = self.tracker.remove_watch(&self.subscription).await {
            crate::debug!("watch"; "unsubscribe {}: {}", self.path.display(), err);
        }

        match outcome {
            Outcome::Deleted => sender.notify_deleted(),
            Outcome::Failed(err) => {
                crate::log!("watch"; "{}: {}", err, self.path.display());
                sender.notify_failed(err);
            }
            Outcome::Stopped => {}
        }
    }

    async fn translate(&mut self, cancel: &CancellationToken, sender: &ChangeSender) -> Outcome {
        loop {
            let event = tokio::select! {
                biased;
                () = cancel.cancelled() => return Outcome::Stopped,
                () = sender.closed() => return Outcome::Stopped,
                event = self.subscription.recv() => match event {
                    Some(event) => event,
                    None => return Outcome::Stopped,
                },
            };

            match classify(event.kind) {
                EventClass::Gone => return Outcome::Deleted,
                EventClass::Touched => match tokio::fs::metadata(&self.path).await {
                    Ok(meta) => {
                        let change = self.record_size(meta.len());
                        crate::debug!("watch"; "{}: {}", change.label(), self.path.display());
                        match change {
                            Change::Truncated => sender.notify_truncated(),
                            _ => sender.notify_modified(),
                        }
                    }
                    Err(err) if err.kind() == io::ErrorKind::NotFound => {
                        return Outcome::Deleted;
                    }
                    Err(err) => return Outcome::Failed(WatchError::stat(&self.path, err)),
                },
                EventClass::Ignored => {}
            }
        }
    }

    /// Store the new size and classify it against the previous one.
    fn record_size(&self, len: u64) -> Change {
        let prev = self.size.swap(len, Ordering::SeqCst);
        if prev > 0 && len < prev {
            Change::Truncated
        } else {
            Change::Modified
        }
    }
}
