//! Change Signal
//!
//! Coalescing notification primitive between a watcher's background task and
//! the tail loop that consumes it.
//!
//! ```text
//! ChangeSender (engine task) --[modified|truncated|deleted|failed]--> FileChanges (consumer)
//! ```
//!
//! Every kind has a single slot. Posting into a full slot is a no-op and the
//! producer never blocks. `Deleted` and `Failed` are terminal and consume the
//! sender, so nothing can follow them.

use tokio::sync::mpsc;

use super::error::{Result, WatchError};

/// What happened to the watched file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Change {
    /// Content grew, or was rewritten at the same size.
    Modified,
    /// Size dropped below the last known size. Non-terminal.
    Truncated,
    /// The file was removed, renamed away, or replaced. Terminal.
    Deleted,
}

impl Change {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Modified => "modified",
            Self::Truncated => "truncated",
            Self::Deleted => "deleted",
        }
    }
}

/// Create a connected producer/consumer pair.
pub fn channel() -> (ChangeSender, FileChanges) {
    let (modified_tx, modified_rx) = mpsc::channel(1);
    let (truncated_tx, truncated_rx) = mpsc::channel(1);
    let (deleted_tx, deleted_rx) = mpsc::channel(1);
    let (failed_tx, failed_rx) = mpsc::channel(1);

    let sender = ChangeSender {
        modified: modified_tx,
        truncated: truncated_tx,
        deleted: deleted_tx,
        failed: failed_tx,
    };
    let changes = FileChanges {
        modified: modified_rx,
        truncated: truncated_rx,
        deleted: deleted_rx,
        failed: failed_rx,
    };
    (sender, changes)
}

/// Producer half, owned by an engine's background task.
#[derive(Debug)]
pub struct ChangeSender {
    modified: mpsc::Sender<()>,
    truncated: mpsc::Sender<()>,
    deleted: mpsc::Sender<()>,
    failed: mpsc::Sender<WatchError>,
}

impl ChangeSender {
    pub fn notify_modified(&self) {
        // Full slot: an undrained signal already covers this one
        let _ = self.modified.try_send(());
    }

    pub fn notify_truncated(&self) {
        let _ = self.truncated.try_send(());
    }

    pub fn notify_deleted(self) {
        let _ = self.deleted.try_send(());
    }

    /// Terminal failure of the watch, surfaced to the consumer as `Err`.
    pub fn notify_failed(self, err: WatchError) {
        let _ = self.failed.try_send(err);
    }

    /// Resolves once the consumer has dropped its [`FileChanges`].
    pub async fn closed(&self) {
        self.modified.closed().await;
    }

    pub fn is_closed(&self) -> bool {
        self.modified.is_closed()
    }
}

/// Consumer half, returned by `change_events`.
#[derive(Debug)]
pub struct FileChanges {
    modified: mpsc::Receiver<()>,
    truncated: mpsc::Receiver<()>,
    deleted: mpsc::Receiver<()>,
    failed: mpsc::Receiver<WatchError>,
}

impl FileChanges {
    /// Wait for the next change and drain exactly that slot.
    ///
    /// Returns `Ok(None)` once the producer has stopped (deleted, cancelled,
    /// or torn down) and every slot is drained. A terminal failure comes back
    /// as `Err`. When several slots are pending they drain in the order
    /// truncated, modified, deleted, failed, so data-bearing changes are seen
    /// before the terminal one.
    pub async fn recv(&mut self) -> Result<Option<Change>> {
        tokio::select! {
            biased;
            Some(()) = self.truncated.recv() => Ok(Some(Change::Truncated)),
            Some(()) = self.modified.recv() => Ok(Some(Change::Modified)),
            Some(()) = self.deleted.recv() => Ok(Some(Change::Deleted)),
            Some(err) = self.failed.recv() => Err(err),
            else => Ok(None),
        }
    }

    /// Drain one pending change without waiting. `Ok(None)` means nothing is pending.
    pub fn try_recv(&mut self) -> Result<Option<Change>> {
        if self.truncated.try_recv().is_ok() {
            return Ok(Some(Change::Truncated));
        }
        if self.modified.try_recv().is_ok() {
            return Ok(Some(Change::Modified));
        }
        if self.deleted.try_recv().is_ok() {
            return Ok(Some(Change::Deleted));
        }
        match self.failed.try_recv() {
            Ok(err) => Err(err),
            Err(_) => Ok(None),
        }
    }
}
