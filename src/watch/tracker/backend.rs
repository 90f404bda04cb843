//! OS notification backend.
//!
//! The tracker only needs to add and remove one non-recursive watch per path;
//! raw events arrive separately on an unbounded channel so the OS facility's
//! thread never blocks on the tracker.

use std::path::Path;

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::watch::error::{Result, WatchError};

/// Raw event stream produced by a backend.
pub type OsEvents = mpsc::UnboundedReceiver<notify::Result<notify::Event>>;

/// Per-path watch registration with the OS facility.
pub trait WatchBackend: Send + 'static {
    fn watch(&mut self, path: &Path) -> Result<()>;

    /// May block until the OS acknowledges the removal.
    fn unwatch(&mut self, path: &Path) -> Result<()>;
}

/// Backend over `notify`'s recommended watcher (inotify on Linux).
pub struct NotifyBackend {
    watcher: RecommendedWatcher,
}

impl NotifyBackend {
    /// Create the OS watcher along with its event stream.
    pub fn new() -> Result<(Self, OsEvents)> {
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let watcher = notify::recommended_watcher(move |res| {
            // Receiver gone means the tracker stopped
            let _ = event_tx.send(res);
        })
        .map_err(WatchError::Backend)?;

        Ok((Self { watcher }, event_rx))
    }
}

impl WatchBackend for NotifyBackend {
    fn watch(&mut self, path: &Path) -> Result<()> {
        self.watcher
            .watch(path, RecursiveMode::NonRecursive)
            .map_err(|source| WatchError::Register {
                path: path.to_path_buf(),
                source,
            })
    }

    fn unwatch(&mut self, path: &Path) -> Result<()> {
        self.watcher
            .unwatch(path)
            .map_err(|source| WatchError::Unregister {
                path: path.to_path_buf(),
                source,
            })
    }
}
