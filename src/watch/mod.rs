//! File change watching.
//!
//! Two engines answer the same two questions about one file: "does it exist
//! yet?" and "how is it changing?".
//!
//! - [`InotifyFileWatcher`]: OS push notifications through a shared [`Tracker`]
//! - [`PollingFileWatcher`]: periodic `stat` comparison, no shared state
//!
//! Both report through a [`FileChanges`] signal.

mod changes;
mod error;
mod inotify;
mod polling;
mod tracker;

use std::future::Future;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use tokio_util::sync::CancellationToken;

pub use changes::{Change, ChangeSender, FileChanges, channel};
pub use error::{Result, WatchError};
pub use inotify::InotifyFileWatcher;
pub use polling::{DEFAULT_POLL_INTERVAL, PollingFileWatcher};
pub use tracker::{
    NotifyBackend, OsEvents, RawEvent, SubscriberId, Subscription, Tracker, WatchBackend,
};

/// Common surface of both engines.
pub trait FileWatcher {
    /// Resolve once the file exists.
    ///
    /// Fails with [`WatchError::Cancelled`] when `cancel` fires first, having
    /// released any watch taken while waiting.
    fn block_until_exists(
        &self,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Start reporting changes, treating `start_offset` as the last known size.
    ///
    /// The returned signal ends (`Ok(None)`) once `cancel` fires.
    fn change_events(
        &self,
        cancel: &CancellationToken,
        start_offset: u64,
    ) -> impl Future<Output = Result<FileChanges>> + Send;
}

/// Which engine to use for a file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WatchMode {
    #[default]
    Notify,
    Poll,
}

/// Engine choice for [`AnyWatcher::new`], with what that engine needs.
#[derive(Clone, Copy)]
pub enum Engine<'a> {
    Notify(&'a Tracker),
    Poll(Duration),
}

impl Engine<'_> {
    pub const fn mode(&self) -> WatchMode {
        match self {
            Self::Notify(_) => WatchMode::Notify,
            Self::Poll(_) => WatchMode::Poll,
        }
    }
}

/// Either engine, picked at runtime.
pub enum AnyWatcher {
    Notify(InotifyFileWatcher),
    Poll(PollingFileWatcher),
}

impl AnyWatcher {
    pub fn new(path: impl AsRef<Path>, engine: Engine<'_>) -> Self {
        match engine {
            Engine::Notify(tracker) => Self::Notify(InotifyFileWatcher::new(path, tracker.clone())),
            Engine::Poll(interval) => {
                Self::Poll(PollingFileWatcher::new(path).with_poll_interval(interval))
            }
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            Self::Notify(w) => w.path(),
            Self::Poll(w) => w.path(),
        }
    }

    pub fn size(&self) -> u64 {
        match self {
            Self::Notify(w) => w.size(),
            Self::Poll(w) => w.size(),
        }
    }

    pub const fn mode(&self) -> WatchMode {
        match self {
            Self::Notify(_) => WatchMode::Notify,
            Self::Poll(_) => WatchMode::Poll,
        }
    }
}

impl FileWatcher for AnyWatcher {
    async fn block_until_exists(&self, cancel: &CancellationToken) -> Result<()> {
        match self {
            Self::Notify(w) => w.block_until_exists(cancel).await,
            Self::Poll(w) => w.block_until_exists(cancel).await,
        }
    }

    async fn change_events(
        &self,
        cancel: &CancellationToken,
        start_offset: u64,
    ) -> Result<FileChanges> {
        match self {
            Self::Notify(w) => w.change_events(cancel, start_offset).await,
            Self::Poll(w) => w.change_events(cancel, start_offset).await,
        }
    }
}
