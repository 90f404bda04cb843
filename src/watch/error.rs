//! Watch error types.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub type Result<T, E = WatchError> = std::result::Result<T, E>;

/// Errors raised by the watch engines and the tracker.
#[derive(Debug, Error)]
pub enum WatchError {
    #[error("failed to start the notification backend")]
    Backend(#[source] notify::Error),

    #[error("failed to watch `{}`", .path.display())]
    Register {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },

    #[error("failed to unwatch `{}`", .path.display())]
    Unregister {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },

    #[error("subscriber not found for `{}`", .path.display())]
    SubscriberNotFound { path: PathBuf },

    #[error("failed to stat `{}`", .path.display())]
    Stat {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Not a failure: the caller's cancellation token fired.
    #[error("watch cancelled")]
    Cancelled,

    /// The tracker shut down, or tore the subscription down with `cleanup`.
    #[error("tracker closed")]
    Closed,
}

impl WatchError {
    pub(crate) fn stat(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Stat {
            path: path.into(),
            source,
        }
    }

    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
