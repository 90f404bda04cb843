//! Tracker message definitions.
//!
//! ```text
//! Tracker handle --TrackerMsg--> coordinating task --RawEvent--> Subscription
//!                <--oneshot reply--
//! ```

use std::path::PathBuf;

use notify::EventKind;
use tokio::sync::oneshot;

use super::Subscription;
use super::table::SubscriberId;
use crate::watch::error::Result;

pub(super) type Reply<T> = oneshot::Sender<Result<T>>;

/// Structural requests, serialized through the coordinating task.
#[derive(Debug)]
pub(super) enum TrackerMsg {
    /// Register a subscriber, adding the OS watch for its first one
    Add {
        path: PathBuf,
        reply: Reply<Subscription>,
    },
    /// Phase two of removal; the caller has already fired the close signal
    Remove {
        path: PathBuf,
        id: SubscriberId,
        reply: Reply<()>,
    },
    /// Drop every subscriber of a path and its OS watch
    Cleanup { path: PathBuf, reply: Reply<()> },
    /// Tear everything down and stop the task
    Shutdown { reply: oneshot::Sender<()> },
}

/// One OS event, split per path, as delivered to subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEvent {
    /// Normalized path the event names
    pub path: PathBuf,
    pub kind: EventKind,
}

impl RawEvent {
    /// Split a notify event into one `RawEvent` per path it names.
    pub(super) fn split(event: notify::Event) -> impl Iterator<Item = Self> {
        let kind = event.kind;
        event.paths.into_iter().map(move |path| Self {
            path: crate::utils::path::normalize_path(&path),
            kind,
        })
    }
}
