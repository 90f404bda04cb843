//! Push-notification dispatcher.
//!
//! Owns exactly one OS watch per path and fans raw OS events out to every
//! current subscriber of that path (and of its parent directory, so a watch
//! on a file that does not exist yet sees it being created).
//!
//! Architecture:
//! ```text
//!                      ┌──────────── coordinating task ────────────┐
//! Tracker --TrackerMsg-┤ add / remove / cleanup    (only writer)    │
//!   │                  │ OS events -> broadcast -> Subscription rx  │
//!   │                  └──────────────────┬─────────────────────────┘
//!   └── phase-1 close ──> SubscriberTable <┘   (parking_lot::Mutex)
//! ```
//!
//! Removal is two-phase. The caller marks its entry `Closing` and fires the
//! entry's close signal under the table lock, then asks the task to drop the
//! entry. A broadcast blocked on that subscriber's full channel aborts on the
//! close signal instead of racing the teardown. OS deregistration can block
//! on kernel acknowledgment, so it only ever runs in the task, with the lock
//! released.
//!
//! Dropping a [`Subscription`] without [`Tracker::remove_watch`] runs the same
//! two phases, with phase two queued instead of awaited.

mod backend;
mod messages;
mod table;

#[cfg(test)]
pub(crate) mod testing;
#[cfg(test)]
mod tests;

use std::fmt;
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

pub use backend::{NotifyBackend, OsEvents, WatchBackend};
pub use messages::RawEvent;
pub use table::SubscriberId;

use messages::{Reply, TrackerMsg};
use table::{Entry, SubscriberTable};

use crate::utils::path::{normalize_path, parent_dir};
use crate::watch::error::{Result, WatchError};

const CHANNEL_BUFFER: usize = 32;

/// Per-subscriber event buffer. A subscriber that falls this far behind
/// stalls broadcasts until it reads or closes.
pub(crate) const SUBSCRIBER_BUFFER: usize = 16;

/// One logical watch request on a path.
///
/// Dropping it unsubscribes, so a cancelled future never leaks its watch.
pub struct Subscription {
    id: SubscriberId,
    path: PathBuf,
    events: mpsc::Receiver<RawEvent>,
    // Weak so outstanding subscriptions do not keep the task alive
    requests: mpsc::WeakSender<TrackerMsg>,
    table: Arc<Mutex<SubscriberTable>>,
}

impl Subscription {
    pub const fn id(&self) -> SubscriberId {
        self.id
    }

    /// Normalized path this subscription watches.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Next event for this path or a child of it.
    ///
    /// `None` once the subscription has been removed or cleaned up.
    pub async fn recv(&mut self) -> Option<RawEvent> {
        self.events.recv().await
    }

    pub fn try_recv(&mut self) -> Option<RawEvent> {
        self.events.try_recv().ok()
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        // No-op after remove_watch, cleanup or shutdown
        if !self.table.lock().release(&self.path, self.id) {
            return;
        }
        let Some(requests) = self.requests.upgrade() else {
            return;
        };

        // Nobody waits for the outcome
        let (reply, _) = oneshot::channel();
        let msg = TrackerMsg::Remove {
            path: self.path.clone(),
            id: self.id,
            reply,
        };
        match requests.try_send(msg) {
            Ok(()) | Err(TrySendError::Closed(_)) => {}
            Err(TrySendError::Full(msg)) => {
                if let Ok(runtime) = tokio::runtime::Handle::try_current() {
                    runtime.spawn(async move {
                        let _ = requests.send(msg).await;
                    });
                }
            }
        }
    }
}

/// Handle to a running dispatcher. Cheap to clone; the coordinating task
/// stops once every handle is dropped or [`Tracker::shutdown`] is called.
#[derive(Clone)]
pub struct Tracker {
    requests: mpsc::Sender<TrackerMsg>,
    table: Arc<Mutex<SubscriberTable>>,
    stopping: CancellationToken,
}

impl Tracker {
    /// Start a dispatcher over the platform's notification facility.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start() -> Result<Self> {
        let (backend, os_events) = NotifyBackend::new()?;
        Ok(Self::with_backend(backend, os_events))
    }

    /// Start a dispatcher over a custom backend and its event stream.
    pub fn with_backend<B: WatchBackend>(backend: B, os_events: OsEvents) -> Self {
        let (requests, requests_rx) = mpsc::channel(CHANNEL_BUFFER);
        let table = Arc::new(Mutex::new(SubscriberTable::default()));
        let stopping = CancellationToken::new();

        let coordinator = Coordinator {
            requests: requests_rx,
            handle: requests.downgrade(),
            os_events,
            backend,
            table: Arc::clone(&table),
            stopping: stopping.clone(),
            next_id: 0,
        };
        tokio::spawn(coordinator.run());

        Self {
            requests,
            table,
            stopping,
        }
    }

    /// Subscribe to a path, registering the OS watch for its first subscriber.
    pub async fn create_watch(&self, path: impl AsRef<Path>) -> Result<Subscription> {
        let path = normalize_path(path.as_ref());
        self.request(|reply| TrackerMsg::Add { path, reply }).await
    }

    /// Unsubscribe, deregistering the OS watch when the last subscriber leaves.
    pub async fn remove_watch(&self, subscription: &Subscription) -> Result<()> {
        let path = subscription.path.clone();
        let id = subscription.id;

        if !self.table.lock().begin_close(&path, id) {
            return Err(WatchError::SubscriberNotFound { path });
        }

        self.request(|reply| TrackerMsg::Remove { path, id, reply })
            .await
    }

    /// Forced teardown of every subscriber of a path, whatever the count.
    pub async fn cleanup(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = normalize_path(path.as_ref());
        self.table.lock().close_all(&path);
        self.request(|reply| TrackerMsg::Cleanup { path, reply })
            .await
    }

    /// Drop every subscription and OS watch, then stop the coordinating task.
    ///
    /// In-flight broadcasts are abandoned, so a subscriber that never reads
    /// cannot hold shutdown up.
    pub async fn shutdown(&self) {
        self.stopping.cancel();
        let (reply, done) = oneshot::channel();
        if self.requests.send(TrackerMsg::Shutdown { reply }).await.is_ok() {
            let _ = done.await;
        }
    }

    /// Number of subscribers of a path (its OS watch reference count).
    pub fn subscriber_count(&self, path: impl AsRef<Path>) -> usize {
        self.table.lock().len(&normalize_path(path.as_ref()))
    }

    /// Paths currently holding an OS watch, sorted.
    pub fn watched_paths(&self) -> Vec<PathBuf> {
        self.table.lock().paths()
    }

    async fn request<T>(&self, msg: impl FnOnce(Reply<T>) -> TrackerMsg) -> Result<T> {
        let (reply, response) = oneshot::channel();
        self.requests
            .send(msg(reply))
            .await
            .map_err(|_| WatchError::Closed)?;
        response.await.map_err(|_| WatchError::Closed)?
    }
}

/// The coordinating task. Sole owner of the backend and sole structural
/// writer of the subscriber table.
struct Coordinator<B> {
    requests: mpsc::Receiver<TrackerMsg>,
    /// Handed to each subscription for unsubscribing on drop
    handle: mpsc::WeakSender<TrackerMsg>,
    os_events: OsEvents,
    backend: B,
    table: Arc<Mutex<SubscriberTable>>,
    stopping: CancellationToken,
    next_id: u64,
}

impl<B: WatchBackend> Coordinator<B> {
    async fn run(mut self) {
        crate::debug!("tracker"; "start");

        loop {
            tokio::select! {
                msg = self.requests.recv() => match msg {
                    Some(msg) => {
                        if self.handle(msg).is_break() {
                            break;
                        }
                    }
                    // Every Tracker handle dropped
                    None => {
                        self.teardown();
                        break;
                    }
                },
                Some(result) = self.os_events.recv() => match result {
                    Ok(event) => self.broadcast(event).await,
                    Err(err) => report_backend_error(&err),
                },
            }
        }

        crate::debug!("tracker"; "stopped");
    }

    fn handle(&mut self, msg: TrackerMsg) -> ControlFlow<()> {
        match msg {
            TrackerMsg::Add { path, reply } => {
                let _ = reply.send(self.add(path));
            }
            TrackerMsg::Remove { path, id, reply } => {
                let _ = reply.send(self.remove(&path, id));
            }
            TrackerMsg::Cleanup { path, reply } => {
                let _ = reply.send(self.cleanup(&path));
            }
            TrackerMsg::Shutdown { reply } => {
                self.teardown();
                let _ = reply.send(());
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }

    fn add(&mut self, path: PathBuf) -> Result<Subscription> {
        // First subscriber: register before the entry exists, so a failed
        // registration leaves nothing behind
        if !self.table.lock().is_watched(&path) {
            self.backend.watch(&path)?;
            crate::debug!("tracker"; "watch {}", path.display());
        }

        let id = SubscriberId::new(self.next_id);
        self.next_id += 1;

        let (events_tx, events) = mpsc::channel(SUBSCRIBER_BUFFER);
        let count = self
            .table
            .lock()
            .push(path.clone(), Entry::new(id, events_tx));
        crate::debug!("tracker"; "subscribe {} ({} total)", path.display(), count);

        Ok(Subscription {
            id,
            path,
            events,
            requests: self.handle.clone(),
            table: Arc::clone(&self.table),
        })
    }

    fn remove(&mut self, path: &Path, id: SubscriberId) -> Result<()> {
        // Lock released before any deregistration
        let remaining = self.table.lock().remove(path, id);

        match remaining {
            None => Err(WatchError::SubscriberNotFound {
                path: path.to_path_buf(),
            }),
            Some(0) => {
                crate::debug!("tracker"; "unwatch {}", path.display());
                self.backend.unwatch(path)
            }
            Some(count) => {
                crate::debug!("tracker"; "unsubscribe {} ({} left)", path.display(), count);
                Ok(())
            }
        }
    }

    fn cleanup(&mut self, path: &Path) -> Result<()> {
        let drained = self.table.lock().drain(path);

        match drained {
            Some(entries) => {
                crate::debug!("tracker"; "cleanup {} ({} dropped)", path.display(), entries.len());
                drop(entries);
                self.backend.unwatch(path)
            }
            None => Ok(()),
        }
    }

    fn teardown(&mut self) {
        let paths = self.table.lock().paths();
        for path in paths {
            self.table.lock().close_all(&path);
            if let Err(err) = self.cleanup(&path) {
                crate::log!("tracker"; "{}", err);
            }
        }
    }

    /// Deliver an OS event to subscribers of each path it names and of that
    /// path's parent directory, in OS order.
    async fn broadcast(&mut self, event: notify::Event) {
        for raw in RawEvent::split(event) {
            let targets = self
                .table
                .lock()
                .targets(&raw.path, parent_dir(&raw.path));

            for target in targets {
                tokio::select! {
                    biased;
                    () = self.stopping.cancelled() => return,
                    // Subscriber is being removed: abort without error
                    () = target.close.cancelled() => {}
                    _ = target.events.send(raw.clone()) => {}
                }
            }
        }
    }
}

/// Errors on the OS facility's own stream never stop the dispatcher.
fn report_backend_error(err: &notify::Error) {
    if let notify::ErrorKind::Io(io) = &err.kind
        && io.kind() == std::io::ErrorKind::Interrupted
    {
        return;
    }
    crate::log!("tracker"; "notify error: {}", err);
}
