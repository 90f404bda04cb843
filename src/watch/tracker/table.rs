//! Subscriber table.
//!
//! One ordered list of entries per path. Each entry carries its subscriber's
//! event sender, its close signal and its lifecycle state, so there is
//! nothing to keep positionally aligned.
//!
//! Lifecycle:
//! ```text
//! Active --begin_close (caller side)--> Closing --remove (coordinator)--> gone
//! ```

use std::path::{Path, PathBuf};

use rustc_hash::FxHashMap;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::messages::RawEvent;

/// Identifies one subscription within a tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

impl SubscriberId {
    pub(super) const fn new(raw: u64) -> Self {
        Self(raw)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum EntryState {
    /// Receiving broadcasts
    Active,
    /// Close signal fired, structural removal pending
    Closing,
}

#[derive(Debug)]
pub(super) struct Entry {
    id: SubscriberId,
    events: mpsc::Sender<RawEvent>,
    close: CancellationToken,
    state: EntryState,
}

impl Entry {
    pub(super) fn new(id: SubscriberId, events: mpsc::Sender<RawEvent>) -> Self {
        Self {
            id,
            events,
            close: CancellationToken::new(),
            state: EntryState::Active,
        }
    }

    fn close(&mut self) {
        self.state = EntryState::Closing;
        self.close.cancel();
    }
}

/// Delivery target captured for one broadcast.
pub(super) struct Target {
    pub(super) events: mpsc::Sender<RawEvent>,
    pub(super) close: CancellationToken,
}

/// Path -> subscribers. Only the coordinating task adds or removes entries;
/// callers may flip an entry to `Closing`.
#[derive(Debug, Default)]
pub(super) struct SubscriberTable {
    paths: FxHashMap<PathBuf, Vec<Entry>>,
}

impl SubscriberTable {
    /// Whether the path holds an OS watch (has at least one entry).
    pub(super) fn is_watched(&self, path: &Path) -> bool {
        self.paths.contains_key(path)
    }

    /// Reference count for a path.
    pub(super) fn len(&self, path: &Path) -> usize {
        self.paths.get(path).map_or(0, Vec::len)
    }

    pub(super) fn paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<_> = self.paths.keys().cloned().collect();
        paths.sort();
        paths
    }

    /// Append an entry, returning the new reference count.
    pub(super) fn push(&mut self, path: PathBuf, entry: Entry) -> usize {
        let entries = self.paths.entry(path).or_default();
        entries.push(entry);
        entries.len()
    }

    /// Removal phase one: mark the subscriber `Closing` and fire its close
    /// signal so any in-flight broadcast to it aborts.
    ///
    /// Returns `false` if the subscriber is unknown or already closing.
    pub(super) fn begin_close(&mut self, path: &Path, id: SubscriberId) -> bool {
        let Some(entry) = self
            .paths
            .get_mut(path)
            .and_then(|entries| entries.iter_mut().find(|e| e.id == id))
        else {
            return false;
        };
        if entry.state != EntryState::Active {
            return false;
        }
        entry.close();
        true
    }

    /// Phase one on behalf of a dropped subscription: close the entry if it
    /// is still active.
    ///
    /// Returns `true` while the entry exists in either state, meaning the
    /// coordinator still has to remove it.
    pub(super) fn release(&mut self, path: &Path, id: SubscriberId) -> bool {
        let Some(entry) = self
            .paths
            .get_mut(path)
            .and_then(|entries| entries.iter_mut().find(|e| e.id == id))
        else {
            return false;
        };
        if entry.state == EntryState::Active {
            entry.close();
        }
        true
    }

    /// Removal phase two: drop the entry, closing its channel.
    ///
    /// Returns the remaining reference count, or `None` if not found. The
    /// path key is dropped along with its last entry.
    pub(super) fn remove(&mut self, path: &Path, id: SubscriberId) -> Option<usize> {
        let entries = self.paths.get_mut(path)?;
        let index = entries.iter().position(|e| e.id == id)?;
        entries.remove(index);

        let remaining = entries.len();
        if remaining == 0 {
            self.paths.remove(path);
        }
        Some(remaining)
    }

    /// Fire the close signal of every subscriber of a path.
    pub(super) fn close_all(&mut self, path: &Path) {
        if let Some(entries) = self.paths.get_mut(path) {
            entries.iter_mut().for_each(Entry::close);
        }
    }

    /// Take every entry of a path out of the table.
    pub(super) fn drain(&mut self, path: &Path) -> Option<Vec<Entry>> {
        self.paths.remove(path)
    }

    /// Active subscribers of `name` followed by those of `parent`.
    pub(super) fn targets(&self, name: &Path, parent: Option<&Path>) -> Vec<Target> {
        let own = self.paths.get(name).into_iter().flatten();
        let inherited = parent
            .filter(|p| *p != name)
            .and_then(|p| self.paths.get(p))
            .into_iter()
            .flatten();

        own.chain(inherited)
            .filter(|e| e.state == EntryState::Active)
            .map(|e| Target {
                events: e.events.clone(),
                close: e.close.clone(),
            })
            .collect()
    }
}
