//! Follow loop for one file.
//!
//! ```text
//! block_until_exists -> change_events -> report changes
//!        ^                                   |
//!        └────────────── deleted ────────────┘
//! ```
//!
//! Reading the file's content is left to the caller; this loop only reports
//! what happened and the size the engine last saw.

use std::io;

use anyhow::Result;
use tailwatch::log;
use tailwatch::watch::{AnyWatcher, Change, FileWatcher, WatchError};
use tokio_util::sync::CancellationToken;

/// Follow one file until `cancel` fires, waiting for it to come back each
/// time it is deleted.
pub async fn follow(watcher: AnyWatcher, cancel: CancellationToken) -> Result<()> {
    let path = watcher.path().to_path_buf();

    loop {
        match watcher.block_until_exists(&cancel).await {
            Ok(()) => {}
            Err(err) if err.is_cancelled() => return Ok(()),
            Err(err) => return Err(err.into()),
        }

        let start = match tokio::fs::metadata(&path).await {
            Ok(meta) => meta.len(),
            Err(err) if err.kind() == io::ErrorKind::NotFound => continue,
            Err(err) => return Err(WatchError::Stat { path, source: err }.into()),
        };

        let mut changes = match watcher.change_events(&cancel, start).await {
            Ok(changes) => changes,
            // Gone again between the two stats
            Err(err) if vanished(&err) => continue,
            Err(err) => return Err(err.into()),
        };
        log!("watch"; "following {} ({} bytes)", path.display(), start);

        loop {
            match changes.recv().await? {
                Some(Change::Modified) => {
                    log!("watch"; "modified {} ({} bytes)", path.display(), watcher.size());
                }
                Some(Change::Truncated) => {
                    log!("watch"; "truncated {} ({} bytes)", path.display(), watcher.size());
                }
                Some(Change::Deleted) => {
                    log!("watch"; "deleted {}, waiting for it to reappear", path.display());
                    break;
                }
                // Cancelled, or the tracker went away
                None => return Ok(()),
            }
        }
    }
}

fn vanished(err: &WatchError) -> bool {
    matches!(err, WatchError::Stat { source, .. } if source.kind() == io::ErrorKind::NotFound)
}
