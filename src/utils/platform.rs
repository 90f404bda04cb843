//! Platform policy for interpreting `stat` results.
//!
//! Platform differences in how a deleted or replaced file shows up are kept
//! here, behind plain functions and a small identity type, so the engines
//! never branch on the target OS themselves.

use std::fs::Metadata;
use std::io;

/// Decides whether a `stat` error means the watched file is gone.
pub type DeletionPredicate = fn(&io::Error) -> bool;

/// Default [`DeletionPredicate`].
///
/// Not-found always means deleted. On Windows a file deleted while a handle
/// is still open (the tailer keeps one) reports access denied until every
/// handle is released, so permission errors count as deletion there too.
pub fn stat_means_deleted(err: &io::Error) -> bool {
    match err.kind() {
        io::ErrorKind::NotFound => true,
        io::ErrorKind::PermissionDenied => cfg!(windows),
        _ => false,
    }
}

/// Identity of a file on disk, independent of its path.
///
/// Two snapshots with different identities mean the path now points at a
/// different file (renamed or replaced in place).
#[cfg(unix)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileIdentity {
    dev: u64,
    ino: u64,
}

#[cfg(unix)]
impl FileIdentity {
    pub fn of(meta: &Metadata) -> Self {
        use std::os::unix::fs::MetadataExt;

        Self {
            dev: meta.dev(),
            ino: meta.ino(),
        }
    }
}

/// Identity of a file on disk, independent of its path.
///
/// Volume serial and file index are not available from stable std here, so
/// the creation time stands in for them.
#[cfg(not(unix))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileIdentity {
    created: Option<std::time::SystemTime>,
}

#[cfg(not(unix))]
impl FileIdentity {
    pub fn of(meta: &Metadata) -> Self {
        Self {
            created: meta.created().ok(),
        }
    }
}
