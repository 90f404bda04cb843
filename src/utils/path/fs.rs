//! Path normalization for watch keys.
//!
//! The tracker keys its subscriber table by path and compares event paths
//! against those keys, so both sides must normalize the same way:
//! - absolute (joined with the current directory when relative)
//! - `.` and `..` resolved lexically
//!
//! Symlinks are deliberately not resolved. A file that does not exist yet has
//! nothing to canonicalize, and its creation event must still match the key.

use std::borrow::Cow;
use std::path::{Path, PathBuf};

use path_absolutize::Absolutize;

/// Normalize a path into a watch key.
///
/// Falls back to the path as given if the current directory is unavailable.
///
/// # Example
/// ```ignore
/// let key = normalize_path(Path::new("/var/log/./app/../app.log"));
/// assert_eq!(key, PathBuf::from("/var/log/app.log"));
/// ```
#[inline]
pub fn normalize_path(path: &Path) -> PathBuf {
    path.absolutize()
        .map_or_else(|_| path.to_path_buf(), Cow::into_owned)
}

/// Parent directory of a normalized path, `None` at the filesystem root.
#[inline]
pub fn parent_dir(path: &Path) -> Option<&Path> {
    path.parent().filter(|p| !p.as_os_str().is_empty())
}
