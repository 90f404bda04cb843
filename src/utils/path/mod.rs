//! Path utilities.
//!
//! - [`fs`]: watch-key normalization (`normalize_path`, `parent_dir`)

pub mod fs;

pub use fs::{normalize_path, parent_dir};
