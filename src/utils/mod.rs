//! Utility modules shared by the watch engines.

pub mod path;
pub mod platform;
