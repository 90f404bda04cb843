//! Configuration section definitions.

mod watch;

pub use watch::WatchSectionConfig;
