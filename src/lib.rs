//! tailwatch - file change notifications for log tailers.
//!
//! Tells a tailer when a followed file grows, shrinks, or goes away, through
//! either OS push notifications ([`watch::InotifyFileWatcher`] over a shared
//! [`watch::Tracker`]) or periodic polling ([`watch::PollingFileWatcher`]).

pub mod config;
pub mod logger;
pub mod utils;
pub mod watch;
