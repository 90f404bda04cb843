//! Command-line interface module.

mod args;
pub mod follow;
mod shutdown;

pub use args::Cli;
pub use shutdown::setup_shutdown_handler;
