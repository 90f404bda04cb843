//! Command-line interface definitions.

use clap::{ColorChoice, Parser};
use std::path::PathBuf;

use tailwatch::config::Overrides;
use tailwatch::watch::WatchMode;

/// Follow files and report how they change
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None, arg_required_else_help = true)]
pub struct Cli {
    /// Files to follow (need not exist yet)
    #[arg(value_name = "PATH", required = true, value_hint = clap::ValueHint::FilePath)]
    pub paths: Vec<PathBuf>,

    /// Control colored output (auto, always, never)
    #[arg(long, default_value = "auto")]
    pub color: ColorChoice,

    /// Config file path (default: tailwatch.toml, searched upward)
    #[arg(short = 'C', long, value_hint = clap::ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    /// Poll with `stat` instead of using OS notifications
    #[arg(short, long)]
    pub poll: bool,

    /// Poll interval in milliseconds
    #[arg(short, long, value_name = "MS")]
    pub interval: Option<u64>,

    /// Enable verbose output for debugging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// Values that override the config file. Unset flags leave it alone.
    pub fn overrides(&self) -> Overrides {
        Overrides {
            mode: self.poll.then_some(WatchMode::Poll),
            poll_interval_ms: self.interval,
            verbose: self.verbose.then_some(true),
        }
    }
}
