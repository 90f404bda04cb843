//! tailwatch - follow files and report how they change.

mod cli;

use anyhow::Result;
use clap::{ColorChoice, Parser};
use cli::Cli;
use tailwatch::config::Config;
use tailwatch::watch::{AnyWatcher, Engine, Tracker, WatchMode};
use tailwatch::{debug, log};
use tokio_util::sync::CancellationToken;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set global color override based on CLI option
    match cli.color {
        ColorChoice::Always => owo_colors::set_override(true),
        ColorChoice::Never => owo_colors::set_override(false),
        ColorChoice::Auto => {} // owo-colors auto-detects TTY
    }

    let config = Config::load(cli.config.as_deref(), &cli.overrides())?;
    if let Some(path) = &config.config_path {
        debug!("config"; "loaded {}", path.display());
    }

    // Setup global Ctrl+C handler (before any blocking operations)
    let cancel = CancellationToken::new();
    cli::setup_shutdown_handler(cancel.clone())?;

    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()?;

    rt.block_on(run(&cli, &config, cancel))
}

/// Follow every path until Ctrl+C.
async fn run(cli: &Cli, config: &Config, cancel: CancellationToken) -> Result<()> {
    let tracker = match config.watch.mode {
        WatchMode::Notify => Some(Tracker::start()?),
        WatchMode::Poll => None,
    };

    let engine = match &tracker {
        Some(tracker) => Engine::Notify(tracker),
        None => Engine::Poll(config.watch.poll_interval()),
    };

    let mut followers = Vec::with_capacity(cli.paths.len());
    for path in &cli.paths {
        let watcher = AnyWatcher::new(path, engine);
        debug!("watch"; "{:?} engine for {}", watcher.mode(), watcher.path().display());
        followers.push(tokio::spawn(cli::follow::follow(watcher, cancel.clone())));
    }

    let mut failed = false;
    for follower in followers {
        match follower.await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                log!("error"; "{:#}", err);
                failed = true;
            }
            Err(err) => {
                log!("error"; "follower panicked: {}", err);
                failed = true;
            }
        }
    }

    if let Some(tracker) = tracker {
        tracker.shutdown().await;
    }

    if failed {
        anyhow::bail!("some files could not be followed");
    }
    Ok(())
}
