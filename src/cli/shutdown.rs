//! Ctrl+C handling.

use tokio_util::sync::CancellationToken;

/// Setup the global Ctrl+C handler. Call once at program start.
///
/// The first Ctrl+C cancels `token` so every follower releases its watch and
/// returns. A second one exits immediately.
pub fn setup_shutdown_handler(token: CancellationToken) -> anyhow::Result<()> {
    ctrlc::set_handler(move || {
        if token.is_cancelled() {
            std::process::exit(130);
        }
        tailwatch::log!("watch"; "shutting down...");
        token.cancel();
    })
    .map_err(|e| anyhow::anyhow!("failed to set Ctrl+C handler: {}", e))
}
