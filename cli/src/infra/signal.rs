//! SIGINT / SIGTERM → cancellation token.

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;

/// Cancel `token` on the first SIGINT or SIGTERM.
///
/// The listener task ends once the token is cancelled from anywhere.
///
/// # Errors
///
/// Returns an error if the signal handlers cannot be installed.
pub fn cancel_on_signal(token: &CancellationToken) -> Result<()> {
    #[cfg(unix)]
    let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
        .context("installing SIGTERM handler")?;

    let token = token.clone();
    tokio::spawn(async move {
        #[cfg(unix)]
        let terminate = async {
            sigterm.recv().await;
        };
        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                if result.is_ok() {
                    tracing::debug!("SIGINT received; cancelling run");
                    token.cancel();
                }
            }
            () = terminate => {
                tracing::debug!("SIGTERM received; cancelling run");
                token.cancel();
            }
            () = token.cancelled() => {}
        }
    });
    Ok(())
}
