//! Signal handling for graceful cancellation.

use metaindex_indexer::CancelFlag;
use tokio::task::JoinHandle;

/// Set `cancel` on the first Ctrl+C or SIGTERM. The build notices at its
/// next candidate and still writes its artifacts.
pub fn cancel_on_signal(cancel: CancelFlag) -> JoinHandle<()> {
    tokio::spawn(async move {
        wait_for_signal().await;
        cancel.cancel();
    })
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn wait_for_signal() {
    tokio::select! {
        _ = wait_for_ctrl_c() => {
            tracing::info!("Received SIGINT, stopping build");
        }
        _ = wait_for_sigterm() => {
            tracing::info!("Received SIGTERM, stopping build");
        }
    }
}

async fn wait_for_ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
}

/// Wait for SIGTERM signal
#[cfg(unix)]
async fn wait_for_sigterm() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            sigterm.recv().await;
        }
        Err(e) => {
            tracing::warn!("Failed to register SIGTERM handler: {}", e);
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_sigterm() {
    // On non-Unix platforms, just wait forever
    std::future::pending::<()>().await;
}
