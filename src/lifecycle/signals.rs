//! OS signal handling.
//!
//! SIGINT (Ctrl+C) and, on Unix, SIGTERM trigger a graceful shutdown.
//! A second signal while draining exits immediately.

use crate::lifecycle::shutdown::Shutdown;

async fn next_signal() -> &'static str {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => "SIGINT",
        _ = terminate => "SIGTERM",
    }
}

/// Spawn the signal listener.
pub fn spawn_signal_handler(shutdown: Shutdown) {
    tokio::spawn(async move {
        let signal = next_signal().await;
        tracing::info!(signal, "Shutdown signal received, draining");
        shutdown.trigger();

        let signal = next_signal().await;
        tracing::warn!(signal, "Second signal received, exiting immediately");
        std::process::exit(130);
    });
}
