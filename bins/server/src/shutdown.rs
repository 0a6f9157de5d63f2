//! Waits for SIGINT/SIGTERM and fans the signal out to in-flight handlers.

use std::sync::Arc;

use tokio::sync::Notify;

/// Resolves once on the first SIGINT or SIGTERM. Callers pass the same
/// `notify` into [`axum::serve::WithGracefulShutdown`] and into every
/// handler's [`tokio::select!`] race, so new connections stop being
/// accepted and in-flight renders are cancelled at the same moment.
pub async fn wait_for_shutdown_signal(notify: Arc<Notify>) {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            },
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    notify.notify_waiters();
}
