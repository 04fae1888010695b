//! HTTP server entry point.
//!
//! # Responsibilities
//! - Serve a router on a bound listener
//! - Stop accepting on the shutdown signal and drain in-flight requests
//! - Log start up and shut down under their lifecycle contexts

use std::future::Future;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;

use crate::context;
use crate::log::{Client as LogClient, Field};

/// Serve `router` until `shutdown` resolves.
pub async fn serve<F>(
    listener: TcpListener,
    router: Router,
    log: Arc<dyn LogClient>,
    shutdown: F,
) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = listener.local_addr()?;
    log.info(
        &context::start_up(),
        "HTTP server starting",
        &[Field::string("address", &addr.to_string())],
    );

    let shutdown_log = Arc::clone(&log);
    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            shutdown.await;
            shutdown_log.info(&context::shut_down(), "Shutdown signal received", &[]);
        })
        .await?;

    log.info(&context::shut_down(), "HTTP server stopped", &[]);
    Ok(())
}

/// Resolve on Ctrl+C, or SIGTERM on Unix.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::mock::RecordingClient;
    use axum::routing::get;
    use tokio::sync::oneshot;

    #[tokio::test]
    async fn test_serve_and_shutdown() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let log = Arc::new(RecordingClient::new());
        let router = Router::new().route("/", get(|| async { "hello" }));
        let (tx, rx) = oneshot::channel::<()>();

        let server = tokio::spawn(serve(listener, router, log.clone(), async {
            let _ = rx.await;
        }));

        let body = reqwest::get(format!("http://{addr}/"))
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        assert_eq!(body, "hello");

        tx.send(()).unwrap();
        server.await.unwrap().unwrap();

        assert_eq!(
            log.messages(),
            vec![
                "HTTP server starting",
                "Shutdown signal received",
                "HTTP server stopped"
            ]
        );
        assert_eq!(log.find("HTTP server starting").unwrap().correlation_id, "START_UP");
        assert_eq!(log.find("HTTP server stopped").unwrap().correlation_id, "SHUT_DOWN");
    }
}
