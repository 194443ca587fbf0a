use anyhow::Result;
use axum::Router;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use crate::shutdown::Shutdown;

/// Serve `router` on `host:port` until `shutdown` fires. `host` may be a
/// hostname or an IPv4/IPv6 literal.
pub async fn serve(router: Router, host: &str, port: u16, shutdown: Shutdown) -> Result<()> {
    let app = router.layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive()),
    );

    let listener = tokio::net::TcpListener::bind((host, port)).await?;
    let addr = listener.local_addr()?;
    info!("Starting server on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.wait().await })
        .await?;

    info!("Server on {} stopped", addr);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn binds_a_hostname_and_stops_on_shutdown() {
        let shutdown = Shutdown::new();
        let server = tokio::spawn(serve(Router::new(), "localhost", 0, shutdown.clone()));

        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown.trigger();

        tokio::time::timeout(Duration::from_secs(2), server)
            .await
            .expect("server should stop")
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn binds_an_ipv4_literal() {
        let shutdown = Shutdown::new();
        shutdown.trigger();
        serve(Router::new(), "127.0.0.1", 0, shutdown).await.unwrap();
    }
}
