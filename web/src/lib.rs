//! HTTP presentation layer for the notification hub.
//!
//! Exposes the hub as a long-lived SSE endpoint plus a few JSON endpoints for
//! publishing and inspecting it. Message framing (`id:`, `event:`, `data:`)
//! is owned here, not by the hub.

use axum::http::HeaderValue;
use log::*;
use service::AppState;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, CorsLayer};

pub(crate) mod controller;
mod error;
pub(crate) mod params;
mod router;
pub(crate) mod sse;

pub use error::{Error, Result};
pub use router::define_routes;

/// Bind the configured interface and serve until the shutdown token fires.
pub async fn init_server(app_state: AppState) -> std::io::Result<()> {
    let listen_addr = format!(
        "{}:{}",
        app_state.config.interface(),
        app_state.config.port
    );
    let listener = TcpListener::bind(&listen_addr).await?;
    info!("Server starting... listening for connections on http://{listen_addr}");

    let cors = cors_layer(&app_state.config.allowed_origins);
    let shutdown = app_state.shutdown.clone();
    let router = define_routes(app_state).layer(cors);

    axum::serve(listener, router)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    info!("Server stopped");
    Ok(())
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Ignoring invalid CORS origin {origin}: {e}");
                None
            }
        })
        .collect();

    CorsLayer::new().allow_origin(AllowOrigin::list(origins))
}
