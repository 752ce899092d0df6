/// HTTP Server Module
///
/// Liveness endpoints for the hosting platform. Independent of the posting
/// loop; both `/` and `/health` answer with the same fixed payload.

use anyhow::{Context, Result};
use axum::{response::Json, routing::get, Router};

pub const SERVICE_NAME: &str = "ai_post_bot";

/// Create and configure the HTTP server router
pub fn create_router() -> Router {
    Router::new()
        .route("/", get(health_check))
        .route("/health", get(health_check))
}

/// Health check endpoint
async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "service": SERVICE_NAME,
    }))
}

/// Start the HTTP server
pub async fn start_server(port: u16) -> Result<()> {
    let app = create_router();

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port))
        .await
        .context("Failed to bind HTTP server")?;

    log::info!("HTTP server listening on port {}", port);

    axum::serve(listener, app)
        .await
        .context("HTTP server error")?;

    Ok(())
}
