use std::net::SocketAddr;
use std::path::PathBuf;

use axum::handler::HandlerWithoutStateExt;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::{Json, Router};
use tower_http::services::ServeDir;

/// Serve the dashboard's static assets from `root`.
///
/// Every request path maps to a file under the root; missing paths get a
/// JSON not-found body. The asset server shares nothing with the relay
/// beyond living in the same process.
pub async fn serve(addr: SocketAddr, root: PathBuf) -> anyhow::Result<()> {
    let files = ServeDir::new(&root).not_found_service(not_found.into_service());
    let app = Router::new().fallback_service(files);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(
        addr = %listener.local_addr()?,
        root = %root.display(),
        "asset server listening"
    );

    axum::serve(listener, app).await?;
    Ok(())
}

async fn not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({ "error": "File not found" })),
    )
}
