/// HTTP facade over the content client.
///
/// Exposes upload, retrieve, validate, URL building, HEAD lookups and usage
/// stats to UI and backend callers. The server holds no state of its own
/// beyond the shared client.
pub mod routes;

use std::sync::Arc;

use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::http::Method;
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::client::ContentClient;
use crate::error::Result;

/// Shared application state available to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub client: Arc<ContentClient>,
}

/// Browser callers upload raw bodies and read the download file name from
/// `Content-Disposition`, which CORS hides unless exposed.
fn cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::HEAD])
        .allow_headers([CONTENT_TYPE])
        .expose_headers([CONTENT_DISPOSITION])
}

/// Build the router with all routes and middleware.
pub fn build_app(state: AppState) -> Router {
    Router::new()
        .merge(routes::health_routes())
        .merge(routes::content_routes())
        .merge(routes::stats_routes())
        .with_state(Arc::new(state))
        .layer(cors())
        .layer(TraceLayer::new_for_http())
}

/// Bind `addr` and serve until the listener fails.
pub async fn serve(state: AppState, addr: &str) -> Result<()> {
    let registry = state.client.registry();
    info!(
        %addr,
        read_gateways = registry.ordered_read_gateways().len(),
        write_gateway = %registry.write_gateway(),
        "Serving content API"
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, build_app(state)).await?;
    Ok(())
}
