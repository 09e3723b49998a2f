//! API layer -- axum routes, handlers, and middleware.

pub mod auth;
pub mod error;
mod routes;
pub mod state;

use self::state::AppState;
use axum::routing::get;
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Build the application router. Everything under `/api/v1` except
/// `/health` requires the X-API-KEY header.
pub fn router(state: AppState) -> Router {
    let public = Router::new().route("/health", get(routes::health));
    let protected = routes::api_routes().layer(axum::middleware::from_fn_with_state(
        state.clone(),
        auth::require_api_key,
    ));

    Router::new()
        .nest("/api/v1", public.merge(protected))
        .fallback(fallback)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

async fn fallback() -> (axum::http::StatusCode, &'static str) {
    (axum::http::StatusCode::NOT_FOUND, "not found")
}
