//! X-API-KEY header check for all non-health routes.

use crate::api::error::ApiError;
use crate::api::state::AppState;
use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;

pub async fn require_api_key(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let provided = req
        .headers()
        .get("x-api-key")
        .and_then(|v| v.to_str().ok());

    if provided != Some(state.config.api_key.as_str()) {
        return Err(ApiError::Unauthorized);
    }

    Ok(next.run(req).await)
}
