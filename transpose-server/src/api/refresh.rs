//! Provider credential refresh endpoint

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::post,
    Router,
};

use transpose_common::model::ProviderId;

use crate::error::{ApiError, ApiResult};
use crate::AppState;

pub fn refresh_routes() -> Router<AppState> {
    Router::new().route("/refresh/:provider", post(refresh_provider))
}

/// POST /refresh/:provider
///
/// Issue a fresh credential for the named provider and store it in the
/// adapter's in-memory slot. Scheduling is the caller's concern.
async fn refresh_provider(
    State(state): State<AppState>,
    Path(provider): Path<String>,
) -> ApiResult<StatusCode> {
    let provider: ProviderId = provider
        .parse()
        .map_err(|_| ApiError::BadRequest(format!("Unknown provider: {}", provider)))?;

    let adapter = state
        .registry
        .get(provider)
        .ok_or_else(|| ApiError::Internal(format!("Provider {} is not configured", provider)))?;

    adapter.refresh_token().await?;
    Ok(StatusCode::OK)
}
