//! Direct link conversion endpoint

use axum::{extract::State, routing::post, Json, Router};
use serde::Deserialize;

use transpose_common::model::ProviderId;

use crate::error::{ApiError, ApiResult};
use crate::transposer::ConvertOutcome;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ConvertRequest {
    pub link: String,
    #[serde(rename = "destProviderID")]
    pub dest_provider_id: String,
}

pub fn convert_routes() -> Router<AppState> {
    Router::new().route("/convert", post(convert))
}

/// POST /convert
///
/// Convert a pasted share link to one destination provider. Playlists come
/// back as an ordered per-track array, everything else as a single link.
async fn convert(
    State(state): State<AppState>,
    Json(request): Json<ConvertRequest>,
) -> ApiResult<Json<ConvertOutcome>> {
    let link = request.link.trim();
    if link.is_empty() {
        return Err(ApiError::BadRequest("link must not be empty".to_string()));
    }

    let destination: ProviderId = request.dest_provider_id.parse().map_err(|_| {
        ApiError::BadRequest(format!("Unknown provider: {}", request.dest_provider_id))
    })?;

    let outcome = state.transposer.convert_link(link, destination).await?;
    Ok(Json(outcome))
}
