//! Transpose link generation and resolution endpoints

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};

use transpose_common::model::{ElementType, ProviderId, TransposeContent};

use crate::error::{ApiError, ApiResult};
use crate::AppState;

pub fn transpose_routes() -> Router<AppState> {
    Router::new()
        .route("/transpose/:provider/:type/:id", get(transpose_link))
        .route("/t/:id", get(resolve_transpose))
}

/// GET /transpose/:provider/:type/:id
///
/// Transpose the source element to every other provider and mint a durable
/// short link for the result. Repeat requests for the same source element
/// are served from the record store without any provider calls.
async fn transpose_link(
    State(state): State<AppState>,
    Path((provider, element_type, id)): Path<(String, String, String)>,
) -> ApiResult<Json<TransposeContent>> {
    let provider: ProviderId = provider
        .parse()
        .map_err(|_| ApiError::BadRequest(format!("Unknown provider: {}", provider)))?;
    let element_type: ElementType = element_type
        .parse()
        .map_err(|_| ApiError::BadRequest(format!("Unknown element type: {}", element_type)))?;

    // Playlists convert track-by-track toward one destination provider.
    if element_type == ElementType::Playlist {
        return Err(ApiError::BadRequest(
            "Playlists are converted through POST /convert".to_string(),
        ));
    }

    let record = state
        .transposer
        .transpose_by_link(provider, element_type, &id)
        .await?;

    Ok(Json(record.content))
}

/// GET /t/:id
///
/// Resolve a previously minted transpose link. Pure lookup; never calls a
/// provider.
async fn resolve_transpose(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<TransposeContent>> {
    let record = state.transposer.resolve_transpose_id(&id).await?;
    Ok(Json(record.content))
}
