use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use std::sync::Arc;

use super::auth::Principal;
use super::{ApiError, ApiKeyDto, ApiResponse, AppState, MessageDto};

/// POST /api/apikeys
///
/// One key per account; the plaintext is returned only here and on
/// rotation.
pub async fn create_api_key(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
) -> Result<impl IntoResponse, ApiError> {
    let api_key = state
        .api_key_service()
        .create_key(principal.account.id)
        .await?;

    tracing::info!("API key created for account {}", principal.account.id);

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(ApiKeyDto { api_key })),
    ))
}

/// GET /api/apikeys/mine
pub async fn get_my_api_key(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<ApiResponse<ApiKeyDto>>, ApiError> {
    let api_key = state
        .api_key_service()
        .reveal_key(principal.account.id)
        .await?;

    Ok(Json(ApiResponse::success(ApiKeyDto { api_key })))
}

/// POST /api/apikeys/rotate
pub async fn rotate_api_key(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<ApiResponse<ApiKeyDto>>, ApiError> {
    let api_key = state
        .api_key_service()
        .rotate_key(principal.account.id)
        .await?;

    tracing::info!("API key rotated for account {}", principal.account.id);

    Ok(Json(ApiResponse::success(ApiKeyDto { api_key })))
}

/// DELETE /api/apikeys/mine
pub async fn delete_my_api_key(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<ApiResponse<MessageDto>>, ApiError> {
    state
        .api_key_service()
        .delete_key(principal.account.id)
        .await?;

    Ok(Json(ApiResponse::success(MessageDto {
        message: "API key deleted successfully".to_string(),
    })))
}
