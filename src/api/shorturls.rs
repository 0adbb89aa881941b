use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Redirect},
};
use rand::Rng;
use rand::distr::Alphanumeric;
use serde::Deserialize;
use std::sync::Arc;

use super::accounts::require_roles;
use super::auth::Principal;
use super::{ApiError, ApiResponse, AppState, MessageDto, ShortUrlDto, validation};
use crate::models::Role;

#[derive(Deserialize)]
pub struct CreateShortUrlRequest {
    pub full_url: String,
    pub short_code: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateShortUrlRequest {
    pub full_url: Option<String>,
    pub short_code: Option<String>,
}

fn generate_short_code() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(7)
        .map(char::from)
        .collect()
}

/// POST /api/shorturls
pub async fn create_short_url(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Json(payload): Json<CreateShortUrlRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let full_url = validation::validate_url(&payload.full_url)?.to_string();

    let short_code = match payload.short_code {
        Some(code) => validation::validate_short_code(&code)?.to_string(),
        None => generate_short_code(),
    };

    if state
        .store()
        .short_urls()
        .get_by_code(&short_code)
        .await?
        .is_some()
    {
        return Err(ApiError::Conflict("Short code already exists".to_string()));
    }

    if let Some(existing) = state
        .store()
        .short_urls()
        .get_by_full_url(&full_url)
        .await?
    {
        return Err(ApiError::Conflict(format!(
            "Full URL already shortened as '{}'",
            existing.short_code
        )));
    }

    let created = state
        .store()
        .short_urls()
        .create(&full_url, &short_code, principal.account.id)
        .await
        .map_err(|e| {
            if crate::db::is_unique_violation(&e) {
                ApiError::Conflict("Short code or URL already exists".to_string())
            } else {
                ApiError::from(e)
            }
        })?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(ShortUrlDto::from(created))),
    ))
}

/// GET /s/{code} - public redirect, counts the click.
pub async fn follow_short_url(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
) -> Result<Redirect, ApiError> {
    let record = state
        .store()
        .short_urls()
        .get_by_code(&code)
        .await?
        .ok_or_else(|| ApiError::NotFound("Short URL not found".to_string()))?;

    state.store().short_urls().increment_clicks(record.id).await?;

    Ok(Redirect::temporary(&record.full_url))
}

/// GET /api/shorturls/mine
pub async fn list_my_short_urls(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<ApiResponse<Vec<ShortUrlDto>>>, ApiError> {
    let records = state
        .store()
        .short_urls()
        .list_by_creator(principal.account.id)
        .await?;

    let dtos: Vec<ShortUrlDto> = records.into_iter().map(ShortUrlDto::from).collect();
    Ok(Json(ApiResponse::success(dtos)))
}

/// GET /api/shorturls (url-admin or super-admin)
pub async fn list_all_short_urls(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<ApiResponse<Vec<ShortUrlDto>>>, ApiError> {
    require_roles(&principal, &[Role::UrlAdmin, Role::SuperAdmin])?;

    let records = state.store().short_urls().list_all().await?;
    let dtos: Vec<ShortUrlDto> = records.into_iter().map(ShortUrlDto::from).collect();
    Ok(Json(ApiResponse::success(dtos)))
}

/// PATCH /api/shorturls/{id} (owner, url-admin, or super-admin)
pub async fn update_short_url(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<i32>,
    Json(payload): Json<UpdateShortUrlRequest>,
) -> Result<Json<ApiResponse<ShortUrlDto>>, ApiError> {
    let record = state
        .store()
        .short_urls()
        .get_by_id(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Short URL", id))?;

    authorize_owner_or_admin(&principal, record.created_by)?;

    let full_url = payload
        .full_url
        .map(|url| validation::validate_url(&url).map(ToString::to_string))
        .transpose()?;
    let short_code = payload
        .short_code
        .map(|code| validation::validate_short_code(&code).map(ToString::to_string))
        .transpose()?;

    let updated = state
        .store()
        .short_urls()
        .update(id, full_url, short_code)
        .await
        .map_err(|e| {
            if crate::db::is_unique_violation(&e) {
                ApiError::Conflict("Short code or URL already exists".to_string())
            } else {
                ApiError::from(e)
            }
        })?
        .ok_or_else(|| ApiError::not_found("Short URL", id))?;

    Ok(Json(ApiResponse::success(ShortUrlDto::from(updated))))
}

/// DELETE /api/shorturls/{id} (owner, url-admin, or super-admin)
pub async fn delete_short_url(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<MessageDto>>, ApiError> {
    let record = state
        .store()
        .short_urls()
        .get_by_id(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Short URL", id))?;

    authorize_owner_or_admin(&principal, record.created_by)?;

    state.store().short_urls().delete(id).await?;

    Ok(Json(ApiResponse::success(MessageDto {
        message: "Short URL deleted successfully".to_string(),
    })))
}

fn authorize_owner_or_admin(principal: &Principal, owner_id: i32) -> Result<(), ApiError> {
    if principal.account.id == owner_id
        || principal
            .account
            .roles
            .intersects(&[Role::UrlAdmin, Role::SuperAdmin])
    {
        Ok(())
    } else {
        Err(ApiError::forbidden(
            "You are not allowed to modify this short URL",
        ))
    }
}
