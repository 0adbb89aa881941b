use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use std::sync::Arc;

use super::auth::Principal;
use super::{ApiError, ApiResponse, AppState, MessageDto, PostDto, PostPageDto, validation};
use crate::models::Role;

const POSTS_PER_PAGE: u64 = 10;

#[derive(Deserialize)]
pub struct PostPayload {
    pub title: String,
    pub body: String,
}

#[derive(Deserialize)]
pub struct PageQuery {
    pub page: Option<u64>,
}

/// POST /api/posts
pub async fn create_post(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Json(payload): Json<PostPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let title = validation::validate_name(&payload.title, "Title")?;
    if payload.body.trim().is_empty() {
        return Err(ApiError::validation("Body is required"));
    }

    let created = state
        .store()
        .posts()
        .create(&title, &payload.body, principal.account.id)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(PostDto::from(created))),
    ))
}

/// GET /api/posts?page=N
pub async fn list_posts(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PageQuery>,
) -> Result<Json<ApiResponse<PostPageDto>>, ApiError> {
    let page = query.page.unwrap_or(1).max(1);

    let (models, total_pages) = state.store().posts().list_page(page, POSTS_PER_PAGE).await?;
    let posts: Vec<PostDto> = models.into_iter().map(PostDto::from).collect();

    Ok(Json(ApiResponse::success(PostPageDto { posts, total_pages })))
}

/// GET /api/posts/{id}
pub async fn get_post(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<PostDto>>, ApiError> {
    let post = state
        .store()
        .posts()
        .get(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Post", id))?;

    Ok(Json(ApiResponse::success(PostDto::from(post))))
}

/// PATCH /api/posts/{id} (owner only; marks the post edited)
pub async fn update_post(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<i32>,
    Json(payload): Json<PostPayload>,
) -> Result<Json<ApiResponse<PostDto>>, ApiError> {
    let title = validation::validate_name(&payload.title, "Title")?;

    let post = state
        .store()
        .posts()
        .get(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Post", id))?;

    if post.account_id != principal.account.id {
        return Err(ApiError::forbidden("You are not allowed to edit this post"));
    }

    let updated = state
        .store()
        .posts()
        .update(id, &title, &payload.body)
        .await?
        .ok_or_else(|| ApiError::not_found("Post", id))?;

    Ok(Json(ApiResponse::success(PostDto::from(updated))))
}

/// DELETE /api/posts/{id} (owner, post-admin, or super-admin)
pub async fn delete_post(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<MessageDto>>, ApiError> {
    let post = state
        .store()
        .posts()
        .get(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Post", id))?;

    let allowed = post.account_id == principal.account.id
        || principal
            .account
            .roles
            .intersects(&[Role::PostAdmin, Role::SuperAdmin]);
    if !allowed {
        return Err(ApiError::forbidden("You are not allowed to delete this post"));
    }

    state.store().posts().delete(id).await?;

    Ok(Json(ApiResponse::success(MessageDto {
        message: "Post deleted successfully".to_string(),
    })))
}
