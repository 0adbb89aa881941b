use axum::{
    Extension, Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use std::sync::Arc;

use super::auth::Principal;
use super::{ApiError, ApiResponse, AppState, MessageDto, validation};
use crate::services::{MailSettings, ProviderInfo, SendReport};

#[derive(Deserialize)]
pub struct RegisterProviderRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct MailSettingsRequest {
    pub provider_password: String,
    pub sender_name: String,
    pub mail_address: String,
    pub mail_service: String,
    pub relay_password: String,
}

#[derive(Deserialize)]
pub struct SendNewsletterRequest {
    pub provider_password: String,
    pub sender_name: Option<String>,
    pub subject: String,
    pub content: String,
}

#[derive(Deserialize)]
pub struct WorkerRequest {
    pub email: String,
}

#[derive(Deserialize)]
pub struct SubscribeRequest {
    pub name: String,
    pub email: String,
    pub provider_ids: Vec<i32>,
}

#[derive(Deserialize)]
pub struct UnsubscribeRequest {
    pub email: String,
    pub provider_id: i32,
}

/// POST /api/newsletter/provider
pub async fn register_provider(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Json(payload): Json<RegisterProviderRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let name = validation::validate_name(&payload.name, "Provider name")?;
    let email = validation::validate_email(&payload.email)?;
    validation::validate_password(&payload.password)?;

    let provider = state
        .newsletter_service()
        .register_provider(principal.account.id, &name, &email, &payload.password)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(provider)),
    ))
}

/// PUT /api/newsletter/provider/mail-settings
///
/// The relay password is stored encrypted under a key derived from the
/// provider password supplied here; the provider password itself is
/// re-verified first.
pub async fn set_mail_settings(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Json(payload): Json<MailSettingsRequest>,
) -> Result<Json<ApiResponse<ProviderInfo>>, ApiError> {
    let sender_name = validation::validate_name(&payload.sender_name, "Sender name")?;
    let mail_address = validation::validate_email(&payload.mail_address)?;
    if payload.mail_service.trim().is_empty() {
        return Err(ApiError::validation("Mail service is required"));
    }
    if payload.relay_password.is_empty() {
        return Err(ApiError::validation("Relay password is required"));
    }

    let provider = state
        .newsletter_service()
        .set_mail_settings(
            principal.account.id,
            &payload.provider_password,
            MailSettings {
                sender_name,
                mail_address,
                mail_service: payload.mail_service.trim().to_string(),
                relay_password: payload.relay_password,
            },
        )
        .await?;

    Ok(Json(ApiResponse::success(provider)))
}

/// POST /api/newsletter/send
pub async fn send_newsletter(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Json(payload): Json<SendNewsletterRequest>,
) -> Result<Json<ApiResponse<SendReport>>, ApiError> {
    if payload.subject.trim().is_empty() || payload.content.trim().is_empty() {
        return Err(ApiError::validation("Subject and content are required"));
    }

    let report = state
        .newsletter_service()
        .send_newsletter(
            principal.account.id,
            &payload.provider_password,
            payload.sender_name,
            payload.subject.trim(),
            &payload.content,
        )
        .await?;

    Ok(Json(ApiResponse::success(report)))
}

/// POST /api/newsletter/provider/workers
pub async fn add_worker(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Json(payload): Json<WorkerRequest>,
) -> Result<Json<ApiResponse<MessageDto>>, ApiError> {
    let email = validation::validate_email(&payload.email)?;

    state
        .newsletter_service()
        .add_worker(principal.account.id, &email)
        .await?;

    Ok(Json(ApiResponse::success(MessageDto {
        message: "Worker added successfully".to_string(),
    })))
}

/// DELETE /api/newsletter/provider/workers
pub async fn remove_worker(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Json(payload): Json<WorkerRequest>,
) -> Result<Json<ApiResponse<MessageDto>>, ApiError> {
    let email = validation::validate_email(&payload.email)?;

    state
        .newsletter_service()
        .remove_worker(principal.account.id, &email)
        .await?;

    Ok(Json(ApiResponse::success(MessageDto {
        message: "Worker removed successfully".to_string(),
    })))
}

/// POST /api/newsletter/subscribe (public; a principal may be attached
/// by the optional API-key middleware but is not required)
pub async fn subscribe(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<SubscribeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let name = validation::validate_name(&payload.name, "Name")?;
    let email = validation::validate_email(&payload.email)?;

    state
        .newsletter_service()
        .subscribe(&name, &email, payload.provider_ids)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(MessageDto {
            message: "Subscribed successfully".to_string(),
        })),
    ))
}

/// POST /api/newsletter/unsubscribe (public)
pub async fn unsubscribe(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<UnsubscribeRequest>,
) -> Result<Json<ApiResponse<MessageDto>>, ApiError> {
    let email = validation::validate_email(&payload.email)?;

    state
        .newsletter_service()
        .unsubscribe(&email, payload.provider_id)
        .await?;

    Ok(Json(ApiResponse::success(MessageDto {
        message: "Unsubscribed successfully".to_string(),
    })))
}
