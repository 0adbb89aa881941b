use axum::{
    Extension, Json,
    extract::{Path, State},
};
use serde::Deserialize;
use std::sync::Arc;

use super::auth::Principal;
use super::{AccountDto, ApiError, ApiResponse, AppState, MessageDto, validation};
use crate::models::{Role, RoleSet};

#[derive(Deserialize)]
pub struct UpdateProfileRequest {
    pub first_name: String,
    pub last_name: Option<String>,
    pub username: Option<String>,
}

#[derive(Deserialize)]
pub struct DeleteAccountRequest {
    pub email: String,
    pub password: String,
    pub confirmation: String,
}

#[derive(Deserialize)]
pub struct LookupRequest {
    pub email: String,
}

#[derive(Deserialize)]
pub struct BanRequest {
    pub banned: bool,
}

#[derive(Deserialize)]
pub struct RolesRequest {
    pub roles: Vec<Role>,
}

/// GET /api/accounts/me
pub async fn get_me(
    Extension(principal): Extension<Principal>,
) -> Json<ApiResponse<AccountDto>> {
    Json(ApiResponse::success(AccountDto::from(principal.account)))
}

/// PATCH /api/accounts/me
pub async fn update_me(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<Json<ApiResponse<AccountDto>>, ApiError> {
    let first_name = validation::validate_name(&payload.first_name, "First name")?;

    let updated = state
        .auth_service()
        .update_profile(
            principal.account.id,
            first_name,
            payload.last_name,
            payload.username,
        )
        .await?;

    Ok(Json(ApiResponse::success(AccountDto::from(updated))))
}

/// DELETE /api/accounts/me
///
/// Requires the password re-checked and the configured confirmation
/// phrase typed verbatim.
pub async fn delete_me(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Json(payload): Json<DeleteAccountRequest>,
) -> Result<Json<ApiResponse<MessageDto>>, ApiError> {
    let email = validation::validate_email(&payload.email)?;

    state
        .auth_service()
        .delete_account(
            principal.account.id,
            &email,
            &payload.password,
            &payload.confirmation,
        )
        .await?;

    Ok(Json(ApiResponse::success(MessageDto {
        message: "Account deleted successfully".to_string(),
    })))
}

/// GET /api/accounts (auth-admin or super-admin)
pub async fn list_accounts(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<ApiResponse<Vec<AccountDto>>>, ApiError> {
    require_roles(&principal, &[Role::AuthAdmin, Role::SuperAdmin])?;

    let accounts = state.store().accounts().list_all().await?;
    let dtos: Vec<AccountDto> = accounts.into_iter().map(AccountDto::from).collect();

    Ok(Json(ApiResponse::success(dtos)))
}

/// POST /api/accounts/lookup
///
/// Admins may look up any account; everyone else only their own.
pub async fn lookup_account(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Json(payload): Json<LookupRequest>,
) -> Result<Json<ApiResponse<AccountDto>>, ApiError> {
    let email = validation::validate_email(&payload.email)?;

    let is_admin = principal
        .account
        .roles
        .intersects(&[Role::AuthAdmin, Role::SuperAdmin]);
    if !is_admin && principal.account.email != email {
        return Err(ApiError::forbidden(
            "You are not authorized to view this account",
        ));
    }

    let account = state
        .store()
        .accounts()
        .get_by_email(&email)
        .await?
        .ok_or_else(|| ApiError::NotFound("Account does not exist".to_string()))?;

    Ok(Json(ApiResponse::success(AccountDto::from(account))))
}

/// PATCH /api/accounts/{id}/ban (auth-admin or super-admin)
pub async fn set_banned(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<i32>,
    Json(payload): Json<BanRequest>,
) -> Result<Json<ApiResponse<MessageDto>>, ApiError> {
    require_roles(&principal, &[Role::AuthAdmin, Role::SuperAdmin])?;

    if state.store().accounts().get_by_id(id).await?.is_none() {
        return Err(ApiError::not_found("Account", id));
    }

    state.store().accounts().set_banned(id, payload.banned).await?;

    let action = if payload.banned { "banned" } else { "unbanned" };
    tracing::info!("Account {id} {action} by account {}", principal.account.id);

    Ok(Json(ApiResponse::success(MessageDto {
        message: format!("Account {action} successfully"),
    })))
}

/// PUT /api/accounts/{id}/roles (super-admin)
pub async fn set_roles(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<i32>,
    Json(payload): Json<RolesRequest>,
) -> Result<Json<ApiResponse<AccountDto>>, ApiError> {
    require_roles(&principal, &[Role::SuperAdmin])?;

    if state.store().accounts().get_by_id(id).await?.is_none() {
        return Err(ApiError::not_found("Account", id));
    }

    let roles: RoleSet = payload.roles.into_iter().collect();
    state.store().accounts().set_roles(id, &roles).await?;

    let account = state
        .store()
        .accounts()
        .get_by_id(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Account", id))?;

    Ok(Json(ApiResponse::success(AccountDto::from(account))))
}

/// Every permission check is "principal roles intersect required set".
pub fn require_roles(principal: &Principal, required: &[Role]) -> Result<(), ApiError> {
    if principal.account.roles.intersects(required) {
        Ok(())
    } else {
        Err(ApiError::forbidden(
            "You do not have permission to perform this action",
        ))
    }
}
