use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use std::sync::Arc;

use super::auth::Principal;
use super::{ApiError, ApiResponse, AppState, MessageDto, SubscriptionDto, validation};
use crate::db::repositories::subscription::SubscriptionInput;
use crate::models::Role;

#[derive(Deserialize)]
pub struct SubscriptionPayload {
    pub name: String,
    pub price: f64,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default = "default_frequency")]
    pub frequency: String,
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(default = "default_payment_method")]
    pub payment_method: String,
    pub start_date: String,
    pub renewal_date: Option<String>,
}

fn default_currency() -> String {
    "USD".to_string()
}

fn default_frequency() -> String {
    "monthly".to_string()
}

fn default_category() -> String {
    "Other".to_string()
}

fn default_payment_method() -> String {
    "credit_card".to_string()
}

/// Validate the payload and derive renewal date and status.
fn build_input(payload: SubscriptionPayload) -> Result<SubscriptionInput, ApiError> {
    let name = validation::validate_name(&payload.name, "Subscription name")?;
    if name.len() < 3 || name.len() > 50 {
        return Err(ApiError::validation(
            "Subscription name must be between 3 and 50 characters",
        ));
    }
    if payload.price < 0.0 {
        return Err(ApiError::validation("Price cannot be negative"));
    }
    validation::validate_currency(&payload.currency)?;
    validation::validate_frequency(&payload.frequency)?;
    validation::validate_payment_method(&payload.payment_method)?;

    let start = DateTime::parse_from_rfc3339(&payload.start_date)
        .map_err(|_| ApiError::validation("start_date must be an RFC 3339 timestamp"))?
        .with_timezone(&Utc);
    if start > Utc::now() {
        return Err(ApiError::validation("Start date cannot be in the future"));
    }

    let renewal = match payload.renewal_date {
        Some(raw) => DateTime::parse_from_rfc3339(&raw)
            .map_err(|_| ApiError::validation("renewal_date must be an RFC 3339 timestamp"))?
            .with_timezone(&Utc),
        None => derive_renewal_date(start, &payload.frequency),
    };
    if renewal <= start {
        return Err(ApiError::validation(
            "Renewal date must be after the start date",
        ));
    }

    // A renewal date already in the past means the record arrives expired.
    let status = if renewal < Utc::now() {
        "expired".to_string()
    } else {
        "active".to_string()
    };

    Ok(SubscriptionInput {
        name,
        price: payload.price,
        currency: payload.currency,
        frequency: payload.frequency,
        category: payload.category,
        payment_method: payload.payment_method,
        status,
        start_date: start.to_rfc3339(),
        renewal_date: renewal.to_rfc3339(),
    })
}

fn derive_renewal_date(start: DateTime<Utc>, frequency: &str) -> DateTime<Utc> {
    let days = match frequency {
        "daily" => 1,
        "weekly" => 7,
        "yearly" => 365,
        _ => 30,
    };
    start + Duration::days(days)
}

/// POST /api/subscriptions
pub async fn create_subscription(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Json(payload): Json<SubscriptionPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let input = build_input(payload)?;

    let created = state
        .store()
        .subscriptions()
        .create(principal.account.id, input)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(SubscriptionDto::from(created))),
    ))
}

/// GET /api/subscriptions
pub async fn list_my_subscriptions(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<ApiResponse<Vec<SubscriptionDto>>>, ApiError> {
    let records = state
        .store()
        .subscriptions()
        .list_by_account(principal.account.id)
        .await?;

    let dtos: Vec<SubscriptionDto> = records.into_iter().map(SubscriptionDto::from).collect();
    Ok(Json(ApiResponse::success(dtos)))
}

/// GET /api/subscriptions/{id} (owner, subscription-admin, or super-admin)
pub async fn get_subscription(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<SubscriptionDto>>, ApiError> {
    let record = state
        .store()
        .subscriptions()
        .get(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Subscription", id))?;

    authorize_owner_or_admin(&principal, record.account_id)?;

    Ok(Json(ApiResponse::success(SubscriptionDto::from(record))))
}

/// PUT /api/subscriptions/{id}
pub async fn update_subscription(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<i32>,
    Json(payload): Json<SubscriptionPayload>,
) -> Result<Json<ApiResponse<SubscriptionDto>>, ApiError> {
    let record = state
        .store()
        .subscriptions()
        .get(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Subscription", id))?;

    authorize_owner_or_admin(&principal, record.account_id)?;

    let input = build_input(payload)?;
    let updated = state
        .store()
        .subscriptions()
        .update(id, input)
        .await?
        .ok_or_else(|| ApiError::not_found("Subscription", id))?;

    Ok(Json(ApiResponse::success(SubscriptionDto::from(updated))))
}

/// POST /api/subscriptions/{id}/cancel
pub async fn cancel_subscription(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<SubscriptionDto>>, ApiError> {
    let record = state
        .store()
        .subscriptions()
        .get(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Subscription", id))?;

    authorize_owner_or_admin(&principal, record.account_id)?;

    if record.status == "cancelled" {
        return Err(ApiError::validation("Subscription is already cancelled"));
    }

    let updated = state
        .store()
        .subscriptions()
        .set_status(id, "cancelled")
        .await?
        .ok_or_else(|| ApiError::not_found("Subscription", id))?;

    Ok(Json(ApiResponse::success(SubscriptionDto::from(updated))))
}

/// DELETE /api/subscriptions/{id}
pub async fn delete_subscription(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<MessageDto>>, ApiError> {
    let record = state
        .store()
        .subscriptions()
        .get(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Subscription", id))?;

    authorize_owner_or_admin(&principal, record.account_id)?;

    state.store().subscriptions().delete(id).await?;

    Ok(Json(ApiResponse::success(MessageDto {
        message: "Subscription deleted successfully".to_string(),
    })))
}

fn authorize_owner_or_admin(principal: &Principal, owner_id: i32) -> Result<(), ApiError> {
    if principal.account.id == owner_id
        || principal
            .account
            .roles
            .intersects(&[Role::SubscriptionAdmin, Role::SuperAdmin])
    {
        Ok(())
    } else {
        Err(ApiError::forbidden(
            "You are not allowed to access this subscription",
        ))
    }
}
