use serde::{Deserialize, Serialize};

use crate::db::Account;
use crate::entities::{billing_subscriptions, posts, short_urls};

/// Stable response envelope: every error body is
/// `{"success": false, "message": ...}`, every success is
/// `{"success": true, "data": ...}`.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    pub const fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message.into()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AccountDto {
    pub id: i32,
    pub email: String,
    pub username: Option<String>,
    pub first_name: String,
    pub last_name: Option<String>,
    pub roles: Vec<String>,
    pub verified: bool,
    pub is_banned: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Account> for AccountDto {
    fn from(account: Account) -> Self {
        Self {
            id: account.id,
            email: account.email,
            username: account.username,
            first_name: account.first_name,
            last_name: account.last_name,
            roles: account.roles.iter().map(ToString::to_string).collect(),
            verified: account.verified,
            is_banned: account.is_banned,
            created_at: account.created_at,
            updated_at: account.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TokenDto {
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct ApiKeyDto {
    pub api_key: String,
}

#[derive(Debug, Serialize)]
pub struct MessageDto {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ShortUrlDto {
    pub id: i32,
    pub full_url: String,
    pub short_code: String,
    pub clicks: i64,
    pub created_by: i32,
    pub created_at: String,
}

impl From<short_urls::Model> for ShortUrlDto {
    fn from(model: short_urls::Model) -> Self {
        Self {
            id: model.id,
            full_url: model.full_url,
            short_code: model.short_code,
            clicks: model.clicks,
            created_by: model.created_by,
            created_at: model.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PostDto {
    pub id: i32,
    pub title: String,
    pub body: String,
    pub account_id: i32,
    pub edited: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl From<posts::Model> for PostDto {
    fn from(model: posts::Model) -> Self {
        Self {
            id: model.id,
            title: model.title,
            body: model.body,
            account_id: model.account_id,
            edited: model.edited,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PostPageDto {
    pub posts: Vec<PostDto>,
    pub total_pages: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SubscriptionDto {
    pub id: i32,
    pub name: String,
    pub price: f64,
    pub currency: String,
    pub frequency: String,
    pub category: String,
    pub payment_method: String,
    pub status: String,
    pub start_date: String,
    pub renewal_date: String,
    pub account_id: i32,
}

impl From<billing_subscriptions::Model> for SubscriptionDto {
    fn from(model: billing_subscriptions::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            price: model.price,
            currency: model.currency,
            frequency: model.frequency,
            category: model.category,
            payment_method: model.payment_method,
            status: model.status,
            start_date: model.start_date,
            renewal_date: model.renewal_date,
            account_id: model.account_id,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthDto {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
}
