//! Domain service for newsletter providers, subscribers, and sends.

use serde::Serialize;
use thiserror::Error;

use crate::entities::newsletter_providers;

#[derive(Debug, Error)]
pub enum NewsletterError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sea_orm::DbErr> for NewsletterError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<anyhow::Error> for NewsletterError {
    fn from(err: anyhow::Error) -> Self {
        if crate::db::is_unique_violation(&err) {
            Self::Conflict("Record already exists".to_string())
        } else {
            Self::Internal(err.to_string())
        }
    }
}

/// Provider data with secret columns stripped.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderInfo {
    pub id: i32,
    pub name: String,
    pub email: String,
    pub email_verified: bool,
    pub sender_name: Option<String>,
    pub mail_address: Option<String>,
    pub mail_service: Option<String>,
    pub created_at: String,
}

impl From<newsletter_providers::Model> for ProviderInfo {
    fn from(model: newsletter_providers::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            email: model.email,
            email_verified: model.email_verified,
            sender_name: model.sender_name,
            mail_address: model.mail_address,
            mail_service: model.mail_service,
            created_at: model.created_at,
        }
    }
}

/// Outcome of a fan-out send.
#[derive(Debug, Clone, Serialize)]
pub struct SendReport {
    pub sent: usize,
    pub failed: usize,
}

/// Mail-relay settings submitted by a provider operator.
#[derive(Debug)]
pub struct MailSettings {
    pub sender_name: String,
    pub mail_address: String,
    pub mail_service: String,
    pub relay_password: String,
}

#[async_trait::async_trait]
pub trait NewsletterService: Send + Sync {
    /// Registers a provider owned by the calling account: creates the
    /// provider record (password hashed), grants `newsletter-provider`,
    /// and sets the back-reference.
    async fn register_provider(
        &self,
        account_id: i32,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<ProviderInfo, NewsletterError>;

    /// Stores relay details. Requires the provider password re-supplied;
    /// the relay password is encrypted under a key derived from it, so
    /// the system alone can never decrypt.
    async fn set_mail_settings(
        &self,
        account_id: i32,
        provider_password: &str,
        settings: MailSettings,
    ) -> Result<ProviderInfo, NewsletterError>;

    /// Decrypts the relay password with the supplied provider password
    /// and fans the newsletter out to every subscriber. Failed sends are
    /// counted, not retried - a blind retry could double-deliver.
    async fn send_newsletter(
        &self,
        account_id: i32,
        provider_password: &str,
        sender_name: Option<String>,
        subject: &str,
        content: &str,
    ) -> Result<SendReport, NewsletterError>;

    /// Grants `newsletter-provider-worker` plus the provider
    /// back-reference to another account.
    async fn add_worker(&self, owner_id: i32, worker_email: &str)
    -> Result<(), NewsletterError>;

    /// Revokes the worker role and back-reference.
    async fn remove_worker(
        &self,
        owner_id: i32,
        worker_email: &str,
    ) -> Result<(), NewsletterError>;

    /// Subscribes an address to one or more providers; an existing
    /// subscriber has the new provider ids merged in.
    async fn subscribe(
        &self,
        name: &str,
        email: &str,
        provider_ids: Vec<i32>,
    ) -> Result<(), NewsletterError>;

    /// Removes a provider from a subscription, deleting the subscriber
    /// once no providers remain.
    async fn unsubscribe(&self, email: &str, provider_id: i32) -> Result<(), NewsletterError>;
}
