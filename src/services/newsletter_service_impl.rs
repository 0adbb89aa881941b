//! `SeaORM` implementation of the [`NewsletterService`] trait.

use tokio::task;
use tracing::warn;

use crate::config::SecurityConfig;
use crate::crypto;
use crate::db::Store;
use crate::models::Role;
use crate::services::mailer;
use crate::services::newsletter_service::{
    MailSettings, NewsletterError, NewsletterService, ProviderInfo, SendReport,
};

pub struct SeaOrmNewsletterService {
    store: Store,
    security: SecurityConfig,
}

impl SeaOrmNewsletterService {
    #[must_use]
    pub const fn new(store: Store, security: SecurityConfig) -> Self {
        Self { store, security }
    }

    async fn hash_blocking(&self, secret: String) -> Result<String, NewsletterError> {
        let config = self.security.clone();
        task::spawn_blocking(move || crypto::hash_secret(&secret, &config))
            .await
            .map_err(|e| NewsletterError::Internal(format!("Hashing task panicked: {e}")))?
            .map_err(NewsletterError::from)
    }

    async fn verify_blocking(
        &self,
        candidate: String,
        hashed: String,
    ) -> Result<bool, NewsletterError> {
        task::spawn_blocking(move || crypto::verify_secret(&candidate, &hashed))
            .await
            .map_err(|e| NewsletterError::Internal(format!("Verification task panicked: {e}")))?
            .map_err(NewsletterError::from)
    }

    /// Load the provider owned by this account and re-check the provider
    /// password before any destructive/config action.
    async fn authorize_provider_action(
        &self,
        account_id: i32,
        provider_password: &str,
        required: &[Role],
    ) -> Result<crate::entities::newsletter_providers::Model, NewsletterError> {
        let account = self
            .store
            .accounts()
            .get_by_id(account_id)
            .await?
            .ok_or_else(|| NewsletterError::NotFound("Account not found".to_string()))?;

        if !account.roles.intersects(required) {
            return Err(NewsletterError::Forbidden(
                "You do not have permission to manage this newsletter provider".to_string(),
            ));
        }

        let provider_id = account.newsletter_provider_id.ok_or_else(|| {
            NewsletterError::Validation("You do not have a newsletter provider".to_string())
        })?;

        let provider = self
            .store
            .newsletter()
            .get_provider(provider_id)
            .await?
            .ok_or_else(|| {
                NewsletterError::NotFound("Newsletter provider not found".to_string())
            })?;

        let is_valid = self
            .verify_blocking(
                provider_password.to_string(),
                provider.password_hash.clone(),
            )
            .await?;
        if !is_valid {
            return Err(NewsletterError::Forbidden(
                "Incorrect password for the provider".to_string(),
            ));
        }

        Ok(provider)
    }
}

#[async_trait::async_trait]
impl NewsletterService for SeaOrmNewsletterService {
    async fn register_provider(
        &self,
        account_id: i32,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<ProviderInfo, NewsletterError> {
        let mut account = self
            .store
            .accounts()
            .get_by_id(account_id)
            .await?
            .ok_or_else(|| NewsletterError::NotFound("Account not found".to_string()))?;

        if account.newsletter_provider_id.is_some() {
            return Err(NewsletterError::Conflict(
                "Account already owns a newsletter provider".to_string(),
            ));
        }

        if self
            .store
            .newsletter()
            .get_provider_by_email(email)
            .await?
            .is_some()
        {
            return Err(NewsletterError::Conflict(
                "Provider email already registered".to_string(),
            ));
        }

        let password_hash = self.hash_blocking(password.to_string()).await?;

        let provider = self
            .store
            .newsletter()
            .create_provider(name, email, password_hash)
            .await
            .map_err(|e| {
                if crate::db::is_unique_violation(&e) {
                    NewsletterError::Conflict("Provider email already registered".to_string())
                } else {
                    NewsletterError::from(e)
                }
            })?;

        account.roles.grant(Role::NewsletterProvider);
        self.store
            .accounts()
            .set_roles(account_id, &account.roles)
            .await?;
        self.store
            .accounts()
            .set_newsletter_provider(account_id, Some(provider.id))
            .await?;

        Ok(ProviderInfo::from(provider))
    }

    async fn set_mail_settings(
        &self,
        account_id: i32,
        provider_password: &str,
        settings: MailSettings,
    ) -> Result<ProviderInfo, NewsletterError> {
        let provider = self
            .authorize_provider_action(account_id, provider_password, &[Role::NewsletterProvider])
            .await?;

        // Key derived from the provider password, supplied fresh at every
        // decrypt; the system never persists the capability to read this.
        let encrypted =
            crypto::encrypt_with_password(&settings.relay_password, provider_password)?;

        let updated = self
            .store
            .newsletter()
            .set_mail_settings(
                provider.id,
                &settings.sender_name,
                &settings.mail_address,
                &settings.mail_service,
                encrypted,
            )
            .await?
            .ok_or_else(|| {
                NewsletterError::NotFound("Newsletter provider not found".to_string())
            })?;

        Ok(ProviderInfo::from(updated))
    }

    async fn send_newsletter(
        &self,
        account_id: i32,
        provider_password: &str,
        sender_name: Option<String>,
        subject: &str,
        content: &str,
    ) -> Result<SendReport, NewsletterError> {
        let provider = self
            .authorize_provider_action(
                account_id,
                provider_password,
                &[Role::NewsletterProvider, Role::NewsletterProviderWorker],
            )
            .await?;

        let (Some(mail_address), Some(mail_service), Some(encrypted)) = (
            provider.mail_address.clone(),
            provider.mail_service.clone(),
            provider.mail_password_encrypted.clone(),
        ) else {
            return Err(NewsletterError::Validation(
                "Provider mail settings are not configured".to_string(),
            ));
        };

        let subscribers = self
            .store
            .newsletter()
            .list_subscribers_for_provider(provider.id)
            .await?;

        if subscribers.is_empty() {
            return Err(NewsletterError::NotFound(
                "No subscribers found for this provider".to_string(),
            ));
        }

        let relay_password = crypto::decrypt_with_password(&encrypted, provider_password)
            .map_err(|_| {
                NewsletterError::Forbidden("Incorrect password for the provider".to_string())
            })?;

        let from_name = sender_name
            .or_else(|| provider.sender_name.clone())
            .unwrap_or_else(|| provider.name.clone());

        let mut sent = 0;
        let mut failed = 0;
        for subscriber in &subscribers {
            match mailer::send_via_relay(
                &mail_service,
                &mail_address,
                &relay_password,
                &from_name,
                &subscriber.email,
                subject,
                content,
            )
            .await
            {
                Ok(()) => sent += 1,
                Err(e) => {
                    // Count and move on; a retry here risks duplicate
                    // deliveries to the addresses that already got one.
                    warn!(subscriber = %subscriber.email, "Newsletter send failed: {e:#}");
                    failed += 1;
                }
            }
        }

        Ok(SendReport { sent, failed })
    }

    async fn add_worker(
        &self,
        owner_id: i32,
        worker_email: &str,
    ) -> Result<(), NewsletterError> {
        let owner = self
            .store
            .accounts()
            .get_by_id(owner_id)
            .await?
            .ok_or_else(|| NewsletterError::NotFound("Account not found".to_string()))?;

        if !owner.roles.contains(Role::NewsletterProvider) {
            return Err(NewsletterError::Forbidden(
                "Only the provider owner can manage workers".to_string(),
            ));
        }

        let provider_id = owner.newsletter_provider_id.ok_or_else(|| {
            NewsletterError::Validation("You do not have a newsletter provider".to_string())
        })?;

        let mut worker = self
            .store
            .accounts()
            .get_by_email(worker_email)
            .await?
            .ok_or_else(|| NewsletterError::NotFound("Worker account not found".to_string()))?;

        worker.roles.grant(Role::NewsletterProviderWorker);
        self.store
            .accounts()
            .set_roles(worker.id, &worker.roles)
            .await?;
        self.store
            .accounts()
            .set_newsletter_provider(worker.id, Some(provider_id))
            .await?;

        Ok(())
    }

    async fn remove_worker(
        &self,
        owner_id: i32,
        worker_email: &str,
    ) -> Result<(), NewsletterError> {
        let owner = self
            .store
            .accounts()
            .get_by_id(owner_id)
            .await?
            .ok_or_else(|| NewsletterError::NotFound("Account not found".to_string()))?;

        if !owner.roles.contains(Role::NewsletterProvider) {
            return Err(NewsletterError::Forbidden(
                "Only the provider owner can manage workers".to_string(),
            ));
        }

        let mut worker = self
            .store
            .accounts()
            .get_by_email(worker_email)
            .await?
            .ok_or_else(|| NewsletterError::NotFound("Worker account not found".to_string()))?;

        worker.roles.revoke(Role::NewsletterProviderWorker);
        self.store
            .accounts()
            .set_roles(worker.id, &worker.roles)
            .await?;
        self.store
            .accounts()
            .set_newsletter_provider(worker.id, None)
            .await?;

        Ok(())
    }

    async fn subscribe(
        &self,
        name: &str,
        email: &str,
        provider_ids: Vec<i32>,
    ) -> Result<(), NewsletterError> {
        if provider_ids.is_empty() {
            return Err(NewsletterError::Validation(
                "At least one provider id is required".to_string(),
            ));
        }

        for id in &provider_ids {
            if self.store.newsletter().get_provider(*id).await?.is_none() {
                return Err(NewsletterError::NotFound(format!(
                    "Newsletter provider {id} not found"
                )));
            }
        }

        if let Some(existing) = self
            .store
            .newsletter()
            .get_subscriber_by_email(email)
            .await?
        {
            let mut ids: Vec<i32> = serde_json::from_str(&existing.provider_ids)
                .map_err(|e| NewsletterError::Internal(format!("Invalid provider_ids: {e}")))?;
            for id in provider_ids {
                if !ids.contains(&id) {
                    ids.push(id);
                }
            }
            self.store
                .newsletter()
                .update_subscriber_providers(existing.id, &ids)
                .await?;
        } else {
            self.store
                .newsletter()
                .create_subscriber(name, email, &provider_ids)
                .await
                .map_err(|e| {
                    if crate::db::is_unique_violation(&e) {
                        NewsletterError::Conflict("Email already subscribed".to_string())
                    } else {
                        NewsletterError::from(e)
                    }
                })?;
        }

        Ok(())
    }

    async fn unsubscribe(&self, email: &str, provider_id: i32) -> Result<(), NewsletterError> {
        let subscriber = self
            .store
            .newsletter()
            .get_subscriber_by_email(email)
            .await?
            .ok_or_else(|| NewsletterError::NotFound("Subscription not found".to_string()))?;

        let mut ids: Vec<i32> = serde_json::from_str(&subscriber.provider_ids)
            .map_err(|e| NewsletterError::Internal(format!("Invalid provider_ids: {e}")))?;
        ids.retain(|id| *id != provider_id);

        if ids.is_empty() {
            self.store
                .newsletter()
                .delete_subscriber(subscriber.id)
                .await?;
        } else {
            self.store
                .newsletter()
                .update_subscriber_providers(subscriber.id, &ids)
                .await?;
        }

        Ok(())
    }
}
