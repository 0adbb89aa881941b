use anyhow::{Context, Result};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
};

use crate::entities::{newsletter_providers, newsletter_subscribers};

pub struct NewsletterRepository {
    conn: DatabaseConnection,
}

impl NewsletterRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    // ------------------------------------------------------------------
    // Providers
    // ------------------------------------------------------------------

    pub async fn create_provider(
        &self,
        name: &str,
        email: &str,
        password_hash: String,
    ) -> Result<newsletter_providers::Model> {
        let now = chrono::Utc::now().to_rfc3339();

        let active = newsletter_providers::ActiveModel {
            name: Set(name.to_string()),
            email: Set(email.to_lowercase()),
            email_verified: Set(false),
            password_hash: Set(password_hash),
            created_at: Set(now.clone()),
            updated_at: Set(now),
            ..Default::default()
        };

        active
            .insert(&self.conn)
            .await
            .map_err(anyhow::Error::from)
            .context("Failed to insert newsletter provider")
    }

    pub async fn get_provider(&self, id: i32) -> Result<Option<newsletter_providers::Model>> {
        newsletter_providers::Entity::find_by_id(id)
            .one(&self.conn)
            .await
            .map_err(anyhow::Error::from)
            .context("Failed to query newsletter provider")
    }

    pub async fn get_provider_by_email(
        &self,
        email: &str,
    ) -> Result<Option<newsletter_providers::Model>> {
        newsletter_providers::Entity::find()
            .filter(newsletter_providers::Column::Email.eq(email.to_lowercase()))
            .one(&self.conn)
            .await
            .map_err(anyhow::Error::from)
            .context("Failed to query newsletter provider by email")
    }

    /// Persist relay details; the relay password arrives already
    /// encrypted under the provider-password-derived key.
    pub async fn set_mail_settings(
        &self,
        id: i32,
        sender_name: &str,
        mail_address: &str,
        mail_service: &str,
        mail_password_encrypted: String,
    ) -> Result<Option<newsletter_providers::Model>> {
        let Some(model) = self.get_provider(id).await? else {
            return Ok(None);
        };

        let mut active: newsletter_providers::ActiveModel = model.into();
        active.sender_name = Set(Some(sender_name.to_string()));
        active.mail_address = Set(Some(mail_address.to_string()));
        active.mail_service = Set(Some(mail_service.to_string()));
        active.mail_password_encrypted = Set(Some(mail_password_encrypted));
        active.updated_at = Set(chrono::Utc::now().to_rfc3339());

        let updated = active
            .update(&self.conn)
            .await
            .map_err(anyhow::Error::from)
            .context("Failed to update provider mail settings")?;

        Ok(Some(updated))
    }

    pub async fn mark_provider_verified(&self, id: i32) -> Result<()> {
        let model = self
            .get_provider(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Newsletter provider not found: {id}"))?;

        let mut active: newsletter_providers::ActiveModel = model.into();
        active.email_verified = Set(true);
        active.updated_at = Set(chrono::Utc::now().to_rfc3339());
        active.update(&self.conn).await?;

        Ok(())
    }

    pub async fn delete_provider(&self, id: i32) -> Result<bool> {
        let result = newsletter_providers::Entity::delete_by_id(id)
            .exec(&self.conn)
            .await
            .context("Failed to delete newsletter provider")?;

        Ok(result.rows_affected > 0)
    }

    // ------------------------------------------------------------------
    // Subscribers
    // ------------------------------------------------------------------

    pub async fn get_subscriber_by_email(
        &self,
        email: &str,
    ) -> Result<Option<newsletter_subscribers::Model>> {
        newsletter_subscribers::Entity::find()
            .filter(newsletter_subscribers::Column::Email.eq(email.to_lowercase()))
            .one(&self.conn)
            .await
            .map_err(anyhow::Error::from)
            .context("Failed to query subscriber by email")
    }

    pub async fn create_subscriber(
        &self,
        name: &str,
        email: &str,
        provider_ids: &[i32],
    ) -> Result<newsletter_subscribers::Model> {
        let active = newsletter_subscribers::ActiveModel {
            name: Set(name.to_string()),
            email: Set(email.to_lowercase()),
            provider_ids: Set(serde_json::to_string(provider_ids)?),
            subscribed_at: Set(chrono::Utc::now().to_rfc3339()),
            ..Default::default()
        };

        active
            .insert(&self.conn)
            .await
            .map_err(anyhow::Error::from)
            .context("Failed to insert subscriber")
    }

    pub async fn update_subscriber_providers(
        &self,
        id: i32,
        provider_ids: &[i32],
    ) -> Result<()> {
        let model = newsletter_subscribers::Entity::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query subscriber")?
            .ok_or_else(|| anyhow::anyhow!("Subscriber not found: {id}"))?;

        let mut active: newsletter_subscribers::ActiveModel = model.into();
        active.provider_ids = Set(serde_json::to_string(provider_ids)?);
        active.update(&self.conn).await?;

        Ok(())
    }

    pub async fn delete_subscriber(&self, id: i32) -> Result<bool> {
        let result = newsletter_subscribers::Entity::delete_by_id(id)
            .exec(&self.conn)
            .await
            .context("Failed to delete subscriber")?;

        Ok(result.rows_affected > 0)
    }

    /// All subscribers whose provider list contains `provider_id`.
    ///
    /// The id list is a small JSON column; filtering happens here rather
    /// than in SQL to avoid substring-match false positives.
    pub async fn list_subscribers_for_provider(
        &self,
        provider_id: i32,
    ) -> Result<Vec<newsletter_subscribers::Model>> {
        let all = newsletter_subscribers::Entity::find()
            .all(&self.conn)
            .await
            .context("Failed to list subscribers")?;

        let mut matched = Vec::new();
        for model in all {
            let ids: Vec<i32> = serde_json::from_str(&model.provider_ids)
                .with_context(|| format!("Invalid provider_ids for subscriber {}", model.id))?;
            if ids.contains(&provider_id) {
                matched.push(model);
            }
        }

        Ok(matched)
    }
}
