use anyhow::{Context, Result};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
};

use crate::entities::accounts;
use crate::models::RoleSet;

/// Account data returned to callers that do not need secret material.
#[derive(Debug, Clone)]
pub struct Account {
    pub id: i32,
    pub email: String,
    pub username: Option<String>,
    pub first_name: String,
    pub last_name: Option<String>,
    pub roles: RoleSet,
    pub verified: bool,
    pub is_banned: bool,
    pub newsletter_provider_id: Option<i32>,
    pub created_at: String,
    pub updated_at: String,
}

impl TryFrom<accounts::Model> for Account {
    type Error = anyhow::Error;

    fn try_from(model: accounts::Model) -> Result<Self> {
        Ok(Self {
            id: model.id,
            email: model.email,
            username: model.username,
            first_name: model.first_name,
            last_name: model.last_name,
            roles: RoleSet::from_json(&model.roles)?,
            verified: model.verified,
            is_banned: model.is_banned,
            newsletter_provider_id: model.newsletter_provider_id,
            created_at: model.created_at,
            updated_at: model.updated_at,
        })
    }
}

/// Fields required to persist a fresh signup. The password arrives
/// already hashed; this layer never sees plaintext.
#[derive(Debug)]
pub struct NewAccount {
    pub email: String,
    pub username: Option<String>,
    pub first_name: String,
    pub last_name: Option<String>,
    pub password_hash: String,
}

pub struct AccountRepository {
    conn: DatabaseConnection,
}

impl AccountRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn create(&self, new: NewAccount) -> Result<Account> {
        let now = chrono::Utc::now().to_rfc3339();
        let roles = RoleSet::account_holder().to_json()?;

        let active = accounts::ActiveModel {
            email: Set(new.email.to_lowercase()),
            username: Set(new.username),
            first_name: Set(new.first_name),
            last_name: Set(new.last_name),
            password_hash: Set(new.password_hash),
            roles: Set(roles),
            verified: Set(false),
            is_banned: Set(false),
            created_at: Set(now.clone()),
            updated_at: Set(now),
            ..Default::default()
        };

        let model = active
            .insert(&self.conn)
            .await
            .map_err(anyhow::Error::from)
            .context("Failed to insert account")?;

        Account::try_from(model)
    }

    pub async fn get_by_id(&self, id: i32) -> Result<Option<Account>> {
        let model = accounts::Entity::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query account by id")?;

        model.map(Account::try_from).transpose()
    }

    pub async fn get_by_email(&self, email: &str) -> Result<Option<Account>> {
        let model = self.get_model_by_email(email).await?;
        model.map(Account::try_from).transpose()
    }

    /// Full row including hash and one-time-code fields, for flows that
    /// must re-verify a credential.
    pub async fn get_model_by_email(&self, email: &str) -> Result<Option<accounts::Model>> {
        accounts::Entity::find()
            .filter(accounts::Column::Email.eq(email.to_lowercase()))
            .one(&self.conn)
            .await
            .map_err(anyhow::Error::from)
            .context("Failed to query account by email")
    }

    pub async fn get_model_by_id(&self, id: i32) -> Result<Option<accounts::Model>> {
        accounts::Entity::find_by_id(id)
            .one(&self.conn)
            .await
            .map_err(anyhow::Error::from)
            .context("Failed to query account by id")
    }

    pub async fn list_all(&self) -> Result<Vec<Account>> {
        let models = accounts::Entity::find()
            .all(&self.conn)
            .await
            .context("Failed to list accounts")?;

        models.into_iter().map(Account::try_from).collect()
    }

    pub async fn update_profile(
        &self,
        id: i32,
        first_name: String,
        last_name: Option<String>,
        username: Option<String>,
    ) -> Result<Option<Account>> {
        let Some(model) = self.get_model_by_id(id).await? else {
            return Ok(None);
        };

        let mut active: accounts::ActiveModel = model.into();
        active.first_name = Set(first_name);
        active.last_name = Set(last_name);
        active.username = Set(username);
        active.updated_at = Set(chrono::Utc::now().to_rfc3339());

        let updated = active
            .update(&self.conn)
            .await
            .map_err(anyhow::Error::from)
            .context("Failed to update account profile")?;

        Ok(Some(Account::try_from(updated)?))
    }

    pub async fn update_password(&self, id: i32, password_hash: String) -> Result<()> {
        let model = self
            .get_model_by_id(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Account not found: {id}"))?;

        let mut active: accounts::ActiveModel = model.into();
        active.password_hash = Set(password_hash);
        active.updated_at = Set(chrono::Utc::now().to_rfc3339());
        active.update(&self.conn).await?;

        Ok(())
    }

    pub async fn set_roles(&self, id: i32, roles: &RoleSet) -> Result<()> {
        let model = self
            .get_model_by_id(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Account not found: {id}"))?;

        let mut active: accounts::ActiveModel = model.into();
        active.roles = Set(roles.to_json()?);
        active.updated_at = Set(chrono::Utc::now().to_rfc3339());
        active.update(&self.conn).await?;

        Ok(())
    }

    pub async fn set_newsletter_provider(&self, id: i32, provider_id: Option<i32>) -> Result<()> {
        let model = self
            .get_model_by_id(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Account not found: {id}"))?;

        let mut active: accounts::ActiveModel = model.into();
        active.newsletter_provider_id = Set(provider_id);
        active.updated_at = Set(chrono::Utc::now().to_rfc3339());
        active.update(&self.conn).await?;

        Ok(())
    }

    /// Store the fingerprint of a freshly issued verification code.
    pub async fn set_verification_code(&self, id: i32, code_fingerprint: String) -> Result<()> {
        let model = self
            .get_model_by_id(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Account not found: {id}"))?;

        let mut active: accounts::ActiveModel = model.into();
        active.verification_code = Set(Some(code_fingerprint));
        active.verification_code_sent_at = Set(Some(chrono::Utc::now().timestamp_millis()));
        active.updated_at = Set(chrono::Utc::now().to_rfc3339());
        active.update(&self.conn).await?;

        Ok(())
    }

    /// Flip the account to verified and discard the one-time code.
    pub async fn mark_verified(&self, id: i32) -> Result<()> {
        let model = self
            .get_model_by_id(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Account not found: {id}"))?;

        let mut active: accounts::ActiveModel = model.into();
        active.verified = Set(true);
        active.verification_code = Set(None);
        active.verification_code_sent_at = Set(None);
        active.updated_at = Set(chrono::Utc::now().to_rfc3339());
        active.update(&self.conn).await?;

        Ok(())
    }

    pub async fn set_reset_code(&self, id: i32, code_fingerprint: String) -> Result<()> {
        let model = self
            .get_model_by_id(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Account not found: {id}"))?;

        let mut active: accounts::ActiveModel = model.into();
        active.reset_code = Set(Some(code_fingerprint));
        active.reset_code_sent_at = Set(Some(chrono::Utc::now().timestamp_millis()));
        active.updated_at = Set(chrono::Utc::now().to_rfc3339());
        active.update(&self.conn).await?;

        Ok(())
    }

    /// Complete a password reset: new hash, codes cleared, account
    /// marked verified (the code proved mailbox ownership).
    pub async fn apply_password_reset(&self, id: i32, password_hash: String) -> Result<()> {
        let model = self
            .get_model_by_id(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Account not found: {id}"))?;

        let mut active: accounts::ActiveModel = model.into();
        active.password_hash = Set(password_hash);
        active.reset_code = Set(None);
        active.reset_code_sent_at = Set(None);
        active.verified = Set(true);
        active.updated_at = Set(chrono::Utc::now().to_rfc3339());
        active.update(&self.conn).await?;

        Ok(())
    }

    pub async fn set_banned(&self, id: i32, banned: bool) -> Result<()> {
        let model = self
            .get_model_by_id(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Account not found: {id}"))?;

        let mut active: accounts::ActiveModel = model.into();
        active.is_banned = Set(banned);
        active.updated_at = Set(chrono::Utc::now().to_rfc3339());
        active.update(&self.conn).await?;

        Ok(())
    }

    /// Delete the account row; the API key cascades at the store level.
    pub async fn delete(&self, id: i32) -> Result<bool> {
        let result = accounts::Entity::delete_by_id(id)
            .exec(&self.conn)
            .await
            .context("Failed to delete account")?;

        Ok(result.rows_affected > 0)
    }
}
