use anyhow::{Context, Result};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
};

use crate::entities::api_keys;

pub struct ApiKeyRepository {
    conn: DatabaseConnection,
}

impl ApiKeyRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn get_by_account(&self, account_id: i32) -> Result<Option<api_keys::Model>> {
        api_keys::Entity::find()
            .filter(api_keys::Column::AccountId.eq(account_id))
            .one(&self.conn)
            .await
            .map_err(anyhow::Error::from)
            .context("Failed to query API key by account")
    }

    /// Indexed equality lookup on the deterministic fingerprint. This is
    /// the only way a presented key is resolved; the adaptive
    /// verification hash cannot serve as an index.
    pub async fn get_by_lookup_hash(&self, lookup_hash: &str) -> Result<Option<api_keys::Model>> {
        api_keys::Entity::find()
            .filter(api_keys::Column::LookupHash.eq(lookup_hash))
            .one(&self.conn)
            .await
            .map_err(anyhow::Error::from)
            .context("Failed to query API key by lookup hash")
    }

    /// Insert a key row. A concurrent insert for the same account loses
    /// to the unique index; the caller maps that to a conflict.
    pub async fn create(
        &self,
        account_id: i32,
        lookup_hash: String,
        encrypted_secret: String,
        verification_hash: String,
    ) -> Result<api_keys::Model> {
        let now = chrono::Utc::now().to_rfc3339();

        let active = api_keys::ActiveModel {
            account_id: Set(account_id),
            lookup_hash: Set(lookup_hash),
            encrypted_secret: Set(encrypted_secret),
            verification_hash: Set(verification_hash),
            created_at: Set(now.clone()),
            updated_at: Set(now),
            ..Default::default()
        };

        active
            .insert(&self.conn)
            .await
            .map_err(anyhow::Error::from)
            .context("Failed to insert API key")
    }

    /// Replace all three digests in a single update so rotation is
    /// atomic: the old plaintext stops resolving the moment the new one
    /// starts.
    pub async fn rotate(
        &self,
        account_id: i32,
        lookup_hash: String,
        encrypted_secret: String,
        verification_hash: String,
    ) -> Result<Option<api_keys::Model>> {
        let Some(model) = self.get_by_account(account_id).await? else {
            return Ok(None);
        };

        let mut active: api_keys::ActiveModel = model.into();
        active.lookup_hash = Set(lookup_hash);
        active.encrypted_secret = Set(encrypted_secret);
        active.verification_hash = Set(verification_hash);
        active.updated_at = Set(chrono::Utc::now().to_rfc3339());

        let updated = active
            .update(&self.conn)
            .await
            .map_err(anyhow::Error::from)
            .context("Failed to rotate API key")?;

        Ok(Some(updated))
    }

    pub async fn delete_by_account(&self, account_id: i32) -> Result<bool> {
        let result = api_keys::Entity::delete_many()
            .filter(api_keys::Column::AccountId.eq(account_id))
            .exec(&self.conn)
            .await
            .context("Failed to delete API key")?;

        Ok(result.rows_affected > 0)
    }
}
