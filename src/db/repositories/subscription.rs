use anyhow::{Context, Result};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};

use crate::entities::billing_subscriptions;

/// Input for creating or replacing a billing subscription record.
/// Dates are RFC 3339; derivation and status rules live in the handler
/// layer.
#[derive(Debug, Clone)]
pub struct SubscriptionInput {
    pub name: String,
    pub price: f64,
    pub currency: String,
    pub frequency: String,
    pub category: String,
    pub payment_method: String,
    pub status: String,
    pub start_date: String,
    pub renewal_date: String,
}

pub struct SubscriptionRepository {
    conn: DatabaseConnection,
}

impl SubscriptionRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn create(
        &self,
        account_id: i32,
        input: SubscriptionInput,
    ) -> Result<billing_subscriptions::Model> {
        let now = chrono::Utc::now().to_rfc3339();

        let active = billing_subscriptions::ActiveModel {
            name: Set(input.name),
            price: Set(input.price),
            currency: Set(input.currency),
            frequency: Set(input.frequency),
            category: Set(input.category),
            payment_method: Set(input.payment_method),
            status: Set(input.status),
            start_date: Set(input.start_date),
            renewal_date: Set(input.renewal_date),
            account_id: Set(account_id),
            created_at: Set(now.clone()),
            updated_at: Set(now),
            ..Default::default()
        };

        active
            .insert(&self.conn)
            .await
            .map_err(anyhow::Error::from)
            .context("Failed to insert billing subscription")
    }

    pub async fn get(&self, id: i32) -> Result<Option<billing_subscriptions::Model>> {
        billing_subscriptions::Entity::find_by_id(id)
            .one(&self.conn)
            .await
            .map_err(anyhow::Error::from)
            .context("Failed to query billing subscription")
    }

    pub async fn list_by_account(
        &self,
        account_id: i32,
    ) -> Result<Vec<billing_subscriptions::Model>> {
        billing_subscriptions::Entity::find()
            .filter(billing_subscriptions::Column::AccountId.eq(account_id))
            .order_by_desc(billing_subscriptions::Column::Id)
            .all(&self.conn)
            .await
            .map_err(anyhow::Error::from)
            .context("Failed to list billing subscriptions")
    }

    pub async fn update(
        &self,
        id: i32,
        input: SubscriptionInput,
    ) -> Result<Option<billing_subscriptions::Model>> {
        let Some(model) = self.get(id).await? else {
            return Ok(None);
        };

        let mut active: billing_subscriptions::ActiveModel = model.into();
        active.name = Set(input.name);
        active.price = Set(input.price);
        active.currency = Set(input.currency);
        active.frequency = Set(input.frequency);
        active.category = Set(input.category);
        active.payment_method = Set(input.payment_method);
        active.status = Set(input.status);
        active.start_date = Set(input.start_date);
        active.renewal_date = Set(input.renewal_date);
        active.updated_at = Set(chrono::Utc::now().to_rfc3339());

        let updated = active
            .update(&self.conn)
            .await
            .map_err(anyhow::Error::from)
            .context("Failed to update billing subscription")?;

        Ok(Some(updated))
    }

    pub async fn set_status(&self, id: i32, status: &str) -> Result<Option<billing_subscriptions::Model>> {
        let Some(model) = self.get(id).await? else {
            return Ok(None);
        };

        let mut active: billing_subscriptions::ActiveModel = model.into();
        active.status = Set(status.to_string());
        active.updated_at = Set(chrono::Utc::now().to_rfc3339());

        let updated = active
            .update(&self.conn)
            .await
            .map_err(anyhow::Error::from)
            .context("Failed to update subscription status")?;

        Ok(Some(updated))
    }

    pub async fn delete(&self, id: i32) -> Result<bool> {
        let result = billing_subscriptions::Entity::delete_by_id(id)
            .exec(&self.conn)
            .await
            .context("Failed to delete billing subscription")?;

        Ok(result.rows_affected > 0)
    }
}
