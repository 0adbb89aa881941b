use anyhow::{Context, Result};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};

use crate::entities::short_urls;

pub struct ShortUrlRepository {
    conn: DatabaseConnection,
}

impl ShortUrlRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn create(
        &self,
        full_url: &str,
        short_code: &str,
        created_by: i32,
    ) -> Result<short_urls::Model> {
        let now = chrono::Utc::now().to_rfc3339();

        let active = short_urls::ActiveModel {
            full_url: Set(full_url.to_string()),
            short_code: Set(short_code.to_string()),
            clicks: Set(0),
            created_by: Set(created_by),
            created_at: Set(now.clone()),
            updated_at: Set(now),
            ..Default::default()
        };

        active
            .insert(&self.conn)
            .await
            .map_err(anyhow::Error::from)
            .context("Failed to insert short URL")
    }

    pub async fn get_by_id(&self, id: i32) -> Result<Option<short_urls::Model>> {
        short_urls::Entity::find_by_id(id)
            .one(&self.conn)
            .await
            .map_err(anyhow::Error::from)
            .context("Failed to query short URL by id")
    }

    pub async fn get_by_code(&self, code: &str) -> Result<Option<short_urls::Model>> {
        short_urls::Entity::find()
            .filter(short_urls::Column::ShortCode.eq(code))
            .one(&self.conn)
            .await
            .map_err(anyhow::Error::from)
            .context("Failed to query short URL by code")
    }

    pub async fn get_by_full_url(&self, full_url: &str) -> Result<Option<short_urls::Model>> {
        short_urls::Entity::find()
            .filter(short_urls::Column::FullUrl.eq(full_url))
            .one(&self.conn)
            .await
            .map_err(anyhow::Error::from)
            .context("Failed to query short URL by full URL")
    }

    pub async fn list_by_creator(&self, account_id: i32) -> Result<Vec<short_urls::Model>> {
        short_urls::Entity::find()
            .filter(short_urls::Column::CreatedBy.eq(account_id))
            .order_by_desc(short_urls::Column::Id)
            .all(&self.conn)
            .await
            .map_err(anyhow::Error::from)
            .context("Failed to list short URLs by creator")
    }

    pub async fn list_all(&self) -> Result<Vec<short_urls::Model>> {
        short_urls::Entity::find()
            .order_by_desc(short_urls::Column::Id)
            .all(&self.conn)
            .await
            .map_err(anyhow::Error::from)
            .context("Failed to list short URLs")
    }

    pub async fn increment_clicks(&self, id: i32) -> Result<()> {
        let Some(model) = self.get_by_id(id).await? else {
            return Ok(());
        };

        let clicks = model.clicks + 1;
        let mut active: short_urls::ActiveModel = model.into();
        active.clicks = Set(clicks);
        active.update(&self.conn).await?;

        Ok(())
    }

    pub async fn update(
        &self,
        id: i32,
        full_url: Option<String>,
        short_code: Option<String>,
    ) -> Result<Option<short_urls::Model>> {
        let Some(model) = self.get_by_id(id).await? else {
            return Ok(None);
        };

        let mut active: short_urls::ActiveModel = model.into();
        if let Some(full_url) = full_url {
            active.full_url = Set(full_url);
        }
        if let Some(short_code) = short_code {
            active.short_code = Set(short_code);
        }
        active.updated_at = Set(chrono::Utc::now().to_rfc3339());

        let updated = active
            .update(&self.conn)
            .await
            .map_err(anyhow::Error::from)
            .context("Failed to update short URL")?;

        Ok(Some(updated))
    }

    pub async fn delete(&self, id: i32) -> Result<bool> {
        let result = short_urls::Entity::delete_by_id(id)
            .exec(&self.conn)
            .await
            .context("Failed to delete short URL")?;

        Ok(result.rows_affected > 0)
    }
}
