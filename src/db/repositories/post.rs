use anyhow::{Context, Result};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};

use crate::entities::posts;

pub struct PostRepository {
    conn: DatabaseConnection,
}

impl PostRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn create(&self, title: &str, body: &str, account_id: i32) -> Result<posts::Model> {
        let now = chrono::Utc::now().to_rfc3339();

        let active = posts::ActiveModel {
            title: Set(title.to_string()),
            body: Set(body.to_string()),
            account_id: Set(account_id),
            edited: Set(false),
            created_at: Set(now.clone()),
            updated_at: Set(now),
            ..Default::default()
        };

        active
            .insert(&self.conn)
            .await
            .map_err(anyhow::Error::from)
            .context("Failed to insert post")
    }

    pub async fn get(&self, id: i32) -> Result<Option<posts::Model>> {
        posts::Entity::find_by_id(id)
            .one(&self.conn)
            .await
            .map_err(anyhow::Error::from)
            .context("Failed to query post")
    }

    pub async fn list_page(&self, page: u64, per_page: u64) -> Result<(Vec<posts::Model>, u64)> {
        let paginator = posts::Entity::find()
            .order_by_desc(posts::Column::Id)
            .paginate(&self.conn, per_page);

        let total_pages = paginator
            .num_pages()
            .await
            .context("Failed to count post pages")?;
        let models = paginator
            .fetch_page(page.saturating_sub(1))
            .await
            .context("Failed to fetch post page")?;

        Ok((models, total_pages))
    }

    pub async fn list_by_account(&self, account_id: i32) -> Result<Vec<posts::Model>> {
        posts::Entity::find()
            .filter(posts::Column::AccountId.eq(account_id))
            .order_by_desc(posts::Column::Id)
            .all(&self.conn)
            .await
            .map_err(anyhow::Error::from)
            .context("Failed to list posts by account")
    }

    pub async fn update(&self, id: i32, title: &str, body: &str) -> Result<Option<posts::Model>> {
        let Some(model) = self.get(id).await? else {
            return Ok(None);
        };

        let mut active: posts::ActiveModel = model.into();
        active.title = Set(title.to_string());
        active.body = Set(body.to_string());
        active.edited = Set(true);
        active.updated_at = Set(chrono::Utc::now().to_rfc3339());

        let updated = active
            .update(&self.conn)
            .await
            .map_err(anyhow::Error::from)
            .context("Failed to update post")?;

        Ok(Some(updated))
    }

    pub async fn delete(&self, id: i32) -> Result<bool> {
        let result = posts::Entity::delete_by_id(id)
            .exec(&self.conn)
            .await
            .context("Failed to delete post")?;

        Ok(result.rows_affected > 0)
    }
}
