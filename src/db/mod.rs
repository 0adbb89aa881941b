use anyhow::Result;
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbErr, Statement};
use std::path::Path;
use std::time::Duration;
use tracing::info;

pub mod migrator;
pub mod repositories;

pub use repositories::account::{Account, AccountRepository, NewAccount};
pub use repositories::api_key::ApiKeyRepository;
pub use repositories::newsletter::NewsletterRepository;
pub use repositories::post::PostRepository;
pub use repositories::short_url::ShortUrlRepository;
pub use repositories::subscription::SubscriptionRepository;

/// Explicitly constructed store handle, opened at process start and
/// injected into services; there are no module-level connections.
#[derive(Clone)]
pub struct Store {
    pub conn: DatabaseConnection,
}

impl Store {
    pub async fn new(db_url: &str) -> Result<Self> {
        Self::with_pool_options(db_url, 5, 1).await
    }

    pub async fn with_pool_options(
        db_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self> {
        use sea_orm_migration::MigratorTrait;

        if !db_url.contains(":memory:") {
            let path_str = db_url.trim_start_matches("sqlite:");
            if let Some(parent) = Path::new(path_str).parent() {
                tokio::fs::create_dir_all(parent).await.ok();
            }
            if !Path::new(path_str).exists() {
                std::fs::File::create(path_str)?;
            }
        }

        let mut opt = ConnectOptions::new(db_url.to_string());
        opt.max_connections(max_connections)
            .min_connections(min_connections)
            .connect_timeout(Duration::from_secs(10))
            .acquire_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(300))
            .max_lifetime(Duration::from_secs(600))
            .sqlx_logging(false);

        let conn = Database::connect(opt).await?;

        migrator::Migrator::up(&conn, None).await?;

        info!(
            "Database connected & migrations applied (pool: {}-{})",
            min_connections, max_connections
        );

        Ok(Self { conn })
    }

    pub async fn ping(&self) -> Result<()> {
        let backend = self.conn.get_database_backend();
        self.conn
            .query_one(Statement::from_string(backend, "SELECT 1".to_string()))
            .await?;
        Ok(())
    }

    #[must_use]
    pub fn accounts(&self) -> repositories::account::AccountRepository {
        repositories::account::AccountRepository::new(self.conn.clone())
    }

    #[must_use]
    pub fn api_keys(&self) -> repositories::api_key::ApiKeyRepository {
        repositories::api_key::ApiKeyRepository::new(self.conn.clone())
    }

    #[must_use]
    pub fn short_urls(&self) -> repositories::short_url::ShortUrlRepository {
        repositories::short_url::ShortUrlRepository::new(self.conn.clone())
    }

    #[must_use]
    pub fn posts(&self) -> repositories::post::PostRepository {
        repositories::post::PostRepository::new(self.conn.clone())
    }

    #[must_use]
    pub fn newsletter(&self) -> repositories::newsletter::NewsletterRepository {
        repositories::newsletter::NewsletterRepository::new(self.conn.clone())
    }

    #[must_use]
    pub fn subscriptions(&self) -> repositories::subscription::SubscriptionRepository {
        repositories::subscription::SubscriptionRepository::new(self.conn.clone())
    }
}

/// True when the error is a store-level unique-constraint rejection.
///
/// Uniqueness (one API key per account, unique email/lookup hash/short
/// code) is enforced by indexes, so two racing writes resolve here and
/// the caller translates the loser into the same conflict response as
/// the pre-check.
#[must_use]
pub fn is_unique_violation(err: &anyhow::Error) -> bool {
    err.downcast_ref::<DbErr>()
        .and_then(sea_orm::DbErr::sql_err)
        .is_some_and(|sql_err| matches!(sql_err, sea_orm::SqlErr::UniqueConstraintViolation(_)))
}
