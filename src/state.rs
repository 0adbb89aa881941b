use std::sync::Arc;

use crate::config::Config;
use crate::crypto::TokenKeeper;
use crate::db::Store;
use crate::services::{
    ApiKeyService, AuthService, Mailer, NewsletterService, SeaOrmApiKeyService, SeaOrmAuthService,
    SeaOrmNewsletterService,
};

/// Explicitly constructed application state: the store is opened once at
/// process start and every service is injected here, never imported as
/// an ambient singleton.
#[derive(Clone)]
pub struct SharedState {
    pub config: Config,

    pub store: Store,

    pub mailer: Arc<Mailer>,

    pub tokens: Arc<TokenKeeper>,

    pub auth_service: Arc<dyn AuthService>,

    pub api_key_service: Arc<dyn ApiKeyService>,

    pub newsletter_service: Arc<dyn NewsletterService>,
}

impl SharedState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        // validate() already ran at boot, but constructing from a config
        // directly (tests) must hit the same wall.
        config.validate()?;

        let store = Store::with_pool_options(
            &config.general.database_path,
            config.general.max_db_connections,
            config.general.min_db_connections,
        )
        .await?;

        let dev_mode = !config.general.is_production();
        let mailer = Arc::new(Mailer::from_config(&config.mail, dev_mode)?);

        let tokens = Arc::new(TokenKeeper::new(
            &config.security.jwt_secret,
            config.security.token_lifetime_secs,
        ));

        let cipher_key = config.security.cipher_key()?;

        let auth_service = Arc::new(SeaOrmAuthService::new(
            store.clone(),
            config.security.clone(),
            tokens.clone(),
            mailer.clone(),
            dev_mode,
        )) as Arc<dyn AuthService + Send + Sync + 'static>;

        let api_key_service = Arc::new(SeaOrmApiKeyService::new(
            store.clone(),
            config.security.clone(),
            cipher_key,
        )) as Arc<dyn ApiKeyService + Send + Sync + 'static>;

        let newsletter_service = Arc::new(SeaOrmNewsletterService::new(
            store.clone(),
            config.security.clone(),
        )) as Arc<dyn NewsletterService + Send + Sync + 'static>;

        Ok(Self {
            config,
            store,
            mailer,
            tokens,
            auth_service,
            api_key_service,
            newsletter_service,
        })
    }
}
