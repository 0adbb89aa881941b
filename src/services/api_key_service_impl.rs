//! `SeaORM` implementation of the [`ApiKeyService`] trait.
//!
//! Three digests per key: a deterministic HMAC fingerprint for the
//! indexed lookup, an AES-GCM blob for re-display, and an Argon2 hash
//! as a post-lookup confirmation. Lookup never touches the adaptive
//! hash - a salted hash is non-deterministic per call and can never
//! match an equality query.

use tokio::task;
use tracing::warn;

use crate::config::SecurityConfig;
use crate::crypto;
use crate::db::{Account, Store};
use crate::services::auth_service::{ApiKeyService, AuthError};

pub struct SeaOrmApiKeyService {
    store: Store,
    security: SecurityConfig,
    cipher_key: [u8; 32],
}

impl SeaOrmApiKeyService {
    #[must_use]
    pub const fn new(store: Store, security: SecurityConfig, cipher_key: [u8; 32]) -> Self {
        Self {
            store,
            security,
            cipher_key,
        }
    }

    /// Produce the three digests for a plaintext key.
    async fn digest_key(&self, plaintext: String) -> Result<(String, String, String), AuthError> {
        let lookup_hash = crypto::fingerprint(&plaintext, self.security.hmac_key.as_bytes())?;
        let encrypted_secret = crypto::encrypt(&plaintext, &self.cipher_key)?;

        let config = self.security.clone();
        let verification_hash =
            task::spawn_blocking(move || crypto::hash_secret(&plaintext, &config))
                .await
                .map_err(|e| AuthError::Internal(format!("Hashing task panicked: {e}")))??;

        Ok((lookup_hash, encrypted_secret, verification_hash))
    }
}

#[async_trait::async_trait]
impl ApiKeyService for SeaOrmApiKeyService {
    async fn create_key(&self, account_id: i32) -> Result<String, AuthError> {
        if self
            .store
            .api_keys()
            .get_by_account(account_id)
            .await?
            .is_some()
        {
            return Err(AuthError::Conflict(
                "You can only have one API key".to_string(),
            ));
        }

        let plaintext = crypto::generate_api_key();
        let (lookup_hash, encrypted_secret, verification_hash) =
            self.digest_key(plaintext.clone()).await?;

        // A concurrent create can still win the race past the pre-check;
        // the unique index on account_id rejects the loser and it gets
        // the same conflict answer.
        self.store
            .api_keys()
            .create(account_id, lookup_hash, encrypted_secret, verification_hash)
            .await
            .map_err(|e| {
                if crate::db::is_unique_violation(&e) {
                    AuthError::Conflict("You can only have one API key".to_string())
                } else {
                    AuthError::from(e)
                }
            })?;

        Ok(plaintext)
    }

    async fn reveal_key(&self, account_id: i32) -> Result<String, AuthError> {
        let record = self
            .store
            .api_keys()
            .get_by_account(account_id)
            .await?
            .ok_or(AuthError::ApiKeyNotFound)?;

        crypto::decrypt(&record.encrypted_secret, &self.cipher_key)
            .map_err(|e| AuthError::Internal(format!("Failed to decrypt API key: {e}")))
    }

    async fn rotate_key(&self, account_id: i32) -> Result<String, AuthError> {
        if self
            .store
            .api_keys()
            .get_by_account(account_id)
            .await?
            .is_none()
        {
            return Err(AuthError::ApiKeyNotFound);
        }

        let plaintext = crypto::generate_api_key();
        let (lookup_hash, encrypted_secret, verification_hash) =
            self.digest_key(plaintext.clone()).await?;

        self.store
            .api_keys()
            .rotate(account_id, lookup_hash, encrypted_secret, verification_hash)
            .await?
            .ok_or(AuthError::ApiKeyNotFound)?;

        Ok(plaintext)
    }

    async fn delete_key(&self, account_id: i32) -> Result<(), AuthError> {
        let deleted = self.store.api_keys().delete_by_account(account_id).await?;
        if deleted {
            Ok(())
        } else {
            Err(AuthError::ApiKeyNotFound)
        }
    }

    async fn resolve_key(&self, presented: &str) -> Result<Option<Account>, AuthError> {
        let Ok(lookup_hash) = crypto::fingerprint(presented, self.security.hmac_key.as_bytes())
        else {
            return Ok(None);
        };

        let Some(record) = self.store.api_keys().get_by_lookup_hash(&lookup_hash).await? else {
            return Ok(None);
        };

        // Defense in depth: the fingerprint already matched, but the
        // adaptive hash confirms against the stored row as well.
        let candidate = presented.to_string();
        let stored_hash = record.verification_hash.clone();
        let confirmed = task::spawn_blocking(move || crypto::verify_secret(&candidate, &stored_hash))
            .await
            .map_err(|e| AuthError::Internal(format!("Verification task panicked: {e}")))??;

        if !confirmed {
            warn!(
                account_id = record.account_id,
                "API key fingerprint matched but verification hash did not"
            );
            return Ok(None);
        }

        let Some(account) = self.store.accounts().get_by_id(record.account_id).await? else {
            return Ok(None);
        };

        if account.is_banned {
            return Ok(None);
        }

        Ok(Some(account))
    }
}
