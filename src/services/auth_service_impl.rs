//! `SeaORM` implementation of the [`AuthService`] trait.

use std::sync::Arc;

use tokio::task;
use tracing::info;

use crate::config::SecurityConfig;
use crate::crypto::{self, TokenKeeper};
use crate::db::{Account, NewAccount, Store};
use crate::services::auth_service::{AuthError, AuthService, SigninResult, SignupRequest};
use crate::services::mailer::Mailer;

/// Verification codes expire 5 minutes after issue.
const VERIFICATION_WINDOW_MS: i64 = 5 * 60 * 1000;
/// Password-reset codes get a 10 minute window.
const RESET_WINDOW_MS: i64 = 10 * 60 * 1000;

pub struct SeaOrmAuthService {
    store: Store,
    security: SecurityConfig,
    tokens: Arc<TokenKeeper>,
    mailer: Arc<Mailer>,
    dev_mode: bool,
}

impl SeaOrmAuthService {
    #[must_use]
    pub fn new(
        store: Store,
        security: SecurityConfig,
        tokens: Arc<TokenKeeper>,
        mailer: Arc<Mailer>,
        dev_mode: bool,
    ) -> Self {
        Self {
            store,
            security,
            tokens,
            mailer,
            dev_mode,
        }
    }

    /// Argon2 is CPU-intensive; run it on a blocking task so it cannot
    /// stall the async runtime.
    async fn hash_blocking(&self, secret: String) -> Result<String, AuthError> {
        let config = self.security.clone();
        task::spawn_blocking(move || crypto::hash_secret(&secret, &config))
            .await
            .map_err(|e| AuthError::Internal(format!("Hashing task panicked: {e}")))?
            .map_err(AuthError::from)
    }

    async fn verify_blocking(&self, candidate: String, hashed: String) -> Result<bool, AuthError> {
        task::spawn_blocking(move || crypto::verify_secret(&candidate, &hashed))
            .await
            .map_err(|e| AuthError::Internal(format!("Verification task panicked: {e}")))?
            .map_err(AuthError::from)
    }

    fn fingerprint(&self, value: &str) -> Result<String, AuthError> {
        crypto::fingerprint(value, self.security.hmac_key.as_bytes()).map_err(AuthError::from)
    }

    /// Issue a one-time code: log it in development, email it in
    /// production. The raw code never reaches the store.
    async fn dispatch_code(
        &self,
        email: &str,
        code: &str,
        subject: &str,
        window_minutes: u32,
        label: &str,
    ) -> Result<(), AuthError> {
        if self.dev_mode {
            info!("{label} code for {email}: {code}");
            return Ok(());
        }

        let html = format!(
            "<p>Your {label} code is <b>{code}</b></p>\
             <p>This code will expire in {window_minutes} minutes</p>"
        );
        self.mailer
            .send(email, subject, &html)
            .await
            .map_err(|e| AuthError::Internal(format!("Failed to send {label} code: {e}")))
    }
}

#[async_trait::async_trait]
impl AuthService for SeaOrmAuthService {
    async fn signup(&self, request: SignupRequest) -> Result<Account, AuthError> {
        if let Some(_existing) = self
            .store
            .accounts()
            .get_by_email(&request.email)
            .await?
        {
            return Err(AuthError::Conflict("Account already exists".to_string()));
        }

        let password_hash = self.hash_blocking(request.password).await?;

        let account = self
            .store
            .accounts()
            .create(NewAccount {
                email: request.email,
                username: request.username,
                first_name: request.first_name,
                last_name: request.last_name,
                password_hash,
            })
            .await
            .map_err(|e| {
                if crate::db::is_unique_violation(&e) {
                    AuthError::Conflict("Account already exists".to_string())
                } else {
                    AuthError::from(e)
                }
            })?;

        // Welcome mail is decoration, not part of the signup contract.
        let mailer = self.mailer.clone();
        let to = account.email.clone();
        let name = account.first_name.clone();
        tokio::spawn(async move {
            let html = format!("<p>Welcome to Gatehouse, {name}!</p>");
            mailer.notify(&to, "Welcome to Gatehouse", &html).await;
        });

        Ok(account)
    }

    async fn signin(
        &self,
        email: &str,
        password: &str,
        client_ip: &str,
    ) -> Result<SigninResult, AuthError> {
        let model = self
            .store
            .accounts()
            .get_model_by_email(email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        let is_valid = self
            .verify_blocking(password.to_string(), model.password_hash.clone())
            .await?;
        if !is_valid {
            return Err(AuthError::InvalidCredentials);
        }

        let account = Account::try_from(model)?;

        let token = self
            .tokens
            .issue(account.id, &account.email, account.verified)
            .map_err(AuthError::from)?;

        // Login alert is best-effort: isolated, logged on failure, never
        // allowed to fail the sign-in itself.
        let mailer = self.mailer.clone();
        let to = account.email.clone();
        let name = account.first_name.clone();
        let ip = client_ip.to_string();
        tokio::spawn(async move {
            let when = chrono::Utc::now().to_rfc2822();
            let html = format!(
                "<p>Hello {name},</p>\
                 <p>A new sign-in to your account was recorded at {when} from {ip}.</p>\
                 <p>If this was not you, reset your password immediately.</p>"
            );
            mailer.notify(&to, "New Login Alert", &html).await;
        });

        Ok(SigninResult { account, token })
    }

    async fn send_verification_code(&self, email: &str) -> Result<(), AuthError> {
        let account = self
            .store
            .accounts()
            .get_by_email(email)
            .await?
            .ok_or(AuthError::AccountNotFound)?;

        if account.verified {
            return Err(AuthError::Validation(
                "Account already verified".to_string(),
            ));
        }

        let code = crypto::generate_one_time_code();
        self.dispatch_code(&account.email, &code, "Verify your email", 5, "verification")
            .await?;

        let fingerprint = self.fingerprint(&code)?;
        self.store
            .accounts()
            .set_verification_code(account.id, fingerprint)
            .await?;

        Ok(())
    }

    async fn confirm_verification(&self, email: &str, code: &str) -> Result<(), AuthError> {
        let model = self
            .store
            .accounts()
            .get_model_by_email(email)
            .await?
            .ok_or(AuthError::AccountNotFound)?;

        if model.verified {
            return Err(AuthError::Validation(
                "Account already verified".to_string(),
            ));
        }

        let (Some(stored), Some(sent_at)) =
            (model.verification_code.clone(), model.verification_code_sent_at)
        else {
            return Err(AuthError::Validation(
                "No verification code has been issued".to_string(),
            ));
        };

        if chrono::Utc::now().timestamp_millis() - sent_at > VERIFICATION_WINDOW_MS {
            return Err(AuthError::Validation(
                "Verification code expired".to_string(),
            ));
        }

        let fingerprint = self.fingerprint(code)?;
        if !crypto::constant_time_eq(&fingerprint, &stored) {
            return Err(AuthError::Validation(
                "Invalid verification code".to_string(),
            ));
        }

        self.store.accounts().mark_verified(model.id).await?;
        Ok(())
    }

    async fn change_password(
        &self,
        account_id: i32,
        verified: bool,
        old_password: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        if !verified {
            return Err(AuthError::Unauthorized);
        }

        let model = self
            .store
            .accounts()
            .get_model_by_id(account_id)
            .await?
            .ok_or(AuthError::AccountNotFound)?;

        let old_valid = self
            .verify_blocking(old_password.to_string(), model.password_hash.clone())
            .await?;
        if !old_valid {
            return Err(AuthError::InvalidCredentials);
        }

        let same = self
            .verify_blocking(new_password.to_string(), model.password_hash.clone())
            .await?;
        if same {
            return Err(AuthError::Validation(
                "New password cannot be the same as the old password".to_string(),
            ));
        }

        let new_hash = self.hash_blocking(new_password.to_string()).await?;
        self.store
            .accounts()
            .update_password(account_id, new_hash)
            .await?;

        Ok(())
    }

    async fn send_reset_code(&self, email: &str) -> Result<(), AuthError> {
        let account = self
            .store
            .accounts()
            .get_by_email(email)
            .await?
            .ok_or(AuthError::AccountNotFound)?;

        let code = crypto::generate_one_time_code();
        self.dispatch_code(
            &account.email,
            &code,
            "Forgot Password Verification Code",
            10,
            "password reset",
        )
        .await?;

        let fingerprint = self.fingerprint(&code)?;
        self.store
            .accounts()
            .set_reset_code(account.id, fingerprint)
            .await?;

        Ok(())
    }

    async fn reset_password(
        &self,
        email: &str,
        code: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        let model = self
            .store
            .accounts()
            .get_model_by_email(email)
            .await?
            .ok_or(AuthError::AccountNotFound)?;

        let (Some(stored), Some(sent_at)) = (model.reset_code.clone(), model.reset_code_sent_at)
        else {
            return Err(AuthError::Validation(
                "No reset code has been issued".to_string(),
            ));
        };

        if chrono::Utc::now().timestamp_millis() - sent_at > RESET_WINDOW_MS {
            return Err(AuthError::Validation("Reset code expired".to_string()));
        }

        let fingerprint = self.fingerprint(code)?;
        if !crypto::constant_time_eq(&fingerprint, &stored) {
            return Err(AuthError::Validation("Invalid reset code".to_string()));
        }

        let same = self
            .verify_blocking(new_password.to_string(), model.password_hash.clone())
            .await?;
        if same {
            return Err(AuthError::Validation(
                "New password cannot be the same as the old password".to_string(),
            ));
        }

        let new_hash = self.hash_blocking(new_password.to_string()).await?;
        self.store
            .accounts()
            .apply_password_reset(model.id, new_hash)
            .await?;

        Ok(())
    }

    async fn delete_account(
        &self,
        account_id: i32,
        email: &str,
        password: &str,
        confirmation: &str,
    ) -> Result<(), AuthError> {
        let model = self
            .store
            .accounts()
            .get_model_by_email(email)
            .await?
            .ok_or(AuthError::AccountNotFound)?;

        if model.id != account_id {
            return Err(AuthError::Validation(
                "You are not authorized to delete this account".to_string(),
            ));
        }

        let is_valid = self
            .verify_blocking(password.to_string(), model.password_hash.clone())
            .await?;
        if !is_valid {
            return Err(AuthError::Validation("Incorrect password".to_string()));
        }

        if confirmation != self.security.delete_confirmation_phrase {
            return Err(AuthError::Validation(format!(
                "Please type '{}' to confirm",
                self.security.delete_confirmation_phrase
            )));
        }

        // Explicit cascade: the key row must not outlive its owner.
        self.store.api_keys().delete_by_account(account_id).await?;
        self.store.accounts().delete(account_id).await?;

        info!("Account {account_id} deleted");
        Ok(())
    }

    async fn update_profile(
        &self,
        account_id: i32,
        first_name: String,
        last_name: Option<String>,
        username: Option<String>,
    ) -> Result<Account, AuthError> {
        self.store
            .accounts()
            .update_profile(account_id, first_name, last_name, username)
            .await
            .map_err(|e| {
                if crate::db::is_unique_violation(&e) {
                    AuthError::Conflict("Username already taken".to_string())
                } else {
                    AuthError::from(e)
                }
            })?
            .ok_or(AuthError::AccountNotFound)
    }
}
