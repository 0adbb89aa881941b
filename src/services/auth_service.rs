//! Domain service for accounts, credentials, and API keys.
//!
//! Handles signup, sign-in, email verification, password change/reset,
//! account deletion, and the one-key-per-account API key lifecycle.

use serde::Serialize;
use thiserror::Error;

use crate::db::Account;

/// Errors specific to authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Account not found")]
    AccountNotFound,

    #[error("API key not found")]
    ApiKeyNotFound,

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sea_orm::DbErr> for AuthError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<anyhow::Error> for AuthError {
    fn from(err: anyhow::Error) -> Self {
        if crate::db::is_unique_violation(&err) {
            Self::Conflict("Record already exists".to_string())
        } else {
            Self::Internal(err.to_string())
        }
    }
}

/// Signup payload; the password is plaintext here and hashed before it
/// reaches the store. No Debug impl, so the password cannot end up in a
/// log line by accident.
pub struct SignupRequest {
    pub email: String,
    pub username: Option<String>,
    pub first_name: String,
    pub last_name: Option<String>,
    pub password: String,
}

/// Sign-in result: the resolved account plus a signed session token.
#[derive(Debug, Clone, Serialize)]
pub struct SigninResult {
    #[serde(skip)]
    pub account: Account,
    pub token: String,
}

/// Domain service trait for authentication and account management.
#[async_trait::async_trait]
pub trait AuthService: Send + Sync {
    /// Creates an account; hashes the password before persistence and
    /// dispatches a best-effort welcome email.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Conflict`] when the email is taken.
    async fn signup(&self, request: SignupRequest) -> Result<Account, AuthError>;

    /// Verifies credentials, issues a session token, and dispatches a
    /// best-effort login alert (its failure never fails the sign-in).
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidCredentials`] if verification fails.
    async fn signin(
        &self,
        email: &str,
        password: &str,
        client_ip: &str,
    ) -> Result<SigninResult, AuthError>;

    /// Issues a 6-digit verification code; only the fingerprint is
    /// stored. In development the code is logged instead of emailed.
    async fn send_verification_code(&self, email: &str) -> Result<(), AuthError>;

    /// Confirms a verification code within its 5-minute window and marks
    /// the account verified.
    async fn confirm_verification(&self, email: &str, code: &str) -> Result<(), AuthError>;

    /// Changes a password after re-verifying the old one. Only verified
    /// accounts may change their password.
    async fn change_password(
        &self,
        account_id: i32,
        verified: bool,
        old_password: &str,
        new_password: &str,
    ) -> Result<(), AuthError>;

    /// Issues a password-reset code (10-minute window).
    async fn send_reset_code(&self, email: &str) -> Result<(), AuthError>;

    /// Completes a password reset given a valid code.
    async fn reset_password(
        &self,
        email: &str,
        code: &str,
        new_password: &str,
    ) -> Result<(), AuthError>;

    /// Deletes the caller's account after a password re-check and a
    /// typed confirmation phrase. The API key cascades.
    async fn delete_account(
        &self,
        account_id: i32,
        email: &str,
        password: &str,
        confirmation: &str,
    ) -> Result<(), AuthError>;

    /// Updates profile fields (owner only; ownership checked upstream).
    async fn update_profile(
        &self,
        account_id: i32,
        first_name: String,
        last_name: Option<String>,
        username: Option<String>,
    ) -> Result<Account, AuthError>;
}

/// API key lifecycle and resolution, separate from session tokens.
#[async_trait::async_trait]
pub trait ApiKeyService: Send + Sync {
    /// Generates a key for the account. Exactly one key per account:
    /// a second create is rejected with [`AuthError::Conflict`], whether
    /// it loses the pre-check or the unique-index race.
    ///
    /// Returns the plaintext key; this is the only time it is freshly
    /// generated and shown.
    async fn create_key(&self, account_id: i32) -> Result<String, AuthError>;

    /// Decrypts and re-displays the owner's key.
    async fn reveal_key(&self, account_id: i32) -> Result<String, AuthError>;

    /// Replaces the key in place; the old plaintext stops resolving
    /// atomically. Returns the new plaintext.
    async fn rotate_key(&self, account_id: i32) -> Result<String, AuthError>;

    /// Deletes the account's key.
    async fn delete_key(&self, account_id: i32) -> Result<(), AuthError>;

    /// Resolves a presented key to its owner: fingerprint lookup, then a
    /// defense-in-depth check of the verification hash, then a ban check.
    /// Returns `None` for anything that does not resolve cleanly.
    async fn resolve_key(&self, presented: &str) -> Result<Option<Account>, AuthError>;
}
