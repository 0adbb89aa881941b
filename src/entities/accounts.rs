use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "accounts")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    /// Case-normalized (lowercased) before persistence.
    #[sea_orm(unique)]
    pub email: String,

    #[sea_orm(unique)]
    pub username: Option<String>,

    pub first_name: String,

    pub last_name: Option<String>,

    /// Argon2id hash; the plaintext is never stored or logged.
    pub password_hash: String,

    /// JSON array of role tags (see `models::role::RoleSet`).
    pub roles: String,

    pub verified: bool,

    /// HMAC fingerprint of the emailed 6-digit code, never the raw code.
    pub verification_code: Option<String>,

    /// Issue time in epoch milliseconds; codes expire 5 minutes later.
    pub verification_code_sent_at: Option<i64>,

    pub reset_code: Option<String>,

    /// Issue time in epoch milliseconds; reset codes get a 10 minute window.
    pub reset_code_sent_at: Option<i64>,

    pub is_banned: bool,

    /// Weak reference to a newsletter provider record.
    pub newsletter_provider_id: Option<i32>,

    pub created_at: String,

    pub updated_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
