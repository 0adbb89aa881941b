use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "newsletter_providers")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub name: String,

    #[sea_orm(unique)]
    pub email: String,

    pub email_verified: bool,

    /// Argon2 hash; re-checked before destructive/config actions.
    pub password_hash: String,

    pub sender_name: Option<String>,

    pub mail_address: Option<String>,

    pub mail_service: Option<String>,

    /// Relay password under AES-256-GCM with a key derived from the
    /// provider's own password, so decryption needs the operator to
    /// re-supply it.
    pub mail_password_encrypted: Option<String>,

    pub created_at: String,

    pub updated_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
