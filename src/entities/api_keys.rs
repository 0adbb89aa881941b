use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "api_keys")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    /// Exactly one key per account; the unique index arbitrates races
    /// between concurrent create requests.
    #[sea_orm(unique)]
    pub account_id: i32,

    /// Deterministic HMAC fingerprint of the plaintext key, used as the
    /// O(1) lookup index.
    #[sea_orm(unique)]
    pub lookup_hash: String,

    /// Plaintext key under AES-256-GCM with the system key, so the owner
    /// can re-display it.
    pub encrypted_secret: String,

    /// Argon2 hash of the plaintext key; post-lookup confirmation only,
    /// never used for lookup.
    pub verification_hash: String,

    pub created_at: String,

    pub updated_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::accounts::Entity",
        from = "Column::AccountId",
        to = "super::accounts::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Accounts,
}

impl Related<super::accounts::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Accounts.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
