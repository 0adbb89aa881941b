//! Credential primitives: one-way hashing, keyed fingerprinting,
//! reversible encryption, session tokens, and secret generation.
//!
//! Everything here is deliberately small and synchronous; callers that
//! hash on a hot path run it on a blocking task.

pub mod cipher;
pub mod fingerprint;
pub mod keygen;
pub mod password;
pub mod token;

pub use cipher::{decrypt, decrypt_with_password, derive_key, encrypt, encrypt_with_password};
pub use fingerprint::{constant_time_eq, fingerprint};
pub use keygen::{generate_api_key, generate_one_time_code};
pub use password::{hash_secret, verify_secret};
pub use token::{Claims, TokenKeeper};
