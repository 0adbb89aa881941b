use anyhow::Result;
use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};

use crate::config::SecurityConfig;

/// Hash a secret using Argon2id with the configured cost parameters.
///
/// Each call draws a fresh salt, so the output is non-deterministic and
/// must never be used as a lookup index (see `fingerprint` for that).
pub fn hash_secret(secret: &str, config: &SecurityConfig) -> Result<String> {
    if secret.trim().is_empty() {
        anyhow::bail!("Value to hash must be a non-empty string");
    }

    let params = Params::new(
        config.argon2_memory_cost_kib,
        config.argon2_time_cost,
        config.argon2_parallelism,
        None,
    )
    .map_err(|e| anyhow::anyhow!("Invalid Argon2 params: {e}"))?;

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);
    let salt = SaltString::generate(&mut OsRng);

    let hash = argon2
        .hash_password(secret.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Failed to hash secret: {e}"))?;

    Ok(hash.to_string())
}

/// Verify a candidate against a stored hash.
///
/// Argon2's verifier recomputes the full hash and compares in constant
/// time; a mismatch position never changes the timing.
pub fn verify_secret(candidate: &str, hashed: &str) -> Result<bool> {
    if candidate.is_empty() {
        return Ok(false);
    }

    let parsed_hash = PasswordHash::new(hashed)
        .map_err(|e| anyhow::anyhow!("Invalid password hash format: {e}"))?;

    Ok(Argon2::default()
        .verify_password(candidate.as_bytes(), &parsed_hash)
        .is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> SecurityConfig {
        // Minimal cost so the suite stays fast.
        SecurityConfig {
            argon2_memory_cost_kib: 8,
            argon2_time_cost: 1,
            argon2_parallelism: 1,
            ..SecurityConfig::default()
        }
    }

    #[test]
    fn hash_then_verify_roundtrip() {
        let config = test_config();
        let hash = hash_secret("correct horse battery staple", &config).unwrap();
        assert!(verify_secret("correct horse battery staple", &hash).unwrap());
        assert!(!verify_secret("correct horse battery stale", &hash).unwrap());
    }

    #[test]
    fn hashes_are_salted() {
        let config = test_config();
        let a = hash_secret("same-input", &config).unwrap();
        let b = hash_secret("same-input", &config).unwrap();
        assert_ne!(a, b);
        assert!(verify_secret("same-input", &a).unwrap());
        assert!(verify_secret("same-input", &b).unwrap());
    }

    #[test]
    fn empty_input_is_rejected() {
        let config = test_config();
        assert!(hash_secret("", &config).is_err());
        assert!(hash_secret("   ", &config).is_err());
    }

    #[test]
    fn empty_candidate_never_verifies() {
        let config = test_config();
        let hash = hash_secret("something", &config).unwrap();
        assert!(!verify_secret("", &hash).unwrap());
    }
}
