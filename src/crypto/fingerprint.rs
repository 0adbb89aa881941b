use anyhow::Result;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Deterministic HMAC-SHA256 fingerprint of a secret, hex encoded.
///
/// Unlike the adaptive password hash this is stable across calls, so the
/// output can back an indexed equality lookup (API keys, one-time codes).
/// An absent key is a configuration fault, not a fallback case.
pub fn fingerprint(value: &str, key: &[u8]) -> Result<String> {
    if key.is_empty() {
        anyhow::bail!("Fingerprint key is not configured");
    }
    if value.is_empty() {
        anyhow::bail!("Value to fingerprint must be a non-empty string");
    }

    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| anyhow::anyhow!("Invalid fingerprint key: {e}"))?;
    mac.update(value.as_bytes());

    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Constant-time equality for fingerprint strings.
#[must_use]
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &[u8] = b"unit-test-fingerprint-key";

    #[test]
    fn fingerprint_is_deterministic() {
        let a = fingerprint("123456", KEY).unwrap();
        let b = fingerprint("123456", KEY).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn single_bit_change_diverges() {
        let a = fingerprint("123456", KEY).unwrap();
        let b = fingerprint("123457", KEY).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn key_changes_output() {
        let a = fingerprint("123456", KEY).unwrap();
        let b = fingerprint("123456", b"another-key").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn empty_key_fails_loudly() {
        assert!(fingerprint("123456", b"").is_err());
    }

    #[test]
    fn no_collisions_in_corpus() {
        let mut seen = std::collections::HashSet::new();
        for i in 0..1000 {
            assert!(seen.insert(fingerprint(&format!("code-{i}"), KEY).unwrap()));
        }
    }

    #[test]
    fn constant_time_eq_matches_semantics() {
        assert!(constant_time_eq("abc123", "abc123"));
        assert!(!constant_time_eq("abc123", "abc124"));
        assert!(!constant_time_eq("abc123", "abc12"));
    }
}
