use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{AeadCore, Aes256Gcm, Nonce};
use anyhow::Result;
use sha2::{Digest, Sha256};

/// AES-GCM nonce length in bytes.
const NONCE_LEN: usize = 12;

/// Encrypt a plaintext secret under a 32-byte key.
///
/// Output is `hex(nonce):hex(ciphertext)`; the nonce is drawn fresh per
/// call, so encrypting the same value twice yields different blobs that
/// both decrypt to the original. GCM authenticates the ciphertext, so
/// tampering is detected at decrypt time.
pub fn encrypt(plaintext: &str, key: &[u8; 32]) -> Result<String> {
    let cipher =
        Aes256Gcm::new_from_slice(key).map_err(|e| anyhow::anyhow!("Invalid AES key: {e}"))?;
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

    let ciphertext = cipher
        .encrypt(&nonce, plaintext.as_bytes())
        .map_err(|e| anyhow::anyhow!("Encryption failed: {e}"))?;

    Ok(format!(
        "{}:{}",
        hex::encode(nonce.as_slice()),
        hex::encode(ciphertext)
    ))
}

/// Decrypt a blob produced by [`encrypt`].
pub fn decrypt(blob: &str, key: &[u8; 32]) -> Result<String> {
    let (nonce_hex, ciphertext_hex) = blob
        .split_once(':')
        .ok_or_else(|| anyhow::anyhow!("Malformed ciphertext blob"))?;

    let nonce_bytes = hex::decode(nonce_hex)
        .map_err(|e| anyhow::anyhow!("Invalid hex in ciphertext nonce: {e}"))?;
    if nonce_bytes.len() != NONCE_LEN {
        anyhow::bail!(
            "Nonce must be {NONCE_LEN} bytes, got {}",
            nonce_bytes.len()
        );
    }

    let ciphertext =
        hex::decode(ciphertext_hex).map_err(|e| anyhow::anyhow!("Invalid hex in ciphertext: {e}"))?;

    let cipher =
        Aes256Gcm::new_from_slice(key).map_err(|e| anyhow::anyhow!("Invalid AES key: {e}"))?;
    let nonce = Nonce::from_slice(&nonce_bytes);

    let plaintext = cipher
        .decrypt(nonce, ciphertext.as_ref())
        .map_err(|_| anyhow::anyhow!("Decryption failed (wrong key or corrupted data)"))?;

    String::from_utf8(plaintext).map_err(|e| anyhow::anyhow!("Decrypted value is not UTF-8: {e}"))
}

/// Derive a 32-byte key from an operator-supplied password.
///
/// Used for mail-relay secrets: the derived key is never persisted, so
/// decryption is only possible while the operator re-supplies the same
/// provider password.
#[must_use]
pub fn derive_key(password: &str) -> [u8; 32] {
    let digest = Sha256::digest(password.as_bytes());
    let mut key = [0u8; 32];
    key.copy_from_slice(&digest);
    key
}

/// Encrypt under a key derived from `password`.
pub fn encrypt_with_password(plaintext: &str, password: &str) -> Result<String> {
    encrypt(plaintext, &derive_key(password))
}

/// Decrypt under a key derived from `password`.
pub fn decrypt_with_password(blob: &str, password: &str) -> Result<String> {
    decrypt(blob, &derive_key(password))
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: [u8; 32] = [0x42; 32];

    #[test]
    fn roundtrip_encrypt_decrypt() {
        let blob = encrypt("my-secret-value", &KEY).unwrap();
        assert_eq!(decrypt(&blob, &KEY).unwrap(), "my-secret-value");
    }

    #[test]
    fn fresh_nonce_per_call() {
        let a = encrypt("same-plaintext", &KEY).unwrap();
        let b = encrypt("same-plaintext", &KEY).unwrap();
        assert_ne!(a, b);
        assert_eq!(decrypt(&a, &KEY).unwrap(), "same-plaintext");
        assert_eq!(decrypt(&b, &KEY).unwrap(), "same-plaintext");
    }

    #[test]
    fn wrong_key_fails() {
        let blob = encrypt("secret", &KEY).unwrap();
        let other = [0x43; 32];
        assert!(decrypt(&blob, &other).is_err());
    }

    #[test]
    fn tampered_ciphertext_fails() {
        let blob = encrypt("secret", &KEY).unwrap();
        let (nonce, ct) = blob.split_once(':').unwrap();
        let mut bytes = hex::decode(ct).unwrap();
        bytes[0] ^= 0x01;
        let tampered = format!("{nonce}:{}", hex::encode(bytes));
        assert!(decrypt(&tampered, &KEY).is_err());
    }

    #[test]
    fn malformed_blob_fails() {
        assert!(decrypt("not-a-blob", &KEY).is_err());
        assert!(decrypt("abcd:zzzz", &KEY).is_err());
        assert!(decrypt("ab:cdef", &KEY).is_err());
    }

    #[test]
    fn password_derived_roundtrip() {
        let blob = encrypt_with_password("relay-password", "provider-password").unwrap();
        assert_eq!(
            decrypt_with_password(&blob, "provider-password").unwrap(),
            "relay-password"
        );
        assert!(decrypt_with_password(&blob, "wrong-password").is_err());
    }

    #[test]
    fn derive_key_is_deterministic() {
        assert_eq!(derive_key("abc"), derive_key("abc"));
        assert_ne!(derive_key("abc"), derive_key("abd"));
    }
}
