use anyhow::Result;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

/// Claims embedded in issued session tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the account id.
    pub sub: i32,
    pub email: String,
    pub verified: bool,
    /// Issued-at (seconds since epoch).
    pub iat: usize,
    /// Expiry (seconds since epoch), enforced server-side.
    pub exp: usize,
}

/// Issues and verifies HMAC-signed session tokens.
pub struct TokenKeeper {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    lifetime_secs: u64,
}

impl TokenKeeper {
    #[must_use]
    pub fn new(secret: &str, lifetime_secs: u64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            lifetime_secs,
        }
    }

    /// Issue a token for the given account identity.
    pub fn issue(&self, account_id: i32, email: &str, verified: bool) -> Result<String> {
        #[allow(clippy::cast_possible_truncation)]
        let iat = jsonwebtoken::get_current_timestamp() as usize;
        let claims = Claims {
            sub: account_id,
            email: email.to_string(),
            verified,
            iat,
            exp: iat + self.lifetime_secs as usize,
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| anyhow::anyhow!("Token encoding failed: {e}"))
    }

    /// Verify signature and expiry, returning the claims.
    ///
    /// Malformed, tampered, and expired tokens all fail here; callers map
    /// every failure to the same generic unauthorized response.
    pub fn verify(&self, token: &str) -> Result<Claims> {
        let data = decode::<Claims>(token, &self.decoding_key, &Validation::default())
            .map_err(|e| anyhow::anyhow!("Invalid token: {e}"))?;
        Ok(data.claims)
    }

    #[must_use]
    pub const fn lifetime_secs(&self) -> u64 {
        self.lifetime_secs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issue_then_verify() {
        let keeper = TokenKeeper::new("unit-test-secret", 3600);
        let token = keeper.issue(7, "a@b.com", true).unwrap();
        let claims = keeper.verify(&token).unwrap();
        assert_eq!(claims.sub, 7);
        assert_eq!(claims.email, "a@b.com");
        assert!(claims.verified);
        assert_eq!(claims.exp, claims.iat + 3600);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let keeper = TokenKeeper::new("secret-one", 3600);
        let other = TokenKeeper::new("secret-two", 3600);
        let token = keeper.issue(1, "a@b.com", false).unwrap();
        assert!(other.verify(&token).is_err());
    }

    #[test]
    fn tampered_signature_is_rejected() {
        let keeper = TokenKeeper::new("unit-test-secret", 3600);
        let token = keeper.issue(1, "a@b.com", false).unwrap();
        let mut tampered = token.clone();
        tampered.pop();
        tampered.push(if token.ends_with('A') { 'B' } else { 'A' });
        assert!(keeper.verify(&tampered).is_err());
    }

    #[test]
    fn expired_token_is_rejected() {
        // jsonwebtoken applies a default 60s leeway, so back-date past it.
        let keeper = TokenKeeper::new("unit-test-secret", 3600);
        #[allow(clippy::cast_possible_truncation)]
        let now = jsonwebtoken::get_current_timestamp() as usize;
        let claims = Claims {
            sub: 1,
            email: "a@b.com".to_string(),
            verified: false,
            iat: now - 7200,
            exp: now - 3600,
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(b"unit-test-secret"),
        )
        .unwrap();
        assert!(keeper.verify(&token).is_err());
    }

    #[test]
    fn garbage_is_rejected() {
        let keeper = TokenKeeper::new("unit-test-secret", 3600);
        assert!(keeper.verify("not.a.token").is_err());
        assert!(keeper.verify("").is_err());
    }
}
