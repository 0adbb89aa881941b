use anyhow::{Context, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as B64;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,

    pub server: ServerConfig,

    pub security: SecurityConfig,

    pub mail: MailConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub database_path: String,

    pub log_level: String,

    /// Runtime mode: "development" logs one-time codes instead of
    /// emailing them, "production" sends real mail and hardens cookies.
    pub environment: String,

    /// Number of tokio worker threads (default: 2)
    /// Set to 0 to use the number of CPU cores
    pub worker_threads: usize,

    /// Maximum database connections (default: 5)
    pub max_db_connections: u32,

    /// Minimum database connections (default: 1)
    pub min_db_connections: u32,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            database_path: "sqlite:data/gatehouse.db".to_string(),
            log_level: "info".to_string(),
            environment: "development".to_string(),
            worker_threads: 2,
            max_db_connections: 5,
            min_db_connections: 1,
        }
    }
}

impl GeneralConfig {
    #[must_use]
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,

    pub cors_allowed_origins: Vec<String>,

    /// Whether to set the Secure flag on the Authorization cookie.
    /// Default: true for production safety. Set to false for local development without HTTPS.
    pub secure_cookies: bool,

    /// Whether to allow API key authentication via query parameter (?`api_key`=).
    /// WARNING: API keys in URLs can leak via browser history, logs, and referrers.
    pub allow_api_key_in_query: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 7180,
            cors_allowed_origins: vec![
                "http://localhost:7180".to_string(),
                "http://127.0.0.1:7180".to_string(),
            ],
            secure_cookies: true,
            allow_api_key_in_query: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Argon2 memory cost in KiB (default: 8192 = 8MB)
    pub argon2_memory_cost_kib: u32,

    /// Argon2 time cost (iterations) - higher = more CPU work
    pub argon2_time_cost: u32,

    /// Argon2 parallelism (default: 1)
    pub argon2_parallelism: u32,

    /// Session token lifetime in seconds (default: 8 hours).
    pub token_lifetime_secs: u64,

    /// HMAC-SHA256 secret used to sign session tokens.
    /// Overridable via GATEHOUSE_JWT_SECRET.
    pub jwt_secret: String,

    /// Server-held key for the keyed-hash fingerprinter.
    /// Overridable via GATEHOUSE_HMAC_KEY.
    pub hmac_key: String,

    /// 32-byte AES-256 key for API-key encryption at rest, encoded as
    /// 64 hex chars or base64. Overridable via GATEHOUSE_CIPHER_KEY.
    pub api_key_cipher_key: String,

    /// Phrase an account holder must type verbatim to confirm deletion.
    /// Overridable via GATEHOUSE_CONFIRMATION_PHRASE.
    pub delete_confirmation_phrase: String,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            argon2_memory_cost_kib: 8192,
            argon2_time_cost: 3,
            argon2_parallelism: 1,
            token_lifetime_secs: 8 * 3600,
            jwt_secret: String::new(),
            hmac_key: String::new(),
            api_key_cipher_key: String::new(),
            delete_confirmation_phrase: "delete my account".to_string(),
        }
    }
}

impl SecurityConfig {
    /// Parse the configured cipher key into raw bytes.
    ///
    /// Accepts 64 hex chars or base64; anything that does not decode to
    /// exactly 32 bytes is a fatal configuration error.
    pub fn cipher_key(&self) -> Result<[u8; 32]> {
        let trimmed = self.api_key_cipher_key.trim();
        if trimmed.len() == 64
            && let Ok(bytes) = hex::decode(trimmed)
            && bytes.len() == 32
        {
            let mut key = [0u8; 32];
            key.copy_from_slice(&bytes);
            return Ok(key);
        }
        if let Ok(bytes) = B64.decode(trimmed)
            && bytes.len() == 32
        {
            let mut key = [0u8; 32];
            key.copy_from_slice(&bytes);
            return Ok(key);
        }
        anyhow::bail!("api_key_cipher_key must be 32 bytes encoded as 64 hex chars or base64")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MailConfig {
    pub enabled: bool,

    pub smtp_host: String,

    pub smtp_port: u16,

    pub username: String,

    /// Overridable via GATEHOUSE_SMTP_PASSWORD.
    pub password: String,

    pub from_address: String,

    pub from_name: String,

    pub tls: bool,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            smtp_host: "localhost".to_string(),
            smtp_port: 587,
            username: String::new(),
            password: String::new(),
            from_address: "no-reply@gatehouse.local".to_string(),
            from_name: "Gatehouse".to_string(),
            tls: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub metrics_enabled: bool,

    pub loki_enabled: bool,

    pub loki_url: String,

    pub loki_labels: std::collections::HashMap<String, String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        let mut labels = std::collections::HashMap::new();
        labels.insert("app".to_string(), "gatehouse".to_string());

        Self {
            metrics_enabled: true,
            loki_enabled: false,
            loki_url: "http://localhost:3100".to_string(),
            loki_labels: labels,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            server: ServerConfig::default(),
            security: SecurityConfig::default(),
            mail: MailConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let paths = Self::config_paths();

        let mut config = None;
        for path in &paths {
            if path.exists() {
                info!("Loading config from: {}", path.display());
                config = Some(Self::load_from_path(path)?);
                break;
            }
        }

        let mut config = config.unwrap_or_else(|| {
            info!("No config file found, using defaults");
            Self::default()
        });

        config.apply_env_overrides();
        Ok(config)
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Secret material is environment-sourced when present so it never has
    /// to live in the config file.
    fn apply_env_overrides(&mut self) {
        if let Ok(secret) = std::env::var("GATEHOUSE_JWT_SECRET") {
            self.security.jwt_secret = secret;
        }
        if let Ok(key) = std::env::var("GATEHOUSE_HMAC_KEY") {
            self.security.hmac_key = key;
        }
        if let Ok(key) = std::env::var("GATEHOUSE_CIPHER_KEY") {
            self.security.api_key_cipher_key = key;
        }
        if let Ok(phrase) = std::env::var("GATEHOUSE_CONFIRMATION_PHRASE") {
            self.security.delete_confirmation_phrase = phrase;
        }
        if let Ok(password) = std::env::var("GATEHOUSE_SMTP_PASSWORD") {
            self.mail.password = password;
        }
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Config saved to: {}", path.display());
        Ok(())
    }

    fn config_paths() -> Vec<PathBuf> {
        vec![
            PathBuf::from("config.toml"),
            PathBuf::from("/etc/gatehouse/config.toml"),
        ]
    }

    pub fn create_default_if_missing() -> Result<bool> {
        let path = PathBuf::from("config.toml");
        if path.exists() {
            Ok(false)
        } else {
            let config = Self::default();
            config.save_to_path(&path)?;
            info!("Created default config file: {}", path.display());
            Ok(true)
        }
    }

    /// Misconfigured key material must abort boot rather than run in a
    /// vulnerable mode.
    pub fn validate(&self) -> Result<()> {
        if self.general.environment != "development" && self.general.environment != "production" {
            anyhow::bail!(
                "environment must be \"development\" or \"production\", got \"{}\"",
                self.general.environment
            );
        }

        if self.security.argon2_memory_cost_kib == 0
            || self.security.argon2_time_cost == 0
            || self.security.argon2_parallelism == 0
        {
            anyhow::bail!("Argon2 cost parameters must be positive integers");
        }

        if self.security.token_lifetime_secs == 0 {
            anyhow::bail!("token_lifetime_secs must be positive");
        }

        if self.security.jwt_secret.trim().is_empty() {
            anyhow::bail!("jwt_secret is not set (config or GATEHOUSE_JWT_SECRET)");
        }

        if self.security.hmac_key.trim().is_empty() {
            anyhow::bail!("hmac_key is not set (config or GATEHOUSE_HMAC_KEY)");
        }

        self.security
            .cipher_key()
            .context("api_key_cipher_key is invalid")?;

        if self.security.delete_confirmation_phrase.trim().is_empty() {
            anyhow::bail!("delete_confirmation_phrase cannot be empty");
        }

        if self.mail.enabled && self.mail.smtp_host.trim().is_empty() {
            anyhow::bail!("SMTP host cannot be empty when mail is enabled");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> Config {
        let mut config = Config::default();
        config.security.jwt_secret = "test-signing-secret".to_string();
        config.security.hmac_key = "test-hmac-key".to_string();
        config.security.api_key_cipher_key = "aa".repeat(32);
        config
    }

    #[test]
    fn validate_accepts_complete_config() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn validate_rejects_missing_jwt_secret() {
        let mut config = valid_config();
        config.security.jwt_secret = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_cost_factor() {
        let mut config = valid_config();
        config.security.argon2_time_cost = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_unknown_environment() {
        let mut config = valid_config();
        config.general.environment = "staging".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn cipher_key_parses_hex() {
        let config = valid_config();
        let key = config.security.cipher_key().unwrap();
        assert_eq!(key, [0xaa; 32]);
    }

    #[test]
    fn cipher_key_parses_base64() {
        let mut config = valid_config();
        config.security.api_key_cipher_key = B64.encode([0xbb_u8; 32]);
        assert_eq!(config.security.cipher_key().unwrap(), [0xbb; 32]);
    }

    #[test]
    fn cipher_key_rejects_wrong_length() {
        let mut config = valid_config();
        config.security.api_key_cipher_key = "aa".repeat(16);
        assert!(config.security.cipher_key().is_err());
        assert!(config.validate().is_err());
    }
}
