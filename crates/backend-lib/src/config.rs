// ============================
// crates/backend-lib/src/config.rs
// ============================
//! Configuration management.
use std::path::Path;

use anyhow::{bail, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, Zeroizing};

/// Prefix for environment overrides, e.g. `BOOKSTORE_AUTH__ISSUER`
pub const ENV_PREFIX: &str = "BOOKSTORE_";

/// Shortest accepted HMAC signing key, in bytes
pub const MIN_SIGNING_KEY_BYTES: usize = 32;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub auth: AuthSettings,
    pub rate_limit: RateLimitSettings,
    /// Log level
    pub log_level: String,
    /// `pretty` or `json`
    pub log_format: String,
}

/// Listener settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// Origins allowed to call the API from a browser (the admin front-end)
    pub cors_origins: Vec<String>,
}

/// Token issuance settings. `Debug` never prints the signing key.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthSettings {
    /// HMAC key for access tokens
    pub signing_key: String,
    pub issuer: String,
    pub audience: String,
    pub access_token_ttl_secs: i64,
    pub refresh_token_ttl_secs: i64,
    pub reset_token_ttl_secs: i64,
    /// Random bytes in each refresh token before encoding
    pub refresh_token_bytes: usize,
    /// Sign-in revokes every other live refresh token of the identity
    pub single_session: bool,
    /// Issuing a reset token deletes the identity's earlier reset tokens
    pub invalidate_prior_reset_tokens: bool,
    /// Front-end page that accepts `?token=` for password resets
    pub reset_link_base: String,
}

/// Sign-in throttling settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitSettings {
    /// Failed sign-ins for one email before it is locked
    pub max_failed_attempts: u32,
    pub lockout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerSettings::default(),
            auth: AuthSettings::default(),
            rate_limit: RateLimitSettings::default(),
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
        }
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            cors_origins: vec!["http://localhost:3000".to_string()],
        }
    }
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            signing_key: String::new(),
            issuer: "bookstore-api".to_string(),
            audience: "bookstore-admin".to_string(),
            access_token_ttl_secs: 2 * 60 * 60,
            refresh_token_ttl_secs: 7 * 24 * 60 * 60,
            reset_token_ttl_secs: 60 * 60,
            refresh_token_bytes: 64,
            single_session: true,
            invalidate_prior_reset_tokens: true,
            reset_link_base: "http://localhost:3000/reset-password".to_string(),
        }
    }
}

impl AuthSettings {
    /// Copy of the signing key that is wiped when dropped
    pub fn signing_key(&self) -> Zeroizing<Vec<u8>> {
        Zeroizing::new(self.signing_key.as_bytes().to_vec())
    }
}

impl std::fmt::Debug for AuthSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSettings")
            .field("signing_key", &"[redacted]")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("access_token_ttl_secs", &self.access_token_ttl_secs)
            .field("refresh_token_ttl_secs", &self.refresh_token_ttl_secs)
            .field("reset_token_ttl_secs", &self.reset_token_ttl_secs)
            .field("refresh_token_bytes", &self.refresh_token_bytes)
            .field("single_session", &self.single_session)
            .field("invalidate_prior_reset_tokens", &self.invalidate_prior_reset_tokens)
            .field("reset_link_base", &self.reset_link_base)
            .finish()
    }
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            max_failed_attempts: 5,
            lockout_secs: 5 * 60,
        }
    }
}

impl Settings {
    /// Load from `config.toml` in the working directory plus environment
    pub fn load() -> Result<Self> {
        Self::load_from("config.toml")
    }

    /// Load from the given TOML file plus environment. A missing file is
    /// not an error; defaults and environment still apply.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let settings: Settings = Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reject settings the service cannot run safely with
    pub fn validate(&self) -> Result<()> {
        let auth = &self.auth;
        if auth.signing_key.len() < MIN_SIGNING_KEY_BYTES {
            bail!("auth.signing_key must be at least {MIN_SIGNING_KEY_BYTES} bytes");
        }
        if auth.issuer.is_empty() || auth.audience.is_empty() {
            bail!("auth.issuer and auth.audience must not be empty");
        }
        if auth.access_token_ttl_secs <= 0
            || auth.refresh_token_ttl_secs <= 0
            || auth.reset_token_ttl_secs <= 0
        {
            bail!("token lifetimes must be positive");
        }
        if auth.refresh_token_ttl_secs <= auth.access_token_ttl_secs {
            bail!("auth.refresh_token_ttl_secs must exceed auth.access_token_ttl_secs");
        }
        if auth.refresh_token_bytes < 32 {
            bail!("auth.refresh_token_bytes must be at least 32");
        }
        if self.rate_limit.max_failed_attempts == 0 {
            bail!("rate_limit.max_failed_attempts must be positive");
        }
        if !LOG_LEVELS.contains(&self.log_level.as_str()) {
            bail!("unknown log level {:?}", self.log_level);
        }
        Ok(())
    }

    /// Address the HTTP listener binds to
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Copy of the signing key that is wiped when dropped
    pub fn signing_key(&self) -> Zeroizing<Vec<u8>> {
        self.auth.signing_key()
    }

    /// Clone with the signing key wiped, for keeping around after the
    /// signer has been built
    pub fn without_secrets(&self) -> Settings {
        let mut settings = self.clone();
        settings.auth.signing_key.zeroize();
        settings
    }
}
