// ============================
// crates/backend-lib/src/auth/jwt.rs
// ============================
//! Access token signing and verification.
//!
//! Access tokens are stateless HS256 JWTs. Nothing about them is stored;
//! validity is signature, issuer, audience and expiry at the moment of use.
use bookstore_common::Role;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use zeroize::Zeroizing;

use crate::config::AuthSettings;
use crate::error::AppError;
use crate::storage::Credential;

/// Message for every access token that fails verification
pub const INVALID_ACCESS_TOKEN: &str = "Invalid or expired access token";

/// Immutable signing configuration, built once at startup
pub struct SignerConfig {
    key: Zeroizing<Vec<u8>>,
    pub issuer: String,
    pub audience: String,
    pub ttl: Duration,
    pub algorithm: Algorithm,
}

impl SignerConfig {
    pub fn new(key: &[u8], issuer: impl Into<String>, audience: impl Into<String>, ttl: Duration) -> Self {
        Self {
            key: Zeroizing::new(key.to_vec()),
            issuer: issuer.into(),
            audience: audience.into(),
            ttl,
            algorithm: Algorithm::HS256,
        }
    }

    pub fn from_settings(auth: &AuthSettings) -> Self {
        Self::new(
            &auth.signing_key(),
            auth.issuer.clone(),
            auth.audience.clone(),
            Duration::seconds(auth.access_token_ttl_secs),
        )
    }
}

impl std::fmt::Debug for SignerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignerConfig")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("ttl", &self.ttl)
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}

/// Claims carried by an access token
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccessClaims {
    /// Subject: credential id
    pub sub: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    /// Unique per issued token
    pub jti: Uuid,
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
    pub aud: String,
}

/// A freshly signed access token
#[derive(Debug, Clone)]
pub struct IssuedAccessToken {
    pub token: String,
    pub jti: Uuid,
    pub expires_at: DateTime<Utc>,
}

/// Creates and checks access tokens. Swappable without touching callers.
pub trait TokenSigner: Send + Sync {
    fn issue(&self, credential: &Credential) -> Result<IssuedAccessToken, AppError>;

    /// Fails with [`AppError::Auth`] for any token that is not ours or not
    /// current
    fn verify(&self, token: &str) -> Result<AccessClaims, AppError>;
}

/// HMAC JWT signer
pub struct JwtSigner {
    config: SignerConfig,
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl JwtSigner {
    pub fn new(config: SignerConfig) -> Self {
        let encoding = EncodingKey::from_secret(&config.key);
        let decoding = DecodingKey::from_secret(&config.key);

        // Only the configured algorithm is accepted, which rules out
        // algorithm-confusion tokens (`none`, other HMAC sizes, RSA).
        let mut validation = Validation::new(config.algorithm);
        validation.leeway = 0;
        validation.validate_exp = true;
        validation.set_issuer(&[config.issuer.as_str()]);
        validation.set_audience(&[config.audience.as_str()]);
        validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);

        Self {
            config,
            encoding,
            decoding,
            validation,
        }
    }

    pub fn config(&self) -> &SignerConfig {
        &self.config
    }
}

impl TokenSigner for JwtSigner {
    fn issue(&self, credential: &Credential) -> Result<IssuedAccessToken, AppError> {
        let now = Utc::now();
        let exp = (now + self.config.ttl).timestamp();
        let claims = AccessClaims {
            sub: credential.id,
            name: credential.name.clone(),
            email: credential.email.clone(),
            role: credential.role,
            jti: Uuid::new_v4(),
            iat: now.timestamp(),
            exp,
            iss: self.config.issuer.clone(),
            aud: self.config.audience.clone(),
        };

        let token = encode(&Header::new(self.config.algorithm), &claims, &self.encoding)?;
        let expires_at = DateTime::from_timestamp(exp, 0)
            .ok_or_else(|| AppError::Internal("access token expiry out of range".to_string()))?;

        Ok(IssuedAccessToken {
            token,
            jti: claims.jti,
            expires_at,
        })
    }

    fn verify(&self, token: &str) -> Result<AccessClaims, AppError> {
        decode::<AccessClaims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!(reason = %e, "access token rejected");
                AppError::Auth(INVALID_ACCESS_TOKEN.to_string())
            })
    }
}
