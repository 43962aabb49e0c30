// ============================
// crates/backend-lib/src/auth/session.rs
// ============================
//! Session and credential lifecycle.
//!
//! [`SessionManager`] owns the refresh-token rotation and revocation rules
//! and the password-reset flow. Every expected failure comes back as an
//! [`AppError`] value; storage faults propagate unchanged.
//!
//! ```text
//! sign_in ──→ issued ──refresh──→ rotated + issued' ──refresh──→ ...
//!                │                                   │
//!                └──────── logout / expiry ──────────┴──→ revoked / expired
//! ```
use std::sync::{Arc, LazyLock};

use bookstore_common::{
    ChangePasswordRequest, Role, SignInRequest, SignUpRequest, TokenResponse,
    UpdatePasswordRequest, BEARER,
};
use chrono::Utc;
use dashmap::DashMap;
use metrics::counter;
use regex::Regex;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;
use zeroize::Zeroizing;

use super::jwt::{AccessClaims, TokenSigner};
use super::password::{
    hash_password_blocking, needs_rehash, verify_password_blocking, PasswordPolicy,
};
use super::rate_limit::AuthRateLimiter;
use crate::config::AuthSettings;
use crate::error::AppError;
use crate::mailer::{reset_link, Mailer};
use crate::metrics as keys;
use crate::storage::{
    Credential, NewCredential, PasswordResetTokenStore, RefreshTokenStore, StorageError,
    UserStore,
};

pub const INVALID_INPUT: &str = "Invalid input";
pub const INVALID_EMAIL: &str = "Invalid email address";
pub const EMAIL_TAKEN: &str = "Email is already registered";
pub const CREDENTIALS_REQUIRED: &str = "Email and password are required";
pub const USER_NOT_FOUND: &str = "User not found";
pub const INCORRECT_PASSWORD: &str = "Incorrect password";
pub const REFRESH_TOKEN_REQUIRED: &str = "Refresh token is required";
pub const INVALID_REFRESH_TOKEN: &str = "Invalid or expired refresh token";
pub const REFRESH_TOKEN_NOT_FOUND: &str = "Refresh token not found";
pub const RESET_TOKEN_REQUIRED: &str = "Token is required";
pub const PASSWORDS_REQUIRED: &str = "New password and confirmation are required";
pub const PASSWORDS_DO_NOT_MATCH: &str = "Passwords do not match";
pub const INVALID_RESET_TOKEN: &str = "Invalid or expired token";

const MAX_EMAIL_LENGTH: usize = 254; // RFC 5321 SMTP limit

static EMAIL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").expect("static email pattern")
});

/// Policy switches for the session lifecycle
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Sign-in revokes every other live refresh token of the identity
    pub single_session: bool,
    /// A new reset request deletes the identity's outstanding reset tokens
    pub invalidate_prior_reset_tokens: bool,
    pub reset_link_base: String,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self::from_settings(&AuthSettings::default())
    }
}

impl SessionOptions {
    pub fn from_settings(auth: &AuthSettings) -> Self {
        Self {
            single_session: auth.single_session,
            invalidate_prior_reset_tokens: auth.invalidate_prior_reset_tokens,
            reset_link_base: auth.reset_link_base.clone(),
        }
    }
}

/// Orchestrates sign-up, sign-in, refresh, logout and password recovery
#[derive(Clone)]
pub struct SessionManager {
    users: Arc<dyn UserStore>,
    refresh_tokens: Arc<dyn RefreshTokenStore>,
    reset_tokens: Arc<dyn PasswordResetTokenStore>,
    signer: Arc<dyn TokenSigner>,
    mailer: Arc<dyn Mailer>,
    rate_limiter: AuthRateLimiter,
    policy: PasswordPolicy,
    options: SessionOptions,
    /// Per-identity locks around minting under the single-session rule
    lineages: Arc<DashMap<Uuid, Arc<Mutex<()>>>>,
}

impl SessionManager {
    pub fn new(
        users: Arc<dyn UserStore>,
        refresh_tokens: Arc<dyn RefreshTokenStore>,
        reset_tokens: Arc<dyn PasswordResetTokenStore>,
        signer: Arc<dyn TokenSigner>,
        mailer: Arc<dyn Mailer>,
    ) -> Self {
        Self {
            users,
            refresh_tokens,
            reset_tokens,
            signer,
            mailer,
            rate_limiter: AuthRateLimiter::default(),
            policy: PasswordPolicy::default(),
            options: SessionOptions::default(),
            lineages: Arc::new(DashMap::new()),
        }
    }

    pub fn with_rate_limiter(mut self, rate_limiter: AuthRateLimiter) -> Self {
        self.rate_limiter = rate_limiter;
        self
    }

    pub fn with_options(mut self, options: SessionOptions) -> Self {
        self.options = options;
        self
    }

    pub fn rate_limiter(&self) -> &AuthRateLimiter {
        &self.rate_limiter
    }

    pub fn refresh_tokens(&self) -> &Arc<dyn RefreshTokenStore> {
        &self.refresh_tokens
    }

    pub fn reset_tokens(&self) -> &Arc<dyn PasswordResetTokenStore> {
        &self.reset_tokens
    }

    /// Register a credential. No tokens are issued; the caller signs in
    /// separately.
    pub async fn sign_up(&self, req: SignUpRequest) -> Result<Credential, AppError> {
        let SignUpRequest { name, email, password } = req;
        let password = Zeroizing::new(password);

        if name.trim().is_empty() || email.trim().is_empty() || password.is_empty() {
            return Err(AppError::InvalidInput(INVALID_INPUT.to_string()));
        }
        if email.len() > MAX_EMAIL_LENGTH || !EMAIL_REGEX.is_match(&email) {
            return Err(AppError::InvalidInput(INVALID_EMAIL.to_string()));
        }
        if self.users.find_by_email(&email).await?.is_some() {
            return Err(AppError::Conflict(EMAIL_TAKEN.to_string()));
        }
        self.policy.validate(&password)?;

        let password_hash = hash_password_blocking(password).await?;
        let credential = self
            .users
            .create(NewCredential {
                name: name.trim().to_string(),
                email,
                password_hash,
                role: Role::User,
            })
            .await
            .map_err(|e| match e {
                StorageError::Duplicate(_) => AppError::Conflict(EMAIL_TAKEN.to_string()),
                other => other.into(),
            })?;

        counter!(keys::SIGNUP_CREATED).increment(1);
        tracing::info!(user_id = %credential.id, "credential registered");
        Ok(credential)
    }

    /// Authenticate by email and password and start a new token lineage
    pub async fn sign_in(&self, req: SignInRequest) -> Result<TokenResponse, AppError> {
        let SignInRequest { email, password } = req;
        let password = Zeroizing::new(password);

        if email.trim().is_empty() || password.is_empty() {
            return Err(AppError::InvalidInput(CREDENTIALS_REQUIRED.to_string()));
        }
        if !self.rate_limiter.check(&email) {
            counter!(keys::SIGNIN_LOCKED).increment(1);
            return Err(AppError::RateLimitExceeded);
        }

        let Some(credential) = self.users.find_by_email(&email).await? else {
            self.rate_limiter.record_failed_attempt(&email);
            counter!(keys::SIGNIN_FAILED).increment(1);
            tracing::info!("sign-in for unknown email");
            return Err(AppError::Auth(USER_NOT_FOUND.to_string()));
        };

        let digest = credential.password_hash.clone();
        if !verify_password_blocking(digest.clone(), password.clone()).await {
            self.rate_limiter.record_failed_attempt(&email);
            counter!(keys::SIGNIN_FAILED).increment(1);
            tracing::info!(user_id = %credential.id, "sign-in with incorrect password");
            return Err(AppError::Auth(INCORRECT_PASSWORD.to_string()));
        }
        self.rate_limiter.record_success(&email);

        if needs_rehash(&digest) {
            self.upgrade_digest(credential.id, password).await;
        }

        let _lineage = self.lineage_guard(credential.id).await;
        if self.options.single_session {
            let revoked = self.revoke_all_active(credential.id).await?;
            if revoked > 0 {
                tracing::info!(user_id = %credential.id, revoked, "prior refresh tokens revoked at sign-in");
            }
        }

        let tokens = self.issue_pair(&credential).await?;
        counter!(keys::SIGNIN_SUCCESS).increment(1);
        tracing::info!(user_id = %credential.id, "signed in");
        Ok(tokens)
    }

    /// Rotate a refresh token: the presented token is revoked and a
    /// replacement is minted in the same call. Presenting it again fails.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenResponse, AppError> {
        let refresh_token = refresh_token.trim();
        if refresh_token.is_empty() {
            return Err(AppError::InvalidInput(REFRESH_TOKEN_REQUIRED.to_string()));
        }

        let entry = match self.refresh_tokens.find_by_value(refresh_token).await? {
            Some(entry) if entry.is_active_at(Utc::now()) => entry,
            Some(entry) => {
                tracing::info!(
                    user_id = %entry.user_id,
                    state = ?entry.state_at(Utc::now()),
                    "refresh with dead token"
                );
                return Err(Self::reject_refresh());
            },
            None => return Err(Self::reject_refresh()),
        };

        let _lineage = self.lineage_guard(entry.user_id).await;

        // Only the request that flips the flag may continue; a concurrent
        // refresh with the same value, or a sign-in that ended this
        // lineage, wins here instead.
        if !self.refresh_tokens.revoke(&entry).await? {
            tracing::warn!(user_id = %entry.user_id, "refresh token already rotated by a concurrent request");
            return Err(Self::reject_refresh());
        }

        let Some(credential) = self.users.find_by_id(entry.user_id).await? else {
            return Err(Self::reject_refresh());
        };

        let tokens = self.issue_pair(&credential).await?;
        counter!(keys::REFRESH_ROTATED).increment(1);
        tracing::info!(user_id = %credential.id, "refresh token rotated");
        Ok(tokens)
    }

    /// Revoke one refresh token on behalf of an authenticated caller.
    /// A token owned by someone else, or one that is already revoked, is
    /// reported as missing.
    pub async fn logout(&self, caller: Uuid, refresh_token: &str) -> Result<(), AppError> {
        let refresh_token = refresh_token.trim();
        if refresh_token.is_empty() {
            return Err(AppError::InvalidInput(REFRESH_TOKEN_REQUIRED.to_string()));
        }

        let entry = match self.refresh_tokens.find_by_value(refresh_token).await? {
            Some(entry) if entry.user_id == caller => entry,
            _ => return Err(AppError::NotFound(REFRESH_TOKEN_NOT_FOUND.to_string())),
        };

        if !self.refresh_tokens.revoke(&entry).await? {
            return Err(AppError::NotFound(REFRESH_TOKEN_NOT_FOUND.to_string()));
        }
        counter!(keys::LOGOUT).increment(1);
        tracing::info!(user_id = %caller, "logged out");
        Ok(())
    }

    /// Start password recovery. The outcome is identical whether or not the
    /// email is registered.
    pub async fn recover_password(&self, email: &str) -> Result<(), AppError> {
        if email.trim().is_empty() {
            return Ok(());
        }
        let Some(credential) = self.users.find_by_email(email).await? else {
            tracing::debug!("password recovery for unknown email ignored");
            return Ok(());
        };

        // Past this point failures are logged, not returned, so a registered
        // email cannot be told apart by its response.
        if let Err(e) = self.issue_reset_token(&credential).await {
            tracing::error!(user_id = %credential.id, error = %e, "could not issue reset token");
        }
        Ok(())
    }

    /// Redeem a reset token and set a new password
    pub async fn update_password(&self, req: UpdatePasswordRequest) -> Result<(), AppError> {
        let UpdatePasswordRequest {
            token,
            new_password,
            confirm_new_password,
        } = req;
        let new_password = Zeroizing::new(new_password);
        let confirm_new_password = Zeroizing::new(confirm_new_password);

        if token.trim().is_empty() {
            return Err(AppError::InvalidInput(RESET_TOKEN_REQUIRED.to_string()));
        }
        Self::check_new_password(&self.policy, &new_password, &confirm_new_password)?;

        let Some(entry) = self.reset_tokens.find_unexpired(token.trim()).await? else {
            return Err(AppError::InvalidInput(INVALID_RESET_TOKEN.to_string()));
        };

        let password_hash = hash_password_blocking(new_password).await?;

        // Deleting is the claim on the token; a concurrent redemption that
        // loses the delete must not touch the password.
        if !self.reset_tokens.delete(&entry).await? {
            return Err(AppError::InvalidInput(INVALID_RESET_TOKEN.to_string()));
        }

        // Either failure leaves the password unchanged, so the token goes
        // back and the caller can retry.
        if let Err(e) = self.replace_password(entry.user_id, &password_hash).await {
            let user_id = entry.user_id;
            if let Err(restore_err) = self.reset_tokens.restore(entry).await {
                tracing::error!(%user_id, error = %restore_err, "could not restore reset token after failed update");
            }
            return Err(e);
        }

        counter!(keys::RESET_REDEEMED).increment(1);
        tracing::info!(user_id = %entry.user_id, "password reset redeemed");
        Ok(())
    }

    /// Change the password of an authenticated caller
    pub async fn change_password(&self, caller: Uuid, req: ChangePasswordRequest) -> Result<(), AppError> {
        let ChangePasswordRequest {
            current_password,
            new_password,
            confirm_new_password,
        } = req;
        let current_password = Zeroizing::new(current_password);
        let new_password = Zeroizing::new(new_password);
        let confirm_new_password = Zeroizing::new(confirm_new_password);

        if current_password.is_empty() {
            return Err(AppError::InvalidInput(INVALID_INPUT.to_string()));
        }
        Self::check_new_password(&self.policy, &new_password, &confirm_new_password)?;

        let Some(credential) = self.users.find_by_id(caller).await? else {
            return Err(AppError::NotFound(USER_NOT_FOUND.to_string()));
        };
        if !verify_password_blocking(credential.password_hash.clone(), current_password).await {
            return Err(AppError::Auth(INCORRECT_PASSWORD.to_string()));
        }

        let password_hash = hash_password_blocking(new_password).await?;
        self.replace_password(caller, &password_hash).await?;

        counter!(keys::PASSWORD_CHANGED).increment(1);
        tracing::info!(user_id = %caller, "password changed");
        Ok(())
    }

    /// Check an access token presented at the transport boundary
    pub fn verify_access_token(&self, token: &str) -> Result<AccessClaims, AppError> {
        self.signer.verify(token)
    }

    /// Revoke every live refresh token of a user. Returns how many this
    /// call revoked.
    pub async fn revoke_all_active(&self, user_id: Uuid) -> Result<usize, AppError> {
        let mut revoked = 0;
        for entry in self.refresh_tokens.list_active_for_user(user_id).await? {
            if self.refresh_tokens.revoke(&entry).await? {
                revoked += 1;
            }
        }
        if revoked > 0 {
            counter!(keys::REFRESH_REVOKED).increment(revoked as u64);
        }
        Ok(revoked)
    }

    /// Drop expired rows from both token stores
    pub async fn purge_expired(&self) -> Result<usize, AppError> {
        let purged = self.refresh_tokens.purge_expired().await?
            + self.reset_tokens.purge_expired().await?;
        if purged > 0 {
            counter!(keys::TOKENS_PURGED).increment(purged as u64);
        }
        Ok(purged)
    }

    /// End every session of the user, then store the new digest. Sessions
    /// go first so a failure never leaves a changed password with the old
    /// sessions still live.
    async fn replace_password(&self, user_id: Uuid, password_hash: &str) -> Result<(), AppError> {
        let _lineage = self.lineage_guard(user_id).await;
        let revoked = self.revoke_all_active(user_id).await?;
        self.users.update_password_hash(user_id, password_hash).await?;
        tracing::debug!(%user_id, revoked, "sessions ended for password change");
        Ok(())
    }

    async fn lineage_guard(&self, user_id: Uuid) -> Option<OwnedMutexGuard<()>> {
        if !self.options.single_session {
            return None;
        }
        let lock = Arc::clone(self.lineages.entry(user_id).or_default().value());
        Some(lock.lock_owned().await)
    }

    async fn issue_pair(&self, credential: &Credential) -> Result<TokenResponse, AppError> {
        let refresh = self.refresh_tokens.create(credential.id).await?;
        let access = self.signer.issue(credential)?;
        Ok(TokenResponse {
            access_token: access.token,
            refresh_token: refresh.token,
            token_type: BEARER.to_string(),
            expires_at: access.expires_at,
        })
    }

    async fn issue_reset_token(&self, credential: &Credential) -> Result<(), AppError> {
        if self.options.invalidate_prior_reset_tokens {
            self.reset_tokens.delete_for_user(credential.id).await?;
        }
        let entry = self.reset_tokens.create(credential.id).await?;
        let link = reset_link(&self.options.reset_link_base, &entry.token);

        let mailer = Arc::clone(&self.mailer);
        let to = credential.email.clone();
        let name = credential.name.clone();
        let user_id = credential.id;
        tokio::spawn(async move {
            if let Err(e) = mailer.send_password_reset(&to, &name, &link).await {
                tracing::warn!(%user_id, error = %e, "password reset mail failed");
            }
        });

        counter!(keys::RESET_ISSUED).increment(1);
        tracing::info!(user_id = %credential.id, "password reset token issued");
        Ok(())
    }

    async fn upgrade_digest(&self, user_id: Uuid, password: Zeroizing<String>) {
        let result = match hash_password_blocking(password).await {
            Ok(hash) => self.users.update_password_hash(user_id, &hash).await.map_err(AppError::from),
            Err(e) => Err(e),
        };
        match result {
            Ok(()) => tracing::info!(%user_id, "password digest upgraded"),
            Err(e) => tracing::warn!(%user_id, error = %e, "password digest upgrade failed"),
        }
    }

    fn check_new_password(policy: &PasswordPolicy, new: &str, confirm: &str) -> Result<(), AppError> {
        if new.is_empty() || confirm.is_empty() {
            return Err(AppError::InvalidInput(PASSWORDS_REQUIRED.to_string()));
        }
        if new != confirm {
            return Err(AppError::InvalidInput(PASSWORDS_DO_NOT_MATCH.to_string()));
        }
        policy.validate(new)
    }

    fn reject_refresh() -> AppError {
        counter!(keys::REFRESH_REJECTED).increment(1);
        AppError::Auth(INVALID_REFRESH_TOKEN.to_string())
    }
}
