// ============================
// crates/backend-lib/src/mailer.rs
// ============================
//! Outbound notification hook used by password recovery.
use async_trait::async_trait;

#[async_trait]
pub trait Mailer: Send + Sync {
    /// Deliver a password reset link to `to`
    async fn send_password_reset(&self, to: &str, name: &str, link: &str) -> anyhow::Result<()>;
}

/// Records dispatches in the log instead of sending mail. The link itself
/// is never logged since it carries a live token.
#[derive(Debug, Clone, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send_password_reset(&self, to: &str, name: &str, link: &str) -> anyhow::Result<()> {
        tracing::info!(
            to = %to,
            name = %name,
            link_len = link.len(),
            "password reset mail dispatched"
        );
        Ok(())
    }
}

/// Reset link handed to the mailer
pub fn reset_link(base: &str, token: &str) -> String {
    let sep = if base.contains('?') { '&' } else { '?' };
    format!("{base}{sep}token={token}")
}
