//! Delivery of one-time login links

use tracing::info;

#[derive(Debug, thiserror::Error)]
#[error("Link delivery failed: {0}")]
pub struct SendError(pub String);

/// Hands a login link to the account holder
#[async_trait::async_trait]
pub trait LinkSender: Send + Sync {
    async fn send_login_link(&self, email: &str, link: &str) -> Result<(), SendError>;
}

/// Writes the link to the log instead of delivering it
#[derive(Debug, Default)]
pub struct LogLinkSender;

#[async_trait::async_trait]
impl LinkSender for LogLinkSender {
    async fn send_login_link(&self, email: &str, link: &str) -> Result<(), SendError> {
        info!(email, link, "Login link issued");
        Ok(())
    }
}
