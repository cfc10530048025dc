//! Outbound verification mail.

use async_trait::async_trait;
use tracing::info;
use url::Url;

#[derive(Debug, thiserror::Error)]
#[error("mail delivery failed: {0}")]
pub struct MailError(pub String);

/// Delivers verification links to newly registered addresses.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_verification(&self, to: &str, link: &Url) -> Result<(), MailError>;
}

/// Build the link a user follows to verify `token`.
pub fn verification_link(public_url: &Url, token: &str) -> Url {
    let mut link = public_url.clone();
    let base = public_url.path().trim_end_matches('/');
    link.set_path(&format!("{}/api/verify", base));
    link.set_query(None);
    link.set_fragment(None);
    link.query_pairs_mut().append_pair("token", token);
    link
}

/// Writes verification links to the log instead of sending mail.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send_verification(&self, to: &str, link: &Url) -> Result<(), MailError> {
        info!(to, link = %link, "Verification link");
        Ok(())
    }
}
