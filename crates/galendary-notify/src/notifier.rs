//! The notification seam used by password reset.

use std::future::Future;

use asupersync::{Cx, Outcome};
use galendary_core::Error;

pub const RESET_SUBJECT: &str = "Your GalenDARY password has been reset!";
pub const RESET_BODY_PREFIX: &str = "Log in with the following temporary password:\n";

/// Delivers a freshly generated credential to its owner.
pub trait Notifier: Send + Sync + 'static {
    /// Send `credential` to `recipient`. Delivery failure surfaces as
    /// [`Error::Notification`].
    fn send_temporary_password(
        &self,
        cx: &Cx,
        recipient: &str,
        credential: &str,
    ) -> impl Future<Output = Outcome<(), Error>> + Send;
}

/// A composed password-reset mail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordResetMessage {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub body: String,
}

impl PasswordResetMessage {
    pub fn compose(from: impl Into<String>, to: impl Into<String>, credential: &str) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            subject: RESET_SUBJECT.to_string(),
            body: format!("{}{}", RESET_BODY_PREFIX, credential),
        }
    }
}

/// Refuses every delivery.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledNotifier;

impl Notifier for DisabledNotifier {
    fn send_temporary_password(
        &self,
        _cx: &Cx,
        recipient: &str,
        _credential: &str,
    ) -> impl Future<Output = Outcome<(), Error>> + Send {
        tracing::warn!(recipient, "Notification requested but no mail server is configured");
        std::future::ready(Outcome::Err(Error::Notification(
            "mail delivery is not configured".to_string(),
        )))
    }
}
