//! Notifier selection.

use std::future::Future;

use galendary::{Cx, DisabledNotifier, Error, Notifier, Outcome, SmtpConfig, SmtpNotifier};

/// SMTP delivery when a relay is configured, refusal otherwise.
#[derive(Debug)]
pub enum Mailer {
    Smtp(SmtpNotifier),
    Disabled(DisabledNotifier),
}

impl Mailer {
    pub fn from_config(config: Option<SmtpConfig>) -> Self {
        match config {
            Some(config) => {
                tracing::info!(host = %config.host, port = config.port, "Password-reset mail enabled");
                Mailer::Smtp(SmtpNotifier::new(config))
            }
            None => {
                tracing::warn!("No mail relay configured, reset_password will fail at delivery");
                Mailer::Disabled(DisabledNotifier)
            }
        }
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self, Mailer::Smtp(_))
    }
}

impl Notifier for Mailer {
    fn send_temporary_password(
        &self,
        cx: &Cx,
        recipient: &str,
        credential: &str,
    ) -> impl Future<Output = Outcome<(), Error>> + Send {
        async move {
            match self {
                Mailer::Smtp(n) => n.send_temporary_password(cx, recipient, credential).await,
                Mailer::Disabled(n) => n.send_temporary_password(cx, recipient, credential).await,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selection() {
        assert!(!Mailer::from_config(None).is_enabled());
        assert!(Mailer::from_config(Some(SmtpConfig::new().host("relay"))).is_enabled());
    }
}
