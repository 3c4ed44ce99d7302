//! Notification delivery for the GalenDARY backend.
//!
//! The dispatcher only knows the [`Notifier`] trait. [`SmtpNotifier`] delivers
//! plain-text mail over SMTP on asupersync TCP; [`DisabledNotifier`] refuses
//! every delivery and is used when no mail server is configured.

pub mod notifier;
pub mod smtp;

pub use notifier::{DisabledNotifier, Notifier, PasswordResetMessage, RESET_BODY_PREFIX, RESET_SUBJECT};
pub use smtp::{SmtpConfig, SmtpNotifier, SmtpReply};
