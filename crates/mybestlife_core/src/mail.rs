//! Outgoing account mail.
//!
//! # Invariants
//! - Mail failures never fail the account operation that triggered them.
//! - `LogMailer` logs recipient domain and kind only; bodies carry tokens.

use log::info;
use std::error::Error;
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MailKind {
    Welcome,
    Verification,
    PasswordReset,
}

impl MailKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Welcome => "welcome",
            Self::Verification => "verification",
            Self::PasswordReset => "password_reset",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMail {
    pub kind: MailKind,
    pub to: String,
    pub subject: String,
    pub body: String,
}

impl OutgoingMail {
    pub fn welcome(to: &str, name: &str) -> Self {
        Self {
            kind: MailKind::Welcome,
            to: to.to_string(),
            subject: "Welcome to My Best Life".to_string(),
            body: format!("Hi {name}, welcome to My Best Life!"),
        }
    }

    pub fn verification(to: &str, name: &str, token: &str) -> Self {
        Self {
            kind: MailKind::Verification,
            to: to.to_string(),
            subject: "Verify your email address".to_string(),
            body: format!(
                "Hi {name}, confirm your email with this code within 24 hours: {token}"
            ),
        }
    }

    pub fn password_reset(to: &str, name: &str, token: &str) -> Self {
        Self {
            kind: MailKind::PasswordReset,
            to: to.to_string(),
            subject: "Reset your password".to_string(),
            body: format!("Hi {name}, use this code within 1 hour to reset your password: {token}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailError(pub String);

impl Display for MailError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "mail delivery failed: {}", self.0)
    }
}

impl Error for MailError {}

pub trait Mailer: Send + Sync {
    fn send(&self, mail: &OutgoingMail) -> Result<(), MailError>;
}

/// Mailer that only records a delivery event in the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogMailer;

impl Mailer for LogMailer {
    fn send(&self, mail: &OutgoingMail) -> Result<(), MailError> {
        let domain = mail.to.rsplit_once('@').map_or("unknown", |(_, d)| d);
        info!(
            "event=mail_send module=mail status=ok kind={} to_domain={domain}",
            mail.kind.as_str()
        );
        Ok(())
    }
}
