//! Authentication and request-security building blocks.
//!
//! # Responsibility
//! - Sign and verify bearer tokens; track revoked tokens.
//! - Hash passwords and enforce the password policy.
//! - Throttle auth requests and lock accounts after repeated failures.
//! - Normalize untrusted text input.

use once_cell::sync::Lazy;
use rand::RngCore;
use regex::Regex;

pub mod guard;
pub mod password;
pub mod token;

pub use guard::{LoginLockout, RateLimiter, RetryAfter};
pub use password::{PasswordHasher, PasswordPolicy, PolicyViolation};
pub use token::{Claims, TokenBlacklist, TokenError, TokenIssuer};

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email regex"));

/// Token and password primitives shared by auth flows.
pub struct AuthSecurity {
    pub tokens: TokenIssuer,
    pub blacklist: TokenBlacklist,
    pub lockout: LoginLockout,
    pub policy: PasswordPolicy,
    pub hasher: PasswordHasher,
}

impl AuthSecurity {
    /// Defaults for everything except the signing secret.
    pub fn with_secret(secret: &str) -> Self {
        Self {
            tokens: TokenIssuer::new(secret),
            blacklist: TokenBlacklist::in_memory(),
            lockout: LoginLockout::default(),
            policy: PasswordPolicy::default(),
            hasher: PasswordHasher::default(),
        }
    }
}

/// Trims and strips angle brackets.
pub fn sanitize_text(value: &str) -> String {
    value.trim().replace(['<', '>'], "")
}

pub fn normalize_email(value: &str) -> String {
    sanitize_text(value).to_ascii_lowercase()
}

pub fn is_valid_email(value: &str) -> bool {
    EMAIL_RE.is_match(value)
}

/// Random hex token of `bytes` bytes for email verification and resets.
pub fn random_token(bytes: usize) -> String {
    let mut buf = vec![0_u8; bytes];
    rand::thread_rng().fill_bytes(&mut buf);
    hex::encode(buf)
}

#[cfg(test)]
mod tests {
    use super::{is_valid_email, normalize_email, random_token, sanitize_text};

    #[test]
    fn sanitize_strips_angle_brackets_and_whitespace() {
        assert_eq!(sanitize_text("  <b>Ada</b> "), "bAda/b");
        assert_eq!(normalize_email(" Ada@Example.COM "), "ada@example.com");
    }

    #[test]
    fn email_shape_is_checked() {
        assert!(is_valid_email("a@b.co"));
        assert!(!is_valid_email("a@b"));
        assert!(!is_valid_email("a b@c.d"));
    }

    #[test]
    fn random_token_has_expected_length() {
        let token = random_token(32);
        assert_eq!(token.len(), 64);
        assert_ne!(token, random_token(32));
    }
}
