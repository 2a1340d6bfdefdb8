//! Password hashing and strength policy.
//!
//! # Invariants
//! - Hash format is `v1$<iterations>$<salt_hex>$<hash_hex>`.
//! - Verification compares digests in constant time.
//! - Verification uses the iteration count stored in the hash, so raising
//!   the default does not invalidate existing accounts.

use once_cell::sync::Lazy;
use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use regex::Regex;
use sha2::Sha256;
use std::fmt::{Display, Formatter};
use subtle::ConstantTimeEq;

pub const DEFAULT_ITERATIONS: u32 = 100_000;
const HASH_VERSION: &str = "v1";
const SALT_LEN: usize = 16;

static SYMBOL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[!@#$%^&*(),.?":{}|<>]"#).expect("valid symbol regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PasswordHasher {
    iterations: u32,
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self::new(DEFAULT_ITERATIONS)
    }
}

impl PasswordHasher {
    pub fn new(iterations: u32) -> Self {
        Self {
            iterations: iterations.max(1),
        }
    }

    pub fn hash(&self, password: &str) -> String {
        let mut salt = [0_u8; SALT_LEN];
        rand::thread_rng().fill_bytes(&mut salt);
        let digest = derive(password.as_bytes(), &salt, self.iterations);
        format!(
            "{HASH_VERSION}${}${}${}",
            self.iterations,
            hex::encode(salt),
            hex::encode(digest)
        )
    }

    /// Returns `false` for a wrong password and for malformed hashes.
    pub fn verify(&self, password: &str, encoded: &str) -> bool {
        let mut parts = encoded.split('$');
        let (Some(version), Some(iterations), Some(salt), Some(expected), None) = (
            parts.next(),
            parts.next(),
            parts.next(),
            parts.next(),
            parts.next(),
        ) else {
            return false;
        };
        if version != HASH_VERSION {
            return false;
        }
        let (Ok(iterations), Ok(salt), Ok(expected)) = (
            iterations.parse::<u32>(),
            hex::decode(salt),
            hex::decode(expected),
        ) else {
            return false;
        };
        if iterations == 0 {
            return false;
        }

        let actual = derive(password.as_bytes(), &salt, iterations);
        actual.as_slice().ct_eq(expected.as_slice()).into()
    }
}

/// PBKDF2-HMAC-SHA256 with a 32-byte output.
fn derive(password: &[u8], salt: &[u8], iterations: u32) -> [u8; 32] {
    let mut key = [0_u8; 32];
    pbkdf2_hmac::<Sha256>(password, salt, iterations, &mut key);
    key
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyViolation {
    TooShort(usize),
    MissingUppercase,
    MissingLowercase,
    MissingDigit,
    MissingSymbol,
}

impl Display for PolicyViolation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TooShort(min) => write!(f, "Password must be at least {min} characters long"),
            Self::MissingUppercase => write!(f, "Password must contain at least one uppercase letter"),
            Self::MissingLowercase => write!(f, "Password must contain at least one lowercase letter"),
            Self::MissingDigit => write!(f, "Password must contain at least one number"),
            Self::MissingSymbol => write!(f, "Password must contain at least one special character"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PasswordPolicy {
    pub min_length: usize,
    pub require_uppercase: bool,
    pub require_lowercase: bool,
    pub require_digit: bool,
    pub require_symbol: bool,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            min_length: 8,
            require_uppercase: false,
            require_lowercase: false,
            require_digit: false,
            require_symbol: false,
        }
    }
}

impl PasswordPolicy {
    /// Returns every violated rule, in a stable order.
    pub fn check(&self, password: &str) -> Vec<PolicyViolation> {
        let mut violations = Vec::new();
        if password.chars().count() < self.min_length {
            violations.push(PolicyViolation::TooShort(self.min_length));
        }
        if self.require_uppercase && !password.chars().any(|c| c.is_ascii_uppercase()) {
            violations.push(PolicyViolation::MissingUppercase);
        }
        if self.require_lowercase && !password.chars().any(|c| c.is_ascii_lowercase()) {
            violations.push(PolicyViolation::MissingLowercase);
        }
        if self.require_digit && !password.chars().any(|c| c.is_ascii_digit()) {
            violations.push(PolicyViolation::MissingDigit);
        }
        if self.require_symbol && !SYMBOL_RE.is_match(password) {
            violations.push(PolicyViolation::MissingSymbol);
        }
        violations
    }
}
