//! Bearer token issuance, verification and revocation.
//!
//! # Invariants
//! - Tokens are HS256 JWTs carrying `{ userId, email, iat, exp }`.
//! - Expiry is checked against the injected clock, not the system clock.
//! - A revoked token stays revoked for the lifetime of the blacklist file.

use crate::model::user::UserId;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use log::{error, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    pub user_id: UserId,
    pub email: String,
    /// Issued-at, Unix seconds.
    pub iat: i64,
    /// Expiry, Unix seconds.
    pub exp: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    Invalid,
    Expired,
    Encode(String),
}

impl Display for TokenError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Invalid => write!(f, "invalid token"),
            Self::Expired => write!(f, "token expired"),
            Self::Encode(reason) => write!(f, "failed to sign token: {reason}"),
        }
    }
}

impl Error for TokenError {}

pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl TokenIssuer {
    pub fn new(secret: &str) -> Self {
        Self::with_ttl(secret, DEFAULT_TOKEN_TTL)
    }

    pub fn with_ttl(secret: &str, ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
        }
    }

    /// Signs a token for `user_id` valid from `now_ms`.
    pub fn issue(&self, user_id: &str, email: &str, now_ms: i64) -> Result<String, TokenError> {
        let iat = now_ms.div_euclid(1000);
        let ttl_secs = i64::try_from(self.ttl.as_secs()).unwrap_or(i64::MAX);
        let claims = Claims {
            user_id: user_id.to_string(),
            email: email.to_string(),
            iat,
            exp: iat.saturating_add(ttl_secs),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding).map_err(|err| {
            error!("event=token_issue module=auth status=error error={err}");
            TokenError::Encode(err.to_string())
        })
    }

    /// Checks signature and expiry as of `now_ms`.
    pub fn verify(&self, token: &str, now_ms: i64) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.set_required_spec_claims(&["exp"]);

        let data = decode::<Claims>(token, &self.decoding, &validation).map_err(|err| {
            warn!("event=token_verify module=auth status=error error_code=invalid error={err}");
            TokenError::Invalid
        })?;
        if data.claims.exp <= now_ms.div_euclid(1000) {
            return Err(TokenError::Expired);
        }
        Ok(data.claims)
    }
}

/// Revoked tokens, optionally mirrored to an append-only file.
#[derive(Debug, Default)]
pub struct TokenBlacklist {
    tokens: Mutex<HashSet<String>>,
    path: Option<PathBuf>,
}

impl TokenBlacklist {
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Loads revoked tokens from `path` (one per line); a missing file is empty.
    pub fn load(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let tokens = match std::fs::read_to_string(&path) {
            Ok(content) => content
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(str::to_string)
                .collect(),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => HashSet::new(),
            Err(err) => return Err(err),
        };
        Ok(Self {
            tokens: Mutex::new(tokens),
            path: Some(path),
        })
    }

    pub fn revoke(&self, token: &str) {
        let inserted = self
            .tokens
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(token.to_string());
        if !inserted {
            return;
        }
        if let Some(path) = self.path.as_ref() {
            if let Err(err) = append_line(path, token) {
                error!("event=blacklist_append module=auth status=error error={err}");
            }
        }
    }

    pub fn is_revoked(&self, token: &str) -> bool {
        self.tokens
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(token)
    }

    pub fn len(&self) -> usize {
        self.tokens
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn append_line(path: &Path, token: &str) -> std::io::Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{token}")
}
