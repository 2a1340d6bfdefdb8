//! Shared handler state.
//!
//! # Invariants
//! - The SQLite connection is locked for one service call at a time.
//! - Auth guards are process-wide and in-memory.

use crate::config::ServerConfig;
use crate::error::ApiError;
use mybestlife_core::auth::{AuthSecurity, LoginLockout, RateLimiter, TokenBlacklist, TokenIssuer};
use mybestlife_core::mail::{LogMailer, Mailer};
use mybestlife_core::{Clock, SystemClock};
use rusqlite::Connection;
use std::sync::{Arc, Mutex, PoisonError};

#[derive(Clone)]
pub struct AppState {
    db: Arc<Mutex<Connection>>,
    pub security: Arc<AuthSecurity>,
    pub limiter: Arc<RateLimiter>,
    pub mailer: Arc<dyn Mailer>,
    pub clock: Arc<dyn Clock>,
    /// Reverse proxies in front of the server whose `x-forwarded-for` is trusted.
    pub trusted_proxy_hops: usize,
}

impl AppState {
    pub fn new(
        conn: Connection,
        security: AuthSecurity,
        limiter: RateLimiter,
        mailer: Arc<dyn Mailer>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            db: Arc::new(Mutex::new(conn)),
            security: Arc::new(security),
            limiter: Arc::new(limiter),
            mailer,
            clock,
            trusted_proxy_hops: 0,
        }
    }

    pub fn with_trusted_proxy_hops(mut self, hops: usize) -> Self {
        self.trusted_proxy_hops = hops;
        self
    }

    /// Production wiring from config: system clock and log-only mailer.
    pub fn from_config(conn: Connection, config: &ServerConfig) -> std::io::Result<Self> {
        let blacklist = match config.token_blacklist_path.as_ref() {
            Some(path) => TokenBlacklist::load(path)?,
            None => TokenBlacklist::in_memory(),
        };
        let security = AuthSecurity {
            tokens: TokenIssuer::new(&config.jwt_secret),
            blacklist,
            lockout: LoginLockout::new(config.max_login_attempts, config.lockout),
            policy: config.password_policy,
            hasher: Default::default(),
        };
        Ok(Self::new(
            conn,
            security,
            RateLimiter::new(config.rate_limit_window, config.rate_limit_max),
            Arc::new(LogMailer),
            Arc::new(SystemClock),
        )
        .with_trusted_proxy_hops(config.trust_proxy))
    }

    /// Runs `f` with the connection held.
    pub fn with_db<T>(
        &self,
        f: impl FnOnce(&Connection) -> Result<T, ApiError>,
    ) -> Result<T, ApiError> {
        let conn = self.db.lock().unwrap_or_else(PoisonError::into_inner);
        f(&conn)
    }

    pub fn now_ms(&self) -> i64 {
        self.clock.now_ms()
    }
}
