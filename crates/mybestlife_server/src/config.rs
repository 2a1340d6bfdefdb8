//! Environment-driven server configuration.
//!
//! # Responsibility
//! - Read process settings once at startup.
//! - Apply defaults for every optional knob.
//!
//! # Invariants
//! - `JWT_SECRET` must be present and non-empty.
//! - Numeric settings that fail to parse fall back to their defaults.

use mybestlife_core::auth::guard::{
    DEFAULT_LOCKOUT, DEFAULT_MAX_LOGIN_ATTEMPTS, DEFAULT_RATE_MAX, DEFAULT_RATE_WINDOW,
};
use mybestlife_core::auth::PasswordPolicy;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:5001";
const DEFAULT_DB_FILE: &str = "mybestlife.sqlite3";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    Missing(&'static str),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Missing(name) => write!(f, "required environment variable `{name}` is not set"),
        }
    }
}

impl Error for ConfigError {}

/// Outbound mail relay; only checked for presence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub pass: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub db_path: PathBuf,
    pub jwt_secret: String,
    pub bind_addr: String,
    pub log_level: Option<String>,
    pub log_dir: Option<String>,
    pub rate_limit_window: Duration,
    pub rate_limit_max: u32,
    pub max_login_attempts: u32,
    pub lockout: Duration,
    pub password_policy: PasswordPolicy,
    pub token_blacklist_path: Option<PathBuf>,
    pub smtp: Option<SmtpSettings>,
    pub cors_origin: Option<String>,
    /// Number of trusted reverse-proxy hops; zero ignores `x-forwarded-for`.
    pub trust_proxy: usize,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the config from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let number = |name: &str| get(name).and_then(|value| value.parse::<u64>().ok());
        let flag = |name: &str| {
            get(name).is_some_and(|value| matches!(value.to_ascii_lowercase().as_str(), "true" | "1" | "yes"))
        };

        let jwt_secret = get("JWT_SECRET").ok_or(ConfigError::Missing("JWT_SECRET"))?;
        let defaults = PasswordPolicy::default();
        let password_policy = PasswordPolicy {
            min_length: number("MIN_PASSWORD_LENGTH")
                .and_then(|value| usize::try_from(value).ok())
                .unwrap_or(defaults.min_length),
            require_uppercase: flag("REQUIRE_UPPERCASE"),
            require_lowercase: flag("REQUIRE_LOWERCASE"),
            require_digit: flag("REQUIRE_NUMBERS"),
            require_symbol: flag("REQUIRE_SYMBOLS"),
        };

        let smtp = match (get("SMTP_HOST"), get("SMTP_USER"), get("SMTP_PASS")) {
            (Some(host), Some(user), Some(pass)) => Some(SmtpSettings {
                host,
                port: number("SMTP_PORT")
                    .and_then(|value| u16::try_from(value).ok())
                    .unwrap_or(587),
                user,
                pass,
            }),
            _ => None,
        };

        Ok(Self {
            db_path: get("MYBESTLIFE_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_FILE)),
            jwt_secret,
            bind_addr: get("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
            log_level: get("LOG_LEVEL"),
            log_dir: get("LOG_DIR"),
            rate_limit_window: number("RATE_LIMIT_WINDOW_MS")
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_RATE_WINDOW),
            rate_limit_max: number("RATE_LIMIT_MAX_REQUESTS")
                .and_then(|value| u32::try_from(value).ok())
                .unwrap_or(DEFAULT_RATE_MAX),
            max_login_attempts: number("MAX_LOGIN_ATTEMPTS")
                .and_then(|value| u32::try_from(value).ok())
                .unwrap_or(DEFAULT_MAX_LOGIN_ATTEMPTS),
            lockout: number("LOCKOUT_DURATION_MINUTES")
                .map(|minutes| Duration::from_secs(minutes.saturating_mul(60)))
                .unwrap_or(DEFAULT_LOCKOUT),
            password_policy,
            token_blacklist_path: get("TOKEN_BLACKLIST_PATH").map(PathBuf::from),
            smtp,
            cors_origin: get("CORS_ORIGIN"),
            trust_proxy: get("TRUST_PROXY").map_or(0, |value| parse_trust_proxy(&value)),
        })
    }
}

/// Accepts a hop count or a boolean; `true` means one hop.
fn parse_trust_proxy(value: &str) -> usize {
    match value.to_ascii_lowercase().as_str() {
        "true" | "yes" => 1,
        "false" | "no" => 0,
        other => other.parse::<usize>().unwrap_or(0),
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, ServerConfig, DEFAULT_BIND_ADDR};
    use std::collections::HashMap;
    use std::time::Duration;

    fn config_from(pairs: &[(&str, &str)]) -> Result<ServerConfig, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn jwt_secret_is_required() {
        assert_eq!(
            config_from(&[]).expect_err("missing secret"),
            ConfigError::Missing("JWT_SECRET")
        );
        assert!(config_from(&[("JWT_SECRET", "   ")]).is_err());
    }

    #[test]
    fn defaults_apply_when_unset_or_malformed() {
        let config = config_from(&[("JWT_SECRET", "s"), ("RATE_LIMIT_MAX_REQUESTS", "many")])
            .expect("config");
        assert_eq!(config.bind_addr, DEFAULT_BIND_ADDR);
        assert_eq!(config.rate_limit_max, 5);
        assert_eq!(config.lockout, Duration::from_secs(15 * 60));
        assert_eq!(config.password_policy.min_length, 8);
        assert!(config.smtp.is_none());
        assert_eq!(config.trust_proxy, 0);
    }

    #[test]
    fn trust_proxy_accepts_flag_or_hop_count() {
        let hops = |value: &str| {
            config_from(&[("JWT_SECRET", "s"), ("TRUST_PROXY", value)])
                .expect("config")
                .trust_proxy
        };
        assert_eq!(hops("true"), 1);
        assert_eq!(hops("2"), 2);
        assert_eq!(hops("false"), 0);
        assert_eq!(hops("loopback"), 0);
    }

    #[test]
    fn overrides_are_parsed() {
        let config = config_from(&[
            ("JWT_SECRET", "s"),
            ("LOCKOUT_DURATION_MINUTES", "30"),
            ("RATE_LIMIT_WINDOW_MS", "1000"),
            ("REQUIRE_SYMBOLS", "true"),
            ("MIN_PASSWORD_LENGTH", "12"),
            ("SMTP_HOST", "smtp.example.com"),
            ("SMTP_USER", "mailer"),
            ("SMTP_PASS", "secret"),
        ])
        .expect("config");
        assert_eq!(config.lockout, Duration::from_secs(30 * 60));
        assert_eq!(config.rate_limit_window, Duration::from_millis(1000));
        assert!(config.password_policy.require_symbol);
        assert_eq!(config.password_policy.min_length, 12);
        assert_eq!(config.smtp.expect("smtp").port, 587);
    }
}
