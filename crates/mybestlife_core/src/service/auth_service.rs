//! Account registration, verification and session flows.
//!
//! # Responsibility
//! - Validate and create accounts; issue verification and reset codes.
//! - Authenticate credentials with lockout, issue and revoke bearer tokens.
//!
//! # Invariants
//! - Passwords are only stored hashed.
//! - `forgot_password` never reveals whether an account exists.
//! - Mail delivery failures never undo a committed account change.

use crate::auth::{
    is_valid_email, normalize_email, random_token, sanitize_text, AuthSecurity, Claims, RetryAfter,
    TokenError,
};
use crate::clock::Clock;
use crate::mail::{MailError, Mailer, OutgoingMail};
use crate::model::commitment::CpByCategory;
use crate::model::user::{PublicUser, UserAccount};
use crate::repo::{RepoError, UserRepository};
use log::{info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

const VERIFICATION_TTL_MS: i64 = 24 * 60 * 60 * 1000;
const RESET_TTL_MS: i64 = 60 * 60 * 1000;
const ONE_TIME_TOKEN_BYTES: usize = 32;

#[derive(Debug)]
pub enum AuthError {
    Validation(String),
    /// Unique field already taken (`email`, `username` or `phone`).
    Conflict(String),
    InvalidCredentials,
    EmailNotVerified,
    Locked(RetryAfter),
    /// Verification or reset code unknown or expired.
    InvalidOneTimeToken,
    /// Bearer token missing, malformed, expired or revoked.
    Unauthorized(&'static str),
    UserNotFound,
    AlreadyVerified,
    Mail(MailError),
    Token(TokenError),
    Repo(RepoError),
}

impl AuthError {
    /// Stable machine-readable code for API envelopes.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_failed",
            Self::Conflict(_) => "account_exists",
            Self::InvalidCredentials => "invalid_credentials",
            Self::EmailNotVerified => "email_not_verified",
            Self::Locked(_) => "account_locked",
            Self::InvalidOneTimeToken => "invalid_or_expired_token",
            Self::Unauthorized(_) => "unauthorized",
            Self::UserNotFound => "user_not_found",
            Self::AlreadyVerified => "already_verified",
            Self::Mail(_) => "mail_failed",
            Self::Token(_) | Self::Repo(_) => "internal_error",
        }
    }
}

impl Display for AuthError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(message) => write!(f, "{message}"),
            Self::Conflict(field) => write!(f, "User already exists with this {field}"),
            Self::InvalidCredentials => write!(f, "Invalid credentials"),
            Self::EmailNotVerified => {
                write!(f, "Please verify your email address before signing in")
            }
            Self::Locked(retry) => write!(
                f,
                "Account temporarily locked; try again in {} seconds",
                retry.secs
            ),
            Self::InvalidOneTimeToken => write!(f, "Invalid or expired token"),
            Self::Unauthorized(reason) => write!(f, "{reason}"),
            Self::UserNotFound => write!(f, "User not found"),
            Self::AlreadyVerified => write!(f, "Email is already verified"),
            Self::Mail(err) => write!(f, "{err}"),
            Self::Token(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for AuthError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Mail(err) => Some(err),
            Self::Token(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for AuthError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::Conflict(detail) => Self::Conflict(conflict_field(&detail).to_string()),
            other => Self::Repo(other),
        }
    }
}

impl From<TokenError> for AuthError {
    fn from(value: TokenError) -> Self {
        match value {
            TokenError::Invalid => Self::Unauthorized("Invalid token"),
            TokenError::Expired => Self::Unauthorized("Token expired"),
            other => Self::Token(other),
        }
    }
}

pub type AuthResult<T> = Result<T, AuthError>;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegisterRequest {
    pub name: String,
    pub username: String,
    pub email: String,
    pub phone: Option<String>,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginResult {
    pub token: String,
    pub user: PublicUser,
}

pub struct AuthService<'a, R: UserRepository> {
    repo: R,
    security: &'a AuthSecurity,
    mailer: &'a dyn Mailer,
    clock: &'a dyn Clock,
}

impl<'a, R: UserRepository> AuthService<'a, R> {
    pub fn new(
        repo: R,
        security: &'a AuthSecurity,
        mailer: &'a dyn Mailer,
        clock: &'a dyn Clock,
    ) -> Self {
        Self {
            repo,
            security,
            mailer,
            clock,
        }
    }

    /// Creates an unverified account and sends welcome and verification mail.
    pub fn register(&self, request: &RegisterRequest) -> AuthResult<PublicUser> {
        let name = sanitize_text(&request.name);
        let username = sanitize_text(&request.username);
        let email = normalize_email(&request.email);
        let phone = request
            .phone
            .as_deref()
            .map(sanitize_text)
            .filter(|phone| !phone.is_empty());

        if name.is_empty() || username.is_empty() || email.is_empty() || request.password.is_empty()
        {
            return Err(AuthError::Validation(
                "Name, username, email and password are required".to_string(),
            ));
        }
        if !is_valid_email(&email) {
            return Err(AuthError::Validation("Invalid email address".to_string()));
        }
        self.check_policy(&request.password)?;

        if let Some(conflict) = self.repo.find_conflict(&email, &username, phone.as_deref())? {
            return Err(AuthError::Conflict(conflict.field().to_string()));
        }

        let now_ms = self.clock.now_ms();
        let today = self.clock.today();
        let verification_token = random_token(ONE_TIME_TOKEN_BYTES);
        let account = UserAccount {
            id: Uuid::new_v4().to_string(),
            name,
            username,
            email,
            phone,
            password_hash: self.security.hasher.hash(&request.password),
            profile_pic: String::new(),
            daily_cp: 0,
            lifetime_cp: 0,
            cp_by_category: CpByCategory::default(),
            days_active: 1,
            start_date: today,
            last_active_date: today,
            is_online: false,
            last_seen_ms: now_ms,
            email_verified: false,
            verification_token: Some(verification_token.clone()),
            verification_expires_ms: Some(now_ms + VERIFICATION_TTL_MS),
            reset_token: None,
            reset_expires_ms: None,
            created_at_ms: now_ms,
        };
        self.repo.create_user(&account)?;
        info!("event=user_register module=auth status=ok");

        self.send_best_effort(&OutgoingMail::welcome(&account.email, &account.name));
        self.send_best_effort(&OutgoingMail::verification(
            &account.email,
            &account.name,
            &verification_token,
        ));
        Ok(account.to_public())
    }

    pub fn verify_email(&self, token: &str) -> AuthResult<()> {
        let token = token.trim();
        if token.is_empty() {
            return Err(AuthError::Validation(
                "Verification token is required".to_string(),
            ));
        }
        let now_ms = self.clock.now_ms();
        let mut account = self
            .repo
            .find_by_verification_token(token)?
            .filter(|account| account.verification_expires_ms.is_some_and(|exp| exp > now_ms))
            .ok_or(AuthError::InvalidOneTimeToken)?;

        account.email_verified = true;
        account.verification_token = None;
        account.verification_expires_ms = None;
        self.repo.update_user(&account)?;
        info!("event=email_verify module=auth status=ok");
        Ok(())
    }

    pub fn resend_verification(&self, email: &str) -> AuthResult<()> {
        let email = self.require_email(email)?;
        let mut account = self
            .repo
            .find_by_email(&email)?
            .ok_or(AuthError::UserNotFound)?;
        if account.email_verified {
            return Err(AuthError::AlreadyVerified);
        }

        let token = random_token(ONE_TIME_TOKEN_BYTES);
        account.verification_token = Some(token.clone());
        account.verification_expires_ms = Some(self.clock.now_ms() + VERIFICATION_TTL_MS);
        self.repo.update_user(&account)?;

        self.mailer
            .send(&OutgoingMail::verification(&account.email, &account.name, &token))
            .map_err(AuthError::Mail)
    }

    /// Issues a reset code when the account exists; succeeds silently otherwise.
    pub fn forgot_password(&self, email: &str) -> AuthResult<()> {
        let email = self.require_email(email)?;
        let Some(mut account) = self.repo.find_by_email(&email)? else {
            info!("event=password_forgot module=auth status=ok account=absent");
            return Ok(());
        };

        let token = random_token(ONE_TIME_TOKEN_BYTES);
        account.reset_token = Some(token.clone());
        account.reset_expires_ms = Some(self.clock.now_ms() + RESET_TTL_MS);
        self.repo.update_user(&account)?;

        self.mailer
            .send(&OutgoingMail::password_reset(&account.email, &account.name, &token))
            .map_err(AuthError::Mail)
    }

    pub fn reset_password(&self, token: &str, new_password: &str) -> AuthResult<()> {
        let token = token.trim();
        if token.is_empty() || new_password.is_empty() {
            return Err(AuthError::Validation(
                "Token and new password are required".to_string(),
            ));
        }
        self.check_policy(new_password)?;

        let now_ms = self.clock.now_ms();
        let mut account = self
            .repo
            .find_by_reset_token(token)?
            .filter(|account| account.reset_expires_ms.is_some_and(|exp| exp > now_ms))
            .ok_or(AuthError::InvalidOneTimeToken)?;

        account.password_hash = self.security.hasher.hash(new_password);
        account.reset_token = None;
        account.reset_expires_ms = None;
        self.repo.update_user(&account)?;
        self.security.lockout.record_success(&account.email);
        info!("event=password_reset module=auth status=ok");
        Ok(())
    }

    pub fn login(&self, email: &str, password: &str) -> AuthResult<LoginResult> {
        let email = normalize_email(email);
        if email.is_empty() || password.is_empty() {
            return Err(AuthError::Validation(
                "Email and password are required".to_string(),
            ));
        }
        let now_ms = self.clock.now_ms();
        self.security
            .lockout
            .check(&email, now_ms)
            .map_err(AuthError::Locked)?;

        let account = match self.repo.find_by_email(&email)? {
            Some(account) if self.security.hasher.verify(password, &account.password_hash) => {
                account
            }
            _ => {
                if self.security.lockout.record_failure(&email, now_ms).is_some() {
                    warn!("event=login module=auth status=locked");
                } else {
                    warn!("event=login module=auth status=error error_code=invalid_credentials");
                }
                return Err(AuthError::InvalidCredentials);
            }
        };
        if !account.email_verified {
            return Err(AuthError::EmailNotVerified);
        }
        self.security.lockout.record_success(&email);

        let mut account = account;
        account.last_active_date = self.clock.today();
        account.is_online = true;
        account.last_seen_ms = now_ms;
        self.repo.update_user(&account)?;

        let token = self
            .security
            .tokens
            .issue(&account.id, &account.email, now_ms)?;
        info!("event=login module=auth status=ok");
        Ok(LoginResult {
            token,
            user: account.to_public(),
        })
    }

    /// Verifies a bearer token and rejects revoked ones.
    pub fn authenticate(&self, token: &str) -> AuthResult<Claims> {
        let token = token.trim();
        if token.is_empty() {
            return Err(AuthError::Unauthorized("No token provided"));
        }
        if self.security.blacklist.is_revoked(token) {
            return Err(AuthError::Unauthorized("Token revoked"));
        }
        Ok(self.security.tokens.verify(token, self.clock.now_ms())?)
    }

    pub fn me(&self, token: &str) -> AuthResult<PublicUser> {
        let claims = self.authenticate(token)?;
        self.repo
            .find_by_id(&claims.user_id)?
            .map(|account| account.to_public())
            .ok_or(AuthError::UserNotFound)
    }

    /// Marks the account offline and revokes the token.
    pub fn logout(&self, token: &str) -> AuthResult<()> {
        let claims = self.authenticate(token)?;
        if let Some(mut account) = self.repo.find_by_id(&claims.user_id)? {
            account.is_online = false;
            account.last_seen_ms = self.clock.now_ms();
            self.repo.update_user(&account)?;
        }
        self.security.blacklist.revoke(token.trim());
        info!("event=logout module=auth status=ok");
        Ok(())
    }

    fn require_email(&self, email: &str) -> AuthResult<String> {
        let email = normalize_email(email);
        if email.is_empty() {
            return Err(AuthError::Validation("Email is required".to_string()));
        }
        Ok(email)
    }

    fn check_policy(&self, password: &str) -> AuthResult<()> {
        let violations = self.security.policy.check(password);
        if violations.is_empty() {
            return Ok(());
        }
        let message = violations
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ");
        Err(AuthError::Validation(message))
    }

    fn send_best_effort(&self, mail: &OutgoingMail) {
        if let Err(err) = self.mailer.send(mail) {
            warn!(
                "event=mail_send module=auth status=error kind={} error={err}",
                mail.kind.as_str()
            );
        }
    }
}

fn conflict_field(detail: &str) -> &'static str {
    if detail.contains("username") {
        "username"
    } else if detail.contains("phone") {
        "phone"
    } else {
        "email"
    }
}
