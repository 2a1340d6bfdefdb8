//! Account repository contract and SQLite implementation.
//!
//! # Invariants
//! - Emails are stored lowercased; lookups expect normalized input.
//! - `update_user` replaces every mutable column of the row.

use crate::clock::format_iso_date;
use crate::model::commitment::CpByCategory;
use crate::model::user::UserAccount;
use crate::repo::{
    bool_to_int, int_to_bool, int_to_u64, text_to_date, u64_to_int, RepoError, RepoResult,
};
use rusqlite::{params, Connection, Row};

const USER_SELECT_SQL: &str = "SELECT
    id,
    name,
    username,
    email,
    phone,
    password_hash,
    profile_pic,
    daily_cp,
    lifetime_cp,
    mind_cp,
    body_cp,
    soul_cp,
    days_active,
    start_date,
    last_active_date,
    is_online,
    last_seen,
    email_verified,
    verification_token,
    verification_expires,
    reset_token,
    reset_expires,
    created_at
FROM users";

/// Which unique account field an existing row already holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountConflict {
    Email,
    Username,
    Phone,
}

impl AccountConflict {
    pub fn field(self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Username => "username",
            Self::Phone => "phone",
        }
    }
}

pub trait UserRepository {
    fn create_user(&self, account: &UserAccount) -> RepoResult<()>;
    fn update_user(&self, account: &UserAccount) -> RepoResult<()>;
    fn find_by_id(&self, id: &str) -> RepoResult<Option<UserAccount>>;
    fn find_by_email(&self, email: &str) -> RepoResult<Option<UserAccount>>;
    fn find_by_verification_token(&self, token: &str) -> RepoResult<Option<UserAccount>>;
    fn find_by_reset_token(&self, token: &str) -> RepoResult<Option<UserAccount>>;
    /// Reports the first unique field already taken by another account.
    fn find_conflict(
        &self,
        email: &str,
        username: &str,
        phone: Option<&str>,
    ) -> RepoResult<Option<AccountConflict>>;
}

pub struct SqliteUserRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteUserRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    fn find_one(&self, column: &str, value: &str) -> RepoResult<Option<UserAccount>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{USER_SELECT_SQL} WHERE {column} = ?1;"))?;
        let mut rows = stmt.query([value])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_user_row(row)?));
        }
        Ok(None)
    }

    fn exists(&self, column: &str, value: &str) -> RepoResult<bool> {
        let found: i64 = self.conn.query_row(
            &format!("SELECT EXISTS(SELECT 1 FROM users WHERE {column} = ?1);"),
            [value],
            |row| row.get(0),
        )?;
        Ok(found == 1)
    }
}

impl UserRepository for SqliteUserRepository<'_> {
    fn create_user(&self, account: &UserAccount) -> RepoResult<()> {
        self.conn.execute(
            "INSERT INTO users (
                id, name, username, email, phone, password_hash, profile_pic,
                daily_cp, lifetime_cp, mind_cp, body_cp, soul_cp, days_active,
                start_date, last_active_date, is_online, last_seen, email_verified,
                verification_token, verification_expires, reset_token, reset_expires,
                created_at
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16,
                ?17, ?18, ?19, ?20, ?21, ?22, ?23
            );",
            params![
                account.id,
                account.name,
                account.username,
                account.email,
                account.phone,
                account.password_hash,
                account.profile_pic,
                u64_to_int(account.daily_cp),
                u64_to_int(account.lifetime_cp),
                u64_to_int(account.cp_by_category.mind),
                u64_to_int(account.cp_by_category.body),
                u64_to_int(account.cp_by_category.soul),
                account.days_active,
                format_iso_date(account.start_date),
                format_iso_date(account.last_active_date),
                bool_to_int(account.is_online),
                account.last_seen_ms,
                bool_to_int(account.email_verified),
                account.verification_token,
                account.verification_expires_ms,
                account.reset_token,
                account.reset_expires_ms,
                account.created_at_ms,
            ],
        )?;
        Ok(())
    }

    fn update_user(&self, account: &UserAccount) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE users
             SET
                name = ?2,
                username = ?3,
                email = ?4,
                phone = ?5,
                password_hash = ?6,
                profile_pic = ?7,
                daily_cp = ?8,
                lifetime_cp = ?9,
                mind_cp = ?10,
                body_cp = ?11,
                soul_cp = ?12,
                days_active = ?13,
                start_date = ?14,
                last_active_date = ?15,
                is_online = ?16,
                last_seen = ?17,
                email_verified = ?18,
                verification_token = ?19,
                verification_expires = ?20,
                reset_token = ?21,
                reset_expires = ?22,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1;",
            params![
                account.id,
                account.name,
                account.username,
                account.email,
                account.phone,
                account.password_hash,
                account.profile_pic,
                u64_to_int(account.daily_cp),
                u64_to_int(account.lifetime_cp),
                u64_to_int(account.cp_by_category.mind),
                u64_to_int(account.cp_by_category.body),
                u64_to_int(account.cp_by_category.soul),
                account.days_active,
                format_iso_date(account.start_date),
                format_iso_date(account.last_active_date),
                bool_to_int(account.is_online),
                account.last_seen_ms,
                bool_to_int(account.email_verified),
                account.verification_token,
                account.verification_expires_ms,
                account.reset_token,
                account.reset_expires_ms,
            ],
        )?;

        if changed == 0 {
            return Err(RepoError::NotFound(format!("user {}", account.id)));
        }
        Ok(())
    }

    fn find_by_id(&self, id: &str) -> RepoResult<Option<UserAccount>> {
        self.find_one("id", id)
    }

    fn find_by_email(&self, email: &str) -> RepoResult<Option<UserAccount>> {
        self.find_one("email", email)
    }

    fn find_by_verification_token(&self, token: &str) -> RepoResult<Option<UserAccount>> {
        self.find_one("verification_token", token)
    }

    fn find_by_reset_token(&self, token: &str) -> RepoResult<Option<UserAccount>> {
        self.find_one("reset_token", token)
    }

    fn find_conflict(
        &self,
        email: &str,
        username: &str,
        phone: Option<&str>,
    ) -> RepoResult<Option<AccountConflict>> {
        if self.exists("email", email)? {
            return Ok(Some(AccountConflict::Email));
        }
        if self.exists("username", username)? {
            return Ok(Some(AccountConflict::Username));
        }
        if let Some(phone) = phone {
            if self.exists("phone", phone)? {
                return Ok(Some(AccountConflict::Phone));
            }
        }
        Ok(None)
    }
}

fn parse_user_row(row: &Row<'_>) -> RepoResult<UserAccount> {
    let start_date: String = row.get("start_date")?;
    let last_active_date: String = row.get("last_active_date")?;
    let days_active: i64 = row.get("days_active")?;

    Ok(UserAccount {
        id: row.get("id")?,
        name: row.get("name")?,
        username: row.get("username")?,
        email: row.get("email")?,
        phone: row.get("phone")?,
        password_hash: row.get("password_hash")?,
        profile_pic: row.get("profile_pic")?,
        daily_cp: int_to_u64(row.get("daily_cp")?, "users.daily_cp")?,
        lifetime_cp: int_to_u64(row.get("lifetime_cp")?, "users.lifetime_cp")?,
        cp_by_category: CpByCategory {
            mind: int_to_u64(row.get("mind_cp")?, "users.mind_cp")?,
            body: int_to_u64(row.get("body_cp")?, "users.body_cp")?,
            soul: int_to_u64(row.get("soul_cp")?, "users.soul_cp")?,
        },
        days_active: u32::try_from(days_active).map_err(|_| {
            RepoError::InvalidData(format!("invalid days_active `{days_active}` in users"))
        })?,
        start_date: text_to_date(&start_date, "users.start_date")?,
        last_active_date: text_to_date(&last_active_date, "users.last_active_date")?,
        is_online: int_to_bool(row.get("is_online")?, "users.is_online")?,
        last_seen_ms: row.get("last_seen")?,
        email_verified: int_to_bool(row.get("email_verified")?, "users.email_verified")?,
        verification_token: row.get("verification_token")?,
        verification_expires_ms: row.get("verification_expires")?,
        reset_token: row.get("reset_token")?,
        reset_expires_ms: row.get("reset_expires")?,
        created_at_ms: row.get("created_at")?,
    })
}
