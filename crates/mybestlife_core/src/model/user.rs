//! Backend user account model.
//!
//! # Invariants
//! - `password_hash` and one-time tokens never leave the core through
//!   `PublicUser`.
//! - `email` is stored trimmed and lowercased.

use crate::model::commitment::CpByCategory;
use chrono::NaiveDate;
use serde::Serialize;

/// Stable account identifier (UUID v4 text).
pub type UserId = String;

/// Full persisted account row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserAccount {
    pub id: UserId,
    pub name: String,
    pub username: String,
    pub email: String,
    pub phone: Option<String>,
    pub password_hash: String,
    pub profile_pic: String,
    pub daily_cp: u64,
    pub lifetime_cp: u64,
    pub cp_by_category: CpByCategory,
    pub days_active: u32,
    pub start_date: NaiveDate,
    pub last_active_date: NaiveDate,
    pub is_online: bool,
    /// Unix epoch milliseconds.
    pub last_seen_ms: i64,
    pub email_verified: bool,
    pub verification_token: Option<String>,
    pub verification_expires_ms: Option<i64>,
    pub reset_token: Option<String>,
    pub reset_expires_ms: Option<i64>,
    pub created_at_ms: i64,
}

impl UserAccount {
    /// Projects the account into its client-safe shape.
    pub fn to_public(&self) -> PublicUser {
        PublicUser {
            id: self.id.clone(),
            name: self.name.clone(),
            username: self.username.clone(),
            email: self.email.clone(),
            phone: self.phone.clone(),
            profile_pic: self.profile_pic.clone(),
            daily_cp: self.daily_cp,
            lifetime_cp: self.lifetime_cp,
            cp_by_category: self.cp_by_category,
            days_active: self.days_active,
            start_date: self.start_date,
            last_active_date: self.last_active_date,
            is_online: self.is_online,
            last_seen_ms: self.last_seen_ms,
            email_verified: self.email_verified,
            created_at_ms: self.created_at_ms,
        }
    }
}

/// Account projection returned to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub id: UserId,
    pub name: String,
    pub username: String,
    pub email: String,
    pub phone: Option<String>,
    pub profile_pic: String,
    #[serde(rename = "dailyCP")]
    pub daily_cp: u64,
    #[serde(rename = "lifetimeCP")]
    pub lifetime_cp: u64,
    #[serde(rename = "cpByCategory")]
    pub cp_by_category: CpByCategory,
    pub days_active: u32,
    pub start_date: NaiveDate,
    pub last_active_date: NaiveDate,
    pub is_online: bool,
    #[serde(rename = "lastSeen")]
    pub last_seen_ms: i64,
    pub email_verified: bool,
    #[serde(rename = "createdAt")]
    pub created_at_ms: i64,
}
