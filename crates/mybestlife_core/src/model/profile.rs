//! User profile as seen by the client session.
//!
//! # Responsibility
//! - Hold identity fields plus CP aggregates derived from tracker state.
//! - Define the payload pushed to the backend when CP changes.
//!
//! # Invariants
//! - The guest profile uses id `"1"` and is never logged in.
//! - `days_active` is at least 1.

use crate::model::commitment::CpByCategory;
use crate::model::user::PublicUser;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Identifier of the built-in guest profile.
pub const GUEST_PROFILE_ID: &str = "1";
const TREND_DAYS: usize = 7;

/// Aggregate profile record owned by the client session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    pub name: String,
    pub username: String,
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub profile_pic: String,
    #[serde(default, rename = "dailyCP")]
    pub daily_cp: u64,
    #[serde(default, rename = "lifetimeCP")]
    pub lifetime_cp: u64,
    #[serde(default, rename = "cpByCategory")]
    pub cp_by_category: CpByCategory,
    #[serde(default = "default_days_active")]
    pub days_active: u32,
    #[serde(default)]
    pub trends: Vec<u64>,
    #[serde(default)]
    pub is_logged_in: bool,
    pub start_date: NaiveDate,
    pub last_active_date: NaiveDate,
    #[serde(default)]
    pub is_online: bool,
    #[serde(default)]
    pub last_seen: Option<String>,
}

impl UserProfile {
    /// Built-in profile used before sign-in and after logout.
    pub fn guest(today: NaiveDate) -> Self {
        Self {
            id: GUEST_PROFILE_ID.to_string(),
            name: "My Best Life".to_string(),
            username: "mybestlife".to_string(),
            email: "help@mybestlife.com".to_string(),
            phone: String::new(),
            profile_pic: String::new(),
            daily_cp: 0,
            lifetime_cp: 0,
            cp_by_category: CpByCategory::default(),
            days_active: 1,
            trends: vec![0; TREND_DAYS],
            is_logged_in: false,
            start_date: today,
            last_active_date: today,
            is_online: false,
            last_seen: None,
        }
    }

    /// Logged-in placeholder for an account whose details are not known yet.
    pub fn account_stub(id: &str, today: NaiveDate) -> Self {
        Self {
            id: id.to_string(),
            name: String::new(),
            username: String::new(),
            email: String::new(),
            is_logged_in: true,
            ..Self::guest(today)
        }
    }

    /// Builds a logged-in profile from a backend account projection.
    pub fn from_account(user: &PublicUser) -> Self {
        Self {
            id: user.id.clone(),
            name: user.name.clone(),
            username: user.username.clone(),
            email: user.email.clone(),
            phone: user.phone.clone().unwrap_or_default(),
            profile_pic: user.profile_pic.clone(),
            daily_cp: user.daily_cp,
            lifetime_cp: user.lifetime_cp,
            cp_by_category: user.cp_by_category,
            days_active: user.days_active.max(1),
            trends: vec![0; TREND_DAYS],
            is_logged_in: true,
            start_date: user.start_date,
            last_active_date: user.last_active_date,
            is_online: true,
            last_seen: None,
        }
    }

    pub fn is_guest(&self) -> bool {
        self.id == GUEST_PROFILE_ID
    }

    /// User id that namespaces per-user storage keys, if any.
    pub fn storage_user_id(&self) -> Option<&str> {
        if self.is_guest() || self.id.trim().is_empty() {
            None
        } else {
            Some(self.id.as_str())
        }
    }

    /// Payload pushed to the backend after a recompute.
    pub fn sync_payload(&self) -> CpSyncPayload {
        CpSyncPayload {
            daily_cp: self.daily_cp,
            lifetime_cp: self.lifetime_cp,
            cp_by_category: self.cp_by_category,
            days_active: self.days_active,
            last_active_date: self.last_active_date,
        }
    }
}

fn default_days_active() -> u32 {
    1
}

/// CP aggregate snapshot exchanged with `/api/users/commitment-points`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CpSyncPayload {
    #[serde(rename = "dailyCP")]
    pub daily_cp: u64,
    #[serde(rename = "lifetimeCP")]
    pub lifetime_cp: u64,
    #[serde(rename = "cpByCategory")]
    pub cp_by_category: CpByCategory,
    pub days_active: u32,
    pub last_active_date: NaiveDate,
}
