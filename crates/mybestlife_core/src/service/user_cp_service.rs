//! Server-side CP aggregates for signed-in accounts.
//!
//! # Invariants
//! - Sync overwrites stored aggregates; the last writer wins.
//! - `days_active` stored on an account is never below 1.

use crate::model::profile::CpSyncPayload;
use crate::model::user::{PublicUser, UserAccount};
use crate::repo::{RepoError, RepoResult, UserRepository};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStats {
    pub total_days: u32,
    #[serde(rename = "dailyCP")]
    pub daily_cp: u64,
    #[serde(rename = "lifetimeCP")]
    pub lifetime_cp: u64,
    /// Lifetime CP per active day, rounded to two decimals.
    #[serde(rename = "averageCP")]
    pub average_cp: f64,
}

pub struct UserCpService<R: UserRepository> {
    repo: R,
}

impl<R: UserRepository> UserCpService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    pub fn commitment_points(&self, user_id: &str) -> RepoResult<CpSyncPayload> {
        let account = self.load(user_id)?;
        Ok(CpSyncPayload {
            daily_cp: account.daily_cp,
            lifetime_cp: account.lifetime_cp,
            cp_by_category: account.cp_by_category,
            days_active: account.days_active,
            last_active_date: account.last_active_date,
        })
    }

    pub fn sync_commitment_points(
        &self,
        user_id: &str,
        payload: &CpSyncPayload,
    ) -> RepoResult<PublicUser> {
        let mut account = self.load(user_id)?;
        account.daily_cp = payload.daily_cp;
        account.lifetime_cp = payload.lifetime_cp;
        account.cp_by_category = payload.cp_by_category;
        account.days_active = payload.days_active.max(1);
        account.last_active_date = payload.last_active_date;
        self.repo.update_user(&account)?;
        Ok(account.to_public())
    }

    pub fn stats(&self, user_id: &str) -> RepoResult<UserStats> {
        let account = self.load(user_id)?;
        let total_days = account.days_active.max(1);
        let average = account.lifetime_cp as f64 / f64::from(total_days);
        Ok(UserStats {
            total_days,
            daily_cp: account.daily_cp,
            lifetime_cp: account.lifetime_cp,
            average_cp: (average * 100.0).round() / 100.0,
        })
    }

    fn load(&self, user_id: &str) -> RepoResult<UserAccount> {
        self.repo
            .find_by_id(user_id)?
            .ok_or_else(|| RepoError::NotFound(format!("user {user_id}")))
    }
}
