//! Profile aggregation from tracker state.
//!
//! # Responsibility
//! - Project tracker counters into `UserProfile` CP fields.
//! - Push the resulting aggregates to the backend when signed in.
//!
//! # Invariants
//! - `daily_cp` is the sum of today's per-category counts.
//! - `lifetime_cp` equals the sum of `cp_by_category`.
//! - Sync is attempted only for logged-in profiles with a bearer token.

use crate::model::profile::UserProfile;
use crate::sync::{NoopProfileSync, ProfileSync, SyncError};
use crate::tracker::CommitmentTracker;
use chrono::NaiveDate;
use log::{debug, warn};

/// Result of the remote push that follows a recompute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    Pushed,
    /// Guest profile or no token; nothing was sent.
    Skipped,
    Failed(SyncError),
}

pub struct ProfileAggregator {
    sync: Box<dyn ProfileSync>,
}

impl Default for ProfileAggregator {
    fn default() -> Self {
        Self::new(Box::new(NoopProfileSync))
    }
}

impl ProfileAggregator {
    pub fn new(sync: Box<dyn ProfileSync>) -> Self {
        Self { sync }
    }

    /// Rewrites the profile's CP fields from `tracker` as of `today`.
    pub fn recompute(&self, profile: &mut UserProfile, tracker: &CommitmentTracker, today: NaiveDate) {
        profile.daily_cp = tracker.total_daily_cp();
        profile.lifetime_cp = tracker.total_lifetime_cp();
        profile.cp_by_category = *tracker.lifetime();
        profile.days_active = days_active(tracker.start_date(), today);
        profile.last_active_date = today;
    }

    /// Sends the profile's aggregates; failures are logged and returned.
    pub fn push(&self, profile: &UserProfile, token: Option<&str>) -> SyncOutcome {
        let token = match token.map(str::trim).filter(|t| !t.is_empty()) {
            Some(token) if profile.is_logged_in => token,
            _ => {
                debug!("event=profile_sync module=service status=skipped");
                return SyncOutcome::Skipped;
            }
        };

        match self.sync.push(token, &profile.sync_payload()) {
            Ok(()) => {
                debug!("event=profile_sync module=service status=ok");
                SyncOutcome::Pushed
            }
            Err(err) => {
                warn!("event=profile_sync module=service status=error error={err}");
                SyncOutcome::Failed(err)
            }
        }
    }
}

/// Whole UTC days between `start` and `today`, counting both ends.
pub fn days_active(start: NaiveDate, today: NaiveDate) -> u32 {
    let span = (today - start).num_days().unsigned_abs();
    u32::try_from(span.saturating_add(1)).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::{days_active, ProfileAggregator, SyncOutcome};
    use crate::model::category::Category;
    use crate::model::profile::{CpSyncPayload, UserProfile};
    use crate::sync::{ProfileSync, SyncError};
    use crate::tracker::CommitmentTracker;
    use chrono::NaiveDate;
    use std::sync::{Arc, Mutex};

    struct RecordingSync {
        pushed: Arc<Mutex<Vec<CpSyncPayload>>>,
        fail: bool,
    }

    impl ProfileSync for RecordingSync {
        fn push(&self, _token: &str, payload: &CpSyncPayload) -> Result<(), SyncError> {
            if self.fail {
                return Err(SyncError::Status(500));
            }
            self.pushed.lock().expect("lock").push(*payload);
            Ok(())
        }
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).expect("valid date")
    }

    #[test]
    fn days_active_counts_both_ends() {
        assert_eq!(days_active(day(1), day(1)), 1);
        assert_eq!(days_active(day(1), day(3)), 3);
    }

    #[test]
    fn recompute_projects_tracker_totals() {
        let mut tracker = CommitmentTracker::new(day(1));
        tracker.complete_task(Category::Mind, 1);
        tracker.complete_task(Category::Body, 2);
        tracker.check_reset(day(2));
        tracker.complete_task(Category::Body, 9);

        let mut profile = UserProfile::guest(day(1));
        ProfileAggregator::default().recompute(&mut profile, &tracker, day(2));
        assert_eq!(profile.daily_cp, 1);
        assert_eq!(profile.lifetime_cp, 3);
        assert_eq!(profile.cp_by_category.body, 2);
        assert_eq!(profile.days_active, 2);
        assert_eq!(profile.last_active_date, day(2));
    }

    #[test]
    fn push_requires_login_and_token() {
        let pushed = Arc::new(Mutex::new(Vec::new()));
        let aggregator = ProfileAggregator::new(Box::new(RecordingSync {
            pushed: Arc::clone(&pushed),
            fail: false,
        }));
        let mut profile = UserProfile::guest(day(1));

        assert_eq!(aggregator.push(&profile, Some("t")), SyncOutcome::Skipped);
        profile.is_logged_in = true;
        assert_eq!(aggregator.push(&profile, None), SyncOutcome::Skipped);
        assert_eq!(aggregator.push(&profile, Some("t")), SyncOutcome::Pushed);
        assert_eq!(pushed.lock().expect("lock").len(), 1);
    }

    #[test]
    fn push_failure_is_reported_not_raised() {
        let aggregator = ProfileAggregator::new(Box::new(RecordingSync {
            pushed: Arc::new(Mutex::new(Vec::new())),
            fail: true,
        }));
        let mut profile = UserProfile::guest(day(1));
        profile.is_logged_in = true;
        assert_eq!(
            aggregator.push(&profile, Some("t")),
            SyncOutcome::Failed(SyncError::Status(500))
        );
    }
}
