//! Reset-check scheduling policies.
//!
//! Both policies only decide *when* to call `CommitmentTracker::check_reset`;
//! neither performs the transition itself.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::time::Duration;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetSchedule {
    /// Check at a fixed interval; a late tick only delays the reset.
    Polling { interval: Duration },
    /// Check once at the next UTC midnight, recomputed after every check.
    Midnight,
}

impl Default for ResetSchedule {
    fn default() -> Self {
        Self::Polling {
            interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl ResetSchedule {
    /// Delay until the next reset check, measured from `now`.
    pub fn next_check_in(&self, now: DateTime<Utc>) -> Duration {
        match self {
            Self::Polling { interval } => *interval,
            Self::Midnight => {
                let next_midnight = now
                    .date_naive()
                    .succ_opt()
                    .map(|date| date.and_time(chrono::NaiveTime::MIN).and_utc());
                match next_midnight {
                    Some(at) => (at - now)
                        .max(ChronoDuration::zero())
                        .to_std()
                        .unwrap_or(DEFAULT_POLL_INTERVAL),
                    None => DEFAULT_POLL_INTERVAL,
                }
            }
        }
    }

    /// Parses `polling`, `polling:<secs>` or `midnight`.
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim().to_ascii_lowercase();
        match value.as_str() {
            "midnight" => Some(Self::Midnight),
            "polling" => Some(Self::default()),
            other => {
                let secs = other.strip_prefix("polling:")?.parse::<u64>().ok()?;
                (secs > 0).then(|| Self::Polling {
                    interval: Duration::from_secs(secs),
                })
            }
        }
    }
}
