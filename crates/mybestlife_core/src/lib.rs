//! Core domain logic for My Best Life.
//! This crate is the single source of truth for CP tracking and account rules.

pub mod auth;
pub mod clock;
pub mod db;
pub mod logging;
pub mod mail;
pub mod model;
pub mod repo;
pub mod service;
pub mod store;
pub mod sync;
pub mod tracker;

pub use clock::{Clock, FixedClock, SystemClock};
pub use logging::{default_log_level, init_logging, init_stderr_logging, logging_status, LogTarget};
pub use model::category::Category;
pub use model::commitment::{CommitmentSnapshot, CompletionSet, CpByCategory, LifetimeCp, TaskId};
pub use model::profile::{CpSyncPayload, UserProfile};
pub use model::user::{PublicUser, UserAccount};
pub use repo::{RepoError, RepoResult};
pub use service::commitment_service::{
    CommitmentSession, FlushReport, SessionOptions, TickOutcome,
};
pub use service::profile_service::ProfileAggregator;
pub use store::{KeyValueStore, MemoryKeyValueStore, SqliteKeyValueStore, StoreError};
pub use tracker::{CommitmentTracker, ResetSchedule};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
