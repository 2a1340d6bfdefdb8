//! Client-side CP session: tracker, profile and persistence wired together.
//!
//! # Responsibility
//! - Load one user's commitment state and profile from the local store.
//! - Apply user actions and reset sweeps, then recompute the profile.
//! - Persist changed keys (debounced) and push profile aggregates.
//!
//! # Invariants
//! - All mutations run on the caller's thread through `&mut self`.
//! - Persistence and sync failures are logged; in-memory state is never
//!   rolled back because of them.
//! - Each dirty key is written at most once per flush.
//! - Remote pushes run inline through the aggregator's adapter; network
//!   adapters are wrapped in `BackgroundProfileSync` so user actions never
//!   wait on the backend.

use crate::clock::Clock;
use crate::model::category::Category;
use crate::model::commitment::{CommitmentSnapshot, TaskId};
use crate::model::profile::UserProfile;
use crate::service::profile_service::ProfileAggregator;
use crate::store::{
    clear_commitment, clear_profile, load_commitment, load_profile, save_profile, write_completed,
    write_last_reset_date, write_lifetime_cp, write_start_date, CommitmentKeys, KeyValueStore,
    StoreResult, PROFILE_KEY,
};
use crate::tracker::{CommitmentTracker, ResetSchedule};
use log::{error, info, warn};
use std::time::Duration;

pub const DEFAULT_WRITE_DEBOUNCE: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOptions {
    pub schedule: ResetSchedule,
    /// Zero writes every change immediately.
    pub write_debounce: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            schedule: ResetSchedule::default(),
            write_debounce: DEFAULT_WRITE_DEBOUNCE,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct PendingWrites {
    completed: bool,
    lifetime_cp: bool,
    last_reset_date: bool,
    start_date: bool,
    profile: bool,
}

impl PendingWrites {
    fn all() -> Self {
        Self {
            completed: true,
            lifetime_cp: true,
            last_reset_date: true,
            start_date: true,
            profile: true,
        }
    }

    fn any(&self) -> bool {
        self.completed || self.lifetime_cp || self.last_reset_date || self.start_date || self.profile
    }
}

/// Counts from one flush pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushReport {
    pub written: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickOutcome {
    pub reset: bool,
    pub flush: FlushReport,
    /// Delay the host should wait before the next `tick`.
    pub next_check_in: Duration,
}

pub struct CommitmentSession<S: KeyValueStore, C: Clock> {
    store: S,
    clock: C,
    options: SessionOptions,
    aggregator: ProfileAggregator,
    keys: CommitmentKeys,
    tracker: CommitmentTracker,
    profile: UserProfile,
    auth_token: Option<String>,
    pending: PendingWrites,
    dirty_since_ms: Option<i64>,
}

impl<S: KeyValueStore, C: Clock> CommitmentSession<S, C> {
    /// Loads the stored profile (or the guest profile) and its commitment state.
    ///
    /// Runs the reset sweep once and persists the loaded state.
    pub fn open(store: S, clock: C, aggregator: ProfileAggregator, options: SessionOptions) -> Self {
        let today = clock.today();
        let profile = load_profile(&store).unwrap_or_else(|| UserProfile::guest(today));
        let keys = CommitmentKeys::for_user(profile.storage_user_id());
        let tracker = load_tracker(&store, &keys, today);

        let mut session = Self {
            store,
            clock,
            options,
            aggregator,
            keys,
            tracker,
            profile,
            auth_token: None,
            pending: PendingWrites::default(),
            dirty_since_ms: None,
        };
        session.after_load();
        info!(
            "event=commitment_open module=service status=ok guest={} total_daily_cp={} total_lifetime_cp={}",
            session.profile.is_guest(),
            session.tracker.total_daily_cp(),
            session.tracker.total_lifetime_cp()
        );
        session
    }

    /// Switches to a signed-in profile and loads that user's state.
    ///
    /// Pending writes for the previous user are flushed first.
    pub fn sign_in(&mut self, profile: UserProfile, token: Option<String>) {
        self.flush();
        let today = self.clock.today();
        self.profile = profile;
        self.profile.is_logged_in = true;
        self.set_auth_token(token);
        self.keys = CommitmentKeys::for_user(self.profile.storage_user_id());
        self.tracker = load_tracker(&self.store, &self.keys, today);
        self.after_load();
        info!("event=session_sign_in module=service status=ok");
    }

    /// Restores the bearer token for a profile that was loaded from storage.
    pub fn set_auth_token(&mut self, token: Option<String>) {
        self.auth_token = token.filter(|value| !value.trim().is_empty());
    }

    pub fn is_authenticated(&self) -> bool {
        self.profile.is_logged_in && self.auth_token.is_some()
    }

    /// Clears the current user's stored state and returns to the guest profile.
    pub fn logout(&mut self) {
        let today = self.clock.today();
        if let Err(err) = clear_user_state(&mut self.store, &self.keys) {
            warn!("event=session_logout module=service status=error error={err}");
        }
        self.pending = PendingWrites::default();
        self.dirty_since_ms = None;
        self.auth_token = None;
        self.profile = UserProfile::guest(today);
        self.keys = CommitmentKeys::for_user(None);
        self.tracker = load_tracker(&self.store, &self.keys, today);
        self.after_load();
        info!("event=session_logout module=service status=ok");
    }

    pub fn complete(&mut self, category: Category, task_id: TaskId) -> bool {
        if !self.tracker.complete_task(category, task_id) {
            return false;
        }
        self.mark(|p| {
            p.completed = true;
            p.lifetime_cp = true;
        });
        self.refresh_profile();
        self.flush_if_due();
        true
    }

    pub fn uncomplete(&mut self, category: Category, task_id: TaskId) -> bool {
        if !self.tracker.uncomplete_task(category, task_id) {
            return false;
        }
        self.mark(|p| p.completed = true);
        self.refresh_profile();
        self.flush_if_due();
        true
    }

    /// Timer entry point: reset sweep plus any due debounced writes.
    pub fn tick(&mut self) -> TickOutcome {
        let reset = self.run_reset_check();
        if reset {
            self.refresh_profile();
        }
        let flush = self.flush_if_due();
        TickOutcome {
            reset,
            flush,
            next_check_in: self.options.schedule.next_check_in(self.clock.now()),
        }
    }

    /// Writes every pending key now, independent of the debounce window.
    pub fn flush(&mut self) -> FlushReport {
        if !self.pending.any() {
            return FlushReport::default();
        }
        let pending = std::mem::take(&mut self.pending);
        self.dirty_since_ms = None;

        let mut report = FlushReport::default();
        let mut record = |key: &str, result: StoreResult<()>| match result {
            Ok(()) => report.written += 1,
            Err(err) => {
                report.failed += 1;
                error!("event=store_write module=service status=error key={key} error={err}");
            }
        };

        let store = &mut self.store;
        let keys = &self.keys;
        if pending.completed {
            record(&keys.completed, write_completed(store, keys, self.tracker.completed()));
        }
        if pending.lifetime_cp {
            record(&keys.lifetime_cp, write_lifetime_cp(store, keys, self.tracker.lifetime()));
        }
        if pending.last_reset_date {
            record(
                &keys.last_reset_date,
                write_last_reset_date(store, keys, self.tracker.last_reset_date()),
            );
        }
        if pending.start_date {
            record(&keys.start_date, write_start_date(store, keys, self.tracker.start_date()));
        }
        if pending.profile {
            record(PROFILE_KEY, save_profile(store, &self.profile));
        }
        report
    }

    pub fn has_pending_writes(&self) -> bool {
        self.pending.any()
    }

    pub fn daily_cp(&self, category: Category) -> u64 {
        self.tracker.daily_cp(category)
    }

    pub fn lifetime_cp(&self, category: Category) -> u64 {
        self.tracker.lifetime_cp(category)
    }

    pub fn snapshot(&self) -> CommitmentSnapshot {
        self.tracker.snapshot()
    }

    pub fn tracker(&self) -> &CommitmentTracker {
        &self.tracker
    }

    pub fn profile(&self) -> &UserProfile {
        &self.profile
    }

    pub fn keys(&self) -> &CommitmentKeys {
        &self.keys
    }

    pub fn schedule(&self) -> ResetSchedule {
        self.options.schedule
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Consumes the session, flushing pending writes, and returns the store.
    pub fn close(mut self) -> S {
        self.flush();
        self.store
    }

    /// Loaded state is written back at once, like the first save after launch.
    fn after_load(&mut self) {
        self.mark(|p| *p = PendingWrites::all());
        self.run_reset_check();
        self.refresh_profile();
        self.flush();
    }

    fn run_reset_check(&mut self) -> bool {
        let today = self.clock.today();
        if !self.tracker.check_reset(today) {
            return false;
        }
        info!("event=daily_reset module=service status=ok date={today}");
        self.mark(|p| {
            p.completed = true;
            p.last_reset_date = true;
        });
        true
    }

    fn refresh_profile(&mut self) {
        let today = self.clock.today();
        self.aggregator.recompute(&mut self.profile, &self.tracker, today);
        self.mark(|p| p.profile = true);
        self.aggregator
            .push(&self.profile, self.auth_token.as_deref());
    }

    fn mark(&mut self, apply: impl FnOnce(&mut PendingWrites)) {
        apply(&mut self.pending);
        if self.dirty_since_ms.is_none() {
            self.dirty_since_ms = Some(self.clock.now_ms());
        }
    }

    fn flush_if_due(&mut self) -> FlushReport {
        if self.flush_due() {
            self.flush()
        } else {
            FlushReport::default()
        }
    }

    fn flush_due(&self) -> bool {
        let Some(since) = self.dirty_since_ms else {
            return false;
        };
        let window = i64::try_from(self.options.write_debounce.as_millis()).unwrap_or(i64::MAX);
        self.clock.now_ms().saturating_sub(since) >= window
    }
}

fn load_tracker<S: KeyValueStore + ?Sized>(
    store: &S,
    keys: &CommitmentKeys,
    today: chrono::NaiveDate,
) -> CommitmentTracker {
    let persisted = load_commitment(store, keys);
    CommitmentTracker::from_parts(
        persisted.completed.unwrap_or_default(),
        persisted.lifetime_cp.unwrap_or_default(),
        persisted.last_reset_date.unwrap_or(today),
        persisted.start_date.unwrap_or(today),
    )
}

fn clear_user_state<S: KeyValueStore + ?Sized>(
    store: &mut S,
    keys: &CommitmentKeys,
) -> StoreResult<()> {
    clear_commitment(store, keys)?;
    clear_profile(store)
}
