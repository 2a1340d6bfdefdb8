use chrono::NaiveDate;
use mybestlife_core::model::profile::CpSyncPayload;
use mybestlife_core::store::{CommitmentKeys, StoreResult, PROFILE_KEY};
use mybestlife_core::sync::{BackgroundProfileSync, ProfileSync, SyncError};
use mybestlife_core::{
    Category, CommitmentSession, FixedClock, KeyValueStore, MemoryKeyValueStore,
    ProfileAggregator, ResetSchedule, SessionOptions, StoreError, UserProfile,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

fn date(value: &str) -> NaiveDate {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").unwrap()
}

fn immediate() -> SessionOptions {
    SessionOptions {
        schedule: ResetSchedule::default(),
        write_debounce: Duration::ZERO,
    }
}

fn open(
    store: MemoryKeyValueStore,
    clock: Arc<FixedClock>,
    options: SessionOptions,
) -> CommitmentSession<MemoryKeyValueStore, Arc<FixedClock>> {
    CommitmentSession::open(store, clock, ProfileAggregator::default(), options)
}

#[derive(Clone, Default)]
struct RecordingSync {
    pushed: Arc<Mutex<Vec<(String, CpSyncPayload)>>>,
}

impl ProfileSync for RecordingSync {
    fn push(&self, token: &str, payload: &CpSyncPayload) -> Result<(), SyncError> {
        self.pushed
            .lock()
            .unwrap()
            .push((token.to_string(), *payload));
        Ok(())
    }
}

struct FlakyStore {
    inner: MemoryKeyValueStore,
    failing: Arc<AtomicBool>,
}

impl KeyValueStore for FlakyStore {
    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        self.inner.get(key)
    }

    fn set(&mut self, key: &str, value: &str) -> StoreResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("disk full".to_string()));
        }
        self.inner.set(key, value)
    }

    fn remove(&mut self, key: &str) -> StoreResult<()> {
        self.inner.remove(key)
    }
}

fn signed_in_profile(id: &str, today: NaiveDate) -> UserProfile {
    let mut profile = UserProfile::guest(today);
    profile.id = id.to_string();
    profile.name = "Ada".to_string();
    profile.username = "ada".to_string();
    profile.email = "ada@example.com".to_string();
    profile
}

#[test]
fn open_persists_initial_state_for_guest() {
    let clock = Arc::new(FixedClock::on_date(date("2024-01-01")));
    let store = open(MemoryKeyValueStore::new(), clock, immediate()).close();

    let keys = CommitmentKeys::for_user(None);
    for key in keys.all() {
        assert!(store.get(key).unwrap().is_some(), "missing {key}");
    }
    assert!(store.get(PROFILE_KEY).unwrap().is_some());
    assert_eq!(
        store.get(&keys.last_reset_date).unwrap().as_deref(),
        Some("2024-01-01")
    );
}

#[test]
fn completed_tasks_survive_reopen_on_same_day() {
    let clock = Arc::new(FixedClock::on_date(date("2024-01-01")));
    let mut session = open(MemoryKeyValueStore::new(), Arc::clone(&clock), immediate());
    assert!(session.complete(Category::Mind, 1));
    assert!(session.complete(Category::Body, 4));
    let store = session.close();

    let session = open(store, clock, immediate());
    assert_eq!(session.daily_cp(Category::Mind), 1);
    assert_eq!(session.daily_cp(Category::Body), 1);
    assert_eq!(session.lifetime_cp(Category::Mind), 1);
    assert_eq!(session.profile().daily_cp, 2);
    assert_eq!(session.profile().lifetime_cp, 2);
}

#[test]
fn reopening_on_a_later_day_resets_daily_cp() {
    let clock = Arc::new(FixedClock::on_date(date("2024-01-01")));
    let mut session = open(MemoryKeyValueStore::new(), Arc::clone(&clock), immediate());
    session.complete(Category::Soul, 3);
    let store = session.close();

    clock.set_date(date("2024-01-03"));
    let session = open(store, clock, immediate());
    assert_eq!(session.daily_cp(Category::Soul), 0);
    assert_eq!(session.lifetime_cp(Category::Soul), 1);
    assert_eq!(session.tracker().last_reset_date(), date("2024-01-03"));
    assert_eq!(session.profile().days_active, 3);
}

#[test]
fn tick_resets_after_midnight_and_reports_next_check() {
    let clock = Arc::new(FixedClock::on_date(date("2024-01-01")));
    let mut session = open(MemoryKeyValueStore::new(), Arc::clone(&clock), immediate());
    session.complete(Category::Mind, 1);

    let same_day = session.tick();
    assert!(!same_day.reset);
    assert_eq!(same_day.next_check_in, Duration::from_secs(60));

    clock.set_date(date("2024-01-02"));
    let next_day = session.tick();
    assert!(next_day.reset);
    assert_eq!(session.daily_cp(Category::Mind), 0);
    assert_eq!(session.lifetime_cp(Category::Mind), 1);
    assert_eq!(session.profile().daily_cp, 0);
    assert!(next_day.flush.written > 0);
}

#[test]
fn writes_wait_for_debounce_window() {
    let clock = Arc::new(FixedClock::on_date(date("2024-01-01")));
    let options = SessionOptions {
        schedule: ResetSchedule::default(),
        write_debounce: Duration::from_millis(100),
    };
    let mut session = open(MemoryKeyValueStore::new(), Arc::clone(&clock), options);
    let keys = session.keys().clone();

    session.complete(Category::Body, 2);
    assert!(session.has_pending_writes());
    assert_eq!(
        session.store().get(&keys.completed).unwrap().as_deref(),
        Some(r#"{"mind":[],"body":[],"soul":[]}"#)
    );

    clock.advance_millis(50);
    session.complete(Category::Body, 3);
    assert!(session.has_pending_writes());

    clock.advance_millis(50);
    let outcome = session.tick();
    assert!(!session.has_pending_writes());
    assert!(outcome.flush.written >= 2);
    assert_eq!(
        session.store().get(&keys.completed).unwrap().as_deref(),
        Some(r#"{"mind":[],"body":[2,3],"soul":[]}"#)
    );
}

#[test]
fn duplicate_completion_is_ignored() {
    let clock = Arc::new(FixedClock::on_date(date("2024-01-01")));
    let mut session = open(MemoryKeyValueStore::new(), clock, immediate());

    assert!(session.complete(Category::Mind, 1));
    assert!(!session.complete(Category::Mind, 1));
    assert!(!session.uncomplete(Category::Mind, 9));
    assert_eq!(session.lifetime_cp(Category::Mind), 1);
}

#[test]
fn store_failures_keep_in_memory_state() {
    let failing = Arc::new(AtomicBool::new(false));
    let store = FlakyStore {
        inner: MemoryKeyValueStore::new(),
        failing: Arc::clone(&failing),
    };
    let clock = FixedClock::on_date(date("2024-01-01"));
    let mut session =
        CommitmentSession::open(store, clock, ProfileAggregator::default(), immediate());

    failing.store(true, Ordering::SeqCst);
    assert!(session.complete(Category::Mind, 7));
    assert_eq!(session.daily_cp(Category::Mind), 1);
    assert_eq!(session.lifetime_cp(Category::Mind), 1);
    assert!(!session.has_pending_writes());

    let keys = session.keys().clone();
    let store = session.close();
    assert_eq!(
        store.get(&keys.completed).unwrap().as_deref(),
        Some(r#"{"mind":[],"body":[],"soul":[]}"#)
    );
}

#[test]
fn signed_in_sessions_use_per_user_keys_and_push_aggregates() {
    let sync = RecordingSync::default();
    let clock = Arc::new(FixedClock::on_date(date("2024-01-01")));
    let mut session = CommitmentSession::open(
        MemoryKeyValueStore::new(),
        Arc::clone(&clock),
        ProfileAggregator::new(Box::new(sync.clone())),
        immediate(),
    );
    session.complete(Category::Mind, 1);
    assert!(sync.pushed.lock().unwrap().is_empty());

    session.sign_in(signed_in_profile("user-7", date("2024-01-01")), Some("token-abc".to_string()));
    assert!(session.is_authenticated());
    assert_eq!(session.keys(), &CommitmentKeys::for_user(Some("user-7")));
    assert_eq!(session.daily_cp(Category::Mind), 0);

    session.complete(Category::Body, 5);
    let pushed = sync.pushed.lock().unwrap().clone();
    let (token, last) = pushed.last().unwrap();
    assert_eq!(token, "token-abc");
    assert_eq!(last.daily_cp, 1);
    assert_eq!(last.cp_by_category.body, 1);

    let anonymous = CommitmentKeys::for_user(None);
    assert!(session.store().get(&anonymous.completed).unwrap().is_some());
}

struct SlowSync {
    delay: Duration,
    delivered: RecordingSync,
}

impl ProfileSync for SlowSync {
    fn push(&self, token: &str, payload: &CpSyncPayload) -> Result<(), SyncError> {
        std::thread::sleep(self.delay);
        self.delivered.push(token, payload)
    }
}

#[test]
fn slow_backend_does_not_delay_user_actions() {
    let delivered = RecordingSync::default();
    let sync = BackgroundProfileSync::spawn(SlowSync {
        delay: Duration::from_millis(1_500),
        delivered: delivered.clone(),
    })
    .unwrap();
    let clock = Arc::new(FixedClock::on_date(date("2024-01-01")));
    let mut session = CommitmentSession::open(
        MemoryKeyValueStore::new(),
        clock,
        ProfileAggregator::new(Box::new(sync)),
        immediate(),
    );
    session.sign_in(signed_in_profile("user-8", date("2024-01-01")), Some("token".to_string()));

    let started = Instant::now();
    assert!(session.complete(Category::Mind, 1));
    assert!(session.complete(Category::Body, 2));
    assert!(session.uncomplete(Category::Mind, 1));
    assert!(started.elapsed() < Duration::from_millis(200));
    assert_eq!(session.daily_cp(Category::Body), 1);

    let deadline = Instant::now() + Duration::from_secs(10);
    loop {
        let last = delivered.pushed.lock().unwrap().last().map(|(_, p)| p.daily_cp);
        if last == Some(1) && delivered.pushed.lock().unwrap().len() >= 2 {
            break;
        }
        assert!(Instant::now() < deadline, "latest payload never delivered");
        std::thread::sleep(Duration::from_millis(20));
    }
}

#[test]
fn logout_clears_user_state_and_returns_to_guest() {
    let clock = Arc::new(FixedClock::on_date(date("2024-01-01")));
    let mut session = open(MemoryKeyValueStore::new(), clock, immediate());
    session.sign_in(signed_in_profile("user-9", date("2024-01-01")), Some("token".to_string()));
    session.complete(Category::Soul, 1);
    let user_keys = session.keys().clone();

    session.logout();

    assert!(session.profile().is_guest());
    assert!(!session.is_authenticated());
    for key in user_keys.all() {
        assert!(session.store().get(key).unwrap().is_none(), "{key} kept");
    }
    assert_eq!(session.keys(), &CommitmentKeys::for_user(None));
}

#[test]
fn stored_profile_is_restored_on_open() {
    let clock = Arc::new(FixedClock::on_date(date("2024-01-01")));
    let mut session = open(MemoryKeyValueStore::new(), Arc::clone(&clock), immediate());
    session.sign_in(signed_in_profile("user-3", date("2024-01-01")), Some("token".to_string()));
    session.complete(Category::Mind, 2);
    let store = session.close();

    let mut session = open(store, clock, immediate());
    assert_eq!(session.profile().id, "user-3");
    assert!(session.profile().is_logged_in);
    assert!(!session.is_authenticated());
    assert_eq!(session.daily_cp(Category::Mind), 1);

    session.set_auth_token(Some("restored".to_string()));
    assert!(session.is_authenticated());
}
