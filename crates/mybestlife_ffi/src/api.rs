//! FFI use-case API for Flutter-facing calls.
//!
//! # Responsibility
//! - Expose the device CP session to Dart via FRB.
//! - Keep error semantics simple: every call returns an envelope.
//!
//! # Invariants
//! - Exported functions must not panic across FFI boundary.
//! - One process-wide session; calls are serialized by its mutex.
//! - Session calls before `commitment_open` return `ok = false`.

use log::info;
use mybestlife_core::clock::format_iso_date;
use mybestlife_core::sync::{BackgroundProfileSync, HttpProfileSync, NoopProfileSync, ProfileSync};
use mybestlife_core::{
    core_version as core_version_inner, init_logging as init_logging_inner, ping as ping_inner,
    Category, Clock, CommitmentSession, CommitmentSnapshot, ProfileAggregator, ResetSchedule,
    SessionOptions, SqliteKeyValueStore, SystemClock, UserProfile,
};
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, OnceLock, PoisonError};

type DeviceSession = CommitmentSession<SqliteKeyValueStore, SystemClock>;

const LOCAL_DB_FILE_NAME: &str = "mybestlife_local.sqlite3";
static LOCAL_DB_PATH: OnceLock<PathBuf> = OnceLock::new();
static SESSION: Mutex<Option<DeviceSession>> = Mutex::new(None);

/// Minimal health-check API for FRB smoke integration.
///
/// # FFI contract
/// - Sync call, non-blocking.
/// - Never throws; always returns a UTF-8 string.
#[flutter_rust_bridge::frb(sync)]
pub fn ping() -> String {
    ping_inner().to_owned()
}

/// Expose core crate version through FFI.
#[flutter_rust_bridge::frb(sync)]
pub fn core_version() -> String {
    core_version_inner().to_owned()
}

/// Initializes Rust core logging once per process.
///
/// Input semantics:
/// - `level`: one of `trace|debug|info|warn|error` (case-insensitive).
/// - `log_dir`: absolute directory path where rolling logs are written.
///
/// # FFI contract
/// - Safe to call repeatedly with the same `level + log_dir` (idempotent).
/// - Returns empty string on success and error message on failure.
#[flutter_rust_bridge::frb(sync)]
pub fn init_logging(level: String, log_dir: String) -> String {
    match init_logging_inner(level.as_str(), log_dir.as_str()) {
        Ok(()) => String::new(),
        Err(err) => err,
    }
}

/// Per-category CP view returned to the UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitmentSummary {
    pub completed_mind: Vec<i64>,
    pub completed_body: Vec<i64>,
    pub completed_soul: Vec<i64>,
    pub daily_mind: u64,
    pub daily_body: u64,
    pub daily_soul: u64,
    pub lifetime_mind: u64,
    pub lifetime_body: u64,
    pub lifetime_soul: u64,
    pub total_daily_cp: u64,
    pub total_lifetime_cp: u64,
    /// `YYYY-MM-DD`.
    pub last_reset_date: String,
    /// `YYYY-MM-DD`.
    pub start_date: String,
}

/// Generic envelope for session calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitmentResponse {
    pub ok: bool,
    /// Whether the call changed tracker state.
    pub changed: bool,
    pub message: String,
    pub summary: Option<CommitmentSummary>,
}

impl CommitmentResponse {
    fn success(message: impl Into<String>, changed: bool, summary: CommitmentSummary) -> Self {
        Self {
            ok: true,
            changed,
            message: message.into(),
            summary: Some(summary),
        }
    }

    fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            changed: false,
            message: message.into(),
            summary: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickResponse {
    pub ok: bool,
    pub reset: bool,
    /// Delay the host timer should wait before the next tick.
    pub next_check_in_ms: u64,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlushResponse {
    pub ok: bool,
    pub written: u32,
    pub failed: u32,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileResponse {
    pub ok: bool,
    pub message: String,
    /// Profile JSON in the client's `user_data` shape.
    pub profile_json: Option<String>,
}

/// Opens (or reopens) the device session from the local store.
///
/// Input semantics:
/// - `user_id`: signed-in account id; `None` keeps the stored profile.
///   A new id switches storage namespaces even without a token.
/// - `auth_token`: bearer token used for best-effort CP sync.
/// - `api_base_url`: backend root; `None` disables remote sync.
/// - `schedule`: `polling`, `polling:<secs>` or `midnight`; default polling.
///
/// # FFI contract
/// - Sync call, DB-backed execution.
/// - Never panics; replaces any previously open session.
#[flutter_rust_bridge::frb(sync)]
pub fn commitment_open(
    user_id: Option<String>,
    auth_token: Option<String>,
    api_base_url: Option<String>,
    schedule: Option<String>,
) -> CommitmentResponse {
    let store = match SqliteKeyValueStore::open(resolve_local_db_path()) {
        Ok(store) => store,
        Err(err) => return CommitmentResponse::failure(format!("commitment_open failed: {err}")),
    };
    open_with_store(store, user_id, auth_token, api_base_url, schedule)
}

/// Marks a task done for today.
#[flutter_rust_bridge::frb(sync)]
pub fn commitment_complete(category: String, task_id: i64) -> CommitmentResponse {
    with_task(&category, "commitment_complete", |session, category| {
        if session.complete(category, task_id) {
            ("Task completed.", true)
        } else {
            ("Task already completed.", false)
        }
    })
}

/// Clears a task's done mark; lifetime CP is unchanged.
#[flutter_rust_bridge::frb(sync)]
pub fn commitment_uncomplete(category: String, task_id: i64) -> CommitmentResponse {
    with_task(&category, "commitment_uncomplete", |session, category| {
        if session.uncomplete(category, task_id) {
            ("Task uncompleted.", true)
        } else {
            ("Task was not completed.", false)
        }
    })
}

#[flutter_rust_bridge::frb(sync)]
pub fn commitment_summary() -> CommitmentResponse {
    match with_session(|session| summarize(&session.snapshot())) {
        Ok(summary) => CommitmentResponse::success("OK", false, summary),
        Err(message) => CommitmentResponse::failure(format!("commitment_summary failed: {message}")),
    }
}

/// Timer entry point: runs the reset check and due writes.
#[flutter_rust_bridge::frb(sync)]
pub fn commitment_tick() -> TickResponse {
    match with_session(|session| session.tick()) {
        Ok(outcome) => TickResponse {
            ok: true,
            reset: outcome.reset,
            next_check_in_ms: u64::try_from(outcome.next_check_in.as_millis()).unwrap_or(u64::MAX),
            message: if outcome.reset {
                "Daily reset applied.".to_string()
            } else {
                "No reset needed.".to_string()
            },
        },
        Err(message) => TickResponse {
            ok: false,
            reset: false,
            next_check_in_ms: 0,
            message: format!("commitment_tick failed: {message}"),
        },
    }
}

/// Writes pending state now; call when the app goes to background.
#[flutter_rust_bridge::frb(sync)]
pub fn commitment_flush() -> FlushResponse {
    match with_session(|session| session.flush()) {
        Ok(report) => FlushResponse {
            ok: report.failed == 0,
            written: u32::try_from(report.written).unwrap_or(u32::MAX),
            failed: u32::try_from(report.failed).unwrap_or(u32::MAX),
            message: format!("Wrote {} key(s).", report.written),
        },
        Err(message) => FlushResponse {
            ok: false,
            written: 0,
            failed: 0,
            message: format!("commitment_flush failed: {message}"),
        },
    }
}

#[flutter_rust_bridge::frb(sync)]
pub fn profile_current() -> ProfileResponse {
    let result = with_session(|session| serde_json::to_string(session.profile()));
    match result {
        Ok(Ok(json)) => ProfileResponse {
            ok: true,
            message: "OK".to_string(),
            profile_json: Some(json),
        },
        Ok(Err(err)) => ProfileResponse {
            ok: false,
            message: format!("profile_current failed: {err}"),
            profile_json: None,
        },
        Err(message) => ProfileResponse {
            ok: false,
            message: format!("profile_current failed: {message}"),
            profile_json: None,
        },
    }
}

/// Switches the session to a signed-in profile (client `user_data` JSON).
#[flutter_rust_bridge::frb(sync)]
pub fn profile_sign_in(profile_json: String, auth_token: String) -> CommitmentResponse {
    let profile: UserProfile = match serde_json::from_str(&profile_json) {
        Ok(profile) => profile,
        Err(err) => return CommitmentResponse::failure(format!("profile_sign_in failed: {err}")),
    };
    match with_session(|session| {
        session.sign_in(profile, Some(auth_token));
        summarize(&session.snapshot())
    }) {
        Ok(summary) => CommitmentResponse::success("Signed in.", true, summary),
        Err(message) => CommitmentResponse::failure(format!("profile_sign_in failed: {message}")),
    }
}

/// Clears the signed-in user's local state and returns to the guest profile.
#[flutter_rust_bridge::frb(sync)]
pub fn profile_logout() -> CommitmentResponse {
    match with_session(|session| {
        session.logout();
        summarize(&session.snapshot())
    }) {
        Ok(summary) => CommitmentResponse::success("Logged out.", true, summary),
        Err(message) => CommitmentResponse::failure(format!("profile_logout failed: {message}")),
    }
}

fn open_with_store(
    store: SqliteKeyValueStore,
    user_id: Option<String>,
    auth_token: Option<String>,
    api_base_url: Option<String>,
    schedule: Option<String>,
) -> CommitmentResponse {
    let schedule = match schedule.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        None => ResetSchedule::default(),
        Some(raw) => match ResetSchedule::parse(raw) {
            Some(schedule) => schedule,
            None => {
                return CommitmentResponse::failure(format!(
                    "commitment_open failed: unknown schedule `{raw}`"
                ))
            }
        },
    };
    let sync: Box<dyn ProfileSync> = match api_base_url.as_deref().map(str::trim) {
        Some(base) if !base.is_empty() => {
            match BackgroundProfileSync::spawn(HttpProfileSync::new(base)) {
                Ok(sync) => Box::new(sync),
                Err(err) => {
                    return CommitmentResponse::failure(format!("commitment_open failed: {err}"))
                }
            }
        }
        _ => Box::new(NoopProfileSync),
    };
    let options = SessionOptions {
        schedule,
        ..SessionOptions::default()
    };

    let mut session =
        CommitmentSession::open(store, SystemClock, ProfileAggregator::new(sync), options);
    let requested = user_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty());
    match requested {
        Some(id) if session.profile().storage_user_id() != Some(id) => {
            let today = session.clock().today();
            session.sign_in(UserProfile::account_stub(id, today), auth_token);
        }
        _ => session.set_auth_token(auth_token),
    }

    let summary = summarize(&session.snapshot());
    let mut slot = lock_session();
    if let Some(previous) = slot.take() {
        previous.close();
    }
    *slot = Some(session);
    info!("event=ffi_session_open module=ffi status=ok");
    CommitmentResponse::success("Session opened.", false, summary)
}

fn with_task(
    category: &str,
    op: &str,
    f: impl FnOnce(&mut DeviceSession, Category) -> (&'static str, bool),
) -> CommitmentResponse {
    let Some(category) = Category::parse(category) else {
        return CommitmentResponse::failure(format!("{op} failed: unknown category `{category}`"));
    };
    match with_session(|session| {
        let (message, changed) = f(session, category);
        (message, changed, summarize(&session.snapshot()))
    }) {
        Ok((message, changed, summary)) => CommitmentResponse::success(message, changed, summary),
        Err(message) => CommitmentResponse::failure(format!("{op} failed: {message}")),
    }
}

fn with_session<T>(f: impl FnOnce(&mut DeviceSession) -> T) -> Result<T, String> {
    let mut slot = lock_session();
    match slot.as_mut() {
        Some(session) => Ok(f(session)),
        None => Err("session not open".to_string()),
    }
}

fn lock_session() -> MutexGuard<'static, Option<DeviceSession>> {
    SESSION.lock().unwrap_or_else(PoisonError::into_inner)
}

fn summarize(snapshot: &CommitmentSnapshot) -> CommitmentSummary {
    let ids = |category: Category| snapshot.completed.get(category).iter().copied().collect();
    CommitmentSummary {
        completed_mind: ids(Category::Mind),
        completed_body: ids(Category::Body),
        completed_soul: ids(Category::Soul),
        daily_mind: snapshot.daily_cp.mind,
        daily_body: snapshot.daily_cp.body,
        daily_soul: snapshot.daily_cp.soul,
        lifetime_mind: snapshot.lifetime_cp.mind,
        lifetime_body: snapshot.lifetime_cp.body,
        lifetime_soul: snapshot.lifetime_cp.soul,
        total_daily_cp: snapshot.total_daily_cp,
        total_lifetime_cp: snapshot.total_lifetime_cp,
        last_reset_date: format_iso_date(snapshot.last_reset_date),
        start_date: format_iso_date(snapshot.start_date),
    }
}

fn resolve_local_db_path() -> PathBuf {
    LOCAL_DB_PATH
        .get_or_init(|| {
            if let Ok(raw) = std::env::var("MYBESTLIFE_DB_PATH") {
                let trimmed = raw.trim();
                if !trimmed.is_empty() {
                    return PathBuf::from(trimmed);
                }
            }
            std::env::temp_dir().join(LOCAL_DB_FILE_NAME)
        })
        .clone()
}

#[cfg(test)]
mod tests {
    use super::{
        commitment_complete, commitment_flush, commitment_summary, commitment_tick,
        commitment_uncomplete, core_version, init_logging, open_with_store, ping,
        profile_current, profile_logout, profile_sign_in, SESSION,
    };
    use mybestlife_core::{KeyValueStore, SqliteKeyValueStore};
    use std::sync::Mutex;

    static TEST_LOCK: Mutex<()> = Mutex::new(());

    fn open_fresh() {
        let store = SqliteKeyValueStore::in_memory().expect("in-memory store");
        let response = open_with_store(store, None, None, None, None);
        assert!(response.ok, "{}", response.message);
    }

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }

    #[test]
    fn init_logging_rejects_empty_log_dir() {
        let error = init_logging("info".to_string(), String::new());
        assert!(!error.is_empty());
    }

    #[test]
    fn init_logging_rejects_unsupported_level() {
        let error = init_logging("verbose".to_string(), "tmp/logs".to_string());
        assert!(!error.is_empty());
    }

    #[test]
    fn session_calls_fail_before_open() {
        let _guard = TEST_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        *SESSION.lock().unwrap_or_else(|e| e.into_inner()) = None;

        assert!(!commitment_summary().ok);
        assert!(!commitment_tick().ok);
        assert!(!commitment_flush().ok);
        assert!(profile_current().profile_json.is_none());
    }

    #[test]
    fn complete_and_uncomplete_update_summary() {
        let _guard = TEST_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        open_fresh();

        let done = commitment_complete("mind".to_string(), 1);
        assert!(done.ok && done.changed, "{}", done.message);
        let again = commitment_complete("Mind".to_string(), 1);
        assert!(again.ok && !again.changed);
        commitment_complete("body".to_string(), 4);

        let undone = commitment_uncomplete("mind".to_string(), 1);
        let summary = undone.summary.expect("summary");
        assert_eq!(summary.daily_mind, 0);
        assert_eq!(summary.lifetime_mind, 1);
        assert_eq!(summary.completed_body, vec![4]);
        assert_eq!(summary.total_daily_cp, 1);

        let flushed = commitment_flush();
        assert!(flushed.ok, "{}", flushed.message);
    }

    #[test]
    fn unknown_category_is_rejected() {
        let _guard = TEST_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        open_fresh();

        let response = commitment_complete("spirit".to_string(), 1);
        assert!(!response.ok);
        assert!(response.message.contains("spirit"));
    }

    #[test]
    fn tick_reports_polling_interval() {
        let _guard = TEST_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        open_fresh();

        let tick = commitment_tick();
        assert!(tick.ok);
        assert!(!tick.reset);
        assert_eq!(tick.next_check_in_ms, 60_000);
    }

    #[test]
    fn sign_in_and_logout_switch_profiles() {
        let _guard = TEST_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        open_fresh();

        let guest: serde_json::Value =
            serde_json::from_str(&profile_current().profile_json.expect("profile")).expect("json");
        assert_eq!(guest["id"], "1");

        let mut user = guest.clone();
        user["id"] = serde_json::json!("user-42");
        user["name"] = serde_json::json!("Ada");
        let signed_in = profile_sign_in(user.to_string(), "token".to_string());
        assert!(signed_in.ok, "{}", signed_in.message);
        commitment_complete("soul".to_string(), 3);

        let current: serde_json::Value =
            serde_json::from_str(&profile_current().profile_json.expect("profile")).expect("json");
        assert_eq!(current["id"], "user-42");
        assert_eq!(current["isLoggedIn"], true);
        assert_eq!(current["dailyCP"], 1);

        let logged_out = profile_logout();
        assert!(logged_out.ok);
        assert_eq!(logged_out.summary.expect("summary").daily_soul, 0);
    }

    #[test]
    fn open_with_user_id_and_no_token_uses_account_namespace() {
        let _guard = TEST_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let store = SqliteKeyValueStore::in_memory().expect("in-memory store");
        let response = open_with_store(store, Some("u42".to_string()), None, None, None);
        assert!(response.ok, "{}", response.message);
        commitment_complete("mind".to_string(), 1);

        let current: serde_json::Value =
            serde_json::from_str(&profile_current().profile_json.expect("profile")).expect("json");
        assert_eq!(current["id"], "u42");
        assert_eq!(current["isLoggedIn"], true);
        assert_eq!(current["dailyCP"], 1);
        assert_ne!(current["name"], "My Best Life");
        assert_ne!(current["email"], "help@mybestlife.com");

        let store = SESSION
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
            .expect("open session")
            .close();
        let stored = store
            .get("commitment_completed_u42")
            .expect("read")
            .expect("user namespace written");
        assert!(stored.contains('1'), "{stored}");
    }

    #[test]
    fn open_rejects_unknown_schedule() {
        let _guard = TEST_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let store = SqliteKeyValueStore::in_memory().expect("in-memory store");
        let response = open_with_store(store, None, None, None, Some("hourly".to_string()));
        assert!(!response.ok);
    }
}
