//! Local smoke tool for the CP tracker.
//!
//! # Responsibility
//! - Drive a `CommitmentSession` against a local SQLite key-value store.
//! - Print one JSON document per command so output stays scriptable.
//!
//! # Invariants
//! - Every command closes the session, so pending writes always land on disk.
//! - Writes are never debounced here; each change is persisted immediately.

use clap::{Args, Parser, Subcommand};
use mybestlife_core::{
    core_version, init_stderr_logging, ping, Category, Clock, CommitmentSession, ProfileAggregator,
    SessionOptions, SqliteKeyValueStore, SystemClock, TaskId, UserProfile,
};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

const DEFAULT_DB_PATH: &str = "mybestlife_local.sqlite3";

#[derive(Parser, Debug)]
#[command(name = "mybestlife", version, about = "Track commitment points from the terminal")]
struct Cli {
    /// Local database file.
    #[arg(long, global = true, default_value = DEFAULT_DB_PATH)]
    db: PathBuf,

    /// Act as this user instead of the stored (or guest) profile.
    #[arg(long, global = true)]
    user: Option<String>,

    /// Log to stderr at this level (trace, debug, info, warn, error).
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check that the core library is linked.
    Ping,
    /// Show today's and lifetime CP for the active profile.
    Status,
    /// Mark a task as done today.
    Complete(TaskArgs),
    /// Undo a completion from today.
    Uncomplete(TaskArgs),
    /// Run the daily reset sweep now.
    ResetCheck,
}

#[derive(Args, Debug)]
struct TaskArgs {
    /// One of mind, body or soul.
    #[arg(value_parser = parse_category)]
    category: Category,

    /// Task id within the category.
    task_id: TaskId,
}

fn parse_category(raw: &str) -> Result<Category, String> {
    Category::parse(raw).ok_or_else(|| format!("unknown category `{raw}` (expected mind, body or soul)"))
}

type Session = CommitmentSession<SqliteKeyValueStore, SystemClock>;

fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Some(level) = cli.log_level.as_deref() {
        if let Err(err) = init_stderr_logging(level) {
            eprintln!("error: {err}");
            return ExitCode::FAILURE;
        }
    }

    match run(&cli) {
        Ok(output) => {
            println!("{output}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<Value, String> {
    if matches!(cli.command, Command::Ping) {
        return Ok(ping_output());
    }

    let store = SqliteKeyValueStore::open(&cli.db)
        .map_err(|err| format!("cannot open {}: {err}", cli.db.display()))?;
    let mut session = open_session(store, cli.user.as_deref());

    let output = match &cli.command {
        Command::Ping => ping_output(),
        Command::Status => status(&session),
        Command::Complete(task) => {
            let changed = session.complete(task.category, task.task_id);
            with_changed(status(&session), changed)
        }
        Command::Uncomplete(task) => {
            let changed = session.uncomplete(task.category, task.task_id);
            with_changed(status(&session), changed)
        }
        Command::ResetCheck => {
            let outcome = session.tick();
            json!({
                "reset": outcome.reset,
                "written": outcome.flush.written,
                "failed": outcome.flush.failed,
                "nextCheckInSecs": outcome.next_check_in.as_secs(),
            })
        }
    };

    session.close();
    Ok(output)
}

fn ping_output() -> Value {
    json!({ "ping": ping(), "version": core_version() })
}

fn open_session(store: SqliteKeyValueStore, user: Option<&str>) -> Session {
    let options = SessionOptions {
        write_debounce: Duration::ZERO,
        ..SessionOptions::default()
    };
    let mut session = CommitmentSession::open(store, SystemClock, ProfileAggregator::default(), options);

    let requested = user.map(str::trim).filter(|id| !id.is_empty());
    if let Some(id) = requested {
        if session.profile().storage_user_id() != Some(id) {
            let today = session.clock().today();
            session.sign_in(UserProfile::account_stub(id, today), None);
        }
    }
    session
}

fn status(session: &Session) -> Value {
    let profile = session.profile();
    json!({
        "profileId": profile.id,
        "guest": profile.is_guest(),
        "daysActive": profile.days_active,
        "commitment": session.snapshot(),
    })
}

fn with_changed(mut output: Value, changed: bool) -> Value {
    if let Value::Object(map) = &mut output {
        map.insert("changed".to_string(), Value::Bool(changed));
    }
    output
}
