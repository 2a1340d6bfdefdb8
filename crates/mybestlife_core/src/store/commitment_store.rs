//! Per-user commitment keys and their typed encoding.
//!
//! # Responsibility
//! - Map a user id to the four commitment storage keys.
//! - Decode stored values, falling back to defaults for missing or corrupt data.
//!
//! # Invariants
//! - Keys without a signed-in user are namespaced as `anonymous`.
//! - Loading never fails; unreadable values are logged and treated as absent.

use crate::clock::{format_iso_date, parse_iso_date};
use crate::model::commitment::{CompletionSet, LifetimeCp};
use crate::store::{KeyValueStore, StoreResult};
use chrono::NaiveDate;
use log::warn;
use serde::de::DeserializeOwned;

const ANONYMOUS_NAMESPACE: &str = "anonymous";

/// Storage keys for one user's commitment state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitmentKeys {
    pub completed: String,
    pub last_reset_date: String,
    pub lifetime_cp: String,
    pub start_date: String,
}

impl CommitmentKeys {
    pub fn for_user(user_id: Option<&str>) -> Self {
        let namespace = user_id
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .unwrap_or(ANONYMOUS_NAMESPACE);
        Self {
            completed: format!("commitment_completed_{namespace}"),
            last_reset_date: format!("commitment_lastResetDate_{namespace}"),
            lifetime_cp: format!("commitment_lifetimeCP_{namespace}"),
            start_date: format!("commitment_startDate_{namespace}"),
        }
    }

    pub fn all(&self) -> [&str; 4] {
        [
            self.completed.as_str(),
            self.last_reset_date.as_str(),
            self.lifetime_cp.as_str(),
            self.start_date.as_str(),
        ]
    }
}

/// Commitment state as read back from storage; `None` means absent or unreadable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersistedCommitment {
    pub completed: Option<CompletionSet>,
    pub lifetime_cp: Option<LifetimeCp>,
    pub last_reset_date: Option<NaiveDate>,
    pub start_date: Option<NaiveDate>,
}

pub fn load_commitment<S: KeyValueStore + ?Sized>(
    store: &S,
    keys: &CommitmentKeys,
) -> PersistedCommitment {
    PersistedCommitment {
        completed: read_json(store, &keys.completed),
        lifetime_cp: read_json(store, &keys.lifetime_cp),
        last_reset_date: read_date(store, &keys.last_reset_date),
        start_date: read_date(store, &keys.start_date),
    }
}

pub fn write_completed<S: KeyValueStore + ?Sized>(
    store: &mut S,
    keys: &CommitmentKeys,
    completed: &CompletionSet,
) -> StoreResult<()> {
    let encoded = serde_json::to_string(completed)?;
    store.set(&keys.completed, &encoded)
}

pub fn write_lifetime_cp<S: KeyValueStore + ?Sized>(
    store: &mut S,
    keys: &CommitmentKeys,
    lifetime_cp: &LifetimeCp,
) -> StoreResult<()> {
    let encoded = serde_json::to_string(lifetime_cp)?;
    store.set(&keys.lifetime_cp, &encoded)
}

pub fn write_last_reset_date<S: KeyValueStore + ?Sized>(
    store: &mut S,
    keys: &CommitmentKeys,
    date: NaiveDate,
) -> StoreResult<()> {
    store.set(&keys.last_reset_date, &format_iso_date(date))
}

pub fn write_start_date<S: KeyValueStore + ?Sized>(
    store: &mut S,
    keys: &CommitmentKeys,
    date: NaiveDate,
) -> StoreResult<()> {
    store.set(&keys.start_date, &format_iso_date(date))
}

/// Removes all four keys; stops at the first failing key.
pub fn clear_commitment<S: KeyValueStore + ?Sized>(
    store: &mut S,
    keys: &CommitmentKeys,
) -> StoreResult<()> {
    for key in keys.all() {
        store.remove(key)?;
    }
    Ok(())
}

fn read_raw<S: KeyValueStore + ?Sized>(store: &S, key: &str) -> Option<String> {
    match store.get(key) {
        Ok(value) => value,
        Err(err) => {
            warn!("event=store_read module=store status=error key={key} error={err}");
            None
        }
    }
}

fn read_json<T: DeserializeOwned, S: KeyValueStore + ?Sized>(store: &S, key: &str) -> Option<T> {
    let raw = read_raw(store, key)?;
    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(err) => {
            warn!(
                "event=store_decode module=store status=error key={key} error_code=corrupt_json error={err}"
            );
            None
        }
    }
}

fn read_date<S: KeyValueStore + ?Sized>(store: &S, key: &str) -> Option<NaiveDate> {
    let raw = read_raw(store, key)?;
    let parsed = parse_iso_date(&raw);
    if parsed.is_none() {
        warn!("event=store_decode module=store status=error key={key} error_code=corrupt_date");
    }
    parsed
}
