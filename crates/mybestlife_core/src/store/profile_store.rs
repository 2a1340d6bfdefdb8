//! Profile persistence under the `user_data` key.
//!
//! # Invariants
//! - A stored profile without an id is treated as absent.

use crate::model::profile::UserProfile;
use crate::store::{KeyValueStore, StoreResult};
use log::warn;

/// Storage key for the serialized `UserProfile`.
pub const PROFILE_KEY: &str = "user_data";

/// Loads the stored profile, or `None` when absent or invalid.
pub fn load_profile<S: KeyValueStore + ?Sized>(store: &S) -> Option<UserProfile> {
    let raw = match store.get(PROFILE_KEY) {
        Ok(Some(raw)) => raw,
        Ok(None) => return None,
        Err(err) => {
            warn!("event=profile_load module=store status=error error={err}");
            return None;
        }
    };

    match serde_json::from_str::<UserProfile>(&raw) {
        Ok(profile) if !profile.id.trim().is_empty() => Some(profile),
        Ok(_) => {
            warn!("event=profile_load module=store status=error error_code=missing_id");
            None
        }
        Err(err) => {
            warn!("event=profile_load module=store status=error error_code=corrupt_json error={err}");
            None
        }
    }
}

pub fn save_profile<S: KeyValueStore + ?Sized>(
    store: &mut S,
    profile: &UserProfile,
) -> StoreResult<()> {
    let encoded = serde_json::to_string(profile)?;
    store.set(PROFILE_KEY, &encoded)
}

pub fn clear_profile<S: KeyValueStore + ?Sized>(store: &mut S) -> StoreResult<()> {
    store.remove(PROFILE_KEY)
}
