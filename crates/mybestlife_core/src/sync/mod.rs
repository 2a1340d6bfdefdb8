//! Best-effort remote profile synchronization.
//!
//! # Responsibility
//! - Define the push contract used after every profile recompute.
//! - Provide a no-op adapter and an HTTP adapter for the REST backend.
//! - Move blocking adapters off the caller's thread.
//!
//! # Invariants
//! - Sync failures are reported to the caller, never retried here.
//! - The local profile stays authoritative regardless of sync outcome.

use crate::model::profile::CpSyncPayload;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod background;
pub mod http;

pub use background::BackgroundProfileSync;
pub use http::HttpProfileSync;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// Backend answered with a non-success status.
    Status(u16),
    /// Request never produced a response.
    Transport(String),
}

impl Display for SyncError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Status(code) => write!(f, "backend rejected profile sync with status {code}"),
            Self::Transport(reason) => write!(f, "profile sync transport failure: {reason}"),
        }
    }
}

impl Error for SyncError {}

/// Pushes CP aggregates to a remote store.
pub trait ProfileSync: Send {
    fn push(&self, token: &str, payload: &CpSyncPayload) -> Result<(), SyncError>;
}

impl<T: ProfileSync + ?Sized> ProfileSync for Box<T> {
    fn push(&self, token: &str, payload: &CpSyncPayload) -> Result<(), SyncError> {
        (**self).push(token, payload)
    }
}

/// Adapter for offline sessions.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopProfileSync;

impl ProfileSync for NoopProfileSync {
    fn push(&self, _token: &str, _payload: &CpSyncPayload) -> Result<(), SyncError> {
        Ok(())
    }
}
