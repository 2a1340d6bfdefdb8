//! Off-thread delivery for a blocking `ProfileSync` adapter.
//!
//! # Invariants
//! - `push` only enqueues; it never waits on the wrapped adapter.
//! - The worker sends the newest queued payload and drops older ones.
//! - Dropping the handle closes the queue; an in-flight push is not awaited.

use crate::model::profile::CpSyncPayload;
use crate::sync::{ProfileSync, SyncError};
use log::{debug, warn};
use std::sync::mpsc;
use std::thread;

struct PushRequest {
    token: String,
    payload: CpSyncPayload,
}

pub struct BackgroundProfileSync {
    sender: mpsc::Sender<PushRequest>,
}

impl BackgroundProfileSync {
    /// Starts the delivery worker for `inner`.
    pub fn spawn<P: ProfileSync + 'static>(inner: P) -> Result<Self, SyncError> {
        let (sender, receiver) = mpsc::channel::<PushRequest>();
        thread::Builder::new()
            .name("profile-sync".to_string())
            .spawn(move || push_loop(inner, receiver))
            .map_err(|err| SyncError::Transport(format!("cannot start sync worker: {err}")))?;
        Ok(Self { sender })
    }
}

impl ProfileSync for BackgroundProfileSync {
    /// `Ok` means the payload was queued, not delivered.
    fn push(&self, token: &str, payload: &CpSyncPayload) -> Result<(), SyncError> {
        self.sender
            .send(PushRequest {
                token: token.to_string(),
                payload: *payload,
            })
            .map_err(|_| SyncError::Transport("sync worker stopped".to_string()))
    }
}

fn push_loop<P: ProfileSync>(inner: P, receiver: mpsc::Receiver<PushRequest>) {
    while let Ok(mut request) = receiver.recv() {
        let mut skipped = 0_usize;
        while let Ok(newer) = receiver.try_recv() {
            request = newer;
            skipped += 1;
        }
        match inner.push(&request.token, &request.payload) {
            Ok(()) => debug!("event=profile_sync_worker module=sync status=ok superseded={skipped}"),
            Err(err) => warn!("event=profile_sync_worker module=sync status=error error={err}"),
        }
    }
    debug!("event=profile_sync_worker module=sync status=stopped");
}
