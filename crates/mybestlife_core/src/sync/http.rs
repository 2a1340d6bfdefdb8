//! `ureq` adapter for `PUT /api/users/commitment-points`.

use crate::model::profile::CpSyncPayload;
use crate::sync::{ProfileSync, SyncError};
use std::time::Duration;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
const COMMITMENT_POINTS_PATH: &str = "/api/users/commitment-points";

pub struct HttpProfileSync {
    agent: ureq::Agent,
    endpoint: String,
}

impl HttpProfileSync {
    /// Creates an adapter for the backend rooted at `base_url`.
    pub fn new(base_url: &str) -> Self {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
        Self {
            agent,
            endpoint: format!(
                "{}{COMMITMENT_POINTS_PATH}",
                base_url.trim().trim_end_matches('/')
            ),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl ProfileSync for HttpProfileSync {
    fn push(&self, token: &str, payload: &CpSyncPayload) -> Result<(), SyncError> {
        let result = self
            .agent
            .put(&self.endpoint)
            .set("Authorization", &format!("Bearer {token}"))
            .send_json(payload);

        match result {
            Ok(_) => Ok(()),
            Err(ureq::Error::Status(code, _)) => Err(SyncError::Status(code)),
            Err(err) => Err(SyncError::Transport(err.to_string())),
        }
    }
}
