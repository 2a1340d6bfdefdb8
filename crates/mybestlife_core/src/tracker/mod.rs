//! In-memory CP tracking and reset scheduling.

pub mod commitment;
pub mod schedule;

pub use commitment::CommitmentTracker;
pub use schedule::{ResetSchedule, DEFAULT_POLL_INTERVAL};
