//! Commitment tracker state machine.
//!
//! # Responsibility
//! - Hold today's completion sets, lifetime counters and the reset marker.
//! - Apply complete/uncomplete transitions and the daily reset sweep.
//!
//! # Invariants
//! - `daily_cp(c)` always equals the size of today's set for `c`.
//! - Lifetime counters never decrease; uncompleting leaves them untouched.
//! - A reset clears all three sets at once and records the new day.
//! - The tracker performs no I/O; callers persist what changed.

use crate::model::category::Category;
use crate::model::commitment::{
    CommitmentSnapshot, CompletionSet, CpByCategory, LifetimeCp, TaskId,
};
use chrono::NaiveDate;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitmentTracker {
    completed: CompletionSet,
    lifetime_cp: LifetimeCp,
    last_reset_date: NaiveDate,
    start_date: NaiveDate,
}

impl CommitmentTracker {
    /// Fresh tracker for a first launch on `today`.
    pub fn new(today: NaiveDate) -> Self {
        Self::from_parts(CompletionSet::default(), LifetimeCp::default(), today, today)
    }

    /// Rebuilds a tracker from previously persisted parts.
    ///
    /// Call `check_reset` afterwards; stale completions are only cleared there.
    pub fn from_parts(
        completed: CompletionSet,
        lifetime_cp: LifetimeCp,
        last_reset_date: NaiveDate,
        start_date: NaiveDate,
    ) -> Self {
        Self {
            completed,
            lifetime_cp,
            last_reset_date,
            start_date,
        }
    }

    /// Marks a task done today. Returns `true` when state changed.
    pub fn complete_task(&mut self, category: Category, task_id: TaskId) -> bool {
        if !self.completed.insert(category, task_id) {
            return false;
        }
        self.lifetime_cp.increment(category);
        true
    }

    /// Clears a task's done mark. Returns `true` when state changed.
    pub fn uncomplete_task(&mut self, category: Category, task_id: TaskId) -> bool {
        self.completed.remove(category, task_id)
    }

    pub fn is_completed(&self, category: Category, task_id: TaskId) -> bool {
        self.completed.contains(category, task_id)
    }

    pub fn daily_cp(&self, category: Category) -> u64 {
        self.completed.count(category) as u64
    }

    pub fn lifetime_cp(&self, category: Category) -> u64 {
        self.lifetime_cp.get(category)
    }

    pub fn total_daily_cp(&self) -> u64 {
        Category::ALL.iter().map(|c| self.daily_cp(*c)).sum()
    }

    pub fn total_lifetime_cp(&self) -> u64 {
        self.lifetime_cp.total()
    }

    pub fn daily_by_category(&self) -> CpByCategory {
        CpByCategory {
            mind: self.daily_cp(Category::Mind),
            body: self.daily_cp(Category::Body),
            soul: self.daily_cp(Category::Soul),
        }
    }

    pub fn completed(&self) -> &CompletionSet {
        &self.completed
    }

    pub fn lifetime(&self) -> &LifetimeCp {
        &self.lifetime_cp
    }

    pub fn last_reset_date(&self) -> NaiveDate {
        self.last_reset_date
    }

    pub fn start_date(&self) -> NaiveDate {
        self.start_date
    }

    /// Runs the daily reset sweep. Returns `true` when a reset happened.
    ///
    /// Any date different from the marker triggers a reset, including a clock
    /// that moved backwards.
    pub fn check_reset(&mut self, today: NaiveDate) -> bool {
        if today == self.last_reset_date {
            return false;
        }
        self.completed.clear();
        self.last_reset_date = today;
        true
    }

    pub fn snapshot(&self) -> CommitmentSnapshot {
        CommitmentSnapshot {
            completed: self.completed.clone(),
            daily_cp: self.daily_by_category(),
            lifetime_cp: self.lifetime_cp,
            total_daily_cp: self.total_daily_cp(),
            total_lifetime_cp: self.total_lifetime_cp(),
            last_reset_date: self.last_reset_date,
            start_date: self.start_date,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::CommitmentTracker;
    use crate::model::category::Category;
    use chrono::NaiveDate;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).expect("valid date")
    }

    #[test]
    fn complete_is_idempotent_within_a_day() {
        let mut tracker = CommitmentTracker::new(day(1));
        assert!(tracker.complete_task(Category::Body, 3));
        assert!(!tracker.complete_task(Category::Body, 3));
        assert_eq!(tracker.daily_cp(Category::Body), 1);
        assert_eq!(tracker.lifetime_cp(Category::Body), 1);
    }

    #[test]
    fn reset_keeps_start_date_and_lifetime() {
        let mut tracker = CommitmentTracker::new(day(1));
        tracker.complete_task(Category::Soul, 1);
        assert!(tracker.check_reset(day(2)));
        assert!(!tracker.check_reset(day(2)));
        assert_eq!(tracker.start_date(), day(1));
        assert_eq!(tracker.last_reset_date(), day(2));
        assert_eq!(tracker.total_daily_cp(), 0);
        assert_eq!(tracker.total_lifetime_cp(), 1);
    }

    #[test]
    fn snapshot_reflects_counts() {
        let mut tracker = CommitmentTracker::new(day(1));
        tracker.complete_task(Category::Mind, 1);
        tracker.complete_task(Category::Mind, 2);
        let snapshot = tracker.snapshot();
        assert_eq!(snapshot.daily_cp.mind, 2);
        assert_eq!(snapshot.total_lifetime_cp, 2);
    }
}
