//! Commitment (CP) state records.
//!
//! # Responsibility
//! - Define today's completion sets and lifetime counters per category.
//! - Keep the persisted JSON shape `{ "mind": [...], "body": [...], "soul": [...] }`.
//!
//! # Invariants
//! - A task id appears at most once per category in `CompletionSet`.
//! - `CpByCategory` counters only move up through `increment`.

use crate::model::category::Category;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Client-defined task identifier within a category.
pub type TaskId = i64;

/// Task ids completed today, grouped by category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionSet {
    #[serde(default)]
    pub mind: BTreeSet<TaskId>,
    #[serde(default)]
    pub body: BTreeSet<TaskId>,
    #[serde(default)]
    pub soul: BTreeSet<TaskId>,
}

impl CompletionSet {
    pub fn get(&self, category: Category) -> &BTreeSet<TaskId> {
        match category {
            Category::Mind => &self.mind,
            Category::Body => &self.body,
            Category::Soul => &self.soul,
        }
    }

    fn get_mut(&mut self, category: Category) -> &mut BTreeSet<TaskId> {
        match category {
            Category::Mind => &mut self.mind,
            Category::Body => &mut self.body,
            Category::Soul => &mut self.soul,
        }
    }

    /// Inserts a task id; returns `false` when it was already present.
    pub fn insert(&mut self, category: Category, task_id: TaskId) -> bool {
        self.get_mut(category).insert(task_id)
    }

    /// Removes a task id; returns `false` when it was absent.
    pub fn remove(&mut self, category: Category, task_id: TaskId) -> bool {
        self.get_mut(category).remove(&task_id)
    }

    pub fn contains(&self, category: Category, task_id: TaskId) -> bool {
        self.get(category).contains(&task_id)
    }

    pub fn count(&self, category: Category) -> usize {
        self.get(category).len()
    }

    pub fn total(&self) -> usize {
        Category::ALL.iter().map(|category| self.count(*category)).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    pub fn clear(&mut self) {
        self.mind.clear();
        self.body.clear();
        self.soul.clear();
    }
}

/// Per-category CP counters.
///
/// Used both for lifetime totals and for the `cpByCategory` profile field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CpByCategory {
    #[serde(default)]
    pub mind: u64,
    #[serde(default)]
    pub body: u64,
    #[serde(default)]
    pub soul: u64,
}

impl CpByCategory {
    pub fn get(&self, category: Category) -> u64 {
        match category {
            Category::Mind => self.mind,
            Category::Body => self.body,
            Category::Soul => self.soul,
        }
    }

    pub fn increment(&mut self, category: Category) {
        let slot = match category {
            Category::Mind => &mut self.mind,
            Category::Body => &mut self.body,
            Category::Soul => &mut self.soul,
        };
        *slot = slot.saturating_add(1);
    }

    pub fn total(&self) -> u64 {
        self.mind
            .saturating_add(self.body)
            .saturating_add(self.soul)
    }
}

/// Lifetime CP counters; never decremented.
pub type LifetimeCp = CpByCategory;

/// Read-only view of tracker state for UI and CLI callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitmentSnapshot {
    pub completed: CompletionSet,
    pub daily_cp: CpByCategory,
    pub lifetime_cp: LifetimeCp,
    pub total_daily_cp: u64,
    pub total_lifetime_cp: u64,
    pub last_reset_date: NaiveDate,
    pub start_date: NaiveDate,
}

#[cfg(test)]
mod tests {
    use super::{CompletionSet, CpByCategory};
    use crate::model::category::Category;

    #[test]
    fn completion_set_serializes_as_category_arrays() {
        let mut set = CompletionSet::default();
        set.insert(Category::Mind, 2);
        set.insert(Category::Mind, 1);
        set.insert(Category::Soul, 7);

        let json = serde_json::to_string(&set).expect("serialize completion set");
        assert_eq!(json, r#"{"mind":[1,2],"body":[],"soul":[7]}"#);
    }

    #[test]
    fn completion_set_accepts_partial_json() {
        let set: CompletionSet =
            serde_json::from_str(r#"{"body":[3]}"#).expect("partial json should parse");
        assert_eq!(set.count(Category::Body), 1);
        assert_eq!(set.count(Category::Mind), 0);
    }

    #[test]
    fn cp_by_category_totals_and_increments() {
        let mut cp = CpByCategory::default();
        cp.increment(Category::Body);
        cp.increment(Category::Body);
        cp.increment(Category::Soul);
        assert_eq!(cp.get(Category::Body), 2);
        assert_eq!(cp.total(), 3);
    }
}
