use chrono::NaiveDate;
use mybestlife_core::{Category, CommitmentTracker};
use proptest::prelude::*;
use std::collections::BTreeSet;

fn date(value: &str) -> NaiveDate {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").unwrap()
}

fn scenario_day_one() -> CommitmentTracker {
    let mut tracker = CommitmentTracker::new(date("2024-01-01"));
    tracker.complete_task(Category::Mind, 1);
    tracker.complete_task(Category::Mind, 2);
    tracker.complete_task(Category::Body, 1);
    tracker
}

#[test]
fn completing_tasks_counts_daily_and_lifetime_cp() {
    let tracker = scenario_day_one();

    assert_eq!(tracker.daily_cp(Category::Mind), 2);
    assert_eq!(tracker.daily_cp(Category::Body), 1);
    assert_eq!(tracker.lifetime_cp(Category::Mind), 2);
}

#[test]
fn uncompleting_lowers_daily_cp_but_keeps_lifetime_cp() {
    let mut tracker = scenario_day_one();

    assert!(tracker.uncomplete_task(Category::Mind, 1));

    assert_eq!(tracker.daily_cp(Category::Mind), 1);
    assert_eq!(tracker.lifetime_cp(Category::Mind), 2);
}

#[test]
fn next_day_reset_clears_daily_cp_and_records_date() {
    let mut tracker = scenario_day_one();
    tracker.uncomplete_task(Category::Mind, 1);

    assert!(tracker.check_reset(date("2024-01-02")));

    assert_eq!(tracker.daily_cp(Category::Mind), 0);
    assert_eq!(tracker.daily_cp(Category::Body), 0);
    assert_eq!(tracker.lifetime_cp(Category::Mind), 2);
    assert_eq!(tracker.last_reset_date(), date("2024-01-02"));
}

#[test]
fn reset_check_on_same_day_is_a_no_op() {
    let mut tracker = scenario_day_one();

    assert!(!tracker.check_reset(date("2024-01-01")));
    assert_eq!(tracker.daily_cp(Category::Mind), 2);
}

#[test]
fn uncompleting_unknown_task_changes_nothing() {
    let mut tracker = scenario_day_one();
    let before = tracker.clone();

    assert!(!tracker.uncomplete_task(Category::Soul, 42));
    assert_eq!(tracker, before);
}

#[test]
fn recompleting_after_uncomplete_earns_another_lifetime_point() {
    let mut tracker = CommitmentTracker::new(date("2024-01-01"));
    tracker.complete_task(Category::Soul, 5);
    tracker.uncomplete_task(Category::Soul, 5);
    tracker.complete_task(Category::Soul, 5);

    assert_eq!(tracker.daily_cp(Category::Soul), 1);
    assert_eq!(tracker.lifetime_cp(Category::Soul), 2);
}

#[derive(Debug, Clone, Copy)]
enum Op {
    Complete(Category, i64),
    Uncomplete(Category, i64),
}

fn category() -> impl Strategy<Value = Category> {
    prop_oneof![
        Just(Category::Mind),
        Just(Category::Body),
        Just(Category::Soul)
    ]
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (category(), 0_i64..8).prop_map(|(c, id)| Op::Complete(c, id)),
        (category(), 0_i64..8).prop_map(|(c, id)| Op::Uncomplete(c, id)),
    ]
}

proptest! {
    #[test]
    fn daily_cp_matches_distinct_completed_ids(ops in prop::collection::vec(op(), 0..64)) {
        let mut tracker = CommitmentTracker::new(date("2024-01-01"));
        let mut model: [BTreeSet<i64>; 3] = Default::default();
        let slot = |c: Category| Category::ALL.iter().position(|x| *x == c).unwrap();

        for op in ops {
            match op {
                Op::Complete(c, id) => {
                    tracker.complete_task(c, id);
                    model[slot(c)].insert(id);
                }
                Op::Uncomplete(c, id) => {
                    tracker.uncomplete_task(c, id);
                    model[slot(c)].remove(&id);
                }
            }
            for c in Category::ALL {
                prop_assert_eq!(tracker.daily_cp(c), model[slot(c)].len() as u64);
            }
        }
    }

    #[test]
    fn lifetime_cp_never_decreases_and_counts_first_completions(ops in prop::collection::vec(op(), 0..64)) {
        let mut tracker = CommitmentTracker::new(date("2024-01-01"));
        for op in ops {
            let before = *tracker.lifetime();
            match op {
                Op::Complete(c, id) => {
                    let was_done = tracker.is_completed(c, id);
                    let changed = tracker.complete_task(c, id);
                    prop_assert_eq!(changed, !was_done);
                    let expected = before.get(c) + u64::from(!was_done);
                    prop_assert_eq!(tracker.lifetime_cp(c), expected);
                }
                Op::Uncomplete(c, id) => {
                    tracker.uncomplete_task(c, id);
                    prop_assert_eq!(tracker.lifetime_cp(c), before.get(c));
                }
            }
            for c in Category::ALL {
                prop_assert!(tracker.lifetime_cp(c) >= before.get(c));
            }
        }
    }

    #[test]
    fn reset_zeroes_daily_cp_and_preserves_lifetime(ops in prop::collection::vec(op(), 0..32)) {
        let mut tracker = CommitmentTracker::new(date("2024-01-01"));
        for op in ops {
            match op {
                Op::Complete(c, id) => { tracker.complete_task(c, id); }
                Op::Uncomplete(c, id) => { tracker.uncomplete_task(c, id); }
            }
        }
        let lifetime_before = *tracker.lifetime();

        prop_assert!(tracker.check_reset(date("2024-01-02")));
        for c in Category::ALL {
            prop_assert_eq!(tracker.daily_cp(c), 0);
        }
        prop_assert_eq!(*tracker.lifetime(), lifetime_before);
    }

    #[test]
    fn double_complete_equals_single_complete(ops in prop::collection::vec(op(), 0..32), c in category(), id in 0_i64..8) {
        let mut base = CommitmentTracker::new(date("2024-01-01"));
        for op in ops {
            match op {
                Op::Complete(c, id) => { base.complete_task(c, id); }
                Op::Uncomplete(c, id) => { base.uncomplete_task(c, id); }
            }
        }
        let mut once = base.clone();
        once.complete_task(c, id);
        let mut twice = base;
        twice.complete_task(c, id);
        twice.complete_task(c, id);

        prop_assert_eq!(once, twice);
    }
}
