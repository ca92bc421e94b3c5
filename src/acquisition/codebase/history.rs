use crate::acquisition::dataset::{CommitHistory, YearMonth};
use chrono::{DateTime, TimeDelta, Utc};
use std::collections::BTreeMap;

/// Length of the trailing window covered by the monthly commit counts
pub const MONTHLY_WINDOW: TimeDelta = TimeDelta::days(365);

/// Summarize commit timestamps into totals and per-month counts.
///
/// The total covers every commit; the monthly counts only cover commits made within
/// [`MONTHLY_WINDOW`] up to `now`, so they never sum to more than the total.
#[must_use]
pub fn summarize_commits(commit_times: &[DateTime<Utc>], now: DateTime<Utc>) -> CommitHistory {
    let window_start = now - MONTHLY_WINDOW;
    let mut monthly_commits: BTreeMap<YearMonth, u64> = BTreeMap::new();

    let window = window_start..=now;
    for month in commit_times.iter().filter(|t| window.contains(*t)).filter_map(|t| YearMonth::of(*t)) {
        *monthly_commits.entry(month).or_default() += 1;
    }

    CommitHistory {
        total_commits: commit_times.len() as u64,
        last_commit: commit_times.iter().max().copied(),
        monthly_commits,
    }
}
