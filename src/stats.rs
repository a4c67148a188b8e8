//! Board statistics: counts, completion rate and a seven-day trend.
//!
//! Day boundaries are UTC calendar days.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;

use crate::item::{Item, StatusSet};

/// Length of the completion trend, ending today.
pub const TREND_DAYS: i64 = 7;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusCount {
    pub status: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DayTrend {
    pub date: NaiveDate,
    /// Tasks created on this day.
    pub created: usize,
    /// Done tasks last updated on this day.
    pub completed: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BoardStats {
    pub generated_at: DateTime<Utc>,
    pub total: usize,
    pub done: usize,
    /// Rounded percentage of done tasks; 0 for an empty board.
    pub completion_rate: u32,
    pub overdue: usize,
    pub statuses: Vec<StatusCount>,
    pub trend: Vec<DayTrend>,
}

pub fn compute(items: &[Item], statuses: &StatusSet, now: DateTime<Utc>) -> BoardStats {
    let total = items.len();
    let done = items
        .iter()
        .filter(|item| statuses.is_done(&item.status))
        .count();
    let overdue = items
        .iter()
        .filter(|item| !statuses.is_done(&item.status))
        .filter(|item| item.due_date.is_some_and(|due| due < now))
        .count();

    let status_counts = statuses
        .statuses()
        .iter()
        .map(|status| StatusCount {
            status: status.clone(),
            count: items.iter().filter(|item| &item.status == status).count(),
        })
        .collect();

    BoardStats {
        generated_at: now,
        total,
        done,
        completion_rate: completion_rate(done, total),
        overdue,
        statuses: status_counts,
        trend: trend(items, statuses, now.date_naive()),
    }
}

pub fn completion_rate(done: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    ((done as f64 / total as f64) * 100.0).round() as u32
}

fn trend(items: &[Item], statuses: &StatusSet, today: NaiveDate) -> Vec<DayTrend> {
    (0..TREND_DAYS)
        .rev()
        .map(|offset| {
            let date = today - Duration::days(offset);
            DayTrend {
                date,
                created: items
                    .iter()
                    .filter(|item| item.created_at.date_naive() == date)
                    .count(),
                completed: items
                    .iter()
                    .filter(|item| statuses.is_done(&item.status))
                    .filter(|item| item.updated_at.date_naive() == date)
                    .count(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::ItemDraft;
    use chrono::TimeZone;

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, day, hour, 0, 0)
            .single()
            .expect("timestamp")
    }

    fn item(id: &str, status: &str, created: DateTime<Utc>) -> Item {
        Item::from_draft(id, ItemDraft::new(id), "u", status, 0, created)
    }

    #[test]
    fn empty_board_has_zero_rate() {
        let stats = compute(&[], &StatusSet::default(), at(10, 12));
        assert_eq!(stats.total, 0);
        assert_eq!(stats.completion_rate, 0);
        assert_eq!(stats.trend.len(), 7);
        assert_eq!(stats.statuses.len(), 3);
    }

    #[test]
    fn counts_rate_and_overdue() {
        let mut late = item("late", "todo", at(1, 9));
        late.due_date = Some(at(5, 0));
        let mut late_but_done = item("finished", "done", at(1, 9));
        late_but_done.due_date = Some(at(5, 0));
        let items = vec![late, late_but_done, item("c", "in-progress", at(2, 9))];

        let stats = compute(&items, &StatusSet::default(), at(10, 12));
        assert_eq!(stats.total, 3);
        assert_eq!(stats.done, 1);
        assert_eq!(stats.completion_rate, 33);
        assert_eq!(stats.overdue, 1);
        let in_progress = stats
            .statuses
            .iter()
            .find(|count| count.status == "in-progress")
            .expect("column");
        assert_eq!(in_progress.count, 1);
    }

    #[test]
    fn trend_covers_last_seven_days() {
        let mut finished = item("a", "done", at(4, 8));
        finished.updated_at = at(9, 18);
        let items = vec![finished, item("b", "todo", at(10, 1)), item("old", "todo", at(1, 1))];

        let stats = compute(&items, &StatusSet::default(), at(10, 12));
        let first = stats.trend.first().expect("first day");
        let last = stats.trend.last().expect("today");
        assert_eq!(first.date, at(4, 0).date_naive());
        assert_eq!(first.created, 1);
        assert_eq!(last.date, at(10, 0).date_naive());
        assert_eq!(last.created, 1);
        assert_eq!(stats.trend[5].completed, 1);
        assert_eq!(stats.trend.iter().map(|day| day.created).sum::<usize>(), 2);
    }

    #[test]
    fn rate_rounds_to_nearest() {
        assert_eq!(completion_rate(2, 3), 67);
        assert_eq!(completion_rate(1, 8), 13);
        assert_eq!(completion_rate(4, 4), 100);
    }
}
