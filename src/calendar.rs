//! Weekly agenda of tasks by due date.
//!
//! Weeks start on Monday. Tasks without a due date never appear.

use std::cmp::Ordering;

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use serde::Serialize;

use crate::error::{Error, Result};
use crate::item::Item;

pub const DAYS_PER_WEEK: i64 = 7;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgendaDay {
    pub date: NaiveDate,
    pub items: Vec<Item>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WeekAgenda {
    pub week_start: NaiveDate,
    pub days: Vec<AgendaDay>,
}

impl WeekAgenda {
    pub fn week_end(&self) -> NaiveDate {
        self.week_start + Duration::days(DAYS_PER_WEEK - 1)
    }

    pub fn len(&self) -> usize {
        self.days.iter().map(|day| day.items.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Monday of the week containing `date`.
pub fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.weekday().num_days_from_monday()))
}

/// Monday of the week `weeks` away from the one containing `start`
/// (negative goes back).
///
/// Fails when the shifted week does not fit in the calendar range.
pub fn shift_week(start: NaiveDate, weeks: i64) -> Result<NaiveDate> {
    let back_to_monday = i64::from(start.weekday().num_days_from_monday());
    weeks
        .checked_mul(DAYS_PER_WEEK)
        .and_then(|days| days.checked_sub(back_to_monday))
        .and_then(Duration::try_days)
        .and_then(|delta| start.checked_add_signed(delta))
        .filter(|monday| {
            Duration::try_days(DAYS_PER_WEEK - 1)
                .and_then(|rest| monday.checked_add_signed(rest))
                .is_some()
        })
        .ok_or_else(|| Error::InvalidArgument(format!("week offset {weeks} is out of range")))
}

/// Bucket items into the seven days of the week beginning at `start`.
///
/// `start` is normalised to its Monday.
pub fn week_agenda(items: &[Item], start: NaiveDate) -> WeekAgenda {
    let start = week_start(start);
    let days = (0..DAYS_PER_WEEK)
        .map(|offset| {
            let date = start + Duration::days(offset);
            let mut due: Vec<Item> = items
                .iter()
                .filter(|item| due_on(item, date))
                .cloned()
                .collect();
            due.sort_by(compare_agenda);
            AgendaDay { date, items: due }
        })
        .collect();
    WeekAgenda {
        week_start: start,
        days,
    }
}

fn due_on(item: &Item, date: NaiveDate) -> bool {
    item.due_date
        .is_some_and(|due: DateTime<Utc>| due.date_naive() == date)
}

fn compare_agenda(a: &Item, b: &Item) -> Ordering {
    a.due_date
        .cmp(&b.due_date)
        .then_with(|| a.priority.rank().cmp(&b.priority.rank()))
        .then_with(|| a.title.cmp(&b.title))
        .then_with(|| a.id.cmp(&b.id))
}
