use std::collections::HashSet;

use chrono::{Datelike, Duration, NaiveDate};

use crate::task::Task;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayInfo {
    pub day: u32,
    pub is_today: bool,
    pub is_selected: bool,
    pub has_tasks: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayCell {
    Empty,
    Day(DayInfo),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonthCursor {
    pub year: i32,
    pub month: u32,
}

impl MonthCursor {
    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn prev_month(&mut self) {
        if self.month <= 1 {
            self.month = 12;
            self.year = self.year.saturating_sub(1);
        } else {
            self.month -= 1;
        }
    }

    pub fn next_month(&mut self) {
        if self.month >= 12 {
            self.month = 1;
            self.year = self.year.saturating_add(1);
        } else {
            self.month += 1;
        }
    }

    pub fn first_day(&self) -> NaiveDate {
        first_day_of_month(self.year, self.month)
    }
}

pub fn build_month_grid(
    tasks: &[Task],
    year: i32,
    month: u32,
    today: NaiveDate,
    selected: NaiveDate,
) -> Vec<DayCell> {
    let first = first_day_of_month(year, month);
    let last = last_day_of_month(year, month);

    // one pass over the tasks, independent of day count
    let mut task_days: HashSet<u32> = HashSet::new();
    for task in tasks {
        if task.date.year() == year && task.date.month() == month {
            task_days.insert(task.date.day());
        }
    }

    let leading = first.weekday().num_days_from_sunday() as usize;
    let mut cells = Vec::with_capacity(leading + last.day() as usize);
    for _ in 0..leading {
        cells.push(DayCell::Empty);
    }

    for day in 1..=last.day() {
        cells.push(DayCell::Day(DayInfo {
            day,
            is_today: matches_ymd(today, year, month, day),
            is_selected: matches_ymd(selected, year, month, day),
            has_tasks: task_days.contains(&day),
        }));
    }

    cells
}

fn matches_ymd(date: NaiveDate, year: i32, month: u32, day: u32) -> bool {
    date.year() == year && date.month() == month && date.day() == day
}

fn first_day_of_month(year: i32, month: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, 1).unwrap_or(NaiveDate::MIN)
}

fn last_day_of_month(year: i32, month: u32) -> NaiveDate {
    let (next_year, next_month) = if month >= 12 {
        (year.saturating_add(1), 1_u32)
    } else {
        (year, month + 1)
    };
    add_days(first_day_of_month(next_year, next_month), -1)
}

fn add_days(date: NaiveDate, days: i64) -> NaiveDate {
    date.checked_add_signed(Duration::days(days)).unwrap_or(date)
}
