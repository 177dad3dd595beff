use chrono::NaiveDate;
use tracing::trace;

use crate::datetime::parse_date;
use crate::task::Task;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Filter {
    #[default]
    All,
    Active,
    Completed,
    Today,
    Date(NaiveDate),
}

impl Filter {
    // Unknown values degrade to All; calendar-day clicks arrive as literal
    // YYYY-MM-DD strings.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "all" => Filter::All,
            "active" => Filter::Active,
            "completed" => Filter::Completed,
            "today" => Filter::Today,
            other => parse_date(other).map(Filter::Date).unwrap_or(Filter::All),
        }
    }

    pub fn matches(&self, task: &Task, today: NaiveDate) -> bool {
        let ok = match self {
            Filter::All => true,
            Filter::Active => !task.completed,
            Filter::Completed => task.completed,
            Filter::Today => task.date == today,
            Filter::Date(date) => task.date == *date,
        };
        trace!(filter = ?self, id = %task.id, ok, "filter predicate evaluation");
        ok
    }
}

pub fn visible_tasks<'a>(tasks: &'a [Task], filter: &Filter, today: NaiveDate) -> Vec<&'a Task> {
    tasks
        .iter()
        .filter(|task| filter.matches(task, today))
        .collect()
}

pub fn active_count(tasks: &[Task]) -> usize {
    tasks.iter().filter(|task| !task.completed).count()
}
