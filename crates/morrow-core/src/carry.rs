use chrono::NaiveDate;
use tracing::{debug, info};

use crate::datetime::next_day;
use crate::ids::IdSource;
use crate::task::{Subtask, Task};

// Copies every unfinished task scheduled for `today` onto the next day.
// Additive: the sources stay in place, so a task left unfinished keeps
// producing one new record per day until it is completed.
pub fn carry_forward(tasks: &[Task], today: NaiveDate, ids: &mut dyn IdSource) -> Vec<Task> {
    let tomorrow = next_day(today);

    let mut carried = Vec::new();
    for source in tasks
        .iter()
        .filter(|task| task.date == today && !task.completed)
    {
        let subtasks = source
            .subtasks
            .iter()
            .map(|sub| Subtask {
                id: sub.id.clone(),
                text: sub.text.clone(),
                completed: false,
            })
            .collect();

        carried.push(Task {
            id: ids.next_id(),
            text: source.text.clone(),
            kind: source.kind.clone(),
            object: source.object.clone(),
            action: source.action.clone(),
            completed: false,
            date: tomorrow,
            // lineage: keep the origin creation date across every hop
            created_at: source.created_at,
            inherited: true,
            subtasks,
        });
        debug!(source = %source.id, "carried task forward");
    }

    info!(count = carried.len(), %tomorrow, "carry-forward pass");
    carried
}
