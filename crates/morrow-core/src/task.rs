use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// Join separator for the kind/object/action display text.
const TEXT_SEPARATOR: &str = " - ";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,

    pub text: String,

    #[serde(rename = "type", default)]
    pub kind: String,

    #[serde(default)]
    pub object: String,

    #[serde(default)]
    pub action: String,

    pub completed: bool,

    pub date: NaiveDate,

    pub created_at: NaiveDate,

    pub inherited: bool,

    #[serde(default)]
    pub subtasks: Vec<Subtask>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Subtask {
    pub id: String,
    pub text: String,
    pub completed: bool,
}

#[derive(Debug, Clone, Default)]
pub struct TaskDraft {
    pub text: String,
    pub kind: String,
    pub object: String,
    pub action: String,
    pub date: Option<NaiveDate>,
    pub subtasks: Vec<String>,
}

pub fn compose_text(kind: &str, object: &str, action: &str) -> String {
    [kind, object, action]
        .iter()
        .map(|part| part.trim())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(TEXT_SEPARATOR)
}

impl TaskDraft {
    pub fn display_text(&self) -> Option<String> {
        let joined = compose_text(&self.kind, &self.object, &self.action);
        if !joined.is_empty() {
            return Some(joined);
        }
        let free = self.text.trim();
        if free.is_empty() {
            None
        } else {
            Some(free.to_string())
        }
    }
}

impl Task {
    pub fn carried_from(&self) -> Option<NaiveDate> {
        (self.inherited && self.date != self.created_at).then_some(self.created_at)
    }

    pub fn subtask(&self, sub_id: &str) -> Option<&Subtask> {
        self.subtasks.iter().find(|sub| sub.id == sub_id)
    }

    pub fn add_subtask(&mut self, id: String, text: &str) {
        self.subtasks.push(Subtask {
            id,
            text: text.trim().to_string(),
            completed: false,
        });
    }

    pub fn remove_subtask(&mut self, sub_id: &str) -> bool {
        let before = self.subtasks.len();
        self.subtasks.retain(|sub| sub.id != sub_id);
        self.subtasks.len() != before
    }

    pub fn toggle_subtask(&mut self, sub_id: &str) -> bool {
        let Some(sub) = self.subtasks.iter_mut().find(|sub| sub.id == sub_id) else {
            return false;
        };
        sub.completed = !sub.completed;
        true
    }

    // Remove the dragged subtask, then reinsert it at the target's index as
    // found after removal, i.e. immediately before the target's original slot.
    pub fn reorder_subtask(&mut self, from_id: &str, to_id: &str) -> bool {
        if from_id == to_id {
            return false;
        }
        let Some(from_idx) = self.subtasks.iter().position(|sub| sub.id == from_id) else {
            return false;
        };
        if !self.subtasks.iter().any(|sub| sub.id == to_id) {
            return false;
        }

        let dragged = self.subtasks.remove(from_idx);
        let target_idx = self
            .subtasks
            .iter()
            .position(|sub| sub.id == to_id)
            .unwrap_or(self.subtasks.len());
        self.subtasks.insert(target_idx, dragged);
        true
    }
}
