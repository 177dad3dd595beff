use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use chrono::NaiveDate;
use serde::Deserialize;
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::carry::carry_forward;
use crate::datetime::{next_day, parse_date};
use crate::ids::{IdSource, UuidIds};
use crate::task::{Subtask, Task, TaskDraft, compose_text};

#[derive(Debug)]
pub struct TaskStore {
    path: PathBuf,
    tasks: Vec<Task>,
    ids: Box<dyn IdSource>,
}

// Lenient mirror of the persisted record: every field optional so that
// legacy blobs load and get repaired instead of rejected.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTask {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    text: Option<String>,
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    object: Option<String>,
    #[serde(default)]
    action: Option<String>,
    #[serde(default)]
    completed: Option<bool>,
    #[serde(default)]
    date: Option<String>,
    #[serde(default)]
    created_at: Option<String>,
    #[serde(default)]
    inherited: Option<bool>,
    #[serde(default)]
    subtasks: Vec<RawSubtask>,
}

#[derive(Debug, Default, Deserialize)]
struct RawSubtask {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    completed: Option<bool>,
}

impl TaskStore {
    #[tracing::instrument(skip(path))]
    pub fn open(path: &Path, today: NaiveDate) -> anyhow::Result<Self> {
        Self::open_with_ids(path, Box::new(UuidIds), today)
    }

    #[tracing::instrument(skip(path, ids))]
    pub fn open_with_ids(
        path: &Path,
        ids: Box<dyn IdSource>,
        today: NaiveDate,
    ) -> anyhow::Result<Self> {
        let mut store = Self {
            path: path.to_path_buf(),
            tasks: Vec::new(),
            ids,
        };

        if !store.path.exists() {
            debug!(file = %store.path.display(), "no persisted tasks; starting empty");
            return Ok(store);
        }

        let raw = fs::read_to_string(&store.path)
            .with_context(|| format!("failed to read {}", store.path.display()))?;
        let records: Vec<RawTask> = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse {}", store.path.display()))?;

        let mut tasks = Vec::with_capacity(records.len());
        for record in records {
            tasks.push(migrate_record(record, today, store.ids.as_mut()));
        }
        store.tasks = tasks;

        info!(file = %store.path.display(), count = store.tasks.len(), "loaded tasks");

        // forward-fix: the migrated form replaces whatever was on disk
        store
            .save()
            .context("failed to persist migrated tasks")?;
        Ok(store)
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn task(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|task| task.id == id)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    #[tracing::instrument(skip(self))]
    pub fn save(&self) -> anyhow::Result<()> {
        debug!(file = %self.path.display(), count = self.tasks.len(), "saving tasks");

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;

        let mut temp = NamedTempFile::new_in(dir)?;
        serde_json::to_writer(&mut temp, &self.tasks)?;
        temp.flush()?;
        temp.persist(&self.path)
            .map_err(|err| anyhow!("failed to persist {}: {}", self.path.display(), err))?;

        Ok(())
    }

    #[tracing::instrument(skip(self, draft))]
    pub fn add_task(&mut self, draft: TaskDraft, today: NaiveDate) -> anyhow::Result<Option<&Task>> {
        let Some(text) = draft.display_text() else {
            debug!("rejected task draft with no text");
            return Ok(None);
        };

        let date = draft.date.unwrap_or(today);
        let subtasks = draft
            .subtasks
            .iter()
            .map(|sub_text| Subtask {
                id: self.ids.next_id(),
                text: sub_text.trim().to_string(),
                completed: false,
            })
            .collect();

        let task = Task {
            id: self.ids.next_id(),
            text,
            kind: draft.kind.trim().to_string(),
            object: draft.object.trim().to_string(),
            action: draft.action.trim().to_string(),
            completed: false,
            date,
            created_at: date,
            inherited: false,
            subtasks,
        };

        info!(id = %task.id, %date, "task added");
        self.tasks.push(task);
        self.save()?;
        Ok(self.tasks.last())
    }

    #[tracing::instrument(skip(self))]
    pub fn delete_task(&mut self, id: &str) -> anyhow::Result<bool> {
        let before = self.tasks.len();
        self.tasks.retain(|task| task.id != id);
        if self.tasks.len() == before {
            return Ok(false);
        }
        info!(id, "task deleted");
        self.save()?;
        Ok(true)
    }

    #[tracing::instrument(skip(self))]
    pub fn toggle_task(&mut self, id: &str) -> anyhow::Result<bool> {
        let Some(task) = self.tasks.iter_mut().find(|task| task.id == id) else {
            return Ok(false);
        };
        task.completed = !task.completed;
        debug!(id, completed = task.completed, "task toggled");
        self.save()?;
        Ok(true)
    }

    #[tracing::instrument(skip(self, kind, object, action))]
    pub fn edit_task(
        &mut self,
        id: &str,
        kind: &str,
        object: &str,
        action: &str,
    ) -> anyhow::Result<bool> {
        let Some(task) = self.tasks.iter_mut().find(|task| task.id == id) else {
            return Ok(false);
        };

        task.kind = kind.trim().to_string();
        task.object = object.trim().to_string();
        task.action = action.trim().to_string();

        // keep the display text in sync with the structured fields; a
        // free-text task edited with all fields empty keeps its text
        let joined = compose_text(&task.kind, &task.object, &task.action);
        if !joined.is_empty() {
            task.text = joined;
        }

        self.save()?;
        Ok(true)
    }

    #[tracing::instrument(skip(self))]
    pub fn clear_completed(&mut self) -> anyhow::Result<usize> {
        let before = self.tasks.len();
        self.tasks.retain(|task| !task.completed);
        let removed = before - self.tasks.len();
        if removed > 0 {
            info!(removed, "cleared completed tasks");
            self.save()?;
        }
        Ok(removed)
    }

    #[tracing::instrument(skip(self, text))]
    pub fn add_subtask(&mut self, task_id: &str, text: &str) -> anyhow::Result<bool> {
        let Some(task) = self.tasks.iter_mut().find(|task| task.id == task_id) else {
            return Ok(false);
        };
        let sub_id = self.ids.next_id();
        task.add_subtask(sub_id, text);
        self.save()?;
        Ok(true)
    }

    #[tracing::instrument(skip(self))]
    pub fn remove_subtask(&mut self, task_id: &str, sub_id: &str) -> anyhow::Result<bool> {
        let Some(task) = self.tasks.iter_mut().find(|task| task.id == task_id) else {
            return Ok(false);
        };
        if !task.remove_subtask(sub_id) {
            return Ok(false);
        }
        self.save()?;
        Ok(true)
    }

    #[tracing::instrument(skip(self))]
    pub fn toggle_subtask(&mut self, task_id: &str, sub_id: &str) -> anyhow::Result<bool> {
        let Some(task) = self.tasks.iter_mut().find(|task| task.id == task_id) else {
            return Ok(false);
        };
        if !task.toggle_subtask(sub_id) {
            return Ok(false);
        }
        self.save()?;
        Ok(true)
    }

    #[tracing::instrument(skip(self))]
    pub fn reorder_subtask(
        &mut self,
        task_id: &str,
        from_id: &str,
        to_id: &str,
    ) -> anyhow::Result<bool> {
        let Some(task) = self.tasks.iter_mut().find(|task| task.id == task_id) else {
            return Ok(false);
        };
        if !task.reorder_subtask(from_id, to_id) {
            return Ok(false);
        }
        self.save()?;
        Ok(true)
    }

    #[tracing::instrument(skip(self))]
    pub fn inherit_to_tomorrow(&mut self, today: NaiveDate) -> anyhow::Result<usize> {
        let carried = carry_forward(&self.tasks, today, self.ids.as_mut());
        let count = carried.len();
        self.tasks.extend(carried);
        self.save()?;
        Ok(count)
    }

    #[tracing::instrument(skip(self))]
    pub fn seed_samples(&mut self, today: NaiveDate) -> anyhow::Result<usize> {
        if !self.tasks.is_empty() {
            return Ok(0);
        }

        let yesterday = today.pred_opt().unwrap_or(today);
        let two_days_ago = yesterday.pred_opt().unwrap_or(yesterday);
        let tomorrow = next_day(today);

        let samples = [
            ("完成项目提案", false, today, today, false),
            ("回复重要邮件", true, today, today, false),
            // left over from two days ago, already carried once
            ("准备会议材料", false, yesterday, two_days_ago, true),
            ("锻炼30分钟", false, tomorrow, tomorrow, false),
        ];
        for (text, completed, date, created_at, inherited) in samples {
            let id = self.ids.next_id();
            self.tasks.push(Task {
                id,
                text: text.to_string(),
                kind: String::new(),
                object: String::new(),
                action: String::new(),
                completed,
                date,
                created_at,
                inherited,
                subtasks: Vec::new(),
            });
        }

        info!(count = self.tasks.len(), "seeded sample tasks");
        self.save()?;
        Ok(self.tasks.len())
    }
}

fn migrate_record(raw: RawTask, today: NaiveDate, ids: &mut dyn IdSource) -> Task {
    let stored_date = raw.date.as_deref().and_then(parse_date);
    let stored_created = raw.created_at.as_deref().and_then(parse_date);

    let (date, created_at, inherited) = match (stored_date, stored_created) {
        (None, _) => (today, today, false),
        (Some(date), None) => (date, date, false),
        (Some(date), Some(created)) => (date, created, raw.inherited.unwrap_or(false)),
    };

    let kind = raw.kind.unwrap_or_default();
    let object = raw.object.unwrap_or_default();
    let action = raw.action.unwrap_or_default();
    let text = match raw.text {
        Some(text) if !text.trim().is_empty() => text,
        _ => compose_text(&kind, &object, &action),
    };

    let subtasks = raw
        .subtasks
        .into_iter()
        .map(|sub| Subtask {
            id: sub
                .id
                .filter(|id| !id.is_empty())
                .unwrap_or_else(|| ids.next_id()),
            text: sub.text.unwrap_or_default(),
            completed: sub.completed.unwrap_or(false),
        })
        .collect();

    Task {
        id: raw
            .id
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| ids.next_id()),
        text,
        kind,
        object,
        action,
        completed: raw.completed.unwrap_or(false),
        date,
        created_at,
        inherited,
        subtasks,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::fs;
    use std::path::PathBuf;

    use chrono::NaiveDate;
    use tempfile::TempDir;

    use super::TaskStore;
    use crate::ids::SequentialIds;
    use crate::task::TaskDraft;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 10).expect("valid date")
    }

    fn open_store(temp: &TempDir) -> (TaskStore, PathBuf) {
        let path = temp.path().join("tasks.json");
        let store = TaskStore::open_with_ids(&path, Box::new(SequentialIds::default()), today())
            .expect("open store");
        (store, path)
    }

    fn draft(text: &str, date: Option<NaiveDate>) -> TaskDraft {
        TaskDraft {
            text: text.to_string(),
            date,
            ..TaskDraft::default()
        }
    }

    #[test]
    fn missing_file_opens_empty_without_creating_it() {
        let temp = TempDir::new().expect("tempdir");
        let (store, path) = open_store(&temp);
        assert!(store.tasks().is_empty());
        assert!(!path.exists());
    }

    #[test]
    fn rejects_all_empty_draft_without_writing() {
        let temp = TempDir::new().expect("tempdir");
        let (mut store, path) = open_store(&temp);

        let added = store
            .add_task(TaskDraft::default(), today())
            .expect("add is infallible here");
        assert!(added.is_none());
        assert!(store.tasks().is_empty());
        assert!(!path.exists());
    }

    #[test]
    fn add_defaults_date_to_today_and_persists() {
        let temp = TempDir::new().expect("tempdir");
        let (mut store, path) = open_store(&temp);

        let added = store
            .add_task(draft("buy milk", None), today())
            .expect("add task")
            .expect("draft accepted")
            .clone();
        assert_eq!(added.date, today());
        assert_eq!(added.created_at, today());
        assert!(!added.inherited);
        assert!(path.exists());

        let reopened = TaskStore::open(&path, today()).expect("reopen");
        assert_eq!(reopened.tasks(), store.tasks());
    }

    #[test]
    fn task_ids_are_unique_across_adds() {
        let temp = TempDir::new().expect("tempdir");
        let (mut store, _path) = open_store(&temp);

        for n in 0..10 {
            store
                .add_task(draft(&format!("task {n}"), None), today())
                .expect("add task");
        }
        let ids: HashSet<&str> = store.tasks().iter().map(|task| task.id.as_str()).collect();
        assert_eq!(ids.len(), 10);
    }

    #[test]
    fn migration_repairs_legacy_records_and_is_idempotent() {
        let temp = TempDir::new().expect("tempdir");
        let path = temp.path().join("tasks.json");
        fs::write(
            &path,
            r#"[
                {"id":"legacy-1","text":"no date at all","completed":false},
                {"id":"legacy-2","text":"date only","completed":true,"date":"2024-05-01"},
                {"id":"legacy-3","text":"no inherited","completed":false,"date":"2024-05-02","createdAt":"2024-04-30"},
                {"text":"no id","completed":false,"date":"2024-05-03","createdAt":"2024-05-03","inherited":false}
            ]"#,
        )
        .expect("write legacy blob");

        let store = TaskStore::open_with_ids(&path, Box::new(SequentialIds::default()), today())
            .expect("open store");
        let tasks = store.tasks();
        assert_eq!(tasks.len(), 4);

        assert_eq!(tasks[0].date, today());
        assert_eq!(tasks[0].created_at, today());
        assert!(!tasks[0].inherited);

        assert_eq!(tasks[1].date, tasks[1].created_at);
        assert!(!tasks[1].inherited);

        assert_eq!(
            tasks[2].created_at,
            NaiveDate::from_ymd_opt(2024, 4, 30).expect("valid date")
        );
        assert!(!tasks[2].inherited);

        assert!(!tasks[3].id.is_empty());

        // the repaired form was written back; reopening changes nothing
        let first_pass = fs::read(&path).expect("read migrated blob");
        let reopened = TaskStore::open_with_ids(&path, Box::new(SequentialIds::default()), today())
            .expect("reopen store");
        let second_pass = fs::read(&path).expect("read re-migrated blob");
        assert_eq!(first_pass, second_pass);
        assert_eq!(reopened.tasks(), store.tasks());
    }

    #[test]
    fn unknown_ids_leave_the_store_byte_for_byte_unchanged() {
        let temp = TempDir::new().expect("tempdir");
        let (mut store, path) = open_store(&temp);
        store
            .add_task(draft("stable", None), today())
            .expect("add task");
        let real_id = store.tasks()[0].id.clone();
        store.add_subtask(&real_id, "step").expect("add subtask");

        let disk_before = fs::read(&path).expect("read blob");
        let memory_before = serde_json::to_string(store.tasks()).expect("serialize");

        assert!(!store.toggle_task("missing").expect("toggle"));
        assert!(!store.delete_task("missing").expect("delete"));
        assert!(!store.edit_task("missing", "a", "b", "c").expect("edit"));
        assert!(!store.remove_subtask("missing", "s").expect("remove sub"));
        assert!(!store.toggle_subtask("missing", "s").expect("toggle sub"));
        assert!(!store.remove_subtask(&real_id, "missing").expect("remove sub"));
        assert!(!store
            .reorder_subtask(&real_id, "missing", "also-missing")
            .expect("reorder sub"));

        assert_eq!(fs::read(&path).expect("read blob"), disk_before);
        assert_eq!(
            serde_json::to_string(store.tasks()).expect("serialize"),
            memory_before
        );
    }

    #[test]
    fn toggle_delete_and_clear_completed() {
        let temp = TempDir::new().expect("tempdir");
        let (mut store, _path) = open_store(&temp);
        store.add_task(draft("one", None), today()).expect("add");
        store.add_task(draft("two", None), today()).expect("add");
        store.add_task(draft("three", None), today()).expect("add");
        let first = store.tasks()[0].id.clone();
        let second = store.tasks()[1].id.clone();

        assert!(store.toggle_task(&first).expect("toggle"));
        assert!(store.tasks()[0].completed);
        assert!(store.toggle_task(&first).expect("toggle"));
        assert!(!store.tasks()[0].completed);

        assert!(store.toggle_task(&second).expect("toggle"));
        assert_eq!(store.clear_completed().expect("clear"), 1);
        assert_eq!(store.tasks().len(), 2);
        assert!(store.task(&second).is_none());

        assert!(store.delete_task(&first).expect("delete"));
        assert_eq!(store.tasks().len(), 1);
    }

    #[test]
    fn edit_recomputes_display_text_from_fields() {
        let temp = TempDir::new().expect("tempdir");
        let (mut store, _path) = open_store(&temp);
        let structured = TaskDraft {
            kind: "工作".to_string(),
            object: "报告".to_string(),
            action: "提交".to_string(),
            ..TaskDraft::default()
        };
        let id = store
            .add_task(structured, today())
            .expect("add task")
            .expect("draft accepted")
            .id
            .clone();

        assert!(store.edit_task(&id, "工作", "周报", "撰写").expect("edit"));
        let edited = store.task(&id).expect("task present");
        assert_eq!(edited.text, "工作 - 周报 - 撰写");
        assert_eq!(edited.object, "周报");

        // a free-text task keeps its text when the fields are cleared
        let free_id = store
            .add_task(draft("free text task", None), today())
            .expect("add task")
            .expect("draft accepted")
            .id
            .clone();
        assert!(store.edit_task(&free_id, "", "", "").expect("edit"));
        assert_eq!(store.task(&free_id).expect("task").text, "free text task");
    }

    #[test]
    fn subtask_crud_and_reorder_round_trip() {
        let temp = TempDir::new().expect("tempdir");
        let (mut store, path) = open_store(&temp);
        let parent = TaskDraft {
            text: "parent".to_string(),
            subtasks: vec!["first".to_string(), "second".to_string()],
            ..TaskDraft::default()
        };
        let id = store
            .add_task(parent, today())
            .expect("add task")
            .expect("draft accepted")
            .id
            .clone();

        assert!(store.add_subtask(&id, "third").expect("add subtask"));
        let subs: Vec<String> = store
            .task(&id)
            .expect("task")
            .subtasks
            .iter()
            .map(|sub| sub.text.clone())
            .collect();
        assert_eq!(subs, ["first", "second", "third"]);

        let sub_ids: Vec<String> = store
            .task(&id)
            .expect("task")
            .subtasks
            .iter()
            .map(|sub| sub.id.clone())
            .collect();
        let unique: HashSet<&String> = sub_ids.iter().collect();
        assert_eq!(unique.len(), sub_ids.len());

        assert!(store
            .reorder_subtask(&id, &sub_ids[2], &sub_ids[0])
            .expect("reorder"));
        let order: Vec<String> = store
            .task(&id)
            .expect("task")
            .subtasks
            .iter()
            .map(|sub| sub.text.clone())
            .collect();
        assert_eq!(order, ["third", "first", "second"]);

        assert!(store.toggle_subtask(&id, &sub_ids[0]).expect("toggle"));
        assert!(store
            .task(&id)
            .expect("task")
            .subtask(&sub_ids[0])
            .expect("subtask")
            .completed);

        assert!(store.remove_subtask(&id, &sub_ids[1]).expect("remove"));
        assert_eq!(store.task(&id).expect("task").subtasks.len(), 2);

        let reopened = TaskStore::open(&path, today()).expect("reopen");
        assert_eq!(reopened.tasks(), store.tasks());
    }

    #[test]
    fn inherit_appends_and_reports_count() {
        let temp = TempDir::new().expect("tempdir");
        let (mut store, _path) = open_store(&temp);
        store.add_task(draft("open", None), today()).expect("add");
        store.add_task(draft("done", None), today()).expect("add");
        let done_id = store.tasks()[1].id.clone();
        store.toggle_task(&done_id).expect("toggle");

        let count = store.inherit_to_tomorrow(today()).expect("inherit");
        assert_eq!(count, 1);
        assert_eq!(store.tasks().len(), 3);

        let carried = store.tasks().last().expect("carried task");
        assert!(carried.inherited);
        assert_eq!(carried.created_at, today());
        assert_eq!(
            carried.date,
            NaiveDate::from_ymd_opt(2024, 6, 11).expect("valid date")
        );

        // carry-forward is additive: the source is still open today
        let again = store.inherit_to_tomorrow(today()).expect("inherit");
        assert_eq!(again, 1);
    }

    #[test]
    fn seed_samples_only_fills_an_empty_store() {
        let temp = TempDir::new().expect("tempdir");
        let (mut store, _path) = open_store(&temp);

        assert_eq!(store.seed_samples(today()).expect("seed"), 4);
        assert_eq!(store.seed_samples(today()).expect("seed again"), 0);
        assert_eq!(store.tasks().len(), 4);

        let carried_badge: Vec<&str> = store
            .tasks()
            .iter()
            .filter(|task| task.carried_from().is_some())
            .map(|task| task.text.as_str())
            .collect();
        assert_eq!(carried_badge, ["准备会议材料"]);
    }
}
