use chrono::NaiveDateTime;
use clear_shared::{STATUS_DONE, STATUS_IN_PROGRESS, TodoRecord};
use serde::{Deserialize, Serialize};

/// Label shown for tasks without a (known) category.
pub const DEFAULT_CATEGORY_NAME: &str = "Default";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Task {
    pub id: String,
    pub title: String,
    pub content: String,
    pub category: String,
    pub category_id: Option<String>,
    pub due_date: Option<String>,
    pub completed: bool,
    pub created_at: String,
}

impl Task {
    /// Normalizes a backend record. `fallback_id`/`now` fill the fields the
    /// backend may omit.
    pub fn from_record(record: TodoRecord, fallback_id: &str, now: &str) -> Self {
        Self {
            id: record
                .id
                .filter(|id| !id.is_empty())
                .unwrap_or_else(|| fallback_id.to_string()),
            title: record.title.unwrap_or_default(),
            content: record.content.unwrap_or_default(),
            category: record
                .category_name
                .filter(|name| !name.is_empty())
                .unwrap_or_else(|| DEFAULT_CATEGORY_NAME.to_string()),
            category_id: normalize_category_id(record.category_id),
            due_date: record.due_date.filter(|due| !due.is_empty()),
            completed: record.status == Some(STATUS_DONE),
            created_at: record
                .created_at
                .filter(|ts| !ts.is_empty())
                .unwrap_or_else(|| now.to_string()),
        }
    }

    pub fn is_uncategorized(&self) -> bool {
        self.category_id.is_none()
    }
}

/// A task about to be created.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskDraft {
    pub title: String,
    pub content: String,
    pub category: Option<String>,
    pub category_id: Option<String>,
    pub due_date: Option<NaiveDateTime>,
}

/// Partial edit of a task. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub content: Option<String>,
    pub category_id: Option<String>,
    /// Display name for `category_id`; local only, never sent.
    pub category: Option<String>,
    pub due_date: Option<NaiveDateTime>,
    pub completed: Option<bool>,
}

impl TaskPatch {
    pub fn completion(completed: bool) -> Self {
        Self {
            completed: Some(completed),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// True when the patch changes nothing but the completion flag.
    pub fn is_completion_only(&self) -> bool {
        self.completed.is_some()
            && Self {
                completed: None,
                ..self.clone()
            }
            .is_empty()
    }

    pub fn apply_to(&self, task: &mut Task) {
        if let Some(title) = &self.title {
            task.title = title.clone();
        }
        if let Some(content) = &self.content {
            task.content = content.clone();
        }
        if let Some(category_id) = &self.category_id {
            task.category_id = normalize_category_id(Some(category_id.clone()));
        }
        if let Some(category) = &self.category {
            task.category = category.clone();
        }
        if let Some(due) = self.due_date {
            task.due_date = Some(crate::datetime::format_due_date(due));
        }
        if let Some(completed) = self.completed {
            task.completed = completed;
        }
    }
}

pub fn status_code(completed: bool) -> i64 {
    if completed {
        STATUS_DONE
    } else {
        STATUS_IN_PROGRESS
    }
}

fn normalize_category_id(raw: Option<String>) -> Option<String> {
    raw.filter(|id| !id.is_empty() && id != "0")
}
