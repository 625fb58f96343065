// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Offset added to the numeric task id before it is rendered as a public id.
pub const PUBLIC_ID_OFFSET: i64 = 20000;

/// A reusable label that can be attached to many tasks.
///
/// Names are not unique at the storage level; lookups by name pick the
/// oldest matching row.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Tag {
    pub id: i64,
    pub name: String,
}

#[allow(clippy::doc_overindented_list_items)]
/// Represents a task owned by a single user.
///
/// Derivation attributes (derive):
/// - `Serialize`, `Deserialize`: Allows conversion to/from JSON.
/// - `sqlx::FromRow`: Builds a `Task` straight from a `tasks` row. The
///    `tags` field is not a column; it is filled by the selector layer
///    after the row is loaded.
#[derive(Serialize, Deserialize, Debug, Clone, sqlx::FromRow)]
pub struct Task {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub is_done: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    // Only the day matters for a deadline, so no timezone.
    pub due_date: Option<NaiveDate>,

    #[sqlx(skip)]
    #[serde(default)]
    pub tags: Vec<Tag>,
}

impl Task {
    /// Human-facing identifier, e.g. `T-4E21` for id 1.
    pub fn public_id(&self) -> String {
        format_public_id(self.id)
    }
}

pub fn format_public_id(id: i64) -> String {
    format!("T-{:X}", id + PUBLIC_ID_OFFSET)
}

/// Compact shape returned by the plain list endpoint.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct TaskSummary {
    pub id: i64,
    pub title: String,
    pub is_done: bool,
}

impl From<&Task> for TaskSummary {
    fn from(task: &Task) -> Self {
        Self {
            id: task.id,
            title: task.title.clone(),
            is_done: task.is_done,
        }
    }
}

/// Full task representation, including tags and the public id.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct TaskDetail {
    pub user: i64,
    pub id: i64,
    pub title: String,
    pub is_done: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub due_date: Option<NaiveDate>,
    pub tags: Vec<Tag>,
    pub public_id: String,
}

impl From<Task> for TaskDetail {
    fn from(task: Task) -> Self {
        let public_id = task.public_id();
        Self {
            user: task.user_id,
            id: task.id,
            title: task.title,
            is_done: task.is_done,
            created_at: task.created_at,
            updated_at: task.updated_at,
            due_date: task.due_date,
            tags: task.tags,
            public_id,
        }
    }
}

/// Aggregate completion numbers over a set of tasks.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct TaskStats {
    pub count: i64,
    pub done_count: i64,
    pub percent: f64,
}

/// Body of `POST /tasks`.
///
/// Every field is optional at the wire level so that missing values are
/// reported as field-keyed validation errors instead of a decoding failure.
/// Read-only fields such as `user` or `created_at` are ignored if sent.
#[derive(Deserialize, Debug, Default)]
pub struct CreateTaskPayload {
    pub title: Option<String>,
    pub is_done: Option<bool>,
    pub due_date: Option<NaiveDate>,
}

/// Body of `PUT`/`PATCH /tasks/{id}`.
///
/// `due_date` distinguishes "absent" (`None`) from an explicit `null`
/// (`Some(None)`), which clears the deadline.
#[derive(Deserialize, Debug, Default)]
pub struct UpdateTaskPayload {
    pub title: Option<String>,
    pub is_done: Option<bool>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub due_date: Option<Option<NaiveDate>>,
}

#[derive(Deserialize, Debug, Default)]
pub struct ChangeTitlePayload {
    pub title: Option<String>,
}

/// Body of `POST /tasks/{id}/add_tag`. Exactly one of the two must be set.
#[derive(Deserialize, Debug, Default)]
pub struct AddTagPayload {
    pub tag_id: Option<i64>,
    pub tag_name: Option<String>,
}

// Any value present in the input, including `null`, becomes `Some`.
fn deserialize_some<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Deserialize::deserialize(deserializer).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_task(id: i64) -> Task {
        let now = Utc::now();
        Task {
            id,
            user_id: 7,
            title: "Buy milk".to_string(),
            is_done: false,
            created_at: now,
            updated_at: now,
            due_date: None,
            tags: vec![Tag {
                id: 3,
                name: "home".to_string(),
            }],
        }
    }

    #[test]
    fn test_public_id_is_offset_uppercase_hex() {
        assert_eq!(format_public_id(1), "T-4E21");
        assert_eq!(format_public_id(255), "T-4F1F");
        assert_eq!(sample_task(42).public_id(), "T-4E4A");
    }

    #[test]
    fn test_detail_renames_owner_and_keeps_tags() {
        let detail = TaskDetail::from(sample_task(1));
        assert_eq!(detail.user, 7);
        assert_eq!(detail.public_id, "T-4E21");
        assert_eq!(detail.tags.len(), 1);

        let json = serde_json::to_value(&detail).unwrap();
        assert_eq!(json["user"], 7);
        assert!(json.get("user_id").is_none());
        assert!(json["due_date"].is_null());
    }

    #[test]
    fn test_update_payload_distinguishes_null_from_absent() {
        let absent: UpdateTaskPayload = serde_json::from_str(r#"{"is_done": true}"#).unwrap();
        assert_eq!(absent.due_date, None);
        assert_eq!(absent.is_done, Some(true));

        let cleared: UpdateTaskPayload = serde_json::from_str(r#"{"due_date": null}"#).unwrap();
        assert_eq!(cleared.due_date, Some(None));

        let set: UpdateTaskPayload =
            serde_json::from_str(r#"{"due_date": "2025-09-30"}"#).unwrap();
        assert_eq!(
            set.due_date,
            Some(Some(NaiveDate::from_ymd_opt(2025, 9, 30).unwrap()))
        );
    }

    #[test]
    fn test_create_payload_ignores_read_only_fields() {
        let payload: CreateTaskPayload =
            serde_json::from_str(r#"{"title": "x", "user": 99, "created_at": "nope"}"#).unwrap();
        assert_eq!(payload.title.as_deref(), Some("x"));
        assert_eq!(payload.is_done, None);
    }
}
