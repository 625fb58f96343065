// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
//! Input validation for task payloads.
//!
//! Field-level rules run first. The completion/due-date rule only runs once
//! every field is individually valid, and it is checked against the merged
//! candidate state (payload values over the stored task).
use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use common::{AddTagPayload, ChangeTitlePayload, CreateTaskPayload, Task, UpdateTaskPayload};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::services::TagRef;

pub const TITLE_MAX_CHARS: usize = 120;
pub const TAG_NAME_MAX_CHARS: usize = 100;
pub const NON_FIELD_ERRORS: &str = "non_field_errors";

const REQUIRED: &str = "This field is required.";
const INVALID_STRING: &str = "Not a valid string.";
const INVALID_BOOLEAN: &str = "Must be a valid boolean.";
const INVALID_INTEGER: &str = "A valid integer is required.";
const INVALID_DATE: &str = "Date has wrong format. Use one of these formats instead: YYYY-MM-DD.";

/// Messages keyed by the offending field name.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(BTreeMap<String, Vec<String>>);

impl ValidationErrors {
    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::default();
        errors.add(field, message);
        errors
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn field(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .0
            .iter()
            .map(|(field, messages)| format!("{}: {}", field, messages.join(", ")))
            .collect();
        write!(f, "{}", parts.join("; "))
    }
}

/// A JSON object body read one field at a time, so a badly typed value is
/// reported under its own key instead of failing the whole body.
struct BodyFields {
    map: Map<String, Value>,
    errors: ValidationErrors,
}

impl BodyFields {
    fn new(body: Value) -> Result<Self, ValidationErrors> {
        match body {
            Value::Object(map) => Ok(Self {
                map,
                errors: ValidationErrors::default(),
            }),
            other => Err(ValidationErrors::single(
                NON_FIELD_ERRORS,
                format!(
                    "Invalid data. Expected a dictionary, but got {}.",
                    json_kind(&other)
                ),
            )),
        }
    }

    /// Absent and `null` both read as `None`.
    fn optional<T: DeserializeOwned>(&mut self, field: &str, message: &str) -> Option<T> {
        self.nullable(field, message).flatten()
    }

    /// `None` when absent, `Some(None)` for an explicit `null`.
    fn nullable<T: DeserializeOwned>(&mut self, field: &str, message: &str) -> Option<Option<T>> {
        match self.map.remove(field)? {
            Value::Null => Some(None),
            value => match serde_json::from_value(value) {
                Ok(parsed) => Some(Some(parsed)),
                Err(_) => {
                    self.errors.add(field, message);
                    None
                }
            },
        }
    }

    fn finish<P>(self, payload: P) -> Result<P, ValidationErrors> {
        self.errors.into_result().map(|()| payload)
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "str",
        Value::Array(_) => "list",
        Value::Object(_) => "dict",
    }
}

pub fn create_payload(body: Value) -> Result<CreateTaskPayload, ValidationErrors> {
    let mut fields = BodyFields::new(body)?;
    let payload = CreateTaskPayload {
        title: fields.optional("title", INVALID_STRING),
        is_done: fields.optional("is_done", INVALID_BOOLEAN),
        due_date: fields.optional("due_date", INVALID_DATE),
    };
    fields.finish(payload)
}

pub fn update_payload(body: Value) -> Result<UpdateTaskPayload, ValidationErrors> {
    let mut fields = BodyFields::new(body)?;
    let payload = UpdateTaskPayload {
        title: fields.optional("title", INVALID_STRING),
        is_done: fields.optional("is_done", INVALID_BOOLEAN),
        due_date: fields.nullable("due_date", INVALID_DATE),
    };
    fields.finish(payload)
}

pub fn change_title_payload(body: Value) -> Result<ChangeTitlePayload, ValidationErrors> {
    let mut fields = BodyFields::new(body)?;
    let payload = ChangeTitlePayload {
        title: fields.optional("title", INVALID_STRING),
    };
    fields.finish(payload)
}

pub fn add_tag_payload(body: Value) -> Result<AddTagPayload, ValidationErrors> {
    let mut fields = BodyFields::new(body)?;
    let payload = AddTagPayload {
        tag_id: fields.optional("tag_id", INVALID_INTEGER),
        tag_name: fields.optional("tag_name", INVALID_STRING),
    };
    fields.finish(payload)
}

/// A validated task ready to be inserted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTask {
    pub title: String,
    pub is_done: bool,
    pub due_date: Option<NaiveDate>,
}

/// The complete state a task will have after an update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskChanges {
    pub title: String,
    pub is_done: bool,
    pub due_date: Option<NaiveDate>,
}

/// Trims the title and enforces the non-empty and length rules.
pub fn clean_title(raw: &str) -> Result<String, String> {
    let title = raw.trim();
    if title.is_empty() {
        return Err("Task title can't be empty".to_string());
    }
    if title.chars().count() > TITLE_MAX_CHARS {
        return Err(format!(
            "Task title can't be longer than {} characters",
            TITLE_MAX_CHARS
        ));
    }
    Ok(title.to_string())
}

fn check_completion(is_done: bool, due_date: Option<NaiveDate>, errors: &mut ValidationErrors) {
    if is_done && due_date.is_none() {
        errors.add("due_date", "Required if task is completed");
    }
}

fn required_title(raw: Option<&str>, errors: &mut ValidationErrors) -> Option<String> {
    match raw {
        None => {
            errors.add("title", REQUIRED);
            None
        }
        Some(raw) => clean_title(raw).map_err(|msg| errors.add("title", msg)).ok(),
    }
}

pub fn validate_create(payload: CreateTaskPayload) -> Result<NewTask, ValidationErrors> {
    let mut errors = ValidationErrors::default();
    let title = required_title(payload.title.as_deref(), &mut errors);
    errors.into_result()?;

    let is_done = payload.is_done.unwrap_or(false);
    let mut errors = ValidationErrors::default();
    check_completion(is_done, payload.due_date, &mut errors);
    errors.into_result()?;

    Ok(NewTask {
        title: title.unwrap_or_default(),
        is_done,
        due_date: payload.due_date,
    })
}

/// Validates a `PUT` (`partial == false`) or `PATCH` body against `task`.
///
/// A full update requires `title` and resets a missing `is_done` to false;
/// `due_date` is never required, an absent value keeps the stored one.
pub fn validate_update(
    task: &Task,
    payload: UpdateTaskPayload,
    partial: bool,
) -> Result<TaskChanges, ValidationErrors> {
    let mut errors = ValidationErrors::default();
    let title = match payload.title.as_deref() {
        None if partial => Some(task.title.clone()),
        raw => required_title(raw, &mut errors),
    };
    errors.into_result()?;

    let is_done = match payload.is_done {
        Some(value) => value,
        None if partial => task.is_done,
        None => false,
    };
    let due_date = payload.due_date.unwrap_or(task.due_date);

    let mut errors = ValidationErrors::default();
    check_completion(is_done, due_date, &mut errors);
    errors.into_result()?;

    Ok(TaskChanges {
        title: title.unwrap_or_default(),
        is_done,
        due_date,
    })
}

pub fn validate_change_title(payload: ChangeTitlePayload) -> Result<String, ValidationErrors> {
    let mut errors = ValidationErrors::default();
    let title = required_title(payload.title.as_deref(), &mut errors);
    errors.into_result()?;
    Ok(title.unwrap_or_default())
}

/// Checks that marking `task` complete keeps the due-date rule.
pub fn validate_complete(task: &Task) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::default();
    check_completion(true, task.due_date, &mut errors);
    errors.into_result()
}

pub fn validate_add_tag(payload: AddTagPayload) -> Result<TagRef, ValidationErrors> {
    let tag_name = payload
        .tag_name
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty());

    match (payload.tag_id, tag_name) {
        (None, None) => Err(ValidationErrors::single(
            NON_FIELD_ERRORS,
            "Provide either 'tag_id' or 'tag_name'.",
        )),
        (Some(_), Some(_)) => Err(ValidationErrors::single(
            NON_FIELD_ERRORS,
            "Use only one of: 'tag_id' or 'tag_name'.",
        )),
        (Some(tag_id), None) => Ok(TagRef::Id(tag_id)),
        (None, Some(name)) if name.chars().count() > TAG_NAME_MAX_CHARS => {
            Err(ValidationErrors::single(
                "tag_name",
                format!(
                    "Ensure this field has no more than {} characters.",
                    TAG_NAME_MAX_CHARS
                ),
            ))
        }
        (None, Some(name)) => Ok(TagRef::Name(name.to_string())),
    }
}
