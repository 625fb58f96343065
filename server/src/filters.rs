// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use chrono::NaiveDate;
use serde::Deserialize;

use crate::validation::ValidationErrors;

/// Raw query string of the task list endpoints, e.g.
/// `?is_done=true&tags__id=3&due_from=2025-09-01&due_to=2025-09-30&search=milk&ordering=-due_date`.
///
/// Values stay as strings here so bad input can be reported per field.
#[derive(Deserialize, Debug, Default)]
pub struct TaskListParams {
    pub is_done: Option<String>,
    #[serde(rename = "tags__id")]
    pub tag_id: Option<String>,
    pub due_from: Option<String>,
    pub due_to: Option<String>,
    pub search: Option<String>,
    pub ordering: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderField {
    Id,
    DueDate,
    CreatedAt,
}

impl OrderField {
    fn column(self) -> &'static str {
        match self {
            OrderField::Id => "t.id",
            OrderField::DueDate => "t.due_date",
            OrderField::CreatedAt => "t.created_at",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderingTerm {
    pub field: OrderField,
    pub descending: bool,
}

impl OrderingTerm {
    /// Parses `id`, `-id`, `due_date`, `-due_date`, `created_at` or `-created_at`.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        let (descending, name) = match raw.strip_prefix('-') {
            Some(name) => (true, name),
            None => (false, raw),
        };
        let field = match name {
            "id" => OrderField::Id,
            "due_date" => OrderField::DueDate,
            "created_at" => OrderField::CreatedAt,
            _ => return None,
        };
        Some(Self { field, descending })
    }

    fn to_sql(self) -> String {
        let direction = if self.descending { "DESC" } else { "ASC" };
        format!("{} {}", self.field.column(), direction)
    }
}

/// Validated filters applied on top of the owner-scoped task set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskFilter {
    pub is_done: Option<bool>,
    pub tag_id: Option<i64>,
    pub due_from: Option<NaiveDate>,
    pub due_to: Option<NaiveDate>,
    pub search_terms: Vec<String>,
    pub ordering: Vec<OrderingTerm>,
}

impl TaskFilter {
    /// True when every search term appears in `title`, ignoring case.
    pub fn matches_search(&self, title: &str) -> bool {
        let title = title.to_lowercase();
        self.search_terms
            .iter()
            .all(|term| title.contains(&term.to_lowercase()))
    }

    /// `ORDER BY` body. Defaults to newest first; `t.id DESC` breaks ties.
    pub fn order_by_sql(&self) -> String {
        if self.ordering.is_empty() {
            return OrderingTerm {
                field: OrderField::Id,
                descending: true,
            }
            .to_sql();
        }

        let mut parts: Vec<String> = self.ordering.iter().map(|term| term.to_sql()).collect();
        if !self.ordering.iter().any(|term| term.field == OrderField::Id) {
            parts.push("t.id DESC".to_string());
        }
        parts.join(", ")
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw {
        "true" | "True" | "1" => Some(true),
        "false" | "False" | "0" => Some(false),
        _ => None,
    }
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()
}

impl TryFrom<TaskListParams> for TaskFilter {
    type Error = ValidationErrors;

    fn try_from(params: TaskListParams) -> Result<Self, Self::Error> {
        let mut errors = ValidationErrors::default();
        let mut filter = TaskFilter::default();

        if let Some(raw) = non_empty(&params.is_done) {
            match parse_bool(raw) {
                Some(value) => filter.is_done = Some(value),
                None => errors.add("is_done", "Enter a valid boolean."),
            }
        }

        if let Some(raw) = non_empty(&params.tag_id) {
            match raw.parse::<i64>() {
                Ok(value) => filter.tag_id = Some(value),
                Err(_) => errors.add("tags__id", "Enter a whole number."),
            }
        }

        for (field, raw, slot) in [
            ("due_from", non_empty(&params.due_from), &mut filter.due_from),
            ("due_to", non_empty(&params.due_to), &mut filter.due_to),
        ] {
            if let Some(raw) = raw {
                match parse_date(raw) {
                    Some(date) => *slot = Some(date),
                    None => errors.add(field, "Enter a valid date."),
                }
            }
        }

        if let Some(raw) = non_empty(&params.search) {
            filter.search_terms = raw.split_whitespace().map(str::to_string).collect();
        }

        // Unknown ordering fields are dropped rather than rejected.
        if let Some(raw) = non_empty(&params.ordering) {
            filter.ordering = raw.split(',').filter_map(OrderingTerm::parse).collect();
        }

        if errors.is_empty() {
            Ok(filter)
        } else {
            Err(errors)
        }
    }
}
