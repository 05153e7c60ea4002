//! Todo payloads, persisted rows and list filters.

use chrono::{DateTime, NaiveDate, Utc};
use rocket::form::FromForm;
use rocket_db_pools::sqlx::FromRow;
use rocket_okapi::okapi::schemars::{self, JsonSchema};
use serde::{Deserialize, Serialize};

use crate::todos::{TodoError, TodoResult};

pub const DEFAULT_LIMIT: i64 = 20;
pub const MAX_LIMIT: i64 = 100;
const MIN_TITLE_CHARS: usize = 3;
const DATE_FORMAT: &str = "%Y-%m-%d";

/// A todo as stored and returned to its owner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, JsonSchema)]
pub struct Todo {
    pub id: i32,
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    pub due_date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

/// Body of create and update requests.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct TodoInput {
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    /// Due date as `YYYY-MM-DD`.
    pub due_date: String,
}

/// A validated [`TodoInput`].
#[derive(Debug, Clone, PartialEq)]
pub struct TodoDraft {
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    pub due_date: NaiveDate,
}

impl TodoInput {
    pub fn validate(self) -> TodoResult<TodoDraft> {
        let mut errors = Vec::new();

        let title = self.title.trim().to_string();
        if title.is_empty() {
            errors.push("Field 'title' is required".to_string());
        } else if title.chars().count() < MIN_TITLE_CHARS {
            errors.push(format!(
                "Field 'title' must be at least {MIN_TITLE_CHARS} characters"
            ));
        }

        let description = self.description.trim().to_string();
        if description.is_empty() {
            errors.push("Field 'description' is required".to_string());
        }

        let tags: Vec<String> = self.tags.iter().map(|tag| tag.trim().to_string()).collect();
        if tags.is_empty() {
            errors.push("Field 'tags' is required".to_string());
        } else if tags.iter().any(String::is_empty) {
            errors.push("Field 'tags' must not contain empty values".to_string());
        }

        let due_date = match parse_date(&self.due_date) {
            Some(date) => Some(date),
            None if self.due_date.trim().is_empty() => {
                errors.push("Field 'due_date' is required".to_string());
                None
            }
            None => {
                errors.push("Field 'due_date' must be a date in YYYY-MM-DD format".to_string());
                None
            }
        };

        match due_date {
            Some(due_date) if errors.is_empty() => Ok(TodoDraft {
                title,
                description,
                tags,
                due_date,
            }),
            _ => Err(TodoError::Validation(errors)),
        }
    }
}

/// Query string accepted by the list endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize, FromForm, JsonSchema)]
pub struct TodoQuery {
    /// Page size, 1 to 100 (default 20).
    pub limit: Option<i64>,
    /// Rows to skip (default 0).
    pub offset: Option<i64>,
    /// Exact due date, `YYYY-MM-DD`.
    pub due_date: Option<String>,
    /// Comma-separated tags; a todo matches when it carries any of them.
    pub tags: Option<String>,
}

/// Normalized list filter handed to a [`crate::todos::TodoStore`].
#[derive(Debug, Clone, PartialEq)]
pub struct TodoFilter {
    pub limit: i64,
    pub offset: i64,
    pub due_date: Option<NaiveDate>,
    pub tags: Vec<String>,
}

impl Default for TodoFilter {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            offset: 0,
            due_date: None,
            tags: Vec::new(),
        }
    }
}

impl TodoQuery {
    pub fn into_filter(self) -> TodoResult<TodoFilter> {
        let mut errors = Vec::new();

        let limit = self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);

        let offset = self.offset.unwrap_or(0);
        if offset < 0 {
            errors.push("Query 'offset' must not be negative".to_string());
        }

        let due_date = match self.due_date.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => {
                let parsed = parse_date(raw);
                if parsed.is_none() {
                    errors.push("Query 'due_date' must be a date in YYYY-MM-DD format".to_string());
                }
                parsed
            }
        };

        let tags = self
            .tags
            .as_deref()
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|tag| !tag.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        if errors.is_empty() {
            Ok(TodoFilter {
                limit,
                offset,
                due_date,
                tags,
            })
        } else {
            Err(TodoError::Validation(errors))
        }
    }
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(title: &str, description: &str, tags: &[&str], due_date: &str) -> TodoInput {
        TodoInput {
            title: title.to_string(),
            description: description.to_string(),
            tags: tags.iter().map(|tag| tag.to_string()).collect(),
            due_date: due_date.to_string(),
        }
    }

    #[test]
    fn accepts_complete_input() {
        let draft = input(" Buy milk ", "two litres", &["home", " errands"], "2026-11-02")
            .validate()
            .expect("valid todo");
        assert_eq!(draft.title, "Buy milk");
        assert_eq!(draft.tags, vec!["home", "errands"]);
        assert_eq!(draft.due_date, NaiveDate::from_ymd_opt(2026, 11, 2).unwrap());
    }

    #[test]
    fn reports_every_failure() {
        let err = input("ab", "", &[], "02/11/2026").validate().unwrap_err();
        let TodoError::Validation(errors) = err else {
            panic!("expected validation error");
        };
        assert_eq!(
            errors,
            vec![
                "Field 'title' must be at least 3 characters",
                "Field 'description' is required",
                "Field 'tags' is required",
                "Field 'due_date' must be a date in YYYY-MM-DD format",
            ]
        );
    }

    #[test]
    fn rejects_blank_tags() {
        let err = input("Buy milk", "two litres", &["home", "  "], "2026-11-02")
            .validate()
            .unwrap_err();
        assert!(matches!(err, TodoError::Validation(errors) if errors.len() == 1));
    }

    #[test]
    fn query_defaults_and_clamps() {
        assert_eq!(
            <TodoQuery as Default>::default().into_filter().unwrap(),
            TodoFilter::default()
        );

        let filter = TodoQuery {
            limit: Some(500),
            ..Default::default()
        }
        .into_filter()
        .unwrap();
        assert_eq!(filter.limit, MAX_LIMIT);

        let filter = TodoQuery {
            limit: Some(0),
            ..Default::default()
        }
        .into_filter()
        .unwrap();
        assert_eq!(filter.limit, 1);
    }

    #[test]
    fn query_rejects_negative_offset_and_bad_date() {
        let err = TodoQuery {
            offset: Some(-1),
            due_date: Some("tomorrow".into()),
            ..Default::default()
        }
        .into_filter()
        .unwrap_err();
        assert!(matches!(err, TodoError::Validation(errors) if errors.len() == 2));
    }

    #[test]
    fn query_splits_tags() {
        let filter = TodoQuery {
            tags: Some("work, home,,".into()),
            due_date: Some("2026-11-02".into()),
            ..Default::default()
        }
        .into_filter()
        .unwrap();
        assert_eq!(filter.tags, vec!["work", "home"]);
        assert_eq!(filter.due_date, NaiveDate::from_ymd_opt(2026, 11, 2));
    }
}
