use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

pub const TITLE_MAX_CHARS: usize = 200;
pub const CONTENT_MAX_CHARS: usize = 10_000;

/// Canonical feedback record as held by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct Feedback {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub is_reviewed: bool,
    pub created_at: OffsetDateTime,
    pub reviewed_at: Option<OffsetDateTime>,
}

impl Feedback {
    /// Applies a moderation patch. `reviewed_at` follows `is_reviewed`: it is
    /// stamped with `now` on a false->true flip and cleared on true->false.
    /// Re-sending the current value leaves the stamp untouched.
    pub fn apply(&mut self, patch: &FeedbackPatch, now: OffsetDateTime) {
        if let Some(title) = &patch.title {
            self.title = title.clone();
        }
        if let Some(content) = &patch.content {
            self.content = content.clone();
        }
        if let Some(reviewed) = patch.is_reviewed {
            if reviewed && !self.is_reviewed {
                self.reviewed_at = Some(now);
            } else if !reviewed && self.is_reviewed {
                self.reviewed_at = None;
            }
            self.is_reviewed = reviewed;
        }
    }
}

/// Fields exposed to anonymous callers.
#[derive(Debug, Clone, Serialize)]
pub struct PublicFeedback {
    pub id: i64,
    pub title: String,
    pub content: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<Feedback> for PublicFeedback {
    fn from(feedback: Feedback) -> Self {
        Self {
            id: feedback.id,
            title: feedback.title,
            content: feedback.content,
            created_at: feedback.created_at,
        }
    }
}

/// Fields exposed to staff.
#[derive(Debug, Clone, Serialize)]
pub struct AdminFeedback {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub is_reviewed: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub reviewed_at: Option<OffsetDateTime>,
}

impl From<Feedback> for AdminFeedback {
    fn from(feedback: Feedback) -> Self {
        Self {
            id: feedback.id,
            title: feedback.title,
            content: feedback.content,
            is_reviewed: feedback.is_reviewed,
            created_at: feedback.created_at,
            reviewed_at: feedback.reviewed_at,
        }
    }
}

/// A validated submission, ready to insert.
#[derive(Debug, Clone, PartialEq)]
pub struct NewFeedback {
    pub title: String,
    pub content: String,
}

/// A validated moderation patch. `None` leaves the field as it is.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedbackPatch {
    pub title: Option<String>,
    pub content: Option<String>,
    pub is_reviewed: Option<bool>,
}

impl FeedbackPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.content.is_none() && self.is_reviewed.is_none()
    }
}

/// Admin list filter; `is_reviewed` and `search` combine with AND.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedbackFilter {
    pub is_reviewed: Option<bool>,
    pub search: Option<String>,
}

impl FeedbackFilter {
    pub fn reviewed_only() -> Self {
        Self {
            is_reviewed: Some(true),
            search: None,
        }
    }

    pub fn matches(&self, feedback: &Feedback) -> bool {
        if let Some(reviewed) = self.is_reviewed {
            if feedback.is_reviewed != reviewed {
                return false;
            }
        }
        match &self.search {
            Some(term) => {
                let term = term.to_lowercase();
                feedback.title.to_lowercase().contains(&term)
                    || feedback.content.to_lowercase().contains(&term)
            }
            None => true,
        }
    }
}

/// Field-keyed validation messages, serialized as `{"field": ["msg", ...]}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    pub fn into_result<T>(self, value: T) -> Result<T, FieldErrors> {
        if self.is_empty() {
            Ok(value)
        } else {
            Err(self)
        }
    }
}

pub const REQUIRED: &str = "This field is required.";
pub const BLANK: &str = "This field may not be blank.";
pub const NON_FIELD_ERRORS: &str = "non_field_errors";

fn too_long(max: usize) -> String {
    format!("Ensure this field has no more than {} characters.", max)
}

fn check_text(
    errors: &mut FieldErrors,
    field: &str,
    value: Option<&str>,
    max: usize,
    required: bool,
) -> Option<String> {
    match value {
        None => {
            if required {
                errors.add(field, REQUIRED);
            }
            None
        }
        Some(value) if value.trim().is_empty() => {
            errors.add(field, BLANK);
            None
        }
        Some(value) if value.chars().count() > max => {
            errors.add(field, too_long(max));
            None
        }
        Some(value) => Some(value.to_string()),
    }
}

pub fn validate_submission(
    title: Option<&str>,
    content: Option<&str>,
) -> Result<NewFeedback, FieldErrors> {
    let mut errors = FieldErrors::new();
    let title = check_text(&mut errors, "title", title, TITLE_MAX_CHARS, true);
    let content = check_text(&mut errors, "content", content, CONTENT_MAX_CHARS, true);

    match (title, content) {
        (Some(title), Some(content)) => errors.into_result(NewFeedback { title, content }),
        _ => Err(errors),
    }
}

pub fn validate_patch(
    title: Option<&str>,
    content: Option<&str>,
    is_reviewed: Option<bool>,
) -> Result<FeedbackPatch, FieldErrors> {
    let mut errors = FieldErrors::new();
    let patch = FeedbackPatch {
        title: check_text(&mut errors, "title", title, TITLE_MAX_CHARS, false),
        content: check_text(&mut errors, "content", content, CONTENT_MAX_CHARS, false),
        is_reviewed,
    };
    errors.into_result(patch)
}
