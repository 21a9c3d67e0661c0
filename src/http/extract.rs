use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{FromRequest, FromRequestParts};

use crate::domain::feedback::{FieldErrors, NON_FIELD_ERRORS};
use crate::http::AppError;

const DATA_ERROR_PREFIX: &str = "Failed to deserialize the JSON body into the target type: ";

/// `axum::Json` whose rejections use the field-error envelope.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct AppJson<T>(pub T);

/// `axum::extract::Path` that answers 404 when a segment does not parse.
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct AppPath<T>(pub T);

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        match rejection {
            JsonRejection::JsonDataError(err) => {
                AppError::validation(data_errors(&err.body_text()))
            }
            JsonRejection::JsonSyntaxError(err) => {
                AppError::bad_request(format!("JSON parse error - {}", err.body_text()))
            }
            JsonRejection::MissingJsonContentType(_) => AppError::unsupported_media_type(
                "Unsupported media type in request; expected \"application/json\".",
            ),
            other => AppError::bad_request(other.body_text()),
        }
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        tracing::debug!(error = %rejection, "unmatched path parameter");
        AppError::not_found("Not found.")
    }
}

/// Splits `"<field>: <serde message>"` into a field-keyed error. Errors
/// without a field path land under `non_field_errors`.
fn data_errors(body: &str) -> FieldErrors {
    let detail = body.strip_prefix(DATA_ERROR_PREFIX).unwrap_or(body);
    let mut errors = FieldErrors::new();
    match detail.split_once(": ") {
        Some((field, message)) if is_field_path(field) => {
            errors.add(field, field_message(message))
        }
        _ => errors.add(NON_FIELD_ERRORS, field_message(detail)),
    }
    errors
}

fn is_field_path(candidate: &str) -> bool {
    !candidate.is_empty()
        && candidate
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '_' || ch == '.' || ch == '[' || ch == ']')
}

fn field_message(message: &str) -> String {
    if message.contains("expected a boolean") {
        "Must be a valid boolean.".to_string()
    } else if message.contains("expected a string") {
        "Not a valid string.".to_string()
    } else {
        message.to_string()
    }
}
