//! The `Status` error type.

use std::error::Error;
use std::fmt;
use std::panic::Location;
use std::sync::Arc;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

/// Field-level detail attached to a `Status`, e.g. one schema violation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub field: String,
    pub message: String,
}

impl Item {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// An error carrying an HTTP status code.
#[derive(Debug, Clone)]
pub struct Status {
    /// Source location of the constructor call.
    pub at: String,
    pub cause: Option<Arc<dyn Error + Send + Sync>>,
    pub code: StatusCode,
    /// Reason phrase for `code`, followed by the caller's message if any.
    pub message: String,
    pub items: Vec<Item>,
}

impl Status {
    #[track_caller]
    pub fn new(code: StatusCode, message: impl Into<String>) -> Self {
        Self::build(Location::caller(), None, code, &message.into(), Vec::new())
    }

    /// Status recording the error that caused it.
    #[track_caller]
    pub fn with_cause<E>(cause: E, code: StatusCode, message: impl Into<String>) -> Self
    where
        E: Error + Send + Sync + 'static,
    {
        Self::build(
            Location::caller(),
            Some(Arc::new(cause)),
            code,
            &message.into(),
            Vec::new(),
        )
    }

    /// Status with field-level items.
    #[track_caller]
    pub fn with_items(code: StatusCode, message: impl Into<String>, items: Vec<Item>) -> Self {
        Self::build(Location::caller(), None, code, &message.into(), items)
    }

    fn build(
        at: &Location<'_>,
        cause: Option<Arc<dyn Error + Send + Sync>>,
        code: StatusCode,
        message: &str,
        items: Vec<Item>,
    ) -> Self {
        let message = match (code.canonical_reason(), message.is_empty()) {
            (Some(reason), true) => reason.to_string(),
            (Some(reason), false) => format!("{reason}: {message}"),
            (None, _) => message.to_string(),
        };
        Self {
            at: format!("{}:{}:{}", at.file(), at.line(), at.column()),
            cause,
            code,
            message,
            items,
        }
    }

    /// JSON array of the items, `None` when there are none.
    pub fn render_items(&self) -> Option<Vec<u8>> {
        if self.items.is_empty() {
            return None;
        }
        serde_json::to_vec(&self.items).ok()
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Code: {}, Message: {:?}, At: {:?}, Items: {:?}",
            self.code.as_u16(),
            self.message,
            self.at,
            self.items
        )?;
        if let Some(cause) = &self.cause {
            write!(f, ", Cause: {}", cause)?;
        }
        Ok(())
    }
}

impl Error for Status {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.cause.as_deref().map(|c| c as &(dyn Error + 'static))
    }
}

/// Wire form of a `Status` response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusBody {
    pub code: u16,
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<Item>,
}

impl From<&Status> for StatusBody {
    fn from(status: &Status) -> Self {
        Self {
            code: status.code.as_u16(),
            message: status.message.clone(),
            items: status.items.clone(),
        }
    }
}

impl IntoResponse for Status {
    fn into_response(self) -> Response {
        (self.code, Json(StatusBody::from(&self))).into_response()
    }
}
