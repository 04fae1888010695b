//! Error and status modeling.
//!
//! # Responsibilities
//! - Model HTTP-facing errors (`Status`) with code, message, cause and items
//! - Inspect arbitrary errors for an embedded `Status`
//!
//! # Design Decisions
//! - Module errors are `thiserror` enums; a `Status` rides inside them as a
//!   `#[source]` so the chain walk below can find it
//! - Anything without a `Status` in its chain renders as 500

mod status;

pub use status::{Item, Status, StatusBody};

use std::error::Error;

use axum::http::StatusCode;

/// Find the first `Status` in `err` or its source chain.
pub fn find_status<'a>(err: &'a (dyn Error + 'static)) -> Option<&'a Status> {
    let mut current = Some(err);
    while let Some(e) = current {
        if let Some(status) = e.downcast_ref::<Status>() {
            return Some(status);
        }
        current = e.source();
    }
    None
}

/// HTTP status code of the first `Status` in the chain, if any.
pub fn status_code(err: &(dyn Error + 'static)) -> Option<StatusCode> {
    find_status(err).map(|s| s.code)
}

/// Whether the error chain contains a `Status`.
pub fn is_status(err: &(dyn Error + 'static)) -> bool {
    find_status(err).is_some()
}

/// Build a [`Status`] with a formatted message.
///
/// ```
/// use axum::http::StatusCode;
/// let s = service_commons::status!(StatusCode::NOT_FOUND, "user {} missing", 7);
/// assert_eq!(s.message, "Not Found: user 7 missing");
/// ```
#[macro_export]
macro_rules! status {
    ($code:expr, $($arg:tt)+) => {
        $crate::errors::Status::new($code, format!($($arg)+))
    };
}
