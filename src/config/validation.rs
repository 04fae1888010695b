//! Checks on a parsed `ServiceConfig` that TOML types cannot express.
//!
//! - The timeout and body limit must be non-zero
//! - Excluded log paths must be absolute request paths
//! - CORS methods and header names must parse as HTTP methods and header names
//! - Schema file names must be non-blank and listed once
//!
//! Every problem is reported, each tagged with the dotted path of its field.

use std::collections::HashSet;
use std::fmt;

use axum::http::{HeaderName, Method};

use crate::config::schema::ServiceConfig;

/// A single semantic problem in a config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Check a config, collecting every problem found.
pub fn validate_config(config: &ServiceConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.http.request_timeout_secs == 0 {
        errors.push(ValidationError::new("http.request_timeout_secs", "must be greater than 0"));
    }
    if config.http.body_limit_bytes == 0 {
        errors.push(ValidationError::new("http.body_limit_bytes", "must be greater than 0"));
    }
    for path in &config.http.exclude_log_paths {
        if !path.starts_with('/') {
            errors.push(ValidationError::new(
                "http.exclude_log_paths",
                format!("{path:?} must start with '/'"),
            ));
        }
    }

    for method in &config.cors.allowed_methods {
        if Method::from_bytes(method.as_bytes()).is_err() {
            errors.push(ValidationError::new(
                "cors.allowed_methods",
                format!("{method:?} is not an HTTP method"),
            ));
        }
    }
    let header_lists = [
        ("cors.allowed_headers", &config.cors.allowed_headers),
        ("cors.exposed_headers", &config.cors.exposed_headers),
    ];
    for (field, headers) in header_lists {
        for header in headers {
            if HeaderName::from_bytes(header.as_bytes()).is_err() {
                errors.push(ValidationError::new(
                    field,
                    format!("{header:?} is not a header name"),
                ));
            }
        }
    }

    let mut seen = HashSet::new();
    for file in &config.schemas.files {
        if file.trim().is_empty() {
            errors.push(ValidationError::new("schemas.files", "file name must not be empty"));
        } else if !seen.insert(file) {
            errors.push(ValidationError::new(
                "schemas.files",
                format!("{file:?} is listed more than once"),
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
