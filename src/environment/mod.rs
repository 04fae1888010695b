//! Process environment parsing.
//!
//! # Responsibilities
//! - Read service settings from environment variables
//! - Detect remote (deployed) vs local runs
//! - Record the working directory used to resolve relative files
//!
//! # Design Decisions
//! - `from_lookup` takes the variable source as a closure so parsing is pure
//! - Unset and empty variables are treated the same

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default HTTP port when `PORT` is unset.
pub const DEFAULT_PORT: u16 = 8080;

/// Errors raised while reading the environment.
#[derive(Debug, Error)]
pub enum EnvironmentError {
    #[error("Failed to parse environment variable {name}: {value:?}")]
    Parse { name: &'static str, value: String },

    #[error("Failed to get working directory: {0}")]
    WorkingDirectory(#[source] std::io::Error),
}

/// Settings shared by every service in a deployment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
    pub app: String,
    pub database_url: String,
    pub debug: bool,
    /// Running on a deployment platform rather than a developer machine.
    pub remote: bool,
    pub port: u16,
    pub working_directory: PathBuf,
}

impl Environment {
    /// Read the environment of the current process.
    pub fn new(app: &str) -> Result<Self, EnvironmentError> {
        let working_directory =
            std::env::current_dir().map_err(EnvironmentError::WorkingDirectory)?;
        Self::from_lookup(app, |name| std::env::var(name).ok(), working_directory)
    }

    /// Build an environment from an arbitrary variable source.
    pub fn from_lookup<F>(
        app: &str,
        lookup: F,
        working_directory: PathBuf,
    ) -> Result<Self, EnvironmentError>
    where
        F: Fn(&str) -> Option<String>,
    {
        tracing::debug!(app = %app, "Generating environment");

        let var = |name: &str| lookup(name).filter(|v| !v.is_empty());

        let database_url = var("DATABASE_URL").unwrap_or_default();
        let remote = var("REMOTE").is_some() || var("DYNO").is_some();

        let debug = match var("DEBUG") {
            Some(value) => parse_bool(&value).ok_or(EnvironmentError::Parse {
                name: "DEBUG",
                value,
            })?,
            None => !remote,
        };

        let port = match var("PORT") {
            Some(value) => value.parse().map_err(|_| EnvironmentError::Parse {
                name: "PORT",
                value,
            })?,
            None => DEFAULT_PORT,
        };

        let env = Self {
            app: app.to_string(),
            database_url,
            debug,
            remote,
            port,
            working_directory,
        };
        tracing::debug!(?env, "Generated environment");
        Ok(env)
    }
}

/// Boolean forms accepted for flags such as `DEBUG`.
fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Some(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Some(false),
        _ => None,
    }
}
