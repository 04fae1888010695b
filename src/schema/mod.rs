//! JSON schema loading and validation.
//!
//! # Data Flow
//! ```text
//! SchemaConfig.files
//!     → Client::new (one task per file, joined before returning)
//!     → compiled validators keyed by file name
//!     → Client::validate (request body bytes)
//!     → Ok(()) or Status 400 with one item per violation
//! ```
//!
//! # Design Decisions
//! - All loads run to completion even when one fails, so every broken file
//!   is reported in a single start up
//! - Files resolve against the environment's working directory
//! - Asking for a schema that was never loaded is a programming error and is
//!   not a `Status`; it renders as 500

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use axum::http::StatusCode;
use jsonschema::Validator;
use thiserror::Error;
use tokio::task::JoinSet;

use crate::context::Context;
use crate::environment::Environment;
use crate::errors::{Item, Status};
use crate::log::{Client as LogClient, Field};

/// Message of the status returned for an empty body.
pub const BODY_MUST_EXIST: &str = "BODY_MUST_EXIST";

/// Field name used for violations at the document root.
const ROOT_FIELD: &str = "(root)";

/// Reasons a schema file could not be loaded.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Failed to read schema file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Schema file is not JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid schema: {0}")]
    Invalid(String),
}

/// Errors from the schema client.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("Failed to load schema {file:?} from file: {source}")]
    Load {
        file: String,
        #[source]
        source: LoadError,
    },

    #[error("Schema loading task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("Schema {0:?} not loaded")]
    NotLoaded(String),

    #[error("{0}")]
    Status(#[from] Status),
}

/// Holds compiled validators for a fixed set of schema files.
pub struct Client {
    validators: HashMap<String, Validator>,
    log: Arc<dyn LogClient>,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut loaded: Vec<&String> = self.validators.keys().collect();
        loaded.sort();
        f.debug_struct("Client").field("loaded", &loaded).finish()
    }
}

impl Client {
    /// Load and compile every schema file concurrently.
    pub async fn new(
        ctx: &Context,
        env: &Environment,
        log: Arc<dyn LogClient>,
        file_names: &[String],
    ) -> Result<Self, SchemaError> {
        log.info(
            ctx,
            "Initializing",
            &[
                Field::any("env", env),
                Field::strings("schema_file_names", file_names),
            ],
        );

        let mut tasks = JoinSet::new();
        for (index, file_name) in file_names.iter().enumerate() {
            let file_name = file_name.clone();
            let path = env.working_directory.join(&file_name);
            let ctx = ctx.clone();
            let log = Arc::clone(&log);
            tasks.spawn(async move {
                log.info(&ctx, "Loading", &[Field::string("schema_file_name", &file_name)]);
                let result = load_schema(&path).await;
                if result.is_ok() {
                    log.info(&ctx, "Loaded", &[Field::string("schema_file_name", &file_name)]);
                }
                (index, file_name, result)
            });
        }

        let mut validators = HashMap::with_capacity(file_names.len());
        let mut failures = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            let (index, file, result) = joined?;
            match result {
                Ok(validator) => {
                    validators.insert(file, validator);
                }
                Err(source) => {
                    let err = SchemaError::Load { file, source };
                    log.error(
                        ctx,
                        "Failed to load schema from file, will check others and return an error",
                        &[Field::error(&err)],
                    );
                    failures.push((index, err));
                }
            }
        }

        if let Some((_, err)) = failures.into_iter().min_by_key(|(index, _)| *index) {
            return Err(err);
        }

        log.info(ctx, "Initialized", &[]);
        Ok(Self { validators, log })
    }

    /// Whether a schema with this file name was loaded.
    pub fn is_loaded(&self, schema_file_name: &str) -> bool {
        self.validators.contains_key(schema_file_name)
    }

    /// Validate a JSON document against a loaded schema.
    pub fn validate(
        &self,
        ctx: &Context,
        schema_file_name: &str,
        bytes: &[u8],
    ) -> Result<(), SchemaError> {
        self.log.info(
            ctx,
            "Validating",
            &[
                Field::string("schema_file_name", schema_file_name),
                Field::int("length", bytes.len() as i64),
            ],
        );

        if bytes.is_empty() {
            return Err(Status::new(StatusCode::BAD_REQUEST, BODY_MUST_EXIST).into());
        }

        let validator = self
            .validators
            .get(schema_file_name)
            .ok_or_else(|| SchemaError::NotLoaded(schema_file_name.to_string()))?;

        let instance: serde_json::Value = serde_json::from_slice(bytes)
            .map_err(|e| Status::new(StatusCode::BAD_REQUEST, e.to_string()))?;

        let items: Vec<Item> = validator
            .iter_errors(&instance)
            .map(|e| Item::new(field_path(&e.instance_path.to_string()), e.to_string()))
            .collect();
        if !items.is_empty() {
            return Err(
                Status::with_items(StatusCode::BAD_REQUEST, "Failed schema validation", items)
                    .into(),
            );
        }

        self.log.info(ctx, "Validated", &[]);
        Ok(())
    }
}

async fn load_schema(path: &Path) -> Result<Validator, LoadError> {
    let raw = tokio::fs::read(path).await?;
    let schema: serde_json::Value = serde_json::from_slice(&raw)?;
    jsonschema::validator_for(&schema).map_err(|e| LoadError::Invalid(e.to_string()))
}

/// Convert a JSON pointer such as `/tags/0` into `tags.0`.
fn field_path(pointer: &str) -> String {
    let segments: Vec<String> = pointer
        .split('/')
        .skip(1)
        .map(|s| s.replace("~1", "/").replace("~0", "~"))
        .collect();
    if segments.is_empty() {
        ROOT_FIELD.to_string()
    } else {
        segments.join(".")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors;
    use crate::log::mock::{NoopClient, RecordingClient};

    const PERSON: &str = r#"{
        "type": "object",
        "required": ["name"],
        "properties": {
            "name": {"type": "string"},
            "tags": {"type": "array", "items": {"type": "string"}}
        }
    }"#;

    fn env_in(dir: &Path) -> Environment {
        Environment {
            app: "test".to_string(),
            working_directory: dir.to_path_buf(),
            ..Default::default()
        }
    }

    async fn person_client() -> (tempfile::TempDir, Client) {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("person.json"), PERSON).unwrap();
        let client = Client::new(
            &crate::context::start_up(),
            &env_in(dir.path()),
            Arc::new(NoopClient),
            &["person.json".to_string()],
        )
        .await
        .unwrap();
        (dir, client)
    }

    fn status_of(err: &SchemaError) -> &Status {
        errors::find_status(err).unwrap()
    }

    #[test]
    fn test_field_path() {
        assert_eq!(field_path(""), "(root)");
        assert_eq!(field_path("/name"), "name");
        assert_eq!(field_path("/tags/0"), "tags.0");
        assert_eq!(field_path("/a~1b/c~0d"), "a/b.c~d");
    }

    #[tokio::test]
    async fn test_load_and_validate() {
        let (_dir, client) = person_client().await;
        assert!(client.is_loaded("person.json"));

        let ctx = crate::context::background();
        client
            .validate(&ctx, "person.json", br#"{"name":"Ada","tags":["x"]}"#)
            .unwrap();
    }

    #[tokio::test]
    async fn test_validate_empty_body() {
        let (_dir, client) = person_client().await;
        let err = client
            .validate(&crate::context::background(), "person.json", b"")
            .unwrap_err();
        let status = status_of(&err);
        assert_eq!(status.code, StatusCode::BAD_REQUEST);
        assert_eq!(status.message, "Bad Request: BODY_MUST_EXIST");
    }

    #[tokio::test]
    async fn test_validate_unknown_schema() {
        let (_dir, client) = person_client().await;
        let err = client
            .validate(&crate::context::background(), "other.json", b"{}")
            .unwrap_err();
        assert!(matches!(err, SchemaError::NotLoaded(ref name) if name == "other.json"));
        assert!(!errors::is_status(&err));
    }

    #[tokio::test]
    async fn test_validate_malformed_json() {
        let (_dir, client) = person_client().await;
        let err = client
            .validate(&crate::context::background(), "person.json", b"{not json")
            .unwrap_err();
        assert_eq!(status_of(&err).code, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_validate_reports_items() {
        let (_dir, client) = person_client().await;
        let ctx = crate::context::background();

        let err = client
            .validate(&ctx, "person.json", br#"{"tags":[1]}"#)
            .unwrap_err();
        let status = status_of(&err);
        assert_eq!(status.code, StatusCode::BAD_REQUEST);
        assert_eq!(status.message, "Bad Request: Failed schema validation");

        let mut fields: Vec<&str> = status.items.iter().map(|i| i.field.as_str()).collect();
        fields.sort();
        assert_eq!(fields, vec!["(root)", "tags.0"]);
        assert!(status.items.iter().all(|i| !i.message.is_empty()));
    }

    #[tokio::test]
    async fn test_load_failures_are_all_logged() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("person.json"), PERSON).unwrap();
        std::fs::write(dir.path().join("broken.json"), "{").unwrap();

        let log = Arc::new(RecordingClient::new());
        let files = vec![
            "missing.json".to_string(),
            "person.json".to_string(),
            "broken.json".to_string(),
        ];
        let err = Client::new(&crate::context::start_up(), &env_in(dir.path()), log.clone(), &files)
            .await
            .unwrap_err();

        match err {
            SchemaError::Load { file, source } => {
                assert_eq!(file, "missing.json");
                assert!(matches!(source, LoadError::Io(_)));
            }
            other => panic!("unexpected error: {other}"),
        }

        let failures = log
            .entries()
            .into_iter()
            .filter(|e| e.severity == crate::log::Severity::Error)
            .count();
        assert_eq!(failures, 2);
        assert!(log.find("Initialized").is_none());
    }

    #[tokio::test]
    async fn test_no_files() {
        let dir = tempfile::tempdir().unwrap();
        let client = Client::new(
            &crate::context::start_up(),
            &env_in(dir.path()),
            Arc::new(NoopClient),
            &[],
        )
        .await
        .unwrap();
        assert!(!client.is_loaded("person.json"));
    }
}
