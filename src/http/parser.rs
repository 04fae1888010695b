//! Request body reading.

use std::sync::Arc;

use axum::{
    body::{Body, Bytes},
    http::StatusCode,
};

use serde::de::DeserializeOwned;

use crate::context::Context;
use crate::errors::Status;
use crate::log::{Client as LogClient, Field};
use crate::schema::{self, SchemaError};

/// Reads request bodies up to a size limit.
#[derive(Clone)]
pub struct Parser {
    log: Arc<dyn LogClient>,
    body_limit: usize,
}

impl std::fmt::Debug for Parser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Parser")
            .field("body_limit", &self.body_limit)
            .finish()
    }
}

impl Parser {
    pub fn new(ctx: &Context, log: Arc<dyn LogClient>, body_limit: usize) -> Self {
        log.info(ctx, "Initializing", &[Field::int("body_limit", body_limit as i64)]);
        log.info(ctx, "Initialized", &[]);
        Self { log, body_limit }
    }

    /// Read the whole body. Unreadable or oversized bodies are a 400.
    pub async fn read_request_body(&self, ctx: &Context, body: Body) -> Result<Bytes, Status> {
        self.log.info(ctx, "Reading", &[]);
        let body = axum::body::to_bytes(body, self.body_limit)
            .await
            .map_err(|e| Status::with_cause(e, StatusCode::BAD_REQUEST, "Malformed body"))?;
        self.log.info(ctx, "Read", &[Field::bytes("body", &body)]);
        Ok(body)
    }

    /// Read the body, validate it against a loaded schema and deserialize it.
    pub async fn read_json<T: DeserializeOwned>(
        &self,
        ctx: &Context,
        body: Body,
        schemas: &schema::Client,
        schema_file_name: &str,
    ) -> Result<T, SchemaError> {
        let body = self.read_request_body(ctx, body).await?;
        schemas.validate(ctx, schema_file_name, &body)?;
        let value = serde_json::from_slice(&body)
            .map_err(|e| Status::with_cause(e, StatusCode::BAD_REQUEST, "Failed to decode body"))?;
        Ok(value)
    }
}
