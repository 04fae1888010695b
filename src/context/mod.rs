//! Request-scoped context propagation.
//!
//! # Data Flow
//! ```text
//! HTTP request
//!     → http::middleware::populate_context (new correlation ID + headers)
//!     → request extensions (Context extractor)
//!     → task-local scope (context::current)
//!     → log lines, response headers, downstream calls
//! ```
//!
//! # Design Decisions
//! - Context is an immutable value; every `with_*` returns a new one
//! - Lifecycle contexts (background, start up, shut down) use fixed IDs
//! - Derived contexts keep the parent's correlation ID as a suffix

use std::future::Future;

use axum::{extract::FromRequestParts, http::request::Parts};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Correlation ID for work not tied to a request.
pub const CORRELATION_ID_BACKGROUND: &str = "BACKGROUND";
/// Correlation ID for process start up.
pub const CORRELATION_ID_START_UP: &str = "START_UP";
/// Correlation ID for process shut down.
pub const CORRELATION_ID_SHUT_DOWN: &str = "SHUT_DOWN";

tokio::task_local! {
    static CURRENT: Context;
}

/// Values carried through the lifetime of a unit of work.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Context {
    correlation_id: String,
    test: bool,
}

/// Context for background work.
pub fn background() -> Context {
    Context::default().with_correlation_id(CORRELATION_ID_BACKGROUND)
}

/// Context for start up work.
pub fn start_up() -> Context {
    Context::default().with_correlation_id(CORRELATION_ID_START_UP)
}

/// Context for shut down work.
pub fn shut_down() -> Context {
    Context::default().with_correlation_id(CORRELATION_ID_SHUT_DOWN)
}

impl Context {
    /// Create a context with a fresh correlation ID.
    ///
    /// When a parent is given its correlation ID is appended to the new one
    /// and its test flag is inherited.
    pub fn new(parent: Option<&Context>) -> Self {
        let ctx = Context::default().with_correlation_id(Uuid::new_v4().to_string());
        match parent {
            Some(parent) => ctx
                .with_correlation_id_append(&parent.correlation_id)
                .with_test(parent.test),
            None => ctx,
        }
    }

    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }

    pub fn test(&self) -> bool {
        self.test
    }

    /// Replace the correlation ID.
    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = correlation_id.into();
        self
    }

    /// Append to the existing correlation ID, comma separated.
    ///
    /// An empty or `BACKGROUND` correlation ID is replaced instead.
    pub fn with_correlation_id_append(mut self, correlation_id: &str) -> Self {
        if correlation_id.is_empty() {
            return self;
        }
        if self.correlation_id.is_empty() || self.correlation_id == CORRELATION_ID_BACKGROUND {
            self.correlation_id = correlation_id.to_string();
        } else {
            self.correlation_id = format!("{},{}", self.correlation_id, correlation_id);
        }
        self
    }

    pub fn with_test(mut self, test: bool) -> Self {
        self.test = test;
        self
    }
}

/// Run a future with `ctx` installed as the task-local context.
pub async fn scope<F>(ctx: Context, f: F) -> F::Output
where
    F: Future,
{
    CURRENT.scope(ctx, f).await
}

/// The task-local context, or a background context outside of any scope.
pub fn current() -> Context {
    CURRENT.try_with(Context::clone).unwrap_or_else(|_| background())
}

impl<S> FromRequestParts<S> for Context
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<Context>()
            .cloned()
            .unwrap_or_else(|| Context::new(None)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle_contexts() {
        assert_eq!(background().correlation_id(), CORRELATION_ID_BACKGROUND);
        assert_eq!(start_up().correlation_id(), CORRELATION_ID_START_UP);
        assert_eq!(shut_down().correlation_id(), CORRELATION_ID_SHUT_DOWN);
        assert!(!background().test());
        assert!(!start_up().test());
        assert!(!shut_down().test());
    }

    #[test]
    fn test_new_without_parent() {
        let ctx = Context::new(None);
        assert!(Uuid::parse_str(ctx.correlation_id()).is_ok());
        assert!(!ctx.test());
    }

    #[test]
    fn test_new_with_parent() {
        let parent = start_up();
        let ctx = Context::new(Some(&parent));
        assert!(ctx.correlation_id().ends_with(",START_UP"));
        assert!(!ctx.test());

        let customized = Context::default()
            .with_correlation_id("customized")
            .with_test(true);
        let ctx = Context::new(Some(&customized));
        assert!(ctx.correlation_id().ends_with(",customized"));
        assert!(ctx.test());
    }

    #[test]
    fn test_new_with_empty_parent() {
        let ctx = Context::new(Some(&Context::default()));
        assert!(Uuid::parse_str(ctx.correlation_id()).is_ok());
    }

    #[test]
    fn test_new_ids_are_unique() {
        assert_ne!(
            Context::new(None).correlation_id(),
            Context::new(None).correlation_id()
        );
    }

    #[test]
    fn test_with_correlation_id_overrides() {
        let ctx = background().with_correlation_id("correlationId");
        assert_eq!(ctx.correlation_id(), "correlationId");
    }

    #[test]
    fn test_with_correlation_id_append() {
        let ctx = start_up().with_correlation_id_append("abc");
        assert_eq!(ctx.correlation_id(), "START_UP,abc");

        let ctx = background().with_correlation_id_append("abc");
        assert_eq!(ctx.correlation_id(), "abc");

        let ctx = Context::default().with_correlation_id_append("abc");
        assert_eq!(ctx.correlation_id(), "abc");

        let ctx = start_up().with_correlation_id_append("");
        assert_eq!(ctx.correlation_id(), "START_UP");
    }

    #[tokio::test]
    async fn test_scope_and_current() {
        assert_eq!(current(), background());

        let ctx = Context::new(None).with_test(true);
        let seen = scope(ctx.clone(), async { current() }).await;
        assert_eq!(seen, ctx);

        assert_eq!(current(), background());
    }

    #[tokio::test]
    async fn test_extractor_reads_extensions() {
        let ctx = start_up().with_test(true);
        let (mut parts, _) = axum::http::Request::builder()
            .body(())
            .unwrap()
            .into_parts();
        parts.extensions.insert(ctx.clone());

        let extracted = Context::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(extracted, ctx);
    }

    #[tokio::test]
    async fn test_extractor_without_extension() {
        let (mut parts, _) = axum::http::Request::builder()
            .body(())
            .unwrap()
            .into_parts();

        let extracted = Context::from_request_parts(&mut parts, &()).await.unwrap();
        assert!(Uuid::parse_str(extracted.correlation_id()).is_ok());
    }
}
