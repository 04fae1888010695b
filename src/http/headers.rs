//! Service-specific correlation and test header names.

use std::sync::Arc;

use crate::context::Context;
use crate::log::{Client as LogClient, Field};

/// Correlation header used when no service name is configured.
pub const CORRELATION_ID_KEY_DEFAULT: &str = "X-Correlation-Id";
/// Test header used when no service name is configured.
pub const TEST_KEY_DEFAULT: &str = "X-Test";
/// Value of the test header that marks a request as a test.
pub const TEST_VALUE_DEFAULT: &str = "true";

/// Header names shared by middleware and renderers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Headers {
    correlation_id_key: String,
    test_key: String,
}

impl Default for Headers {
    fn default() -> Self {
        Self {
            correlation_id_key: CORRELATION_ID_KEY_DEFAULT.to_string(),
            test_key: TEST_KEY_DEFAULT.to_string(),
        }
    }
}

impl Headers {
    /// Header names for `service_name`, e.g. `X-Orders-Correlation-Id`.
    pub fn new(ctx: &Context, log: &Arc<dyn LogClient>, service_name: &str) -> Self {
        log.info(ctx, "Initializing", &[Field::string("service_name", service_name)]);
        let headers = Self {
            correlation_id_key: key(service_name, "Correlation-Id"),
            test_key: key(service_name, "Test"),
        };
        log.info(
            ctx,
            "Initialized",
            &[
                Field::string("correlation_id_key", &headers.correlation_id_key),
                Field::string("test_key", &headers.test_key),
            ],
        );
        headers
    }

    pub fn correlation_id_key(&self) -> &str {
        &self.correlation_id_key
    }

    pub fn test_key(&self) -> &str {
        &self.test_key
    }
}

fn key(service_name: &str, suffix: &str) -> String {
    if service_name.is_empty() {
        format!("X-{suffix}")
    } else {
        format!("X-{service_name}-{suffix}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context;
    use crate::log::mock::NoopClient;

    fn noop() -> Arc<dyn LogClient> {
        Arc::new(NoopClient)
    }

    #[test]
    fn test_new_defaults() {
        let headers = Headers::new(&context::start_up(), &noop(), "");
        assert_eq!(headers.correlation_id_key(), CORRELATION_ID_KEY_DEFAULT);
        assert_eq!(headers.test_key(), TEST_KEY_DEFAULT);
        assert_eq!(headers, Headers::default());
    }

    #[test]
    fn test_new_with_service_name() {
        let headers = Headers::new(&context::start_up(), &noop(), "Service-Name");
        assert_eq!(headers.correlation_id_key(), "X-Service-Name-Correlation-Id");
        assert_eq!(headers.test_key(), "X-Service-Name-Test");
    }

    #[test]
    fn test_key() {
        assert_eq!(key("", "Test"), "X-Test");
        assert_eq!(key("Orders", "Correlation-Id"), "X-Orders-Correlation-Id");
    }
}
