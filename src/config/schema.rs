//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for a service.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct ServiceConfig {
    /// Name used in correlation and test header keys; empty for the plain
    /// `X-Correlation-Id` / `X-Test` keys.
    pub service_name: String,

    /// HTTP middleware settings.
    pub http: HttpConfig,

    /// Cross-origin policy.
    pub cors: CorsConfig,

    /// JSON schemas to load at start up.
    pub schemas: SchemaConfig,
}

/// HTTP middleware configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct HttpConfig {
    /// Request timeout in seconds.
    pub request_timeout_secs: u64,

    /// Request paths that are not logged by the request logger.
    pub exclude_log_paths: Vec<String>,

    /// Gzip response bodies.
    pub compression: bool,

    /// Maximum request body size read by the parser.
    pub body_limit_bytes: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 30,
            exclude_log_paths: Vec::new(),
            compression: true,
            body_limit_bytes: 2 * 1024 * 1024,
        }
    }
}

/// CORS configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct CorsConfig {
    /// Allowed origins; `"*"` allows any.
    pub allowed_origins: Vec<String>,

    pub allowed_methods: Vec<String>,

    pub allowed_headers: Vec<String>,

    pub exposed_headers: Vec<String>,

    pub allow_credentials: bool,

    /// Preflight cache lifetime in seconds.
    pub max_age_secs: u64,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec!["*".to_string()],
            allowed_methods: ["GET", "POST", "PUT", "DELETE", "OPTIONS", "HEAD"]
                .iter()
                .map(|m| m.to_string())
                .collect(),
            allowed_headers: [
                "Accept",
                "Accept-Language",
                "Authorization",
                "Content-Disposition",
                "Content-Type",
            ]
            .iter()
            .map(|h| h.to_string())
            .collect(),
            exposed_headers: vec!["Content-Type".to_string(), "Location".to_string()],
            allow_credentials: true,
            max_age_secs: 300,
        }
    }
}

/// Schema files, relative to the working directory.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct SchemaConfig {
    pub files: Vec<String>,
}
