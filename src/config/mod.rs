//! Service configuration file.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (read & deserialize)
//!     → validation.rs (semantic checks)
//!     → ServiceConfig (validated, immutable)
//!     → http::middleware, schema::Client
//! ```
//!
//! # Design Decisions
//! - Every field has a default so an empty file is a valid config
//! - Deployment values (port, debug, remote) stay in `environment`
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{CorsConfig, HttpConfig, SchemaConfig, ServiceConfig};
pub use validation::{validate_config, ValidationError};
