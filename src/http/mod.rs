//! HTTP helpers for axum services.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (axum::serve, graceful shutdown)
//!     → middleware.rs (request id, trace, context, logging, CORS)
//!     → handler
//!         → parser.rs (read body, validate against schema)
//!         → render.rs (JSON / no content / error, correlation headers)
//!     → Send to client
//! ```

pub mod headers;
pub mod middleware;
pub mod parser;
pub mod render;
pub mod server;

pub use headers::{Headers, TEST_VALUE_DEFAULT};
pub use middleware::{defaults, UrlFormat};
pub use parser::Parser;
pub use server::{serve, shutdown_signal};
