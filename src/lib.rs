//! Shared building blocks for small HTTP services.
//!
//! # Architecture Overview
//!
//! ```text
//!     environment ──▶ log ──▶ every component logs with a Context
//!          │
//!          ▼
//!     config (TOML) ──▶ http::middleware ──▶ handler ──▶ http::render
//!                                │              │
//!                                ▼              ▼
//!                          context (ids)   http::parser ──▶ schema
//!
//!     secrets ◀── tools::cloudkms (cloudkms-encrypt / cloudkms-decrypt)
//! ```

// Foundations
pub mod context;
pub mod environment;
pub mod errors;
pub mod log;

// Service plumbing
pub mod config;
pub mod http;
pub mod schema;

// Secrets and tools
pub mod secrets;
pub mod tools;

pub use config::ServiceConfig;
pub use context::Context;
pub use environment::Environment;
pub use errors::Status;
