//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the `tracing` subscriber for local or remote runs
//! - Provide the `Client` used by every component to log with context
//! - Format lines as `[message] [correlation id] [file:line] {fields}`
//!
//! # Design Decisions
//! - Remote runs emit one JSON object per line for the cloud log ingester;
//!   field fragments are compact so each line stays a single record
//! - Local runs get tab-indented fields; the fmt layer colours the level, as
//!   it escapes control characters written into messages
//! - The caller's location is captured with `#[track_caller]`
//! - `fatal` only logs; entry points decide how to exit

pub mod field;
pub mod mock;

pub use field::Field;

use std::panic::Location;

use serde::{Deserialize, Serialize};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::context::Context;
use crate::environment::Environment;

const ANSI_RESET: &str = "\x1b[0m";

/// Log severity, named after cloud logging severities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    Debug,
    Info,
    Notice,
    Warn,
    Error,
    Fatal,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Debug => "DEBUG",
            Severity::Info => "INFO",
            Severity::Notice => "NOTICE",
            Severity::Warn => "WARNING",
            Severity::Error => "ERROR",
            Severity::Fatal => "CRITICAL",
        }
    }

    fn colour(self) -> &'static str {
        match self {
            Severity::Debug => "\x1b[36m",
            Severity::Info => "\x1b[32m",
            Severity::Notice => "\x1b[34m",
            Severity::Warn => "\x1b[33m",
            Severity::Error => "\x1b[31m",
            Severity::Fatal => "\x1b[35m",
        }
    }
}

/// How fields and lines are laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// Tab-indented, coloured; for terminals.
    Pretty,
    /// Single line, no escapes; for log ingestion.
    Compact,
}

impl Layout {
    pub fn for_env(env: &Environment) -> Self {
        if env.remote {
            Layout::Compact
        } else {
            Layout::Pretty
        }
    }
}

/// Render a set of fields as `{a,b}`, or nothing when empty.
pub fn render_fields(fields: &[Field], layout: Layout) -> String {
    if fields.is_empty() {
        return String::new();
    }
    let rendered: Vec<String> = fields.iter().map(|f| f.render(layout)).collect();
    match layout {
        Layout::Compact => format!("{{{}}}", rendered.join(",")),
        Layout::Pretty => format!("{{\n\t{}\n}}", rendered.join(",\n\t")),
    }
}

/// Render a log line without colour: `[message] [correlation id] [file:line] fields`.
pub fn render_message(
    message: &str,
    correlation_id: &str,
    at: &Location<'_>,
    fields: &[Field],
    layout: Layout,
) -> String {
    format!(
        "[{}] [{}] [{}:{}] {}",
        message,
        correlation_id,
        at.file(),
        at.line(),
        render_fields(fields, layout)
    )
}

/// Render a complete log line, coloured by severity in the pretty layout.
pub fn render_line(
    severity: Severity,
    message: &str,
    correlation_id: &str,
    at: &Location<'_>,
    fields: &[Field],
    layout: Layout,
) -> String {
    let line = render_message(message, correlation_id, at, fields, layout);
    match layout {
        Layout::Compact => line,
        Layout::Pretty => format!("{}{}{}", severity.colour(), line, ANSI_RESET),
    }
}

/// Logging interface shared by all components.
pub trait Client: Send + Sync {
    fn log(
        &self,
        ctx: &Context,
        severity: Severity,
        message: &str,
        fields: &[Field],
        at: &'static Location<'static>,
    );

    #[track_caller]
    fn debug(&self, ctx: &Context, message: &str, fields: &[Field]) {
        self.log(ctx, Severity::Debug, message, fields, Location::caller())
    }

    #[track_caller]
    fn info(&self, ctx: &Context, message: &str, fields: &[Field]) {
        self.log(ctx, Severity::Info, message, fields, Location::caller())
    }

    #[track_caller]
    fn notice(&self, ctx: &Context, message: &str, fields: &[Field]) {
        self.log(ctx, Severity::Notice, message, fields, Location::caller())
    }

    #[track_caller]
    fn warn(&self, ctx: &Context, message: &str, fields: &[Field]) {
        self.log(ctx, Severity::Warn, message, fields, Location::caller())
    }

    #[track_caller]
    fn error(&self, ctx: &Context, message: &str, fields: &[Field]) {
        self.log(ctx, Severity::Error, message, fields, Location::caller())
    }

    /// Log at the highest severity. The caller is expected to stop.
    #[track_caller]
    fn fatal(&self, ctx: &Context, message: &str, fields: &[Field]) {
        self.log(ctx, Severity::Fatal, message, fields, Location::caller())
    }
}

/// Log client configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    pub env: Environment,
}

/// `Client` that emits through `tracing`.
#[derive(Debug, Clone)]
pub struct TracingClient {
    config: Config,
    layout: Layout,
}

impl TracingClient {
    pub fn new(ctx: &Context, config: Config) -> Self {
        let client = Self {
            layout: Layout::for_env(&config.env),
            config,
        };
        client.info(ctx, "Initializing", &[Field::any("config", &client.config)]);
        client.info(ctx, "Initialized", &[]);
        client
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn layout(&self) -> Layout {
        self.layout
    }
}

impl Client for TracingClient {
    fn log(
        &self,
        ctx: &Context,
        severity: Severity,
        message: &str,
        fields: &[Field],
        at: &'static Location<'static>,
    ) {
        if severity == Severity::Debug && !self.config.env.debug {
            return;
        }
        // The fmt layer escapes control characters in messages and colours the
        // level itself, so the line goes out uncoloured.
        let line = render_message(message, ctx.correlation_id(), at, fields, self.layout);
        let correlation_id = ctx.correlation_id();
        let severity_name = severity.as_str();
        match severity {
            Severity::Debug => {
                tracing::debug!(severity = severity_name, correlation_id, "{}", line)
            }
            Severity::Info | Severity::Notice => {
                tracing::info!(severity = severity_name, correlation_id, "{}", line)
            }
            Severity::Warn => {
                tracing::warn!(severity = severity_name, correlation_id, "{}", line)
            }
            Severity::Error | Severity::Fatal => {
                tracing::error!(severity = severity_name, correlation_id, "{}", line)
            }
        }
    }
}

/// Install the global `tracing` subscriber.
///
/// `RUST_LOG` takes precedence; otherwise debug builds of the environment log
/// at `debug` and everything else at `info`.
pub fn init(env: &Environment) -> Result<(), tracing_subscriber::util::TryInitError> {
    let default_level = if env.debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let registry = tracing_subscriber::registry().with(filter);

    if env.remote {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .flatten_event(true)
                    .with_current_span(false),
            )
            .try_init()
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_target(false))
            .try_init()
    }
}
