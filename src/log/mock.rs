//! Log clients for tests.

use std::panic::Location;
use std::sync::Mutex;

use super::{Client, Field, Layout, Severity};
use crate::context::Context;

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopClient;

impl Client for NoopClient {
    fn log(&self, _: &Context, _: Severity, _: &str, _: &[Field], _: &'static Location<'static>) {}
}

/// One recorded call.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub severity: Severity,
    pub correlation_id: String,
    pub message: String,
    pub fields: Vec<Field>,
    pub file: &'static str,
    pub line: u32,
}

impl Entry {
    /// Compact rendering of the field named `name`.
    pub fn field(&self, name: &str) -> Option<String> {
        self.fields
            .iter()
            .find(|f| f.name() == name)
            .map(|f| f.render(Layout::Compact))
    }
}

/// Records every call for later inspection.
#[derive(Debug, Default)]
pub struct RecordingClient {
    entries: Mutex<Vec<Entry>>,
}

impl RecordingClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<Entry> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn messages(&self) -> Vec<String> {
        self.entries().into_iter().map(|e| e.message).collect()
    }

    /// First entry with the given message.
    pub fn find(&self, message: &str) -> Option<Entry> {
        self.entries().into_iter().find(|e| e.message == message)
    }
}

impl Client for RecordingClient {
    fn log(
        &self,
        ctx: &Context,
        severity: Severity,
        message: &str,
        fields: &[Field],
        at: &'static Location<'static>,
    ) {
        let entry = Entry {
            severity,
            correlation_id: ctx.correlation_id().to_string(),
            message: message.to_string(),
            fields: fields.to_vec(),
            file: at.file(),
            line: at.line(),
        };
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(entry);
    }
}
