//! Typed log field builders.
//!
//! A field renders as a JSON-like `"name": value` fragment. The same field
//! renders compactly on one line for remote log ingestion, or tab-indented
//! for reading in a terminal.

use std::error::Error;
use std::iter;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::json;

use super::Layout;

/// Placeholder value for data that fails to serialize.
pub const NOT_JSON_MARSHALLABLE: &str = "NOT JSON MARSHALLABLE";

#[derive(Debug, Clone, PartialEq)]
enum Value {
    /// Pre-rendered scalar, emitted as is.
    Token(String),
    Json(serde_json::Value),
    List(Vec<Value>),
}

impl Value {
    fn render(&self, layout: Layout, depth: usize) -> String {
        match self {
            Value::Token(token) => token.clone(),
            Value::Json(value) => match layout {
                Layout::Compact => value.to_string(),
                Layout::Pretty => pretty_json(value).replace('\n', &format!("\n{}", tabs(depth))),
            },
            Value::List(items) if items.is_empty() => "[]".to_string(),
            Value::List(items) => match layout {
                Layout::Compact => {
                    let rendered: Vec<String> =
                        items.iter().map(|item| item.render(layout, 0)).collect();
                    format!("[{}]", rendered.join(","))
                }
                Layout::Pretty => {
                    let inner = tabs(depth + 1);
                    let rendered: Vec<String> = items
                        .iter()
                        .map(|item| item.render(layout, depth + 1))
                        .collect();
                    format!(
                        "[\n{inner}{}\n{}]",
                        rendered.join(&format!(",\n{inner}")),
                        tabs(depth)
                    )
                }
            },
        }
    }
}

fn tabs(depth: usize) -> String {
    "\t".repeat(depth)
}

fn pretty_json(value: &serde_json::Value) -> String {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"\t");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
    match value.serialize(&mut serializer) {
        Ok(()) => String::from_utf8(buf).unwrap_or_else(|_| value.to_string()),
        Err(_) => value.to_string(),
    }
}

/// A named value attached to a log line.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    name: String,
    value: Value,
}

impl Field {
    fn new(name: impl Into<String>, value: Value) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }

    fn list<T>(name: impl Into<String>, values: &[T], f: impl Fn(&T) -> Value) -> Self {
        Self::new(name, Value::List(values.iter().map(f).collect()))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Render as a `"name": value` fragment.
    pub fn render(&self, layout: Layout) -> String {
        let name = serde_json::Value::String(self.name.clone());
        match layout {
            Layout::Compact => format!("{}:{}", name, self.value.render(layout, 0)),
            Layout::Pretty => format!("{}: {}", name, self.value.render(layout, 1)),
        }
    }

    /// Any serializable value, tagged with its type name.
    pub fn any<T: Serialize + ?Sized>(name: impl Into<String>, value: &T) -> Self {
        Self::new(name, any_value(value))
    }

    pub fn anys<T: Serialize>(name: impl Into<String>, values: &[T]) -> Self {
        Self::list(name, values, |v| any_value(v))
    }

    pub fn bool(name: impl Into<String>, value: bool) -> Self {
        Self::new(name, Value::Json(value.into()))
    }

    pub fn bools(name: impl Into<String>, values: &[bool]) -> Self {
        Self::list(name, values, |v| Value::Json((*v).into()))
    }

    /// A single byte as a quoted character literal.
    pub fn byte(name: impl Into<String>, value: u8) -> Self {
        Self::new(name, Value::Token(quote_byte(value)))
    }

    /// Raw bytes as a quoted, escaped string.
    pub fn bytes(name: impl Into<String>, value: &[u8]) -> Self {
        Self::new(name, Value::Token(quote_bytes(value)))
    }

    pub fn duration(name: impl Into<String>, value: Duration) -> Self {
        Self::new(name, Value::Json(format_duration(value).into()))
    }

    pub fn durations(name: impl Into<String>, values: &[Duration]) -> Self {
        Self::list(name, values, |v| Value::Json(format_duration(*v).into()))
    }

    /// An error under the name `error`.
    ///
    /// Errors with sources render as `{"friendly": ..., "trace": [...]}`.
    pub fn error<E: Error + ?Sized>(err: &E) -> Self {
        let friendly = err.to_string();
        let trace: Vec<String> = iter::successors(err.source(), |e| (*e).source())
            .map(ToString::to_string)
            .collect();
        let value = if trace.is_empty() {
            json!(friendly)
        } else {
            json!({ "friendly": friendly, "trace": trace })
        };
        Self::new("error", Value::Json(value))
    }

    /// Like [`Field::error`], rendering `null` for `None`.
    pub fn optional_error<E: Error + ?Sized>(err: Option<&E>) -> Self {
        match err {
            Some(err) => Self::error(err),
            None => Self::new("error", Value::Json(serde_json::Value::Null)),
        }
    }

    /// Five decimal places.
    pub fn f32(name: impl Into<String>, value: f32) -> Self {
        Self::new(name, Value::Token(format!("{value:.5}")))
    }

    pub fn f32s(name: impl Into<String>, values: &[f32]) -> Self {
        Self::list(name, values, |v| Value::Token(format!("{v:.5}")))
    }

    /// Ten decimal places.
    pub fn f64(name: impl Into<String>, value: f64) -> Self {
        Self::new(name, Value::Token(format!("{value:.10}")))
    }

    pub fn f64s(name: impl Into<String>, values: &[f64]) -> Self {
        Self::list(name, values, |v| Value::Token(format!("{v:.10}")))
    }

    pub fn int<T: Into<i64>>(name: impl Into<String>, value: T) -> Self {
        Self::new(name, int_value(value))
    }

    pub fn ints<T: Into<i64> + Copy>(name: impl Into<String>, values: &[T]) -> Self {
        Self::list(name, values, |v| int_value(*v))
    }

    pub fn string(name: impl Into<String>, value: &str) -> Self {
        Self::new(name, Value::Json(value.into()))
    }

    pub fn strings<S: AsRef<str>>(name: impl Into<String>, values: &[S]) -> Self {
        Self::list(name, values, |v| Value::Json(v.as_ref().into()))
    }

    /// RFC 3339 with sub-second precision as needed.
    pub fn time(name: impl Into<String>, value: DateTime<Utc>) -> Self {
        Self::new(name, Value::Json(format_time(value).into()))
    }

    pub fn times(name: impl Into<String>, values: &[DateTime<Utc>]) -> Self {
        Self::list(name, values, |v| Value::Json(format_time(*v).into()))
    }
}

fn any_value<T: Serialize + ?Sized>(value: &T) -> Value {
    let type_name = std::any::type_name::<T>();
    match serde_json::to_value(value) {
        Ok(serde_json::Value::Null) => Value::Json(serde_json::Value::Null),
        Ok(value) => Value::Json(json!({ "type": type_name, "value": value })),
        Err(_) => Value::Json(json!({ "type": type_name, "value": NOT_JSON_MARSHALLABLE })),
    }
}

fn int_value<T: Into<i64>>(value: T) -> Value {
    let value: i64 = value.into();
    Value::Json(value.into())
}

fn format_time(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// Durations as `1h2m3.5s`, `250ms`, `1µs`, `7ns`.
fn format_duration(value: Duration) -> String {
    const MICRO: u128 = 1_000;
    const MILLI: u128 = 1_000_000;
    const SECOND: u128 = 1_000_000_000;

    let nanos = value.as_nanos();
    if nanos == 0 {
        return "0s".to_string();
    }
    if nanos < MICRO {
        return format!("{nanos}ns");
    }
    if nanos < MILLI {
        return format!("{}µs", with_fraction(nanos, MICRO));
    }
    if nanos < SECOND {
        return format!("{}ms", with_fraction(nanos, MILLI));
    }

    let total_secs = value.as_secs();
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = with_fraction(nanos % (60 * SECOND), SECOND);
    if hours > 0 {
        format!("{hours}h{minutes}m{seconds}s")
    } else if minutes > 0 {
        format!("{minutes}m{seconds}s")
    } else {
        format!("{seconds}s")
    }
}

fn with_fraction(value: u128, unit: u128) -> String {
    let whole = value / unit;
    let rem = value % unit;
    if rem == 0 {
        return whole.to_string();
    }
    let width = unit.to_string().len() - 1;
    let fraction = format!("{rem:0width$}");
    format!("{whole}.{}", fraction.trim_end_matches('0'))
}

fn quote_byte(value: u8) -> String {
    match value {
        b'\'' => "'\\''".to_string(),
        b'\\' => "'\\\\'".to_string(),
        b'\n' => "'\\n'".to_string(),
        b'\r' => "'\\r'".to_string(),
        b'\t' => "'\\t'".to_string(),
        0x20..=0x7e => format!("'{}'", value as char),
        _ => format!("'\\x{value:02x}'"),
    }
}

fn quote_bytes(value: &[u8]) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for chunk in value.utf8_chunks() {
        for c in chunk.valid().chars() {
            match c {
                '"' => out.push_str("\\\""),
                '\\' => out.push_str("\\\\"),
                '\n' => out.push_str("\\n"),
                '\r' => out.push_str("\\r"),
                '\t' => out.push_str("\\t"),
                c if (c as u32) < 0x80 && c.is_control() => {
                    out.push_str(&format!("\\x{:02x}", c as u32))
                }
                c if c.is_control() => out.push_str(&format!("\\u{:04x}", c as u32)),
                c => out.push(c),
            }
        }
        for b in chunk.invalid() {
            out.push_str(&format!("\\x{b:02x}"));
        }
    }
    out.push('"');
    out
}
