//! Structured log contracts.
//!
//! Entries are JSON objects `{level, message, data?, error?, tags?, timestamp}`.
//! When `lcod://contract/tooling/log@1` is bound to another implementation the
//! entry is handed to it; otherwise it is written as one JSON line, errors to
//! stderr and everything else to stdout.

use std::io::{self, Write};
use std::time::SystemTime;

use anyhow::{bail, Context as AnyhowContext, Result};
use humantime::format_rfc3339;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::compose::run_children;
use crate::config::LogLevel;
use crate::registry::{Context, Registry};

pub const LOG_CONTRACT_ID: &str = "lcod://contract/tooling/log@1";
pub const KERNEL_HELPER_ID: &str = "lcod://kernel/log@1";
pub const LOG_CONTEXT_ID: &str = "lcod://tooling/log.context@1";
/// Implementation writing every entry to stderr, see [`route_logs_to_stderr`].
pub const STDERR_SINK_ID: &str = "lcod://impl/tooling/log/stderr@1";

#[derive(Debug, Deserialize)]
struct LogRequest {
    level: LogLevel,
    message: String,
    #[serde(default)]
    data: Option<Map<String, Value>>,
    #[serde(default)]
    error: Option<Map<String, Value>>,
    #[serde(default)]
    tags: Map<String, Value>,
    #[serde(default)]
    timestamp: Option<String>,
}

#[derive(Debug, Serialize)]
struct LogEntry {
    level: LogLevel,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<Map<String, Value>>,
    #[serde(skip_serializing_if = "Map::is_empty")]
    tags: Map<String, Value>,
    timestamp: String,
}

fn now() -> String {
    format_rfc3339(SystemTime::now()).to_string()
}

/// Only scalar tags are kept so entries stay flat and indexable.
fn scalar_tags(tags: Map<String, Value>) -> impl Iterator<Item = (String, Value)> {
    tags.into_iter()
        .filter(|(_, value)| matches!(value, Value::String(_) | Value::Number(_) | Value::Bool(_)))
}

fn write_line(mut out: impl Write, entry: &Value) {
    if let Ok(line) = serde_json::to_string(entry) {
        let _ = writeln!(out, "{line}");
    }
}

fn emit_log(ctx: &mut Context, input: Value, kernel: bool) -> Result<Value> {
    let request: LogRequest = serde_json::from_value(input).context("invalid log payload")?;
    if request.message.is_empty() {
        bail!("log payload missing 'message'");
    }
    if !ctx.config().enabled(request.level) {
        return Ok(Value::Null);
    }

    let mut tags = ctx.log_tags();
    if kernel {
        tags.insert("component".to_string(), json!("kernel"));
    }
    tags.extend(scalar_tags(request.tags));

    let level = request.level;
    let entry = serde_json::to_value(LogEntry {
        level,
        message: request.message,
        data: request.data,
        error: request.error,
        tags,
        timestamp: request.timestamp.unwrap_or_else(now),
    })?;

    let target = ctx
        .binding_for(LOG_CONTRACT_ID)
        .filter(|target| target != LOG_CONTRACT_ID && target != KERNEL_HELPER_ID);
    let Some(target) = target else {
        if level >= LogLevel::Error {
            write_line(io::stderr(), &entry);
        } else {
            write_line(io::stdout(), &entry);
        }
        return Ok(entry);
    };

    match ctx.call(&target, entry.clone(), None) {
        Ok(Value::Null) => Ok(entry),
        Ok(handled) => Ok(handled),
        Err(err) => {
            let failure = json!({
                "level": LogLevel::Error,
                "message": "log contract handler failed",
                "data": { "error": format!("{err:#}"), "target": target },
                "timestamp": now()
            });
            write_line(io::stderr(), &failure);
            Ok(Value::Null)
        }
    }
}

/// Logs through the kernel helper, tagged `component: kernel`.
pub fn kernel_log(ctx: &mut Context, level: LogLevel, message: &str, data: Value) -> Result<Value> {
    let mut payload = json!({ "level": level, "message": message });
    if data.is_object() {
        payload["data"] = data;
    }
    emit_log(ctx, payload, true)
}

/// `lcod://tooling/log.context@1`: runs its children with `tags` added to every entry.
fn log_context(ctx: &mut Context, input: Value, meta: Option<Value>) -> Result<Value> {
    let tags = match input {
        Value::Object(mut map) => match map.remove("tags") {
            Some(Value::Object(tags)) => tags,
            None | Some(Value::Null) => Map::new(),
            Some(other) => bail!("log.context tags must be an object, got {other}"),
        },
        Value::Null => Map::new(),
        other => bail!("log.context input must be an object, got {other}"),
    };
    let tags: Map<String, Value> = scalar_tags(tags).collect();
    ctx.with_log_tags(tags, |ctx| run_children(ctx, meta))
}

pub fn register_logging(registry: &Registry) {
    registry.register(
        LOG_CONTRACT_ID,
        |ctx: &mut Context, input: Value, _meta: Option<Value>| emit_log(ctx, input, false),
    );
    registry.register(
        KERNEL_HELPER_ID,
        |ctx: &mut Context, input: Value, _meta: Option<Value>| emit_log(ctx, input, true),
    );
    registry.register(LOG_CONTEXT_ID, log_context);
}

/// Sends every log entry to stderr, keeping stdout for results.
pub fn route_logs_to_stderr(registry: &Registry) {
    registry.register(
        STDERR_SINK_ID,
        |_ctx: &mut Context, entry: Value, _meta: Option<Value>| {
            write_line(io::stderr(), &entry);
            Ok(Value::Null)
        },
    );
    registry.set_binding(LOG_CONTRACT_ID, STDERR_SINK_ID);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entries_are_single_json_lines() {
        let mut out = Vec::new();
        write_line(&mut out, &json!({ "level": "info", "message": "a\nb" }));
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.lines().count(), 1);
        assert!(text.ends_with('\n'));
    }

    #[test]
    fn payload_without_level_is_rejected() {
        let registry = Registry::new();
        let mut ctx = registry.context();
        let err = emit_log(&mut ctx, json!({ "message": "no level" }), false).unwrap_err();
        assert!(err.to_string().contains("invalid log payload"));
    }
}
