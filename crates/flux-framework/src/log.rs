// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Structured logging goes through `tracing` at every call site in
//! the sub-crates; the one pluggable surface exposed here is a
//! `LogSink` a caller can install to observe the same events without
//! standing up its own `tracing::Subscriber`.

/// Mirrors `tracing::Level` 1:1, as a tagged variant rather than a string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn from_str_default(s: &str, default: LogLevel) -> LogLevel {
        match s.to_ascii_lowercase().as_str() {
            "error" => LogLevel::Error,
            "warn" => LogLevel::Warn,
            "info" => LogLevel::Info,
            "debug" => LogLevel::Debug,
            "trace" => LogLevel::Trace,
            _ => default,
        }
    }
}

/// A sink a caller installs via [`crate::FrameworkConfig`] to observe
/// framework log events without depending on `tracing` itself.
pub trait LogSink: Send + Sync {
    fn on_event(&self, level: LogLevel, target: &str, message: &str);
}

/// Forwards every event to `tracing`, at the matching level, so a caller
/// who already has a `tracing::Subscriber` installed sees framework events
/// through it without adding a second logging path.
pub struct TracingLogSink;

impl LogSink for TracingLogSink {
    fn on_event(&self, level: LogLevel, target: &str, message: &str) {
        match level {
            LogLevel::Error => tracing::error!(target: "flux_framework::sink", %target, %message),
            LogLevel::Warn => tracing::warn!(target: "flux_framework::sink", %target, %message),
            LogLevel::Info => tracing::info!(target: "flux_framework::sink", %target, %message),
            LogLevel::Debug => tracing::debug!(target: "flux_framework::sink", %target, %message),
            LogLevel::Trace => tracing::trace!(target: "flux_framework::sink", %target, %message),
        }
    }
}
