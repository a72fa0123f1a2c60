// SPDX-License-Identifier: LGPL-3.0-or-later

//! The log event interface the core consumes.
//!
//! The core never owns a destination: the logging sink is assumed to be
//! supplied externally. Concretely that pluggable destination is any
//! `tracing::Subscriber`: `deliver` below is the single call site that
//! turns a [`Severity`] + message into a `tracing` event, and a host picks
//! the destination by installing a subscriber the ordinary `tracing` way.
//! This crate never installs one itself.

use std::fmt;

/// The set of severities of log messages, ordered from least to most
/// severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Trace,
    Debug,
    Verbose,
    Info,
    Notice,
    Warn,
    Error,
    Fatal,
}

crate::simple_display! {
    Severity {
        Trace => "trace",
        Debug => "debug",
        Verbose => "verbose",
        Info => "info",
        Notice => "notice",
        Warn => "warn",
        Error => "error",
        Fatal => "fatal",
    }
}

impl Severity {
    /// Parse a severity from its [`Display`] name.
    pub fn parse(name: &str) -> Option<Self> {
        Some(match name {
            "trace" => Self::Trace,
            "debug" => Self::Debug,
            "verbose" => Self::Verbose,
            "info" => Self::Info,
            "notice" => Self::Notice,
            "warn" => Self::Warn,
            "error" => Self::Error,
            "fatal" => Self::Fatal,
            _ => return None,
        })
    }
}

/// All of the data associated with a log message.
///
/// `source`, `file`, and `line` identify where the event was created;
/// `thread` and `message` are filled in by [`deliver`].
pub struct LogEvent<'a> {
    pub source: &'a str,
    pub file: &'a str,
    pub line: u32,
    pub thread: std::thread::ThreadId,
    pub severity: Severity,
    pub message: &'a str,
}

impl fmt::Display for LogEvent<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} {}:{}: {}",
            self.severity, self.source, self.file, self.line, self.message
        )
    }
}

/// Deliver a log event to whatever `tracing::Subscriber` the host has
/// installed.
///
/// `tracing`'s five fixed levels don't carry `verbose`/`notice`/`fatal`, so
/// those three are folded into the nearest `tracing::Level` with the
/// original severity preserved as a `severity` field on the event — a
/// subscriber that cares can still distinguish them.
pub fn deliver(source: &str, file: &str, line: u32, severity: Severity, message: &str) {
    let event = LogEvent { source, file, line, thread: std::thread::current().id(), severity, message };

    match severity {
        Severity::Trace => tracing::trace!(target: "clypsalot", source, file, line, severity = %severity, "{}", event.message),
        Severity::Debug => tracing::debug!(target: "clypsalot", source, file, line, severity = %severity, "{}", event.message),
        Severity::Verbose | Severity::Info => {
            tracing::info!(target: "clypsalot", source, file, line, severity = %severity, "{}", event.message)
        }
        Severity::Notice | Severity::Warn => {
            tracing::warn!(target: "clypsalot", source, file, line, severity = %severity, "{}", event.message)
        }
        Severity::Error | Severity::Fatal => {
            tracing::error!(target: "clypsalot", source, file, line, severity = %severity, "{}", event.message)
        }
    }
}

/// Convenience wrapper that fills in `file!()`/`line!()` at the call site.
#[macro_export]
macro_rules! log {
    ($source:expr, $severity:expr, $($arg:tt)*) => {
        $crate::log::deliver($source, file!(), line!(), $severity, &format!($($arg)*))
    };
}
