//! Structured JSON logger for Nimbus
//!
//! Contract:
//! - One log line = one event, valid JSON
//! - Keys emitted in a deterministic order (event, level, component, then
//!   caller fields sorted alphabetically)
//! - Synchronous writes, no buffering

use std::collections::BTreeMap;
use std::fmt;
use std::io::{self, Write};

/// Log levels, ordered by severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug = 0,
    Info = 1,
    Warn = 2,
    Error = 3,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A component-scoped structured logger.
///
/// Cheap to construct; holds only the component name that is stamped on
/// every line it emits.
#[derive(Debug, Clone)]
pub struct Logger {
    component: &'static str,
}

impl Logger {
    /// Create a logger scoped to a component name (e.g. "engine", "worker")
    pub fn new(component: &'static str) -> Self {
        Self { component }
    }

    /// Emit an event at the given level
    pub fn log(&self, level: LogLevel, event: &str, fields: &[(&str, &str)]) {
        let line = self.render(level, event, fields);
        if level >= LogLevel::Error {
            let _ = io::stderr().write_all(line.as_bytes());
            let _ = io::stderr().flush();
        } else {
            let _ = io::stdout().write_all(line.as_bytes());
            let _ = io::stdout().flush();
        }
    }

    pub fn debug(&self, event: &str, fields: &[(&str, &str)]) {
        self.log(LogLevel::Debug, event, fields);
    }

    pub fn info(&self, event: &str, fields: &[(&str, &str)]) {
        self.log(LogLevel::Info, event, fields);
    }

    pub fn warn(&self, event: &str, fields: &[(&str, &str)]) {
        self.log(LogLevel::Warn, event, fields);
    }

    pub fn error(&self, event: &str, fields: &[(&str, &str)]) {
        self.log(LogLevel::Error, event, fields);
    }

    /// Render one event as a single JSON line.
    ///
    /// Caller fields are sorted through a BTreeMap; a field repeated by the
    /// caller keeps the last value.
    fn render(&self, level: LogLevel, event: &str, fields: &[(&str, &str)]) -> String {
        let sorted: BTreeMap<&str, &str> = fields.iter().copied().collect();

        let mut line = String::with_capacity(128);
        line.push_str("{\"event\":\"");
        escape_into(&mut line, event);
        line.push_str("\",\"level\":\"");
        line.push_str(level.as_str());
        line.push_str("\",\"component\":\"");
        escape_into(&mut line, self.component);
        line.push('"');

        for (key, value) in sorted {
            line.push_str(",\"");
            escape_into(&mut line, key);
            line.push_str("\":\"");
            escape_into(&mut line, value);
            line.push('"');
        }

        line.push_str("}\n");
        line
    }
}

fn escape_into(out: &mut String, s: &str) {
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => {
                out.push_str(&format!("\\u{:04x}", c as u32));
            }
            c => out.push(c),
        }
    }
}
