//! Classification of raw server output lines.
//!
//! A stdio server may interleave free-form log output with protocol lines on
//! the same stream. A [`LineClassifier`] decides, one line at a time, whether
//! a line is log noise or a candidate JSON-RPC message. Classification never
//! blocks and has no side effects.
//!
//! | Input                                   | Class                         |
//! |-----------------------------------------|-------------------------------|
//! | blank                                   | [`LineClass::Skip`]           |
//! | clock/date prefix, `[` prefix, level tag| [`LineClass::Log`]            |
//! | valid JSON                              | [`LineClass::Json`]           |
//! | invalid JSON starting with `{`          | [`LineClass::Malformed`]      |
//! | anything else                           | [`LineClass::Unparseable`]    |

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

/// Substrings that mark a line as log output regardless of position.
pub const DEFAULT_LEVEL_MARKERS: &[&str] = &["info]", "warn]", "error]"];

/// Outcome of classifying one raw line.
#[derive(Debug, Clone, PartialEq)]
pub enum LineClass {
    /// Empty after trimming; nothing to report.
    Skip,
    /// Log output from the server; never decoded.
    Log(String),
    /// A decoded JSON value; the candidate protocol message.
    Json(Value),
    /// Starts like a JSON object but failed to decode.
    Malformed {
        /// Trimmed raw line.
        raw: String,
        /// Decoder error text.
        error: String,
    },
    /// Neither log output nor JSON; diagnostic only.
    Unparseable(String),
}

/// Pluggable log-versus-protocol classifier.
///
/// Servers differ in how they format log output; supplying a different
/// classifier adapts the stdio transport without touching its read loop.
pub trait LineClassifier: Send + Sync {
    /// Classify one raw line (with or without its line terminator).
    fn classify(&self, line: &str) -> LineClass;
}

/// Default classifier recognising common logger prefixes and level tags.
#[derive(Debug, Clone)]
pub struct HeuristicClassifier {
    markers: Vec<String>,
}

impl HeuristicClassifier {
    /// Create a classifier using [`DEFAULT_LEVEL_MARKERS`].
    #[must_use]
    pub fn new() -> Self {
        Self {
            markers: DEFAULT_LEVEL_MARKERS.iter().map(|m| (*m).to_owned()).collect(),
        }
    }

    /// Add extra marker substrings on top of the defaults.
    #[must_use]
    pub fn with_markers<I, S>(mut self, extra: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.markers.extend(extra.into_iter().map(Into::into));
        self
    }

    fn is_log_line(&self, line: &str) -> bool {
        line.starts_with('[')
            || has_timestamp_prefix(line)
            || self.markers.iter().any(|m| line.contains(m.as_str()))
    }
}

impl Default for HeuristicClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl LineClassifier for HeuristicClassifier {
    fn classify(&self, line: &str) -> LineClass {
        let line = line.trim();
        if line.is_empty() {
            return LineClass::Skip;
        }

        if self.is_log_line(line) {
            return LineClass::Log(line.to_owned());
        }

        match serde_json::from_str::<Value>(line) {
            Ok(value) => LineClass::Json(value),
            Err(e) if line.starts_with('{') => LineClass::Malformed {
                raw: line.to_owned(),
                error: e.to_string(),
            },
            Err(_) => LineClass::Unparseable(line.to_owned()),
        }
    }
}

/// `HH:MM` clock prefix or `YYYY-MM-DD` date prefix.
fn has_timestamp_prefix(line: &str) -> bool {
    static PREFIX: OnceLock<Option<Regex>> = OnceLock::new();
    PREFIX
        .get_or_init(|| Regex::new(r"^(\d{2}:\d{2}|\d{4}-\d{2}-\d{2})").ok())
        .as_ref()
        .is_some_and(|re| re.is_match(line))
}
