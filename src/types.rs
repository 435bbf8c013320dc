use std::fmt;
use std::time::Duration;

use serde::Serialize;

use crate::codec;

/// The declared type of a configuration key. Drives both parsing and
/// validation dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    #[default]
    String,
    Int64,
    Float64,
    Bool,
    Duration,
    Url,
    StringList,
    Int64List,
}

impl ValueType {
    pub fn name(self) -> &'static str {
        match self {
            ValueType::String => "string",
            ValueType::Int64 => "int64",
            ValueType::Float64 => "float64",
            ValueType::Bool => "bool",
            ValueType::Duration => "duration",
            ValueType::Url => "url",
            ValueType::StringList => "[]string",
            ValueType::Int64List => "[]int64",
        }
    }

    pub fn is_list(self) -> bool {
        matches!(self, ValueType::StringList | ValueType::Int64List)
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A resolved, typed configuration value.
///
/// URLs are kept as the original (validated, not normalized) string, so the
/// string getters accept both [`Value::String`] and [`Value::Url`].
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Int64(i64),
    Float64(f64),
    Bool(bool),
    Duration(Duration),
    Url(String),
    StringList(Vec<String>),
    Int64List(Vec<i64>),
}

impl Value {
    /// The type tag this value carries.
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::String(_) => ValueType::String,
            Value::Int64(_) => ValueType::Int64,
            Value::Float64(_) => ValueType::Float64,
            Value::Bool(_) => ValueType::Bool,
            Value::Duration(_) => ValueType::Duration,
            Value::Url(_) => ValueType::Url,
            Value::StringList(_) => ValueType::StringList,
            Value::Int64List(_) => ValueType::Int64List,
        }
    }

    /// Text form for strings and URLs; `None` for every other kind.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) | Value::Url(s) => Some(s),
            _ => None,
        }
    }

    /// Numeric view used by the min/max rules.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Int64(i) => Some(*i as f64),
            Value::Float64(f) => Some(*f),
            _ => None,
        }
    }

    /// Item count for list kinds.
    pub fn list_len(&self) -> Option<usize> {
        match self {
            Value::StringList(items) => Some(items.len()),
            Value::Int64List(items) => Some(items.len()),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) | Value::Url(s) => f.write_str(s),
            Value::Int64(i) => write!(f, "{i}"),
            Value::Float64(v) => write!(f, "{v}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Duration(d) => f.write_str(&codec::format_duration(*d)),
            Value::StringList(items) => write!(f, "[{}]", items.join(", ")),
            Value::Int64List(items) => {
                let parts: Vec<String> = items.iter().map(i64::to_string).collect();
                write!(f, "[{}]", parts.join(", "))
            }
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int64(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int64(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float64(v)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<Duration> for Value {
    fn from(d: Duration) -> Self {
        Value::Duration(d)
    }
}

impl From<Vec<String>> for Value {
    fn from(items: Vec<String>) -> Self {
        Value::StringList(items)
    }
}

impl From<Vec<&str>> for Value {
    fn from(items: Vec<&str>) -> Self {
        Value::StringList(items.into_iter().map(str::to_string).collect())
    }
}

impl From<Vec<i64>> for Value {
    fn from(items: Vec<i64>) -> Self {
        Value::Int64List(items)
    }
}

/// Where a resolved value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    File,
    Flag,
    Env,
    Default,
    None,
}

impl Source {
    pub fn as_str(self) -> &'static str {
        match self {
            Source::File => "file",
            Source::Flag => "flag",
            Source::Env => "env",
            Source::Default => "default",
            Source::None => "none",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A config inspection operation, independent of any CLI framework.
/// The CLI layer converts parsed clap args into this.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigAction {
    /// Show every key with its resolved (masked) value.
    List,
    /// Show a single key.
    Get { key: String },
    /// Show the generated help for all definitions.
    Help,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_names_match_go_style_labels() {
        assert_eq!(ValueType::Int64.to_string(), "int64");
        assert_eq!(ValueType::StringList.to_string(), "[]string");
        assert_eq!(ValueType::Int64List.to_string(), "[]int64");
    }

    #[test]
    fn value_reports_its_type() {
        assert_eq!(Value::from(8080i64).value_type(), ValueType::Int64);
        assert_eq!(Value::Url("https://x.io".into()).value_type(), ValueType::Url);
        assert_eq!(Value::from(vec!["a"]).value_type(), ValueType::StringList);
    }

    #[test]
    fn url_values_expose_text() {
        let v = Value::Url("https://api.example.com".into());
        assert_eq!(v.as_str(), Some("https://api.example.com"));
        assert_eq!(Value::Int64(1).as_str(), None);
    }

    #[test]
    fn display_formats() {
        assert_eq!(Value::Float64(1.5).to_string(), "1.5");
        assert_eq!(Value::Float64(3.0).to_string(), "3");
        assert_eq!(Value::from(vec!["a", "b"]).to_string(), "[a, b]");
        assert_eq!(Value::Int64List(vec![1, 2]).to_string(), "[1, 2]");
        assert_eq!(
            Value::Duration(Duration::from_secs(90 * 60)).to_string(),
            "1h30m0s"
        );
    }

    #[test]
    fn source_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Source::Env).unwrap(), "\"env\"");
        assert_eq!(Source::Default.to_string(), "default");
    }
}
