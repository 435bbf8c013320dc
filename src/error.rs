use std::fmt;
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

use crate::types::Source;

/// Failures of the file-loading and environment-selection surface.
#[derive(Debug, Error)]
pub enum ConfkitError {
    #[error("Failed to read {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Unsupported config file format '{extension}' for {path}")]
    UnsupportedFormat { path: PathBuf, extension: String },

    #[error("Failed to parse {format} file {path}: {reason}")]
    FileParse {
        path: PathBuf,
        format: String,
        reason: String,
    },

    #[error("Config file {path} does not contain a top-level table")]
    FileTreeNotTable { path: PathBuf },

    #[error("No configuration files loaded; load a file before selecting an environment")]
    NoFilesLoaded,
}

/// A raw value that does not fit its declared type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("invalid int64: {0}")]
    InvalidInt(String),

    #[error("invalid float64: {0}")]
    InvalidFloat(String),

    #[error("invalid bool: {0} (use true/false or 1/0)")]
    InvalidBool(String),

    #[error("invalid duration: {0} (use format like 15m, 1h30m, 7d)")]
    InvalidDuration(String),

    #[error("invalid URL ({reason}): {raw}")]
    InvalidUrl { raw: String, reason: String },

    #[error("invalid int64 in list: {0}")]
    InvalidListItem(String),

    #[error("unsupported file value type: {found}")]
    UnsupportedFileValue { found: String },
}

/// Misuse of the typed read API. These are programmer errors, not
/// configuration-input errors, and are never collected by `process()`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GetError {
    #[error("key '{0}' not found (did you define it?)")]
    UnknownKey(String),

    #[error("key '{0}' has no value")]
    NotSet(String),

    #[error("key '{0}' is a secret, use get_secret() instead")]
    Secret(String),

    #[error("key '{key}' has type {found}, not {expected}")]
    TypeMismatch {
        key: String,
        expected: &'static str,
        found: &'static str,
    },
}

/// Failures surfaced by the command dispatcher and middleware.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("unknown command: {name:?}\nDid you mean: {suggestions}?")]
    UnknownCommand { name: String, suggestions: String },

    #[error("configuration errors: {} error(s)", .0.len())]
    Configuration(Vec<ConfigError>),

    #[error("authentication failed: {0}")]
    AuthFailed(String),

    #[error("rate limit exceeded: {max} executions allowed per {window}")]
    RateLimited { max: usize, window: String },

    #[error("command {command} panicked: {message}")]
    Panicked { command: String, message: String },

    #[error("command {0} has no handler")]
    NoHandler(String),

    #[error("{0}")]
    Message(String),

    #[error(transparent)]
    Failed(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl CommandError {
    pub fn msg(message: impl Into<String>) -> Self {
        CommandError::Message(message.into())
    }
}

/// Category of a per-key resolution failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ErrorKind {
    Parse,
    Validation { rule: String },
    RequiredMissing,
    UnsupportedFileValue,
}

/// One failing key from a `process()` run.
///
/// `value` is already masked when the key is a secret.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfigError {
    pub key: String,
    pub source: Source,
    pub value: String,
    pub message: String,
    pub kind: ErrorKind,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.source == Source::None {
            return write!(f, "{}: {}", self.key, self.message);
        }
        if self.value.is_empty() {
            write!(f, "{} ({}): {}", self.key, self.source, self.message)
        } else {
            write!(
                f,
                "{} ({}={}): {}",
                self.key, self.source, self.value, self.message
            )
        }
    }
}

impl std::error::Error for ConfigError {}

const BOX_WIDTH: usize = 64;

fn boxed_line(out: &mut String, text: &str) {
    out.push_str(&format!("║  {text:<width$}║\n", width = BOX_WIDTH));
}

/// Render an error list for humans: one block per error, then the total.
pub fn format_errors(errors: &[ConfigError]) -> String {
    if errors.is_empty() {
        return String::new();
    }

    let rule = "═".repeat(BOX_WIDTH + 2);
    let mut out = String::from("\n");
    out.push_str(&format!("╔{rule}╗\n"));
    boxed_line(&mut out, "CONFIGURATION ERRORS");
    out.push_str(&format!("╠{rule}╣\n"));

    for (i, err) in errors.iter().enumerate() {
        boxed_line(&mut out, &format!("✗ {}", err.key));
        if err.source != Source::None {
            let mut source_info = format!("   Source: {}", err.source);
            if !err.value.is_empty() {
                source_info.push_str(&format!(" = {}", err.value));
            }
            boxed_line(&mut out, &source_info);
        }
        boxed_line(&mut out, &format!("   Error: {}", err.message));
        if i < errors.len() - 1 {
            boxed_line(&mut out, &"─".repeat(BOX_WIDTH - 4));
        }
    }

    out.push_str(&format!("╠{rule}╣\n"));
    boxed_line(&mut out, &format!("Total: {} error(s)", errors.len()));
    out.push_str(&format!("╚{rule}╝\n"));
    out
}

/// Mask a secret for display.
///
/// Four characters or fewer collapse to `****`. Longer values keep their first
/// and last two characters with every character in between replaced, so the
/// masked form has the original length.
pub fn mask_secret(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() <= 4 {
        return "****".to_string();
    }
    let mut out = String::with_capacity(value.len());
    out.extend(&chars[..2]);
    out.push_str(&"*".repeat(chars.len() - 4));
    out.extend(&chars[chars.len() - 2..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sample(source: Source, value: &str) -> ConfigError {
        ConfigError {
            key: "PORT".into(),
            source,
            value: value.into(),
            message: "value 99999 is greater than maximum 65535".into(),
            kind: ErrorKind::Validation {
                rule: "max(65535)".into(),
            },
        }
    }

    #[test]
    fn config_error_display_with_value() {
        let err = sample(Source::Env, "99999");
        assert_eq!(
            err.to_string(),
            "PORT (env=99999): value 99999 is greater than maximum 65535"
        );
    }

    #[test]
    fn config_error_display_without_value() {
        let err = sample(Source::Flag, "");
        assert!(err.to_string().starts_with("PORT (flag): "));
    }

    #[test]
    fn config_error_display_for_missing_source() {
        let err = ConfigError {
            key: "API_KEY".into(),
            source: Source::None,
            value: String::new(),
            message: "required value not provided".into(),
            kind: ErrorKind::RequiredMissing,
        };
        assert_eq!(err.to_string(), "API_KEY: required value not provided");
    }

    #[test]
    fn config_error_serializes_kind_tag() {
        let json = serde_json::to_value(sample(Source::Env, "99999")).unwrap();
        assert_eq!(json["source"], "env");
        assert_eq!(json["kind"]["type"], "validation");
        assert_eq!(json["kind"]["rule"], "max(65535)");
    }

    #[test]
    fn format_errors_empty_is_empty() {
        assert_eq!(format_errors(&[]), "");
    }

    #[test]
    fn format_errors_lists_each_error_and_total() {
        let out = format_errors(&[sample(Source::Env, "99999"), sample(Source::Flag, "0")]);
        assert!(out.contains("CONFIGURATION ERRORS"));
        assert!(out.contains("Source: env = 99999"));
        assert!(out.contains("Source: flag = 0"));
        assert!(out.contains("Total: 2 error(s)"));
    }

    #[test]
    fn mask_short_values() {
        assert_eq!(mask_secret(""), "****");
        assert_eq!(mask_secret("abcd"), "****");
    }

    #[test]
    fn mask_long_values() {
        assert_eq!(mask_secret("s3cr3t-val"), "s3******al");
        assert_eq!(mask_secret("abcde"), "ab*de");
    }

    #[test]
    fn command_error_messages() {
        let err = CommandError::UnknownCommand {
            name: "strat".into(),
            suggestions: "start".into(),
        };
        assert!(err.to_string().contains("Did you mean: start?"));
        assert_eq!(CommandError::msg("boom").to_string(), "boom");
    }

    #[test]
    fn get_error_formats() {
        let err = GetError::TypeMismatch {
            key: "PORT".into(),
            expected: "string",
            found: "int64",
        };
        assert_eq!(err.to_string(), "key 'PORT' has type int64, not string");
    }

    proptest! {
        #[test]
        fn mask_short_is_fixed_token(s in "\\PC{0,4}") {
            prop_assert_eq!(mask_secret(&s), "****");
        }

        #[test]
        fn mask_long_keeps_edges_and_length(s in "\\PC{5,40}") {
            let masked = mask_secret(&s);
            let original: Vec<char> = s.chars().collect();
            let out: Vec<char> = masked.chars().collect();
            prop_assert_eq!(out.len(), original.len());
            prop_assert_eq!(&out[..2], &original[..2]);
            prop_assert_eq!(&out[out.len() - 2..], &original[original.len() - 2..]);
            prop_assert!(out[2..out.len() - 2].iter().all(|c| *c == '*'));
        }
    }
}
