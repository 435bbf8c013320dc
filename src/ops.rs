//! Config inspection operations and their result types.
//!
//! Provides the logic behind `config list`, `config get`, and `config help`,
//! and the `ConfigResult` enum that callers use to display results. Values
//! come from [`Config::dump`], so secrets are never shown.

use std::fmt;

use crate::config::Config;
use crate::error::GetError;
use crate::types::ConfigAction;

/// Result of a config operation. Returned to the caller for display.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigResult {
    /// Every declared key with its display value.
    Listing { entries: Vec<(String, String)> },
    /// One key's display value and its description.
    KeyValue {
        key: String,
        value: String,
        doc: Vec<String>,
    },
    /// The generated help for every definition.
    Help(String),
}

impl fmt::Display for ConfigResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigResult::Listing { entries } => {
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        writeln!(f)?;
                    }
                    write!(f, "{key} = {value}")?;
                }
                Ok(())
            }
            ConfigResult::KeyValue { key, value, doc } => {
                for line in doc {
                    writeln!(f, "# {line}")?;
                }
                write!(f, "{key} = {value}")
            }
            ConfigResult::Help(text) => write!(f, "{text}"),
        }
    }
}

impl Config {
    /// Run a config inspection action against the resolved values.
    pub fn handle(&self, action: &ConfigAction) -> Result<ConfigResult, GetError> {
        match action {
            ConfigAction::List => Ok(ConfigResult::Listing {
                entries: self.dump().into_iter().collect(),
            }),
            ConfigAction::Get { key } => self.describe(key),
            ConfigAction::Help => Ok(ConfigResult::Help(self.generate_help())),
        }
    }

    fn describe(&self, key: &str) -> Result<ConfigResult, GetError> {
        let def = self
            .definition(key)
            .ok_or_else(|| GetError::UnknownKey(key.to_string()))?;
        let mut dump = self.dump();
        let value = dump.swap_remove(key).unwrap_or_default();
        let doc = def
            .description()
            .map(|d| d.lines().map(str::to_string).collect())
            .unwrap_or_default();
        Ok(ConfigResult::KeyValue {
            key: key.to_string(),
            value,
            doc,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::test::{server_config, server_env};

    fn processed() -> Config {
        let mut config = server_config(server_env());
        assert!(config.process().is_empty());
        config
    }

    #[test]
    fn list_includes_all_keys_in_order() {
        let result = processed().handle(&ConfigAction::List).unwrap();
        match result {
            ConfigResult::Listing { entries } => {
                let keys: Vec<&str> = entries.iter().map(|(k, _)| k.as_str()).collect();
                assert_eq!(keys, ["PORT", "HOST", "API_KEY", "TIMEOUT", "TAGS"]);
            }
            other => panic!("Expected Listing, got {other:?}"),
        }
    }

    #[test]
    fn list_masks_secrets_and_marks_unset() {
        let result = processed().handle(&ConfigAction::List).unwrap();
        match result {
            ConfigResult::Listing { entries } => {
                let api_key = entries.iter().find(|(k, _)| k == "API_KEY").unwrap();
                assert_eq!(api_key.1, "[SECRET:10 bytes]");
                let tags = entries.iter().find(|(k, _)| k == "TAGS").unwrap();
                assert_eq!(tags.1, "[not set]");
            }
            other => panic!("Expected Listing, got {other:?}"),
        }
    }

    #[test]
    fn get_includes_description() {
        let result = processed()
            .handle(&ConfigAction::Get { key: "PORT".into() })
            .unwrap();
        match result {
            ConfigResult::KeyValue { value, doc, .. } => {
                assert_eq!(value, "8080");
                assert_eq!(doc, ["HTTP listen port"]);
            }
            other => panic!("Expected KeyValue, got {other:?}"),
        }
    }

    #[test]
    fn get_unknown_key() {
        let result = processed().handle(&ConfigAction::Get { key: "NOPE".into() });
        assert_eq!(result, Err(GetError::UnknownKey("NOPE".into())));
    }

    #[test]
    fn help_is_generated_help() {
        let config = processed();
        let result = config.handle(&ConfigAction::Help).unwrap();
        assert_eq!(result, ConfigResult::Help(config.generate_help()));
    }

    #[test]
    fn listing_display_format() {
        let result = ConfigResult::Listing {
            entries: vec![
                ("HOST".into(), "localhost".into()),
                ("PORT".into(), "8080".into()),
            ],
        };
        assert_eq!(format!("{result}"), "HOST = localhost\nPORT = 8080");
    }

    #[test]
    fn key_value_display_format() {
        let result = ConfigResult::KeyValue {
            key: "PORT".into(),
            value: "8080".into(),
            doc: vec!["HTTP listen port".into()],
        };
        assert_eq!(format!("{result}"), "# HTTP listen port\nPORT = 8080");
    }
}
