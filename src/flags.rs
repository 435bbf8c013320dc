//! Command-line flag values keyed by flag name.
//!
//! Only flag names that some definition declares are collected; everything
//! else is left alone so a host CLI can own the rest of the argument vector.

use std::collections::HashMap;

/// Flag name → raw value, plus the arguments that were not flags.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlagValues {
    values: HashMap<String, String>,
    positional: Vec<String>,
}

impl FlagValues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `args` (without the program name) against the `known` flag names.
    ///
    /// Accepts `--name value`, `--name=value`, `-name value` and `-name=value`.
    /// Unknown flags are skipped, `--` ends flag parsing, and a repeated flag
    /// keeps its last value.
    pub fn parse<S, K>(args: &[S], known: &[K]) -> Self
    where
        S: AsRef<str>,
        K: AsRef<str>,
    {
        let is_known = |name: &str| known.iter().any(|k| k.as_ref() == name);
        let mut flags = FlagValues::new();
        let mut iter = args.iter().map(S::as_ref);

        while let Some(arg) = iter.next() {
            if arg == "--" {
                flags.positional.extend(iter.by_ref().map(str::to_string));
                break;
            }
            let Some(body) = flag_body(arg) else {
                flags.positional.push(arg.to_string());
                continue;
            };

            match body.split_once('=') {
                Some((name, value)) => {
                    if is_known(name) {
                        flags.set(name, value);
                    }
                }
                None if is_known(body) => {
                    if let Some(value) = iter.next() {
                        flags.set(body, value);
                    }
                }
                None => {}
            }
        }
        flags
    }

    pub fn set(&mut self, name: &str, value: &str) {
        self.values.insert(name.to_string(), value.to_string());
    }

    /// Raw value for `name`; empty values count as unset.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values
            .get(name)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    /// Lay `other` over these values: its flags win and its positional
    /// arguments replace ours.
    pub fn overlay(&mut self, other: FlagValues) {
        self.values.extend(other.values);
        self.positional = other.positional;
    }

    pub fn positional(&self) -> &[String] {
        &self.positional
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Every collected flag, for handing to command contexts.
    pub fn to_map(&self) -> HashMap<String, String> {
        self.values.clone()
    }
}

/// Strip one or two leading dashes. A lone `-` is a positional argument.
fn flag_body(arg: &str) -> Option<&str> {
    let body = arg
        .strip_prefix("--")
        .or_else(|| arg.strip_prefix('-'))?;
    (!body.is_empty() && !body.starts_with('-')).then_some(body)
}

#[cfg(test)]
mod tests {
    use super::*;

    const KNOWN: &[&str] = &["port", "host", "verbose"];

    #[test]
    fn space_and_equals_forms() {
        let flags = FlagValues::parse(&["--port", "9000", "-host=example.com"], KNOWN);
        assert_eq!(flags.get("port"), Some("9000"));
        assert_eq!(flags.get("host"), Some("example.com"));
    }

    #[test]
    fn single_dash_with_separate_value() {
        let flags = FlagValues::parse(&["-port", "1234"], KNOWN);
        assert_eq!(flags.get("port"), Some("1234"));
    }

    #[test]
    fn unknown_flags_are_skipped() {
        let flags = FlagValues::parse(&["--other=1", "--port", "80"], KNOWN);
        assert_eq!(flags.get("port"), Some("80"));
        assert_eq!(flags.get("other"), None);
    }

    #[test]
    fn positional_args_are_kept() {
        let flags = FlagValues::parse(&["file.txt", "--port", "80", "-", "extra"], KNOWN);
        assert_eq!(flags.positional(), ["file.txt", "-", "extra"]);
    }

    #[test]
    fn double_dash_ends_flags() {
        let flags = FlagValues::parse(&["--", "--port", "80"], KNOWN);
        assert_eq!(flags.get("port"), None);
        assert_eq!(flags.positional(), ["--port", "80"]);
    }

    #[test]
    fn trailing_flag_without_value_is_ignored() {
        let flags = FlagValues::parse(&["--port"], KNOWN);
        assert!(flags.is_empty());
    }

    #[test]
    fn empty_value_counts_as_unset() {
        let flags = FlagValues::parse(&["--host="], KNOWN);
        assert_eq!(flags.get("host"), None);
    }

    #[test]
    fn last_occurrence_wins() {
        let flags = FlagValues::parse(&["--port=1", "--port=2"], KNOWN);
        assert_eq!(flags.get("port"), Some("2"));
    }
}
