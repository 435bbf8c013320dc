//! Advisory records for values that were shadowed by a higher-priority source.
//!
//! Nothing here affects resolution. Two kinds of records are produced:
//!
//! - **Source overrides**, per key: a flag beat an environment variable, a flag
//!   beat the default, or (with no flag) an environment variable beat the
//!   default.
//! - **Command overrides**, per command: a command redefines a global key with
//!   a different flag, env var, default, or extra rules.

use std::fmt::Write as _;

use indexmap::IndexMap;
use serde::Serialize;
use tracing::warn;

use crate::builder::Definition;
use crate::error::mask_secret;
use crate::resolve::Sources;

/// One shadowed value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OverrideWarning {
    pub key: String,
    /// Command name for command-scope overrides.
    pub command: Option<String>,
    /// The source that lost (`environment`, `default`, `global config`).
    pub source: String,
    /// The source that won (`flag`, `environment`, `command config`).
    pub override_by: String,
    pub old_value: String,
    pub new_value: String,
    pub message: String,
}

/// An ordered collection of [`OverrideWarning`]s.
#[derive(Debug, Clone, Default, Serialize)]
pub struct OverrideWarnings {
    warnings: Vec<OverrideWarning>,
}

impl OverrideWarnings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, warning: OverrideWarning) {
        self.warnings.push(warning);
    }

    pub fn extend(&mut self, other: OverrideWarnings) {
        self.warnings.extend(other.warnings);
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    pub fn warnings(&self) -> &[OverrideWarning] {
        &self.warnings
    }

    pub fn len(&self) -> usize {
        self.warnings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.warnings.is_empty()
    }

    /// Human-readable report, or an empty string when there is nothing to say.
    pub fn format_warnings(&self) -> String {
        if self.warnings.is_empty() {
            return String::new();
        }

        let rule = "=".repeat(50);
        let mut out = String::new();
        let _ = writeln!(out, "Warning: Configuration overrides detected");
        let _ = writeln!(out, "{rule}");

        for (i, w) in self.warnings.iter().enumerate() {
            match &w.command {
                Some(command) => {
                    let _ = writeln!(out, "{} (command: {command})", w.key);
                }
                None => {
                    let _ = writeln!(out, "{}", w.key);
                }
            }

            let mut line = format!("  {} -> {}", w.source, w.override_by);
            if !w.old_value.is_empty() || !w.new_value.is_empty() {
                let _ = write!(line, " ({} -> {})", w.old_value, w.new_value);
            }
            let _ = writeln!(out, "{line}");

            if !w.message.is_empty() {
                let _ = writeln!(out, "  Note: {}", w.message);
            }
            if i + 1 < self.warnings.len() {
                out.push('\n');
            }
        }

        let _ = writeln!(out, "{rule}");
        let _ = writeln!(out, "Total: {} override(s)", self.warnings.len());
        out
    }

    /// Emit one `warn` event per record.
    pub fn log_warnings(&self) {
        for w in &self.warnings {
            warn!(
                event = "confkit.override.detected",
                key = %w.key,
                command = w.command.as_deref().unwrap_or(""),
                overridden = %w.source,
                override_by = %w.override_by,
                old_value = %w.old_value,
                new_value = %w.new_value,
            );
        }
    }
}

/// Source-level overrides for every definition.
pub fn source_overrides<'d>(
    definitions: impl IntoIterator<Item = &'d Definition>,
    sources: &Sources<'_>,
) -> OverrideWarnings {
    let mut warnings = OverrideWarnings::new();

    for def in definitions {
        let shown = |value: &str| {
            if def.is_secret() {
                mask_secret(value)
            } else {
                value.to_string()
            }
        };
        let flag = sources.flag_value(def);
        let env = sources.env_value(def);
        let default = def.default_value().map(ToString::to_string);

        let mut record = |source: &str, override_by: &str, old: &str, new: &str, message: &str| {
            warnings.add(OverrideWarning {
                key: def.key().to_string(),
                command: None,
                source: source.to_string(),
                override_by: override_by.to_string(),
                old_value: shown(old),
                new_value: shown(new),
                message: message.to_string(),
            });
        };

        if let Some(file) = sources.file_value(def) {
            let beaten = [
                ("flag", &flag, "Config file overrides command-line flag"),
                ("environment", &env, "Config file overrides environment variable"),
                ("default", &default, "Config file overrides default value"),
            ];
            for (source, old, message) in beaten {
                if let Some(old) = old {
                    record(source, "config file", old, &file, message);
                }
            }
            continue;
        }

        if let (Some(flag), Some(env)) = (&flag, &env) {
            record(
                "environment",
                "flag",
                env,
                flag,
                "Command-line flag overrides environment variable",
            );
        }
        if let (Some(flag), Some(default)) = (&flag, &default) {
            record(
                "default",
                "flag",
                default,
                flag,
                "Command-line flag overrides default value",
            );
        }
        if flag.is_none()
            && let (Some(env), Some(default)) = (&env, &default)
        {
            record(
                "default",
                "environment",
                default,
                env,
                "Environment variable overrides default value",
            );
        }
    }

    warnings
}

/// Command-scope overrides of global definitions.
///
/// `global_value` renders the global config's current value for a key, or
/// `None` when it has none.
pub fn command_overrides<F>(
    command: &str,
    global: &IndexMap<String, Definition>,
    scoped: &IndexMap<String, Definition>,
    global_value: F,
) -> OverrideWarnings
where
    F: Fn(&str) -> Option<String>,
{
    let mut warnings = OverrideWarnings::new();

    for (key, command_def) in scoped {
        let Some(global_def) = global.get(key) else {
            continue;
        };
        if !should_warn(global_def, command_def) {
            continue;
        }
        warnings.add(OverrideWarning {
            key: key.clone(),
            command: Some(command.to_string()),
            source: "global config".to_string(),
            override_by: "command config".to_string(),
            old_value: global_value(key).unwrap_or_default(),
            new_value: String::new(),
            message: "Command-specific configuration overrides global configuration".to_string(),
        });
    }

    warnings
}

fn should_warn(global: &Definition, command: &Definition) -> bool {
    if global.same_shape(command) {
        return false;
    }
    if command.flag().is_some() && global.flag() != command.flag() {
        return true;
    }
    if command.env().is_some() && global.env() != command.env() {
        return true;
    }
    match (global.default_value(), command.default_value()) {
        (Some(a), Some(b)) => return a != b,
        (Some(_), None) | (None, Some(_)) => return true,
        (None, None) => {}
    }
    command.rules().len() > global.rules().len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::DefinitionBuilder;
    use crate::env::MapEnv;
    use crate::file::FileSource;
    use crate::flags::FlagValues;
    use serde_json::json;

    fn def(key: &str, f: impl FnOnce(DefinitionBuilder<'_>) -> DefinitionBuilder<'_>) -> Definition {
        let mut def = Definition::new(key);
        f(DefinitionBuilder::new(&mut def));
        def
    }

    fn defs(list: Vec<Definition>) -> IndexMap<String, Definition> {
        list.into_iter().map(|d| (d.key().to_string(), d)).collect()
    }

    fn check(def: &Definition, args: &[&str], env: &MapEnv) -> OverrideWarnings {
        let known: Vec<&str> = def.flag().into_iter().collect();
        let flags = FlagValues::parse(args, known.as_slice());
        let sources = Sources {
            files: None,
            flags: &flags,
            env,
        };
        source_overrides([def], &sources)
    }

    #[test]
    fn flag_over_env_and_default() {
        let d = def("PORT", |b| b.int64().env("PORT").flag("port").default(8080));
        let w = check(&d, &["--port", "1"], &MapEnv::new().with("PORT", "2"));
        assert_eq!(w.len(), 2);
        assert_eq!(w.warnings()[0].source, "environment");
        assert_eq!(w.warnings()[0].override_by, "flag");
        assert_eq!(w.warnings()[1].source, "default");
        assert_eq!(w.warnings()[1].old_value, "8080");
    }

    #[test]
    fn env_over_default_only_without_flag() {
        let d = def("PORT", |b| b.int64().env("PORT").flag("port").default(8080));
        let w = check(&d, &[], &MapEnv::new().with("PORT", "2"));
        assert_eq!(w.len(), 1);
        assert_eq!(w.warnings()[0].override_by, "environment");
        assert_eq!(w.warnings()[0].new_value, "2");
    }

    #[test]
    fn file_value_wins_over_flag_and_env() {
        let d = def("PORT", |b| b.int64().env("PORT").flag("port"));
        let mut files = FileSource::new();
        files.merge(json!({"port": 3000}).as_object().cloned().unwrap());
        let flags = FlagValues::parse(&["--port", "9000"], &["port"]);
        let env = MapEnv::new().with("PORT", "7000");
        let sources = Sources {
            files: Some(&files),
            flags: &flags,
            env: &env,
        };
        let w = source_overrides([&d], &sources);
        assert_eq!(w.len(), 2);
        assert!(w.warnings().iter().all(|w| w.override_by == "config file"));
        assert_eq!(w.warnings()[0].source, "flag");
        assert_eq!(w.warnings()[0].old_value, "9000");
        assert_eq!(w.warnings()[0].new_value, "3000");
        assert_eq!(w.warnings()[1].source, "environment");
        assert_eq!(w.warnings()[1].old_value, "7000");
    }

    #[test]
    fn nothing_shadowed_means_no_warnings() {
        let d = def("PORT", |b| b.int64().env("PORT").default(8080));
        assert!(!check(&d, &[], &MapEnv::new()).has_warnings());
    }

    #[test]
    fn secret_values_are_masked() {
        let d = def("TOKEN", |b| b.env("TOKEN").flag("token").secret());
        let env = MapEnv::new().with("TOKEN", "env-secret-1");
        let w = check(&d, &["--token=flag-secret-2"], &env);
        assert_eq!(w.warnings()[0].old_value, "en********-1");
        assert_eq!(w.warnings()[0].new_value, "fl*********-2");
    }

    #[test]
    fn command_override_with_different_flag() {
        let global = defs(vec![def("PORT", |b| b.int64().flag("port").default(8080))]);
        let scoped = defs(vec![def("PORT", |b| b.int64().flag("listen").default(8080))]);
        let w = command_overrides("serve", &global, &scoped, |_| Some("8080".into()));
        assert_eq!(w.len(), 1);
        let warning = &w.warnings()[0];
        assert_eq!(warning.command.as_deref(), Some("serve"));
        assert_eq!(warning.old_value, "8080");
        assert_eq!(warning.source, "global config");
    }

    #[test]
    fn identical_command_definition_is_silent() {
        let global = defs(vec![def("PORT", |b| b.int64().flag("port"))]);
        let scoped = defs(vec![def("PORT", |b| b.int64().flag("port"))]);
        assert!(command_overrides("serve", &global, &scoped, |_| None).is_empty());
    }

    #[test]
    fn command_only_keys_are_ignored() {
        let global = defs(vec![]);
        let scoped = defs(vec![def("WORKERS", |b| b.int64())]);
        assert!(command_overrides("serve", &global, &scoped, |_| None).is_empty());
    }

    #[test]
    fn extra_rules_trigger_warning_when_shape_differs() {
        let global = defs(vec![def("PORT", |b| b.int64())]);
        let scoped = defs(vec![def("PORT", |b| b.int64().required().min(1.0))]);
        assert_eq!(command_overrides("serve", &global, &scoped, |_| None).len(), 1);
    }

    #[test]
    fn format_lists_each_warning_and_total() {
        let mut w = OverrideWarnings::new();
        w.add(OverrideWarning {
            key: "PORT".into(),
            command: Some("serve".into()),
            source: "environment".into(),
            override_by: "flag".into(),
            old_value: "2".into(),
            new_value: "1".into(),
            message: "Command-line flag overrides environment variable".into(),
        });
        let out = w.format_warnings();
        assert!(out.starts_with("Warning: Configuration overrides detected\n"));
        assert!(out.contains("PORT (command: serve)\n"));
        assert!(out.contains("  environment -> flag (2 -> 1)\n"));
        assert!(out.contains("  Note: Command-line flag overrides environment variable\n"));
        assert!(out.ends_with("Total: 1 override(s)\n"));
    }

    #[test]
    fn format_empty_is_empty() {
        assert_eq!(OverrideWarnings::new().format_warnings(), "");
    }
}
