//! Per-key resolution: pick one value from the prioritized sources, parse it,
//! and validate it.
//!
//! Operates on already-loaded data ([`Sources`]) with no I/O, so every path is
//! testable with synthetic inputs. For each definition the sources are tried in
//! this order, stopping at the first one that supplies a non-empty value:
//!
//! 1. Config file (skipped when no file was loaded)
//! 2. Command-line flag
//! 3. Environment variable
//! 4. Default (already typed: not parsed, validated without `required`)
//! 5. Absence (an error only when the key is required)
//!
//! A parse or validation failure ends resolution of that key. Lower-priority
//! sources are never consulted as a fallback.

use crate::builder::Definition;
use crate::codec;
use crate::env::EnvSource;
use crate::error::{ConfigError, ErrorKind, ParseError, mask_secret};
use crate::file::FileSource;
use crate::flags::FlagValues;
use crate::types::{Source, Value};
use crate::validate::run_rules;

/// Everything resolution reads from.
pub struct Sources<'a> {
    pub files: Option<&'a FileSource>,
    pub flags: &'a FlagValues,
    pub env: &'a dyn EnvSource,
}

impl Sources<'_> {
    pub(crate) fn flag_value(&self, def: &Definition) -> Option<String> {
        def.flag()
            .and_then(|name| self.flags.get(name))
            .map(str::to_string)
    }

    pub(crate) fn env_value(&self, def: &Definition) -> Option<String> {
        def.env().and_then(|name| self.env.non_empty(name))
    }

    /// File value of `def` as text, when a loaded file supplies a non-empty one.
    pub(crate) fn file_value(&self, def: &Definition) -> Option<String> {
        let tree = self.files?.lookup(def.key())?;
        codec::stringify_file_value(tree, def.delimiter())
            .ok()
            .filter(|text| !text.is_empty())
    }
}

/// A successful resolution. `value` is `None` for an optional key nobody set.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
    pub value: Option<Value>,
    pub source: Source,
}

enum Candidate<'a> {
    File(&'a serde_json::Value, String),
    Text(Source, String),
}

/// Resolve one definition against `sources`.
pub fn resolve_definition(def: &Definition, sources: &Sources<'_>) -> Result<Resolved, ConfigError> {
    let fail = |source: Source, shown: String, message: String, kind: ErrorKind| {
        let value = if def.is_secret() && !shown.is_empty() {
            mask_secret(&shown)
        } else {
            shown
        };
        ConfigError {
            key: def.key().to_string(),
            source,
            value,
            message,
            kind,
        }
    };

    let candidate = match find_candidate(def, sources) {
        Ok(candidate) => candidate,
        Err(e) => {
            return Err(fail(Source::File, String::new(), e.to_string(), ErrorKind::UnsupportedFileValue));
        }
    };

    if let Some(candidate) = candidate {
        let (source, text, parsed) = match candidate {
            Candidate::File(tree, text) => {
                let parsed = codec::parse_file_value(tree, def.value_type(), def.delimiter());
                (Source::File, text, parsed)
            }
            Candidate::Text(source, text) => {
                let parsed = codec::parse(&text, def.value_type(), def.delimiter());
                (source, text, parsed)
            }
        };

        match parsed {
            Err(e) => return Err(fail(source, text, e.to_string(), ErrorKind::Parse)),
            Ok(Some(value)) => {
                return match run_rules(def.rules(), &value, false) {
                    Ok(()) => Ok(Resolved {
                        value: Some(value),
                        source,
                    }),
                    Err((rule, message)) => Err(fail(
                        source,
                        value.to_string(),
                        message,
                        ErrorKind::Validation {
                            rule: rule.to_string(),
                        },
                    )),
                };
            }
            Ok(None) => {}
        }
    }

    if let Some(default) = def.default_value() {
        return match run_rules(def.rules(), default, true) {
            Ok(()) => Ok(Resolved {
                value: Some(default.clone()),
                source: Source::Default,
            }),
            Err((rule, message)) => Err(fail(
                Source::Default,
                default.to_string(),
                message,
                ErrorKind::Validation {
                    rule: rule.to_string(),
                },
            )),
        };
    }

    if def.is_required() {
        return Err(fail(
            Source::None,
            String::new(),
            required_message(def, sources.files.is_some()),
            ErrorKind::RequiredMissing,
        ));
    }

    Ok(Resolved {
        value: None,
        source: Source::None,
    })
}

/// First source with a non-empty value, in priority order.
fn find_candidate<'a>(
    def: &Definition,
    sources: &Sources<'a>,
) -> Result<Option<Candidate<'a>>, ParseError> {
    if let Some(tree) = sources.files.and_then(|files| files.lookup(def.key())) {
        let text = codec::stringify_file_value(tree, def.delimiter())?;
        if !text.is_empty() {
            return Ok(Some(Candidate::File(tree, text)));
        }
    }
    if let Some(raw) = sources.flag_value(def) {
        return Ok(Some(Candidate::Text(Source::Flag, raw)));
    }
    if let Some(raw) = sources.env_value(def) {
        return Ok(Some(Candidate::Text(Source::Env, raw)));
    }
    Ok(None)
}

fn required_message(def: &Definition, files_loaded: bool) -> String {
    let mut places = Vec::new();
    if files_loaded {
        places.push("in file".to_string());
    }
    if let Some(env) = def.env() {
        places.push(env.to_string());
    }
    if let Some(flag) = def.flag() {
        places.push(format!("--{flag}"));
    }
    if places.is_empty() {
        "required value not provided".to_string()
    } else {
        format!("required value not provided (set {})", places.join(" or "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::DefinitionBuilder;
    use crate::env::MapEnv;
    use serde_json::json;
    use std::time::Duration;

    fn def(key: &str, f: impl FnOnce(DefinitionBuilder<'_>) -> DefinitionBuilder<'_>) -> Definition {
        let mut def = Definition::new(key);
        f(DefinitionBuilder::new(&mut def));
        def
    }

    fn files(tree: serde_json::Value) -> FileSource {
        let mut source = FileSource::new();
        if let serde_json::Value::Object(map) = tree {
            source.merge(map);
        }
        source
    }

    fn resolve(
        def: &Definition,
        files: Option<&FileSource>,
        args: &[&str],
        env: &MapEnv,
    ) -> Result<Resolved, ConfigError> {
        let known: Vec<&str> = def.flag().into_iter().collect();
        let flags = FlagValues::parse(args, known.as_slice());
        let sources = Sources { files, flags: &flags, env };
        resolve_definition(def, &sources)
    }

    #[test]
    fn default_used_when_nothing_set() {
        let d = def("PORT", |b| b.int64().env("PORT").default(8080));
        let r = resolve(&d, None, &[], &MapEnv::new()).unwrap();
        assert_eq!(r.value, Some(Value::Int64(8080)));
        assert_eq!(r.source, Source::Default);
    }

    #[test]
    fn env_beats_default() {
        let d = def("PORT", |b| b.int64().env("PORT").default(8080));
        let r = resolve(&d, None, &[], &MapEnv::new().with("PORT", "9000")).unwrap();
        assert_eq!(r.value, Some(Value::Int64(9000)));
        assert_eq!(r.source, Source::Env);
    }

    #[test]
    fn flag_beats_env() {
        let d = def("PORT", |b| b.int64().env("PORT").flag("port"));
        let env = MapEnv::new().with("PORT", "9000");
        let r = resolve(&d, None, &["--port", "7000"], &env).unwrap();
        assert_eq!(r.value, Some(Value::Int64(7000)));
        assert_eq!(r.source, Source::Flag);
    }

    #[test]
    fn file_beats_flag_and_env() {
        let d = def("PORT", |b| b.int64().env("PORT").flag("port"));
        let f = files(json!({"port": 3000}));
        let env = MapEnv::new().with("PORT", "9000");
        let r = resolve(&d, Some(&f), &["--port=7000"], &env).unwrap();
        assert_eq!(r.value, Some(Value::Int64(3000)));
        assert_eq!(r.source, Source::File);
    }

    #[test]
    fn empty_file_value_falls_through() {
        let d = def("HOST", |b| b.env("HOST"));
        let f = files(json!({"HOST": ""}));
        let r = resolve(&d, Some(&f), &[], &MapEnv::new().with("HOST", "from-env")).unwrap();
        assert_eq!(r.source, Source::Env);
    }

    #[test]
    fn null_file_value_is_absent() {
        let d = def("HOST", |b| b.default("fallback"));
        let f = files(json!({"HOST": null}));
        let r = resolve(&d, Some(&f), &[], &MapEnv::new()).unwrap();
        assert_eq!(r.source, Source::Default);
    }

    #[test]
    fn empty_env_value_is_absent() {
        let d = def("HOST", |b| b.env("HOST"));
        let r = resolve(&d, None, &[], &MapEnv::new().with("HOST", "")).unwrap();
        assert_eq!(r, Resolved { value: None, source: Source::None });
    }

    #[test]
    fn parse_error_does_not_fall_back() {
        let d = def("PORT", |b| b.int64().env("PORT").default(8080));
        let err = resolve(&d, None, &[], &MapEnv::new().with("PORT", "abc")).unwrap_err();
        assert_eq!(err.source, Source::Env);
        assert_eq!(err.value, "abc");
        assert_eq!(err.kind, ErrorKind::Parse);
    }

    #[test]
    fn validation_error_names_rule() {
        let d = def("PORT", |b| b.int64().env("PORT").default(8080).range(1.0, 65535.0));
        let err = resolve(&d, None, &[], &MapEnv::new().with("PORT", "99999")).unwrap_err();
        assert_eq!(err.message, "value 99999 is greater than maximum 65535");
        assert_eq!(err.kind, ErrorKind::Validation { rule: "max(65535)".into() });
        assert_eq!(err.to_string(), "PORT (env=99999): value 99999 is greater than maximum 65535");
    }

    #[test]
    fn default_skips_required_but_not_other_rules() {
        let ok = def("NAME", |b| b.required().default(""));
        assert_eq!(
            resolve(&ok, None, &[], &MapEnv::new()).unwrap().source,
            Source::Default
        );

        let bad = def("WORKERS", |b| b.int64().default(0).min(1.0));
        let err = resolve(&bad, None, &[], &MapEnv::new()).unwrap_err();
        assert_eq!(err.source, Source::Default);
        assert_eq!(err.value, "0");
    }

    #[test]
    fn required_missing_names_places_to_set() {
        let d = def("API_KEY", |b| b.env("API_KEY").flag("api-key").required());
        let err = resolve(&d, None, &[], &MapEnv::new()).unwrap_err();
        assert_eq!(err.kind, ErrorKind::RequiredMissing);
        assert_eq!(err.source, Source::None);
        assert_eq!(err.message, "required value not provided (set API_KEY or --api-key)");
    }

    #[test]
    fn whitespace_file_value_satisfies_required() {
        let d = def("NAME", |b| b.required());
        let f = files(json!({"NAME": "  "}));
        assert!(resolve(&d, Some(&f), &[], &MapEnv::new()).is_ok());
    }

    #[test]
    fn secret_values_are_masked_in_errors() {
        let d = def("TOKEN", |b| b.env("TOKEN").secret().min_length(32));
        let err = resolve(&d, None, &[], &MapEnv::new().with("TOKEN", "s3cr3t-val")).unwrap_err();
        assert_eq!(err.value, "s3******al");
    }

    #[test]
    fn file_table_value_is_unsupported() {
        let d = def("DATABASE", |b| b);
        let f = files(json!({"database": {"url": "x"}}));
        let err = resolve(&d, Some(&f), &[], &MapEnv::new()).unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnsupportedFileValue);
        assert_eq!(err.source, Source::File);
    }

    #[test]
    fn file_list_reaches_list_type_directly() {
        let d = def("TAGS", |b| b.string_list().min_items(2));
        let f = files(json!({"tags": ["a,b", "c"]}));
        let r = resolve(&d, Some(&f), &[], &MapEnv::new()).unwrap();
        assert_eq!(r.value, Some(Value::from(vec!["a,b", "c"])));
    }

    #[test]
    fn file_duration_and_environment_override() {
        let d = def("TIMEOUT", |b| b.duration());
        let mut f = files(json!({
            "timeout": "30s",
            "environments": {"production": {"timeout": "2m"}}
        }));
        f.set_environment("production");
        let r = resolve(&d, Some(&f), &[], &MapEnv::new()).unwrap();
        assert_eq!(r.value, Some(Value::Duration(Duration::from_secs(120))));
    }
}
