//! The [`Config`] registry: declared keys in, resolved values out.
//!
//! A config owns its definitions, the loaded file data, the injected
//! environment, the flag values, and (after [`Config::process`]) the resolved
//! values. Secret values never enter the general value map; they live in a
//! [`SecretStore`] and the value map only records that the key is set.

use std::collections::HashMap;
use std::fmt;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::{Map, Value as TreeValue};
use tracing::{debug, info, warn};

use crate::builder::{Definition, DefinitionBuilder, define_in};
use crate::command::{Command, Middleware};
use crate::env::{EnvSource, ProcessEnv};
use crate::error::{ConfigError, ConfkitError, format_errors};
use crate::file::{self, FileFormat, FileSource};
use crate::flags::FlagValues;
use crate::overrides::{self, OverrideWarnings};
use crate::resolve::{Resolved, Sources, resolve_definition};
use crate::secret::{SecretStore, SecureString};
use crate::types::Value;

const NOT_SET: &str = "[not set]";

/// What the value map holds for a resolved key.
#[derive(Debug, Clone)]
pub(crate) enum Stored {
    Plain(Value),
    /// The value lives in the secret store.
    Secret,
}

/// A set of declared configuration keys and their resolved values.
///
/// ```
/// use confkit::{Config, MapEnv};
///
/// let mut config = Config::with_env(MapEnv::new().with("PORT", "9000"));
/// config.define("PORT").int64().env("PORT").default(8080);
/// config.define("API_KEY").env("API_KEY").secret();
///
/// assert!(config.process().is_empty());
/// assert_eq!(config.get_int64("PORT"), 9000);
/// assert!(!config.get_secret("API_KEY").is_set());
/// ```
pub struct Config {
    pub(crate) definitions: IndexMap<String, Definition>,
    pub(crate) values: HashMap<String, Stored>,
    pub(crate) secrets: SecretStore,
    pub(crate) args: Vec<String>,
    pub(crate) preset_flags: Option<FlagValues>,
    pub(crate) flags: FlagValues,
    pub(crate) env: Arc<dyn EnvSource>,
    pub(crate) files: Option<FileSource>,
    pub(crate) commands: IndexMap<String, Command>,
    pub(crate) middleware: Vec<Middleware>,
    pub(crate) override_warnings: OverrideWarnings,
    processed: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("definitions", &self.definitions.keys().collect::<Vec<_>>())
            .field("commands", &self.commands.keys().collect::<Vec<_>>())
            .field("loaded_files", &self.loaded_files())
            .field("processed", &self.processed)
            .finish_non_exhaustive()
    }
}

impl Config {
    /// An empty config reading the process environment, with no flags.
    pub fn new() -> Self {
        Self {
            definitions: IndexMap::new(),
            values: HashMap::new(),
            secrets: SecretStore::new(),
            args: Vec::new(),
            preset_flags: None,
            flags: FlagValues::new(),
            env: Arc::new(ProcessEnv),
            files: None,
            commands: IndexMap::new(),
            middleware: Vec::new(),
            override_warnings: OverrideWarnings::new(),
            processed: false,
        }
    }

    /// An empty config reading environment variables from `env`.
    pub fn with_env(env: impl EnvSource + 'static) -> Self {
        let mut config = Self::new();
        config.env = Arc::new(env);
        config
    }

    pub fn set_env(&mut self, env: impl EnvSource + 'static) {
        self.env = Arc::new(env);
    }

    /// Use `args` (without the program name) as the flag source.
    ///
    /// The arguments are parsed at [`process`](Self::process) time, against
    /// whatever flag names are declared by then.
    pub fn set_args<I, S>(&mut self, args: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self.preset_flags = None;
    }

    /// Use already-parsed flag values, bypassing argument parsing.
    pub fn set_flags(&mut self, flags: FlagValues) {
        self.preset_flags = Some(flags);
    }

    /// Flag values seen by the last [`process`](Self::process) run.
    pub fn flags(&self) -> &FlagValues {
        &self.flags
    }

    /// An unprocessed config over `definitions` that shares this config's
    /// file data and environment. Its flags are this config's flag source
    /// with the flags parsed from `args` laid over it.
    pub(crate) fn child(&self, definitions: IndexMap<String, Definition>, args: Vec<String>) -> Config {
        let known: Vec<&str> = definitions.values().filter_map(Definition::flag).collect();
        let mut flags = match &self.preset_flags {
            Some(flags) => flags.clone(),
            None => FlagValues::parse(self.args.as_slice(), known.as_slice()),
        };
        flags.overlay(FlagValues::parse(args.as_slice(), known.as_slice()));

        let mut child = Config::new();
        child.definitions = definitions;
        child.args = args;
        child.preset_flags = Some(flags);
        child.env = Arc::clone(&self.env);
        child.files = self.files.clone();
        child
    }

    /// Declare `key`, replacing any earlier definition with the same name.
    pub fn define(&mut self, key: &str) -> DefinitionBuilder<'_> {
        define_in(&mut self.definitions, key)
    }

    pub fn definition(&self, key: &str) -> Option<&Definition> {
        self.definitions.get(key)
    }

    /// Definitions in declaration order.
    pub fn definitions(&self) -> impl Iterator<Item = &Definition> {
        self.definitions.values()
    }

    /// Resolve every definition and return all failures.
    ///
    /// Failures are collected in declaration order; a failing key does not
    /// stop the others. Running this again starts from scratch: previous
    /// values are dropped and previous secret handles wiped.
    pub fn process(&mut self) -> Vec<ConfigError> {
        if self.processed {
            self.values.clear();
            self.secrets.destroy_all();
        }
        self.processed = true;

        let known: Vec<&str> = self
            .definitions
            .values()
            .filter_map(Definition::flag)
            .collect();
        self.flags = match &self.preset_flags {
            Some(flags) => flags.clone(),
            None => FlagValues::parse(self.args.as_slice(), known.as_slice()),
        };

        let sources = Sources {
            files: self.files.as_ref(),
            flags: &self.flags,
            env: &*self.env,
        };
        let mut errors = Vec::new();

        for def in self.definitions.values() {
            match resolve_definition(def, &sources) {
                Ok(Resolved {
                    value: Some(value),
                    source,
                }) => {
                    debug!(
                        event = "confkit.resolve.resolved",
                        key = def.key(),
                        source = %source,
                        secret = def.is_secret(),
                    );
                    if def.is_secret() {
                        self.secrets.store(def.key(), secret_text(&value, def.delimiter()));
                        self.values.insert(def.key().to_string(), Stored::Secret);
                    } else {
                        self.values
                            .insert(def.key().to_string(), Stored::Plain(value));
                    }
                }
                Ok(Resolved { value: None, .. }) => {
                    debug!(event = "confkit.resolve.unset", key = def.key());
                }
                Err(e) => {
                    debug!(
                        event = "confkit.resolve.failed",
                        key = def.key(),
                        source = %e.source,
                        kind = ?e.kind,
                    );
                    errors.push(e);
                }
            }
        }

        let warnings = overrides::source_overrides(self.definitions.values(), &sources);
        if warnings.has_warnings() {
            warnings.log_warnings();
        }
        self.override_warnings = warnings;

        if errors.is_empty() {
            info!(
                event = "confkit.process.completed",
                keys = self.definitions.len(),
                set = self.values.len(),
                overrides = self.override_warnings.len(),
            );
        } else {
            warn!(
                event = "confkit.process.failed",
                keys = self.definitions.len(),
                errors = errors.len(),
            );
        }
        errors
    }

    /// True when `key` resolved to a value (secrets included).
    pub fn has(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Declared keys in declaration order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.definitions.keys().map(String::as_str)
    }

    pub fn is_secret(&self, key: &str) -> bool {
        self.definitions.get(key).is_some_and(Definition::is_secret)
    }

    /// The protected handle for a secret key. Unknown or unset keys give an
    /// unset handle.
    pub fn get_secret(&self, key: &str) -> &SecureString {
        self.secrets.get(key)
    }

    /// Every declared key with a display string. Secrets show only their size.
    pub fn dump(&self) -> IndexMap<String, String> {
        self.definitions
            .values()
            .map(|def| {
                let shown = if def.is_secret() {
                    secret_summary(self.secrets.get(def.key()))
                } else {
                    match self.values.get(def.key()) {
                        Some(Stored::Plain(value)) => value.to_string(),
                        _ => NOT_SET.to_string(),
                    }
                };
                (def.key().to_string(), shown)
            })
            .collect()
    }

    /// Current value of `key` for display, or `None` when it has none.
    pub(crate) fn display_value(&self, key: &str) -> Option<String> {
        match self.values.get(key)? {
            Stored::Plain(value) => Some(value.to_string()),
            Stored::Secret => Some(secret_summary(self.secrets.get(key))),
        }
    }

    /// Human-readable description of every definition.
    pub fn generate_help(&self) -> String {
        let mut out = String::from("Configuration Options:\n\n");

        for def in self.definitions.values() {
            let _ = writeln!(out, "  {}", def.key());
            let _ = writeln!(out, "    Type: {}", def.value_type());
            if let Some(env) = def.env() {
                let _ = writeln!(out, "    Env:  {env}");
            }
            if let Some(flag) = def.flag() {
                let _ = writeln!(out, "    Flag: --{flag}");
            }
            if def.is_required() {
                out.push_str("    Required: yes\n");
            }
            if def.is_secret() {
                out.push_str("    Secret: yes (protected in memory)\n");
            }
            if let Some(default) = def.default_value() {
                if def.is_secret() {
                    out.push_str("    Default: [hidden]\n");
                } else {
                    let _ = writeln!(out, "    Default: {default}");
                }
            }
            if let Some(description) = def.description() {
                let _ = writeln!(out, "    Description: {description}");
            }
            if !def.rules().is_empty() {
                let names: Vec<&str> = def.rules().iter().map(|r| r.name()).collect();
                let _ = writeln!(out, "    Validations: {}", names.join(", "));
            }
            out.push('\n');
        }
        out
    }

    /// Wipe every secret handle.
    pub fn destroy(&mut self) {
        self.secrets.destroy_all();
    }

    /// Source overrides recorded by the last [`process`](Self::process) run.
    pub fn override_warnings(&self) -> &OverrideWarnings {
        &self.override_warnings
    }

    pub fn has_override_warnings(&self) -> bool {
        self.override_warnings.has_warnings()
    }

    pub fn print_errors(&self, errors: &[ConfigError]) {
        eprint!("{}", format_errors(errors));
    }

    pub fn print_override_warnings(&self) {
        if self.override_warnings.has_warnings() {
            eprint!("{}", self.override_warnings.format_warnings());
        }
    }

    // -- File loading -----------------------------------------------------------

    /// Load one file, chosen by extension, on top of what is loaded already.
    pub fn load_file(&mut self, path: impl AsRef<Path>) -> Result<(), ConfkitError> {
        let path = path.as_ref();
        let tree = file::read_file(path).inspect_err(|e| {
            warn!(
                event = "confkit.file.load_failed",
                path = %path.display(),
                error = %e,
            );
        })?;
        let keys = tree.len();

        let files = self.files.get_or_insert_with(FileSource::new);
        files.merge(tree);
        files.record_path(path.to_path_buf());

        info!(event = "confkit.file.loaded", path = %path.display(), keys);
        Ok(())
    }

    /// Load files in order; the first failure stops the sequence.
    pub fn load_files<I, P>(&mut self, paths: I) -> Result<(), ConfkitError>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        for path in paths {
            self.load_file(path)?;
        }
        Ok(())
    }

    /// Decode `content` as `format` and merge it like a loaded file.
    pub fn load_str(&mut self, content: &str, format: FileFormat) -> Result<(), ConfkitError> {
        let tree = file::parse_content(content, format, Path::new("<inline>"))?;
        self.merge_tree(tree);
        Ok(())
    }

    /// Merge an already-decoded table, for hosts with their own loaders.
    pub fn merge_tree(&mut self, tree: Map<String, TreeValue>) {
        let keys = tree.len();
        self.files.get_or_insert_with(FileSource::new).merge(tree);
        info!(event = "confkit.file.merged", keys);
    }

    /// Load the file named by environment variable `var`. Unset or empty
    /// means nothing to load.
    pub fn load_from_env(&mut self, var: &str) -> Result<(), ConfkitError> {
        match self.env.non_empty(var) {
            Some(path) => self.load_file(path),
            None => {
                debug!(event = "confkit.file.env_unset", var);
                Ok(())
            }
        }
    }

    /// Select the `environments.<name>` section of the loaded files.
    pub fn set_environment(&mut self, name: &str) -> Result<(), ConfkitError> {
        let files = self.files.as_mut().ok_or(ConfkitError::NoFilesLoaded)?;
        files.set_environment(name);
        info!(event = "confkit.file.environment_selected", environment = name);
        Ok(())
    }

    /// Select the environment named by variable `var`, if it is set.
    pub fn set_environment_from_env(&mut self, var: &str) -> Result<(), ConfkitError> {
        match self.env.non_empty(var) {
            Some(name) => self.set_environment(&name),
            None => Ok(()),
        }
    }

    pub fn environment(&self) -> Option<&str> {
        self.files.as_ref().and_then(FileSource::environment)
    }

    pub fn loaded_files(&self) -> &[PathBuf] {
        self.files
            .as_ref()
            .map(FileSource::loaded_files)
            .unwrap_or(&[])
    }
}

/// Vault text of a secret value. Lists are joined with the key's delimiter.
fn secret_text(value: &Value, delimiter: &str) -> String {
    match value {
        Value::StringList(items) => items.join(delimiter),
        Value::Int64List(items) => items
            .iter()
            .map(i64::to_string)
            .collect::<Vec<_>>()
            .join(delimiter),
        other => other.to_string(),
    }
}

fn secret_summary(secret: &SecureString) -> String {
    if secret.is_set() {
        format!("[SECRET:{} bytes]", secret.size())
    } else {
        "[SECRET:not set]".to_string()
    }
}
