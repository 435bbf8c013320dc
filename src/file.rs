//! Config file loading and lookup.
//!
//! Files are decoded by extension into one generic tree
//! ([`serde_json::Value`]) regardless of their on-disk format:
//!
//! - `.json` via `serde_json`
//! - `.yaml` / `.yml` via `serde_yaml`
//! - `.toml` via `toml` (datetimes become their RFC 3339 text)
//!
//! Every loaded tree is merged into a single [`FileSource`] with
//! [`shallow_merge`](crate::merge::shallow_merge): later files replace
//! same-named top-level keys from earlier ones.
//!
//! # Environments
//!
//! A file may carry per-environment overrides under a top-level
//! `environments` table:
//!
//! ```yaml
//! port: 8080
//! environments:
//!   production:
//!     port: 80
//! ```
//!
//! With the active environment set to `production`, [`FileSource::lookup`]
//! returns `80` for `port`; any key the environment does not override falls
//! back to the top level.

use std::fmt;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value as TreeValue};

use crate::error::ConfkitError;
use crate::merge::shallow_merge;

const ENVIRONMENTS_KEY: &str = "environments";

/// Supported config file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Json,
    Yaml,
    Toml,
}

impl FileFormat {
    /// Pick a format from the file extension (case-insensitive).
    pub fn from_path(path: &Path) -> Result<Self, ConfkitError> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        match extension.as_str() {
            "json" => Ok(FileFormat::Json),
            "yaml" | "yml" => Ok(FileFormat::Yaml),
            "toml" => Ok(FileFormat::Toml),
            _ => Err(ConfkitError::UnsupportedFormat {
                path: path.to_path_buf(),
                extension,
            }),
        }
    }
}

impl fmt::Display for FileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FileFormat::Json => "json",
            FileFormat::Yaml => "yaml",
            FileFormat::Toml => "toml",
        })
    }
}

/// Decode `content` into a top-level table. `path` is only used in errors.
///
/// An empty document (or a literal `null`) is an empty table.
pub fn parse_content(
    content: &str,
    format: FileFormat,
    path: &Path,
) -> Result<Map<String, TreeValue>, ConfkitError> {
    let parse_err = |reason: String| ConfkitError::FileParse {
        path: path.to_path_buf(),
        format: format.to_string(),
        reason,
    };

    let tree = match format {
        FileFormat::Json => {
            serde_json::from_str::<TreeValue>(content).map_err(|e| parse_err(e.to_string()))?
        }
        FileFormat::Yaml => {
            if content.trim().is_empty() {
                TreeValue::Null
            } else {
                serde_yaml::from_str::<TreeValue>(content).map_err(|e| parse_err(e.to_string()))?
            }
        }
        FileFormat::Toml => {
            let table = content
                .parse::<toml::Table>()
                .map_err(|e| parse_err(e.message().to_string()))?;
            toml_to_tree(toml::Value::Table(table))
        }
    };

    match tree {
        TreeValue::Object(map) => Ok(map),
        TreeValue::Null => Ok(Map::new()),
        _ => Err(ConfkitError::FileTreeNotTable {
            path: path.to_path_buf(),
        }),
    }
}

/// Read and decode one file.
pub fn read_file(path: &Path) -> Result<Map<String, TreeValue>, ConfkitError> {
    let format = FileFormat::from_path(path)?;
    let content = std::fs::read_to_string(path).map_err(|e| ConfkitError::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;
    parse_content(&content, format, path)
}

fn toml_to_tree(value: toml::Value) -> TreeValue {
    match value {
        toml::Value::String(s) => TreeValue::String(s),
        toml::Value::Integer(i) => TreeValue::from(i),
        toml::Value::Float(f) => serde_json::Number::from_f64(f)
            .map(TreeValue::Number)
            .unwrap_or(TreeValue::Null),
        toml::Value::Boolean(b) => TreeValue::Bool(b),
        toml::Value::Datetime(dt) => TreeValue::String(dt.to_string()),
        toml::Value::Array(items) => TreeValue::Array(items.into_iter().map(toml_to_tree).collect()),
        toml::Value::Table(table) => TreeValue::Object(
            table
                .into_iter()
                .map(|(k, v)| (k, toml_to_tree(v)))
                .collect(),
        ),
    }
}

/// Merged file data plus the active environment selector.
#[derive(Debug, Clone, Default)]
pub struct FileSource {
    data: Map<String, TreeValue>,
    environment: Option<String>,
    loaded: Vec<PathBuf>,
}

impl FileSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge a decoded tree on top of what is already loaded.
    pub fn merge(&mut self, tree: Map<String, TreeValue>) {
        shallow_merge(&mut self.data, tree);
    }

    pub(crate) fn record_path(&mut self, path: PathBuf) {
        self.loaded.push(path);
    }

    pub fn loaded_files(&self) -> &[PathBuf] {
        &self.loaded
    }

    pub fn data(&self) -> &Map<String, TreeValue> {
        &self.data
    }

    pub fn environment(&self) -> Option<&str> {
        self.environment.as_deref()
    }

    pub fn set_environment(&mut self, name: &str) {
        self.environment = Some(name.to_string());
    }

    /// Find the file value for `key`.
    ///
    /// Probes `environments.<active>.<key>` first (exact, then lowercase),
    /// then the top level (exact, then lowercase).
    pub fn lookup(&self, key: &str) -> Option<&TreeValue> {
        let lower = key.to_lowercase();

        if let Some(env_name) = &self.environment
            && let Some(TreeValue::Object(scoped)) = self
                .data
                .get(ENVIRONMENTS_KEY)
                .and_then(|envs| envs.get(env_name))
            && let Some(value) = scoped.get(key).or_else(|| scoped.get(&lower))
        {
            return Some(value);
        }

        self.data.get(key).or_else(|| self.data.get(&lower))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    fn source_from(value: TreeValue) -> FileSource {
        let mut source = FileSource::new();
        match value {
            TreeValue::Object(map) => source.merge(map),
            other => panic!("expected object, got {other}"),
        }
        source
    }

    #[test]
    fn format_from_extension() {
        assert_eq!(FileFormat::from_path(Path::new("a.json")).unwrap(), FileFormat::Json);
        assert_eq!(FileFormat::from_path(Path::new("a.YML")).unwrap(), FileFormat::Yaml);
        assert_eq!(FileFormat::from_path(Path::new("a.yaml")).unwrap(), FileFormat::Yaml);
        assert_eq!(FileFormat::from_path(Path::new("a.toml")).unwrap(), FileFormat::Toml);
    }

    #[test]
    fn unknown_extension_is_rejected() {
        let err = FileFormat::from_path(Path::new("config.ini")).unwrap_err();
        match err {
            ConfkitError::UnsupportedFormat { extension, .. } => assert_eq!(extension, "ini"),
            other => panic!("Expected UnsupportedFormat, got: {other:?}"),
        }
    }

    #[test]
    fn parse_each_format_to_same_tree() {
        let path = Path::new("x");
        let json = parse_content(r#"{"port": 3000, "tags": ["a", "b"]}"#, FileFormat::Json, path).unwrap();
        let yaml = parse_content("port: 3000\ntags: [a, b]\n", FileFormat::Yaml, path).unwrap();
        let toml = parse_content("port = 3000\ntags = [\"a\", \"b\"]\n", FileFormat::Toml, path).unwrap();
        assert_eq!(json, yaml);
        assert_eq!(yaml, toml);
    }

    #[test]
    fn toml_datetime_becomes_string() {
        let tree = parse_content("at = 1979-05-27T07:32:00Z\n", FileFormat::Toml, Path::new("x")).unwrap();
        assert_eq!(tree["at"], "1979-05-27T07:32:00Z");
    }

    #[test]
    fn empty_yaml_is_empty_table() {
        let tree = parse_content("", FileFormat::Yaml, Path::new("x")).unwrap();
        assert!(tree.is_empty());
    }

    #[test]
    fn non_table_root_is_rejected() {
        let err = parse_content("[1, 2]", FileFormat::Json, Path::new("list.json")).unwrap_err();
        assert!(matches!(err, ConfkitError::FileTreeNotTable { .. }));
    }

    #[test]
    fn syntax_error_names_file_and_format() {
        let err = parse_content("port = ", FileFormat::Toml, Path::new("/etc/app.toml")).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("toml"));
        assert!(msg.contains("/etc/app.toml"));
    }

    #[test]
    fn read_file_from_disk() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.yaml");
        fs::write(&path, "port: 3000\n").unwrap();
        let tree = read_file(&path).unwrap();
        assert_eq!(tree["port"], 3000);
    }

    #[test]
    fn read_missing_file_is_read_error() {
        let dir = TempDir::new().unwrap();
        let err = read_file(&dir.path().join("missing.json")).unwrap_err();
        assert!(matches!(err, ConfkitError::FileRead { .. }));
    }

    #[test]
    fn lookup_top_level_exact_then_lowercase() {
        let source = source_from(json!({"PORT": 1, "host": "h"}));
        assert_eq!(source.lookup("PORT"), Some(&json!(1)));
        assert_eq!(source.lookup("HOST"), Some(&json!("h")));
        assert_eq!(source.lookup("MISSING"), None);
    }

    #[test]
    fn lookup_prefers_active_environment() {
        let mut source = source_from(json!({
            "port": 8080,
            "debug": true,
            "environments": {"production": {"debug": false}}
        }));
        source.set_environment("production");
        assert_eq!(source.lookup("DEBUG"), Some(&json!(false)));
        assert_eq!(source.lookup("PORT"), Some(&json!(8080)));

        source.set_environment("staging");
        assert_eq!(source.lookup("DEBUG"), Some(&json!(true)));
    }

    #[test]
    fn later_merge_replaces_environments_subtree() {
        let mut source = source_from(json!({
            "environments": {"production": {"port": 80}}
        }));
        source.merge(
            json!({"environments": {"staging": {"port": 81}}})
                .as_object()
                .cloned()
                .unwrap(),
        );
        source.set_environment("production");
        assert_eq!(source.lookup("port"), None);
    }
}
