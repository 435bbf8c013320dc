//! Typed reads of resolved values.
//!
//! [`Config::try_get`] is the checked form. The plain getters panic on misuse
//! (unknown key, secret key, unset key, wrong type): those are programming
//! errors in the host, not bad configuration input.

use std::time::Duration;

use crate::config::{Config, Stored};
use crate::error::GetError;
use crate::types::Value;

/// A Rust type a resolved [`Value`] can be read as.
pub trait FromValue: Sized {
    /// Type label used in mismatch errors.
    const TYPE_NAME: &'static str;

    fn from_value(value: &Value) -> Option<Self>;
}

impl FromValue for String {
    const TYPE_NAME: &'static str = "string";

    fn from_value(value: &Value) -> Option<Self> {
        value.as_str().map(str::to_string)
    }
}

impl FromValue for i64 {
    const TYPE_NAME: &'static str = "int64";

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Int64(n) => Some(*n),
            _ => None,
        }
    }
}

impl FromValue for f64 {
    const TYPE_NAME: &'static str = "float64";

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Float64(n) => Some(*n),
            _ => None,
        }
    }
}

impl FromValue for bool {
    const TYPE_NAME: &'static str = "bool";

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl FromValue for Duration {
    const TYPE_NAME: &'static str = "duration";

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Duration(d) => Some(*d),
            _ => None,
        }
    }
}

impl FromValue for Vec<String> {
    const TYPE_NAME: &'static str = "[]string";

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::StringList(items) => Some(items.clone()),
            _ => None,
        }
    }
}

impl FromValue for Vec<i64> {
    const TYPE_NAME: &'static str = "[]int64";

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Int64List(items) => Some(items.clone()),
            _ => None,
        }
    }
}

impl FromValue for Value {
    const TYPE_NAME: &'static str = "value";

    fn from_value(value: &Value) -> Option<Self> {
        Some(value.clone())
    }
}

impl Config {
    /// Read `key` as `T`.
    pub fn try_get<T: FromValue>(&self, key: &str) -> Result<T, GetError> {
        let def = self
            .definitions
            .get(key)
            .ok_or_else(|| GetError::UnknownKey(key.to_string()))?;
        if def.is_secret() {
            return Err(GetError::Secret(key.to_string()));
        }
        let value = match self.values.get(key) {
            Some(Stored::Plain(value)) => value,
            _ => return Err(GetError::NotSet(key.to_string())),
        };
        T::from_value(value).ok_or_else(|| GetError::TypeMismatch {
            key: key.to_string(),
            expected: T::TYPE_NAME,
            found: value.value_type().name(),
        })
    }

    /// Read `key` as `T`.
    ///
    /// # Panics
    ///
    /// On any [`GetError`].
    pub fn get<T: FromValue>(&self, key: &str) -> T {
        match self.try_get(key) {
            Ok(value) => value,
            Err(e) => panic!("confkit: {e}"),
        }
    }

    /// Read `key` as `T`, or `fallback` when it cannot be read.
    pub fn get_or<T: FromValue>(&self, key: &str, fallback: T) -> T {
        self.try_get(key).unwrap_or(fallback)
    }

    pub fn get_string(&self, key: &str) -> String {
        self.get(key)
    }

    pub fn get_int64(&self, key: &str) -> i64 {
        self.get(key)
    }

    pub fn get_float64(&self, key: &str) -> f64 {
        self.get(key)
    }

    pub fn get_bool(&self, key: &str) -> bool {
        self.get(key)
    }

    pub fn get_duration(&self, key: &str) -> Duration {
        self.get(key)
    }

    /// URL values are validated strings.
    pub fn get_url(&self, key: &str) -> String {
        self.get(key)
    }

    pub fn get_string_list(&self, key: &str) -> Vec<String> {
        self.get(key)
    }

    pub fn get_int64_list(&self, key: &str) -> Vec<i64> {
        self.get(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::MapEnv;

    fn processed(env: MapEnv) -> Config {
        let mut config = Config::with_env(env);
        config.define("PORT").int64().env("PORT").default(8080);
        config.define("RATIO").float64().env("RATIO").default(0.5);
        config.define("DEBUG").bool().env("DEBUG").default(false);
        config.define("ENDPOINT").url().env("ENDPOINT");
        config.define("IDS").int64_list().env("IDS");
        config.define("TOKEN").env("TOKEN").secret();
        config.define("UNSET");
        assert!(config.process().is_empty());
        config
    }

    #[test]
    fn typed_getters() {
        let config = processed(
            MapEnv::new()
                .with("DEBUG", "true")
                .with("ENDPOINT", "https://api.example.com/v1")
                .with("IDS", "1, 2,3"),
        );
        assert_eq!(config.get_int64("PORT"), 8080);
        assert_eq!(config.get_float64("RATIO"), 0.5);
        assert!(config.get_bool("DEBUG"));
        assert_eq!(config.get_url("ENDPOINT"), "https://api.example.com/v1");
        assert_eq!(config.get_string("ENDPOINT"), "https://api.example.com/v1");
        assert_eq!(config.get_int64_list("IDS"), [1, 2, 3]);
    }

    #[test]
    fn try_get_reports_each_misuse() {
        let config = processed(MapEnv::new().with("TOKEN", "secret-token"));
        assert_eq!(
            config.try_get::<String>("NOPE"),
            Err(GetError::UnknownKey("NOPE".into()))
        );
        assert_eq!(
            config.try_get::<String>("TOKEN"),
            Err(GetError::Secret("TOKEN".into()))
        );
        assert_eq!(
            config.try_get::<String>("UNSET"),
            Err(GetError::NotSet("UNSET".into()))
        );
        assert_eq!(
            config.try_get::<String>("PORT"),
            Err(GetError::TypeMismatch {
                key: "PORT".into(),
                expected: "string",
                found: "int64",
            })
        );
    }

    #[test]
    fn get_or_falls_back() {
        let config = processed(MapEnv::new());
        assert_eq!(config.get_or("UNSET", "fallback".to_string()), "fallback");
        assert_eq!(config.get_or("PORT", 1i64), 8080);
        assert!(!config.get_or("PORT", false));
    }

    #[test]
    fn raw_value_access() {
        let config = processed(MapEnv::new());
        assert_eq!(config.get::<Value>("PORT"), Value::Int64(8080));
    }

    #[test]
    #[should_panic(expected = "is a secret")]
    fn get_on_secret_panics() {
        let config = processed(MapEnv::new().with("TOKEN", "secret-token"));
        let _ = config.get_string("TOKEN");
    }

    #[test]
    #[should_panic(expected = "has type int64, not bool")]
    fn get_with_wrong_type_panics() {
        let config = processed(MapEnv::new());
        let _ = config.get_bool("PORT");
    }
}
