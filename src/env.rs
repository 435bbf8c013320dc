use std::collections::HashMap;

/// Read-only environment lookup.
///
/// Resolution goes through this trait instead of `std::env` so tests (and
/// hosts with their own environment model) can pass synthetic data.
pub trait EnvSource: Send + Sync {
    fn var(&self, name: &str) -> Option<String>;

    /// Lookup that treats an empty value as unset.
    fn non_empty(&self, name: &str) -> Option<String> {
        self.var(name).filter(|v| !v.is_empty())
    }
}

/// The real process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn var(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

/// A fixed set of variables.
#[derive(Debug, Clone, Default)]
pub struct MapEnv {
    vars: HashMap<String, String>,
}

impl MapEnv {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Builder-style insert.
    pub fn with(mut self, name: &str, value: &str) -> Self {
        self.vars.insert(name.to_string(), value.to_string());
        self
    }
}

impl EnvSource for MapEnv {
    fn var(&self, name: &str) -> Option<String> {
        self.vars.get(name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map_env_lookup() {
        let env = MapEnv::from_pairs([("PORT", "8080"), ("EMPTY", "")]);
        assert_eq!(env.var("PORT").as_deref(), Some("8080"));
        assert_eq!(env.var("MISSING"), None);
    }

    #[test]
    fn non_empty_filters_blank_values() {
        let env = MapEnv::new().with("EMPTY", "").with("HOST", "localhost");
        assert_eq!(env.non_empty("EMPTY"), None);
        assert_eq!(env.non_empty("HOST").as_deref(), Some("localhost"));
    }

    #[test]
    fn later_pairs_replace_earlier() {
        let env = MapEnv::from_pairs(vec![("A".to_string(), "1".to_string()), ("A".to_string(), "2".to_string())]);
        assert_eq!(env.var("A").as_deref(), Some("2"));
    }

    #[test]
    fn process_env_missing_var_is_none() {
        assert_eq!(ProcessEnv.var("CONFKIT_TEST_SURELY_UNSET_VARIABLE"), None);
    }
}
