use std::time::Duration;

use indexmap::IndexMap;
use indexmap::map::Entry;

use crate::types::{Value, ValueType};
use crate::validate::{self, Rule};

/// A declared configuration key: its type, where its value may come from,
/// an optional default, and the rules the value must satisfy.
#[derive(Debug, Clone)]
pub struct Definition {
    pub(crate) key: String,
    pub(crate) value_type: ValueType,
    pub(crate) env: Option<String>,
    pub(crate) flag: Option<String>,
    pub(crate) default: Option<Value>,
    pub(crate) required: bool,
    pub(crate) secret: bool,
    pub(crate) delimiter: String,
    pub(crate) rules: Vec<Rule>,
    pub(crate) description: Option<String>,
}

impl Definition {
    /// A fresh string-typed definition with the `,` list delimiter.
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value_type: ValueType::String,
            env: None,
            flag: None,
            default: None,
            required: false,
            secret: false,
            delimiter: ",".to_string(),
            rules: Vec::new(),
            description: None,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn value_type(&self) -> ValueType {
        self.value_type
    }

    pub fn env(&self) -> Option<&str> {
        self.env.as_deref()
    }

    pub fn flag(&self) -> Option<&str> {
        self.flag.as_deref()
    }

    pub fn default_value(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn is_secret(&self) -> bool {
        self.secret
    }

    pub fn delimiter(&self) -> &str {
        &self.delimiter
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Same type, sources, default, and flags. Rules are not compared.
    pub(crate) fn same_shape(&self, other: &Definition) -> bool {
        self.value_type == other.value_type
            && self.flag == other.flag
            && self.env == other.env
            && self.default == other.default
            && self.required == other.required
            && self.secret == other.secret
    }
}

/// Register a fresh definition for `key` in `definitions`, replacing any
/// earlier one, and return its builder.
pub(crate) fn define_in<'a>(
    definitions: &'a mut IndexMap<String, Definition>,
    key: &str,
) -> DefinitionBuilder<'a> {
    let def = match definitions.entry(key.to_string()) {
        Entry::Occupied(mut slot) => {
            slot.insert(Definition::new(key));
            slot.into_mut()
        }
        Entry::Vacant(slot) => slot.insert(Definition::new(key)),
    };
    DefinitionBuilder::new(def)
}

/// Chained setters over a definition already registered in its owning
/// [`Config`](crate::Config) or command scope.
///
/// Setters are order-independent. Scalar setters overwrite (last call wins);
/// validation adders accumulate in call order. Nothing checks that rules fit
/// the declared type: a rule that does not apply simply never fails.
///
/// ```
/// use confkit::Config;
///
/// let mut config = Config::new();
/// config
///     .define("PORT")
///     .int64()
///     .env("PORT")
///     .flag("port")
///     .default(8080)
///     .range(1.0, 65535.0)
///     .description("HTTP listen port");
/// assert_eq!(config.definition("PORT").unwrap().flag(), Some("port"));
/// ```
pub struct DefinitionBuilder<'a> {
    def: &'a mut Definition,
}

impl<'a> DefinitionBuilder<'a> {
    pub(crate) fn new(def: &'a mut Definition) -> Self {
        Self { def }
    }

    fn of_type(self, value_type: ValueType) -> Self {
        self.def.value_type = value_type;
        self
    }

    fn rule(self, rule: Rule) -> Self {
        self.def.rules.push(rule);
        self
    }

    pub fn string(self) -> Self {
        self.of_type(ValueType::String)
    }

    pub fn int64(self) -> Self {
        self.of_type(ValueType::Int64)
    }

    pub fn float64(self) -> Self {
        self.of_type(ValueType::Float64)
    }

    pub fn bool(self) -> Self {
        self.of_type(ValueType::Bool)
    }

    pub fn duration(self) -> Self {
        self.of_type(ValueType::Duration)
    }

    pub fn url(self) -> Self {
        self.of_type(ValueType::Url)
    }

    pub fn string_list(self) -> Self {
        self.of_type(ValueType::StringList)
    }

    pub fn int64_list(self) -> Self {
        self.of_type(ValueType::Int64List)
    }

    /// Environment variable to read.
    pub fn env(self, name: &str) -> Self {
        self.def.env = Some(name.to_string());
        self
    }

    /// Command-line flag name, without leading dashes.
    pub fn flag(self, name: &str) -> Self {
        self.def.flag = Some(name.to_string());
        self
    }

    /// Mark the key required. Also appends the `required` rule, which
    /// rejects an empty string from any source except the default.
    pub fn required(self) -> Self {
        self.def.required = true;
        self.rule(validate::required())
    }

    /// Route the resolved value into the secret store instead of the value map.
    pub fn secret(self) -> Self {
        self.def.secret = true;
        self
    }

    /// Typed default. It is not parsed, but it is validated (minus `required`).
    pub fn default(self, value: impl Into<Value>) -> Self {
        self.def.default = Some(value.into());
        self
    }

    /// List separator (default `,`).
    pub fn delimiter(self, delimiter: &str) -> Self {
        self.def.delimiter = delimiter.to_string();
        self
    }

    pub fn description(self, text: &str) -> Self {
        self.def.description = Some(text.to_string());
        self
    }

    pub fn min(self, bound: f64) -> Self {
        self.rule(validate::min(bound))
    }

    pub fn max(self, bound: f64) -> Self {
        self.rule(validate::max(bound))
    }

    pub fn range(self, min: f64, max: f64) -> Self {
        self.min(min).max(max)
    }

    pub fn min_length(self, bound: usize) -> Self {
        self.rule(validate::min_length(bound))
    }

    pub fn max_length(self, bound: usize) -> Self {
        self.rule(validate::max_length(bound))
    }

    pub fn length_range(self, min: usize, max: usize) -> Self {
        self.min_length(min).max_length(max)
    }

    /// # Panics
    ///
    /// If `pattern` is not a valid regular expression.
    pub fn regexp(self, pattern: &str) -> Self {
        self.rule(validate::regexp(pattern))
    }

    pub fn one_of<I, S>(self, allowed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.rule(validate::one_of(allowed))
    }

    pub fn min_duration(self, bound: Duration) -> Self {
        self.rule(validate::min_duration(bound))
    }

    pub fn max_duration(self, bound: Duration) -> Self {
        self.rule(validate::max_duration(bound))
    }

    pub fn duration_range(self, min: Duration, max: Duration) -> Self {
        self.min_duration(min).max_duration(max)
    }

    pub fn min_duration_secs(self, seconds: f64) -> Self {
        self.min_duration(secs(seconds))
    }

    pub fn max_duration_secs(self, seconds: f64) -> Self {
        self.max_duration(secs(seconds))
    }

    pub fn duration_range_secs(self, min: f64, max: f64) -> Self {
        self.min_duration_secs(min).max_duration_secs(max)
    }

    pub fn min_items(self, bound: usize) -> Self {
        self.rule(validate::min_items(bound))
    }

    pub fn max_items(self, bound: usize) -> Self {
        self.rule(validate::max_items(bound))
    }

    pub fn items_range(self, min: usize, max: usize) -> Self {
        self.min_items(min).max_items(max)
    }

    pub fn custom<F>(self, name: &str, check: F) -> Self
    where
        F: Fn(&Value) -> Result<(), String> + Send + Sync + 'static,
    {
        self.rule(validate::custom(name, check))
    }
}

/// Seconds to a duration, clamping negative or non-finite input to zero.
fn secs(seconds: f64) -> Duration {
    Duration::try_from_secs_f64(seconds).unwrap_or(Duration::ZERO)
}
