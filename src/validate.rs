//! Validation rules attached to definitions.
//!
//! Rules are type-tolerant: a rule only inspects values of the kind it
//! understands and passes everything else. `min(10)` on a string key never
//! fails, it simply has nothing to check.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use regex::Regex;

use crate::codec::format_duration;
use crate::types::Value;

/// Name of the rule appended by `required()`. The resolver skips it when the
/// candidate value is a default.
pub const REQUIRED_RULE: &str = "required";

type Check = Arc<dyn Fn(&Value) -> Result<(), String> + Send + Sync>;

/// A named check over a resolved value.
#[derive(Clone)]
pub struct Rule {
    name: String,
    check: Check,
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Rule").field(&self.name).finish()
    }
}

impl Rule {
    pub fn new<F>(name: impl Into<String>, check: F) -> Self
    where
        F: Fn(&Value) -> Result<(), String> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            check: Arc::new(check),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_required(&self) -> bool {
        self.name == REQUIRED_RULE
    }

    pub fn check(&self, value: &Value) -> Result<(), String> {
        (self.check)(value)
    }
}

/// Presence check. Resolved values are never absent, so only the empty
/// string can fail here.
pub fn required() -> Rule {
    Rule::new(REQUIRED_RULE, |value| match value {
        Value::String(s) if s.is_empty() => Err("value is required (empty string)".into()),
        _ => Ok(()),
    })
}

pub fn min(bound: f64) -> Rule {
    Rule::new(format!("min({bound})"), move |value| match value {
        Value::Int64(v) if (*v as f64) < bound => {
            Err(format!("value {v} is less than minimum {bound}"))
        }
        Value::Float64(v) if *v < bound => Err(format!("value {v} is less than minimum {bound}")),
        _ => Ok(()),
    })
}

pub fn max(bound: f64) -> Rule {
    Rule::new(format!("max({bound})"), move |value| match value {
        Value::Int64(v) if (*v as f64) > bound => {
            Err(format!("value {v} is greater than maximum {bound}"))
        }
        Value::Float64(v) if *v > bound => {
            Err(format!("value {v} is greater than maximum {bound}"))
        }
        _ => Ok(()),
    })
}

/// Length in characters, not bytes.
pub fn min_length(bound: usize) -> Rule {
    Rule::new(format!("minLength({bound})"), move |value| {
        if let Value::String(s) = value {
            let len = s.chars().count();
            if len < bound {
                return Err(format!("value length {len} is less than minimum {bound}"));
            }
        }
        Ok(())
    })
}

pub fn max_length(bound: usize) -> Rule {
    Rule::new(format!("maxLength({bound})"), move |value| {
        if let Value::String(s) = value {
            let len = s.chars().count();
            if len > bound {
                return Err(format!("value length {len} is greater than maximum {bound}"));
            }
        }
        Ok(())
    })
}

/// Compile `pattern` once, up front.
pub fn try_regexp(pattern: &str) -> Result<Rule, regex::Error> {
    let re = Regex::new(pattern)?;
    let pattern = pattern.to_string();
    Ok(Rule::new(format!("regexp({pattern})"), move |value| {
        match value {
            Value::String(s) if !re.is_match(s) => {
                Err(format!("value does not match pattern {pattern}"))
            }
            _ => Ok(()),
        }
    }))
}

/// Like [`try_regexp`], but an invalid pattern is a programming error and
/// panics at definition time.
pub fn regexp(pattern: &str) -> Rule {
    match try_regexp(pattern) {
        Ok(rule) => rule,
        Err(e) => panic!("invalid regexp pattern {pattern:?}: {e}"),
    }
}

pub fn one_of<I, S>(allowed: I) -> Rule
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let allowed: Vec<String> = allowed.into_iter().map(Into::into).collect();
    let listing = format!("[{}]", allowed.join(" "));
    Rule::new(format!("oneOf({listing})"), move |value| match value {
        Value::String(s) if !allowed.iter().any(|a| a == s) => {
            Err(format!("value '{s}' is not one of: {listing}"))
        }
        _ => Ok(()),
    })
}

pub fn min_duration(bound: Duration) -> Rule {
    let shown = format_duration(bound);
    Rule::new(format!("minDuration({shown})"), move |value| match value {
        Value::Duration(d) if *d < bound => Err(format!(
            "duration {} is less than minimum {shown}",
            format_duration(*d)
        )),
        _ => Ok(()),
    })
}

pub fn max_duration(bound: Duration) -> Rule {
    let shown = format_duration(bound);
    Rule::new(format!("maxDuration({shown})"), move |value| match value {
        Value::Duration(d) if *d > bound => Err(format!(
            "duration {} is greater than maximum {shown}",
            format_duration(*d)
        )),
        _ => Ok(()),
    })
}

pub fn min_items(bound: usize) -> Rule {
    Rule::new(format!("minItems({bound})"), move |value| {
        match value.list_len() {
            Some(len) if len < bound => Err(format!("array has {len} items, minimum is {bound}")),
            _ => Ok(()),
        }
    })
}

pub fn max_items(bound: usize) -> Rule {
    Rule::new(format!("maxItems({bound})"), move |value| {
        match value.list_len() {
            Some(len) if len > bound => Err(format!("array has {len} items, maximum is {bound}")),
            _ => Ok(()),
        }
    })
}

/// Caller-supplied predicate under a caller-chosen name.
pub fn custom<F>(name: impl Into<String>, check: F) -> Rule
where
    F: Fn(&Value) -> Result<(), String> + Send + Sync + 'static,
{
    Rule::new(name, check)
}

/// Run `rules` in order and return the first failure with the failing rule's
/// name. With `skip_required`, the `required` rule is not evaluated.
pub fn run_rules<'r>(
    rules: &'r [Rule],
    value: &Value,
    skip_required: bool,
) -> Result<(), (&'r str, String)> {
    for rule in rules {
        if skip_required && rule.is_required() {
            continue;
        }
        rule.check(value).map_err(|message| (rule.name(), message))?;
    }
    Ok(())
}
