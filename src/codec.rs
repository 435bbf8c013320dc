//! Value codec: raw text (or an already-structured file value) → typed [`Value`].
//!
//! Every kind treats an empty raw string as "no value" and returns `Ok(None)`.
//! Callers decide what absence means (fall through to the next source, use a
//! default, or report a missing required key).

use std::time::Duration;

use serde_json::Value as TreeValue;

use crate::error::ParseError;
use crate::types::{Value, ValueType};

/// Parse `raw` into `value_type`.
///
/// List kinds split on `delimiter`, trim each part and drop empty parts, so
/// `"a,,b"` is `["a", "b"]` while `""` is absence rather than an empty list.
pub fn parse(raw: &str, value_type: ValueType, delimiter: &str) -> Result<Option<Value>, ParseError> {
    if raw.is_empty() {
        return Ok(None);
    }

    let value = match value_type {
        ValueType::String => Value::String(raw.to_string()),
        ValueType::Int64 => Value::Int64(
            raw.parse::<i64>()
                .map_err(|_| ParseError::InvalidInt(raw.to_string()))?,
        ),
        ValueType::Float64 => Value::Float64(
            raw.parse::<f64>()
                .map_err(|_| ParseError::InvalidFloat(raw.to_string()))?,
        ),
        ValueType::Bool => Value::Bool(parse_bool(raw)?),
        ValueType::Duration => Value::Duration(parse_duration(raw)?),
        ValueType::Url => {
            check_url(raw)?;
            Value::Url(raw.to_string())
        }
        ValueType::StringList => Value::StringList(
            split_list(raw, delimiter)
                .into_iter()
                .map(str::to_string)
                .collect(),
        ),
        ValueType::Int64List => Value::Int64List(
            split_list(raw, delimiter)
                .into_iter()
                .map(|item| {
                    item.parse::<i64>()
                        .map_err(|_| ParseError::InvalidListItem(item.to_string()))
                })
                .collect::<Result<_, _>>()?,
        ),
    };
    Ok(Some(value))
}

fn split_list<'a>(raw: &'a str, delimiter: &str) -> Vec<&'a str> {
    raw.split(delimiter)
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect()
}

fn parse_bool(raw: &str) -> Result<bool, ParseError> {
    match raw {
        "1" | "t" | "T" => Ok(true),
        "0" | "f" | "F" => Ok(false),
        _ if raw.eq_ignore_ascii_case("true") => Ok(true),
        _ if raw.eq_ignore_ascii_case("false") => Ok(false),
        _ => Err(ParseError::InvalidBool(raw.to_string())),
    }
}

const NANOS_PER_MICRO: u128 = 1_000;
const NANOS_PER_MILLI: u128 = 1_000_000;
const NANOS_PER_SEC: u128 = 1_000_000_000;
const NANOS_PER_MIN: u128 = 60 * NANOS_PER_SEC;
const NANOS_PER_HOUR: u128 = 60 * NANOS_PER_MIN;

/// Parse a duration such as `15m`, `1h30m`, `250ms`, or `.5h`.
///
/// A trailing bare `d` means days: `7d` and `1.5d` are converted to
/// `days * 24` hours (rounded to whole hours, halves to even) and parsed
/// again.
pub fn parse_duration(raw: &str) -> Result<Duration, ParseError> {
    let invalid = || ParseError::InvalidDuration(raw.to_string());

    if let Some(days) = raw.strip_suffix('d')
        && let Ok(days) = days.parse::<f64>()
    {
        if !days.is_finite() || days < 0.0 {
            return Err(invalid());
        }
        let hours = (days * 24.0).round_ties_even();
        return parse_unit_sequence(&format!("{hours}h")).ok_or_else(invalid);
    }

    parse_unit_sequence(raw).ok_or_else(invalid)
}

/// `[-+]?(digits[.digits]unit)+` or a bare `0`. Negative non-zero results are
/// rejected because [`Duration`] is unsigned.
fn parse_unit_sequence(input: &str) -> Option<Duration> {
    let (negative, mut rest) = match input.as_bytes().first() {
        Some(b'-') => (true, &input[1..]),
        Some(b'+') => (false, &input[1..]),
        _ => (false, input),
    };

    if rest == "0" {
        return Some(Duration::ZERO);
    }
    if rest.is_empty() {
        return None;
    }

    let mut total: u128 = 0;
    while !rest.is_empty() {
        let int_end = rest
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(rest.len());
        let (int_part, after_int) = rest.split_at(int_end);

        let (frac_part, after_number) = match after_int.strip_prefix('.') {
            Some(after_dot) => {
                let frac_end = after_dot
                    .find(|c: char| !c.is_ascii_digit())
                    .unwrap_or(after_dot.len());
                after_dot.split_at(frac_end)
            }
            None => ("", after_int),
        };
        if int_part.is_empty() && frac_part.is_empty() {
            return None;
        }

        let unit_end = after_number
            .find(|c: char| c == '.' || c.is_ascii_digit())
            .unwrap_or(after_number.len());
        let (unit, tail) = after_number.split_at(unit_end);
        let unit_nanos = match unit {
            "ns" => 1,
            "us" | "µs" | "μs" => NANOS_PER_MICRO,
            "ms" => NANOS_PER_MILLI,
            "s" => NANOS_PER_SEC,
            "m" => NANOS_PER_MIN,
            "h" => NANOS_PER_HOUR,
            _ => return None,
        };

        let whole: u128 = if int_part.is_empty() {
            0
        } else {
            int_part.parse().ok()?
        };
        let mut component = whole.checked_mul(unit_nanos)?;
        if !frac_part.is_empty() {
            let digits = &frac_part[..frac_part.len().min(18)];
            let fraction: u128 = digits.parse().ok()?;
            let scale = 10u128.pow(digits.len() as u32);
            component = component.checked_add(fraction * unit_nanos / scale)?;
        }
        total = total.checked_add(component)?;
        rest = tail;
    }

    if total > i64::MAX as u128 || (negative && total != 0) {
        return None;
    }
    Some(Duration::from_nanos(total as u64))
}

/// Render a duration the way [`parse_duration`] reads it back: `1h30m0s`,
/// `45s`, `1.5s`, `250ms`.
pub fn format_duration(duration: Duration) -> String {
    let nanos = duration.as_nanos();
    if nanos == 0 {
        return "0s".to_string();
    }
    if nanos < NANOS_PER_MICRO {
        return format!("{nanos}ns");
    }
    if nanos < NANOS_PER_MILLI {
        return format!("{}µs", decimal(nanos, NANOS_PER_MICRO));
    }
    if nanos < NANOS_PER_SEC {
        return format!("{}ms", decimal(nanos, NANOS_PER_MILLI));
    }

    let hours = nanos / NANOS_PER_HOUR;
    let minutes = (nanos % NANOS_PER_HOUR) / NANOS_PER_MIN;
    let seconds = decimal(nanos % NANOS_PER_MIN, NANOS_PER_SEC);

    let mut out = String::new();
    if hours > 0 {
        out.push_str(&format!("{hours}h"));
    }
    if hours > 0 || minutes > 0 {
        out.push_str(&format!("{minutes}m"));
    }
    out.push_str(&format!("{seconds}s"));
    out
}

fn decimal(value: u128, unit: u128) -> String {
    let whole = value / unit;
    let fraction = value % unit;
    if fraction == 0 {
        return whole.to_string();
    }
    let width = unit.ilog10() as usize;
    let digits = format!("{fraction:0width$}");
    format!("{whole}.{}", digits.trim_end_matches('0'))
}

/// Require a non-empty scheme and a non-empty host. The URL itself is not
/// normalized; callers keep the original text.
pub fn check_url(raw: &str) -> Result<(), ParseError> {
    let invalid = |reason: &str| ParseError::InvalidUrl {
        raw: raw.to_string(),
        reason: reason.to_string(),
    };

    if raw.chars().any(|c| c.is_ascii_control()) {
        return Err(invalid("invalid control character"));
    }
    if !valid_percent_escapes(raw) {
        return Err(invalid("invalid percent escape"));
    }

    let Some((scheme, rest)) = raw.split_once(':') else {
        return Err(invalid("missing scheme or host"));
    };
    if scheme.is_empty() {
        return Err(invalid("missing protocol scheme"));
    }
    if !valid_scheme(scheme) {
        return Err(invalid("missing scheme or host"));
    }
    let Some(after_slashes) = rest.strip_prefix("//") else {
        return Err(invalid("missing scheme or host"));
    };

    let authority_end = after_slashes
        .find(['/', '?', '#'])
        .unwrap_or(after_slashes.len());
    let authority = &after_slashes[..authority_end];
    let host_port = authority
        .rsplit_once('@')
        .map_or(authority, |(_, host)| host);

    let host = split_host_port(host_port).ok_or_else(|| invalid("invalid port"))?;
    if host.is_empty() {
        return Err(invalid("missing scheme or host"));
    }
    if host
        .chars()
        .any(|c| c.is_whitespace() || matches!(c, '{' | '}' | '|' | '\\' | '^' | '`' | '"'))
    {
        return Err(invalid("invalid character in host name"));
    }
    Ok(())
}

fn valid_scheme(scheme: &str) -> bool {
    let mut chars = scheme.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

fn valid_percent_escapes(raw: &str) -> bool {
    let bytes = raw.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let escape = bytes.get(i + 1..i + 3);
            if !escape.is_some_and(|pair| pair.iter().all(u8::is_ascii_hexdigit)) {
                return false;
            }
            i += 3;
        } else {
            i += 1;
        }
    }
    true
}

/// Strip an optional `:port` (digits only) from `host:port` or `[v6]:port`.
fn split_host_port(host_port: &str) -> Option<&str> {
    if let Some(bracketed) = host_port.strip_prefix('[') {
        let (host, after) = bracketed.split_once(']')?;
        return match after.strip_prefix(':') {
            Some(port) if port.chars().all(|c| c.is_ascii_digit()) => Some(host),
            None if after.is_empty() => Some(host),
            _ => None,
        };
    }
    match host_port.rsplit_once(':') {
        Some((host, port)) if port.chars().all(|c| c.is_ascii_digit()) => Some(host),
        Some(_) => None,
        None => Some(host_port),
    }
}

/// Text form of a file value, as it would be handed to [`parse`].
///
/// Scalars render type-appropriately (`true`, `3000`, `1.5`); arrays join
/// their elements with `delimiter`; `null` is the empty string.
pub fn stringify_file_value(value: &TreeValue, delimiter: &str) -> Result<String, ParseError> {
    match value {
        TreeValue::Null => Ok(String::new()),
        TreeValue::Array(items) => {
            let parts = items
                .iter()
                .map(scalar_text)
                .collect::<Result<Vec<_>, _>>()?;
            Ok(parts.join(delimiter))
        }
        other => scalar_text(other),
    }
}

fn scalar_text(value: &TreeValue) -> Result<String, ParseError> {
    match value {
        TreeValue::String(s) => Ok(s.clone()),
        TreeValue::Bool(b) => Ok(b.to_string()),
        TreeValue::Number(n) => Ok(match (n.as_i64(), n.as_u64(), n.as_f64()) {
            (Some(i), _, _) => i.to_string(),
            (None, Some(u), _) => u.to_string(),
            (None, None, Some(f)) => f.to_string(),
            _ => n.to_string(),
        }),
        TreeValue::Null => Ok(String::new()),
        TreeValue::Array(_) => Err(ParseError::UnsupportedFileValue {
            found: "nested array".into(),
        }),
        TreeValue::Object(_) => Err(ParseError::UnsupportedFileValue {
            found: "table".into(),
        }),
    }
}

/// Convert a value read from a config file.
///
/// Arrays reaching a list-typed definition are converted element by element,
/// so elements that contain the delimiter survive intact. Everything else goes
/// through [`stringify_file_value`] and [`parse`].
pub fn parse_file_value(
    value: &TreeValue,
    value_type: ValueType,
    delimiter: &str,
) -> Result<Option<Value>, ParseError> {
    let TreeValue::Array(items) = value else {
        return parse(&stringify_file_value(value, delimiter)?, value_type, delimiter);
    };
    if !value_type.is_list() {
        return parse(&stringify_file_value(value, delimiter)?, value_type, delimiter);
    }
    if items.is_empty() {
        return Ok(None);
    }

    let texts = items
        .iter()
        .map(scalar_text)
        .collect::<Result<Vec<_>, _>>()?;
    let parts = texts.iter().map(|t| t.trim()).filter(|t| !t.is_empty());

    match value_type {
        ValueType::Int64List => {
            let numbers = parts
                .map(|item| {
                    item.parse::<i64>()
                        .map_err(|_| ParseError::InvalidListItem(item.to_string()))
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Some(Value::Int64List(numbers)))
        }
        _ => Ok(Some(Value::StringList(parts.map(str::to_string).collect()))),
    }
}
