//! Execution of preprocessing steps on a single value.
//!
//! Steps run in order on a [`Variant`]. A failing step hands its error text to the step's
//! error handler; the chain stops once the value is empty or an error.

use regex::Regex;
use serde_json::Value;

use super::HistoryValue;
use super::PreprocOp;
use super::Variant;
use crate::constants::ErrorHandler;
use crate::constants::PreprocStepType;
use crate::constants::ValueType;
use crate::utils::time::Timespec;

/// Result of running a step list.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StepsOutcome {
    pub value: Variant,
    /// History produced by delta steps, to be stored for the next value of the item
    pub history: Vec<HistoryValue>,
    /// Value after each executed step
    pub results: Vec<Variant>,
}

pub fn execute_steps(
    value_type: ValueType,
    value: Variant,
    ts: Timespec,
    ops: &[PreprocOp],
    history: &[HistoryValue],
) -> StepsOutcome {
    let mut outcome = StepsOutcome {
        value,
        ..Default::default()
    };

    for (step, op) in ops.iter().enumerate() {
        let previous = history.iter().find(|h| h.step == step);
        match execute_step(value_type, &mut outcome.value, &ts, op, step, previous) {
            Ok(Some(history_value)) => outcome.history.push(history_value),
            Ok(None) => {}
            Err(error) => outcome.value = on_fail(op, error),
        }
        outcome.results.push(outcome.value.clone());

        if outcome.value.is_none() || outcome.value.is_error() {
            break;
        }
    }

    outcome
}

fn on_fail(
    op: &PreprocOp,
    error: String,
) -> Variant {
    match op.error_handler {
        ErrorHandler::Default => Variant::Error(error),
        ErrorHandler::Discard => Variant::None,
        ErrorHandler::SetValue => Variant::Str(op.error_handler_params.clone()),
        ErrorHandler::SetError => Variant::Error(op.error_handler_params.clone()),
    }
}

/// Runs one step in place. Delta steps return the history entry to keep for `step`.
pub fn execute_step(
    value_type: ValueType,
    value: &mut Variant,
    ts: &Timespec,
    op: &PreprocOp,
    step: usize,
    previous: Option<&HistoryValue>,
) -> Result<Option<HistoryValue>, String> {
    let params = op.params.as_str();
    match op.step_type {
        PreprocStepType::Multiplier => multiplier(value_type, value, params).map(|_| None),
        PreprocStepType::Rtrim | PreprocStepType::Ltrim | PreprocStepType::Trim => {
            trim(value, op.step_type, params).map(|_| None)
        }
        PreprocStepType::Regsub => regsub(value, params).map(|_| None),
        PreprocStepType::Bool2Dec | PreprocStepType::Oct2Dec | PreprocStepType::Hex2Dec => {
            to_decimal(value, op.step_type).map(|_| None)
        }
        PreprocStepType::DeltaValue | PreprocStepType::DeltaSpeed => {
            delta(value_type, value, ts, op.step_type, previous).map(|current| {
                Some(HistoryValue {
                    step,
                    value: current,
                    ts: *ts,
                })
            })
        }
        PreprocStepType::Xpath => Err(format!(
            "cannot extract XML value with xpath \"{}\": XML support is not available",
            params
        )),
        PreprocStepType::JsonPath => jsonpath(value, params).map(|_| None),
    }
}

fn multiplier(
    value_type: ValueType,
    value: &mut Variant,
    params: &str,
) -> Result<(), String> {
    let fail = |value: &Variant, reason: &str| {
        format!(
            "cannot apply multiplier \"{}\" to value \"{}\" of type \"{}\": {}",
            params,
            value.value_desc(),
            value.type_desc(),
            reason
        )
    };

    let Some(numeric) = value.to_numeric(value_type) else {
        return Err(fail(value, "cannot convert value to numeric type"));
    };
    let Ok(factor) = params.trim().parse::<f64>() else {
        return Err(fail(value, "invalid multiplier value"));
    };

    *value = match numeric {
        Variant::Dbl(d) => Variant::Dbl(d * factor),
        Variant::Ui64(u) => match params.trim().parse::<u64>() {
            Ok(factor) => Variant::Ui64(u.wrapping_mul(factor)),
            Err(_) => Variant::Ui64((u as f64 * factor) as u64),
        },
        other => other,
    };
    Ok(())
}

/// Trim parameters may spell whitespace as `\s`, `\r`, `\n` and `\t`.
fn unescape_trim_params(params: &str) -> String {
    let mut out = String::with_capacity(params.len());
    let mut chars = params.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.peek() {
            Some('s') => out.push(' '),
            Some('r') => out.push('\r'),
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            _ => {
                out.push('\\');
                continue;
            }
        }
        chars.next();
    }
    out
}

fn trim(
    value: &mut Variant,
    step_type: PreprocStepType,
    params: &str,
) -> Result<(), String> {
    let operation = match step_type {
        PreprocStepType::Rtrim => "right trim",
        PreprocStepType::Ltrim => "left trim",
        _ => "trim",
    };
    let Some(text) = value.to_text() else {
        return Err(format!(
            "cannot perform {} of \"{}\" for value \"{}\" of type \"{}\": cannot convert value",
            operation,
            params,
            value.value_desc(),
            value.type_desc()
        ));
    };

    let chars: Vec<char> = unescape_trim_params(params).chars().collect();
    let mut trimmed = text.as_str();
    if matches!(step_type, PreprocStepType::Ltrim | PreprocStepType::Trim) {
        trimmed = trimmed.trim_start_matches(chars.as_slice());
    }
    if matches!(step_type, PreprocStepType::Rtrim | PreprocStepType::Trim) {
        trimmed = trimmed.trim_end_matches(chars.as_slice());
    }

    *value = Variant::Str(trimmed.to_string());
    Ok(())
}

fn parse_boolean(text: &str) -> Option<u64> {
    if let Ok(d) = text.parse::<f64>() {
        return Some((d != 0.0) as u64);
    }
    match text.to_lowercase().as_str() {
        "true" | "t" | "yes" | "y" | "on" | "up" | "running" | "enabled" | "available" | "ok" | "master" => Some(1),
        "false" | "f" | "no" | "n" | "off" | "down" | "unused" | "disabled" | "unavailable" | "err" | "slave" => {
            Some(0)
        }
        _ => None,
    }
}

fn parse_hex(text: &str) -> Option<u64> {
    // "1a 2b 3c" is accepted as the byte sequence 0x1a2b3c
    let digits: String = if text.contains(' ') {
        let pairs: Vec<&str> = text.split(' ').filter(|pair| !pair.is_empty()).collect();
        if pairs.iter().any(|pair| pair.len() != 2) {
            return None;
        }
        pairs.concat()
    } else {
        text.to_string()
    };
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    u64::from_str_radix(&digits, 16).ok()
}

fn parse_octal(text: &str) -> Option<u64> {
    if text.is_empty() || !text.bytes().all(|b| (b'0'..=b'7').contains(&b)) {
        return None;
    }
    u64::from_str_radix(text, 8).ok()
}

fn to_decimal(
    value: &mut Variant,
    step_type: PreprocStepType,
) -> Result<(), String> {
    let format_name = match step_type {
        PreprocStepType::Bool2Dec => "boolean",
        PreprocStepType::Oct2Dec => "octal",
        _ => "hexadecimal",
    };
    let fail = |value: &Variant, reason: &str| {
        format!(
            "cannot convert value \"{}\" of type \"{}\" from {} format: {}",
            value.value_desc(),
            value.type_desc(),
            format_name,
            reason
        )
    };

    let Some(text) = value.to_text() else {
        return Err(fail(value, "cannot convert value"));
    };
    let text = text.trim_start_matches([' ', '"']).trim_end_matches([' ', '"', '\n', '\r']);

    let parsed = match step_type {
        PreprocStepType::Bool2Dec => parse_boolean(text),
        PreprocStepType::Oct2Dec => parse_octal(text),
        _ => parse_hex(text),
    };
    match parsed {
        Some(u) => {
            *value = Variant::Ui64(u);
            Ok(())
        }
        None => Err(fail(value, "invalid value format")),
    }
}

/// Fills `\0`..`\9` in `template` with the capture groups of `captures`.
fn substitute(
    template: &str,
    captures: &regex::Captures<'_>,
) -> String {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(group) = chars.peek().and_then(|d| d.to_digit(10)) {
                chars.next();
                if let Some(m) = captures.get(group as usize) {
                    out.push_str(m.as_str());
                }
                continue;
            }
        }
        out.push(c);
    }
    out
}

fn regsub(
    value: &mut Variant,
    params: &str,
) -> Result<(), String> {
    let fail = |value: &Variant, reason: String| {
        format!(
            "cannot perform regular expression match on value \"{}\" of type \"{}\": {}",
            value.value_desc(),
            value.type_desc(),
            reason
        )
    };

    let Some(text) = value.to_text() else {
        return Err(fail(value, "cannot convert value".to_string()));
    };
    let Some((pattern, template)) = params.split_once('\n') else {
        return Err(fail(value, "cannot find second parameter".to_string()));
    };
    let Ok(re) = Regex::new(pattern) else {
        return Err(fail(value, format!("invalid regular expression \"{}\"", pattern)));
    };
    let Some(captures) = re.captures(&text) else {
        return Err(fail(value, "pattern does not match".to_string()));
    };

    *value = Variant::Str(substitute(template, &captures));
    Ok(())
}

fn delta(
    value_type: ValueType,
    value: &mut Variant,
    ts: &Timespec,
    step_type: PreprocStepType,
    previous: Option<&HistoryValue>,
) -> Result<Variant, String> {
    let Some(current) = value.to_numeric(value_type) else {
        let kind = match step_type {
            PreprocStepType::DeltaSpeed => "speed per second",
            _ => "simple change",
        };
        return Err(format!(
            "cannot calculate delta ({}) for value \"{}\" of type \"{}\": cannot convert value to numeric type",
            kind,
            value.value_desc(),
            value.type_desc()
        ));
    };

    let speed = step_type == PreprocStepType::DeltaSpeed;
    let result = previous.and_then(|previous| {
        if speed && previous.ts >= *ts {
            return None;
        }
        let elapsed = ts.seconds_since(&previous.ts);
        let floating = matches!(current, Variant::Dbl(_)) || matches!(previous.value, Variant::Dbl(_));

        if floating {
            let (now, before) = (current.to_f64()?, previous.value.to_f64()?);
            if before > now {
                return None;
            }
            Some(Variant::Dbl(if speed { (now - before) / elapsed } else { now - before }))
        } else {
            let (now, before) = (current.to_u64()?, previous.value.to_u64()?);
            if before > now {
                return None;
            }
            let change = now - before;
            Some(Variant::Ui64(if speed { (change as f64 / elapsed) as u64 } else { change }))
        }
    });

    *value = result.unwrap_or_default();
    Ok(current)
}

/// One segment of a JSON path: object member or array index.
#[derive(Debug, PartialEq)]
enum PathSegment {
    Member(String),
    Index(usize),
}

/// Parses the `$.a.b[0]['c']` subset of JSON path.
fn parse_json_path(path: &str) -> Option<Vec<PathSegment>> {
    let mut rest = path.trim().strip_prefix('$')?;
    let mut segments = Vec::new();

    while !rest.is_empty() {
        if let Some(tail) = rest.strip_prefix('.') {
            let end = tail.find(['.', '[']).unwrap_or(tail.len());
            if end == 0 {
                return None;
            }
            segments.push(PathSegment::Member(tail[..end].to_string()));
            rest = &tail[end..];
        } else if let Some(tail) = rest.strip_prefix('[') {
            let end = tail.find(']')?;
            let inner = tail[..end].trim();
            let segment = match inner.as_bytes().first() {
                Some(b'\'') | Some(b'"') if inner.len() >= 2 && inner.ends_with(&inner[..1]) => {
                    PathSegment::Member(inner[1..inner.len() - 1].to_string())
                }
                _ => PathSegment::Index(inner.parse().ok()?),
            };
            segments.push(segment);
            rest = &tail[end + 1..];
        } else {
            return None;
        }
    }

    Some(segments)
}

fn jsonpath(
    value: &mut Variant,
    params: &str,
) -> Result<(), String> {
    let fail = |reason: &str| format!("cannot extract value from json by path \"{}\": {}", params, reason);

    let Some(text) = value.to_text() else {
        return Err(fail("cannot convert value"));
    };
    let document: Value = serde_json::from_str(&text).map_err(|e| fail(&format!("cannot parse as a valid JSON object: {}", e)))?;
    let Some(path) = parse_json_path(params) else {
        return Err(fail("invalid JSON path"));
    };

    let mut node = &document;
    for segment in &path {
        let next = match segment {
            PathSegment::Member(name) => node.get(name.as_str()),
            PathSegment::Index(index) => node.get(*index),
        };
        node = next.ok_or_else(|| fail("no data matches the specified path"))?;
    }

    *value = Variant::Str(match node {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    });
    Ok(())
}
