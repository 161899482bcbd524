//! `data:[key]` reference resolution over arbitrary JSON.
//!
//! Resolution is pure: inputs are borrowed and never mutated, and every problem encountered
//! along the way is returned as a [`Diagnostic`] next to the resolved value instead of being
//! logged or raised. Missing keys never abort a walk; the token text is left where it was.
//!
//! Two walks are provided:
//!
//! - [`resolve_all`]: whole-value substitution for strings that are exactly one token (type is
//!   preserved: numbers stay numbers, objects stay objects) and template substitution for tokens
//!   embedded in longer strings (each occurrence is replaced by a printable projection).
//! - [`resolve_flexible`]: whole-value substitution only, plus the `$data` partial-override form
//!   where a referenced object supplies defaults and inline fields override them.

use std::collections::HashSet;

use serde_json::{Map, Value};

use crate::foundation::diagnostics::Diagnostic;
use crate::reference::base_data::BaseData;
use crate::reference::range::{slice_array, slice_captions, slice_value};
use crate::reference::token::{self, DataToken};

/// Reserved key of the partial-override form used by [`resolve_flexible`].
pub const OVERRIDE_KEY: &str = "$data";

/// Printable projection candidates, in priority order.
const PRINTABLE_POINTERS: [&str; 5] = ["/src", "/metadata/src", "/filePath", "/title", "/text"];

#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
    pub value: Value,
    pub diagnostics: Vec<Diagnostic>,
}

impl Resolved {
    pub fn is_clean(&self) -> bool {
        self.diagnostics.is_empty()
    }
}

pub fn resolve_all(value: &Value, base: &BaseData) -> Resolved {
    let mut diagnostics = Vec::new();
    let value = resolve_value(value, base, &mut diagnostics);
    Resolved { value, diagnostics }
}

pub fn resolve_flexible(value: &Value, base: &BaseData) -> Resolved {
    let mut diagnostics = Vec::new();
    let value = flexible_value(value, base, &mut diagnostics);
    Resolved { value, diagnostics }
}

/// Keys referenced anywhere in `value` (range suffixes ignored) that `base` does not define.
/// De-duplicated, in first-seen order.
pub fn validate_references(value: &Value, base: &BaseData) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut missing = Vec::new();
    collect_missing(value, base, &mut seen, &mut missing);
    missing
}

fn collect_missing(
    value: &Value,
    base: &BaseData,
    seen: &mut HashSet<String>,
    missing: &mut Vec<String>,
) {
    match value {
        Value::String(s) => {
            for t in token::scan(s) {
                if !base.contains_key(t.key) && seen.insert(t.key.to_owned()) {
                    missing.push(t.key.to_owned());
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_missing(item, base, seen, missing);
            }
        }
        Value::Object(obj) => {
            for v in obj.values() {
                collect_missing(v, base, seen, missing);
            }
        }
        Value::Null | Value::Bool(_) | Value::Number(_) => {}
    }
}

fn resolve_value(value: &Value, base: &BaseData, diags: &mut Vec<Diagnostic>) -> Value {
    match value {
        Value::String(s) => resolve_string(s, base, diags),
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| resolve_value(item, base, diags))
                .collect(),
        ),
        Value::Object(obj) => Value::Object(
            obj.iter()
                .map(|(k, v)| (k.clone(), resolve_value(v, base, diags)))
                .collect(),
        ),
        Value::Null | Value::Bool(_) | Value::Number(_) => value.clone(),
    }
}

fn resolve_string(s: &str, base: &BaseData, diags: &mut Vec<Diagnostic>) -> Value {
    if let Some(t) = token::parse_exact(s) {
        return whole_value(&t, base, diags).unwrap_or_else(|| Value::String(s.to_owned()));
    }

    let tokens = token::scan(s);
    if tokens.is_empty() {
        return Value::String(s.to_owned());
    }

    let mut out = String::with_capacity(s.len());
    let mut cursor = 0;
    for t in &tokens {
        out.push_str(&s[cursor..t.span.start]);
        match base.get(t.key) {
            Some(referenced) => out.push_str(&printable(referenced, t.range, diags)),
            None => {
                diags.push(Diagnostic::reference_not_found(t.key));
                out.push_str(&s[t.span.clone()]);
            }
        }
        cursor = t.span.end;
    }
    out.push_str(&s[cursor..]);
    Value::String(out)
}

/// `None` when the key is missing (diagnostic already recorded).
fn whole_value(t: &DataToken<'_>, base: &BaseData, diags: &mut Vec<Diagnostic>) -> Option<Value> {
    let Some(referenced) = base.get(t.key) else {
        diags.push(Diagnostic::reference_not_found(t.key));
        return None;
    };
    Some(match t.range {
        Some(range) => slice_value(referenced, range, diags),
        None => referenced.clone(),
    })
}

fn printable(referenced: &Value, range: Option<&str>, diags: &mut Vec<Diagnostic>) -> String {
    match projection(referenced, range, diags) {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

fn projection(referenced: &Value, range: Option<&str>, diags: &mut Vec<Diagnostic>) -> Value {
    for ptr in PRINTABLE_POINTERS {
        // Null and "" fall through to the next candidate.
        if let Some(v) = referenced
            .pointer(ptr)
            .filter(|v| !v.is_null() && v.as_str() != Some(""))
        {
            return v.clone();
        }
    }

    if let Some(Value::Array(captions)) = referenced.get("captions") {
        return match range {
            Some(range) => Value::Array(slice_captions(captions, range, diags)),
            None => Value::Array(captions.clone()),
        };
    }
    match (referenced, range) {
        (Value::Array(items), Some(range)) => Value::Array(slice_array(items, range, diags)),
        _ => referenced.clone(),
    }
}

fn flexible_value(value: &Value, base: &BaseData, diags: &mut Vec<Diagnostic>) -> Value {
    match value {
        Value::String(s) => match token::parse_exact(s) {
            Some(t) => whole_value(&t, base, diags).unwrap_or_else(|| value.clone()),
            None => value.clone(),
        },
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| flexible_value(item, base, diags))
                .collect(),
        ),
        Value::Object(obj) => flexible_object(obj, base, diags),
        Value::Null | Value::Bool(_) | Value::Number(_) => value.clone(),
    }
}

fn flexible_object(obj: &Map<String, Value>, base: &BaseData, diags: &mut Vec<Diagnostic>) -> Value {
    let inline = || -> Map<String, Value> {
        obj.iter()
            .filter(|(k, _)| k.as_str() != OVERRIDE_KEY)
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    };

    let override_token = obj
        .get(OVERRIDE_KEY)
        .and_then(Value::as_str)
        .and_then(token::parse_exact);

    let Some(t) = override_token else {
        let mut out = Map::with_capacity(obj.len());
        for (k, v) in obj {
            out.insert(k.clone(), flexible_value(v, base, diags));
        }
        return Value::Object(out);
    };

    match whole_value(&t, base, diags) {
        Some(Value::Object(defaults)) => {
            let mut merged = defaults;
            for (k, v) in inline() {
                let resolved = flexible_value(&v, base, diags);
                merged.insert(k, resolved);
            }
            Value::Object(merged)
        }
        Some(other) => other,
        None => {
            let mut out = Map::with_capacity(obj.len());
            for (k, v) in obj {
                if k == OVERRIDE_KEY {
                    out.insert(k.clone(), v.clone());
                } else {
                    out.insert(k.clone(), flexible_value(v, base, diags));
                }
            }
            Value::Object(out)
        }
    }
}
