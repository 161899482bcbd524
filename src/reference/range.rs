//! Index ranges (`N-M`, inclusive) and time ranges (`MM:SS-MM:SS`, caption overlap) applied to
//! referenced arrays.
//!
//! Every operation here is soft: a range that cannot be applied leaves the value unchanged and
//! records a [`DiagnosticKind::RangeInvalid`](crate::foundation::diagnostics::DiagnosticKind).

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::foundation::diagnostics::Diagnostic;

static TIME_RANGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{1,2}):(\d{2})-(\d{1,2}):(\d{2})$").expect("invalid time range pattern")
});

static INDEX_RANGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)-(\d+)$").expect("invalid index range pattern"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeKind {
    Time,
    Index,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RangeError {
    #[error("expected N-M or MM:SS-MM:SS")]
    Grammar,
    #[error("index range {start}-{end} is out of bounds for {len} items")]
    OutOfBounds { start: u64, end: u64, len: usize },
    #[error("start {start} is after end {end}")]
    Reversed { start: u64, end: u64 },
    #[error("{0} range cannot be applied to {1}")]
    Target(&'static str, &'static str),
}

/// Time ranges are checked first, so a string matching both grammars is a time range.
pub fn classify(range: &str) -> RangeKind {
    if TIME_RANGE.is_match(range) {
        RangeKind::Time
    } else if INDEX_RANGE.is_match(range) {
        RangeKind::Index
    } else {
        RangeKind::Unknown
    }
}

/// Inclusive `start-end` slice.
pub fn apply_index_range(values: &[Value], range: &str) -> Result<Vec<Value>, RangeError> {
    let caps = INDEX_RANGE.captures(range).ok_or(RangeError::Grammar)?;
    let len = values.len();
    // Digits that overflow u64 are out of bounds for any array.
    let start: u64 = caps[1].parse().unwrap_or(u64::MAX);
    let end: u64 = caps[2].parse().unwrap_or(u64::MAX);

    if start > end {
        return Err(RangeError::Reversed { start, end });
    }
    if end >= len as u64 {
        return Err(RangeError::OutOfBounds { start, end, len });
    }
    Ok(values[start as usize..=end as usize].to_vec())
}

/// Keeps captions whose `[start, end)` interval overlaps the requested one.
pub fn apply_time_range(captions: &[Value], range: &str) -> Result<Vec<Value>, RangeError> {
    let (range_start, range_end) = parse_time_range(range)?;
    Ok(captions
        .iter()
        .filter(|caption| match caption_interval(caption) {
            Some((start, end)) => start < range_end && end > range_start,
            None => false,
        })
        .cloned()
        .collect())
}

/// Range endpoints in seconds.
pub fn parse_time_range(range: &str) -> Result<(f64, f64), RangeError> {
    let caps = TIME_RANGE.captures(range).ok_or(RangeError::Grammar)?;
    let secs = |m: &str, s: &str| -> f64 {
        let m: f64 = m.parse().unwrap_or(0.0);
        let s: f64 = s.parse().unwrap_or(0.0);
        m * 60.0 + s
    };
    Ok((secs(&caps[1], &caps[2]), secs(&caps[3], &caps[4])))
}

fn caption_interval(caption: &Value) -> Option<(f64, f64)> {
    let field = |primary: &str, fallback: &str| {
        caption
            .get(primary)
            .and_then(Value::as_f64)
            .or_else(|| caption.get(fallback).and_then(Value::as_f64))
    };
    Some((field("absoluteStart", "start")?, field("absoluteEnd", "end")?))
}

/// Applies an index range to a plain array. Time ranges only apply to captions.
pub fn slice_array(values: &[Value], range: &str, diagnostics: &mut Vec<Diagnostic>) -> Vec<Value> {
    let result = match classify(range) {
        RangeKind::Index => apply_index_range(values, range),
        RangeKind::Time => Err(RangeError::Target("time", "an array without captions")),
        RangeKind::Unknown => Err(RangeError::Grammar),
    };
    soften(result, values, range, diagnostics)
}

/// Applies `range` to a captions array, dispatching on the range grammar.
pub fn slice_captions(
    captions: &[Value],
    range: &str,
    diagnostics: &mut Vec<Diagnostic>,
) -> Vec<Value> {
    let result = match classify(range) {
        RangeKind::Time => apply_time_range(captions, range),
        RangeKind::Index => apply_index_range(captions, range),
        RangeKind::Unknown => Err(RangeError::Grammar),
    };
    soften(result, captions, range, diagnostics)
}

fn soften(
    result: Result<Vec<Value>, RangeError>,
    original: &[Value],
    range: &str,
    diagnostics: &mut Vec<Diagnostic>,
) -> Vec<Value> {
    match result {
        Ok(sliced) => sliced,
        Err(e) => {
            diagnostics.push(Diagnostic::range_invalid(range, e));
            original.to_vec()
        }
    }
}

/// Applies `range` to a referenced value: arrays take index ranges, `{captions: [..]}` objects
/// keep their shape with `captions` sliced by either grammar. Anything else is returned
/// unchanged.
pub fn slice_value(value: &Value, range: &str, diagnostics: &mut Vec<Diagnostic>) -> Value {
    match value {
        Value::Array(items) => Value::Array(slice_array(items, range, diagnostics)),
        Value::Object(obj) => match obj.get("captions") {
            Some(Value::Array(captions)) => {
                let mut out = obj.clone();
                out.insert(
                    "captions".to_owned(),
                    Value::Array(slice_captions(captions, range, diagnostics)),
                );
                Value::Object(out)
            }
            _ => {
                diagnostics.push(Diagnostic::range_invalid(
                    range,
                    RangeError::Target(kind_name(classify(range)), "an object without captions"),
                ));
                value.clone()
            }
        },
        _ => {
            diagnostics.push(Diagnostic::range_invalid(
                range,
                RangeError::Target(kind_name(classify(range)), "a scalar value"),
            ));
            value.clone()
        }
    }
}

fn kind_name(kind: RangeKind) -> &'static str {
    match kind {
        RangeKind::Time => "time",
        RangeKind::Index => "index",
        RangeKind::Unknown => "unrecognized",
    }
}
