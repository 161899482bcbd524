use serde_json::{Number, Value};

/// Integral finite floats become integers; NaN and infinities become `null`.
pub(crate) fn number_value(v: f64) -> Value {
    if !v.is_finite() {
        return Value::Null;
    }
    if v.fract() == 0.0 && v.abs() < 9.0e15 {
        return Value::Number(Number::from(v as i64));
    }
    Number::from_f64(v).map_or(Value::Null, Value::Number)
}

pub(crate) fn truthy(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Equality with numbers compared by value, so `1 == 1.0`.
pub(crate) fn loose_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(l, r)| loose_eq(l, r))
        }
        (Value::Object(x), Value::Object(y)) => {
            x.len() == y.len()
                && x
                    .iter()
                    .all(|(k, l)| y.get(k).is_some_and(|r| loose_eq(l, r)))
        }
        _ => a == b,
    }
}

/// Text form used by string concatenation and `str()`.
pub(crate) fn display(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_owned(),
        other => other.to_string(),
    }
}

/// Numeric coercion: numbers, numeric strings, booleans and null.
pub(crate) fn to_number(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::Null => Some(0.0),
        Value::String(s) => {
            let t = s.trim();
            if t.is_empty() {
                Some(0.0)
            } else {
                t.parse::<f64>().ok().filter(|f| f.is_finite())
            }
        }
        Value::Array(_) | Value::Object(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn integral_floats_normalize_to_integers() {
        assert_eq!(number_value(3.0), json!(3));
        assert_eq!(number_value(2.5), json!(2.5));
        assert_eq!(number_value(f64::NAN), Value::Null);
        assert_eq!(number_value(f64::INFINITY), Value::Null);
    }

    #[test]
    fn truthiness_follows_script_rules() {
        for v in [json!(null), json!(false), json!(0), json!(""), json!(0.0)] {
            assert!(!truthy(&v), "{v} should be falsy");
        }
        for v in [json!(true), json!(1), json!("x"), json!([]), json!({})] {
            assert!(truthy(&v), "{v} should be truthy");
        }
    }

    #[test]
    fn loose_equality_compares_numbers_by_value() {
        assert!(loose_eq(&json!(1), &json!(1.0)));
        assert!(loose_eq(&json!({"a": [1]}), &json!({"a": [1.0]})));
        assert!(!loose_eq(&json!("1"), &json!(1)));
    }

    #[test]
    fn numeric_coercion() {
        assert_eq!(to_number(&json!(" 4.5 ")), Some(4.5));
        assert_eq!(to_number(&json!("abc")), None);
        assert_eq!(to_number(&json!(true)), Some(1.0));
        assert_eq!(to_number(&json!([1])), None);
    }
}
