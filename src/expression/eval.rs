use serde_json::{Map, Value};

use crate::expression::ast::{ArrayItem, BinaryOp, BuiltinId, Expr, ObjectEntry, UnaryOp};
use crate::expression::bind::BoundFunction;
use crate::expression::error::EvalError;
use crate::expression::value::{display, loose_eq, number_value, to_number, truthy};
use crate::preset::fetch::Fetcher;

/// Upper bound on `range()` output.
pub(crate) const MAX_RANGE_LEN: usize = 100_000;

pub(crate) struct Interpreter<'a> {
    fetcher: &'a dyn Fetcher,
}

impl<'a> Interpreter<'a> {
    pub(crate) fn new(fetcher: &'a dyn Fetcher) -> Self {
        Self { fetcher }
    }

    /// Runs `f` with positional arguments; missing ones read as `null`.
    pub(crate) fn call(&self, f: &BoundFunction, args: &[Value]) -> Result<Value, EvalError> {
        let mut env = vec![Value::Null; f.slot_count];
        for (slot, arg) in f.param_slots.iter().zip(args) {
            env[slot.0 as usize] = arg.clone();
        }
        for l in &f.def.body.lets {
            let v = self.eval(&l.value, &mut env)?;
            let slot = l
                .slot
                .ok_or_else(|| EvalError::new(format!("unbound local '{}'", l.name)))?;
            env[slot.0 as usize] = v;
        }
        self.eval(&f.def.body.ret, &mut env)
    }

    fn eval(&self, e: &Expr, env: &mut Vec<Value>) -> Result<Value, EvalError> {
        match e {
            Expr::Lit(v) => Ok(v.clone()),
            Expr::Slot(s) => Ok(env.get(s.0 as usize).cloned().unwrap_or(Value::Null)),
            Expr::Array(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    match item {
                        ArrayItem::Item(e) => out.push(self.eval(e, env)?),
                        ArrayItem::Spread(e) => match self.eval(e, env)? {
                            Value::Array(xs) => out.extend(xs),
                            Value::String(s) => {
                                out.extend(s.chars().map(|c| Value::String(c.to_string())))
                            }
                            other => {
                                return Err(EvalError::new(format!(
                                    "cannot spread {} into an array",
                                    type_name(&other)
                                )));
                            }
                        },
                    }
                }
                Ok(Value::Array(out))
            }
            Expr::Object(entries) => {
                let mut out = Map::new();
                for entry in entries {
                    match entry {
                        ObjectEntry::Field(k, e) => {
                            let v = self.eval(e, env)?;
                            out.insert(k.clone(), v);
                        }
                        ObjectEntry::Spread(e) => match self.eval(e, env)? {
                            Value::Object(m) => out.extend(m),
                            Value::Array(xs) => {
                                out.extend(xs.into_iter().enumerate().map(|(i, v)| (i.to_string(), v)))
                            }
                            // Spreading a scalar into an object contributes nothing.
                            _ => {}
                        },
                    }
                }
                Ok(Value::Object(out))
            }
            Expr::Member {
                base,
                name,
                optional,
            } => {
                let b = self.eval(base, env)?;
                if b.is_null() {
                    if *optional || in_optional_chain(base) {
                        return Ok(Value::Null);
                    }
                    return Err(EvalError::new(format!(
                        "cannot read property '{name}' of null"
                    )));
                }
                Ok(member(&b, name))
            }
            Expr::Index { base, index } => {
                let b = self.eval(base, env)?;
                let i = self.eval(index, env)?;
                if b.is_null() {
                    if in_optional_chain(base) {
                        return Ok(Value::Null);
                    }
                    return Err(EvalError::new(format!(
                        "cannot read index {} of null",
                        display(&i)
                    )));
                }
                Ok(index_value(&b, &i))
            }
            Expr::Unary { op, expr } => {
                let v = self.eval(expr, env)?;
                match op {
                    UnaryOp::Not => Ok(Value::Bool(!truthy(&v))),
                    UnaryOp::Neg => to_number(&v)
                        .map(|n| number_value(-n))
                        .ok_or_else(|| {
                            EvalError::new(format!("cannot negate {}", type_name(&v)))
                        }),
                }
            }
            Expr::Binary { op, left, right } => match op {
                BinaryOp::And => {
                    let l = self.eval(left, env)?;
                    if truthy(&l) { self.eval(right, env) } else { Ok(l) }
                }
                BinaryOp::Or => {
                    let l = self.eval(left, env)?;
                    if truthy(&l) { Ok(l) } else { self.eval(right, env) }
                }
                _ => {
                    let l = self.eval(left, env)?;
                    let r = self.eval(right, env)?;
                    binary(*op, &l, &r)
                }
            },
            Expr::Ternary {
                cond,
                then,
                otherwise,
            } => {
                let c = self.eval(cond, env)?;
                if truthy(&c) {
                    self.eval(then, env)
                } else {
                    self.eval(otherwise, env)
                }
            }
            Expr::Builtin { id, args } => self.builtin(*id, args, env),
            Expr::Ident(name) => Err(EvalError::new(format!("unbound identifier '{name}'"))),
            Expr::Call { func, .. } => Err(EvalError::new(format!("unbound call '{func}'"))),
            Expr::Lambda { .. } => Err(EvalError::new("arrow function used as a value")),
        }
    }

    fn builtin(&self, id: BuiltinId, args: &[Expr], env: &mut Vec<Value>) -> Result<Value, EvalError> {
        if id.takes_callback() {
            return self.callback_builtin(id, args, env);
        }

        let mut vals = Vec::with_capacity(args.len());
        for a in args {
            vals.push(self.eval(a, env)?);
        }
        let name = id.name();

        match id {
            BuiltinId::Len => match &vals[0] {
                Value::Array(xs) => Ok(Value::from(xs.len())),
                Value::String(s) => Ok(Value::from(s.chars().count())),
                Value::Object(m) => Ok(Value::from(m.len())),
                Value::Null => Ok(Value::from(0)),
                other => Err(EvalError::new(format!(
                    "len() of {} is undefined",
                    type_name(other)
                ))),
            },
            BuiltinId::Min | BuiltinId::Max => {
                let items: &[Value] = match vals.as_slice() {
                    [Value::Array(xs)] => xs.as_slice(),
                    all => all,
                };
                let mut acc: Option<f64> = None;
                for v in items {
                    let n = num_arg(name, v)?;
                    acc = Some(match (acc, id) {
                        (None, _) => n,
                        (Some(a), BuiltinId::Min) => a.min(n),
                        (Some(a), _) => a.max(n),
                    });
                }
                Ok(acc.map_or(Value::Null, number_value))
            }
            BuiltinId::Abs => Ok(number_value(num_arg(name, &vals[0])?.abs())),
            BuiltinId::Floor => Ok(number_value(num_arg(name, &vals[0])?.floor())),
            BuiltinId::Ceil => Ok(number_value(num_arg(name, &vals[0])?.ceil())),
            BuiltinId::Round => Ok(number_value((num_arg(name, &vals[0])? + 0.5).floor())),
            BuiltinId::Clamp => {
                let x = num_arg(name, &vals[0])?;
                let lo = num_arg(name, &vals[1])?;
                let hi = num_arg(name, &vals[2])?;
                if lo > hi {
                    return Err(EvalError::new(format!(
                        "clamp() bounds are reversed: {lo} > {hi}"
                    )));
                }
                Ok(number_value(x.clamp(lo, hi)))
            }
            BuiltinId::Str => Ok(Value::String(display(&vals[0]))),
            BuiltinId::Num => Ok(to_number(&vals[0]).map_or(Value::Null, number_value)),
            BuiltinId::Keys => match &vals[0] {
                Value::Object(m) => Ok(Value::Array(
                    m.keys().map(|k| Value::String(k.clone())).collect(),
                )),
                Value::Array(xs) => Ok(Value::Array(
                    (0..xs.len()).map(|i| Value::String(i.to_string())).collect(),
                )),
                other => Err(EvalError::new(format!(
                    "keys() of {} is undefined",
                    type_name(other)
                ))),
            },
            BuiltinId::Concat => {
                if vals[0].is_array() {
                    let mut out = Vec::new();
                    for v in vals {
                        match v {
                            Value::Array(xs) => out.extend(xs),
                            other => out.push(other),
                        }
                    }
                    Ok(Value::Array(out))
                } else {
                    Ok(Value::String(vals.iter().map(display).collect()))
                }
            }
            BuiltinId::Merge => {
                let mut out = Map::new();
                for v in vals {
                    match v {
                        Value::Object(m) => out.extend(m),
                        Value::Null => {}
                        other => {
                            return Err(EvalError::new(format!(
                                "merge() expects objects, found {}",
                                type_name(&other)
                            )));
                        }
                    }
                }
                Ok(Value::Object(out))
            }
            BuiltinId::Range => {
                let (start, end) = match vals.as_slice() {
                    [n] => (0.0, num_arg(name, n)?),
                    [a, b] => (num_arg(name, a)?, num_arg(name, b)?),
                    _ => unreachable_arity(name)?,
                };
                let (start, end) = (start.ceil() as i64, end.ceil() as i64);
                let len = end.saturating_sub(start).max(0) as usize;
                if len > MAX_RANGE_LEN {
                    return Err(EvalError::new(format!(
                        "range() of {len} items exceeds the limit of {MAX_RANGE_LEN}"
                    )));
                }
                Ok(Value::Array((start..end).map(Value::from).collect()))
            }
            BuiltinId::Slice => {
                let start = num_arg(name, &vals[1])?;
                let end = vals.get(2).map(|v| num_arg(name, v)).transpose()?;
                match &vals[0] {
                    Value::Array(xs) => {
                        let (s, e) = slice_bounds(xs.len(), start, end);
                        Ok(Value::Array(xs[s..e].to_vec()))
                    }
                    Value::String(text) => {
                        let chars: Vec<char> = text.chars().collect();
                        let (s, e) = slice_bounds(chars.len(), start, end);
                        Ok(Value::String(chars[s..e].iter().collect()))
                    }
                    other => Err(EvalError::new(format!(
                        "slice() of {} is undefined",
                        type_name(other)
                    ))),
                }
            }
            BuiltinId::Join => {
                let sep = match vals.get(1) {
                    Some(v) => display(v),
                    None => ",".to_owned(),
                };
                let Value::Array(xs) = &vals[0] else {
                    return Err(EvalError::new(format!(
                        "join() expects an array, found {}",
                        type_name(&vals[0])
                    )));
                };
                let parts: Vec<String> = xs
                    .iter()
                    .map(|v| if v.is_null() { String::new() } else { display(v) })
                    .collect();
                Ok(Value::String(parts.join(&sep)))
            }
            BuiltinId::Fetch => {
                let Value::String(url) = &vals[0] else {
                    return Err(EvalError::new(format!(
                        "fetch() expects a url string, found {}",
                        type_name(&vals[0])
                    )));
                };
                let body = vals.get(1).cloned().unwrap_or(Value::Null);
                tracing::debug!(url = %url, "preset fetch");
                self.fetcher
                    .fetch(url, &body)
                    .map_err(|e| EvalError::new(format!("fetch('{url}') failed: {e}")))
            }
            BuiltinId::Map | BuiltinId::Filter => unreachable_arity(name),
        }
    }

    fn callback_builtin(
        &self,
        id: BuiltinId,
        args: &[Expr],
        env: &mut Vec<Value>,
    ) -> Result<Value, EvalError> {
        let list = self.eval(&args[0], env)?;
        let Value::Array(items) = list else {
            return Err(EvalError::new(format!(
                "{}() expects an array, found {}",
                id.name(),
                type_name(&list)
            )));
        };
        let Expr::Lambda { slots, body, .. } = &args[1] else {
            return Err(EvalError::new(format!(
                "{}() expects an arrow function",
                id.name()
            )));
        };

        let mut out = Vec::with_capacity(items.len());
        for (i, item) in items.into_iter().enumerate() {
            if let Some(s) = slots.first() {
                env[s.0 as usize] = item.clone();
            }
            if let Some(s) = slots.get(1) {
                env[s.0 as usize] = Value::from(i);
            }
            let r = self.eval(body, env)?;
            match id {
                BuiltinId::Filter => {
                    if truthy(&r) {
                        out.push(item);
                    }
                }
                _ => out.push(r),
            }
        }
        Ok(Value::Array(out))
    }
}

fn unreachable_arity<T>(name: &str) -> Result<T, EvalError> {
    Err(EvalError::new(format!("{name}() called with unsupported arguments")))
}

fn num_arg(func: &str, v: &Value) -> Result<f64, EvalError> {
    to_number(v).ok_or_else(|| {
        EvalError::new(format!("{func}() expects a number, found {}", type_name(v)))
    })
}

/// Script-style slice bounds: negatives count from the end, everything clamps to `len`.
fn slice_bounds(len: usize, start: f64, end: Option<f64>) -> (usize, usize) {
    let norm = |x: f64| -> usize {
        let x = x.trunc();
        if x < 0.0 {
            (len as f64 + x).max(0.0) as usize
        } else {
            (x as usize).min(len)
        }
    };
    let s = norm(start);
    let e = end.map_or(len, norm);
    (s, e.max(s))
}

fn in_optional_chain(e: &Expr) -> bool {
    match e {
        Expr::Member { base, optional, .. } => *optional || in_optional_chain(base),
        Expr::Index { base, .. } => in_optional_chain(base),
        _ => false,
    }
}

fn member(base: &Value, name: &str) -> Value {
    match base {
        Value::Object(m) => m.get(name).cloned().unwrap_or(Value::Null),
        Value::Array(xs) if name == "length" => Value::from(xs.len()),
        Value::String(s) if name == "length" => Value::from(s.chars().count()),
        _ => Value::Null,
    }
}

fn index_value(base: &Value, index: &Value) -> Value {
    match (base, index) {
        (Value::Object(m), Value::String(k)) => m.get(k).cloned().unwrap_or(Value::Null),
        (Value::Object(m), Value::Number(n)) => m.get(&n.to_string()).cloned().unwrap_or(Value::Null),
        (Value::Array(xs), Value::Number(n)) => n
            .as_u64()
            .and_then(|i| xs.get(i as usize))
            .cloned()
            .unwrap_or(Value::Null),
        (Value::Array(_) | Value::String(_), Value::String(k)) => member(base, k),
        (Value::String(s), Value::Number(n)) => n
            .as_u64()
            .and_then(|i| s.chars().nth(i as usize))
            .map_or(Value::Null, |c| Value::String(c.to_string())),
        _ => Value::Null,
    }
}

fn binary(op: BinaryOp, l: &Value, r: &Value) -> Result<Value, EvalError> {
    match op {
        BinaryOp::Eq => return Ok(Value::Bool(loose_eq(l, r))),
        BinaryOp::Ne => return Ok(Value::Bool(!loose_eq(l, r))),
        BinaryOp::Add if l.is_string() || r.is_string() => {
            return Ok(Value::String(format!("{}{}", display(l), display(r))));
        }
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            return compare(op, l, r).map(Value::Bool);
        }
        _ => {}
    }

    let (Some(a), Some(b)) = (to_number(l), to_number(r)) else {
        return Err(EvalError::new(format!(
            "unsupported operands for {op:?}: {} and {}",
            type_name(l),
            type_name(r)
        )));
    };
    let v = match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div => a / b,
        BinaryOp::Mod => a % b,
        _ => return Err(EvalError::new(format!("unsupported operator {op:?}"))),
    };
    Ok(number_value(v))
}

fn compare(op: BinaryOp, l: &Value, r: &Value) -> Result<bool, EvalError> {
    let ord = match (l, r) {
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => match (to_number(l), to_number(r)) {
            (Some(a), Some(b)) => a.partial_cmp(&b),
            _ => {
                return Err(EvalError::new(format!(
                    "cannot compare {} with {}",
                    type_name(l),
                    type_name(r)
                )));
            }
        },
    };
    let Some(ord) = ord else {
        return Ok(false);
    };
    Ok(match op {
        BinaryOp::Lt => ord.is_lt(),
        BinaryOp::Le => ord.is_le(),
        BinaryOp::Gt => ord.is_gt(),
        _ => ord.is_ge(),
    })
}

fn type_name(v: &Value) -> &'static str {
    crate::scene::output::json_type_name(v)
}
