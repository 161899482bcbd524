use crate::expression::ast::{ArrayItem, BuiltinId, Expr, FunctionDef, ObjectEntry, SlotId};
use crate::expression::error::ExprError;

/// Most parameters a preset function may declare: `(inputData, props)`.
pub(crate) const MAX_PARAMS: usize = 2;

/// A function whose identifiers all resolve to frame slots.
#[derive(Debug, Clone)]
pub(crate) struct BoundFunction {
    pub(crate) def: FunctionDef,
    pub(crate) param_slots: Vec<SlotId>,
    pub(crate) slot_count: usize,
}

/// Lexical scopes of the function being bound. Names not found here are rejected, so a
/// compiled preset can only ever see its own parameters and locals.
struct Scopes {
    names: Vec<(String, SlotId)>,
    marks: Vec<usize>,
    next: u32,
}

impl Scopes {
    fn new() -> Self {
        Self {
            names: Vec::new(),
            marks: Vec::new(),
            next: 0,
        }
    }

    fn declare(&mut self, name: &str) -> Result<SlotId, ExprError> {
        let floor = self.marks.last().copied().unwrap_or(0);
        if self.names[floor..].iter().any(|(n, _)| n == name) {
            return Err(ExprError::new(0, format!("'{name}' is already declared")));
        }
        let slot = SlotId(self.next);
        self.next += 1;
        self.names.push((name.to_owned(), slot));
        Ok(slot)
    }

    fn lookup(&self, name: &str) -> Option<SlotId> {
        self.names
            .iter()
            .rev()
            .find(|(n, _)| n == name)
            .map(|(_, s)| *s)
    }

    fn push(&mut self) {
        self.marks.push(self.names.len());
    }

    fn pop(&mut self) {
        if let Some(m) = self.marks.pop() {
            self.names.truncate(m);
        }
    }
}

pub(crate) fn bind_function(mut def: FunctionDef) -> Result<BoundFunction, ExprError> {
    if def.params.len() > MAX_PARAMS {
        return Err(ExprError::new(
            0,
            format!(
                "preset function takes at most {MAX_PARAMS} parameters, found {}",
                def.params.len()
            ),
        ));
    }

    let mut scopes = Scopes::new();
    let mut param_slots = Vec::with_capacity(def.params.len());
    for p in &def.params {
        param_slots.push(scopes.declare(p)?);
    }

    for l in &mut def.body.lets {
        let value = std::mem::replace(&mut l.value, Expr::Lit(serde_json::Value::Null));
        l.value = bind_expr(value, &mut scopes)?;
        l.slot = Some(scopes.declare(&l.name)?);
    }
    let ret = std::mem::replace(&mut def.body.ret, Expr::Lit(serde_json::Value::Null));
    def.body.ret = bind_expr(ret, &mut scopes)?;

    Ok(BoundFunction {
        def,
        param_slots,
        slot_count: scopes.next as usize,
    })
}

fn bind_expr(e: Expr, scopes: &mut Scopes) -> Result<Expr, ExprError> {
    match e {
        Expr::Lit(_) | Expr::Slot(_) => Ok(e),
        Expr::Ident(name) => scopes
            .lookup(&name)
            .map(Expr::Slot)
            .ok_or_else(|| ExprError::new(0, format!("unknown identifier '{name}'"))),
        Expr::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(match item {
                    ArrayItem::Item(e) => ArrayItem::Item(bind_expr(e, scopes)?),
                    ArrayItem::Spread(e) => ArrayItem::Spread(bind_expr(e, scopes)?),
                });
            }
            Ok(Expr::Array(out))
        }
        Expr::Object(entries) => {
            let mut out = Vec::with_capacity(entries.len());
            for entry in entries {
                out.push(match entry {
                    ObjectEntry::Field(k, e) => ObjectEntry::Field(k, bind_expr(e, scopes)?),
                    ObjectEntry::Spread(e) => ObjectEntry::Spread(bind_expr(e, scopes)?),
                });
            }
            Ok(Expr::Object(out))
        }
        Expr::Member {
            base,
            name,
            optional,
        } => Ok(Expr::Member {
            base: Box::new(bind_expr(*base, scopes)?),
            name,
            optional,
        }),
        Expr::Index { base, index } => Ok(Expr::Index {
            base: Box::new(bind_expr(*base, scopes)?),
            index: Box::new(bind_expr(*index, scopes)?),
        }),
        Expr::Unary { op, expr } => Ok(Expr::Unary {
            op,
            expr: Box::new(bind_expr(*expr, scopes)?),
        }),
        Expr::Binary { op, left, right } => Ok(Expr::Binary {
            op,
            left: Box::new(bind_expr(*left, scopes)?),
            right: Box::new(bind_expr(*right, scopes)?),
        }),
        Expr::Ternary {
            cond,
            then,
            otherwise,
        } => Ok(Expr::Ternary {
            cond: Box::new(bind_expr(*cond, scopes)?),
            then: Box::new(bind_expr(*then, scopes)?),
            otherwise: Box::new(bind_expr(*otherwise, scopes)?),
        }),
        Expr::Call { func, args } => bind_call(func, args, scopes),
        Expr::Builtin { id, args } => {
            let mut out = Vec::with_capacity(args.len());
            for a in args {
                out.push(bind_expr(a, scopes)?);
            }
            Ok(Expr::Builtin { id, args: out })
        }
        Expr::Lambda { .. } => Err(ExprError::new(
            0,
            "arrow functions are only allowed as map/filter callbacks",
        )),
    }
}

fn bind_call(func: String, args: Vec<Expr>, scopes: &mut Scopes) -> Result<Expr, ExprError> {
    let id = BuiltinId::from_name(&func)
        .ok_or_else(|| ExprError::new(0, format!("unknown function '{func}'")))?;

    let (min, max) = id.arity();
    if args.len() < min || max.is_some_and(|m| args.len() > m) {
        let expected = match max {
            Some(m) if m == min => format!("{min}"),
            Some(m) => format!("{min}..={m}"),
            None => format!("at least {min}"),
        };
        return Err(ExprError::new(
            0,
            format!(
                "{}() expects {expected} arguments, found {}",
                id.name(),
                args.len()
            ),
        ));
    }

    let mut out = Vec::with_capacity(args.len());
    for (i, a) in args.into_iter().enumerate() {
        if id.takes_callback() && i == 1 {
            out.push(bind_callback(id, a, scopes)?);
        } else {
            out.push(bind_expr(a, scopes)?);
        }
    }
    Ok(Expr::Builtin { id, args: out })
}

fn bind_callback(id: BuiltinId, e: Expr, scopes: &mut Scopes) -> Result<Expr, ExprError> {
    let Expr::Lambda { params, body, .. } = e else {
        return Err(ExprError::new(
            0,
            format!("{}() expects an arrow function as its second argument", id.name()),
        ));
    };
    if params.is_empty() || params.len() > 2 {
        return Err(ExprError::new(
            0,
            format!("{}() callback takes (item) or (item, index)", id.name()),
        ));
    }

    scopes.push();
    let mut slots = Vec::with_capacity(params.len());
    for p in &params {
        match scopes.declare(p) {
            Ok(s) => slots.push(s),
            Err(err) => {
                scopes.pop();
                return Err(err);
            }
        }
    }
    let body = bind_expr(*body, scopes);
    scopes.pop();

    Ok(Expr::Lambda {
        params,
        slots,
        body: Box::new(body?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::parser::parse_function;

    fn bind(src: &str) -> Result<BoundFunction, ExprError> {
        bind_function(parse_function(src).unwrap())
    }

    #[test]
    fn assigns_slots_to_params_then_lets() {
        let f = bind("(a, b) => { let c = a; return c; }").unwrap();
        assert_eq!(f.param_slots, vec![SlotId(0), SlotId(1)]);
        assert_eq!(f.def.body.lets[0].slot, Some(SlotId(2)));
        assert_eq!(f.def.body.lets[0].value, Expr::Slot(SlotId(0)));
        assert_eq!(f.def.body.ret, Expr::Slot(SlotId(2)));
        assert_eq!(f.slot_count, 3);
    }

    #[test]
    fn resolves_calls_to_builtins() {
        let f = bind("(xs) => map(xs, (x, i) => x + i)").unwrap();
        let Expr::Builtin { id, args } = &f.def.body.ret else {
            panic!("expected builtin");
        };
        assert_eq!(*id, BuiltinId::Map);
        assert!(matches!(&args[1], Expr::Lambda { slots, .. } if slots.len() == 2));
        assert_eq!(f.slot_count, 3);
    }

    #[test]
    fn lambda_params_shadow_and_then_leave_scope() {
        assert!(bind("(x) => map(x, x => x)").is_ok());
        let err = bind("(xs) => [map(xs, y => y), y]").unwrap_err();
        assert!(err.message.contains("unknown identifier 'y'"));
    }

    #[test]
    fn rejects_free_identifiers() {
        for src in ["() => globalThis", "(a) => process.env", "(a) => require('fs')"] {
            assert!(bind(src).is_err(), "{src} should not bind");
        }
    }

    #[test]
    fn let_cannot_see_itself() {
        assert!(bind("() => { let a = a; return a; }").is_err());
    }

    #[test]
    fn rejects_redeclared_names() {
        assert!(bind("(a) => { let a = 1; return a; }").is_err());
        assert!(bind("() => { let a = 1; let a = 2; return a; }").is_err());
    }

    #[test]
    fn checks_builtin_arity() {
        let err = bind("(a) => len(a, a)").unwrap_err();
        assert_eq!(err.message, "len() expects 1 arguments, found 2");
        assert!(bind("(a) => clamp(a, 0)").is_err());
        assert!(bind("(a) => max(a, 1, 2, 3)").is_ok());
    }

    #[test]
    fn lambdas_are_callback_only() {
        assert!(bind("(a) => { let f = x => x; return f; }").is_err());
        assert!(bind("(a) => map(a, a)").is_err());
        assert!(bind("(a) => len(x => x)").is_err());
    }

    #[test]
    fn rejects_too_many_params() {
        let err = bind("(a, b, c) => a").unwrap_err();
        assert!(err.message.contains("at most 2"));
    }
}
