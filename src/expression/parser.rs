use serde_json::Value;

use crate::expression::ast::{
    ArrayItem, BinaryOp, Block, Expr, FunctionDef, Let, ObjectEntry, UnaryOp,
};
use crate::expression::error::ExprError;
use crate::expression::lexer::{Span, Token, TokenKind, lex};
use crate::expression::value::number_value;

/// Parses a whole preset function: `(input, props) => body` or `function (input, props) { .. }`.
pub(crate) fn parse_function(src: &str) -> Result<FunctionDef, ExprError> {
    let tokens = lex(src)?;
    let mut p = Parser { tokens, pos: 0 };
    let def = p.parse_function_def()?;
    p.consume(TokenKind::Semi);
    p.expect(TokenKind::Eof)?;
    Ok(def)
}

/// Parses a single expression.
#[cfg(test)]
pub(crate) fn parse_expr(src: &str) -> Result<Expr, ExprError> {
    let tokens = lex(src)?;
    let mut p = Parser { tokens, pos: 0 };
    let expr = p.parse_expr()?;
    p.expect(TokenKind::Eof)?;
    Ok(expr)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn peek_at(&self, ahead: usize) -> &TokenKind {
        let idx = (self.pos + ahead).min(self.tokens.len() - 1);
        &self.tokens[idx].kind
    }

    fn bump(&mut self) -> &Token {
        let t = &self.tokens[self.pos];
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        t
    }

    fn span(&self) -> Span {
        self.peek().span
    }

    fn expect(&mut self, kind: TokenKind) -> Result<(), ExprError> {
        if self.peek().kind == kind {
            self.bump();
            Ok(())
        } else {
            Err(ExprError::new(
                self.span().start,
                format!("expected {kind:?}, found {:?}", self.peek().kind),
            ))
        }
    }

    fn consume(&mut self, kind: TokenKind) -> bool {
        if self.peek().kind == kind {
            self.bump();
            true
        } else {
            false
        }
    }

    fn expect_ident(&mut self, what: &str) -> Result<String, ExprError> {
        let t = self.bump().clone();
        match t.kind {
            TokenKind::Ident(s) => Ok(s),
            other => Err(ExprError::new(
                t.span.start,
                format!("expected {what}, found {other:?}"),
            )),
        }
    }

    fn parse_function_def(&mut self) -> Result<FunctionDef, ExprError> {
        if matches!(&self.peek().kind, TokenKind::Ident(s) if s == "function") {
            self.bump();
            self.expect(TokenKind::LParen)?;
            let params = self.parse_param_list()?;
            if self.peek().kind != TokenKind::LBrace {
                return Err(ExprError::new(
                    self.span().start,
                    "function body must be a { ... } block",
                ));
            }
            let body = self.parse_block()?;
            return Ok(FunctionDef { params, body });
        }

        let start = self.span().start;
        let Some(params) = self.parse_arrow_params()? else {
            return Err(ExprError::new(
                start,
                "preset source must be a function: (inputData, props) => ...",
            ));
        };
        let body = if self.peek().kind == TokenKind::LBrace
            && matches!(self.peek_at(1), TokenKind::Let | TokenKind::Return)
        {
            self.parse_block()?
        } else {
            Block {
                lets: Vec::new(),
                ret: self.parse_expr()?,
            }
        };
        Ok(FunctionDef { params, body })
    }

    /// Consumes `(a, b) =>` or `a =>` when present. Leaves the cursor untouched otherwise.
    fn parse_arrow_params(&mut self) -> Result<Option<Vec<String>>, ExprError> {
        match self.peek().kind.clone() {
            TokenKind::Ident(name) if *self.peek_at(1) == TokenKind::Arrow => {
                self.bump();
                self.bump();
                Ok(Some(vec![name]))
            }
            TokenKind::LParen if self.looks_like_arrow_params() => {
                self.bump();
                let params = self.parse_param_list()?;
                self.expect(TokenKind::Arrow)?;
                Ok(Some(params))
            }
            _ => Ok(None),
        }
    }

    /// `(` ident (`,` ident)* `)` `=>`, scanned without consuming.
    fn looks_like_arrow_params(&self) -> bool {
        let mut i = 1;
        if *self.peek_at(i) == TokenKind::RParen {
            return *self.peek_at(i + 1) == TokenKind::Arrow;
        }
        loop {
            if !matches!(self.peek_at(i), TokenKind::Ident(_)) {
                return false;
            }
            i += 1;
            match self.peek_at(i) {
                TokenKind::Comma => i += 1,
                TokenKind::RParen => return *self.peek_at(i + 1) == TokenKind::Arrow,
                _ => return false,
            }
        }
    }

    /// After the opening paren: `a, b)`.
    fn parse_param_list(&mut self) -> Result<Vec<String>, ExprError> {
        let mut params = Vec::new();
        if self.consume(TokenKind::RParen) {
            return Ok(params);
        }
        loop {
            let start = self.span().start;
            let name = self.expect_ident("parameter name")?;
            if params.contains(&name) {
                return Err(ExprError::new(start, format!("duplicate parameter '{name}'")));
            }
            params.push(name);
            if self.consume(TokenKind::Comma) {
                continue;
            }
            self.expect(TokenKind::RParen)?;
            return Ok(params);
        }
    }

    fn parse_block(&mut self) -> Result<Block, ExprError> {
        self.expect(TokenKind::LBrace)?;
        let mut lets = Vec::new();
        while self.consume(TokenKind::Let) {
            let name = self.expect_ident("binding name")?;
            self.expect(TokenKind::Assign)?;
            let value = self.parse_expr()?;
            self.consume(TokenKind::Semi);
            lets.push(Let {
                name,
                slot: None,
                value,
            });
        }
        self.expect(TokenKind::Return)?;
        let ret = self.parse_expr()?;
        self.consume(TokenKind::Semi);
        self.expect(TokenKind::RBrace)?;
        Ok(Block { lets, ret })
    }

    fn parse_expr(&mut self) -> Result<Expr, ExprError> {
        if let Some(params) = self.parse_arrow_params()? {
            let body = self.parse_expr()?;
            return Ok(Expr::Lambda {
                params,
                slots: Vec::new(),
                body: Box::new(body),
            });
        }
        self.parse_ternary()
    }

    fn parse_ternary(&mut self) -> Result<Expr, ExprError> {
        let cond = self.parse_or()?;
        if !self.consume(TokenKind::Question) {
            return Ok(cond);
        }
        let then = self.parse_expr()?;
        self.expect(TokenKind::Colon)?;
        let otherwise = self.parse_expr()?;
        Ok(Expr::Ternary {
            cond: Box::new(cond),
            then: Box::new(then),
            otherwise: Box::new(otherwise),
        })
    }

    fn parse_or(&mut self) -> Result<Expr, ExprError> {
        let mut e = self.parse_and()?;
        while self.consume(TokenKind::OrOr) {
            let r = self.parse_and()?;
            e = binary(BinaryOp::Or, e, r);
        }
        Ok(e)
    }

    fn parse_and(&mut self) -> Result<Expr, ExprError> {
        let mut e = self.parse_equality()?;
        while self.consume(TokenKind::AndAnd) {
            let r = self.parse_equality()?;
            e = binary(BinaryOp::And, e, r);
        }
        Ok(e)
    }

    fn parse_equality(&mut self) -> Result<Expr, ExprError> {
        let mut e = self.parse_comparison()?;
        loop {
            let op = if self.consume(TokenKind::EqEq) {
                BinaryOp::Eq
            } else if self.consume(TokenKind::Ne) {
                BinaryOp::Ne
            } else {
                break;
            };
            let r = self.parse_comparison()?;
            e = binary(op, e, r);
        }
        Ok(e)
    }

    fn parse_comparison(&mut self) -> Result<Expr, ExprError> {
        let mut e = self.parse_term()?;
        loop {
            let op = if self.consume(TokenKind::Lt) {
                BinaryOp::Lt
            } else if self.consume(TokenKind::Le) {
                BinaryOp::Le
            } else if self.consume(TokenKind::Gt) {
                BinaryOp::Gt
            } else if self.consume(TokenKind::Ge) {
                BinaryOp::Ge
            } else {
                break;
            };
            let r = self.parse_term()?;
            e = binary(op, e, r);
        }
        Ok(e)
    }

    fn parse_term(&mut self) -> Result<Expr, ExprError> {
        let mut e = self.parse_factor()?;
        loop {
            let op = if self.consume(TokenKind::Plus) {
                BinaryOp::Add
            } else if self.consume(TokenKind::Minus) {
                BinaryOp::Sub
            } else {
                break;
            };
            let r = self.parse_factor()?;
            e = binary(op, e, r);
        }
        Ok(e)
    }

    fn parse_factor(&mut self) -> Result<Expr, ExprError> {
        let mut e = self.parse_unary()?;
        loop {
            let op = if self.consume(TokenKind::Star) {
                BinaryOp::Mul
            } else if self.consume(TokenKind::Slash) {
                BinaryOp::Div
            } else if self.consume(TokenKind::Percent) {
                BinaryOp::Mod
            } else {
                break;
            };
            let r = self.parse_unary()?;
            e = binary(op, e, r);
        }
        Ok(e)
    }

    fn parse_unary(&mut self) -> Result<Expr, ExprError> {
        if self.consume(TokenKind::Minus) {
            let e = self.parse_unary()?;
            return Ok(Expr::Unary {
                op: UnaryOp::Neg,
                expr: Box::new(e),
            });
        }
        if self.consume(TokenKind::Bang) {
            let e = self.parse_unary()?;
            return Ok(Expr::Unary {
                op: UnaryOp::Not,
                expr: Box::new(e),
            });
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<Expr, ExprError> {
        let mut e = self.parse_primary()?;

        loop {
            let optional = if self.consume(TokenKind::Dot) {
                false
            } else if self.consume(TokenKind::QuestionDot) {
                true
            } else if self.consume(TokenKind::LBracket) {
                let index = self.parse_expr()?;
                self.expect(TokenKind::RBracket)?;
                e = Expr::Index {
                    base: Box::new(e),
                    index: Box::new(index),
                };
                continue;
            } else if self.peek().kind == TokenKind::LParen {
                let start = self.span().start;
                self.bump();
                let args = self.parse_args()?;
                let func = match e {
                    Expr::Ident(name) => name,
                    _ => {
                        return Err(ExprError::new(
                            start,
                            "call target must be a builtin name",
                        ));
                    }
                };
                e = Expr::Call { func, args };
                continue;
            } else {
                break;
            };

            let t = self.bump().clone();
            let name = match t.kind {
                TokenKind::Ident(s) => s,
                ref other => match other.keyword_text() {
                    Some(k) => k.to_owned(),
                    None => {
                        return Err(ExprError::new(
                            t.span.start,
                            format!("expected property name after '.', found {other:?}"),
                        ));
                    }
                },
            };
            e = Expr::Member {
                base: Box::new(e),
                name,
                optional,
            };
        }

        Ok(e)
    }

    fn parse_args(&mut self) -> Result<Vec<Expr>, ExprError> {
        let mut args = Vec::new();
        if self.consume(TokenKind::RParen) {
            return Ok(args);
        }
        loop {
            args.push(self.parse_expr()?);
            if self.consume(TokenKind::Comma) {
                if self.consume(TokenKind::RParen) {
                    return Ok(args);
                }
                continue;
            }
            self.expect(TokenKind::RParen)?;
            return Ok(args);
        }
    }

    fn parse_primary(&mut self) -> Result<Expr, ExprError> {
        let t = self.bump().clone();
        match t.kind {
            TokenKind::Number(v) => Ok(Expr::Lit(number_value(v))),
            TokenKind::Str(s) => Ok(Expr::Lit(Value::String(s))),
            TokenKind::True => Ok(Expr::Lit(Value::Bool(true))),
            TokenKind::False => Ok(Expr::Lit(Value::Bool(false))),
            TokenKind::Null => Ok(Expr::Lit(Value::Null)),
            TokenKind::Ident(s) => Ok(Expr::Ident(s)),
            TokenKind::LParen => {
                let e = self.parse_expr()?;
                self.expect(TokenKind::RParen)?;
                Ok(e)
            }
            TokenKind::LBracket => self.parse_array(),
            TokenKind::LBrace => self.parse_object(),
            other => Err(ExprError::new(
                t.span.start,
                format!("unexpected token {other:?}"),
            )),
        }
    }

    /// After `[`.
    fn parse_array(&mut self) -> Result<Expr, ExprError> {
        let mut items = Vec::new();
        loop {
            if self.consume(TokenKind::RBracket) {
                return Ok(Expr::Array(items));
            }
            if self.consume(TokenKind::Ellipsis) {
                items.push(ArrayItem::Spread(self.parse_expr()?));
            } else {
                items.push(ArrayItem::Item(self.parse_expr()?));
            }
            if !self.consume(TokenKind::Comma) {
                self.expect(TokenKind::RBracket)?;
                return Ok(Expr::Array(items));
            }
        }
    }

    /// After `{`.
    fn parse_object(&mut self) -> Result<Expr, ExprError> {
        let mut entries = Vec::new();
        loop {
            if self.consume(TokenKind::RBrace) {
                return Ok(Expr::Object(entries));
            }
            if self.consume(TokenKind::Ellipsis) {
                entries.push(ObjectEntry::Spread(self.parse_expr()?));
            } else {
                let t = self.bump().clone();
                let (key, shorthand) = match &t.kind {
                    TokenKind::Ident(s) => (s.clone(), true),
                    TokenKind::Str(s) => (s.clone(), false),
                    TokenKind::Number(n) => (number_value(*n).to_string(), false),
                    other => match other.keyword_text() {
                        Some(k) => (k.to_owned(), false),
                        None => {
                            return Err(ExprError::new(
                                t.span.start,
                                format!("expected object key, found {other:?}"),
                            ));
                        }
                    },
                };
                if shorthand && matches!(self.peek().kind, TokenKind::Comma | TokenKind::RBrace) {
                    entries.push(ObjectEntry::Field(key.clone(), Expr::Ident(key)));
                } else {
                    self.expect(TokenKind::Colon)?;
                    entries.push(ObjectEntry::Field(key, self.parse_expr()?));
                }
            }
            if !self.consume(TokenKind::Comma) {
                self.expect(TokenKind::RBrace)?;
                return Ok(Expr::Object(entries));
            }
        }
    }
}

fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
    Expr::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_arithmetic_precedence() {
        let e = parse_expr("1+2*3").unwrap();
        match e {
            Expr::Binary {
                op: BinaryOp::Add, ..
            } => {}
            other => panic!("unexpected ast: {other:?}"),
        }
    }

    #[test]
    fn parses_member_and_index_chains() {
        let e = parse_expr("input.items[0]?.src").unwrap();
        match e {
            Expr::Member {
                name,
                optional: true,
                base,
            } => {
                assert_eq!(name, "src");
                assert!(matches!(*base, Expr::Index { .. }));
            }
            other => panic!("unexpected ast: {other:?}"),
        }
    }

    #[test]
    fn parses_calls_with_lambdas() {
        let e = parse_expr("map(xs, (x, i) => x * i)").unwrap();
        match e {
            Expr::Call { func, args } => {
                assert_eq!(func, "map");
                assert_eq!(args.len(), 2);
                assert!(matches!(&args[1], Expr::Lambda { params, .. } if params.len() == 2));
            }
            other => panic!("unexpected ast: {other:?}"),
        }
    }

    #[test]
    fn parenthesized_expression_is_not_a_lambda() {
        let e = parse_expr("(a) + 1").unwrap();
        assert!(matches!(e, Expr::Binary { op: BinaryOp::Add, .. }));
    }

    #[test]
    fn parses_object_literals() {
        let e = parse_expr("{ a: 1, 'b-c': x, type, ...rest, null: 2 }").unwrap();
        let Expr::Object(entries) = e else {
            panic!("expected object");
        };
        assert_eq!(entries.len(), 5);
        assert!(matches!(&entries[2], ObjectEntry::Field(k, Expr::Ident(v)) if k == "type" && v == "type"));
        assert!(matches!(&entries[3], ObjectEntry::Spread(_)));
    }

    #[test]
    fn parses_arrow_function_with_block() {
        let f = parse_function("(input, props) => { let n = 1; const m = n; return { n, m }; }")
            .unwrap();
        assert_eq!(f.params, ["input", "props"]);
        assert_eq!(f.body.lets.len(), 2);
        assert!(matches!(f.body.ret, Expr::Object(_)));
    }

    #[test]
    fn parses_arrow_function_returning_object() {
        let f = parse_function("input => ({ childrenData: [] })").unwrap();
        assert_eq!(f.params, ["input"]);
        assert!(f.body.lets.is_empty());

        let f = parse_function("() => { childrenData: [] }").unwrap();
        assert!(f.params.is_empty());
        assert!(matches!(f.body.ret, Expr::Object(_)));
    }

    #[test]
    fn parses_function_keyword_form() {
        let f = parse_function("function (a, b) { return a; }").unwrap();
        assert_eq!(f.params, ["a", "b"]);
    }

    #[test]
    fn rejects_non_function_source() {
        let err = parse_function("1 + 2").unwrap_err();
        assert!(err.message.contains("must be a function"));
    }

    #[test]
    fn rejects_duplicate_params() {
        assert!(parse_function("(a, a) => a").is_err());
    }
}
