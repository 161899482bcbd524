use crate::expression::error::ExprError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Span {
    pub(crate) start: usize,
    pub(crate) end: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Token {
    pub(crate) kind: TokenKind,
    pub(crate) span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum TokenKind {
    Ident(String),
    Number(f64),
    Str(String),
    True,
    False,
    Null,
    Let,
    Return,

    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Comma,
    Dot,
    QuestionDot,
    Ellipsis,
    Semi,
    Arrow,
    Assign,

    Plus,
    Minus,
    Star,
    Slash,
    Percent,

    Bang,

    EqEq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,

    AndAnd,
    OrOr,

    Question,
    Colon,

    Eof,
}

impl TokenKind {
    /// Keywords double as plain names in object-key position.
    pub(crate) fn keyword_text(&self) -> Option<&'static str> {
        match self {
            Self::True => Some("true"),
            Self::False => Some("false"),
            Self::Null => Some("null"),
            Self::Let => Some("let"),
            Self::Return => Some("return"),
            _ => None,
        }
    }
}

pub(crate) fn lex(input: &str) -> Result<Vec<Token>, ExprError> {
    let mut out = Vec::new();
    let bytes = input.as_bytes();
    let mut i = 0usize;

    while i < bytes.len() {
        let c = bytes[i] as char;
        if c.is_ascii_whitespace() {
            i += 1;
            continue;
        }

        // Line and block comments.
        if c == '/' && i + 1 < bytes.len() {
            if bytes[i + 1] == b'/' {
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
                continue;
            }
            if bytes[i + 1] == b'*' {
                let Some(end) = input[i + 2..].find("*/") else {
                    return Err(ExprError::new(i, "unterminated block comment"));
                };
                i += 2 + end + 2;
                continue;
            }
        }

        let start = i;

        // Number: [0-9]+(.[0-9]+)?([eE][+-]?[0-9]+)? or .[0-9]+([eE][+-]?[0-9]+)?
        if c.is_ascii_digit()
            || (c == '.' && i + 1 < bytes.len() && (bytes[i + 1] as char).is_ascii_digit())
        {
            if c == '.' {
                i += 1;
            } else {
                while i < bytes.len() && (bytes[i] as char).is_ascii_digit() {
                    i += 1;
                }
                if i < bytes.len()
                    && (bytes[i] as char) == '.'
                    && i + 1 < bytes.len()
                    && (bytes[i + 1] as char).is_ascii_digit()
                {
                    i += 1;
                }
            }

            while i < bytes.len() && (bytes[i] as char).is_ascii_digit() {
                i += 1;
            }

            if i < bytes.len() && matches!(bytes[i] as char, 'e' | 'E') {
                let e_pos = i;
                i += 1;
                if i < bytes.len() && matches!(bytes[i] as char, '+' | '-') {
                    i += 1;
                }
                let exp_start = i;
                while i < bytes.len() && (bytes[i] as char).is_ascii_digit() {
                    i += 1;
                }
                if exp_start == i {
                    return Err(ExprError::new(
                        e_pos,
                        "invalid number exponent (expected digits)",
                    ));
                }
            }

            let s = &input[start..i];
            let v: f64 = s
                .parse()
                .map_err(|_| ExprError::new(start, "invalid number"))?;
            out.push(Token {
                kind: TokenKind::Number(v),
                span: Span { start, end: i },
            });
            continue;
        }

        if c == '"' || c == '\'' {
            let (s, end) = lex_string(input, i)?;
            i = end;
            out.push(Token {
                kind: TokenKind::Str(s),
                span: Span { start, end: i },
            });
            continue;
        }

        if c.is_ascii_alphabetic() || c == '_' || c == '$' {
            i += 1;
            while i < bytes.len() {
                let ch = bytes[i] as char;
                if ch.is_ascii_alphanumeric() || ch == '_' || ch == '$' {
                    i += 1;
                } else {
                    break;
                }
            }
            let s = &input[start..i];
            let kind = match s {
                "true" => TokenKind::True,
                "false" => TokenKind::False,
                "null" | "undefined" => TokenKind::Null,
                "let" | "const" => TokenKind::Let,
                "return" => TokenKind::Return,
                _ => TokenKind::Ident(s.to_owned()),
            };
            out.push(Token {
                kind,
                span: Span { start, end: i },
            });
            continue;
        }

        // Three-char operators
        if i + 2 < bytes.len() {
            let kind = match &bytes[i..i + 3] {
                b"..." => Some(TokenKind::Ellipsis),
                b"===" => Some(TokenKind::EqEq),
                b"!==" => Some(TokenKind::Ne),
                _ => None,
            };
            if let Some(kind) = kind {
                i += 3;
                out.push(Token {
                    kind,
                    span: Span { start, end: i },
                });
                continue;
            }
        }

        // Two-char operators
        if i + 1 < bytes.len() {
            let two = &bytes[i..i + 2];
            let kind = match two {
                b"&&" => Some(TokenKind::AndAnd),
                b"||" => Some(TokenKind::OrOr),
                b"==" => Some(TokenKind::EqEq),
                b"!=" => Some(TokenKind::Ne),
                b"<=" => Some(TokenKind::Le),
                b">=" => Some(TokenKind::Ge),
                b"=>" => Some(TokenKind::Arrow),
                // `a?.5:b` is a ternary with a number, not optional chaining.
                b"?." if !(i + 2 < bytes.len() && bytes[i + 2].is_ascii_digit()) => {
                    Some(TokenKind::QuestionDot)
                }
                _ => None,
            };
            if let Some(kind) = kind {
                i += 2;
                out.push(Token {
                    kind,
                    span: Span { start, end: i },
                });
                continue;
            }
        }

        let kind = match c {
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '[' => TokenKind::LBracket,
            ']' => TokenKind::RBracket,
            '{' => TokenKind::LBrace,
            '}' => TokenKind::RBrace,
            ',' => TokenKind::Comma,
            '.' => TokenKind::Dot,
            ';' => TokenKind::Semi,
            '=' => TokenKind::Assign,
            '+' => TokenKind::Plus,
            '-' => TokenKind::Minus,
            '*' => TokenKind::Star,
            '/' => TokenKind::Slash,
            '%' => TokenKind::Percent,
            '!' => TokenKind::Bang,
            '<' => TokenKind::Lt,
            '>' => TokenKind::Gt,
            '?' => TokenKind::Question,
            ':' => TokenKind::Colon,
            _ => {
                let ch = input[i..].chars().next().unwrap_or(c);
                return Err(ExprError::new(start, format!("unexpected character '{ch}'")));
            }
        };
        i += 1;
        out.push(Token {
            kind,
            span: Span { start, end: i },
        });
    }

    out.push(Token {
        kind: TokenKind::Eof,
        span: Span {
            start: input.len(),
            end: input.len(),
        },
    });

    Ok(out)
}

/// Lexes a quoted string starting at `start`; returns the unescaped text and the byte offset just
/// past the closing quote.
fn lex_string(input: &str, start: usize) -> Result<(String, usize), ExprError> {
    let mut chars = input[start..].char_indices();
    let Some((_, quote)) = chars.next() else {
        return Err(ExprError::new(start, "expected string"));
    };

    let mut out = String::new();
    while let Some((off, ch)) = chars.next() {
        match ch {
            c if c == quote => return Ok((out, start + off + c.len_utf8())),
            '\n' => return Err(ExprError::new(start + off, "newline in string literal")),
            '\\' => {
                let Some((esc_off, esc)) = chars.next() else {
                    break;
                };
                match esc {
                    'n' => out.push('\n'),
                    't' => out.push('\t'),
                    'r' => out.push('\r'),
                    '0' => out.push('\0'),
                    '\\' | '\'' | '"' | '/' => out.push(esc),
                    'u' => {
                        let mut code = 0u32;
                        for _ in 0..4 {
                            let Some((_, h)) = chars.next() else {
                                return Err(ExprError::new(
                                    start + esc_off,
                                    "truncated \\u escape",
                                ));
                            };
                            let digit = h.to_digit(16).ok_or_else(|| {
                                ExprError::new(start + esc_off, "invalid hex digit in \\u escape")
                            })?;
                            code = code * 16 + digit;
                        }
                        let decoded = char::from_u32(code).ok_or_else(|| {
                            ExprError::new(start + esc_off, "invalid \\u code point")
                        })?;
                        out.push(decoded);
                    }
                    other => {
                        return Err(ExprError::new(
                            start + esc_off,
                            format!("unknown escape '\\{other}'"),
                        ));
                    }
                }
            }
            c => out.push(c),
        }
    }
    Err(ExprError::new(start, "unterminated string literal"))
}
