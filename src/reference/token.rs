//! `data:[key]` / `data:[key][range]` token scanning.

use std::ops::Range;
use std::sync::LazyLock;

use regex::Regex;

static TOKEN_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    // data:[  key  ]  optional [range]
    Regex::new(r"data:\[([^\[\]]+)\](?:\[([^\[\]]+)\])?").expect("invalid data token pattern")
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataToken<'a> {
    /// Key with surrounding whitespace trimmed.
    pub key: &'a str,
    pub range: Option<&'a str>,
    /// Byte span of the whole token in the scanned string.
    pub span: Range<usize>,
}

/// Every token in `s`, left to right.
pub fn scan(s: &str) -> Vec<DataToken<'_>> {
    if !s.contains("data:[") {
        return Vec::new();
    }
    TOKEN_PATTERN
        .captures_iter(s)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let key = caps.get(1)?.as_str().trim();
            let range = caps.get(2).map(|m| m.as_str().trim());
            Some(DataToken {
                key,
                range,
                span: whole.range(),
            })
        })
        .collect()
}

/// The token when `s` consists of exactly one token and nothing else.
pub fn parse_exact(s: &str) -> Option<DataToken<'_>> {
    let mut tokens = scan(s);
    if tokens.len() != 1 {
        return None;
    }
    let token = tokens.pop()?;
    (token.span.start == 0 && token.span.end == s.len()).then_some(token)
}

pub fn contains_token(s: &str) -> bool {
    s.contains("data:[") && TOKEN_PATTERN.is_match(s)
}
