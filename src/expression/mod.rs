//! The preset function language: a small, capture-free subset of arrow-function syntax.
//!
//! Source is lexed, parsed into an [`ast::FunctionDef`], then bound so every identifier resolves
//! to a parameter, a `let` local or a callback parameter. Anything else is a compile error, which
//! is what keeps a preset from reaching host state. Evaluation works directly on
//! [`serde_json::Value`].

pub(crate) mod ast;
pub(crate) mod bind;
pub(crate) mod error;
pub(crate) mod eval;
pub(crate) mod lexer;
pub(crate) mod parser;
pub(crate) mod value;
