use std::fmt;

use crate::foundation::error::PresetError;

/// Lex, parse or bind failure at a byte offset of the preset source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ExprError {
    pub(crate) offset: usize,
    pub(crate) message: String,
}

impl ExprError {
    pub(crate) fn new(offset: usize, message: impl Into<String>) -> Self {
        Self {
            offset,
            message: message.into(),
        }
    }
}

impl fmt::Display for ExprError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "expr error at byte {}: {}", self.offset, self.message)
    }
}

impl std::error::Error for ExprError {}

impl From<ExprError> for PresetError {
    fn from(e: ExprError) -> Self {
        PresetError::compile(e.to_string())
    }
}

/// Failure while running a compiled preset function.
#[derive(Debug, Clone)]
pub(crate) struct EvalError {
    pub(crate) message: String,
}

impl EvalError {
    pub(crate) fn new(msg: impl Into<String>) -> Self {
        Self {
            message: msg.into(),
        }
    }
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "eval error: {}", self.message)
    }
}

impl std::error::Error for EvalError {}

impl From<EvalError> for PresetError {
    fn from(e: EvalError) -> Self {
        PresetError::execution(e.message)
    }
}
