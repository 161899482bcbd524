pub type PresetResult<T> = Result<T, PresetError>;

#[derive(thiserror::Error, Debug)]
pub enum PresetError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("compile error: {0}")]
    Compile(String),

    #[error("execution error: {0}")]
    Execution(String),

    #[error("malformed preset output: {0}")]
    MalformedOutput(String),

    #[error("fetch error: {0}")]
    Fetch(String),

    #[error("serialization error: {0}")]
    Serde(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PresetError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn compile(msg: impl Into<String>) -> Self {
        Self::Compile(msg.into())
    }

    pub fn execution(msg: impl Into<String>) -> Self {
        Self::Execution(msg.into())
    }

    pub fn malformed_output(msg: impl Into<String>) -> Self {
        Self::MalformedOutput(msg.into())
    }

    pub fn fetch(msg: impl Into<String>) -> Self {
        Self::Fetch(msg.into())
    }

    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }
}

impl From<serde_json::Error> for PresetError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serde(e.to_string())
    }
}
