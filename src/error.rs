use thiserror::Error;

/// A script record whose fields break the record invariants.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("script name may not be blank")]
    BlankName,
    #[error("trigger entries may not be blank")]
    BlankTrigger,
    #[error("script id may not be blank")]
    BlankId,
    #[error("script id `{0}` may only contain letters, digits, `-` and `_`")]
    InvalidId(String),
}

/// Raised before any script body runs when the caller's extra scope is unusable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidScopeError {
    #[error("illegal numeric script parameter `{0}` passed to execution scope")]
    NumericKey(String),
}

/// Failure raised from inside an authored command body.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScriptRuntimeError {
    #[error("script failed to compile: {0}")]
    Compile(String),
    #[error("script raised an error: {0}")]
    Runtime(String),
    #[error("script returned a value that could not be converted: {0}")]
    Conversion(String),
    #[error("script worker stopped unexpectedly: {0}")]
    Aborted(String),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid flag path `{0}`")]
    InvalidPath(String),
    #[error("flag file I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("flag data is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum HostError {
    #[error("host rejected the request: {0}")]
    Rejected(String),
    #[error("{kind} not found: {reference}")]
    NotFound { kind: &'static str, reference: String },
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    InvalidScope(#[from] InvalidScopeError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Host(#[from] HostError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
