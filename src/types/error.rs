//! Error types, one enum per component boundary
//!
//! None of these terminate the frame loop. The engine turns each of them
//! into a diagnostic and degrades to "no-op for this rule/frame".

use thiserror::Error;

/// Expression failed to compile. The rule gets a null predicate.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompileError {
    #[error("unexpected character '{ch}' at {pos}")]
    UnexpectedChar { ch: char, pos: usize },

    #[error("invalid number '{text}' at {pos}")]
    InvalidNumber { text: String, pos: usize },

    #[error("expected {expected} at {pos}, found {found}")]
    UnexpectedToken { expected: String, found: String, pos: usize },

    #[error("unknown function '{0}'")]
    UnknownFunction(String),

    #[error("function '{name}' takes {expected} argument(s), got {found}")]
    Arity { name: String, expected: String, found: usize },

    #[error("expression is {len} bytes long, limit is {max}")]
    TooLong { len: usize, max: usize },

    #[error("expression nests deeper than {max} levels at {pos}")]
    TooDeep { max: usize, pos: usize },

    #[error("expression fails on sample scores: {0}")]
    Probe(#[from] EvalError),
}

/// Compiled predicate failed while evaluating one frame. Treated as false.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error("'{op}' expects {expected}, got {found}")]
    TypeMismatch { op: String, expected: &'static str, found: &'static str },

    #[error("division by zero")]
    DivisionByZero,
}

/// Actuator could not carry out an action token. Never reverts a transition.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DispatchError {
    #[error("malformed action token '{token}': {reason}")]
    InvalidToken { token: String, reason: String },

    #[error("actuator rejected '{token}': {reason}")]
    Rejected { token: String, reason: String },
}

/// Detector could not produce scores for a frame. The frame is skipped.
#[derive(Debug, Error)]
pub enum DetectorError {
    #[error("malformed detector frame: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("detector failed: {0}")]
    Failed(String),
}

/// Profile set could not be loaded, saved or edited
#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("profile storage error: {0}")]
    Io(#[from] std::io::Error),

    #[error("profile format error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("profile '{profile}' binding #{binding}: threshold {threshold} is above 100")]
    ThresholdOutOfRange { profile: String, binding: usize, threshold: u8 },

    #[error("no profile at index {0}")]
    NoSuchProfile(usize),

    #[error("no binding at index {0}")]
    NoSuchBinding(usize),
}
