use std::fmt;

/// Failure classes of the allocation and scheduling engine.
///
/// `Validation` means the input is malformed or inconsistent; the condition
/// is deterministic, so callers should surface it and never retry.
/// `ArithmeticConsistency` means a sum invariant broke after rounding. That
/// is a defect in the engine, not an input problem, and is fatal for the
/// request that hit it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    Validation(String),
    ArithmeticConsistency(String),
}

impl EngineError {
    pub fn validation(detail: impl Into<String>) -> Self {
        Self::Validation(detail.into())
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validation(detail) => write!(f, "validation error: {detail}"),
            Self::ArithmeticConsistency(detail) => {
                write!(f, "arithmetic consistency error: {detail}")
            }
        }
    }
}

impl std::error::Error for EngineError {}
