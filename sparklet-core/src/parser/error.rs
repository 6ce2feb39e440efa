use crate::parser::lexer::Span;
use std::fmt;

/// A script error tied to a position in the source
#[derive(Debug, Clone, PartialEq)]
pub struct SparkletError {
    pub message: String,
    pub span: Span,
}

impl SparkletError {
    pub fn new(message: impl Into<String>, span: Span) -> Self {
        Self {
            message: message.into(),
            span,
        }
    }
}

impl fmt::Display for SparkletError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Error at {}: {}", self.span, self.message)
    }
}

impl std::error::Error for SparkletError {}
