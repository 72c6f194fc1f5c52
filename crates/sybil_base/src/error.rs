//! Errors with source-location tracking.
//!
//! The surface-language layer reports every failure against a [`Span`] so
//! the driver can print `file:line:col` diagnostics.

use crate::span::Span;
use std::fmt;

/// An error annotated with its source location.
#[derive(Debug, Clone)]
pub struct SpannedError {
    /// Human-readable description.
    pub message: String,
    /// Where in the source the error occurred.
    pub span: Span,
}

impl SpannedError {
    pub fn new(message: impl Into<String>, span: Span) -> Self {
        Self {
            message: message.into(),
            span,
        }
    }

    /// Renders the error with resolved line/column information.
    pub fn display_with_source(&self, source: &str) -> String {
        let (line, col) = self.span.line_col(source);
        format!("{} at {}:{}", self.message, line, col)
    }
}

impl fmt::Display for SpannedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} at {}..{}",
            self.message, self.span.start, self.span.end
        )
    }
}

impl std::error::Error for SpannedError {}

/// Alias for `std::result::Result<T, SpannedError>`.
pub type Result<T> = std::result::Result<T, SpannedError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_message_and_span() {
        let err = SpannedError::new("unexpected token", Span::new(5, 10));
        let s = err.to_string();
        assert!(s.contains("unexpected token"));
        assert!(s.contains("5..10"));
    }

    #[test]
    fn display_with_source_resolves_lines() {
        let err = SpannedError::new("bad", Span::new(4, 5));
        assert_eq!(err.display_with_source("ab\ncd"), "bad at 2:2");
    }
}
