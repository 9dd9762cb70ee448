//! Error types for the COBOL front end.
//!
//! Lexing and parsing never abort on the first problem. Errors are
//! accumulated so one pass over a program reports everything it can, and
//! each error carries the span it applies to so reports can resolve it to
//! a file, line, and column.

use cobalt_lang_core::Span;

/// Result type for front-end operations.
pub type Result<T> = std::result::Result<T, CobolError>;

// ----------------------------------------------------------------------------
// Error type
// ----------------------------------------------------------------------------

/// An error produced while lexing, parsing, or loading COBOL source.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, miette::Diagnostic)]
pub enum CobolError {
    /// Source file could not be read.
    #[error("failed to read source: {message}")]
    Io { message: String },

    /// The scanner hit something it could not tokenize.
    #[error("lexical error: {message}")]
    Lex { message: String, span: Span },

    /// The parser found a construct it could not accept.
    #[error("syntax error: {message}")]
    Parse { message: String, span: Span },
}

impl CobolError {
    /// The source span this error applies to, if it has one.
    pub fn span(&self) -> Option<Span> {
        match self {
            CobolError::Io { .. } => None,
            CobolError::Lex { span, .. } | CobolError::Parse { span, .. } => Some(*span),
        }
    }

    /// Shorthand for a parse error at a span.
    pub fn parse(message: impl Into<String>, span: Span) -> Self {
        CobolError::Parse {
            message: message.into(),
            span,
        }
    }

    /// Shorthand for a lexical error at a span.
    pub fn lex(message: impl Into<String>, span: Span) -> Self {
        CobolError::Lex {
            message: message.into(),
            span,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_error_carries_span() {
        let err = CobolError::parse("expected PERIOD", Span::main(10, 11));
        assert_eq!(err.span(), Some(Span::main(10, 11)));
        assert_eq!(err.to_string(), "syntax error: expected PERIOD");
    }

    #[test]
    fn io_error_has_no_span() {
        let err = CobolError::Io {
            message: "missing.cbl: not found".into(),
        };
        assert_eq!(err.span(), None);
    }
}
