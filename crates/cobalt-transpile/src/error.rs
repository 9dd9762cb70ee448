//! Error types for the transpilation stages.

use cobalt_lang_core::Span;

/// Result type for transpilation operations.
pub type Result<T> = std::result::Result<T, TranspileError>;

/// Errors raised while turning a parsed program into target code.
/// Per-construct problems travel as diagnostics instead; these fire only
/// when a stage has nothing it can hand to the next one.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, miette::Diagnostic)]
pub enum TranspileError {
    /// No translatable program unit was found.
    #[error("translation error: {message}")]
    #[diagnostic(code(cobalt::transpile::translate))]
    Translate { message: String, span: Span },

    /// An output artifact could not be rendered.
    #[error("code generation error: {message}")]
    #[diagnostic(code(cobalt::transpile::codegen))]
    Codegen { message: String },
}

impl TranspileError {
    pub fn translate(message: impl Into<String>, span: Span) -> Self {
        TranspileError::Translate {
            message: message.into(),
            span,
        }
    }

    pub fn codegen(message: impl Into<String>) -> Self {
        TranspileError::Codegen {
            message: message.into(),
        }
    }
}
