//! Diagnostics carried through the transpilation pipeline.
//!
//! Non-fatal findings from semantic analysis and flow resolution are
//! reported as [`Diagnostic`]s rather than errors so that one suspicious
//! construct never stops the rest of the program from being processed.

use std::fmt;

use crate::span::Span;

/// Diagnostic severity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Prevents the affected construct from being translated.
    Error,
    /// Translation continues but something looks suspicious.
    Warning,
    /// Worth surfacing in the report, not a problem.
    Info,
}

/// A finding with a source location, produced during analysis.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    /// Severity of the finding.
    pub severity: Severity,
    /// Stable code, e.g. `"SEM-E003"` or `"FLOW-W001"`.
    pub code: String,
    /// Human-readable description.
    pub message: String,
    /// Where in the source the finding applies.
    pub span: Span,
    /// Optional remediation hint.
    pub suggestion: Option<String>,
}

impl Diagnostic {
    /// Create an error diagnostic.
    pub fn error(code: impl Into<String>, message: impl Into<String>, span: Span) -> Self {
        Self::with_severity(Severity::Error, code, message, span)
    }

    /// Create a warning diagnostic.
    pub fn warning(code: impl Into<String>, message: impl Into<String>, span: Span) -> Self {
        Self::with_severity(Severity::Warning, code, message, span)
    }

    /// Create an informational diagnostic.
    pub fn info(code: impl Into<String>, message: impl Into<String>, span: Span) -> Self {
        Self::with_severity(Severity::Info, code, message, span)
    }

    fn with_severity(
        severity: Severity,
        code: impl Into<String>,
        message: impl Into<String>,
        span: Span,
    ) -> Self {
        Self {
            severity,
            code: code.into(),
            message: message.into(),
            span,
            suggestion: None,
        }
    }

    /// Attach a remediation hint.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Whether this diagnostic is an error.
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
            Severity::Info => write!(f, "info"),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]: {}", self.severity, self.code, self.message)?;
        if let Some(ref suggestion) = self.suggestion {
            write!(f, " ({})", suggestion)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_diagnostic() {
        let d = Diagnostic::error("SEM-E001", "duplicate record name", Span::main(0, 10));
        assert!(d.is_error());
        assert_eq!(d.code, "SEM-E001");
        assert!(d.suggestion.is_none());
    }

    #[test]
    fn warning_with_suggestion() {
        let d = Diagnostic::warning("FLOW-W001", "paragraph is unreachable", Span::main(5, 15))
            .with_suggestion("remove it or add a PERFORM");
        assert!(!d.is_error());
        assert_eq!(
            d.to_string(),
            "warning[FLOW-W001]: paragraph is unreachable (remove it or add a PERFORM)"
        );
    }

    #[test]
    fn display_without_suggestion() {
        let d = Diagnostic::info("GEN-I001", "external call left opaque", Span::main(0, 4));
        assert_eq!(d.to_string(), "info[GEN-I001]: external call left opaque");
    }
}
