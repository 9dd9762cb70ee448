//! Shared language infrastructure for the Cobalt transpiler.
//!
//! Every stage of the pipeline, from the COBOL front end through code
//! generation and reporting, uses these types to talk about source code:
//!
//! - **Source location tracking**: [`Span`], [`FileId`], [`Location`]
//! - **Diagnostics**: [`Diagnostic`], [`Severity`]
//! - **Source text**: [`SourceText`] with line-ending normalization and a
//!   precomputed line index for offset-to-line/column resolution
//!
//! This crate has no external dependencies. It contains only plain Rust
//! types; the front-end and pipeline crates layer `miette`/`thiserror` on
//! top for rich error rendering.

mod diagnostic;
mod source;
mod span;

pub use diagnostic::{Diagnostic, Severity};
pub use source::{normalize_line_endings, LineIndex, SourceText};
pub use span::{FileId, Location, Span};

/// Trait for AST nodes that carry source location information.
///
/// Every node the parser produces implements this so later pipeline stages
/// can report locations without knowing node-specific details.
pub trait AstNode {
    /// Returns the source span covering this node.
    fn span(&self) -> Span;
}
