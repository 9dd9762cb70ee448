//! PROCEDURE DIVISION statement nodes.
//!
//! The `Statement` enum is generated from the master variant table in
//! `macros.rs`; each struct here carries exactly what its statement needs
//! plus a `span` for reporting.

use cobalt_lang_core::{AstNode, Span};

use super::expressions::{Condition, Expression, QualifiedName};

// `Statement` enum and its `span()` -- generated from
// `for_all_statement_variants!` in `macros.rs`.
macro_rules! gen_statement_enum {
    ( $($variant:ident($ty:ident)),* $(,)? ) => {
        /// A procedure statement.
        #[derive(Debug, Clone, PartialEq)]
        pub enum Statement {
            $($variant($ty),)*
        }

        impl Statement {
            /// The source span of this statement.
            pub fn span(&self) -> Span {
                match self {
                    $(Statement::$variant(s) => s.span,)*
                }
            }
        }
    };
}
for_all_statement_variants!(gen_statement_enum);

impl AstNode for Statement {
    fn span(&self) -> Span {
        Statement::span(self)
    }
}

/// MOVE value TO target...
#[derive(Debug, Clone, PartialEq)]
pub struct MoveStatement {
    pub value: Expression,
    pub targets: Vec<QualifiedName>,
    pub span: Span,
}

/// A receiving operand of an arithmetic statement.
#[derive(Debug, Clone, PartialEq)]
pub struct ComputeTarget {
    pub name: QualifiedName,
    pub rounded: bool,
}

/// COMPUTE target... = expression [ON SIZE ERROR ...]
#[derive(Debug, Clone, PartialEq)]
pub struct ComputeStatement {
    pub targets: Vec<ComputeTarget>,
    pub expression: Expression,
    pub on_size_error: Option<Vec<Statement>>,
    pub not_on_size_error: Option<Vec<Statement>>,
    pub span: Span,
}

/// ADD operand... TO target... [GIVING target...]
#[derive(Debug, Clone, PartialEq)]
pub struct AddStatement {
    pub operands: Vec<Expression>,
    pub to: Vec<ComputeTarget>,
    pub giving: Vec<ComputeTarget>,
    pub on_size_error: Option<Vec<Statement>>,
    pub not_on_size_error: Option<Vec<Statement>>,
    pub span: Span,
}

/// SUBTRACT operand... FROM target... [GIVING target...]
#[derive(Debug, Clone, PartialEq)]
pub struct SubtractStatement {
    pub operands: Vec<Expression>,
    pub from: Vec<ComputeTarget>,
    pub giving: Vec<ComputeTarget>,
    pub on_size_error: Option<Vec<Statement>>,
    pub not_on_size_error: Option<Vec<Statement>>,
    pub span: Span,
}

/// MULTIPLY operand BY target... [GIVING target...]
///
/// Without GIVING, the BY operands are also the receiving targets.
#[derive(Debug, Clone, PartialEq)]
pub struct MultiplyStatement {
    pub operand: Expression,
    pub by: Vec<ComputeTarget>,
    pub giving: Vec<ComputeTarget>,
    pub on_size_error: Option<Vec<Statement>>,
    pub not_on_size_error: Option<Vec<Statement>>,
    pub span: Span,
}

/// DIVIDE operand INTO target... or DIVIDE a BY b GIVING c [REMAINDER r].
#[derive(Debug, Clone, PartialEq)]
pub struct DivideStatement {
    pub operand: Expression,
    pub into: Vec<ComputeTarget>,
    pub by: Option<Expression>,
    pub giving: Vec<ComputeTarget>,
    pub remainder: Option<QualifiedName>,
    pub on_size_error: Option<Vec<Statement>>,
    pub not_on_size_error: Option<Vec<Statement>>,
    pub span: Span,
}

/// IF condition ... [ELSE ...] END-IF
#[derive(Debug, Clone, PartialEq)]
pub struct IfStatement {
    pub condition: Condition,
    pub then_branch: Vec<Statement>,
    pub else_branch: Option<Vec<Statement>>,
    pub span: Span,
}

/// EVALUATE subject WHEN ... [WHEN OTHER ...] END-EVALUATE
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluateStatement {
    pub subject: EvaluateSubject,
    pub branches: Vec<WhenBranch>,
    pub other: Option<Vec<Statement>>,
    pub span: Span,
}

/// What an EVALUATE selects on.
#[derive(Debug, Clone, PartialEq)]
pub enum EvaluateSubject {
    Expression(Expression),
    True,
    False,
}

/// One WHEN arm.
#[derive(Debug, Clone, PartialEq)]
pub struct WhenBranch {
    /// Multiple selection objects on one WHEN behave as alternatives.
    pub objects: Vec<WhenObject>,
    pub statements: Vec<Statement>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum WhenObject {
    Value(Expression),
    Condition(Condition),
    Any,
}

/// PERFORM in all its shapes.
#[derive(Debug, Clone, PartialEq)]
pub struct PerformStatement {
    /// Paragraph or section name for out-of-line PERFORM.
    pub target: Option<String>,
    /// PERFORM target THRU thru.
    pub thru: Option<String>,
    /// Inline body (PERFORM ... END-PERFORM).
    pub inline: Option<Vec<Statement>>,
    /// PERFORM n TIMES.
    pub times: Option<Expression>,
    /// PERFORM UNTIL condition.
    pub until: Option<Condition>,
    /// PERFORM VARYING clause.
    pub varying: Option<VaryingClause>,
    /// WITH TEST AFTER makes the loop post-test.
    pub test_after: bool,
    pub span: Span,
}

/// VARYING var FROM start BY step UNTIL cond.
#[derive(Debug, Clone, PartialEq)]
pub struct VaryingClause {
    pub variable: QualifiedName,
    pub from: Expression,
    pub by: Expression,
    pub until: Condition,
}

/// GO TO target [DEPENDING ON item].
#[derive(Debug, Clone, PartialEq)]
pub struct GoToStatement {
    pub targets: Vec<String>,
    pub depending_on: Option<QualifiedName>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GoBackStatement {
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StopRunStatement {
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExitStatement {
    /// EXIT PROGRAM rather than a plain paragraph EXIT.
    pub program: bool,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContinueStatement {
    pub span: Span,
}

/// DISPLAY operand... [WITH NO ADVANCING]
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayStatement {
    pub operands: Vec<Expression>,
    pub no_advancing: bool,
    pub span: Span,
}

/// ACCEPT target
#[derive(Debug, Clone, PartialEq)]
pub struct AcceptStatement {
    pub target: QualifiedName,
    pub span: Span,
}

/// OPEN mode file...
#[derive(Debug, Clone, PartialEq)]
pub struct OpenStatement {
    pub files: Vec<(OpenMode, String)>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    Input,
    Output,
    Extend,
    InputOutput,
}

/// CLOSE file...
#[derive(Debug, Clone, PartialEq)]
pub struct CloseStatement {
    pub files: Vec<String>,
    pub span: Span,
}

/// READ file [INTO item] [AT END ...] [INVALID KEY ...]
#[derive(Debug, Clone, PartialEq)]
pub struct ReadStatement {
    pub file: String,
    pub into: Option<QualifiedName>,
    pub at_end: Option<Vec<Statement>>,
    pub not_at_end: Option<Vec<Statement>>,
    pub invalid_key: Option<Vec<Statement>>,
    pub not_invalid_key: Option<Vec<Statement>>,
    pub span: Span,
}

/// WRITE record [FROM item]
#[derive(Debug, Clone, PartialEq)]
pub struct WriteStatement {
    pub record: QualifiedName,
    pub from: Option<Expression>,
    pub span: Span,
}

/// CALL target [USING item...] [RETURNING item]
#[derive(Debug, Clone, PartialEq)]
pub struct CallStatement {
    /// Literal program name or a data item holding one.
    pub target: Expression,
    pub using: Vec<QualifiedName>,
    pub returning: Option<QualifiedName>,
    pub span: Span,
}

/// ALTER source TO [PROCEED TO] target.
#[derive(Debug, Clone, PartialEq)]
pub struct AlterStatement {
    pub source: String,
    pub target: String,
    pub span: Span,
}

/// SORT file ON key... USING f... GIVING g...
#[derive(Debug, Clone, PartialEq)]
pub struct SortStatement {
    pub file: String,
    pub keys: Vec<SortKey>,
    pub using: Vec<String>,
    pub giving: Vec<String>,
    pub span: Span,
}

/// MERGE file ON key... USING f... GIVING g...
#[derive(Debug, Clone, PartialEq)]
pub struct MergeStatement {
    pub file: String,
    pub keys: Vec<SortKey>,
    pub using: Vec<String>,
    pub giving: Vec<String>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SortKey {
    pub name: QualifiedName,
    pub descending: bool,
}

/// A statement the deterministic grammar does not cover.
///
/// The verb and raw text are preserved so downstream analysis can surface
/// the construct instead of silently dropping it.
#[derive(Debug, Clone, PartialEq)]
pub struct UnknownStatement {
    pub verb: String,
    pub text: String,
    pub span: Span,
}
