//! Lossless program tree for COBOL source.
//!
//! The parser produces one [`Program`] per compilation unit. Statements the
//! grammar does not recognize survive as [`UnknownStatement`] nodes and
//! comment lines are re-attached after parsing, so the tree loses nothing
//! a later stage might need to surface.

mod data;
mod expressions;
mod statements;

pub use data::*;
pub use expressions::*;
pub use statements::*;

use cobalt_lang_core::{AstNode, Span};

/// A complete COBOL program.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub identification: IdentificationDivision,
    pub environment: Option<EnvironmentDivision>,
    pub data: Option<DataDivision>,
    pub procedure: Option<ProcedureDivision>,
    /// Comment lines in source order, attached after parsing.
    pub comments: Vec<Comment>,
    pub span: Span,
}

impl Program {
    /// The program name from PROGRAM-ID.
    pub fn name(&self) -> &str {
        &self.identification.program_id.name
    }
}

impl AstNode for Program {
    fn span(&self) -> Span {
        self.span
    }
}

/// A retained comment line.
#[derive(Debug, Clone, PartialEq)]
pub struct Comment {
    pub text: String,
    pub span: Span,
}

/// IDENTIFICATION DIVISION.
#[derive(Debug, Clone, PartialEq)]
pub struct IdentificationDivision {
    pub program_id: ProgramId,
    pub author: Option<String>,
    pub date_written: Option<String>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProgramId {
    pub name: String,
    pub span: Span,
}

/// ENVIRONMENT DIVISION. Only FILE-CONTROL carries information the
/// transpiler uses; the configuration section is skipped over.
#[derive(Debug, Clone, PartialEq)]
pub struct EnvironmentDivision {
    pub file_control: Vec<FileControlEntry>,
    pub span: Span,
}

/// A SELECT ... ASSIGN entry.
#[derive(Debug, Clone, PartialEq)]
pub struct FileControlEntry {
    pub file_name: String,
    pub assign_to: String,
    pub organization: FileOrganization,
    pub access_mode: AccessMode,
    pub record_key: Option<QualifiedName>,
    pub file_status: Option<QualifiedName>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FileOrganization {
    #[default]
    Sequential,
    Indexed,
    Relative,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AccessMode {
    #[default]
    Sequential,
    Random,
    Dynamic,
}

/// DATA DIVISION.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DataDivision {
    pub file_section: Vec<FileDescription>,
    pub working_storage: Vec<DataItem>,
    pub linkage: Vec<DataItem>,
    pub span: Span,
}

/// An FD entry and its record descriptions.
#[derive(Debug, Clone, PartialEq)]
pub struct FileDescription {
    pub name: String,
    pub records: Vec<DataItem>,
    pub span: Span,
}

/// PROCEDURE DIVISION.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcedureDivision {
    pub using: Vec<String>,
    pub body: ProcedureBody,
    pub span: Span,
}

/// The three shapes a procedure division can take.
#[derive(Debug, Clone, PartialEq)]
pub enum ProcedureBody {
    Sections(Vec<Section>),
    Paragraphs(Vec<Paragraph>),
    /// Bare statements with no paragraph headers.
    Statements(Vec<Statement>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Section {
    pub name: String,
    pub paragraphs: Vec<Paragraph>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Paragraph {
    pub name: String,
    pub statements: Vec<Statement>,
    pub span: Span,
}

impl ProcedureDivision {
    /// All paragraphs in source order, flattening sections. A bare
    /// statement body becomes one synthetic unnamed paragraph.
    pub fn paragraphs(&self) -> Vec<&Paragraph> {
        match &self.body {
            ProcedureBody::Sections(sections) => {
                sections.iter().flat_map(|s| s.paragraphs.iter()).collect()
            }
            ProcedureBody::Paragraphs(paragraphs) => paragraphs.iter().collect(),
            ProcedureBody::Statements(_) => Vec::new(),
        }
    }
}
