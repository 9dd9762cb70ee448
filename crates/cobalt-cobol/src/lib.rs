//! COBOL front end for cobalt.
//!
//! This crate takes COBOL source to an analyzed program:
//! - Lexer: column-aware tokenization of fixed and free format source
//! - Parser: builds a lossless program tree, accumulating errors and
//!   resynchronizing at paragraph boundaries
//! - Semantic analyzer: resolves the DATA DIVISION into a typed record
//!   tree with static offsets and byte sizes
//!
//! Downstream stages (flow analysis, IR translation, code generation)
//! live in `cobalt-transpile`.

// Macro definitions must come first so they're visible to all subsequent modules.
#[macro_use]
mod macros;

pub mod ast;
pub mod error;
pub mod lexer;
pub mod parser;
pub mod semantic;

pub use ast::*;
pub use error::{CobolError, Result};
pub use lexer::{
    scan, FileId, Indicator, Keyword, Location, SourceFile, SourceFormat, SourceLine, Span, Token,
    TokenKind,
};
pub use parser::{parse, parse_source, Parser};
pub use semantic::{
    analyze, sanitize_identifier, DataEntry, DataType, EntryId, FileInfo, NumericStorage,
    OccursInfo, Scope, SymbolTable,
};
