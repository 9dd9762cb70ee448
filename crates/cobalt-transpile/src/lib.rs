//! COBOL-to-Python transpilation stages.
//!
//! Consumes the parse tree and symbol table from `cobalt-cobol` and runs
//! the back half of the pipeline:
//!
//! 1. [`flow`] builds the paragraph-level control-flow graph.
//! 2. [`structure`] finds transfer cycles that cannot be structured.
//! 3. [`edgecase`] catalogs constructs that weaken or block translation.
//! 4. [`translate`] lowers the program to a small target-neutral IR.
//! 5. [`codegen`] renders the IR as a runnable Python module.
//! 6. [`mapping`] grades each paragraph's source-to-target fidelity.
//!
//! [`transpile_source`] runs the whole pipeline for one source file.

pub mod codegen;
pub mod edgecase;
pub mod error;
pub mod flow;
pub mod ir;
pub mod mapping;
pub mod names;
pub mod structure;
pub mod translate;

pub use codegen::{generate, TargetTemplates};
pub use edgecase::{EdgeCase, EdgeCaseCategory, EdgeCaseSeverity};
pub use error::{Result, TranspileError};
pub use ir::{Ir, IrProgram};
pub use mapping::{paragraph_mappings, EquivalenceLevel, FunctionalityMapping};
pub use translate::translate;

use cobalt_cobol::ast::Program;
use cobalt_cobol::error::CobolError;
use cobalt_cobol::lexer::SourceFile;
use cobalt_cobol::parser::parse_source;
use cobalt_cobol::semantic;
use cobalt_lang_core::{Diagnostic, Span};

/// Everything the back half of the pipeline produces for one program.
#[derive(Debug)]
pub struct TranspileOutput {
    pub ir: IrProgram,
    /// The generated Python module.
    pub python: String,
    pub mappings: Vec<FunctionalityMapping>,
    pub edge_cases: Vec<EdgeCase>,
    /// Scan and parse errors survived by fail-soft parsing.
    pub parse_errors: Vec<CobolError>,
    /// Semantic and flow diagnostics.
    pub diagnostics: Vec<Diagnostic>,
}

impl TranspileOutput {
    /// The most severe edge case found, if any.
    pub fn worst_severity(&self) -> Option<EdgeCaseSeverity> {
        self.edge_cases.iter().map(|c| c.severity).max()
    }

    /// The mappings as pretty-printed JSON.
    pub fn mappings_json(&self) -> Result<String> {
        serde_json::to_string_pretty(&self.mappings)
            .map_err(|e| TranspileError::codegen(format!("mapping serialization: {}", e)))
    }
}

/// Run analysis, translation, and generation over an already-parsed
/// program.
pub fn transpile_program(program: &Program) -> TranspileOutput {
    let (symbols, mut diagnostics) = semantic::analyze(program);
    let (graph, flow_diagnostics) = flow::analyze(program, &symbols);
    diagnostics.extend(flow_diagnostics);
    let structure = structure::analyze(&graph);
    let edge_cases = edgecase::detect(&symbols, &graph, &structure);
    let ir = translate::translate(program, &symbols, &graph, &structure);
    let mappings = mapping::paragraph_mappings(&ir, &graph, &edge_cases);
    let python = codegen::generate(&ir, &codegen::python::TEMPLATES);
    TranspileOutput {
        ir,
        python,
        mappings,
        edge_cases,
        parse_errors: Vec::new(),
        diagnostics,
    }
}

/// Parse and transpile one source file.
///
/// Parsing is fail-soft; recovered errors ride along in the output. The
/// call fails only when no program unit could be recovered at all.
pub fn transpile_source(source: &SourceFile) -> Result<TranspileOutput> {
    let (program, parse_errors) = parse_source(source);
    let Some(program) = program else {
        return Err(TranspileError::translate(
            "no translatable program unit found",
            Span::point(source.id, 0),
        ));
    };
    let mut output = transpile_program(&program);
    output.parse_errors = parse_errors;
    Ok(output)
}
