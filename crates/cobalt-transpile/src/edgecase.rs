//! Edge-case detection.
//!
//! A catalog of pattern predicates over the program tree, symbol table,
//! and flow results. Each hit names what was found and how bad it is:
//! Informational findings are reported and translated anyway, a
//! NeedsAugmentation finding continues with best-effort deterministic IR,
//! and a Blocking finding halts translation for the enclosing paragraph.

use std::fmt;

use cobalt_cobol::ast::*;
use cobalt_cobol::semantic::{EntryId, SymbolTable};
use cobalt_lang_core::Span;

use crate::flow::{walk_statements, FlowGraph};
use crate::structure::Structure;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub enum EdgeCaseSeverity {
    Informational,
    NeedsAugmentation,
    Blocking,
}

impl fmt::Display for EdgeCaseSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EdgeCaseSeverity::Informational => write!(f, "informational"),
            EdgeCaseSeverity::NeedsAugmentation => write!(f, "needs-augmentation"),
            EdgeCaseSeverity::Blocking => write!(f, "blocking"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum EdgeCaseCategory {
    /// ALTER rewrites control flow at run time.
    Alter,
    /// SORT / MERGE file operations.
    SortMerge,
    /// A transfer cycle entered from more than one place.
    IrreducibleFlow,
    /// Computed GO TO.
    GotoDependingOn,
    /// COMPUTE over operands that are not all numeric.
    MixedModeCompute,
    /// REDEFINES overlapping a variable-length table.
    RedefinesVariableOccurs,
    /// CALL to a program outside this compilation unit.
    ExternalCall,
    /// PERFORM THRU paragraph ranges.
    PerformThru,
    /// A statement outside the deterministic grammar.
    UnsupportedStatement,
}

impl EdgeCaseCategory {
    pub fn severity(self) -> EdgeCaseSeverity {
        match self {
            EdgeCaseCategory::Alter | EdgeCaseCategory::IrreducibleFlow => {
                EdgeCaseSeverity::Blocking
            }
            EdgeCaseCategory::SortMerge
            | EdgeCaseCategory::GotoDependingOn
            | EdgeCaseCategory::MixedModeCompute
            | EdgeCaseCategory::RedefinesVariableOccurs
            | EdgeCaseCategory::PerformThru
            | EdgeCaseCategory::UnsupportedStatement => EdgeCaseSeverity::NeedsAugmentation,
            EdgeCaseCategory::ExternalCall => EdgeCaseSeverity::Informational,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            EdgeCaseCategory::Alter => "ALTER",
            EdgeCaseCategory::SortMerge => "SORT/MERGE",
            EdgeCaseCategory::IrreducibleFlow => "irreducible flow",
            EdgeCaseCategory::GotoDependingOn => "GO TO DEPENDING ON",
            EdgeCaseCategory::MixedModeCompute => "mixed-mode COMPUTE",
            EdgeCaseCategory::RedefinesVariableOccurs => "REDEFINES over variable OCCURS",
            EdgeCaseCategory::ExternalCall => "external CALL",
            EdgeCaseCategory::PerformThru => "PERFORM THRU",
            EdgeCaseCategory::UnsupportedStatement => "unsupported statement",
        }
    }
}

/// One detected edge case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeCase {
    pub category: EdgeCaseCategory,
    pub severity: EdgeCaseSeverity,
    pub span: Span,
    pub detail: String,
}

impl EdgeCase {
    fn new(category: EdgeCaseCategory, span: Span, detail: impl Into<String>) -> Self {
        EdgeCase {
            category,
            severity: category.severity(),
            span,
            detail: detail.into(),
        }
    }
}

/// Run the full catalog.
pub fn detect(
    symbols: &SymbolTable,
    graph: &FlowGraph<'_>,
    structure: &Structure,
) -> Vec<EdgeCase> {
    let mut cases = Vec::new();

    for node in graph.nodes() {
        walk_statements(node.statements, &mut |statement| {
            detect_statement(statement, symbols, &mut cases);
        });
    }

    for region in &structure.irreducible {
        cases.push(EdgeCase::new(
            EdgeCaseCategory::IrreducibleFlow,
            region.span,
            format!(
                "paragraphs {} form a transfer cycle with multiple entries",
                region.paragraphs.join(", ")
            ),
        ));
    }

    detect_redefines_over_variable_occurs(symbols, &mut cases);

    tracing::debug!(count = cases.len(), "edge-case scan finished");
    cases
}

fn detect_statement(statement: &Statement, symbols: &SymbolTable, cases: &mut Vec<EdgeCase>) {
    match statement {
        Statement::Alter(s) => cases.push(EdgeCase::new(
            EdgeCaseCategory::Alter,
            s.span,
            format!("ALTER {} TO {}", s.source, s.target),
        )),
        Statement::Sort(s) => cases.push(EdgeCase::new(
            EdgeCaseCategory::SortMerge,
            s.span,
            format!("SORT {}", s.file),
        )),
        Statement::Merge(s) => cases.push(EdgeCase::new(
            EdgeCaseCategory::SortMerge,
            s.span,
            format!("MERGE {}", s.file),
        )),
        Statement::GoTo(s) => {
            if let Some(depending) = &s.depending_on {
                cases.push(EdgeCase::new(
                    EdgeCaseCategory::GotoDependingOn,
                    s.span,
                    format!(
                        "GO TO over {} targets depending on {}",
                        s.targets.len(),
                        depending.name
                    ),
                ));
            }
        }
        Statement::Perform(s) => {
            if let (Some(target), Some(thru)) = (&s.target, &s.thru) {
                cases.push(EdgeCase::new(
                    EdgeCaseCategory::PerformThru,
                    s.span,
                    format!("PERFORM {} THRU {}", target, thru),
                ));
            }
        }
        Statement::Compute(s) => {
            let mut offenders = Vec::new();
            non_numeric_operands(&s.expression, symbols, &mut offenders);
            if !offenders.is_empty() {
                cases.push(EdgeCase::new(
                    EdgeCaseCategory::MixedModeCompute,
                    s.span,
                    format!("non-numeric operands: {}", offenders.join(", ")),
                ));
            }
        }
        Statement::Call(s) => {
            let detail = match &s.target {
                Expression::Literal(Literal {
                    kind: LiteralKind::String(name),
                    ..
                }) => format!("CALL \"{}\" resolves outside this program", name),
                _ => "CALL through a data item resolves outside this program".to_string(),
            };
            cases.push(EdgeCase::new(EdgeCaseCategory::ExternalCall, s.span, detail));
        }
        Statement::Unknown(s) => cases.push(EdgeCase::new(
            EdgeCaseCategory::UnsupportedStatement,
            s.span,
            format!("{} statement: {}", s.verb, s.text),
        )),
        _ => {}
    }
}

fn non_numeric_operands(
    expression: &Expression,
    symbols: &SymbolTable,
    offenders: &mut Vec<String>,
) {
    match expression {
        Expression::Variable(name) => {
            if let Some(entry) = symbols.resolve(&name.name) {
                if !entry.data_type.is_numeric() {
                    offenders.push(entry.name.clone());
                }
            }
        }
        Expression::Binary { left, right, .. } => {
            non_numeric_operands(left, symbols, offenders);
            non_numeric_operands(right, symbols, offenders);
        }
        Expression::Unary { operand, .. } => non_numeric_operands(operand, symbols, offenders),
        Expression::Paren(inner) => non_numeric_operands(inner, symbols, offenders),
        Expression::Literal(_) => {}
    }
}

fn detect_redefines_over_variable_occurs(symbols: &SymbolTable, cases: &mut Vec<EdgeCase>) {
    for entry in symbols.iter() {
        let Some(target) = entry.redefines else { continue };
        if subtree_has_variable_occurs(symbols, target)
            || subtree_has_variable_occurs(symbols, entry.id)
        {
            cases.push(EdgeCase::new(
                EdgeCaseCategory::RedefinesVariableOccurs,
                entry.span,
                format!(
                    "{} redefines storage under a variable-length OCCURS",
                    entry.name
                ),
            ));
        }
    }
}

fn subtree_has_variable_occurs(symbols: &SymbolTable, id: EntryId) -> bool {
    let entry = symbols.entry(id);
    if entry.occurs.as_ref().is_some_and(|o| o.is_variable()) {
        return true;
    }
    entry
        .children
        .iter()
        .any(|&child| subtree_has_variable_occurs(symbols, child))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{flow, structure};
    use cobalt_cobol::lexer::{FileId, SourceFile, SourceFormat};
    use cobalt_cobol::parser::parse_source;
    use cobalt_cobol::semantic;

    fn cases_of(text: &str) -> Vec<EdgeCase> {
        let source = SourceFile::from_text(FileId::MAIN, text.to_string(), SourceFormat::Free);
        let (program, errors) = parse_source(&source);
        assert!(errors.is_empty(), "parse errors: {:?}", errors);
        let program = program.unwrap();
        let (symbols, _) = semantic::analyze(&program);
        let (graph, _) = flow::analyze(&program, &symbols);
        let structure = structure::analyze(&graph);
        detect(&symbols, &graph, &structure)
    }

    fn procedure_cases(body: &str) -> Vec<EdgeCase> {
        cases_of(&format!(
            "IDENTIFICATION DIVISION.\nPROGRAM-ID. EC.\nPROCEDURE DIVISION.\n\
             MAIN-PARA.\n{}\n    STOP RUN.\nOTHER-PARA.\n    EXIT.\n",
            body
        ))
    }

    #[test]
    fn alter_is_blocking() {
        let cases = procedure_cases("    ALTER MAIN-PARA TO PROCEED TO OTHER-PARA.");
        let alter = cases
            .iter()
            .find(|c| c.category == EdgeCaseCategory::Alter)
            .unwrap();
        assert_eq!(alter.severity, EdgeCaseSeverity::Blocking);
    }

    #[test]
    fn goto_depending_needs_augmentation() {
        let cases = procedure_cases("    GO TO MAIN-PARA OTHER-PARA DEPENDING ON WS-IDX.");
        let hit = cases
            .iter()
            .find(|c| c.category == EdgeCaseCategory::GotoDependingOn)
            .unwrap();
        assert_eq!(hit.severity, EdgeCaseSeverity::NeedsAugmentation);
    }

    #[test]
    fn perform_thru_is_flagged() {
        let cases = procedure_cases("    PERFORM MAIN-PARA THRU OTHER-PARA.");
        assert!(cases
            .iter()
            .any(|c| c.category == EdgeCaseCategory::PerformThru));
    }

    #[test]
    fn external_call_is_informational() {
        let cases = procedure_cases("    CALL \"OTHERPGM\" USING WS-A.");
        let call = cases
            .iter()
            .find(|c| c.category == EdgeCaseCategory::ExternalCall)
            .unwrap();
        assert_eq!(call.severity, EdgeCaseSeverity::Informational);
        assert!(call.detail.contains("OTHERPGM"));
    }

    #[test]
    fn unknown_statement_is_flagged_with_its_verb() {
        let cases = procedure_cases("    INSPECT WS-X TALLYING WS-N FOR CHARACTERS.");
        let hit = cases
            .iter()
            .find(|c| c.category == EdgeCaseCategory::UnsupportedStatement)
            .unwrap();
        assert!(hit.detail.starts_with("INSPECT"));
    }

    #[test]
    fn mixed_mode_compute_names_the_offender() {
        let cases = cases_of(
            "IDENTIFICATION DIVISION.\n\
             PROGRAM-ID. EC2.\n\
             DATA DIVISION.\n\
             WORKING-STORAGE SECTION.\n\
             01 WS-NUM PIC 9(5).\n\
             01 WS-TEXT PIC X(5).\n\
             PROCEDURE DIVISION.\n\
                 COMPUTE WS-NUM = WS-NUM + WS-TEXT.\n\
                 STOP RUN.\n",
        );
        let hit = cases
            .iter()
            .find(|c| c.category == EdgeCaseCategory::MixedModeCompute)
            .unwrap();
        assert!(hit.detail.contains("WS-TEXT"));
    }

    #[test]
    fn redefines_over_odo_is_flagged() {
        let cases = cases_of(
            "IDENTIFICATION DIVISION.\n\
             PROGRAM-ID. EC3.\n\
             DATA DIVISION.\n\
             WORKING-STORAGE SECTION.\n\
             01 WS-COUNT PIC 9(3).\n\
             01 WS-REC.\n\
                05 WS-TAB.\n\
                   10 WS-ITEM PIC X(4) OCCURS 1 TO 20 TIMES DEPENDING ON WS-COUNT.\n\
                05 WS-VIEW REDEFINES WS-TAB PIC X(80).\n\
             PROCEDURE DIVISION.\n\
                 STOP RUN.\n",
        );
        assert!(cases
            .iter()
            .any(|c| c.category == EdgeCaseCategory::RedefinesVariableOccurs));
    }

    #[test]
    fn sort_needs_augmentation() {
        let cases = cases_of(
            "IDENTIFICATION DIVISION.\n\
             PROGRAM-ID. EC4.\n\
             PROCEDURE DIVISION.\n\
                 SORT WORK-FILE ON ASCENDING KEY WS-KEY USING IN-F GIVING OUT-F.\n\
                 STOP RUN.\n",
        );
        let hit = cases
            .iter()
            .find(|c| c.category == EdgeCaseCategory::SortMerge)
            .unwrap();
        assert_eq!(hit.severity, EdgeCaseSeverity::NeedsAugmentation);
    }
}
