//! Source-to-target functionality mappings.
//!
//! One record per translated paragraph, stating how faithfully the
//! target reproduces the source and listing the findings that lowered
//! the grade. The records serialize to JSON for the run report.

use serde::{Deserialize, Serialize};

use crate::edgecase::{EdgeCase, EdgeCaseSeverity};
use crate::flow::FlowGraph;
use crate::ir::IrProgram;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EquivalenceLevel {
    Exact,
    High,
    Medium,
    Low,
    Partial,
}

/// How one source unit maps onto the generated code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionalityMapping {
    pub id: String,
    pub source_name: String,
    pub target_name: String,
    pub equivalence: EquivalenceLevel,
    /// Confidence in the stated equivalence, between 0 and 1.
    pub confidence: f64,
    pub findings: Vec<String>,
}

impl FunctionalityMapping {
    pub fn new(
        id: impl Into<String>,
        source_name: impl Into<String>,
        target_name: impl Into<String>,
        equivalence: EquivalenceLevel,
        confidence: f64,
    ) -> Self {
        FunctionalityMapping {
            id: id.into(),
            source_name: source_name.into(),
            target_name: target_name.into(),
            equivalence,
            confidence: confidence.clamp(0.0, 1.0),
            findings: Vec::new(),
        }
    }

    pub fn with_finding(mut self, finding: impl Into<String>) -> Self {
        self.findings.push(finding.into());
        self
    }
}

/// Build one mapping per paragraph, grading each by the worst finding
/// whose source span falls inside it.
pub fn paragraph_mappings(
    program: &IrProgram,
    graph: &FlowGraph<'_>,
    cases: &[EdgeCase],
) -> Vec<FunctionalityMapping> {
    program
        .paragraphs
        .iter()
        .enumerate()
        .map(|(i, paragraph)| {
            let node_span = graph.nodes().get(i).map(|n| n.span);
            let local: Vec<&EdgeCase> = match node_span {
                Some(span) => cases
                    .iter()
                    .filter(|c| {
                        c.span.file == span.file
                            && c.span.start >= span.start
                            && c.span.end <= span.end
                    })
                    .collect(),
                None => Vec::new(),
            };

            let worst = local.iter().map(|c| c.severity).max();
            let (equivalence, confidence) = match worst {
                _ if paragraph.blocked => (EquivalenceLevel::Partial, 0.2),
                Some(EdgeCaseSeverity::Blocking) => (EquivalenceLevel::Partial, 0.2),
                Some(EdgeCaseSeverity::NeedsAugmentation) => (EquivalenceLevel::Medium, 0.55),
                Some(EdgeCaseSeverity::Informational) => (EquivalenceLevel::High, 0.85),
                None => (EquivalenceLevel::Exact, 1.0),
            };

            let mut mapping = FunctionalityMapping::new(
                format!("{}-p{:03}", program.name, i + 1),
                paragraph.source_name.clone(),
                paragraph.name.clone(),
                equivalence,
                confidence,
            );
            for case in local {
                mapping.findings.push(format!(
                    "{}: {}: {}",
                    case.severity,
                    case.category.name(),
                    case.detail
                ));
            }
            mapping
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{edgecase, flow, structure, translate};
    use cobalt_cobol::lexer::{FileId, SourceFile, SourceFormat};
    use cobalt_cobol::parser::parse_source;
    use cobalt_cobol::semantic;

    fn mappings_of(text: &str) -> Vec<FunctionalityMapping> {
        let source = SourceFile::from_text(FileId::MAIN, text.to_string(), SourceFormat::Free);
        let (program, errors) = parse_source(&source);
        assert!(errors.is_empty(), "parse errors: {:?}", errors);
        let program = program.unwrap();
        let (symbols, _) = semantic::analyze(&program);
        let (graph, _) = flow::analyze(&program, &symbols);
        let structure = structure::analyze(&graph);
        let cases = edgecase::detect(&symbols, &graph, &structure);
        let ir = translate::translate(&program, &symbols, &graph, &structure);
        paragraph_mappings(&ir, &graph, &cases)
    }

    #[test]
    fn clean_paragraph_maps_exactly() {
        let mappings = mappings_of(
            "IDENTIFICATION DIVISION.\nPROGRAM-ID. CLEAN.\nPROCEDURE DIVISION.\n\
             MAIN-PARA.\n    DISPLAY \"HELLO\".\n    STOP RUN.\n",
        );
        assert_eq!(mappings.len(), 1);
        assert_eq!(mappings[0].equivalence, EquivalenceLevel::Exact);
        assert_eq!(mappings[0].source_name, "MAIN-PARA");
        assert_eq!(mappings[0].target_name, "main_para");
        assert!(mappings[0].findings.is_empty());
    }

    #[test]
    fn altered_paragraph_maps_partially() {
        let mappings = mappings_of(
            "IDENTIFICATION DIVISION.\nPROGRAM-ID. ALT.\nPROCEDURE DIVISION.\n\
             MAIN-PARA.\n    ALTER MAIN-PARA TO PROCEED TO END-PARA.\n\
             END-PARA.\n    STOP RUN.\n",
        );
        let main = &mappings[0];
        assert_eq!(main.equivalence, EquivalenceLevel::Partial);
        assert!(main.confidence < 0.5);
        assert!(main.findings.iter().any(|f| f.contains("ALTER")));
        assert_eq!(mappings[1].equivalence, EquivalenceLevel::Exact);
    }

    #[test]
    fn goto_depending_grades_medium() {
        let mappings = mappings_of(
            "IDENTIFICATION DIVISION.\nPROGRAM-ID. DEP.\n\
             DATA DIVISION.\nWORKING-STORAGE SECTION.\n01 WS-IDX PIC 9.\n\
             PROCEDURE DIVISION.\n\
             MAIN-PARA.\n    GO TO A-PARA B-PARA DEPENDING ON WS-IDX.\n\
             A-PARA.\n    STOP RUN.\nB-PARA.\n    STOP RUN.\n",
        );
        assert_eq!(mappings[0].equivalence, EquivalenceLevel::Medium);
    }

    #[test]
    fn confidence_is_clamped() {
        let mapping = FunctionalityMapping::new("x", "A", "a", EquivalenceLevel::High, 1.7);
        assert_eq!(mapping.confidence, 1.0);
        let mapping = FunctionalityMapping::new("x", "A", "a", EquivalenceLevel::Low, -0.3);
        assert_eq!(mapping.confidence, 0.0);
    }

    #[test]
    fn mapping_round_trips_through_json() {
        let mapping = FunctionalityMapping::new(
            "demo-p001",
            "MAIN-PARA",
            "main_para",
            EquivalenceLevel::Medium,
            0.55,
        )
        .with_finding("needs-augmentation: GO TO DEPENDING ON: 2 targets");
        let json = serde_json::to_string(&mapping).unwrap();
        let back: FunctionalityMapping = serde_json::from_str(&json).unwrap();
        assert_eq!(back, mapping);
    }
}
