//! Run-level reporting.
//!
//! One [`RunReport`] covers a whole batch: per-program status, every
//! error and edge case with its resolved source position, and optional
//! functionality-mapping confidences. Renders as plain text or JSON.

use serde::Serialize;

use cobalt_lang_core::Location;
use cobalt_transpile::FunctionalityMapping;

/// Report output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    /// Plain text
    Text,
    /// JSON
    Json,
}

/// Outcome of one program's pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ProgramStatus {
    /// Translated cleanly.
    Success,
    /// Translated, but edge cases or recovered errors were found.
    SuccessWithEdgeCases,
    /// Reached the Errored state; no output was written.
    Failed,
}

impl ProgramStatus {
    pub fn name(self) -> &'static str {
        match self {
            ProgramStatus::Success => "Success",
            ProgramStatus::SuccessWithEdgeCases => "SuccessWithEdgeCases",
            ProgramStatus::Failed => "Failed",
        }
    }
}

/// A resolved source position, ready for serialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportedLocation {
    pub file: String,
    pub line: u32,
    pub column: u32,
}

impl From<Location> for ReportedLocation {
    fn from(loc: Location) -> Self {
        Self {
            file: loc.file_name,
            line: loc.line,
            column: loc.column,
        }
    }
}

/// One error collected for a program.
#[derive(Debug, Clone, Serialize)]
pub struct ReportedError {
    /// The pipeline stage that produced it.
    pub stage: String,
    pub message: String,
    /// Missing only for errors with no source position, e.g. file i/o.
    pub location: Option<ReportedLocation>,
}

/// One edge case collected for a program.
#[derive(Debug, Clone, Serialize)]
pub struct ReportedEdgeCase {
    pub category: String,
    pub severity: String,
    pub detail: String,
    pub location: ReportedLocation,
}

/// Everything the run learned about one input program.
#[derive(Debug, Clone, Serialize)]
pub struct ProgramReport {
    /// Input path relative to the input root.
    pub source: String,
    /// PROGRAM-ID, when parsing got far enough to see one.
    pub program_id: Option<String>,
    pub status: ProgramStatus,
    /// Output path relative to the output root, when one was written.
    pub output: Option<String>,
    pub errors: Vec<ReportedError>,
    pub edge_cases: Vec<ReportedEdgeCase>,
    /// Per-paragraph mappings, populated when the run requested them.
    pub mappings: Vec<FunctionalityMapping>,
}

impl ProgramReport {
    /// Derive the status from what was collected.
    ///
    /// Failed is decided by the orchestrator (absorbing Errored state);
    /// this only grades the two success shapes.
    pub fn settle_status(&mut self) {
        if self.status == ProgramStatus::Failed {
            return;
        }
        self.status = if self.edge_cases.is_empty() && self.errors.is_empty() {
            ProgramStatus::Success
        } else {
            ProgramStatus::SuccessWithEdgeCases
        };
    }
}

/// The report for a whole batch run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub title: String,
    pub programs: Vec<ProgramReport>,
    /// Programs the batch looked at, including failures.
    pub analyzed: usize,
    pub succeeded: usize,
    pub with_edge_cases: usize,
    pub failed: usize,
}

impl RunReport {
    pub fn new(title: &str, programs: Vec<ProgramReport>) -> Self {
        let count = |status: ProgramStatus| programs.iter().filter(|p| p.status == status).count();
        Self {
            title: title.to_string(),
            analyzed: programs.len(),
            succeeded: count(ProgramStatus::Success),
            with_edge_cases: count(ProgramStatus::SuccessWithEdgeCases),
            failed: count(ProgramStatus::Failed),
            programs,
        }
    }

    /// Nonzero exactly when some program reached the Errored state.
    pub fn exit_code(&self) -> i32 {
        if self.failed > 0 {
            1
        } else {
            0
        }
    }

    /// Render the report in the requested format.
    pub fn generate(&self, format: ReportFormat) -> String {
        match format {
            ReportFormat::Text => self.generate_text(),
            ReportFormat::Json => self.generate_json(),
        }
    }

    fn generate_text(&self) -> String {
        let mut output = String::new();

        output.push_str(&format!("{}\n", self.title));
        output.push_str(&"=".repeat(self.title.len()));
        output.push_str("\n\n");

        output.push_str("RUN SUMMARY\n");
        output.push_str("-----------\n\n");
        output.push_str(&format!("Programs Analyzed:   {}\n", self.analyzed));
        output.push_str(&format!("Succeeded:           {}\n", self.succeeded));
        output.push_str(&format!("With Edge Cases:     {}\n", self.with_edge_cases));
        output.push_str(&format!("Failed:              {}\n", self.failed));
        output.push('\n');

        if !self.programs.is_empty() {
            output.push_str("PROGRAM DETAILS\n");
            output.push_str("---------------\n\n");

            for program in &self.programs {
                output.push_str(&format!("File: {}\n", program.source));
                if let Some(ref id) = program.program_id {
                    output.push_str(&format!("  Program ID: {}\n", id));
                }
                output.push_str(&format!("  Status: {}\n", program.status.name()));
                if let Some(ref out) = program.output {
                    output.push_str(&format!("  Output: {}\n", out));
                }
                output.push_str(&format!("  Errors: {}\n", program.errors.len()));
                output.push_str(&format!("  Edge Cases: {}\n", program.edge_cases.len()));
                output.push('\n');
            }
        }

        let total_errors: usize = self.programs.iter().map(|p| p.errors.len()).sum();
        if total_errors > 0 {
            output.push_str("ERRORS\n");
            output.push_str("------\n\n");

            for program in &self.programs {
                for error in &program.errors {
                    output.push_str(&format!("[{}] {}\n", error.stage, error.message));
                    match &error.location {
                        Some(loc) => output.push_str(&format!(
                            "     File: {}, Line: {}, Column: {}\n",
                            loc.file, loc.line, loc.column
                        )),
                        None => output.push_str(&format!("     File: {}\n", program.source)),
                    }
                    output.push('\n');
                }
            }
        }

        let total_cases: usize = self.programs.iter().map(|p| p.edge_cases.len()).sum();
        if total_cases > 0 {
            output.push_str("EDGE CASES\n");
            output.push_str("----------\n\n");

            for program in &self.programs {
                for case in &program.edge_cases {
                    output.push_str(&format!(
                        "[{}] {} - {}\n",
                        case.severity, case.category, case.detail
                    ));
                    output.push_str(&format!(
                        "     File: {}, Line: {}, Column: {}\n",
                        case.location.file, case.location.line, case.location.column
                    ));
                    output.push('\n');
                }
            }
        }

        let total_mappings: usize = self.programs.iter().map(|p| p.mappings.len()).sum();
        if total_mappings > 0 {
            output.push_str("FUNCTIONALITY MAPPINGS\n");
            output.push_str("----------------------\n\n");

            for program in &self.programs {
                for mapping in &program.mappings {
                    output.push_str(&format!(
                        "{:<24} -> {:<24} {:?} ({:.2})\n",
                        mapping.source_name,
                        mapping.target_name,
                        mapping.equivalence,
                        mapping.confidence
                    ));
                }
            }
            output.push('\n');
        }

        output
    }

    fn generate_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cobalt_transpile::EquivalenceLevel;

    fn sample_programs() -> Vec<ProgramReport> {
        let mut clean = ProgramReport {
            source: "payroll/CALC.cbl".to_string(),
            program_id: Some("CALC".to_string()),
            status: ProgramStatus::Success,
            output: Some("payroll/CALC.py".to_string()),
            errors: vec![],
            edge_cases: vec![],
            mappings: vec![FunctionalityMapping::new(
                "CALC-p001",
                "100-MAIN",
                "main_100",
                EquivalenceLevel::Exact,
                1.0,
            )],
        };
        clean.settle_status();

        let mut flagged = ProgramReport {
            source: "payroll/LEGACY.cbl".to_string(),
            program_id: Some("LEGACY".to_string()),
            status: ProgramStatus::Success,
            output: Some("payroll/LEGACY.py".to_string()),
            errors: vec![],
            edge_cases: vec![ReportedEdgeCase {
                category: "GO TO DEPENDING ON".to_string(),
                severity: "needs-augmentation".to_string(),
                detail: "computed GO TO over 3 targets".to_string(),
                location: ReportedLocation {
                    file: "payroll/LEGACY.cbl".to_string(),
                    line: 42,
                    column: 12,
                },
            }],
            mappings: vec![],
        };
        flagged.settle_status();

        let failed = ProgramReport {
            source: "payroll/BROKEN.cbl".to_string(),
            program_id: None,
            status: ProgramStatus::Failed,
            output: None,
            errors: vec![ReportedError {
                stage: "Parsing".to_string(),
                message: "no translatable program unit found".to_string(),
                location: None,
            }],
            edge_cases: vec![],
            mappings: vec![],
        };

        vec![clean, flagged, failed]
    }

    #[test]
    fn counts_and_exit_code() {
        let report = RunReport::new("Cobalt Run", sample_programs());
        assert_eq!(report.analyzed, 3);
        assert_eq!(report.succeeded, 1);
        assert_eq!(report.with_edge_cases, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(report.exit_code(), 1);
    }

    #[test]
    fn exit_code_is_zero_without_failures() {
        let mut programs = sample_programs();
        programs.retain(|p| p.status != ProgramStatus::Failed);
        let report = RunReport::new("Cobalt Run", programs);
        assert_eq!(report.exit_code(), 0);
    }

    #[test]
    fn text_report_lists_locations() {
        let report = RunReport::new("Cobalt Run", sample_programs());
        let text = report.generate(ReportFormat::Text);
        assert!(text.contains("RUN SUMMARY"));
        assert!(text.contains("Programs Analyzed:   3"));
        assert!(text.contains("File: payroll/LEGACY.cbl, Line: 42, Column: 12"));
        assert!(text.contains("[needs-augmentation] GO TO DEPENDING ON"));
        assert!(text.contains("no translatable program unit found"));
        assert!(text.contains("100-MAIN"));
    }

    #[test]
    fn json_report_round_trips_the_fields() {
        let report = RunReport::new("Cobalt Run", sample_programs());
        let json = report.generate(ReportFormat::Json);
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["analyzed"], 3);
        assert_eq!(value["programs"][1]["status"], "SuccessWithEdgeCases");
        assert_eq!(value["programs"][1]["edge_cases"][0]["location"]["line"], 42);
        assert_eq!(value["programs"][0]["mappings"][0]["confidence"], 1.0);
    }

    #[test]
    fn settle_status_never_upgrades_a_failure() {
        let mut program = ProgramReport {
            source: "x.cbl".to_string(),
            program_id: None,
            status: ProgramStatus::Failed,
            output: None,
            errors: vec![],
            edge_cases: vec![],
            mappings: vec![],
        };
        program.settle_status();
        assert_eq!(program.status, ProgramStatus::Failed);
    }
}
