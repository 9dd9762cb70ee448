//! Batch orchestration.
//!
//! Drives each input program through the pipeline state machine
//! Parsing -> Analyzing -> Structuring -> Translating -> Generating ->
//! Done, with Errored absorbing from any stage and an
//! AwaitingAugmentation side-loop out of Translating. Programs are
//! independent: workers share only the augmentation cache, and nothing a
//! failing program produces ever reaches another program's pipeline.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::thread;

use cobalt_cobol::lexer::{FileId, SourceFile};
use cobalt_cobol::parser::parse_source;
use cobalt_cobol::semantic;
use cobalt_lang_core::{SourceText, Span};
use cobalt_transpile::codegen::python;
use cobalt_transpile::{edgecase, flow, structure};
use cobalt_transpile::{generate, paragraph_mappings, translate, EdgeCase, EdgeCaseSeverity};

use crate::augment::{submit_with_retry, Augmentation, AugmentationHint, HintCache, SnippetContext};
use crate::config::{discover_sources, Config};
use crate::error::{Result, RunError};
use crate::report::{
    ProgramReport, ProgramStatus, ReportedEdgeCase, ReportedError, ReportedLocation, RunReport,
};

/// Pipeline stage a program is in, for logging and error attribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Parsing,
    Analyzing,
    Structuring,
    Translating,
    AwaitingAugmentation,
    Generating,
    Done,
    Errored,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Parsing => "Parsing",
            Stage::Analyzing => "Analyzing",
            Stage::Structuring => "Structuring",
            Stage::Translating => "Translating",
            Stage::AwaitingAugmentation => "AwaitingAugmentation",
            Stage::Generating => "Generating",
            Stage::Done => "Done",
            Stage::Errored => "Errored",
        };
        f.write_str(name)
    }
}

/// Drives a batch of programs through the pipeline.
pub struct Orchestrator<'a> {
    config: &'a Config,
    augmentation: &'a dyn Augmentation,
    cache: HintCache,
    cancel: AtomicBool,
}

impl<'a> Orchestrator<'a> {
    pub fn new(config: &'a Config, augmentation: &'a dyn Augmentation) -> Self {
        Self {
            config,
            augmentation,
            cache: HintCache::new(config.cache_ttl),
            cancel: AtomicBool::new(false),
        }
    }

    /// Ask the batch to stop after the programs currently in flight.
    ///
    /// Safe to call from another thread; in-progress programs finish (or
    /// fail) normally, so no partial output is ever left behind.
    pub fn request_cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    /// Discover sources and transpile them across the worker pool.
    pub fn run(&self) -> Result<RunReport> {
        let sources = discover_sources(self.config)?;
        fs::create_dir_all(&self.config.output_root)
            .map_err(|e| RunError::io(&self.config.output_root, e))?;
        tracing::info!(
            programs = sources.len(),
            workers = self.config.workers,
            "batch starting"
        );

        let next = AtomicUsize::new(0);
        let collected = Mutex::new(Vec::with_capacity(sources.len()));
        let workers = self.config.workers.min(sources.len()).max(1);

        thread::scope(|scope| {
            for _ in 0..workers {
                scope.spawn(|| loop {
                    if self.is_cancelled() {
                        break;
                    }
                    let index = next.fetch_add(1, Ordering::Relaxed);
                    let Some(path) = sources.get(index) else {
                        break;
                    };
                    let report = self.process_program(path);
                    collected
                        .lock()
                        .unwrap_or_else(|e| e.into_inner())
                        .push(report);
                });
            }
        });

        let mut programs = collected.into_inner().unwrap_or_else(|e| e.into_inner());
        programs.sort_by(|a, b| a.source.cmp(&b.source));
        let report = RunReport::new("Cobalt Transpilation Run", programs);
        tracing::info!(
            analyzed = report.analyzed,
            failed = report.failed,
            "batch finished"
        );
        Ok(report)
    }

    /// Run one program's pipeline from source file to written output.
    ///
    /// Every failure is absorbed into the returned report; nothing
    /// escapes to the caller.
    fn process_program(&self, path: &Path) -> ProgramReport {
        let rel = path.strip_prefix(&self.config.input_root).unwrap_or(path);
        let mut report = ProgramReport {
            source: rel.display().to_string(),
            program_id: None,
            status: ProgramStatus::Success,
            output: None,
            errors: Vec::new(),
            edge_cases: Vec::new(),
            mappings: Vec::new(),
        };

        let mut stage = Stage::Parsing;
        tracing::info!(program = %report.source, %stage, "pipeline starting");

        let source = match SourceFile::from_path(FileId::MAIN, path, self.config.source_format) {
            Ok(source) => source,
            Err(err) => {
                return self.fail(report, stage, err.to_string(), None);
            }
        };
        let text = SourceText::new(&source.text);

        let (program, parse_errors) = parse_source(&source);
        for err in &parse_errors {
            report.errors.push(ReportedError {
                stage: stage.to_string(),
                message: err.to_string(),
                location: err
                    .span()
                    .map(|span| text.location(span, &report.source).into()),
            });
        }
        let Some(program) = program else {
            return self.fail(
                report,
                stage,
                "no translatable program unit found".to_string(),
                None,
            );
        };
        report.program_id = Some(program.name().to_string());

        stage = Stage::Analyzing;
        tracing::debug!(program = %report.source, %stage);
        let (symbols, diagnostics) = semantic::analyze(&program);
        for diag in diagnostics.iter().filter(|d| d.is_error()) {
            report.errors.push(ReportedError {
                stage: stage.to_string(),
                message: format!("[{}] {}", diag.code, diag.message),
                location: Some(text.location(diag.span, &report.source).into()),
            });
        }

        stage = Stage::Structuring;
        tracing::debug!(program = %report.source, %stage);
        let (graph, flow_diagnostics) = flow::analyze(&program, &symbols);
        for diag in flow_diagnostics.iter().filter(|d| d.is_error()) {
            report.errors.push(ReportedError {
                stage: stage.to_string(),
                message: format!("[{}] {}", diag.code, diag.message),
                location: Some(text.location(diag.span, &report.source).into()),
            });
        }
        let regions = structure::analyze(&graph);
        let cases = edgecase::detect(&symbols, &graph, &regions);
        for case in &cases {
            report.edge_cases.push(ReportedEdgeCase {
                category: case.category.name().to_string(),
                severity: case.severity.to_string(),
                detail: case.detail.clone(),
                location: text.location(case.span, &report.source).into(),
            });
        }

        // A blocking edge case sends the program to the absorbing state;
        // best-effort output for it would be structurally wrong.
        let blocking: Vec<&EdgeCase> = cases
            .iter()
            .filter(|c| c.severity == EdgeCaseSeverity::Blocking)
            .collect();
        if !blocking.is_empty() {
            for case in blocking {
                report.errors.push(ReportedError {
                    stage: stage.to_string(),
                    message: format!("blocking edge case: {}: {}", case.category.name(), case.detail),
                    location: Some(text.location(case.span, &report.source).into()),
                });
            }
            return self.abandon(report, stage);
        }

        stage = Stage::Translating;
        tracing::debug!(program = %report.source, %stage);
        let ir = translate(&program, &symbols, &graph, &regions);

        let mut hints: Vec<(Span, AugmentationHint)> = Vec::new();
        let pending: Vec<&EdgeCase> = cases
            .iter()
            .filter(|c| c.severity == EdgeCaseSeverity::NeedsAugmentation)
            .collect();
        if !pending.is_empty() {
            stage = Stage::AwaitingAugmentation;
            tracing::debug!(program = %report.source, %stage, cases = pending.len());
            let symbol_names: Vec<String> = symbols
                .roots()
                .iter()
                .map(|id| symbols.entry(*id).name.clone())
                .collect();
            for case in pending {
                let snippet = source.span_text(case.span);
                let context = SnippetContext {
                    kind: case.category,
                    symbols: symbol_names.clone(),
                    timeout: self.config.augment_timeout,
                };
                if let Some(hint) = submit_with_retry(
                    self.augmentation,
                    &self.cache,
                    snippet,
                    &context,
                    self.config.augment_attempts,
                    self.config.augment_base_delay,
                ) {
                    hints.push((case.span, hint));
                }
            }
            // Hints are advisory; the deterministic IR stands either way.
            stage = Stage::Translating;
            tracing::debug!(program = %report.source, %stage, hints = hints.len(), "resumed");
        }

        stage = Stage::Generating;
        tracing::debug!(program = %report.source, %stage);
        let python_source = generate(&ir, &python::TEMPLATES);
        let mut mappings = paragraph_mappings(&ir, &graph, &cases);
        for (span, hint) in &hints {
            if let Some(index) = graph
                .nodes()
                .iter()
                .position(|n| n.span.file == span.file && n.span.start <= span.start && span.end <= n.span.end)
            {
                if let Some(mapping) = mappings.get_mut(index) {
                    mapping.findings.push(format!(
                        "augmentation hint available (confidence {:.2})",
                        hint.confidence
                    ));
                }
            }
        }

        let out_rel = rel.with_extension("py");
        let out_path = self.config.output_root.join(&out_rel);
        if let Err(err) = write_atomic(&out_path, &python_source) {
            return self.fail(report, stage, format!("writing output: {}", err), None);
        }
        report.output = Some(out_rel.display().to_string());
        if self.config.with_mappings {
            report.mappings = mappings;
        }

        stage = Stage::Done;
        report.settle_status();
        tracing::info!(program = %report.source, %stage, status = report.status.name());
        report
    }

    fn fail(
        &self,
        mut report: ProgramReport,
        stage: Stage,
        message: String,
        location: Option<ReportedLocation>,
    ) -> ProgramReport {
        report.errors.push(ReportedError {
            stage: stage.to_string(),
            message,
            location,
        });
        self.abandon(report, stage)
    }

    fn abandon(&self, mut report: ProgramReport, from: Stage) -> ProgramReport {
        report.status = ProgramStatus::Failed;
        tracing::warn!(
            program = %report.source,
            from = %from,
            stage = %Stage::Errored,
            "pipeline abandoned"
        );
        report
    }
}

/// Write through a `<path>.tmp` sibling and rename into place, so a
/// cancelled or crashed run never leaves a half-written output file.
fn write_atomic(path: &Path, contents: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp = PathBuf::from(tmp_name);
    fs::write(&tmp, contents)?;
    fs::rename(&tmp, path)
}
