//! End-to-end batch runs over real source trees on disk.

use std::fs;
use std::path::Path;

use cobalt::augment::{Augmentation, AugmentationError, AugmentationHint, SnippetContext};
use cobalt::{Config, NoAugmentation, Orchestrator, ProgramStatus, ReportFormat};
use cobalt_cobol::lexer::SourceFormat;

const MENU: &str = "IDENTIFICATION DIVISION.\n\
     PROGRAM-ID. MENU.\n\
     DATA DIVISION.\n\
     WORKING-STORAGE SECTION.\n\
     01 CHOICE PIC 9.\n\
     01 RESULT-VAR PIC X(10).\n\
     PROCEDURE DIVISION.\n\
     MAIN-PARA.\n\
         MOVE 1 TO CHOICE.\n\
         IF CHOICE = 1\n\
             MOVE \"ONE\" TO RESULT-VAR\n\
         ELSE\n\
             MOVE \"OTHER\" TO RESULT-VAR\n\
         END-IF.\n\
         DISPLAY \"CHOICE IS \" RESULT-VAR.\n\
         STOP RUN.\n";

const LOOPER: &str = "IDENTIFICATION DIVISION.\n\
     PROGRAM-ID. LOOPER.\n\
     DATA DIVISION.\n\
     WORKING-STORAGE SECTION.\n\
     01 MORE-DATA PIC X(3) VALUE \"YES\".\n\
     01 COUNTER PIC 9(3).\n\
     PROCEDURE DIVISION.\n\
     MAIN-PARA.\n\
         PERFORM COUNT-UP UNTIL MORE-DATA = \"NO\".\n\
         STOP RUN.\n\
     COUNT-UP.\n\
         ADD 1 TO COUNTER.\n\
         IF COUNTER > 5\n\
             MOVE \"NO\" TO MORE-DATA\n\
         END-IF.\n";

const COPYF: &str = "IDENTIFICATION DIVISION.\n\
     PROGRAM-ID. COPYF.\n\
     ENVIRONMENT DIVISION.\n\
     INPUT-OUTPUT SECTION.\n\
     FILE-CONTROL.\n\
         SELECT IN-FILE ASSIGN TO \"IN.DAT\".\n\
         SELECT OUT-FILE ASSIGN TO \"OUT.DAT\".\n\
     DATA DIVISION.\n\
     FILE SECTION.\n\
     FD IN-FILE.\n\
     01 IN-REC PIC X(80).\n\
     FD OUT-FILE.\n\
     01 OUT-REC PIC X(80).\n\
     WORKING-STORAGE SECTION.\n\
     01 MORE-DATA PIC X(3) VALUE \"YES\".\n\
     01 LINE-COUNT PIC 9(5).\n\
     PROCEDURE DIVISION.\n\
     MAIN-PARA.\n\
         OPEN INPUT IN-FILE OUTPUT OUT-FILE.\n\
         PERFORM COPY-LOOP UNTIL MORE-DATA = \"NO\".\n\
         CLOSE IN-FILE OUT-FILE.\n\
         DISPLAY LINE-COUNT.\n\
         STOP RUN.\n\
     COPY-LOOP.\n\
         READ IN-FILE\n\
             AT END MOVE \"NO\" TO MORE-DATA\n\
             NOT AT END\n\
                 MOVE IN-REC TO OUT-REC\n\
                 WRITE OUT-REC\n\
                 ADD 1 TO LINE-COUNT\n\
         END-READ.\n";

const JUMPER: &str = "IDENTIFICATION DIVISION.\n\
     PROGRAM-ID. JUMPER.\n\
     DATA DIVISION.\n\
     WORKING-STORAGE SECTION.\n\
     01 CHOICE PIC 9.\n\
     PROCEDURE DIVISION.\n\
     MAIN-PARA.\n\
         MOVE 1 TO CHOICE.\n\
         GO TO A-PARA B-PARA DEPENDING ON CHOICE.\n\
     A-PARA.\n\
         DISPLAY \"ONE\".\n\
         STOP RUN.\n\
     B-PARA.\n\
         DISPLAY \"TWO\".\n\
         STOP RUN.\n";

const ALT: &str = "IDENTIFICATION DIVISION.\n\
     PROGRAM-ID. ALT.\n\
     PROCEDURE DIVISION.\n\
     MAIN-PARA.\n\
         ALTER MAIN-PARA TO PROCEED TO END-PARA.\n\
     END-PARA.\n\
         STOP RUN.\n";

fn seed(root: &Path, rel: &str, text: &str) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, text).unwrap();
}

fn config(input: &Path, output: &Path) -> Config {
    let mut config = Config::new(input, output);
    config.source_format = SourceFormat::Free;
    config.workers = 2;
    config
}

#[test]
fn menu_program_transpiles_cleanly() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("src");
    let output = dir.path().join("out");
    seed(&input, "menu/MENU.cbl", MENU);

    let config = config(&input, &output);
    let orchestrator = Orchestrator::new(&config, &NoAugmentation);
    let report = orchestrator.run().unwrap();

    assert_eq!(report.analyzed, 1);
    assert_eq!(report.programs[0].status, ProgramStatus::Success);
    assert_eq!(report.exit_code(), 0);

    // The output root mirrors the input's relative layout.
    let generated = fs::read_to_string(output.join("menu/MENU.py")).unwrap();
    assert!(generated.contains("if choice == 1:"), "{}", generated);
    assert!(generated.contains("_move_str(\"ONE\", 10)"));
    assert!(generated.contains("_move_str(\"OTHER\", 10)"));
    assert!(generated.contains("print(\"CHOICE IS \" + _render(result_var))"));
    assert!(!output.join("menu/MENU.py.tmp").exists());
}

#[test]
fn perform_until_keeps_its_loop_shape() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("src");
    let output = dir.path().join("out");
    seed(&input, "LOOPER.cbl", LOOPER);

    let config = config(&input, &output);
    let report = Orchestrator::new(&config, &NoAugmentation).run().unwrap();
    assert_eq!(report.programs[0].status, ProgramStatus::Success);

    let generated = fs::read_to_string(output.join("LOOPER.py")).unwrap();
    assert!(generated.contains("while more_data != \"NO\":"), "{}", generated);
    assert!(generated.contains("count_up()"));
}

#[test]
fn file_copy_program_lowers_the_read_write_loop() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("src");
    let output = dir.path().join("out");
    seed(&input, "COPYF.cobol", COPYF);

    let config = config(&input, &output);
    let report = Orchestrator::new(&config, &NoAugmentation).run().unwrap();
    assert_eq!(report.programs[0].status, ProgramStatus::Success);

    let generated = fs::read_to_string(output.join("COPYF.py")).unwrap();
    assert!(generated.contains("in_file = _CobolFile(\"IN.DAT\")"), "{}", generated);
    assert!(generated.contains("_line = in_file.read_line()"));
    assert!(generated.contains("out_file.write_line(_render(out_rec))"));
    assert!(generated.contains("line_count = _conform((_num(line_count) + 1), 5, 0)"));
}

#[test]
fn edge_cases_degrade_but_do_not_fail() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("src");
    let output = dir.path().join("out");
    seed(&input, "JUMPER.cbl", JUMPER);

    let config = config(&input, &output);
    let report = Orchestrator::new(&config, &NoAugmentation).run().unwrap();

    let program = &report.programs[0];
    assert_eq!(program.status, ProgramStatus::SuccessWithEdgeCases);
    assert_eq!(report.exit_code(), 0);
    assert!(output.join("JUMPER.py").exists());

    let case = program
        .edge_cases
        .iter()
        .find(|c| c.category == "GO TO DEPENDING ON")
        .expect("computed GO TO should be catalogued");
    assert_eq!(case.severity, "needs-augmentation");
    assert!(case.location.line > 1);
    assert!(case.location.column >= 1);
}

#[test]
fn blocking_edge_case_fails_the_program_without_output() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("src");
    let output = dir.path().join("out");
    seed(&input, "ALT.cbl", ALT);

    let config = config(&input, &output);
    let report = Orchestrator::new(&config, &NoAugmentation).run().unwrap();

    let program = &report.programs[0];
    assert_eq!(program.status, ProgramStatus::Failed);
    assert_eq!(report.exit_code(), 1);
    assert!(program.output.is_none());
    assert!(!output.join("ALT.py").exists());
    assert!(program
        .errors
        .iter()
        .any(|e| e.message.contains("blocking edge case: ALTER")));
}

#[test]
fn one_failing_program_does_not_abort_the_batch() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("src");
    let output = dir.path().join("out");
    seed(&input, "ALT.cbl", ALT);
    seed(&input, "MENU.cbl", MENU);

    let config = config(&input, &output);
    let report = Orchestrator::new(&config, &NoAugmentation).run().unwrap();

    assert_eq!(report.analyzed, 2);
    assert_eq!(report.failed, 1);
    assert_eq!(report.succeeded, 1);
    assert_eq!(report.exit_code(), 1);
    assert!(output.join("MENU.py").exists());
}

#[test]
fn unparsable_source_is_reported_not_thrown() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("src");
    let output = dir.path().join("out");
    seed(&input, "JUNK.cbl", "THIS IS NOT COBOL AT ALL\n");

    let config = config(&input, &output);
    let report = Orchestrator::new(&config, &NoAugmentation).run().unwrap();

    let program = &report.programs[0];
    assert_eq!(program.status, ProgramStatus::Failed);
    assert!(program
        .errors
        .iter()
        .any(|e| e.message.contains("no translatable program unit found")));
}

#[test]
fn regeneration_is_byte_identical() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("src");
    seed(&input, "MENU.cbl", MENU);

    let first_out = dir.path().join("out1");
    let second_out = dir.path().join("out2");
    let first = config(&input, &first_out);
    let second = config(&input, &second_out);
    Orchestrator::new(&first, &NoAugmentation).run().unwrap();
    Orchestrator::new(&second, &NoAugmentation).run().unwrap();

    assert_eq!(
        fs::read_to_string(first_out.join("MENU.py")).unwrap(),
        fs::read_to_string(second_out.join("MENU.py")).unwrap()
    );
}

struct AlwaysUnavailable;

impl Augmentation for AlwaysUnavailable {
    fn submit(
        &self,
        _snippet: &str,
        _context: &SnippetContext,
    ) -> Result<AugmentationHint, AugmentationError> {
        Err(AugmentationError::Unavailable)
    }
}

struct ConfidentHelper;

impl Augmentation for ConfidentHelper {
    fn submit(
        &self,
        _snippet: &str,
        _context: &SnippetContext,
    ) -> Result<AugmentationHint, AugmentationError> {
        Ok(AugmentationHint {
            replacement: "match choice: ...".to_string(),
            confidence: 0.9,
        })
    }
}

#[test]
fn augmentation_unavailability_never_turns_success_into_failure() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("src");
    seed(&input, "JUMPER.cbl", JUMPER);

    let config = config(&input, &dir.path().join("out"));
    let report = Orchestrator::new(&config, &AlwaysUnavailable).run().unwrap();

    assert_eq!(
        report.programs[0].status,
        ProgramStatus::SuccessWithEdgeCases
    );
    assert_eq!(report.exit_code(), 0);
}

#[test]
fn augmentation_hints_show_up_in_mappings() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("src");
    seed(&input, "JUMPER.cbl", JUMPER);

    let mut config = config(&input, &dir.path().join("out"));
    config.with_mappings = true;
    let report = Orchestrator::new(&config, &ConfidentHelper).run().unwrap();

    let program = &report.programs[0];
    assert_eq!(program.status, ProgramStatus::SuccessWithEdgeCases);
    let hinted = program
        .mappings
        .iter()
        .flat_map(|m| m.findings.iter())
        .any(|f| f.contains("augmentation hint available"));
    assert!(hinted, "mappings: {:?}", program.mappings);
}

#[test]
fn mappings_grade_the_computed_goto_paragraph() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("src");
    seed(&input, "JUMPER.cbl", JUMPER);

    let mut config = config(&input, &dir.path().join("out"));
    config.with_mappings = true;
    let report = Orchestrator::new(&config, &NoAugmentation).run().unwrap();

    let mappings = &report.programs[0].mappings;
    assert_eq!(mappings.len(), 3);
    let main = mappings
        .iter()
        .find(|m| m.source_name == "MAIN-PARA")
        .unwrap();
    assert!(main.confidence < 1.0);
    assert!(main.findings.iter().any(|f| f.contains("GO TO DEPENDING ON")));
}

#[test]
fn cancelled_run_processes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("src");
    seed(&input, "MENU.cbl", MENU);

    let config = config(&input, &dir.path().join("out"));
    let orchestrator = Orchestrator::new(&config, &NoAugmentation);
    orchestrator.request_cancel();
    let report = orchestrator.run().unwrap();

    assert_eq!(report.analyzed, 0);
    assert_eq!(report.exit_code(), 0);
}

#[test]
fn run_report_renders_text_and_json() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("src");
    seed(&input, "MENU.cbl", MENU);
    seed(&input, "JUMPER.cbl", JUMPER);

    let config = config(&input, &dir.path().join("out"));
    let report = Orchestrator::new(&config, &NoAugmentation).run().unwrap();

    let text = report.generate(ReportFormat::Text);
    assert!(text.contains("RUN SUMMARY"));
    assert!(text.contains("Program ID: MENU"));
    assert!(text.contains("GO TO DEPENDING ON"));
    assert!(text.contains("Line:"));

    let json: serde_json::Value =
        serde_json::from_str(&report.generate(ReportFormat::Json)).unwrap();
    assert_eq!(json["analyzed"], 2);
    assert_eq!(json["programs"][1]["program_id"], "MENU");
}
