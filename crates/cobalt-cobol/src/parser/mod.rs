//! COBOL recursive descent parser.
//!
//! Hand-written, bounded lookahead, no backtracking across statement
//! boundaries. Errors accumulate so one pass reports everything it can: a
//! syntax error abandons only the enclosing paragraph, and parsing resumes
//! at the next paragraph header.

mod data;
mod divisions;
mod expressions;
mod statements;

use crate::ast::*;
use crate::error::CobolError;
use crate::lexer::{scan, Keyword, SourceFile, Span, Token, TokenKind};

/// Result type for parser operations.
pub type Result<T> = std::result::Result<T, CobolError>;

/// The COBOL parser.
pub struct Parser {
    /// Token stream (always ends with Eof).
    tokens: Vec<Token>,
    /// Current position in the token stream.
    current: usize,
    /// Accumulated errors.
    errors: Vec<CobolError>,
}

impl Parser {
    /// Create a parser over a token stream.
    pub fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            current: 0,
            errors: Vec::new(),
        }
    }

    /// Parse a complete program.
    ///
    /// Returns the tree (absent only when the program has no usable
    /// IDENTIFICATION DIVISION) alongside every accumulated error.
    pub fn parse_program(mut self) -> (Option<Program>, Vec<CobolError>) {
        match self.parse_program_inner() {
            Ok(program) => (Some(program), self.errors),
            Err(e) => {
                self.errors.push(e);
                (None, self.errors)
            }
        }
    }

    fn parse_program_inner(&mut self) -> Result<Program> {
        let start = self.current_span();

        let identification = self.parse_identification_division()?;

        let environment = if self.check_keyword(Keyword::Environment) {
            Some(self.parse_environment_division()?)
        } else {
            None
        };

        let data = if self.check_keyword(Keyword::Data) {
            Some(self.parse_data_division()?)
        } else {
            None
        };

        let procedure = if self.check_keyword(Keyword::Procedure) {
            Some(self.parse_procedure_division()?)
        } else {
            None
        };

        // Optional END PROGRAM name.
        if self.check_keyword(Keyword::EndProgram) {
            self.advance();
            if self.check_keyword(Keyword::Program) {
                self.advance();
            }
            if self.check_identifier() {
                self.advance();
            }
            self.skip_if(TokenKind::Period);
        }

        let end = self.previous_span();

        Ok(Program {
            identification,
            environment,
            data,
            procedure,
            comments: Vec::new(),
            span: start.extend(end),
        })
    }
}

// ---- Macro-generated dispatch ----------------------------------------------
// Statement dispatch comes from `for_parse_dispatch!` in `macros.rs`. To add
// a statement, add one line there and write the parse method under this
// directory.

macro_rules! gen_parse_dispatch {
    ( $($kw:ident => $parse_fn:ident),* $(,)? ) => {
        impl Parser {
            pub(super) fn parse_statement(&mut self) -> Result<Statement> {
                $(
                    if self.check_keyword(Keyword::$kw) {
                        return self.$parse_fn();
                    }
                )*
                self.parse_unknown_statement()
            }
        }
    };
}
for_parse_dispatch!(gen_parse_dispatch);

// `is_statement_start` is generated from the same table so the two can
// never drift apart.
macro_rules! gen_is_statement_start {
    ( $($kw:ident => $parse_fn:ident),* $(,)? ) => {
        impl Parser {
            pub(super) fn is_statement_start(&self) -> bool {
                $(self.check_keyword(Keyword::$kw) ||)*
                self.is_scope_terminator()
            }
        }
    };
}
for_parse_dispatch!(gen_is_statement_start);

impl Parser {
    /// A statement outside the deterministic grammar. The verb and the
    /// token text up to the statement boundary are preserved verbatim.
    fn parse_unknown_statement(&mut self) -> Result<Statement> {
        let start = self.current_span();
        let verb = match &self.current().kind {
            TokenKind::Keyword(kw) => kw.as_str().to_string(),
            TokenKind::Identifier(s) => s.clone(),
            other => format!("{:?}", other),
        };

        let mut text = verb.clone();
        self.advance();
        while !self.check(TokenKind::Period)
            && !self.is_at_end()
            && !self.is_statement_start()
            && !self.is_scope_terminator()
        {
            let token = self.advance();
            text.push(' ');
            match &token.kind {
                TokenKind::Keyword(kw) => text.push_str(kw.as_str()),
                TokenKind::Identifier(s) => text.push_str(s),
                TokenKind::IntegerLiteral(n) => text.push_str(&n.to_string()),
                TokenKind::DecimalLiteral(s) => text.push_str(s),
                TokenKind::StringLiteral(s) => {
                    text.push('"');
                    text.push_str(s);
                    text.push('"');
                }
                other => text.push_str(&format!("{:?}", other)),
            }
        }

        let span = start.extend(self.previous_span());
        Ok(Statement::Unknown(UnknownStatement { verb, text, span }))
    }
}

// ============================================================================
// Utility functions
// ============================================================================

impl Parser {
    pub(super) fn current(&self) -> &Token {
        // The stream always carries a trailing Eof token.
        self.tokens
            .get(self.current)
            .unwrap_or_else(|| &self.tokens[self.tokens.len() - 1])
    }

    pub(super) fn current_span(&self) -> Span {
        self.current().span
    }

    pub(super) fn previous_span(&self) -> Span {
        if self.current > 0 {
            self.tokens[self.current - 1].span
        } else {
            self.current_span()
        }
    }

    pub(super) fn is_at_end(&self) -> bool {
        self.current().kind == TokenKind::Eof
    }

    pub(super) fn advance(&mut self) -> &Token {
        if !self.is_at_end() {
            self.current += 1;
        }
        &self.tokens[self.current - 1]
    }

    pub(super) fn check(&self, kind: TokenKind) -> bool {
        std::mem::discriminant(&self.current().kind) == std::mem::discriminant(&kind)
    }

    pub(super) fn check_keyword(&self, kw: Keyword) -> bool {
        matches!(&self.current().kind, TokenKind::Keyword(k) if *k == kw)
    }

    pub(super) fn peek_keyword(&self, kw: Keyword) -> bool {
        if self.current + 1 < self.tokens.len() {
            matches!(&self.tokens[self.current + 1].kind, TokenKind::Keyword(k) if *k == kw)
        } else {
            false
        }
    }

    pub(super) fn peek(&self, kind: TokenKind) -> bool {
        if self.current + 1 < self.tokens.len() {
            std::mem::discriminant(&self.tokens[self.current + 1].kind)
                == std::mem::discriminant(&kind)
        } else {
            false
        }
    }

    pub(super) fn check_identifier(&self) -> bool {
        matches!(&self.current().kind, TokenKind::Identifier(_))
    }

    pub(super) fn check_literal(&self) -> bool {
        matches!(
            &self.current().kind,
            TokenKind::IntegerLiteral(_)
                | TokenKind::DecimalLiteral(_)
                | TokenKind::StringLiteral(_)
        )
    }

    pub(super) fn check_figurative_constant(&self) -> bool {
        self.check_keyword(Keyword::Zero)
            || self.check_keyword(Keyword::Zeros)
            || self.check_keyword(Keyword::Zeroes)
            || self.check_keyword(Keyword::Space)
            || self.check_keyword(Keyword::Spaces)
            || self.check_keyword(Keyword::HighValue)
            || self.check_keyword(Keyword::HighValues)
            || self.check_keyword(Keyword::LowValue)
            || self.check_keyword(Keyword::LowValues)
            || self.check_keyword(Keyword::Quote)
            || self.check_keyword(Keyword::Quotes)
    }

    pub(super) fn check_level_number(&self) -> bool {
        if let TokenKind::IntegerLiteral(n) = &self.current().kind {
            let n = *n;
            (1..=49).contains(&n) || n == 66 || n == 77 || n == 88
        } else {
            false
        }
    }

    pub(super) fn expect(&mut self, kind: TokenKind) -> Result<()> {
        if self.check(kind.clone()) {
            self.advance();
            Ok(())
        } else {
            Err(CobolError::parse(
                format!("expected {:?}, found {:?}", kind, self.current().kind),
                self.current_span(),
            ))
        }
    }

    pub(super) fn expect_keyword(&mut self, kw: Keyword) -> Result<()> {
        if self.check_keyword(kw) {
            self.advance();
            Ok(())
        } else {
            Err(CobolError::parse(
                format!("expected {}, found {:?}", kw.as_str(), self.current().kind),
                self.current_span(),
            ))
        }
    }

    /// Accept a user word. COBOL lets most reserved words double as data
    /// and paragraph names, so keywords are accepted here too.
    pub(super) fn expect_identifier(&mut self) -> Result<String> {
        match &self.current().kind {
            TokenKind::Identifier(s) => {
                let s = s.clone();
                self.advance();
                Ok(s)
            }
            TokenKind::Keyword(kw) => {
                let s = kw.as_str().to_string();
                self.advance();
                Ok(s)
            }
            _ => Err(CobolError::parse(
                format!("expected identifier, found {:?}", self.current().kind),
                self.current_span(),
            )),
        }
    }

    pub(super) fn expect_identifier_or_string(&mut self) -> Result<String> {
        if let TokenKind::StringLiteral(s) = &self.current().kind {
            let s = s.clone();
            self.advance();
            return Ok(s);
        }
        self.expect_identifier()
    }

    pub(super) fn expect_integer(&mut self) -> Result<i64> {
        if let TokenKind::IntegerLiteral(n) = &self.current().kind {
            let n = *n;
            self.advance();
            Ok(n)
        } else {
            Err(CobolError::parse(
                format!("expected integer, found {:?}", self.current().kind),
                self.current_span(),
            ))
        }
    }

    pub(super) fn expect_level_number(&mut self) -> Result<u8> {
        if let TokenKind::IntegerLiteral(n) = &self.current().kind {
            let n = *n;
            if (1..=49).contains(&n) || n == 66 || n == 77 || n == 88 {
                self.advance();
                return Ok(n as u8);
            }
            return Err(CobolError::parse(
                format!("invalid level number {}", n),
                self.current_span(),
            ));
        }
        Err(CobolError::parse(
            format!("expected level number, found {:?}", self.current().kind),
            self.current_span(),
        ))
    }

    pub(super) fn skip_if(&mut self, kind: TokenKind) {
        if self.check(kind) {
            self.advance();
        }
    }

    pub(super) fn is_at_division_start(&self) -> bool {
        self.check_keyword(Keyword::Identification)
            || self.check_keyword(Keyword::Environment)
            || self.check_keyword(Keyword::Data)
            || self.check_keyword(Keyword::Procedure)
    }

    pub(super) fn is_at_section_start(&self) -> bool {
        (self.check_keyword(Keyword::Configuration)
            || self.check_keyword(Keyword::InputOutput)
            || self.check_keyword(Keyword::File)
            || self.check_keyword(Keyword::WorkingStorage)
            || self.check_keyword(Keyword::LocalStorage)
            || self.check_keyword(Keyword::Linkage))
            && self.peek_keyword(Keyword::Section)
    }

    pub(super) fn is_scope_terminator(&self) -> bool {
        self.check_keyword(Keyword::Else)
            || self.check_keyword(Keyword::EndIf)
            || self.check_keyword(Keyword::EndEvaluate)
            || self.check_keyword(Keyword::EndPerform)
            || self.check_keyword(Keyword::EndRead)
            || self.check_keyword(Keyword::EndWrite)
            || self.check_keyword(Keyword::EndCompute)
            || self.check_keyword(Keyword::EndAdd)
            || self.check_keyword(Keyword::EndSubtract)
            || self.check_keyword(Keyword::EndMultiply)
            || self.check_keyword(Keyword::EndDivide)
            || self.check_keyword(Keyword::EndCall)
            || self.check_keyword(Keyword::When)
            || self.check_keyword(Keyword::Other)
    }

    /// Collect raw text until the next period, consuming it.
    pub(super) fn consume_until_period(&mut self) -> String {
        let mut result = String::new();
        while !self.check(TokenKind::Period) && !self.is_at_end() {
            match &self.current().kind {
                TokenKind::Identifier(s) => result.push_str(s),
                TokenKind::StringLiteral(s) => result.push_str(s),
                TokenKind::IntegerLiteral(n) => result.push_str(&n.to_string()),
                TokenKind::DecimalLiteral(s) => result.push_str(s),
                TokenKind::Keyword(kw) => result.push_str(kw.as_str()),
                _ => {}
            }
            result.push(' ');
            self.advance();
        }
        self.skip_if(TokenKind::Period);
        result.trim().to_string()
    }

    /// Skip to just past the next period.
    pub(super) fn advance_to_next_sentence(&mut self) {
        while !self.check(TokenKind::Period) && !self.is_at_end() {
            self.advance();
        }
        self.skip_if(TokenKind::Period);
    }

    /// Recovery point after a statement error: skip forward until the
    /// token stream is positioned at a paragraph header (an identifier
    /// followed by a period at the start of a sentence), a new division,
    /// or end of input. The abandoned paragraph keeps whatever statements
    /// parsed before the error.
    pub(super) fn advance_to_next_paragraph(&mut self) {
        loop {
            self.advance_to_next_sentence();
            if self.is_at_end() || self.is_at_division_start() {
                return;
            }
            if self.at_paragraph_header() {
                return;
            }
        }
    }

    /// Whether the cursor sits on `identifier .`, i.e. a paragraph header.
    pub(super) fn at_paragraph_header(&self) -> bool {
        self.check_identifier() && self.peek(TokenKind::Period)
    }

    pub(super) fn push_error(&mut self, error: CobolError) {
        self.errors.push(error);
    }
}

/// Parse a program from tokens.
pub fn parse(tokens: Vec<Token>) -> (Option<Program>, Vec<CobolError>) {
    Parser::new(tokens).parse_program()
}

/// Scan and parse a source file, attaching retained comment lines.
pub fn parse_source(source: &SourceFile) -> (Option<Program>, Vec<CobolError>) {
    let (tokens, mut errors) = scan(source);
    let (program, parse_errors) = parse(tokens);
    errors.extend(parse_errors);

    let program = program.map(|mut p| {
        p.comments = source
            .comment_lines()
            .into_iter()
            .map(|(text, span)| Comment { text, span })
            .collect();
        p
    });

    (program, errors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::{FileId, SourceFormat};

    fn parse_text(text: &str) -> (Option<Program>, Vec<CobolError>) {
        let source = SourceFile::from_text(FileId::MAIN, text.to_string(), SourceFormat::Free);
        parse_source(&source)
    }

    #[test]
    fn minimal_program() {
        let text = r#"
            IDENTIFICATION DIVISION.
            PROGRAM-ID. HELLO.
            PROCEDURE DIVISION.
                DISPLAY "HELLO, WORLD!".
                STOP RUN.
        "#;

        let (program, errors) = parse_text(text);
        assert!(errors.is_empty(), "errors: {:?}", errors);
        let program = program.unwrap();
        assert_eq!(program.name(), "HELLO");
        assert!(program.procedure.is_some());
    }

    #[test]
    fn working_storage_items() {
        let text = r#"
            IDENTIFICATION DIVISION.
            PROGRAM-ID. WSTEST.
            DATA DIVISION.
            WORKING-STORAGE SECTION.
            01 WS-NAME PIC X(20).
            01 WS-COUNT PIC 9(5) VALUE ZERO.
            PROCEDURE DIVISION.
                STOP RUN.
        "#;

        let (program, errors) = parse_text(text);
        assert!(errors.is_empty(), "errors: {:?}", errors);
        let data = program.unwrap().data.unwrap();
        assert_eq!(data.working_storage.len(), 2);
        assert_eq!(data.working_storage[0].name.as_str(), "WS-NAME");
    }

    #[test]
    fn paragraphs_are_split() {
        let text = r#"
            IDENTIFICATION DIVISION.
            PROGRAM-ID. PARAS.
            PROCEDURE DIVISION.
            FIRST-PARA.
                DISPLAY "ONE".
            SECOND-PARA.
                DISPLAY "TWO".
                STOP RUN.
        "#;

        let (program, errors) = parse_text(text);
        assert!(errors.is_empty(), "errors: {:?}", errors);
        let procedure = program.unwrap().procedure.unwrap();
        let paragraphs = procedure.paragraphs();
        assert_eq!(paragraphs.len(), 2);
        assert_eq!(paragraphs[0].name, "FIRST-PARA");
        assert_eq!(paragraphs[1].name, "SECOND-PARA");
    }

    #[test]
    fn error_recovery_resumes_at_next_paragraph() {
        let text = r#"
            IDENTIFICATION DIVISION.
            PROGRAM-ID. RECOVER.
            PROCEDURE DIVISION.
            BAD-PARA.
                MOVE TO .
            GOOD-PARA.
                DISPLAY "STILL HERE".
                STOP RUN.
        "#;

        let (program, errors) = parse_text(text);
        assert!(!errors.is_empty());
        let procedure = program.unwrap().procedure.unwrap();
        let paragraphs = procedure.paragraphs();
        let names: Vec<_> = paragraphs.iter().map(|p| p.name.as_str()).collect();
        assert!(names.contains(&"GOOD-PARA"), "paragraphs: {:?}", names);
        // The recovered paragraph parsed its statements.
        let good = paragraphs.iter().find(|p| p.name == "GOOD-PARA").unwrap();
        assert_eq!(good.statements.len(), 2);
    }

    #[test]
    fn comments_are_attached() {
        let text = "000100* PAYROLL CALCULATION\n\
                    000200 IDENTIFICATION DIVISION.\n\
                    000300 PROGRAM-ID. CMT.\n\
                    000400 PROCEDURE DIVISION.\n\
                    000500     STOP RUN.\n";
        let source = SourceFile::from_text(FileId::MAIN, text.to_string(), SourceFormat::Fixed);
        let (program, errors) = parse_source(&source);
        assert!(errors.is_empty(), "errors: {:?}", errors);
        let program = program.unwrap();
        assert_eq!(program.comments.len(), 1);
        assert!(program.comments[0].text.contains("PAYROLL"));
    }

    #[test]
    fn unknown_statement_is_preserved() {
        let text = r#"
            IDENTIFICATION DIVISION.
            PROGRAM-ID. UNK.
            PROCEDURE DIVISION.
                INSPECT WS-X TALLYING WS-N.
                STOP RUN.
        "#;

        let (program, errors) = parse_text(text);
        assert!(errors.is_empty(), "errors: {:?}", errors);
        let procedure = program.unwrap().procedure.unwrap();
        match &procedure.body {
            ProcedureBody::Statements(stmts) => {
                assert!(matches!(&stmts[0], Statement::Unknown(u) if u.verb == "INSPECT"));
            }
            other => panic!("unexpected body: {:?}", other),
        }
    }
}
