//! PROCEDURE DIVISION parsing: sections, paragraphs, and statements.
//!
//! Statement dispatch is generated from the table in `macros.rs`; the
//! `parse_*_statement` methods here do the per-verb work. A statement the
//! grammar does not cover falls through to `parse_unknown_statement`, which
//! keeps the raw text for downstream analysis.

use super::Result;
use crate::ast::*;
use crate::lexer::{Keyword, TokenKind};

impl super::Parser {
    pub(super) fn parse_procedure_division(&mut self) -> Result<ProcedureDivision> {
        let start = self.current_span();
        self.expect_keyword(Keyword::Procedure)?;
        self.expect_keyword(Keyword::Division)?;

        let mut using = Vec::new();
        if self.check_keyword(Keyword::Using) {
            self.advance();
            while self.check_identifier() {
                using.push(self.expect_identifier()?);
                self.skip_if(TokenKind::Comma);
            }
        }
        self.expect(TokenKind::Period)?;

        let body = self.parse_procedure_body();

        Ok(ProcedureDivision {
            using,
            body,
            span: start.extend(self.previous_span()),
        })
    }

    /// The body shape is decided by the first header encountered. A body
    /// that opens with bare statements but later grows paragraph headers
    /// folds the leading statements into a synthetic entry paragraph.
    fn parse_procedure_body(&mut self) -> ProcedureBody {
        if self.at_section_header() {
            return ProcedureBody::Sections(self.parse_sections());
        }

        let start = self.current_span();
        let leading = if self.at_paragraph_header() {
            Vec::new()
        } else {
            self.parse_paragraph_statements()
        };

        if !self.at_paragraph_header() && !self.at_section_header() {
            return ProcedureBody::Statements(leading);
        }

        let mut paragraphs = Vec::new();
        if !leading.is_empty() {
            paragraphs.push(Paragraph {
                name: "$ENTRY".to_string(),
                statements: leading,
                span: start.extend(self.previous_span()),
            });
        }
        paragraphs.extend(self.parse_paragraph_list());
        ProcedureBody::Paragraphs(paragraphs)
    }

    fn at_section_header(&self) -> bool {
        self.check_identifier() && self.peek_keyword(Keyword::Section)
    }

    fn parse_sections(&mut self) -> Vec<Section> {
        let mut sections = Vec::new();
        while self.at_section_header() {
            let start = self.current_span();
            let name = match self.expect_identifier() {
                Ok(name) => name,
                Err(e) => {
                    self.push_error(e);
                    self.advance_to_next_paragraph();
                    continue;
                }
            };
            self.advance(); // SECTION
            self.skip_if(TokenKind::Period);

            let mut paragraphs = Vec::new();

            // Statements ahead of the first paragraph header belong to the
            // section itself; they run under the section's own name.
            let body_start = self.current_span();
            let leading = self.parse_paragraph_statements();
            if !leading.is_empty() {
                paragraphs.push(Paragraph {
                    name: name.clone(),
                    statements: leading,
                    span: body_start.extend(self.previous_span()),
                });
            }

            while self.at_paragraph_header() && !self.at_section_header() {
                paragraphs.push(self.parse_paragraph());
            }

            sections.push(Section {
                name,
                paragraphs,
                span: start.extend(self.previous_span()),
            });
        }
        sections
    }

    fn parse_paragraph_list(&mut self) -> Vec<Paragraph> {
        let mut paragraphs = Vec::new();
        loop {
            if self.at_section_header() {
                // A paragraph-shaped body that later declares a section:
                // keep flow intact by treating the section header as a
                // paragraph header.
                let start = self.current_span();
                let name = match self.expect_identifier() {
                    Ok(name) => name,
                    Err(e) => {
                        self.push_error(e);
                        self.advance_to_next_paragraph();
                        continue;
                    }
                };
                self.advance(); // SECTION
                self.skip_if(TokenKind::Period);
                let statements = self.parse_paragraph_statements();
                paragraphs.push(Paragraph {
                    name,
                    statements,
                    span: start.extend(self.previous_span()),
                });
                continue;
            }
            if !self.at_paragraph_header() {
                break;
            }
            paragraphs.push(self.parse_paragraph());
        }
        paragraphs
    }

    fn parse_paragraph(&mut self) -> Paragraph {
        let start = self.current_span();
        // at_paragraph_header guarantees identifier + period here.
        let name = match self.expect_identifier() {
            Ok(name) => name,
            Err(_) => String::new(),
        };
        self.skip_if(TokenKind::Period);
        let statements = self.parse_paragraph_statements();
        Paragraph {
            name,
            statements,
            span: start.extend(self.previous_span()),
        }
    }

    /// Sentences until the next paragraph, section, or division. A syntax
    /// error abandons the rest of the paragraph and resynchronizes at the
    /// next paragraph header.
    fn parse_paragraph_statements(&mut self) -> Vec<Statement> {
        let mut statements = Vec::new();
        loop {
            if self.is_at_end()
                || self.is_at_division_start()
                || self.check_keyword(Keyword::EndProgram)
                || self.at_section_header()
                || self.at_paragraph_header()
            {
                break;
            }
            if self.check(TokenKind::Period) {
                self.advance();
                continue;
            }
            match self.parse_statement() {
                Ok(stmt) => {
                    statements.push(stmt);
                    self.skip_if(TokenKind::Period);
                }
                Err(e) => {
                    self.push_error(e);
                    self.advance_to_next_paragraph();
                    break;
                }
            }
        }
        statements
    }

    // ========================================================================
    // Shared pieces
    // ========================================================================

    /// Imperative statements inside a conditional phrase. Stops at the
    /// sentence period, a scope terminator, or the opener of the next
    /// conditional phrase (NOT / AT / INVALID / [ON] SIZE ERROR).
    fn parse_statement_block(&mut self) -> Result<Vec<Statement>> {
        let mut statements = Vec::new();
        loop {
            if self.check(TokenKind::Period)
                || self.is_at_end()
                || self.is_scope_terminator()
                || self.at_handler_boundary()
            {
                break;
            }
            statements.push(self.parse_statement()?);
        }
        Ok(statements)
    }

    fn at_handler_boundary(&self) -> bool {
        if self.check_keyword(Keyword::Not) {
            return self.peek_keyword(Keyword::At)
                || self.peek_keyword(Keyword::End)
                || self.peek_keyword(Keyword::Invalid)
                || self.peek_keyword(Keyword::On)
                || self.peek_keyword(Keyword::Size);
        }
        self.check_keyword(Keyword::At)
            || self.check_keyword(Keyword::Invalid)
            || (self.check_keyword(Keyword::On) && self.peek_keyword(Keyword::Size))
            || (self.check_keyword(Keyword::Size) && self.peek_keyword(Keyword::Error))
    }

    fn at_expression_start(&self) -> bool {
        self.check_literal()
            || self.check_figurative_constant()
            || self.check_identifier()
            || self.check(TokenKind::Lparen)
            || self.check(TokenKind::Minus)
            || self.check(TokenKind::Plus)
    }

    /// Receiving operands, each with an optional ROUNDED.
    fn parse_rounded_targets(&mut self) -> Result<Vec<ComputeTarget>> {
        let mut targets = Vec::new();
        loop {
            let name = self.parse_qualified_name()?;
            let rounded = if self.check_keyword(Keyword::Rounded) {
                self.advance();
                true
            } else {
                false
            };
            targets.push(ComputeTarget { name, rounded });
            self.skip_if(TokenKind::Comma);
            if !self.check_identifier() {
                break;
            }
        }
        Ok(targets)
    }

    /// `[ON] SIZE ERROR` and `NOT [ON] SIZE ERROR` phrases.
    fn parse_size_error_clauses(
        &mut self,
    ) -> Result<(Option<Vec<Statement>>, Option<Vec<Statement>>)> {
        let mut on_size_error = None;
        let mut not_on_size_error = None;

        if (self.check_keyword(Keyword::On) && self.peek_keyword(Keyword::Size))
            || self.check_keyword(Keyword::Size)
        {
            if self.check_keyword(Keyword::On) {
                self.advance();
            }
            self.expect_keyword(Keyword::Size)?;
            self.expect_keyword(Keyword::Error)?;
            on_size_error = Some(self.parse_statement_block()?);
        }

        if self.check_keyword(Keyword::Not)
            && (self.peek_keyword(Keyword::On) || self.peek_keyword(Keyword::Size))
        {
            self.advance();
            if self.check_keyword(Keyword::On) {
                self.advance();
            }
            self.expect_keyword(Keyword::Size)?;
            self.expect_keyword(Keyword::Error)?;
            not_on_size_error = Some(self.parse_statement_block()?);
        }

        Ok((on_size_error, not_on_size_error))
    }

    // ========================================================================
    // Statements
    // ========================================================================

    pub(super) fn parse_move_statement(&mut self) -> Result<Statement> {
        let start = self.current_span();
        self.advance(); // MOVE
        let value = self.parse_expression()?;
        self.expect_keyword(Keyword::To)?;

        let mut targets = Vec::new();
        loop {
            targets.push(self.parse_qualified_name()?);
            self.skip_if(TokenKind::Comma);
            if !self.check_identifier() {
                break;
            }
        }

        Ok(Statement::Move(MoveStatement {
            value,
            targets,
            span: start.extend(self.previous_span()),
        }))
    }

    pub(super) fn parse_compute_statement(&mut self) -> Result<Statement> {
        let start = self.current_span();
        self.advance(); // COMPUTE
        let targets = self.parse_rounded_targets()?;
        self.expect(TokenKind::Equals)?;
        let expression = self.parse_expression()?;
        let (on_size_error, not_on_size_error) = self.parse_size_error_clauses()?;
        self.skip_if(TokenKind::Keyword(Keyword::EndCompute));

        Ok(Statement::Compute(ComputeStatement {
            targets,
            expression,
            on_size_error,
            not_on_size_error,
            span: start.extend(self.previous_span()),
        }))
    }

    pub(super) fn parse_add_statement(&mut self) -> Result<Statement> {
        let start = self.current_span();
        self.advance(); // ADD

        let mut operands = Vec::new();
        loop {
            operands.push(self.parse_expression()?);
            self.skip_if(TokenKind::Comma);
            if self.check_keyword(Keyword::To)
                || self.check_keyword(Keyword::Giving)
                || !self.at_expression_start()
            {
                break;
            }
        }

        let mut to = Vec::new();
        if self.check_keyword(Keyword::To) {
            self.advance();
            to = self.parse_rounded_targets()?;
        }
        let mut giving = Vec::new();
        if self.check_keyword(Keyword::Giving) {
            self.advance();
            giving = self.parse_rounded_targets()?;
        }
        let (on_size_error, not_on_size_error) = self.parse_size_error_clauses()?;
        self.skip_if(TokenKind::Keyword(Keyword::EndAdd));

        Ok(Statement::Add(AddStatement {
            operands,
            to,
            giving,
            on_size_error,
            not_on_size_error,
            span: start.extend(self.previous_span()),
        }))
    }

    pub(super) fn parse_subtract_statement(&mut self) -> Result<Statement> {
        let start = self.current_span();
        self.advance(); // SUBTRACT

        let mut operands = Vec::new();
        loop {
            operands.push(self.parse_expression()?);
            self.skip_if(TokenKind::Comma);
            if self.check_keyword(Keyword::From) || !self.at_expression_start() {
                break;
            }
        }
        self.expect_keyword(Keyword::From)?;
        let from = self.parse_rounded_targets()?;

        let mut giving = Vec::new();
        if self.check_keyword(Keyword::Giving) {
            self.advance();
            giving = self.parse_rounded_targets()?;
        }
        let (on_size_error, not_on_size_error) = self.parse_size_error_clauses()?;
        self.skip_if(TokenKind::Keyword(Keyword::EndSubtract));

        Ok(Statement::Subtract(SubtractStatement {
            operands,
            from,
            giving,
            on_size_error,
            not_on_size_error,
            span: start.extend(self.previous_span()),
        }))
    }

    pub(super) fn parse_multiply_statement(&mut self) -> Result<Statement> {
        let start = self.current_span();
        self.advance(); // MULTIPLY
        let operand = self.parse_expression()?;
        self.expect_keyword(Keyword::By)?;
        let by = self.parse_rounded_targets()?;

        let mut giving = Vec::new();
        if self.check_keyword(Keyword::Giving) {
            self.advance();
            giving = self.parse_rounded_targets()?;
        }
        let (on_size_error, not_on_size_error) = self.parse_size_error_clauses()?;
        self.skip_if(TokenKind::Keyword(Keyword::EndMultiply));

        Ok(Statement::Multiply(MultiplyStatement {
            operand,
            by,
            giving,
            on_size_error,
            not_on_size_error,
            span: start.extend(self.previous_span()),
        }))
    }

    pub(super) fn parse_divide_statement(&mut self) -> Result<Statement> {
        let start = self.current_span();
        self.advance(); // DIVIDE
        let operand = self.parse_expression()?;

        let mut into = Vec::new();
        let mut by = None;
        let mut giving = Vec::new();
        if self.check_keyword(Keyword::Into) {
            self.advance();
            into = self.parse_rounded_targets()?;
        } else {
            self.expect_keyword(Keyword::By)?;
            by = Some(self.parse_expression()?);
        }
        if self.check_keyword(Keyword::Giving) {
            self.advance();
            giving = self.parse_rounded_targets()?;
        }
        let mut remainder = None;
        if self.check_keyword(Keyword::Remainder) {
            self.advance();
            remainder = Some(self.parse_qualified_name()?);
        }
        let (on_size_error, not_on_size_error) = self.parse_size_error_clauses()?;
        self.skip_if(TokenKind::Keyword(Keyword::EndDivide));

        Ok(Statement::Divide(DivideStatement {
            operand,
            into,
            by,
            giving,
            remainder,
            on_size_error,
            not_on_size_error,
            span: start.extend(self.previous_span()),
        }))
    }

    pub(super) fn parse_if_statement(&mut self) -> Result<Statement> {
        let start = self.current_span();
        self.advance(); // IF
        let condition = self.parse_condition()?;
        self.skip_if(TokenKind::Keyword(Keyword::Then));

        let then_branch = self.parse_statement_block()?;

        let else_branch = if self.check_keyword(Keyword::Else) {
            self.advance();
            Some(self.parse_statement_block()?)
        } else {
            None
        };
        self.skip_if(TokenKind::Keyword(Keyword::EndIf));

        Ok(Statement::If(IfStatement {
            condition,
            then_branch,
            else_branch,
            span: start.extend(self.previous_span()),
        }))
    }

    pub(super) fn parse_evaluate_statement(&mut self) -> Result<Statement> {
        let start = self.current_span();
        self.advance(); // EVALUATE

        let subject = if self.check_keyword(Keyword::True) {
            self.advance();
            EvaluateSubject::True
        } else if self.check_keyword(Keyword::False) {
            self.advance();
            EvaluateSubject::False
        } else {
            EvaluateSubject::Expression(self.parse_expression()?)
        };

        let mut branches = Vec::new();
        let mut other = None;
        while self.check_keyword(Keyword::When) {
            if self.peek_keyword(Keyword::Other) {
                self.advance();
                self.advance();
                other = Some(self.parse_statement_block()?);
                break;
            }

            let branch_start = self.current_span();
            let mut objects = Vec::new();
            // Consecutive WHEN phrases with no statements between them
            // share the following block as alternatives.
            while self.check_keyword(Keyword::When) && !self.peek_keyword(Keyword::Other) {
                self.advance();
                loop {
                    objects.push(self.parse_when_object()?);
                    if self.check_keyword(Keyword::Also) {
                        self.advance();
                        continue;
                    }
                    break;
                }
            }
            let statements = self.parse_statement_block()?;
            branches.push(WhenBranch {
                objects,
                statements,
                span: branch_start.extend(self.previous_span()),
            });
        }
        self.skip_if(TokenKind::Keyword(Keyword::EndEvaluate));

        Ok(Statement::Evaluate(EvaluateStatement {
            subject,
            branches,
            other,
            span: start.extend(self.previous_span()),
        }))
    }

    fn parse_when_object(&mut self) -> Result<WhenObject> {
        if self.check_keyword(Keyword::Any) {
            self.advance();
            return Ok(WhenObject::Any);
        }
        // A bare literal or data-name reads as a value to compare the
        // subject with; anything relational reads as a condition.
        if self.check_literal()
            || self.check_figurative_constant()
            || self.check(TokenKind::Minus)
        {
            let saved = self.position();
            let expr = self.parse_expression()?;
            if !self.at_comparison_operator() {
                return Ok(WhenObject::Value(expr));
            }
            self.rewind(saved);
        }
        match self.parse_condition()? {
            Condition::ConditionName(name) => Ok(WhenObject::Value(Expression::Variable(name))),
            condition => Ok(WhenObject::Condition(condition)),
        }
    }

    fn at_comparison_operator(&self) -> bool {
        self.check(TokenKind::Equals)
            || self.check(TokenKind::Greater)
            || self.check(TokenKind::GreaterEqual)
            || self.check(TokenKind::Less)
            || self.check(TokenKind::LessEqual)
            || self.check_keyword(Keyword::Is)
            || self.check_keyword(Keyword::Not)
            || self.check_keyword(Keyword::Equal)
            || self.check_keyword(Keyword::Greater)
            || self.check_keyword(Keyword::Less)
    }

    pub(super) fn parse_perform_statement(&mut self) -> Result<Statement> {
        let start = self.current_span();
        self.advance(); // PERFORM

        let mut target = None;
        let mut thru = None;
        // An identifier directly followed by TIMES is a repeat count, not
        // a paragraph name.
        if self.check_identifier() && !self.peek_keyword(Keyword::Times) {
            target = Some(self.expect_identifier()?);
            if self.check_keyword(Keyword::Thru) || self.check_keyword(Keyword::Through) {
                self.advance();
                thru = Some(self.expect_identifier()?);
            }
        }

        let mut test_after = false;
        if self.check_keyword(Keyword::With) || self.check_keyword(Keyword::Test) {
            if self.check_keyword(Keyword::With) {
                self.advance();
            }
            self.expect_keyword(Keyword::Test)?;
            if self.check_keyword(Keyword::After) {
                self.advance();
                test_after = true;
            } else {
                self.expect_keyword(Keyword::Before)?;
            }
        }

        let mut times = None;
        let mut until = None;
        let mut varying = None;
        if self.check_keyword(Keyword::Until) {
            self.advance();
            until = Some(self.parse_condition()?);
        } else if self.check_keyword(Keyword::Varying) {
            self.advance();
            let variable = self.parse_qualified_name()?;
            self.expect_keyword(Keyword::From)?;
            let from = self.parse_expression()?;
            self.expect_keyword(Keyword::By)?;
            let by = self.parse_expression()?;
            self.expect_keyword(Keyword::Until)?;
            let loop_until = self.parse_condition()?;
            varying = Some(VaryingClause {
                variable,
                from,
                by,
                until: loop_until,
            });
        } else if self.at_expression_start() {
            let count = self.parse_expression()?;
            self.expect_keyword(Keyword::Times)?;
            times = Some(count);
        }

        let inline = if target.is_none() {
            let body = self.parse_inline_perform_body()?;
            self.expect_keyword(Keyword::EndPerform)?;
            Some(body)
        } else {
            None
        };

        Ok(Statement::Perform(PerformStatement {
            target,
            thru,
            inline,
            times,
            until,
            varying,
            test_after,
            span: start.extend(self.previous_span()),
        }))
    }

    /// Inline PERFORM bodies span sentences, so only END-PERFORM (or end
    /// of input) terminates them.
    fn parse_inline_perform_body(&mut self) -> Result<Vec<Statement>> {
        let mut statements = Vec::new();
        loop {
            if self.check_keyword(Keyword::EndPerform) || self.is_at_end() {
                break;
            }
            if self.check(TokenKind::Period) {
                self.advance();
                continue;
            }
            statements.push(self.parse_statement()?);
        }
        Ok(statements)
    }

    pub(super) fn parse_goto_statement(&mut self) -> Result<Statement> {
        let start = self.current_span();
        self.advance(); // GO
        self.skip_if(TokenKind::Keyword(Keyword::To));

        let mut targets = Vec::new();
        while self.check_identifier() {
            targets.push(self.expect_identifier()?);
            self.skip_if(TokenKind::Comma);
        }

        let mut depending_on = None;
        if self.check_keyword(Keyword::Depending) {
            self.advance();
            self.skip_if(TokenKind::Keyword(Keyword::On));
            depending_on = Some(self.parse_qualified_name()?);
        }

        Ok(Statement::GoTo(GoToStatement {
            targets,
            depending_on,
            span: start.extend(self.previous_span()),
        }))
    }

    pub(super) fn parse_goback_statement(&mut self) -> Result<Statement> {
        let span = self.current_span();
        self.advance(); // GOBACK
        Ok(Statement::GoBack(GoBackStatement { span }))
    }

    pub(super) fn parse_stop_statement(&mut self) -> Result<Statement> {
        let start = self.current_span();
        self.advance(); // STOP
        self.expect_keyword(Keyword::Run)?;
        Ok(Statement::StopRun(StopRunStatement {
            span: start.extend(self.previous_span()),
        }))
    }

    pub(super) fn parse_exit_statement(&mut self) -> Result<Statement> {
        let start = self.current_span();
        self.advance(); // EXIT
        let program = if self.check_keyword(Keyword::Program) {
            self.advance();
            true
        } else {
            false
        };
        Ok(Statement::Exit(ExitStatement {
            program,
            span: start.extend(self.previous_span()),
        }))
    }

    pub(super) fn parse_continue_statement(&mut self) -> Result<Statement> {
        let span = self.current_span();
        self.advance(); // CONTINUE
        Ok(Statement::Continue(ContinueStatement { span }))
    }

    pub(super) fn parse_display_statement(&mut self) -> Result<Statement> {
        let start = self.current_span();
        self.advance(); // DISPLAY

        let mut operands = Vec::new();
        while self.at_expression_start() && !self.check_keyword(Keyword::With) {
            operands.push(self.parse_expression()?);
            self.skip_if(TokenKind::Comma);
        }

        let mut no_advancing = false;
        if self.check_keyword(Keyword::With) || self.check_keyword(Keyword::NoAdvancing) {
            self.skip_if(TokenKind::Keyword(Keyword::With));
            if self.check_keyword(Keyword::NoAdvancing) {
                self.advance();
                self.expect_keyword(Keyword::Advancing)?;
                no_advancing = true;
            }
        }

        Ok(Statement::Display(DisplayStatement {
            operands,
            no_advancing,
            span: start.extend(self.previous_span()),
        }))
    }

    pub(super) fn parse_accept_statement(&mut self) -> Result<Statement> {
        let start = self.current_span();
        self.advance(); // ACCEPT
        let target = self.parse_qualified_name()?;
        // ACCEPT x FROM DATE and friends read from the environment; the
        // source mnemonic is not modeled.
        if self.check_keyword(Keyword::From) {
            self.advance();
            self.expect_identifier()?;
        }
        Ok(Statement::Accept(AcceptStatement {
            target,
            span: start.extend(self.previous_span()),
        }))
    }

    pub(super) fn parse_open_statement(&mut self) -> Result<Statement> {
        let start = self.current_span();
        self.advance(); // OPEN

        let mut files = Vec::new();
        loop {
            let mode = if self.check_keyword(Keyword::Input) {
                OpenMode::Input
            } else if self.check_keyword(Keyword::Output) {
                OpenMode::Output
            } else if self.check_keyword(Keyword::Io) {
                OpenMode::InputOutput
            } else if self.check_keyword(Keyword::Extend) {
                OpenMode::Extend
            } else {
                break;
            };
            self.advance();
            while self.check_identifier() {
                files.push((mode, self.expect_identifier()?));
                self.skip_if(TokenKind::Comma);
            }
        }
        if files.is_empty() {
            return Err(crate::error::CobolError::parse(
                "expected OPEN mode (INPUT, OUTPUT, I-O, EXTEND)",
                self.current_span(),
            ));
        }

        Ok(Statement::Open(OpenStatement {
            files,
            span: start.extend(self.previous_span()),
        }))
    }

    pub(super) fn parse_close_statement(&mut self) -> Result<Statement> {
        let start = self.current_span();
        self.advance(); // CLOSE
        let mut files = Vec::new();
        while self.check_identifier() {
            files.push(self.expect_identifier()?);
            self.skip_if(TokenKind::Comma);
        }
        Ok(Statement::Close(CloseStatement {
            files,
            span: start.extend(self.previous_span()),
        }))
    }

    pub(super) fn parse_read_statement(&mut self) -> Result<Statement> {
        let start = self.current_span();
        self.advance(); // READ
        let file = self.expect_identifier()?;
        self.skip_if(TokenKind::Keyword(Keyword::Next));
        self.skip_if(TokenKind::Keyword(Keyword::Record));

        let mut into = None;
        if self.check_keyword(Keyword::Into) {
            self.advance();
            into = Some(self.parse_qualified_name()?);
        }

        let mut at_end = None;
        let mut not_at_end = None;
        let mut invalid_key = None;
        let mut not_invalid_key = None;
        loop {
            if self.check_keyword(Keyword::At) && self.peek_keyword(Keyword::End) {
                self.advance();
                self.advance();
                at_end = Some(self.parse_statement_block()?);
            } else if self.check_keyword(Keyword::End) {
                self.advance();
                at_end = Some(self.parse_statement_block()?);
            } else if self.check_keyword(Keyword::Not)
                && (self.peek_keyword(Keyword::At) || self.peek_keyword(Keyword::End))
            {
                self.advance();
                self.skip_if(TokenKind::Keyword(Keyword::At));
                self.expect_keyword(Keyword::End)?;
                not_at_end = Some(self.parse_statement_block()?);
            } else if self.check_keyword(Keyword::Invalid) {
                self.advance();
                self.skip_if(TokenKind::Keyword(Keyword::Key));
                invalid_key = Some(self.parse_statement_block()?);
            } else if self.check_keyword(Keyword::Not) && self.peek_keyword(Keyword::Invalid) {
                self.advance();
                self.advance();
                self.skip_if(TokenKind::Keyword(Keyword::Key));
                not_invalid_key = Some(self.parse_statement_block()?);
            } else {
                break;
            }
        }
        self.skip_if(TokenKind::Keyword(Keyword::EndRead));

        Ok(Statement::Read(ReadStatement {
            file,
            into,
            at_end,
            not_at_end,
            invalid_key,
            not_invalid_key,
            span: start.extend(self.previous_span()),
        }))
    }

    pub(super) fn parse_write_statement(&mut self) -> Result<Statement> {
        let start = self.current_span();
        self.advance(); // WRITE
        let record = self.parse_qualified_name()?;

        let mut from = None;
        if self.check_keyword(Keyword::From) {
            self.advance();
            from = Some(self.parse_expression()?);
        }

        // BEFORE/AFTER ADVANCING controls line spacing on print files and
        // is not modeled; consume the phrase.
        if self.check_keyword(Keyword::Before) || self.check_keyword(Keyword::After) {
            self.advance();
            self.skip_if(TokenKind::Keyword(Keyword::Advancing));
            if self.at_expression_start() {
                self.parse_expression()?;
            }
            if self.check_identifier() {
                self.advance();
            }
        }
        self.skip_if(TokenKind::Keyword(Keyword::EndWrite));

        Ok(Statement::Write(WriteStatement {
            record,
            from,
            span: start.extend(self.previous_span()),
        }))
    }

    pub(super) fn parse_call_statement(&mut self) -> Result<Statement> {
        let start = self.current_span();
        self.advance(); // CALL
        let target = self.parse_expression()?;

        let mut using = Vec::new();
        if self.check_keyword(Keyword::Using) {
            self.advance();
            while self.check_identifier() {
                using.push(self.parse_qualified_name()?);
                self.skip_if(TokenKind::Comma);
            }
        }

        let mut returning = None;
        if self.check_keyword(Keyword::Returning) {
            self.advance();
            returning = Some(self.parse_qualified_name()?);
        }
        self.skip_if(TokenKind::Keyword(Keyword::EndCall));

        Ok(Statement::Call(CallStatement {
            target,
            using,
            returning,
            span: start.extend(self.previous_span()),
        }))
    }

    pub(super) fn parse_alter_statement(&mut self) -> Result<Statement> {
        let start = self.current_span();
        self.advance(); // ALTER
        let source = self.expect_identifier()?;
        self.expect_keyword(Keyword::To)?;
        if self.check_keyword(Keyword::Proceed) {
            self.advance();
            self.expect_keyword(Keyword::To)?;
        }
        let target = self.expect_identifier()?;

        Ok(Statement::Alter(AlterStatement {
            source,
            target,
            span: start.extend(self.previous_span()),
        }))
    }

    pub(super) fn parse_sort_statement(&mut self) -> Result<Statement> {
        let start = self.current_span();
        self.advance(); // SORT
        let (file, keys, using, giving) = self.parse_sort_merge_body()?;
        Ok(Statement::Sort(SortStatement {
            file,
            keys,
            using,
            giving,
            span: start.extend(self.previous_span()),
        }))
    }

    pub(super) fn parse_merge_statement(&mut self) -> Result<Statement> {
        let start = self.current_span();
        self.advance(); // MERGE
        let (file, keys, using, giving) = self.parse_sort_merge_body()?;
        Ok(Statement::Merge(MergeStatement {
            file,
            keys,
            using,
            giving,
            span: start.extend(self.previous_span()),
        }))
    }

    fn parse_sort_merge_body(
        &mut self,
    ) -> Result<(String, Vec<SortKey>, Vec<String>, Vec<String>)> {
        let file = self.expect_identifier()?;

        let mut keys = Vec::new();
        loop {
            self.skip_if(TokenKind::Keyword(Keyword::On));
            let descending = if self.check_keyword(Keyword::Ascending) {
                self.advance();
                false
            } else if self.check_keyword(Keyword::Descending) {
                self.advance();
                true
            } else {
                break;
            };
            self.skip_if(TokenKind::Keyword(Keyword::Key));
            while self.check_identifier() {
                let name = self.parse_qualified_name()?;
                keys.push(SortKey { name, descending });
                self.skip_if(TokenKind::Comma);
            }
        }

        let mut using = Vec::new();
        if self.check_keyword(Keyword::Using) {
            self.advance();
            while self.check_identifier() {
                using.push(self.expect_identifier()?);
                self.skip_if(TokenKind::Comma);
            }
        }
        let mut giving = Vec::new();
        if self.check_keyword(Keyword::Giving) {
            self.advance();
            while self.check_identifier() {
                giving.push(self.expect_identifier()?);
                self.skip_if(TokenKind::Comma);
            }
        }

        Ok((file, keys, using, giving))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::{FileId, SourceFile, SourceFormat};
    use crate::parser::parse_source;

    fn parse_procedure(body: &str) -> ProcedureDivision {
        let text = format!(
            "IDENTIFICATION DIVISION.\nPROGRAM-ID. T.\nPROCEDURE DIVISION.\n{}\n",
            body
        );
        let source = SourceFile::from_text(FileId::MAIN, text, SourceFormat::Free);
        let (program, errors) = parse_source(&source);
        assert!(errors.is_empty(), "errors: {:?}", errors);
        program.unwrap().procedure.unwrap()
    }

    fn first_statement(body: &str) -> Statement {
        let procedure = parse_procedure(body);
        match procedure.body {
            ProcedureBody::Statements(mut stmts) => stmts.remove(0),
            other => panic!("unexpected body: {:?}", other),
        }
    }

    #[test]
    fn move_to_multiple_targets() {
        let stmt = first_statement("MOVE ZERO TO WS-A WS-B.");
        match stmt {
            Statement::Move(m) => {
                assert_eq!(m.targets.len(), 2);
                assert_eq!(m.targets[1].name, "WS-B");
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn compute_with_rounded_and_size_error() {
        let stmt = first_statement(
            "COMPUTE WS-AVG ROUNDED = WS-SUM / WS-CNT\n\
             ON SIZE ERROR MOVE ZERO TO WS-AVG\n\
             END-COMPUTE.",
        );
        match stmt {
            Statement::Compute(c) => {
                assert!(c.targets[0].rounded);
                assert!(c.on_size_error.is_some());
                assert_eq!(c.on_size_error.as_ref().map(|b| b.len()), Some(1));
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn add_giving() {
        let stmt = first_statement("ADD WS-A WS-B GIVING WS-C.");
        match stmt {
            Statement::Add(a) => {
                assert_eq!(a.operands.len(), 2);
                assert!(a.to.is_empty());
                assert_eq!(a.giving.len(), 1);
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn divide_by_giving_remainder() {
        let stmt = first_statement("DIVIDE WS-A BY WS-B GIVING WS-Q REMAINDER WS-R.");
        match stmt {
            Statement::Divide(d) => {
                assert!(d.by.is_some());
                assert_eq!(d.giving.len(), 1);
                assert_eq!(d.remainder.as_ref().map(|r| r.name.as_str()), Some("WS-R"));
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn if_else_end_if() {
        let stmt = first_statement(
            "IF CHOICE = 1\n\
                 DISPLAY \"ONE\"\n\
             ELSE\n\
                 DISPLAY \"OTHER\"\n\
             END-IF.",
        );
        match stmt {
            Statement::If(i) => {
                assert_eq!(i.then_branch.len(), 1);
                assert_eq!(i.else_branch.as_ref().map(|b| b.len()), Some(1));
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn nested_if_terminated_by_period() {
        let stmt = first_statement(
            "IF WS-A > 1\n\
                 IF WS-B > 2\n\
                     DISPLAY \"BOTH\"\n\
                 END-IF\n\
                 DISPLAY \"OUTER\".",
        );
        match stmt {
            Statement::If(i) => {
                assert_eq!(i.then_branch.len(), 2);
                assert!(matches!(i.then_branch[0], Statement::If(_)));
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn evaluate_with_when_other() {
        let stmt = first_statement(
            "EVALUATE WS-CODE\n\
                 WHEN 1 DISPLAY \"ONE\"\n\
                 WHEN 2 WHEN 3 DISPLAY \"FEW\"\n\
                 WHEN OTHER DISPLAY \"MANY\"\n\
             END-EVALUATE.",
        );
        match stmt {
            Statement::Evaluate(e) => {
                assert_eq!(e.branches.len(), 2);
                assert_eq!(e.branches[1].objects.len(), 2);
                assert!(e.other.is_some());
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn evaluate_true_takes_conditions() {
        let stmt = first_statement(
            "EVALUATE TRUE\n\
                 WHEN WS-A > 10 DISPLAY \"BIG\"\n\
                 WHEN OTHER CONTINUE\n\
             END-EVALUATE.",
        );
        match stmt {
            Statement::Evaluate(e) => {
                assert_eq!(e.subject, EvaluateSubject::True);
                assert!(matches!(e.branches[0].objects[0], WhenObject::Condition(_)));
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn out_of_line_perform_until() {
        let stmt = first_statement("PERFORM READ-LOOP UNTIL MORE-DATA = \"NO\".");
        match stmt {
            Statement::Perform(p) => {
                assert_eq!(p.target.as_deref(), Some("READ-LOOP"));
                assert!(p.until.is_some());
                assert!(p.inline.is_none());
                assert!(!p.test_after);
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn perform_thru_with_test_after() {
        let stmt = first_statement(
            "PERFORM STEP-1 THRU STEP-3 WITH TEST AFTER UNTIL WS-DONE = 1.",
        );
        match stmt {
            Statement::Perform(p) => {
                assert_eq!(p.thru.as_deref(), Some("STEP-3"));
                assert!(p.test_after);
                assert!(p.until.is_some());
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn inline_perform_varying() {
        let stmt = first_statement(
            "PERFORM VARYING I FROM 1 BY 1 UNTIL I > 10\n\
                 DISPLAY I\n\
             END-PERFORM.",
        );
        match stmt {
            Statement::Perform(p) => {
                assert!(p.target.is_none());
                let varying = p.varying.as_ref().unwrap();
                assert_eq!(varying.variable.name, "I");
                assert_eq!(p.inline.as_ref().map(|b| b.len()), Some(1));
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn perform_n_times() {
        let stmt = first_statement("PERFORM INIT-ROW 5 TIMES.");
        match stmt {
            Statement::Perform(p) => {
                assert_eq!(p.target.as_deref(), Some("INIT-ROW"));
                assert!(matches!(
                    p.times,
                    Some(Expression::Literal(Literal {
                        kind: LiteralKind::Integer(5),
                        ..
                    }))
                ));
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn goto_depending_on() {
        let stmt = first_statement("GO TO PARA-1 PARA-2 PARA-3 DEPENDING ON WS-IDX.");
        match stmt {
            Statement::GoTo(g) => {
                assert_eq!(g.targets.len(), 3);
                assert_eq!(
                    g.depending_on.as_ref().map(|d| d.name.as_str()),
                    Some("WS-IDX")
                );
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn alter_with_proceed() {
        let stmt = first_statement("ALTER SWITCH-PARA TO PROCEED TO NEW-TARGET.");
        match stmt {
            Statement::Alter(a) => {
                assert_eq!(a.source, "SWITCH-PARA");
                assert_eq!(a.target, "NEW-TARGET");
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn read_with_at_end_and_not_at_end() {
        let stmt = first_statement(
            "READ IN-FILE\n\
                 AT END MOVE \"NO\" TO MORE-DATA\n\
                 NOT AT END ADD 1 TO LINE-COUNT\n\
             END-READ.",
        );
        match stmt {
            Statement::Read(r) => {
                assert_eq!(r.file, "IN-FILE");
                assert_eq!(r.at_end.as_ref().map(|b| b.len()), Some(1));
                assert_eq!(r.not_at_end.as_ref().map(|b| b.len()), Some(1));
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn open_multiple_modes() {
        let stmt = first_statement("OPEN INPUT IN-FILE OUTPUT OUT-FILE.");
        match stmt {
            Statement::Open(o) => {
                assert_eq!(o.files.len(), 2);
                assert_eq!(o.files[0].0, OpenMode::Input);
                assert_eq!(o.files[1], (OpenMode::Output, "OUT-FILE".to_string()));
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn call_using_returning() {
        let stmt = first_statement("CALL \"SUBPROG\" USING WS-A WS-B RETURNING WS-RC.");
        match stmt {
            Statement::Call(c) => {
                assert!(matches!(
                    &c.target,
                    Expression::Literal(Literal {
                        kind: LiteralKind::String(s),
                        ..
                    }) if s == "SUBPROG"
                ));
                assert_eq!(c.using.len(), 2);
                assert!(c.returning.is_some());
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn sort_with_keys_and_files() {
        let stmt = first_statement(
            "SORT WORK-FILE ON ASCENDING KEY WS-KEY DESCENDING KEY WS-AGE\n\
                 USING IN-FILE GIVING OUT-FILE.",
        );
        match stmt {
            Statement::Sort(s) => {
                assert_eq!(s.file, "WORK-FILE");
                assert_eq!(s.keys.len(), 2);
                assert!(!s.keys[0].descending);
                assert!(s.keys[1].descending);
                assert_eq!(s.using, vec!["IN-FILE".to_string()]);
                assert_eq!(s.giving, vec!["OUT-FILE".to_string()]);
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn display_no_advancing() {
        let stmt = first_statement("DISPLAY \"PROMPT: \" WITH NO ADVANCING.");
        match stmt {
            Statement::Display(d) => {
                assert_eq!(d.operands.len(), 1);
                assert!(d.no_advancing);
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn sections_group_paragraphs() {
        let procedure = parse_procedure(
            "MAIN-SECTION SECTION.\n\
             DO-WORK.\n\
                 DISPLAY \"WORK\".\n\
             WRAP-UP SECTION.\n\
             DONE.\n\
                 STOP RUN.",
        );
        match procedure.body {
            ProcedureBody::Sections(sections) => {
                assert_eq!(sections.len(), 2);
                assert_eq!(sections[0].name, "MAIN-SECTION");
                assert_eq!(sections[0].paragraphs.len(), 1);
                assert_eq!(sections[1].paragraphs[0].name, "DONE");
            }
            other => panic!("unexpected body: {:?}", other),
        }
    }

    #[test]
    fn leading_statements_become_entry_paragraph() {
        let procedure = parse_procedure(
            "DISPLAY \"FIRST\".\n\
             NAMED-PARA.\n\
                 STOP RUN.",
        );
        match procedure.body {
            ProcedureBody::Paragraphs(paragraphs) => {
                assert_eq!(paragraphs.len(), 2);
                assert_eq!(paragraphs[0].name, "$ENTRY");
                assert_eq!(paragraphs[1].name, "NAMED-PARA");
            }
            other => panic!("unexpected body: {:?}", other),
        }
    }

    #[test]
    fn procedure_division_using() {
        let text = "IDENTIFICATION DIVISION.\n\
                    PROGRAM-ID. SUB.\n\
                    PROCEDURE DIVISION USING LK-INPUT LK-OUTPUT.\n\
                        GOBACK.\n";
        let source = SourceFile::from_text(FileId::MAIN, text.to_string(), SourceFormat::Free);
        let (program, errors) = parse_source(&source);
        assert!(errors.is_empty(), "errors: {:?}", errors);
        let procedure = program.unwrap().procedure.unwrap();
        assert_eq!(procedure.using, vec!["LK-INPUT", "LK-OUTPUT"]);
    }
}
