//! IDENTIFICATION and ENVIRONMENT DIVISION parsers.

use super::Result;
use crate::ast::*;
use crate::lexer::{Keyword, TokenKind};

impl super::Parser {
    // ========================================================================
    // IDENTIFICATION DIVISION
    // ========================================================================

    pub(super) fn parse_identification_division(&mut self) -> Result<IdentificationDivision> {
        let start = self.current_span();

        self.expect_keyword(Keyword::Identification)?;
        self.expect_keyword(Keyword::Division)?;
        self.expect(TokenKind::Period)?;

        self.expect_keyword(Keyword::ProgramId)?;
        self.skip_if(TokenKind::Period);
        let name_span = self.current_span();
        let name = self.expect_identifier()?;
        if self.check_keyword(Keyword::Is) {
            self.advance();
        }
        if self.check_keyword(Keyword::Program) {
            self.advance();
        }
        self.expect(TokenKind::Period)?;

        let program_id = ProgramId {
            name,
            span: name_span,
        };

        let mut author = None;
        let mut date_written = None;

        // Remaining identification paragraphs are commentary; keep the two
        // the report surfaces and skip the rest.
        while !self.is_at_division_start() && !self.is_at_end() {
            if self.check_keyword(Keyword::Author) {
                self.advance();
                self.skip_if(TokenKind::Period);
                author = Some(self.consume_until_period());
            } else if self.check_keyword(Keyword::DateWritten) {
                self.advance();
                self.skip_if(TokenKind::Period);
                date_written = Some(self.consume_until_period());
            } else {
                self.advance_to_next_sentence();
            }
        }

        let end = self.previous_span();

        Ok(IdentificationDivision {
            program_id,
            author,
            date_written,
            span: start.extend(end),
        })
    }

    // ========================================================================
    // ENVIRONMENT DIVISION
    // ========================================================================

    pub(super) fn parse_environment_division(&mut self) -> Result<EnvironmentDivision> {
        let start = self.current_span();

        self.expect_keyword(Keyword::Environment)?;
        self.expect_keyword(Keyword::Division)?;
        self.expect(TokenKind::Period)?;

        let mut file_control = Vec::new();

        while !self.is_at_division_start() && !self.is_at_end() {
            if self.check_keyword(Keyword::Configuration) {
                // Nothing in the configuration section affects translation.
                self.advance();
                self.expect_keyword(Keyword::Section)?;
                self.expect(TokenKind::Period)?;
                while !self.is_at_section_start()
                    && !self.is_at_division_start()
                    && !self.is_at_end()
                {
                    self.advance_to_next_sentence();
                }
            } else if self.check_keyword(Keyword::InputOutput) {
                self.advance();
                self.expect_keyword(Keyword::Section)?;
                self.expect(TokenKind::Period)?;

                if self.check_keyword(Keyword::FileControl) {
                    self.advance();
                    self.expect(TokenKind::Period)?;
                    while self.check_keyword(Keyword::Select) {
                        file_control.push(self.parse_file_control_entry()?);
                    }
                }
            } else {
                self.advance_to_next_sentence();
            }
        }

        let end = self.previous_span();

        Ok(EnvironmentDivision {
            file_control,
            span: start.extend(end),
        })
    }

    fn parse_file_control_entry(&mut self) -> Result<FileControlEntry> {
        let start = self.current_span();

        self.expect_keyword(Keyword::Select)?;
        let file_name = self.expect_identifier()?;

        self.expect_keyword(Keyword::Assign)?;
        if self.check_keyword(Keyword::To) {
            self.advance();
        }
        let assign_to = self.expect_identifier_or_string()?;

        let mut organization = FileOrganization::Sequential;
        let mut access_mode = AccessMode::Sequential;
        let mut record_key = None;
        let mut file_status = None;

        while !self.check(TokenKind::Period) && !self.is_at_end() {
            if self.check_keyword(Keyword::Organization) {
                self.advance();
                if self.check_keyword(Keyword::Is) {
                    self.advance();
                }
                organization = self.parse_file_organization();
            } else if self.check_keyword(Keyword::AccessMode) {
                self.advance();
                if self.check_keyword(Keyword::Mode) {
                    self.advance();
                }
                if self.check_keyword(Keyword::Is) {
                    self.advance();
                }
                access_mode = self.parse_access_mode();
            } else if self.check_keyword(Keyword::Record) && self.peek_keyword(Keyword::Key) {
                self.advance();
                self.advance();
                if self.check_keyword(Keyword::Is) {
                    self.advance();
                }
                record_key = Some(self.parse_qualified_name()?);
            } else if self.check_keyword(Keyword::File) && self.peek_keyword(Keyword::Status) {
                self.advance();
                self.advance();
                if self.check_keyword(Keyword::Is) {
                    self.advance();
                }
                file_status = Some(self.parse_qualified_name()?);
            } else if self.check_keyword(Keyword::Status) {
                // STATUS IS data-name without the FILE prefix.
                self.advance();
                if self.check_keyword(Keyword::Is) {
                    self.advance();
                }
                file_status = Some(self.parse_qualified_name()?);
            } else {
                self.advance();
            }
        }

        self.expect(TokenKind::Period)?;

        let end = self.previous_span();

        Ok(FileControlEntry {
            file_name,
            assign_to,
            organization,
            access_mode,
            record_key,
            file_status,
            span: start.extend(end),
        })
    }

    fn parse_file_organization(&mut self) -> FileOrganization {
        if self.check_keyword(Keyword::Sequential) {
            self.advance();
            FileOrganization::Sequential
        } else if self.check_keyword(Keyword::Indexed) {
            self.advance();
            FileOrganization::Indexed
        } else if self.check_keyword(Keyword::Relative) {
            self.advance();
            FileOrganization::Relative
        } else {
            FileOrganization::Sequential
        }
    }

    fn parse_access_mode(&mut self) -> AccessMode {
        if self.check_keyword(Keyword::Sequential) {
            self.advance();
            AccessMode::Sequential
        } else if self.check_keyword(Keyword::Random) {
            self.advance();
            AccessMode::Random
        } else if self.check_keyword(Keyword::Dynamic) {
            self.advance();
            AccessMode::Dynamic
        } else {
            AccessMode::Sequential
        }
    }
}
