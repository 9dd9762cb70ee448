//! DATA DIVISION parser and PICTURE interpretation.

use cobalt_lang_core::Span;

use super::Result;
use crate::ast::*;
use crate::error::CobolError;
use crate::lexer::{Keyword, TokenKind};

/// One parsed data description sentence, before tree building.
enum FlatEntry {
    Item(DataItem),
    Condition(ConditionValue),
}

impl super::Parser {
    pub(super) fn parse_data_division(&mut self) -> Result<DataDivision> {
        let start = self.current_span();

        self.expect_keyword(Keyword::Data)?;
        self.expect_keyword(Keyword::Division)?;
        self.expect(TokenKind::Period)?;

        let mut file_section = Vec::new();
        let mut working_storage = Vec::new();
        let mut linkage = Vec::new();

        while !self.is_at_division_start() && !self.is_at_end() {
            if self.check_keyword(Keyword::File) && self.peek_keyword(Keyword::Section) {
                self.advance();
                self.advance();
                self.expect(TokenKind::Period)?;
                while self.check_keyword(Keyword::Fd) {
                    file_section.push(self.parse_file_description()?);
                }
            } else if self.check_keyword(Keyword::WorkingStorage) {
                self.advance();
                self.expect_keyword(Keyword::Section)?;
                self.expect(TokenKind::Period)?;
                working_storage = self.parse_data_items()?;
            } else if self.check_keyword(Keyword::LocalStorage) {
                // Local-storage items behave like working storage here.
                self.advance();
                self.expect_keyword(Keyword::Section)?;
                self.expect(TokenKind::Period)?;
                working_storage.extend(self.parse_data_items()?);
            } else if self.check_keyword(Keyword::Linkage) {
                self.advance();
                self.expect_keyword(Keyword::Section)?;
                self.expect(TokenKind::Period)?;
                linkage = self.parse_data_items()?;
            } else {
                self.advance_to_next_sentence();
            }
        }

        let end = self.previous_span();

        Ok(DataDivision {
            file_section,
            working_storage,
            linkage,
            span: start.extend(end),
        })
    }

    fn parse_file_description(&mut self) -> Result<FileDescription> {
        let start = self.current_span();

        self.expect_keyword(Keyword::Fd)?;
        let name = self.expect_identifier()?;
        // RECORD CONTAINS, LABEL, BLOCK clauses carry nothing we translate.
        self.advance_to_next_sentence();

        let records = self.parse_data_items()?;

        let end = self.previous_span();
        Ok(FileDescription {
            name,
            records,
            span: start.extend(end),
        })
    }

    /// Parse consecutive data description entries and fold them into a
    /// level-number tree. Level 88 entries attach to the item that
    /// precedes them as condition values.
    pub(super) fn parse_data_items(&mut self) -> Result<Vec<DataItem>> {
        let mut flat = Vec::new();
        while self.check_level_number() {
            match self.parse_data_entry() {
                Ok(entry) => flat.push(entry),
                Err(e) => {
                    self.push_error(e);
                    self.advance_to_next_sentence();
                }
            }
        }
        Ok(self.build_item_tree(flat))
    }

    fn build_item_tree(&mut self, flat: Vec<FlatEntry>) -> Vec<DataItem> {
        fn normalize(level: u8) -> u8 {
            match level {
                66 | 77 => 1,
                l => l,
            }
        }

        fn place(done: DataItem, stack: &mut Vec<DataItem>, roots: &mut Vec<DataItem>) {
            match stack.last_mut() {
                Some(parent) => parent.children.push(done),
                None => roots.push(done),
            }
        }

        let mut roots = Vec::new();
        let mut stack: Vec<DataItem> = Vec::new();

        for entry in flat {
            match entry {
                FlatEntry::Condition(cond) => match stack.last_mut() {
                    Some(item) => item.condition_values.push(cond),
                    None => self.push_error(CobolError::parse(
                        format!("condition name {} has no parent data item", cond.name),
                        cond.span,
                    )),
                },
                FlatEntry::Item(item) => {
                    let level = normalize(item.level);
                    loop {
                        let top_level = match stack.last() {
                            Some(top) => normalize(top.level),
                            None => break,
                        };
                        if top_level < level {
                            break;
                        }
                        if let Some(done) = stack.pop() {
                            place(done, &mut stack, &mut roots);
                        }
                    }
                    stack.push(item);
                }
            }
        }

        while let Some(done) = stack.pop() {
            place(done, &mut stack, &mut roots);
        }

        roots
    }

    /// One data description sentence: level, name, clauses, period.
    fn parse_data_entry(&mut self) -> Result<FlatEntry> {
        let start = self.current_span();
        let level = self.expect_level_number()?;

        if level == 88 {
            return self.parse_condition_entry(start);
        }

        let name = if self.check_keyword(Keyword::Filler) {
            self.advance();
            DataItemName::Filler
        } else if self.check(TokenKind::Period) {
            // A bare level number is an unnamed FILLER.
            DataItemName::Filler
        } else {
            DataItemName::Named(self.expect_identifier()?)
        };

        let mut item = DataItem {
            level,
            name,
            picture: None,
            usage: None,
            value: None,
            occurs: None,
            redefines: None,
            sign: None,
            justified_right: false,
            blank_when_zero: false,
            children: Vec::new(),
            condition_values: Vec::new(),
            span: start,
        };

        while !self.check(TokenKind::Period) && !self.is_at_end() {
            if self.check_keyword(Keyword::Pic) || self.check_keyword(Keyword::Picture) {
                self.advance();
                self.skip_if(TokenKind::Keyword(Keyword::Is));
                item.picture = Some(self.parse_picture_clause()?);
            } else if self.check_keyword(Keyword::Redefines) {
                self.advance();
                item.redefines = Some(self.expect_identifier()?);
            } else if self.check_keyword(Keyword::Value) || self.check_keyword(Keyword::Values) {
                self.advance();
                self.skip_if(TokenKind::Keyword(Keyword::Is));
                self.skip_if(TokenKind::Keyword(Keyword::Are));
                item.value = Some(self.parse_literal()?);
            } else if self.check_keyword(Keyword::Occurs) {
                item.occurs = Some(self.parse_occurs_clause()?);
            } else if self.check_keyword(Keyword::Usage) {
                self.advance();
                self.skip_if(TokenKind::Keyword(Keyword::Is));
                item.usage = Some(self.parse_usage());
            } else if self.is_usage_keyword() {
                item.usage = Some(self.parse_usage());
            } else if self.check_keyword(Keyword::Sign) {
                self.advance();
                self.skip_if(TokenKind::Keyword(Keyword::Is));
                item.sign = Some(self.parse_sign_clause());
            } else if self.check_keyword(Keyword::Leading) || self.check_keyword(Keyword::Trailing)
            {
                item.sign = Some(self.parse_sign_clause());
            } else if self.check_keyword(Keyword::Justified) || self.check_keyword(Keyword::Just) {
                self.advance();
                self.skip_if(TokenKind::Keyword(Keyword::Right));
                item.justified_right = true;
            } else if self.check_keyword(Keyword::Blank) {
                self.advance();
                self.skip_if(TokenKind::Keyword(Keyword::When));
                self.skip_if(TokenKind::Keyword(Keyword::Zero));
                self.skip_if(TokenKind::Keyword(Keyword::Zeros));
                self.skip_if(TokenKind::Keyword(Keyword::Zeroes));
                item.blank_when_zero = true;
            } else {
                // Unknown clause token; skip it rather than lose the item.
                self.advance();
            }
        }
        self.expect(TokenKind::Period)?;

        item.span = start.extend(self.previous_span());
        Ok(FlatEntry::Item(item))
    }

    fn parse_condition_entry(&mut self, start: Span) -> Result<FlatEntry> {
        let name = self.expect_identifier()?;
        self.skip_if(TokenKind::Keyword(Keyword::Value));
        self.skip_if(TokenKind::Keyword(Keyword::Values));
        self.skip_if(TokenKind::Keyword(Keyword::Is));
        self.skip_if(TokenKind::Keyword(Keyword::Are));

        let mut values = Vec::new();
        while !self.check(TokenKind::Period) && !self.is_at_end() {
            let low = self.parse_literal()?;
            if self.check_keyword(Keyword::Thru) || self.check_keyword(Keyword::Through) {
                self.advance();
                let high = self.parse_literal()?;
                values.push(ConditionSpec::Range(low, high));
            } else {
                values.push(ConditionSpec::Single(low));
            }
        }
        self.expect(TokenKind::Period)?;

        let span = start.extend(self.previous_span());
        Ok(FlatEntry::Condition(ConditionValue { name, values, span }))
    }

    fn is_usage_keyword(&self) -> bool {
        self.check_keyword(Keyword::Comp)
            || self.check_keyword(Keyword::Comp3)
            || self.check_keyword(Keyword::Computational)
            || self.check_keyword(Keyword::Computational3)
            || self.check_keyword(Keyword::Binary)
            || self.check_keyword(Keyword::PackedDecimal)
            || self.check_keyword(Keyword::Display)
    }

    fn parse_usage(&mut self) -> Usage {
        let usage = if self.check_keyword(Keyword::Comp)
            || self.check_keyword(Keyword::Computational)
            || self.check_keyword(Keyword::Binary)
        {
            Usage::Binary
        } else if self.check_keyword(Keyword::Comp3)
            || self.check_keyword(Keyword::Computational3)
            || self.check_keyword(Keyword::PackedDecimal)
        {
            Usage::PackedDecimal
        } else {
            Usage::Display
        };
        self.advance();
        usage
    }

    fn parse_picture_clause(&mut self) -> Result<PictureClause> {
        let span = self.current_span();
        let picture = match &self.current().kind {
            TokenKind::PictureString(s) => {
                let s = s.clone();
                self.advance();
                s
            }
            other => {
                return Err(CobolError::parse(
                    format!("expected picture string, found {:?}", other),
                    span,
                ))
            }
        };

        let (category, size, decimal_positions, signed) = analyze_picture(&picture);

        Ok(PictureClause {
            picture,
            category,
            size,
            decimal_positions,
            signed,
            span,
        })
    }

    fn parse_occurs_clause(&mut self) -> Result<OccursClause> {
        let start = self.current_span();
        self.expect_keyword(Keyword::Occurs)?;

        let first = self.expect_integer()? as u32;
        let mut times = first;
        let mut max_times = first;

        if self.check_keyword(Keyword::To) {
            self.advance();
            max_times = self.expect_integer()? as u32;
        }
        self.skip_if(TokenKind::Keyword(Keyword::Times));

        let mut depending_on = None;
        let mut indexed_by = Vec::new();

        loop {
            if self.check_keyword(Keyword::Depending) {
                self.advance();
                self.skip_if(TokenKind::Keyword(Keyword::On));
                depending_on = Some(self.expect_identifier()?);
            } else if self.check_keyword(Keyword::Ascending)
                || self.check_keyword(Keyword::Descending)
            {
                // Sort keys on the table do not affect translation.
                self.advance();
                self.skip_if(TokenKind::Keyword(Keyword::Key));
                self.skip_if(TokenKind::Keyword(Keyword::Is));
                self.expect_identifier()?;
            } else if self.check_keyword(Keyword::Indexed) {
                self.advance();
                self.skip_if(TokenKind::Keyword(Keyword::By));
                while self.check_identifier() {
                    indexed_by.push(self.expect_identifier()?);
                }
            } else {
                break;
            }
        }

        // OCCURS m TO n without DEPENDING ON is still a fixed table of n.
        if depending_on.is_none() {
            times = max_times;
        }

        Ok(OccursClause {
            times,
            max_times,
            depending_on,
            indexed_by,
            span: start.extend(self.previous_span()),
        })
    }

    fn parse_sign_clause(&mut self) -> SignClause {
        let leading = self.check_keyword(Keyword::Leading);
        self.advance();
        let mut separate = false;
        if self.check_keyword(Keyword::Separate) {
            self.advance();
            self.skip_if(TokenKind::Keyword(Keyword::Character));
            separate = true;
        }
        SignClause { leading, separate }
    }
}

/// Interpret a PICTURE character string.
///
/// Returns `(category, size, decimal_positions, signed)` where `size`
/// counts storage positions: digit positions for numeric pictures,
/// character positions otherwise. `V` and `S` occupy no storage.
pub(super) fn analyze_picture(picture: &str) -> (PictureCategory, u32, u32, bool) {
    let chars: Vec<char> = picture.chars().collect();
    let mut size: u32 = 0;
    let mut decimals: u32 = 0;
    let mut seen_v = false;
    let mut signed = false;
    let mut has_9 = false;
    let mut has_x = false;
    let mut has_a = false;
    let mut has_edit = false;

    let mut i = 0;
    while i < chars.len() {
        let ch = chars[i].to_ascii_uppercase();

        // Parenthesized repeat count: 9(5) means five 9s.
        let mut count: u32 = 1;
        if i + 1 < chars.len() && chars[i + 1] == '(' {
            let mut j = i + 2;
            let mut n: u32 = 0;
            while j < chars.len() && chars[j].is_ascii_digit() {
                n = n * 10 + (chars[j] as u32 - '0' as u32);
                j += 1;
            }
            if j < chars.len() && chars[j] == ')' {
                count = n.max(1);
                i = j + 1;
            } else {
                i += 1;
            }
        } else {
            i += 1;
        }

        match ch {
            '9' => {
                has_9 = true;
                size += count;
                if seen_v {
                    decimals += count;
                }
            }
            'X' => {
                has_x = true;
                size += count;
            }
            'A' => {
                has_a = true;
                size += count;
            }
            'V' => seen_v = true,
            'S' => signed = true,
            // Scaling positions occupy no storage.
            'P' => {
                if seen_v {
                    decimals += count;
                }
            }
            // Editing symbols make the picture edited; a real decimal
            // point marks where the fraction starts.
            'Z' | '*' | '$' | ',' | '+' | '-' | 'B' | '0' | '/' | 'C' | 'D' | 'R' => {
                has_edit = true;
                size += count;
            }
            '.' => {
                has_edit = true;
                seen_v = true;
                size += count;
            }
            _ => {}
        }
    }

    let category = if has_edit && has_9 {
        PictureCategory::NumericEdited
    } else if has_edit {
        PictureCategory::AlphanumericEdited
    } else if has_9 && !has_x && !has_a {
        PictureCategory::Numeric
    } else if has_a && !has_9 && !has_x {
        PictureCategory::Alphabetic
    } else {
        PictureCategory::Alphanumeric
    };

    (category, size, decimals, signed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::{scan, FileId, SourceFile, SourceFormat};
    use crate::parser::parse;

    fn parse_text(text: &str) -> Program {
        let source = SourceFile::from_text(FileId::MAIN, text.to_string(), SourceFormat::Free);
        let (tokens, lex_errors) = scan(&source);
        assert!(lex_errors.is_empty(), "{:?}", lex_errors);
        let (program, errors) = parse(tokens);
        assert!(errors.is_empty(), "{:?}", errors);
        program.unwrap()
    }

    #[test]
    fn picture_alphanumeric() {
        let (cat, size, dec, signed) = analyze_picture("X(10)");
        assert_eq!(cat, PictureCategory::Alphanumeric);
        assert_eq!(size, 10);
        assert_eq!(dec, 0);
        assert!(!signed);
    }

    #[test]
    fn picture_numeric_with_scale() {
        let (cat, size, dec, _) = analyze_picture("9(5)V99");
        assert_eq!(cat, PictureCategory::Numeric);
        assert_eq!(size, 7);
        assert_eq!(dec, 2);
    }

    #[test]
    fn picture_signed() {
        let (cat, size, dec, signed) = analyze_picture("S9(7)V9(2)");
        assert_eq!(cat, PictureCategory::Numeric);
        assert_eq!(size, 9);
        assert_eq!(dec, 2);
        assert!(signed);
    }

    #[test]
    fn picture_numeric_edited() {
        let (cat, size, _, _) = analyze_picture("ZZ9.99");
        assert_eq!(cat, PictureCategory::NumericEdited);
        assert_eq!(size, 6);
    }

    #[test]
    fn picture_alphabetic() {
        let (cat, size, _, _) = analyze_picture("A(4)");
        assert_eq!(cat, PictureCategory::Alphabetic);
        assert_eq!(size, 4);
    }

    #[test]
    fn nested_group_items() {
        let program = parse_text(
            r#"
            IDENTIFICATION DIVISION.
            PROGRAM-ID. TREE.
            DATA DIVISION.
            WORKING-STORAGE SECTION.
            01 CUSTOMER-RECORD.
               05 CUST-ID      PIC 9(6).
               05 CUST-NAME.
                  10 FIRST-NAME PIC X(10).
                  10 LAST-NAME  PIC X(15).
               05 CUST-BALANCE PIC S9(7)V99 COMP-3.
            PROCEDURE DIVISION.
                STOP RUN.
        "#,
        );

        let ws = &program.data.unwrap().working_storage;
        assert_eq!(ws.len(), 1);
        let root = &ws[0];
        assert!(root.is_group());
        assert_eq!(root.children.len(), 3);
        assert_eq!(root.children[1].children.len(), 2);
        assert_eq!(root.children[2].usage, Some(Usage::PackedDecimal));
    }

    #[test]
    fn redefines_and_occurs() {
        let program = parse_text(
            r#"
            IDENTIFICATION DIVISION.
            PROGRAM-ID. RO.
            DATA DIVISION.
            WORKING-STORAGE SECTION.
            01 WS-TABLE.
               05 WS-ENTRY OCCURS 12 TIMES PIC 9(3).
            01 WS-ALIAS REDEFINES WS-TABLE PIC X(36).
            01 WS-VAR-TABLE.
               05 WS-COUNT PIC 9(2).
               05 WS-ITEM OCCURS 1 TO 50 TIMES DEPENDING ON WS-COUNT PIC X(8).
            PROCEDURE DIVISION.
                STOP RUN.
        "#,
        );

        let ws = &program.data.unwrap().working_storage;
        let entry = &ws[0].children[0];
        let occurs = entry.occurs.as_ref().unwrap();
        assert_eq!(occurs.times, 12);
        assert!(!occurs.is_variable());

        assert_eq!(ws[1].redefines.as_deref(), Some("WS-TABLE"));

        let var = &ws[2].children[1].occurs.as_ref().unwrap();
        assert_eq!(var.times, 1);
        assert_eq!(var.max_times, 50);
        assert_eq!(var.depending_on.as_deref(), Some("WS-COUNT"));
    }

    #[test]
    fn condition_names_attach_to_parent() {
        let program = parse_text(
            r#"
            IDENTIFICATION DIVISION.
            PROGRAM-ID. COND.
            DATA DIVISION.
            WORKING-STORAGE SECTION.
            01 MORE-DATA PIC X(3) VALUE "YES".
               88 NO-MORE-DATA VALUE "NO".
            PROCEDURE DIVISION.
                STOP RUN.
        "#,
        );

        let ws = &program.data.unwrap().working_storage;
        assert_eq!(ws[0].condition_values.len(), 1);
        assert_eq!(ws[0].condition_values[0].name, "NO-MORE-DATA");
    }

    #[test]
    fn condition_name_thru_keeps_the_range() {
        let program = parse_text(
            r#"
            IDENTIFICATION DIVISION.
            PROGRAM-ID. COND2.
            DATA DIVISION.
            WORKING-STORAGE SECTION.
            01 WS-CODE PIC 9.
               88 VALID-CODE VALUE 1 THRU 5.
               88 SPECIAL-CODE VALUE 9.
            PROCEDURE DIVISION.
                STOP RUN.
        "#,
        );

        let ws = &program.data.unwrap().working_storage;
        let valid = &ws[0].condition_values[0];
        assert_eq!(valid.name, "VALID-CODE");
        assert_eq!(valid.values.len(), 1);
        assert!(matches!(
            &valid.values[0],
            ConditionSpec::Range(low, high)
                if matches!(low.kind, LiteralKind::Integer(1))
                    && matches!(high.kind, LiteralKind::Integer(5))
        ));
        assert!(matches!(
            &ws[0].condition_values[1].values[0],
            ConditionSpec::Single(lit) if matches!(lit.kind, LiteralKind::Integer(9))
        ));
    }

    #[test]
    fn file_section_with_fd() {
        let program = parse_text(
            r#"
            IDENTIFICATION DIVISION.
            PROGRAM-ID. FDTEST.
            ENVIRONMENT DIVISION.
            INPUT-OUTPUT SECTION.
            FILE-CONTROL.
                SELECT IN-FILE ASSIGN TO "input.dat"
                    ORGANIZATION IS SEQUENTIAL.
            DATA DIVISION.
            FILE SECTION.
            FD IN-FILE.
            01 IN-RECORD PIC X(80).
            PROCEDURE DIVISION.
                STOP RUN.
        "#,
        );

        let env = program.environment.unwrap();
        assert_eq!(env.file_control.len(), 1);
        assert_eq!(env.file_control[0].file_name, "IN-FILE");

        let data = program.data.unwrap();
        assert_eq!(data.file_section.len(), 1);
        assert_eq!(data.file_section[0].records[0].name.as_str(), "IN-RECORD");
    }
}
