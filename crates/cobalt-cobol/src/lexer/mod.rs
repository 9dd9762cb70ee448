//! COBOL scanner.
//!
//! Tokenizes zone-processed source lines into a flat token stream. The
//! scanner is line-oriented because fixed format is: comment lines never
//! produce tokens, continuation lines splice string literals across line
//! boundaries, and everything after column 72 was already discarded by the
//! source splitter.
//!
//! Errors are accumulated, never fatal. An unterminated literal or a stray
//! byte yields an error plus a best-effort token so the parser still sees
//! the rest of the program.

mod source;

pub use cobalt_lang_core::{FileId, Location, Span};
pub use source::{Indicator, SourceFile, SourceFormat, SourceLine};

use crate::error::CobolError;

// ----------------------------------------------------------------------------
// Tokens
// ----------------------------------------------------------------------------

/// A lexical token.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    /// What kind of token this is.
    pub kind: TokenKind,
    /// Where it came from.
    pub span: Span,
}

/// Token kinds produced by the scanner.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    /// A reserved word.
    Keyword(Keyword),
    /// A user-defined word, stored uppercased (COBOL is case-insensitive).
    Identifier(String),
    /// An integer literal.
    IntegerLiteral(i64),
    /// A decimal literal, kept as text to preserve scale.
    DecimalLiteral(String),
    /// A quoted string literal, quotes removed and doubled quotes folded.
    StringLiteral(String),
    /// A PICTURE character string following PIC/PICTURE.
    PictureString(String),
    /// Sentence-ending period.
    Period,
    Comma,
    Lparen,
    Rparen,
    Colon,
    Plus,
    Minus,
    Star,
    StarStar,
    Slash,
    Equals,
    Greater,
    GreaterEqual,
    Less,
    LessEqual,
    /// End of input.
    Eof,
}

// ----------------------------------------------------------------------------
// Keyword enum -- generated from the master table in `macros.rs`
// ----------------------------------------------------------------------------

macro_rules! gen_keyword_enum {
    (
        @primary { $($kw:ident => $text:literal),* $(,)? }
        @alias { $($akw:ident => $atext:literal),* $(,)? }
    ) => {
        /// COBOL reserved words recognized by the scanner, plus contextual
        /// variants constructed by the parser.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum Keyword {
            $($kw,)*
            $($akw,)*
        }

        impl Keyword {
            /// The canonical source spelling.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Keyword::$kw => $text,)*
                    $(Keyword::$akw => $atext,)*
                }
            }

            /// Look up an uppercased word in the reserved-word table.
            pub fn lookup(word: &str) -> Option<Keyword> {
                match word {
                    $($text => Some(Keyword::$kw),)*
                    _ => None,
                }
            }
        }
    };
}
for_all_keywords!(gen_keyword_enum);

// ----------------------------------------------------------------------------
// Scanner
// ----------------------------------------------------------------------------

/// Tokenize a source file.
pub fn scan(source: &SourceFile) -> (Vec<Token>, Vec<CobolError>) {
    Scanner::new(source).run()
}

struct Scanner<'a> {
    source: &'a SourceFile,
    tokens: Vec<Token>,
    errors: Vec<CobolError>,
    /// Index of the current line.
    line: usize,
    /// Byte index into the current line's code zone.
    col: usize,
    /// Set after PIC/PICTURE so the next word scans as a picture string.
    pending_picture: bool,
}

impl<'a> Scanner<'a> {
    fn new(source: &'a SourceFile) -> Self {
        Self {
            source,
            tokens: Vec::new(),
            errors: Vec::new(),
            line: 0,
            col: 0,
            pending_picture: false,
        }
    }

    fn run(mut self) -> (Vec<Token>, Vec<CobolError>) {
        while self.line < self.source.lines.len() {
            let indicator = self.source.lines[self.line].indicator;
            if indicator == Indicator::Comment || indicator == Indicator::Debug {
                self.next_line();
                continue;
            }
            if self.col >= self.content().len() {
                self.next_line();
                continue;
            }
            self.scan_at_cursor();
        }

        let eof_pos = self.source.text.len() as u32;
        self.tokens.push(Token {
            kind: TokenKind::Eof,
            span: Span::point(self.source.id, eof_pos),
        });
        (self.tokens, self.errors)
    }

    fn content(&self) -> &str {
        &self.source.lines[self.line].content
    }

    fn byte(&self, at: usize) -> Option<u8> {
        self.content().as_bytes().get(at).copied()
    }

    fn next_line(&mut self) {
        self.line += 1;
        self.col = 0;
    }

    /// Absolute byte offset of a column on the current line.
    fn offset(&self, col: usize) -> u32 {
        self.source.lines[self.line].content_offset + col as u32
    }

    fn span_from(&self, start_col: usize) -> Span {
        Span::new(self.source.id, self.offset(start_col), self.offset(self.col))
    }

    fn push(&mut self, kind: TokenKind, span: Span) {
        self.tokens.push(Token { kind, span });
    }

    fn scan_at_cursor(&mut self) {
        let start = self.col;
        let b = match self.byte(start) {
            Some(b) => b,
            None => return,
        };
        match b {
            b' ' | b'\t' | b';' => {
                self.col += 1;
            }
            b'"' | b'\'' => self.scan_string(b),
            _ if self.pending_picture && !b.is_ascii_whitespace() => self.scan_picture(),
            b'0'..=b'9' => self.scan_number(),
            _ if b.is_ascii_alphabetic() => self.scan_word(),
            b'.' => self.single(TokenKind::Period),
            b',' => self.single(TokenKind::Comma),
            b'(' => self.single(TokenKind::Lparen),
            b')' => self.single(TokenKind::Rparen),
            b':' => self.single(TokenKind::Colon),
            b'+' => self.single(TokenKind::Plus),
            b'-' => self.single(TokenKind::Minus),
            b'/' => self.single(TokenKind::Slash),
            b'=' => self.single(TokenKind::Equals),
            b'*' => {
                if self.byte(start + 1) == Some(b'*') {
                    self.col += 2;
                    self.push(TokenKind::StarStar, self.span_from(start));
                } else {
                    self.single(TokenKind::Star);
                }
            }
            b'>' => {
                if self.byte(start + 1) == Some(b'=') {
                    self.col += 2;
                    self.push(TokenKind::GreaterEqual, self.span_from(start));
                } else {
                    self.single(TokenKind::Greater);
                }
            }
            b'<' => {
                if self.byte(start + 1) == Some(b'=') {
                    self.col += 2;
                    self.push(TokenKind::LessEqual, self.span_from(start));
                } else {
                    self.single(TokenKind::Less);
                }
            }
            _ => {
                self.col += 1;
                let span = self.span_from(start);
                self.errors.push(CobolError::lex(
                    format!("invalid character {:?}", b as char),
                    span,
                ));
            }
        }
    }

    fn single(&mut self, kind: TokenKind) {
        let start = self.col;
        self.col += 1;
        self.push(kind, self.span_from(start));
    }

    /// A user word or reserved word: letters, digits, hyphens, underscores.
    fn scan_word(&mut self) {
        let start = self.col;
        while let Some(b) = self.byte(self.col) {
            if b.is_ascii_alphanumeric() || b == b'-' || b == b'_' {
                self.col += 1;
            } else {
                break;
            }
        }
        let word = self.content()[start..self.col].to_ascii_uppercase();
        let span = self.span_from(start);
        match Keyword::lookup(&word) {
            Some(kw) => {
                if kw == Keyword::Pic || kw == Keyword::Picture {
                    self.pending_picture = true;
                }
                self.push(TokenKind::Keyword(kw), span);
            }
            None => self.push(TokenKind::Identifier(word), span),
        }
    }

    /// A numeric literal, or a word that happens to start with digits
    /// (paragraph names like `0100-MAIN`).
    fn scan_number(&mut self) {
        let start = self.col;
        while let Some(b) = self.byte(self.col) {
            if b.is_ascii_digit() {
                self.col += 1;
            } else {
                break;
            }
        }

        // Digits running into letters or a hyphen form a user word.
        if let Some(b) = self.byte(self.col) {
            if b.is_ascii_alphabetic() || b == b'-' || b == b'_' {
                self.col = start;
                return self.scan_word_from_digits();
            }
        }

        // A period counts as a decimal point only when a digit follows;
        // otherwise it ends the sentence.
        if self.byte(self.col) == Some(b'.')
            && self.byte(self.col + 1).is_some_and(|b| b.is_ascii_digit())
        {
            self.col += 1;
            while let Some(b) = self.byte(self.col) {
                if b.is_ascii_digit() {
                    self.col += 1;
                } else {
                    break;
                }
            }
            let text = self.content()[start..self.col].to_string();
            let span = self.span_from(start);
            self.push(TokenKind::DecimalLiteral(text), span);
            return;
        }

        let text = &self.content()[start..self.col];
        let span = self.span_from(start);
        match text.parse::<i64>() {
            Ok(n) => self.push(TokenKind::IntegerLiteral(n), span),
            // Out of i64 range; keep the digits as a decimal literal.
            Err(_) => self.push(TokenKind::DecimalLiteral(text.to_string()), span),
        }
    }

    fn scan_word_from_digits(&mut self) {
        let start = self.col;
        while let Some(b) = self.byte(self.col) {
            if b.is_ascii_alphanumeric() || b == b'-' || b == b'_' {
                self.col += 1;
            } else {
                break;
            }
        }
        let word = self.content()[start..self.col].to_ascii_uppercase();
        let span = self.span_from(start);
        self.push(TokenKind::Identifier(word), span);
    }

    /// A PICTURE character string. Runs until whitespace; a period or
    /// comma ends it only when followed by a space or end of line, so
    /// edited pictures like `ZZ9.99` stay intact while the sentence
    /// period is left for the parser.
    fn scan_picture(&mut self) {
        let start = self.col;
        while let Some(b) = self.byte(self.col) {
            if b.is_ascii_whitespace() {
                break;
            }
            if (b == b'.' || b == b',')
                && self
                    .byte(self.col + 1)
                    .map_or(true, |n| n.is_ascii_whitespace())
            {
                break;
            }
            self.col += 1;
        }
        let text = self.content()[start..self.col].to_ascii_uppercase();
        let span = self.span_from(start);

        // PIC IS X(10): the IS is still a keyword, the picture follows it.
        if text == "IS" {
            self.push(TokenKind::Keyword(Keyword::Is), span);
            return;
        }

        self.pending_picture = false;
        self.push(TokenKind::PictureString(text), span);
    }

    /// A quoted literal, spliced across continuation lines when needed.
    fn scan_string(&mut self, quote: u8) {
        let start_col = self.col;
        let start_offset = self.offset(start_col);
        let mut value = String::new();
        self.col += 1;

        loop {
            match self.byte(self.col) {
                Some(b) if b == quote => {
                    // A doubled quote is an escaped quote character.
                    if self.byte(self.col + 1) == Some(quote) {
                        value.push(quote as char);
                        self.col += 2;
                    } else {
                        self.col += 1;
                        let span = Span::new(self.source.id, start_offset, self.offset(self.col));
                        self.push(TokenKind::StringLiteral(value), span);
                        return;
                    }
                }
                Some(b) => {
                    value.push(b as char);
                    self.col += 1;
                }
                None => {
                    // The literal continues on the next line only if that
                    // line has a continuation indicator and resumes with
                    // the opening quote character.
                    if !self.resume_continued_literal(quote) {
                        let span = Span::new(self.source.id, start_offset, self.offset(self.col));
                        tracing::warn!(line = self.source.lines[self.line].line_number, "unterminated string literal");
                        self.errors
                            .push(CobolError::lex("unterminated string literal", span));
                        self.push(TokenKind::StringLiteral(value), span);
                        return;
                    }
                }
            }
        }
    }

    /// Move the cursor past the resuming quote on a continuation line.
    /// Returns false if the next code line does not continue the literal.
    fn resume_continued_literal(&mut self, quote: u8) -> bool {
        let mut next = self.line + 1;
        while next < self.source.lines.len() && self.source.lines[next].is_comment() {
            next += 1;
        }
        if next >= self.source.lines.len() || !self.source.lines[next].is_continuation() {
            return false;
        }

        let content = &self.source.lines[next].content;
        match content.find(|c: char| !c.is_whitespace()) {
            Some(pos) if content.as_bytes()[pos] == quote => {
                self.line = next;
                self.col = pos + 1;
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan_free(text: &str) -> (Vec<Token>, Vec<CobolError>) {
        let source = SourceFile::from_text(FileId::MAIN, text.to_string(), SourceFormat::Free);
        scan(&source)
    }

    fn kinds(tokens: &[Token]) -> Vec<TokenKind> {
        tokens.iter().map(|t| t.kind.clone()).collect()
    }

    #[test]
    fn keywords_and_identifiers() {
        let (tokens, errors) = scan_free("MOVE ws-total TO WS-OUT.");
        assert!(errors.is_empty());
        assert_eq!(
            kinds(&tokens),
            vec![
                TokenKind::Keyword(Keyword::Move),
                TokenKind::Identifier("WS-TOTAL".into()),
                TokenKind::Keyword(Keyword::To),
                TokenKind::Identifier("WS-OUT".into()),
                TokenKind::Period,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn integer_and_decimal_literals() {
        let (tokens, errors) = scan_free("MOVE 42 TO X. MOVE 3.14 TO Y.");
        assert!(errors.is_empty());
        assert!(kinds(&tokens).contains(&TokenKind::IntegerLiteral(42)));
        assert!(kinds(&tokens).contains(&TokenKind::DecimalLiteral("3.14".into())));
    }

    #[test]
    fn sentence_period_after_integer() {
        let (tokens, errors) = scan_free("MOVE 5 TO X.");
        assert!(errors.is_empty());
        assert_eq!(tokens[1].kind, TokenKind::IntegerLiteral(5));
        assert_eq!(tokens[4].kind, TokenKind::Period);
    }

    #[test]
    fn word_with_leading_digits() {
        let (tokens, errors) = scan_free("PERFORM 0100-INIT.");
        assert!(errors.is_empty());
        assert_eq!(tokens[1].kind, TokenKind::Identifier("0100-INIT".into()));
    }

    #[test]
    fn string_literal_with_doubled_quote() {
        let (tokens, errors) = scan_free("DISPLAY \"IT\"\"S FINE\".");
        assert!(errors.is_empty());
        assert_eq!(tokens[1].kind, TokenKind::StringLiteral("IT\"S FINE".into()));
    }

    #[test]
    fn picture_string_with_parens() {
        let (tokens, errors) = scan_free("01 WS-A PIC 9(5)V99.");
        assert!(errors.is_empty());
        assert!(kinds(&tokens).contains(&TokenKind::PictureString("9(5)V99".into())));
    }

    #[test]
    fn picture_is_keyword_then_string() {
        let (tokens, errors) = scan_free("01 WS-A PICTURE IS X(10).");
        assert!(errors.is_empty());
        let ks = kinds(&tokens);
        assert!(ks.contains(&TokenKind::Keyword(Keyword::Is)));
        assert!(ks.contains(&TokenKind::PictureString("X(10)".into())));
    }

    #[test]
    fn edited_picture_keeps_embedded_period() {
        let (tokens, errors) = scan_free("01 WS-E PIC ZZ9.99.");
        assert!(errors.is_empty());
        assert!(kinds(&tokens).contains(&TokenKind::PictureString("ZZ9.99".into())));
        // The final period still ends the sentence.
        assert_eq!(tokens[tokens.len() - 2].kind, TokenKind::Period);
    }

    #[test]
    fn fixed_format_ignores_identification_columns() {
        let mut line = String::from("000100 DISPLAY \"HI\".");
        while line.len() < 72 {
            line.push(' ');
        }
        line.push_str("SEQ99999");
        let source = SourceFile::from_text(FileId::MAIN, line, SourceFormat::Fixed);
        let (tokens, errors) = scan(&source);
        assert!(errors.is_empty());
        assert_eq!(
            kinds(&tokens),
            vec![
                TokenKind::Keyword(Keyword::Display),
                TokenKind::StringLiteral("HI".into()),
                TokenKind::Period,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn comment_lines_produce_no_tokens() {
        let text = "000100* A COMMENT LINE\n000200 STOP RUN.";
        let source = SourceFile::from_text(FileId::MAIN, text.to_string(), SourceFormat::Fixed);
        let (tokens, errors) = scan(&source);
        assert!(errors.is_empty());
        assert_eq!(tokens[0].kind, TokenKind::Keyword(Keyword::Stop));
    }

    #[test]
    fn continued_string_literal_is_spliced() {
        let mut first = String::from("000100     DISPLAY \"HELLO, ");
        while first.len() < 72 {
            first.push('X');
        }
        // The X pad is literal body; column 72 cuts the literal mid-way.
        let text = format!("{}\n000200-    \"WORLD\".", first);
        let source = SourceFile::from_text(FileId::MAIN, text, SourceFormat::Fixed);
        let (tokens, errors) = scan(&source);
        assert!(errors.is_empty(), "{:?}", errors);
        match &tokens[1].kind {
            TokenKind::StringLiteral(s) => {
                assert!(s.starts_with("HELLO, "));
                assert!(s.ends_with("WORLD"));
            }
            other => panic!("expected string literal, got {:?}", other),
        }
    }

    #[test]
    fn unterminated_literal_reports_error_and_continues() {
        let (tokens, errors) = scan_free("DISPLAY \"OOPS\nSTOP RUN.");
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], CobolError::Lex { .. }));
        // Scanning continued on the next line.
        assert!(kinds(&tokens).contains(&TokenKind::Keyword(Keyword::Stop)));
    }

    #[test]
    fn comparison_operators() {
        let (tokens, errors) = scan_free("IF A >= 10 AND B <= 2");
        assert!(errors.is_empty());
        let ks = kinds(&tokens);
        assert!(ks.contains(&TokenKind::GreaterEqual));
        assert!(ks.contains(&TokenKind::LessEqual));
    }

    #[test]
    fn invalid_character_is_accumulated() {
        let (tokens, errors) = scan_free("MOVE ~ TO B.");
        assert_eq!(errors.len(), 1);
        assert!(kinds(&tokens).contains(&TokenKind::Keyword(Keyword::To)));
    }
}
