//! Expression, name, and condition parsers.
//!
//! Arithmetic precedence (loosest to tightest): additive, multiplicative,
//! exponentiation (right associative), unary. Conditions keep the source
//! AND/OR shape so evaluation order survives translation.

use super::Result;
use crate::ast::*;
use crate::error::CobolError;
use crate::lexer::{Keyword, TokenKind};

impl super::Parser {
    // ========================================================================
    // Arithmetic expressions
    // ========================================================================

    pub(super) fn parse_expression(&mut self) -> Result<Expression> {
        self.parse_additive()
    }

    fn parse_additive(&mut self) -> Result<Expression> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = if self.check(TokenKind::Plus) {
                BinaryOp::Add
            } else if self.check(TokenKind::Minus) {
                BinaryOp::Subtract
            } else {
                break;
            };
            self.advance();
            let right = self.parse_multiplicative()?;
            left = Expression::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<Expression> {
        let mut left = self.parse_power()?;
        loop {
            let op = if self.check(TokenKind::Star) {
                BinaryOp::Multiply
            } else if self.check(TokenKind::Slash) {
                BinaryOp::Divide
            } else {
                break;
            };
            self.advance();
            let right = self.parse_power()?;
            left = Expression::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_power(&mut self) -> Result<Expression> {
        let base = self.parse_unary()?;
        if self.check(TokenKind::StarStar) {
            self.advance();
            // Right associative.
            let exponent = self.parse_power()?;
            return Ok(Expression::Binary {
                op: BinaryOp::Power,
                left: Box::new(base),
                right: Box::new(exponent),
            });
        }
        Ok(base)
    }

    fn parse_unary(&mut self) -> Result<Expression> {
        if self.check(TokenKind::Minus) {
            self.advance();
            let operand = self.parse_unary()?;
            return Ok(Expression::Unary {
                op: UnaryOp::Negate,
                operand: Box::new(operand),
            });
        }
        if self.check(TokenKind::Plus) {
            self.advance();
            let operand = self.parse_unary()?;
            return Ok(Expression::Unary {
                op: UnaryOp::Plus,
                operand: Box::new(operand),
            });
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expression> {
        if self.check(TokenKind::Lparen) {
            self.advance();
            let inner = self.parse_expression()?;
            self.expect(TokenKind::Rparen)?;
            return Ok(Expression::Paren(Box::new(inner)));
        }
        if self.check_literal() || self.check_figurative_constant() {
            return Ok(Expression::Literal(self.parse_literal()?));
        }
        Ok(Expression::Variable(self.parse_qualified_name()?))
    }

    /// A literal, including figurative constants and signed numbers.
    pub(super) fn parse_literal(&mut self) -> Result<Literal> {
        let span = self.current_span();

        if self.check(TokenKind::Minus) {
            self.advance();
            let inner = self.parse_literal()?;
            let kind = match inner.kind {
                LiteralKind::Integer(n) => LiteralKind::Integer(-n),
                LiteralKind::Decimal(s) => LiteralKind::Decimal(format!("-{}", s)),
                other => other,
            };
            return Ok(Literal {
                kind,
                span: span.extend(inner.span),
            });
        }

        // ALL "x" repeats the literal; the repetition is a property of the
        // receiving field, so the inner literal suffices here.
        if self.check_keyword(Keyword::All) {
            self.advance();
            return self.parse_literal();
        }

        let kind = match &self.current().kind {
            TokenKind::IntegerLiteral(n) => LiteralKind::Integer(*n),
            TokenKind::DecimalLiteral(s) => LiteralKind::Decimal(s.clone()),
            TokenKind::StringLiteral(s) => LiteralKind::String(s.clone()),
            TokenKind::Keyword(kw) => match kw {
                Keyword::Zero | Keyword::Zeros | Keyword::Zeroes => {
                    LiteralKind::Figurative(Figurative::Zero)
                }
                Keyword::Space | Keyword::Spaces => LiteralKind::Figurative(Figurative::Space),
                Keyword::HighValue | Keyword::HighValues => {
                    LiteralKind::Figurative(Figurative::HighValue)
                }
                Keyword::LowValue | Keyword::LowValues => {
                    LiteralKind::Figurative(Figurative::LowValue)
                }
                Keyword::Quote | Keyword::Quotes => LiteralKind::Figurative(Figurative::Quote),
                other => {
                    return Err(CobolError::parse(
                        format!("expected literal, found {}", other.as_str()),
                        span,
                    ))
                }
            },
            other => {
                return Err(CobolError::parse(
                    format!("expected literal, found {:?}", other),
                    span,
                ))
            }
        };
        self.advance();
        Ok(Literal { kind, span })
    }

    /// A data-name reference with optional OF/IN qualifiers and subscripts.
    pub(super) fn parse_qualified_name(&mut self) -> Result<QualifiedName> {
        let span = self.current_span();
        let name = self.expect_identifier()?;

        let mut qualifiers = Vec::new();
        while self.check_keyword(Keyword::Of) || self.check_keyword(Keyword::In) {
            self.advance();
            qualifiers.push(self.expect_identifier()?);
        }

        let mut subscripts = Vec::new();
        if self.check(TokenKind::Lparen) {
            self.advance();
            loop {
                subscripts.push(self.parse_expression()?);
                if self.check(TokenKind::Comma) {
                    self.advance();
                    continue;
                }
                break;
            }
            self.expect(TokenKind::Rparen)?;
        }

        Ok(QualifiedName {
            name,
            qualifiers,
            subscripts,
            span: span.extend(self.previous_span()),
        })
    }

    // ========================================================================
    // Conditions
    // ========================================================================

    pub(super) fn parse_condition(&mut self) -> Result<Condition> {
        self.parse_or_condition()
    }

    fn parse_or_condition(&mut self) -> Result<Condition> {
        let mut left = self.parse_and_condition()?;
        while self.check_keyword(Keyword::Or) {
            self.advance();
            let right = self.parse_and_condition()?;
            left = Condition::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and_condition(&mut self) -> Result<Condition> {
        let mut left = self.parse_not_condition()?;
        while self.check_keyword(Keyword::And) {
            self.advance();
            let right = self.parse_not_condition()?;
            left = Condition::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_not_condition(&mut self) -> Result<Condition> {
        if self.check_keyword(Keyword::Not) {
            self.advance();
            let inner = self.parse_not_condition()?;
            return Ok(Condition::Not(Box::new(inner)));
        }
        self.parse_primary_condition()
    }

    fn parse_primary_condition(&mut self) -> Result<Condition> {
        // A parenthesis may open a nested condition or a parenthesized
        // arithmetic operand; try the condition reading first and fall
        // back within the parentheses only.
        if self.check(TokenKind::Lparen) {
            let saved = self.position();
            self.advance();
            if let Ok(inner) = self.parse_condition() {
                if self.check(TokenKind::Rparen) {
                    self.advance();
                    return Ok(Condition::Paren(Box::new(inner)));
                }
            }
            self.rewind(saved);
        }

        let left = self.parse_expression()?;
        self.skip_if(TokenKind::Keyword(Keyword::Is));

        let mut negated = false;
        if self.check_keyword(Keyword::Not) {
            negated = true;
            self.advance();
        }

        // Class tests.
        if let Some(class) = self.parse_class_test() {
            return Ok(Condition::Class {
                operand: left,
                class,
                negated,
            });
        }

        // Relational operator, symbolic or spelled out.
        if let Some(op) = self.parse_comparison_op()? {
            let op = if negated { invert(op) } else { op };
            let right = self.parse_expression()?;
            return Ok(Condition::Comparison { left, op, right });
        }

        if negated {
            return Err(CobolError::parse(
                "expected relational operator or class test after NOT",
                self.current_span(),
            ));
        }

        // A bare data-name is a level-88 condition-name test.
        match left {
            Expression::Variable(name) => Ok(Condition::ConditionName(name)),
            other => Err(CobolError::parse(
                "expected condition",
                other.span(),
            )),
        }
    }

    fn parse_class_test(&mut self) -> Option<ClassTest> {
        let class = if self.check_keyword(Keyword::Numeric) {
            ClassTest::Numeric
        } else if self.check_keyword(Keyword::Alphabetic) {
            ClassTest::Alphabetic
        } else if self.check_keyword(Keyword::Positive) {
            ClassTest::Positive
        } else if self.check_keyword(Keyword::Negative) {
            ClassTest::Negative
        } else if self.check_keyword(Keyword::Zero)
            || self.check_keyword(Keyword::Zeros)
            || self.check_keyword(Keyword::Zeroes)
        {
            ClassTest::Zero
        } else {
            return None;
        };
        self.advance();
        Some(class)
    }

    /// Consume a relational operator if one is present.
    fn parse_comparison_op(&mut self) -> Result<Option<ComparisonOp>> {
        if self.check(TokenKind::Equals) {
            self.advance();
            return Ok(Some(ComparisonOp::Equal));
        }
        if self.check(TokenKind::GreaterEqual) {
            self.advance();
            return Ok(Some(ComparisonOp::GreaterOrEqual));
        }
        if self.check(TokenKind::LessEqual) {
            self.advance();
            return Ok(Some(ComparisonOp::LessOrEqual));
        }
        if self.check(TokenKind::Greater) {
            self.advance();
            return Ok(Some(self.maybe_or_equal(ComparisonOp::Greater)));
        }
        if self.check(TokenKind::Less) {
            self.advance();
            return Ok(Some(self.maybe_or_equal(ComparisonOp::Less)));
        }
        if self.check_keyword(Keyword::Equal) {
            self.advance();
            self.skip_if(TokenKind::Keyword(Keyword::To));
            return Ok(Some(ComparisonOp::Equal));
        }
        if self.check_keyword(Keyword::Greater) {
            self.advance();
            self.skip_if(TokenKind::Keyword(Keyword::Than));
            return Ok(Some(self.maybe_or_equal(ComparisonOp::Greater)));
        }
        if self.check_keyword(Keyword::Less) {
            self.advance();
            self.skip_if(TokenKind::Keyword(Keyword::Than));
            return Ok(Some(self.maybe_or_equal(ComparisonOp::Less)));
        }
        Ok(None)
    }

    /// GREATER [THAN] OR EQUAL [TO] and the LESS equivalent.
    fn maybe_or_equal(&mut self, base: ComparisonOp) -> ComparisonOp {
        if self.check_keyword(Keyword::Or) && self.peek_keyword(Keyword::Equal) {
            self.advance();
            self.advance();
            self.skip_if(TokenKind::Keyword(Keyword::To));
            return match base {
                ComparisonOp::Greater => ComparisonOp::GreaterOrEqual,
                ComparisonOp::Less => ComparisonOp::LessOrEqual,
                other => other,
            };
        }
        base
    }

    pub(super) fn position(&self) -> usize {
        self.current
    }

    pub(super) fn rewind(&mut self, position: usize) {
        self.current = position;
    }
}

fn invert(op: ComparisonOp) -> ComparisonOp {
    match op {
        ComparisonOp::Equal => ComparisonOp::NotEqual,
        ComparisonOp::NotEqual => ComparisonOp::Equal,
        ComparisonOp::Greater => ComparisonOp::LessOrEqual,
        ComparisonOp::GreaterOrEqual => ComparisonOp::Less,
        ComparisonOp::Less => ComparisonOp::GreaterOrEqual,
        ComparisonOp::LessOrEqual => ComparisonOp::Greater,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::{scan, FileId, SourceFile, SourceFormat};
    use crate::parser::Parser;

    fn parser_for(text: &str) -> Parser {
        let source = SourceFile::from_text(FileId::MAIN, text.to_string(), SourceFormat::Free);
        let (tokens, errors) = scan(&source);
        assert!(errors.is_empty(), "{:?}", errors);
        Parser::new(tokens)
    }

    #[test]
    fn precedence_multiply_binds_tighter() {
        let mut p = parser_for("A + B * C");
        let expr = p.parse_expression().unwrap();
        match expr {
            Expression::Binary { op, right, .. } => {
                assert_eq!(op, BinaryOp::Add);
                assert!(matches!(
                    *right,
                    Expression::Binary {
                        op: BinaryOp::Multiply,
                        ..
                    }
                ));
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn power_is_right_associative() {
        let mut p = parser_for("A ** B ** C");
        let expr = p.parse_expression().unwrap();
        match expr {
            Expression::Binary { op, right, .. } => {
                assert_eq!(op, BinaryOp::Power);
                assert!(matches!(
                    *right,
                    Expression::Binary {
                        op: BinaryOp::Power,
                        ..
                    }
                ));
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn qualified_name_with_subscript() {
        let mut p = parser_for("WS-ENTRY OF WS-TABLE (I, 2)");
        let name = p.parse_qualified_name().unwrap();
        assert_eq!(name.name, "WS-ENTRY");
        assert_eq!(name.qualifiers, vec!["WS-TABLE".to_string()]);
        assert_eq!(name.subscripts.len(), 2);
    }

    #[test]
    fn spelled_out_comparison() {
        let mut p = parser_for("WS-A IS GREATER THAN OR EQUAL TO 10");
        let cond = p.parse_condition().unwrap();
        assert!(matches!(
            cond,
            Condition::Comparison {
                op: ComparisonOp::GreaterOrEqual,
                ..
            }
        ));
    }

    #[test]
    fn not_equal_folds_into_operator() {
        let mut p = parser_for("WS-A NOT = 5");
        let cond = p.parse_condition().unwrap();
        assert!(matches!(
            cond,
            Condition::Comparison {
                op: ComparisonOp::NotEqual,
                ..
            }
        ));
    }

    #[test]
    fn and_or_structure_is_preserved() {
        let mut p = parser_for("A = 1 AND B = 2 OR C = 3");
        let cond = p.parse_condition().unwrap();
        // OR at the top: (A AND B) OR C.
        match cond {
            Condition::Or(left, _) => assert!(matches!(*left, Condition::And(_, _))),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn class_condition() {
        let mut p = parser_for("WS-AMT IS NOT NUMERIC");
        let cond = p.parse_condition().unwrap();
        assert!(matches!(
            cond,
            Condition::Class {
                class: ClassTest::Numeric,
                negated: true,
                ..
            }
        ));
    }

    #[test]
    fn condition_name_test() {
        let mut p = parser_for("NO-MORE-DATA");
        let cond = p.parse_condition().unwrap();
        assert!(matches!(cond, Condition::ConditionName(n) if n.name == "NO-MORE-DATA"));
    }

    #[test]
    fn parenthesized_condition() {
        let mut p = parser_for("(A = 1 OR B = 2) AND C = 3");
        let cond = p.parse_condition().unwrap();
        match cond {
            Condition::And(left, _) => assert!(matches!(*left, Condition::Paren(_))),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn parenthesized_arithmetic_in_condition() {
        let mut p = parser_for("(A + B) > 10");
        let cond = p.parse_condition().unwrap();
        assert!(matches!(
            cond,
            Condition::Comparison {
                op: ComparisonOp::Greater,
                ..
            }
        ));
    }

    #[test]
    fn negative_literal() {
        let mut p = parser_for("-5");
        let lit = p.parse_literal().unwrap();
        assert_eq!(lit.kind, LiteralKind::Integer(-5));
    }
}
