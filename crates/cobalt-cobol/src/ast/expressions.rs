//! Expression and condition nodes.

use cobalt_lang_core::Span;

/// A (possibly qualified, possibly subscripted) data-name reference.
#[derive(Debug, Clone, PartialEq)]
pub struct QualifiedName {
    /// The referenced name, uppercased.
    pub name: String,
    /// OF/IN qualifiers, outermost last.
    pub qualifiers: Vec<String>,
    /// Subscript expressions, if any.
    pub subscripts: Vec<Expression>,
    pub span: Span,
}

impl QualifiedName {
    /// An unqualified, unsubscripted reference.
    pub fn simple(name: impl Into<String>, span: Span) -> Self {
        Self {
            name: name.into(),
            qualifiers: Vec::new(),
            subscripts: Vec::new(),
            span,
        }
    }
}

/// Literal values.
#[derive(Debug, Clone, PartialEq)]
pub struct Literal {
    pub kind: LiteralKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LiteralKind {
    Integer(i64),
    /// Kept as text so the scale survives exactly.
    Decimal(String),
    String(String),
    Figurative(Figurative),
}

/// Figurative constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Figurative {
    Zero,
    Space,
    HighValue,
    LowValue,
    Quote,
}

/// Arithmetic expressions.
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Literal(Literal),
    Variable(QualifiedName),
    Binary {
        op: BinaryOp,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expression>,
    },
    Paren(Box<Expression>),
}

impl Expression {
    pub fn span(&self) -> Span {
        match self {
            Expression::Literal(lit) => lit.span,
            Expression::Variable(name) => name.span,
            Expression::Binary { left, right, .. } => left.span().extend(right.span()),
            Expression::Unary { operand, .. } => operand.span(),
            Expression::Paren(inner) => inner.span(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Power,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Negate,
    Plus,
}

/// Conditions, preserving source AND/OR structure so short-circuit order
/// survives into the translated output.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Comparison {
        left: Expression,
        op: ComparisonOp,
        right: Expression,
    },
    /// Class tests: IS NUMERIC, IS ALPHABETIC, IS POSITIVE...
    Class {
        operand: Expression,
        class: ClassTest,
        negated: bool,
    },
    /// A level-88 condition name.
    ConditionName(QualifiedName),
    Not(Box<Condition>),
    And(Box<Condition>, Box<Condition>),
    Or(Box<Condition>, Box<Condition>),
    Paren(Box<Condition>),
}

impl Condition {
    pub fn span(&self) -> Span {
        match self {
            Condition::Comparison { left, right, .. } => left.span().extend(right.span()),
            Condition::Class { operand, .. } => operand.span(),
            Condition::ConditionName(name) => name.span,
            Condition::Not(inner) | Condition::Paren(inner) => inner.span(),
            Condition::And(l, r) | Condition::Or(l, r) => l.span().extend(r.span()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOp {
    Equal,
    NotEqual,
    Greater,
    GreaterOrEqual,
    Less,
    LessOrEqual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassTest {
    Numeric,
    Alphabetic,
    Positive,
    Negative,
    Zero,
}
