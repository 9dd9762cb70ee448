//! Target-neutral intermediate representation.
//!
//! Translation lowers the parse tree and symbol table into this small
//! node set; code generation walks it without ever looking back at the
//! source program. Every node is plain data, so generation can run any
//! number of times over the same program and emit identical output.

/// A reference to a data item in the generated program, already
/// sanitized for the target language.
#[derive(Debug, Clone, PartialEq)]
pub struct Path {
    /// Attribute chain from the record root down to the field.
    pub segments: Vec<String>,
    /// One-based subscript expression for table items, applied to the
    /// final segment. Generation shifts it to the target's base.
    pub index: Option<Box<Value>>,
}

impl Path {
    pub fn new(segments: Vec<String>) -> Self {
        Path {
            segments,
            index: None,
        }
    }

    pub fn local(name: impl Into<String>) -> Self {
        Path::new(vec![name.into()])
    }

    pub fn indexed(mut self, index: Value) -> Self {
        self.index = Some(Box::new(index));
        self
    }
}

/// A literal constant.
#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    Int(i64),
    /// Kept textual so the scale survives exactly.
    Decimal(String),
    Str(String),
}

/// A value-producing expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Literal(Constant),
    Record(Path),
    Binary {
        op: ArithOp,
        left: Box<Value>,
        right: Box<Value>,
    },
    Unary {
        op: UnaryArithOp,
        operand: Box<Value>,
    },
}

impl Value {
    pub fn int(n: i64) -> Self {
        Value::Literal(Constant::Int(n))
    }

    pub fn str(s: impl Into<String>) -> Self {
        Value::Literal(Constant::Str(s.into()))
    }

    pub fn var(path: Path) -> Self {
        Value::Record(path)
    }

    pub fn binary(op: ArithOp, left: Value, right: Value) -> Self {
        Value::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Power,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryArithOp {
    Negate,
}

/// A boolean condition.
#[derive(Debug, Clone, PartialEq)]
pub enum Cond {
    Compare {
        op: CmpOp,
        left: Value,
        right: Value,
    },
    And(Box<Cond>, Box<Cond>),
    Or(Box<Cond>, Box<Cond>),
    Not(Box<Cond>),
    /// IS NUMERIC and friends.
    ClassTest { value: Value, class: ClassKind },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Equal,
    NotEqual,
    Greater,
    GreaterOrEqual,
    Less,
    LessOrEqual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassKind {
    Numeric,
    Alphabetic,
    Positive,
    Negative,
    Zero,
}

/// How an assignment conforms its value to the destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssignMode {
    /// Fixed-point destination. Excess fractional digits are dropped
    /// toward zero unless `rounded`, which rounds half away from zero
    /// the way ROUNDED does.
    Numeric {
        digits: u32,
        scale: u32,
        rounded: bool,
    },
    /// Fixed-length text destination. Short values are space-padded on
    /// the right, long values truncated on the right.
    Alphanumeric { len: u32 },
    /// No conformance, the value is stored as produced.
    Raw,
}

/// File operation kinds. DISPLAY and ACCEPT are modeled as operations
/// on the console pseudo-file so all I/O flows through one node.
#[derive(Debug, Clone, PartialEq)]
pub enum FileOpKind {
    Open { mode: OpenMode },
    Close,
    Read { into: Option<(Path, AssignMode)> },
    Write { from: Option<Value> },
    Display { operands: Vec<Value>, newline: bool },
    Accept { target: Path, mode: AssignMode },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    Input,
    Output,
    Extend,
    InputOutput,
}

/// Condition-handler bodies attached to a file operation.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FileHandlers {
    pub at_end: Option<Vec<Ir>>,
    pub not_at_end: Option<Vec<Ir>>,
    pub invalid_key: Option<Vec<Ir>>,
    pub not_invalid_key: Option<Vec<Ir>>,
}

impl FileHandlers {
    pub fn is_empty(&self) -> bool {
        self.at_end.is_none()
            && self.not_at_end.is_none()
            && self.invalid_key.is_none()
            && self.not_invalid_key.is_none()
    }
}

/// A destination of an arithmetic statement.
#[derive(Debug, Clone, PartialEq)]
pub struct ArithTarget {
    pub path: Path,
    pub mode: AssignMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopKind {
    /// PERFORM n TIMES.
    Count,
    /// Pre-test loop; the condition is the *continue* condition.
    While,
    /// Post-test loop (WITH TEST AFTER).
    PostTest,
}

/// The statement-level node set.
#[derive(Debug, Clone, PartialEq)]
pub enum Ir {
    Sequence(Vec<Ir>),
    Assign {
        target: Path,
        value: Value,
        mode: AssignMode,
    },
    /// COMPUTE / ADD / SUBTRACT / MULTIPLY / DIVIDE with optional
    /// ON SIZE ERROR guards. The guard fires when the conformed result
    /// cannot hold the value's integer digits.
    Arithmetic {
        expression: Value,
        targets: Vec<ArithTarget>,
        on_size_error: Option<Vec<Ir>>,
        not_on_size_error: Option<Vec<Ir>>,
    },
    Conditional {
        arms: Vec<(Cond, Vec<Ir>)>,
        else_arm: Option<Vec<Ir>>,
    },
    Loop {
        kind: LoopKind,
        /// Iteration count for Count, condition for While/PostTest.
        count: Option<Value>,
        cond: Option<Cond>,
        body: Vec<Ir>,
    },
    /// Invoke a paragraph. A `transfer` call abandons the current
    /// paragraph and names the next one to the dispatch driver; a
    /// non-transfer call returns here when the paragraph falls off
    /// its end.
    Call {
        paragraph: String,
        transfer: bool,
    },
    FileOp {
        op: FileOpKind,
        file: String,
        handlers: FileHandlers,
    },
    ExternalCall {
        program: Value,
        using: Vec<Path>,
        returning: Option<Path>,
    },
}

/// Transfer target handed to the dispatch driver when a program unit
/// stops instead of falling through.
pub const STOP_TARGET: &str = "$STOP";

/// Name of the console pseudo-file carrying DISPLAY and ACCEPT.
pub const CONSOLE_FILE: &str = "$CONSOLE";

/// A translated paragraph.
#[derive(Debug, Clone, PartialEq)]
pub struct IrParagraph {
    /// Sanitized function name.
    pub name: String,
    /// Original paragraph name.
    pub source_name: String,
    pub body: Vec<Ir>,
    /// Next paragraph when control falls off the end, if any.
    pub fall_through: Option<String>,
    /// Translation was halted by a blocking finding; the body is a
    /// stub that raises at run time.
    pub blocked: bool,
}

/// An elementary field of a translated record.
#[derive(Debug, Clone, PartialEq)]
pub struct IrField {
    pub name: String,
    pub source_name: String,
    pub ty: FieldType,
    pub initial: Option<Constant>,
    /// Fixed table length for OCCURS items (variable tables carry
    /// their maximum).
    pub occurs: Option<u32>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldType {
    Int { digits: u32 },
    Decimal { digits: u32, scale: u32 },
    Str { len: u32 },
    Group(IrRecord),
}

/// A translated record layout, one per 01-level item.
#[derive(Debug, Clone, PartialEq)]
pub struct IrRecord {
    /// Sanitized class name.
    pub name: String,
    pub source_name: String,
    pub fields: Vec<IrField>,
}

/// A translated file connector.
#[derive(Debug, Clone, PartialEq)]
pub struct IrFile {
    pub name: String,
    pub source_name: String,
    pub assign_to: Option<String>,
    /// Record layout read into / written from, by sanitized name.
    pub record: Option<String>,
}

/// The whole translated program.
#[derive(Debug, Clone, PartialEq)]
pub struct IrProgram {
    /// Sanitized module-level name.
    pub name: String,
    /// Original PROGRAM-ID.
    pub source_name: String,
    pub records: Vec<IrRecord>,
    /// Standalone elementary items, generated as module-level variables.
    pub scalars: Vec<IrField>,
    pub files: Vec<IrFile>,
    pub paragraphs: Vec<IrParagraph>,
    /// Paragraph the driver starts in.
    pub entry: String,
}

impl IrProgram {
    pub fn paragraph(&self, name: &str) -> Option<&IrParagraph> {
        self.paragraphs.iter().find(|p| p.name == name)
    }

    /// True when any paragraph ends in a transfer, which forces the
    /// dispatch-driver shape on the generated main routine.
    pub fn needs_dispatch(&self) -> bool {
        fn has_transfer(nodes: &[Ir]) -> bool {
            nodes.iter().any(|node| match node {
                Ir::Call { transfer, .. } => *transfer,
                Ir::Sequence(inner) => has_transfer(inner),
                Ir::Conditional { arms, else_arm } => {
                    arms.iter().any(|(_, body)| has_transfer(body))
                        || else_arm.as_deref().is_some_and(has_transfer)
                }
                Ir::Loop { body, .. } => has_transfer(body),
                Ir::Arithmetic {
                    on_size_error,
                    not_on_size_error,
                    ..
                } => {
                    on_size_error.as_deref().is_some_and(has_transfer)
                        || not_on_size_error.as_deref().is_some_and(has_transfer)
                }
                Ir::FileOp { handlers, .. } => {
                    handlers.at_end.as_deref().is_some_and(has_transfer)
                        || handlers.not_at_end.as_deref().is_some_and(has_transfer)
                        || handlers.invalid_key.as_deref().is_some_and(has_transfer)
                        || handlers.not_invalid_key.as_deref().is_some_and(has_transfer)
                }
                _ => false,
            })
        }
        self.paragraphs.iter().any(|p| has_transfer(&p.body))
    }
}
