//! DATA DIVISION nodes.
//!
//! Data items form a tree driven by level numbers: an item owns every
//! following item with a higher level until one at its own level or lower
//! appears. Level 88 entries never own storage; they are collected onto
//! their parent as condition values.

use cobalt_lang_core::Span;

use super::expressions::Literal;

/// The name slot of a data item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataItemName {
    Named(String),
    Filler,
}

impl DataItemName {
    /// The name, or "FILLER" for anonymous items.
    pub fn as_str(&self) -> &str {
        match self {
            DataItemName::Named(s) => s,
            DataItemName::Filler => "FILLER",
        }
    }
}

/// A data description entry and its children.
#[derive(Debug, Clone, PartialEq)]
pub struct DataItem {
    /// Level number: 01-49, 66, 77, or 88.
    pub level: u8,
    pub name: DataItemName,
    pub picture: Option<PictureClause>,
    pub usage: Option<Usage>,
    pub value: Option<Literal>,
    pub occurs: Option<OccursClause>,
    /// Name of the item this one redefines.
    pub redefines: Option<String>,
    pub sign: Option<SignClause>,
    pub justified_right: bool,
    pub blank_when_zero: bool,
    /// Subordinate items (group items only).
    pub children: Vec<DataItem>,
    /// Level-88 condition names declared under this item.
    pub condition_values: Vec<ConditionValue>,
    pub span: Span,
}

impl DataItem {
    /// Whether this item is a group (no PICTURE, has children).
    pub fn is_group(&self) -> bool {
        self.picture.is_none() && !self.children.is_empty()
    }
}

/// A level-88 condition name and the values that satisfy it.
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionValue {
    pub name: String,
    pub values: Vec<ConditionSpec>,
    pub span: Span,
}

/// One entry in a level-88 VALUE list.
#[derive(Debug, Clone, PartialEq)]
pub enum ConditionSpec {
    /// A single satisfying value.
    Single(Literal),
    /// An inclusive `low THRU high` range.
    Range(Literal, Literal),
}

/// An interpreted PICTURE clause.
#[derive(Debug, Clone, PartialEq)]
pub struct PictureClause {
    /// The raw picture string, e.g. `S9(5)V99`.
    pub picture: String,
    pub category: PictureCategory,
    /// Total digit or character positions (storage positions only).
    pub size: u32,
    /// Digit positions to the right of the assumed decimal point.
    pub decimal_positions: u32,
    /// Whether an S sign symbol is present.
    pub signed: bool,
    pub span: Span,
}

/// Category a picture string resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PictureCategory {
    Numeric,
    Alphabetic,
    Alphanumeric,
    NumericEdited,
    AlphanumericEdited,
}

/// USAGE clause storage selections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Usage {
    #[default]
    Display,
    /// COMP / BINARY.
    Binary,
    /// COMP-3 / PACKED-DECIMAL.
    PackedDecimal,
}

/// An OCCURS clause, fixed or DEPENDING ON.
#[derive(Debug, Clone, PartialEq)]
pub struct OccursClause {
    /// Minimum occurrence count (equals `max_times` when fixed).
    pub times: u32,
    /// Maximum occurrence count.
    pub max_times: u32,
    /// Controlling item for variable-length tables.
    pub depending_on: Option<String>,
    /// INDEXED BY index names.
    pub indexed_by: Vec<String>,
    pub span: Span,
}

impl OccursClause {
    /// Whether the table length varies at run time.
    pub fn is_variable(&self) -> bool {
        self.depending_on.is_some()
    }
}

/// A SIGN clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignClause {
    pub leading: bool,
    pub separate: bool,
}
