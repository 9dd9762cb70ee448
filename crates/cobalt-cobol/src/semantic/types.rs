//! Resolved data types.
//!
//! Every data item resolves to one of a closed set of types. Usage
//! (DISPLAY / COMP / COMP-3) selects the storage width of a numeric item
//! but never changes its logical type.

use crate::ast::{PictureCategory, PictureClause, SignClause, Usage};

/// The resolved type of a data item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataType {
    /// A group item; `len` is the summed size of its subordinates.
    Group { len: u32 },
    /// A fixed-point number.
    Numeric {
        /// Total digit positions.
        digits: u32,
        /// Digit positions right of the assumed decimal point.
        scale: u32,
        signed: bool,
        storage: NumericStorage,
    },
    /// PIC X / PIC A character data.
    Alphanumeric { len: u32 },
    /// An edited picture; receives formatted output only.
    AlphanumericEdited { len: u32 },
    /// A level-88 condition name. Owns no storage.
    ConditionName,
}

impl DataType {
    /// Storage width in bytes. Condition names occupy nothing.
    pub fn byte_size(&self) -> u32 {
        match self {
            DataType::Group { len } => *len,
            DataType::Numeric {
                digits,
                signed,
                storage,
                ..
            } => storage.byte_size(*digits, *signed),
            DataType::Alphanumeric { len } => *len,
            DataType::AlphanumericEdited { len } => *len,
            DataType::ConditionName => 0,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, DataType::Numeric { .. })
    }
}

/// How a numeric item is laid out in storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumericStorage {
    /// One byte per digit (zoned decimal).
    Display {
        /// A SIGN SEPARATE clause adds one byte.
        separate_sign: bool,
    },
    /// COMP / BINARY: two, four, or eight bytes by digit count.
    Binary,
    /// COMP-3: packed decimal, two digits per byte plus a sign nibble.
    PackedDecimal,
}

impl NumericStorage {
    pub fn byte_size(&self, digits: u32, _signed: bool) -> u32 {
        match self {
            NumericStorage::Display { separate_sign } => {
                digits + if *separate_sign { 1 } else { 0 }
            }
            NumericStorage::Binary => match digits {
                0..=4 => 2,
                5..=9 => 4,
                _ => 8,
            },
            NumericStorage::PackedDecimal => digits / 2 + 1,
        }
    }
}

/// Resolve an elementary item's type from its PICTURE, USAGE, and SIGN
/// clauses.
pub fn resolve_elementary(
    picture: &PictureClause,
    usage: Option<Usage>,
    sign: Option<SignClause>,
) -> DataType {
    match picture.category {
        PictureCategory::Numeric => {
            let storage = match usage.unwrap_or_default() {
                Usage::Display => NumericStorage::Display {
                    separate_sign: sign.map(|s| s.separate).unwrap_or(false),
                },
                Usage::Binary => NumericStorage::Binary,
                Usage::PackedDecimal => NumericStorage::PackedDecimal,
            };
            DataType::Numeric {
                digits: picture.size,
                scale: picture.decimal_positions,
                signed: picture.signed,
                storage,
            }
        }
        PictureCategory::Alphabetic | PictureCategory::Alphanumeric => DataType::Alphanumeric {
            len: picture.size,
        },
        PictureCategory::NumericEdited | PictureCategory::AlphanumericEdited => {
            DataType::AlphanumericEdited { len: picture.size }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binary_widths_step_by_digits() {
        let s = NumericStorage::Binary;
        assert_eq!(s.byte_size(4, false), 2);
        assert_eq!(s.byte_size(5, false), 4);
        assert_eq!(s.byte_size(9, true), 4);
        assert_eq!(s.byte_size(10, true), 8);
        assert_eq!(s.byte_size(18, true), 8);
    }

    #[test]
    fn packed_decimal_width() {
        let s = NumericStorage::PackedDecimal;
        // S9(7)V99: 9 digits -> 5 bytes.
        assert_eq!(s.byte_size(9, true), 5);
        assert_eq!(s.byte_size(5, true), 3);
    }

    #[test]
    fn display_width_with_separate_sign() {
        let s = NumericStorage::Display {
            separate_sign: true,
        };
        assert_eq!(s.byte_size(5, true), 6);
    }
}
