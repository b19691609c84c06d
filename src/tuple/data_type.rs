use std::fmt;

use crate::common::DEFAULT_STRING_LEN;

/// Represents the data types a column can hold.
/// Every type has a fixed on-disk width so records can live in fixed slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    /// 32-bit signed integer: 4 bytes, big-endian two's complement
    Integer,

    /// Text of at most n bytes.
    /// Stored as: logical length (4 bytes) + n bytes, zero-padded
    Text(u16),
}

impl DataType {
    /// Length prefix in front of every text value
    pub const TEXT_LEN_PREFIX: usize = 4;

    /// Returns the on-disk width in bytes.
    pub fn width(&self) -> usize {
        match self {
            DataType::Integer => 4,
            DataType::Text(n) => Self::TEXT_LEN_PREFIX + *n as usize,
        }
    }

    /// Parses a catalog type name (`int` or `string`, case-insensitive).
    pub fn from_catalog_name(name: &str) -> Option<Self> {
        if name.eq_ignore_ascii_case("int") {
            Some(DataType::Integer)
        } else if name.eq_ignore_ascii_case("string") {
            Some(DataType::Text(DEFAULT_STRING_LEN))
        } else {
            None
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Integer => write!(f, "INT"),
            DataType::Text(n) => write!(f, "STRING({})", n),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_widths() {
        assert_eq!(DataType::Integer.width(), 4);
        assert_eq!(DataType::Text(128).width(), 132);
    }

    #[test]
    fn test_catalog_names() {
        assert_eq!(DataType::from_catalog_name("INT"), Some(DataType::Integer));
        assert_eq!(
            DataType::from_catalog_name("String"),
            Some(DataType::Text(DEFAULT_STRING_LEN))
        );
        assert_eq!(DataType::from_catalog_name("float"), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(DataType::Integer.to_string(), "INT");
        assert_eq!(DataType::Text(10).to_string(), "STRING(10)");
    }
}
