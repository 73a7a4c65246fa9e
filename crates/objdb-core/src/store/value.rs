//! Column type tags and cell values.

use rkyv::{Archive, Deserialize, Serialize};
use thiserror::Error;

/// Native column type tags of the tabular store.
///
/// The discriminant values are the on-disk type tags; `PropertyType` in the
/// schema layer reuses them so a property type converts to a column tag
/// without a lookup table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Archive, Serialize, Deserialize)]
#[repr(u8)]
pub enum ColumnType {
    /// 64-bit signed integer.
    Int = 0,
    /// Boolean.
    Bool = 1,
    /// UTF-8 string.
    String = 2,
    /// Binary data.
    Data = 4,
    /// Dynamically typed value.
    Any = 6,
    /// Timestamp (nanoseconds since Unix epoch).
    Date = 8,
    /// 32-bit floating point.
    Float = 9,
    /// 64-bit floating point.
    Double = 10,
    /// To-one link into another table.
    Link = 12,
    /// To-many link list into another table.
    LinkList = 13,
}

impl ColumnType {
    /// Check whether a search index can be attached to columns of this type.
    pub fn is_indexable(self) -> bool {
        matches!(
            self,
            ColumnType::Int | ColumnType::Bool | ColumnType::String | ColumnType::Date
        )
    }

    /// Check whether this is a link column type.
    pub fn is_link(self) -> bool {
        matches!(self, ColumnType::Link | ColumnType::LinkList)
    }
}

impl std::fmt::Display for ColumnType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ColumnType::Int => "int",
            ColumnType::Bool => "bool",
            ColumnType::String => "string",
            ColumnType::Data => "data",
            ColumnType::Any => "any",
            ColumnType::Date => "date",
            ColumnType::Float => "float",
            ColumnType::Double => "double",
            ColumnType::Link => "link",
            ColumnType::LinkList => "linklist",
        };
        f.write_str(name)
    }
}

/// A single cell value.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
pub enum Cell {
    /// Absent value in a nullable column.
    Null,
    /// Integer value.
    Int(i64),
    /// Boolean value.
    Bool(bool),
    /// String value.
    String(String),
    /// Binary value.
    Data(Vec<u8>),
    /// Timestamp value.
    Date(i64),
    /// 32-bit float value.
    Float(f32),
    /// 64-bit float value.
    Double(f64),
    /// Row reference into the link target table.
    Link(Option<u64>),
    /// Row references into the link target table.
    LinkList(Vec<u64>),
}

impl Cell {
    /// The fill value for a freshly created cell of the given column type.
    ///
    /// Nullable columns fill with `Null`; required columns fill with the
    /// type's zero value.
    pub fn default_for(ty: ColumnType, nullable: bool) -> Cell {
        if nullable {
            return match ty {
                ColumnType::Link => Cell::Link(None),
                ColumnType::LinkList => Cell::LinkList(Vec::new()),
                _ => Cell::Null,
            };
        }
        match ty {
            ColumnType::Int => Cell::Int(0),
            ColumnType::Bool => Cell::Bool(false),
            ColumnType::String => Cell::String(String::new()),
            ColumnType::Data => Cell::Data(Vec::new()),
            ColumnType::Any => Cell::Null,
            ColumnType::Date => Cell::Date(0),
            ColumnType::Float => Cell::Float(0.0),
            ColumnType::Double => Cell::Double(0.0),
            ColumnType::Link => Cell::Link(None),
            ColumnType::LinkList => Cell::LinkList(Vec::new()),
        }
    }

    /// Encode the cell into a comparison key for distinct counting.
    pub(crate) fn key(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        match self {
            Cell::Null => buf.push(0),
            Cell::Int(v) => {
                buf.push(1);
                buf.extend_from_slice(&v.to_be_bytes());
            }
            Cell::Bool(v) => {
                buf.push(2);
                buf.push(*v as u8);
            }
            Cell::String(v) => {
                buf.push(3);
                buf.extend_from_slice(v.as_bytes());
            }
            Cell::Data(v) => {
                buf.push(4);
                buf.extend_from_slice(v);
            }
            Cell::Date(v) => {
                buf.push(5);
                buf.extend_from_slice(&v.to_be_bytes());
            }
            Cell::Float(v) => {
                buf.push(6);
                buf.extend_from_slice(&v.to_bits().to_be_bytes());
            }
            Cell::Double(v) => {
                buf.push(7);
                buf.extend_from_slice(&v.to_bits().to_be_bytes());
            }
            Cell::Link(v) => {
                buf.push(8);
                if let Some(row) = v {
                    buf.extend_from_slice(&row.to_be_bytes());
                }
            }
            Cell::LinkList(v) => {
                buf.push(9);
                for row in v {
                    buf.extend_from_slice(&row.to_be_bytes());
                }
            }
        }
        buf
    }
}

/// Errors raised by the tabular store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No table with the given name or index.
    #[error("table '{0}' does not exist")]
    TableNotFound(String),

    /// No column with the given name.
    #[error("column '{0}' does not exist")]
    ColumnNotFound(String),

    /// Column index out of bounds.
    #[error("column index {0} out of bounds")]
    ColumnOutOfBounds(usize),

    /// Row index out of bounds.
    #[error("row index {0} out of bounds")]
    RowOutOfBounds(u64),

    /// Accessor type does not match the column type.
    #[error("type mismatch on column '{column}': expected {expected}, found {found}")]
    TypeMismatch {
        /// Column name.
        column: String,
        /// Type the accessor expected.
        expected: ColumnType,
        /// Actual column type.
        found: ColumnType,
    },

    /// Search indexes are not supported for this column type.
    #[error("columns of type {0} cannot have a search index")]
    IndexNotSupported(ColumnType),

    /// Link accessor used on a non-link column.
    #[error("column '{0}' is not a link column")]
    NotALinkColumn(String),

    /// Underlying sled error.
    #[error("storage error: {0}")]
    Storage(#[from] sled::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Deserialization error.
    #[error("deserialization error: {0}")]
    Deserialization(String),
}
