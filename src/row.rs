//! Row data handling
//!
//! This module provides the column values, rows and column metadata that
//! flow from the session layer into the cursor engine.

use bytes::Bytes;

use crate::constants::OracleType;
use crate::types::{LobValue, RowId};

/// Represents a value from a column.
///
/// Values can be accessed using the various `as_*` methods.
///
/// # Example
///
/// ```rust
/// use ob_client::Value;
///
/// fn describe(value: &Value) -> String {
///     match value {
///         Value::Null => "NULL".to_string(),
///         Value::String(s) => format!("String: {}", s),
///         Value::Integer(i) => format!("Integer: {}", i),
///         _ => "Other type".to_string(),
///     }
/// }
///
/// assert_eq!(describe(&Value::Integer(7)), "Integer: 7");
/// ```
#[derive(Debug, Clone)]
pub enum Value {
    /// NULL value
    Null,
    /// String value (VARCHAR2, CLOB bound as text)
    String(String),
    /// Byte array (RAW, BLOB bound as bytes)
    Bytes(Vec<u8>),
    /// Integer value (NUMBER that fits in i64)
    Integer(i64),
    /// Floating point value
    Float(f64),
    /// ROWID value
    RowId(RowId),
    /// Boolean value
    Boolean(bool),
    /// LOB value (CLOB, BLOB)
    Lob(LobValue),
}

impl Value {
    /// Check if this value is NULL
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null | Value::Lob(LobValue::Null))
    }

    /// Try to get as a string reference
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get as an integer
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            Value::Float(f) => Some(*f as i64),
            _ => None,
        }
    }

    /// Try to get as a float
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Try to get as bytes
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            Value::String(s) => Some(s.as_bytes()),
            Value::Lob(LobValue::Inline(data)) => Some(data),
            _ => None,
        }
    }

    /// Try to get as a boolean
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            Value::Integer(i) => Some(*i != 0),
            _ => None,
        }
    }

    /// Try to get as a LOB
    pub fn as_lob(&self) -> Option<&LobValue> {
        match self {
            Value::Lob(lob) => Some(lob),
            _ => None,
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl From<&[u8]> for Value {
    fn from(v: &[u8]) -> Self {
        Value::Bytes(v.to_vec())
    }
}

impl From<Bytes> for Value {
    fn from(v: Bytes) -> Self {
        Value::Bytes(v.to_vec())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(inner) => inner.into(),
            None => Value::Null,
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::String(s) => write!(f, "{}", s),
            Value::Bytes(b) => write!(f, "<{} bytes>", b.len()),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Float(fl) => write!(f, "{}", fl),
            Value::RowId(r) => write!(f, "{}", r),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Lob(lob) => match lob {
                LobValue::Null => write!(f, "NULL"),
                LobValue::Empty => write!(f, "<empty LOB>"),
                LobValue::Inline(data) => write!(f, "<LOB: {} bytes inline>", data.len()),
                LobValue::Locator(loc) => write!(f, "<LOB: {} units, locator>", loc.size()),
            },
        }
    }
}

/// Column metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    /// Column name
    pub name: String,
    /// Data type
    pub oracle_type: OracleType,
    /// Whether NULL values are allowed
    pub nullable: bool,
}

impl ColumnInfo {
    /// Create a new nullable column
    pub fn new(name: impl Into<String>, oracle_type: OracleType) -> Self {
        Self {
            name: name.into(),
            oracle_type,
            nullable: true,
        }
    }

    /// Check if this column holds LOB values
    pub fn is_lob(&self) -> bool {
        self.oracle_type.is_lob()
    }
}

/// A row of data delivered by the session layer.
///
/// Rows carry their server identity when the query exposes one; sensitive
/// cursors and LOB locators depend on it.
#[derive(Debug, Clone)]
pub struct Row {
    /// Column values
    values: Vec<Value>,
    /// Server row identity
    row_id: Option<RowId>,
    /// Set once the row was deleted through the owning cursor
    pub(crate) deleted: bool,
}

impl Row {
    /// Create a new row with values
    pub fn new(values: Vec<Value>) -> Self {
        Self {
            values,
            row_id: None,
            deleted: false,
        }
    }

    /// Create a new row carrying its identity
    pub fn with_row_id(values: Vec<Value>, row_id: RowId) -> Self {
        Self {
            values,
            row_id: Some(row_id),
            deleted: false,
        }
    }

    /// Get the number of columns in this row
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if the row is empty
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Get a value by column index
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Get all values as a slice
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Consume the row and return the values
    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    /// Server identity of this row
    pub fn row_id(&self) -> Option<&RowId> {
        self.row_id.as_ref()
    }

    /// Try to get a string value by index
    pub fn get_string(&self, index: usize) -> Option<&str> {
        self.get(index).and_then(Value::as_str)
    }

    /// Try to get an integer value by index
    pub fn get_i64(&self, index: usize) -> Option<i64> {
        self.get(index).and_then(Value::as_i64)
    }

    /// Check if a column value is NULL
    pub fn is_null(&self, index: usize) -> bool {
        self.get(index).map(Value::is_null).unwrap_or(true)
    }

    pub(crate) fn values_mut(&mut self) -> &mut [Value] {
        &mut self.values
    }

    pub(crate) fn set(&mut self, index: usize, value: Value) {
        if index >= self.values.len() {
            self.values.resize(index + 1, Value::Null);
        }
        self.values[index] = value;
    }
}

impl std::ops::Index<usize> for Row {
    type Output = Value;

    fn index(&self, index: usize) -> &Self::Output {
        &self.values[index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_conversions() {
        assert_eq!(Value::from(42).as_i64(), Some(42));
        assert_eq!(Value::from("abc").as_str(), Some("abc"));
        assert_eq!(Value::from(vec![1u8, 2]).as_bytes(), Some(&[1u8, 2][..]));
        assert!(Value::from(None::<i64>).is_null());
        assert!(Value::Lob(LobValue::Null).is_null());
    }

    #[test]
    fn test_row_access() {
        let row = Row::with_row_id(vec![Value::Integer(1), "x".into()], RowId::new(1, 0, 0, 1));
        assert_eq!(row.len(), 2);
        assert_eq!(row.get_i64(0), Some(1));
        assert_eq!(row.get_string(1), Some("x"));
        assert!(row.is_null(5));
        assert_eq!(row.row_id(), Some(&RowId::new(1, 0, 0, 1)));
        assert_eq!(row[0].as_i64(), Some(1));
    }

    #[test]
    fn test_row_set_extends() {
        let mut row = Row::new(vec![Value::Integer(1)]);
        row.set(2, Value::from("z"));
        assert_eq!(row.len(), 3);
        assert!(row.is_null(1));
        assert_eq!(row.get_string(2), Some("z"));
    }

    #[test]
    fn test_value_display() {
        assert_eq!(Value::Null.to_string(), "NULL");
        assert_eq!(Value::Bytes(vec![0; 4]).to_string(), "<4 bytes>");
        assert_eq!(
            Value::Lob(LobValue::inline(Bytes::from("abc"))).to_string(),
            "<LOB: 3 bytes inline>"
        );
    }
}
