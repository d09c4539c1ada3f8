//! Core table types for representing grid data

use crate::error::{Error, Result};
use crate::literal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Name of the grid row key column
pub const ROW_KEY: &str = "row";
/// Name of the grid column key column
pub const COL_KEY: &str = "col";
/// Both coordinate key columns, in table order
pub const KEY_COLUMNS: [&str; 2] = [ROW_KEY, COL_KEY];

/// Grid coordinate identifying one cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CellKey {
    pub row: i64,
    pub col: i64,
}

impl CellKey {
    pub fn new(row: i64, col: i64) -> Self {
        Self { row, col }
    }
}

impl fmt::Display for CellKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

/// A parsed table, either loaded from a CSV file or built by the pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Table {
    /// Column definitions
    pub columns: Vec<Column>,
    /// Row data
    pub rows: Vec<Row>,
    /// Source file path
    pub source_path: PathBuf,
}

impl Table {
    /// Create a new empty table
    pub fn new(source_path: PathBuf) -> Self {
        Self {
            columns: Vec::new(),
            rows: Vec::new(),
            source_path,
        }
    }

    /// Get the number of columns
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Get the number of rows
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Find a column by name
    pub fn find_column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Index of a column by name
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.find_column(name).map(|c| c.index)
    }

    /// Index of a column by name, or a `MissingColumn` error
    pub fn require_column(&self, name: &str) -> Result<usize> {
        self.column_index(name).ok_or_else(|| Error::MissingColumn {
            column: name.to_string(),
            path: self.source_path.clone(),
        })
    }

    /// Find a row by its grid coordinate
    pub fn find_row(&self, key: CellKey) -> Option<&Row> {
        self.rows.iter().find(|r| r.key == Some(key))
    }

    /// Look up a single value by row position and column name
    pub fn value(&self, row_idx: usize, column: &str) -> Option<&CellValue> {
        let col_idx = self.column_index(column)?;
        self.rows.get(row_idx).and_then(|r| r.get(col_idx))
    }

    /// Names of all columns, in order
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Grid coordinates of all keyed rows, in row order
    pub fn keys(&self) -> Vec<CellKey> {
        self.rows.iter().filter_map(|r| r.key).collect()
    }

    /// Append a column, filling every existing row with `Empty`
    pub fn add_column(&mut self, name: &str) -> Result<usize> {
        if self.find_column(name).is_some() {
            return Err(Error::ColumnCollision(name.to_string()));
        }
        let index = self.columns.len();
        self.columns.push(Column::new(name.to_string(), index));
        for row in &mut self.rows {
            row.cells.push(CellValue::Empty);
        }
        Ok(index)
    }
}

/// A column definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Column {
    /// Column name (e.g., "depth_m" or "hazard_type")
    pub name: String,
    /// Column index (0-based)
    pub index: usize,
}

impl Column {
    /// Create a new column
    pub fn new(name: String, index: usize) -> Self {
        Self { name, index }
    }
}

/// A row of data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Row {
    /// Grid coordinate, if the table carries the key columns
    pub key: Option<CellKey>,
    /// Cell values for each column
    pub cells: Vec<CellValue>,
}

impl Row {
    /// Create a new row
    pub fn new(key: Option<CellKey>, cells: Vec<CellValue>) -> Self {
        Self { key, cells }
    }

    /// Get a cell value by column index
    pub fn get(&self, index: usize) -> Option<&CellValue> {
        self.cells.get(index)
    }
}

/// Declared type of a column, applied once when a file is loaded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Integer,
    Float,
    Text,
    /// A list literal such as `['a', 'b']`
    List,
    /// Detect integer, float or text per value
    #[default]
    Inferred,
    /// A field of the fused table as written by the writer: lists, quoted text or scalars
    Encoded,
}

impl ColumnType {
    /// Parse a raw field according to this type.
    ///
    /// Empty fields are `Empty` for every type. On mismatch the error carries
    /// the expected type name.
    pub fn parse_value(self, raw: &str) -> std::result::Result<CellValue, &'static str> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Ok(CellValue::Empty);
        }

        match self {
            ColumnType::Integer => trimmed
                .parse::<i64>()
                .map(CellValue::Integer)
                .map_err(|_| "integer"),
            ColumnType::Float => trimmed
                .parse::<f64>()
                .map(CellValue::Float)
                .map_err(|_| "float"),
            ColumnType::Text => Ok(CellValue::String(trimmed.to_string())),
            ColumnType::List => Ok(CellValue::List(literal::parse_list_or_empty(trimmed))),
            ColumnType::Inferred => Ok(CellValue::parse(trimmed)),
            ColumnType::Encoded => Ok(CellValue::decode_field(trimmed)),
        }
    }
}

/// A cell value with type detection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CellValue {
    /// Integer value
    Integer(i64),
    /// Floating-point value
    Float(f64),
    /// String value
    String(String),
    /// Ordered sequence of values
    List(Vec<CellValue>),
    /// Empty/null cell
    Empty,
}

impl CellValue {
    /// Parse a string into a scalar CellValue, detecting the type.
    ///
    /// Only fully numeric text becomes a number; list literals stay text.
    pub fn parse(s: &str) -> Self {
        let trimmed = s.trim();

        if trimmed.is_empty() {
            return CellValue::Empty;
        }

        // Try parsing as integer first
        if let Ok(i) = trimmed.parse::<i64>() {
            return CellValue::Integer(i);
        }

        // Try parsing as float
        if literal::is_numeric(trimmed) {
            if let Ok(f) = trimmed.parse::<f64>() {
                return CellValue::Float(f);
            }
        }

        // Otherwise, keep as string
        CellValue::String(trimmed.to_string())
    }

    /// Decode a field written by [`CellValue::to_field`].
    ///
    /// `[`-prefixed fields are lists (malformed ones become empty lists),
    /// quoted fields are text, `nan`/`inf`/`-inf` are floats, anything else
    /// is parsed as a scalar.
    pub fn decode_field(s: &str) -> Self {
        let trimmed = s.trim();
        match trimmed {
            "nan" => return CellValue::Float(f64::NAN),
            "inf" => return CellValue::Float(f64::INFINITY),
            "-inf" => return CellValue::Float(f64::NEG_INFINITY),
            _ => {}
        }

        if trimmed.starts_with('[') {
            return CellValue::List(literal::parse_list_or_empty(trimmed));
        }
        if trimmed.starts_with(['\'', '"']) {
            if let Ok(text) = literal::parse_quoted(trimmed) {
                return CellValue::String(text);
            }
        }
        CellValue::parse(trimmed)
    }

    /// Check if the cell is empty
    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }

    /// Check if the value is the empty-string sentinel
    pub fn is_sentinel(&self) -> bool {
        matches!(self, CellValue::String(s) if s.is_empty())
    }

    /// Borrow the elements if this is a list
    pub fn as_list(&self) -> Option<&[CellValue]> {
        match self {
            CellValue::List(items) => Some(items),
            _ => None,
        }
    }

    /// Numeric view of a scalar value
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Integer(i) => Some(*i as f64),
            CellValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Plain text form of the value, as shown to a reader
    pub fn to_string_value(&self) -> String {
        match self {
            CellValue::Integer(i) => i.to_string(),
            CellValue::Float(f) => literal::format_float(*f),
            CellValue::String(s) => s.clone(),
            CellValue::List(_) => literal::encode(self),
            CellValue::Empty => String::new(),
        }
    }

    /// Field text for the fused table. Text that would decode as something
    /// else (a list, a number, a quoted string, padded or empty text) is
    /// written as a quoted literal.
    pub fn to_field(&self) -> String {
        match self {
            CellValue::String(s) if !is_plain_text(s) => literal::encode(self),
            other => other.to_string_value(),
        }
    }

    /// Convert to a JSON value; lists become arrays and `Empty` becomes null
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            CellValue::Integer(i) => serde_json::Value::from(*i),
            CellValue::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            CellValue::String(s) => serde_json::Value::String(s.clone()),
            CellValue::List(items) => {
                serde_json::Value::Array(items.iter().map(CellValue::to_json).collect())
            }
            CellValue::Empty => serde_json::Value::Null,
        }
    }
}

fn is_plain_text(s: &str) -> bool {
    !s.is_empty()
        && s.trim() == s
        && !s.starts_with(['[', '\'', '"'])
        && !matches!(s, "nan" | "inf" | "-inf")
        && matches!(CellValue::parse(s), CellValue::String(_))
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_string_value())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_value_parse_integer() {
        assert_eq!(CellValue::parse("42"), CellValue::Integer(42));
        assert_eq!(CellValue::parse("-123"), CellValue::Integer(-123));
        assert_eq!(CellValue::parse("0"), CellValue::Integer(0));
    }

    #[test]
    fn test_cell_value_parse_float() {
        assert_eq!(CellValue::parse("3.25"), CellValue::Float(3.25));
        assert_eq!(CellValue::parse("-2.5"), CellValue::Float(-2.5));
    }

    #[test]
    fn test_cell_value_parse_string() {
        assert_eq!(
            CellValue::parse("trench"),
            CellValue::String("trench".to_string())
        );
        assert_eq!(
            CellValue::parse("vent field 3"),
            CellValue::String("vent field 3".to_string())
        );
    }

    #[test]
    fn test_cell_value_parse_keeps_bracketed_text() {
        assert_eq!(
            CellValue::parse("[REDACTED] wreck"),
            CellValue::String("[REDACTED] wreck".to_string())
        );
        assert_eq!(
            CellValue::parse("['eel', 'worm']"),
            CellValue::String("['eel', 'worm']".to_string())
        );
    }

    #[test]
    fn test_cell_value_parse_numeric_words_stay_text() {
        for word in ["Infinity", "inf", "NaN", "nan", "-inf"] {
            assert_eq!(CellValue::parse(word), CellValue::String(word.to_string()));
        }
        assert_eq!(CellValue::parse("1e-3"), CellValue::Float(0.001));
    }

    #[test]
    fn test_decode_field_lists() {
        assert_eq!(
            CellValue::decode_field("['eel', 'worm']"),
            CellValue::List(vec![
                CellValue::String("eel".to_string()),
                CellValue::String("worm".to_string()),
            ])
        );
        assert_eq!(CellValue::decode_field("[1,2"), CellValue::List(vec![]));
    }

    #[test]
    fn test_text_fields_read_back_as_text() {
        for text in ["[REDACTED] wreck", "'quoted'", "42", "nan", "Infinity", "wreck", " padded", ""] {
            let value = CellValue::String(text.to_string());
            assert_eq!(CellValue::decode_field(&value.to_field()), value, "{:?}", text);
        }
        assert_eq!(CellValue::String("wreck".to_string()).to_field(), "wreck");
        assert_eq!(CellValue::String("[REDACTED] wreck".to_string()).to_field(), "'[REDACTED] wreck'");
        assert!(matches!(CellValue::decode_field("nan"), CellValue::Float(f) if f.is_nan()));
    }

    #[test]
    fn test_cell_value_parse_empty() {
        assert_eq!(CellValue::parse(""), CellValue::Empty);
        assert_eq!(CellValue::parse("   "), CellValue::Empty);
    }

    #[test]
    fn test_cell_value_is_empty() {
        assert!(CellValue::Empty.is_empty());
        assert!(!CellValue::Integer(0).is_empty());
        assert!(!CellValue::String("".to_string()).is_empty());
        assert!(!CellValue::List(vec![]).is_empty());
    }

    #[test]
    fn test_declared_types() {
        assert_eq!(ColumnType::Float.parse_value("100"), Ok(CellValue::Float(100.0)));
        assert_eq!(ColumnType::Text.parse_value("42"), Ok(CellValue::String("42".to_string())));
        assert_eq!(ColumnType::Integer.parse_value("4.5"), Err("integer"));
        assert_eq!(ColumnType::Integer.parse_value(""), Ok(CellValue::Empty));
        assert_eq!(ColumnType::List.parse_value("oops"), Ok(CellValue::List(vec![])));
    }

    #[test]
    fn test_float_keeps_decimal_point() {
        assert_eq!(CellValue::Float(100.0).to_string_value(), "100.0");
        assert_eq!(CellValue::parse(&CellValue::Float(100.0).to_string_value()), CellValue::Float(100.0));
    }

    #[test]
    fn test_add_column_rejects_collision() {
        let mut table = Table::new(PathBuf::from("grid.csv"));
        table.add_column("depth_m").unwrap();
        assert!(matches!(table.add_column("depth_m"), Err(Error::ColumnCollision(_))));
    }
}
