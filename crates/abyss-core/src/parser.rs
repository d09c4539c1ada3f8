//! CSV parser for grid tables

use crate::error::{Error, Result};
use crate::table::{CellKey, CellValue, Column, ColumnType, Row, Table, COL_KEY, KEY_COLUMNS, ROW_KEY};
use log::warn;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

/// Declared column types for one source file
#[derive(Debug, Clone, Default)]
pub struct Schema {
    /// Declared types by column name; unlisted columns are inferred
    pub types: BTreeMap<String, ColumnType>,
    /// Whether rows are keyed by the `row`/`col` coordinate columns
    pub keyed: bool,
    /// Type of columns not listed in `types`
    pub fallback: ColumnType,
}

impl Schema {
    /// Schema for a table keyed by grid coordinate
    pub fn keyed(types: BTreeMap<String, ColumnType>) -> Self {
        Self {
            types,
            keyed: true,
            fallback: ColumnType::Inferred,
        }
    }

    /// Schema for a table without coordinate keys
    pub fn unkeyed(types: BTreeMap<String, ColumnType>) -> Self {
        Self {
            types,
            keyed: false,
            fallback: ColumnType::Inferred,
        }
    }

    /// Schema for reading back a fused table
    pub fn fused() -> Self {
        Self {
            types: BTreeMap::new(),
            keyed: true,
            fallback: ColumnType::Encoded,
        }
    }

    /// Type applied to a column; key columns are always integers
    pub fn column_type(&self, name: &str) -> ColumnType {
        if self.keyed && KEY_COLUMNS.contains(&name) {
            return ColumnType::Integer;
        }
        self.types.get(name).copied().unwrap_or(self.fallback)
    }
}

/// Parse a CSV file into a Table
pub fn parse_csv<P: AsRef<Path>>(path: P, schema: &Schema) -> Result<Table> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| Error::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    parse_reader(BufReader::new(file), path.to_path_buf(), schema)
}

/// Parse CSV from a string (useful for testing)
pub fn parse_csv_str(content: &str, source_name: &str, schema: &Schema) -> Result<Table> {
    parse_reader(content.as_bytes(), PathBuf::from(source_name), schema)
}

fn parse_reader<R: Read>(reader: R, path: PathBuf, schema: &Schema) -> Result<Table> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true) // Allow varying number of fields
        .from_reader(reader);

    // Parse headers into columns
    let headers = csv_reader.headers().map_err(|e| Error::Csv {
        path: path.clone(),
        source: e,
    })?;

    let columns: Vec<Column> = headers
        .iter()
        .enumerate()
        .map(|(i, name)| Column::new(name.trim().to_string(), i))
        .collect();

    if columns.is_empty() || columns.iter().all(|c| c.name.is_empty()) {
        return Err(Error::CsvParse {
            path,
            message: "no columns found in CSV".to_string(),
        });
    }

    let mut table = Table {
        columns,
        rows: Vec::new(),
        source_path: path,
    };

    let types: Vec<ColumnType> = table
        .columns
        .iter()
        .map(|c| schema.column_type(&c.name))
        .collect();

    let key_indices = if schema.keyed {
        Some((table.require_column(ROW_KEY)?, table.require_column(COL_KEY)?))
    } else {
        None
    };

    for (row_idx, result) in csv_reader.records().enumerate() {
        let record = result.map_err(|e| Error::Csv {
            path: table.source_path.clone(),
            source: e,
        })?;
        // Header is line 1
        let line = row_idx + 2;

        // Warn if row is longer than header (truncate)
        if record.len() > table.columns.len() {
            warn!(
                "row {} in {} has more cells than columns, truncating",
                row_idx + 1,
                table.source_path.display()
            );
        }

        let mut cells = Vec::with_capacity(table.columns.len());
        for (i, raw) in record.iter().take(table.columns.len()).enumerate() {
            let value = types[i]
                .parse_value(raw)
                .map_err(|expected| Error::InvalidValue {
                    path: table.source_path.clone(),
                    line,
                    column: table.columns[i].name.clone(),
                    value: raw.to_string(),
                    expected,
                })?;
            cells.push(value);
        }

        // Pad with empty cells if row is shorter than header
        while cells.len() < table.columns.len() {
            cells.push(CellValue::Empty);
        }

        let key = match key_indices {
            Some((row_col, col_col)) => Some(extract_key(&table, &cells, row_col, col_col, line)?),
            None => None,
        };

        table.rows.push(Row::new(key, cells));
    }

    Ok(table)
}

fn extract_key(
    table: &Table,
    cells: &[CellValue],
    row_col: usize,
    col_col: usize,
    line: usize,
) -> Result<CellKey> {
    let integer = |idx: usize| match &cells[idx] {
        CellValue::Integer(i) => Ok(*i),
        other => Err(Error::InvalidValue {
            path: table.source_path.clone(),
            line,
            column: table.columns[idx].name.clone(),
            value: other.to_string_value(),
            expected: "integer",
        }),
    };
    Ok(CellKey::new(integer(row_col)?, integer(col_col)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keyed() -> Schema {
        Schema::keyed(BTreeMap::new())
    }

    #[test]
    fn test_parse_simple_csv() {
        let csv = "row,col,depth_m\n0,0,100\n0,1,200\n";
        let table = parse_csv_str(csv, "cells.csv", &keyed()).unwrap();

        assert_eq!(table.columns.len(), 3);
        assert_eq!(table.columns[0].name, "row");
        assert_eq!(table.columns[2].name, "depth_m");

        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0].key, Some(CellKey::new(0, 0)));
        assert_eq!(table.rows[1].key, Some(CellKey::new(0, 1)));
    }

    #[test]
    fn test_parse_with_empty_cells() {
        let csv = "row,col,type,severity\n0,0,,3\n0,1,vent,\n";
        let table = parse_csv_str(csv, "hazards.csv", &keyed()).unwrap();

        assert_eq!(table.rows[0].cells[2], CellValue::Empty);
        assert_eq!(table.rows[1].cells[3], CellValue::Empty);
    }

    #[test]
    fn test_parse_short_row_is_padded() {
        let csv = "row,col,type,severity\n0,0,vent\n";
        let table = parse_csv_str(csv, "hazards.csv", &keyed()).unwrap();

        assert_eq!(table.rows[0].cells.len(), 4);
        assert_eq!(table.rows[0].cells[3], CellValue::Empty);
    }

    #[test]
    fn test_declared_types_apply() {
        let mut types = BTreeMap::new();
        types.insert("depth_m".to_string(), ColumnType::Float);
        types.insert("biome".to_string(), ColumnType::Text);
        let csv = "row,col,depth_m,biome\n0,0,4000,1234\n";
        let table = parse_csv_str(csv, "cells.csv", &Schema::keyed(types)).unwrap();

        assert_eq!(table.rows[0].cells[2], CellValue::Float(4000.0));
        assert_eq!(table.rows[0].cells[3], CellValue::String("1234".to_string()));
    }

    #[test]
    fn test_invalid_declared_value() {
        let mut types = BTreeMap::new();
        types.insert("depth_m".to_string(), ColumnType::Float);
        let csv = "row,col,depth_m\n0,0,deep\n";
        let err = parse_csv_str(csv, "cells.csv", &Schema::keyed(types)).unwrap_err();

        assert!(matches!(err, Error::InvalidValue { line: 2, expected: "float", .. }));
    }

    #[test]
    fn test_missing_key_column() {
        let csv = "row,depth_m\n0,100\n";
        let err = parse_csv_str(csv, "cells.csv", &keyed()).unwrap_err();
        assert!(matches!(err, Error::MissingColumn { ref column, .. } if column == "col"));
    }

    #[test]
    fn test_missing_key_value() {
        let csv = "row,col,depth_m\n0,,100\n";
        assert!(parse_csv_str(csv, "cells.csv", &keyed()).is_err());
    }

    #[test]
    fn test_parse_unkeyed() {
        let csv = "predator,prey,interaction_strength,biome_overlap\neel,shrimp,0.5,trench\n";
        let table = parse_csv_str(csv, "food_web.csv", &Schema::unkeyed(BTreeMap::new())).unwrap();

        assert_eq!(table.rows[0].key, None);
        assert_eq!(table.rows[0].cells[2], CellValue::Float(0.5));
    }
}
