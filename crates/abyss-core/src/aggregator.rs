//! Grouping of secondary records by key
//!
//! Records are kept whole: each group holds the complete value vector of
//! every source row, in source order. Parallel list columns only appear when
//! a group is projected, so element `i` of every column always comes from
//! the same source row.

use crate::error::{Error, Result};
use crate::merger::KeyedTable;
use crate::table::{CellKey, CellValue, Table, KEY_COLUMNS, ROW_KEY};
use log::info;
use std::collections::BTreeMap;

/// Values of one source row, one per value column
pub type Record = Vec<CellValue>;

/// Whether a grouped table carries scalars or lists
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    /// No key occurs twice; each group holds exactly one record
    Scalar,
    /// Every group becomes a list per column, singletons included
    List,
}

/// Records grouped by key
#[derive(Debug, Clone)]
pub struct Grouped<K> {
    /// Name used in progress and error messages
    pub name: String,
    /// Value column names; each record has one entry per column
    pub value_columns: Vec<String>,
    pub shape: Shape,
    pub groups: BTreeMap<K, Vec<Record>>,
}

impl<K: Ord + Clone> Grouped<K> {
    /// Number of distinct keys
    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    /// Number of source records across all groups
    pub fn record_count(&self) -> usize {
        self.groups.values().map(Vec::len).sum()
    }

    /// Project each group into one value per column.
    ///
    /// Scalar groups yield their record's values; list groups yield one list
    /// per column, all of the group's length.
    pub fn into_keyed(self) -> Result<KeyedTable<K>> {
        let width = self.value_columns.len();
        let mut keyed = KeyedTable::new(self.name.clone(), self.value_columns);

        for (key, records) in self.groups {
            let values = match self.shape {
                Shape::Scalar => {
                    let count = records.len();
                    match <[Record; 1]>::try_from(records) {
                        Ok([record]) => record,
                        Err(_) => {
                            return Err(Error::JoinCardinalityViolation {
                                source_name: self.name,
                                detail: format!("scalar group holds {} records", count),
                            })
                        }
                    }
                }
                Shape::List => {
                    let mut columns: Vec<Vec<CellValue>> =
                        vec![Vec::with_capacity(records.len()); width];
                    for record in records {
                        for (column, value) in columns.iter_mut().zip(record) {
                            column.push(value);
                        }
                    }
                    columns.into_iter().map(CellValue::List).collect()
                }
            };
            keyed.insert(key, values)?;
        }

        Ok(keyed)
    }
}

/// Group a keyed table by grid coordinate.
///
/// If no coordinate repeats, aggregation is skipped and the result keeps
/// scalar values (`Shape::Scalar`).
pub fn aggregate_cells(table: &Table, name: &str) -> Result<Grouped<CellKey>> {
    let value_indices: Vec<usize> = table
        .columns
        .iter()
        .filter(|c| !KEY_COLUMNS.contains(&c.name.as_str()))
        .map(|c| c.index)
        .collect();

    let mut groups: BTreeMap<CellKey, Vec<Record>> = BTreeMap::new();
    let mut duplicated = false;

    for row in &table.rows {
        let key = row.key.ok_or_else(|| Error::MissingColumn {
            column: ROW_KEY.to_string(),
            path: table.source_path.clone(),
        })?;
        let record: Record = value_indices
            .iter()
            .map(|&i| row.cells[i].clone())
            .collect();

        let entry = groups.entry(key).or_default();
        duplicated |= !entry.is_empty();
        entry.push(record);
    }

    let shape = if duplicated {
        info!(
            "  Found duplicate entries for (row, col) in {}. Aggregating...",
            name
        );
        Shape::List
    } else {
        Shape::Scalar
    };

    let grouped = Grouped {
        name: name.to_string(),
        value_columns: value_indices
            .iter()
            .map(|&i| table.columns[i].name.clone())
            .collect(),
        shape,
        groups,
    };

    if shape == Shape::List {
        info!(
            "  Aggregated {} records into {} cells",
            grouped.record_count(),
            grouped.group_count()
        );
    }

    Ok(grouped)
}

/// Group a table by a text label column into lists of the given value columns.
///
/// Rows with an empty label belong to no group and are dropped.
pub fn aggregate_by_label(
    table: &Table,
    name: &str,
    label_column: &str,
    value_columns: &[&str],
) -> Result<Grouped<String>> {
    let label_idx = table.require_column(label_column)?;
    let value_indices = value_columns
        .iter()
        .map(|c| table.require_column(c))
        .collect::<Result<Vec<usize>>>()?;

    let mut groups: BTreeMap<String, Vec<Record>> = BTreeMap::new();
    for row in &table.rows {
        let label = match &row.cells[label_idx] {
            CellValue::Empty => continue,
            other => other.to_string_value(),
        };
        let record: Record = value_indices
            .iter()
            .map(|&i| row.cells[i].clone())
            .collect();
        groups.entry(label).or_default().push(record);
    }

    Ok(Grouped {
        name: name.to_string(),
        value_columns: value_columns.iter().map(|c| c.to_string()).collect(),
        shape: Shape::List,
        groups,
    })
}
