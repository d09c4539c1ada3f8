//! Left joins of processed secondary tables onto the grid

use crate::error::{Error, Result};
use crate::table::{CellKey, CellValue, Row, Table};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A processed secondary table: one value vector per unique key
#[derive(Debug, Clone)]
pub struct KeyedTable<K> {
    /// Name used in progress and error messages
    pub name: String,
    /// Column names, in the order they are appended to the grid
    pub value_columns: Vec<String>,
    rows: BTreeMap<K, Vec<CellValue>>,
}

impl<K: Ord> KeyedTable<K> {
    /// Create an empty keyed table
    pub fn new(name: impl Into<String>, value_columns: Vec<String>) -> Self {
        Self {
            name: name.into(),
            value_columns,
            rows: BTreeMap::new(),
        }
    }

    /// Insert the values for a key. A key may only be inserted once.
    pub fn insert(&mut self, key: K, values: Vec<CellValue>) -> Result<()> {
        debug_assert_eq!(values.len(), self.value_columns.len());
        if self.rows.contains_key(&key) {
            return Err(Error::JoinCardinalityViolation {
                source_name: self.name.clone(),
                detail: "join key occurs more than once".to_string(),
            });
        }
        self.rows.insert(key, values);
        Ok(())
    }

    /// Values for a key, one per value column
    pub fn get(&self, key: &K) -> Option<&[CellValue]> {
        self.rows.get(key).map(Vec::as_slice)
    }

    /// Number of keys
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Find a value column by name
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.value_columns.iter().position(|c| c == name)
    }

    /// Rename a value column; returns false if it does not exist
    pub fn rename_column(&mut self, from: &str, to: &str) -> bool {
        match self.column_index(from) {
            Some(idx) => {
                self.value_columns[idx] = to.to_string();
                true
            }
            None => false,
        }
    }

    /// Mutable access to every key's value in one column
    pub fn column_values_mut(&mut self, idx: usize) -> impl Iterator<Item = &mut CellValue> + '_ {
        self.rows.values_mut().filter_map(move |values| values.get_mut(idx))
    }
}

/// Outcome of one join
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeStats {
    /// Grid rows that found a partner
    pub matched_rows: usize,
    /// Grid rows left with empty values
    pub unmatched_rows: usize,
    /// Columns appended to the grid
    pub columns_added: usize,
}

/// Left-join a coordinate-keyed table onto the grid
pub fn merge_cells(grid: &mut Table, other: &KeyedTable<CellKey>) -> Result<MergeStats> {
    left_join(grid, other, |row| row.key)
}

/// Left-join a label-keyed table onto the grid by matching `join_column`.
///
/// Many grid rows may share one label; each receives a copy of the group's values.
pub fn merge_on_column(
    grid: &mut Table,
    join_column: &str,
    other: &KeyedTable<String>,
) -> Result<MergeStats> {
    let join_idx = grid.require_column(join_column)?;
    left_join(grid, other, |row| match row.get(join_idx) {
        None | Some(CellValue::Empty) => None,
        Some(value) => Some(value.to_string_value()),
    })
}

fn left_join<K, F>(grid: &mut Table, other: &KeyedTable<K>, key_of: F) -> Result<MergeStats>
where
    K: Ord,
    F: Fn(&Row) -> Option<K>,
{
    // Check every name first so a collision leaves the grid untouched
    for name in &other.value_columns {
        if grid.find_column(name).is_some() {
            return Err(Error::ColumnCollision(name.clone()));
        }
    }

    let rows_before = grid.row_count();
    let width_before = grid.column_count();

    let indices = other
        .value_columns
        .iter()
        .map(|name| grid.add_column(name))
        .collect::<Result<Vec<usize>>>()?;

    let mut matched_rows = 0;
    for row in &mut grid.rows {
        let Some(values) = key_of(row).and_then(|key| other.get(&key)) else {
            continue;
        };
        for (&idx, value) in indices.iter().zip(values) {
            row.cells[idx] = value.clone();
        }
        matched_rows += 1;
    }

    if grid.row_count() != rows_before {
        return Err(Error::JoinCardinalityViolation {
            source_name: other.name.clone(),
            detail: format!("{} rows before, {} after", rows_before, grid.row_count()),
        });
    }
    let width = grid.column_count();
    if let Some(row) = grid.rows.iter().find(|r| r.cells.len() != width) {
        return Err(Error::JoinCardinalityViolation {
            source_name: other.name.clone(),
            detail: format!("row {:?} has {} cells, expected {}", row.key, row.cells.len(), width),
        });
    }

    Ok(MergeStats {
        matched_rows,
        unmatched_rows: rows_before - matched_rows,
        columns_added: width - width_before,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{parse_csv_str, Schema};

    fn grid() -> Table {
        let csv = "row,col,biome\n0,0,trench\n0,1,trench\n1,0,reef\n";
        parse_csv_str(csv, "cells.csv", &Schema::keyed(BTreeMap::new())).unwrap()
    }

    fn s(v: &str) -> CellValue {
        CellValue::String(v.to_string())
    }

    #[test]
    fn test_merge_keeps_every_base_row() {
        let mut grid = grid();
        let mut hazards = KeyedTable::new("hazards.csv", vec!["hazard_type".to_string()]);
        hazards
            .insert(CellKey::new(0, 0), vec![CellValue::List(vec![s("vent"), s("gas")])])
            .unwrap();
        // A key outside the grid never adds a row
        hazards
            .insert(CellKey::new(9, 9), vec![CellValue::List(vec![s("slide")])])
            .unwrap();

        let stats = merge_cells(&mut grid, &hazards).unwrap();

        assert_eq!(grid.row_count(), 3);
        assert_eq!(grid.keys(), vec![CellKey::new(0, 0), CellKey::new(0, 1), CellKey::new(1, 0)]);
        assert_eq!(stats, MergeStats { matched_rows: 1, unmatched_rows: 2, columns_added: 1 });
        assert_eq!(grid.value(0, "hazard_type"), Some(&CellValue::List(vec![s("vent"), s("gas")])));
        assert_eq!(grid.value(1, "hazard_type"), Some(&CellValue::Empty));
    }

    #[test]
    fn test_duplicate_key_is_violation() {
        let mut table = KeyedTable::new("hazards.csv", vec!["hazard_type".to_string()]);
        table.insert(CellKey::new(0, 0), vec![s("vent")]).unwrap();
        let err = table.insert(CellKey::new(0, 0), vec![s("gas")]).unwrap_err();
        assert!(matches!(err, Error::JoinCardinalityViolation { .. }));
    }

    #[test]
    fn test_collision_leaves_grid_untouched() {
        let mut grid = grid();
        let table: KeyedTable<CellKey> =
            KeyedTable::new("bad.csv", vec!["extra".to_string(), "biome".to_string()]);

        assert!(matches!(merge_cells(&mut grid, &table), Err(Error::ColumnCollision(_))));
        assert_eq!(grid.column_count(), 3);
    }

    #[test]
    fn test_merge_on_column_fans_out() {
        let mut grid = grid();
        let mut web = KeyedTable::new("food_web.csv", vec!["biome_predators".to_string()]);
        web.insert("trench".to_string(), vec![CellValue::List(vec![s("eel"), s("worm")])])
            .unwrap();

        let stats = merge_on_column(&mut grid, "biome", &web).unwrap();

        assert_eq!(stats.matched_rows, 2);
        assert_eq!(grid.value(0, "biome_predators"), grid.value(1, "biome_predators"));
        assert_eq!(grid.value(2, "biome_predators"), Some(&CellValue::Empty));
    }

    #[test]
    fn test_rename_column() {
        let mut table: KeyedTable<String> = KeyedTable::new("food_web.csv", vec!["predator".to_string()]);
        assert!(table.rename_column("predator", "biome_predators"));
        assert!(!table.rename_column("prey", "biome_prey"));
        assert_eq!(table.column_index("biome_predators"), Some(0));
    }
}
