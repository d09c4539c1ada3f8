//! Sentinel handling around aggregation
//!
//! A rule column first has its empty values replaced by the empty-string
//! sentinel, so every record keeps its slot in the aggregated list. After
//! aggregation, a list made only of sentinels is replaced by `Empty`, which
//! separates "no value for any record" from "some records have values".

use crate::merger::KeyedTable;
use crate::table::{CellValue, Table};

/// Per-column cleanup rules for one category
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizeRules {
    collapse_empty: Vec<String>,
}

impl NormalizeRules {
    /// Rules collapsing all-empty lists in the named columns
    pub fn collapse_empty<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            collapse_empty: columns.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.collapse_empty.is_empty()
    }

    /// Columns the collapse rule applies to
    pub fn columns(&self) -> &[String] {
        &self.collapse_empty
    }

    /// Replace empty values in rule columns with the sentinel. Runs before aggregation.
    pub fn fill_sentinels(&self, table: &mut Table) {
        let indices: Vec<usize> = self
            .collapse_empty
            .iter()
            .filter_map(|name| table.column_index(name))
            .collect();

        for row in &mut table.rows {
            for &idx in &indices {
                if let Some(cell) = row.cells.get_mut(idx) {
                    if cell.is_empty() {
                        *cell = CellValue::String(String::new());
                    }
                }
            }
        }
    }

    /// Collapse sentinel-only values in rule columns. Returns how many cells became `Empty`.
    pub fn apply<K: Ord>(&self, table: &mut KeyedTable<K>) -> usize {
        let mut collapsed = 0;
        for name in &self.collapse_empty {
            let Some(idx) = table.column_index(name) else {
                continue;
            };
            for value in table.column_values_mut(idx) {
                if holds_only_sentinels(value) {
                    *value = CellValue::Empty;
                    collapsed += 1;
                }
            }
        }
        collapsed
    }
}

fn holds_only_sentinels(value: &CellValue) -> bool {
    match value {
        CellValue::List(items) => items.iter().all(|v| v.is_sentinel() || v.is_empty()),
        CellValue::String(s) => s.is_empty(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::aggregate_cells;
    use crate::parser::{parse_csv_str, Schema};
    use crate::table::CellKey;
    use std::collections::BTreeMap;

    fn life() -> Table {
        let csv = "row,col,life_species,life_prey_species\n\
                   0,0,eel,\n0,0,squid,\n\
                   0,1,ray,crab\n0,1,worm,\n";
        parse_csv_str(csv, "life.csv", &Schema::keyed(BTreeMap::new())).unwrap()
    }

    #[test]
    fn test_all_empty_prey_collapses_to_null() {
        let rules = NormalizeRules::collapse_empty(["life_prey_species"]);
        let mut table = life();
        rules.fill_sentinels(&mut table);

        let mut keyed = aggregate_cells(&table, "life.csv").unwrap().into_keyed().unwrap();
        let collapsed = rules.apply(&mut keyed);

        assert_eq!(collapsed, 1);
        assert_eq!(keyed.get(&CellKey::new(0, 0)).unwrap()[1], CellValue::Empty);
        assert_eq!(
            keyed.get(&CellKey::new(0, 1)).unwrap()[1],
            CellValue::List(vec![
                CellValue::String("crab".to_string()),
                CellValue::String(String::new()),
            ])
        );
    }

    #[test]
    fn test_other_columns_untouched() {
        let rules = NormalizeRules::collapse_empty(["life_prey_species"]);
        let mut table = life();
        rules.fill_sentinels(&mut table);

        assert_eq!(table.rows[0].cells[3], CellValue::String(String::new()));
        assert_eq!(table.rows[0].cells[2], CellValue::String("eel".to_string()));
    }

    #[test]
    fn test_scalar_sentinel_reverts_to_empty() {
        let rules = NormalizeRules::collapse_empty(["life_prey_species"]);
        let mut table = parse_csv_str(
            "row,col,life_species,life_prey_species\n0,0,eel,\n",
            "life.csv",
            &Schema::keyed(BTreeMap::new()),
        )
        .unwrap();
        rules.fill_sentinels(&mut table);

        let mut keyed = aggregate_cells(&table, "life.csv").unwrap().into_keyed().unwrap();
        rules.apply(&mut keyed);

        assert_eq!(keyed.get(&CellKey::new(0, 0)).unwrap()[1], CellValue::Empty);
    }

    #[test]
    fn test_unknown_rule_column_is_ignored() {
        let rules = NormalizeRules::collapse_empty(["life_missing"]);
        let mut table = life();
        rules.fill_sentinels(&mut table);
        let mut keyed = aggregate_cells(&table, "life.csv").unwrap().into_keyed().unwrap();
        assert_eq!(rules.apply(&mut keyed), 0);
    }
}
