//! Category prefixes for secondary table columns

use crate::table::{Table, KEY_COLUMNS};

/// Rename every non-key column to `{prefix}_{name}`
pub fn namespace(mut table: Table, prefix: &str) -> Table {
    for column in &mut table.columns {
        if !KEY_COLUMNS.contains(&column.name.as_str()) {
            column.name = prefixed(prefix, &column.name);
        }
    }
    table
}

/// The namespaced form of a column name
pub fn prefixed(prefix: &str, name: &str) -> String {
    format!("{}_{}", prefix, name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{parse_csv_str, Schema};

    #[test]
    fn test_namespace_skips_keys() {
        let table = parse_csv_str("row,col,type,notes\n0,0,vent,hot\n", "hazards.csv", &Schema::default()).unwrap();
        let table = namespace(table, "hazard");

        assert_eq!(table.column_names(), vec!["row", "col", "hazard_type", "hazard_notes"]);
    }

    #[test]
    fn test_namespace_separates_shared_names() {
        let life = parse_csv_str("row,col,density\n0,0,3\n", "life.csv", &Schema::default()).unwrap();
        let coral = parse_csv_str("row,col,density\n0,0,7\n", "corals.csv", &Schema::default()).unwrap();

        let life = namespace(life, "life");
        let coral = namespace(coral, "coral");

        assert_ne!(life.columns[2].name, coral.columns[2].name);
        assert_eq!(life.find_column("life_density").map(|c| c.index), Some(2));
    }
}
