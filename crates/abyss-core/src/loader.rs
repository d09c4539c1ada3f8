//! Source loading with required/optional semantics

use crate::error::{Error, Result};
use crate::parser::{parse_csv, Schema};
use crate::table::Table;
use log::{info, warn};
use std::collections::HashSet;
use std::path::Path;

/// Load the base grid table. A missing file is fatal.
///
/// Besides parsing, this checks that no two rows share a coordinate, since
/// every later join relies on the grid key being unique.
pub fn load_required<P: AsRef<Path>>(path: P, schema: &Schema) -> Result<Table> {
    let path = path.as_ref();
    if !path.is_file() {
        return Err(Error::MissingRequiredSource {
            path: path.to_path_buf(),
        });
    }

    info!("Loading base file: {}", path.display());
    let table = parse_csv(path, schema)?;
    ensure_unique_keys(&table)?;
    info!(
        "Base shape: {} rows x {} columns",
        table.row_count(),
        table.column_count()
    );
    Ok(table)
}

/// Load an optional source. Returns `None` (and logs a skip notice) when the file is absent.
pub fn load_optional<P: AsRef<Path>>(path: P, schema: &Schema) -> Result<Option<Table>> {
    let path = path.as_ref();
    if !path.is_file() {
        warn!("Skipping {} (not found)", path.display());
        return Ok(None);
    }

    info!("Processing {}...", path.display());
    parse_csv(path, schema).map(Some)
}

fn ensure_unique_keys(table: &Table) -> Result<()> {
    let mut seen = HashSet::with_capacity(table.row_count());
    for key in table.keys() {
        if !seen.insert(key) {
            return Err(Error::DuplicateCellKey {
                row: key.row,
                col: key.col,
                path: table.source_path.clone(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_missing_required_is_error() {
        let dir = tempdir().unwrap();
        let err = load_required(dir.path().join("cells.csv"), &Schema::default()).unwrap_err();
        assert!(matches!(err, Error::MissingRequiredSource { .. }));
    }

    #[test]
    fn test_missing_optional_is_none() {
        let dir = tempdir().unwrap();
        let loaded = load_optional(dir.path().join("hazards.csv"), &Schema::default()).unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn test_duplicate_base_key_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cells.csv");
        fs::write(&path, "row,col,biome\n0,0,trench\n0,0,reef\n").unwrap();

        let err = load_required(&path, &Schema::keyed(BTreeMap::new())).unwrap_err();
        assert!(matches!(err, Error::DuplicateCellKey { row: 0, col: 0, .. }));
    }

    #[test]
    fn test_load_optional_present() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("hazards.csv");
        fs::write(&path, "row,col,type\n0,0,vent\n").unwrap();

        let table = load_optional(&path, &Schema::keyed(BTreeMap::new())).unwrap().unwrap();
        assert_eq!(table.row_count(), 1);
    }
}
