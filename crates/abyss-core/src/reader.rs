//! Read side of the fused table, for consumers such as a map UI

use crate::error::Result;
use crate::parser::{parse_csv, Schema};
use crate::table::Table;
use log::info;
use serde_json::{json, Map, Value};
use std::path::Path;

/// Load a fused table.
///
/// Returns `Ok(None)` when the file does not exist yet. Every field is
/// decoded once: empty fields are absent, list literals become lists
/// (malformed ones become empty lists), quoted literals become text, fully
/// numeric text becomes a number, anything else stays text.
pub fn read_fused<P: AsRef<Path>>(path: P) -> Result<Option<Table>> {
    let path = path.as_ref();
    if !path.is_file() {
        info!("{} not found; data not yet generated", path.display());
        return Ok(None);
    }
    parse_csv(path, &Schema::fused()).map(Some)
}

/// One JSON object per row, keyed by the unchanged column names
pub fn table_to_json(table: &Table) -> Value {
    let rows = table
        .rows
        .iter()
        .map(|row| {
            let object: Map<String, Value> = table
                .columns
                .iter()
                .map(|c| {
                    let value = row.get(c.index).map(|v| v.to_json()).unwrap_or(Value::Null);
                    (c.name.clone(), value)
                })
                .collect();
            Value::Object(object)
        })
        .collect();
    Value::Array(rows)
}

/// The grid as served to a map UI: the rows, or an error object when there is no data yet
pub fn grid_json<P: AsRef<Path>>(path: P) -> Result<Value> {
    let path = path.as_ref();
    Ok(match read_fused(path)? {
        Some(table) => table_to_json(&table),
        None => json!({ "error": format!("{} not found", path.display()) }),
    })
}
