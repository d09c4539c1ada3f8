//! CSV serializer for the fused table

use crate::error::{Error, Result};
use crate::table::{CellValue, Table};
use log::info;
use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// Write a table as CSV to `path`.
///
/// The data goes to a temporary file in the destination directory, which
/// replaces `path` only after everything is flushed. Readers therefore see
/// either the previous file or the complete new one.
pub fn write_csv<P: AsRef<Path>>(table: &Table, path: P) -> Result<()> {
    let path = path.as_ref();
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;

    let mut temp = NamedTempFile::new_in(dir)?;
    write_csv_to(table, temp.as_file_mut()).map_err(|e| match e {
        Error::Csv { source, .. } => Error::Csv {
            path: path.to_path_buf(),
            source,
        },
        other => other,
    })?;
    temp.as_file().sync_all()?;
    temp.persist(path)?;

    info!("Saved {} rows to {}", table.row_count(), path.display());
    Ok(())
}

/// Write a table as CSV to any writer
pub fn write_csv_to<W: Write>(table: &Table, writer: W) -> Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    let csv_err = |e: csv::Error| Error::Csv {
        path: table.source_path.clone(),
        source: e,
    };

    csv_writer
        .write_record(table.column_names())
        .map_err(csv_err)?;
    for row in &table.rows {
        csv_writer
            .write_record(row.cells.iter().map(CellValue::to_field))
            .map_err(csv_err)?;
    }
    csv_writer.flush()?;
    Ok(())
}

/// Render a table as CSV text
pub fn to_csv_string(table: &Table) -> Result<String> {
    let mut buf = Vec::new();
    write_csv_to(table, &mut buf)?;
    String::from_utf8(buf).map_err(|e| Error::CsvParse {
        path: table.source_path.clone(),
        message: e.to_string(),
    })
}
