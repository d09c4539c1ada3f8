//! The fusion pass: base grid, secondary categories, food web, output

use crate::aggregator::{aggregate_cells, Shape};
use crate::config::{FusionConfig, SourceConfig};
use crate::error::{Error, Result};
use crate::food_web::fuse_food_web;
use crate::loader::{load_optional, load_required};
use crate::merger::merge_cells;
use crate::namespace::namespace;
use crate::parser::Schema;
use crate::report::{FusionReport, StageOutcome};
use crate::table::Table;
use crate::writer::write_csv;
use log::{info, warn};
use std::path::Path;

/// Base attributes every cell is expected to carry
const BASE_ATTRIBUTES: [&str; 4] = ["lat", "lon", "depth_m", "biome"];

/// A fused table and the report of how it was built
#[derive(Debug, Clone)]
pub struct Fusion {
    pub table: Table,
    pub report: FusionReport,
}

/// Build the fused table in memory.
///
/// Only a missing or unusable base table stops the pass. An optional source
/// that is absent is skipped. A corrupt optional source (a missing key
/// column, a non-integer `row`, a value that does not fit its declared type)
/// is not fatal either: the whole category is skipped with a warning and the
/// reason is recorded in the report. A join that would change the grid's
/// rows is always fatal.
pub fn fuse(config: &FusionConfig) -> Result<Fusion> {
    let base_path = config.base_path();
    let mut grid = load_required(&base_path, &config.base.schema())?;
    for column in BASE_ATTRIBUTES {
        if grid.find_column(column).is_none() {
            warn!("Base table has no '{}' column", column);
        }
    }

    let mut report = FusionReport::new(base_path, grid.row_count());

    for source in &config.sources {
        let path = config.source_path(source);
        let outcome = match load_stage(&path, &source.schema()) {
            Ok(table) => fuse_source(&mut grid, table, source)?,
            Err(reason) => StageOutcome::Skipped { reason },
        };
        report.push(path, source.prefix.clone(), outcome);
    }

    let web_path = config.food_web_path();
    let outcome = match load_stage(&web_path, &config.food_web.schema()) {
        Ok(web) => match fuse_food_web(&mut grid, &web, &config.food_web)? {
            Some(merge) => StageOutcome::Merged {
                records: web.row_count(),
                aggregated: true,
                collapsed: 0,
                merge,
            },
            None => StageOutcome::Skipped {
                reason: "required column missing".to_string(),
            },
        },
        Err(reason) => StageOutcome::Skipped { reason },
    };
    report.push(web_path, "food_web", outcome);

    if grid.row_count() != report.base_rows {
        return Err(Error::JoinCardinalityViolation {
            source_name: "fused grid".to_string(),
            detail: format!("{} base rows, {} fused rows", report.base_rows, grid.row_count()),
        });
    }

    grid.source_path = config.output.clone();
    report.output_columns = grid.column_count();
    Ok(Fusion {
        table: grid,
        report,
    })
}

/// Fuse and write the output file
pub fn run(config: &FusionConfig) -> Result<FusionReport> {
    let Fusion { table, mut report } = fuse(config)?;

    info!("Saving merged data to {}...", config.output.display());
    write_csv(&table, &config.output)?;
    report.output = Some(config.output.clone());
    info!("Done.");

    Ok(report)
}

/// Namespace, aggregate, normalize and merge one secondary table
pub fn fuse_source(grid: &mut Table, table: Table, source: &SourceConfig) -> Result<StageOutcome> {
    let name = table.source_path.display().to_string();
    let rules = source.rules();

    let mut table = namespace(table, &source.prefix);
    rules.fill_sentinels(&mut table);
    let records = table.row_count();

    let grouped = aggregate_cells(&table, &name)?;
    let aggregated = grouped.shape == Shape::List;
    let mut keyed = grouped.into_keyed()?;
    let collapsed = rules.apply(&mut keyed);

    let merge = merge_cells(grid, &keyed)?;
    info!(
        "  Merged. Current shape: {} rows x {} columns",
        grid.row_count(),
        grid.column_count()
    );

    Ok(StageOutcome::Merged {
        records,
        aggregated,
        collapsed,
        merge,
    })
}

/// Load an optional source; the error side is the reason it was skipped
fn load_stage(path: &Path, schema: &Schema) -> std::result::Result<Table, String> {
    match load_optional(path, schema) {
        Ok(Some(table)) => Ok(table),
        Ok(None) => Err("not found".to_string()),
        Err(e) => {
            warn!("Skipping {}: {}", path.display(), e);
            Err(e.to_string())
        }
    }
}
