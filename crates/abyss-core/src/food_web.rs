//! Food web fusion: relational rows grouped by biome and fanned out onto cells

use crate::aggregator::aggregate_by_label;
use crate::config::FoodWebConfig;
use crate::error::Result;
use crate::merger::{merge_on_column, MergeStats};
use crate::table::Table;
use log::{info, warn};

/// Group the food web by its label column and join it onto the grid.
///
/// Returns `None` when the stage cannot run because a needed column is
/// missing; the grid is left unchanged in that case.
pub fn fuse_food_web(grid: &mut Table, food_web: &Table, config: &FoodWebConfig) -> Result<Option<MergeStats>> {
    let name = food_web.source_path.display().to_string();

    let mut needed = vec![config.group_column.as_str()];
    needed.extend(config.columns.iter().map(|m| m.source.as_str()));
    if let Some(missing) = needed.iter().find(|c| food_web.find_column(c).is_none()) {
        warn!("Skipping food web: column '{}' not found in {}", missing, name);
        return Ok(None);
    }
    if grid.find_column(&config.join_column).is_none() {
        warn!(
            "Skipping food web: grid has no '{}' column to join on",
            config.join_column
        );
        return Ok(None);
    }

    let value_columns: Vec<&str> = config.columns.iter().map(|m| m.source.as_str()).collect();
    let grouped = aggregate_by_label(food_web, &name, &config.group_column, &value_columns)?;
    info!(
        "  Grouped {} food web links into {} {} groups",
        grouped.record_count(),
        grouped.group_count(),
        config.group_column
    );

    let mut keyed = grouped.into_keyed()?;
    for mapping in &config.columns {
        keyed.rename_column(&mapping.source, &mapping.target);
    }

    let stats = merge_on_column(grid, &config.join_column, &keyed)?;
    info!(
        "  Merged food web. Current shape: {} rows x {} columns",
        grid.row_count(),
        grid.column_count()
    );
    Ok(Some(stats))
}
