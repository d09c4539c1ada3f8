//! abyss-core: Core library for fusing abyssal world grid tables
//!
//! This library provides functionality to:
//! - Load a base grid table and optional per-category attribute tables
//! - Namespace, aggregate and normalize each category per grid cell
//! - Left-join every category and the biome food web onto the grid
//! - Write the fused table with list cells encoded as safe literals
//! - Read the fused table back and run constrained queries over it

pub mod aggregator;
pub mod config;
pub mod error;
pub mod food_web;
pub mod literal;
pub mod loader;
pub mod merger;
pub mod namespace;
pub mod normalizer;
pub mod parser;
pub mod pipeline;
pub mod query;
pub mod reader;
pub mod report;
pub mod scanner;
pub mod table;
pub mod writer;

pub use aggregator::{aggregate_by_label, aggregate_cells, Grouped, Record, Shape};
pub use config::{BaseConfig, ColumnMapping, FoodWebConfig, FusionConfig, SourceConfig};
pub use error::{Error, Result};
pub use food_web::fuse_food_web;
pub use literal::{parse_list, parse_list_or_empty, LiteralError};
pub use loader::{load_optional, load_required};
pub use merger::{merge_cells, merge_on_column, KeyedTable, MergeStats};
pub use namespace::namespace;
pub use normalizer::NormalizeRules;
pub use parser::{parse_csv, parse_csv_str, Schema};
pub use pipeline::{fuse, fuse_source, run, Fusion};
pub use query::{validate_tiles, Query, QueryError, QueryHit};
pub use reader::{grid_json, read_fused, table_to_json};
pub use report::{FusionReport, StageOutcome, StageReport};
pub use scanner::{scan_world, SourceStatus, WorldInventory};
pub use table::{CellKey, CellValue, Column, ColumnType, Row, Table};
pub use writer::{to_csv_string, write_csv};
