//! Abyssal world fusion CLI
//!
//! Command-line tool for fusing the abyssal world tables into one grid table,
//! then viewing, exporting and querying the result.

use abyss_core::{
    grid_json, parse_csv, read_fused, run as run_fusion, scan_world, validate_tiles,
    CellKey, CellValue, FusionConfig, Query, Schema, StageOutcome, Table,
};
use clap::{Parser, Subcommand};
use log::info;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "abyss")]
#[command(about = "Abyssal world grid fusion", long_about = None)]
#[command(version)]
struct Cli {
    /// Verbosity level (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fuse the world tables into one grid table
    Fuse {
        /// TOML configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Directory holding the input tables (overrides the config)
        #[arg(short, long)]
        world_dir: Option<PathBuf>,

        /// Output CSV path (overrides the config)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Write a JSON run report to this path
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// List which configured source files are present
    Inspect {
        /// TOML configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Directory holding the input tables (overrides the config)
        #[arg(short, long)]
        world_dir: Option<PathBuf>,
    },

    /// Show the fused table
    Show {
        /// Fused table
        #[arg(short, long, default_value = "merged.csv")]
        input: PathBuf,

        /// Maximum number of rows to display
        #[arg(short, long)]
        limit: Option<usize>,

        /// Columns to display (comma-separated)
        #[arg(short, long)]
        columns: Option<String>,
    },

    /// Show every attribute of one cell
    Explain {
        /// Fused table
        #[arg(short, long, default_value = "merged.csv")]
        input: PathBuf,

        /// Grid row
        #[arg(long)]
        row: i64,

        /// Grid column
        #[arg(long)]
        col: i64,
    },

    /// Parse and display a single CSV file
    Parse {
        /// Path to CSV file
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Export the fused table as JSON records
    Export {
        /// Fused table
        #[arg(short, long, default_value = "merged.csv")]
        input: PathBuf,

        /// Output file path (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Run a query and print the matching (row, col) records
    Query {
        /// Fused table
        #[arg(short, long, default_value = "merged.csv")]
        input: PathBuf,

        /// Query text, e.g. "where depth_m > 2000 sort sum(resource_economic_value) desc limit 5"
        query: String,
    },

    /// Validate a JSON list of tiles to highlight
    Highlight {
        /// Tiles, e.g. '[{"row": 1, "col": 2}]'
        tiles: String,
    },

    /// Write the default configuration as a TOML file
    InitConfig {
        /// Output path for the configuration
        #[arg(short, long, default_value = "abyss.toml")]
        output: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    if let Err(e) = run(cli.command) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(command: Commands) -> abyss_core::Result<()> {
    match command {
        Commands::Fuse {
            config,
            world_dir,
            output,
            report,
        } => cmd_fuse(config.as_deref(), world_dir, output, report.as_deref()),
        Commands::Inspect { config, world_dir } => cmd_inspect(config.as_deref(), world_dir),
        Commands::Show {
            input,
            limit,
            columns,
        } => cmd_show(&input, limit, columns),
        Commands::Explain { input, row, col } => cmd_explain(&input, CellKey::new(row, col)),
        Commands::Parse { file } => cmd_parse(&file),
        Commands::Export { input, output } => cmd_export(&input, output.as_deref()),
        Commands::Query { input, query } => cmd_query(&input, &query),
        Commands::Highlight { tiles } => cmd_highlight(&tiles),
        Commands::InitConfig { output } => cmd_init_config(&output),
    }
}

fn load_config(
    path: Option<&Path>,
    world_dir: Option<PathBuf>,
    output: Option<PathBuf>,
) -> abyss_core::Result<FusionConfig> {
    let mut config = match path {
        Some(path) => FusionConfig::from_file(path)?,
        None => FusionConfig::default(),
    };
    if let Some(dir) = world_dir {
        config.world_dir = dir;
    }
    if let Some(output) = output {
        config.output = output;
    }
    Ok(config)
}

fn cmd_fuse(
    config_path: Option<&Path>,
    world_dir: Option<PathBuf>,
    output: Option<PathBuf>,
    report_path: Option<&Path>,
) -> abyss_core::Result<()> {
    let config = load_config(config_path, world_dir, output)?;
    let report = run_fusion(&config)?;

    println!(
        "Fused {} cells x {} columns into {}",
        report.base_rows,
        report.output_columns,
        config.output.display()
    );
    for stage in &report.stages {
        match &stage.outcome {
            StageOutcome::Merged {
                records,
                aggregated,
                collapsed,
                merge,
            } => println!(
                "  {:<10} merged   {} records, {} cells matched{}{}",
                stage.category,
                records,
                merge.matched_rows,
                if *aggregated { ", aggregated" } else { "" },
                if *collapsed > 0 {
                    format!(", {} collapsed to null", collapsed)
                } else {
                    String::new()
                },
            ),
            StageOutcome::Skipped { reason } => {
                println!("  {:<10} skipped  {}", stage.category, reason)
            }
        }
    }

    if let Some(path) = report_path {
        report.save(path)?;
        info!("Report written to {}", path.display());
    }

    Ok(())
}

fn cmd_inspect(config_path: Option<&Path>, world_dir: Option<PathBuf>) -> abyss_core::Result<()> {
    let config = load_config(config_path, world_dir, None)?;
    let inventory = scan_world(&config.world_dir, &config)?;

    println!("World directory: {}", inventory.root.display());
    println!();
    for source in &inventory.sources {
        let marker = match (source.present, source.required) {
            (true, _) => "found",
            (false, true) => "MISSING (required)",
            (false, false) => "missing",
        };
        println!("  {:<20} {:<10} {}", source.file, source.role, marker);
    }

    if !inventory.unreferenced.is_empty() {
        println!();
        println!("Unreferenced CSV files:");
        for path in &inventory.unreferenced {
            println!("  {}", path.display());
        }
    }

    println!();
    if inventory.is_runnable() {
        println!("Ready to fuse ({} optional sources missing)", inventory.missing().len());
    } else {
        println!("Cannot fuse: base table is missing");
    }

    Ok(())
}

/// Load the fused table, or print the "not generated" notice
fn require_fused(input: &Path) -> abyss_core::Result<Option<Table>> {
    let table = read_fused(input)?;
    if table.is_none() {
        println!("{} not found; run 'abyss fuse' first", input.display());
    }
    Ok(table)
}

fn cmd_show(input: &Path, limit: Option<usize>, columns: Option<String>) -> abyss_core::Result<()> {
    let Some(table) = require_fused(input)? else {
        return Ok(());
    };

    // Filter columns if specified
    let col_filter: Option<Vec<&str>> = columns.as_ref().map(|c| c.split(',').collect());

    let display_cols: Vec<&abyss_core::Column> = if let Some(ref filter) = col_filter {
        table
            .columns
            .iter()
            .filter(|c| filter.contains(&c.name.as_str()))
            .collect()
    } else {
        table.columns.iter().collect()
    };

    print_rows(&table, &display_cols, limit.unwrap_or(table.row_count()));
    Ok(())
}

fn print_rows(table: &Table, display_cols: &[&abyss_core::Column], row_limit: usize) {
    let header: Vec<&str> = display_cols.iter().map(|c| c.name.as_str()).collect();
    println!("{}", header.join("\t"));
    println!("{}", "-".repeat(header.len() * 12));

    for row in table.rows.iter().take(row_limit) {
        let values: Vec<String> = display_cols
            .iter()
            .map(|col| {
                row.get(col.index)
                    .map(|c| c.to_string_value())
                    .unwrap_or_default()
            })
            .collect();
        println!("{}", values.join("\t"));
    }

    if table.row_count() > row_limit {
        println!("... ({} more rows)", table.row_count() - row_limit);
    }
}

fn cmd_explain(input: &Path, key: CellKey) -> abyss_core::Result<()> {
    let Some(table) = require_fused(input)? else {
        return Ok(());
    };

    let Some(row) = table.find_row(key) else {
        println!("Cell {} is not in the grid", key);
        return Ok(());
    };

    println!("Cell {}", key);
    println!();

    // Group list columns by category prefix so aligned entries read together
    let mut categories: BTreeMap<&str, Vec<(&str, &[CellValue])>> = BTreeMap::new();
    for column in &table.columns {
        match row.get(column.index) {
            Some(CellValue::List(items)) => {
                let prefix = column.name.split('_').next().unwrap_or(column.name.as_str());
                categories
                    .entry(prefix)
                    .or_default()
                    .push((column.name.as_str(), items.as_slice()));
            }
            Some(CellValue::Empty) | None => println!("  {:<32} -", column.name),
            Some(value) => println!("  {:<32} {}", column.name, value),
        }
    }

    for (category, columns) in categories {
        let len = columns.iter().map(|(_, items)| items.len()).max().unwrap_or(0);
        println!();
        println!("{} ({} entries)", category, len);
        for i in 0..len {
            let entry: Vec<String> = columns
                .iter()
                .map(|(name, items)| {
                    let value = items.get(i).map(|v| v.to_string_value()).unwrap_or_default();
                    format!("{}={}", name, value)
                })
                .collect();
            println!("  {}. {}", i + 1, entry.join(", "));
        }
    }

    Ok(())
}

fn cmd_parse(file: &Path) -> abyss_core::Result<()> {
    let table = parse_csv(file, &Schema::default())?;

    println!("File: {}", file.display());
    println!("Columns: {}", table.column_count());
    println!("Rows: {}", table.row_count());
    println!();

    let columns: Vec<&abyss_core::Column> = table.columns.iter().collect();
    print_rows(&table, &columns, 10);

    Ok(())
}

fn cmd_export(input: &Path, output: Option<&Path>) -> abyss_core::Result<()> {
    let json = grid_json(input)?;
    let text = serde_json::to_string_pretty(&json)?;

    match output {
        Some(path) => {
            let file = File::create(path)?;
            let mut writer = BufWriter::new(file);
            writeln!(writer, "{}", text)?;
            writer.flush()?;
            let rows = json.as_array().map(|a| a.len()).unwrap_or(0);
            println!("Exported {} rows to {}", rows, path.display());
        }
        None => println!("{}", text),
    }

    Ok(())
}

fn cmd_query(input: &Path, text: &str) -> abyss_core::Result<()> {
    let Some(table) = read_fused(input)? else {
        print_error(&format!("{} not found", input.display()));
        return Ok(());
    };

    let result = Query::parse(text).and_then(|query| query.execute(&table));
    match result {
        Ok(hits) => println!("{}", serde_json::to_string_pretty(&hits)?),
        Err(e) => {
            print_error(&e.to_string());
            std::process::exit(2);
        }
    }
    Ok(())
}

fn cmd_highlight(tiles: &str) -> abyss_core::Result<()> {
    let value: serde_json::Value = match serde_json::from_str(tiles) {
        Ok(value) => value,
        Err(e) => {
            print_error(&format!("tiles are not valid JSON: {}", e));
            return Ok(());
        }
    };

    match validate_tiles(&value) {
        Ok(keys) => println!("{}", serde_json::to_string(&keys)?),
        Err(e) => {
            print_error(&e.to_string());
            std::process::exit(2);
        }
    }
    Ok(())
}

/// Print a failure as a JSON error object
fn print_error(message: &str) {
    println!("{}", serde_json::json!({ "error": message }));
}

fn cmd_init_config(output: &Path) -> abyss_core::Result<()> {
    let config = FusionConfig::default();
    config.save(output)?;

    println!("Created configuration file: {}", output.display());
    println!("Sources: {}", config.sources.len());
    println!();
    println!("Edit the file to adjust sources and rules, then run:");
    println!("  abyss fuse --config {}", output.display());

    Ok(())
}
