//! TOML configuration for a fusion run.
//!
//! Every field has a default matching the standard abyssal world layout, so
//! an empty file (or no file at all) is a valid configuration:
//!
//! ```toml
//! world_dir = "Abyssal_World"
//! output = "merged.csv"
//!
//! [base]
//! file = "cells.csv"
//!
//! [[sources]]
//! file = "life.csv"
//! prefix = "life"
//! collapse_empty = ["prey_species"]
//!
//! [food_web]
//! file = "food_web.csv"
//! group_column = "biome_overlap"
//! join_column = "biome"
//! ```

use crate::error::{Error, Result};
use crate::namespace::prefixed;
use crate::normalizer::NormalizeRules;
use crate::parser::Schema;
use crate::table::ColumnType;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Root configuration for a fusion run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionConfig {
    /// Directory holding the input tables
    pub world_dir: PathBuf,
    /// Where the fused table is written
    pub output: PathBuf,
    /// The required base grid table
    pub base: BaseConfig,
    /// Optional secondary tables, merged in this order
    pub sources: Vec<SourceConfig>,
    /// Optional food web table
    pub food_web: FoodWebConfig,
}

impl Default for FusionConfig {
    fn default() -> Self {
        let source = |file: &str, prefix: &str| SourceConfig {
            file: file.to_string(),
            prefix: prefix.to_string(),
            collapse_empty: Vec::new(),
            types: BTreeMap::new(),
        };

        let mut life = source("life.csv", "life");
        life.collapse_empty.push("prey_species".to_string());
        life.types = text_columns(&["species", "behavior", "prey_species"]);

        let mut hazards = source("hazards.csv", "hazard");
        hazards.types = text_columns(&["type", "notes"]);

        Self {
            world_dir: PathBuf::from("Abyssal_World"),
            output: PathBuf::from("merged.csv"),
            base: BaseConfig::default(),
            sources: vec![
                source("corals.csv", "coral"),
                source("currents.csv", "current"),
                hazards,
                life,
                source("poi.csv", "poi"),
                source("resources.csv", "resource"),
            ],
            food_web: FoodWebConfig::default(),
        }
    }
}

impl FusionConfig {
    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| Error::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Save the configuration as TOML
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Full path of the base table
    pub fn base_path(&self) -> PathBuf {
        self.world_dir.join(&self.base.file)
    }

    /// Full path of a secondary table
    pub fn source_path(&self, source: &SourceConfig) -> PathBuf {
        self.world_dir.join(&source.file)
    }

    /// Full path of the food web table
    pub fn food_web_path(&self) -> PathBuf {
        self.world_dir.join(&self.food_web.file)
    }

    /// Every file name the configuration refers to
    pub fn known_files(&self) -> Vec<&str> {
        let mut files = vec![self.base.file.as_str()];
        files.extend(self.sources.iter().map(|s| s.file.as_str()));
        files.push(self.food_web.file.as_str());
        files
    }
}

/// The base grid table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BaseConfig {
    pub file: String,
    /// Declared column types; `row` and `col` are always integers
    pub types: BTreeMap<String, ColumnType>,
}

impl Default for BaseConfig {
    fn default() -> Self {
        let mut types = BTreeMap::new();
        for column in ["lat", "lon", "depth_m"] {
            types.insert(column.to_string(), ColumnType::Float);
        }
        types.insert("biome".to_string(), ColumnType::Text);

        Self {
            file: "cells.csv".to_string(),
            types,
        }
    }
}

impl BaseConfig {
    pub fn schema(&self) -> Schema {
        Schema::keyed(self.types.clone())
    }
}

/// A secondary table keyed by grid coordinate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    pub file: String,
    /// Category prefix for the table's value columns
    pub prefix: String,
    /// Columns (unprefixed) whose all-empty lists collapse to null
    #[serde(default)]
    pub collapse_empty: Vec<String>,
    /// Declared column types by unprefixed name
    #[serde(default)]
    pub types: BTreeMap<String, ColumnType>,
}

impl SourceConfig {
    pub fn schema(&self) -> Schema {
        Schema::keyed(self.types.clone())
    }

    /// Normalizer rules, in terms of the namespaced column names
    pub fn rules(&self) -> NormalizeRules {
        NormalizeRules::collapse_empty(
            self.collapse_empty
                .iter()
                .map(|column| prefixed(&self.prefix, column)),
        )
    }
}

/// The relational food web table, joined by category label
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FoodWebConfig {
    pub file: String,
    /// Label column the relational rows are grouped by
    pub group_column: String,
    /// Grid column matched against the group label
    pub join_column: String,
    /// Aggregated columns and their names in the fused table
    pub columns: Vec<ColumnMapping>,
    pub types: BTreeMap<String, ColumnType>,
}

impl Default for FoodWebConfig {
    fn default() -> Self {
        let mut types = text_columns(&["predator", "prey", "biome_overlap"]);
        types.insert("interaction_strength".to_string(), ColumnType::Float);

        Self {
            file: "food_web.csv".to_string(),
            group_column: "biome_overlap".to_string(),
            join_column: "biome".to_string(),
            columns: vec![
                ColumnMapping::new("predator", "biome_predators"),
                ColumnMapping::new("prey", "biome_prey"),
                ColumnMapping::new("interaction_strength", "biome_interaction_strengths"),
            ],
            types,
        }
    }
}

impl FoodWebConfig {
    pub fn schema(&self) -> Schema {
        Schema::unkeyed(self.types.clone())
    }
}

/// Source column name and the name it is given in the fused table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMapping {
    pub source: String,
    pub target: String,
}

impl ColumnMapping {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
        }
    }
}

fn text_columns(names: &[&str]) -> BTreeMap<String, ColumnType> {
    names
        .iter()
        .map(|name| (name.to_string(), ColumnType::Text))
        .collect()
}
