//! World directory inventory: which configured sources exist on disk

use crate::config::FusionConfig;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Presence of one configured source file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceStatus {
    /// File name as configured
    pub file: String,
    /// What the file feeds ("base", a category prefix, or "food_web")
    pub role: String,
    pub present: bool,
    /// Required sources halt the run when missing
    pub required: bool,
}

/// Result of scanning a world directory
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorldInventory {
    /// Directory that was scanned
    pub root: PathBuf,
    /// Every configured source, in merge order
    pub sources: Vec<SourceStatus>,
    /// CSV files in the directory that no configured source refers to
    pub unreferenced: Vec<PathBuf>,
}

impl WorldInventory {
    /// True if the run can proceed (every required source is present)
    pub fn is_runnable(&self) -> bool {
        self.sources.iter().all(|s| s.present || !s.required)
    }

    /// Configured sources that are absent
    pub fn missing(&self) -> Vec<&SourceStatus> {
        self.sources.iter().filter(|s| !s.present).collect()
    }
}

/// Scan the top level of a world directory for the configured CSV files
pub fn scan_world<P: AsRef<Path>>(root: P, config: &FusionConfig) -> Result<WorldInventory> {
    let root = root.as_ref();
    let mut found: BTreeSet<String> = BTreeSet::new();
    let mut csv_paths: Vec<PathBuf> = Vec::new();

    for entry in WalkDir::new(root)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
        .sort_by_file_name()
    {
        let entry = entry?;
        let path = entry.path();

        // Only process CSV files
        if entry.file_type().is_file() && path.extension().is_some_and(|ext| ext == "csv") {
            if let Some(name) = path.file_name().and_then(|s| s.to_str()) {
                found.insert(name.to_string());
                csv_paths.push(path.to_path_buf());
            }
        }
    }

    let status = |file: &str, role: &str, required: bool| SourceStatus {
        file: file.to_string(),
        role: role.to_string(),
        present: found.contains(file),
        required,
    };

    let mut sources = vec![status(&config.base.file, "base", true)];
    sources.extend(
        config
            .sources
            .iter()
            .map(|s| status(&s.file, &s.prefix, false)),
    );
    sources.push(status(&config.food_web.file, "food_web", false));

    let known = config.known_files();
    let unreferenced = csv_paths
        .into_iter()
        .filter(|p| {
            p.file_name()
                .and_then(|s| s.to_str())
                .is_some_and(|name| !known.contains(&name))
        })
        .collect();

    Ok(WorldInventory {
        root: root.to_path_buf(),
        sources,
        unreferenced,
    })
}
