//! Run report for a fusion pass
//!
//! Records what each stage did so a run can be audited after the fact.

use crate::error::{Error, Result};
use crate::merger::MergeStats;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// What happened to one source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StageOutcome {
    /// The source was joined onto the grid
    Merged {
        /// Records read from the source
        records: usize,
        /// True if duplicate keys were collapsed into lists
        aggregated: bool,
        /// Cells collapsed to null by normalizer rules
        collapsed: usize,
        merge: MergeStats,
    },
    /// The source did not contribute
    Skipped { reason: String },
}

/// One stage of the run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageReport {
    /// Source file
    pub source: PathBuf,
    /// Category prefix, or "food_web"
    pub category: String,
    #[serde(flatten)]
    pub outcome: StageOutcome,
}

/// Summary of one fusion run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FusionReport {
    /// When the run finished
    pub generated_at: DateTime<Utc>,
    pub base: PathBuf,
    pub base_rows: usize,
    pub output_columns: usize,
    /// Output file, once written
    pub output: Option<PathBuf>,
    pub stages: Vec<StageReport>,
}

impl FusionReport {
    /// Start a report for a base table
    pub fn new(base: PathBuf, base_rows: usize) -> Self {
        Self {
            generated_at: Utc::now(),
            base,
            base_rows,
            output_columns: 0,
            output: None,
            stages: Vec::new(),
        }
    }

    /// Add a stage
    pub fn push(&mut self, source: PathBuf, category: impl Into<String>, outcome: StageOutcome) {
        self.stages.push(StageReport {
            source,
            category: category.into(),
            outcome,
        });
    }

    /// Categories that were merged
    pub fn merged_categories(&self) -> Vec<&str> {
        self.stages
            .iter()
            .filter(|s| matches!(s.outcome, StageOutcome::Merged { .. }))
            .map(|s| s.category.as_str())
            .collect()
    }

    /// Categories that were skipped
    pub fn skipped_categories(&self) -> Vec<&str> {
        self.stages
            .iter()
            .filter(|s| matches!(s.outcome, StageOutcome::Skipped { .. }))
            .map(|s| s.category.as_str())
            .collect()
    }

    /// Load a report from a JSON file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| Error::FileRead {
            path: path.as_ref().to_path_buf(),
            source: e,
        })?;
        serde_json::from_str(&content).map_err(Error::Json)
    }

    /// Save the report as JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report() -> FusionReport {
        let mut report = FusionReport::new(PathBuf::from("cells.csv"), 4);
        report.push(
            PathBuf::from("hazards.csv"),
            "hazard",
            StageOutcome::Merged {
                records: 3,
                aggregated: true,
                collapsed: 0,
                merge: MergeStats {
                    matched_rows: 1,
                    unmatched_rows: 3,
                    columns_added: 2,
                },
            },
        );
        report.push(
            PathBuf::from("poi.csv"),
            "poi",
            StageOutcome::Skipped {
                reason: "not found".to_string(),
            },
        );
        report
    }

    #[test]
    fn test_report_categories() {
        let report = report();
        assert_eq!(report.merged_categories(), vec!["hazard"]);
        assert_eq!(report.skipped_categories(), vec!["poi"]);
    }

    #[test]
    fn test_report_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");

        let report = report();
        report.save(&path).unwrap();
        let loaded = FusionReport::load(&path).unwrap();

        assert_eq!(loaded.stages, report.stages);
        assert_eq!(loaded.generated_at, report.generated_at);

        let json: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json["stages"][1]["status"], "skipped");
    }
}
