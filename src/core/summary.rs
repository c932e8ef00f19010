use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::core::SiteReport;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub artifacts: Vec<PathBuf>,
    pub sites: Vec<SiteReport>,
}

impl RunSummary {
    pub fn record(&mut self, report: SiteReport) {
        self.attempted += 1;
        if report.outcome.is_success() {
            self.succeeded += 1;
        } else {
            self.failed += 1;
        }
        if let crate::core::SiteOutcome::Exported { artifact } = &report.outcome {
            self.artifacts.push(PathBuf::from(artifact));
        }
        self.sites.push(report);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateSummary {
    pub files_found: usize,
    pub files_loaded: usize,
    pub skipped: Vec<SkippedFile>,
    pub consolidated_rows: usize,
    pub user_rows: usize,
    pub group_rows: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<PathBuf>,
}
