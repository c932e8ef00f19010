use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureKind {
    InvalidSite,
    ConnectFailed,
    CheckFailed,
    ExportFailed,
}

impl FailureKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            FailureKind::InvalidSite => "invalid-site",
            FailureKind::ConnectFailed => "connect-failed",
            FailureKind::CheckFailed => "check-failed",
            FailureKind::ExportFailed => "export-failed",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SiteOutcome {
    Clean,
    Exported { artifact: String },
    Failed { kind: FailureKind, detail: String },
}

impl SiteOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, SiteOutcome::Failed { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteReport {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub warnings: u64,
    pub errors: u64,
    pub outcome: SiteOutcome,
}
