use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteEntry {
    /// 1-based line in the site list (header is line 1).
    pub line: usize,
    pub url: String,
    /// Set when the row could not be read as a site address at all.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub problem: Option<String>,
}

impl SiteEntry {
    pub fn new(line: usize, url: impl Into<String>) -> Self {
        Self {
            line,
            url: url.into(),
            problem: None,
        }
    }

    pub fn invalid(line: usize, url: impl Into<String>, problem: impl Into<String>) -> Self {
        Self {
            line,
            url: url.into(),
            problem: Some(problem.into()),
        }
    }
}

/// Counts reported by one dry-run check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreCheckResult {
    pub title: String,
    pub warnings: u64,
    pub errors: u64,
}

impl PreCheckResult {
    pub fn has_issues(&self) -> bool {
        self.warnings.saturating_add(self.errors) > 0
    }
}
