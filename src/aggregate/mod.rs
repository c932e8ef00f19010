use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use globset::{Glob, GlobSet, GlobSetBuilder};
use walkdir::WalkDir;

use crate::core::{AggregateSummary, SkippedFile, Table};
use crate::logs::RunLog;

pub const SHEET_CONSOLIDATED: &str = "ConsolidatedData";
pub const SHEET_USER: &str = "FilteredUserWarnings";
pub const SHEET_GROUP: &str = "FilteredGroup";

pub const USER_TYPE: &str = "User";
pub const GROUP_TYPE: &str = "Group";

#[derive(Debug)]
pub struct AggregateRequest<'a> {
    pub input_dir: &'a Path,
    pub output_file: &'a Path,
    pub include: &'a [String],
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Consolidated {
    pub all: Table,
    pub users: Table,
    pub groups: Table,
}

impl Consolidated {
    /// Appends one artifact's rows to all three tables.
    pub fn absorb(&mut self, table: Table) {
        for record in table.rows {
            if record.is_flagged(USER_TYPE) {
                self.users.push(record.clone());
            } else if record.is_flagged(GROUP_TYPE) {
                self.groups.push(record.clone());
            }
            self.all.push(record);
        }
    }
}

pub fn validate_patterns(patterns: &[String]) -> Result<()> {
    build_include_set(patterns).map(|_| ())
}

fn build_include_set(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern)
            .with_context(|| format!("invalid artifact pattern: {pattern}"))?;
        builder.add(glob);
    }
    builder.build().context("failed to build artifact patterns")
}

/// Files directly inside `dir` whose names match `include`, sorted by file
/// name. `exclude` (the final output) is never returned.
pub fn discover_artifacts(dir: &Path, include: &[String], exclude: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(anyhow!("report directory not found: {}", dir.display()));
    }
    let set = build_include_set(include)?;
    let exclude = std::fs::canonicalize(exclude).ok();

    let mut files = Vec::new();
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.with_context(|| format!("failed to list {}", dir.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_string();
        // Lock files left by an open spreadsheet application.
        if name.starts_with("~$") || !set.is_match(&name) {
            continue;
        }
        if let Some(exclude) = exclude.as_deref() {
            if std::fs::canonicalize(entry.path()).ok().as_deref() == Some(exclude) {
                continue;
            }
        }
        files.push(entry.into_path());
    }
    Ok(files)
}

/// Loads every artifact into one [`Consolidated`]. Unreadable files are
/// logged and reported as skipped.
pub fn consolidate(files: &[PathBuf], log: &mut RunLog) -> (Consolidated, Vec<SkippedFile>) {
    let mut out = Consolidated::default();
    let mut skipped = Vec::new();
    for path in files {
        match crate::sheets::read_table(path) {
            Ok(table) => {
                log.info(format!("loaded {} rows from {}", table.len(), path.display()));
                out.absorb(table);
            }
            Err(err) => {
                log.error(format!("skipping {}: {err:#}", path.display()));
                skipped.push(SkippedFile {
                    path: path.clone(),
                    error: format!("{err:#}"),
                });
            }
        }
    }
    (out, skipped)
}

/// Merges the per-site artifacts into the three-sheet workbook.
///
/// An empty report directory is not an error: a warning is logged and no
/// output is written (`summary.output` stays `None`). Failing to write the
/// workbook is fatal.
pub fn aggregate_reports(req: &AggregateRequest<'_>, log: &mut RunLog) -> Result<AggregateSummary> {
    let files = discover_artifacts(req.input_dir, req.include, req.output_file)?;
    let mut summary = AggregateSummary {
        files_found: files.len(),
        ..AggregateSummary::default()
    };

    if files.is_empty() {
        log.warning(format!(
            "no report artifacts found in {}; nothing to consolidate",
            req.input_dir.display()
        ));
        return Ok(summary);
    }

    log.info(format!(
        "consolidating {} report(s) from {}",
        files.len(),
        req.input_dir.display()
    ));
    let (data, skipped) = consolidate(&files, log);
    summary.files_loaded = files.len() - skipped.len();
    summary.skipped = skipped;
    summary.consolidated_rows = data.all.len();
    summary.user_rows = data.users.len();
    summary.group_rows = data.groups.len();

    crate::sheets::write_workbook(
        req.output_file,
        &[
            (SHEET_CONSOLIDATED, &data.all),
            (SHEET_USER, &data.users),
            (SHEET_GROUP, &data.groups),
        ],
    )
    .with_context(|| {
        format!(
            "failed to write consolidated report: {}",
            req.output_file.display()
        )
    })?;

    log.success(format!(
        "consolidated report written: {} (rows: {}, user: {}, group: {})",
        req.output_file.display(),
        summary.consolidated_rows,
        summary.user_rows,
        summary.group_rows
    ));
    summary.output = Some(req.output_file.to_path_buf());
    Ok(summary)
}
