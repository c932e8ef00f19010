use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use time::OffsetDateTime;
use time::macros::format_description;

use crate::core::{FailureKind, RunSummary, SiteEntry, SiteOutcome, SiteReport};
use crate::engine::{Credential, Destination, MigrationEngine};
use crate::logs::RunLog;

pub const ARTIFACT_EXTENSION: &str = "xlsx";

#[derive(Debug)]
pub struct RunRequest<'a> {
    pub destination_url: &'a str,
    pub credential: &'a Credential,
    pub sites: &'a [SiteEntry],
    pub report_dir: &'a Path,
}

#[derive(Debug, Clone)]
pub struct RunnerOptions {
    /// Clock used for artifact names.
    pub now: fn() -> OffsetDateTime,
    pub show_progress: bool,
}

impl Default for RunnerOptions {
    fn default() -> Self {
        Self {
            now: crate::logs::now,
            show_progress: false,
        }
    }
}

/// Replaces every character outside `[A-Za-z0-9]` with `_`.
pub fn sanitize_title(title: &str) -> String {
    title
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

/// `{title}_PreCheck_{yyyyMMdd_HHmmss}.xlsx`
pub fn artifact_file_name(title: &str, at: OffsetDateTime) -> String {
    let ts = at
        .format(format_description!(
            "[year][month][day]_[hour][minute][second]"
        ))
        .unwrap_or_else(|_| at.unix_timestamp().to_string());
    format!(
        "{}_PreCheck_{ts}.{ARTIFACT_EXTENSION}",
        sanitize_title(title)
    )
}

/// Runs the dry-run check for every site in order.
///
/// Only an unavailable engine, an unusable report directory, or a failed
/// destination connection abort the batch; everything that goes wrong for a
/// single site is recorded in its [`SiteReport`] and the loop moves on.
pub fn run_prechecks<E: MigrationEngine>(
    engine: &mut E,
    req: &RunRequest<'_>,
    opts: &RunnerOptions,
    log: &mut RunLog,
) -> Result<RunSummary> {
    engine.ensure_available()?;

    std::fs::create_dir_all(req.report_dir).with_context(|| {
        format!(
            "failed to create report directory: {}",
            req.report_dir.display()
        )
    })?;

    log.info(format!("connecting to destination {}", req.destination_url));
    let destination = match engine.connect_destination(req.destination_url, req.credential) {
        Ok(destination) => destination,
        Err(err) => {
            log.error(format!(
                "destination connection failed: {} ({err:#})",
                req.destination_url
            ));
            return Err(err.context(format!(
                "failed to connect to destination: {}",
                req.destination_url
            )));
        }
    };
    log.success(format!(
        "connected to destination {} ({})",
        destination.title, destination.url
    ));

    let pb = if opts.show_progress {
        let pb = indicatif::ProgressBar::new_spinner();
        pb.set_draw_target(indicatif::ProgressDrawTarget::stderr());
        pb.enable_steady_tick(Duration::from_millis(120));
        Some(pb)
    } else {
        None
    };
    log.set_progress(pb.clone());

    let mut summary = RunSummary::default();
    let total = req.sites.len();
    for (i, site) in req.sites.iter().enumerate() {
        if let Some(pb) = &pb {
            pb.set_message(format!("checking {}/{total} {}", i + 1, site.url));
        }
        let report = check_site(engine, &destination, req, site, opts, log);
        summary.record(report);
    }

    if let Some(pb) = pb {
        pb.finish_and_clear();
    }
    log.set_progress(None);

    engine.release(destination);

    log.info(format!(
        "pre-check finished: attempted={} succeeded={} failed={} artifacts={}",
        summary.attempted,
        summary.succeeded,
        summary.failed,
        summary.artifacts.len()
    ));
    Ok(summary)
}

fn check_site<E: MigrationEngine>(
    engine: &mut E,
    destination: &Destination,
    req: &RunRequest<'_>,
    site: &SiteEntry,
    opts: &RunnerOptions,
    log: &mut RunLog,
) -> SiteReport {
    let url = site.url.trim();
    let mut report = SiteReport {
        url: url.to_string(),
        title: None,
        warnings: 0,
        errors: 0,
        outcome: SiteOutcome::Clean,
    };

    let invalid = match &site.problem {
        Some(problem) => Err(problem.clone()),
        None => crate::sites::validate_site_url(url),
    };
    if let Err(detail) = invalid {
        log.error(format!("line {}: {detail}", site.line));
        report.outcome = failed(FailureKind::InvalidSite, detail);
        return report;
    }

    log.info(format!("connecting to source {url}"));
    let source = match engine.connect_source(url, req.credential) {
        Ok(source) => source,
        Err(err) => {
            log.error(format!("failed to connect to {url}: {err:#}"));
            report.outcome = failed(FailureKind::ConnectFailed, format!("{err:#}"));
            return report;
        }
    };
    report.title = Some(source.title.clone());

    let outcome = match engine.check(&source, destination, req.credential) {
        Ok(outcome) => outcome,
        Err(err) => {
            log.error(format!("pre-check failed for {url}: {err:#}"));
            report.outcome = failed(FailureKind::CheckFailed, format!("{err:#}"));
            return report;
        }
    };
    let result = outcome.result;
    report.title = Some(result.title.clone());
    report.warnings = result.warnings;
    report.errors = result.errors;

    if !result.has_issues() {
        log.success(format!("{} ({url}): no warnings or errors", result.title));
        return report;
    }

    let target: PathBuf = req
        .report_dir
        .join(artifact_file_name(&result.title, (opts.now)()));
    if target.exists() {
        let detail = format!("artifact already exists, not overwriting: {}", target.display());
        log.error(format!("{} ({url}): {detail}", result.title));
        report.outcome = failed(FailureKind::ExportFailed, detail);
        return report;
    }

    // A checked site whose report could not be written still counts as failed.
    if let Err(err) = engine.export(outcome.detail, &target) {
        log.error(format!("failed to export report for {url}: {err:#}"));
        report.outcome = failed(FailureKind::ExportFailed, format!("{err:#}"));
        return report;
    }

    log.warning(format!(
        "{} ({url}): warnings={} errors={}, report: {}",
        result.title,
        result.warnings,
        result.errors,
        target.display()
    ));
    report.outcome = SiteOutcome::Exported {
        artifact: target.display().to_string(),
    };
    report
}

fn failed(kind: FailureKind, detail: impl Into<String>) -> SiteOutcome {
    SiteOutcome::Failed {
        kind,
        detail: detail.into(),
    }
}
