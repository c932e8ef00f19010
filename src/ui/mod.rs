use anyhow::Error;
use std::io::{self, Write};
use unicode_width::UnicodeWidthChar;

use crate::core::{AggregateSummary, RunSummary, SiteOutcome, SiteReport};

#[derive(Debug, Clone)]
pub struct UiConfig {
    pub color: bool,
    pub stderr_is_tty: bool,
    pub quiet: bool,
    pub verbose: bool,
}

pub fn eprintln_error(err: &Error) {
    let mut stderr = io::stderr().lock();
    let _ = writeln!(stderr, "error:");
    let _ = writeln!(stderr, "  {err}");

    let mut causes = err.chain().skip(1).peekable();
    if causes.peek().is_some() {
        let _ = writeln!(stderr, "caused by:");
        for cause in causes {
            let _ = writeln!(stderr, "  - {cause}");
        }
    }

    let _ = writeln!(stderr, "next:");
    let _ = writeln!(
        stderr,
        "  - check the log file named by `logPath` for the full run history"
    );
    let _ = writeln!(
        stderr,
        "  - run `migcheck config --show` to inspect the effective settings"
    );
}

pub fn print_run_summary(summary: &RunSummary, cfg: &UiConfig) {
    if cfg.quiet {
        return;
    }
    let mut out = io::stdout().lock();
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "Pre-check: {} site(s), {} succeeded, {} failed, {} report(s)",
        summary.attempted,
        summary.succeeded,
        summary.failed,
        summary.artifacts.len()
    );
    if summary.sites.is_empty() {
        return;
    }
    print_sites_table(&mut out, &summary.sites, cfg.color, cfg.verbose);
}

pub fn print_aggregate_summary(summary: &AggregateSummary, cfg: &UiConfig) {
    if cfg.quiet {
        return;
    }
    let mut out = io::stdout().lock();
    let _ = writeln!(out);
    let Some(output) = &summary.output else {
        let _ = writeln!(out, "Consolidation: no report artifacts found, nothing written");
        return;
    };
    let _ = writeln!(
        out,
        "Consolidation: {}/{} file(s) loaded -> {}",
        summary.files_loaded,
        summary.files_found,
        output.display()
    );
    let _ = writeln!(out, "  ConsolidatedData      {:>6} rows", summary.consolidated_rows);
    let _ = writeln!(out, "  FilteredUserWarnings  {:>6} rows", summary.user_rows);
    let _ = writeln!(out, "  FilteredGroup         {:>6} rows", summary.group_rows);
    for skipped in &summary.skipped {
        let _ = writeln!(
            out,
            "  {} {}",
            format_status("skipped", cfg.color),
            skipped.path.display()
        );
        if cfg.verbose {
            let _ = writeln!(out, "      {}", skipped.error);
        }
    }
}

fn print_sites_table(out: &mut dyn Write, sites: &[SiteReport], color: bool, verbose: bool) {
    let labels: Vec<String> = sites
        .iter()
        .map(|s| truncate_middle(s.title.as_deref().unwrap_or(&s.url), 48))
        .collect();
    let title_w = labels
        .iter()
        .map(|l| visible_width_ansi(l))
        .max()
        .unwrap_or(0)
        .max("SITE".len());
    let status_w = "export-failed".len();

    let _ = writeln!(
        out,
        "{}  {}  {:>5}  {:>5}",
        pad_end_display("SITE", title_w),
        pad_end_display("STATUS", status_w),
        "WARN",
        "ERR"
    );
    for (site, label) in sites.iter().zip(&labels) {
        let status = match &site.outcome {
            SiteOutcome::Clean => format_status("ok", color),
            SiteOutcome::Exported { .. } => format_status("issues", color),
            SiteOutcome::Failed { kind, .. } => format_status(kind.as_str(), color),
        };
        let _ = writeln!(
            out,
            "{}  {}  {:>5}  {:>5}",
            pad_end_display(label, title_w),
            pad_end_display(&status, status_w),
            site.warnings,
            site.errors
        );
        match &site.outcome {
            SiteOutcome::Exported { artifact } => {
                let _ = writeln!(out, "    -> {artifact}");
            }
            SiteOutcome::Failed { detail, .. } if verbose => {
                let _ = writeln!(out, "    {detail}");
            }
            _ => {}
        }
    }
}

fn format_status(s: &str, color: bool) -> String {
    if !color {
        return s.to_string();
    }
    let code = match s {
        "ok" => "32",
        "issues" | "skipped" => "33",
        _ => "31",
    };
    format!("\x1b[{code}m{s}\x1b[0m")
}

fn truncate_middle(s: &str, max_chars: usize) -> String {
    let count = s.chars().count();
    if count <= max_chars || max_chars < 5 {
        return s.to_string();
    }
    let keep = max_chars - 1;
    let head = keep / 2;
    let tail = keep - head;
    let start: String = s.chars().take(head).collect();
    let end: String = s.chars().skip(count - tail).collect();
    format!("{start}…{end}")
}

fn pad_end_display(s: &str, width: usize) -> String {
    let w = visible_width_ansi(s);
    if w >= width {
        return s.to_string();
    }
    format!("{s}{}", " ".repeat(width - w))
}

fn visible_width_ansi(s: &str) -> usize {
    let mut width: usize = 0;
    let mut chars = s.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch == '\x1b' && chars.peek() == Some(&'[') {
            let _ = chars.next();
            for ch2 in chars.by_ref() {
                if ch2 == 'm' {
                    break;
                }
            }
            continue;
        }
        width = width.saturating_add(UnicodeWidthChar::width(ch).unwrap_or(0));
    }
    width
}
