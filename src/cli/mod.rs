use std::io;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, CommandFactory, Parser, Subcommand};
use serde::Serialize;

use crate::aggregate::AggregateRequest;
use crate::config::EffectiveConfig;
use crate::core::{AggregateSummary, RunSummary};
use crate::engine::{Credential, PowerShellEngine, PowerShellOptions};
use crate::logs::{ConsoleOptions, RunLog};
use crate::runner::{RunRequest, RunnerOptions};
use crate::ui::UiConfig;

#[derive(Debug, Parser)]
#[command(
    name = "migcheck",
    version,
    about = "Run SharePoint migration pre-checks for a list of sites and consolidate the reports"
)]
pub struct Cli {
    /// Print a machine-readable summary on stdout.
    #[arg(long, global = true)]
    pub json: bool,
    #[arg(long = "no-color", global = true)]
    pub no_color: bool,
    #[arg(long, global = true)]
    pub verbose: bool,
    /// Do not mirror the log to the console or print summaries.
    #[arg(long, global = true)]
    pub quiet: bool,
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    /// Seconds allowed for each engine call (overrides `engine.timeoutSecs`).
    #[arg(long, global = true)]
    pub timeout: Option<u64>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Pre-check every site, then consolidate the exported reports.
    Run,
    /// Pre-check every site only.
    Check,
    /// Consolidate existing reports only.
    Aggregate(AggregateArgs),
    Config(ConfigArgs),
    Completion(CompletionArgs),
}

#[derive(Debug, Args)]
pub struct AggregateArgs {
    /// Report directory (defaults to `reportPath`).
    #[arg(long)]
    pub input: Option<PathBuf>,
    /// Output workbook (defaults to `consolidatedOutputFile`).
    #[arg(long)]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[arg(long)]
    pub show: bool,
}

#[derive(Debug, Args)]
pub struct CompletionArgs {
    pub shell: String,
}

#[derive(Debug, Serialize)]
struct RunOutput<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    precheck: Option<&'a RunSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    aggregate: Option<&'a AggregateSummary>,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    let stdout_is_tty = io::stdout().is_terminal();
    let stderr_is_tty = io::stderr().is_terminal();

    let cwd = std::env::current_dir().context("failed to resolve the working directory")?;
    let env_config_path = std::env::var_os("MIGCHECK_CONFIG").map(PathBuf::from);
    let mut cfg = crate::config::load(
        cli.config.as_deref().or(env_config_path.as_deref()),
        &cwd,
    )
    .map_err(crate::exit::invalid_args_err)?;
    if let Some(timeout) = cli.timeout {
        cfg.engine.timeout_secs = timeout;
    }
    if cfg.engine.timeout_secs == 0 {
        return Err(crate::exit::invalid_args("engine timeout must be greater than 0"));
    }
    crate::aggregate::validate_patterns(&cfg.aggregate.include)
        .map_err(crate::exit::invalid_args_err)?;

    let ui_cfg = UiConfig {
        color: stdout_is_tty && !cli.no_color,
        stderr_is_tty,
        quiet: cli.quiet || cli.json,
        verbose: cli.verbose,
    };
    let console = ConsoleOptions {
        enabled: !cli.quiet,
        color: stderr_is_tty && !cli.no_color,
    };
    let show_progress = ui_cfg.stderr_is_tty && !cli.quiet && !cli.json;

    match cli.command {
        Commands::Run => {
            cfg.require_check_settings()?;
            let mut log = RunLog::open(&cfg.log_path, console)?;
            log.info("=== migcheck run started ===");
            let precheck = precheck_stage(&cfg, show_progress, &mut log)
                .inspect_err(|err| log_fatal(&mut log, err))?;
            crate::ui::print_run_summary(&precheck, &ui_cfg);
            let aggregate = aggregate_stage(
                &cfg.report_path,
                &cfg.consolidated_output_file,
                &cfg,
                &mut log,
            )
            .inspect_err(|err| log_fatal(&mut log, err))?;
            crate::ui::print_aggregate_summary(&aggregate, &ui_cfg);
            log.info("=== migcheck run finished ===");
            if cli.json {
                write_json(&RunOutput {
                    precheck: Some(&precheck),
                    aggregate: Some(&aggregate),
                })?;
            }
        }
        Commands::Check => {
            cfg.require_check_settings()?;
            let mut log = RunLog::open(&cfg.log_path, console)?;
            let precheck = precheck_stage(&cfg, show_progress, &mut log)
                .inspect_err(|err| log_fatal(&mut log, err))?;
            crate::ui::print_run_summary(&precheck, &ui_cfg);
            if cli.json {
                write_json(&RunOutput {
                    precheck: Some(&precheck),
                    aggregate: None,
                })?;
            }
        }
        Commands::Aggregate(args) => {
            let input = args.input.unwrap_or_else(|| cfg.report_path.clone());
            let output = args
                .output
                .unwrap_or_else(|| cfg.consolidated_output_file.clone());
            let mut log = RunLog::open(&cfg.log_path, console)?;
            let aggregate = aggregate_stage(&input, &output, &cfg, &mut log)
                .inspect_err(|err| log_fatal(&mut log, err))?;
            crate::ui::print_aggregate_summary(&aggregate, &ui_cfg);
            if cli.json {
                write_json(&RunOutput {
                    precheck: None,
                    aggregate: Some(&aggregate),
                })?;
            }
        }
        Commands::Config(args) => {
            if args.show {
                if cli.json {
                    write_json(&cfg)?;
                } else {
                    println!("{}", toml::to_string_pretty(&cfg)?);
                }
            } else if !cli.quiet {
                eprintln!("config: use `migcheck config --show`");
            }
        }
        Commands::Completion(args) => {
            let shell = parse_shell(&args.shell)?;
            let mut cmd = Cli::command();
            let mut out = std::io::stdout().lock();
            clap_complete::generate(shell, &mut cmd, "migcheck", &mut out);
        }
    }

    Ok(())
}

fn precheck_stage(cfg: &EffectiveConfig, show_progress: bool, log: &mut RunLog) -> Result<RunSummary> {
    let sites = crate::sites::read_site_list(&cfg.source_list_path, &cfg.site_url_column)?;
    log.info(format!(
        "loaded {} site(s) from {}",
        sites.len(),
        cfg.source_list_path.display()
    ));

    let mut engine = PowerShellEngine::new(PowerShellOptions {
        program: cfg.engine.program.clone(),
        module: cfg.engine.module.clone(),
        timeout: Duration::from_secs(cfg.engine.timeout_secs),
        staging_dir: std::env::temp_dir().join(format!("migcheck-staging-{}", std::process::id())),
    });
    let credential = Credential {
        username: cfg.username.clone(),
        password: cfg.password.clone(),
    };

    crate::runner::run_prechecks(
        &mut engine,
        &RunRequest {
            destination_url: cfg.destination_url.trim(),
            credential: &credential,
            sites: &sites,
            report_dir: &cfg.report_path,
        },
        &RunnerOptions {
            show_progress,
            ..RunnerOptions::default()
        },
        log,
    )
}

fn aggregate_stage(
    input: &std::path::Path,
    output: &std::path::Path,
    cfg: &EffectiveConfig,
    log: &mut RunLog,
) -> Result<AggregateSummary> {
    crate::aggregate::aggregate_reports(
        &AggregateRequest {
            input_dir: input,
            output_file: output,
            include: &cfg.aggregate.include,
        },
        log,
    )
}

/// Fatal errors go to the log file too before they reach `main`.
fn log_fatal(log: &mut RunLog, err: &anyhow::Error) {
    log.error(format!("fatal: {err:#}"));
}

fn write_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    use std::io::Write;

    let buf = serde_json::to_vec_pretty(value)?;

    let mut stdout = std::io::stdout().lock();
    match stdout.write_all(&buf) {
        Ok(()) => {}
        Err(err) if err.kind() == std::io::ErrorKind::BrokenPipe => return Ok(()),
        Err(err) => return Err(err.into()),
    }
    match stdout.write_all(b"\n") {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::BrokenPipe => Ok(()),
        Err(err) => Err(err.into()),
    }
}

fn parse_shell(s: &str) -> Result<clap_complete::Shell> {
    let s = s.trim().to_ascii_lowercase();
    match s.as_str() {
        "bash" => Ok(clap_complete::Shell::Bash),
        "zsh" => Ok(clap_complete::Shell::Zsh),
        "fish" => Ok(clap_complete::Shell::Fish),
        "powershell" | "pwsh" => Ok(clap_complete::Shell::PowerShell),
        other => Err(crate::exit::invalid_args(format!(
            "unsupported shell: {other} (use bash|zsh|fish|powershell)"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn aggregate_accepts_input_and_output_overrides() {
        let cli = Cli::try_parse_from([
            "migcheck",
            "--quiet",
            "aggregate",
            "--input",
            "in",
            "--output",
            "out.xlsx",
        ])
        .expect("parse");
        assert!(cli.quiet);
        match cli.command {
            Commands::Aggregate(args) => {
                assert_eq!(args.input, Some(PathBuf::from("in")));
                assert_eq!(args.output, Some(PathBuf::from("out.xlsx")));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn parse_shell_rejects_unknown_shells() {
        assert!(parse_shell("Bash").is_ok());
        let err = parse_shell("tcsh").unwrap_err();
        assert_eq!(crate::exit::exit_code(&err), 2);
    }
}
