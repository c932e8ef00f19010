use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::Deserialize;

use crate::core::PreCheckResult;
use crate::engine::{CheckOutcome, Credential, Destination, MigrationEngine, SourceSite};
use crate::platform::{CommandOutput, CommandRunOptions, run_command_with_options};

const MAX_STDERR_BYTES: usize = 2 * 1024;

const PROBE_SCRIPT: &str = r#"
$ErrorActionPreference = 'Stop'
if (-not (Get-Module -ListAvailable -Name $env:MIGCHECK_MODULE)) {
    [Console]::Error.WriteLine("PowerShell module not installed: $($env:MIGCHECK_MODULE)")
    exit 3
}
'{"available":true}'
"#;

const SESSION_PRELUDE: &str = r#"
$ErrorActionPreference = 'Stop'
Import-Module $env:MIGCHECK_MODULE | Out-Null
$login = @{ Username = $env:MIGCHECK_USERNAME }
if ($env:MIGCHECK_PASSWORD) {
    $login.Password = ConvertTo-SecureString $env:MIGCHECK_PASSWORD -AsPlainText -Force
}
"#;

const CONNECT_SCRIPT: &str = r#"
$site = Connect-Site -Url $env:MIGCHECK_SITE_URL @login
@{ title = [string]$site.Title } | ConvertTo-Json -Compress
"#;

const CHECK_SCRIPT: &str = r#"
$src = Connect-Site -Url $env:MIGCHECK_SITE_URL @login
$dst = Connect-Site -Url $env:MIGCHECK_DESTINATION_URL @login
$result = Copy-Site -Site $src -DestinationSite $dst -Merge -WhatIf
if (($result.Warnings + $result.Errors) -gt 0) {
    Export-Report $result -Path $env:MIGCHECK_EXPORT_PATH | Out-Null
}
@{
    title = [string]$src.Title
    warnings = [int]$result.Warnings
    errors = [int]$result.Errors
} | ConvertTo-Json -Compress
"#;

#[derive(Debug, Clone)]
pub struct PowerShellOptions {
    pub program: String,
    pub module: String,
    pub timeout: Duration,
    pub staging_dir: PathBuf,
}

/// Drives the vendor PowerShell module through one `pwsh` process per call.
///
/// Sessions do not outlive a process, so `check` reconnects both sites inside
/// its own script; the connect calls act as reachability and credential
/// checks and supply the site titles.
pub struct PowerShellEngine {
    opts: PowerShellOptions,
    seq: u64,
}

/// Report exported by a `check` call into the staging directory. Removed on
/// drop unless it was moved to its final name.
#[derive(Debug)]
pub struct StagedReport {
    path: PathBuf,
}

impl StagedReport {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for StagedReport {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

#[derive(Debug, Deserialize)]
struct ConnectReply {
    title: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CheckReply {
    title: Option<String>,
    warnings: u64,
    errors: u64,
}

impl PowerShellEngine {
    pub fn new(opts: PowerShellOptions) -> Self {
        Self { opts, seq: 0 }
    }

    fn invoke(&self, operation: &str, script: &str, env: Vec<(String, String)>) -> Result<CommandOutput> {
        let mut all_env = vec![
            ("MIGCHECK_OPERATION".to_string(), operation.to_string()),
            ("MIGCHECK_MODULE".to_string(), self.opts.module.clone()),
        ];
        all_env.extend(env);

        let output = run_command_with_options(
            &self.opts.program,
            &["-NoProfile", "-NonInteractive", "-Command", script],
            self.opts.timeout,
            &CommandRunOptions { env: all_env },
        )?;

        if !output.success() {
            let mut msg = format!(
                "{} {operation} exited with code {}",
                self.opts.program, output.exit_code
            );
            let stderr = output.stderr.trim();
            if !stderr.is_empty() {
                msg.push_str(&format!(": {}", truncate_string(stderr, MAX_STDERR_BYTES)));
            }
            return Err(anyhow!(msg));
        }
        Ok(output)
    }

    fn session_env(url: &str, credential: &Credential) -> Vec<(String, String)> {
        vec![
            ("MIGCHECK_SITE_URL".to_string(), url.to_string()),
            ("MIGCHECK_USERNAME".to_string(), credential.username.clone()),
            ("MIGCHECK_PASSWORD".to_string(), credential.password.clone()),
        ]
    }

    fn connect(&self, url: &str, credential: &Credential) -> Result<String> {
        let script = format!("{SESSION_PRELUDE}{CONNECT_SCRIPT}");
        let output = self.invoke("connect", &script, Self::session_env(url, credential))?;
        let reply: ConnectReply = parse_reply(&output)?;
        Ok(reply
            .title
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| url.to_string()))
    }

    fn next_staging_path(&mut self) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.opts.staging_dir).with_context(|| {
            format!(
                "failed to create staging directory: {}",
                self.opts.staging_dir.display()
            )
        })?;
        self.seq += 1;
        Ok(self
            .opts
            .staging_dir
            .join(format!("check-{}-{}.xlsx", std::process::id(), self.seq)))
    }
}

impl MigrationEngine for PowerShellEngine {
    type Detail = StagedReport;

    fn ensure_available(&mut self) -> Result<()> {
        self.invoke("probe", PROBE_SCRIPT, Vec::new())
            .with_context(|| format!("migration module '{}' is not available", self.opts.module))?;
        Ok(())
    }

    fn connect_destination(&mut self, url: &str, credential: &Credential) -> Result<Destination> {
        let title = self.connect(url, credential)?;
        Ok(Destination {
            url: url.to_string(),
            title,
        })
    }

    fn connect_source(&mut self, url: &str, credential: &Credential) -> Result<SourceSite> {
        let title = self.connect(url, credential)?;
        Ok(SourceSite {
            url: url.to_string(),
            title,
        })
    }

    fn check(
        &mut self,
        source: &SourceSite,
        destination: &Destination,
        credential: &Credential,
    ) -> Result<CheckOutcome<StagedReport>> {
        let staged = StagedReport {
            path: self.next_staging_path()?,
        };
        let mut env = Self::session_env(&source.url, credential);
        env.push((
            "MIGCHECK_DESTINATION_URL".to_string(),
            destination.url.clone(),
        ));
        env.push((
            "MIGCHECK_EXPORT_PATH".to_string(),
            staged.path.display().to_string(),
        ));

        let script = format!("{SESSION_PRELUDE}{CHECK_SCRIPT}");
        let output = self.invoke("check", &script, env)?;
        let reply: CheckReply = parse_reply(&output)?;

        Ok(CheckOutcome {
            result: PreCheckResult {
                title: reply
                    .title
                    .filter(|t| !t.trim().is_empty())
                    .unwrap_or_else(|| source.title.clone()),
                warnings: reply.warnings,
                errors: reply.errors,
            },
            detail: staged,
        })
    }

    fn export(&mut self, detail: StagedReport, target: &Path) -> Result<()> {
        if !detail.path.exists() {
            return Err(anyhow!(
                "the check reported issues but no report was exported to {}",
                detail.path.display()
            ));
        }
        if std::fs::rename(&detail.path, target).is_err() {
            // Staging may sit on another filesystem.
            std::fs::copy(&detail.path, target).with_context(|| {
                format!(
                    "failed to copy report {} -> {}",
                    detail.path.display(),
                    target.display()
                )
            })?;
        }
        Ok(())
    }

    fn release(&mut self, destination: Destination) {
        drop(destination);
        let _ = std::fs::remove_dir(&self.opts.staging_dir);
    }
}

fn parse_reply<T: for<'de> Deserialize<'de>>(output: &CommandOutput) -> Result<T> {
    let line = output
        .last_line()
        .ok_or_else(|| anyhow!("engine produced no output"))?;
    serde_json::from_str(line).with_context(|| format!("unexpected engine output: {line}"))
}

fn truncate_string(s: &str, max_bytes: usize) -> String {
    if s.len() <= max_bytes {
        return s.to_string();
    }
    let mut idx = max_bytes;
    while idx > 0 && !s.is_char_boundary(idx) {
        idx = idx.saturating_sub(1);
    }
    let head = &s[..idx];
    format!("{head}...(truncated, total={} bytes)", s.len())
}
