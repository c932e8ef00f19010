#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::sync::atomic::{AtomicU64, Ordering};

const ENV_KEYS: &[&str] = &[
    "MIGCHECK_CONFIG",
    "MIGCHECK_SOURCE_LIST_PATH",
    "MIGCHECK_SITE_URL_COLUMN",
    "MIGCHECK_DESTINATION_URL",
    "MIGCHECK_REPORT_PATH",
    "MIGCHECK_USERNAME",
    "MIGCHECK_PASSWORD",
    "MIGCHECK_CONSOLIDATED_OUTPUT_FILE",
    "MIGCHECK_LOG_PATH",
    "MIGCHECK_ENGINE_PROGRAM",
    "MIGCHECK_ENGINE_MODULE",
    "MIGCHECK_ENGINE_TIMEOUT_SECS",
    "MIGCHECK_AGGREGATE_INCLUDE",
];

pub fn migcheck_cmd(workdir: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_migcheck"));
    cmd.current_dir(workdir);
    for key in ENV_KEYS {
        cmd.env_remove(key);
    }
    cmd
}

pub fn run(workdir: &Path, args: &[&str]) -> Output {
    migcheck_cmd(workdir).args(args).output().expect("run migcheck")
}

pub fn make_temp_dir(tag: &str) -> PathBuf {
    static SEQ: AtomicU64 = AtomicU64::new(0);

    let seq = SEQ.fetch_add(1, Ordering::Relaxed);
    let dir = std::env::temp_dir().join(format!(
        "migcheck-{tag}-test-{}-{seq}",
        std::process::id()
    ));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).expect("create temp dir");
    dir
}

pub fn write_file(path: &Path, bytes: &[u8]) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("mkdirs");
    }
    std::fs::write(path, bytes).expect("write");
}

/// Writes an executable stand-in for `pwsh` and returns its path.
#[cfg(unix)]
pub fn write_fake_pwsh(dir: &Path, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join("bin/pwsh");
    write_file(&path, format!("#!/bin/sh\n{body}").as_bytes());
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).expect("chmod");
    path
}

/// Minimal config pointing every path inside `dir`.
pub fn write_config(dir: &Path, program: &Path) -> PathBuf {
    let path = dir.join("migcheck.toml");
    let body = format!(
        r#"
sourceListPath = "sites.csv"
destinationUrl = "https://contoso.sharepoint.com/sites/target"
reportPath = "reports"
username = "admin@contoso.com"
password = "not-a-real-secret"
consolidatedOutputFile = "out/Consolidated.xlsx"
logPath = "logs/migcheck.log"

[engine]
program = "{}"
timeoutSecs = 20
"#,
        program.display()
    );
    write_file(&path, body.as_bytes());
    path
}

pub fn files_in(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .map(|rd| {
            rd.filter_map(|e| e.ok())
                .map(|e| e.file_name().to_string_lossy().to_string())
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names
}
