use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::Path;

use anyhow::{Context, Result};
use indicatif::ProgressBar;
use time::OffsetDateTime;
use time::macros::format_description;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Warning,
    Error,
    Success,
}

impl Level {
    pub const fn as_str(self) -> &'static str {
        match self {
            Level::Info => "INFO",
            Level::Warning => "WARNING",
            Level::Error => "ERROR",
            Level::Success => "SUCCESS",
        }
    }

    const fn ansi_code(self) -> &'static str {
        match self {
            Level::Info => "36",
            Level::Warning => "33",
            Level::Error => "31",
            Level::Success => "32",
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleOptions {
    pub enabled: bool,
    pub color: bool,
}

/// Local wall-clock time, falling back to UTC when the offset is unknown.
pub fn now() -> OffsetDateTime {
    OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc())
}

/// Append-only line log mirrored to stderr.
pub struct RunLog {
    file: Option<Box<dyn Write>>,
    file_error: Option<String>,
    console: ConsoleOptions,
    progress: Option<ProgressBar>,
    captured: Option<Vec<(Level, String)>>,
}

impl RunLog {
    pub fn open(path: &Path, console: ConsoleOptions) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create log directory: {}", parent.display())
            })?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("failed to open log file: {}", path.display()))?;
        Ok(Self::with_writer(Box::new(file), console))
    }

    pub fn with_writer(writer: Box<dyn Write>, console: ConsoleOptions) -> Self {
        Self {
            file: Some(writer),
            file_error: None,
            console,
            progress: None,
            captured: None,
        }
    }

    /// Keeps entries in memory only.
    pub fn memory() -> Self {
        Self {
            file: None,
            file_error: None,
            console: ConsoleOptions::default(),
            progress: None,
            captured: Some(Vec::new()),
        }
    }

    /// First failure to write the log file, if any. Later lines are still
    /// attempted.
    pub fn file_error(&self) -> Option<&str> {
        self.file_error.as_deref()
    }

    pub fn entries(&self) -> &[(Level, String)] {
        self.captured.as_deref().unwrap_or(&[])
    }

    /// Console lines are routed through `pb` while it is set so they do not
    /// tear the spinner.
    pub fn set_progress(&mut self, pb: Option<ProgressBar>) {
        self.progress = pb;
    }

    pub fn info(&mut self, message: impl AsRef<str>) {
        self.write(Level::Info, message.as_ref());
    }

    pub fn warning(&mut self, message: impl AsRef<str>) {
        self.write(Level::Warning, message.as_ref());
    }

    pub fn error(&mut self, message: impl AsRef<str>) {
        self.write(Level::Error, message.as_ref());
    }

    pub fn success(&mut self, message: impl AsRef<str>) {
        self.write(Level::Success, message.as_ref());
    }

    fn write(&mut self, level: Level, message: &str) {
        let ts = now()
            .format(format_description!(
                "[year]-[month]-[day] [hour]:[minute]:[second]"
            ))
            .unwrap_or_else(|_| "unknown".to_string());
        let line = format_line(&ts, level, message);

        if let Some(file) = self.file.as_mut() {
            if let Err(err) = writeln!(file, "{line}").and_then(|()| file.flush()) {
                if self.file_error.is_none() {
                    let _ = writeln!(
                        io::stderr().lock(),
                        "warning: failed to write log file: {err}"
                    );
                    self.file_error = Some(err.to_string());
                }
            }
        }

        if self.console.enabled {
            let shown = if self.console.color {
                format!(
                    "{ts} \x1b[{code}m[{label}]\x1b[0m {message}",
                    code = level.ansi_code(),
                    label = level.as_str()
                )
            } else {
                line.clone()
            };
            match &self.progress {
                Some(pb) => pb.println(shown),
                None => {
                    let _ = writeln!(io::stderr().lock(), "{shown}");
                }
            }
        }

        if let Some(captured) = self.captured.as_mut() {
            captured.push((level, message.to_string()));
        }
    }
}

fn format_line(ts: &str, level: Level, message: &str) -> String {
    // Multi-line engine output stays on one log line.
    let message = message.replace(['\r', '\n'], " ");
    format!("{ts} [{}] {message}", level.as_str())
}
