use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

pub const DEFAULT_CONFIG_FILE: &str = "migcheck.toml";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectiveConfig {
    pub source_list_path: PathBuf,
    pub site_url_column: String,
    pub destination_url: String,
    pub report_path: PathBuf,
    pub username: String,
    #[serde(serialize_with = "mask_secret")]
    pub password: String,
    pub consolidated_output_file: PathBuf,
    pub log_path: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_path: Option<String>,
    pub engine: EngineConfig,
    pub aggregate: AggregateConfig,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
    pub program: String,
    pub module: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct AggregateConfig {
    pub include: Vec<String>,
}

impl Default for EffectiveConfig {
    fn default() -> Self {
        Self {
            source_list_path: PathBuf::from("sites.csv"),
            site_url_column: "SiteUrl".to_string(),
            destination_url: String::new(),
            report_path: PathBuf::from("reports"),
            username: String::new(),
            password: String::new(),
            consolidated_output_file: PathBuf::from("reports/consolidated/ConsolidatedPreCheck.xlsx"),
            log_path: PathBuf::from("migcheck.log"),
            config_path: None,
            engine: EngineConfig {
                program: "pwsh".to_string(),
                module: "ShareGate".to_string(),
                timeout_secs: 1800,
            },
            aggregate: AggregateConfig {
                include: vec!["*.xlsx".to_string(), "*.xls".to_string()],
            },
        }
    }
}

impl EffectiveConfig {
    /// Checks the values the pre-check stage cannot run without.
    pub fn require_check_settings(&self) -> Result<()> {
        if self.destination_url.trim().is_empty() {
            return Err(crate::exit::invalid_args(
                "destinationUrl is not set (config file or MIGCHECK_DESTINATION_URL)",
            ));
        }
        if self.username.trim().is_empty() {
            return Err(crate::exit::invalid_args(
                "username is not set (config file or MIGCHECK_USERNAME)",
            ));
        }
        Ok(())
    }
}

fn mask_secret<S: serde::Serializer>(value: &str, s: S) -> std::result::Result<S::Ok, S::Error> {
    if value.is_empty() {
        s.serialize_str("")
    } else {
        s.serialize_str("********")
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct RawConfig {
    source_list_path: Option<PathBuf>,
    site_url_column: Option<String>,
    destination_url: Option<String>,
    report_path: Option<PathBuf>,
    username: Option<String>,
    password: Option<String>,
    consolidated_output_file: Option<PathBuf>,
    log_path: Option<PathBuf>,
    engine: Option<RawEngineConfig>,
    aggregate: Option<RawAggregateConfig>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct RawEngineConfig {
    program: Option<String>,
    module: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawAggregateConfig {
    include: Option<Vec<String>>,
}

pub fn default_config_path(cwd: &Path) -> PathBuf {
    cwd.join(DEFAULT_CONFIG_FILE)
}

/// Defaults, then the TOML file (when present), then `MIGCHECK_*` variables.
///
/// An explicitly named file that does not exist is an error; the default
/// location is optional.
pub fn load(config_path: Option<&Path>, cwd: &Path) -> Result<EffectiveConfig> {
    let mut cfg = EffectiveConfig::default();

    let path = match config_path {
        Some(p) => {
            if !p.exists() {
                anyhow::bail!("config file not found: {}", p.display());
            }
            p.to_owned()
        }
        None => default_config_path(cwd),
    };

    if path.exists() {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let raw: RawConfig = toml::from_str(&s)
            .with_context(|| format!("failed to parse config file (TOML): {}", path.display()))?;
        apply_raw_config(&mut cfg, raw);
        cfg.config_path = Some(path.display().to_string());
    }

    apply_env_overrides(&mut cfg)?;

    Ok(cfg)
}

fn apply_raw_config(cfg: &mut EffectiveConfig, raw: RawConfig) {
    if let Some(v) = raw.source_list_path {
        cfg.source_list_path = v;
    }
    if let Some(v) = raw.site_url_column {
        cfg.site_url_column = v;
    }
    if let Some(v) = raw.destination_url {
        cfg.destination_url = v;
    }
    if let Some(v) = raw.report_path {
        cfg.report_path = v;
    }
    if let Some(v) = raw.username {
        cfg.username = v;
    }
    if let Some(v) = raw.password {
        cfg.password = v;
    }
    if let Some(v) = raw.consolidated_output_file {
        cfg.consolidated_output_file = v;
    }
    if let Some(v) = raw.log_path {
        cfg.log_path = v;
    }

    if let Some(engine) = raw.engine {
        if let Some(program) = engine.program {
            cfg.engine.program = program;
        }
        if let Some(module) = engine.module {
            cfg.engine.module = module;
        }
        if let Some(timeout_secs) = engine.timeout_secs {
            cfg.engine.timeout_secs = timeout_secs;
        }
    }

    if let Some(aggregate) = raw.aggregate {
        if let Some(include) = aggregate.include {
            cfg.aggregate.include = include;
        }
    }
}

fn apply_env_overrides(cfg: &mut EffectiveConfig) -> Result<()> {
    if let Some(v) = env_non_empty("MIGCHECK_SOURCE_LIST_PATH") {
        cfg.source_list_path = PathBuf::from(v);
    }
    if let Some(v) = env_non_empty("MIGCHECK_SITE_URL_COLUMN") {
        cfg.site_url_column = v;
    }
    if let Some(v) = env_non_empty("MIGCHECK_DESTINATION_URL") {
        cfg.destination_url = v;
    }
    if let Some(v) = env_non_empty("MIGCHECK_REPORT_PATH") {
        cfg.report_path = PathBuf::from(v);
    }
    if let Some(v) = env_non_empty("MIGCHECK_USERNAME") {
        cfg.username = v;
    }
    if let Ok(v) = std::env::var("MIGCHECK_PASSWORD") {
        cfg.password = v;
    }
    if let Some(v) = env_non_empty("MIGCHECK_CONSOLIDATED_OUTPUT_FILE") {
        cfg.consolidated_output_file = PathBuf::from(v);
    }
    if let Some(v) = env_non_empty("MIGCHECK_LOG_PATH") {
        cfg.log_path = PathBuf::from(v);
    }
    if let Some(v) = env_non_empty("MIGCHECK_ENGINE_PROGRAM") {
        cfg.engine.program = v;
    }
    if let Some(v) = env_non_empty("MIGCHECK_ENGINE_MODULE") {
        cfg.engine.module = v;
    }
    if let Some(v) = env_non_empty("MIGCHECK_ENGINE_TIMEOUT_SECS") {
        cfg.engine.timeout_secs = v
            .parse::<u64>()
            .with_context(|| "MIGCHECK_ENGINE_TIMEOUT_SECS")?;
    }
    if let Ok(v) = std::env::var("MIGCHECK_AGGREGATE_INCLUDE") {
        let parts: Vec<String> = v
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string())
            .collect();
        if !parts.is_empty() {
            cfg.aggregate.include = parts;
        }
    }

    Ok(())
}

fn env_non_empty(key: &str) -> Option<String> {
    let v = std::env::var(key).ok()?;
    let v = v.trim();
    if v.is_empty() {
        None
    } else {
        Some(v.to_string())
    }
}
