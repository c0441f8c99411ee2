//! Aggregated runtime configuration for the `autopilot` binary. Separate from
//! `cdp_adapter::config::CdpConfig`, which resolves its own `AUTOPILOT_*`
//! overrides independently — this struct covers the orchestrator/session/
//! planner knobs that sit above the browser transport.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct AutopilotConfig {
    pub max_recovery_attempts: u32,
    pub max_automation_steps: u64,
    pub max_recording_actions: usize,
    pub context_target_tokens: usize,
    pub recent_turns_to_keep: usize,
    pub planner_model: String,
    pub planner_max_tokens: u32,
    pub planner_request_timeout_secs: u64,
    pub data_dir: PathBuf,
    pub log_level: String,
    pub log_json: bool,
    /// Directory for rolling daily log files. `None` keeps logging on stdout only.
    pub log_dir: Option<PathBuf>,
}

impl Default for AutopilotConfig {
    fn default() -> Self {
        Self {
            max_recovery_attempts: 10,
            max_automation_steps: 50,
            max_recording_actions: 500,
            context_target_tokens: 140_000,
            recent_turns_to_keep: 10,
            planner_model: "claude-sonnet-4-5".to_string(),
            planner_max_tokens: 4096,
            planner_request_timeout_secs: 60,
            data_dir: default_data_dir(),
            log_level: "info".to_string(),
            log_json: false,
            log_dir: None,
        }
    }
}

impl AutopilotConfig {
    pub fn orchestrator_config(&self) -> automation_orchestrator::OrchestratorConfig {
        automation_orchestrator::OrchestratorConfig {
            max_recovery_attempts: self.max_recovery_attempts,
            max_automation_steps: self.max_automation_steps,
            planner_max_tokens: self.planner_max_tokens,
            layer_b: context_compression::LayerBConfig {
                context_target_tokens: self.context_target_tokens,
                recent_turns_to_keep: self.recent_turns_to_keep,
            },
        }
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join("autopilot"))
        .unwrap_or_else(|| PathBuf::from(".autopilot"))
}

pub struct LoadedConfig {
    pub config: AutopilotConfig,
    pub path: Option<PathBuf>,
}

/// Resolves, in order: an explicit `--config` path, `./config/autopilot.toml`,
/// then `$XDG_CONFIG_HOME/autopilot/config.toml`. Missing files fall back to
/// defaults rather than erroring, since a first run has no config yet.
/// Environment variables prefixed `AUTOPILOT_CONFIG_` (double-underscore
/// separated, e.g. `AUTOPILOT_CONFIG_MAX_AUTOMATION_STEPS`) override whatever
/// the file provides.
pub fn load_config(config_path: Option<&Path>) -> Result<LoadedConfig> {
    let resolved = match config_path {
        Some(path) => Some(path.to_path_buf()),
        None => {
            let local = PathBuf::from("config/autopilot.toml");
            if local.exists() {
                Some(local)
            } else {
                dirs::config_dir().map(|dir| dir.join("autopilot").join("config.toml"))
            }
        }
    };

    let mut builder = config::Config::builder();
    if let Some(path) = resolved.as_ref().filter(|p| p.exists()) {
        builder = builder.add_source(config::File::from(path.as_path()));
    }
    builder = builder.add_source(
        config::Environment::with_prefix("AUTOPILOT_CONFIG")
            .separator("__")
            .try_parsing(true),
    );

    let defaults = AutopilotConfig::default();
    let merged = builder.build().context("failed to assemble configuration sources")?;
    let config: AutopilotConfig = merged
        .try_deserialize()
        .unwrap_or(defaults);

    Ok(LoadedConfig { config, path: resolved })
}
