use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use planner_backend::{ClaudeConfig, ClaudePlannerBackend, MockPlannerBackend, PlannerBackend};
use session_store::SessionStore;
use tool_registry::ToolRegistry;

use crate::config::AutopilotConfig;

/// Shared, process-wide handles built once from the loaded configuration and
/// reused by every subcommand, rather than re-opening the store per command.
pub struct CliContext {
    config: AutopilotConfig,
    config_path: Option<PathBuf>,
    store: Arc<SessionStore>,
    registry: Arc<ToolRegistry>,
}

impl CliContext {
    pub fn new(config: AutopilotConfig, config_path: Option<PathBuf>) -> Self {
        let store = Arc::new(SessionStore::new(config.data_dir.clone()));
        let registry = Arc::new(ToolRegistry::with_builtin_tools());
        Self {
            config,
            config_path,
            store,
            registry,
        }
    }

    pub fn config(&self) -> &AutopilotConfig {
        &self.config
    }

    pub fn config_path(&self) -> Option<&PathBuf> {
        self.config_path.as_ref()
    }

    pub fn store(&self) -> Arc<SessionStore> {
        Arc::clone(&self.store)
    }

    pub fn registry(&self) -> Arc<ToolRegistry> {
        Arc::clone(&self.registry)
    }

    /// Builds the planner backend to drive automation with: a real
    /// Claude-backed planner when `ANTHROPIC_API_KEY` is set, otherwise the
    /// deterministic mock, which keeps `autopilot automate` runnable in CI
    /// and local smoke tests without live network access or a key.
    pub fn planner(&self) -> Result<Arc<dyn PlannerBackend>> {
        match std::env::var("ANTHROPIC_API_KEY") {
            Ok(api_key) if !api_key.is_empty() => {
                let claude_config = ClaudeConfig {
                    api_key,
                    model: self.config.planner_model.clone(),
                    max_tokens: self.config.planner_max_tokens,
                    timeout: std::time::Duration::from_secs(self.config.planner_request_timeout_secs),
                    ..ClaudeConfig::default()
                };
                let backend = ClaudePlannerBackend::new(claude_config)?;
                Ok(Arc::new(backend))
            }
            _ => {
                tracing::warn!("ANTHROPIC_API_KEY not set; falling back to the mock planner backend");
                Ok(Arc::new(MockPlannerBackend::new("final")))
            }
        }
    }
}
