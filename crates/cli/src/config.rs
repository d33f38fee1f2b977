use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::debug;

use telos_agent::AgentsConfig;
use telos_core::config::{load_dotenv, Config};
use telos_core::env::load_env_file;
use telos_core::EnvMap;

/// Fallback registry for running from a project checkout.
const PROJECT_AGENTS_FILE: &str = "config/agents.toml";

/// Everything the binary reads from disk and the environment, built once.
pub struct CliConfig {
    pub config: Config,
    /// Process environment with `<config>/.env` merged on top.
    pub env: EnvMap,
}

impl CliConfig {
    pub fn load() -> Result<Self> {
        load_dotenv();
        let paths = Config::from_env().paths;
        let env_file = paths.env_file();
        let env = load_env_file(&env_file)
            .with_context(|| format!("failed to load {}", env_file.display()))?;
        let config = Config::from_env_map(&env);
        config.log_summary();
        Ok(Self { config, env })
    }

    /// `<config>/agents.toml`, else `./config/agents.toml`.
    pub fn agents_file(&self) -> PathBuf {
        resolve_agents_file(&self.config.paths.agents_file(), Path::new(PROJECT_AGENTS_FILE))
    }

    pub fn load_agents(&self) -> Result<AgentsConfig> {
        let path = self.agents_file();
        debug!(path = %path.display(), "loading agents");
        AgentsConfig::load(&path, &self.config.paths.data_dir)
            .with_context(|| format!("could not load agents from {}", path.display()))
    }
}

fn resolve_agents_file(primary: &Path, project: &Path) -> PathBuf {
    if !primary.exists() && project.exists() {
        return project.to_path_buf();
    }
    primary.to_path_buf()
}
