//! Agent registry loaded from `agents.toml`, plus per-agent `mcp.json`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use telos_core::{AgentContext, McpServerConfig};

pub const MCP_CONFIG_FILE: &str = "mcp.json";

/// How an agent's skills reach disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentMode {
    /// Skills live in a user-managed directory named by `skills_dir`.
    Linked,
    /// Skills were copied into `<data>/agents/<name>/`.
    Installed,
}

impl std::fmt::Display for AgentMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Linked => f.write_str("linked"),
            Self::Installed => f.write_str("installed"),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct AgentsFile {
    #[serde(default)]
    defaults: Defaults,
    #[serde(default)]
    agents: BTreeMap<String, AgentEntry>,
}

#[derive(Debug, Default, Deserialize)]
struct Defaults {
    #[serde(default)]
    default_agent: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AgentEntry {
    mode: AgentMode,
    #[serde(default)]
    description: String,
    skills_dir: Option<PathBuf>,
    working_dir: Option<PathBuf>,
    pack_dir: Option<PathBuf>,
    mcp_config: Option<PathBuf>,
}

/// A fully resolved agent: every path expanded, installed paths derived.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentDefinition {
    pub name: String,
    pub mode: AgentMode,
    pub description: String,
    pub skills_dir: PathBuf,
    /// Root for file tools.
    pub working_dir: PathBuf,
    /// Working directory for shell commands.
    pub pack_dir: Option<PathBuf>,
    pub mcp_config: Option<PathBuf>,
}

impl AgentDefinition {
    fn resolve(name: &str, entry: AgentEntry, data_dir: &Path) -> Result<Self, AgentConfigError> {
        let installed_root = data_dir.join("agents").join(name);

        let skills_dir = match (entry.mode, entry.skills_dir) {
            (_, Some(dir)) => expand_tilde(&dir),
            (AgentMode::Installed, None) => installed_root.join("skills"),
            (AgentMode::Linked, None) => {
                return Err(AgentConfigError::MissingSkillsDir(name.to_string()))
            }
        };

        let mut pack_dir = entry.pack_dir.as_deref().map(expand_tilde);
        let mut mcp_config = entry.mcp_config.as_deref().map(expand_tilde);
        if entry.mode == AgentMode::Installed {
            pack_dir.get_or_insert_with(|| installed_root.clone());
            let derived = installed_root.join(MCP_CONFIG_FILE);
            if mcp_config.is_none() && derived.is_file() {
                mcp_config = Some(derived);
            }
        }

        Ok(Self {
            name: name.to_string(),
            mode: entry.mode,
            description: entry.description,
            skills_dir,
            working_dir: expand_tilde(entry.working_dir.as_deref().unwrap_or(Path::new("."))),
            pack_dir,
            mcp_config,
        })
    }

    /// Execution roots and remote servers for one run of this agent.
    pub fn context(&self) -> Result<AgentContext, AgentConfigError> {
        let servers = match &self.mcp_config {
            Some(path) => load_mcp_servers(path)?,
            None => Vec::new(),
        };
        let mut context = AgentContext::new(&self.working_dir).with_mcp_servers(servers);
        if let Some(pack_dir) = &self.pack_dir {
            context = context.with_pack_dir(pack_dir);
        }
        Ok(context)
    }

    /// Number of `*/SKILL.md` entries under `skills_dir`.
    pub fn skill_count(&self) -> usize {
        std::fs::read_dir(&self.skills_dir)
            .map(|entries| {
                entries
                    .flatten()
                    .filter(|e| e.path().join(crate::skills::SKILL_FILE).is_file())
                    .count()
            })
            .unwrap_or(0)
    }
}

/// Every registered agent and the default selection.
#[derive(Debug, Clone, Default)]
pub struct AgentsConfig {
    pub default_agent: Option<String>,
    pub agents: BTreeMap<String, AgentDefinition>,
}

impl AgentsConfig {
    pub fn load(path: &Path, data_dir: &Path) -> Result<Self, AgentConfigError> {
        if !path.exists() {
            return Err(AgentConfigError::NotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)
            .map_err(|e| AgentConfigError::IoError(path.to_path_buf(), e))?;
        let config = Self::parse(&content, data_dir)?;
        info!(path = %path.display(), agents = config.agents.len(), "loaded agents");
        Ok(config)
    }

    pub fn parse(content: &str, data_dir: &Path) -> Result<Self, AgentConfigError> {
        let file: AgentsFile = toml::from_str(content)?;

        let agents = file
            .agents
            .into_iter()
            .map(|(name, entry)| {
                AgentDefinition::resolve(&name, entry, data_dir).map(|agent| (name, agent))
            })
            .collect::<Result<BTreeMap<_, _>, _>>()?;

        let default_agent = file.defaults.default_agent.filter(|d| !d.is_empty());
        if let Some(default) = &default_agent {
            if !agents.contains_key(default) {
                return Err(AgentConfigError::UnknownDefault {
                    name: default.clone(),
                    available: agents.keys().cloned().collect(),
                });
            }
        }

        Ok(Self {
            default_agent,
            agents,
        })
    }

    /// Pick `requested`, falling back to the configured default.
    pub fn select(&self, requested: Option<&str>) -> Result<&AgentDefinition, AgentConfigError> {
        let name = requested
            .or(self.default_agent.as_deref())
            .ok_or(AgentConfigError::NoAgentSelected)?;
        self.agents
            .get(name)
            .ok_or_else(|| AgentConfigError::UnknownAgent {
                name: name.to_string(),
                available: self.agents.keys().cloned().collect(),
            })
    }
}

#[derive(Debug, Deserialize)]
struct McpFile {
    #[serde(rename = "mcpServers", default)]
    mcp_servers: BTreeMap<String, McpServerConfig>,
}

/// Read `{"mcpServers": {name: {url, type, headers}}}`, in name order.
pub fn load_mcp_servers(path: &Path) -> Result<Vec<McpServerConfig>, AgentConfigError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| AgentConfigError::IoError(path.to_path_buf(), e))?;
    let file: McpFile = serde_json::from_str(&content)
        .map_err(|e| AgentConfigError::McpConfig(path.to_path_buf(), e))?;

    let servers: Vec<_> = file
        .mcp_servers
        .into_iter()
        .map(|(name, mut server)| {
            server.name = name;
            server
        })
        .collect();
    debug!(path = %path.display(), servers = servers.len(), "loaded MCP config");
    Ok(servers)
}

/// Replace a leading `~` with the home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| path.to_path_buf()),
        Err(_) => path.to_path_buf(),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AgentConfigError {
    #[error("no agents.toml found at {0}")]
    NotFound(PathBuf),
    #[error("I/O error reading {0}: {1}")]
    IoError(PathBuf, std::io::Error),
    #[error("invalid agents.toml: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("agent '{0}': linked mode requires an explicit skills_dir")]
    MissingSkillsDir(String),
    #[error("default agent '{name}' not found in agents: {available:?}")]
    UnknownDefault { name: String, available: Vec<String> },
    #[error("agent '{name}' not found. Available: {available:?}")]
    UnknownAgent { name: String, available: Vec<String> },
    #[error("no default agent configured and no agent requested")]
    NoAgentSelected,
    #[error("invalid MCP config {0}: {1}")]
    McpConfig(PathBuf, serde_json::Error),
}
