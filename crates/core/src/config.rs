use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::env::{process_env, EnvMap};

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_opt(env: &EnvMap, key: &str) -> Option<String> {
    env.get(key).cloned().filter(|s| !s.is_empty())
}

fn env_or(env: &EnvMap, key: &str, default: &str) -> String {
    env_opt(env, key).unwrap_or_else(|| default.to_string())
}

fn env_parse<T: std::str::FromStr>(env: &EnvMap, key: &str, default: T) -> T {
    env_opt(env, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub llm: LlmConfig,
    pub engine: EngineConfig,
    pub paths: PathsConfig,
}

impl Config {
    /// Build config from the process environment (call `load_dotenv()` first).
    pub fn from_env() -> Self {
        Self::from_env_map(&process_env())
    }

    /// Build config from an explicit variable map.
    pub fn from_env_map(env: &EnvMap) -> Self {
        Self {
            llm: LlmConfig::from_env_map(env),
            engine: EngineConfig::from_env_map(env),
            paths: PathsConfig::from_env_map(env),
        }
    }

    /// Print a redacted summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded:");
        tracing::info!(
            "  llm:     provider={}, model={}, key={}",
            self.llm.provider,
            self.llm.model(),
            if self.llm.is_configured() { "set" } else { "missing" }
        );
        tracing::info!(
            "  engine:  max_rounds={}, command_timeout={}s, fetch_timeout={}s",
            self.engine.max_rounds,
            self.engine.command_timeout_secs,
            self.engine.fetch_timeout_secs
        );
        tracing::info!(
            "  paths:   config={}, data={}",
            self.paths.config_dir.display(),
            self.paths.data_dir.display()
        );
    }
}

// ── LLM providers ─────────────────────────────────────────────

/// Which backend family the provider factory builds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProviderKind {
    /// Structured-block streaming protocol (Anthropic Messages API).
    Anthropic,
    /// OpenAI-style chat/function-calling protocol on a local or self-hosted endpoint.
    OpenAiCompat,
}

impl ProviderKind {
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "anthropic" | "claude" => Some(Self::Anthropic),
            "ollama" | "openai" | "openai-compat" | "openai_compat" => Some(Self::OpenAiCompat),
            _ => None,
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Anthropic => f.write_str("anthropic"),
            Self::OpenAiCompat => f.write_str("openai-compat"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// "anthropic", "ollama" / "openai-compat"; unknown names are rejected by the factory.
    pub provider: String,
    pub anthropic_api_key: Option<String>,
    pub anthropic_model: String,
    pub anthropic_base_url: String,
    /// Base URL of the OpenAI-compatible endpoint, including the `/v1` suffix.
    pub openai_base_url: String,
    pub openai_model: String,
    pub openai_api_key: Option<String>,
    /// Model used for the second routing pass; falls back to the main model.
    pub router_model: Option<String>,
    pub max_tokens: u32,
}

impl LlmConfig {
    fn from_env_map(env: &EnvMap) -> Self {
        Self {
            provider: env_or(env, "TELOS_PROVIDER", "anthropic"),
            anthropic_api_key: env_opt(env, "ANTHROPIC_API_KEY"),
            anthropic_model: env_or(env, "ANTHROPIC_MODEL", "claude-sonnet-4-6"),
            anthropic_base_url: env_or(env, "ANTHROPIC_BASE_URL", "https://api.anthropic.com"),
            openai_base_url: env_or(env, "OLLAMA_URL", "http://localhost:11434/v1"),
            openai_model: env_or(env, "OLLAMA_MODEL", "llama3.1"),
            openai_api_key: env_opt(env, "OPENAI_API_KEY"),
            router_model: env_opt(env, "TELOS_ROUTER_MODEL"),
            max_tokens: env_parse(env, "TELOS_MAX_TOKENS", 16384),
        }
    }

    pub fn kind(&self) -> Option<ProviderKind> {
        ProviderKind::parse(&self.provider)
    }

    /// Model name of the selected provider.
    pub fn model(&self) -> &str {
        match self.kind() {
            Some(ProviderKind::OpenAiCompat) => &self.openai_model,
            _ => &self.anthropic_model,
        }
    }

    pub fn is_configured(&self) -> bool {
        match self.kind() {
            Some(ProviderKind::Anthropic) => self.anthropic_api_key.is_some(),
            Some(ProviderKind::OpenAiCompat) => true,
            None => false,
        }
    }
}

// ── Execution engine ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub max_rounds: usize,
    pub command_timeout_secs: u64,
    pub fetch_timeout_secs: u64,
}

impl EngineConfig {
    pub const DEFAULT_MAX_ROUNDS: usize = 20;

    fn from_env_map(env: &EnvMap) -> Self {
        Self {
            max_rounds: env_parse(env, "TELOS_MAX_ROUNDS", Self::DEFAULT_MAX_ROUNDS),
            command_timeout_secs: env_parse(env, "TELOS_COMMAND_TIMEOUT_SECS", 60),
            fetch_timeout_secs: env_parse(env, "TELOS_FETCH_TIMEOUT_SECS", 30),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::from_env_map(&EnvMap::new())
    }
}

// ── Paths ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Holds `agents.toml` and `.env`.
    pub config_dir: PathBuf,
    /// Holds installed agent packs and `logs/`.
    pub data_dir: PathBuf,
}

impl PathsConfig {
    fn from_env_map(env: &EnvMap) -> Self {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        Self {
            config_dir: env_opt(env, "TELOS_CONFIG_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| home.join(".config/telos")),
            data_dir: env_opt(env, "TELOS_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| home.join(".local/share/telos")),
        }
    }

    pub fn agents_file(&self) -> PathBuf {
        self.config_dir.join("agents.toml")
    }

    pub fn env_file(&self) -> PathBuf {
        self.config_dir.join(".env")
    }

    pub fn log_dir(&self) -> PathBuf {
        self.data_dir.join("logs")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, &str)]) -> EnvMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_env_map(&EnvMap::new());
        assert_eq!(config.llm.provider, "anthropic");
        assert_eq!(config.llm.model(), "claude-sonnet-4-6");
        assert_eq!(config.llm.max_tokens, 16384);
        assert!(!config.llm.is_configured());
        assert_eq!(config.engine.max_rounds, 20);
        assert_eq!(config.engine.command_timeout_secs, 60);
    }

    #[test]
    fn test_ollama_selection() {
        let config = Config::from_env_map(&env(&[
            ("TELOS_PROVIDER", "ollama"),
            ("OLLAMA_MODEL", "qwen2.5"),
        ]));
        assert_eq!(config.llm.kind(), Some(ProviderKind::OpenAiCompat));
        assert_eq!(config.llm.model(), "qwen2.5");
        assert!(config.llm.is_configured());
    }

    #[test]
    fn test_unknown_provider_not_configured() {
        let config = Config::from_env_map(&env(&[("TELOS_PROVIDER", "mystery")]));
        assert_eq!(config.llm.kind(), None);
        assert!(!config.llm.is_configured());
    }

    #[test]
    fn test_invalid_number_falls_back() {
        let config = Config::from_env_map(&env(&[("TELOS_MAX_ROUNDS", "lots")]));
        assert_eq!(config.engine.max_rounds, EngineConfig::DEFAULT_MAX_ROUNDS);
    }

    #[test]
    fn test_path_overrides() {
        let config = Config::from_env_map(&env(&[
            ("TELOS_CONFIG_DIR", "/etc/telos"),
            ("TELOS_DATA_DIR", "/var/telos"),
        ]));
        assert_eq!(config.paths.agents_file(), PathBuf::from("/etc/telos/agents.toml"));
        assert_eq!(config.paths.log_dir(), PathBuf::from("/var/telos/logs"));
    }
}
