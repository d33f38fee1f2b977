//! Agent activation: wire built-ins and remote tools into one registry, run
//! the skill, tear the remote sessions down.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use telos_core::config::EngineConfig;
use telos_core::{AgentContext, EnvMap, Skill};
use telos_mcp::{McpBridge, McpError};
use telos_tool_runtime::{
    CompletionProvider, ExecutionEngine, ExecutionFailure, ExecutionOutcome, RegistryError,
    TextSink, ToolContext, ToolRegistry,
};

use crate::trace_log::TraceLog;

/// A problem with the agent's setup, detected before the first provider call.
#[derive(Debug, thiserror::Error)]
pub enum ConfigurationError {
    #[error(transparent)]
    DuplicateTool(#[from] RegistryError),
    #[error("missing credential: {0}")]
    MissingCredential(McpError),
    #[error("MCP connect failed: {0}")]
    McpConnect(McpError),
}

impl From<McpError> for ConfigurationError {
    fn from(err: McpError) -> Self {
        if err.is_credential() {
            Self::MissingCredential(err)
        } else {
            Self::McpConnect(err)
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ActivationError {
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigurationError),
    #[error(transparent)]
    Execution(Box<ExecutionFailure>),
}

/// Runs skills for one agent against one provider.
pub struct SkillRunner {
    provider: Arc<dyn CompletionProvider>,
    engine: EngineConfig,
    max_tokens: u32,
    env: EnvMap,
    mcp_timeout: Duration,
    text_sink: Option<TextSink>,
    trace_log: Option<TraceLog>,
}

impl SkillRunner {
    pub fn new(provider: Arc<dyn CompletionProvider>, engine: EngineConfig) -> Self {
        Self {
            provider,
            engine,
            max_tokens: ExecutionEngine::DEFAULT_MAX_TOKENS,
            env: EnvMap::new(),
            mcp_timeout: telos_mcp::DEFAULT_REQUEST_TIMEOUT,
            text_sink: None,
            trace_log: None,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Variables for `${VAR}` placeholders in MCP headers.
    pub fn with_env(mut self, env: EnvMap) -> Self {
        self.env = env;
        self
    }

    pub fn with_mcp_timeout(mut self, timeout: Duration) -> Self {
        self.mcp_timeout = timeout;
        self
    }

    pub fn with_text_sink(mut self, sink: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.text_sink = Some(Arc::new(sink));
        self
    }

    pub fn with_trace_log(mut self, log: TraceLog) -> Self {
        self.trace_log = Some(log);
        self
    }

    /// Connect the agent's MCP servers, then run `skill`.
    pub async fn run(
        &self,
        skill: &Skill,
        request: Option<&str>,
        agent: &AgentContext,
    ) -> Result<ExecutionOutcome, ActivationError> {
        let bridge =
            McpBridge::connect_with_timeout(&agent.mcp_servers, &self.env, self.mcp_timeout)
                .await
                .map_err(ConfigurationError::from)?;
        self.run_with_bridge(skill, request, agent, bridge).await
    }

    /// Run `skill` with an already connected bridge. The bridge is closed on
    /// every exit path.
    pub async fn run_with_bridge(
        &self,
        skill: &Skill,
        request: Option<&str>,
        agent: &AgentContext,
        bridge: McpBridge,
    ) -> Result<ExecutionOutcome, ActivationError> {
        let context = ToolContext::from_agent(agent)
            .with_command_timeout(Duration::from_secs(self.engine.command_timeout_secs))
            .with_fetch_timeout(Duration::from_secs(self.engine.fetch_timeout_secs));

        let registry = match build_registry(&bridge, &context) {
            Ok(registry) => registry,
            Err(e) => {
                warn!(error = %e, "tool name collision");
                bridge.close().await;
                return Err(ConfigurationError::DuplicateTool(e).into());
            }
        };
        info!(
            skill = %skill.id,
            tools = registry.len(),
            remote = registry.has_remote_tools(),
            "activating skill"
        );

        let mut engine = ExecutionEngine::new(Arc::clone(&self.provider), Arc::new(registry))
            .with_max_rounds(self.engine.max_rounds)
            .with_max_tokens(self.max_tokens);
        if let Some(sink) = &self.text_sink {
            let sink = Arc::clone(sink);
            engine = engine.with_text_sink(move |delta| sink(delta));
        }

        let result = engine.execute(skill, request, &context).await;
        bridge.close().await;

        let trace = match &result {
            Ok(outcome) => &outcome.trace,
            Err(failure) => &failure.trace,
        };
        if let Some(log) = &self.trace_log {
            if let Err(e) = log.record(trace) {
                warn!(error = %e, "failed to persist trace");
            }
        }

        result.map_err(|failure| ActivationError::Execution(Box::new(failure)))
    }
}

/// Built-ins first, then remote tools in server order.
fn build_registry(bridge: &McpBridge, context: &ToolContext) -> Result<ToolRegistry, RegistryError> {
    let mut registry = ToolRegistry::for_context(context);
    for tool in bridge.tools() {
        registry.register_arc(tool)?;
    }
    Ok(registry)
}
