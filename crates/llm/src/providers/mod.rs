pub mod anthropic;
pub mod openai_compat;
pub(crate) mod sse;

use std::sync::Arc;

use telos_core::config::{LlmConfig, ProviderKind};
use telos_tool_runtime::{CompletionProvider, LlmError};

pub use anthropic::AnthropicProvider;
pub use openai_compat::OpenAiCompatProvider;

/// Create the configured completion provider.
pub fn create_provider(llm_config: &LlmConfig) -> Result<Arc<dyn CompletionProvider>, LlmError> {
    create_provider_for_model(llm_config, llm_config.model())
}

/// Create the provider used for the second routing pass, which may run a
/// smaller model than execution.
pub fn create_router_provider(
    llm_config: &LlmConfig,
) -> Result<Arc<dyn CompletionProvider>, LlmError> {
    let model = llm_config
        .router_model
        .as_deref()
        .unwrap_or_else(|| llm_config.model());
    create_provider_for_model(llm_config, model)
}

fn create_provider_for_model(
    llm_config: &LlmConfig,
    model: &str,
) -> Result<Arc<dyn CompletionProvider>, LlmError> {
    match llm_config.kind() {
        Some(ProviderKind::Anthropic) => {
            let api_key = llm_config
                .anthropic_api_key
                .as_ref()
                .ok_or_else(|| LlmError::NotConfigured("ANTHROPIC_API_KEY not set".into()))?;
            Ok(Arc::new(AnthropicProvider::new(
                api_key.clone(),
                model.to_string(),
                llm_config.anthropic_base_url.clone(),
            )))
        }
        Some(ProviderKind::OpenAiCompat) => Ok(Arc::new(OpenAiCompatProvider::new(
            llm_config.openai_base_url.clone(),
            model.to_string(),
            llm_config.openai_api_key.clone(),
        ))),
        None => Err(LlmError::NotConfigured(format!(
            "unknown LLM provider: '{}'",
            llm_config.provider
        ))),
    }
}
