use std::sync::Arc;

use tracing::{debug, info, warn};

use telos_core::Skill;
use telos_tool_runtime::{CompletionProvider, ConversationMessage};

/// Upper bound on the routing completion. A skill id fits comfortably.
const ROUTER_MAX_TOKENS: u32 = 64;

/// Sentinel the routing model answers with when nothing fits.
const NO_MATCH_SENTINEL: &str = "NONE";

const ROUTER_SYSTEM_PROMPT: &str = "You are a skill router. Given a list of available skills \
and a user request, respond with ONLY the skill name that best matches the request. If no skill \
matches, respond with NONE. Do not include any explanation, punctuation, or preamble. Answer with \
just the skill name or NONE.";

/// Which pass produced a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteSource {
    Keyword,
    Model,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteMatch {
    pub skill: Skill,
    pub source: RouteSource,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RouteError {
    #[error("no skill matches the request")]
    NotFound,
}

/// Maps a free-text request onto one skill of a catalog.
///
/// Pass 1 is a case-insensitive substring match on skill ids where the
/// longest contained id wins. Pass 2 runs only when pass 1 finds nothing and
/// a routing provider is set: one bounded completion that must answer with
/// an exact id. Provider failures are logged and reported as `NotFound`.
pub struct IntentRouter {
    skills: Vec<Skill>,
    provider: Option<Arc<dyn CompletionProvider>>,
}

impl IntentRouter {
    pub fn new(skills: Vec<Skill>) -> Self {
        Self {
            skills,
            provider: None,
        }
    }

    pub fn with_provider(mut self, provider: Arc<dyn CompletionProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn skills(&self) -> &[Skill] {
        &self.skills
    }

    pub async fn route(&self, input: &str) -> Result<RouteMatch, RouteError> {
        if self.skills.is_empty() {
            return Err(RouteError::NotFound);
        }

        if let Some(skill) = self.keyword_match(input) {
            info!(skill = %skill.id, "routed by keyword");
            return Ok(RouteMatch {
                skill: skill.clone(),
                source: RouteSource::Keyword,
            });
        }

        let Some(provider) = &self.provider else {
            return Err(RouteError::NotFound);
        };

        match self.model_match(provider.as_ref(), input).await {
            Some(skill) => {
                info!(skill = %skill.id, model = provider.model(), "routed by model");
                Ok(RouteMatch {
                    skill: skill.clone(),
                    source: RouteSource::Model,
                })
            }
            None => Err(RouteError::NotFound),
        }
    }

    /// Longest id contained in the input, case-insensitively. Equal-length
    /// ids keep catalog order.
    pub fn keyword_match(&self, input: &str) -> Option<&Skill> {
        let lowered = input.to_lowercase();
        let mut best: Option<&Skill> = None;
        for skill in &self.skills {
            if skill.id.is_empty() || !lowered.contains(&skill.id.to_lowercase()) {
                continue;
            }
            if best.map_or(true, |b| skill.id.len() > b.id.len()) {
                best = Some(skill);
            }
        }
        best
    }

    async fn model_match(&self, provider: &dyn CompletionProvider, input: &str) -> Option<&Skill> {
        let message = ConversationMessage::user(manifest_prompt(&self.skills, input));
        let answer = match provider
            .complete_text(
                ROUTER_SYSTEM_PROMPT.to_string(),
                vec![message],
                ROUTER_MAX_TOKENS,
            )
            .await
        {
            Ok(answer) => answer,
            Err(e) => {
                warn!(error = %e, "routing completion failed");
                return None;
            }
        };

        let answer = answer.trim();
        debug!(answer, "routing model answered");
        if answer == NO_MATCH_SENTINEL {
            return None;
        }
        let found = self.skills.iter().find(|s| s.id == answer);
        if found.is_none() {
            warn!(answer, "routing model answered with an unknown skill");
        }
        found
    }
}

fn manifest_prompt(skills: &[Skill], input: &str) -> String {
    let manifest = skills
        .iter()
        .map(|s| format!("- {}: {}", s.id, s.description))
        .collect::<Vec<_>>()
        .join("\n");
    format!("Available skills:\n{manifest}\n\nUser request: {input}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use telos_tool_runtime::provider::mock::MockProvider;
    use telos_tool_runtime::LlmError;

    fn catalog() -> Vec<Skill> {
        vec![
            Skill::new("weekly", "Weekly planning", "plan"),
            Skill::new("weekly-summary", "Summarise the week", "summarise"),
            Skill::new("inbox-triage", "Sort the inbox", "triage"),
        ]
    }

    #[tokio::test]
    async fn test_longest_id_wins() {
        let router = IntentRouter::new(catalog());
        let routed = router.route("weekly-summary report").await.unwrap();
        assert_eq!(routed.skill.id, "weekly-summary");
        assert_eq!(routed.source, RouteSource::Keyword);

        let routed = router.route("do my weekly thing").await.unwrap();
        assert_eq!(routed.skill.id, "weekly");
    }

    #[tokio::test]
    async fn test_keyword_is_case_insensitive() {
        let router = IntentRouter::new(catalog());
        let routed = router.route("Run INBOX-Triage now").await.unwrap();
        assert_eq!(routed.skill.id, "inbox-triage");
    }

    #[tokio::test]
    async fn test_keyword_order_does_not_matter() {
        let mut skills = catalog();
        skills.reverse();
        let router = IntentRouter::new(skills);
        assert_eq!(router.keyword_match("weekly-summary please").unwrap().id, "weekly-summary");
    }

    #[tokio::test]
    async fn test_empty_catalog_is_not_found() {
        let provider = Arc::new(MockProvider::new());
        let router = IntentRouter::new(Vec::new()).with_provider(provider.clone());
        assert_eq!(router.route("anything").await, Err(RouteError::NotFound));
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn test_no_provider_means_no_second_pass() {
        let router = IntentRouter::new(catalog());
        assert_eq!(router.route("sort my mail").await, Err(RouteError::NotFound));
    }

    #[tokio::test]
    async fn test_model_pass_exact_id() {
        let provider = Arc::new(MockProvider::new());
        provider.queue_text("  inbox-triage\n");
        let router = IntentRouter::new(catalog()).with_provider(provider.clone());

        let routed = router.route("sort my mail").await.unwrap();
        assert_eq!(routed.skill.id, "inbox-triage");
        assert_eq!(routed.source, RouteSource::Model);

        let requests = provider.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].max_tokens, ROUTER_MAX_TOKENS);
        assert!(requests[0].tools.is_empty());
        assert!(requests[0].system_prompt.contains("NONE"));
        let prompt = requests[0].messages[0].text();
        assert!(prompt.starts_with("Available skills:\n- weekly: Weekly planning\n"));
        assert!(prompt.ends_with("\n\nUser request: sort my mail"));
    }

    #[tokio::test]
    async fn test_keyword_hit_skips_model() {
        let provider = Arc::new(MockProvider::new());
        let router = IntentRouter::new(catalog()).with_provider(provider.clone());
        router.route("weekly").await.unwrap();
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn test_model_sentinel_and_unknown_answers() {
        let provider = Arc::new(MockProvider::new());
        provider.queue_text("NONE");
        provider.queue_text("Inbox-Triage.");
        let router = IntentRouter::new(catalog()).with_provider(provider.clone());

        assert_eq!(router.route("hello").await, Err(RouteError::NotFound));
        assert_eq!(router.route("hello").await, Err(RouteError::NotFound));
        assert_eq!(provider.call_count(), 2);
    }

    #[tokio::test]
    async fn test_model_failure_is_not_found() {
        let provider = Arc::new(MockProvider::new());
        provider.queue_request_error(LlmError::NetworkError("connection refused".into()));
        let router = IntentRouter::new(catalog()).with_provider(provider.clone());

        assert_eq!(router.route("hello").await, Err(RouteError::NotFound));
        assert_eq!(provider.call_count(), 1);
    }
}
