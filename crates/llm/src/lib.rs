pub mod providers;
pub mod router;

pub use providers::{create_provider, create_router_provider, AnthropicProvider, OpenAiCompatProvider};
pub use router::{IntentRouter, RouteError, RouteMatch, RouteSource};
