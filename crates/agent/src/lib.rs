//! Agent-level plumbing: where skills live, which agent runs, and how one
//! activation is wired together and recorded.

pub mod config;
pub mod runner;
pub mod skills;
pub mod trace_log;

pub use config::{AgentConfigError, AgentDefinition, AgentMode, AgentsConfig};
pub use runner::{ActivationError, ConfigurationError, SkillRunner};
pub use skills::{discover_skills, SkillCatalogError};
pub use trace_log::TraceLog;
