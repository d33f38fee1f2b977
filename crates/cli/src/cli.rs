use clap::{Parser, Subcommand};

/// Personal agent runtime.
///
/// Routes a natural-language request to one of the agent's skills and runs
/// it against the configured model, with local and remote tools.
#[derive(Parser, Debug)]
#[command(name = "telos", about = "Route natural language to skills and run them")]
#[command(args_conflicts_with_subcommands = true)]
pub struct CliArgs {
    /// Agent to use (overrides the configured default)
    #[arg(short, long, global = true)]
    pub agent: Option<String>,

    /// Show the matched skill without executing it
    #[arg(long)]
    pub dry_run: bool,

    /// Show routing details and info-level logs
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Command>,

    /// Natural-language request
    #[arg(trailing_var_arg = true)]
    pub request: Vec<String>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// List the skills of an agent
    ListSkills,
    /// List all registered agents
    Agents,
}

impl CliArgs {
    /// The request words joined back into one string, if any were given.
    pub fn request_text(&self) -> Option<String> {
        let text = self.request.join(" ");
        let text = text.trim();
        (!text.is_empty()).then(|| text.to_string())
    }
}
