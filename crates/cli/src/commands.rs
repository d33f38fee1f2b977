use anyhow::{Context, Result};
use std::process::ExitCode;
use tracing::{info, warn};

use telos_agent::{discover_skills, ActivationError, SkillRunner, TraceLog};
use telos_llm::{create_provider, create_router_provider, IntentRouter, RouteError, RouteSource};
use telos_tool_runtime::RunStatus;

use crate::cli::CliArgs;
use crate::config::CliConfig;
use crate::terminal::Terminal;

/// Route `request` to a skill of the selected agent and run it.
pub async fn run_request(
    args: &CliArgs,
    request: &str,
    config: &CliConfig,
    terminal: &Terminal,
) -> Result<ExitCode> {
    let agents = config.load_agents()?;
    let agent = agents.select(args.agent.as_deref())?;
    let skills = discover_skills(&agent.skills_dir)?;

    if skills.is_empty() {
        terminal.print_error(&format!("No skills found for agent '{}'.", agent.name))?;
        return Ok(ExitCode::FAILURE);
    }

    if args.verbose {
        terminal.print_detail("Agent", &agent.name)?;
        terminal.print_detail("Skills dir", &agent.skills_dir.display().to_string())?;
    }

    let llm = &config.config.llm;
    let mut router = IntentRouter::new(skills.clone());
    if llm.is_configured() {
        match create_router_provider(llm) {
            Ok(provider) => router = router.with_provider(provider),
            Err(e) => warn!(error = %e, "model routing disabled"),
        }
    }

    let matched = match router.route(request).await {
        Ok(matched) => matched,
        Err(RouteError::NotFound) => {
            terminal.print_error(&format!("No matching skill found for: '{request}'"))?;
            terminal.print_skills("Available skills:", &skills)?;
            return Ok(ExitCode::FAILURE);
        }
    };

    if args.verbose {
        let via = match matched.source {
            RouteSource::Keyword => "keyword",
            RouteSource::Model => "model",
        };
        terminal.print_detail("Matched skill", &format!("{} (via {via})", matched.skill.id))?;
    }

    if args.dry_run {
        terminal.print_matched(&agent.name, &matched.skill.id)?;
        return Ok(ExitCode::SUCCESS);
    }

    let provider = create_provider(llm).context("cannot create model provider")?;
    let context = agent.context()?;

    let mut runner = SkillRunner::new(provider, config.config.engine.clone())
        .with_max_tokens(llm.max_tokens)
        .with_env(config.env.clone())
        .with_text_sink(Terminal::stream_text);
    match TraceLog::new(&config.config.paths.log_dir()) {
        Ok(log) => runner = runner.with_trace_log(log),
        Err(e) => warn!(error = %e, "trace logging disabled"),
    }

    match runner.run(&matched.skill, Some(request), &context).await {
        Ok(outcome) => {
            terminal.finish_stream()?;
            info!(
                run_id = %outcome.run_id,
                rounds = outcome.rounds,
                status = %outcome.status,
                "run finished"
            );
            if outcome.status == RunStatus::MaxRoundsExceeded {
                terminal.print_warning(&format!(
                    "Stopped after {} rounds without a final answer.",
                    outcome.rounds
                ))?;
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(ActivationError::Configuration(e)) => {
            terminal.print_error(&e.to_string())?;
            Ok(ExitCode::FAILURE)
        }
        Err(ActivationError::Execution(failure)) => {
            if !failure.partial_text.is_empty() {
                terminal.finish_stream()?;
            }
            terminal.print_error(&failure.to_string())?;
            Ok(ExitCode::FAILURE)
        }
    }
}

pub fn list_skills(args: &CliArgs, config: &CliConfig, terminal: &Terminal) -> Result<ExitCode> {
    let agents = config.load_agents()?;
    let agent = agents.select(args.agent.as_deref())?;
    let skills = discover_skills(&agent.skills_dir)?;

    if skills.is_empty() {
        terminal.print_warning(&format!("No skills found for agent '{}'.", agent.name))?;
    } else {
        terminal.print_skills(&format!("Skills for {}", agent.name), &skills)?;
    }
    Ok(ExitCode::SUCCESS)
}

pub fn list_agents(config: &CliConfig, terminal: &Terminal) -> Result<ExitCode> {
    let agents = config.load_agents()?;
    terminal.print_agents(&agents)?;
    Ok(ExitCode::SUCCESS)
}
