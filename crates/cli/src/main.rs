mod cli;
mod commands;
mod config;
mod terminal;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use std::process::ExitCode;

use crate::cli::{CliArgs, Command};
use crate::config::CliConfig;
use crate::terminal::Terminal;

#[tokio::main]
async fn main() -> ExitCode {
    let args = CliArgs::parse();

    // Logs go to stderr; stdout carries the model's answer.
    let default_filter = if args.verbose { "info" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let terminal = Terminal::new();
    match dispatch(&args, &terminal).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %e, "telos failed");
            let _ = terminal.print_error(&format!("{e:#}"));
            ExitCode::FAILURE
        }
    }
}

async fn dispatch(args: &CliArgs, terminal: &Terminal) -> Result<ExitCode> {
    if args.command.is_none() && args.request_text().is_none() {
        CliArgs::command().print_help()?;
        return Ok(ExitCode::from(2));
    }

    let config = CliConfig::load()?;
    match &args.command {
        Some(Command::ListSkills) => commands::list_skills(args, &config, terminal),
        Some(Command::Agents) => commands::list_agents(&config, terminal),
        None => {
            let request = args.request_text().unwrap_or_default();
            commands::run_request(args, &request, &config, terminal).await
        }
    }
}
