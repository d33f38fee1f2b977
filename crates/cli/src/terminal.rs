use anyhow::Result;
use crossterm::{
    execute,
    style::{Color, Print, ResetColor, SetForegroundColor},
};
use std::io::{self, Write};

use telos_agent::AgentsConfig;
use telos_core::Skill;

/// Color scheme for terminal output.
struct Colors;

impl Colors {
    const SKILL: Color = Color::Cyan;
    const MATCH: Color = Color::Green;
    const WARNING: Color = Color::Yellow;
    const ERROR: Color = Color::Red;
    const DIM: Color = Color::DarkGrey;
    const HEADER: Color = Color::Magenta;
}

/// Terminal output. Model text and listings go to stdout; diagnostics go to
/// stderr.
pub struct Terminal;

impl Terminal {
    pub fn new() -> Self {
        Self
    }

    /// Write a streamed text delta as-is.
    pub fn stream_text(delta: &str) {
        let mut stdout = io::stdout();
        // A closed stdout must not abort the run.
        let _ = stdout.write_all(delta.as_bytes());
        let _ = stdout.flush();
    }

    /// End the streamed answer with a newline.
    pub fn finish_stream(&self) -> Result<()> {
        let mut stdout = io::stdout();
        execute!(stdout, Print("\n"))?;
        Ok(())
    }

    pub fn print_skills(&self, header: &str, skills: &[Skill]) -> Result<()> {
        let mut stdout = io::stdout();
        execute!(
            stdout,
            SetForegroundColor(Colors::HEADER),
            Print(format!("{header}\n")),
            ResetColor,
            SetForegroundColor(Colors::SKILL),
            Print(format_skills(skills)),
            ResetColor,
        )?;
        stdout.flush()?;
        Ok(())
    }

    pub fn print_agents(&self, agents: &AgentsConfig) -> Result<()> {
        let mut stdout = io::stdout();
        execute!(
            stdout,
            SetForegroundColor(Colors::HEADER),
            Print("Registered Agents\n"),
            ResetColor,
            Print(format_agents(agents)),
        )?;
        stdout.flush()?;
        Ok(())
    }

    pub fn print_matched(&self, agent: &str, skill: &str) -> Result<()> {
        let mut stdout = io::stdout();
        execute!(
            stdout,
            SetForegroundColor(Colors::MATCH),
            Print("Matched: "),
            ResetColor,
            Print(format!("agent={agent}, skill={skill}\n")),
        )?;
        stdout.flush()?;
        Ok(())
    }

    /// Print a dim detail line to stderr.
    pub fn print_detail(&self, label: &str, value: &str) -> Result<()> {
        let mut stderr = io::stderr();
        execute!(
            stderr,
            SetForegroundColor(Colors::DIM),
            Print(format!("{label}: ")),
            ResetColor,
            Print(format!("{value}\n")),
        )?;
        Ok(())
    }

    pub fn print_warning(&self, msg: &str) -> Result<()> {
        let mut stderr = io::stderr();
        execute!(
            stderr,
            SetForegroundColor(Colors::WARNING),
            Print(format!("{msg}\n")),
            ResetColor,
        )?;
        Ok(())
    }

    pub fn print_error(&self, msg: &str) -> Result<()> {
        let mut stderr = io::stderr();
        execute!(
            stderr,
            SetForegroundColor(Colors::ERROR),
            Print(format!("Error: {msg}\n")),
            ResetColor,
        )?;
        Ok(())
    }
}

/// Two-column `id  description` listing, ids padded to the longest.
fn format_skills(skills: &[Skill]) -> String {
    let width = skills.iter().map(|s| s.id.len()).max().unwrap_or(0);
    skills
        .iter()
        .map(|s| format!("  {:<width$}  {}\n", s.id, s.description))
        .collect()
}

/// One row per agent; the default is marked with `*`.
fn format_agents(config: &AgentsConfig) -> String {
    let rows: Vec<[String; 4]> = config
        .agents
        .values()
        .map(|agent| {
            let marker = if config.default_agent.as_deref() == Some(agent.name.as_str()) {
                " *"
            } else {
                ""
            };
            [
                format!("{}{marker}", agent.name),
                agent.mode.to_string(),
                agent.skill_count().to_string(),
                agent.working_dir.display().to_string(),
            ]
        })
        .collect();

    let header = ["AGENT", "MODE", "SKILLS", "WORKING DIR"].map(String::from);
    let mut widths = header.clone().map(|h| h.len());
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.len());
        }
    }

    std::iter::once(&header)
        .chain(&rows)
        .map(|row| {
            format!(
                "{:<w0$}  {:<w1$}  {:>w2$}  {}\n",
                row[0],
                row[1],
                row[2],
                row[3],
                w0 = widths[0],
                w1 = widths[1],
                w2 = widths[2],
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_format_skills_aligned() {
        let skills = vec![
            Skill::new("daily-note", "Write today's note", ""),
            Skill::new("weekly-review", "Review the week", ""),
        ];
        assert_eq!(
            format_skills(&skills),
            "  daily-note     Write today's note\n  weekly-review  Review the week\n"
        );
    }

    #[test]
    fn test_format_agents_marks_default() {
        let config = AgentsConfig::parse(
            "[defaults]\ndefault_agent = \"notes\"\n\
             [agents.notes]\nmode = \"linked\"\nskills_dir = \"/nope\"\nworking_dir = \"/vault\"\n\
             [agents.gmail]\nmode = \"installed\"\nworking_dir = \"/mail\"\n",
            Path::new("/data"),
        )
        .unwrap();

        let table = format_agents(&config);
        let lines: Vec<_> = table.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("AGENT"));
        assert!(lines[1].starts_with("gmail "));
        assert!(lines[2].starts_with("notes *"));
        assert!(lines[2].contains("linked"));
        assert!(lines[2].ends_with("/vault"));
    }
}
