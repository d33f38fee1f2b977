use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use telos_tool_runtime::{ExecutionTrace, TraceEvent};

/// Append-only JSONL trace log, one file per local day.
pub struct TraceLog {
    dir: PathBuf,
}

impl TraceLog {
    /// Create a trace log under `dir`, ensuring the directory exists.
    pub fn new(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create log dir: {}", dir.display()))?;
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Append every event of `trace` to today's file. Returns the file path.
    pub fn record(&self, trace: &ExecutionTrace) -> Result<PathBuf> {
        self.record_on(trace, Local::now().date_naive())
    }

    /// Append every event of `trace` to the file for `date`.
    ///
    /// The whole run is serialized first and written with one call, so a
    /// concurrent reader never sees half a run from this writer.
    pub fn record_on(&self, trace: &ExecutionTrace, date: NaiveDate) -> Result<PathBuf> {
        let path = self.day_file(date);

        let mut buf = String::new();
        for event in trace.events() {
            buf.push_str(&serde_json::to_string(event)?);
            buf.push('\n');
        }

        let mut file = std::fs::OpenOptions::new()
            .append(true)
            .create(true)
            .open(&path)
            .with_context(|| format!("failed to open trace log: {}", path.display()))?;
        file.write_all(buf.as_bytes())
            .with_context(|| format!("failed to write trace log: {}", path.display()))?;

        debug!(
            path = %path.display(),
            run_id = trace.run_id().unwrap_or_default(),
            events = trace.events().len(),
            "trace recorded"
        );
        Ok(path)
    }

    /// Every event logged on `date`, skipping lines that fail to parse.
    pub fn read_day(&self, date: NaiveDate) -> Result<Vec<TraceEvent>> {
        let path = self.day_file(date);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let data = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read trace log: {}", path.display()))?;

        let mut events = Vec::new();
        for (i, line) in data.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<TraceEvent>(line) {
                Ok(event) => events.push(event),
                Err(e) => {
                    warn!(
                        file = %path.display(),
                        line = i + 1,
                        error = %e,
                        "skipping corrupt trace line"
                    );
                }
            }
        }
        Ok(events)
    }

    /// Runs logged on `date`, split at each `skill_start` event.
    pub fn traces_on(&self, date: NaiveDate) -> Result<Vec<ExecutionTrace>> {
        let mut runs: Vec<Vec<TraceEvent>> = Vec::new();
        for event in self.read_day(date)? {
            match (&event, runs.last_mut()) {
                (TraceEvent::SkillStart { .. }, _) | (_, None) => runs.push(vec![event]),
                (_, Some(run)) => run.push(event),
            }
        }
        Ok(runs.into_iter().map(ExecutionTrace::from_events).collect())
    }

    fn day_file(&self, date: NaiveDate) -> PathBuf {
        self.dir.join(format!("{}.jsonl", date.format("%Y-%m-%d")))
    }
}
