//! Session history of projection runs and loads
//!
//! Every script run (and every completed view load) is appended in order
//! with its timestamp, the exact command line and the outcome. The history
//! can be exported as plain text or JSON.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::io;
use std::path::Path;

use crate::pipeline::command::{CommandResult, RunError, ScriptCommand};

/// One recorded operation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunEntry {
    /// Sequential operation number (1-based)
    pub sequence: usize,
    pub timestamp: DateTime<Local>,
    pub operation: String,
    pub description: String,
    /// Command line, empty for operations that ran in-process
    pub command: String,
    pub success: bool,
    pub exit_code: Option<i32>,
    /// stdout on success, else the error text
    pub output: String,
}

impl RunEntry {
    pub fn to_text(&self) -> String {
        let status = match (self.success, self.exit_code) {
            (true, _) => "ok".to_string(),
            (false, Some(code)) => format!("failed (exit {})", code),
            (false, None) => "failed".to_string(),
        };
        let mut out = format!(
            "[{:03}] {} | {} | {} | {}",
            self.sequence,
            self.timestamp.format("%Y-%m-%d %H:%M:%S"),
            self.operation,
            self.description,
            status
        );
        if !self.command.is_empty() {
            out.push_str(&format!("\n      Command: {}", self.command));
        }
        if !self.output.trim().is_empty() {
            out.push_str(&format!("\n      Output:  {}", self.output.trim()));
        }
        out
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunHistory {
    pub session_id: String,
    pub session_start: DateTime<Local>,
    pub database: String,
    pub software_version: String,
    pub entries: Vec<RunEntry>,
}

impl RunHistory {
    pub fn new() -> Self {
        Self {
            session_id: uuid::Uuid::new_v4().to_string(),
            session_start: Local::now(),
            database: String::new(),
            software_version: env!("CARGO_PKG_VERSION").to_string(),
            entries: Vec::new(),
        }
    }

    pub fn set_database(&mut self, path: &str) {
        self.database = path.to_string();
    }

    fn push(&mut self, mut entry: RunEntry) {
        entry.sequence = self.entries.len() + 1;
        log::info!("[RUN {:03}] {} | {}", entry.sequence, entry.operation, entry.description);
        self.entries.push(entry);
    }

    /// Record the outcome of a finished script run
    pub fn record_run(&mut self, command: &ScriptCommand, result: &Result<CommandResult, RunError>) {
        let (success, exit_code, output) = match result {
            Ok(r) => (r.success, r.exit_code, r.summary()),
            Err(e) => (false, None, e.to_string()),
        };
        self.push(RunEntry {
            sequence: 0,
            timestamp: Local::now(),
            operation: "Run".to_string(),
            description: command.description.clone(),
            command: command.to_command_string(),
            success,
            exit_code,
            output,
        });
    }

    /// Record a view load that reached the interactive state, or failed
    pub fn record_load(&mut self, description: &str, outcome: Result<usize, String>) {
        let (success, output) = match outcome {
            Ok(points) => (true, format!("{} points", points)),
            Err(e) => (false, e),
        };
        self.push(RunEntry {
            sequence: 0,
            timestamp: Local::now(),
            operation: "Load".to_string(),
            description: description.to_string(),
            command: String::new(),
            success,
            exit_code: None,
            output,
        });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn last(&self) -> Option<&RunEntry> {
        self.entries.last()
    }

    pub fn to_text(&self) -> String {
        let mut out = String::new();
        out.push_str("═══════════════════════════════════════════════════════════════\n");
        out.push_str("  DR Explorer Run Log\n");
        out.push_str("═══════════════════════════════════════════════════════════════\n");
        out.push_str(&format!("  Session ID:  {}\n", self.session_id));
        out.push_str(&format!(
            "  Started:     {}\n",
            self.session_start.format("%Y-%m-%d %H:%M:%S")
        ));
        out.push_str(&format!("  Database:    {}\n", self.database));
        out.push_str(&format!("  Software:    dr_explorer v{}\n", self.software_version));
        out.push_str(&format!("  Operations:  {}\n", self.entries.len()));
        out.push_str("───────────────────────────────────────────────────────────────\n\n");

        for entry in &self.entries {
            out.push_str(&entry.to_text());
            out.push_str("\n\n");
        }
        out
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|e| format!("JSON error: {}", e))
    }

    pub fn save_text(&self, path: &Path) -> io::Result<()> {
        std::fs::write(path, self.to_text())
    }

    pub fn save_json(&self, path: &Path) -> io::Result<()> {
        std::fs::write(path, self.to_json())
    }
}

impl Default for RunHistory {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::command::ScriptRequest;

    fn command() -> ScriptCommand {
        ScriptCommand::for_request("python3", "run.py", &ScriptRequest::new("umap", "detail")).unwrap()
    }

    #[test]
    fn test_entries_are_numbered_in_order() {
        let mut history = RunHistory::new();
        assert!(history.is_empty());
        history.record_load("umap config 7", Ok(3));
        history.record_run(
            &command(),
            &Ok(CommandResult {
                success: true,
                command_string: command().to_command_string(),
                stdout: "cfg_id=8 pts=250".into(),
                stderr: String::new(),
                exit_code: Some(0),
            }),
        );
        assert_eq!(history.len(), 2);
        assert_eq!(history.entries[0].sequence, 1);
        assert_eq!(history.entries[1].sequence, 2);
        assert_eq!(history.last().unwrap().output, "cfg_id=8 pts=250");
    }

    #[test]
    fn test_failed_run_text() {
        let mut history = RunHistory::new();
        history.set_database("art.sqlite");
        history.record_run(
            &command(),
            &Ok(CommandResult {
                success: false,
                command_string: command().to_command_string(),
                stdout: String::new(),
                stderr: "No config detail for umap".into(),
                exit_code: Some(1),
            }),
        );
        let text = history.to_text();
        assert!(text.contains("failed (exit 1)"));
        assert!(text.contains("python3 run.py --method umap --config detail"));
        assert!(text.contains("No config detail for umap"));
        assert_eq!(
            history.last().unwrap().output,
            "exit code 1\nstdout: \nstderr: No config detail for umap"
        );
        assert!(text.contains("art.sqlite"));
    }

    #[test]
    fn test_json_export_and_save() {
        let mut history = RunHistory::new();
        history.record_run(&command(), &Err(RunError::Missing("method")));
        let parsed: RunHistory = serde_json::from_str(&history.to_json()).unwrap();
        assert_eq!(parsed.session_id, history.session_id);
        assert!(!parsed.entries[0].success);

        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("runs.json");
        history.save_json(&path).unwrap();
        assert!(std::fs::read_to_string(&path).unwrap().contains("\"Run\""));
    }
}
