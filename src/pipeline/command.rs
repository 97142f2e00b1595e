//! Projection runner: builds and executes `<python> <script> --method m --config c`
//!
//! The script is a black box. Its combined output and exit status come back
//! verbatim; a non-zero exit is a normal [`CommandResult`], not an error.

use serde::{Deserialize, Serialize};
use std::process::{Command, Output};
use std::sync::mpsc::{channel, Receiver, TryRecvError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RunError {
    #[error("no {0} selected")]
    Missing(&'static str),
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("runner thread exited without a result")]
    Disconnected,
}

/// Result of executing a runner command
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandResult {
    pub success: bool,
    pub command_string: String,
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
}

impl CommandResult {
    fn from_output(command_string: String, output: &Output) -> Self {
        Self {
            success: output.status.success(),
            command_string,
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            exit_code: output.status.code(),
        }
    }

    /// What to show the user: stdout on success, else stderr (or stdout
    /// when stderr is empty)
    pub fn message(&self) -> &str {
        let text = if self.success || self.stderr.trim().is_empty() {
            &self.stdout
        } else {
            &self.stderr
        };
        if text.trim().is_empty() {
            "Unknown error"
        } else {
            text.trim()
        }
    }

    /// Exit status with both streams, trailing whitespace dropped
    pub fn report(&self) -> String {
        let status = match self.exit_code {
            Some(code) => format!("exit code {}", code),
            None => "terminated by signal".to_string(),
        };
        format!(
            "{}\nstdout: {}\nstderr: {}",
            status,
            self.stdout.trim_end(),
            self.stderr.trim_end()
        )
    }

    /// `message()` on success, the full `report()` otherwise
    pub fn summary(&self) -> String {
        if self.success {
            self.message().to_string()
        } else {
            self.report()
        }
    }
}

/// Which method and preset to run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptRequest {
    /// Runner module name, e.g. `umap`
    pub method: String,
    /// Preset name, e.g. `detail`
    pub config: String,
}

impl ScriptRequest {
    pub fn new(method: &str, config: &str) -> Self {
        Self {
            method: method.to_string(),
            config: config.to_string(),
        }
    }
}

/// Builder for runner invocations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptCommand {
    pub program: String,
    pub args: Vec<String>,
    pub description: String,
}

impl ScriptCommand {
    pub fn new(program: &str) -> Self {
        Self {
            program: program.to_string(),
            args: Vec::new(),
            description: String::new(),
        }
    }

    /// `<python> <script> --method <method> --config <config>`
    pub fn for_request(python: &str, script: &str, request: &ScriptRequest) -> Result<Self, RunError> {
        if request.method.trim().is_empty() {
            return Err(RunError::Missing("method"));
        }
        if request.config.trim().is_empty() {
            return Err(RunError::Missing("configuration"));
        }
        Ok(Self::new(python)
            .arg(script)
            .args(&["--method", &request.method, "--config", &request.config])
            .describe(&format!("{} / {}", request.method, request.config)))
    }

    pub fn arg(mut self, arg: &str) -> Self {
        self.args.push(arg.to_string());
        self
    }

    pub fn args(mut self, args: &[&str]) -> Self {
        self.args.extend(args.iter().map(|s| s.to_string()));
        self
    }

    pub fn describe(mut self, desc: &str) -> Self {
        self.description = desc.to_string();
        self
    }

    /// Build the command string for logging/display
    pub fn to_command_string(&self) -> String {
        let mut parts = vec![self.program.clone()];
        parts.extend(self.args.clone());
        parts.join(" ")
    }

    /// Execute and wait
    pub fn execute(&self) -> Result<CommandResult, RunError> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);

        log::info!("Executing: {}", self.to_command_string());

        let output = cmd.output().map_err(|source| RunError::Spawn {
            program: self.program.clone(),
            source,
        })?;
        let result = CommandResult::from_output(self.to_command_string(), &output);

        if !result.success {
            log::warn!(
                "Command failed (exit {}): {}\nstderr: {}",
                result.exit_code.unwrap_or(-1),
                result.command_string,
                result.stderr
            );
        }

        Ok(result)
    }
}

/// One run at a time on a background thread
#[derive(Default)]
pub struct ScriptRunner {
    pending: Option<(ScriptCommand, Receiver<Result<CommandResult, RunError>>)>,
}

impl ScriptRunner {
    pub fn is_running(&self) -> bool {
        self.pending.is_some()
    }

    /// Start `command` unless a run is already in flight. Returns whether
    /// it was started.
    pub fn start(&mut self, command: ScriptCommand, repaint: Option<egui::Context>) -> bool {
        if self.is_running() {
            log::warn!("Run already in progress, ignoring {}", command.to_command_string());
            return false;
        }
        let (tx, rx) = channel();
        let job = command.clone();
        std::thread::spawn(move || {
            let _ = tx.send(job.execute());
            if let Some(ctx) = repaint {
                ctx.request_repaint();
            }
        });
        self.pending = Some((command, rx));
        true
    }

    /// The finished run, if any, together with the command that produced it
    pub fn poll(&mut self) -> Option<(ScriptCommand, Result<CommandResult, RunError>)> {
        let (_, rx) = self.pending.as_ref()?;
        let result = match rx.try_recv() {
            Ok(result) => result,
            Err(TryRecvError::Empty) => return None,
            Err(TryRecvError::Disconnected) => Err(RunError::Disconnected),
        };
        self.pending.take().map(|(command, _)| (command, result))
    }
}

/// Probe an interpreter with `--version`. Returns the reported version.
pub fn check_python_available(python: &str) -> Option<String> {
    Command::new(python)
        .arg("--version")
        .output()
        .ok()
        .filter(|o| o.status.success())
        .map(|o| {
            // older interpreters print the version on stderr
            let text = if o.stdout.is_empty() { &o.stderr } else { &o.stdout };
            String::from_utf8_lossy(text).trim().to_string()
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_line_shape() {
        let cmd = ScriptCommand::for_request("./.venv/bin/python", "run.py", &ScriptRequest::new("umap", "detail")).unwrap();
        assert_eq!(
            cmd.to_command_string(),
            "./.venv/bin/python run.py --method umap --config detail"
        );
    }

    #[test]
    fn test_empty_selection_is_rejected_before_spawn() {
        let err = ScriptCommand::for_request("python3", "run.py", &ScriptRequest::new("", "detail")).unwrap_err();
        assert!(matches!(err, RunError::Missing("method")));
        let err = ScriptCommand::for_request("python3", "run.py", &ScriptRequest::new("umap", " ")).unwrap_err();
        assert!(matches!(err, RunError::Missing("configuration")));
    }

    #[test]
    fn test_missing_program_is_spawn_error() {
        let err = ScriptCommand::new("/definitely/not/a/python").execute().unwrap_err();
        assert!(matches!(err, RunError::Spawn { .. }));
        assert!(check_python_available("/definitely/not/a/python").is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_nonzero_exit_is_reported_verbatim() {
        let result = ScriptCommand::new("sh")
            .args(&["-c", "echo partial; echo 'No config for umap' >&2; exit 3"])
            .execute()
            .unwrap();
        assert!(!result.success);
        assert_eq!(result.exit_code, Some(3));
        assert_eq!(result.stdout, "partial\n");
        assert_eq!(result.message(), "No config for umap");
        assert_eq!(
            result.summary(),
            "exit code 3\nstdout: partial\nstderr: No config for umap"
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_runner_delivers_one_result() {
        let mut runner = ScriptRunner::default();
        assert!(runner.start(ScriptCommand::new("sh").args(&["-c", "echo ok"]), None));
        assert!(!runner.start(ScriptCommand::new("sh").args(&["-c", "echo again"]), None));

        let mut finished = None;
        for _ in 0..200 {
            if let Some(done) = runner.poll() {
                finished = Some(done);
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(10));
        }
        let (cmd, result) = finished.unwrap();
        assert_eq!(cmd.to_command_string(), "sh -c echo ok");
        assert_eq!(result.unwrap().message(), "ok");
        assert!(!runner.is_running());
    }
}
