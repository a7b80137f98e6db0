//! Command runner abstraction for invoking host tools.
//!
//! `CommandRunner` is the trait that backends use to execute system commands.
//! `ProcessRunner` is the production implementation that spawns the program
//! directly with captured output. `MockRunner` is the test double that
//! records calls and returns preset responses.

use std::cell::RefCell;
use std::collections::HashSet;
use std::path::Path;
use std::process::Command;


/// Captured result of one finished command.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    /// `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
}

impl CommandOutput {
    pub fn ok(stdout: &str) -> Self {
        CommandOutput {
            stdout: stdout.to_string(),
            stderr: String::new(),
            exit_code: Some(0),
        }
    }

    pub fn failed(code: i32, stderr: &str) -> Self {
        CommandOutput {
            stdout: String::new(),
            stderr: stderr.to_string(),
            exit_code: Some(code),
        }
    }

    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}


/// Trait for executing an external program with arguments.
///
/// `Err` means the program could not be started at all; a program that ran
/// and failed is `Ok` with a nonzero `exit_code`.
pub trait CommandRunner {
    fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput, String>;

    /// Whether `program` can be found on this host.
    fn has_command(&self, program: &str) -> bool;
}


/// Production runner backed by `std::process::Command`.
pub struct ProcessRunner;

impl CommandRunner for ProcessRunner {
    fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput, String> {
        let output = Command::new(program)
            .args(args)
            .output()
            .map_err(|e| format!("Failed to execute {}: {}", program, e))?;
        Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            exit_code: output.status.code(),
        })
    }

    fn has_command(&self, program: &str) -> bool {
        if program.contains('/') {
            return is_executable(Path::new(program));
        }
        match std::env::var_os("PATH") {
            Some(paths) => std::env::split_paths(&paths).any(|dir| is_executable(&dir.join(program))),
            None => false,
        }
    }
}

fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    match std::fs::metadata(path) {
        Ok(meta) => meta.is_file() && meta.permissions().mode() & 0o111 != 0,
        Err(_) => false,
    }
}


/// Test-double runner that records commands and returns pre-configured responses.
pub struct MockRunner {
    responses: RefCell<Vec<Result<CommandOutput, String>>>,
    commands: RefCell<Vec<String>>,
    available: Option<HashSet<String>>,
}

impl MockRunner {
    pub fn with_responses(responses: Vec<Result<CommandOutput, String>>) -> Self {
        let mut reversed = responses;
        reversed.reverse();
        MockRunner {
            responses: RefCell::new(reversed),
            commands: RefCell::new(Vec::new()),
            available: None,
        }
    }

    pub fn new() -> Self {
        Self::with_responses(Vec::new())
    }

    /// Restrict `has_command` to the given programs (default: everything exists).
    pub fn with_available(mut self, programs: &[&str]) -> Self {
        self.available = Some(programs.iter().map(|p| p.to_string()).collect());
        self
    }

    pub fn executed_commands(&self) -> Vec<String> {
        self.commands.borrow().clone()
    }
}

impl Default for MockRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandRunner for MockRunner {
    fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput, String> {
        let mut line = program.to_string();
        for a in args {
            line.push(' ');
            line.push_str(a);
        }
        self.commands.borrow_mut().push(line);
        let mut responses = self.responses.borrow_mut();
        if let Some(response) = responses.pop() {
            response
        } else {
            Ok(CommandOutput::ok(""))
        }
    }

    fn has_command(&self, program: &str) -> bool {
        match &self.available {
            Some(set) => set.contains(program),
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_runner_records_commands() {
        let runner = MockRunner::with_responses(vec![
            Ok(CommandOutput::ok("ok")),
            Ok(CommandOutput::ok("ok2")),
        ]);
        runner.run("gsettings", &["get", "a", "b"]).unwrap();
        runner.run("flatpak", &["remotes"]).unwrap();
        let cmds = runner.executed_commands();
        assert_eq!(cmds, vec!["gsettings get a b", "flatpak remotes"]);
    }

    #[test]
    fn mock_runner_returns_responses_in_order() {
        let runner = MockRunner::with_responses(vec![
            Ok(CommandOutput::ok("first")),
            Err("spawn failed".into()),
            Ok(CommandOutput::failed(1, "third")),
        ]);
        assert_eq!(runner.run("a", &[]).unwrap().stdout, "first");
        assert_eq!(runner.run("b", &[]).unwrap_err(), "spawn failed");
        let third = runner.run("c", &[]).unwrap();
        assert!(!third.success());
        assert_eq!(third.stderr, "third");
    }

    #[test]
    fn mock_runner_defaults_to_empty_success() {
        let runner = MockRunner::new();
        let out = runner.run("anything", &[]).unwrap();
        assert!(out.success());
        assert_eq!(out.stdout, "");
    }

    #[test]
    fn mock_runner_availability() {
        let runner = MockRunner::new().with_available(&["gsettings"]);
        assert!(runner.has_command("gsettings"));
        assert!(!runner.has_command("flatpak"));
        assert!(MockRunner::new().has_command("flatpak"));
    }

    #[test]
    fn process_runner_captures_exit_code_and_streams() {
        let runner = ProcessRunner;
        let out = runner.run("sh", &["-c", "echo out; echo err >&2; exit 3"]).unwrap();
        assert_eq!(out.stdout.trim(), "out");
        assert_eq!(out.stderr.trim(), "err");
        assert_eq!(out.exit_code, Some(3));
    }

    #[test]
    fn process_runner_spawn_failure_is_err() {
        let runner = ProcessRunner;
        assert!(runner.run("/nonexistent/firstboot-test-binary", &[]).is_err());
    }

    #[test]
    fn process_runner_finds_sh_on_path() {
        let runner = ProcessRunner;
        assert!(runner.has_command("sh"));
        assert!(!runner.has_command("firstboot-definitely-not-a-command"));
    }
}
