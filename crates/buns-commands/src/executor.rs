//! Command execution: run permitted inline shell tokens, then print the body.

use std::process::Stdio;

use colored::Colorize;

use crate::allowlist::AllowList;
use crate::loader::CommandRegistry;
use crate::shell::{render_executed, scan_shell_tokens};

/// Interpreter that runs inline tokens as `<shell> -c <command>`.
const SHELL: &str = "sh";

/// What happened to one inline shell token.
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    /// The process ran to completion. `status` is `None` when killed by a signal.
    Completed {
        status: Option<i32>,
        stdout: String,
        stderr: String,
    },
    /// Rejected by the allow-list.
    Skipped,
    /// The process could not be launched.
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionStep {
    pub command: String,
    pub outcome: StepOutcome,
}

/// Result of executing one command body.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionReport {
    /// One step per token, in body order.
    pub steps: Vec<ExecutionStep>,
    /// Body with every token replaced by `[Executed: <command>]`.
    pub display: String,
}

/// Execute a loaded command by name.
///
/// Unknown names print a notice and return `None`.
pub async fn execute_command(registry: &CommandRegistry, name: &str) -> Option<ExecutionReport> {
    let Some(command) = registry.get(name) else {
        println!("{}", format!("Command '{name}' not found").red());
        return None;
    };

    println!("{}", format!("Executing command: {name}").blue());
    println!("{}", command.description.dimmed());

    let allow_list = AllowList::new(command.allowed_tools.as_slice());
    Some(execute_body(&command.body, &allow_list).await)
}

/// Run every permitted token in `body` in order, then print the display text.
///
/// Rejected tokens and launch failures are logged and do not stop later tokens.
pub async fn execute_body(body: &str, allow_list: &AllowList) -> ExecutionReport {
    execute_body_with(SHELL, body, allow_list).await
}

async fn execute_body_with(shell: &str, body: &str, allow_list: &AllowList) -> ExecutionReport {
    let mut steps = Vec::new();

    for token in scan_shell_tokens(body) {
        let command = token.command;

        if !allow_list.is_allowed(&command) {
            tracing::warn!("Skipping unauthorized command: {command}");
            steps.push(ExecutionStep {
                command,
                outcome: StepOutcome::Skipped,
            });
            continue;
        }

        println!("{}", format!("Running: {command}").dimmed());
        let outcome = run_shell(shell, &command).await;
        steps.push(ExecutionStep { command, outcome });
    }

    let display = render_executed(body);
    println!("\n{display}");

    ExecutionReport { steps, display }
}

/// Run one command through `<shell> -c` and print its trimmed output.
async fn run_shell(shell: &str, command: &str) -> StepOutcome {
    let output = tokio::process::Command::new(shell)
        .arg("-c")
        .arg(command)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await;

    let output = match output {
        Ok(output) => output,
        Err(e) => {
            tracing::error!("Error executing '{command}': {e}");
            return StepOutcome::Failed {
                error: e.to_string(),
            };
        }
    };

    let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();

    if !stdout.is_empty() {
        println!("{stdout}");
    }
    if !stderr.is_empty() {
        eprintln!("{}", stderr.yellow());
    }

    let status = output.status.code();
    if !output.status.success() {
        tracing::warn!(exit_code = ?status, "Command '{command}' exited unsuccessfully");
    }

    StepOutcome::Completed {
        status,
        stdout,
        stderr,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::load_commands;

    #[tokio::test]
    async fn test_runs_permitted_and_skips_rejected() {
        let body = "A: !`echo allowed` B: !`rm -rf /tmp/nothing-to-see`";
        let allow_list = AllowList::new(&["Bash(echo *)"]);

        let report = execute_body(body, &allow_list).await;
        assert_eq!(report.steps.len(), 2);
        assert_eq!(
            report.steps[0].outcome,
            StepOutcome::Completed {
                status: Some(0),
                stdout: "allowed".into(),
                stderr: String::new(),
            }
        );
        assert_eq!(report.steps[1].outcome, StepOutcome::Skipped);
        // Both tokens are rendered, whether they ran or not.
        assert_eq!(
            report.display,
            "A: [Executed: echo allowed] B: [Executed: rm -rf /tmp/nothing-to-see]"
        );
    }

    #[tokio::test]
    async fn test_empty_allow_list_runs_everything() {
        let report = execute_body("!`echo one` !`echo two`", &AllowList::default()).await;
        let stdouts: Vec<_> = report
            .steps
            .iter()
            .map(|s| match &s.outcome {
                StepOutcome::Completed { stdout, .. } => stdout.as_str(),
                other => panic!("unexpected outcome: {other:?}"),
            })
            .collect();
        assert_eq!(stdouts, vec!["one", "two"]);
    }

    #[tokio::test]
    async fn test_failing_command_does_not_stop_later_ones() {
        let report =
            execute_body("!`echo oops >&2; exit 3` !`echo after`", &AllowList::default()).await;
        assert_eq!(
            report.steps[0].outcome,
            StepOutcome::Completed {
                status: Some(3),
                stdout: String::new(),
                stderr: "oops".into(),
            }
        );
        assert!(matches!(
            &report.steps[1].outcome,
            StepOutcome::Completed { stdout, .. } if stdout == "after"
        ));
    }

    #[tokio::test]
    async fn test_runs_sequentially() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("marker");
        let body = format!(
            "!`sleep 0.2 && touch {0}` !`test -f {0} && echo seen`",
            marker.display()
        );
        let report = execute_body(&body, &AllowList::default()).await;
        assert!(matches!(
            &report.steps[1].outcome,
            StepOutcome::Completed { stdout, .. } if stdout == "seen"
        ));
    }

    #[tokio::test]
    async fn test_launch_failure_is_reported_and_later_tokens_run() {
        let dir = tempfile::tempdir().unwrap();
        let missing_shell = dir.path().join("no-such-shell");
        let body = "First !`echo one` then !`echo two`";

        let report =
            execute_body_with(&missing_shell.to_string_lossy(), body, &AllowList::default()).await;
        assert_eq!(report.steps.len(), 2);
        for step in &report.steps {
            assert!(
                matches!(&step.outcome, StepOutcome::Failed { error } if !error.is_empty()),
                "unexpected outcome: {:?}",
                step.outcome
            );
        }
        assert_eq!(report.steps[1].command, "echo two");
        assert_eq!(
            report.display,
            "First [Executed: echo one] then [Executed: echo two]"
        );
    }

    #[tokio::test]
    async fn test_execute_loaded_command() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("hello.md"),
            "---\ndescription: say hello\nallowed-tools:\n  - Bash(echo hello)\n---\nSay: !`echo hello`\n",
        )
        .unwrap();
        let registry = load_commands(dir.path());

        let report = execute_command(&registry, "hello").await.unwrap();
        assert_eq!(report.display, "Say: [Executed: echo hello]");
        assert!(matches!(
            &report.steps[0].outcome,
            StepOutcome::Completed { stdout, .. } if stdout == "hello"
        ));
    }

    #[tokio::test]
    async fn test_unknown_command() {
        let registry = CommandRegistry::new();
        assert!(execute_command(&registry, "missing").await.is_none());
    }
}
