use anyhow::{Context, Result};
use colored::Colorize;

use buns_ai::QueryForwarder;
use buns_commands::{CommandRegistry, default_command_dirs, execute_command, load_commands_from};
use buns_config::ConfigStore;

/// Everything the entry points share, built once at startup.
pub struct AppContext {
    pub config: ConfigStore,
    pub commands: CommandRegistry,
    pub forwarder: QueryForwarder,
}

/// How a line of user input is handled.
#[derive(Debug, PartialEq)]
pub enum Dispatch {
    /// Run the loaded command with this name.
    Command(String),
    /// Print the loaded commands.
    ListCommands,
    /// Send the line to the model.
    Query,
}

impl AppContext {
    /// Load settings and commands from their default locations.
    pub fn init() -> Result<Self> {
        let config = ConfigStore::init().context("Failed to initialise config")?;
        let working_dir = std::env::current_dir().context("Failed to get current directory")?;
        let config_dir = buns_config::config_dir().ok();

        let commands =
            load_commands_from(&default_command_dirs(config_dir.as_deref(), &working_dir));
        tracing::debug!(count = commands.len(), "Commands loaded");

        Ok(Self::new(config, commands))
    }

    pub fn new(config: ConfigStore, commands: CommandRegistry) -> Self {
        Self {
            config,
            commands,
            forwarder: QueryForwarder::new(),
        }
    }

    /// Decide what to do with a non-empty input line.
    ///
    /// Loaded commands match by bare name or `/name` and shadow the
    /// built-in `/commands` and `/help`.
    pub fn classify(&self, input: &str) -> Dispatch {
        let name = input.strip_prefix('/').unwrap_or(input);
        if self.commands.contains(input) {
            return Dispatch::Command(input.to_string());
        }
        if self.commands.contains(name) {
            return Dispatch::Command(name.to_string());
        }
        match input {
            "/commands" | "/help" => Dispatch::ListCommands,
            _ => Dispatch::Query,
        }
    }

    /// Handle one line of input and return how it was dispatched.
    /// Failures are reported, never returned.
    pub async fn process_input(&mut self, input: &str) -> Dispatch {
        let dispatch = self.classify(input);
        match &dispatch {
            Dispatch::Command(name) => {
                execute_command(&self.commands, name).await;
            }
            Dispatch::ListCommands => print_commands(&self.commands),
            Dispatch::Query => {
                println!("{}", "Processing with AI...".blue());
                let reply = self.ask(input).await;
                println!("{reply}");
            }
        }
        dispatch
    }

    /// Forward `query` using the current settings.
    pub async fn ask(&mut self, query: &str) -> String {
        let settings = self.config.get();
        self.forwarder.process_query(&settings, query).await
    }
}

/// Print loaded commands with their descriptions.
pub fn print_commands(commands: &CommandRegistry) {
    if commands.is_empty() {
        println!(
            "{}",
            "No commands loaded. Add Markdown files to .claude/commands/.".dimmed()
        );
        return;
    }

    println!("{}", "Available commands:".blue());
    for command in commands.iter() {
        println!("  /{:<20} {}", command.name, command.description.dimmed());
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use buns_commands::{CommandDefinition, CommandSource};

    use super::*;

    fn context_with(names: &[&str]) -> (AppContext, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let config = ConfigStore::init_at(dir.path(), None).unwrap();
        let mut commands = CommandRegistry::new();
        for name in names {
            commands.insert(CommandDefinition {
                name: name.to_string(),
                description: format!("{name} description"),
                allowed_tools: vec![],
                body: String::new(),
                source: CommandSource::Project,
                file_path: PathBuf::from(format!("{name}.md")),
            });
        }
        (AppContext::new(config, commands), dir)
    }

    #[test]
    fn test_classify_commands() {
        let (ctx, _dir) = context_with(&["status", "help"]);
        assert_eq!(ctx.classify("status"), Dispatch::Command("status".into()));
        assert_eq!(ctx.classify("/status"), Dispatch::Command("status".into()));
        // A user command named `help` shadows the built-in.
        assert_eq!(ctx.classify("/help"), Dispatch::Command("help".into()));
        assert_eq!(ctx.classify("/commands"), Dispatch::ListCommands);
    }

    #[test]
    fn test_classify_queries() {
        let (ctx, _dir) = context_with(&["status"]);
        assert_eq!(ctx.classify("what is the status?"), Dispatch::Query);
        assert_eq!(ctx.classify("Status"), Dispatch::Query);
        assert_eq!(ctx.classify("/unknown"), Dispatch::Query);
    }

    #[tokio::test]
    async fn test_process_input_runs_command_body() {
        let (mut ctx, dir) = context_with(&[]);
        let marker = dir.path().join("touched");
        ctx.commands.insert(CommandDefinition {
            name: "touch".into(),
            description: "create the marker".into(),
            allowed_tools: vec!["Bash(touch:*)".into()],
            body: format!("Create it: !`touch {}`", marker.display()),
            source: CommandSource::Project,
            file_path: PathBuf::from("touch.md"),
        });

        let dispatch = ctx.process_input("/touch").await;
        assert_eq!(dispatch, Dispatch::Command("touch".into()));
        assert!(marker.exists());

        assert_eq!(ctx.process_input("/commands").await, Dispatch::ListCommands);
    }

    #[tokio::test]
    async fn test_process_input_forwards_queries() {
        let (mut ctx, _dir) = context_with(&["touch"]);
        assert_eq!(ctx.process_input("touch the file please").await, Dispatch::Query);
    }

    #[tokio::test]
    async fn test_ask_without_key_reports_error() {
        let (mut ctx, _dir) = context_with(&[]);
        let reply = ctx.ask("hello").await;
        assert!(reply.starts_with("Error: Anthropic API key not found"));
    }
}
