mod context;
mod repl;

use clap::{Parser, Subcommand};
use colored::Colorize;

use buns_config::{ConfigStore, SettingsUpdate};

use crate::context::{AppContext, print_commands};

#[derive(Parser)]
#[command(
    name = "buns",
    version,
    about = "Coding assistant with Markdown slash commands"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start interactive mode (the default)
    #[command(alias = "i")]
    Interactive,
    /// List loaded slash commands
    Commands,
    /// Ask the model for help with a coding task
    Task {
        /// What should be done
        #[arg(required = true, num_args = 1..)]
        task: Vec<String>,

        /// Extra context for the task
        #[arg(short, long)]
        context: Option<String>,
    },
    /// Show or change persisted settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective settings (API key masked)
    Show,
    /// Store the Anthropic API key
    SetKey {
        /// API key value
        key: String,
    },
    /// Update model parameters
    Set {
        /// Model ID (e.g. "claude-3-sonnet-20240229")
        #[arg(long)]
        model: Option<String>,

        /// Maximum tokens per reply
        #[arg(long)]
        max_tokens: Option<u32>,

        /// Sampling temperature
        #[arg(long)]
        temperature: Option<f64>,
    },
}

fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut ctx = AppContext::init()?;

    match cli.command.unwrap_or(Commands::Interactive) {
        Commands::Interactive => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(repl::run_interactive(&mut ctx))?;
        }
        Commands::Commands => print_commands(&ctx.commands),
        Commands::Task { task, context } => {
            let prompt = buns_ai::code_task_prompt(&task.join(" "), context.as_deref());
            let rt = tokio::runtime::Runtime::new()?;
            let reply = rt.block_on(ctx.ask(&prompt));
            println!("{reply}");
        }
        Commands::Config { action } => run_config(&mut ctx.config, action),
    }

    Ok(())
}

fn run_config(config: &mut ConfigStore, action: ConfigAction) {
    match action {
        ConfigAction::Show => {
            let settings = config.get();
            println!("{}", format!("Config file: {}", config.path().display()).dimmed());
            println!("  apiKey:      {}", settings.masked_api_key());
            println!("  model:       {}", settings.model);
            println!("  maxTokens:   {}", settings.max_tokens);
            println!("  temperature: {}", settings.temperature);
        }
        ConfigAction::SetKey { key } => {
            config.set_api_key(key);
            println!("API key saved to {}", config.path().display());
        }
        ConfigAction::Set {
            model,
            max_tokens,
            temperature,
        } => {
            if model.is_none() && max_tokens.is_none() && temperature.is_none() {
                println!("{}", "Nothing to update.".yellow());
                return;
            }
            config.set(SettingsUpdate {
                api_key: None,
                model,
                max_tokens,
                temperature,
            });
            println!("Settings saved to {}", config.path().display());
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_no_arguments_means_interactive() {
        let cli = Cli::try_parse_from(["buns"]).unwrap();
        assert!(cli.command.is_none());

        let cli = Cli::try_parse_from(["buns", "i"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Interactive)));
    }

    #[test]
    fn test_task_joins_words() {
        let cli = Cli::try_parse_from(["buns", "task", "write", "a", "parser", "-c", "CSV"]).unwrap();
        match cli.command {
            Some(Commands::Task { task, context }) => {
                assert_eq!(task.join(" "), "write a parser");
                assert_eq!(context.as_deref(), Some("CSV"));
            }
            _ => panic!("expected task subcommand"),
        }
    }

    #[test]
    fn test_config_set_parses_numbers() {
        let cli = Cli::try_parse_from([
            "buns",
            "config",
            "set",
            "--max-tokens",
            "2048",
            "--temperature",
            "0.2",
        ])
        .unwrap();
        match cli.command {
            Some(Commands::Config {
                action:
                    ConfigAction::Set {
                        model,
                        max_tokens,
                        temperature,
                    },
            }) => {
                assert_eq!(model, None);
                assert_eq!(max_tokens, Some(2048));
                assert_eq!(temperature, Some(0.2));
            }
            _ => panic!("expected config set"),
        }
    }
}
