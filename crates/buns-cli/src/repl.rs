use std::io::{self, BufRead, Write};

use anyhow::Result;
use colored::Colorize;

use crate::context::AppContext;

const PROMPT: &str = "buns> ";

/// Inputs that end the session.
fn is_exit(input: &str) -> bool {
    input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit")
}

fn goodbye() {
    println!("{}", "Goodbye!".yellow());
}

/// Run the interactive REPL.
pub async fn run_interactive(ctx: &mut AppContext) -> Result<()> {
    println!("{}", "Buns Interactive Mode".blue());
    println!("Type a command name, /commands, or a question. Type 'exit' or Ctrl+D to quit.\n");

    // Ctrl+C ends the process immediately, even mid-command.
    tokio::spawn(async {
        if tokio::signal::ctrl_c().await.is_ok() {
            println!();
            goodbye();
            std::process::exit(0);
        }
    });

    let stdin = io::stdin();
    loop {
        print!("{}", PROMPT.green());
        io::stdout().flush()?;

        let mut line = String::new();
        let bytes = stdin.lock().read_line(&mut line)?;
        if bytes == 0 {
            // EOF (Ctrl+D)
            println!();
            break;
        }

        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if is_exit(input) {
            break;
        }

        ctx.process_input(input).await;
    }

    goodbye();
    Ok(())
}
