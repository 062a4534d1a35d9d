//! buns-commands: slash command loading and execution.
//!
//! Commands are Markdown files with YAML front matter. The file name (minus
//! `.md`) is the command name. Inline ``!`shell` `` tokens in the body are run
//! when the command executes, gated by `allowed-tools`.
//!
//! # Command file format
//!
//! ```markdown
//! ---
//! description: Show repository status
//! allowed-tools:
//!   - Bash(git status)
//!   - Bash(git diff:*)
//! ---
//!
//! Current status: !`git status`
//! ```

pub mod allowlist;
pub mod executor;
pub mod frontmatter;
pub mod loader;
pub mod shell;

pub use allowlist::{AllowList, AllowListEntry, ToolPattern};
pub use executor::{ExecutionReport, ExecutionStep, StepOutcome, execute_body, execute_command};
pub use frontmatter::{FrontMatter, ParseError, parse_command_file};
pub use loader::{
    CommandDefinition, CommandRegistry, CommandSource, default_command_dirs, load_commands,
    load_commands_from,
};
pub use shell::{ShellToken, render_executed, scan_shell_tokens};
