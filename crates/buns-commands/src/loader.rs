//! Command file discovery and loading.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::Context;

use crate::frontmatter::parse_command_file;

/// File extension of command files.
pub const COMMAND_EXTENSION: &str = ".md";

/// Where a command definition was found.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandSource {
    /// User-global command (~/.buns/commands/).
    User,
    /// Project-local command (./.claude/commands/).
    Project,
}

/// A loaded command definition.
#[derive(Debug, Clone)]
pub struct CommandDefinition {
    /// Command name (file name without `.md`).
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// Raw `allowed-tools` entries.
    pub allowed_tools: Vec<String>,
    /// Markdown body, trimmed.
    pub body: String,
    /// Source of this command.
    pub source: CommandSource,
    /// File path of the command definition.
    pub file_path: PathBuf,
}

/// Name → definition mapping built once at startup.
#[derive(Debug, Clone, Default)]
pub struct CommandRegistry {
    commands: BTreeMap<String, CommandDefinition>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a definition, returning the one it replaced.
    pub fn insert(&mut self, command: CommandDefinition) -> Option<CommandDefinition> {
        self.commands.insert(command.name.clone(), command)
    }

    pub fn get(&self, name: &str) -> Option<&CommandDefinition> {
        self.commands.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.commands.contains_key(name)
    }

    /// Command names in sorted order.
    pub fn names(&self) -> Vec<&str> {
        self.commands.keys().map(String::as_str).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CommandDefinition> {
        self.commands.values()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

/// Default search directories, lowest priority first.
///
/// 1. User commands (`<config_dir>/commands/`), when a config dir is known
/// 2. Project commands (`<working_dir>/.claude/commands/`)
pub fn default_command_dirs(
    config_dir: Option<&Path>,
    working_dir: &Path,
) -> Vec<(PathBuf, CommandSource)> {
    let mut dirs = Vec::new();
    if let Some(config_dir) = config_dir {
        dirs.push((config_dir.join("commands"), CommandSource::User));
    }
    dirs.push((
        working_dir.join(".claude").join("commands"),
        CommandSource::Project,
    ));
    dirs
}

/// Load commands from a single directory.
///
/// A missing directory yields an empty registry.
pub fn load_commands(dir: &Path) -> CommandRegistry {
    load_commands_from(&[(dir.to_path_buf(), CommandSource::Project)])
}

/// Load commands from multiple directories.
///
/// Later directories have higher priority: a name seen again replaces the
/// earlier definition. Within one directory files are read in name order.
/// Files that fail to read or parse are skipped with a warning.
pub fn load_commands_from(dirs: &[(PathBuf, CommandSource)]) -> CommandRegistry {
    let mut registry = CommandRegistry::new();

    for (dir, source) in dirs {
        if !dir.is_dir() {
            tracing::debug!(dir = %dir.display(), "Commands directory not found");
            continue;
        }

        for file_path in discover_command_files(dir) {
            match load_command_file(&file_path, source.clone()) {
                Ok(command) => {
                    tracing::info!(source = ?source, "Loaded command: {}", command.name);
                    if let Some(previous) = registry.insert(command) {
                        tracing::debug!(
                            command = %previous.name,
                            replaced = %previous.file_path.display(),
                            "Command overridden"
                        );
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        path = %file_path.display(),
                        "Failed to load command: {e:#}"
                    );
                }
            }
        }
    }

    registry
}

/// Discover `*.md` files directly inside `dir`, sorted by file name.
fn discover_command_files(dir: &Path) -> Vec<PathBuf> {
    let entries = match std::fs::read_dir(dir) {
        Ok(e) => e,
        Err(e) => {
            tracing::warn!(dir = %dir.display(), "Failed to read commands directory: {e}");
            return Vec::new();
        }
    };

    let mut files: Vec<PathBuf> = entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && command_name(path).is_some())
        .collect();
    files.sort();
    files
}

/// Derive the command name by stripping the extension from the file name.
fn command_name(path: &Path) -> Option<String> {
    path.file_name()
        .and_then(|n| n.to_str())
        .and_then(|n| n.strip_suffix(COMMAND_EXTENSION))
        .filter(|n| !n.is_empty())
        .map(str::to_string)
}

/// Load a single command file.
fn load_command_file(path: &Path, source: CommandSource) -> anyhow::Result<CommandDefinition> {
    let name = command_name(path).context("not a command file")?;
    let content = std::fs::read_to_string(path).context("read failed")?;
    let (front_matter, body) = parse_command_file(&content)?;

    Ok(CommandDefinition {
        name,
        description: front_matter.description,
        allowed_tools: front_matter.allowed_tools,
        body,
        source,
        file_path: path.to_path_buf(),
    })
}
