//! `allowed-tools` entries and the shell-command permission check.
//!
//! An entry is either a bare name (`git`), the wildcard `*`, or
//! `Tool(pattern)` such as `Bash(git status)` or `Bash(git add:*)`.
//!
//! A command is permitted when the list is empty, or when any entry's tool
//! name is a literal prefix of the command, its pattern is `*`, or its
//! pattern matches the command.

/// The parenthesised part of an allow-list entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolPattern {
    /// No parentheses.
    None,
    /// `(*)`, or the bare `*` entry.
    Wildcard,
    /// Trailing-`*` glob: `git *`, `git add:*`. Holds the text before the `*`,
    /// minus a trailing `:`.
    Prefix(String),
    /// Anything else must equal the command.
    Exact(String),
}

/// One parsed `allowed-tools` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllowListEntry {
    pub tool_name: String,
    pub pattern: ToolPattern,
}

impl AllowListEntry {
    /// Split on the first `(` and strip a trailing `)`.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if raw == "*" {
            return Self {
                tool_name: String::new(),
                pattern: ToolPattern::Wildcard,
            };
        }

        let Some((tool_name, rest)) = raw.split_once('(') else {
            return Self {
                tool_name: raw.to_string(),
                pattern: ToolPattern::None,
            };
        };

        let pattern = rest.strip_suffix(')').unwrap_or(rest);
        let pattern = if pattern == "*" {
            ToolPattern::Wildcard
        } else if let Some(prefix) = pattern.strip_suffix('*') {
            let prefix = prefix.strip_suffix(':').unwrap_or(prefix);
            ToolPattern::Prefix(prefix.to_string())
        } else {
            ToolPattern::Exact(pattern.to_string())
        };

        Self {
            tool_name: tool_name.to_string(),
            pattern,
        }
    }

    pub fn permits(&self, command: &str) -> bool {
        if command.starts_with(&self.tool_name) {
            return true;
        }
        match &self.pattern {
            ToolPattern::None => false,
            ToolPattern::Wildcard => true,
            ToolPattern::Prefix(prefix) => command.starts_with(prefix.as_str()),
            ToolPattern::Exact(exact) => command == exact,
        }
    }
}

/// Parsed `allowed-tools` list of one command.
#[derive(Debug, Clone, Default)]
pub struct AllowList {
    entries: Vec<AllowListEntry>,
}

impl AllowList {
    pub fn new<S: AsRef<str>>(tools: &[S]) -> Self {
        Self {
            entries: tools
                .iter()
                .map(|t| AllowListEntry::parse(t.as_ref()))
                .collect(),
        }
    }

    pub fn entries(&self) -> &[AllowListEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Check whether `command` may run. An empty list permits everything.
    pub fn is_allowed(&self, command: &str) -> bool {
        self.entries.is_empty() || self.entries.iter().any(|e| e.permits(command))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_entries() {
        assert_eq!(
            AllowListEntry::parse("Bash(git status)"),
            AllowListEntry {
                tool_name: "Bash".into(),
                pattern: ToolPattern::Exact("git status".into()),
            }
        );
        assert_eq!(
            AllowListEntry::parse("Bash(git add:*)").pattern,
            ToolPattern::Prefix("git add".into())
        );
        assert_eq!(
            AllowListEntry::parse("Bash(git *)").pattern,
            ToolPattern::Prefix("git ".into())
        );
        assert_eq!(AllowListEntry::parse("Bash(*)").pattern, ToolPattern::Wildcard);
        assert_eq!(
            AllowListEntry::parse("git"),
            AllowListEntry {
                tool_name: "git".into(),
                pattern: ToolPattern::None,
            }
        );
        assert_eq!(
            AllowListEntry::parse("*"),
            AllowListEntry {
                tool_name: String::new(),
                pattern: ToolPattern::Wildcard,
            }
        );
    }

    #[test]
    fn test_glob_pattern() {
        let list = AllowList::new(&["Bash(git *)"]);
        assert!(list.is_allowed("git status"));
        assert!(!list.is_allowed("rm -rf /"));
    }

    #[test]
    fn test_exact_pattern() {
        let list = AllowList::new(&["Bash(git status)"]);
        assert!(list.is_allowed("git status"));
        assert!(!list.is_allowed("git push"));
    }

    #[test]
    fn test_empty_list_permits_everything() {
        let list = AllowList::new::<&str>(&[]);
        assert!(list.is_empty());
        assert!(list.is_allowed("rm -rf /"));
    }

    #[test]
    fn test_bare_wildcard_permits_everything() {
        let list = AllowList::new(&["*"]);
        assert!(list.is_allowed("anything at all"));
    }

    #[test]
    fn test_tool_name_prefix() {
        let list = AllowList::new(&["echo"]);
        assert!(list.is_allowed("echo hi"));
        assert!(!list.is_allowed("cat file"));
    }

    #[test]
    fn test_any_entry_wins() {
        let list = AllowList::new(&["Bash(ls)", "Bash(date)", "Bash(git log:*)"]);
        assert!(list.is_allowed("date"));
        assert!(list.is_allowed("git log --oneline"));
        assert!(!list.is_allowed("git push"));
    }
}
