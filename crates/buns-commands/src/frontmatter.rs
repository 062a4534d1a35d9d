//! Command file parser: `---` fenced front matter followed by a Markdown body.

use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;

/// Marker separating front matter from the body.
pub const DELIMITER: &str = "---";

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ParseError {
    #[error("no front matter (expected content fenced by `---`)")]
    MissingFrontMatter,
    #[error("malformed front matter at line {line}: {reason}")]
    Malformed { line: usize, reason: String },
    #[error("missing required field `{0}`")]
    MissingField(&'static str),
    #[error("invalid front matter field: {0}")]
    InvalidField(String),
}

/// Validated front matter of a command file.
#[derive(Debug, Clone, PartialEq)]
pub struct FrontMatter {
    /// Human-readable description.
    pub description: String,
    /// Raw `allowed-tools` entries, in declaration order.
    pub allowed_tools: Vec<String>,
}

/// Front matter as written, before required fields are checked.
#[derive(Debug, Default, Deserialize)]
struct RawFrontMatter {
    #[serde(default)]
    description: Option<String>,
    #[serde(default, rename = "allowed-tools")]
    allowed_tools: Option<ToolList>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ToolList {
    One(String),
    Many(Vec<String>),
}

/// Parse a command file into its front matter and trimmed body.
///
/// The content is split on every `---`. Fewer than three segments means the
/// file has no front matter. Everything after the second delimiter is joined
/// back together, so `---` inside the body survives.
pub fn parse_command_file(content: &str) -> Result<(FrontMatter, String), ParseError> {
    let segments: Vec<&str> = content.split(DELIMITER).collect();
    if segments.len() < 3 {
        return Err(ParseError::MissingFrontMatter);
    }

    let front_matter = parse_front_matter(segments[1].trim())?;
    let body = segments[2..].join(DELIMITER).trim().to_string();
    Ok((front_matter, body))
}

/// Parse and validate the block between the first two delimiters.
pub fn parse_front_matter(yaml: &str) -> Result<FrontMatter, ParseError> {
    let map = parse_mapping(yaml)?;
    let raw: RawFrontMatter = serde_json::from_value(Value::Object(map))
        .map_err(|e| ParseError::InvalidField(e.to_string()))?;

    let description = raw
        .description
        .filter(|d| !d.trim().is_empty())
        .ok_or(ParseError::MissingField("description"))?;

    let allowed_tools = match raw.allowed_tools {
        None => Vec::new(),
        Some(ToolList::One(tools)) => split_top_level(&tools),
        Some(ToolList::Many(tools)) => tools,
    };

    Ok(FrontMatter {
        description,
        allowed_tools,
    })
}

/// Parse the supported YAML subset into a JSON object.
///
/// Supported: `key: value` scalars, `[a, b]` inline sequences, `key:`
/// followed by `- item` lines, and `|` / `>` block scalars. Scalars are
/// always strings.
fn parse_mapping(yaml: &str) -> Result<Map<String, Value>, ParseError> {
    let lines: Vec<&str> = yaml.lines().collect();
    let mut map = Map::new();
    // Key whose block sequence is still accepting `- item` lines.
    let mut open_list: Option<String> = None;
    let mut idx = 0;

    while idx < lines.len() {
        let raw_line = lines[idx];
        let line = idx + 1;
        idx += 1;

        let trimmed = raw_line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        if let Some(item) = list_item(trimmed) {
            let Some(key) = open_list.as_ref() else {
                return Err(malformed(line, "list item without a preceding key"));
            };
            if let Some(Value::Array(items)) = map.get_mut(key) {
                items.push(Value::String(parse_scalar(item, line)?));
            }
            continue;
        }

        if raw_line.starts_with([' ', '\t']) && open_list.is_some() {
            return Err(malformed(line, "nested mappings are not supported"));
        }

        let Some((key, value)) = trimmed.split_once(':') else {
            return Err(malformed(line, "expected `key: value`"));
        };
        let key = key.trim();
        if key.is_empty() {
            return Err(malformed(line, "empty key"));
        }

        close_list(&mut map, open_list.take());

        let value = value.trim();
        if value.is_empty() {
            map.insert(key.to_string(), Value::Array(Vec::new()));
            open_list = Some(key.to_string());
        } else if let Some(style) = BlockStyle::parse(value) {
            let end = block_end(&lines, idx, indent_of(raw_line));
            map.insert(key.to_string(), Value::String(style.fold(&lines[idx..end])));
            idx = end;
        } else {
            map.insert(key.to_string(), parse_value(value, line)?);
        }
    }

    close_list(&mut map, open_list);
    Ok(map)
}

/// Header of a block scalar: `|` keeps line breaks, `>` folds them into
/// spaces. A trailing `-` strips the final newline, `+` keeps trailing blanks.
#[derive(Debug, Clone, Copy, PartialEq)]
struct BlockStyle {
    literal: bool,
    chomp: Chomp,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Chomp {
    Clip,
    Strip,
    Keep,
}

impl BlockStyle {
    fn parse(header: &str) -> Option<Self> {
        let mut chars = header.chars();
        let literal = match chars.next()? {
            '|' => true,
            '>' => false,
            _ => return None,
        };
        let chomp = match chars.as_str() {
            "" => Chomp::Clip,
            "-" => Chomp::Strip,
            "+" => Chomp::Keep,
            _ => return None,
        };
        Some(Self { literal, chomp })
    }

    /// Build the scalar from the block's raw lines.
    fn fold(self, block: &[&str]) -> String {
        let indent = block
            .iter()
            .filter(|l| !l.trim().is_empty())
            .map(|l| indent_of(l))
            .min()
            .unwrap_or(0);
        let content: Vec<&str> = block
            .iter()
            .map(|l| if l.trim().is_empty() { "" } else { &l[indent..] })
            .collect();

        let last = content.iter().rposition(|l| !l.is_empty());
        let (text_lines, trailing_blanks) = match last {
            Some(last) => (&content[..=last], content.len() - last - 1),
            None => (&content[..0], content.len()),
        };

        let mut text = if self.literal {
            text_lines.join("\n")
        } else {
            fold_lines(text_lines)
        };

        if text.is_empty() {
            return text;
        }
        match self.chomp {
            Chomp::Strip => {}
            Chomp::Clip => text.push('\n'),
            Chomp::Keep => text.push_str(&"\n".repeat(trailing_blanks + 1)),
        }
        text
    }
}

/// Join folded lines: single breaks become spaces, blank lines become breaks.
fn fold_lines(lines: &[&str]) -> String {
    let mut text = String::new();
    let mut pending_breaks = 0;
    for line in lines {
        if line.is_empty() {
            pending_breaks += 1;
            continue;
        }
        if !text.is_empty() {
            if pending_breaks > 0 {
                text.push_str(&"\n".repeat(pending_breaks));
            } else {
                text.push(' ');
            }
        }
        pending_breaks = 0;
        text.push_str(line);
    }
    text
}

/// Index one past the last line belonging to a block that starts at `start`
/// under a key indented by `key_indent`.
fn block_end(lines: &[&str], start: usize, key_indent: usize) -> usize {
    let mut end = start;
    let mut idx = start;
    while idx < lines.len() {
        let line = lines[idx];
        if line.trim().is_empty() {
            idx += 1;
            continue;
        }
        if indent_of(line) <= key_indent {
            break;
        }
        idx += 1;
        end = idx;
    }
    // Trailing blank lines belong to the block too, for `+` chomping.
    while end < lines.len() && end < idx && lines[end].trim().is_empty() {
        end += 1;
    }
    end
}

fn indent_of(line: &str) -> usize {
    line.len() - line.trim_start_matches([' ', '\t']).len()
}

/// Split on commas that are not inside parentheses or quotes, so
/// `Bash(git add:*), Bash(git status:*)` yields two entries.
fn split_top_level(list: &str) -> Vec<String> {
    let mut items = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut current = String::new();

    for ch in list.chars() {
        match (quote, ch) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') if depth == 0 => quote = Some(ch),
            (None, '(') => depth += 1,
            (None, ')') => depth = depth.saturating_sub(1),
            (None, ',') if depth == 0 => {
                items.push(std::mem::take(&mut current));
                continue;
            }
            _ => {}
        }
        current.push(ch);
    }
    items.push(current);

    items
        .into_iter()
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}

/// A `key:` with no following items has no value at all.
fn close_list(map: &mut Map<String, Value>, key: Option<String>) {
    let Some(key) = key else { return };
    if map.get(&key).is_some_and(|v| v.as_array().is_some_and(Vec::is_empty)) {
        map.insert(key, Value::Null);
    }
}

fn list_item(trimmed: &str) -> Option<&str> {
    if trimmed == "-" {
        Some("")
    } else {
        trimmed.strip_prefix("- ")
    }
}

fn parse_value(value: &str, line: usize) -> Result<Value, ParseError> {
    if let Some(inner) = value.strip_prefix('[') {
        let inner = inner
            .strip_suffix(']')
            .ok_or_else(|| malformed(line, "unterminated inline sequence"))?;
        let items = split_top_level(inner)
            .iter()
            .map(|s| parse_scalar(s, line).map(Value::String))
            .collect::<Result<Vec<_>, _>>()?;
        return Ok(Value::Array(items));
    }
    Ok(Value::String(parse_scalar(value, line)?))
}

/// Remove matching surrounding quotes.
fn parse_scalar(value: &str, line: usize) -> Result<String, ParseError> {
    let value = value.trim();
    for quote in ['"', '\''] {
        if let Some(rest) = value.strip_prefix(quote) {
            return rest
                .strip_suffix(quote)
                .map(str::to_string)
                .ok_or_else(|| malformed(line, "unterminated quoted string"));
        }
    }
    Ok(value.to_string())
}

fn malformed(line: usize, reason: &str) -> ParseError {
    ParseError::Malformed {
        line,
        reason: reason.to_string(),
    }
}
