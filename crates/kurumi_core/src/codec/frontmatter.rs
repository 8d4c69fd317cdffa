//! Minimal front matter reader and writer.
//!
//! Front matter is a `---` delimited block of `key: value` lines at the top of
//! a markdown file. Values are plain strings or bracketed lists
//! (`[a, "b"]`). Double-quoted values may escape `"` and `\` with a
//! backslash. Nested structures and multi-line values are not supported.

use indexmap::IndexMap;

/// A front matter value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrontmatterValue {
    Scalar(String),
    List(Vec<String>),
}

impl FrontmatterValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FrontmatterValue::Scalar(s) => Some(s),
            FrontmatterValue::List(_) => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            FrontmatterValue::List(items) => Some(items),
            FrontmatterValue::Scalar(_) => None,
        }
    }
}

/// Result of parsing a markdown file with front matter.
#[derive(Debug, Clone, Default)]
pub struct ParsedFile {
    /// Front matter entries in file order.
    pub frontmatter: IndexMap<String, FrontmatterValue>,
    /// Everything after the closing delimiter.
    pub body: String,
}

impl ParsedFile {
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.frontmatter
            .get(key)
            .and_then(FrontmatterValue::as_str)
            .filter(|s| !s.is_empty())
    }

    pub fn get_list(&self, key: &str) -> Option<&[String]> {
        self.frontmatter.get(key).and_then(FrontmatterValue::as_list)
    }
}

/// Strip surrounding quotes. Double-quoted values honour `\"` and `\\`.
fn unquote(value: &str) -> String {
    let bytes = value.as_bytes();
    if bytes.len() < 2 || bytes[0] != bytes[bytes.len() - 1] {
        return value.to_string();
    }
    let inner = &value[1..value.len() - 1];
    match bytes[0] {
        b'\'' => inner.to_string(),
        b'"' => unescape(inner),
        _ => value.to_string(),
    }
}

fn unescape(inner: &str) -> String {
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some(next @ ('"' | '\\')) => out.push(next),
            // Unknown escapes stay literal.
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

fn escape(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Split a bracketed list body on commas outside quotes.
fn split_items(inner: &str) -> Vec<&str> {
    let mut items = Vec::new();
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut start = 0;

    for (i, c) in inner.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match (quote, c) {
            (Some('"'), '\\') => escaped = true,
            (Some(q), c) if c == q => quote = None,
            (None, '"' | '\'') => quote = Some(c),
            (None, ',') => {
                items.push(&inner[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    items.push(&inner[start..]);
    items
}

fn parse_value(raw: &str) -> FrontmatterValue {
    let raw = raw.trim();
    if raw.len() >= 2 && raw.starts_with('[') && raw.ends_with(']') {
        let items = split_items(&raw[1..raw.len() - 1])
            .into_iter()
            .map(|item| unquote(item.trim()))
            .filter(|item| !item.is_empty())
            .collect();
        FrontmatterValue::List(items)
    } else {
        FrontmatterValue::Scalar(unquote(raw))
    }
}

/// Lines with their byte offset just past the line terminator.
fn lines_with_end(content: &str) -> impl Iterator<Item = (&str, usize)> {
    content.split_inclusive('\n').scan(0, |offset, line| {
        *offset += line.len();
        let text = line.strip_suffix('\n').unwrap_or(line);
        Some((text.strip_suffix('\r').unwrap_or(text), *offset))
    })
}

/// Split content into front matter and body.
///
/// Content without a complete front matter block is returned whole as the
/// body with empty front matter. Delimiters may end in `\n` or `\r\n`; the
/// body is returned byte for byte.
pub fn parse_or_empty(content: &str) -> ParsedFile {
    let whole = || ParsedFile {
        frontmatter: IndexMap::new(),
        body: content.to_string(),
    };

    // Delimiter lines need a terminator of their own.
    let is_delimiter = |line: &str, end: usize| line == "---" && content[..end].ends_with('\n');

    let mut lines = lines_with_end(content);
    match lines.next() {
        Some((line, end)) if is_delimiter(line, end) => {}
        _ => return whole(),
    }

    let mut block = Vec::new();
    let mut body_start = None;
    for (line, end) in lines {
        if is_delimiter(line, end) {
            body_start = Some(end);
            break;
        }
        block.push(line);
    }
    let Some(body_start) = body_start else {
        return whole();
    };

    let frontmatter = block
        .into_iter()
        .filter_map(|line| {
            let (key, value) = line.split_once(':')?;
            let key = key.trim();
            (!key.is_empty()).then(|| (key.to_string(), parse_value(value)))
        })
        .collect();

    ParsedFile {
        frontmatter,
        body: content[body_start..].to_string(),
    }
}

/// Render front matter and body back into markdown.
pub fn serialize(frontmatter: &IndexMap<String, FrontmatterValue>, body: &str) -> String {
    let mut out = String::from("---\n");
    for (key, value) in frontmatter {
        out.push_str(key);
        out.push_str(": ");
        match value {
            FrontmatterValue::Scalar(s) => out.push_str(&s.replace(['\r', '\n'], " ")),
            FrontmatterValue::List(items) => {
                let quoted: Vec<String> = items
                    .iter()
                    .map(|i| format!("\"{}\"", escape(&i.replace(['\r', '\n'], " "))))
                    .collect();
                out.push('[');
                out.push_str(&quoted.join(", "));
                out.push(']');
            }
        }
        out.push('\n');
    }
    out.push_str("---\n");
    out.push_str(body);
    out
}

/// Wrap a scalar in double quotes so leading/trailing spaces and brackets survive.
pub fn quoted(value: &str) -> FrontmatterValue {
    FrontmatterValue::Scalar(format!("\"{}\"", escape(value)))
}
