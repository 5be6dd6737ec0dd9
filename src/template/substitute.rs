use crate::template::payload::Payload;
use serde_json::Value;

const OPEN: &str = "field-ref(";
const QUOTES: [char; 3] = ['"', '\'', '`'];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placeholder<'a> {
    pub name: &'a str,
    pub default: Option<&'a str>,
}

impl Placeholder<'_> {
    fn resolve(&self, record: &Payload) -> String {
        match record.get(self.name) {
            Some(value) => value_text(value),
            None => self.default.map(str::to_string).unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Malformed {
    #[error("missing closing parenthesis")]
    Unterminated,
    #[error("empty field name")]
    EmptyName,
    #[error("field name contains unsupported characters")]
    InvalidName,
    #[error("quoted default is never closed")]
    UnterminatedQuote,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatternIssue {
    pub offset: usize,
    pub reason: Malformed,
}

pub fn substitute(pattern: &str, record: &Payload) -> String {
    let mut out = String::with_capacity(pattern.len());
    let mut rest = pattern;
    while let Some(start) = rest.find(OPEN) {
        out.push_str(&rest[..start]);
        let after = &rest[start + OPEN.len()..];
        match parse_placeholder(after) {
            Ok((placeholder, consumed)) => {
                out.push_str(&placeholder.resolve(record));
                rest = &after[consumed..];
            }
            Err(_) => {
                out.push_str(OPEN);
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

pub fn placeholders(pattern: &str) -> Vec<Placeholder<'_>> {
    let mut found = Vec::new();
    let mut rest = pattern;
    while let Some(start) = rest.find(OPEN) {
        let after = &rest[start + OPEN.len()..];
        match parse_placeholder(after) {
            Ok((placeholder, consumed)) => {
                found.push(placeholder);
                rest = &after[consumed..];
            }
            Err(_) => rest = after,
        }
    }
    found
}

pub fn lint(pattern: &str) -> Vec<PatternIssue> {
    let mut issues = Vec::new();
    let mut offset = 0;
    while let Some(start) = pattern[offset..].find(OPEN) {
        let at = offset + start;
        let after = &pattern[at + OPEN.len()..];
        match parse_placeholder(after) {
            Ok((_, consumed)) => offset = at + OPEN.len() + consumed,
            Err(reason) => {
                issues.push(PatternIssue { offset: at, reason });
                offset = at + OPEN.len();
            }
        }
    }
    issues
}

fn parse_placeholder(input: &str) -> Result<(Placeholder<'_>, usize), Malformed> {
    let name_end = input
        .find([',', ')', '(', '\n'])
        .ok_or(Malformed::Unterminated)?;
    let name = input[..name_end].trim();
    match input[name_end..].chars().next() {
        Some(',') | Some(')') => {}
        _ => return Err(Malformed::Unterminated),
    }
    if name.is_empty() {
        return Err(Malformed::EmptyName);
    }
    if !name
        .chars()
        .all(|ch| ch.is_alphanumeric() || matches!(ch, '_' | '-' | '.' | '$'))
    {
        return Err(Malformed::InvalidName);
    }

    if input[name_end..].starts_with(')') {
        return Ok((
            Placeholder {
                name,
                default: None,
            },
            name_end + 1,
        ));
    }

    let default_start = name_end + 1;
    let default_src = &input[default_start..];
    let leading = default_src.len() - default_src.trim_start().len();
    let default_src = default_src.trim_start();

    if let Some(quote) = default_src.chars().next().filter(|ch| QUOTES.contains(ch)) {
        let inner = &default_src[quote.len_utf8()..];
        let close = inner.find(quote).ok_or(Malformed::UnterminatedQuote)?;
        let value = &inner[..close];
        let tail = &inner[close + quote.len_utf8()..];
        let tail_trimmed = tail.trim_start();
        if !tail_trimmed.starts_with(')') {
            return Err(Malformed::Unterminated);
        }
        let consumed = default_start
            + leading
            + quote.len_utf8()
            + close
            + quote.len_utf8()
            + (tail.len() - tail_trimmed.len())
            + 1;
        return Ok((
            Placeholder {
                name,
                default: Some(value),
            },
            consumed,
        ));
    }

    let close = default_src
        .find([')', '(', '\n'])
        .ok_or(Malformed::Unterminated)?;
    if !default_src[close..].starts_with(')') {
        return Err(Malformed::Unterminated);
    }
    let value = strip_quotes(default_src[..close].trim());
    Ok((
        Placeholder {
            name,
            default: Some(value),
        },
        default_start + leading + close + 1,
    ))
}

fn strip_quotes(value: &str) -> &str {
    for quote in QUOTES {
        if let Some(inner) = value
            .strip_prefix(quote)
            .and_then(|rest| rest.strip_suffix(quote))
        {
            return inner;
        }
    }
    value
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Number(number) => number.to_string(),
        Value::Bool(flag) => flag.to_string(),
        Value::Null => String::new(),
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}
