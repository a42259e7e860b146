//! LDAP-style search filters.
//!
//! Supports the subset used by the school models: equality, presence,
//! substring (`*` wildcards) and the `&`, `|`, `!` combinators. Filters
//! can be parsed from and rendered to the RFC 4515 string form.

use super::DirectoryObject;
use super::errors::{DirectoryError, DirectoryResult};
use serde_json::Value;
use std::fmt;

/// A parsed search filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    /// All sub-filters must match. An empty list matches everything.
    And(Vec<Filter>),
    /// At least one sub-filter must match.
    Or(Vec<Filter>),
    /// The sub-filter must not match.
    Not(Box<Filter>),
    /// Case-insensitive equality on any value of the property.
    Equal { attribute: String, value: String },
    /// Wildcard match; `parts` are the literal pieces between `*`s.
    Substring { attribute: String, parts: Vec<String> },
    /// The property exists and is not empty.
    Present { attribute: String },
}

impl Filter {
    /// A filter matching every object.
    pub fn everything() -> Self {
        Filter::And(Vec::new())
    }

    /// Equality filter.
    pub fn equal(attribute: impl Into<String>, value: impl Into<String>) -> Self {
        Filter::Equal {
            attribute: attribute.into(),
            value: value.into(),
        }
    }

    /// Wildcard filter from a pattern such as `OU1-*`.
    pub fn wildcard(attribute: impl Into<String>, pattern: &str) -> Self {
        if pattern == "*" {
            return Filter::Present {
                attribute: attribute.into(),
            };
        }
        if !pattern.contains('*') {
            return Filter::equal(attribute, pattern);
        }
        Filter::Substring {
            attribute: attribute.into(),
            parts: pattern.split('*').map(str::to_string).collect(),
        }
    }

    /// Combine with another filter using `&`.
    pub fn and(self, other: Filter) -> Self {
        match self {
            Filter::And(mut filters) => {
                filters.push(other);
                Filter::And(filters)
            }
            filter => Filter::And(vec![filter, other]),
        }
    }

    /// Parse an RFC 4515 filter string. A bare `attr=value` is accepted too.
    pub fn parse(input: &str) -> DirectoryResult<Self> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Ok(Filter::everything());
        }
        let owned;
        let source = if trimmed.starts_with('(') {
            trimmed
        } else {
            owned = format!("({})", trimmed);
            owned.as_str()
        };
        let chars: Vec<char> = source.chars().collect();
        let mut parser = Parser {
            input,
            chars: &chars,
            pos: 0,
        };
        let filter = parser.filter()?;
        if parser.pos != chars.len() {
            return Err(parser.error("trailing characters after filter"));
        }
        Ok(filter)
    }

    /// Evaluate the filter against an object's properties.
    pub fn matches(&self, object: &DirectoryObject) -> bool {
        match self {
            Filter::And(filters) => filters.iter().all(|f| f.matches(object)),
            Filter::Or(filters) => filters.iter().any(|f| f.matches(object)),
            Filter::Not(filter) => !filter.matches(object),
            Filter::Equal { attribute, value } => property_values(object, attribute)
                .iter()
                .any(|v| v.eq_ignore_ascii_case(value)),
            Filter::Substring { attribute, parts } => property_values(object, attribute)
                .iter()
                .any(|v| wildcard_match(&v.to_lowercase(), parts)),
            Filter::Present { attribute } => !property_values(object, attribute).is_empty(),
        }
    }
}

fn property_values(object: &DirectoryObject, attribute: &str) -> Vec<String> {
    let Some(value) = object
        .properties
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(attribute))
        .map(|(_, v)| v)
    else {
        return Vec::new();
    };
    let scalar = |v: &Value| match v {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    };
    match value {
        Value::Array(items) => items.iter().filter_map(scalar).collect(),
        other => scalar(other).into_iter().collect(),
    }
}

fn wildcard_match(value: &str, parts: &[String]) -> bool {
    let parts: Vec<String> = parts.iter().map(|p| p.to_lowercase()).collect();
    let (first, rest) = match parts.split_first() {
        Some(split) => split,
        None => return true,
    };
    let Some(mut remaining) = value.strip_prefix(first.as_str()) else {
        return false;
    };
    let Some((last, middle)) = rest.split_last() else {
        return remaining.is_empty();
    };
    for part in middle {
        match remaining.find(part.as_str()) {
            Some(index) => remaining = &remaining[index + part.len()..],
            None => return false,
        }
    }
    remaining.ends_with(last.as_str())
}

fn escape_filter_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '*' => escaped.push_str("\\2a"),
            '(' => escaped.push_str("\\28"),
            ')' => escaped.push_str("\\29"),
            '\\' => escaped.push_str("\\5c"),
            '\0' => escaped.push_str("\\00"),
            _ => escaped.push(c),
        }
    }
    escaped
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Filter::And(filters) => {
                write!(f, "(&")?;
                for filter in filters {
                    write!(f, "{}", filter)?;
                }
                write!(f, ")")
            }
            Filter::Or(filters) => {
                write!(f, "(|")?;
                for filter in filters {
                    write!(f, "{}", filter)?;
                }
                write!(f, ")")
            }
            Filter::Not(filter) => write!(f, "(!{})", filter),
            Filter::Equal { attribute, value } => {
                write!(f, "({}={})", attribute, escape_filter_value(value))
            }
            Filter::Substring { attribute, parts } => {
                let pattern: Vec<String> = parts.iter().map(|p| escape_filter_value(p)).collect();
                write!(f, "({}={})", attribute, pattern.join("*"))
            }
            Filter::Present { attribute } => write!(f, "({}=*)", attribute),
        }
    }
}

struct Parser<'a> {
    input: &'a str,
    chars: &'a [char],
    pos: usize,
}

impl Parser<'_> {
    fn error(&self, message: &str) -> DirectoryError {
        DirectoryError::invalid_filter(self.input, format!("{} at offset {}", message, self.pos))
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn expect(&mut self, expected: char) -> DirectoryResult<()> {
        if self.peek() == Some(expected) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.error(&format!("expected '{}'", expected)))
        }
    }

    fn filter(&mut self) -> DirectoryResult<Filter> {
        self.expect('(')?;
        let filter = match self.peek() {
            Some('&') => {
                self.pos += 1;
                Filter::And(self.filter_list()?)
            }
            Some('|') => {
                self.pos += 1;
                Filter::Or(self.filter_list()?)
            }
            Some('!') => {
                self.pos += 1;
                Filter::Not(Box::new(self.filter()?))
            }
            Some(_) => self.item()?,
            None => return Err(self.error("unexpected end of filter")),
        };
        self.expect(')')?;
        Ok(filter)
    }

    fn filter_list(&mut self) -> DirectoryResult<Vec<Filter>> {
        let mut filters = Vec::new();
        while self.peek() == Some('(') {
            filters.push(self.filter()?);
        }
        Ok(filters)
    }

    fn item(&mut self) -> DirectoryResult<Filter> {
        let mut attribute = String::new();
        while let Some(c) = self.peek() {
            if c == '=' {
                break;
            }
            if c == '(' || c == ')' {
                return Err(self.error("missing '=' in filter item"));
            }
            attribute.push(c);
            self.pos += 1;
        }
        self.expect('=')?;
        let attribute = attribute.trim().to_string();
        if attribute.is_empty() {
            return Err(self.error("empty attribute name"));
        }

        let mut parts = vec![String::new()];
        while let Some(c) = self.peek() {
            match c {
                ')' => break,
                '(' => return Err(self.error("unescaped '(' in value")),
                '*' => {
                    parts.push(String::new());
                    self.pos += 1;
                }
                '\\' => {
                    let hex: String = self.chars.iter().skip(self.pos + 1).take(2).collect();
                    let byte = u8::from_str_radix(&hex, 16)
                        .map_err(|_| self.error("invalid escape sequence"))?;
                    if let Some(last) = parts.last_mut() {
                        last.push(byte as char);
                    }
                    self.pos += 3;
                }
                _ => {
                    if let Some(last) = parts.last_mut() {
                        last.push(c);
                    }
                    self.pos += 1;
                }
            }
        }

        Ok(match parts.as_slice() {
            [value] => Filter::Equal {
                attribute,
                value: value.clone(),
            },
            [first, second] if first.is_empty() && second.is_empty() => {
                Filter::Present { attribute }
            }
            _ => Filter::Substring { attribute, parts },
        })
    }
}
