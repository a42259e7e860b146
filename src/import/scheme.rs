//! Scheme templates for generated attribute values.
//!
//! A template mixes literal text with placeholders:
//!
//! - `<firstname>` inserts an attribute value
//! - `<lastname:lower,umlauts>` applies tags to one value
//! - `<firstname>[0]`, `<lastname>[:3]`, `<x>[-2:]` slice the value by
//!   characters with Python semantics
//! - `<:lower>` applies tags to the whole result
//! - `[ALWAYSCOUNTER]` and `[COUNTER2]` mark where a username counter goes
//!
//! ```rust
//! use kelvin_school::import::Scheme;
//!
//! let scheme = Scheme::parse("<:lower>test.<firstname>[:2].<lastname>[:3]").unwrap();
//! let rendered = scheme
//!     .render(|attribute| match attribute {
//!         "firstname" => Some("Anna".to_string()),
//!         "lastname" => Some("Miller".to_string()),
//!         _ => None,
//!     })
//!     .unwrap();
//! assert_eq!(rendered.to_string(), "test.an.mil");
//! ```

use crate::error::{KelvinError, KelvinResult};
use std::fmt;

const ALWAYS_COUNTER: &str = "ALWAYSCOUNTER";
const COUNTER2: &str = "COUNTER2";

/// Counter variants for usernames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Counter {
    /// Always appended, starting at 1.
    Always,
    /// Empty for the first name, then 2, 3, ...
    FromSecond,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tag {
    Lower,
    Upper,
    Umlauts,
    Alphanum,
    Strip,
}

impl Tag {
    fn parse(raw: &str) -> KelvinResult<Self> {
        match raw.trim() {
            "lower" => Ok(Tag::Lower),
            "upper" => Ok(Tag::Upper),
            "umlauts" => Ok(Tag::Umlauts),
            "alphanum" => Ok(Tag::Alphanum),
            "strip" => Ok(Tag::Strip),
            other => Err(KelvinError::initialisation(format!(
                "Unknown scheme tag {:?}.",
                other
            ))),
        }
    }

    fn apply(self, value: &str) -> String {
        match self {
            Tag::Lower => value.to_lowercase(),
            Tag::Upper => value.to_uppercase(),
            Tag::Umlauts => replace_umlauts(value),
            Tag::Alphanum => value.chars().filter(char::is_ascii_alphanumeric).collect(),
            Tag::Strip => value.split_whitespace().collect::<Vec<_>>().join(" "),
        }
    }
}

fn replace_umlauts(value: &str) -> String {
    let mut result = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            'ä' => result.push_str("ae"),
            'ö' => result.push_str("oe"),
            'ü' => result.push_str("ue"),
            'Ä' => result.push_str("Ae"),
            'Ö' => result.push_str("Oe"),
            'Ü' => result.push_str("Ue"),
            'ß' => result.push_str("ss"),
            'à' | 'á' | 'â' | 'ã' | 'å' => result.push('a'),
            'À' | 'Á' | 'Â' | 'Ã' | 'Å' => result.push('A'),
            'è' | 'é' | 'ê' | 'ë' => result.push('e'),
            'È' | 'É' | 'Ê' | 'Ë' => result.push('E'),
            'ì' | 'í' | 'î' | 'ï' => result.push('i'),
            'Ì' | 'Í' | 'Î' | 'Ï' => result.push('I'),
            'ò' | 'ó' | 'ô' | 'õ' | 'ø' => result.push('o'),
            'Ò' | 'Ó' | 'Ô' | 'Õ' | 'Ø' => result.push('O'),
            'ù' | 'ú' | 'û' => result.push('u'),
            'Ù' | 'Ú' | 'Û' => result.push('U'),
            'ç' => result.push('c'),
            'Ç' => result.push('C'),
            'ñ' => result.push('n'),
            'Ñ' => result.push('N'),
            other => result.push(other),
        }
    }
    result
}

fn apply_tags(tags: &[Tag], value: &str) -> String {
    tags.iter().fold(value.to_string(), |acc, tag| tag.apply(&acc))
}

/// Character slice `[start:end]` or single index `[i]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slice {
    Index(isize),
    Range(Option<isize>, Option<isize>),
}

impl Slice {
    fn parse(raw: &str) -> Option<Self> {
        let bound = |s: &str| -> Option<Option<isize>> {
            let s = s.trim();
            if s.is_empty() {
                Some(None)
            } else {
                s.parse().ok().map(Some)
            }
        };
        match raw.split_once(':') {
            Some((start, end)) => Some(Slice::Range(bound(start)?, bound(end)?)),
            None => raw.trim().parse().ok().map(Slice::Index),
        }
    }

    fn apply(self, value: &str) -> String {
        let chars: Vec<char> = value.chars().collect();
        let len = chars.len() as isize;
        let resolve = |i: isize| if i < 0 { (len + i).max(0) } else { i.min(len) };
        match self {
            Slice::Index(i) => {
                let i = if i < 0 { len + i } else { i };
                if (0..len).contains(&i) {
                    chars[i as usize].to_string()
                } else {
                    String::new()
                }
            }
            Slice::Range(start, end) => {
                let start = start.map(resolve).unwrap_or(0);
                let end = end.map(resolve).unwrap_or(len);
                if start >= end {
                    String::new()
                } else {
                    chars[start as usize..end as usize].iter().collect()
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Piece {
    Literal(String),
    Placeholder {
        attribute: String,
        tags: Vec<Tag>,
        slice: Option<Slice>,
    },
    Counter(Counter),
}

/// A parsed scheme template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scheme {
    source: String,
    pieces: Vec<Piece>,
    tags: Vec<Tag>,
}

/// A rendered template split around the counter position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    pub before: String,
    pub counter: Option<Counter>,
    pub after: String,
}

impl fmt::Display for Rendered {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.before, self.after)
    }
}

impl Scheme {
    pub fn parse(template: &str) -> KelvinResult<Self> {
        let mut pieces = Vec::new();
        let mut tags = Vec::new();
        let mut literal = String::new();
        let mut rest = template;

        let flush = |literal: &mut String, pieces: &mut Vec<Piece>| {
            if !literal.is_empty() {
                pieces.push(Piece::Literal(std::mem::take(literal)));
            }
        };

        while let Some(c) = rest.chars().next() {
            match c {
                '<' => {
                    let end = rest.find('>').ok_or_else(|| {
                        KelvinError::initialisation(format!(
                            "Unterminated placeholder in scheme {:?}.",
                            template
                        ))
                    })?;
                    let inner = &rest[1..end];
                    rest = &rest[end + 1..];
                    flush(&mut literal, &mut pieces);

                    if let Some(global) = inner.strip_prefix(':') {
                        for tag in global.split(',').filter(|t| !t.trim().is_empty()) {
                            tags.push(Tag::parse(tag)?);
                        }
                        continue;
                    }
                    let (attribute, local) = match inner.split_once(':') {
                        Some((attribute, local)) => (attribute, Some(local)),
                        None => (inner, None),
                    };
                    if attribute.trim().is_empty() {
                        return Err(KelvinError::initialisation(format!(
                            "Empty placeholder in scheme {:?}.",
                            template
                        )));
                    }
                    let local_tags = local
                        .map(|l| {
                            l.split(',')
                                .filter(|t| !t.trim().is_empty())
                                .map(Tag::parse)
                                .collect::<KelvinResult<Vec<_>>>()
                        })
                        .transpose()?
                        .unwrap_or_default();

                    let mut slice = None;
                    if rest.starts_with('[') {
                        if let Some(close) = rest.find(']') {
                            let candidate = &rest[1..close];
                            if candidate != ALWAYS_COUNTER && candidate != COUNTER2 {
                                slice = Some(Slice::parse(candidate).ok_or_else(|| {
                                    KelvinError::initialisation(format!(
                                        "Invalid slice [{}] in scheme {:?}.",
                                        candidate, template
                                    ))
                                })?);
                                rest = &rest[close + 1..];
                            }
                        }
                    }
                    pieces.push(Piece::Placeholder {
                        attribute: attribute.trim().to_string(),
                        tags: local_tags,
                        slice,
                    });
                }
                '[' if rest.starts_with(&format!("[{}]", ALWAYS_COUNTER)) => {
                    flush(&mut literal, &mut pieces);
                    pieces.push(Piece::Counter(Counter::Always));
                    rest = &rest[ALWAYS_COUNTER.len() + 2..];
                }
                '[' if rest.starts_with(&format!("[{}]", COUNTER2)) => {
                    flush(&mut literal, &mut pieces);
                    pieces.push(Piece::Counter(Counter::FromSecond));
                    rest = &rest[COUNTER2.len() + 2..];
                }
                _ => {
                    literal.push(c);
                    rest = &rest[c.len_utf8()..];
                }
            }
        }
        flush(&mut literal, &mut pieces);

        let counters = pieces
            .iter()
            .filter(|p| matches!(p, Piece::Counter(_)))
            .count();
        if counters > 1 {
            return Err(KelvinError::initialisation(format!(
                "More than one counter in scheme {:?}.",
                template
            )));
        }

        Ok(Self {
            source: template.to_string(),
            pieces,
            tags,
        })
    }

    /// The template text.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Attributes referenced by placeholders, in template order.
    pub fn placeholders(&self) -> Vec<&str> {
        self.pieces
            .iter()
            .filter_map(|p| match p {
                Piece::Placeholder { attribute, .. } => Some(attribute.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn counter(&self) -> Option<Counter> {
        self.pieces.iter().find_map(|p| match p {
            Piece::Counter(counter) => Some(*counter),
            _ => None,
        })
    }

    /// Render with attribute values from `lookup`.
    ///
    /// A placeholder `lookup` has no value for is an initialisation error.
    pub fn render<F>(&self, lookup: F) -> KelvinResult<Rendered>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut before = String::new();
        let mut after = String::new();
        let mut counter = None;
        for piece in &self.pieces {
            let text = match piece {
                Piece::Literal(text) => text.clone(),
                Piece::Placeholder {
                    attribute,
                    tags,
                    slice,
                } => {
                    let value = lookup(attribute).ok_or_else(|| {
                        KelvinError::initialisation(format!(
                            "No value for <{}> in scheme {:?}.",
                            attribute, self.source
                        ))
                    })?;
                    let value = apply_tags(tags, &value);
                    match slice {
                        Some(slice) => slice.apply(&value),
                        None => value,
                    }
                }
                Piece::Counter(c) => {
                    counter = Some(*c);
                    continue;
                }
            };
            if counter.is_some() {
                after.push_str(&text);
            } else {
                before.push_str(&text);
            }
        }
        Ok(Rendered {
            before: apply_tags(&self.tags, &before),
            counter,
            after: apply_tags(&self.tags, &after),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn anna(attribute: &str) -> Option<String> {
        match attribute {
            "firstname" => Some("Anna".to_string()),
            "lastname" => Some("Müller".to_string()),
            "maildomain" => Some("example.org".to_string()),
            _ => None,
        }
    }

    fn render(template: &str) -> String {
        Scheme::parse(template).unwrap().render(anna).unwrap().to_string()
    }

    #[test]
    fn test_slices_follow_python_semantics() {
        assert_eq!(render("<firstname>[0]"), "A");
        assert_eq!(render("<firstname>[:2]"), "An");
        assert_eq!(render("<firstname>[1:3]"), "nn");
        assert_eq!(render("<firstname>[-2:]"), "na");
        assert_eq!(render("<firstname>[10]"), "");
        assert_eq!(render("<firstname>[3:1]"), "");
    }

    #[test]
    fn test_tags() {
        assert_eq!(render("<lastname:umlauts,lower>"), "mueller");
        assert_eq!(render("<:upper><firstname>.<lastname:umlauts>"), "ANNA.MUELLER");
        assert_eq!(render("<:alphanum><firstname> <lastname:umlauts>"), "AnnaMueller");
        assert_eq!(
            Tag::Strip.apply("  Anna   Maria "),
            "Anna Maria".to_string()
        );
    }

    #[test]
    fn test_counter_splits_the_result() {
        let scheme = Scheme::parse("<:umlauts,lower><firstname>[0].<lastname>[COUNTER2]x").unwrap();
        assert_eq!(scheme.counter(), Some(Counter::FromSecond));
        let rendered = scheme.render(anna).unwrap();
        assert_eq!(rendered.before, "a.mueller");
        assert_eq!(rendered.after, "x");
        assert_eq!(scheme.placeholders(), vec!["firstname", "lastname"]);
    }

    #[test]
    fn test_invalid_schemes() {
        assert!(matches!(
            Scheme::parse("<firstname>[ALWAYSCOUNTER][COUNTER2]"),
            Err(KelvinError::Initialisation { .. })
        ));
        assert!(Scheme::parse("<firstname").is_err());
        assert!(Scheme::parse("<firstname:shout>").is_err());
        assert!(Scheme::parse("<firstname>[a:b]").is_err());
    }

    #[test]
    fn test_missing_value_is_an_initialisation_error() {
        let scheme = Scheme::parse("<firstname>.<nickname>").unwrap();
        assert!(matches!(
            scheme.render(anna),
            Err(KelvinError::Initialisation { .. })
        ));
    }

    #[test]
    fn test_literal_brackets_are_kept() {
        assert_eq!(render("[x]<firstname>"), "[x]Anna");
    }
}
