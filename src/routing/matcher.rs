//! Path pattern matching.
//!
//! # Responsibilities
//! - Parse Ant-style path patterns once, at route compilation
//! - Match a request path against a compiled pattern
//!
//! # Design Decisions
//! - Path matching is case-sensitive
//! - Empty segments are ignored (`/api//users/` == `/api/users`)
//! - Regex only for patterns that ask for it (leading `^`); globs are matched
//!   segment by segment without allocation

use regex::Regex;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PatternError {
    #[error("pattern must start with '/' or '^'")]
    NotAbsolute,
    #[error("'**' must be a whole path segment")]
    EmbeddedDoubleWildcard,
    #[error("malformed variable segment {0:?}")]
    MalformedVariable(String),
    #[error("invalid regex: {0}")]
    Regex(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    /// Contains `*` or `?`, matched character by character.
    Glob(Vec<char>),
    /// `{name}`: exactly one non-empty segment.
    Variable,
    /// `**`: zero or more segments.
    AnyDepth,
}

#[derive(Debug, Clone)]
enum Compiled {
    Glob(Vec<Segment>),
    Regex(Regex),
}

/// A compiled route path pattern.
#[derive(Debug, Clone)]
pub struct PathPattern {
    source: String,
    compiled: Compiled,
}

impl PathPattern {
    pub fn parse(source: &str) -> Result<Self, PatternError> {
        let compiled = if source.starts_with('^') {
            let anchored = format!("(?:{source})$");
            Compiled::Regex(Regex::new(&anchored).map_err(|e| PatternError::Regex(e.to_string()))?)
        } else if source.starts_with('/') {
            Compiled::Glob(
                source
                    .split('/')
                    .filter(|s| !s.is_empty())
                    .map(parse_segment)
                    .collect::<Result<_, _>>()?,
            )
        } else {
            return Err(PatternError::NotAbsolute);
        };
        Ok(Self {
            source: source.to_string(),
            compiled,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn matches(&self, path: &str) -> bool {
        match &self.compiled {
            Compiled::Regex(re) => re.is_match(path),
            Compiled::Glob(pattern) => {
                let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
                match_segments(pattern, &segments)
            }
        }
    }
}

fn parse_segment(raw: &str) -> Result<Segment, PatternError> {
    if raw == "**" {
        return Ok(Segment::AnyDepth);
    }
    if raw.contains("**") {
        return Err(PatternError::EmbeddedDoubleWildcard);
    }
    if raw.contains('{') || raw.contains('}') {
        let name = raw
            .strip_prefix('{')
            .and_then(|rest| rest.strip_suffix('}'))
            .filter(|name| !name.is_empty() && name.chars().all(|c| c.is_alphanumeric() || c == '_'));
        return match name {
            Some(_) => Ok(Segment::Variable),
            None => Err(PatternError::MalformedVariable(raw.to_string())),
        };
    }
    if raw.contains(['*', '?']) {
        return Ok(Segment::Glob(raw.chars().collect()));
    }
    Ok(Segment::Literal(raw.to_string()))
}

fn match_segments(pattern: &[Segment], path: &[&str]) -> bool {
    let Some((first, rest)) = pattern.split_first() else {
        return path.is_empty();
    };
    match first {
        Segment::AnyDepth => (0..=path.len()).any(|skip| match_segments(rest, &path[skip..])),
        _ => match path.split_first() {
            Some((segment, remaining)) => match_one(first, segment) && match_segments(rest, remaining),
            None => false,
        },
    }
}

fn match_one(pattern: &Segment, segment: &str) -> bool {
    match pattern {
        Segment::Literal(literal) => literal == segment,
        Segment::Variable => !segment.is_empty(),
        Segment::Glob(glob) => {
            let chars: Vec<char> = segment.chars().collect();
            match_glob(glob, &chars)
        }
        Segment::AnyDepth => true,
    }
}

fn match_glob(glob: &[char], text: &[char]) -> bool {
    match glob.split_first() {
        None => text.is_empty(),
        Some(('*', rest)) => (0..=text.len()).any(|skip| match_glob(rest, &text[skip..])),
        Some(('?', rest)) => !text.is_empty() && match_glob(rest, &text[1..]),
        Some((c, rest)) => text.first() == Some(c) && match_glob(rest, &text[1..]),
    }
}
