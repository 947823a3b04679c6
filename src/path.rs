//! Path syntax shared by the environment builder and path resolution.
//!
//! `Order.Items.Item[*].price`: dotted fields, `[*]` for "any element of a
//! repeated node" (cardinality is never indexed), `@id` for attribute-like
//! fields. Numeric indexes (`Item[0]`) are accepted on input and mean the
//! same thing as `[*]` to the type system.
use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

pub const ELEMENT_SUFFIX: &str = "[*]";
pub const ATTRIBUTE_PREFIX: char = '@';

static SEGMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(@)?([^.\[\]@\s]+)?((?:\[(?:\*|\d+)\])*)$").expect("static segment pattern")
});

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    Field(String),
    Attribute(String),
    Element,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed path `{path}` near `{segment}`")]
pub struct PathError {
    pub path: String,
    pub segment: String,
}

pub fn parse(path: &str) -> Result<Vec<Segment>, PathError> {
    let err = |segment: &str| PathError { path: path.to_string(), segment: segment.to_string() };
    if path.trim().is_empty() {
        return Err(err(path));
    }

    let mut out = Vec::new();
    for raw in path.split('.') {
        let caps = SEGMENT.captures(raw).ok_or_else(|| err(raw))?;
        // every dotted piece names something; brackets only decorate it
        let name = caps.get(2).ok_or_else(|| err(raw))?.as_str().to_string();
        if caps.get(1).is_some() {
            out.push(Segment::Attribute(name));
        } else {
            out.push(Segment::Field(name));
        }
        let brackets = caps.get(3).map(|m| m.as_str()).unwrap_or("");
        out.extend(brackets.matches('[').map(|_| Segment::Element));
    }
    Ok(out)
}

/// Canonical text for a segment list; indexes come back as `[*]`.
pub fn render(segments: &[Segment]) -> String {
    let mut out = String::new();
    for seg in segments {
        match seg {
            Segment::Element => out.push_str(ELEMENT_SUFFIX),
            Segment::Field(name) => {
                if !out.is_empty() { out.push('.'); }
                out.push_str(name);
            }
            Segment::Attribute(name) => {
                if !out.is_empty() { out.push('.'); }
                out.push(ATTRIBUTE_PREFIX);
                out.push_str(name);
            }
        }
    }
    out
}

pub fn child(parent: &str, name: &str) -> String {
    if parent.is_empty() { name.to_string() } else { format!("{parent}.{name}") }
}

pub fn attribute(parent: &str, name: &str) -> String {
    child(parent, &format!("{ATTRIBUTE_PREFIX}{name}"))
}

pub fn element(parent: &str) -> String {
    format!("{parent}{ELEMENT_SUFFIX}")
}

/// Record key under which an attribute-like field is stored.
pub fn attribute_key(name: &str) -> String {
    format!("{ATTRIBUTE_PREFIX}{name}")
}

impl Segment {
    /// Record key this segment selects, if it selects one.
    pub fn key(&self) -> Option<String> {
        match self {
            Segment::Field(name) => Some(name.clone()),
            Segment::Attribute(name) => Some(attribute_key(name)),
            Segment::Element => None,
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Field(name) => f.write_str(name),
            Segment::Attribute(name) => write!(f, "{ATTRIBUTE_PREFIX}{name}"),
            Segment::Element => f.write_str(ELEMENT_SUFFIX),
        }
    }
}
