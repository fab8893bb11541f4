//! Route pattern parsing.
//!
//! # Responsibilities
//! - Parse `/cats/{id}` (or `/cats/:id`) into typed segments
//! - Reject malformed patterns before anything is registered
//!
//! # Design Decisions
//! - Parameters span a whole segment; `/cat-{id}` is rejected
//! - A catch-all (`{*rest}` / `*rest`) is only allowed as the final segment
//! - The trailing slash is remembered separately so the router can apply
//!   its trailing-slash policy

use std::collections::HashSet;
use std::fmt;

use crate::error::{Error, Result};
use crate::routing::ParamSyntax;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    Param(String),
    CatchAll(String),
}

/// A parsed route pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutePattern {
    raw: String,
    segments: Vec<Segment>,
    trailing_slash: bool,
}

impl RoutePattern {
    pub fn parse(pattern: &str, syntax: ParamSyntax) -> Result<Self> {
        let invalid = |reason: &str| Error::InvalidRoute {
            pattern: pattern.to_string(),
            reason: reason.to_string(),
        };

        let Some(body) = pattern.strip_prefix('/') else {
            return Err(invalid("must start with '/'"));
        };

        let (body, trailing_slash) = match body.strip_suffix('/') {
            Some(stripped) if !stripped.is_empty() => (stripped, true),
            Some(_) => return Err(invalid("empty segment")),
            None => (body, false),
        };

        let mut segments = Vec::new();
        if !body.is_empty() {
            for raw in body.split('/') {
                if raw.is_empty() {
                    return Err(invalid("empty segment"));
                }
                segments.push(parse_segment(raw, syntax).map_err(|reason| invalid(reason))?);
            }
        }

        let mut seen = HashSet::new();
        for (i, segment) in segments.iter().enumerate() {
            match segment {
                Segment::Literal(_) => {}
                Segment::Param(name) | Segment::CatchAll(name) => {
                    if !seen.insert(name.as_str()) {
                        return Err(invalid(&format!("duplicate parameter '{name}'")));
                    }
                }
            }
            if matches!(segment, Segment::CatchAll(_)) && (i + 1 != segments.len() || trailing_slash) {
                return Err(invalid("catch-all must be the final segment"));
            }
        }

        Ok(Self {
            raw: pattern.to_string(),
            segments,
            trailing_slash,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn has_trailing_slash(&self) -> bool {
        self.trailing_slash
    }

    /// Parameter names in the order they appear.
    pub fn param_names(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|segment| match segment {
            Segment::Param(name) | Segment::CatchAll(name) => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }
}

impl fmt::Display for RoutePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

fn parse_segment(raw: &str, syntax: ParamSyntax) -> std::result::Result<Segment, &'static str> {
    match syntax {
        ParamSyntax::Braces => {
            if let Some(inner) = raw.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
                return match inner.strip_prefix('*') {
                    Some(name) => param_name(name).map(Segment::CatchAll),
                    None => param_name(inner).map(Segment::Param),
                };
            }
            if raw.contains(['{', '}']) {
                return Err("parameters must span a whole segment");
            }
            Ok(Segment::Literal(raw.to_string()))
        }
        ParamSyntax::Colon => {
            if let Some(name) = raw.strip_prefix(':') {
                return param_name(name).map(Segment::Param);
            }
            if let Some(name) = raw.strip_prefix('*') {
                return param_name(name).map(Segment::CatchAll);
            }
            Ok(Segment::Literal(raw.to_string()))
        }
    }
}

fn param_name(name: &str) -> std::result::Result<String, &'static str> {
    if name.is_empty() {
        return Err("empty parameter name");
    }
    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err("parameter names may only contain letters, digits and '_'");
    }
    Ok(name.to_string())
}
