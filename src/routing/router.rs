//! Route registration and lookup.
//!
//! # Responsibilities
//! - Store compiled routes in a segment tree
//! - Reject duplicate `(pattern, method)` pairs without touching the tree
//! - Look up the binding for a request path and extract its parameters
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - Each node has literal children, at most one parameter child and at most
//!   one catch-all; lookup tries them in that order and backtracks
//! - Patterns that differ only in parameter names share a node, so they
//!   conflict when bound to the same method
//! - Matching runs on the raw path, so an encoded `%2F` stays inside its
//!   segment; captured values are percent-decoded afterwards
//! - Explicit NotFound rather than silent default

use std::collections::BTreeMap;

use axum::http::Method;
use percent_encoding::percent_decode_str;

use crate::error::{Error, Result};
use crate::routing::{RoutePattern, RouterConfig, Segment, TrailingSlash};
use crate::service::PathParams;

/// A successful lookup.
#[derive(Debug)]
pub struct Match<'a, T> {
    pub value: &'a T,
    pub params: PathParams,
    /// The pattern the binding was registered with.
    pub pattern: &'a str,
    /// Set under [`TrailingSlash::Redirect`] when the request used the
    /// non-registered trailing-slash form; holds the canonical path.
    pub redirect: Option<String>,
}

#[derive(Debug)]
struct Binding<T> {
    method: Method,
    pattern: RoutePattern,
    value: T,
}

#[derive(Debug)]
struct Node<T> {
    literals: BTreeMap<String, Node<T>>,
    param: Option<Box<Node<T>>>,
    catch_all: Option<Box<Node<T>>>,
    bindings: Vec<Binding<T>>,
}

impl<T> Default for Node<T> {
    fn default() -> Self {
        Self {
            literals: BTreeMap::new(),
            param: None,
            catch_all: None,
            bindings: Vec::new(),
        }
    }
}

/// Tree position of a pattern segment.
#[derive(Debug, PartialEq, Eq)]
enum Key {
    Literal(String),
    Param,
    CatchAll,
}

impl<T> Node<T> {
    fn child(&self, key: &Key) -> Option<&Node<T>> {
        match key {
            Key::Literal(literal) => self.literals.get(literal),
            Key::Param => self.param.as_deref(),
            Key::CatchAll => self.catch_all.as_deref(),
        }
    }

    fn child_mut(&mut self, key: Key) -> &mut Node<T> {
        match key {
            Key::Literal(literal) => self.literals.entry(literal).or_default(),
            Key::Param => self.param.get_or_insert_with(Box::default),
            Key::CatchAll => self.catch_all.get_or_insert_with(Box::default),
        }
    }

    fn binding(&self, method: &Method) -> Option<&Binding<T>> {
        self.bindings.iter().find(|b| b.method == *method)
    }

    fn find<'a>(
        &'a self,
        segments: &[&str],
        method: &Method,
        case_insensitive: bool,
        values: &mut Vec<String>,
    ) -> Option<&'a Binding<T>> {
        let Some((first, rest)) = segments.split_first() else {
            return self.binding(method);
        };

        let literal = if case_insensitive {
            self.literals.get(first.to_ascii_lowercase().as_str())
        } else {
            self.literals.get(*first)
        };
        if let Some(found) = literal.and_then(|child| child.find(rest, method, case_insensitive, values)) {
            return Some(found);
        }

        if let Some(child) = self.param.as_deref().filter(|_| !first.is_empty()) {
            values.push((*first).to_string());
            if let Some(found) = child.find(rest, method, case_insensitive, values) {
                return Some(found);
            }
            values.pop();
        }

        if let Some(found) = self.catch_all.as_deref().and_then(|child| child.binding(method)) {
            let remainder = segments.join("/");
            if !remainder.is_empty() {
                values.push(remainder);
                return Some(found);
            }
        }

        None
    }
}

/// Path + method → binding table.
#[derive(Debug)]
pub struct Router<T> {
    config: RouterConfig,
    root: Node<T>,
    len: usize,
}

impl<T> Router<T> {
    pub fn new(config: RouterConfig) -> Self {
        Self {
            config,
            root: Node::default(),
            len: 0,
        }
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    /// Number of registered `(pattern, method)` pairs.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Register `value` for `(pattern, method)`.
    ///
    /// Fails with [`Error::InvalidRoute`] for a malformed pattern and
    /// [`Error::DuplicateBinding`] when the pair is taken; in both cases the
    /// router is left unchanged.
    pub fn register(&mut self, pattern: &str, method: Method, value: T) -> Result<()> {
        let pattern = RoutePattern::parse(pattern, self.config.param_syntax)?;
        let keys = self.keys(&pattern);

        let mut existing = Some(&self.root);
        for key in &keys {
            existing = existing.and_then(|node| node.child(key));
        }
        if let Some(taken) = existing.and_then(|node| node.binding(&method)) {
            return Err(Error::DuplicateBinding(format!(
                "{method} {pattern} (conflicts with {})",
                taken.pattern
            )));
        }

        let mut node = &mut self.root;
        for key in keys {
            node = node.child_mut(key);
        }
        tracing::debug!(method = %method, pattern = %pattern, "Route registered");
        node.bindings.push(Binding {
            method,
            pattern,
            value,
        });
        self.len += 1;
        Ok(())
    }

    /// Find the binding for `(path, method)`.
    ///
    /// Literal segments are preferred over parameters, parameters over
    /// catch-alls. Lookups never modify the router. A captured value that
    /// does not decode to UTF-8 fails with [`Error::BadRequest`].
    pub fn lookup(&self, path: &str, method: &Method) -> Result<Match<'_, T>> {
        let not_found = || Error::NotFound(format!("{method} {path}"));

        let body = path.strip_prefix('/').ok_or_else(not_found)?;
        let request_trailing = !body.is_empty() && body.ends_with('/');
        let body = match self.config.trailing_slash {
            TrailingSlash::Strict => body,
            TrailingSlash::Ignore | TrailingSlash::Redirect if request_trailing => &body[..body.len() - 1],
            TrailingSlash::Ignore | TrailingSlash::Redirect => body,
        };
        let segments: Vec<&str> = if body.is_empty() {
            Vec::new()
        } else {
            body.split('/').collect()
        };

        let mut values = Vec::new();
        let binding = self
            .root
            .find(&segments, method, self.config.case_insensitive, &mut values)
            .ok_or_else(not_found)?;

        let mut params = PathParams::new();
        for (name, value) in binding.pattern.param_names().zip(values) {
            let decoded = percent_decode_str(&value)
                .decode_utf8()
                .map_err(|_| Error::bad_request(format!("path parameter '{name}' is not valid UTF-8")))?;
            params.push(name, decoded.into_owned());
        }

        let redirect = match self.config.trailing_slash {
            TrailingSlash::Redirect if request_trailing != binding.pattern.has_trailing_slash() => {
                Some(if request_trailing {
                    path[..path.len() - 1].to_string()
                } else {
                    format!("{path}/")
                })
            }
            _ => None,
        };

        Ok(Match {
            value: &binding.value,
            params,
            pattern: binding.pattern.as_str(),
            redirect,
        })
    }

    fn keys(&self, pattern: &RoutePattern) -> Vec<Key> {
        let mut keys: Vec<Key> = pattern
            .segments()
            .iter()
            .map(|segment| match segment {
                Segment::Literal(literal) if self.config.case_insensitive => {
                    Key::Literal(literal.to_ascii_lowercase())
                }
                Segment::Literal(literal) => Key::Literal(literal.clone()),
                Segment::Param(_) => Key::Param,
                Segment::CatchAll(_) => Key::CatchAll,
            })
            .collect();
        if pattern.has_trailing_slash() && self.config.trailing_slash == TrailingSlash::Strict {
            keys.push(Key::Literal(String::new()));
        }
        keys
    }
}
