//! Routing subsystem for the HTTP endpoint table.
//!
//! # Data Flow
//! ```text
//! Route Compilation (at startup):
//!     (pattern, method, binding)[]
//!     → pattern.rs (parse + validate)
//!     → router.rs (insert into segment tree, reject duplicates)
//!     → Freeze as immutable Router
//!
//! Incoming Request (path, method)
//!     → router.rs (walk tree: literal, then param, then catch-all)
//!     → Return: Match { binding, params } or NotFound
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - No regex; one tree walk per lookup
//! - Deterministic: literal segments always beat parameters
//! - Duplicates are errors, never silent overwrites

pub mod pattern;
pub mod router;

pub use pattern::{RoutePattern, Segment};
pub use router::{Match, Router};

/// How a trailing `/` on a request path is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrailingSlash {
    /// `/cats` and `/cats/` are different paths.
    #[default]
    Strict,
    /// `/cats` and `/cats/` are the same path.
    Ignore,
    /// The non-registered form is answered with a permanent redirect.
    Redirect,
}

/// Parameter syntax accepted in route patterns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParamSyntax {
    /// `/cats/{id}`, `/files/{*path}`
    #[default]
    Braces,
    /// `/cats/:id`, `/files/*path`
    Colon,
}

/// Router behaviour, fixed when the router is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RouterConfig {
    pub trailing_slash: TrailingSlash,
    pub param_syntax: ParamSyntax,
    /// Match literal segments ignoring ASCII case. Parameter values keep
    /// their original case.
    pub case_insensitive: bool,
}

impl RouterConfig {
    pub fn trailing_slash(mut self, policy: TrailingSlash) -> Self {
        self.trailing_slash = policy;
        self
    }

    pub fn param_syntax(mut self, syntax: ParamSyntax) -> Self {
        self.param_syntax = syntax;
        self
    }

    pub fn case_insensitive(mut self, enabled: bool) -> Self {
        self.case_insensitive = enabled;
        self
    }
}
