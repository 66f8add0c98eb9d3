//! Route lookup and dispatch table.
//!
//! # Responsibilities
//! - Store compiled routes in registration order
//! - Index them per method and per segment count
//! - Resolve a request to its handler chain, params and hooks
//! - Fall back to the not-found chain when nothing matches
//!
//! # Design Decisions
//! - Mutated only through `&mut` registration; shared as `Arc<Router>` afterwards
//! - First structurally consistent match wins, in registration order
//! - Catch-all routes live in a separate list merged by registration index
//! - Not-found is an ordinary handler chain, so it can be replaced

use std::collections::HashMap;
use std::sync::Arc;

use axum::http::Method;

use super::group::Group;
use super::params::Params;
use super::pattern::{split_path, Pattern, PatternError};
use crate::http::handler::{IntoChain, NotFound, SharedHandler};
use crate::http::hooks::Hook;

/// A registered route.
pub struct Route {
    method: Method,
    pattern: Pattern,
    handlers: Vec<SharedHandler>,
    hooks: Vec<Hook>,
}

impl Route {
    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    pub fn handlers(&self) -> &[SharedHandler] {
        &self.handlers
    }

    pub fn hooks(&self) -> &[Hook] {
        &self.hooks
    }
}

impl std::fmt::Debug for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Route")
            .field("method", &self.method)
            .field("pattern", &self.pattern.as_str())
            .field("handlers", &self.handlers.len())
            .field("hooks", &self.hooks.len())
            .finish()
    }
}

/// Per-method index into the route list.
#[derive(Debug, Default)]
struct MethodTable {
    /// Routes without a catch-all, keyed by segment count.
    by_len: HashMap<usize, Vec<usize>>,
    /// Routes ending in a catch-all.
    catch_all: Vec<usize>,
}

/// A resolved request: the chain to run plus what it needs.
pub struct Resolved<'r> {
    /// The matched route, `None` when the not-found chain applies.
    pub route: Option<&'r Route>,
    pub handlers: &'r [SharedHandler],
    pub params: Params,
    /// Server-wide hooks followed by the route's own hooks.
    pub hooks: Vec<Hook>,
}

/// The route registry.
pub struct Router {
    routes: Vec<Route>,
    methods: HashMap<Method, MethodTable>,
    not_found: Vec<SharedHandler>,
    hooks: Vec<Hook>,
}

impl Router {
    pub fn new() -> Self {
        Self {
            routes: Vec::new(),
            methods: HashMap::new(),
            not_found: vec![Arc::new(NotFound)],
            hooks: Vec::new(),
        }
    }

    /// Create a registration group rooted at `prefix`.
    pub fn group(&mut self, prefix: &str, middleware: impl IntoChain) -> Group<'_> {
        Group::root(self, prefix, middleware.into_chain().into_handlers())
    }

    /// Register a hook that runs for every request, including unmatched ones.
    pub fn hook(&mut self, hook: Hook) -> &mut Self {
        self.hooks.push(hook);
        self
    }

    /// Replace the chain used for unmatched requests.
    pub fn not_found(&mut self, chain: impl IntoChain) -> &mut Self {
        self.not_found = chain.into_chain().into_handlers();
        self
    }

    /// Register a route with a fully composed chain.
    pub fn add(
        &mut self,
        method: Method,
        pattern: &str,
        handlers: Vec<SharedHandler>,
        hooks: Vec<Hook>,
    ) -> Result<(), PatternError> {
        let pattern = Pattern::parse(pattern)?;
        let index = self.routes.len();
        let table = self.methods.entry(method.clone()).or_default();
        if pattern.has_catch_all() {
            table.catch_all.push(index);
        } else {
            table.by_len.entry(pattern.len()).or_default().push(index);
        }

        tracing::debug!(
            method = %method,
            pattern = %pattern,
            handlers = handlers.len(),
            "Route registered"
        );

        self.routes.push(Route {
            method,
            pattern,
            handlers,
            hooks,
        });
        Ok(())
    }

    /// Find the first route matching `method` and `path`.
    pub fn lookup(&self, method: &Method, path: &str) -> Option<(&Route, Params)> {
        let table = self.methods.get(method)?;
        let parts: Vec<&str> = split_path(path).collect();

        let exact = table
            .by_len
            .get(&parts.len())
            .into_iter()
            .flatten()
            .find_map(|&i| self.routes[i].pattern.matches(&parts, path).map(|p| (i, p)));

        // A catch-all only wins if it was registered before the exact match.
        let limit = exact.as_ref().map_or(usize::MAX, |(i, _)| *i);
        let wildcard = table
            .catch_all
            .iter()
            .take_while(|&&i| i < limit)
            .find_map(|&i| self.routes[i].pattern.matches(&parts, path).map(|p| (i, p)));

        wildcard
            .or(exact)
            .map(|(i, params)| (&self.routes[i], params))
    }

    /// Resolve a request to the chain that will handle it.
    pub fn resolve(&self, method: &Method, path: &str) -> Resolved<'_> {
        match self.lookup(method, path) {
            Some((route, params)) => Resolved {
                route: Some(route),
                handlers: &route.handlers,
                params,
                hooks: self.hooks.iter().chain(&route.hooks).cloned().collect(),
            },
            None => Resolved {
                route: None,
                handlers: &self.not_found,
                params: Params::new(),
                hooks: self.hooks.clone(),
            },
        }
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("routes", &self.routes)
            .field("hooks", &self.hooks.len())
            .finish()
    }
}
