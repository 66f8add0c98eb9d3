//! Registration groups.
//!
//! A group carries a path prefix, leading handlers and hooks. Sub-groups
//! extend all three; routes registered on a group get the composed values.
//! Groups only exist while routes are being registered.

use axum::http::Method;

use super::pattern::{join, PatternError};
use super::router::Router;
use crate::http::handler::{IntoChain, SharedHandler};
use crate::http::hooks::Hook;

/// A registration scope borrowing the router mutably.
pub struct Group<'r> {
    router: &'r mut Router,
    prefix: String,
    handlers: Vec<SharedHandler>,
    hooks: Vec<Hook>,
}

impl<'r> Group<'r> {
    pub(crate) fn root(router: &'r mut Router, prefix: &str, handlers: Vec<SharedHandler>) -> Self {
        Self {
            router,
            prefix: join("", prefix),
            handlers,
            hooks: Vec::new(),
        }
    }

    /// The normalized path prefix of this group.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Create a sub-group. Its prefix, handlers and hooks extend this group's.
    pub fn group(&mut self, prefix: &str, middleware: impl IntoChain) -> Group<'_> {
        let mut handlers = self.handlers.clone();
        handlers.extend(middleware.into_chain().into_handlers());
        Group {
            prefix: join(&self.prefix, prefix),
            handlers,
            hooks: self.hooks.clone(),
            router: &mut *self.router,
        }
    }

    /// Add a hook inherited by routes registered on this group afterwards.
    pub fn hook(&mut self, hook: Hook) -> &mut Self {
        self.hooks.push(hook);
        self
    }

    /// Register `chain` for `method` at the group prefix joined with `path`.
    pub fn handle(
        &mut self,
        method: Method,
        path: &str,
        chain: impl IntoChain,
    ) -> Result<(), PatternError> {
        let mut handlers = self.handlers.clone();
        handlers.extend(chain.into_chain().into_handlers());
        let pattern = join(&self.prefix, path);
        self.router
            .add(method, &pattern, handlers, self.hooks.clone())
    }

    pub fn get(&mut self, path: &str, chain: impl IntoChain) -> Result<(), PatternError> {
        self.handle(Method::GET, path, chain)
    }

    pub fn post(&mut self, path: &str, chain: impl IntoChain) -> Result<(), PatternError> {
        self.handle(Method::POST, path, chain)
    }

    pub fn put(&mut self, path: &str, chain: impl IntoChain) -> Result<(), PatternError> {
        self.handle(Method::PUT, path, chain)
    }

    pub fn patch(&mut self, path: &str, chain: impl IntoChain) -> Result<(), PatternError> {
        self.handle(Method::PATCH, path, chain)
    }

    pub fn delete(&mut self, path: &str, chain: impl IntoChain) -> Result<(), PatternError> {
        self.handle(Method::DELETE, path, chain)
    }

    pub fn head(&mut self, path: &str, chain: impl IntoChain) -> Result<(), PatternError> {
        self.handle(Method::HEAD, path, chain)
    }

    pub fn options(&mut self, path: &str, chain: impl IntoChain) -> Result<(), PatternError> {
        self.handle(Method::OPTIONS, path, chain)
    }
}
