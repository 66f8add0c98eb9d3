//! Handler contract and chain construction.
//!
//! A handler receives the request [`Context`] and yields an [`Outcome`]:
//! respond and stop, continue to the next handler, or report that it adopted
//! the response writer. Chains are plain ordered lists of shared handlers.

use std::sync::Arc;

use futures_util::future::{self, BoxFuture};

use crate::http::context::Context;
use crate::http::response::Response;

/// Result of running a single handler.
pub enum Outcome {
    /// Stop the chain; this is the final response.
    Respond(Box<dyn Response>),
    /// Run the next handler in the chain.
    Continue,
    /// The handler took over the response writer and finished the request.
    Adopted,
}

impl Outcome {
    pub fn respond(response: impl Response + 'static) -> Self {
        Outcome::Respond(Box::new(response))
    }

    pub fn is_continue(&self) -> bool {
        matches!(self, Outcome::Continue)
    }
}

impl<R: Response + 'static> From<R> for Outcome {
    fn from(response: R) -> Self {
        Outcome::respond(response)
    }
}

impl std::fmt::Debug for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::Respond(r) => f
                .debug_tuple("Respond")
                .field(&r.status_code())
                .finish(),
            Outcome::Continue => f.write_str("Continue"),
            Outcome::Adopted => f.write_str("Adopted"),
        }
    }
}

/// A unit of request-processing logic.
pub trait Handler: Send + Sync + 'static {
    fn call<'a>(&'a self, ctx: &'a mut Context) -> BoxFuture<'a, Outcome>;
}

/// A handler shared between routes of the same group.
pub type SharedHandler = Arc<dyn Handler>;

/// Handler built from a synchronous closure.
pub struct FnHandler<F>(F);

impl<F> Handler for FnHandler<F>
where
    F: Fn(&mut Context) -> Outcome + Send + Sync + 'static,
{
    fn call<'a>(&'a self, ctx: &'a mut Context) -> BoxFuture<'a, Outcome> {
        Box::pin(future::ready((self.0)(ctx)))
    }
}

/// Wrap a synchronous closure as a handler.
///
/// ```ignore
/// from_fn(|_ctx| Text::new(StatusCode::OK, "hello").into())
/// ```
pub fn from_fn<F>(f: F) -> FnHandler<F>
where
    F: Fn(&mut Context) -> Outcome + Send + Sync + 'static,
{
    FnHandler(f)
}

/// Handler built from a closure returning a boxed future.
pub struct AsyncFnHandler<F>(F);

impl<F> Handler for AsyncFnHandler<F>
where
    F: for<'a> Fn(&'a mut Context) -> BoxFuture<'a, Outcome> + Send + Sync + 'static,
{
    fn call<'a>(&'a self, ctx: &'a mut Context) -> BoxFuture<'a, Outcome> {
        (self.0)(ctx)
    }
}

/// Wrap an async closure as a handler.
///
/// The closure must box its future so it can borrow the context:
///
/// ```ignore
/// from_async(|ctx| Box::pin(async move {
///     tokio::time::sleep(Duration::from_millis(5)).await;
///     ctx.put("slept", "5ms");
///     Outcome::Continue
/// }))
/// ```
pub fn from_async<F>(f: F) -> AsyncFnHandler<F>
where
    F: for<'a> Fn(&'a mut Context) -> BoxFuture<'a, Outcome> + Send + Sync + 'static,
{
    AsyncFnHandler(f)
}

/// An ordered list of handlers.
#[derive(Clone, Default)]
pub struct Chain {
    handlers: Vec<SharedHandler>,
}

impl Chain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a handler.
    pub fn then(mut self, handler: impl Handler) -> Self {
        self.handlers.push(Arc::new(handler));
        self
    }

    /// Append an already shared handler.
    pub fn then_shared(mut self, handler: SharedHandler) -> Self {
        self.handlers.push(handler);
        self
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    pub fn into_handlers(self) -> Vec<SharedHandler> {
        self.handlers
    }
}

/// Anything that can be registered as a handler chain.
pub trait IntoChain {
    fn into_chain(self) -> Chain;
}

impl<H: Handler> IntoChain for H {
    fn into_chain(self) -> Chain {
        Chain::new().then(self)
    }
}

impl IntoChain for Chain {
    fn into_chain(self) -> Chain {
        self
    }
}

impl IntoChain for () {
    fn into_chain(self) -> Chain {
        Chain::new()
    }
}

/// Handler used for unmatched requests unless the router overrides it.
pub(crate) struct NotFound;

impl Handler for NotFound {
    fn call<'a>(&'a self, _ctx: &'a mut Context) -> BoxFuture<'a, Outcome> {
        Box::pin(future::ready(Outcome::respond(
            crate::http::response::Text::not_found(),
        )))
    }
}
