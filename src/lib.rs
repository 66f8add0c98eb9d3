//! Embeddable HTTP request-routing and dispatch core.
//!
//! Register handler chains on path patterns through nested [`Group`]s, attach
//! post-response [`Hook`]s, then hand the [`Server`] to a `listen` method.
//! Each request runs on its own task with a [`Context`] carrying path params,
//! request-scoped storage and a cancellation signal.
//!
//! ```ignore
//! let mut server = Server::new();
//! server
//!     .group("/derp", ())
//!     .get("/hello", from_fn(|_| Text::new(StatusCode::OK, "hello").into()))?;
//! server.listen(8080).await?;
//! ```

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod routing;

pub use config::ServerConfig;
pub use http::{
    from_async, from_fn, hook, Chain, Completion, Context, Handler, Hook, Outcome, Request,
    Response, ServeError, Server, Storage,
};
pub use lifecycle::Closer;
pub use routing::{Group, Params, PatternError, Router};
