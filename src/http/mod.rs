//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (axum-server setup, protocol limits)
//!     → transport.rs (collect body, spawn task, stream response)
//!     → dispatch.rs (route lookup, handler chain, panic recovery)
//!     → context.rs (params, storage, adoption, cancellation)
//!     → response.rs / writer.rs (status, headers, body bytes)
//!     → hooks.rs (final status and storage)
//! ```

pub mod cancel;
pub mod context;
pub mod dispatch;
pub mod handler;
pub mod hooks;
pub mod request;
pub mod response;
pub mod server;
pub(crate) mod transport;
pub mod writer;

pub use cancel::{cancellation, CancelHandle, Cancellation};
pub use context::{Context, Storage};
pub use dispatch::{dispatch, Completion};
pub use handler::{from_async, from_fn, Chain, Handler, IntoChain, Outcome, SharedHandler};
pub use hooks::{hook, Hook};
pub use request::{Request, X_REQUEST_ID};
pub use response::{
    decode_json, Binary, Empty, Json, Redirect, Response, ResponseError, Text,
    CONTENT_TYPE_JSON, CONTENT_TYPE_TEXT,
};
pub use server::{ServeError, Server};
pub use writer::{BufferWriter, Recorded, Recording, ResponseWriter};
