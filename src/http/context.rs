//! Per-request execution context.
//!
//! A `Context` is created by the dispatch wrapper once routing completes and
//! is owned by the task serving that request. It carries the request, bound
//! path params, string storage shared along the chain, the adoption flag, the
//! applicable hooks and the cancellation signal.

use std::collections::HashMap;
use std::io::{self, Write};

use axum::http::{header, HeaderValue, StatusCode};
use serde::de::DeserializeOwned;

use crate::http::cancel::Cancellation;
use crate::http::handler::{Outcome, SharedHandler};
use crate::http::hooks::{run_hooks, Hook};
use crate::http::request::Request;
use crate::http::response::{decode_json, Response};
use crate::http::writer::ResponseWriter;
use crate::routing::Params;

/// Request-scoped string key/value storage.
///
/// Values are strings on purpose; encode structured values before storing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Storage {
    entries: HashMap<String, String>,
}

impl Storage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Insert a value, returning the previous one.
    pub fn put(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.entries.insert(key.into(), value.into())
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.entries.remove(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// How a handler chain ended.
pub(crate) enum ChainResult {
    Produced(Box<dyn Response>),
    Exhausted,
    Adopted,
}

/// The per-request execution and state carrier.
pub struct Context {
    request: Request,
    writer: Box<dyn ResponseWriter>,
    params: Params,
    storage: Storage,
    adopted: bool,
    hooks: Vec<Hook>,
    cancellation: Cancellation,
}

impl Context {
    pub fn new(request: Request, writer: Box<dyn ResponseWriter>) -> Self {
        Self {
            request,
            writer,
            params: Params::new(),
            storage: Storage::new(),
            adopted: false,
            hooks: Vec::new(),
            cancellation: Cancellation::never(),
        }
    }

    pub(crate) fn with_route(mut self, params: Params, hooks: Vec<Hook>) -> Self {
        self.params = params;
        self.hooks = hooks;
        self
    }

    pub(crate) fn with_cancellation(mut self, cancellation: Cancellation) -> Self {
        self.cancellation = cancellation;
        self
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    /// A bound path parameter.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name)
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    /// A storage value set by an earlier handler.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.storage.get(key)
    }

    /// Store a value for later handlers and hooks.
    pub fn put(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.storage.put(key, value);
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    pub fn storage_mut(&mut self) -> &mut Storage {
        &mut self.storage
    }

    /// Decode the request body as JSON.
    pub fn bind_json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        decode_json(self.request.body_reader())
    }

    /// Take direct control of the response writer.
    ///
    /// After adoption the core writes nothing and skips the normal hooks;
    /// the handler is responsible for the complete response.
    pub fn adopt(&mut self) -> &mut dyn ResponseWriter {
        self.adopted = true;
        &mut *self.writer
    }

    pub fn is_adopted(&self) -> bool {
        self.adopted
    }

    pub fn cancellation(&self) -> &Cancellation {
        &self.cancellation
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Run `handlers` in order until one responds or adopts.
    pub(crate) async fn get_response(&mut self, handlers: &[SharedHandler]) -> ChainResult {
        for handler in handlers {
            let outcome = handler.call(self).await;
            if self.adopted {
                return ChainResult::Adopted;
            }
            match outcome {
                Outcome::Respond(response) => return ChainResult::Produced(response),
                Outcome::Continue => {}
                Outcome::Adopted => {
                    self.adopted = true;
                    return ChainResult::Adopted;
                }
            }
        }
        ChainResult::Exhausted
    }

    /// Write `response` through the writer, returning the body byte count.
    pub(crate) fn respond(&mut self, response: &dyn Response) -> io::Result<u64> {
        let headers = self.writer.headers_mut();
        let content_type = response.content_type();
        if !content_type.is_empty() {
            let value = HeaderValue::from_str(content_type)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
            headers.insert(header::CONTENT_TYPE, value);
        }
        response.apply_headers(headers);
        self.writer.write_head(response.status_code())?;

        let mut body = CountingWriter {
            inner: &mut *self.writer,
            written: 0,
        };
        let reported = response.write_to(&mut body)?;
        let written = body.written;
        self.writer.flush()?;

        if reported != written {
            tracing::warn!(
                request_id = %self.request.request_id(),
                reported,
                written,
                "Response reported a different body length than it wrote"
            );
        }
        Ok(written)
    }

    /// Run the applicable hooks with the final status.
    pub(crate) fn process_hooks(&self, status: StatusCode) {
        run_hooks(&self.hooks, status, &self.storage);
    }

    pub(crate) fn head_written(&self) -> bool {
        self.writer.head_written()
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("request", &self.request)
            .field("params", &self.params)
            .field("storage", &self.storage)
            .field("adopted", &self.adopted)
            .field("hooks", &self.hooks.len())
            .finish()
    }
}

// Counts body bytes on their way to the writer.
struct CountingWriter<'w> {
    inner: &'w mut dyn ResponseWriter,
    written: u64,
}

impl Write for CountingWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
