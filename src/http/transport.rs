//! Bridge between axum/hyper and the dispatch core.
//!
//! # Responsibilities
//! - Collect the request body up to the configured limit
//! - Build a core `Request` and spawn one dispatch task per request
//! - Stream what the core writes back as the HTTP response
//! - Cancel the request when the client goes away
//! - Apply the tower-http layers (request ID, tracing, timeout)
//!
//! # Design Decisions
//! - The writer is channel-backed: the head goes through a oneshot, body
//!   chunks through a channel
//! - Queued body bytes are capped; a writer that runs ahead of a stalled
//!   client gets `WouldBlock` instead of buffering without bound
//! - The dispatch task reports its `Completion` back: a missing head is only
//!   a 200 for adopted requests, and a failed write aborts the body
//! - The cancel handle lives in the response body stream, so dropping the
//!   connection cancels the handler
//! - Dispatch runs on its own task and holds an in-flight guard until done

use std::io::{self, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::extract::{Request as HttpRequest, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response as HttpResponse};
use futures_util::stream;
use tokio::sync::{mpsc, oneshot};
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::http::cancel::cancellation;
use crate::http::dispatch::{dispatch, Completion};
use crate::http::request::Request;
use crate::http::writer::ResponseWriter;
use crate::net::InflightTracker;
use crate::routing::Router;

type Head = (StatusCode, HeaderMap);

/// A [`ResponseWriter`] that forwards everything to the HTTP response.
pub(crate) struct StreamWriter {
    headers: HeaderMap,
    head: Option<oneshot::Sender<Head>>,
    body: mpsc::UnboundedSender<Bytes>,
    queued: Arc<AtomicUsize>,
    max_queued: usize,
}

/// Receiving end of a [`StreamWriter`]'s body.
pub(crate) struct BodyChunks {
    rx: mpsc::UnboundedReceiver<Bytes>,
    queued: Arc<AtomicUsize>,
}

impl BodyChunks {
    pub(crate) async fn recv(&mut self) -> Option<Bytes> {
        let chunk = self.rx.recv().await?;
        self.queued.fetch_sub(chunk.len(), Ordering::AcqRel);
        Some(chunk)
    }

    #[cfg(test)]
    fn try_recv(&mut self) -> Option<Bytes> {
        let chunk = self.rx.try_recv().ok()?;
        self.queued.fetch_sub(chunk.len(), Ordering::AcqRel);
        Some(chunk)
    }
}

impl StreamWriter {
    /// A writer that queues at most `max_queued` body bytes, plus one chunk
    /// of any size when the queue is empty.
    pub(crate) fn new(max_queued: usize) -> (Self, oneshot::Receiver<Head>, BodyChunks) {
        let (head_tx, head_rx) = oneshot::channel();
        let (body_tx, body_rx) = mpsc::unbounded_channel();
        let queued = Arc::new(AtomicUsize::new(0));
        (
            Self {
                headers: HeaderMap::new(),
                head: Some(head_tx),
                body: body_tx,
                queued: Arc::clone(&queued),
                max_queued,
            },
            head_rx,
            BodyChunks { rx: body_rx, queued },
        )
    }
}

fn client_gone() -> io::Error {
    io::Error::new(io::ErrorKind::BrokenPipe, "client connection closed")
}

impl Write for StreamWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.head.is_some() {
            self.write_head(StatusCode::OK)?;
        }
        if buf.is_empty() {
            return Ok(0);
        }
        if self.body.is_closed() {
            return Err(client_gone());
        }
        let queued = self.queued.load(Ordering::Acquire);
        if queued > 0 && queued + buf.len() > self.max_queued {
            return Err(io::Error::new(
                io::ErrorKind::WouldBlock,
                format!("{queued} response bytes already queued for a slow client"),
            ));
        }
        self.queued.fetch_add(buf.len(), Ordering::AcqRel);
        if self.body.send(Bytes::copy_from_slice(buf)).is_err() {
            self.queued.fetch_sub(buf.len(), Ordering::AcqRel);
            return Err(client_gone());
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl ResponseWriter for StreamWriter {
    fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    fn write_head(&mut self, status: StatusCode) -> io::Result<()> {
        let head = self
            .head
            .take()
            .ok_or_else(|| io::Error::other("response head already written"))?;
        head.send((status, std::mem::take(&mut self.headers)))
            .map_err(|_| client_gone())
    }

    fn head_written(&self) -> bool {
        self.head.is_none()
    }
}

/// Shared state of the fallback handler.
#[derive(Clone)]
pub(crate) struct TransportState {
    pub(crate) router: Arc<Router>,
    pub(crate) tracker: InflightTracker,
    pub(crate) max_body_bytes: usize,
    pub(crate) max_stream_buffer_bytes: usize,
    pub(crate) read_timeout: Option<Duration>,
}

/// Build the axum application serving every path through `state.router`.
#[allow(deprecated)]
pub(crate) fn build_app(state: TransportState, write_timeout: Option<Duration>) -> axum::Router {
    let mut app = axum::Router::new()
        .fallback(serve_request)
        .with_state(state);

    if let Some(timeout) = write_timeout {
        app = app.layer(TimeoutLayer::new(timeout));
    }

    app.layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}

async fn serve_request(State(state): State<TransportState>, req: HttpRequest) -> HttpResponse {
    let (parts, body) = req.into_parts();
    let collect = axum::body::to_bytes(body, state.max_body_bytes);
    let collected = match state.read_timeout {
        Some(limit) => match tokio::time::timeout(limit, collect).await {
            Ok(collected) => collected,
            Err(_) => {
                tracing::warn!(timeout = ?limit, "Timed out reading request body");
                return StatusCode::REQUEST_TIMEOUT.into_response();
            }
        },
        None => collect.await,
    };
    let body = match collected {
        Ok(body) => body,
        Err(e) => {
            tracing::warn!(
                error = %e,
                limit = state.max_body_bytes,
                "Failed to read request body"
            );
            return StatusCode::PAYLOAD_TOO_LARGE.into_response();
        }
    };

    let request = Request::from_parts(parts, body);
    let request_id = request.request_id().to_string();
    let (writer, head_rx, body_rx) = StreamWriter::new(state.max_stream_buffer_bytes);
    let (cancel, signal) = cancellation();
    let (done_tx, done_rx) = oneshot::channel();

    let guard = state.tracker.track();
    let router = Arc::clone(&state.router);
    tokio::spawn(async move {
        let _guard = guard;
        let completion = dispatch(&router, request, Box::new(writer), signal).await;
        match &completion {
            Completion::Responded { status, bytes } => {
                tracing::debug!(%request_id, status = status.as_u16(), bytes, "Request dispatched");
            }
            Completion::Failed { status, error } => {
                tracing::debug!(%request_id, status = status.as_u16(), %error, "Response write failed");
            }
            Completion::Adopted => {
                tracing::debug!(%request_id, "Request adopted");
            }
        }
        let _ = done_tx.send(completion);
    });

    let (status, headers) = match head_rx.await {
        Ok(head) => head,
        Err(_) => {
            return match done_rx.await {
                // An adopted writer that wrote nothing.
                Ok(Completion::Adopted) => StatusCode::OK.into_response(),
                _ => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
            };
        }
    };

    let chunks = stream::unfold(
        (body_rx, cancel, Some(done_rx)),
        |(mut rx, cancel, done)| async move {
            if let Some(chunk) = rx.recv().await {
                return Some((Ok(chunk), (rx, cancel, done)));
            }
            // The writer is gone; end cleanly only if dispatch did not fail.
            match done?.await {
                Ok(Completion::Failed { error, .. }) => Some((Err(error), (rx, cancel, None))),
                Ok(_) => None,
                Err(_) => Some((
                    Err(io::Error::other("dispatch task ended without a result")),
                    (rx, cancel, None),
                )),
            }
        },
    );

    let mut response = HttpResponse::new(Body::from_stream(chunks));
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    response
}
