//! Request dispatch.
//!
//! # Responsibilities
//! - Resolve the route and build the per-request `Context`
//! - Run the handler chain, catching panics
//! - Write the produced response, or a 500 after a panic in the chain or in
//!   the response itself
//! - Run hooks with the final status
//!
//! # Design Decisions
//! - A chain that finishes without responding yields an empty `200 OK`
//! - Adoption skips the response write and the hooks
//! - A panic always fires the hooks with 500, adopted or not
//! - A panic after the head is committed is reported as `Failed`, and the
//!   transport aborts the body
//! - Write failures are logged and reported, never retried

use std::any::Any;
use std::io;
use std::panic::{catch_unwind, AssertUnwindSafe};

use axum::http::StatusCode;
use futures_util::FutureExt;

use crate::http::cancel::Cancellation;
use crate::http::context::{ChainResult, Context};
use crate::http::request::Request;
use crate::http::response::{Empty, Response, Text};
use crate::http::writer::ResponseWriter;
use crate::routing::Router;

/// How dispatch of a single request ended.
#[derive(Debug)]
pub enum Completion {
    /// A response was written.
    Responded { status: StatusCode, bytes: u64 },
    /// Writing the response failed.
    Failed { status: StatusCode, error: io::Error },
    /// A handler took over the writer.
    Adopted,
}

impl Completion {
    /// The status the hooks observed, if any.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Completion::Responded { status, .. } | Completion::Failed { status, .. } => {
                Some(*status)
            }
            Completion::Adopted => None,
        }
    }
}

/// Dispatch `request` through `router`, writing to `writer`.
pub async fn dispatch(
    router: &Router,
    request: Request,
    writer: Box<dyn ResponseWriter>,
    cancellation: Cancellation,
) -> Completion {
    let resolved = router.resolve(request.method(), request.path());
    let pattern = resolved.route.map(|r| r.pattern().as_str().to_string());
    let mut ctx = Context::new(request, writer)
        .with_route(resolved.params, resolved.hooks)
        .with_cancellation(cancellation);

    let result = AssertUnwindSafe(ctx.get_response(resolved.handlers))
        .catch_unwind()
        .await;

    match result {
        Ok(ChainResult::Produced(response)) => {
            write_guarded(&mut ctx, response.as_ref(), pattern.as_deref())
        }
        Ok(ChainResult::Exhausted) => write_guarded(&mut ctx, &Empty::ok(), pattern.as_deref()),
        Ok(ChainResult::Adopted) => {
            tracing::trace!(
                request_id = %ctx.request().request_id(),
                "Response adopted by handler"
            );
            Completion::Adopted
        }
        Err(panic) => {
            log_panic(&ctx, pattern.as_deref(), &panic, "Handler panicked");
            recover(&mut ctx)
        }
    }
}

// `write_to` may serialize lazily and panic.
fn write_guarded(ctx: &mut Context, response: &dyn Response, route: Option<&str>) -> Completion {
    match catch_unwind(AssertUnwindSafe(|| finish(ctx, response))) {
        Ok(completion) => completion,
        Err(panic) => {
            log_panic(ctx, route, &panic, "Response panicked while writing");
            recover(ctx)
        }
    }
}

fn log_panic(ctx: &Context, route: Option<&str>, panic: &Box<dyn Any + Send>, message: &str) {
    tracing::error!(
        request_id = %ctx.request().request_id(),
        method = %ctx.request().method(),
        path = %ctx.request().path(),
        route = route.unwrap_or("<not found>"),
        panic_message = %panic_message(panic),
        "{message}"
    );
}

fn finish(ctx: &mut Context, response: &dyn Response) -> Completion {
    let status = response.status_code();
    let written = ctx.respond(response);
    ctx.process_hooks(status);
    match written {
        Ok(bytes) => Completion::Responded { status, bytes },
        Err(error) => {
            tracing::warn!(
                request_id = %ctx.request().request_id(),
                status = status.as_u16(),
                error = %error,
                "Failed to write response"
            );
            Completion::Failed { status, error }
        }
    }
}

fn recover(ctx: &mut Context) -> Completion {
    let status = StatusCode::INTERNAL_SERVER_ERROR;
    let written = if ctx.head_written() {
        Err(io::Error::other("panicked after the response head was written"))
    } else {
        ctx.respond(&Text::internal_error())
    };
    ctx.process_hooks(status);
    match written {
        Ok(bytes) => Completion::Responded { status, bytes },
        Err(error) => Completion::Failed { status, error },
    }
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(panic: &Box<dyn Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use axum::http::{HeaderMap, Method};

    use crate::http::cancel::cancellation;
    use crate::http::handler::{from_async, from_fn, Chain, Outcome};
    use crate::http::hooks::hook;
    use crate::http::writer::{BufferWriter, Recorded};

    async fn run(router: &Router, method: Method, target: &str) -> (Completion, Recorded) {
        let (writer, recording) = BufferWriter::new();
        let completion = dispatch(
            router,
            Request::new(method, target),
            Box::new(writer),
            Cancellation::never(),
        )
        .await;
        (completion, recording.snapshot())
    }

    fn status_log(router: &mut Router) -> Arc<Mutex<Vec<u16>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&seen);
        router.hook(hook(move |status, _| log.lock().unwrap().push(status.as_u16())));
        seen
    }

    #[tokio::test]
    async fn test_responding_handler_stops_chain() {
        let later = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&later);

        let mut router = Router::new();
        router
            .group("/", ())
            .get(
                "/stop",
                Chain::new()
                    .then(from_fn(|_| Text::new(StatusCode::ACCEPTED, "stopped").into()))
                    .then(from_fn(move |_| {
                        counter.fetch_add(1, Ordering::SeqCst);
                        Outcome::Continue
                    })),
            )
            .unwrap();

        let (completion, recorded) = run(&router, Method::GET, "/stop").await;
        assert!(matches!(
            completion,
            Completion::Responded { status: StatusCode::ACCEPTED, bytes: 7 }
        ));
        assert_eq!(recorded.body_str(), "stopped");
        assert_eq!(later.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_exhausted_chain_is_empty_ok() {
        let mut router = Router::new();
        let seen = status_log(&mut router);
        router
            .group("/", ())
            .get("/noop", from_fn(|_| Outcome::Continue))
            .unwrap();

        let (completion, recorded) = run(&router, Method::GET, "/noop").await;
        assert_eq!(completion.status(), Some(StatusCode::OK));
        assert_eq!(recorded.status, Some(StatusCode::OK));
        assert!(recorded.body.is_empty());
        assert_eq!(*seen.lock().unwrap(), vec![200]);
    }

    #[tokio::test]
    async fn test_unmatched_request_is_404_with_hooks() {
        let mut router = Router::new();
        let seen = status_log(&mut router);

        let (completion, recorded) = run(&router, Method::GET, "/missing").await;
        assert_eq!(completion.status(), Some(StatusCode::NOT_FOUND));
        assert_eq!(recorded.body_str(), "404 page not found");
        assert_eq!(recorded.content_type(), Some("text/plain"));
        assert_eq!(*seen.lock().unwrap(), vec![404]);
    }

    #[tokio::test]
    async fn test_not_found_override() {
        let mut router = Router::new();
        router.not_found(from_fn(|ctx| {
            Text::new(StatusCode::NOT_FOUND, format!("no {}", ctx.request().path())).into()
        }));

        let (_, recorded) = run(&router, Method::POST, "/nothing").await;
        assert_eq!(recorded.body_str(), "no /nothing");
    }

    #[tokio::test]
    async fn test_panic_becomes_500_and_router_survives() {
        let mut router = Router::new();
        let seen = status_log(&mut router);
        {
            let mut root = router.group("/", ());
            root.get("/boom", from_fn(|_| panic!("handler exploded")))
                .unwrap();
            root.get("/ok", from_fn(|_| Text::new(StatusCode::OK, "fine").into()))
                .unwrap();
        }

        let (completion, recorded) = run(&router, Method::GET, "/boom").await;
        assert_eq!(completion.status(), Some(StatusCode::INTERNAL_SERVER_ERROR));
        assert_eq!(recorded.body_str(), "Internal Server Error");

        let (completion, recorded) = run(&router, Method::GET, "/ok").await;
        assert_eq!(completion.status(), Some(StatusCode::OK));
        assert_eq!(recorded.body_str(), "fine");
        assert_eq!(*seen.lock().unwrap(), vec![500, 200]);
    }

    #[tokio::test]
    async fn test_adopted_response_skips_hooks() {
        let mut router = Router::new();
        let seen = status_log(&mut router);
        router
            .group("/", ())
            .get(
                "/raw",
                from_fn(|ctx| {
                    let w = ctx.adopt();
                    if w.write_head(StatusCode::PARTIAL_CONTENT).is_ok() {
                        let _ = w.write_all(b"chunk");
                    }
                    Outcome::Adopted
                }),
            )
            .unwrap();

        let (completion, recorded) = run(&router, Method::GET, "/raw").await;
        assert!(matches!(completion, Completion::Adopted));
        assert_eq!(recorded.status, Some(StatusCode::PARTIAL_CONTENT));
        assert_eq!(recorded.body_str(), "chunk");
        assert!(seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_panic_after_adoption_still_fires_hooks() {
        let mut router = Router::new();
        let seen = status_log(&mut router);
        router
            .group("/", ())
            .get(
                "/half",
                from_fn(|ctx| {
                    let _ = ctx.adopt().write_all(b"partial");
                    panic!("lost the stream");
                }),
            )
            .unwrap();

        let (completion, recorded) = run(&router, Method::GET, "/half").await;
        assert!(matches!(
            completion,
            Completion::Failed { status: StatusCode::INTERNAL_SERVER_ERROR, .. }
        ));
        assert_eq!(recorded.status, Some(StatusCode::OK));
        assert_eq!(recorded.body_str(), "partial");
        assert_eq!(*seen.lock().unwrap(), vec![500]);
    }

    struct BrokenPipe {
        headers: HeaderMap,
        committed: bool,
    }

    impl Write for BrokenPipe {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "client went away"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl ResponseWriter for BrokenPipe {
        fn headers_mut(&mut self) -> &mut HeaderMap {
            &mut self.headers
        }

        fn write_head(&mut self, _status: StatusCode) -> io::Result<()> {
            self.committed = true;
            Ok(())
        }

        fn head_written(&self) -> bool {
            self.committed
        }
    }

    #[tokio::test]
    async fn test_write_failure_is_reported_and_hooks_run() {
        let mut router = Router::new();
        let seen = status_log(&mut router);
        router
            .group("/", ())
            .get("/", from_fn(|_| Text::new(StatusCode::OK, "hello").into()))
            .unwrap();

        let writer = BrokenPipe {
            headers: HeaderMap::new(),
            committed: false,
        };
        let completion = dispatch(
            &router,
            Request::new(Method::GET, "/"),
            Box::new(writer),
            Cancellation::never(),
        )
        .await;

        match completion {
            Completion::Failed { status, error } => {
                assert_eq!(status, StatusCode::OK);
                assert_eq!(error.kind(), io::ErrorKind::BrokenPipe);
            }
            other => panic!("expected a write failure, got {other:?}"),
        }
        assert_eq!(*seen.lock().unwrap(), vec![200]);
    }

    #[tokio::test]
    async fn test_handler_observes_cancellation() {
        let mut router = Router::new();
        router
            .group("/", ())
            .get(
                "/slow",
                from_async(|ctx| {
                    Box::pin(async move {
                        tokio::select! {
                            _ = ctx.cancellation().cancelled() => {
                                Outcome::respond(Text::new(StatusCode::SERVICE_UNAVAILABLE, "cancelled"))
                            }
                            _ = tokio::time::sleep(Duration::from_secs(5)) => {
                                Outcome::respond(Text::new(StatusCode::OK, "done"))
                            }
                        }
                    })
                }),
            )
            .unwrap();

        let (handle, signal) = cancellation();
        let (writer, recording) = BufferWriter::new();
        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            handle.cancel();
        });

        let completion = dispatch(
            &router,
            Request::new(Method::GET, "/slow"),
            Box::new(writer),
            signal,
        )
        .await;
        canceller.await.unwrap();

        assert_eq!(completion.status(), Some(StatusCode::SERVICE_UNAVAILABLE));
        assert_eq!(recording.snapshot().body_str(), "cancelled");
    }

    #[tokio::test]
    async fn test_params_and_route_hooks() {
        let mut router = Router::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&seen);
        {
            let mut users = router.group("/users", ());
            users.hook(hook(move |status, storage| {
                log.lock()
                    .unwrap()
                    .push((status.as_u16(), storage.get("id").map(str::to_string)))
            }));
            users
                .get(
                    "/:id",
                    from_fn(|ctx| {
                        let id = ctx.param("id").unwrap_or_default().to_string();
                        ctx.put("id", id.clone());
                        Text::new(StatusCode::OK, id).into()
                    }),
                )
                .unwrap();
        }

        let (_, recorded) = run(&router, Method::GET, "/users/42").await;
        assert_eq!(recorded.body_str(), "42");
        assert_eq!(*seen.lock().unwrap(), vec![(200, Some("42".to_string()))]);

        // Group hooks do not fire for unmatched requests.
        run(&router, Method::GET, "/elsewhere").await;
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    /// A response that serializes on write and fails at a chosen step.
    struct Lazy {
        panic_on_status: bool,
    }

    impl Response for Lazy {
        fn status_code(&self) -> StatusCode {
            if self.panic_on_status {
                panic!("status lookup blew up");
            }
            StatusCode::OK
        }

        fn content_type(&self) -> &str {
            "text/plain"
        }

        fn write_to(&self, _w: &mut dyn Write) -> io::Result<u64> {
            panic!("lazy serializer blew up");
        }
    }

    fn lazy_router(panic_on_status: bool) -> (Router, Arc<Mutex<Vec<u16>>>) {
        let mut router = Router::new();
        let seen = status_log(&mut router);
        router
            .group("/", ())
            .get(
                "/lazy",
                from_fn(move |_| Outcome::respond(Lazy { panic_on_status })),
            )
            .unwrap();
        (router, seen)
    }

    #[tokio::test]
    async fn test_panic_while_writing_body_fails_with_500() {
        let (router, seen) = lazy_router(false);

        let (completion, recorded) = run(&router, Method::GET, "/lazy").await;
        assert!(matches!(
            completion,
            Completion::Failed { status: StatusCode::INTERNAL_SERVER_ERROR, .. }
        ));
        // The head was already committed, so no second response is written.
        assert_eq!(recorded.status, Some(StatusCode::OK));
        assert_eq!(*seen.lock().unwrap(), vec![500]);
    }

    #[tokio::test]
    async fn test_panic_before_head_writes_500() {
        let (router, seen) = lazy_router(true);

        let (completion, recorded) = run(&router, Method::GET, "/lazy").await;
        assert!(matches!(
            completion,
            Completion::Responded { status: StatusCode::INTERNAL_SERVER_ERROR, .. }
        ));
        assert_eq!(recorded.status, Some(StatusCode::INTERNAL_SERVER_ERROR));
        assert_eq!(recorded.body_str(), "Internal Server Error");
        assert_eq!(*seen.lock().unwrap(), vec![500]);
    }

    #[test]
    fn test_panic_message() {
        let panic: Box<dyn Any + Send> = Box::new("static");
        assert_eq!(panic_message(&panic), "static");
        let panic: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(&panic), "owned");
        let panic: Box<dyn Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(&panic), "unknown panic");
    }
}
