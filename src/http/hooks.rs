//! Post-response hooks.
//!
//! Hooks observe a finished request: they receive the final status code and
//! the request's storage after the body write attempt. They run in
//! registration order on the request's own task. A panicking hook is logged
//! and skipped; it never reaches the requester or the remaining hooks.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use axum::http::StatusCode;

use crate::http::context::Storage;

/// A post-completion observer.
pub type Hook = Arc<dyn Fn(StatusCode, &Storage) + Send + Sync>;

/// Wrap a closure as a [`Hook`].
pub fn hook<F>(f: F) -> Hook
where
    F: Fn(StatusCode, &Storage) + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Run `hooks` in order with the final status and storage.
pub(crate) fn run_hooks(hooks: &[Hook], status: StatusCode, storage: &Storage) {
    for (index, hook) in hooks.iter().enumerate() {
        if let Err(panic) = catch_unwind(AssertUnwindSafe(|| hook(status, storage))) {
            tracing::error!(
                hook_index = index,
                status = status.as_u16(),
                panic_message = %crate::http::dispatch::panic_message(&panic),
                "Hook panicked"
            );
        }
    }
}
