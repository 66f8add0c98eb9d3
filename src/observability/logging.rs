//! Structured logging.
//!
//! # Responsibilities
//! - Initialize logging subsystem
//! - Provide the access-log hook
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - JSON format for production, pretty format for development
//! - Log level configurable via config; `RUST_LOG` takes precedence

use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{LogFormat, ObservabilityConfig};
use crate::http::context::Storage;
use crate::http::hooks::{hook, Hook};

/// Install the global subscriber. Fails if one is already installed.
pub fn init_logging(config: &ObservabilityConfig) -> Result<(), TryInitError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    let registry = tracing_subscriber::registry().with(filter);

    match config.log_format {
        LogFormat::Pretty => registry.with(fmt::layer()).try_init(),
        LogFormat::Json => registry.with(fmt::layer().json()).try_init(),
    }
}

/// A hook that logs every completed request.
pub fn access_log_hook() -> Hook {
    hook(|status, storage| {
        let storage = format_storage(storage);
        if status.is_server_error() {
            tracing::warn!(status = status.as_u16(), %storage, "Request completed");
        } else {
            tracing::info!(status = status.as_u16(), %storage, "Request completed");
        }
    })
}

// Sorted `key=value` pairs so log lines are stable.
fn format_storage(storage: &Storage) -> String {
    let mut pairs: Vec<_> = storage.iter().collect();
    pairs.sort_unstable();
    pairs
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn storage_is_sorted() {
        let mut storage = Storage::new();
        storage.put("user", "john");
        storage.put("role", "admin");
        assert_eq!(format_storage(&storage), "role=admin user=john");
        assert_eq!(format_storage(&Storage::new()), "");
    }

    #[test]
    fn access_log_hook_runs_without_subscriber() {
        let hook = access_log_hook();
        hook(StatusCode::OK, &Storage::new());
        hook(StatusCode::BAD_GATEWAY, &Storage::new());
    }
}
