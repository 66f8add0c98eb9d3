//! Shutdown coordination for the server.

use std::net::SocketAddr;
use std::time::Duration;

use axum_server::Handle;

use crate::http::server::ServeError;
use crate::net::InflightTracker;

/// Handle for stopping a running server.
///
/// Cheap to clone; every clone controls the same server. Obtain one with
/// [`Server::closer`](crate::Server::closer) before calling a `listen` method.
#[derive(Clone)]
pub struct Closer {
    handle: Handle,
    tracker: InflightTracker,
    grace: Duration,
}

impl Closer {
    pub(crate) fn new(grace: Duration) -> Self {
        Self {
            handle: Handle::new(),
            tracker: InflightTracker::new(),
            grace,
        }
    }

    pub(crate) fn handle(&self) -> Handle {
        self.handle.clone()
    }

    pub(crate) fn tracker(&self) -> &InflightTracker {
        &self.tracker
    }

    /// Stop accepting connections and wait for in-flight requests.
    ///
    /// Returns [`ServeError::ShutdownTimeout`] when requests are still running
    /// after the grace period; their connections are dropped.
    pub async fn close(&self) -> Result<(), ServeError> {
        tracing::info!(
            grace_secs = self.grace.as_secs_f64(),
            in_flight = self.tracker.active_count(),
            "Graceful shutdown started"
        );
        self.handle.graceful_shutdown(Some(self.grace));

        match tokio::time::timeout(self.grace, self.tracker.wait_idle()).await {
            Ok(()) => {
                tracing::info!("In-flight requests drained");
                Ok(())
            }
            Err(_) => {
                let in_flight = self.tracker.active_count();
                tracing::warn!(in_flight, "Shutdown deadline passed with requests in flight");
                Err(ServeError::ShutdownTimeout { in_flight })
            }
        }
    }

    /// The bound address once the server is listening, `None` if it failed to start.
    pub async fn listening(&self) -> Option<SocketAddr> {
        self.handle.listening().await
    }

    /// Requests currently being handled.
    pub fn in_flight(&self) -> u64 {
        self.tracker.active_count()
    }
}

impl std::fmt::Debug for Closer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Closer")
            .field("in_flight", &self.tracker.active_count())
            .field("grace", &self.grace)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn close_without_requests_is_immediate() {
        let closer = Closer::new(Duration::from_secs(5));
        tokio::time::timeout(Duration::from_secs(1), closer.close())
            .await
            .expect("close blocked")
            .unwrap();
    }

    #[tokio::test]
    async fn close_times_out_with_stuck_request() {
        let closer = Closer::new(Duration::from_millis(50));
        let _guard = closer.tracker().track();

        match closer.close().await {
            Err(ServeError::ShutdownTimeout { in_flight }) => assert_eq!(in_flight, 1),
            other => panic!("expected shutdown timeout, got {other:?}"),
        }
        assert_eq!(closer.in_flight(), 1);
    }
}
