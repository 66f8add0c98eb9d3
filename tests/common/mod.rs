//! Shared utilities for integration testing.

use std::net::SocketAddr;
use std::time::Duration;

use httpserve::{Closer, ServeError, Server};
use tokio::task::JoinHandle;

/// A server running on an ephemeral local port.
pub struct TestServer {
    pub addr: SocketAddr,
    pub closer: Closer,
    pub task: JoinHandle<Result<(), ServeError>>,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Close the server and wait for `listen` to return.
    #[allow(dead_code)]
    pub async fn shutdown(self) -> Result<(), ServeError> {
        self.closer.close().await?;
        tokio::time::timeout(Duration::from_secs(5), self.task)
            .await
            .expect("server did not stop")
            .expect("server task panicked")
    }
}

/// Start `server` on `127.0.0.1:0` and wait until it is listening.
pub async fn start_server(server: Server) -> TestServer {
    let closer = server.closer();
    let bind: SocketAddr = "127.0.0.1:0".parse().unwrap();
    let task = tokio::spawn(server.listen_on(bind));

    let addr = tokio::time::timeout(Duration::from_secs(5), closer.listening())
        .await
        .expect("server did not start listening")
        .expect("server failed to bind");

    TestServer { addr, closer, task }
}

/// Poll `f` until it returns true or the deadline passes.
#[allow(dead_code)]
pub async fn wait_until(mut f: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while tokio::time::Instant::now() < deadline {
        if f() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    f()
}
