//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Own the route registry until the server starts
//! - Configure HTTP/1.1 and HTTP/2 support
//! - Wire up middleware (tracing, limits, request ID)
//! - Bind plain or TLS listeners
//! - Run until graceful shutdown through the `Closer`

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use axum_server::Server as AxumServer;
use hyper_util::rt::TokioTimer;
use thiserror::Error;

use crate::config::{validate_config, ConfigError, ServerConfig};
use crate::http::handler::IntoChain;
use crate::http::hooks::Hook;
use crate::http::transport::{build_app, TransportState};
use crate::lifecycle::Closer;
use crate::net::tls::load_tls_config;
use crate::routing::{Group, Router};

/// hyper refuses read buffers smaller than this.
const MIN_HEADER_BUF: usize = 8192;

/// Errors from the server control surface.
#[derive(Debug, Error)]
pub enum ServeError {
    #[error("server I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to load TLS certificate {cert} / key {key}: {source}")]
    Tls {
        cert: String,
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("shutdown grace period elapsed with {in_flight} request(s) in flight")]
    ShutdownTimeout { in_flight: u64 },
}

/// The HTTP server: a route registry plus listening configuration.
///
/// Routes are registered through `&mut self`; the `listen` methods consume the
/// server, so nothing can be registered once it is running.
pub struct Server {
    router: Router,
    config: ServerConfig,
    closer: Closer,
}

impl Server {
    /// Create a server with the default configuration.
    pub fn new() -> Self {
        Self::build(ServerConfig::default())
    }

    /// Create a server with `config`, rejecting it if it does not validate.
    pub fn with_config(config: ServerConfig) -> Result<Self, ConfigError> {
        validate_config(&config).map_err(ConfigError::Validation)?;
        Ok(Self::build(config))
    }

    fn build(config: ServerConfig) -> Self {
        let closer = Closer::new(config.timeouts.shutdown_grace());
        Self {
            router: Router::new(),
            config,
            closer,
        }
    }

    /// Create a registration group rooted at `prefix`.
    pub fn group(&mut self, prefix: &str, middleware: impl IntoChain) -> Group<'_> {
        self.router.group(prefix, middleware)
    }

    /// Register a hook that runs for every request.
    pub fn hook(&mut self, hook: Hook) -> &mut Self {
        self.router.hook(hook);
        self
    }

    /// Replace the chain used for unmatched requests.
    pub fn not_found(&mut self, chain: impl IntoChain) -> &mut Self {
        self.router.not_found(chain);
        self
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn router_mut(&mut self) -> &mut Router {
        &mut self.router
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// A handle for stopping the server once it listens.
    pub fn closer(&self) -> Closer {
        self.closer.clone()
    }

    /// Serve plain HTTP on the configured host and `port`.
    pub async fn listen(self, port: u16) -> Result<(), ServeError> {
        let addr = SocketAddr::new(self.config.listener.host, port);
        self.listen_on(addr).await
    }

    /// Serve HTTPS on the configured host and `port`.
    pub async fn listen_tls(
        self,
        port: u16,
        cert: impl AsRef<Path>,
        key: impl AsRef<Path>,
    ) -> Result<(), ServeError> {
        let (cert, key) = (cert.as_ref(), key.as_ref());
        let tls = load_tls_config(cert, key)
            .await
            .map_err(|source| ServeError::Tls {
                cert: cert.display().to_string(),
                key: key.display().to_string(),
                source,
            })?;

        let addr = SocketAddr::new(self.config.listener.host, port);
        let mut server = axum_server::bind_rustls(addr, tls);
        tune(&mut server, &self.config);
        let (app, closer) = self.into_app();

        tracing::info!(address = %addr, tls = true, "HTTP server starting");
        server
            .handle(closer.handle())
            .serve(app.into_make_service_with_connect_info::<SocketAddr>())
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Serve plain HTTP on `addr`. Port 0 picks a free port; see [`Closer::listening`].
    pub async fn listen_on(self, addr: SocketAddr) -> Result<(), ServeError> {
        let mut server = axum_server::bind(addr);
        tune(&mut server, &self.config);
        let (app, closer) = self.into_app();

        tracing::info!(address = %addr, tls = false, "HTTP server starting");
        server
            .handle(closer.handle())
            .serve(app.into_make_service_with_connect_info::<SocketAddr>())
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Serve according to the `listener` section of the configuration.
    pub async fn serve(self) -> Result<(), ServeError> {
        let listener = self.config.listener.clone();
        match listener.tls {
            Some(tls) => self.listen_tls(listener.port, tls.cert_path, tls.key_path).await,
            None => self.listen_on(listener.socket_addr()).await,
        }
    }

    // Freeze the registry and build the axum application around it.
    fn into_app(self) -> (axum::Router, Closer) {
        tracing::debug!(routes = self.router.len(), "Route registry frozen");
        let state = TransportState {
            router: Arc::new(self.router),
            tracker: self.closer.tracker().clone(),
            max_body_bytes: self.config.limits.max_body_bytes,
            max_stream_buffer_bytes: self.config.limits.max_stream_buffer_bytes,
            read_timeout: self.config.timeouts.read_timeout(),
        };
        (
            build_app(state, self.config.timeouts.write_timeout()),
            self.closer,
        )
    }
}

/// Apply header limits and the header read timeout to hyper's HTTP/1 builder.
///
/// The body read deadline is enforced by the transport.
fn tune<A>(server: &mut AxumServer<A>, config: &ServerConfig) {
    let mut http1 = server.http_builder().http1();
    http1.max_buf_size(config.limits.max_header_bytes.max(MIN_HEADER_BUF));
    if let Some(read_timeout) = config.timeouts.read_timeout() {
        http1.timer(TokioTimer::new()).header_read_timeout(read_timeout);
    }
}

impl Default for Server {
    fn default() -> Self {
        Self::new()
    }
}
