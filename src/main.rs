//! httpserve demo server.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ axum-server ──▶ transport ──▶ dispatch ──▶ handler chain
//!                     (TCP/TLS)      (task/req)   (route,       (params, storage,
//!                                                  recover)      adoption)
//!     Client Response                                  │
//!     ◀──────────────────────────── writer ◀───────────┘──▶ hooks (log, metrics)
//! ```

use std::path::PathBuf;

use axum::http::StatusCode;
use clap::Parser;
use serde::Serialize;

use httpserve::config::{load_config, ServerConfig};
use httpserve::http::{from_fn, Binary, Chain, Json, Outcome, Text};
use httpserve::observability::{logging, metrics};
use httpserve::{lifecycle, Server};

#[derive(Debug, Parser)]
#[command(name = "httpserve", version, about = "Routing and dispatch demo server")]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the listener port.
    #[arg(short, long)]
    port: Option<u16>,
}

#[derive(Serialize)]
struct Health {
    status: &'static str,
    version: &'static str,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ServerConfig::default(),
    };
    if let Some(port) = cli.port {
        config.listener.port = port;
    }

    logging::init_logging(&config.observability)?;
    tracing::info!("httpserve v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        address = %config.listener.socket_addr(),
        tls = config.listener.tls.is_some(),
        read_timeout_secs = config.timeouts.read_secs,
        write_timeout_secs = config.timeouts.write_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr)?,
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let mut server = Server::with_config(config)?;
    server.hook(logging::access_log_hook());
    server.hook(metrics::metrics_hook());
    register_routes(&mut server)?;

    let closer = server.closer();
    tokio::spawn(async move {
        lifecycle::shutdown_signal().await;
        if let Err(e) = closer.close().await {
            tracing::warn!(error = %e, "Graceful shutdown incomplete");
        }
    });

    server.serve().await?;
    tracing::info!("Shutdown complete");
    Ok(())
}

fn register_routes(server: &mut Server) -> Result<(), httpserve::PatternError> {
    server.group("/", ()).get(
        "/health",
        from_fn(|_| {
            let health = Health {
                status: "ok",
                version: env!("CARGO_PKG_VERSION"),
            };
            match Json::new(StatusCode::OK, &health) {
                Ok(json) => json.into(),
                Err(e) => Text::new(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into(),
            }
        }),
    )?;

    let tag_api = from_fn(|ctx| {
        let id = ctx.request().request_id().to_string();
        ctx.put("request_id", id);
        Outcome::Continue
    });
    let mut v1 = server.group("/v1", tag_api);

    v1.get(
        "/hello/:name",
        from_fn(|ctx| {
            let name = ctx.param("name").unwrap_or("world").to_string();
            ctx.put("name", name.clone());
            Text::new(StatusCode::OK, format!("hello, {name}")).into()
        }),
    )?;

    v1.get(
        "/static/*path",
        Chain::new()
            .then(from_fn(|ctx| {
                let path = ctx.param("path").unwrap_or_default();
                if path.split('/').any(|s| s == "..") {
                    return Text::new(StatusCode::BAD_REQUEST, "invalid path").into();
                }
                Outcome::Continue
            }))
            .then(from_fn(|ctx| {
                let path = ctx.param("path").unwrap_or_default().to_string();
                match Binary::new(StatusCode::OK, "application/octet-stream", path.into_bytes()) {
                    Ok(body) => body.into(),
                    Err(e) => Text::new(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into(),
                }
            })),
    )?;

    Ok(())
}
