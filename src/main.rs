use anyhow::{Context, Result};
use clap::Parser;
use pdfscribe::{analysis::AnalysisService, api, config, logging};
use std::sync::Arc;
use tokio::net::TcpListener;

#[derive(Parser)]
#[command(
    name = "pdfscribe",
    about = "Summarize uploaded PDFs with an OpenAI assistant"
)]
struct Args {
    /// Port to listen on; overrides SERVER_PORT.
    #[arg(long)]
    port: Option<u16>,
    /// Defer vector store and assistant bootstrap until the first request.
    #[arg(long)]
    lazy: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    config::load_env_files();
    logging::init_tracing();
    let mut config = config::init_config()
        .context("Failed to load configuration")?
        .clone();
    if args.port.is_some() {
        config.server_port = args.port;
    }
    config.lazy_bootstrap |= args.lazy;
    logging::log_config_summary(&config);

    let max_upload_bytes = config.max_upload_bytes;
    let server_port = config.server_port;
    let lazy = config.lazy_bootstrap;
    let service = Arc::new(AnalysisService::new(config));
    if lazy {
        tracing::info!("Deferring assistant bootstrap until the first request");
    } else {
        service
            .warm_up()
            .await
            .context("Failed to prepare OpenAI vector store and assistant")?;
    }
    let app = api::create_router(service, max_upload_bytes);

    let (listener, port) = bind_listener(server_port)
        .await
        .context("Failed to bind listener")?;
    tracing::info!("Listening on http://0.0.0.0:{}", port);
    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}

/// Ports tried when neither `--port` nor `SERVER_PORT` pins one.
const FALLBACK_PORTS: std::ops::RangeInclusive<u16> = 5000..=5099;

/// Bind the pinned port, or the first free port in [`FALLBACK_PORTS`].
async fn bind_listener(pinned: Option<u16>) -> Result<(TcpListener, u16), std::io::Error> {
    use std::net::Ipv4Addr;

    let candidates = match pinned {
        Some(port) => port..=port,
        None => FALLBACK_PORTS,
    };
    let mut last_busy = None;
    for port in candidates {
        match TcpListener::bind((Ipv4Addr::UNSPECIFIED, port)).await {
            Ok(listener) => return Ok((listener, port)),
            // A pinned port that is busy is reported as-is; only the fallback range keeps scanning.
            Err(err) if err.kind() == std::io::ErrorKind::AddrInUse && pinned.is_none() => {
                tracing::debug!(port, "Port busy, trying next");
                last_busy = Some(err);
            }
            Err(err) => return Err(err),
        }
    }

    Err(last_busy.unwrap_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::AddrNotAvailable,
            "No port available for the PDF analysis server",
        )
    }))
}
