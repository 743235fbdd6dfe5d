use std::net::SocketAddr;
use std::time::Duration;

use clap::Parser;

use hls_orchestrator::http::{AppState, HttpServer};
use hls_orchestrator::{Orchestrator, OrchestratorConfig, WorkerConfig};

#[derive(Parser, Debug)]
#[command(name = "hls-orchestrator")]
#[command(about = "RTMP publish events in, HLS segments and viewer events out", long_about = None)]
struct Args {
    /// HTTP / WebSocket listen address
    #[arg(long, env = "HTTP_ADDR", default_value = "0.0.0.0:3000")]
    http_addr: SocketAddr,

    /// Root directory of the per-stream HLS output
    #[arg(long, env = "HLS_DIR", default_value = "./hls")]
    hls_dir: String,

    /// Transcoder executable
    #[arg(long, env = "FFMPEG_PATH", default_value = "ffmpeg")]
    ffmpeg_path: String,

    /// Base URL the transcoder reads published streams from
    #[arg(long, env = "INGEST_URL", default_value = "rtmp://127.0.0.1:1935")]
    ingest_url: String,

    /// Seconds to keep HLS output after a publish stops
    #[arg(long, env = "CLEANUP_DELAY_SECS", default_value = "30")]
    cleanup_delay_secs: u64,

    /// Keep HLS output on disk when shutting down
    #[arg(long, env = "KEEP_ARTIFACTS")]
    keep_artifacts: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("hls_orchestrator=debug".parse()?)
                .add_directive("tower_http=info".parse()?),
        )
        .init();

    let worker = WorkerConfig::default()
        .program(args.ffmpeg_path)
        .ingest_url(args.ingest_url);

    let mut config = OrchestratorConfig::with_root(args.hls_dir)
        .cleanup_delay(Duration::from_secs(args.cleanup_delay_secs))
        .worker(worker);
    if args.keep_artifacts {
        config = config.keep_artifacts_on_shutdown();
    }

    let orchestrator = Orchestrator::start(config);
    let server = HttpServer::new(args.http_addr, AppState::new(orchestrator.clone()));

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for shutdown signal");
            std::future::pending::<()>().await;
        }
    };

    let result = server.run_until(shutdown).await;

    orchestrator.shutdown().await;
    result?;
    Ok(())
}
