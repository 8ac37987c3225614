use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use ingest::{Config, PathManager, RtspTransports, Server};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "rtsp-ingest",
    about = "RTSP server accepting published streams"
)]
struct Args {
    /// RTSP bind address (host:port)
    #[arg(long, short, default_value = "0.0.0.0:8554")]
    bind: String,

    /// UDP address receiving RTP from publishers
    #[arg(long, default_value = "0.0.0.0:8000")]
    udp_rtp_address: String,

    /// Accepted transports, comma separated (udp, multicast, tcp)
    #[arg(long, default_value = "udp,tcp")]
    transports: RtspTransports,

    /// Read timeout of control connections, in seconds
    #[arg(long, default_value_t = 10)]
    read_timeout: u64,

    /// Write timeout of control connections, in seconds
    #[arg(long, default_value_t = 10)]
    write_timeout: u64,

    /// Queue size of each stream reader
    #[arg(long, default_value_t = 512)]
    write_queue_size: usize,

    /// Maximum size of outgoing RTP packets, header included
    #[arg(long, default_value_t = 1472)]
    udp_max_payload_size: usize,
}

impl From<Args> for Config {
    fn from(args: Args) -> Self {
        Config {
            rtsp_address: args.bind,
            udp_rtp_address: args.udp_rtp_address,
            read_timeout: Duration::from_secs(args.read_timeout),
            write_timeout: Duration::from_secs(args.write_timeout),
            write_queue_size: args.write_queue_size,
            udp_max_payload_size: args.udp_max_payload_size,
            transports: args.transports,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let conf = Arc::new(Config::from(Args::parse()));
    if let Err(e) = conf.validate() {
        tracing::error!(error = %e, "invalid configuration");
        return ExitCode::FAILURE;
    }

    let path_manager = PathManager::new(conf.clone());
    let server = Server::new(conf.clone(), path_manager.clone());

    if let Err(e) = server.start().await {
        tracing::error!(error = %e, "failed to start server");
        path_manager.close().await;
        return ExitCode::FAILURE;
    }

    tracing::info!(addr = %conf.rtsp_address, "ready, press Ctrl-C to stop");
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
    }

    tracing::info!("shutting down");
    server.close().await;
    path_manager.close().await;
    ExitCode::SUCCESS
}
