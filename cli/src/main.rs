use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use cli::abr::DEFAULT_CHUNK_COUNT;
use cli::{
    Alpha, DirSink, ErrorCode, JsonLinesLog, SessionConfig, SessionError, SinkError, parse_request_timeout, run_session,
};
use tokio::net::TcpStream;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("connect to {addr} failed: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot open record log: {0}")]
    Log(#[from] SinkError),
    #[error(transparent)]
    Session(#[from] SessionError),
}

#[derive(Parser, Debug)]
#[command(name = "client", about = "Adaptive-bitrate streaming client")]
struct Cli {
    server_address: String,

    server_port: u16,

    video_id: String,

    /// EWMA weight of the newest measurement, in [0, 1].
    alpha: Alpha,

    #[arg(long, env = "ABR_CHUNKS", default_value_t = DEFAULT_CHUNK_COUNT)]
    chunks: u64,

    #[arg(long, env = "ABR_OUTPUT_DIR", default_value = "tmp")]
    output_dir: PathBuf,

    #[arg(long, env = "ABR_LOG_FILE", default_value = "log.txt")]
    log_file: PathBuf,

    /// Per-reply deadline in seconds. Unset waits indefinitely.
    #[arg(long = "timeout-secs", env = "ABR_TIMEOUT_SECS", value_parser = parse_request_timeout)]
    request_timeout: Option<Duration>,
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    let config = SessionConfig::new(cli.video_id, cli.alpha)
        .with_chunk_count(cli.chunks)
        .with_request_timeout(cli.request_timeout);

    let mut log = JsonLinesLog::create(&cli.log_file).await?;
    let sink = DirSink::new(cli.output_dir);

    let addr = format!("{}:{}", cli.server_address, cli.server_port);
    let mut stream = TcpStream::connect(&addr)
        .await
        .map_err(|source| CliError::Connect { addr: addr.clone(), source })?;
    tracing::info!(%addr, video_id = %config.video_id, alpha = config.alpha.get(), "client: connected");

    match run_session(&mut stream, &config, &sink, &mut log).await {
        Ok(report) => {
            tracing::info!(
                chunks = report.records.len(),
                misses = report.misses,
                final_bandwidth = report.final_bandwidth,
                end = ?report.end,
                "client: session finished"
            );
            Ok(())
        }
        Err(e) => {
            tracing::error!(code = e.error_code(), error = %e, "client: session failed");
            Err(e.into())
        }
    }
}
