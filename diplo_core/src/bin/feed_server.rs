use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use diplo_core::network::{
    read_replay, replay, start_feed_server, FeedError, DEFAULT_FEED_ADDR,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "DiploSense analysis feed server", long_about = None)]
struct Cli {
    /// Address dashboards connect to at `/ws/{meeting_id}`.
    #[arg(long, default_value = DEFAULT_FEED_ADDR)]
    bind: SocketAddr,
    /// JSON-lines file of frames to replay. Frames are read from stdin when omitted.
    #[arg(long)]
    replay: Option<PathBuf>,
    /// Delay between replayed frames.
    #[arg(long, default_value_t = 1000)]
    interval_ms: u64,
    /// Restart the replay file when it is exhausted.
    #[arg(long = "loop")]
    looping: bool,
}

#[tokio::main]
async fn main() -> Result<(), FeedError> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let server = start_feed_server(cli.bind).await?;
    info!(
        target: "diplosense::feed",
        ws_base = %server.ws_base(),
        "DiploSense feed server ready"
    );

    match cli.replay {
        Some(path) => {
            let frames = read_replay(&path).await?;
            info!(
                target: "diplosense::feed",
                path = %path.display(),
                frames = frames.len(),
                "feed.replay_started"
            );
            let interval = Duration::from_millis(cli.interval_ms);
            tokio::select! {
                _ = replay(&server, &frames, interval, cli.looping) => {
                    info!(target: "diplosense::feed", "feed.replay_finished");
                    if let Err(err) = tokio::signal::ctrl_c().await {
                        warn!(target: "diplosense::feed", error = %err, "feed.signal_failed");
                    }
                }
                _ = tokio::signal::ctrl_c() => {}
            }
        }
        None => {
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            loop {
                tokio::select! {
                    line = lines.next_line() => match line {
                        Ok(Some(line)) => {
                            let line = line.trim();
                            if !line.is_empty() {
                                server.broadcast(line);
                            }
                        }
                        Ok(None) => break,
                        Err(err) => {
                            warn!(target: "diplosense::feed", error = %err, "feed.stdin_failed");
                            break;
                        }
                    },
                    _ = tokio::signal::ctrl_c() => break,
                }
            }
        }
    }

    server.shutdown();
    info!(target: "diplosense::feed", "feed.stopped");
    Ok(())
}
