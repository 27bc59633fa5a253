use std::path::PathBuf;
use std::sync::mpsc::{self, Sender};

use clap::Parser;
use color_eyre::Result;
use diplo_core::{load_dashboard_config, DashboardConfig};
use tokio::runtime::Handle;
use tracing::info;

mod app;
mod ui;

use app::DashboardApp;

#[derive(Clone)]
struct ChannelWriter {
    sender: Sender<String>,
}

impl std::io::Write for ChannelWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        if let Ok(text) = String::from_utf8(buf.to_vec()) {
            let _ = self.sender.send(text);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about = "DiploSense live analysis dashboard", long_about = None)]
struct Cli {
    /// Meeting to follow. Defaults to the configured meeting id.
    #[arg(long)]
    meeting: Option<String>,
    /// Base WebSocket URL; the meeting id is appended as a path segment.
    #[arg(long)]
    ws_base: Option<String>,
    /// Base URL of the analysis API.
    #[arg(long)]
    api_base: Option<String>,
    /// Dashboard config file. Falls back to DIPLOSENSE_CONFIG_PATH, then the builtin config.
    #[arg(long)]
    config: Option<PathBuf>,
}

impl Cli {
    fn apply(&self, config: &mut DashboardConfig) {
        if let Some(ws_base) = &self.ws_base {
            config.ws_base = ws_base.clone();
        }
        if let Some(api_base) = &self.api_base {
            config.api_base = api_base.clone();
        }
        if let Some(meeting) = &self.meeting {
            config.default_meeting_id = meeting.clone();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let (log_tx, log_rx) = mpsc::channel::<String>();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .compact()
        .with_writer(move || ChannelWriter {
            sender: log_tx.clone(),
        })
        .init();

    let cli = Cli::parse();
    let (mut config, _) = load_dashboard_config(cli.config.as_deref());
    cli.apply(&mut config);
    info!(
        ws_base = %config.ws_base,
        api_base = %config.api_base,
        meeting_id = %config.default_meeting_id,
        "dashboard.starting"
    );

    let runtime = Handle::current();
    tokio::task::spawn_blocking(move || -> Result<()> {
        let app = DashboardApp::new(runtime, config, log_rx)?;
        app.run()
    })
    .await??;

    Ok(())
}
