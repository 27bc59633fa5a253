//! WebSocket feed server that fans analysis frames out to dashboard clients.
//!
//! Clients connect at `/ws/{meeting_id}` and receive every broadcast frame
//! whose `meeting_id` matches. Frames without a readable meeting id go to all
//! clients.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, watch};
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::Message;

const BROADCAST_CAPACITY: usize = 256;

/// Where the feed server listens unless told otherwise; the builtin dashboard
/// config points its `ws_base` here.
pub const DEFAULT_FEED_ADDR: &str = "127.0.0.1:8000";

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("failed to bind feed server at {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to read replay file {path:?}: {source}")]
    Replay {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Handle to a running feed server.
pub struct FeedServer {
    local_addr: SocketAddr,
    sender: broadcast::Sender<Arc<str>>,
    clients: Arc<AtomicUsize>,
    shutdown: watch::Sender<bool>,
}

impl FeedServer {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// `ws://{addr}/ws`, the base a dashboard appends its meeting id to.
    pub fn ws_base(&self) -> String {
        format!("ws://{}/ws", self.local_addr)
    }

    pub fn client_count(&self) -> usize {
        self.clients.load(Ordering::SeqCst)
    }

    /// Queue a frame for every subscribed client. Returns the receiver count.
    pub fn broadcast(&self, frame: &str) -> usize {
        match self.sender.send(Arc::from(frame)) {
            Ok(receivers) => receivers,
            Err(_) => {
                tracing::debug!(target: "diplosense::feed", "feed.no_clients");
                0
            }
        }
    }

    /// Wait until at least `count` clients have completed the handshake.
    pub async fn wait_for_clients(&self, count: usize) {
        while self.client_count() < count {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }
}

impl Drop for FeedServer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

pub async fn start_feed_server(bind_addr: SocketAddr) -> Result<FeedServer, FeedError> {
    let listener = TcpListener::bind(bind_addr)
        .await
        .map_err(|source| FeedError::Bind {
            addr: bind_addr,
            source,
        })?;
    let local_addr = listener.local_addr().map_err(|source| FeedError::Bind {
        addr: bind_addr,
        source,
    })?;

    let (sender, _) = broadcast::channel::<Arc<str>>(BROADCAST_CAPACITY);
    let (shutdown, shutdown_rx) = watch::channel(false);
    let clients = Arc::new(AtomicUsize::new(0));

    let accept_sender = sender.clone();
    let accept_clients = Arc::clone(&clients);
    let mut accept_shutdown = shutdown_rx.clone();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = accept_shutdown.changed() => break,
                accepted = listener.accept() => match accepted {
                    Ok((stream, addr)) => {
                        if let Err(err) = stream.set_nodelay(true) {
                            tracing::warn!(
                                target: "diplosense::feed",
                                %addr,
                                error = %err,
                                "feed.nodelay_failed"
                            );
                        }
                        tokio::spawn(serve_client(
                            stream,
                            addr,
                            accept_sender.subscribe(),
                            Arc::clone(&accept_clients),
                            shutdown_rx.clone(),
                        ));
                    }
                    Err(err) => {
                        tracing::error!(
                            target: "diplosense::feed",
                            error = %err,
                            "feed.accept_failed"
                        );
                        tokio::time::sleep(Duration::from_millis(200)).await;
                    }
                },
            }
        }
    });

    tracing::info!(target: "diplosense::feed", addr = %local_addr, "feed.listening");
    Ok(FeedServer {
        local_addr,
        sender,
        clients,
        shutdown,
    })
}

/// Last non-empty path segment of a `/ws/{meeting_id}` request.
fn meeting_from_path(path: &str) -> Option<String> {
    path.split('?')
        .next()
        .and_then(|path| path.rsplit('/').find(|segment| !segment.is_empty()))
        .filter(|segment| *segment != "ws")
        .map(str::to_string)
}

/// Whether a frame addressed by its `meeting_id` should reach `meeting`.
pub fn frame_matches(frame: &str, meeting: &str) -> bool {
    match serde_json::from_str::<Value>(frame) {
        Ok(value) => match value.get("meeting_id").and_then(Value::as_str) {
            Some(target) => target == meeting,
            None => true,
        },
        Err(_) => true,
    }
}

async fn serve_client(
    stream: TcpStream,
    addr: SocketAddr,
    mut frames: broadcast::Receiver<Arc<str>>,
    clients: Arc<AtomicUsize>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut meeting: Option<String> = None;
    let callback = |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
        meeting = meeting_from_path(request.uri().path());
        Ok(response)
    };
    let socket = match accept_hdr_async(stream, callback).await {
        Ok(socket) => socket,
        Err(err) => {
            tracing::warn!(
                target: "diplosense::feed",
                %addr,
                error = %err,
                "feed.handshake_failed"
            );
            return;
        }
    };
    let Some(meeting) = meeting else {
        tracing::warn!(target: "diplosense::feed", %addr, "feed.missing_meeting");
        return;
    };

    clients.fetch_add(1, Ordering::SeqCst);
    tracing::info!(target: "diplosense::feed", %addr, meeting = %meeting, "feed.client_connected");
    let (mut write, mut read) = socket.split();

    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                let _ = write.send(Message::Close(None)).await;
                break;
            }
            frame = frames.recv() => match frame {
                Ok(frame) => {
                    if !frame_matches(&frame, &meeting) {
                        continue;
                    }
                    if let Err(err) = write.send(Message::text(&*frame)).await {
                        tracing::warn!(
                            target: "diplosense::feed",
                            %addr,
                            error = %err,
                            "feed.client_dropped"
                        );
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(
                        target: "diplosense::feed",
                        %addr,
                        skipped,
                        "feed.client_lagged"
                    );
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            incoming = read.next() => match incoming {
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                Some(Ok(_)) => {}
            },
        }
    }

    clients.fetch_sub(1, Ordering::SeqCst);
    tracing::info!(target: "diplosense::feed", %addr, "feed.client_disconnected");
}

/// Non-empty lines of a JSON-lines replay file.
pub async fn read_replay(path: &Path) -> Result<Vec<String>, FeedError> {
    let contents = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| FeedError::Replay {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}

/// Broadcast `frames` in order, `interval` apart, optionally looping forever.
pub async fn replay(server: &FeedServer, frames: &[String], interval: Duration, looping: bool) {
    loop {
        for frame in frames {
            let receivers = server.broadcast(frame);
            tracing::debug!(target: "diplosense::feed", receivers, "feed.frame_sent");
            tokio::time::sleep(interval).await;
        }
        if !looping || frames.is_empty() {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn meeting_is_last_path_segment() {
        assert_eq!(meeting_from_path("/ws/summit-7").as_deref(), Some("summit-7"));
        assert_eq!(meeting_from_path("/ws/summit-7/").as_deref(), Some("summit-7"));
        assert_eq!(meeting_from_path("/ws/m1?token=x").as_deref(), Some("m1"));
        assert_eq!(meeting_from_path("/ws"), None);
        assert_eq!(meeting_from_path("/"), None);
    }

    #[test]
    fn builtin_dashboard_reaches_default_feed() {
        let ws_base = crate::config::DashboardConfig::builtin().ws_base_url().unwrap();
        let feed: SocketAddr = DEFAULT_FEED_ADDR.parse().unwrap();
        assert_eq!(ws_base.port(), Some(feed.port()));
        assert!(matches!(ws_base.host_str(), Some("localhost" | "127.0.0.1")));
    }

    #[test]
    fn frames_route_by_meeting() {
        let frame = r#"{"type":"demo_analysis","meeting_id":"m1","data":{},"timestamp":"t"}"#;
        assert!(frame_matches(frame, "m1"));
        assert!(!frame_matches(frame, "m2"));
        assert!(frame_matches(r#"{"type":"demo_analysis"}"#, "m2"));
        assert!(frame_matches("garbage", "m2"));
    }

    #[tokio::test]
    async fn broadcast_without_clients_reaches_nobody() {
        let server = start_feed_server("127.0.0.1:0".parse().unwrap())
            .await
            .unwrap();
        assert_ne!(server.local_addr().port(), 0);
        assert_eq!(server.broadcast("{}"), 0);
        assert_eq!(server.client_count(), 0);
        server.shutdown();
    }
}
