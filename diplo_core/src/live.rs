//! Socket driver and the live session that ties it to the derived views.

use diplo_proto::AnalysisEvent;
use futures_util::{SinkExt, StreamExt};
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use url::Url;

use crate::cable::{synthesize, Cable};
use crate::config::{ConfigError, DashboardConfig};
use crate::connection::{ConnectionState, LinkCommand, LinkSignal, LiveConnection, TaggedSignal};
use crate::history::EventHistory;
use crate::metrics::EmotionSeries;
use crate::transcript::TranscriptLog;
use crate::view::{compose, DashboardView, ViewSource};

/// A running socket task for one connection generation.
#[derive(Debug)]
pub struct SocketHandle {
    generation: u64,
    close_tx: Option<oneshot::Sender<()>>,
}

impl SocketHandle {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn close(mut self) {
        if let Some(close_tx) = self.close_tx.take() {
            // The task may already be gone; nothing left to close then.
            let _ = close_tx.send(());
        }
    }
}

/// Connect to `url` and forward link signals tagged with `generation`.
pub fn spawn_socket(
    runtime: &Handle,
    url: Url,
    generation: u64,
    signals: mpsc::UnboundedSender<TaggedSignal>,
) -> SocketHandle {
    let (close_tx, mut close_rx) = oneshot::channel::<()>();
    runtime.spawn(async move {
        let send = |signal: LinkSignal| {
            let _ = signals.send(TaggedSignal::new(generation, signal));
        };

        let stream = tokio::select! {
            _ = &mut close_rx => {
                tracing::debug!(target: "diplosense::socket", generation, "socket.cancelled");
                return;
            }
            result = connect_async(url.as_str()) => match result {
                Ok((stream, _)) => stream,
                Err(err) => {
                    send(LinkSignal::Error(err.to_string()));
                    send(LinkSignal::Closed);
                    return;
                }
            },
        };
        send(LinkSignal::Opened);

        let (mut write, mut read) = stream.split();
        loop {
            tokio::select! {
                _ = &mut close_rx => {
                    if let Err(err) = write.send(Message::Close(None)).await {
                        tracing::debug!(
                            target: "diplosense::socket",
                            error = %err,
                            "socket.close_failed"
                        );
                    }
                    break;
                }
                message = read.next() => match message {
                    Some(Ok(Message::Text(text))) => send(LinkSignal::Frame(text.to_string())),
                    Some(Ok(Message::Binary(bytes))) => {
                        send(LinkSignal::Frame(String::from_utf8_lossy(&bytes).into_owned()))
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        send(LinkSignal::Closed);
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(err)) => {
                        send(LinkSignal::Error(err.to_string()));
                        send(LinkSignal::Closed);
                        break;
                    }
                },
            }
        }
    });

    SocketHandle {
        generation,
        close_tx: Some(close_tx),
    }
}

/// One mounted dashboard session.
///
/// All derived state is updated synchronously on [`LiveSession::record`];
/// the socket task only ever talks to the session through its signal channel.
pub struct LiveSession {
    runtime: Handle,
    connection: LiveConnection,
    history: EventHistory,
    series: EmotionSeries,
    transcript: TranscriptLog,
    socket: Option<SocketHandle>,
    signal_tx: mpsc::UnboundedSender<TaggedSignal>,
    signal_rx: mpsc::UnboundedReceiver<TaggedSignal>,
    activity_feed_len: usize,
}

impl LiveSession {
    pub fn new(runtime: Handle, config: &DashboardConfig) -> Result<Self, ConfigError> {
        let (signal_tx, signal_rx) = mpsc::unbounded_channel();
        Ok(Self {
            runtime,
            connection: LiveConnection::new(config.ws_base_url()?),
            history: EventHistory::with_limit(config.history_limit),
            series: EmotionSeries::with_limit(config.history_limit),
            transcript: TranscriptLog::new(),
            socket: None,
            signal_tx,
            signal_rx,
            activity_feed_len: config.activity_feed_len,
        })
    }

    pub fn mount(&mut self, meeting_id: &str) {
        let commands = self.connection.mount(meeting_id);
        self.execute(commands);
    }

    /// Reconnect under a new meeting id; the history is kept.
    pub fn change_meeting(&mut self, meeting_id: &str) {
        let commands = self.connection.change_meeting(meeting_id);
        self.execute(commands);
    }

    pub fn unmount(&mut self) {
        let commands: Vec<LinkCommand> = self.connection.unmount().into_iter().collect();
        self.execute(commands);
    }

    fn execute(&mut self, commands: Vec<LinkCommand>) {
        for command in commands {
            match command {
                LinkCommand::Open { generation, url } => {
                    if let Some(previous) = self.socket.take() {
                        previous.close();
                    }
                    self.socket = Some(spawn_socket(
                        &self.runtime,
                        url,
                        generation,
                        self.signal_tx.clone(),
                    ));
                }
                LinkCommand::Close { generation } => {
                    if let Some(socket) = self.socket.take() {
                        if socket.generation() == generation {
                            socket.close();
                        } else {
                            self.socket = Some(socket);
                        }
                    }
                }
            }
        }
    }

    fn apply(&mut self, signal: TaggedSignal) -> bool {
        match self.connection.handle(signal) {
            Some(event) => {
                self.record(event);
                true
            }
            None => false,
        }
    }

    /// Drain pending signals without blocking. Returns the number of events appended.
    pub fn pump(&mut self) -> usize {
        let mut appended = 0;
        while let Ok(signal) = self.signal_rx.try_recv() {
            if self.apply(signal) {
                appended += 1;
            }
        }
        appended
    }

    /// Wait for the next signal and apply it. Returns whether it appended an event.
    pub async fn next_signal(&mut self) -> bool {
        match self.signal_rx.recv().await {
            Some(signal) => self.apply(signal),
            None => false,
        }
    }

    /// Append an event from any source and refresh the derived views.
    pub fn record(&mut self, event: AnalysisEvent) -> u64 {
        let sequence = self.history.push(event);
        self.series.fold(&self.history);
        self.transcript.fold(&self.history);
        sequence
    }

    pub fn history(&self) -> &EventHistory {
        &self.history
    }

    pub fn series(&self) -> &EmotionSeries {
        &self.series
    }

    pub fn transcript(&self) -> &TranscriptLog {
        &self.transcript
    }

    pub fn state(&self) -> ConnectionState {
        self.connection.state()
    }

    pub fn connected(&self) -> bool {
        self.connection.connected()
    }

    pub fn dropped_frames(&self) -> u64 {
        self.connection.dropped_frames()
    }

    pub fn meeting_id(&self) -> Option<&str> {
        self.connection.meeting_id()
    }

    pub fn cable(&self) -> Option<Cable> {
        synthesize(&self.history)
    }

    pub fn view(&self) -> DashboardView {
        compose(&ViewSource {
            state: self.connection.state(),
            meeting_id: self.connection.meeting_id(),
            history: &self.history,
            series: &self.series,
            transcript: &self.transcript,
            dropped_frames: self.connection.dropped_frames(),
            activity_feed_len: self.activity_feed_len,
        })
    }
}

impl Drop for LiveSession {
    fn drop(&mut self) {
        self.unmount();
    }
}
