//! Sans-IO live connection state machine.
//!
//! [`LiveConnection`] never touches a socket. It emits [`LinkCommand`]s for a
//! driver to execute and consumes [`TaggedSignal`]s the driver reports back.
//! Every opened link gets a fresh generation; signals carrying any other
//! generation belong to a torn-down link and are ignored.

use diplo_proto::{decode_event, AnalysisEvent};
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Idle,
    Connecting,
    Open,
    Erroring,
    Closed,
}

impl ConnectionState {
    pub fn label(self) -> &'static str {
        match self {
            ConnectionState::Idle => "Idle",
            ConnectionState::Connecting => "Connecting",
            ConnectionState::Open => "Connected",
            ConnectionState::Erroring => "Error",
            ConnectionState::Closed => "Disconnected",
        }
    }

    fn is_live(self) -> bool {
        matches!(
            self,
            ConnectionState::Connecting | ConnectionState::Open | ConnectionState::Erroring
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkSignal {
    Opened,
    Frame(String),
    Error(String),
    Closed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaggedSignal {
    pub generation: u64,
    pub signal: LinkSignal,
}

impl TaggedSignal {
    pub fn new(generation: u64, signal: LinkSignal) -> Self {
        Self { generation, signal }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkCommand {
    Open { generation: u64, url: Url },
    Close { generation: u64 },
}

#[derive(Debug, Clone)]
pub struct LiveConnection {
    ws_base: Url,
    meeting_id: Option<String>,
    generation: u64,
    state: ConnectionState,
    dropped_frames: u64,
}

impl LiveConnection {
    pub fn new(ws_base: Url) -> Self {
        Self {
            ws_base,
            meeting_id: None,
            generation: 0,
            state: ConnectionState::Idle,
            dropped_frames: 0,
        }
    }

    /// `{ws_base}/{meeting_id}`, with the meeting id as a single path segment.
    pub fn meeting_url(&self, meeting_id: &str) -> Url {
        let mut url = self.ws_base.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(meeting_id);
        }
        url
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn connected(&self) -> bool {
        self.state == ConnectionState::Open
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn meeting_id(&self) -> Option<&str> {
        self.meeting_id.as_deref()
    }

    pub fn dropped_frames(&self) -> u64 {
        self.dropped_frames
    }

    /// Open a link for `meeting_id`, closing any link still live.
    pub fn mount(&mut self, meeting_id: &str) -> Vec<LinkCommand> {
        let mut commands = Vec::with_capacity(2);
        commands.extend(self.unmount());
        self.generation += 1;
        self.meeting_id = Some(meeting_id.to_string());
        self.state = ConnectionState::Connecting;
        tracing::info!(
            target: "diplosense::connection",
            meeting_id,
            generation = self.generation,
            "connection.connecting"
        );
        commands.push(LinkCommand::Open {
            generation: self.generation,
            url: self.meeting_url(meeting_id),
        });
        commands
    }

    /// Switch meetings. A no-op while a link for the same meeting is live.
    pub fn change_meeting(&mut self, meeting_id: &str) -> Vec<LinkCommand> {
        if self.meeting_id.as_deref() == Some(meeting_id)
            && matches!(
                self.state,
                ConnectionState::Connecting | ConnectionState::Open
            )
        {
            return Vec::new();
        }
        self.mount(meeting_id)
    }

    /// Close the current link whatever phase it is in.
    pub fn unmount(&mut self) -> Option<LinkCommand> {
        if !self.state.is_live() {
            return None;
        }
        let generation = self.generation;
        self.state = ConnectionState::Closed;
        tracing::info!(
            target: "diplosense::connection",
            generation,
            "connection.closing"
        );
        Some(LinkCommand::Close { generation })
    }

    /// Apply a driver signal; returns the event a valid frame carried.
    pub fn handle(&mut self, tagged: TaggedSignal) -> Option<AnalysisEvent> {
        if tagged.generation != self.generation || !self.state.is_live() {
            tracing::debug!(
                target: "diplosense::connection",
                generation = tagged.generation,
                current = self.generation,
                "connection.stale_signal"
            );
            return None;
        }

        match tagged.signal {
            LinkSignal::Opened => {
                if self.state == ConnectionState::Connecting {
                    self.state = ConnectionState::Open;
                    tracing::info!(
                        target: "diplosense::connection",
                        generation = self.generation,
                        "connection.opened"
                    );
                }
                None
            }
            LinkSignal::Frame(text) => {
                if self.state != ConnectionState::Open {
                    return None;
                }
                match decode_event(&text) {
                    Ok(event) => Some(event),
                    Err(err) => {
                        self.dropped_frames += 1;
                        tracing::warn!(
                            target: "diplosense::connection",
                            error = %err,
                            dropped = self.dropped_frames,
                            "feed.frame_dropped"
                        );
                        None
                    }
                }
            }
            LinkSignal::Error(message) => {
                self.state = ConnectionState::Erroring;
                tracing::warn!(
                    target: "diplosense::connection",
                    generation = self.generation,
                    error = %message,
                    "connection.error"
                );
                None
            }
            LinkSignal::Closed => {
                self.state = ConnectionState::Closed;
                tracing::info!(
                    target: "diplosense::connection",
                    generation = self.generation,
                    "connection.closed"
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use diplo_proto::EventKind;

    const FRAME: &str = concat!(
        r#"{"type":"facial_analysis_update","meeting_id":"m1","#,
        r#""data":{},"timestamp":"t"}"#
    );

    fn connection() -> LiveConnection {
        LiveConnection::new(Url::parse("ws://localhost:8000/ws").unwrap())
    }

    fn open(connection: &mut LiveConnection, meeting_id: &str) -> u64 {
        let commands = connection.mount(meeting_id);
        let generation = connection.generation();
        connection.handle(TaggedSignal::new(generation, LinkSignal::Opened));
        assert!(matches!(commands.last(), Some(LinkCommand::Open { .. })));
        generation
    }

    #[test]
    fn mount_targets_meeting_url() {
        let mut connection = connection();
        let commands = connection.mount("summit 1");
        assert_eq!(
            commands,
            vec![LinkCommand::Open {
                generation: 1,
                url: Url::parse("ws://localhost:8000/ws/summit%201").unwrap(),
            }]
        );
        assert_eq!(connection.state(), ConnectionState::Connecting);
        assert!(!connection.connected());
    }

    #[test]
    fn trailing_slash_base_does_not_double_separator() {
        let connection = LiveConnection::new(Url::parse("ws://host/ws/").unwrap());
        assert_eq!(connection.meeting_url("m1").as_str(), "ws://host/ws/m1");
    }

    #[test]
    fn frames_become_events_once_open() {
        let mut connection = connection();
        let generation = open(&mut connection, "m1");
        assert!(connection.connected());

        let event = connection
            .handle(TaggedSignal::new(generation, LinkSignal::Frame(FRAME.into())))
            .unwrap();
        assert_eq!(event.kind(), EventKind::FacialAnalysis);
    }

    #[test]
    fn malformed_frames_are_counted_and_dropped() {
        let mut connection = connection();
        let generation = open(&mut connection, "m1");
        let mystery = r#"{"type":"mystery","meeting_id":"m","data":{},"timestamp":"t"}"#;
        for bad in ["not json", mystery] {
            assert!(connection
                .handle(TaggedSignal::new(generation, LinkSignal::Frame(bad.into())))
                .is_none());
        }
        assert_eq!(connection.dropped_frames(), 2);
        assert!(connection.connected());
        assert!(connection
            .handle(TaggedSignal::new(generation, LinkSignal::Frame(FRAME.into())))
            .is_some());
    }

    #[test]
    fn error_disconnects_without_reconnecting() {
        let mut connection = connection();
        let generation = open(&mut connection, "m1");
        connection.handle(TaggedSignal::new(generation, LinkSignal::Error("reset".into())));
        assert_eq!(connection.state(), ConnectionState::Erroring);
        assert!(!connection.connected());
        connection.handle(TaggedSignal::new(generation, LinkSignal::Closed));
        assert_eq!(connection.state(), ConnectionState::Closed);
        assert_eq!(connection.generation(), generation);
    }

    #[test]
    fn unmount_while_connecting_closes() {
        let mut connection = connection();
        connection.mount("m1");
        assert_eq!(connection.unmount(), Some(LinkCommand::Close { generation: 1 }));
        assert_eq!(connection.state(), ConnectionState::Closed);
        // a late open from the cancelled attempt changes nothing
        connection.handle(TaggedSignal::new(1, LinkSignal::Opened));
        assert_eq!(connection.state(), ConnectionState::Closed);
        assert_eq!(connection.unmount(), None);
    }

    #[test]
    fn meeting_change_ignores_stale_generation() {
        let mut connection = connection();
        let old = open(&mut connection, "m1");
        let commands = connection.change_meeting("m2");
        assert_eq!(commands[0], LinkCommand::Close { generation: old });
        assert!(matches!(commands[1], LinkCommand::Open { generation: 2, .. }));

        assert!(connection
            .handle(TaggedSignal::new(old, LinkSignal::Frame(FRAME.into())))
            .is_none());
        connection.handle(TaggedSignal::new(old, LinkSignal::Closed));
        assert_eq!(connection.state(), ConnectionState::Connecting);
        assert_eq!(connection.dropped_frames(), 0);
        assert_eq!(connection.meeting_id(), Some("m2"));
    }

    #[test]
    fn change_to_same_live_meeting_is_noop() {
        let mut connection = connection();
        open(&mut connection, "m1");
        assert!(connection.change_meeting("m1").is_empty());
        assert!(connection.connected());
    }
}
