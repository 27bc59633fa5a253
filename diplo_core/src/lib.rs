//! Client-side pipeline for the DiploSense live-analysis dashboard.
//!
//! Incoming frames are normalized into [`AnalysisEvent`]s and appended to an
//! [`EventHistory`]. Everything the dashboard shows (emotion series, live
//! transcript, diplomatic cable, activity feed) is a fold over that history.
//! [`LiveSession`] owns the history together with the WebSocket link that
//! feeds it.

pub mod cable;
pub mod clock;
pub mod config;
pub mod connection;
mod history;
pub mod live;
pub mod metrics;
pub mod network;
pub mod risk;
pub mod transcript;
pub mod view;

pub use diplo_proto::{AnalysisEvent, EventKind, EventPayload, FrameError};

pub use cable::{synthesize, synthesize_from, Cable, CableSource, SynthesizedCable};
pub use config::{
    load_dashboard_config, load_dashboard_config_from_env, ConfigError, DashboardConfig,
};
pub use connection::{ConnectionState, LinkCommand, LinkSignal, LiveConnection, TaggedSignal};
pub use history::EventHistory;
pub use live::{spawn_socket, LiveSession, SocketHandle};
pub use metrics::{
    extract_metric, facial_breakdown, EmotionSample, EmotionSeries, FacialShare, Metric,
};
pub use network::{start_feed_server, FeedError, FeedServer};
pub use risk::{classify, RiskAssessment, RiskLevel};
pub use transcript::{append_if_new, TranscriptLog};
pub use view::{activity_detail, compose, ActivityEntry, CableSummary, DashboardView};
