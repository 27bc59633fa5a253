//! Wire contracts for the DiploSense live-analysis feed.
//!
//! Frames arrive as loosely-typed JSON. [`decode_frame`] parses the envelope,
//! [`normalize`] maps it onto the closed [`EventKind`] set and decodes the
//! payload into an [`EventPayload`] variant. The original `data` object is kept
//! verbatim alongside the typed view.

mod payload;
mod reports;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use thiserror::Error;

pub use payload::{
    AudioPayload, CablePayload, CableRiskAssessment, CulturalDynamics, DemoPayload,
    EmotionAnalysis, EmotionReading, EventPayload, FacialPayload, OverallAssessment, TextPayload,
};
pub use reports::{NewsAnalysis, NewsSentiment, ServiceUsage, UsageRequest, UsageStats};

/// Tag emitted by older facial-analysis producers.
pub const LEGACY_FACIAL_UPDATE: &str = "facial_analysis_update";

/// Envelope exactly as it travels over the stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawFrame {
    #[serde(rename = "type")]
    pub kind: String,
    pub meeting_id: String,
    pub data: Value,
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frame_progress: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    FacialAnalysis,
    AudioAnalysis,
    DemoAnalysis,
    DiplomaticCable,
    TextAnalysis,
    VideoAnalysis,
}

impl EventKind {
    pub const ALL: [EventKind; 6] = [
        EventKind::FacialAnalysis,
        EventKind::AudioAnalysis,
        EventKind::DemoAnalysis,
        EventKind::DiplomaticCable,
        EventKind::TextAnalysis,
        EventKind::VideoAnalysis,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::FacialAnalysis => "facial_analysis",
            EventKind::AudioAnalysis => "audio_analysis",
            EventKind::DemoAnalysis => "demo_analysis",
            EventKind::DiplomaticCable => "diplomatic_cable",
            EventKind::TextAnalysis => "text_analysis",
            EventKind::VideoAnalysis => "video_analysis",
        }
    }

    /// Human-readable label used by the activity feed.
    pub fn label(self) -> &'static str {
        match self {
            EventKind::FacialAnalysis => "Facial Analysis",
            EventKind::AudioAnalysis => "Audio Analysis",
            EventKind::DemoAnalysis => "Demo Analysis",
            EventKind::DiplomaticCable => "Diplomatic Cable",
            EventKind::TextAnalysis => "Text Analysis",
            EventKind::VideoAnalysis => "Video Analysis",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = FrameError;

    /// Parses canonical tags only. Legacy aliases are rewritten by [`normalize`].
    fn from_str(tag: &str) -> Result<Self, Self::Err> {
        EventKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == tag)
            .ok_or_else(|| FrameError::UnknownType(tag.to_string()))
    }
}

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("malformed frame: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unknown event type '{0}'")]
    UnknownType(String),
}

/// Canonical, immutable analysis event.
///
/// Fields are private so that an event stored in a history can never drift
/// away from the payload decoded at construction time.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisEvent {
    kind: EventKind,
    meeting_id: String,
    timestamp: String,
    frame_progress: Option<f64>,
    data: Value,
    payload: EventPayload,
}

impl AnalysisEvent {
    pub fn new(
        kind: EventKind,
        meeting_id: impl Into<String>,
        data: Value,
        timestamp: impl Into<String>,
    ) -> Self {
        let payload = EventPayload::decode(kind, &data);
        Self {
            kind,
            meeting_id: meeting_id.into(),
            timestamp: timestamp.into(),
            frame_progress: None,
            data,
            payload,
        }
    }

    pub fn with_frame_progress(mut self, frame_progress: Option<f64>) -> Self {
        self.frame_progress = frame_progress;
        self
    }

    pub fn kind(&self) -> EventKind {
        self.kind
    }

    pub fn meeting_id(&self) -> &str {
        &self.meeting_id
    }

    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    pub fn frame_progress(&self) -> Option<f64> {
        self.frame_progress
    }

    /// Payload exactly as received.
    pub fn data(&self) -> &Value {
        &self.data
    }

    pub fn payload(&self) -> &EventPayload {
        &self.payload
    }

    /// Speech-to-text fragment carried by audio and facial events, if any.
    pub fn transcript(&self) -> Option<&str> {
        match &self.payload {
            EventPayload::Audio(audio) => audio.transcript.as_deref(),
            EventPayload::Facial(facial) => facial.transcript.as_deref(),
            _ => None,
        }
    }

    pub fn to_frame(&self) -> RawFrame {
        RawFrame {
            kind: self.kind.as_str().to_string(),
            meeting_id: self.meeting_id.clone(),
            data: self.data.clone(),
            timestamp: self.timestamp.clone(),
            frame_progress: self.frame_progress,
        }
    }
}

impl Serialize for AnalysisEvent {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_frame().serialize(serializer)
    }
}

/// Map a raw frame onto the canonical event set.
///
/// `facial_analysis_update` is rewritten to `facial_analysis`; every other
/// field passes through untouched.
pub fn normalize(mut frame: RawFrame) -> Result<AnalysisEvent, FrameError> {
    if frame.kind == LEGACY_FACIAL_UPDATE {
        frame.kind = EventKind::FacialAnalysis.as_str().to_string();
    }
    let kind: EventKind = frame.kind.parse()?;
    Ok(
        AnalysisEvent::new(kind, frame.meeting_id, frame.data, frame.timestamp)
            .with_frame_progress(frame.frame_progress),
    )
}

pub fn decode_frame(text: &str) -> Result<RawFrame, FrameError> {
    Ok(serde_json::from_str(text)?)
}

/// Parse and normalize a single text frame.
pub fn decode_event(text: &str) -> Result<AnalysisEvent, FrameError> {
    normalize(decode_frame(text)?)
}

pub fn encode_frame(frame: &RawFrame) -> serde_json::Result<String> {
    serde_json::to_string(frame)
}
