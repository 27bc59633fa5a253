use diplo_proto::{AnalysisEvent, EventPayload, FacialPayload};
use serde::Serialize;

use crate::cable::synthesize;
use crate::clock::timestamp_label;
use crate::connection::ConnectionState;
use crate::history::EventHistory;
use crate::metrics::{facial_breakdown, EmotionSample, EmotionSeries, FacialShare};
use crate::transcript::TranscriptLog;

const TRANSCRIPT_PREVIEW_CHARS: usize = 50;
pub const NOT_AVAILABLE: &str = "N/A";

/// Borrowed session state a view is composed from.
#[derive(Debug, Clone, Copy)]
pub struct ViewSource<'a> {
    pub state: ConnectionState,
    pub meeting_id: Option<&'a str>,
    pub history: &'a EventHistory,
    pub series: &'a EmotionSeries,
    pub transcript: &'a TranscriptLog,
    pub dropped_frames: u64,
    pub activity_feed_len: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActivityEntry {
    /// History sequence number, for looking the event back up.
    pub sequence: u64,
    pub label: &'static str,
    pub time_label: String,
    pub summary: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CableSummary {
    pub source: &'static str,
    pub risk_level: String,
    pub executive_summary: String,
    pub reasons: Vec<String>,
    pub recommendations: Vec<String>,
    pub cultural_notes: Vec<String>,
    pub transcript_based: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardView {
    pub status: &'static str,
    pub connected: bool,
    pub meeting_id: Option<String>,
    pub emotion: String,
    pub stress: String,
    pub series: Vec<EmotionSample>,
    pub facial: Vec<FacialShare>,
    pub cable: Option<CableSummary>,
    /// Newest first.
    pub activity: Vec<ActivityEntry>,
    pub transcript: String,
    /// `frame_progress` of the most recent event that carried one.
    pub frame_progress: Option<f64>,
    pub event_count: usize,
    pub dropped_frames: u64,
}

pub fn emotion_display(sample: Option<&EmotionSample>) -> String {
    sample.map_or_else(|| NOT_AVAILABLE.to_string(), |s| format!("{:.2}", s.emotion))
}

pub fn stress_display(sample: Option<&EmotionSample>) -> String {
    sample.map_or_else(
        || NOT_AVAILABLE.to_string(),
        |s| format!("{:.0}%", s.stress * 100.0),
    )
}

pub fn activity_summary(event: &AnalysisEvent) -> String {
    match event.payload() {
        EventPayload::Facial(facial) => {
            if let Some(emotions) = facial.usable_emotions() {
                let names: Vec<&str> = emotions
                    .iter()
                    .filter_map(|reading| reading.emotion.as_deref())
                    .collect();
                return format!("Detected: {}", names.join(", "));
            }
        }
        EventPayload::Audio(audio) => {
            if let Some(transcript) = audio.transcript.as_deref().filter(|t| !t.is_empty()) {
                let preview: String = transcript.chars().take(TRANSCRIPT_PREVIEW_CHARS).collect();
                return format!("\"{preview}...\"");
            }
        }
        EventPayload::Demo(demo) => {
            if demo.overall_assessment.is_some() {
                return format!("Tension: {}", demo.tension_level().unwrap_or("unknown"));
            }
        }
        _ => {}
    }
    "Analysis complete".to_string()
}

fn push_list(lines: &mut Vec<String>, heading: &str, items: Option<&[String]>) {
    let Some(items) = items.filter(|items| !items.is_empty()) else {
        return;
    };
    lines.push(format!("{heading}:"));
    lines.extend(items.iter().map(|item| format!("  - {item}")));
}

fn facial_detail(lines: &mut Vec<String>, facial: &FacialPayload) {
    if let Some(emotions) = facial.usable_emotions() {
        lines.push("Emotions:".to_string());
        for reading in emotions {
            lines.push(format!(
                "  {}: {:.0}%",
                reading.emotion.as_deref().unwrap_or("unknown"),
                reading.confidence.unwrap_or(0.0) * 100.0
            ));
        }
    }
    push_list(lines, "Microexpressions", facial.microexpressions.as_deref());
    if let Some(score) = facial.overall_confidence_score {
        lines.push(format!("Overall confidence: {:.0}%", score * 100.0));
    }
    if let Some(frame_time) = facial.frame_time {
        lines.push(format!("Frame time: {frame_time:.1}s"));
    }
    if let Some(transcript) = facial.transcript.as_deref() {
        lines.push(format!("Transcript: {transcript}"));
    }
}

/// Every field worth showing for one event, one line each.
///
/// Events with nothing recognisable fall back to the raw payload.
pub fn activity_detail(event: &AnalysisEvent) -> Vec<String> {
    let mut lines = vec![
        format!("{} Details", event.kind().label()),
        format!("Timestamp: {}", event.timestamp()),
        format!("Meeting ID: {}", event.meeting_id()),
    ];
    let header = lines.len();

    match event.payload() {
        EventPayload::Facial(facial) | EventPayload::Video(facial) => {
            facial_detail(&mut lines, facial)
        }
        EventPayload::Audio(audio) => {
            if let Some(transcript) = audio.transcript.as_deref() {
                lines.push(format!("Transcript: {transcript}"));
            }
            if let Some(tone) = audio.tone.as_deref() {
                lines.push(format!("Tone: {tone}"));
            }
            let analysis = audio.emotion_analysis.as_ref();
            if let Some(score) = audio
                .emotion_score
                .or_else(|| analysis.and_then(|a| a.emotion_score))
            {
                lines.push(format!("Emotion score: {score:.2}"));
            }
            if let Some(stress) = audio
                .stress_level
                .or_else(|| analysis.and_then(|a| a.stress_level))
            {
                lines.push(format!("Stress level: {:.0}%", stress * 100.0));
            }
            if let Some(language) = audio.source_language() {
                lines.push(format!("Language: {language}"));
            }
            if audio.was_translated() {
                lines.push("Translated before analysis".to_string());
            }
        }
        EventPayload::Demo(demo) => {
            if let Some(assessment) = demo.overall_assessment.as_ref() {
                if let Some(tension) = assessment.tension_level.as_deref() {
                    lines.push(format!("Tension Level: {tension}"));
                }
                if let Some(probability) = assessment.cooperation_probability {
                    lines.push(format!(
                        "Cooperation Probability: {:.0}%",
                        probability * 100.0
                    ));
                }
                push_list(&mut lines, "Key Insights", assessment.key_insights.as_deref());
            }
            push_list(
                &mut lines,
                "Recommended Adjustments",
                demo.cultural_dynamics
                    .as_ref()
                    .and_then(|dynamics| dynamics.recommended_adjustments.as_deref()),
            );
        }
        EventPayload::Cable(cable) => {
            if let Some(summary) = cable.executive_summary() {
                lines.push(format!("Executive Summary: {summary}"));
            }
            if let Some(level) = cable.risk_level() {
                lines.push(format!("Risk Level: {level}"));
            }
            push_list(&mut lines, "Recommendations", Some(cable.recommendations()));
            push_list(&mut lines, "Cultural Context", Some(cable.cultural_notes().as_slice()));
        }
        EventPayload::Text(text) => {
            if let Some(sentiment) = text.sentiment.as_deref() {
                lines.push(format!("Sentiment: {sentiment}"));
            }
            if let Some(polarity) = text.polarity {
                lines.push(format!("Polarity: {polarity:.2}"));
            }
            push_list(&mut lines, "Cultural Flags", text.cultural_flags.as_deref());
        }
    }

    if let Some(progress) = event.frame_progress() {
        lines.push(format!("Frame progress: {:.0}%", progress * 100.0));
    }
    if lines.len() == header {
        lines.push("Raw data:".to_string());
        let raw = serde_json::to_string_pretty(event.data()).unwrap_or_default();
        lines.extend(raw.lines().map(|line| format!("  {line}")));
    }
    lines
}

pub fn compose(source: &ViewSource<'_>) -> DashboardView {
    let latest = source.series.latest();
    let cable = synthesize(source.history).map(|cable| CableSummary {
        source: cable.source_label(),
        risk_level: cable
            .risk_level_label()
            .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
        executive_summary: cable.executive_summary().unwrap_or_default(),
        reasons: cable.reasons(),
        recommendations: cable.recommendations(),
        cultural_notes: cable.cultural_notes(),
        transcript_based: cable.transcript_based(),
    });
    let newest = source.history.appended();
    let activity = source
        .history
        .iter()
        .rev()
        .take(source.activity_feed_len)
        .enumerate()
        .map(|(offset, event)| ActivityEntry {
            sequence: newest - 1 - offset as u64,
            label: event.kind().label(),
            time_label: timestamp_label(event.timestamp()),
            summary: activity_summary(event),
        })
        .collect();
    let frame_progress = source
        .history
        .iter()
        .rev()
        .find_map(AnalysisEvent::frame_progress);

    DashboardView {
        status: source.state.label(),
        connected: source.state == ConnectionState::Open,
        meeting_id: source.meeting_id.map(str::to_string),
        emotion: emotion_display(latest),
        stress: stress_display(latest),
        series: source.series.samples().cloned().collect(),
        facial: facial_breakdown(source.history),
        cable,
        activity,
        transcript: source.transcript.as_str().to_string(),
        frame_progress,
        event_count: source.history.len(),
        dropped_frames: source.dropped_frames,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use diplo_proto::EventKind;
    use serde_json::{json, Value};

    fn event(kind: EventKind, data: Value) -> AnalysisEvent {
        AnalysisEvent::new(kind, "m", data, "2025-06-03T12:00:00Z")
    }

    fn view_of(history: &EventHistory, state: ConnectionState, feed_len: usize) -> DashboardView {
        let mut series = EmotionSeries::new();
        series.fold(history);
        let mut transcript = TranscriptLog::new();
        transcript.fold(history);
        compose(&ViewSource {
            state,
            meeting_id: Some("m"),
            history,
            series: &series,
            transcript: &transcript,
            dropped_frames: 1,
            activity_feed_len: feed_len,
        })
    }

    #[test]
    fn summaries_follow_payload_shape() {
        let facial = event(
            EventKind::FacialAnalysis,
            json!({"emotions": [
                {"emotion": "happy", "confidence": 0.5},
                {"emotion": "calm", "confidence": 0.2}
            ]}),
        );
        assert_eq!(activity_summary(&facial), "Detected: happy, calm");

        let long = "a".repeat(80);
        let audio = event(EventKind::AudioAnalysis, json!({ "transcript": long }));
        assert_eq!(activity_summary(&audio), format!("\"{}...\"", "a".repeat(50)));

        let demo = event(
            EventKind::DemoAnalysis,
            json!({"overall_assessment": {"tension_level": "moderate"}}),
        );
        assert_eq!(activity_summary(&demo), "Tension: moderate");

        assert_eq!(
            activity_summary(&event(EventKind::TextAnalysis, json!({"sentiment": 0.2}))),
            "Analysis complete"
        );
        assert_eq!(
            activity_summary(&event(EventKind::FacialAnalysis, json!({"emotions": 3}))),
            "Analysis complete"
        );
    }

    #[test]
    fn empty_session_shows_placeholders() {
        let history = EventHistory::new();
        let series = EmotionSeries::new();
        let transcript = TranscriptLog::new();
        let view = compose(&ViewSource {
            state: ConnectionState::Idle,
            meeting_id: None,
            history: &history,
            series: &series,
            transcript: &transcript,
            dropped_frames: 0,
            activity_feed_len: 5,
        });
        assert_eq!(view.emotion, NOT_AVAILABLE);
        assert_eq!(view.stress, NOT_AVAILABLE);
        assert!(view.cable.is_none());
        assert!(view.activity.is_empty());
        assert!(view.frame_progress.is_none());
        assert!(!view.connected);
    }

    #[test]
    fn activity_is_newest_first_and_capped() {
        let mut history = EventHistory::new();
        history.push(event(
            EventKind::DemoAnalysis,
            json!({"overall_assessment": {"tension_level": "high"}}),
        ));
        history.push(event(EventKind::TextAnalysis, json!({})));
        history.push(event(
            EventKind::FacialAnalysis,
            json!({"emotions": [{"emotion": "calm", "confidence": 0.9}]}),
        ));

        let view = view_of(&history, ConnectionState::Open, 2);
        let labels: Vec<_> = view.activity.iter().map(|entry| entry.label).collect();
        assert_eq!(labels, vec!["Facial Analysis", "Text Analysis"]);
        let sequences: Vec<_> = view.activity.iter().map(|entry| entry.sequence).collect();
        assert_eq!(sequences, vec![2, 1]);
        assert_eq!(view.series.len(), 2);
        assert_eq!(view.emotion, "0.90");
        assert_eq!(view.stress, "10%");
        assert_eq!(view.status, "Connected");
        assert_eq!(view.cable.unwrap().risk_level, "Low");
    }

    #[test]
    fn cable_summary_carries_reasons_and_cultural_notes() {
        let mut history = EventHistory::new();
        history.push(event(
            EventKind::AudioAnalysis,
            json!({
                "transcript": "We appreciate the cooperation",
                "original_transcript": "Nous apprécions la coopération",
                "detected_language": "fr"
            }),
        ));

        let cable = view_of(&history, ConnectionState::Open, 5).cable.unwrap();
        assert_eq!(cable.source, "audio analysis");
        assert!(cable.transcript_based);
        assert!(cable.reasons[0].starts_with("Transcript analysis indicates"));
        assert_eq!(
            cable.cultural_notes,
            vec![
                "Detected source language: fr".to_string(),
                "Transcript was translated before analysis".to_string(),
            ]
        );

        let serialized = serde_json::to_string(&cable).unwrap();
        assert!(serialized.contains("Detected source language: fr"));
    }

    #[test]
    fn latest_frame_progress_is_shown() {
        let mut history = EventHistory::new();
        history.push(
            event(EventKind::FacialAnalysis, json!({})).with_frame_progress(Some(0.3)),
        );
        history.push(event(EventKind::TextAnalysis, json!({})));
        assert_eq!(
            view_of(&history, ConnectionState::Open, 5).frame_progress,
            Some(0.3)
        );
    }

    #[test]
    fn detail_lists_payload_fields() {
        let demo = event(
            EventKind::DemoAnalysis,
            json!({"overall_assessment": {
                "tension_level": "moderate",
                "cooperation_probability": 0.65,
                "key_insights": ["Both sides seek a face-saving exit"]
            }}),
        );
        let lines = activity_detail(&demo);
        assert_eq!(lines[0], "Demo Analysis Details");
        assert!(lines.contains(&"Tension Level: moderate".to_string()));
        assert!(lines.contains(&"Cooperation Probability: 65%".to_string()));
        assert!(lines.contains(&"  - Both sides seek a face-saving exit".to_string()));

        let audio = event(
            EventKind::AudioAnalysis,
            json!({"transcript": "We object", "tone": "firm", "stress_level": 0.4}),
        );
        let lines = activity_detail(&audio);
        assert!(lines.contains(&"Tone: firm".to_string()));
        assert!(lines.contains(&"Stress level: 40%".to_string()));

        let text = event(
            EventKind::TextAnalysis,
            json!({"sentiment": "positive", "polarity": 0.4, "cultural_flags": ["formal"]}),
        );
        let lines = activity_detail(&text);
        assert!(lines.contains(&"Sentiment: positive".to_string()));
        assert!(lines.contains(&"Polarity: 0.40".to_string()));
        assert!(lines.contains(&"  - formal".to_string()));

        let facial = event(
            EventKind::FacialAnalysis,
            json!({"emotions": [{"emotion": "tense", "confidence": 0.5}], "frame_time": 12.0}),
        )
        .with_frame_progress(Some(0.5));
        let lines = activity_detail(&facial);
        assert!(lines.contains(&"  tense: 50%".to_string()));
        assert!(lines.contains(&"Frame time: 12.0s".to_string()));
        assert!(lines.contains(&"Frame progress: 50%".to_string()));
    }

    #[test]
    fn unrecognised_detail_falls_back_to_raw_data() {
        let lines = activity_detail(&event(EventKind::TextAnalysis, json!({"label": "x"})));
        assert_eq!(lines[3], "Raw data:");
        assert!(lines.iter().any(|line| line.contains("\"label\": \"x\"")));
    }
}
