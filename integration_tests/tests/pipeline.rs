mod common;

use anyhow::Result;
use diplo_core::{
    append_if_new, classify, synthesize, Cable, EmotionSeries, EventHistory, EventKind,
    LinkSignal, LiveConnection, RiskLevel, TaggedSignal, TranscriptLog,
};
use serde_json::json;

use common::event;

#[test]
fn explicit_cable_wins_and_series_keeps_arrival_order() {
    let mut history = EventHistory::new();
    history.push(event(
        EventKind::DemoAnalysis,
        json!({"overall_assessment": {"tension_level": "moderate"}}),
        "2025-06-03T12:00:00Z",
    ));
    history.push(event(
        EventKind::FacialAnalysis,
        json!({"emotions": [{"emotion": "fear", "confidence": 0.7}]}),
        "2025-06-03T12:00:05Z",
    ));
    let cable = json!({
        "risk_assessment": {"risk_level": "High"},
        "executive_summary": "Talks stalled."
    });
    history.push(event(
        EventKind::DiplomaticCable,
        cable.clone(),
        "2025-06-03T12:00:10Z",
    ));

    assert_eq!(synthesize(&history), Some(Cable::Received(cable)));

    let mut series = EmotionSeries::new();
    series.fold(&history);
    let samples: Vec<_> = series.samples().collect();
    assert_eq!(samples.len(), 2);
    assert_eq!((samples[0].emotion, samples[0].stress), (0.1, 0.5));
    assert!((samples[1].emotion + 0.7).abs() < 1e-9);
    assert!((samples[1].stress - 0.7).abs() < 1e-9);
    assert_eq!(samples[0].timestamp_label, "12:00:00");
    assert_eq!(samples[1].sequence_index, 1);
}

#[test]
fn rejected_sanctions_transcript_drives_the_cable() -> Result<()> {
    let mut history = EventHistory::new();
    history.push(event(
        EventKind::AudioAnalysis,
        json!({"transcript": "We must reject these sanctions"}),
        "2025-06-03T12:00:00Z",
    ));

    let Some(Cable::Synthesized(cable)) = synthesize(&history) else {
        anyhow::bail!("expected a synthesized cable");
    };
    assert!(cable.risk_level >= RiskLevel::Medium);
    assert!(cable.transcript_based);
    assert!(!cable.recommendations.is_empty());
    Ok(())
}

#[test]
fn threat_vocabulary_is_never_low() {
    for text in [
        "This is a threat to the region",
        "We will impose sanctions",
        "An act of war",
    ] {
        assert_ne!(classify(text).level, RiskLevel::Low, "{text}");
    }
    let empty = classify("   ");
    assert_eq!(empty.level, RiskLevel::Low);
    assert_eq!(empty.reasons, vec!["No transcript available".to_string()]);
}

#[test]
fn malformed_frames_do_not_block_later_events() -> Result<()> {
    let mut connection = LiveConnection::new("ws://localhost:8000/ws".parse()?);
    connection.mount("integration-meeting");
    let generation = connection.generation();
    connection.handle(TaggedSignal::new(generation, LinkSignal::Opened));

    let frames = [
        "{",
        r#"{"type":"facial_analysis","meeting_id":"integration-meeting","timestamp":"t"}"#,
        concat!(
            r#"{"type":"facial_analysis","meeting_id":"integration-meeting","#,
            r#""data":{"emotions":"broken"},"timestamp":"2025-06-03T12:00:00Z"}"#
        ),
        concat!(
            r#"{"type":"audio_analysis","meeting_id":"integration-meeting","#,
            r#""data":{"transcript":"Thank you"},"timestamp":"2025-06-03T12:00:01Z"}"#
        ),
    ];
    let mut history = EventHistory::new();
    for frame in frames {
        if let Some(event) = connection.handle(TaggedSignal::new(
            generation,
            LinkSignal::Frame(frame.to_string()),
        )) {
            history.push(event);
        }
    }

    assert_eq!(connection.dropped_frames(), 2);
    assert_eq!(history.len(), 2);

    // a shape error in `emotions` still charts the low-signal fallback
    let mut series = EmotionSeries::new();
    series.fold(&history);
    assert_eq!(series.len(), 1);
    assert_eq!(series.latest().map(|s| (s.emotion, s.stress)), Some((0.1, 0.2)));

    let mut transcript = TranscriptLog::new();
    transcript.fold(&history);
    assert_eq!(transcript.as_str(), "[12:00:01] Thank you");
    Ok(())
}

#[test]
fn transcript_accumulation_is_idempotent() {
    let once = append_if_new("", "hello world", "10:00");
    assert_eq!(once, "[10:00] hello world");
    assert_eq!(append_if_new(&once, "hello world", "10:05"), once);
}

#[test]
fn bounded_history_folds_stay_consistent() {
    let mut history = EventHistory::with_limit(3);
    let mut series = EmotionSeries::with_limit(3);
    let mut transcript = TranscriptLog::new();

    for index in 0..10 {
        history.push(event(
            EventKind::AudioAnalysis,
            json!({
                "transcript": format!("segment {index}"),
                "emotion_score": 0.5,
                "stress_level": 0.1
            }),
            &format!("2025-06-03T12:00:{index:02}Z"),
        ));
        if index % 4 == 0 {
            series.fold(&history);
            transcript.fold(&history);
        }
    }
    series.fold(&history);
    transcript.fold(&history);

    assert_eq!(history.len(), 3);
    let indices: Vec<_> = series.samples().map(|s| s.sequence_index).collect();
    assert_eq!(indices, vec![5, 6, 7]);
    assert!(transcript.as_str().ends_with("[12:00:09] segment 9"));
    assert!(!transcript.as_str().contains("segment 5"));
}
