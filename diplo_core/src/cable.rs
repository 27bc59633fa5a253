//! Selection or synthesis of the latest diplomatic assessment.
//!
//! Branches are tried in evidence order: an explicit cable, then audio with
//! transcripts, then facial analysis, then the coarse demo signal.

use diplo_proto::{
    AnalysisEvent, AudioPayload, CablePayload, DemoPayload, EmotionAnalysis, EventKind,
    EventPayload, FacialPayload,
};
use serde::Serialize;
use serde_json::Value;

use crate::history::EventHistory;
use crate::risk::{classify, RiskLevel};

const HIGH_RISK_RECOMMENDATIONS: &[&str] = &[
    "Escalate to senior diplomatic staff immediately",
    "Prepare de-escalation talking points",
    "Request a recess to reassess negotiating positions",
    "Coordinate with regional security advisors",
];

const MEDIUM_RISK_RECOMMENDATIONS: &[&str] = &[
    "Monitor tone and stress indicators closely",
    "Clarify positions to avoid misinterpretation",
    "Identify areas of common ground",
    "Schedule a follow-up consultation",
];

const LOW_RISK_RECOMMENDATIONS: &[&str] = &[
    "Maintain current diplomatic approach",
    "Continue building rapport",
    "Document points of agreement",
];

const HIGH_STRESS_EXPRESSIONS: &[&str] =
    &["angry", "fear", "disgust", "contempt", "stressed", "anxious"];
const MODERATE_STRESS_EXPRESSIONS: &[&str] =
    &["sad", "frustrated", "worried", "tense", "nervous", "confused"];

const FACIAL_HIGH_THRESHOLD: f64 = 0.6;
const FACIAL_ELEVATED_THRESHOLD: f64 = 0.3;
const FACIAL_MODERATE_THRESHOLD: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CableSource {
    Audio,
    Facial,
    Demo,
}

impl CableSource {
    pub fn label(self) -> &'static str {
        match self {
            CableSource::Audio => "audio analysis",
            CableSource::Facial => "facial analysis",
            CableSource::Demo => "demo analysis",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SynthesizedCable {
    pub source: CableSource,
    pub executive_summary: String,
    pub risk_level: RiskLevel,
    pub reasons: Vec<String>,
    pub recommendations: Vec<String>,
    pub cultural_notes: Vec<String>,
    pub transcript_based: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Cable {
    /// `data` of the most recent `diplomatic_cable` event, verbatim.
    Received(Value),
    Synthesized(SynthesizedCable),
}

impl Cable {
    pub fn risk_level_label(&self) -> Option<String> {
        match self {
            Cable::Received(data) => received(data).risk_level().map(str::to_string),
            Cable::Synthesized(cable) => Some(cable.risk_level.to_string()),
        }
    }

    pub fn executive_summary(&self) -> Option<String> {
        match self {
            Cable::Received(data) => received(data).executive_summary().map(str::to_string),
            Cable::Synthesized(cable) => Some(cable.executive_summary.clone()),
        }
    }

    pub fn recommendations(&self) -> Vec<String> {
        match self {
            Cable::Received(data) => received(data).recommendations().to_vec(),
            Cable::Synthesized(cable) => cable.recommendations.clone(),
        }
    }

    /// Why the level was chosen. Received cables carry no reasoning of their own.
    pub fn reasons(&self) -> Vec<String> {
        match self {
            Cable::Received(_) => Vec::new(),
            Cable::Synthesized(cable) => cable.reasons.clone(),
        }
    }

    pub fn cultural_notes(&self) -> Vec<String> {
        match self {
            Cable::Received(data) => received(data).cultural_notes(),
            Cable::Synthesized(cable) => cable.cultural_notes.clone(),
        }
    }

    pub fn source_label(&self) -> &'static str {
        match self {
            Cable::Received(_) => "received cable",
            Cable::Synthesized(cable) => cable.source.label(),
        }
    }

    pub fn transcript_based(&self) -> bool {
        matches!(self, Cable::Synthesized(cable) if cable.transcript_based)
    }

    pub fn to_value(&self) -> Value {
        match self {
            Cable::Received(data) => data.clone(),
            Cable::Synthesized(cable) => serde_json::to_value(cable).unwrap_or(Value::Null),
        }
    }
}

fn received(data: &Value) -> CablePayload {
    match EventPayload::decode(EventKind::DiplomaticCable, data) {
        EventPayload::Cable(cable) => cable,
        _ => CablePayload::default(),
    }
}

pub fn synthesize(history: &EventHistory) -> Option<Cable> {
    synthesize_from(history.iter())
}

/// Build the assessment for an ordered event sequence.
pub fn synthesize_from<'a>(events: impl IntoIterator<Item = &'a AnalysisEvent>) -> Option<Cable> {
    let events: Vec<&AnalysisEvent> = events.into_iter().collect();

    if let Some(cable) = events
        .iter()
        .rev()
        .find(|event| event.kind() == EventKind::DiplomaticCable)
    {
        return Some(Cable::Received(cable.data().clone()));
    }

    let audio: Vec<&AudioPayload> = events
        .iter()
        .filter_map(|event| match event.payload() {
            EventPayload::Audio(audio) => Some(audio),
            _ => None,
        })
        .collect();
    if !audio.is_empty() {
        return Some(Cable::Synthesized(audio_cable(&audio)));
    }

    if let Some(facial) = events.iter().rev().find_map(|event| match event.payload() {
        EventPayload::Facial(facial) => Some(facial),
        _ => None,
    }) {
        return Some(Cable::Synthesized(facial_cable(facial)));
    }

    events
        .iter()
        .rev()
        .find_map(|event| match event.payload() {
            EventPayload::Demo(demo) => Some(demo),
            _ => None,
        })
        .map(|demo| Cable::Synthesized(demo_cable(demo)))
}

fn recommendations_for(level: RiskLevel) -> Vec<String> {
    let table = match level {
        RiskLevel::High => HIGH_RISK_RECOMMENDATIONS,
        RiskLevel::Medium => MEDIUM_RISK_RECOMMENDATIONS,
        RiskLevel::Low => LOW_RISK_RECOMMENDATIONS,
    };
    table.iter().map(|line| line.to_string()).collect()
}

fn non_blank(text: Option<&str>) -> Option<&str> {
    text.filter(|text| !text.trim().is_empty())
}

fn threshold_level(analysis: &EmotionAnalysis) -> RiskLevel {
    let stress = analysis.stress_level.unwrap_or(0.0);
    let emotion = analysis.emotion_score.unwrap_or(0.0);
    if stress > 0.7 || emotion < -0.5 {
        RiskLevel::High
    } else if stress > 0.4 || emotion < -0.2 {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    }
}

/// Emotion-derived level of the latest audio event: explicit label first,
/// thresholds on the nested scores otherwise.
fn emotion_level(audio: &AudioPayload) -> Option<(RiskLevel, &'static str)> {
    let analysis = audio.emotion_analysis.as_ref()?;
    let explicit = analysis
        .diplomatic_risk_level
        .as_deref()
        .and_then(RiskLevel::from_label);
    Some(match explicit {
        Some(level) => (level, "reported diplomatic risk level"),
        None => (threshold_level(analysis), "emotion and stress scores"),
    })
}

fn audio_cable(audio: &[&AudioPayload]) -> SynthesizedCable {
    let mut fragments: Vec<&str> = Vec::new();
    for payload in audio {
        let transcript = non_blank(payload.transcript.as_deref());
        if let Some(text) = transcript {
            fragments.push(text);
        }
        if let Some(original) = non_blank(payload.original_transcript.as_deref()) {
            if Some(original) != transcript {
                fragments.push(original);
            }
        }
    }
    let transcript_risk = classify(&fragments.join(" "));

    let latest = audio[audio.len() - 1];
    let (risk_level, transcript_based, lead) = match emotion_level(latest) {
        Some((emotion, basis)) if emotion.rank() >= transcript_risk.level.rank() => (
            emotion,
            false,
            format!("Emotion analysis ({basis}) indicates {emotion} risk"),
        ),
        Some((emotion, _)) => (
            transcript_risk.level,
            true,
            format!(
                "Transcript analysis indicates {} risk, above emotion analysis ({emotion})",
                transcript_risk.level
            ),
        ),
        None => (
            transcript_risk.level,
            true,
            format!("Transcript analysis indicates {} risk", transcript_risk.level),
        ),
    };

    let mut reasons = Vec::with_capacity(transcript_risk.reasons.len() + 1);
    reasons.push(lead);
    reasons.extend(transcript_risk.reasons);

    let language = latest.source_language().unwrap_or("unknown");
    let mut cultural_notes = vec![format!("Detected source language: {language}")];
    if latest.was_translated() {
        cultural_notes.push("Transcript was translated before analysis".to_string());
    } else {
        cultural_notes.push("No translation applied".to_string());
    }

    SynthesizedCable {
        source: CableSource::Audio,
        executive_summary: format!(
            "Audio analysis across {} segment(s) indicates {} diplomatic risk.",
            audio.len(),
            risk_level
        ),
        risk_level,
        reasons,
        recommendations: recommendations_for(risk_level),
        cultural_notes,
        transcript_based,
    }
}

fn facial_cable(facial: &FacialPayload) -> SynthesizedCable {
    let mut high_stress = 0.0;
    let mut moderate_stress = 0.0;
    for reading in facial.usable_emotions().unwrap_or(&[]) {
        let Some(name) = reading.emotion.as_deref() else {
            continue;
        };
        let name = name.trim().to_lowercase();
        let confidence = reading.confidence.unwrap_or(0.0);
        if HIGH_STRESS_EXPRESSIONS.contains(&name.as_str()) {
            high_stress += confidence;
        } else if MODERATE_STRESS_EXPRESSIONS.contains(&name.as_str()) {
            moderate_stress += confidence;
        }
    }

    let risk_level = if high_stress > FACIAL_HIGH_THRESHOLD {
        RiskLevel::High
    } else if high_stress > FACIAL_ELEVATED_THRESHOLD || moderate_stress > FACIAL_MODERATE_THRESHOLD
    {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    };

    let recommendations: &[&str] = match risk_level {
        RiskLevel::High => &[
            "Address visible distress before advancing the agenda",
            "Consider a short recess",
        ],
        RiskLevel::Medium => &[
            "Watch for escalating non-verbal cues",
            "Use reassuring, clarifying language",
        ],
        RiskLevel::Low => &[
            "Non-verbal cues indicate a composed exchange",
            "Proceed with the planned agenda",
        ],
    };

    let cultural_notes = match facial.microexpressions.as_deref() {
        Some(observed) if !observed.is_empty() => {
            vec![format!("Microexpressions observed: {}", observed.join(", "))]
        }
        _ => Vec::new(),
    };

    SynthesizedCable {
        source: CableSource::Facial,
        executive_summary: format!(
            "Facial analysis of the latest frame indicates {risk_level} diplomatic risk."
        ),
        risk_level,
        reasons: vec![
            format!("High-stress expression score {high_stress:.2}"),
            format!("Moderate-stress expression score {moderate_stress:.2}"),
        ],
        recommendations: recommendations.iter().map(|line| line.to_string()).collect(),
        cultural_notes,
        transcript_based: false,
    }
}

fn demo_cable(demo: &DemoPayload) -> SynthesizedCable {
    let tension = demo.tension_level();
    let risk_level = match tension.map(|level| level.trim().to_lowercase()).as_deref() {
        Some("low") => RiskLevel::Low,
        Some("moderate") => RiskLevel::Medium,
        _ => RiskLevel::High,
    };

    let recommendations = demo
        .cultural_dynamics
        .as_ref()
        .and_then(|dynamics| dynamics.recommended_adjustments.clone())
        .unwrap_or_default();
    let executive_summary = demo
        .overall_assessment
        .as_ref()
        .and_then(|assessment| assessment.key_insights.as_ref())
        .map(|insights| insights.join(" "))
        .unwrap_or_default();

    SynthesizedCable {
        source: CableSource::Demo,
        executive_summary,
        risk_level,
        reasons: vec![format!(
            "Demo assessment tension level: {}",
            tension.unwrap_or("unknown")
        )],
        recommendations,
        cultural_notes: Vec::new(),
        transcript_based: false,
    }
}
