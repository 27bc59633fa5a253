//! Typed views over the per-type `data` objects.
//!
//! Producers disagree about payload shapes, so every field is optional and
//! decoded leniently: a field holding the wrong JSON type reads as `None`
//! instead of failing the whole payload.

use serde::de::{DeserializeOwned, Deserializer};
use serde::Deserialize;
use serde_json::Value;

use crate::EventKind;

#[derive(Debug, Clone, PartialEq)]
pub enum EventPayload {
    Facial(FacialPayload),
    Audio(AudioPayload),
    Demo(DemoPayload),
    Cable(CablePayload),
    Text(TextPayload),
    /// The upload endpoint answers with a facial-expression analysis.
    Video(FacialPayload),
}

impl EventPayload {
    pub fn decode(kind: EventKind, data: &Value) -> Self {
        match kind {
            EventKind::FacialAnalysis => EventPayload::Facial(decode_lenient(data)),
            EventKind::AudioAnalysis => EventPayload::Audio(decode_lenient(data)),
            EventKind::DemoAnalysis => EventPayload::Demo(decode_lenient(data)),
            EventKind::DiplomaticCable => EventPayload::Cable(decode_lenient(data)),
            EventKind::TextAnalysis => EventPayload::Text(decode_lenient(data)),
            EventKind::VideoAnalysis => EventPayload::Video(decode_lenient(data)),
        }
    }
}

fn decode_lenient<T: DeserializeOwned + Default>(data: &Value) -> T {
    T::deserialize(data).unwrap_or_default()
}

pub(crate) fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct EmotionReading {
    #[serde(deserialize_with = "lenient")]
    pub emotion: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub confidence: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct FacialPayload {
    #[serde(deserialize_with = "lenient")]
    pub emotions: Option<Vec<EmotionReading>>,
    #[serde(deserialize_with = "lenient")]
    pub microexpressions: Option<Vec<String>>,
    #[serde(deserialize_with = "lenient")]
    pub overall_confidence_score: Option<f64>,
    #[serde(deserialize_with = "lenient")]
    pub transcript: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub frame_time: Option<f64>,
}

impl FacialPayload {
    /// Emotion readings, or `None` when the list is missing, malformed or empty.
    pub fn usable_emotions(&self) -> Option<&[EmotionReading]> {
        self.emotions
            .as_deref()
            .filter(|emotions| !emotions.is_empty())
    }
}

/// Nested block emitted by the translation-aware audio producer.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct EmotionAnalysis {
    #[serde(deserialize_with = "lenient")]
    pub emotion_score: Option<f64>,
    #[serde(deserialize_with = "lenient")]
    pub stress_level: Option<f64>,
    #[serde(deserialize_with = "lenient")]
    pub diplomatic_risk_level: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub detected_language: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct AudioPayload {
    #[serde(deserialize_with = "lenient")]
    pub emotion_score: Option<f64>,
    #[serde(deserialize_with = "lenient")]
    pub stress_level: Option<f64>,
    #[serde(deserialize_with = "lenient")]
    pub tone: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub transcript: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub original_transcript: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub detected_language: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub translated: Option<bool>,
    #[serde(deserialize_with = "lenient")]
    pub emotion_analysis: Option<EmotionAnalysis>,
}

impl AudioPayload {
    pub fn source_language(&self) -> Option<&str> {
        self.detected_language.as_deref().or_else(|| {
            self.emotion_analysis
                .as_ref()
                .and_then(|analysis| analysis.detected_language.as_deref())
        })
    }

    /// Explicit flag when present, otherwise inferred from a differing original.
    pub fn was_translated(&self) -> bool {
        self.translated.unwrap_or_else(|| {
            match (&self.original_transcript, &self.transcript) {
                (Some(original), Some(translated)) => original != translated,
                (Some(original), None) => !original.trim().is_empty(),
                _ => false,
            }
        })
    }
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct OverallAssessment {
    #[serde(deserialize_with = "lenient")]
    pub tension_level: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub cooperation_probability: Option<f64>,
    #[serde(deserialize_with = "lenient")]
    pub key_insights: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct CulturalDynamics {
    #[serde(deserialize_with = "lenient")]
    pub recommended_adjustments: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct DemoPayload {
    #[serde(deserialize_with = "lenient")]
    pub overall_assessment: Option<OverallAssessment>,
    #[serde(deserialize_with = "lenient")]
    pub cultural_dynamics: Option<CulturalDynamics>,
}

impl DemoPayload {
    pub fn tension_level(&self) -> Option<&str> {
        self.overall_assessment
            .as_ref()
            .and_then(|assessment| assessment.tension_level.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct CableRiskAssessment {
    #[serde(deserialize_with = "lenient")]
    pub risk_level: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub recommendations: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct CablePayload {
    #[serde(deserialize_with = "lenient")]
    pub executive_summary: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub summary: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub risk_level: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub risk_assessment: Option<CableRiskAssessment>,
    #[serde(deserialize_with = "lenient")]
    pub recommendations: Option<Vec<String>>,
    /// Free-form block from the cultural-context engine.
    pub cultural_analysis: Option<Value>,
}

impl CablePayload {
    pub fn risk_level(&self) -> Option<&str> {
        self.risk_assessment
            .as_ref()
            .and_then(|assessment| assessment.risk_level.as_deref())
            .or(self.risk_level.as_deref())
    }

    pub fn executive_summary(&self) -> Option<&str> {
        self.executive_summary
            .as_deref()
            .or(self.summary.as_deref())
    }

    pub fn recommendations(&self) -> &[String] {
        self.risk_assessment
            .as_ref()
            .and_then(|assessment| assessment.recommendations.as_deref())
            .or(self.recommendations.as_deref())
            .unwrap_or(&[])
    }

    /// One line per cultural insight. `cultural_insights` is preferred when the
    /// block carries it; unknown shapes are rendered as compact JSON.
    pub fn cultural_notes(&self) -> Vec<String> {
        let Some(analysis) = self.cultural_analysis.as_ref() else {
            return Vec::new();
        };
        let insights = analysis.get("cultural_insights").unwrap_or(analysis);
        match insights {
            Value::Null => Vec::new(),
            Value::Array(items) => items.iter().filter_map(note_line).collect(),
            Value::Object(fields) => fields
                .iter()
                .filter_map(|(key, value)| note_line(value).map(|line| format!("{key}: {line}")))
                .collect(),
            other => note_line(other).into_iter().collect(),
        }
    }
}

fn note_line(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(text) => Some(text.trim().to_string()).filter(|text| !text.is_empty()),
        other => Some(other.to_string()),
    }
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct TextPayload {
    #[serde(deserialize_with = "lenient")]
    pub sentiment: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub polarity: Option<f64>,
    #[serde(deserialize_with = "lenient")]
    pub cultural_flags: Option<Vec<String>>,
}
