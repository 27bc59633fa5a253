//! Per-event emotion/stress extraction and the chart series folded from it.

use std::collections::VecDeque;

use diplo_proto::{AnalysisEvent, AudioPayload, DemoPayload, EventPayload, FacialPayload};
use serde::Serialize;

use crate::clock::timestamp_label;
use crate::history::EventHistory;

pub const POSITIVE_EMOTIONS: &[&str] = &[
    "happy",
    "surprise",
    "joy",
    "confident",
    "content",
    "calm",
    "pleased",
    "satisfied",
];

pub const NEGATIVE_EMOTIONS: &[&str] = &[
    "sad",
    "angry",
    "fear",
    "disgust",
    "stressed",
    "frustrated",
    "worried",
    "anxious",
    "tense",
];

/// Facial analysis ran but produced no usable emotion list.
pub const FACIAL_LOW_SIGNAL: Metric = Metric {
    emotion: 0.1,
    stress: 0.2,
};

const FACIAL_STRESS_FLOOR: f64 = 0.1;
const FACIAL_STRESS_THRESHOLD: f64 = 0.3;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Metric {
    pub emotion: f64,
    pub stress: f64,
}

impl Metric {
    pub const fn new(emotion: f64, stress: f64) -> Self {
        Self { emotion, stress }
    }

    fn is_zero(&self) -> bool {
        self.emotion == 0.0 && self.stress == 0.0
    }
}

/// Chartable (emotion, stress) pair for an event, if it contributes one.
///
/// An exact `(0, 0)` reading is treated as "nothing computed" and excluded.
pub fn extract_metric(event: &AnalysisEvent) -> Option<Metric> {
    let metric = match event.payload() {
        EventPayload::Audio(audio) => audio_metric(audio),
        EventPayload::Facial(facial) => Some(facial_metric(facial)),
        EventPayload::Demo(demo) => demo_metric(demo),
        EventPayload::Cable(_) | EventPayload::Text(_) | EventPayload::Video(_) => None,
    }?;
    (!metric.is_zero()).then_some(metric)
}

fn audio_metric(audio: &AudioPayload) -> Option<Metric> {
    if let Some(emotion) = audio.emotion_score {
        return Some(Metric::new(emotion, audio.stress_level.unwrap_or(0.0)));
    }
    audio.emotion_analysis.as_ref().map(|analysis| {
        Metric::new(
            analysis.emotion_score.unwrap_or(0.0),
            analysis.stress_level.unwrap_or(0.0),
        )
    })
}

fn facial_metric(facial: &FacialPayload) -> Metric {
    let Some(emotions) = facial.usable_emotions() else {
        return FACIAL_LOW_SIGNAL;
    };

    let mut positive = 0.0;
    let mut negative = 0.0;
    for reading in emotions {
        let Some(name) = reading.emotion.as_deref() else {
            continue;
        };
        let name = name.trim().to_lowercase();
        let confidence = reading.confidence.unwrap_or(0.0);
        if POSITIVE_EMOTIONS.contains(&name.as_str()) {
            positive += confidence;
        } else if NEGATIVE_EMOTIONS.contains(&name.as_str()) {
            negative += confidence;
        }
    }

    let stress = if negative > FACIAL_STRESS_THRESHOLD {
        negative
    } else {
        FACIAL_STRESS_FLOOR
    };
    Metric::new(positive - negative, stress)
}

fn demo_metric(demo: &DemoPayload) -> Option<Metric> {
    let tension = demo.tension_level()?;
    let metric = match tension.trim().to_lowercase().as_str() {
        "low" => Metric::new(0.5, 0.2),
        "moderate" => Metric::new(0.1, 0.5),
        "high" => Metric::new(-0.5, 0.8),
        _ => Metric::new(0.1, 0.3),
    };
    Some(metric)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmotionSample {
    /// Position among qualifying samples, not the global event index.
    pub sequence_index: usize,
    pub emotion: f64,
    pub stress: f64,
    pub timestamp_label: String,
}

/// Emotion/stress series folded incrementally over an [`EventHistory`].
#[derive(Debug, Clone, Default)]
pub struct EmotionSeries {
    samples: VecDeque<EmotionSample>,
    limit: Option<usize>,
    emitted: usize,
    next_sequence: u64,
}

impl EmotionSeries {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limit(limit: usize) -> Self {
        Self {
            limit: (limit > 0).then_some(limit),
            ..Self::default()
        }
    }

    pub fn from_events<'a>(events: impl IntoIterator<Item = &'a AnalysisEvent>) -> Self {
        let mut series = Self::new();
        for event in events {
            series.push(event);
        }
        series
    }

    /// Consume every event appended to `history` since the previous fold.
    pub fn fold(&mut self, history: &EventHistory) {
        for (_, event) in history.since(self.next_sequence) {
            self.push(event);
        }
        self.next_sequence = history.appended();
    }

    fn push(&mut self, event: &AnalysisEvent) {
        let Some(metric) = extract_metric(event) else {
            return;
        };
        self.samples.push_back(EmotionSample {
            sequence_index: self.emitted,
            emotion: metric.emotion,
            stress: metric.stress,
            timestamp_label: timestamp_label(event.timestamp()),
        });
        self.emitted += 1;
        if let Some(limit) = self.limit {
            while self.samples.len() > limit {
                self.samples.pop_front();
            }
        }
    }

    pub fn samples(&self) -> impl DoubleEndedIterator<Item = &EmotionSample> + ExactSizeIterator {
        self.samples.iter()
    }

    pub fn latest(&self) -> Option<&EmotionSample> {
        self.samples.back()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FacialShare {
    pub emotion: String,
    pub percent: f64,
}

/// Emotions of the latest facial event as percentages.
pub fn facial_breakdown(history: &EventHistory) -> Vec<FacialShare> {
    history
        .iter()
        .rev()
        .find_map(|event| match event.payload() {
            EventPayload::Facial(facial) => Some(facial),
            _ => None,
        })
        .and_then(|facial| facial.emotions.as_ref())
        .map(|emotions| {
            emotions
                .iter()
                .filter_map(|reading| {
                    Some(FacialShare {
                        emotion: reading.emotion.clone()?,
                        percent: reading.confidence.unwrap_or(0.0) * 100.0,
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}
