use crate::clock::timestamp_label;
use crate::history::EventHistory;

/// Append `fragment` to `transcript` unless it is already present.
///
/// Returns whether the transcript changed.
pub fn append_in_place(transcript: &mut String, fragment: &str, time_label: &str) -> bool {
    if fragment.trim().is_empty() || transcript.contains(fragment) {
        return false;
    }
    if !transcript.is_empty() {
        transcript.push('\n');
    }
    transcript.push('[');
    transcript.push_str(time_label);
    transcript.push_str("] ");
    transcript.push_str(fragment);
    true
}

pub fn append_if_new(current: &str, fragment: &str, time_label: &str) -> String {
    let mut transcript = current.to_string();
    append_in_place(&mut transcript, fragment, time_label);
    transcript
}

/// Cumulative live transcript folded over the speech-to-text fragments of
/// audio and facial events.
#[derive(Debug, Clone, Default)]
pub struct TranscriptLog {
    text: String,
    next_sequence: u64,
}

impl TranscriptLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fold(&mut self, history: &EventHistory) {
        for (_, event) in history.since(self.next_sequence) {
            if let Some(fragment) = event.transcript() {
                append_in_place(
                    &mut self.text,
                    fragment,
                    &timestamp_label(event.timestamp()),
                );
            }
        }
        self.next_sequence = history.appended();
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use diplo_proto::{AnalysisEvent, EventKind};
    use serde_json::json;

    #[test]
    fn first_fragment_has_no_leading_newline() {
        assert_eq!(append_if_new("", "hello world", "10:00"), "[10:00] hello world");
    }

    #[test]
    fn repeated_fragment_is_ignored() {
        let once = append_if_new("", "hello world", "10:00");
        assert_eq!(append_if_new(&once, "hello world", "10:01"), once);
        // substring of existing text also counts as already present
        assert_eq!(append_if_new(&once, "world", "10:02"), once);
    }

    #[test]
    fn new_fragments_are_newline_separated() {
        let transcript = append_if_new("", "first", "10:00");
        let transcript = append_if_new(&transcript, "second", "10:01");
        assert_eq!(transcript, "[10:00] first\n[10:01] second");
    }

    #[test]
    fn blank_fragments_do_not_grow_transcript() {
        assert_eq!(append_if_new("", "   ", "10:00"), "");
    }

    #[test]
    fn log_folds_audio_and_facial_fragments() {
        let mut history = EventHistory::new();
        let mut log = TranscriptLog::new();

        history.push(AnalysisEvent::new(
            EventKind::FacialAnalysis,
            "m",
            json!({"transcript": "Good morning"}),
            "2025-06-03T12:00:01Z",
        ));
        history.push(AnalysisEvent::new(
            EventKind::TextAnalysis,
            "m",
            json!({"transcript": "ignored"}),
            "2025-06-03T12:00:02Z",
        ));
        log.fold(&history);
        history.push(AnalysisEvent::new(
            EventKind::AudioAnalysis,
            "m",
            json!({"transcript": "Good morning"}),
            "2025-06-03T12:00:03Z",
        ));
        history.push(AnalysisEvent::new(
            EventKind::AudioAnalysis,
            "m",
            json!({"transcript": "Let us begin"}),
            "2025-06-03T12:00:04Z",
        ));
        log.fold(&history);
        log.fold(&history);

        assert_eq!(log.as_str(), "[12:00:01] Good morning\n[12:00:04] Let us begin");
    }
}
