use std::collections::VecDeque;

use diplo_proto::{AnalysisEvent, EventKind};

/// Ordered, append-only log of analysis events.
///
/// Every appended event receives a monotonically increasing sequence number.
/// With a limit configured the oldest events are evicted; sequence numbers keep
/// counting so incremental folds never revisit or skip a retained event.
#[derive(Debug, Clone, Default)]
pub struct EventHistory {
    events: VecDeque<AnalysisEvent>,
    limit: Option<usize>,
    appended: u64,
}

impl EventHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// A limit of zero means unbounded.
    pub fn with_limit(limit: usize) -> Self {
        Self {
            events: VecDeque::new(),
            limit: (limit > 0).then_some(limit),
            appended: 0,
        }
    }

    /// Append an event and return its sequence number.
    pub fn push(&mut self, event: AnalysisEvent) -> u64 {
        let sequence = self.appended;
        self.events.push_back(event);
        self.appended += 1;
        if let Some(limit) = self.limit {
            while self.events.len() > limit {
                self.events.pop_front();
            }
        }
        sequence
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    /// Total number of events ever appended, including evicted ones.
    pub fn appended(&self) -> u64 {
        self.appended
    }

    /// Sequence number of the oldest retained event.
    pub fn first_sequence(&self) -> u64 {
        self.appended - self.events.len() as u64
    }

    /// Retained event with the given sequence number.
    pub fn get(&self, sequence: u64) -> Option<&AnalysisEvent> {
        let offset = sequence.checked_sub(self.first_sequence())?;
        self.events.get(usize::try_from(offset).ok()?)
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &AnalysisEvent> + ExactSizeIterator {
        self.events.iter()
    }

    /// Retained events whose sequence number is at least `sequence`.
    pub fn since(&self, sequence: u64) -> impl Iterator<Item = (u64, &AnalysisEvent)> {
        let first = self.first_sequence();
        let skip = sequence.saturating_sub(first) as usize;
        self.events
            .iter()
            .enumerate()
            .skip(skip)
            .map(move |(offset, event)| (first + offset as u64, event))
    }

    pub fn of_kind(&self, kind: EventKind) -> impl DoubleEndedIterator<Item = &AnalysisEvent> {
        self.events.iter().filter(move |event| event.kind() == kind)
    }

    pub fn latest(&self) -> Option<&AnalysisEvent> {
        self.events.back()
    }

    pub fn latest_of(&self, kind: EventKind) -> Option<&AnalysisEvent> {
        self.of_kind(kind).next_back()
    }

    /// Snapshot of the retained events, oldest first.
    pub fn to_vec(&self) -> Vec<AnalysisEvent> {
        self.events.iter().cloned().collect()
    }
}
