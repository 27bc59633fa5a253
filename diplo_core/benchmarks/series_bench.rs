use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use diplo_core::{AnalysisEvent, EmotionSeries, EventHistory, EventKind};
use serde_json::json;

fn history(events: usize, limit: usize) -> EventHistory {
    let mut history = EventHistory::with_limit(limit);
    for index in 0..events {
        let event = match index % 3 {
            0 => AnalysisEvent::new(
                EventKind::FacialAnalysis,
                "bench",
                json!({"emotions": [
                    {"emotion": "calm", "confidence": 0.6},
                    {"emotion": "worried", "confidence": 0.4}
                ]}),
                "2025-06-03T12:00:00Z",
            ),
            1 => AnalysisEvent::new(
                EventKind::AudioAnalysis,
                "bench",
                json!({"emotion_analysis": {"emotion_score": -0.2, "stress_level": 0.5}}),
                "2025-06-03T12:00:01Z",
            ),
            _ => AnalysisEvent::new(
                EventKind::DemoAnalysis,
                "bench",
                json!({"overall_assessment": {"tension_level": "moderate"}}),
                "2025-06-03T12:00:02Z",
            ),
        };
        history.push(event);
    }
    history
}

fn bench_series_fold(c: &mut Criterion) {
    let mut group = c.benchmark_group("emotion_series");

    for events in [64usize, 1024, 8192] {
        group.bench_with_input(BenchmarkId::new("full_fold", events), &events, |b, &events| {
            b.iter_batched(
                || history(events, 0),
                |history| {
                    let mut series = EmotionSeries::new();
                    series.fold(&history);
                    series
                },
                BatchSize::SmallInput,
            );
        });

        group.bench_with_input(BenchmarkId::new("ring_buffer", events), &events, |b, &events| {
            b.iter_batched(
                || history(events, 256),
                |history| {
                    let mut series = EmotionSeries::with_limit(256);
                    series.fold(&history);
                    series
                },
                BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

criterion_group!(series_benches, bench_series_fold);
criterion_main!(series_benches);
