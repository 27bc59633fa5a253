use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use diplo_core::classify;

const SENTENCES: &[&str] = &[
    "We appreciate the constructive dialogue and welcome further cooperation.",
    "We have serious concerns and must insist on a reconsideration of the deadline.",
    "Any further military escalation will be met with sanctions and consequences.",
];

fn transcript(sentences: usize) -> String {
    SENTENCES
        .iter()
        .cycle()
        .take(sentences)
        .copied()
        .collect::<Vec<_>>()
        .join(" ")
}

fn bench_classify(c: &mut Criterion) {
    let mut group = c.benchmark_group("risk_classifier");

    for sentences in [1usize, 16, 256] {
        let text = transcript(sentences);
        group.bench_with_input(BenchmarkId::new("mixed", sentences), &text, |b, text| {
            b.iter(|| classify(black_box(text)));
        });
    }

    group.finish();
}

criterion_group!(classify_benches, bench_classify);
criterion_main!(classify_benches);
