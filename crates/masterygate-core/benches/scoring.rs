use chrono::{DateTime, Duration, Utc};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

use masterygate_core::mastery::MasteryScorer;
use masterygate_core::model::{AttemptContext, ConceptProgress};
use masterygate_core::progress::{AttemptObservation, ConceptProgressAggregator};
use masterygate_core::scheduler::SpacedRepetitionScheduler;

fn t0() -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap_or_default()
}

fn make_progress(concept: &str, attempts: usize) -> ConceptProgress {
    let aggregator = ConceptProgressAggregator::default();
    let mut progress = ConceptProgress::new("bench", concept, t0());
    for i in 0..attempts {
        aggregator.record(
            &mut progress,
            &AttemptObservation {
                timestamp: t0() + Duration::hours(i as i64 * 7),
                correct: i % 4 != 0,
                attempts_used: 1,
                time_spent_ms: 9_000,
                reasoning_score: 0.8,
                context: if i % 3 == 0 {
                    AttemptContext::Assessment
                } else {
                    AttemptContext::Practice
                },
            },
        );
    }
    progress
}

fn bench_aggregate(c: &mut Criterion) {
    let mut group = c.benchmark_group("aggregate");
    let aggregator = ConceptProgressAggregator::default();

    group.bench_function("record_into_full_window", |b| {
        let base = make_progress("c", 10);
        let obs = AttemptObservation {
            timestamp: t0() + Duration::days(30),
            correct: true,
            attempts_used: 1,
            time_spent_ms: 8_000,
            reasoning_score: 0.9,
            context: AttemptContext::Review,
        };
        b.iter(|| {
            let mut p = base.clone();
            aggregator.record(black_box(&mut p), black_box(&obs));
            p
        })
    });

    group.finish();
}

fn bench_mastery(c: &mut Criterion) {
    let mut group = c.benchmark_group("mastery");
    let scorer = MasteryScorer::default();
    let progress = make_progress("c", 10);

    group.bench_function("dimensions_and_overall", |b| {
        b.iter(|| {
            let scores = scorer.dimensions(black_box(&progress));
            scorer.overall(&scores)
        })
    });

    group.bench_function("evaluate", |b| {
        b.iter(|| {
            let mut p = progress.clone();
            scorer.evaluate(black_box(&mut p), t0())
        })
    });

    group.finish();
}

fn bench_due_reviews(c: &mut Criterion) {
    let mut group = c.benchmark_group("due_reviews");
    let scheduler = SpacedRepetitionScheduler::default();
    let now = t0() + Duration::days(90);

    for &n in &[10usize, 100, 1000] {
        let concepts: Vec<ConceptProgress> = (0..n)
            .map(|i| {
                let mut p = make_progress(&format!("c{i}"), 5);
                p.next_review_due_at = Some(t0() + Duration::days((i % 120) as i64));
                p
            })
            .collect();
        group.bench_function(format!("n={n}"), |b| {
            b.iter(|| scheduler.due_reviews(black_box(&concepts), now))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_aggregate, bench_mastery, bench_due_reviews);
criterion_main!(benches);
