use criterion::{black_box, criterion_group, criterion_main, Criterion};

use masterygate_core::model::{QuestionMetadata, QuestionType};
use masterygate_core::reasoning::{HeuristicAnalyzer, ReasoningAnalyzer, ReasoningInput};

const SHORT: &str = "It is 80.";

const STRONG: &str = "First, the triangle is isosceles. Because the base angles of an \
isosceles triangle are equal by definition, both base angles measure 50 degrees. \
Therefore the third angle is 180 - 100 = 80 degrees, so the answer is 80.";

const RAMBLING: &str = "idk, everyone knows this one lol. It always works, it is true because it is true. \
Then we kinda just add stuff up and then it's probably fine, obviously.";

fn bench_analyze(c: &mut Criterion) {
    let mut group = c.benchmark_group("reasoning_analyze");
    let analyzer = HeuristicAnalyzer::default();
    let question = QuestionMetadata {
        expected_concepts: vec!["isosceles".into(), "angles".into()],
        question_type: QuestionType::Explanation,
    };

    for (name, text) in [("short", SHORT), ("strong", STRONG), ("rambling", RAMBLING)] {
        group.bench_function(name, |b| {
            b.iter(|| {
                analyzer.analyze(black_box(&ReasoningInput {
                    text,
                    question: &question,
                    answer: "80",
                    correct: true,
                }))
            })
        });
    }

    let long = STRONG.repeat(20);
    group.bench_function("long", |b| {
        b.iter(|| {
            analyzer.analyze(black_box(&ReasoningInput {
                text: &long,
                question: &question,
                answer: "80",
                correct: true,
            }))
        })
    });

    group.finish();
}

criterion_group!(benches, bench_analyze);
criterion_main!(benches);
