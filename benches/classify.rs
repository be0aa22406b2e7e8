use criterion::{criterion_group, criterion_main, Criterion};
use mining_exporter::parsing::{classify, strip};
use std::hint::black_box;

const LINES: &[(&str, &str)] = &[
    (
        "status",
        "\u{1b}[32m  m \u{1b}[0m 12:00:01|ethminer  Speed  123.45 Mh/s    0 61.2  1 62.0  2 0.5  3 30.1  [solo] Time: 01:02:03",
    ),
    (
        "solution",
        "  ℹ  12:00:02|CUDA0     Solution found; Submitting solution to eu1.ethermine.org ...",
    ),
    ("share", "  ℹ  12:00:03|stratum    B-) Submitted and accepted."),
    ("job", "  ℹ  12:00:04|stratum   Received new job 0xabc123"),
    ("noise", "  ℹ  12:00:05|stratum   Connected to eu1.ethermine.org:4444"),
];

fn benchmark_classify(c: &mut Criterion) {
    let mut group = c.benchmark_group("classify");

    for (name, line) in LINES {
        group.bench_function(*name, |b| {
            b.iter(|| classify(black_box(line)));
        });
    }

    group.finish();
}

fn benchmark_strip(c: &mut Criterion) {
    c.bench_function("strip_decoration", |b| {
        b.iter(|| strip(black_box(LINES[0].1)));
    });
}

criterion_group!(benches, benchmark_classify, benchmark_strip);
criterion_main!(benches);
