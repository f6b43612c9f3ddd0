//! Criterion benchmarks for the per-tick hot paths.
//!
//! The sampler runs every 50 ms, so none of these are close to a budget; the
//! numbers are a baseline for spotting regressions in parsing and derivation.
//!
//! Run with: cargo bench --bench derivation

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use pull_machine::acquisition::{parse_frame, Reading};
use pull_machine::data::TimeWindowedHistory;
use pull_machine::kinematics::{DerivationEngine, Linkage};
use pull_machine::measurement_types::Sample;

fn frame_parsing(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_frame");
    for (name, frame) in [
        ("valid", &b"23.75;4.10\r\n"[..]),
        ("padded", &b"  23.75 ;  4.10  \r\n"[..]),
        ("malformed", &b"23.75;\r\n"[..]),
    ] {
        group.bench_with_input(BenchmarkId::new("frame", name), &frame, |b, frame| {
            b.iter(|| parse_frame(black_box(frame)));
        });
    }
    group.finish();
}

fn engine_tick(c: &mut Criterion) {
    let mut group = c.benchmark_group("engine_tick");
    for window in [5usize, 20, 100] {
        group.bench_with_input(BenchmarkId::new("window", window), &window, |b, &window| {
            let mut engine = DerivationEngine::with_parts(Linkage::default(), 49.78, window, 30.0);
            let mut t = 0.0;
            b.iter(|| {
                t += 0.05;
                let reading = Reading::new((t * 10.0) % 90.0, 5.0);
                engine.tick(black_box(Some(reading)), t)
            });
        });
    }
    group.finish();
}

fn history_chart(c: &mut Criterion) {
    // A full 30 s window at 20 Hz.
    let mut history = TimeWindowedHistory::new(30.0);
    for i in 0..600 {
        let t = f64::from(i) * 0.05;
        history.push(Sample {
            t,
            angle_deg: 0.0,
            pressure_bar: 0.0,
            piston_length_m: 0.0,
            piston_velocity_mps: 0.0,
            force_n: 0.0,
            power_w: (t * 3.0).sin() * 100.0,
        });
    }
    c.bench_function("history_power_chart", |b| {
        b.iter(|| black_box(&history).power_chart());
    });
}

criterion_group!(benches, frame_parsing, engine_tick, history_chart);
criterion_main!(benches);
