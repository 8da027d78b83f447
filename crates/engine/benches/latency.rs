use criterion::{black_box, criterion_group, criterion_main, Criterion};
use engine::{synthetic_series, Backtest, BacktestConfig, Engine, StepRecord, Strategy, CLOSE_FIELD};
use std::time::Instant;

const LATENCY_SAMPLES: usize = 2_000;
const RUN_STEPS: usize = 250;

/// Opens a unit every step and closes everything every tenth step.
#[derive(Default)]
struct Churn;

impl Strategy for Churn {
    type Params = ();

    fn init(&mut self, _engine: &mut Engine<'_>, _params: ()) {}

    fn next(&mut self, engine: &mut Engine<'_>, index: usize, record: &StepRecord) {
        let close = record.field(CLOSE_FIELD).unwrap_or(f64::NAN);
        engine.open(close, Some(1.0), None);
        if index % 10 == 9 {
            engine.close(close, None);
        }
    }
}

fn percentile(sorted: &[u64], pct: usize) -> u64 {
    let rank = (sorted.len() * pct).div_ceil(100).max(1);
    sorted[rank - 1]
}

fn bench_run_latency(c: &mut Criterion) {
    let backtest = Backtest::<Churn>::new(
        synthetic_series(11, RUN_STEPS, 100.0, 0.5),
        BacktestConfig::new(1_000_000.0, 0.001),
    )
    .expect("bench config should be valid");

    let mut samples: Vec<u64> = (0..LATENCY_SAMPLES)
        .map(|_| {
            let started = Instant::now();
            black_box(backtest.run(()));
            started.elapsed().as_nanos() as u64
        })
        .collect();
    samples.sort_unstable();

    let per_step = percentile(&samples, 50) / RUN_STEPS as u64;
    println!(
        "run_steps={RUN_STEPS} p50_nanos={} p95_nanos={} p99_nanos={} max_nanos={} p50_nanos_per_step={per_step} samples={}",
        percentile(&samples, 50),
        percentile(&samples, 95),
        percentile(&samples, 99),
        samples[samples.len() - 1],
        samples.len()
    );

    c.bench_function("backtest_latency_run", |b| {
        b.iter(|| black_box(backtest.run(())));
    });
}

criterion_group!(benches, bench_run_latency);
criterion_main!(benches);
