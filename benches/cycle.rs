use criterion::{criterion_group, criterion_main, Bencher, BenchmarkId, Criterion, SamplingMode};
use pool_cycle::{BackendKind, Harness, PoolConfig, WorkloadParams};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

macro_rules! benchmark_id {
    ($fn_name:expr, $pool_size:expr, $workers:expr) => {
        BenchmarkId::new(
            $fn_name,
            format!("pool={:02} worker={:02}", $pool_size, $workers),
        )
    };
}

fn product(a: Vec<usize>, b: Vec<usize>) -> Vec<(usize, usize)> {
    let mut c = Vec::with_capacity(a.len() * b.len());
    for x in &a {
        for y in &b {
            c.push((*x, *y));
        }
    }
    c
}

fn bench_with_input(
    bencher: &mut Bencher,
    backend: BackendKind,
    input: &(usize, usize),
    params: WorkloadParams,
) {
    bencher.iter_custom(|iters| {
        let harness = Arc::new(Harness::setup(&PoolConfig::new(backend, input.0), params).unwrap());
        let start = Instant::now();
        for _ in 0..iters {
            let handles = (0..input.1)
                .map(|_| {
                    let harness = Arc::clone(&harness);
                    thread::spawn(move || {
                        let conn = harness.cycle().unwrap();
                        criterion::black_box(conn.id());
                    })
                })
                .collect::<Vec<_>>();
            for handle in handles {
                handle.join().unwrap();
            }
        }
        let elapsed = start.elapsed();
        if let Ok(harness) = Arc::try_unwrap(harness) {
            harness.teardown();
        }
        elapsed
    })
}

fn run_group(c: &mut Criterion, name: &str, params: WorkloadParams) {
    let mut group = c.benchmark_group(name);
    group
        .measurement_time(Duration::from_secs(5))
        .nresamples(10_000)
        .sample_size(100)
        .sampling_mode(SamplingMode::Flat)
        .warm_up_time(Duration::from_millis(500));
    let inputs = product(vec![8usize, 20, 50], vec![1usize, 4, 16]);
    for input in inputs {
        group.bench_with_input(benchmark_id!("fixed", input.0, input.1), &input, |b, i| {
            bench_with_input(b, BackendKind::Fixed, i, params)
        });
        group.bench_with_input(benchmark_id!("r2d2", input.0, input.1), &input, |b, i| {
            bench_with_input(b, BackendKind::R2d2, i, params)
        });
    }
    group.finish();
}

pub fn bench_cycle(c: &mut Criterion) {
    run_group(c, "cycle", WorkloadParams::default());
}

pub fn bench_cycle_no_delay(c: &mut Criterion) {
    run_group(
        c,
        "cycle-nodelay",
        WorkloadParams {
            sleep_us: 0,
            ..WorkloadParams::default()
        },
    );
}

criterion_group!(benches, bench_cycle, bench_cycle_no_delay);
criterion_main!(benches);
