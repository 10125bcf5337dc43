use context_runner::core::scheduler::{ConcurrentScheduler, Scheduler, SerialScheduler};
use context_runner::prelude::*;
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;

fn bench_tree(groups: usize, per_group: usize) -> Context {
    let mut root = Context::default();
    for group in 0..groups {
        root.add_child(format!("group {group}"), move |ctx| {
            ctx.add_memoized("numbers", |_| Ok((0..64).collect::<Vec<u64>>()));
            for case in 0..per_group {
                ctx.add_test(format!("case {case}"), |example| {
                    let numbers = example.get::<Vec<u64>>("numbers")?;
                    assert_equal(&2016, &numbers.iter().sum::<u64>())
                });
            }
        });
    }
    root
}

fn run_with(scheduler: impl Scheduler + 'static) -> bool {
    let config = Config::new()
        .notifier(Tally::default())
        .scheduler(scheduler);
    context_runner::run(bench_tree(10, 20), config).unwrap_or(false)
}

fn bench_schedulers(c: &mut Criterion) {
    let mut group = c.benchmark_group("run_200_units");

    group.bench_function("serial", |b| {
        b.iter(|| black_box(run_with(SerialScheduler)));
    });

    for workers in [2, 4] {
        group.bench_with_input(
            BenchmarkId::new("concurrent", workers),
            &workers,
            |b, &workers| {
                b.iter(|| black_box(run_with(ConcurrentScheduler::new(workers))));
            },
        );
    }

    group.finish();
}

fn bench_flatten(c: &mut Criterion) {
    let root = std::sync::Arc::new(bench_tree(50, 20));
    c.bench_function("flatten_1000_units", |b| {
        b.iter(|| black_box(root.flatten().count()));
    });
}

criterion_group!(benches, bench_schedulers, bench_flatten);
criterion_main!(benches);
