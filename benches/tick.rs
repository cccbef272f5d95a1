use criterion::*;
use std::hint::black_box;

mod common;
use common::*;

fn tick_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("tick");

    for (width, height) in WORLDS {
        let creatures = (width * height / 32 + 1) as u64;
        group.throughput(Throughput::Elements(creatures));

        group.bench_function(format!("tick_{width}x{height}"), |b| {
            let mut sim = make_sim(width, height);
            // Skip past tick 0 so food phases appear at their real frequency.
            sim.tick().unwrap();
            b.iter(|| {
                sim.tick().unwrap();
                black_box(sim.current_tick());
            });
            sim.dispose().unwrap();
        });
    }

    group.bench_function("startup_160x90", |b| {
        b.iter_batched(
            || config(160, 90),
            |config| {
                let mut sim = creature_sim::Simulator::new(config).unwrap();
                sim.dispose().unwrap();
                black_box(sim.current_tick());
            },
            BatchSize::SmallInput,
        );
    });

    group.finish();
}

criterion_group!(benches, tick_benchmark);
criterion_main!(benches);
