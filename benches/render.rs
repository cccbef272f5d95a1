use criterion::*;
use std::hint::black_box;

use creature_sim::RenderRequest;

mod common;
use common::*;

fn render_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("render");
    group.throughput(Throughput::Elements(320 * 180));

    let (width, height) = WORLDS[1];
    let mut sim = make_sim(width, height);
    sim.run(8).unwrap();

    for (name, zoom) in [("simple", 2.0), ("detailed", 8.0)] {
        group.bench_function(format!("{name}_{width}x{height}"), |b| {
            b.iter(|| {
                let outcome = sim
                    .render(RenderRequest::at(80.0, 45.0, zoom).with_progress(0.5))
                    .unwrap();
                black_box(outcome);
            });
        });
    }

    group.bench_function("spectate_detailed", |b| {
        b.iter(|| {
            let outcome = sim
                .render(RenderRequest::at(0.0, 0.0, 8.0).with_progress(0.5).spectating(0))
                .unwrap();
            black_box(outcome.center);
        });
    });

    sim.dispose().unwrap();
    group.finish();
}

criterion_group!(benches, render_benchmark);
criterion_main!(benches);
