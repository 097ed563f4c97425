//! Composition benchmarks: tiled vs single stamp over a 720p frame.
//! Run: cargo bench

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use sigil::compositor::composite;
use sigil::mark::render_mark;
use sigil::media::pixmap_from_rgba;
use sigil::schema::{MarkMode, WatermarkConfig};

fn bench_composite(c: &mut Criterion) {
    let data = vec![128_u8; 1280 * 720 * 4];
    let source = pixmap_from_rgba(&data, 1280, 720).expect("source pixmap");

    let tiled_config = WatermarkConfig::default();
    let tiled_tile = render_mark(&tiled_config, None, None)
        .expect("render")
        .expect("tile");

    let mut single_config = WatermarkConfig::default();
    single_config.mode = MarkMode::Single;
    let single_tile = render_mark(&single_config, None, None)
        .expect("render")
        .expect("tile");

    let mut group = c.benchmark_group("composite_frame");
    group.sample_size(50);

    group.bench_function("tiled_720p", |b| {
        b.iter(|| black_box(composite(&source, &tiled_config, Some(&tiled_tile)).expect("composite")))
    });
    group.bench_function("single_720p", |b| {
        b.iter(|| {
            black_box(composite(&source, &single_config, Some(&single_tile)).expect("composite"))
        })
    });

    group.finish();
}

criterion_group!(benches, bench_composite);
criterion_main!(benches);
