use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};
use glyph_packer::{compact, BinPacker, Heuristic};

/// Glyph-like slot sizes, all even like the region produces.
fn glyph_sizes(count: usize) -> Vec<(i32, i32)> {
    (0..count as i32)
        .map(|i| (4 + 2 * ((i * 7) % 9), 6 + 2 * ((i * 5) % 11)))
        .collect()
}

fn bench_insert(c: &mut Criterion) {
    let sizes = glyph_sizes(500);
    let heuristics = [
        ("bssf", Heuristic::BestShortSideFit),
        ("blsf", Heuristic::BestLongSideFit),
        ("baf", Heuristic::BestAreaFit),
        ("bl", Heuristic::BottomLeftRule),
        ("cp", Heuristic::ContactPointRule),
    ];

    for (name, heuristic) in heuristics {
        c.bench_function(&format!("insert_500_{name}"), |b| {
            b.iter(|| {
                let mut packer = BinPacker::new(1024, 1024, false);
                for &(w, h) in &sizes {
                    black_box(packer.insert(w, h, heuristic));
                }
                packer
            });
        });
    }
}

fn bench_insert_batch(c: &mut Criterion) {
    let sizes = glyph_sizes(100);

    c.bench_function("insert_batch_100_baf", |b| {
        b.iter(|| {
            let mut packer = BinPacker::new(512, 512, true);
            black_box(packer.insert_batch(black_box(&sizes), Heuristic::BestAreaFit))
        });
    });
}

fn bench_compact(c: &mut Criterion) {
    let mut packer = BinPacker::new(1024, 1024, false);
    for (w, h) in glyph_sizes(500) {
        packer.insert(w, h, Heuristic::BestShortSideFit);
    }

    c.bench_function("compact_500", |b| {
        b.iter(|| {
            let mut packer = packer.clone();
            black_box(compact(&mut packer))
        });
    });
}

criterion_group!(benches, bench_insert, bench_insert_batch, bench_compact);
criterion_main!(benches);
