use colorsense_core::{
    CalibrationState, ColorRecord, Database, Lrv, Metric, Rgb, SensorSample, encode, find_best_match,
    find_best_match_by, find_top_matches, transform,
};
use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;

fn table(len: u32) -> Vec<ColorRecord> {
    (0..len)
        .map(|i| {
            let rgb = Rgb::new((i * 7 % 256) as u8, (i * 13 % 256) as u8, (i * 29 % 256) as u8);
            ColorRecord::new(format!("Color {i}"), format!("C{i:05}"), rgb, Lrv((i % 10000) as u16), i)
        })
        .collect()
}

fn benchmark_matcher(c: &mut Criterion) {
    let bytes = encode(&table(4000)).expect("encode").bytes;
    let db = Database::new(bytes).expect("valid table");
    let query = Rgb::new(168, 160, 147);

    c.bench_function("best_match_4000", |b| {
        b.iter(|| find_best_match(black_box(query), db.records()))
    });
    c.bench_function("top5_match_4000", |b| {
        b.iter(|| find_top_matches(black_box(query), db.records(), 5))
    });
    c.bench_function("best_match_ciede2000_4000", |b| {
        b.iter(|| find_best_match_by(black_box(query), db.records(), Metric::Ciede2000))
    });
    c.bench_function("decode_4000", |b| b.iter(|| db.records().count()));
}

fn benchmark_transform(c: &mut Criterion) {
    let state = CalibrationState::default();
    let sample = SensorSample::new(9000, 9400, 8000, 150, 120);

    c.bench_function("transform", |b| {
        b.iter(|| transform(black_box(&sample), black_box(&state)))
    });
}

criterion_group!(benches, benchmark_matcher, benchmark_transform);
criterion_main!(benches);
