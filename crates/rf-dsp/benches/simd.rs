use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rf_dsp::{convert_s16_to_f32, convert_u8_to_f32};

const FRAMES: usize = 4096;

fn bench_u8(c: &mut Criterion) {
    let input: Vec<u8> = (0..FRAMES).map(|i| (i % 256) as u8).collect();
    let mut out = vec![0.0f32; FRAMES];
    c.bench_function("u8_to_f32_4096", |b| {
        b.iter(|| convert_u8_to_f32(black_box(&input), black_box(&mut out)))
    });
}

fn bench_s16(c: &mut Criterion) {
    let input: Vec<i16> = (0..FRAMES).map(|i| (i as i16).wrapping_mul(37)).collect();
    let mut out = vec![0.0f32; FRAMES];
    c.bench_function("s16_to_f32_4096", |b| {
        b.iter(|| convert_s16_to_f32(black_box(&input), black_box(&mut out)))
    });
}

criterion_group!(benches, bench_u8, bench_s16);
criterion_main!(benches);
