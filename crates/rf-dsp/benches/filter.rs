use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rf_dsp::{FilterParams, FilterType, StateVariableFilter};

const FRAMES: usize = 4096;
const CHANNELS: usize = 2;

fn bench_svf(c: &mut Criterion) {
    let mut filter = StateVariableFilter::new(CHANNELS);
    filter.set_params(FilterParams::new(FilterType::Lowpass, 2000.0, 0.8, 48_000.0));
    let mut buf = vec![0.0f32; FRAMES * CHANNELS];
    for (i, s) in buf.iter_mut().enumerate() {
        *s = ((i as f32) * 0.01).sin();
    }
    c.bench_function("svf_process_4096x2", |b| {
        b.iter(|| filter.process(black_box(&mut buf)))
    });
}

criterion_group!(benches, bench_svf);
criterion_main!(benches);
