//! Benchmarks for the delay-aware kernels on a realistic block
//! (8192 samples × 1024 channels, L-band, DM 300).
use criterion::{criterion_group, criterion_main, Criterion};
use ndarray::{Array, Array1, Array2};
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;
use pulsekern_core::{dedispersion, delay, FilterbankHeader, FoldParams, FoldedProfile, KernelConfig, MomentAccumulator};

const NSAMPS: usize = 8192;
const NCHANS: usize = 1024;

fn fixture() -> (FilterbankHeader, Array2<f32>) {
    let header = FilterbankHeader::new(NCHANS, NSAMPS, 64e-6, 1500.0, -0.29);
    let block = Array::random((NSAMPS, NCHANS), Uniform::new(0.0f32, 1.0));
    (header, block)
}

fn benchmark_dedisperse(c: &mut Criterion) {
    let (header, block) = fixture();
    let delays = delay::dm_delays(&header, 300.0).unwrap();
    let mut out = Array1::<f32>::zeros(delays.valid_rows(NSAMPS));
    let mut group = c.benchmark_group("dedisperse");
    group.sample_size(20);

    group.bench_function("dm300", |b| {
        b.iter(|| {
            out.fill(0.0);
            dedispersion::dedisperse(block.view(), &delays, out.view_mut(), 0).unwrap();
        })
    });
}

fn benchmark_fold(c: &mut Criterion) {
    let (header, block) = fixture();
    let delays = delay::dm_delays(&header, 300.0).unwrap();
    let params = FoldParams::new(0.0333, 0.0, 128, 8, 32);
    let mut group = c.benchmark_group("fold");
    group.sample_size(10);

    for parallel in [false, true] {
        let config = KernelConfig {
            n_workers: 0,
            fold_parallel: parallel,
        };
        let name = if parallel { "subband_parallel" } else { "sequential" };
        group.bench_function(name, |b| {
            let mut profile = FoldedProfile::new(params.clone()).unwrap();
            b.iter(|| {
                profile.reset();
                profile.fold(block.view(), &delays, &header, 0, &config).unwrap();
            })
        });
    }
}

fn benchmark_moments(c: &mut Criterion) {
    let (_, block) = fixture();
    let mut group = c.benchmark_group("moments");
    group.sample_size(20);

    group.bench_function("update", |b| {
        b.iter(|| {
            let mut acc = MomentAccumulator::new(NCHANS);
            acc.update(block.view()).unwrap();
        })
    });
}

criterion_group!(benches, benchmark_dedisperse, benchmark_fold, benchmark_moments);
criterion_main!(benches);
