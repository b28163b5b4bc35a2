//! Benchmarks for the surrogate stages

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use brainweb_tdcs_core::{TissueId, TISSUES};
use brainweb_tdcs_native::surrogate::{ConductivityPrior, HaltonDesign, InversionGrid};
use brainweb_tdcs_native::{GaussianProcess, GprConfig};
use nalgebra::DMatrix;

/// Halton conductivities with a smooth synthetic response per column
fn synthetic_training(n: usize, columns: usize) -> (DMatrix<f64>, DMatrix<f64>) {
    let x = HaltonDesign::new(5, 0).and_then(|d| d.sample(n)).unwrap_or_else(|_| DMatrix::zeros(n, 5));
    let y = DMatrix::from_fn(n, columns, |i, j| {
        let row = x.row(i);
        (row[0] + 0.5 * row[1]).sin() * (1.0 + j as f64 * 0.1) + row[4]
    });
    (x, y)
}

fn bench_grid_construction(c: &mut Criterion) {
    let mut group = c.benchmark_group("inversion_grid");
    group.sample_size(10);

    let prior = ConductivityPrior::new(&TISSUES[TissueId::Gm.index()]).unwrap();
    for resolution in [10_000, 100_000, 1_000_000].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(resolution), resolution, |b, &resolution| {
            b.iter(|| black_box(InversionGrid::new(&prior, resolution).unwrap()));
        });
    }

    group.finish();
}

fn bench_grid_inversion(c: &mut Criterion) {
    let prior = ConductivityPrior::new(&TISSUES[TissueId::Csf.index()]).unwrap();
    let grid = InversionGrid::new(&prior, 1_000_000).unwrap();

    c.bench_function("invert_1000_levels", |b| {
        b.iter(|| {
            let mut total = 0.0;
            for i in 0..1000 {
                total += grid.invert(black_box(f64::from(i) / 999.0));
            }
            black_box(total)
        });
    });
}

fn bench_gp_fit(c: &mut Criterion) {
    let mut group = c.benchmark_group("gp_fit");
    group.sample_size(10);

    let config = GprConfig { restarts: 2, ..Default::default() };
    for n in [11, 21, 41].iter() {
        let (x, y) = synthetic_training(*n, 10);
        group.bench_with_input(BenchmarkId::from_parameter(n), n, |b, _| {
            b.iter(|| black_box(GaussianProcess::fit(&x, &y, &config).unwrap()));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_grid_construction, bench_grid_inversion, bench_gp_fit);
criterion_main!(benches);
