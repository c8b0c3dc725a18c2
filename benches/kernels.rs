//! Throughput benchmarks for the tile kernels.

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tilemul::{DstStorage, FloatKernelParams, Int8KernelParams, Rescale, TILE_COLS, TILE_ROWS};

fn bench_int8(c: &mut Criterion) {
    let mut group = c.benchmark_group("int8_kernel");
    let mut rng = StdRng::seed_from_u64(1);

    for &n in &[64usize, 256] {
        let depth = n;
        let lhs: Vec<i8> = (0..n * depth).map(|_| rng.random()).collect();
        let rhs: Vec<i8> = (0..n * depth).map(|_| rng.random()).collect();
        let lhs_sums: Vec<i32> = (0..n).map(|_| rng.random_range(-1000..1000)).collect();
        let rhs_sums: Vec<i32> = (0..n).map(|_| rng.random_range(-1000..1000)).collect();
        let mut dst = vec![0i8; n * n];

        group.throughput(Throughput::Elements((n * n * depth) as u64));
        group.bench_with_input(BenchmarkId::new("i8_dst", n), &n, |b, _| {
            b.iter(|| {
                let mut params = Int8KernelParams {
                    lhs: black_box(&lhs),
                    lhs_stride: depth,
                    rhs: black_box(&rhs),
                    rhs_stride: depth,
                    depth,
                    start_row: 0,
                    last_row: n - TILE_ROWS,
                    dst_rows: n,
                    start_col: 0,
                    last_col: n - TILE_COLS,
                    dst_cols: n,
                    lhs_zero_point: 2,
                    rhs_zero_point: -3,
                    prod_zp_depth: 2 * -3 * depth as i32,
                    lhs_sums: Some(&lhs_sums),
                    rhs_sums: Some(&rhs_sums),
                    bias: None,
                    rescale: Rescale::PerTensor {
                        fixedpoint: (1 << 30) + 7,
                        exponent: -1,
                    },
                    dst_zero_point: 1,
                    clamp_min: -128,
                    clamp_max: 127,
                    dst: DstStorage::I8(&mut dst),
                    dst_stride: n,
                };
                tilemul::run_int8(&mut params).unwrap();
            })
        });
    }
    group.finish();
}

fn bench_float(c: &mut Criterion) {
    let mut group = c.benchmark_group("float_kernel");
    let mut rng = StdRng::seed_from_u64(2);

    for &n in &[64usize, 256] {
        let depth = n;
        let lhs: Vec<f32> = (0..n * depth).map(|_| rng.random_range(-1.0..1.0)).collect();
        let rhs: Vec<f32> = (0..n * depth).map(|_| rng.random_range(-1.0..1.0)).collect();
        let mut dst = vec![0f32; n * n];

        group.throughput(Throughput::Elements((n * n * depth) as u64));
        group.bench_with_input(BenchmarkId::new("f32", n), &n, |b, _| {
            b.iter(|| {
                let mut params = FloatKernelParams {
                    lhs: black_box(&lhs),
                    lhs_stride: depth,
                    rhs: black_box(&rhs),
                    rhs_stride: depth,
                    depth,
                    start_row: 0,
                    last_row: n - TILE_ROWS,
                    dst_rows: n,
                    start_col: 0,
                    last_col: n - TILE_COLS,
                    dst_cols: n,
                    bias: None,
                    clamp_min: f32::NEG_INFINITY,
                    clamp_max: f32::INFINITY,
                    dst: &mut dst,
                    dst_stride: n,
                };
                tilemul::run_float(&mut params).unwrap();
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_int8, bench_float);
criterion_main!(benches);
