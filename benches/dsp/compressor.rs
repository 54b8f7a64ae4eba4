//! Benchmarks for the stereo-linked compressor.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion};
use saavy_fx::dsp::compressor::{Compressor, CompressorSettings};

use crate::BLOCK_SIZES;

pub fn bench_compressor(c: &mut Criterion) {
    let mut group = c.benchmark_group("dsp/compressor");

    for &size in BLOCK_SIZES {
        // Loud enough to sit above the default threshold
        let input: Vec<f32> = (0..size).map(|i| 0.9 * (i as f32 * 0.05).sin()).collect();

        let mut compressor = Compressor::new(CompressorSettings::default());
        let mut left = input.clone();
        let mut right = input.clone();
        group.bench_with_input(BenchmarkId::new("render", size), &size, |b, _| {
            b.iter(|| {
                left.copy_from_slice(&input);
                right.copy_from_slice(&input);
                compressor.render(black_box(&mut left), black_box(&mut right), 48_000.0);
            })
        });
    }

    group.finish();
}
