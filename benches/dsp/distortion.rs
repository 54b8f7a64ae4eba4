//! Benchmarks for the waveshaper at each oversampling setting.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion};
use saavy_fx::dsp::distortion::{Oversample, Waveshaper};

use crate::BLOCK_SIZES;

pub fn bench_distortion(c: &mut Criterion) {
    let mut group = c.benchmark_group("dsp/distortion");

    for &size in BLOCK_SIZES {
        let input: Vec<f32> = (0..size).map(|i| (i as f32 * 0.1).sin()).collect();

        for index in 0..3 {
            let oversample = Oversample::from_index(index);
            let mut shaper = Waveshaper::new(50.0);
            shaper.set_oversample(oversample);
            let mut buffer = input.clone();
            group.bench_with_input(
                BenchmarkId::new(format!("{}x", oversample.factor()), size),
                &size,
                |b, _| {
                    b.iter(|| {
                        buffer.copy_from_slice(&input);
                        shaper.render(black_box(&mut buffer));
                    })
                },
            );
        }
    }

    group.finish();
}
