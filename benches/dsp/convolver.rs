//! Benchmarks for partitioned convolution against the built-in impulses.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion};
use saavy_fx::dsp::convolver::Convolver;
use saavy_fx::dsp::reverb::ImpulsePreset;

use crate::BLOCK_SIZES;

pub fn bench_convolver(c: &mut Criterion) {
    let mut group = c.benchmark_group("dsp/convolver");
    group.sample_size(20);

    for preset in ImpulsePreset::ALL {
        let impulse = preset.render(48_000.0);
        let left = impulse.channel(0).unwrap_or(&[]).to_vec();

        for &size in BLOCK_SIZES {
            let input: Vec<f32> = (0..size).map(|i| (i as f32 * 0.1).sin()).collect();
            let mut convolver = Convolver::new(&left, 0.5);
            group.bench_with_input(
                BenchmarkId::new(format!("{:?}", preset).to_lowercase(), size),
                &size,
                |b, _| {
                    b.iter(|| {
                        let mut sum = 0.0f32;
                        for &sample in &input {
                            sum += convolver.process(black_box(sample));
                        }
                        sum
                    })
                },
            );
        }
    }

    group.finish();
}
