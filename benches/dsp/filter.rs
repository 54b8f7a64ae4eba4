//! Benchmarks for the state-variable filter.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion};
use saavy_fx::dsp::filter::SVFilter;
use saavy_fx::graph::RenderCtx;

use crate::BLOCK_SIZES;

pub fn bench_filter(c: &mut Criterion) {
    let mut group = c.benchmark_group("dsp/filter");
    let ctx = RenderCtx::new(48_000.0, 0.0);

    for &size in BLOCK_SIZES {
        // Sawtooth-like ramp
        let input: Vec<f32> = (0..size)
            .map(|i| (i as f32 / size as f32) * 2.0 - 1.0)
            .collect();

        let filters = [
            ("lowpass", SVFilter::lowpass(1000.0)),
            ("highpass", SVFilter::highpass(1000.0)),
            ("bandpass", SVFilter::bandpass(1000.0)),
            ("notch", SVFilter::notch(1000.0)),
            ("peaking", SVFilter::peaking(1000.0, 6.0)),
        ];
        for (name, mut filter) in filters {
            filter.set_q(2.0);
            let mut buffer = input.clone();
            group.bench_with_input(BenchmarkId::new(name, size), &size, |b, _| {
                b.iter(|| {
                    buffer.copy_from_slice(&input);
                    filter.render(black_box(&mut buffer), black_box(&ctx));
                })
            });
        }

        // Per-sample path used when the cutoff moves every frame
        let mut filter = SVFilter::lowpass(1000.0);
        group.bench_with_input(BenchmarkId::new("tick_sweep", size), &size, |b, _| {
            b.iter(|| {
                let mut sum = 0.0f32;
                for (i, &sample) in input.iter().enumerate() {
                    filter.set_cutoff(500.0 + i as f32);
                    let coeffs = filter.coefficients(48_000.0);
                    sum += filter.tick(black_box(sample), &coeffs);
                }
                sum
            })
        });
    }

    group.finish();
}
