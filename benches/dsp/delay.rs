//! Benchmarks for delay line operations.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion};
use saavy_fx::dsp::delay::DelayLine;

use crate::BLOCK_SIZES;

pub fn bench_delay(c: &mut Criterion) {
    let mut group = c.benchmark_group("dsp/delay");

    // Delay times in samples
    let delay_times: &[usize] = &[
        480,    // 10ms at 48kHz
        4800,   // 100ms at 48kHz
        48000,  // 1 second at 48kHz
    ];

    for &size in BLOCK_SIZES {
        let input: Vec<f32> = (0..size).map(|i| (i as f32 * 0.1).sin()).collect();

        for &delay_samples in delay_times {
            let delay_ms = delay_samples as f32 / 48.0;

            // Echo path of the delay effect: fractional read plus feedback write
            let mut delay = DelayLine::new();
            group.bench_with_input(
                BenchmarkId::new(format!("feedback_{}ms", delay_ms as u32), size),
                &size,
                |b, _| {
                    b.iter(|| {
                        let mut sum = 0.0f32;
                        for &sample in &input {
                            sum += delay.process_feedback(
                                black_box(sample),
                                black_box(delay_samples as f32 + 0.5),
                                0.3,
                            );
                        }
                        sum
                    })
                },
            );
        }
    }

    group.finish();
}
