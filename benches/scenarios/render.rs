//! Benchmarks for rendering blocks through a populated effect chain.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion};
use saavy_fx::config::Config;
use saavy_fx::graph::{MediaSource, RenderCtx, Routing, StereoFrame};
use saavy_fx::{Console, EffectKind, FilterKind};

use crate::BLOCK_SIZES;

/// Endless sawtooth standing in for a decoded file.
struct Saw {
    phase: f32,
}

impl MediaSource for Saw {
    fn render(&mut self, out: &mut [StereoFrame], ctx: &RenderCtx) {
        let step = 110.0 / ctx.sample_rate;
        for frame in out.iter_mut() {
            *frame = StereoFrame::mono(self.phase * 2.0 - 1.0);
            self.phase = (self.phase + step).fract();
        }
    }
}

fn console(kinds: &[EffectKind], routing: Routing) -> Console {
    let mut console = Console::new(Config::embedded(), 48_000.0);
    console.context_mut().graph_mut().set_routing(routing);
    console.load_source(Box::new(Saw { phase: 0.0 }));
    for &kind in kinds {
        // Benchmarks skip kinds the factory cannot build
        let _ = console.enable(kind);
    }
    console
}

pub fn bench_render(c: &mut Criterion) {
    let mut group = c.benchmark_group("scenarios/render");

    let light = [EffectKind::Filter(FilterKind::Lowpass), EffectKind::Panner];
    let heavy = [
        EffectKind::Filter(FilterKind::Lowpass),
        EffectKind::Distortion,
        EffectKind::Delay,
        EffectKind::Compressor,
        EffectKind::Reverb,
    ];

    for &size in BLOCK_SIZES {
        let mut out = vec![StereoFrame::SILENT; size];

        let mut dry = console(&[], Routing::Parallel);
        group.bench_with_input(BenchmarkId::new("dry", size), &size, |b, _| {
            b.iter(|| dry.render(black_box(&mut out)))
        });

        let mut two = console(&light, Routing::Parallel);
        group.bench_with_input(BenchmarkId::new("2_parallel", size), &size, |b, _| {
            b.iter(|| two.render(black_box(&mut out)))
        });

        let mut parallel = console(&heavy, Routing::Parallel);
        group.bench_with_input(BenchmarkId::new("5_parallel", size), &size, |b, _| {
            b.iter(|| parallel.render(black_box(&mut out)))
        });

        let mut series = console(&heavy, Routing::Series);
        group.bench_with_input(BenchmarkId::new("5_series", size), &size, |b, _| {
            b.iter(|| series.render(black_box(&mut out)))
        });
    }

    group.finish();
}
