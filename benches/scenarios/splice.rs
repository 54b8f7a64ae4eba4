//! Benchmarks for editing the chain while a source is loaded.

use criterion::Criterion;
use saavy_fx::config::Config;
use saavy_fx::{Console, EffectKind, FilterKind};

pub fn bench_splice(c: &mut Criterion) {
    let mut group = c.benchmark_group("scenarios/splice");

    let mut console = Console::new(Config::embedded(), 48_000.0);
    let _ = console.enable(EffectKind::Filter(FilterKind::Highpass));
    let _ = console.enable(EffectKind::Panner);

    // Every toggle rewires the source, the inserts and the sink
    group.bench_function("toggle_delay", |b| {
        b.iter(|| {
            let _ = console.toggle(EffectKind::Delay);
        })
    });

    group.bench_function("toggle_lowpass", |b| {
        b.iter(|| {
            let _ = console.toggle(EffectKind::Filter(FilterKind::Lowpass));
        })
    });

    group.finish();
}
