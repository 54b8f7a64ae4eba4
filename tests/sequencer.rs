//! One-shot rhythm scheduling through the console.

use saavy_fx::config::Config;
use saavy_fx::graph::StereoFrame;
use saavy_fx::sequencing::{SequencerState, StepPattern};
use saavy_fx::Console;

const SAMPLE_RATE: f32 = 8_000.0;

fn advance(console: &mut Console, seconds: f64) {
    let mut out = vec![StereoFrame::SILENT; 400];
    let blocks = (seconds * SAMPLE_RATE as f64 / out.len() as f64).ceil() as usize;
    for _ in 0..blocks {
        console.render(&mut out);
    }
}

#[test]
fn test_second_play_rejected_while_scheduling() {
    let mut console = Console::new(Config::embedded(), SAMPLE_RATE);
    let pattern = StepPattern::straight();

    assert!(console.play_rhythm(&pattern, 120.0));
    assert_eq!(console.rhythm_state(), SequencerState::Scheduling);

    advance(&mut console, 1.0);
    assert!(!console.play_rhythm(&pattern, 120.0));
    assert_eq!(console.rhythm_state(), SequencerState::Scheduling);
}

#[test]
fn test_play_accepted_after_bar() {
    let mut console = Console::new(Config::embedded(), SAMPLE_RATE);
    let pattern = StepPattern::half_time();

    assert!(console.play_rhythm(&pattern, 120.0));
    advance(&mut console, 2.05);

    assert_eq!(console.rhythm_state(), SequencerState::Idle);
    assert!(console.play_rhythm(&pattern, 120.0));
}

#[test]
fn test_scheduled_hits_reach_output() {
    let mut console = Console::new(Config::embedded(), SAMPLE_RATE);
    assert!(console.play_rhythm(&StepPattern::straight(), 120.0));

    let mut out = vec![StereoFrame::SILENT; 400];
    let mut peak = 0.0f32;
    for _ in 0..10 {
        console.render(&mut out);
        peak = out.iter().fold(peak, |p, f| p.max(f.peak()));
    }
    assert!(peak > 0.01);
}

#[test]
fn test_invalid_tempo_rejected() {
    let mut console = Console::new(Config::embedded(), SAMPLE_RATE);
    assert!(!console.play_rhythm(&StepPattern::straight(), 0.0));
    assert!(!console.play_rhythm(&StepPattern::straight(), f32::NAN));
    assert_eq!(console.rhythm_state(), SequencerState::Idle);
}
