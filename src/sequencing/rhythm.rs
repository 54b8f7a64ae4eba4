//! Sixteen-step drum patterns and the scheduler that turns them into
//! absolute-time trigger events.

use std::fmt;

use super::kit::{Drum, RhythmKit};
use super::trigger::TriggerEvent;
use crate::context::Clock;

/// Steps per pattern, four per beat over one bar.
pub const STEPS: usize = 16;

/// Default gap between `play` and the first step, so nothing is scheduled
/// in the past.
pub const DEFAULT_LEAD_TIME: f64 = 0.1;

/// Which drums fire on one step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Step {
    pub kick: bool,
    pub snare: bool,
    pub hat: bool,
}

impl Step {
    pub fn hits(&self, drum: Drum) -> bool {
        match drum {
            Drum::Kick => self.kick,
            Drum::Snare => self.snare,
            Drum::Hat => self.hat,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepPattern {
    steps: [Step; STEPS],
}

impl StepPattern {
    pub fn new(steps: [Step; STEPS]) -> Self {
        Self { steps }
    }

    pub fn from_fn<F: FnMut(usize) -> Step>(f: F) -> Self {
        Self {
            steps: std::array::from_fn(f),
        }
    }

    /// Four on the floor, backbeat snare, hats on every sixteenth.
    pub fn straight() -> Self {
        Self::from_fn(|i| Step {
            kick: i % 4 == 0,
            snare: i % 8 == 4,
            hat: true,
        })
    }

    /// Half-time kick, backbeat snare, hats on eighths.
    pub fn half_time() -> Self {
        Self::from_fn(|i| Step {
            kick: i % 8 == 0,
            snare: i % 8 == 4,
            hat: i % 2 == 0,
        })
    }

    /// Built-in patterns by number, starting at 1.
    pub fn preset(number: usize) -> Option<Self> {
        match number {
            1 => Some(Self::straight()),
            2 => Some(Self::half_time()),
            _ => None,
        }
    }

    pub fn steps(&self) -> &[Step; STEPS] {
        &self.steps
    }

    pub fn step(&self, index: usize) -> Option<Step> {
        self.steps.get(index).copied()
    }
}

impl Default for StepPattern {
    fn default() -> Self {
        Self::straight()
    }
}

impl fmt::Display for StepPattern {
    /// One row per drum, `x` for a hit.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (row, drum) in Drum::ALL.iter().enumerate() {
            if row > 0 {
                writeln!(f)?;
            }
            write!(f, "{:<5} ", drum.name())?;
            for step in &self.steps {
                f.write_str(if step.hits(*drum) { "x" } else { "." })?;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequencerState {
    Idle,
    Scheduling,
}

/// Schedules one bar at a time and refuses to overlap bars.
///
/// The scheduling window closes four beats after `play`, measured on the
/// clock passed in. This is a re-entrancy guard, not playback tracking.
#[derive(Debug, Clone)]
pub struct RhythmSequencer {
    lead_time: f64,
    /// Clock time the current window closes
    idle_at: Option<f64>,
}

impl RhythmSequencer {
    pub fn new() -> Self {
        Self::with_lead_time(DEFAULT_LEAD_TIME)
    }

    pub fn with_lead_time(lead_time: f64) -> Self {
        Self {
            lead_time: lead_time.max(0.0),
            idle_at: None,
        }
    }

    pub fn lead_time(&self) -> f64 {
        self.lead_time
    }

    /// Schedule `pattern` at `bpm`. Returns `None` while a previous bar is
    /// still in its window, or when `bpm` is not a positive number.
    ///
    /// Drums without a loaded buffer are skipped.
    pub fn play(
        &mut self,
        pattern: &StepPattern,
        bpm: f32,
        kit: &RhythmKit,
        clock: &dyn Clock,
    ) -> Option<Vec<TriggerEvent>> {
        let now = clock.now();
        if self.state(now) == SequencerState::Scheduling {
            log::debug!(target: "rhythm", "pattern still scheduling, ignoring play");
            return None;
        }
        if !bpm.is_finite() || bpm <= 0.0 {
            log::warn!(target: "rhythm", "ignoring tempo {}", bpm);
            return None;
        }

        let seconds_per_beat = 60.0 / bpm as f64;
        let start = now + self.lead_time;
        let mut events = Vec::new();
        for (index, step) in pattern.steps().iter().enumerate() {
            let when = start + index as f64 * seconds_per_beat / 4.0;
            for drum in Drum::ALL {
                if !step.hits(drum) {
                    continue;
                }
                if let Some(buffer) = kit.buffer(drum) {
                    events.push(TriggerEvent::new(drum, buffer.clone(), when));
                }
            }
        }

        self.idle_at = Some(now + 4.0 * seconds_per_beat);
        log::debug!(
            target: "rhythm",
            "scheduled {} triggers at {} bpm from {:.3}s",
            events.len(),
            bpm,
            start
        );
        Some(events)
    }

    /// Close the window if it has elapsed. Returns true on the transition back
    /// to idle.
    pub fn poll(&mut self, now: f64) -> bool {
        match self.idle_at {
            Some(at) if now >= at => {
                self.idle_at = None;
                true
            }
            _ => false,
        }
    }

    pub fn state(&self, now: f64) -> SequencerState {
        match self.idle_at {
            Some(at) if now < at => SequencerState::Scheduling,
            _ => SequencerState::Idle,
        }
    }
}

impl Default for RhythmSequencer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ManualClock;

    fn count(events: &[TriggerEvent], drum: Drum) -> usize {
        events.iter().filter(|e| e.drum == drum).count()
    }

    #[test]
    fn test_straight_pattern_layout() {
        let pattern = StepPattern::straight();
        let kicks: Vec<usize> = (0..STEPS).filter(|&i| pattern.steps()[i].kick).collect();
        let snares: Vec<usize> = (0..STEPS).filter(|&i| pattern.steps()[i].snare).collect();
        assert_eq!(kicks, vec![0, 4, 8, 12]);
        assert_eq!(snares, vec![4, 12]);
        assert!(pattern.steps().iter().all(|s| s.hat));
    }

    #[test]
    fn test_half_time_pattern_layout() {
        let pattern = StepPattern::preset(2).unwrap();
        let kicks: Vec<usize> = (0..STEPS).filter(|&i| pattern.steps()[i].kick).collect();
        assert_eq!(kicks, vec![0, 8]);
        assert_eq!(pattern.steps().iter().filter(|s| s.hat).count(), 8);
        assert!(StepPattern::preset(3).is_none());
    }

    #[test]
    fn test_events_fall_on_sixteenths_after_lead_time() {
        let clock = ManualClock::new(10.0);
        let kit = RhythmKit::synthesized(8_000.0);
        let mut seq = RhythmSequencer::new();
        let events = seq.play(&StepPattern::straight(), 120.0, &kit, &clock).unwrap();

        assert_eq!(count(&events, Drum::Kick), 4);
        assert_eq!(count(&events, Drum::Snare), 2);
        assert_eq!(count(&events, Drum::Hat), 16);

        // 120 bpm: a sixteenth is 0.125 s
        let hats: Vec<f64> = events.iter().filter(|e| e.drum == Drum::Hat).map(|e| e.when).collect();
        assert!((hats[0] - 10.1).abs() < 1e-9);
        assert!((hats[15] - (10.1 + 15.0 * 0.125)).abs() < 1e-9);
        let snare = events.iter().find(|e| e.drum == Drum::Snare).unwrap();
        assert!((snare.when - 10.6).abs() < 1e-9);
        assert!((snare.gain - 0.9).abs() < 1e-6);
    }

    #[test]
    fn test_play_while_scheduling_is_rejected() {
        let clock = ManualClock::new(0.0);
        let kit = RhythmKit::synthesized(8_000.0);
        let mut seq = RhythmSequencer::new();
        assert!(seq.play(&StepPattern::straight(), 120.0, &kit, &clock).is_some());
        assert_eq!(seq.state(clock.now()), SequencerState::Scheduling);

        clock.advance(1.9);
        assert!(seq.play(&StepPattern::half_time(), 120.0, &kit, &clock).is_none());

        clock.set(2.0);
        assert_eq!(seq.state(clock.now()), SequencerState::Idle);
        assert!(seq.play(&StepPattern::half_time(), 120.0, &kit, &clock).is_some());
    }

    #[test]
    fn test_poll_reports_transition_once() {
        let clock = ManualClock::new(0.0);
        let mut seq = RhythmSequencer::new();
        seq.play(&StepPattern::straight(), 60.0, &RhythmKit::empty(), &clock);
        assert!(!seq.poll(3.9));
        assert!(seq.poll(4.0));
        assert!(!seq.poll(5.0));
    }

    #[test]
    fn test_missing_buffers_are_skipped() {
        let clock = ManualClock::new(0.0);
        let mut kit = RhythmKit::synthesized(8_000.0);
        kit.set(Drum::Hat, None);
        let events = RhythmSequencer::new()
            .play(&StepPattern::straight(), 100.0, &kit, &clock)
            .unwrap();
        assert_eq!(count(&events, Drum::Hat), 0);
        assert_eq!(events.len(), 6);

        let mut seq = RhythmSequencer::new();
        let none = seq.play(&StepPattern::straight(), 100.0, &RhythmKit::empty(), &clock).unwrap();
        assert!(none.is_empty());
        // The window still opens without any buffers
        assert_eq!(seq.state(0.0), SequencerState::Scheduling);
    }

    #[test]
    fn test_bad_tempo_is_ignored() {
        let clock = ManualClock::new(0.0);
        let kit = RhythmKit::synthesized(8_000.0);
        let mut seq = RhythmSequencer::new();
        assert!(seq.play(&StepPattern::straight(), 0.0, &kit, &clock).is_none());
        assert!(seq.play(&StepPattern::straight(), f32::NAN, &kit, &clock).is_none());
        assert_eq!(seq.state(0.0), SequencerState::Idle);
    }

    #[test]
    fn test_events_share_kit_buffers() {
        let clock = ManualClock::new(0.0);
        let kit = RhythmKit::synthesized(8_000.0);
        let events = RhythmSequencer::new()
            .play(&StepPattern::straight(), 120.0, &kit, &clock)
            .unwrap();
        let kick = kit.buffer(Drum::Kick).unwrap();
        for event in events.iter().filter(|e| e.drum == Drum::Kick) {
            assert!(std::sync::Arc::ptr_eq(&event.buffer, kick));
        }
    }

    #[test]
    fn test_pattern_display() {
        let text = StepPattern::half_time().to_string();
        let first = text.lines().next().unwrap();
        assert_eq!(first, "kick  x.......x.......");
    }
}
