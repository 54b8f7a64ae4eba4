//! One-shot sample playback at absolute context times.
//!
//! Events are fire-and-forget: once scheduled they play to the end of their
//! buffer. The player mixes into a bus block-by-block with sample offsets,
//! so triggers land on the frame their time falls in.

use std::sync::Arc;

use super::kit::Drum;
use crate::buffer::SampleBuffer;
use crate::graph::node::StereoFrame;

#[derive(Debug, Clone)]
pub struct TriggerEvent {
    pub drum: Drum,
    pub buffer: Arc<SampleBuffer>,
    /// Context time in seconds
    pub when: f64,
    pub gain: f32,
}

impl TriggerEvent {
    pub fn new(drum: Drum, buffer: Arc<SampleBuffer>, when: f64) -> Self {
        Self {
            drum,
            buffer,
            when,
            gain: drum.gain(),
        }
    }
}

/// A sounding trigger.
#[derive(Debug)]
struct Voice {
    buffer: Arc<SampleBuffer>,
    /// Read position in buffer frames
    position: f64,
    /// Buffer frames per output frame
    rate: f64,
    gain: f32,
}

impl Voice {
    /// Mix into `out`. Returns false once the buffer is exhausted.
    fn mix(&mut self, out: &mut [StereoFrame]) -> bool {
        let len = self.buffer.len() as f64;
        for frame in out.iter_mut() {
            if self.position >= len {
                return false;
            }
            *frame += self.buffer.frame_at(self.position) * self.gain;
            self.position += self.rate;
        }
        self.position < len
    }
}

#[derive(Debug, Default)]
pub struct TriggerPlayer {
    /// Sorted by `when`
    pending: Vec<TriggerEvent>,
    voices: Vec<Voice>,
}

impl TriggerPlayer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule<I: IntoIterator<Item = TriggerEvent>>(&mut self, events: I) {
        self.pending.extend(events);
        self.pending.sort_by(|a, b| a.when.total_cmp(&b.when));
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    pub fn active_voices(&self) -> usize {
        self.voices.len()
    }

    pub fn is_idle(&self) -> bool {
        self.pending.is_empty() && self.voices.is_empty()
    }

    /// Mix everything sounding during `out` into it. `start_time` is the
    /// context time of `out[0]`. Events already in the past start at once.
    pub fn render_into(&mut self, out: &mut [StereoFrame], start_time: f64, sample_rate: f32) {
        if out.is_empty() {
            return;
        }
        let sr = sample_rate as f64;
        let end_time = start_time + out.len() as f64 / sr;

        self.voices.retain_mut(|voice| voice.mix(out));

        let due = self.pending.partition_point(|e| e.when < end_time);
        for event in self.pending.drain(..due) {
            let offset = ((event.when - start_time) * sr).round().max(0.0) as usize;
            let mut voice = Voice {
                rate: event.buffer.sample_rate() as f64 / sr,
                buffer: event.buffer,
                position: 0.0,
                gain: event.gain,
            };
            let alive = match out.get_mut(offset..) {
                Some(tail) if !tail.is_empty() => voice.mix(tail),
                _ => true,
            };
            if alive {
                self.voices.push(voice);
            }
        }
    }

    /// Drop everything, scheduled or sounding.
    pub fn clear(&mut self) {
        self.pending.clear();
        self.voices.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn click(sample_rate: f32, len: usize) -> Arc<SampleBuffer> {
        Arc::new(SampleBuffer::from_mono(sample_rate, vec![1.0; len]))
    }

    fn event(buffer: &Arc<SampleBuffer>, when: f64) -> TriggerEvent {
        TriggerEvent::new(Drum::Kick, buffer.clone(), when)
    }

    #[test]
    fn test_trigger_lands_on_its_frame() {
        let buffer = click(1_000.0, 4);
        let mut player = TriggerPlayer::new();
        player.schedule([event(&buffer, 0.010)]);

        let mut out = vec![StereoFrame::SILENT; 16];
        player.render_into(&mut out, 0.0, 1_000.0);
        assert_eq!(out[9], StereoFrame::SILENT);
        assert_eq!(out[10], StereoFrame::mono(1.0));
        assert_eq!(out[13], StereoFrame::mono(1.0));
        assert_eq!(out[14], StereoFrame::SILENT);
        assert!(player.is_idle());
    }

    #[test]
    fn test_voice_continues_across_blocks() {
        let buffer = click(1_000.0, 6);
        let mut player = TriggerPlayer::new();
        player.schedule([event(&buffer, 0.006)]);

        let mut first = vec![StereoFrame::SILENT; 8];
        player.render_into(&mut first, 0.0, 1_000.0);
        assert_eq!(player.active_voices(), 1);
        let mut second = vec![StereoFrame::SILENT; 8];
        player.render_into(&mut second, 0.008, 1_000.0);
        assert_eq!(second[3], StereoFrame::mono(1.0));
        assert_eq!(second[4], StereoFrame::SILENT);
        assert_eq!(player.active_voices(), 0);
    }

    #[test]
    fn test_future_events_wait() {
        let buffer = click(1_000.0, 2);
        let mut player = TriggerPlayer::new();
        player.schedule([event(&buffer, 1.0)]);
        let mut out = vec![StereoFrame::SILENT; 8];
        player.render_into(&mut out, 0.0, 1_000.0);
        assert!(out.iter().all(|f| *f == StereoFrame::SILENT));
        assert_eq!(player.pending(), 1);
    }

    #[test]
    fn test_gain_applies_and_overlaps_sum() {
        let buffer = click(1_000.0, 4);
        let mut player = TriggerPlayer::new();
        player.schedule([
            TriggerEvent::new(Drum::Hat, buffer.clone(), 0.0),
            TriggerEvent::new(Drum::Snare, buffer.clone(), 0.0),
        ]);
        let mut out = vec![StereoFrame::SILENT; 4];
        player.render_into(&mut out, 0.0, 1_000.0);
        assert!((out[0].left - 1.5).abs() < 1e-6);
    }

    #[test]
    fn test_buffer_rate_is_converted() {
        // 500 Hz buffer played at 1 kHz lasts twice as many frames
        let buffer = click(500.0, 4);
        let mut player = TriggerPlayer::new();
        player.schedule([event(&buffer, 0.0)]);
        let mut out = vec![StereoFrame::SILENT; 10];
        player.render_into(&mut out, 0.0, 1_000.0);
        assert!(out[7].left > 0.49);
        assert_eq!(out[8], StereoFrame::SILENT);
    }
}
