//! Spectrum widget
//!
//! Byte-scaled analyser bins drawn on log-spaced frequency points.

use ratatui::{
    layout::Rect,
    style::{Color, Style},
    symbols,
    widgets::{Axis, Block, Borders, Chart, Dataset, GraphType},
    Frame,
};

/// Number of points drawn across the band
const SPECTRUM_POINTS: usize = 64;

/// Pick log-spaced bins from 20 Hz to Nyquist. Returns (frequency, level 0..1).
pub fn log_points(bins: &[u8], sample_rate: f32) -> Vec<(f64, f64)> {
    if bins.is_empty() {
        return Vec::new();
    }
    let nyquist = (sample_rate / 2.0).max(40.0) as f64;
    let ratio = nyquist / 20.0;
    let hz_per_bin = nyquist / bins.len() as f64;
    (0..SPECTRUM_POINTS)
        .map(|i| {
            let t = i as f64 / (SPECTRUM_POINTS - 1) as f64;
            let freq = 20.0 * ratio.powf(t);
            let index = ((freq / hz_per_bin) as usize).min(bins.len() - 1);
            (freq, bins[index] as f64 / 255.0)
        })
        .collect()
}

pub fn render_spectrum(frame: &mut Frame, area: Rect, bins: &[u8], sample_rate: f32) {
    let block = Block::default().title(" Spectrum ").borders(Borders::ALL);
    let points = log_points(bins, sample_rate);
    // Plot against log frequency so the low end gets room
    let data: Vec<(f64, f64)> = points.iter().map(|(f, v)| (f.log10(), *v)).collect();

    let dataset = Dataset::default()
        .marker(symbols::Marker::Braille)
        .graph_type(GraphType::Line)
        .style(Style::default().fg(Color::Green))
        .data(&data);

    let max_x = (sample_rate as f64 / 2.0).max(40.0).log10();
    let chart = Chart::new(vec![dataset])
        .block(block)
        .x_axis(
            Axis::default()
                .bounds([20f64.log10(), max_x])
                .labels(vec!["20", "200", "2k", "20k"])
                .style(Style::default().fg(Color::DarkGray)),
        )
        .y_axis(
            Axis::default()
                .bounds([0.0, 1.0])
                .labels(vec!["-100", "-65", "-30"])
                .style(Style::default().fg(Color::DarkGray)),
        );

    frame.render_widget(chart, area);
}
