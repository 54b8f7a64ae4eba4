//! Waveform oscilloscope widget

use ratatui::{
    layout::Rect,
    style::{Color, Style},
    symbols,
    widgets::{Axis, Block, Borders, Chart, Dataset, GraphType},
    Frame,
};

/// Render byte samples (128 = zero) as a line across the window
pub fn render_waveform(frame: &mut Frame, area: Rect, samples: &[u8]) {
    let block = Block::default().title(" Waveform ").borders(Borders::ALL);

    let data: Vec<(f64, f64)> = samples
        .iter()
        .enumerate()
        .map(|(i, &b)| {
            let x = i as f64 / samples.len() as f64;
            let y = b as f64 / 128.0 - 1.0;
            (x, y)
        })
        .collect();

    let dataset = Dataset::default()
        .marker(symbols::Marker::Braille)
        .graph_type(GraphType::Line)
        .style(Style::default().fg(Color::Cyan))
        .data(&data);

    let chart = Chart::new(vec![dataset])
        .block(block)
        .x_axis(
            Axis::default()
                .bounds([0.0, 1.0])
                .style(Style::default().fg(Color::DarkGray)),
        )
        .y_axis(
            Axis::default()
                .bounds([-1.0, 1.0])
                .style(Style::default().fg(Color::DarkGray)),
        );

    frame.render_widget(chart, area);
}
