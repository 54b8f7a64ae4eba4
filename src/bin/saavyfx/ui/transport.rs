//! Transport bar widget - play state, position, rhythm, recorder and levels

use ratatui::{
    layout::Rect,
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

use saavy_fx::sequencing::SequencerState;

use super::state::Snapshot;

pub struct TransportInfo<'a> {
    pub source_name: Option<&'a str>,
    pub bpm: f32,
    pub recording: Option<f64>,
}

fn clock(seconds: f64) -> String {
    let total = seconds.max(0.0) as u64;
    format!("{}:{:02}", total / 60, total % 60)
}

pub fn render_transport(frame: &mut Frame, area: Rect, state: &Snapshot, info: &TransportInfo) {
    let block = Block::default().title(" saavyfx ").borders(Borders::ALL);

    let (symbol, label, color) = match (state.has_source, state.playing) {
        (false, _) => ("■", "No source", Color::DarkGray),
        (true, true) => ("▶", "Playing", Color::Green),
        (true, false) => ("⏸", "Paused", Color::Yellow),
    };

    let mut spans = vec![
        Span::styled(format!(" {} {}  ", symbol, label), Style::default().fg(color)),
        Span::styled(
            format!("{}  ", info.source_name.unwrap_or("-")),
            Style::default().fg(Color::White),
        ),
        Span::styled(
            format!(
                "{} / {}{}  ",
                clock(state.position),
                state.duration.map_or_else(|| "-".to_string(), clock),
                if state.looping { " ⟳" } else { "" }
            ),
            Style::default().fg(Color::DarkGray),
        ),
        Span::styled(format!("BPM: {:.0}", info.bpm), Style::default().fg(Color::Cyan)),
    ];
    if state.rhythm == Some(SequencerState::Scheduling) {
        spans.push(Span::styled(" ♪", Style::default().fg(Color::Cyan)));
    }
    spans.push(Span::raw("  "));
    if let Some(seconds) = info.recording {
        spans.push(Span::styled(
            format!("● REC {}  ", clock(seconds)),
            Style::default().fg(Color::Red),
        ));
    }
    spans.push(Span::styled(
        format!("{:.1}kHz  ", state.sample_rate / 1000.0),
        Style::default().fg(Color::DarkGray),
    ));
    spans.push(Span::styled(
        format!("Peak: {:.2}  RMS: {:.2}", state.stats.peak, state.stats.rms),
        Style::default().fg(Color::Magenta),
    ));
    if !state.running {
        spans.push(Span::styled("  idle", Style::default().fg(Color::DarkGray)));
    }

    let paragraph = Paragraph::new(Line::from(spans)).block(block);
    frame.render_widget(paragraph, area);
}
