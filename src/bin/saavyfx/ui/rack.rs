//! Effect rack widget - one row per effect kind with its parameter sliders

use std::collections::BTreeMap;

use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

use saavy_fx::registry::ParamSpec;
use saavy_fx::{EffectKind, ParamSet};

use super::state::Snapshot;

/// Steps from min to max when nudging a slider.
const SLIDER_STEPS: f32 = 50.0;

/// Slider values, kept whether or not the effect is enabled. Enabling an
/// effect pushes its current sliders.
pub struct RackState {
    pub selected: usize,
    pub param: usize,
    values: BTreeMap<EffectKind, ParamSet>,
}

impl RackState {
    pub fn new(initial: impl Fn(EffectKind) -> ParamSet) -> Self {
        let values = EffectKind::ALL
            .into_iter()
            .map(|kind| (kind, ParamSet::defaults_for(kind).merged(&initial(kind))))
            .collect();
        Self {
            selected: 0,
            param: 0,
            values,
        }
    }

    pub fn kind(&self) -> EffectKind {
        EffectKind::ALL[self.selected.min(EffectKind::ALL.len() - 1)]
    }

    pub fn spec(&self) -> Option<&'static ParamSpec> {
        self.kind().params().get(self.param)
    }

    pub fn values(&self, kind: EffectKind) -> ParamSet {
        self.values.get(&kind).cloned().unwrap_or_default()
    }

    pub fn select(&mut self, delta: isize) {
        let len = EffectKind::ALL.len() as isize;
        self.selected = (self.selected as isize + delta).rem_euclid(len) as usize;
        self.param = 0;
    }

    pub fn select_param(&mut self, delta: isize) {
        let len = self.kind().params().len() as isize;
        if len > 0 {
            self.param = (self.param as isize + delta).rem_euclid(len) as usize;
        }
    }

    /// Move the selected slider. Returns the parameter and its new value.
    pub fn nudge(&mut self, direction: f32) -> Option<(&'static str, f32)> {
        let kind = self.kind();
        let spec = self.spec()?;
        let step = if spec.is_choice() {
            1.0
        } else {
            (spec.max - spec.min) / SLIDER_STEPS
        };
        let params = self.values.entry(kind).or_default();
        let current = params.get(spec.name).unwrap_or(spec.default);
        let value = spec.clamp(current + step * direction);
        params.set(spec.name, value);
        Some((spec.name, value))
    }
}

fn format_value(spec: &ParamSpec, value: f32) -> String {
    if let Some(label) = spec.choice_label(value) {
        return label.to_string();
    }
    if (spec.max - spec.min) >= 100.0 {
        format!("{:.0}", value)
    } else {
        format!("{:.2}", value)
    }
}

pub fn render_rack(frame: &mut Frame, area: Rect, rack: &RackState, state: &Snapshot) {
    let block = Block::default().title(" Effects ").borders(Borders::ALL);

    let lines: Vec<Line> = EffectKind::ALL
        .iter()
        .enumerate()
        .map(|(row, kind)| {
            let selected = row == rack.selected;
            let (mark, color) = if state.is_unsupported(*kind) {
                ("✗", Color::DarkGray)
            } else if state.is_active(*kind) {
                ("●", Color::Green)
            } else {
                ("○", Color::Gray)
            };
            let name_style = if selected {
                Style::default().fg(color).add_modifier(Modifier::REVERSED)
            } else {
                Style::default().fg(color)
            };

            let mut spans = vec![Span::styled(format!(" {} {:<11}", mark, kind.label()), name_style)];
            let values = rack.values.get(kind);
            for (i, spec) in kind.params().iter().enumerate() {
                let value = values.and_then(|v| v.get(spec.name)).unwrap_or(spec.default);
                let style = if selected && i == rack.param {
                    Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
                } else {
                    Style::default().fg(Color::DarkGray)
                };
                spans.push(Span::styled(
                    format!(" {}={}", spec.name, format_value(spec, value)),
                    style,
                ));
            }
            Line::from(spans)
        })
        .collect();

    frame.render_widget(Paragraph::new(lines).block(block), area);
}
