//! TUI module for saavyfx
//!
//! Effect rack, transport and a spectrum/waveform scope fed from the
//! console's tap point.

mod rack;
mod scope;
mod spectrum;
mod state;
mod transport;
mod waveform;

use std::collections::BTreeSet;
use std::fmt::Display;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use color_eyre::eyre::Result as EyreResult;
use crossterm::event::{
    self, DisableFocusChange, DisableMouseCapture, EnableFocusChange, EnableMouseCapture, Event,
    KeyCode, KeyEventKind, MouseEventKind,
};
use ratatui::{
    layout::{Constraint, Direction, Layout},
    style::{Color, Style},
    widgets::Paragraph,
    DefaultTerminal, Frame,
};

use saavy_fx::{
    context::Platform,
    dsp::reverb::ImpulsePreset,
    io::{ImpulseSource, Recorder},
    sequencing::StepPattern,
    viz::VisualizationFeed,
    Console,
};

use rack::{render_rack, RackState};
use scope::{LoopFrames, Scope, ScopeData};
use spectrum::render_spectrum;
use state::Snapshot;
use transport::{render_transport, TransportInfo};
use waveform::render_waveform;

/// Transform sizes offered by the scope; `f` steps through them.
const FFT_SIZES: [usize; 6] = [256, 512, 1024, 2048, 4096, 8192];

/// Pointer moves closer together than this are not forwarded to the panner
const PAN_THROTTLE: Duration = Duration::from_millis(50);

pub struct UiApp {
    console: Arc<Mutex<Console>>,
    recorder: Option<Recorder>,
    source_name: Option<String>,
    rack: RackState,
    feed: VisualizationFeed,
    frames: LoopFrames,
    scope: Scope,
    snapshot: Snapshot,
    scratch: Vec<f32>,
    /// Message on the notice line until the next key press
    notice: Option<String>,
    /// Messages already shown; each is surfaced only once
    shown: BTreeSet<String>,
    bpm: f32,
    impulse: usize,
    last_pan: Instant,
    should_quit: bool,
}

impl UiApp {
    pub fn new(
        console: Arc<Mutex<Console>>,
        recorder: Option<Recorder>,
        source_name: Option<String>,
        notices: Vec<String>,
    ) -> Self {
        let (rack, mode, bpm) = match console.lock() {
            Ok(console) => {
                let config = console.config();
                (
                    RackState::new(|kind| config.initial_params(kind)),
                    config.viz_mode(),
                    config.bpm(),
                )
            }
            Err(_) => (RackState::new(|_| Default::default()), Default::default(), 120.0),
        };
        let mut app = Self {
            console,
            recorder,
            source_name,
            rack,
            feed: VisualizationFeed::new(mode),
            frames: LoopFrames::default(),
            scope: Scope::new(),
            snapshot: Snapshot::default(),
            scratch: Vec::new(),
            notice: None,
            shown: BTreeSet::new(),
            bpm,
            impulse: 0,
            last_pan: Instant::now(),
            should_quit: false,
        };
        for notice in notices {
            app.notify(notice);
        }
        app
    }

    /// Run the UI event loop
    pub fn run(&mut self, terminal: &mut DefaultTerminal, platform: &mut dyn Platform) -> EyreResult<()> {
        crossterm::execute!(std::io::stdout(), EnableFocusChange, EnableMouseCapture)?;

        while !self.should_quit {
            self.tick(platform);
            terminal.draw(|frame| self.render(frame))?;

            // ~60fps
            if event::poll(Duration::from_millis(16))? {
                match event::read()? {
                    Event::Key(key) if key.kind == KeyEventKind::Press => self.handle_key(key.code),
                    Event::FocusLost => self.feed.set_visible(false, &mut self.frames, &mut self.scope),
                    Event::FocusGained => self.feed.set_visible(true, &mut self.frames, &mut self.scope),
                    Event::Mouse(mouse) if mouse.kind == MouseEventKind::Moved => {
                        self.follow_pointer(mouse.column)
                    }
                    _ => {}
                }
            }
        }

        crossterm::execute!(std::io::stdout(), DisableFocusChange, DisableMouseCapture)?;
        self.finish_recording();
        if let Ok(mut console) = self.console.lock() {
            console.teardown();
        }
        Ok(())
    }

    /// Per-turn housekeeping: drain the capture ring, match the device power
    /// state, serve a due scope frame and refresh the snapshot.
    fn tick(&mut self, platform: &mut dyn Platform) {
        if let Some(recorder) = self.recorder.as_mut() {
            recorder.pump();
        }
        let Ok(mut console) = self.console.lock() else {
            return;
        };
        console.update_power(platform);
        self.feed
            .set_playback_active(console.should_run(), &mut self.frames, &mut self.scope);
        if self.frames.due().is_some() {
            self.feed
                .on_frame(console.analyser_mut(), &mut self.frames, &mut self.scope);
        }
        self.snapshot = Snapshot::capture(&console, &mut self.scratch);
    }

    fn notify(&mut self, message: impl Display) {
        let message = message.to_string();
        log::warn!("{}", message);
        if self.shown.insert(message.clone()) {
            self.notice = Some(message);
        }
    }

    fn handle_key(&mut self, key: KeyCode) {
        self.notice = None;
        match key {
            KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Esc => self.should_quit = true,
            KeyCode::Char(' ') => self.transport(|source| {
                if source.is_playing() {
                    source.pause();
                } else {
                    source.play();
                }
            }),
            KeyCode::Char('s') => self.transport(|source| source.stop()),
            KeyCode::Char('l') => self.transport(|source| {
                let looping = source.is_looping();
                source.set_looping(!looping);
            }),
            KeyCode::Up => self.rack.select(-1),
            KeyCode::Down => self.rack.select(1),
            KeyCode::Left => self.rack.select_param(-1),
            KeyCode::Right => self.rack.select_param(1),
            KeyCode::Char('+') | KeyCode::Char('=') => self.nudge(1.0),
            KeyCode::Char('-') => self.nudge(-1.0),
            KeyCode::Enter | KeyCode::Char('e') => self.toggle_selected(),
            KeyCode::Char(c @ ('1' | '2')) => self.play_rhythm(c),
            KeyCode::Char('[') => self.bpm = (self.bpm - 5.0).max(40.0),
            KeyCode::Char(']') => self.bpm = (self.bpm + 5.0).min(240.0),
            KeyCode::Char('r') => self.toggle_recording(),
            KeyCode::Char('v') => {
                let mode = self.feed.mode().toggled();
                self.feed.set_mode(mode);
            }
            KeyCode::Char('i') => self.cycle_impulse(),
            KeyCode::Char('f') => self.cycle_fft_size(),
            KeyCode::Char(',') => self.nudge_smoothing(-0.1),
            KeyCode::Char('.') => self.nudge_smoothing(0.1),
            _ => {}
        }
    }

    fn transport(&mut self, f: impl FnOnce(&mut dyn saavy_fx::graph::MediaSource)) {
        let handled = match self.console.lock() {
            Ok(mut console) => match console.transport() {
                Some(source) => {
                    f(source);
                    true
                }
                None => false,
            },
            Err(_) => true,
        };
        if !handled {
            self.notice = Some("no source loaded".to_string());
        }
    }

    fn nudge(&mut self, direction: f32) {
        let kind = self.rack.kind();
        let Some((name, value)) = self.rack.nudge(direction) else {
            return;
        };
        if let Ok(mut console) = self.console.lock() {
            // Dropped when the effect is off; the slider keeps the value
            console.set_param(kind, name, value);
        }
    }

    fn toggle_selected(&mut self) {
        let kind = self.rack.kind();
        let values = self.rack.values(kind);
        let result = match self.console.lock() {
            Ok(mut console) if console.is_active(kind) => {
                console.disable(kind);
                Ok(())
            }
            Ok(mut console) => console.enable_with(kind, &values).map(|_| ()),
            Err(_) => Ok(()),
        };
        if let Err(err) = result {
            self.notify(err);
        }
    }

    fn play_rhythm(&mut self, key: char) {
        let number = if key == '1' { 1 } else { 2 };
        let Some(pattern) = StepPattern::preset(number) else {
            return;
        };
        if let Ok(mut console) = self.console.lock() {
            console.play_rhythm(&pattern, self.bpm);
        }
    }

    fn toggle_recording(&mut self) {
        let Some(recorder) = self.recorder.as_mut() else {
            self.notify("recording is not supported on this system");
            return;
        };
        if recorder.is_recording() {
            self.finish_recording();
        } else {
            recorder.start();
        }
    }

    fn finish_recording(&mut self) {
        let Some(recorder) = self.recorder.as_mut() else {
            return;
        };
        match recorder.stop() {
            Ok(Some(path)) => self.notice = Some(format!("saved {}", path.display())),
            Ok(None) => {}
            Err(err) => self.notify(err),
        }
    }

    fn cycle_impulse(&mut self) {
        self.impulse = (self.impulse + 1) % ImpulsePreset::ALL.len();
        let source = ImpulseSource::Preset(ImpulsePreset::ALL[self.impulse]);
        let result = match self.console.lock() {
            Ok(mut console) => console.set_impulse(&source),
            Err(_) => Ok(()),
        };
        match result {
            Ok(()) => self.notice = Some(format!("reverb impulse: {}", source)),
            Err(err) => self.notify(err),
        }
    }

    fn cycle_fft_size(&mut self) {
        let Ok(mut console) = self.console.lock() else {
            return;
        };
        let current = console.analyser().fft_size();
        let next = FFT_SIZES
            .iter()
            .copied()
            .find(|size| *size > current)
            .unwrap_or(FFT_SIZES[0]);
        let size = console.set_fft_size(next);
        drop(console);
        self.notice = Some(format!("fft size: {}", size));
    }

    fn nudge_smoothing(&mut self, delta: f32) {
        let Ok(mut console) = self.console.lock() else {
            return;
        };
        let current = console.analyser().smoothing();
        // Round to the slider's 0.1 grid
        let smoothing = console.set_smoothing(((current + delta) * 10.0).round() / 10.0);
        drop(console);
        self.notice = Some(format!("smoothing: {:.1}", smoothing));
    }

    fn follow_pointer(&mut self, column: u16) {
        if self.last_pan.elapsed() < PAN_THROTTLE {
            return;
        }
        self.last_pan = Instant::now();
        let width = crossterm::terminal::size().map(|(w, _)| w).unwrap_or(80).max(2);
        let x = column as f32 / (width - 1) as f32;
        if let Ok(mut console) = self.console.lock() {
            console.pan_follow(x);
        }
    }

    fn recording_seconds(&self) -> Option<f64> {
        self.recorder
            .as_ref()
            .filter(|r| r.is_recording())
            .map(|r| r.recorded_seconds())
    }

    /// Render the UI
    fn render(&self, frame: &mut Frame) {
        let area = frame.area();

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),  // Transport bar
                Constraint::Min(13),    // Rack and scope
                Constraint::Length(1),  // Notice line
                Constraint::Length(1),  // Help bar
            ])
            .split(area);

        let info = TransportInfo {
            source_name: self.source_name.as_deref(),
            bpm: self.bpm,
            recording: self.recording_seconds(),
        };
        render_transport(frame, chunks[0], &self.snapshot, &info);

        let middle = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
            .split(chunks[1]);
        render_rack(frame, middle[0], &self.rack, &self.snapshot);
        match &self.scope.data {
            ScopeData::Waveform(samples) => render_waveform(frame, middle[1], samples),
            ScopeData::Spectrum(bins) => {
                render_spectrum(frame, middle[1], bins, self.snapshot.sample_rate)
            }
            ScopeData::Blank => render_spectrum(frame, middle[1], &[], self.snapshot.sample_rate),
        }

        if let Some(notice) = &self.notice {
            let line = Paragraph::new(format!(" {}", notice)).style(Style::default().fg(Color::Yellow));
            frame.render_widget(line, chunks[2]);
        }

        let help = Paragraph::new(
            " [Q] Quit  [Space] Play/Pause  [S] Stop  [L] Loop  [↑↓] Effect  [Enter] On/Off  [←→] Param  [+/-] Adjust  [1/2] Rhythm  [ [ ] ] BPM  [R] Rec  [V] Scope  [F] FFT  [,/.] Smooth  [I] Impulse",
        )
        .style(Style::default().fg(Color::DarkGray));
        frame.render_widget(help, chunks[3]);
    }
}
