//! Audio device setup and the shared console.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use color_eyre::eyre::{eyre, Result as EyreResult, WrapErr};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

use saavy_fx::{
    config::Config,
    context::{Platform, PlatformError},
    graph::StereoFrame,
    io::Recorder,
    Console, MAX_BLOCK_SIZE,
};

use super::ui::UiApp;

/// Suspends and resumes the device stream.
struct StreamPlatform<'a> {
    stream: &'a cpal::Stream,
}

impl Platform for StreamPlatform<'_> {
    fn suspend(&mut self) -> Result<(), PlatformError> {
        self.stream.pause().map_err(|e| PlatformError(e.to_string()))
    }

    fn resume(&mut self) -> Result<(), PlatformError> {
        self.stream.play().map_err(|e| PlatformError(e.to_string()))
    }
}

pub fn run(config: Config, file: Option<PathBuf>) -> EyreResult<()> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| eyre!("no default output device available"))?;
    let stream_config = device
        .default_output_config()
        .wrap_err("failed to fetch default output config")?;

    let sample_rate = stream_config.sample_rate().0;
    let channels = stream_config.channels() as usize;
    let recorder_dir = config.recorder_directory();

    let mut console = Console::new(config, sample_rate as f32);
    let source_name = match &file {
        Some(path) => {
            console
                .load_file(path)
                .wrap_err_with(|| format!("failed to load {}", path.display()))?;
            Some(path.display().to_string())
        }
        None => None,
    };

    let mut notices = Vec::new();
    let recorder = match console.output_stream() {
        Ok(stream) => Some(Recorder::new(stream, recorder_dir, sample_rate)),
        Err(err) => {
            notices.push(err.to_string());
            None
        }
    };

    let console = Arc::new(Mutex::new(console));
    let shared = Arc::clone(&console);
    let mut render_buf = vec![StereoFrame::SILENT; MAX_BLOCK_SIZE];

    let stream = device
        .build_output_stream(
            &stream_config.into(),
            move |data: &mut [f32], _| {
                let Ok(mut console) = shared.lock() else {
                    data.fill(0.0);
                    return;
                };
                let total_frames = data.len() / channels;
                let mut frames_written = 0;
                while frames_written < total_frames {
                    let frames_to_render = (total_frames - frames_written).min(MAX_BLOCK_SIZE);
                    let block = &mut render_buf[..frames_to_render];
                    console.render(block);

                    let out_off = frames_written * channels;
                    for (i, frame) in block.iter().enumerate() {
                        for ch in 0..channels {
                            data[out_off + i * channels + ch] = match ch {
                                0 => frame.left,
                                1 => frame.right,
                                _ => frame.to_mono(),
                            };
                        }
                    }
                    frames_written += frames_to_render;
                }
            },
            |err| log::error!("stream error: {}", err),
            None,
        )
        .wrap_err("failed to build output stream")?;
    stream.play().wrap_err("failed to start output stream")?;

    let mut platform = StreamPlatform { stream: &stream };
    let mut app = UiApp::new(console, recorder, source_name, notices);

    let mut terminal = ratatui::init();
    let result = app.run(&mut terminal, &mut platform);
    ratatui::restore();
    result
}
