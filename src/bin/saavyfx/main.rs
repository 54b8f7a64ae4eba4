//! saavyfx - terminal effects console
//!
//! Run with: cargo run --bin saavyfx -- [FILE.wav]

mod app;
mod ui;

use std::fs::File;
use std::path::PathBuf;

use clap::Parser;
use saavy_fx::config::{self, Config};

#[derive(Parser, Debug)]
#[command(name = "saavyfx", about = "Route audio through a live effect chain")]
struct Args {
    /// WAV file to load as the source
    file: Option<PathBuf>,

    /// Config file to use instead of the one in the user config directory
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long)]
    verbose: bool,
}

fn init_logging(verbose: bool) {
    use simplelog::{LevelFilter, WriteLogger};

    let log_level = if verbose { LevelFilter::Debug } else { LevelFilter::Warn };
    let log_dir = config::config_dir().unwrap_or_else(|| PathBuf::from("."));
    let _ = std::fs::create_dir_all(&log_dir);

    // The terminal belongs to the UI, so a log that cannot be opened is skipped
    let Ok(log_file) = File::create(log_dir.join("saavyfx.log")) else {
        return;
    };
    if WriteLogger::init(log_level, simplelog::Config::default(), log_file).is_ok() {
        log::info!("saavyfx starting (log level: {:?})", log_level);
    }
}

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    let args = Args::parse();
    init_logging(args.verbose);

    let config = match &args.config {
        Some(path) => Config::load_from(Some(path.as_path())),
        None => Config::load(),
    };
    app::run(config, args.file)
}
