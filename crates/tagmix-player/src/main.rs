//! Tagmix Player - fiducial markers on a table mix the stems of a track
//!
//! This is the main entry point. It:
//! 1. Loads the YAML config and scans the track library
//! 2. Starts the CPAL audio system (one mixed stereo output)
//! 3. Spawns the keyboard input thread
//! 4. Runs the tick loop until quit
//!
//! Camera and projector rigs plug into the frame-source, detector, and
//! render-sink seams; without a rig, markers are placed from the keyboard
//! and the frame plan is logged instead of projected.
//!
//! ## Command line flags
//!
//! - `--config <path>`: use a config file other than the default

mod audio;
mod decode;
mod input;
mod run;
mod scene;

use std::path::PathBuf;

use anyhow::{Context, Result};
use tagmix_core::config;
use tagmix_core::engine::MixEngine;
use tagmix_core::library::TrackLibrary;

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return Ok(());
    }

    // Initialize logger - set RUST_LOG=debug for verbose output
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    log::info!("tagmix-player starting up");

    let config_path = parse_config_arg(&args).unwrap_or_else(config::default_config_path);
    let config = config::load_config(&config_path);

    let library = TrackLibrary::scan(&config.library_root).with_context(|| {
        format!(
            "no track library at {:?}; create it or point library_root somewhere else",
            config.library_root
        )
    })?;

    let audio = audio::start_audio_system(&config.audio).context("starting audio")?;
    log::info!(
        "audio running: {} channels at {} Hz",
        audio.channels,
        audio.sample_rate
    );

    let engine = MixEngine::new(&config, library, Box::new(audio.backend));

    let (command_tx, command_rx) = rtrb::RingBuffer::new(input::COMMAND_QUEUE_CAPACITY);
    let board = scene::MarkerBoard::new();
    let _input_thread = input::spawn_input_thread(command_tx, board.clone())?;

    print_banner(&config);

    let frames = Box::new(scene::StaticFrameSource::new(
        config.display.width,
        config.display.height,
    ));
    let detector = Box::new(scene::BoardDetector::new(board));
    let sink = Box::new(scene::LogSink::new());

    run::run_session(
        engine,
        &config,
        frames,
        detector,
        sink,
        command_rx,
        audio.reaper,
    )?;

    // dropping the handle stops the stream
    drop(audio.handle);
    log::info!("tagmix-player shut down cleanly");
    Ok(())
}

fn parse_config_arg(args: &[String]) -> Option<PathBuf> {
    args.iter()
        .position(|a| a == "--config")
        .and_then(|i| args.get(i + 1))
        .map(PathBuf::from)
}

fn print_usage() {
    println!("tagmix-player [--config <path>]");
    println!();
    println!("Marker-driven channel mixer. Stems of the current track are mixed by");
    println!("fiducial markers: marker height sets channel volume, hiding a marker");
    println!("fades its channel out.");
}

fn print_banner(config: &tagmix_core::config::PlayerConfig) {
    println!("tagmix - marker-driven channel mixer");
    println!("display {}x{}", config.display.width, config.display.height);
    println!();
    println!("  m <id> <x> <y>   place or move marker <id> (10 = background video)");
    println!("  r <id>           remove marker <id>");
    println!("  c                remove all markers");
    println!("  n / p            next / previous track");
    println!("  + / -            projection scale");
    println!("  h / l / j / k    projection offset");
    println!("  q                quit");
    println!();
}
