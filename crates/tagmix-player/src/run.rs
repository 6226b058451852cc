//! The session loop
//!
//! One loop drives everything: on every tick it drains pending commands,
//! grabs a frame, runs detection, advances the mix engine, and hands the
//! resulting frame plan to the render sink. The loop owns the engine for
//! its whole life, so ticks never overlap.

use anyhow::Result;
use rtrb::Consumer;
use tagmix_core::compositor::RenderSink;
use tagmix_core::config::PlayerConfig;
use tagmix_core::engine::{ControlCommand, MixEngine};
use tagmix_core::vision::{FrameSource, MarkerDetector};

use crate::audio::VoiceReaper;

/// Run the session until a quit command arrives
pub fn run_session(
    mut engine: MixEngine,
    config: &PlayerConfig,
    mut frames: Box<dyn FrameSource>,
    mut detector: Box<dyn MarkerDetector>,
    mut sink: Box<dyn RenderSink>,
    mut commands: Consumer<ControlCommand>,
    mut reaper: VoiceReaper,
) -> Result<()> {
    // a tick channel holds at most one pending tick, so a slow loop
    // skips missed ticks instead of bursting to catch up
    let ticker = crossbeam::channel::tick(config.mixer.tick_interval());

    log::info!(
        "session running, tick every {:?}",
        config.mixer.tick_interval()
    );

    'session: loop {
        ticker.recv()?;

        while let Ok(command) = commands.pop() {
            if command == ControlCommand::Quit {
                log::info!("Quit requested");
                break 'session;
            }
            engine.handle_command(command);
        }

        let frame = frames.next_frame();
        let detections = detector.detect(frame);
        let plan = engine.tick(&detections);
        sink.submit(&plan);

        reaper.collect();
    }

    engine.shutdown();
    reaper.collect();
    Ok(())
}
