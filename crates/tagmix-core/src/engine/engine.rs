//! The session engine
//!
//! Owns the registry, the projection, and the current track position, and
//! turns one detection list into one frame plan per tick. Playback resources
//! come from the app's [`PlayerBackend`]; the engine never touches devices
//! itself, which keeps every code path here testable without audio hardware.

use std::sync::Arc;

use crate::compositor::{compose_channel, DrawCommand, FramePlan, OVERLAY_POSITION, OVERLAY_SIZE};
use crate::config::PlayerConfig;
use crate::library::TrackLibrary;
use crate::mixer::channel::{Channel, PlayerBackend};
use crate::mixer::levels::LevelCell;
use crate::mixer::registry::ChannelRegistry;
use crate::vision::{map_detections, DetectedMarker, Projection};

use super::command::ControlCommand;

/// Drives one session: tick in, frame plan out
pub struct MixEngine {
    /// Display height in pixels; marker height maps onto this range
    display_h: f32,
    /// Live camera-to-display calibration
    projection: Projection,
    /// Overlay texture resolved against the library at startup
    overlay: Option<String>,
    registry: ChannelRegistry,
    library: TrackLibrary,
    backend: Box<dyn PlayerBackend>,
    /// Position in the library's track list, not the folder number
    current_track: usize,
}

impl MixEngine {
    /// Build the engine and load the first track
    ///
    /// Never fails: a library with no tracks, or stems that refuse to open,
    /// leave an engine with fewer (or zero) channels that still ticks.
    pub fn new(
        config: &PlayerConfig,
        library: TrackLibrary,
        backend: Box<dyn PlayerBackend>,
    ) -> Self {
        let overlay = match &config.overlay_texture {
            Some(name) => match library.texture(name) {
                Some(found) => Some(found.to_string()),
                None => {
                    log::warn!("overlay texture {:?} not in library, drawing none", name);
                    None
                }
            },
            None => None,
        };

        let mut engine = Self {
            display_h: config.display.height as f32,
            projection: config.projection,
            overlay,
            registry: ChannelRegistry::new(config.mixer.decay_step),
            library,
            backend,
            current_track: 0,
        };
        engine.reload_track();
        engine
    }

    /// Run one tick against this tick's detections
    ///
    /// Updates every channel volume (live snap or decay), then builds the
    /// frame plan: background video if requested, bar/ring/label clusters
    /// per visible marker in detection order, overlay last.
    pub fn tick(&mut self, detections: &[DetectedMarker]) -> FramePlan {
        let set = map_detections(detections, &self.projection, self.registry.len());

        self.registry.begin_tick();
        for &(id, position) in &set.channels {
            self.registry.mark_live(id, position, self.display_h);
        }
        self.registry.finish_tick();

        let mut plan = FramePlan::new();

        if set.background_requested {
            if let Some(index) = self.current_folder_index() {
                match self.library.background_video(index) {
                    Some(file_name) => plan.push(DrawCommand::BackgroundVideo {
                        file_name: file_name.to_string(),
                    }),
                    None => log::trace!("no background video for track_{index}"),
                }
            }
        }

        for &(id, position) in &set.channels {
            if let Some(channel) = self.registry.get(id) {
                compose_channel(
                    channel.name(),
                    channel.level().left,
                    position,
                    self.display_h,
                    &mut plan,
                );
            }
        }

        if let Some(file_name) = &self.overlay {
            plan.push(DrawCommand::Overlay {
                file_name: file_name.clone(),
                position: OVERLAY_POSITION,
                size: OVERLAY_SIZE,
            });
        }

        plan
    }

    /// Apply one control command between ticks
    pub fn handle_command(&mut self, command: ControlCommand) {
        match command {
            ControlCommand::NextTrack => {
                if self.current_track + 1 < self.library.track_count() {
                    self.current_track += 1;
                    self.reload_track();
                } else {
                    log::debug!("already at the last track");
                }
            }
            ControlCommand::PrevTrack => {
                if self.current_track > 0 {
                    self.current_track -= 1;
                    self.reload_track();
                } else {
                    log::debug!("already at the first track");
                }
            }
            ControlCommand::NudgeScale(delta) => {
                self.projection.nudge_scale(delta);
                log::debug!("projection {:?}", self.projection);
            }
            ControlCommand::NudgeOffsetX(delta) => {
                self.projection.nudge_offset_x(delta);
                log::debug!("projection {:?}", self.projection);
            }
            ControlCommand::NudgeOffsetY(delta) => {
                self.projection.nudge_offset_y(delta);
                log::debug!("projection {:?}", self.projection);
            }
            // the session loop exits on Quit before forwarding it
            ControlCommand::Quit => {}
        }
    }

    /// Stop every channel; the engine stays usable but silent
    pub fn shutdown(&mut self) {
        log::info!("stopping {} channels", self.registry.len());
        self.registry.clear();
    }

    #[inline]
    pub fn channel_count(&self) -> usize {
        self.registry.len()
    }

    #[inline]
    pub fn current_track(&self) -> usize {
        self.current_track
    }

    pub fn projection(&self) -> &Projection {
        &self.projection
    }

    /// Folder number of the current track, used to pair background videos
    fn current_folder_index(&self) -> Option<usize> {
        self.library.track(self.current_track).map(|t| t.index)
    }

    /// Tear down the current channels and build fresh ones for the current
    /// track
    ///
    /// Stems that fail to open are skipped with a warning; the remaining
    /// stems get the marker IDs in listing order. New stems start playing
    /// immediately at volume zero so raising a marker brings them in without
    /// a start glitch.
    fn reload_track(&mut self) {
        self.registry.clear();

        let Some(folder) = self.library.track(self.current_track) else {
            log::warn!("no track at position {}", self.current_track);
            return;
        };
        log::info!("loading track_{} ({} stems)", folder.index, folder.stems.len());

        let mut channels = Vec::with_capacity(folder.stems.len());
        for stem in &folder.stems {
            let levels = Arc::new(LevelCell::new());
            match self.backend.open(&stem.path, Arc::clone(&levels)) {
                Ok(player) => {
                    let id = channels.len();
                    let mut channel = Channel::new(id, stem.name.clone(), player, levels);
                    channel.apply_volume();
                    channel.play();
                    channels.push(channel);
                }
                Err(e) => {
                    log::warn!("skipping stem {:?}: {:#}", stem.path, e);
                }
            }
        }

        log::info!("track_{} ready with {} channels", folder.index, channels.len());
        self.registry.install(channels);
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::fs;
    use std::path::Path;
    use std::sync::{Arc, Mutex};

    use tempfile::TempDir;

    use super::*;
    use crate::compositor::Rect;
    use crate::config::{DisplayConfig, MixerConfig};
    use crate::mixer::channel::StemPlayer;
    use crate::types::{StereoLevel, Vec2};

    #[derive(Default)]
    struct BackendState {
        events: Vec<String>,
        cells: HashMap<String, Arc<LevelCell>>,
    }

    struct FakeBackend {
        state: Arc<Mutex<BackendState>>,
        fail_names: Vec<&'static str>,
    }

    impl PlayerBackend for FakeBackend {
        fn open(
            &mut self,
            path: &Path,
            levels: Arc<LevelCell>,
        ) -> anyhow::Result<Box<dyn StemPlayer>> {
            let name = path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("?")
                .to_string();
            if self.fail_names.contains(&name.as_str()) {
                anyhow::bail!("decode failed for {name}");
            }
            let mut state = self.state.lock().unwrap();
            state.events.push(format!("open {name}"));
            state.cells.insert(name.clone(), levels);
            Ok(Box::new(FakeStemPlayer {
                name,
                state: Arc::clone(&self.state),
            }))
        }
    }

    struct FakeStemPlayer {
        name: String,
        state: Arc<Mutex<BackendState>>,
    }

    impl StemPlayer for FakeStemPlayer {
        fn set_volume(&mut self, volume: f32) {
            self.state
                .lock()
                .unwrap()
                .events
                .push(format!("vol {} {}", self.name, volume));
        }

        fn play(&mut self) {
            self.state.lock().unwrap().events.push(format!("play {}", self.name));
        }

        fn pause(&mut self) {
            self.state.lock().unwrap().events.push(format!("pause {}", self.name));
        }

        fn stop(&mut self) {
            self.state.lock().unwrap().events.push(format!("stop {}", self.name));
        }
    }

    fn library_fixture() -> TempDir {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("sounds/track_0")).unwrap();
        for stem in ["bass.mp3", "drums.mp3", "vox.mp3"] {
            fs::write(root.join("sounds/track_0").join(stem), b"x").unwrap();
        }
        fs::create_dir_all(root.join("sounds/track_1")).unwrap();
        fs::write(root.join("sounds/track_1/kick.mp3"), b"x").unwrap();
        fs::create_dir_all(root.join("videos")).unwrap();
        fs::write(root.join("videos/video_0.mp4"), b"x").unwrap();
        fs::create_dir_all(root.join("textures")).unwrap();
        fs::write(root.join("textures/logo.png"), b"x").unwrap();
        dir
    }

    /// Identity projection so test coordinates read as display coordinates
    fn test_config() -> PlayerConfig {
        PlayerConfig {
            display: DisplayConfig {
                width: 1280,
                height: 720,
            },
            projection: Projection {
                scale: 1.0,
                offset_x: 0.0,
                offset_y: 0.0,
            },
            mixer: MixerConfig {
                tick_ms: 10,
                decay_step: 5.0,
            },
            ..PlayerConfig::default()
        }
    }

    fn engine_fixture(
        fail_names: Vec<&'static str>,
    ) -> (MixEngine, Arc<Mutex<BackendState>>, TempDir) {
        let dir = library_fixture();
        let library = TrackLibrary::scan(dir.path()).unwrap();
        let state = Arc::new(Mutex::new(BackendState::default()));
        let backend = Box::new(FakeBackend {
            state: Arc::clone(&state),
            fail_names,
        });
        let engine = MixEngine::new(&test_config(), library, backend);
        (engine, state, dir)
    }

    fn events(state: &Arc<Mutex<BackendState>>) -> Vec<String> {
        state.lock().unwrap().events.clone()
    }

    #[test]
    fn test_new_loads_first_track_playing_at_zero() {
        let (engine, state, _dir) = engine_fixture(Vec::new());
        assert_eq!(engine.channel_count(), 3);
        let events = events(&state);
        for stem in ["bass", "drums", "vox"] {
            assert!(events.contains(&format!("open {stem}")));
            assert!(events.contains(&format!("vol {stem} 0")));
            assert!(events.contains(&format!("play {stem}")));
        }
    }

    #[test]
    fn test_failed_stem_is_skipped_and_ids_compact() {
        let (mut engine, _state, _dir) = engine_fixture(vec!["drums"]);
        assert_eq!(engine.channel_count(), 2);
        // bass keeps ID 0, vox slides down to ID 1
        let plan = engine.tick(&[DetectedMarker::new(1, Vec2::new(400.0, 180.0))]);
        let label = plan.commands().iter().find_map(|c| match c {
            DrawCommand::Label { text, .. } => Some(text.clone()),
            _ => None,
        });
        assert_eq!(label.as_deref(), Some("vox"));
    }

    #[test]
    fn test_tick_snaps_live_and_decays_stale() {
        let (mut engine, state, _dir) = engine_fixture(Vec::new());
        engine.tick(&[DetectedMarker::new(0, Vec2::new(400.0, 180.0))]);
        assert!(events(&state).contains(&"vol bass 75".to_string()));
        engine.tick(&[]);
        assert!(events(&state).contains(&"vol bass 70".to_string()));
    }

    #[test]
    fn test_plan_uses_published_loudness() {
        let (mut engine, state, _dir) = engine_fixture(Vec::new());
        state.lock().unwrap().cells["bass"].store(StereoLevel::new(0.5, 0.0));
        let plan = engine.tick(&[DetectedMarker::new(0, Vec2::new(400.0, 180.0))]);
        // bar length 2 * 0.5 * (720 - 180) = 540
        match &plan.commands()[0] {
            DrawCommand::StrokeRect { rect, .. } => {
                assert_eq!(*rect, Rect::new(300.0, 180.0, 200.0, 540.0));
            }
            other => panic!("expected bar rect first, got {other:?}"),
        }
    }

    #[test]
    fn test_loudness_stays_per_channel() {
        let (mut engine, state, _dir) = engine_fixture(Vec::new());
        state.lock().unwrap().cells["bass"].store(StereoLevel::new(0.5, 0.5));
        let plan = engine.tick(&[
            DetectedMarker::new(0, Vec2::new(200.0, 180.0)),
            DetectedMarker::new(1, Vec2::new(600.0, 180.0)),
        ]);
        assert_eq!(state.lock().unwrap().cells["drums"].load(), StereoLevel::silence());
        // three rects per cluster; drums' outer bar stays flat while bass' grows
        let bars: Vec<_> = plan
            .commands()
            .iter()
            .filter_map(|c| match c {
                DrawCommand::StrokeRect { rect, .. } => Some(*rect),
                _ => None,
            })
            .collect();
        assert_eq!(bars[0], Rect::new(100.0, 180.0, 200.0, 540.0));
        assert_eq!(bars[3], Rect::new(500.0, 180.0, 200.0, 0.0));
    }

    #[test]
    fn test_background_marker_emits_video_directive_first() {
        let (mut engine, _state, _dir) = engine_fixture(Vec::new());
        let plan = engine.tick(&[
            DetectedMarker::new(0, Vec2::new(400.0, 180.0)),
            DetectedMarker::new(10, Vec2::new(52.0, 14.0)),
        ]);
        assert_eq!(
            plan.commands()[0],
            DrawCommand::BackgroundVideo {
                file_name: "video_0.mp4".to_string()
            }
        );
        // the background marker itself draws no bar cluster
        let labels = plan
            .commands()
            .iter()
            .filter(|c| matches!(c, DrawCommand::Label { .. }))
            .count();
        assert_eq!(labels, 1);
    }

    #[test]
    fn test_background_directive_skipped_without_clip() {
        let (mut engine, _state, _dir) = engine_fixture(Vec::new());
        engine.handle_command(ControlCommand::NextTrack);
        let plan = engine.tick(&[DetectedMarker::new(10, Vec2::new(0.0, 0.0))]);
        assert!(!plan
            .commands()
            .iter()
            .any(|c| matches!(c, DrawCommand::BackgroundVideo { .. })));
    }

    #[test]
    fn test_overlay_always_last() {
        let (mut engine, _state, _dir) = engine_fixture(Vec::new());
        let plan = engine.tick(&[DetectedMarker::new(0, Vec2::new(400.0, 180.0))]);
        match plan.commands().last() {
            Some(DrawCommand::Overlay { file_name, .. }) => assert_eq!(file_name, "logo.png"),
            other => panic!("expected overlay last, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_overlay_texture_draws_none() {
        let dir = library_fixture();
        let library = TrackLibrary::scan(dir.path()).unwrap();
        let state = Arc::new(Mutex::new(BackendState::default()));
        let backend = Box::new(FakeBackend {
            state,
            fail_names: Vec::new(),
        });
        let mut config = test_config();
        config.overlay_texture = Some("missing.png".to_string());
        let mut engine = MixEngine::new(&config, library, backend);
        let plan = engine.tick(&[]);
        assert!(plan.is_empty());
    }

    #[test]
    fn test_track_navigation_clamps_at_ends() {
        let (mut engine, state, _dir) = engine_fixture(Vec::new());
        engine.handle_command(ControlCommand::NextTrack);
        assert_eq!(engine.current_track(), 1);
        assert_eq!(engine.channel_count(), 1);
        let after_switch = events(&state);
        assert!(after_switch.contains(&"stop bass".to_string()));
        assert!(after_switch.contains(&"open kick".to_string()));

        engine.handle_command(ControlCommand::NextTrack);
        assert_eq!(engine.current_track(), 1);

        engine.handle_command(ControlCommand::PrevTrack);
        assert_eq!(engine.current_track(), 0);
        engine.handle_command(ControlCommand::PrevTrack);
        assert_eq!(engine.current_track(), 0);
    }

    #[test]
    fn test_calibration_nudges_move_projection() {
        let (mut engine, _state, _dir) = engine_fixture(Vec::new());
        engine.handle_command(ControlCommand::NudgeScale(0.01));
        engine.handle_command(ControlCommand::NudgeOffsetX(-1.0));
        engine.handle_command(ControlCommand::NudgeOffsetY(1.0));
        let proj = engine.projection();
        assert!((proj.scale - 1.01).abs() < 1e-6);
        assert_eq!(proj.offset_x, -1.0);
        assert_eq!(proj.offset_y, 1.0);
    }

    #[test]
    fn test_shutdown_stops_every_channel() {
        let (mut engine, state, _dir) = engine_fixture(Vec::new());
        engine.shutdown();
        assert_eq!(engine.channel_count(), 0);
        let events = events(&state);
        for stem in ["bass", "drums", "vox"] {
            assert!(events.contains(&format!("stop {stem}")));
        }
    }
}
