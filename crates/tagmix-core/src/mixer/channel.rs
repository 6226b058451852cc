//! Channels and the playback seam
//!
//! A `Channel` binds one stem of the current track to a marker ID: the
//! mixer-side volume and live flag, the shared level cell its audio callback
//! writes into, and the player that actually makes sound. Core never talks
//! to an audio device directly; it drives a [`StemPlayer`] handed out by the
//! app's [`PlayerBackend`].

use std::path::Path;
use std::sync::Arc;

use crate::types::{StereoLevel, VOLUME_MAX};

use super::levels::LevelCell;

/// Playback control for one stem
///
/// Implementations are owned by the tick thread and must not block: volume
/// changes land in atomics read by the audio callback, transport changes
/// are flag flips. Every method is best-effort; a player whose device died
/// just goes silent.
pub trait StemPlayer: Send {
    /// Set playback volume in `0.0..=VOLUME_MAX`
    fn set_volume(&mut self, volume: f32);

    /// Start or resume playback
    fn play(&mut self);

    /// Pause, keeping the current position
    fn pause(&mut self);

    /// Stop playback and release the playback resources
    fn stop(&mut self);
}

/// Factory for stem players
///
/// The engine asks the backend for one player per stem on every track load.
/// `levels` is the cell the player's audio path publishes loudness into.
pub trait PlayerBackend: Send {
    /// Open `path` and return a player ready to start at volume zero
    fn open(&mut self, path: &Path, levels: Arc<LevelCell>) -> anyhow::Result<Box<dyn StemPlayer>>;
}

/// One stem of the current track, addressable by marker ID
pub struct Channel {
    /// Marker ID this channel answers to
    id: usize,
    /// Display name, the stem file name without extension
    name: String,
    /// Mixer-side volume in `0.0..=VOLUME_MAX`
    volume: f32,
    /// Whether the channel's marker was seen on the current tick
    live: bool,
    /// Loudness published by the player's audio path
    levels: Arc<LevelCell>,
    player: Box<dyn StemPlayer>,
}

impl Channel {
    /// Wrap a freshly opened player
    ///
    /// Channels start silent and not live; the first tick that sees their
    /// marker snaps the volume up.
    pub fn new(
        id: usize,
        name: String,
        player: Box<dyn StemPlayer>,
        levels: Arc<LevelCell>,
    ) -> Self {
        Self {
            id,
            name,
            volume: 0.0,
            live: false,
            levels,
            player,
        }
    }

    #[inline]
    pub fn id(&self) -> usize {
        self.id
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn volume(&self) -> f32 {
        self.volume
    }

    #[inline]
    pub fn is_live(&self) -> bool {
        self.live
    }

    /// Last loudness published by the audio path
    #[inline]
    pub fn level(&self) -> StereoLevel {
        self.levels.load()
    }

    pub(crate) fn set_live(&mut self, live: bool) {
        self.live = live;
    }

    pub(crate) fn set_volume_value(&mut self, volume: f32) {
        debug_assert!((0.0..=VOLUME_MAX).contains(&volume));
        self.volume = volume;
    }

    /// Push the mixer-side volume down to the player
    pub(crate) fn apply_volume(&mut self) {
        self.player.set_volume(self.volume);
    }

    /// Start playback
    pub fn play(&mut self) {
        self.player.play();
    }

    /// Stop playback and release the player's resources
    pub fn stop(&mut self) {
        self.player.stop();
    }
}

impl std::fmt::Debug for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Channel")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("volume", &self.volume)
            .field("live", &self.live)
            .finish()
    }
}
