//! Mixer side of the engine: levels, channels, and the tick-driven registry
//!
//! One `Channel` per stem of the current track, volumes in 0..=100, and a
//! registry that runs the per-tick live/decay state machine. Playback itself
//! lives behind the [`StemPlayer`] seam; loudness flows back from the audio
//! thread through a pair of atomics per channel.

pub mod channel;
pub mod levels;
pub mod registry;

pub use channel::{Channel, PlayerBackend, StemPlayer};
pub use levels::{
    analyze, LevelCell, LevelWindow, SampleBlock, ANALYSIS_WINDOW_FRAMES, MIN_BLOCK_FRAMES,
};
pub use registry::{volume_for_height, ChannelRegistry};
