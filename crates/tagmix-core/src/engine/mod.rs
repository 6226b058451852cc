//! Session engine: the tick, control commands, and track lifecycle
//!
//! One `MixEngine` per session, owned by the tick loop thread. Frames come
//! in (already reduced to detections), a frame plan goes out, and control
//! commands are applied between ticks so every tick runs against settled
//! state.

pub mod command;
pub mod engine;

pub use command::{ControlCommand, OFFSET_STEP, SCALE_STEP};
pub use engine::MixEngine;
