//! Camera-side pipeline: frames, marker detection, and marker-to-channel mapping
//!
//! The vision pipeline is deliberately thin. Frame acquisition and the actual
//! fiducial detector live behind traits so the engine can run against a real
//! camera, a recorded session, or a scripted detector in tests. What stays in
//! core is the pure part: grayscale frames, the projection from camera space
//! to display space, and the per-tick mapping of detections onto channel IDs.

pub mod frame;
pub mod mapper;
pub mod marker;

pub use frame::{FrameSource, GrayFrame};
pub use mapper::{map_detections, LiveSet};
pub use marker::{
    remap_id, DetectedMarker, MarkerDetector, Projection, BACKGROUND_MARKER_ID, ID_REMAPS,
};
