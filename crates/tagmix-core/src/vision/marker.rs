//! Detected markers, ID remapping, and the camera-to-display projection

use serde::{Deserialize, Serialize};

use crate::types::Vec2;

use super::frame::GrayFrame;

/// Marker ID that requests the background video instead of driving a channel
///
/// This ID is never mapped to a channel, even when the current track has
/// eleven or more stems.
pub const BACKGROUND_MARKER_ID: u32 = 10;

/// Physical-to-logical marker ID aliases
///
/// Some printed marker sheets carry IDs outside the channel range; these
/// pairs fold them back onto the channel they should drive. Applied before
/// any other interpretation of the ID.
pub const ID_REMAPS: &[(u32, u32)] = &[(20, 4)];

/// Apply [`ID_REMAPS`] to a raw detector ID
#[inline]
pub fn remap_id(id: u32) -> u32 {
    for &(from, to) in ID_REMAPS {
        if id == from {
            return to;
        }
    }
    id
}

/// One fiducial marker found in a frame
///
/// `center` is in camera pixel coordinates; the projection to display space
/// happens later, once per tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectedMarker {
    /// Raw ID as reported by the detector (remapping not yet applied)
    pub id: u32,
    /// Marker center in camera space
    pub center: Vec2,
}

impl DetectedMarker {
    pub fn new(id: u32, center: Vec2) -> Self {
        Self { id, center }
    }
}

/// Affine map from camera space to display space
///
/// A uniform scale followed by a translation. The defaults were calibrated
/// by hand for the reference camera rig and can be nudged live from the
/// keyboard while a session runs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Projection {
    /// Uniform scale applied to both axes
    pub scale: f32,
    /// Horizontal translation in display pixels
    pub offset_x: f32,
    /// Vertical translation in display pixels
    pub offset_y: f32,
}

impl Default for Projection {
    fn default() -> Self {
        Self {
            scale: 2.14,
            offset_x: -15.0,
            offset_y: -94.0,
        }
    }
}

impl Projection {
    /// Map a camera-space point into display space
    #[inline]
    pub fn project(&self, point: Vec2) -> Vec2 {
        Vec2::new(
            point.x * self.scale + self.offset_x,
            point.y * self.scale + self.offset_y,
        )
    }

    /// Adjust the scale by `delta`, keeping offsets untouched
    pub fn nudge_scale(&mut self, delta: f32) {
        self.scale += delta;
    }

    /// Adjust the horizontal offset by `delta` display pixels
    pub fn nudge_offset_x(&mut self, delta: f32) {
        self.offset_x += delta;
    }

    /// Adjust the vertical offset by `delta` display pixels
    pub fn nudge_offset_y(&mut self, delta: f32) {
        self.offset_y += delta;
    }
}

/// Fiducial marker detector
///
/// Implementations take the raw camera frame, binarize it with their
/// configured threshold (see [`GrayFrame::binarize`]), and report every
/// marker they can identify, in detection order. Detection failures are
/// expressed as an empty result, never as an error: a frame with no
/// readable markers is a normal frame.
pub trait MarkerDetector: Send {
    /// Detect all markers in `frame`
    fn detect(&mut self, frame: &GrayFrame) -> Vec<DetectedMarker>;
}
