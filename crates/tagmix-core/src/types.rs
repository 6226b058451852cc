//! Common types for Tagmix
//!
//! Fundamental value types shared by the vision and mixer halves of the
//! crate: screen-space points, stereo level pairs, and the volume scale.

/// Audio sample type (32-bit float end to end)
pub type Sample = f32;

/// Mixer volume scale ceiling. Volumes live in `[0, VOLUME_MAX]`, matching
/// the 0-100 range the playback side expects.
pub const VOLUME_MAX: f32 = 100.0;

/// Clamp a volume into the valid `[0, VOLUME_MAX]` range
#[inline]
pub fn clamp_volume(volume: f32) -> f32 {
    volume.clamp(0.0, VOLUME_MAX)
}

/// A 2-D point in screen coordinates
///
/// Used both for raw detector output and for projected display positions;
/// the projection in [`crate::vision::Projection`] maps one to the other.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    /// Create a new point
    #[inline]
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// A stereo loudness pair produced by the level analyzer
///
/// Both sides are normalized to `[0, 1]` regardless of the source sample
/// depth. Visual decisions collapse this to the left side only.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StereoLevel {
    pub left: f32,
    pub right: f32,
}

impl StereoLevel {
    /// Create a new level pair
    #[inline]
    pub fn new(left: f32, right: f32) -> Self {
        Self { left, right }
    }

    /// Silence on both sides
    #[inline]
    pub fn silence() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_volume_bounds() {
        assert_eq!(clamp_volume(-3.0), 0.0);
        assert_eq!(clamp_volume(0.0), 0.0);
        assert_eq!(clamp_volume(57.5), 57.5);
        assert_eq!(clamp_volume(100.0), 100.0);
        assert_eq!(clamp_volume(140.0), 100.0);
    }

    #[test]
    fn test_level_silence() {
        let level = StereoLevel::silence();
        assert_eq!(level.left, 0.0);
        assert_eq!(level.right, 0.0);
    }
}
