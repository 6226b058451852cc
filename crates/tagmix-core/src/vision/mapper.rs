//! Per-tick mapping from raw detections to channel IDs
//!
//! Runs once per tick on that tick's detection list. The mapping is pure:
//! remap aliased IDs, pull out the background request, project the rest into
//! display space, and keep only IDs that address a channel of the current
//! track. Everything stateful (volumes, decay) lives in the registry.

use crate::types::Vec2;

use super::marker::{remap_id, DetectedMarker, Projection, BACKGROUND_MARKER_ID};

/// Channels seen on this tick, in detection order
///
/// The same channel may appear more than once when several physical markers
/// carry the same ID; consumers apply entries in order so the last one wins.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LiveSet {
    /// `(channel_id, display_position)` pairs for in-range markers
    pub channels: Vec<(usize, Vec2)>,
    /// True when the background marker was visible this tick
    pub background_requested: bool,
}

impl LiveSet {
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty() && !self.background_requested
    }
}

/// Map one tick's detections onto the channels of the current track
///
/// Markers whose (remapped) ID falls outside `[0, channel_count)` are
/// dropped; they neither create channels nor disturb existing ones. The
/// background marker sets a flag instead of addressing a channel.
pub fn map_detections(
    detections: &[DetectedMarker],
    projection: &Projection,
    channel_count: usize,
) -> LiveSet {
    let mut set = LiveSet::default();
    for marker in detections {
        let id = remap_id(marker.id);
        if id == BACKGROUND_MARKER_ID {
            set.background_requested = true;
            continue;
        }
        if (id as usize) < channel_count {
            set.channels.push((id as usize, projection.project(marker.center)));
        } else {
            log::trace!("marker {} has no channel (track has {})", id, channel_count);
        }
    }
    set
}
