//! Channel registry and the per-tick volume state machine
//!
//! The registry owns every channel of the current track and applies one rule
//! per tick: channels whose marker is visible get the volume their height
//! says, channels whose marker is gone fade by a fixed step. Volumes are
//! pushed to the players only at the end of the tick, so playback always
//! observes one consistent snapshot.

use crate::types::{clamp_volume, Vec2, VOLUME_MAX};

use super::channel::Channel;

/// Volume for a marker at display height `y`
///
/// Top of the display is full volume, bottom is silence. Positions outside
/// the display clamp to the valid range instead of wrapping.
#[inline]
pub fn volume_for_height(y: f32, display_h: f32) -> f32 {
    clamp_volume((display_h - y) * VOLUME_MAX / display_h)
}

/// All channels of the current track plus the decay rule
pub struct ChannelRegistry {
    channels: Vec<Channel>,
    /// Volume units removed per tick from channels whose marker is gone
    decay_step: f32,
}

impl ChannelRegistry {
    /// Empty registry with the given decay step per tick
    pub fn new(decay_step: f32) -> Self {
        Self {
            channels: Vec::new(),
            decay_step,
        }
    }

    /// Replace the channel set
    ///
    /// Any channels still installed are stopped first; the swap is
    /// all-or-nothing from the tick loop's point of view because the tick
    /// loop is the only caller.
    pub fn install(&mut self, channels: Vec<Channel>) {
        self.clear();
        self.channels = channels;
    }

    /// Stop and drop every channel
    pub fn clear(&mut self) {
        for channel in &mut self.channels {
            channel.stop();
        }
        self.channels.clear();
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    pub fn get(&self, id: usize) -> Option<&Channel> {
        self.channels.iter().find(|c| c.id() == id)
    }

    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    /// Start a tick: nothing has been seen yet
    pub fn begin_tick(&mut self) {
        for channel in &mut self.channels {
            channel.set_live(false);
        }
    }

    /// Record that a channel's marker is visible at `position` this tick
    ///
    /// Unknown IDs are ignored. Calling twice for the same channel keeps the
    /// later position, matching detection order.
    pub fn mark_live(&mut self, id: usize, position: Vec2, display_h: f32) {
        if let Some(channel) = self.channels.iter_mut().find(|c| c.id() == id) {
            channel.set_live(true);
            channel.set_volume_value(volume_for_height(position.y, display_h));
        }
    }

    /// Finish a tick: decay unseen channels, then push every volume to its
    /// player in ID order
    pub fn finish_tick(&mut self) {
        for channel in &mut self.channels {
            if !channel.is_live() {
                let faded = clamp_volume(channel.volume() - self.decay_step);
                channel.set_volume_value(faded);
            }
        }
        for channel in &mut self.channels {
            channel.apply_volume();
        }
    }
}

impl std::fmt::Debug for ChannelRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelRegistry")
            .field("channels", &self.channels.len())
            .field("decay_step", &self.decay_step)
            .finish()
    }
}
