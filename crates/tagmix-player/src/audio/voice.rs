//! Voices: per-stem playback state owned by the audio callback
//!
//! One `Voice` per channel of the current track. The session thread never
//! touches a voice after handing it over; it flips flags in the shared
//! [`VoiceControls`] instead, and the callback reacts on its next block.
//! Spent voices travel back over the reclaim queue so their sample memory
//! is freed off the audio thread.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use tagmix_core::mixer::{LevelCell, LevelWindow};
use tagmix_core::types::{Sample, StereoLevel, VOLUME_MAX};

/// Upper bound on simultaneously installed voices
///
/// The voice list is preallocated to this size; anything past it is bounced
/// straight back to the reclaim queue.
pub const MAX_VOICES: usize = 32;

/// Control flags shared between a player handle and its voice
///
/// All operations use `Ordering::Relaxed` since the callback only needs to
/// eventually observe a flip, not synchronize other memory with it.
pub struct VoiceControls {
    /// Volume in `0.0..=VOLUME_MAX`, stored as f32 bits
    volume: AtomicU32,
    playing: AtomicBool,
    stopped: AtomicBool,
}

impl VoiceControls {
    /// New controls: silent, paused, not stopped
    pub fn new() -> Self {
        Self {
            volume: AtomicU32::new(0.0f32.to_bits()),
            playing: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
        }
    }

    pub fn set_volume(&self, volume: f32) {
        self.volume.store(volume.to_bits(), Ordering::Relaxed);
    }

    #[inline]
    pub fn volume(&self) -> f32 {
        f32::from_bits(self.volume.load(Ordering::Relaxed))
    }

    pub fn set_playing(&self, playing: bool) {
        self.playing.store(playing, Ordering::Relaxed);
    }

    #[inline]
    pub fn is_playing(&self) -> bool {
        self.playing.load(Ordering::Relaxed)
    }

    /// One-way stop request; the voice is reclaimed after the callback sees it
    pub fn request_stop(&self) {
        self.stopped.store(true, Ordering::Relaxed);
    }

    #[inline]
    pub fn stop_requested(&self) -> bool {
        self.stopped.load(Ordering::Relaxed)
    }
}

impl Default for VoiceControls {
    fn default() -> Self {
        Self::new()
    }
}

/// One decoded stem playing on the audio thread
pub struct Voice {
    /// Interleaved stereo samples at the device rate
    samples: Vec<Sample>,
    /// Read position in samples, always frame-aligned
    position: usize,
    controls: Arc<VoiceControls>,
    levels: Arc<LevelCell>,
    window: LevelWindow,
    loop_playback: bool,
    exhausted: bool,
}

impl Voice {
    pub fn new(
        samples: Vec<Sample>,
        controls: Arc<VoiceControls>,
        levels: Arc<LevelCell>,
        loop_playback: bool,
    ) -> Self {
        Self {
            samples,
            position: 0,
            controls,
            levels,
            window: LevelWindow::new(),
            loop_playback,
            exhausted: false,
        }
    }

    /// Whether the voice should be handed back for reclamation
    #[inline]
    pub fn finished(&self) -> bool {
        self.controls.stop_requested()
    }

    /// Mix this voice into an interleaved output buffer
    ///
    /// Loudness is published from the raw samples, before the volume gain,
    /// so the visuals show what the stem contains even while it is faded
    /// down. A paused voice holds its position and adds nothing.
    pub fn render_into(&mut self, data: &mut [f32], out_channels: usize) {
        if !self.controls.is_playing() || self.samples.len() < 2 {
            return;
        }
        let gain = self.controls.volume() / VOLUME_MAX;

        for frame in data.chunks_exact_mut(out_channels) {
            if self.position + 1 >= self.samples.len() {
                if self.loop_playback {
                    self.position = 0;
                } else {
                    if !self.exhausted {
                        self.exhausted = true;
                        self.levels.store(StereoLevel::silence());
                    }
                    break;
                }
            }
            let left = self.samples[self.position];
            let right = self.samples[self.position + 1];
            self.position += 2;

            frame[0] += left * gain;
            if out_channels > 1 {
                frame[1] += right * gain;
            }

            if let Some(level) = self.window.push_frame(left, right) {
                self.levels.store(level);
            }
        }
    }
}

/// Owns every live voice inside the audio callback
///
/// The callback does three things per block: adopt voices from the incoming
/// queue, mix, and hand finished voices to the reclaim queue. No allocation
/// or deallocation happens here; both queues carry whole `Voice` values.
pub struct VoiceMixer {
    voices: Vec<Voice>,
    incoming: rtrb::Consumer<Voice>,
    reclaim: rtrb::Producer<Voice>,
    channels: usize,
}

impl VoiceMixer {
    pub fn new(
        incoming: rtrb::Consumer<Voice>,
        reclaim: rtrb::Producer<Voice>,
        channels: usize,
    ) -> Self {
        Self {
            voices: Vec::with_capacity(MAX_VOICES),
            incoming,
            reclaim,
            channels,
        }
    }

    /// Fill one output block
    pub fn render(&mut self, data: &mut [f32]) {
        while let Ok(voice) = self.incoming.pop() {
            if self.voices.len() < MAX_VOICES {
                self.voices.push(voice);
            } else if let Err(rtrb::PushError::Full(voice)) = self.reclaim.push(voice) {
                // no room anywhere, freeing here is the remaining option
                drop(voice);
            }
        }

        data.fill(0.0);

        let mut i = 0;
        while i < self.voices.len() {
            if self.voices[i].finished() {
                if self.reclaim.slots() > 0 {
                    let voice = self.voices.swap_remove(i);
                    let _ = self.reclaim.push(voice);
                    continue;
                }
                // reclaim full; retry on the next block
                i += 1;
                continue;
            }
            self.voices[i].render_into(data, self.channels);
            i += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tagmix_core::mixer::ANALYSIS_WINDOW_FRAMES;

    fn constant_stereo(frames: usize, left: f32, right: f32) -> Vec<f32> {
        let mut samples = Vec::with_capacity(frames * 2);
        for _ in 0..frames {
            samples.push(left);
            samples.push(right);
        }
        samples
    }

    fn playing_voice(
        samples: Vec<f32>,
        volume: f32,
        loop_playback: bool,
    ) -> (Voice, Arc<VoiceControls>, Arc<LevelCell>) {
        let controls = Arc::new(VoiceControls::new());
        let levels = Arc::new(LevelCell::new());
        controls.set_volume(volume);
        controls.set_playing(true);
        let voice = Voice::new(samples, Arc::clone(&controls), Arc::clone(&levels), loop_playback);
        (voice, controls, levels)
    }

    #[test]
    fn test_render_scales_by_volume_gain() {
        let (mut voice, _controls, _levels) =
            playing_voice(constant_stereo(64, 1.0, 0.5), 50.0, true);
        let mut data = vec![0.0f32; 32 * 2];
        voice.render_into(&mut data, 2);
        assert!((data[0] - 0.5).abs() < 1e-6);
        assert!((data[1] - 0.25).abs() < 1e-6);
    }

    #[test]
    fn test_render_accumulates_over_existing_content() {
        let (mut voice, _controls, _levels) =
            playing_voice(constant_stereo(16, 1.0, 1.0), 100.0, true);
        let mut data = vec![0.25f32; 8 * 2];
        voice.render_into(&mut data, 2);
        assert!((data[0] - 1.25).abs() < 1e-6);
    }

    #[test]
    fn test_levels_published_before_gain() {
        let (mut voice, _controls, levels) = playing_voice(
            constant_stereo(ANALYSIS_WINDOW_FRAMES * 2, 0.5, 0.5),
            0.0,
            true,
        );
        let mut data = vec![0.0f32; ANALYSIS_WINDOW_FRAMES * 2];
        voice.render_into(&mut data, 2);
        // output stays silent at volume zero
        assert!(data.iter().all(|&s| s == 0.0));
        // but the published level reflects the stem content
        assert!((levels.load().left - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_paused_voice_holds_position() {
        let (mut voice, controls, _levels) =
            playing_voice(constant_stereo(8, 1.0, 1.0), 100.0, false);
        controls.set_playing(false);
        let mut data = vec![0.0f32; 4 * 2];
        voice.render_into(&mut data, 2);
        assert!(data.iter().all(|&s| s == 0.0));
        assert_eq!(voice.position, 0);
    }

    #[test]
    fn test_looping_voice_wraps() {
        let (mut voice, _controls, _levels) =
            playing_voice(constant_stereo(4, 0.5, 0.5), 100.0, true);
        let mut data = vec![0.0f32; 16 * 2];
        voice.render_into(&mut data, 2);
        // every output frame is fed, wrapping through the 4-frame stem
        assert!(data.iter().all(|&s| (s - 0.5).abs() < 1e-6));
    }

    #[test]
    fn test_non_looping_voice_goes_silent_at_end() {
        let (mut voice, _controls, levels) =
            playing_voice(constant_stereo(4, 0.5, 0.5), 100.0, false);
        levels.store(StereoLevel::new(0.9, 0.9));
        let mut data = vec![0.0f32; 16 * 2];
        voice.render_into(&mut data, 2);
        assert!((data[0] - 0.5).abs() < 1e-6);
        // frames past the stem end stay silent
        assert_eq!(data[8], 0.0);
        // exhaustion resets the published level
        assert_eq!(levels.load().left, 0.0);
    }

    #[test]
    fn test_mixer_adopts_mixes_and_reclaims() {
        let (mut voice_tx, voice_rx) = rtrb::RingBuffer::new(4);
        let (reclaim_tx, mut reclaim_rx) = rtrb::RingBuffer::new(4);
        let mut mixer = VoiceMixer::new(voice_rx, reclaim_tx, 2);

        let (voice, controls, _levels) = playing_voice(constant_stereo(64, 1.0, 1.0), 100.0, true);
        voice_tx.push(voice).unwrap();

        let mut data = vec![0.0f32; 8 * 2];
        mixer.render(&mut data);
        assert!((data[0] - 1.0).abs() < 1e-6);

        controls.request_stop();
        mixer.render(&mut data);
        assert!(data.iter().all(|&s| s == 0.0));
        assert!(reclaim_rx.pop().is_ok());
    }
}
