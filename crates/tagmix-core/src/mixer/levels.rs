//! Per-channel loudness analysis and lock-free level publication
//!
//! The audio thread computes a mean-absolute level per side from the blocks
//! it plays and publishes the result through [`LevelCell`]; the tick loop
//! reads the cells when it builds the frame plan. Analysis never touches the
//! samples on their way to the device, it only observes them.

use std::sync::atomic::{AtomicU32, Ordering};

use crate::types::{Sample, StereoLevel};

/// Blocks shorter than this are ignored by the analyzer
///
/// Tiny blocks produce jittery readings that make the bars flicker, so they
/// simply leave the previous level in place.
pub const MIN_BLOCK_FRAMES: usize = 512;

/// Frames accumulated before [`LevelWindow`] emits a level
pub const ANALYSIS_WINDOW_FRAMES: usize = 1024;

/// One block of interleaved stereo samples in whatever format the decoder
/// or device delivered
#[derive(Debug, Clone, Copy)]
pub enum SampleBlock<'a> {
    I8(&'a [i8]),
    I16(&'a [i16]),
    I32(&'a [i32]),
    F32(&'a [Sample]),
}

impl SampleBlock<'_> {
    /// Number of samples across all channels
    #[inline]
    pub fn len(&self) -> usize {
        match self {
            SampleBlock::I8(s) => s.len(),
            SampleBlock::I16(s) => s.len(),
            SampleBlock::I32(s) => s.len(),
            SampleBlock::F32(s) => s.len(),
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Mean absolute value per side, normalized to the full scale of `T`
fn level_pair<T: Copy>(samples: &[T], normalize: impl Fn(T) -> f32) -> StereoLevel {
    let frames = samples.len() / 2;
    let mut left = 0.0f32;
    let mut right = 0.0f32;
    for frame in samples.chunks_exact(2) {
        left += normalize(frame[0]).abs();
        right += normalize(frame[1]).abs();
    }
    StereoLevel::new(left / frames as f32, right / frames as f32)
}

/// Analyze one block of interleaved samples
///
/// Returns `None` for anything that is not stereo or is shorter than
/// [`MIN_BLOCK_FRAMES`]; the caller keeps its previous level in that case.
/// Levels are in 0.0..=1.0 regardless of the sample format.
pub fn analyze(block: SampleBlock<'_>, channels: u16) -> Option<StereoLevel> {
    if channels != 2 {
        return None;
    }
    let frames = block.len() / channels as usize;
    if frames < MIN_BLOCK_FRAMES {
        return None;
    }
    let level = match block {
        SampleBlock::I8(s) => level_pair(s, |v| v as f32 / i8::MAX as f32),
        SampleBlock::I16(s) => level_pair(s, |v| v as f32 / i16::MAX as f32),
        SampleBlock::I32(s) => level_pair(s, |v| v as f32 / i32::MAX as f32),
        SampleBlock::F32(s) => level_pair(s, |v| v),
    };
    Some(level)
}

/// Lock-free level slot shared between the audio thread and the tick loop
///
/// One writer (the channel's audio callback), any number of readers. The
/// f32 levels travel as their bit patterns in `AtomicU32`s; `Relaxed` is
/// enough since we only need visibility, not ordering against other memory.
#[derive(Debug)]
pub struct LevelCell {
    left: AtomicU32,
    right: AtomicU32,
}

impl LevelCell {
    /// New cell reading silence
    pub fn new() -> Self {
        Self {
            left: AtomicU32::new(0.0f32.to_bits()),
            right: AtomicU32::new(0.0f32.to_bits()),
        }
    }

    /// Publish a level (audio thread)
    #[inline]
    pub fn store(&self, level: StereoLevel) {
        self.left.store(level.left.to_bits(), Ordering::Relaxed);
        self.right.store(level.right.to_bits(), Ordering::Relaxed);
    }

    /// Read the last published level (any thread)
    #[inline]
    pub fn load(&self) -> StereoLevel {
        StereoLevel::new(
            f32::from_bits(self.left.load(Ordering::Relaxed)),
            f32::from_bits(self.right.load(Ordering::Relaxed)),
        )
    }
}

impl Default for LevelCell {
    fn default() -> Self {
        Self::new()
    }
}

/// Accumulates interleaved f32 stereo frames until a full analysis window
/// is available
///
/// Device callbacks often run with blocks well under [`MIN_BLOCK_FRAMES`];
/// the window stitches them back together so the analyzer still sees blocks
/// it accepts. The buffer is preallocated, pushes on the audio thread never
/// allocate.
#[derive(Debug)]
pub struct LevelWindow {
    samples: Vec<Sample>,
}

impl LevelWindow {
    pub fn new() -> Self {
        Self {
            // window plus one worst-case device block of headroom
            samples: Vec::with_capacity(ANALYSIS_WINDOW_FRAMES * 4),
        }
    }

    /// Append interleaved stereo samples, emitting a level once a full
    /// window has accumulated
    pub fn push(&mut self, interleaved: &[Sample]) -> Option<StereoLevel> {
        let room = self.samples.capacity() - self.samples.len();
        // keep whole frames so left/right never swap mid-window
        let take = interleaved.len().min(room) & !1;
        self.samples.extend_from_slice(&interleaved[..take]);
        self.drain()
    }

    /// Append one stereo frame; same contract as [`LevelWindow::push`]
    #[inline]
    pub fn push_frame(&mut self, left: Sample, right: Sample) -> Option<StereoLevel> {
        if self.samples.len() + 2 <= self.samples.capacity() {
            self.samples.push(left);
            self.samples.push(right);
        }
        self.drain()
    }

    fn drain(&mut self) -> Option<StereoLevel> {
        if self.samples.len() / 2 < ANALYSIS_WINDOW_FRAMES {
            return None;
        }
        let level = analyze(SampleBlock::F32(&self.samples), 2);
        self.samples.clear();
        level
    }
}

impl Default for LevelWindow {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stereo_f32(frames: usize, left: f32, right: f32) -> Vec<f32> {
        let mut out = Vec::with_capacity(frames * 2);
        for _ in 0..frames {
            out.push(left);
            out.push(right);
        }
        out
    }

    #[test]
    fn test_analyze_rejects_short_block() {
        let samples = stereo_f32(MIN_BLOCK_FRAMES - 1, 0.5, 0.5);
        assert!(analyze(SampleBlock::F32(&samples), 2).is_none());
    }

    #[test]
    fn test_analyze_rejects_non_stereo() {
        let samples = vec![0.5f32; MIN_BLOCK_FRAMES * 4];
        assert!(analyze(SampleBlock::F32(&samples), 1).is_none());
        assert!(analyze(SampleBlock::F32(&samples), 4).is_none());
    }

    #[test]
    fn test_analyze_mean_abs_per_side() {
        let samples = stereo_f32(MIN_BLOCK_FRAMES, 0.5, -0.25);
        let level = analyze(SampleBlock::F32(&samples), 2).unwrap();
        assert!((level.left - 0.5).abs() < 1e-6);
        assert!((level.right - 0.25).abs() < 1e-6);
    }

    #[test]
    fn test_analyze_normalizes_integer_formats() {
        let mut i16s = Vec::with_capacity(MIN_BLOCK_FRAMES * 2);
        for _ in 0..MIN_BLOCK_FRAMES {
            i16s.push(i16::MAX);
            i16s.push(i16::MIN + 1);
        }
        let level = analyze(SampleBlock::I16(&i16s), 2).unwrap();
        assert!((level.left - 1.0).abs() < 1e-4);
        assert!((level.right - 1.0).abs() < 1e-4);

        let i8s: Vec<i8> = vec![i8::MAX; MIN_BLOCK_FRAMES * 2];
        let level = analyze(SampleBlock::I8(&i8s), 2).unwrap();
        assert!((level.left - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_analyze_silence_is_zero() {
        let samples = stereo_f32(MIN_BLOCK_FRAMES, 0.0, 0.0);
        let level = analyze(SampleBlock::F32(&samples), 2).unwrap();
        assert_eq!(level.left, 0.0);
        assert_eq!(level.right, 0.0);
    }

    #[test]
    fn test_level_cell_round_trip() {
        let cell = LevelCell::new();
        assert_eq!(cell.load().left, 0.0);
        cell.store(StereoLevel::new(0.75, 0.125));
        let level = cell.load();
        assert_eq!(level.left, 0.75);
        assert_eq!(level.right, 0.125);
    }

    #[test]
    fn test_level_window_accumulates_small_blocks() {
        let mut window = LevelWindow::new();
        let block = stereo_f32(256, 0.5, 0.5);
        assert!(window.push(&block).is_none());
        assert!(window.push(&block).is_none());
        assert!(window.push(&block).is_none());
        let level = window.push(&block).expect("window full after 1024 frames");
        assert!((level.left - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_level_window_resets_after_emit() {
        let mut window = LevelWindow::new();
        let loud = stereo_f32(ANALYSIS_WINDOW_FRAMES, 1.0, 1.0);
        let quiet = stereo_f32(ANALYSIS_WINDOW_FRAMES, 0.0, 0.0);
        assert_eq!(window.push(&loud).unwrap().left, 1.0);
        assert_eq!(window.push(&quiet).unwrap().left, 0.0);
    }

    #[test]
    fn test_level_window_per_frame_pushes() {
        let mut window = LevelWindow::new();
        for _ in 0..ANALYSIS_WINDOW_FRAMES - 1 {
            assert!(window.push_frame(0.25, 0.75).is_none());
        }
        let level = window.push_frame(0.25, 0.75).expect("window full");
        assert!((level.left - 0.25).abs() < 1e-6);
        assert!((level.right - 0.75).abs() < 1e-6);
    }
}
