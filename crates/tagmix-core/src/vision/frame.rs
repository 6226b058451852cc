//! Grayscale frames and the frame source seam
//!
//! Detection works on single-channel 8-bit frames. Whatever the capture side
//! produces (YUV, RGB, a decoded video file) is collapsed to luma before it
//! reaches the detector, so core only ever deals with one pixel format.

/// Single-channel 8-bit image, row-major, no padding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrayFrame {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl GrayFrame {
    /// Create a frame from raw luma bytes
    ///
    /// `data.len()` must equal `width * height`.
    pub fn from_luma(width: u32, height: u32, data: Vec<u8>) -> Self {
        assert_eq!(
            data.len(),
            (width as usize) * (height as usize),
            "luma buffer does not match {}x{}",
            width,
            height
        );
        Self {
            width,
            height,
            data,
        }
    }

    /// All-black frame, used when a capture source has nothing to deliver yet
    pub fn black(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0; (width as usize) * (height as usize)],
        }
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Raw luma bytes, row-major
    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Binarize the frame for detection
    ///
    /// Pixels strictly above `threshold` become 255, everything else 0.
    pub fn binarize(&self, threshold: u8) -> GrayFrame {
        let data = self
            .data
            .iter()
            .map(|&p| if p > threshold { 255 } else { 0 })
            .collect();
        Self {
            width: self.width,
            height: self.height,
            data,
        }
    }
}

/// Source of camera frames
///
/// Implementations poll a capture device (or play back a recording) and hand
/// the most recent frame to the tick loop. A source that has no new frame
/// returns its previous one, or a black frame before the first capture; frame
/// delivery never fails from the engine's point of view. The borrow lets
/// sources reuse one capture buffer across ticks.
pub trait FrameSource: Send {
    /// Most recent frame available
    fn next_frame(&mut self) -> &GrayFrame;
}
