//! Keyboard-driven scene: board, frame source, detector, log sink
//!
//! Stand-ins for the camera and projector rig. Markers live on a shared
//! [`MarkerBoard`] that the input thread writes and the detector reads,
//! the frame source hands out a black frame, and the render sink logs
//! the frame plan instead of projecting it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tagmix_core::compositor::{FramePlan, RenderSink};
use tagmix_core::vision::{DetectedMarker, FrameSource, GrayFrame, MarkerDetector};
use tagmix_core::Vec2;

/// Shared set of keyboard-placed markers
///
/// Cloning shares the same board.
#[derive(Clone)]
pub struct MarkerBoard {
    markers: Arc<Mutex<HashMap<u32, Vec2>>>,
}

impl MarkerBoard {
    pub fn new() -> Self {
        Self {
            markers: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Place a marker, or move it if the id is already on the board
    pub fn place(&self, id: u32, x: f32, y: f32) {
        self.markers.lock().unwrap().insert(id, Vec2::new(x, y));
        log::debug!("Marker {} at ({}, {})", id, x, y);
    }

    pub fn remove(&self, id: u32) {
        if self.markers.lock().unwrap().remove(&id).is_some() {
            log::debug!("Marker {} removed", id);
        }
    }

    pub fn clear(&self) {
        self.markers.lock().unwrap().clear();
        log::debug!("Board cleared");
    }

    /// Current markers sorted by id
    pub fn snapshot(&self) -> Vec<DetectedMarker> {
        let markers = self.markers.lock().unwrap();
        let mut out: Vec<DetectedMarker> = markers
            .iter()
            .map(|(&id, &center)| DetectedMarker::new(id, center))
            .collect();
        out.sort_by_key(|m| m.id);
        out
    }
}

impl Default for MarkerBoard {
    fn default() -> Self {
        Self::new()
    }
}

/// Frame source that returns the same black frame forever
pub struct StaticFrameSource {
    frame: GrayFrame,
}

impl StaticFrameSource {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            frame: GrayFrame::black(width, height),
        }
    }
}

impl FrameSource for StaticFrameSource {
    fn next_frame(&mut self) -> &GrayFrame {
        &self.frame
    }
}

/// Detector that reports the marker board instead of scanning the frame
pub struct BoardDetector {
    board: MarkerBoard,
}

impl BoardDetector {
    pub fn new(board: MarkerBoard) -> Self {
        Self { board }
    }
}

impl MarkerDetector for BoardDetector {
    fn detect(&mut self, _frame: &GrayFrame) -> Vec<DetectedMarker> {
        self.board.snapshot()
    }
}

/// Render sink that logs frame plans
///
/// Every plan goes to trace; a change in plan size is worth a debug line
/// so marker activity shows up without trace-level noise.
pub struct LogSink {
    last_len: usize,
}

impl LogSink {
    pub fn new() -> Self {
        Self { last_len: 0 }
    }
}

impl Default for LogSink {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderSink for LogSink {
    fn submit(&mut self, plan: &FramePlan) {
        if plan.len() != self.last_len {
            log::debug!("Frame plan: {} draw commands", plan.len());
            self.last_len = plan.len();
        }
        for command in plan.commands() {
            log::trace!("draw {:?}", command);
        }
    }
}
