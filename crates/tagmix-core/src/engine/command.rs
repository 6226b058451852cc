//! Control commands from input handling to the session loop

/// Projection scale change per calibration keypress
pub const SCALE_STEP: f32 = 0.01;

/// Projection offset change per calibration keypress, in display pixels
pub const OFFSET_STEP: f32 = 1.0;

/// Commands the input thread sends to the session loop
///
/// Travel over a bounded ring buffer and are drained between ticks, so a
/// command never interleaves with a running tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ControlCommand {
    /// Stop the current stems and load the next track folder
    NextTrack,
    /// Stop the current stems and load the previous track folder
    PrevTrack,
    /// Adjust the projection scale by the payload
    NudgeScale(f32),
    /// Shift the projection horizontally by the payload, in display pixels
    NudgeOffsetX(f32),
    /// Shift the projection vertically by the payload, in display pixels
    NudgeOffsetY(f32),
    /// End the session
    Quit,
}
