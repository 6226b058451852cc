//! Frame plan builder for the projector output
//!
//! The compositor turns tick state into a list of draw commands: the loudness
//! bar, the aura rings, and the name label for every visible channel, plus
//! the background video and logo overlay. It emits geometry only; rasterizing
//! the plan is the render sink's job, so the tick loop never blocks on a GPU.
//!
//! The magic numbers here (ring radii, bar insets, label offsets) define the
//! projected look and are kept stable so existing marker sheets and camera
//! calibrations keep lining up.

use crate::types::Vec2;

/// Half width of the loudness bar in display pixels
pub const BAR_HALF_WIDTH: f32 = 100.0;
/// Stroke width of the bar rectangles
pub const BAR_STROKE: f32 = 5.0;
/// Inset between nested bar rectangles
pub const BAR_INSET: f32 = 5.0;
/// Radius of the innermost aura ring at zero loudness
pub const RING_BASE_RADIUS: f32 = 105.0;
/// Horizontal advance per label character
pub const LABEL_CHAR_ADVANCE: f32 = 10.0;
/// Height of the label baseline above the display bottom
pub const LABEL_BASELINE_RISE: f32 = 100.0;
/// Where the logo overlay sits
pub const OVERLAY_POSITION: Vec2 = Vec2 { x: 800.0, y: 700.0 };
/// Logo overlay edge length in display pixels
pub const OVERLAY_SIZE: f32 = 204.0;

/// RGB color of a draw command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const RED: Color = Color { r: 255, g: 0, b: 0 };
    pub const BLUE: Color = Color { r: 0, g: 0, b: 255 };
    pub const MAGENTA: Color = Color { r: 255, g: 0, b: 255 };
}

/// Axis-aligned rectangle in display pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self { x, y, w, h }
    }

    /// Shrink by `d` pixels on the left, right, and top edges
    ///
    /// The bottom edge stays put, so nested bar rectangles all sit on the
    /// display floor.
    pub fn inset_keep_bottom(&self, d: f32) -> Rect {
        Rect {
            x: self.x + d,
            y: self.y + d,
            w: self.w - 2.0 * d,
            h: self.h - d,
        }
    }
}

/// One drawing directive for the render sink
#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    /// Paint the current frame of the named background video, full screen,
    /// behind everything else
    BackgroundVideo { file_name: String },
    /// Stroke an unfilled rectangle
    StrokeRect {
        rect: Rect,
        stroke: f32,
        color: Color,
    },
    /// Stroke an unfilled circle
    Ring {
        center: Vec2,
        radius: f32,
        stroke: f32,
        color: Color,
    },
    /// Draw a channel name, anchored at the text's left baseline end
    Label {
        text: String,
        anchor: Vec2,
        color: Color,
    },
    /// Blit the named overlay texture centered on `position`
    Overlay {
        file_name: String,
        position: Vec2,
        size: f32,
    },
}

/// Everything to draw for one tick, in paint order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FramePlan {
    commands: Vec<DrawCommand>,
}

impl FramePlan {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn push(&mut self, command: DrawCommand) {
        self.commands.push(command);
    }

    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

/// Output surface for frame plans
///
/// Submission hands the sink a finished plan; the sink decides when and how
/// to rasterize it. Sinks must tolerate plans referencing assets they cannot
/// load and just skip those commands.
pub trait RenderSink: Send {
    fn submit(&mut self, plan: &FramePlan);
}

/// Bar length for a channel at `loudness` whose marker sits at height `y`
///
/// Louder channels and higher markers both grow the bar; a marker at the
/// display bottom yields an empty bar no matter how loud the stem is.
#[inline]
pub fn bar_length(loudness: f32, y: f32, display_h: f32) -> f32 {
    (2.0 * loudness * (display_h - y)).max(0.0)
}

/// Emit the bar, rings, and label for one visible channel
///
/// `position` is the marker center in display space and `loudness` the
/// channel's last published level in 0.0..=1.0. Commands are appended in
/// paint order.
pub fn compose_channel(
    name: &str,
    loudness: f32,
    position: Vec2,
    display_h: f32,
    plan: &mut FramePlan,
) {
    let len = bar_length(loudness, position.y, display_h);

    // nested bar rectangles rising from the display bottom
    let frame = Rect::new(
        position.x - BAR_HALF_WIDTH,
        display_h - len,
        2.0 * BAR_HALF_WIDTH,
        len,
    );
    let inner = frame.inset_keep_bottom(BAR_INSET);
    plan.push(DrawCommand::StrokeRect {
        rect: frame,
        stroke: BAR_STROKE,
        color: Color::RED,
    });
    plan.push(DrawCommand::StrokeRect {
        rect: inner,
        stroke: BAR_STROKE,
        color: Color::BLUE,
    });
    plan.push(DrawCommand::StrokeRect {
        rect: inner.inset_keep_bottom(BAR_INSET),
        stroke: BAR_STROKE,
        color: Color::BLUE,
    });

    // aura rings widen and thicken with the bar
    plan.push(DrawCommand::Ring {
        center: position,
        radius: RING_BASE_RADIUS + len / 400.0,
        stroke: len / 10.0,
        color: Color::RED,
    });
    plan.push(DrawCommand::Ring {
        center: position,
        radius: RING_BASE_RADIUS + 25.0 + len / 400.0,
        stroke: len / 8.0,
        color: Color::MAGENTA,
    });
    plan.push(DrawCommand::Ring {
        center: position,
        radius: RING_BASE_RADIUS + 50.0 + len / 500.0,
        stroke: len / 6.0,
        color: Color::BLUE,
    });

    plan.push(DrawCommand::Label {
        text: name.to_string(),
        anchor: Vec2::new(
            position.x - name.chars().count() as f32 * LABEL_CHAR_ADVANCE,
            display_h - LABEL_BASELINE_RISE,
        ),
        color: Color::RED,
    });
}
