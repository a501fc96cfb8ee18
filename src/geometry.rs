//! Integer box geometry and anchor-relative placement.
//!
//! One placement formula serves the whole system: it positions an image
//! inside a viewport and a viewport inside a screen, parameterized only by
//! content size, container box, anchor and pixel offset.

/// A point in screen space, top-left origin.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

/// Half-open bounding box `[min, max)`.
///
/// Intersections may produce non-positive extents; callers must treat those
/// as "nothing to draw" rather than iterate negative ranges.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Constraint {
    pub min: Position,
    pub max: Position,
}

impl Constraint {
    pub fn new(x: i32, y: i32, w: i32, h: i32) -> Self {
        Self {
            min: Position { x, y },
            max: Position { x: x + w, y: y + h },
        }
    }

    pub fn width(self) -> i32 {
        self.max.x - self.min.x
    }

    pub fn height(self) -> i32 {
        self.max.y - self.min.y
    }

    /// Whether the box contains no pixels.
    pub fn is_empty(self) -> bool {
        self.width() <= 0 || self.height() <= 0
    }

    /// Per-axis max of mins and min of maxes over `self` and `others`.
    pub fn intersect(self, others: &[Constraint]) -> Constraint {
        let mut out = self;
        for box_ in others {
            out.min.x = out.min.x.max(box_.min.x);
            out.min.y = out.min.y.max(box_.min.y);
            out.max.x = out.max.x.min(box_.max.x);
            out.max.y = out.max.y.min(box_.max.y);
        }
        out
    }
}

/// Place content of `(content_w, content_h)` inside `container`.
///
/// `(ax, ay)` picks the matching point in the range 0..=1: at (0, 0) the
/// content's top-left corner sits in the container's top-left corner, at
/// (1, 1) the bottom-right corners coincide. `(ox, oy)` fine-tunes the
/// result in pixels.
pub fn place(
    content_w: i32,
    content_h: i32,
    container: Constraint,
    (ax, ay): (f32, f32),
    (ox, oy): (i32, i32),
) -> Position {
    let x = (container.width() as f32 * ax - content_w as f32 * ax) as i32;
    let y = (container.height() as f32 * ay - content_h as f32 * ay) as i32;

    Position {
        x: container.min.x + x + ox,
        y: container.min.y + y + oy,
    }
}

/// A sub-region of the display surface used as the placement canvas instead
/// of the full surface.
///
/// `size` of `None` fills the containing canvas.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Viewport {
    pub size: Option<(i32, i32)>,
    pub anchor: (f32, f32),
    pub offset: (i32, i32),
}

impl Viewport {
    /// Resolve against a containing canvas into a concrete box.
    pub fn constraint(self, canvas: Constraint) -> Constraint {
        let (w, h) = self.size.unwrap_or((canvas.width(), canvas.height()));
        let min = place(w, h, canvas, self.anchor, self.offset);

        Constraint {
            min,
            max: Position { x: min.x + w, y: min.y + h },
        }
    }
}
