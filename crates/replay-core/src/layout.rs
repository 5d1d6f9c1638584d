//! Screen-agnostic placement of pans. Units match the reference canvas the renderer scales from.

pub const PAN_WIDTH: f32 = 80.0;
pub const PAN_SPACING: f32 = 10.0;
pub const SLOT_STRIDE: f32 = PAN_WIDTH + PAN_SPACING;
pub const QUEUE_ORIGIN_X: f32 = 10.0;

pub const QUEUE_ROW: f32 = 150.0;
pub const FUNNEL_ROW: f32 = 250.0;
pub const HOLDING_ROW: f32 = 300.0;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

impl Position {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn with_y(self, y: f32) -> Self {
        Self { y, ..self }
    }
}

pub fn queue_slot(index: usize) -> Position {
    Position::new(QUEUE_ORIGIN_X + index as f32 * SLOT_STRIDE, QUEUE_ROW)
}

pub fn ease_in_out_cubic(t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    if t < 0.5 {
        4.0 * t * t * t
    } else {
        1.0 - (-2.0 * t + 2.0).powi(3) / 2.0
    }
}

pub fn interpolate(start: f32, end: f32, t: f32) -> f32 {
    start + (end - start) * ease_in_out_cubic(t)
}
