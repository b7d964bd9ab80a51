//! Frame and face region types.

use std::time::Instant;

/// A captured camera frame. Pixel layout is up to the image source; the
/// pipeline only hands it back to the locator and generator.
#[derive(Debug, Clone)]
pub struct Frame {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub sequence: u32,
    pub captured_at: Instant,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, sequence: u32) -> Self {
        Self {
            data,
            width,
            height,
            sequence,
            captured_at: Instant::now(),
        }
    }
}

/// Axis-aligned face bounds in frame pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceRegion {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub confidence: f32,
}

impl FaceRegion {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
            confidence: 1.0,
        }
    }

    /// True when both sides are at least `min_side` pixels.
    pub fn is_at_least(&self, min_side: f32) -> bool {
        self.width >= min_side && self.height >= min_side
    }
}
