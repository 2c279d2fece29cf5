//! Floating-point RGBA colors
//!
//! All compositing happens in straight (non-premultiplied) alpha with each
//! channel in `0.0..=1.0`.

use serde::{Deserialize, Serialize};

/// Straight-alpha RGBA color, channels in 0..1
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    #[serde(default = "opaque")]
    pub a: f32,
}

fn opaque() -> f32 {
    1.0
}

impl Default for Color {
    fn default() -> Self {
        Self::WHITE
    }
}

impl Color {
    pub const WHITE: Color = Color::rgb(1.0, 1.0, 1.0);
    pub const BLACK: Color = Color::rgb(0.0, 0.0, 0.0);
    pub const TRANSPARENT: Color = Color::rgba(0.0, 0.0, 0.0, 0.0);

    /// Create an opaque color
    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    /// Create a color with alpha
    pub const fn rgba(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Opaque gray
    pub const fn gray(v: f32) -> Self {
        Self::rgb(v, v, v)
    }

    /// Convert from 8-bit channels
    pub fn from_rgba8(px: [u8; 4]) -> Self {
        Self {
            r: px[0] as f32 / 255.0,
            g: px[1] as f32 / 255.0,
            b: px[2] as f32 / 255.0,
            a: px[3] as f32 / 255.0,
        }
    }

    /// Convert to 8-bit channels (rounded, clamped)
    pub fn to_rgba8(self) -> [u8; 4] {
        let q = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        [q(self.r), q(self.g), q(self.b), q(self.a)]
    }

    /// Mean of the three color channels
    pub fn luminance_mean(self) -> f32 {
        (self.r + self.g + self.b) / 3.0
    }

    /// Same color with a different alpha
    pub fn with_alpha(mut self, a: f32) -> Self {
        self.a = a;
        self
    }
}
