//! Pixel buffers
//!
//! A [`Bitmap`] is a small floating-point RGBA buffer. Coordinates follow
//! texture space: `(0, 0)` is the bottom-left pixel and `y` grows upwards, so
//! offsets and eye positions in part defs read the same way the art is
//! authored. Conversions to and from top-down 8-bit rows flip vertically.

use crate::color::Color;

/// Floating-point RGBA pixel buffer with a bottom-left origin
#[derive(Debug, Clone, PartialEq)]
pub struct Bitmap {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Pixels, rows stored bottom-up
    pixels: Vec<Color>,
}

impl Bitmap {
    /// Create a fully transparent bitmap
    pub fn new(width: u32, height: u32) -> Self {
        Self::filled(width, height, Color::TRANSPARENT)
    }

    /// Create a bitmap filled with one color
    pub fn filled(width: u32, height: u32, color: Color) -> Self {
        Self {
            width,
            height,
            pixels: vec![color; (width * height) as usize],
        }
    }

    /// Build from 8-bit RGBA rows stored top-down (PNG order)
    ///
    /// Returns `None` when the buffer length does not match the dimensions.
    pub fn from_rgba8_top_down(width: u32, height: u32, data: &[u8]) -> Option<Self> {
        if data.len() != (width * height * 4) as usize {
            return None;
        }
        let mut bitmap = Self::new(width, height);
        for (i, px) in data.chunks_exact(4).enumerate() {
            let x = i as u32 % width;
            let row = i as u32 / width;
            bitmap.set_pixel(x, height - 1 - row, Color::from_rgba8([px[0], px[1], px[2], px[3]]));
        }
        Some(bitmap)
    }

    /// Export as 8-bit RGBA rows stored top-down (PNG order)
    pub fn to_rgba8_top_down(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.pixels.len() * 4);
        for row in (0..self.height).rev() {
            for x in 0..self.width {
                out.extend_from_slice(&self.pixel(x, row).to_rgba8());
            }
        }
        out
    }

    /// Dimensions as `(width, height)`
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn index(&self, x: u32, y: u32) -> usize {
        (y * self.width + x) as usize
    }

    /// Get pixel at position
    pub fn get_pixel(&self, x: u32, y: u32) -> Option<Color> {
        if x >= self.width || y >= self.height {
            return None;
        }
        Some(self.pixels[self.index(x, y)])
    }

    /// Get pixel at signed position, transparent outside the buffer
    pub fn sample(&self, x: i32, y: i32) -> Color {
        if x < 0 || y < 0 {
            return Color::TRANSPARENT;
        }
        self.get_pixel(x as u32, y as u32).unwrap_or(Color::TRANSPARENT)
    }

    /// Get pixel at position, panicking when out of bounds
    pub fn pixel(&self, x: u32, y: u32) -> Color {
        self.pixels[self.index(x, y)]
    }

    /// Set pixel at position; out-of-bounds writes are ignored
    pub fn set_pixel(&mut self, x: u32, y: u32, color: Color) {
        if x >= self.width || y >= self.height {
            return;
        }
        let idx = self.index(x, y);
        self.pixels[idx] = color;
    }

    /// Set pixel at a signed position; out-of-bounds writes are ignored
    pub fn put(&mut self, x: i32, y: i32, color: Color) {
        if x >= 0 && y >= 0 {
            self.set_pixel(x as u32, y as u32, color);
        }
    }

    /// Fill entire bitmap with a color
    pub fn fill(&mut self, color: Color) {
        self.pixels.fill(color);
    }

    /// Raw pixel slice (bottom-up rows)
    pub fn pixels(&self) -> &[Color] {
        &self.pixels
    }

    /// Mutable raw pixel slice (bottom-up rows)
    pub fn pixels_mut(&mut self) -> &mut [Color] {
        &mut self.pixels
    }

    /// Estimate memory usage in bytes
    pub fn memory_size(&self) -> usize {
        self.pixels.len() * std::mem::size_of::<Color>() + std::mem::size_of::<Self>()
    }

    /// Content hash over the 8-bit representation
    ///
    /// Two bitmaps that export to the same PNG hash identically.
    pub fn content_hash(&self) -> [u8; 32] {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&self.width.to_le_bytes());
        hasher.update(&self.height.to_le_bytes());
        hasher.update(&self.to_rgba8_top_down());
        *hasher.finalize().as_bytes()
    }

    /// Whether the pixel under normalized coordinates has any coverage
    ///
    /// `u` runs left to right and `v` bottom to top, both in `0..1`.
    pub fn is_opaque_at(&self, u: f32, v: f32) -> bool {
        let x = (u * self.width as f32) as i32;
        let y = (v * self.height as f32) as i32;
        self.sample(x, y).a > 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bitmap_pixels() {
        let mut bitmap = Bitmap::new(40, 48);
        bitmap.set_pixel(10, 20, Color::rgb(1.0, 0.0, 0.0));
        assert_eq!(bitmap.get_pixel(10, 20), Some(Color::rgb(1.0, 0.0, 0.0)));
        assert_eq!(bitmap.get_pixel(40, 0), None);
        assert_eq!(bitmap.sample(-1, 0), Color::TRANSPARENT);
    }

    #[test]
    fn test_top_down_flip() {
        // 1x2: top row red, bottom row blue
        let data = [255, 0, 0, 255, 0, 0, 255, 255];
        let bitmap = Bitmap::from_rgba8_top_down(1, 2, &data).unwrap();
        assert_eq!(bitmap.pixel(0, 1), Color::rgb(1.0, 0.0, 0.0));
        assert_eq!(bitmap.pixel(0, 0), Color::rgb(0.0, 0.0, 1.0));
        assert_eq!(bitmap.to_rgba8_top_down(), data.to_vec());
    }

    #[test]
    fn test_length_mismatch() {
        assert!(Bitmap::from_rgba8_top_down(2, 2, &[0; 12]).is_none());
    }

    #[test]
    fn test_content_hash_tracks_pixels() {
        let a = Bitmap::filled(4, 4, Color::gray(0.5));
        let mut b = a.clone();
        assert_eq!(a.content_hash(), b.content_hash());
        b.set_pixel(0, 0, Color::BLACK);
        assert_ne!(a.content_hash(), b.content_hash());
    }

    #[test]
    fn test_hit_testing() {
        let mut bitmap = Bitmap::new(10, 10);
        bitmap.set_pixel(0, 0, Color::WHITE);
        assert!(bitmap.is_opaque_at(0.01, 0.01));
        assert!(!bitmap.is_opaque_at(0.5, 0.5));
    }
}
