//! Layer compositing
//!
//! Flattens an ordered layer stack onto the working canvas, back to front,
//! then runs the global post effects and produces the final bitmap.

use std::sync::Arc;

use limner_core::{
    Bitmap, CANVAS_HEIGHT, CANVAS_WIDTH, Color, EyeMarks, FallbackTexture, Layer, LayerSource,
    Recolor, Sides,
};
use thiserror::Error;
use tracing::{Level, debug, span};

use crate::texture_ops;
use crate::textures::{TextureError, TextureStore};

/// Rows trimmed from top and bottom when the canvas is turned sideways
pub const HALF_DIFF: i32 = ((CANVAS_HEIGHT - CANVAS_WIDTH) / 2) as i32;
/// Horizontal margin of the lying-down pose
pub const DOWNED_MARGIN: i32 = 10;
/// Rows the gradient mask sprite is shifted by when adapted
pub const GRADIENT_MASK_OFFSET: i32 = 4;

/// Compositing errors
#[derive(Debug, Error)]
pub enum CompositeError {
    #[error("Texture error: {0}")]
    Texture(#[from] TextureError),

    #[error("Canvas is {width}x{height}, expected {expected_width}x{expected_height}")]
    CanvasSize {
        width: u32,
        height: u32,
        expected_width: u32,
        expected_height: u32,
    },
}

/// Global flags for one render
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderFlags {
    /// Canvas clear color
    pub background: Color,
    /// Rows the stack is lowered by (age bracket)
    pub y_offset: i32,
    /// Row adjustment for eye marks (age bracket)
    pub eye_level: i32,
    /// Place pixels through the lying-down remap
    pub downed: bool,
    /// Apply the corpse grayscale
    pub dead: bool,
    pub outline: bool,
    /// Upscale with the 2x corner rule instead of copying
    pub scaling: bool,
}

impl Default for RenderFlags {
    fn default() -> Self {
        Self {
            background: Color::TRANSPARENT,
            y_offset: 0,
            eye_level: 0,
            downed: false,
            dead: false,
            outline: false,
            scaling: true,
        }
    }
}

/// Per-render counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompositeStats {
    /// Layers whose texture was found and drawn
    pub drawn: usize,
    /// Layers skipped for a missing texture
    pub skipped: usize,
}

/// Map a canvas position to its lying-down position
///
/// Returns `None` for pixels that fall outside the turned canvas.
pub fn downed_target(x: i32, y: i32) -> Option<(i32, i32)> {
    let w = CANVAS_WIDTH as i32;
    let h = CANVAS_HEIGHT as i32;
    if y >= HALF_DIFF && y < h - HALF_DIFF && x <= w - DOWNED_MARGIN {
        Some((y - HALF_DIFF, w - x - DOWNED_MARGIN))
    } else {
        None
    }
}

/// Blend one source sample over a destination pixel
///
/// `alpha` already includes the source alpha and any alpha mask. With a
/// tint, the tint alpha scales coverage; a mask splits the tint between
/// the primary color (mask red) and either the secondary color (mask green)
/// or untinted white. The result is always opaque.
pub fn blend_pixel(
    dst: Color,
    src: Color,
    alpha: f32,
    tint: Option<Color>,
    mask: Option<Color>,
    secondary: Option<Color>,
) -> Color {
    let (alpha, factor): (f32, [f32; 3]) = match tint {
        Some(t) => {
            let factor = match (mask, secondary) {
                (Some(m), Some(t2)) => [
                    t.r * m.r + t2.r * m.g,
                    t.g * m.r + t2.g * m.g,
                    t.b * m.r + t2.b * m.g,
                ],
                (Some(m), None) => [
                    t.r * m.r + 1.0 - m.r,
                    t.g * m.r + 1.0 - m.r,
                    t.b * m.r + 1.0 - m.r,
                ],
                (None, _) => [t.r, t.g, t.b],
            };
            (alpha * t.a, factor)
        }
        None => (alpha, [1.0, 1.0, 1.0]),
    };
    Color::rgba(
        dst.r * (1.0 - alpha) + src.r * factor[0] * alpha,
        dst.g * (1.0 - alpha) + src.g * factor[1] * alpha,
        dst.b * (1.0 - alpha) + src.b * factor[2] * alpha,
        1.0,
    )
}

/// Software compositor for the 40x48 avatar canvas
#[derive(Debug, Clone, Default)]
pub struct Compositor;

impl Compositor {
    pub fn new() -> Self {
        Self
    }

    /// Fresh working canvas
    pub fn canvas() -> Bitmap {
        Bitmap::new(CANVAS_WIDTH, CANVAS_HEIGHT)
    }

    /// Composite `layers` onto `canvas` and return the final bitmap
    ///
    /// The canvas is cleared first and holds the post-effect working image
    /// afterwards. Layers whose texture cannot be found are skipped.
    pub fn render(
        &self,
        canvas: &mut Bitmap,
        layers: &[Layer],
        flags: &RenderFlags,
        store: &mut TextureStore,
    ) -> Result<(Bitmap, CompositeStats), CompositeError> {
        let _span = span!(Level::DEBUG, "composite", layers = layers.len()).entered();

        if canvas.dimensions() != (CANVAS_WIDTH, CANVAS_HEIGHT) {
            return Err(CompositeError::CanvasSize {
                width: canvas.width,
                height: canvas.height,
                expected_width: CANVAS_WIDTH,
                expected_height: CANVAS_HEIGHT,
            });
        }

        texture_ops::clear(canvas, flags.background);
        let mut stats = CompositeStats::default();
        let mut eye_marks: Vec<&EyeMarks> = Vec::new();

        for layer in layers {
            let texture = match &layer.source {
                LayerSource::Texture(path) => store.texture(path)?,
                LayerSource::Fallback(fallback) => store.adapted(fallback)?,
            };
            let Some(texture) = texture else {
                debug!(kind = %layer.kind, path = layer.source.path(), "Skipping layer");
                stats.skipped += 1;
                continue;
            };

            let mut mask = match layer.mask_path() {
                Some(path) => store.local_texture(&path)?,
                None => None,
            };
            let mut secondary = None;
            if mask.is_none() {
                if let Some(gradient) = &layer.gradient {
                    let fallback = FallbackTexture::new(
                        gradient.mask_path.clone(),
                        GRADIENT_MASK_OFFSET,
                        Recolor::Keep,
                    );
                    mask = store.adapted(&fallback)?;
                    secondary = mask.as_ref().map(|_| gradient.color_b);
                }
            }
            let alpha_mask = match &layer.alpha_mask {
                Some(path) => store.local_texture(path)?,
                None => None,
            };

            self.draw_layer(canvas, layer, &texture, mask, alpha_mask, secondary, flags);
            stats.drawn += 1;
            if let Some(marks) = &layer.eye_marks {
                eye_marks.push(marks);
            }
        }

        for marks in eye_marks {
            self.stamp_eyes(canvas, marks, flags);
        }

        if flags.dead {
            texture_ops::desaturate_corpse(canvas);
        }
        if flags.outline {
            texture_ops::add_outline(canvas);
        }

        let output = if flags.scaling {
            texture_ops::scale_x2(canvas)
        } else {
            texture_ops::readable_copy(canvas, None)
        };

        debug!(drawn = stats.drawn, skipped = stats.skipped, "Composited avatar");
        Ok((output, stats))
    }

    #[allow(clippy::too_many_arguments)]
    fn draw_layer(
        &self,
        canvas: &mut Bitmap,
        layer: &Layer,
        texture: &Bitmap,
        mask: Option<Arc<Bitmap>>,
        alpha_mask: Option<Arc<Bitmap>>,
        secondary: Option<Color>,
        flags: &RenderFlags,
    ) {
        let w = CANVAS_WIDTH as i32;
        let h = CANVAS_HEIGHT as i32;
        let base = h - texture.height as i32 - layer.offset;
        let y_end = h - layer.hide_top - flags.y_offset - layer.offset;
        let x_start = if layer.sides.contains(Sides::DEXTER) { 0 } else { w / 2 };
        let x_end = if layer.sides.contains(Sides::SINISTER) { w } else { w / 2 };

        for y in base..y_end {
            let ty = y - base + flags.y_offset;
            for x in x_start..x_end {
                let tx = if layer.flip { w - 1 - x } else { x };
                let src = texture.sample(tx, ty);
                let mut alpha = src.a;
                if let Some(am) = &alpha_mask {
                    alpha *= am.sample(x, ty).r;
                }
                if alpha <= 0.0 {
                    continue;
                }

                let target = if flags.downed {
                    downed_target(x, y)
                } else {
                    Some((x, y))
                };
                let Some((px, py)) = target else {
                    continue;
                };

                let mask_px = mask.as_ref().map(|m| m.sample(x, ty));
                let dst = canvas.sample(px, py);
                canvas.put(
                    px,
                    py,
                    blend_pixel(dst, src, alpha, layer.tint, mask_px, secondary),
                );
            }
        }
    }

    fn stamp_eyes(&self, canvas: &mut Bitmap, marks: &EyeMarks, flags: &RenderFlags) {
        let (c1, c2) = marks.colors;
        let w = CANVAS_WIDTH as i32;
        for eye in &marks.positions {
            for ((x, y), color) in [(eye.pos1, c1), (eye.pos2, c2)] {
                let y = y + flags.eye_level;
                if flags.downed {
                    canvas.put(y - HALF_DIFF, w - x - DOWNED_MARGIN, color);
                } else {
                    canvas.put(x, y, color);
                }
            }
        }
    }
}
