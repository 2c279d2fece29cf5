//! Primitive bitmap operations
//!
//! Clearing, resized copies, the edge-preserving 2x upscale, outline
//! stamping, corpse desaturation and the vanilla adapter that squeezes a
//! foreign host sprite into the avatar canvas and palette.

use image::imageops::{self, FilterType};
use image::{Rgba, Rgba32FImage};
use limner_core::{Bitmap, CANVAS_HEIGHT, CANVAS_WIDTH, Color, Recolor};

/// Size a host sprite is resized to before cropping into the canvas
pub const VANILLA_SCALE: (u32, u32) = (62, 68);

/// Palette used when the palette texture is missing (light, mid, dark)
pub const DEFAULT_PALETTE: [Color; 3] = [Color::gray(0.9), Color::gray(0.6), Color::gray(0.3)];

/// Color painted around opaque silhouettes
pub const OUTLINE_COLOR: Color = Color::rgb(0.1, 0.1, 0.1);

/// Fill a bitmap with one color
pub fn clear(bitmap: &mut Bitmap, color: Color) {
    bitmap.fill(color);
}

fn to_image(bitmap: &Bitmap) -> Rgba32FImage {
    let (w, h) = bitmap.dimensions();
    Rgba32FImage::from_fn(w, h, |x, y| {
        let c = bitmap.pixel(x, h - 1 - y);
        Rgba([c.r, c.g, c.b, c.a])
    })
}

fn from_image(img: &Rgba32FImage) -> Bitmap {
    let (w, h) = img.dimensions();
    let mut bitmap = Bitmap::new(w, h);
    for (x, y, px) in img.enumerate_pixels() {
        let [r, g, b, a] = px.0;
        bitmap.set_pixel(x, h - 1 - y, Color::rgba(r, g, b, a));
    }
    bitmap
}

/// Copy a bitmap, optionally resizing it with bilinear filtering
pub fn readable_copy(src: &Bitmap, size: Option<(u32, u32)>) -> Bitmap {
    match size {
        Some((w, h)) if (w, h) != src.dimensions() => {
            from_image(&imageops::resize(&to_image(src), w, h, FilterType::Triangle))
        }
        _ => src.clone(),
    }
}

/// Nearest-neighbour resize, used for upscaled exports
pub fn resize_nearest(src: &Bitmap, width: u32, height: u32) -> Bitmap {
    from_image(&imageops::resize(
        &to_image(src),
        width,
        height,
        FilterType::Nearest,
    ))
}

/// Double a bitmap, smoothing diagonal staircases
///
/// Each source pixel becomes a 2x2 block. A corner of the block takes the
/// vertical neighbour's color when the horizontal and vertical neighbours on
/// that side agree and the pixel differs from the diagonal between them;
/// otherwise it copies the pixel.
pub fn scale_x2(src: &Bitmap) -> Bitmap {
    let (w, h) = src.dimensions();
    let mut out = Bitmap::new(2 * w, 2 * h);
    let p = |x: u32, y: u32| src.pixel(x, y);

    for y in 0..h {
        for x in 0..w {
            let c = p(x, y);

            let bottom_left = if x > 0 && y > 0 && p(x - 1, y) == p(x, y - 1) && c != p(x - 1, y - 1)
            {
                p(x, y - 1)
            } else {
                c
            };
            let bottom_right =
                if x + 1 < w && y > 0 && p(x + 1, y) == p(x, y - 1) && c != p(x + 1, y - 1) {
                    p(x, y - 1)
                } else {
                    c
                };
            let top_left =
                if x > 0 && y + 1 < h && p(x - 1, y) == p(x, y + 1) && c != p(x - 1, y + 1) {
                    p(x, y + 1)
                } else {
                    c
                };
            let top_right =
                if x + 1 < w && y + 1 < h && p(x + 1, y) == p(x, y + 1) && c != p(x + 1, y + 1) {
                    p(x, y + 1)
                } else {
                    c
                };

            out.set_pixel(2 * x, 2 * y, bottom_left);
            out.set_pixel(2 * x + 1, 2 * y, bottom_right);
            out.set_pixel(2 * x, 2 * y + 1, top_left);
            out.set_pixel(2 * x + 1, 2 * y + 1, top_right);
        }
    }
    out
}

/// Paint a dark outline around opaque regions
///
/// A pixel with alpha below 0.9 that touches (4-neighbourhood) a pixel with
/// alpha above 0.9 becomes [`OUTLINE_COLOR`]. Neighbours are read from the
/// unmodified input.
pub fn add_outline(bitmap: &mut Bitmap) {
    let copy = bitmap.clone();
    let (w, h) = copy.dimensions();
    let solid = |x: u32, y: u32| copy.pixel(x, y).a > 0.9;

    for y in 0..h {
        for x in 0..w {
            if copy.pixel(x, y).a >= 0.9 {
                continue;
            }
            let edge = (x > 0 && solid(x - 1, y))
                || (y > 0 && solid(x, y - 1))
                || (x + 1 < w && solid(x + 1, y))
                || (y + 1 < h && solid(x, y + 1));
            if edge {
                bitmap.set_pixel(x, y, OUTLINE_COLOR);
            }
        }
    }
}

/// Grayscale with a blue cast, applied to dead subjects
pub fn desaturate_corpse(bitmap: &mut Bitmap) {
    for px in bitmap.pixels_mut() {
        let gray = (px.r + px.g + px.b - 0.1) / 3.0;
        *px = Color::rgba(gray, gray, gray * 1.2, px.a);
    }
}

/// Adapt a host sprite to the avatar canvas
///
/// The sprite is resized to [`VANILLA_SCALE`], then a canvas-sized window
/// centred horizontally and starting `y_offset` rows up is cut out. Pixels
/// below half alpha are dropped; the rest are recolored per `recolor`.
pub fn adapt_vanilla(
    raw: &Bitmap,
    palette: Option<&Bitmap>,
    y_offset: i32,
    recolor: Recolor,
) -> Bitmap {
    let resized = readable_copy(raw, Some(VANILLA_SCALE));
    let x_offset = ((VANILLA_SCALE.0 - CANVAS_WIDTH) / 2) as i32;
    let shade = |i: usize| {
        palette
            .and_then(|p| p.get_pixel(i as u32, 0))
            .unwrap_or(DEFAULT_PALETTE[i])
    };

    let mut out = Bitmap::new(CANVAS_WIDTH, CANVAS_HEIGHT);
    for y in 0..CANVAS_HEIGHT as i32 {
        for x in 0..CANVAS_WIDTH as i32 {
            let old = resized.sample(x + x_offset, y + y_offset);
            if old.a < 0.5 {
                continue;
            }
            let gray = old.luminance_mean();
            let color = match recolor {
                Recolor::Palette if gray > 0.9 => shade(0),
                Recolor::Palette if gray > 0.3 => shade(1),
                Recolor::Palette => shade(2),
                Recolor::Gray => Color::gray(((gray * 5.0).round() + 2.0) / 7.0),
                Recolor::Keep => old,
            };
            out.put(x, y, color);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: Color = Color::rgb(1.0, 0.0, 0.0);
    const B: Color = Color::rgb(0.0, 1.0, 0.0);
    const C: Color = Color::rgb(0.0, 0.0, 1.0);

    fn block(p00: Color, p10: Color, p01: Color, p11: Color) -> Bitmap {
        let mut bitmap = Bitmap::new(2, 2);
        bitmap.set_pixel(0, 0, p00);
        bitmap.set_pixel(1, 0, p10);
        bitmap.set_pixel(0, 1, p01);
        bitmap.set_pixel(1, 1, p11);
        bitmap
    }

    fn rows(bitmap: &Bitmap) -> Vec<Vec<Color>> {
        (0..bitmap.height)
            .map(|y| (0..bitmap.width).map(|x| bitmap.pixel(x, y)).collect())
            .collect()
    }

    #[test]
    fn test_scale_x2_corner_rule() {
        let out = scale_x2(&block(A, B, B, C));
        assert_eq!(out.dimensions(), (4, 4));
        assert_eq!(
            rows(&out),
            vec![
                vec![A, A, B, B],
                vec![A, B, B, B],
                vec![B, B, B, C],
                vec![B, B, C, C],
            ]
        );
    }

    #[test]
    fn test_scale_x2_checkerboard_replicates() {
        let out = scale_x2(&block(A, B, B, A));
        assert_eq!(
            rows(&out),
            vec![
                vec![A, A, B, B],
                vec![A, A, B, B],
                vec![B, B, A, A],
                vec![B, B, A, A],
            ]
        );
    }

    #[test]
    fn test_scale_x2_flat_region() {
        let src = Bitmap::filled(3, 2, A);
        let out = scale_x2(&src);
        assert_eq!(out, Bitmap::filled(6, 4, A));
    }

    #[test]
    fn test_outline() {
        let mut bitmap = Bitmap::new(5, 5);
        bitmap.set_pixel(2, 2, Color::WHITE);
        add_outline(&mut bitmap);

        assert_eq!(bitmap.pixel(2, 2), Color::WHITE);
        for (x, y) in [(1, 2), (3, 2), (2, 1), (2, 3)] {
            assert_eq!(bitmap.pixel(x, y), OUTLINE_COLOR);
        }
        // diagonals and far pixels stay clear
        assert_eq!(bitmap.pixel(1, 1), Color::TRANSPARENT);
        assert_eq!(bitmap.pixel(0, 2), Color::TRANSPARENT);
    }

    #[test]
    fn test_desaturate() {
        let mut bitmap = Bitmap::filled(1, 1, Color::rgba(0.4, 0.5, 0.6, 0.7));
        desaturate_corpse(&mut bitmap);
        let px = bitmap.pixel(0, 0);
        let gray = (1.5 - 0.1) / 3.0;
        assert!((px.r - gray).abs() < 1e-6);
        assert!((px.g - gray).abs() < 1e-6);
        assert!((px.b - gray * 1.2).abs() < 1e-6);
        assert_eq!(px.a, 0.7);
    }

    #[test]
    fn test_readable_copy_resizes() {
        let src = Bitmap::filled(10, 10, Color::gray(0.5));
        let copy = readable_copy(&src, Some((20, 5)));
        assert_eq!(copy.dimensions(), (20, 5));
        assert!((copy.pixel(7, 2).r - 0.5).abs() < 1e-4);
        assert_eq!(readable_copy(&src, None), src);
    }

    #[test]
    fn test_resize_nearest_keeps_blocks() {
        let src = block(A, B, B, C);
        let out = resize_nearest(&src, 4, 4);
        assert_eq!(out.pixel(0, 0), A);
        assert_eq!(out.pixel(1, 1), A);
        assert_eq!(out.pixel(3, 0), B);
        assert_eq!(out.pixel(3, 3), C);
    }

    #[test]
    fn test_adapt_vanilla_recolor_modes() {
        let raw = Bitmap::filled(VANILLA_SCALE.0, VANILLA_SCALE.1, Color::gray(0.95));

        let kept = adapt_vanilla(&raw, None, 0, Recolor::Keep);
        assert_eq!(kept.dimensions(), (CANVAS_WIDTH, CANVAS_HEIGHT));
        assert!((kept.pixel(0, 0).r - 0.95).abs() < 1e-4);

        let mut palette = Bitmap::new(3, 1);
        palette.set_pixel(0, 0, A);
        palette.set_pixel(1, 0, B);
        palette.set_pixel(2, 0, C);
        let recolored = adapt_vanilla(&raw, Some(&palette), 0, Recolor::Palette);
        assert_eq!(recolored.pixel(20, 20), A);

        let gray = adapt_vanilla(&raw, None, 0, Recolor::Gray);
        let expected = ((0.95_f32 * 5.0).round() + 2.0) / 7.0;
        assert!((gray.pixel(5, 5).r - expected).abs() < 1e-4);
    }

    #[test]
    fn test_adapt_vanilla_drops_faint_pixels_and_offsets() {
        let mut raw = Bitmap::new(VANILLA_SCALE.0, VANILLA_SCALE.1);
        // opaque band in the top rows only
        for y in 60..VANILLA_SCALE.1 {
            for x in 0..VANILLA_SCALE.0 {
                raw.set_pixel(x, y, Color::BLACK);
            }
        }
        let low = adapt_vanilla(&raw, None, 0, Recolor::Keep);
        assert_eq!(low.pixel(20, 0), Color::TRANSPARENT);
        assert_eq!(low.pixel(20, 47), Color::TRANSPARENT);

        // shifting the window up brings the band into view
        let high = adapt_vanilla(&raw, None, 20, Recolor::Keep);
        assert_eq!(high.pixel(20, 45).a, 1.0);
        assert_eq!(high.pixel(20, 0), Color::TRANSPARENT);
    }
}
