//! Preview command
//!
//! Draws the avatar with upper half blocks, two pixel rows per text row.

use limner_core::Bitmap;
use tracing::info;

use super::{RenderArgs, load_subject};

/// Pixel flattened onto a black terminal background
fn flatten(px: &[u8]) -> [u8; 3] {
    let a = px[3] as u32;
    [
        (px[0] as u32 * a / 255) as u8,
        (px[1] as u32 * a / 255) as u8,
        (px[2] as u32 * a / 255) as u8,
    ]
}

fn ansi_rows(bitmap: &Bitmap) -> String {
    let (width, height) = bitmap.dimensions();
    let (width, height) = (width as usize, height as usize);
    let data = bitmap.to_rgba8_top_down();
    let at = |x: usize, y: usize| {
        let i = (y * width + x) * 4;
        flatten(&data[i..i + 4])
    };

    let mut output = String::new();
    for y in (0..height).step_by(2) {
        for x in 0..width {
            let top = at(x, y);
            let bottom = if y + 1 < height { at(x, y + 1) } else { [0, 0, 0] };
            output.push_str(&format!(
                "\x1b[38;2;{};{};{}m\x1b[48;2;{};{};{}m\u{2580}",
                top[0], top[1], top[2], bottom[0], bottom[1], bottom[2]
            ));
        }
        output.push_str("\x1b[0m\n");
    }
    output
}

/// Monochrome fallback: coverage as characters
fn plain_rows(bitmap: &Bitmap) -> String {
    let (width, height) = bitmap.dimensions();
    let (width, height) = (width as usize, height as usize);
    let data = bitmap.to_rgba8_top_down();
    let alpha = |x: usize, y: usize| {
        if y < height {
            data[(y * width + x) * 4 + 3]
        } else {
            0
        }
    };

    let mut output = String::new();
    for y in (0..height).step_by(2) {
        for x in 0..width {
            let coverage = (alpha(x, y) as u32 + alpha(x, y + 1) as u32) / 2;
            output.push(match coverage {
                0 => ' ',
                1..=84 => '.',
                85..=169 => '+',
                _ => '#',
            });
        }
        output.push('\n');
    }
    output
}

pub fn run(input: &str, args: &RenderArgs, color: bool) -> Result<(), Box<dyn std::error::Error>> {
    info!("Previewing avatar from {}", input);

    let subject = load_subject(input)?;
    let settings = args.load_settings()?;
    let options = args.display_options(&settings);
    let mut pipeline = args.pipeline(settings, None)?;

    let rendered = pipeline.render_uncached(&subject, &options)?;
    let preview = if color {
        ansi_rows(&rendered.bitmap)
    } else {
        plain_rows(&rendered.bitmap)
    };
    print!("{}", preview);

    let (width, height) = rendered.bitmap.dimensions();
    println!(
        "{}x{}, {} layers drawn, {} skipped",
        width, height, rendered.stats.drawn, rendered.stats.skipped
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use limner_core::Color;

    #[test]
    fn test_plain_rows_shape() {
        let mut bitmap = Bitmap::new(4, 4);
        bitmap.fill(Color::WHITE);
        let rows = plain_rows(&bitmap);
        assert_eq!(rows, "####\n####\n");
    }

    #[test]
    fn test_ansi_rows_one_block_per_pixel_pair() {
        let bitmap = Bitmap::filled(3, 3, Color::WHITE);
        let rows = ansi_rows(&bitmap);
        assert_eq!(rows.lines().count(), 2);
        assert_eq!(rows.matches('\u{2580}').count(), 6);
    }

    #[test]
    fn test_transparent_flattens_to_black() {
        assert_eq!(flatten(&[255, 128, 0, 0]), [0, 0, 0]);
        assert_eq!(flatten(&[255, 128, 0, 255]), [255, 128, 0]);
    }
}
