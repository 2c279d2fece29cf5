//! PNG import and export
//!
//! Plain 8-bit RGBA PNGs, no custom chunks.

use std::io::Cursor;
use std::path::Path;

use image::{ImageFormat, RgbaImage};
use limner_core::Bitmap;

use crate::texture_ops;
use crate::textures::TextureError;

/// Size of upscaled portrait exports
pub const UPSCALED_SIZE: (u32, u32) = (480, 576);

fn to_rgba_image(bitmap: &Bitmap) -> Result<RgbaImage, TextureError> {
    RgbaImage::from_raw(bitmap.width, bitmap.height, bitmap.to_rgba8_top_down())
        .ok_or_else(|| TextureError::Encode("pixel buffer size mismatch".to_string()))
}

/// Encode a bitmap as PNG bytes
pub fn encode_png(bitmap: &Bitmap) -> Result<Vec<u8>, TextureError> {
    let img = to_rgba_image(bitmap)?;
    let mut bytes = Cursor::new(Vec::new());
    img.write_to(&mut bytes, ImageFormat::Png)
        .map_err(|e| TextureError::Encode(e.to_string()))?;
    Ok(bytes.into_inner())
}

/// Decode PNG bytes; `origin` names the data in errors
pub fn decode_png(bytes: &[u8], origin: &str) -> Result<Bitmap, TextureError> {
    let decode_err = |message: String| TextureError::Decode {
        path: origin.to_string(),
        message,
    };
    let img = image::load_from_memory_with_format(bytes, ImageFormat::Png)
        .map_err(|e| decode_err(e.to_string()))?
        .to_rgba8();
    let (width, height) = img.dimensions();
    Bitmap::from_rgba8_top_down(width, height, img.as_raw())
        .ok_or_else(|| decode_err("pixel buffer size mismatch".to_string()))
}

/// Read a PNG file
pub fn load_png(path: impl AsRef<Path>) -> Result<Bitmap, TextureError> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).map_err(|source| TextureError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    decode_png(&bytes, &path.display().to_string())
}

/// Write a PNG file, creating parent directories
pub fn save_png(path: impl AsRef<Path>, bitmap: &Bitmap) -> Result<(), TextureError> {
    let path = path.as_ref();
    let io_err = |source| TextureError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(io_err)?;
    }
    let bytes = encode_png(bitmap)?;
    std::fs::write(path, bytes).map_err(io_err)
}

/// Write a nearest-neighbour upscaled copy at [`UPSCALED_SIZE`]
pub fn save_upscaled_png(path: impl AsRef<Path>, bitmap: &Bitmap) -> Result<(), TextureError> {
    let upscaled = texture_ops::resize_nearest(bitmap, UPSCALED_SIZE.0, UPSCALED_SIZE.1);
    save_png(path, &upscaled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use limner_core::Color;

    fn sample() -> Bitmap {
        let mut bitmap = Bitmap::filled(4, 3, Color::rgba(0.2, 0.4, 0.6, 1.0));
        bitmap.set_pixel(0, 0, Color::rgb(1.0, 0.0, 0.0));
        bitmap.set_pixel(3, 2, Color::TRANSPARENT);
        bitmap
    }

    #[test]
    fn test_export_import_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/avatar.png");
        let bitmap = sample();
        save_png(&path, &bitmap).unwrap();

        let loaded = load_png(&path).unwrap();
        assert_eq!(loaded.dimensions(), bitmap.dimensions());
        assert_eq!(loaded.to_rgba8_top_down(), bitmap.to_rgba8_top_down());
        assert_eq!(loaded.content_hash(), bitmap.content_hash());
    }

    #[test]
    fn test_upscaled_export() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("big.png");
        let mut bitmap = Bitmap::filled(80, 96, Color::WHITE);
        bitmap.set_pixel(0, 0, Color::BLACK);
        save_upscaled_png(&path, &bitmap).unwrap();

        let loaded = load_png(&path).unwrap();
        assert_eq!(loaded.dimensions(), UPSCALED_SIZE);
        // 6x scale: the bottom-left source pixel covers a 6x6 block
        assert_eq!(loaded.pixel(0, 0), Color::BLACK);
        assert_eq!(loaded.pixel(5, 5), Color::BLACK);
        assert_eq!(loaded.pixel(6, 6), Color::WHITE);
    }

    #[test]
    fn test_decode_garbage() {
        let err = decode_png(b"not a png", "garbage").unwrap_err();
        assert!(matches!(err, TextureError::Decode { .. }));
    }

    #[test]
    fn test_load_missing() {
        assert!(matches!(
            load_png("/nonexistent/avatar.png"),
            Err(TextureError::Io { .. })
        ));
    }
}
