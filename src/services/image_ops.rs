//! Image preprocessing: optional re-encode before upload and preview
//! generation.
//!
//! Both operations are pure transforms over the input bytes; neither touches
//! store state. Failures here are non-fatal to the surrounding upload flow:
//! the caller falls back to the original payload or skips the preview.

use super::{FileError, FileResult};
use base64::{Engine as _, engine::general_purpose};
use image::ImageFormat;
use image::codecs::jpeg::JpegEncoder;
use std::io::Cursor;

/// Quality factor applied when the caller does not specify one.
pub const DEFAULT_QUALITY: f32 = 0.8;

/// Longest edge of a generated preview, in pixels.
const PREVIEW_MAX_EDGE: u32 = 256;

/// Re-encode an image payload at the given quality factor (0.0–1.0),
/// keeping its content type.
///
/// JPEG payloads honor the quality factor; PNG payloads are re-encoded
/// losslessly (the factor is ignored). Other content types are refused so
/// the caller keeps the original bytes.
pub fn compress(bytes: &[u8], content_type: &str, quality: f32) -> FileResult<Vec<u8>> {
    let img = image::load_from_memory(bytes)
        .map_err(|err| FileError::Validation(format!("image decode failed: {}", err)))?;

    let mut out = Vec::new();
    match content_type {
        "image/jpeg" | "image/jpg" => {
            let q = (quality.clamp(0.01, 1.0) * 100.0).round() as u8;
            let encoder = JpegEncoder::new_with_quality(&mut out, q);
            img.write_with_encoder(encoder)
                .map_err(|err| FileError::Validation(format!("jpeg encode failed: {}", err)))?;
        }
        "image/png" => {
            img.write_to(&mut Cursor::new(&mut out), ImageFormat::Png)
                .map_err(|err| FileError::Validation(format!("png encode failed: {}", err)))?;
        }
        other => {
            return Err(FileError::Validation(format!(
                "no re-encoder for content type `{}`",
                other
            )));
        }
    }

    Ok(out)
}

/// Produce a bounded PNG thumbnail of the payload as a base64 data URL.
///
/// Called at upload time for image payloads; the result lands in the
/// record's metadata bag under `preview`.
pub fn generate_preview(bytes: &[u8]) -> FileResult<String> {
    let img = image::load_from_memory(bytes)
        .map_err(|err| FileError::Validation(format!("image decode failed: {}", err)))?;

    let thumb = img.thumbnail(PREVIEW_MAX_EDGE, PREVIEW_MAX_EDGE);
    let mut out = Vec::new();
    thumb
        .write_to(&mut Cursor::new(&mut out), ImageFormat::Png)
        .map_err(|err| FileError::Validation(format!("png encode failed: {}", err)))?;

    Ok(format!(
        "data:image/png;base64,{}",
        general_purpose::STANDARD.encode(&out)
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, Rgb, RgbImage};

    fn gradient(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
        }))
    }

    fn encode(img: &DynamicImage, format: ImageFormat) -> Vec<u8> {
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), format).unwrap();
        buf
    }

    #[test]
    fn jpeg_reencode_preserves_dimensions() {
        let original = gradient(96, 64);
        let bytes = encode(&original, ImageFormat::Jpeg);

        let compressed = compress(&bytes, "image/jpeg", 0.5).unwrap();
        let decoded = image::load_from_memory(&compressed).unwrap();
        assert_eq!(decoded.width(), 96);
        assert_eq!(decoded.height(), 64);
    }

    #[test]
    fn lower_quality_is_smaller() {
        let bytes = encode(&gradient(256, 256), ImageFormat::Jpeg);
        let low = compress(&bytes, "image/jpeg", 0.1).unwrap();
        let high = compress(&bytes, "image/jpeg", 0.95).unwrap();
        assert!(low.len() < high.len());
    }

    #[test]
    fn png_payloads_are_accepted() {
        let bytes = encode(&gradient(32, 32), ImageFormat::Png);
        let reencoded = compress(&bytes, "image/png", DEFAULT_QUALITY).unwrap();
        assert!(image::load_from_memory(&reencoded).is_ok());
    }

    #[test]
    fn garbage_bytes_are_rejected() {
        let result = compress(b"definitely not an image", "image/jpeg", 0.8);
        assert!(matches!(result, Err(FileError::Validation(_))));
    }

    #[test]
    fn unsupported_content_type_is_refused() {
        let bytes = encode(&gradient(16, 16), ImageFormat::Png);
        let result = compress(&bytes, "image/svg+xml", 0.8);
        assert!(matches!(result, Err(FileError::Validation(_))));
    }

    #[test]
    fn preview_is_a_png_data_url() {
        let bytes = encode(&gradient(512, 512), ImageFormat::Png);
        let preview = generate_preview(&bytes).unwrap();
        assert!(preview.starts_with("data:image/png;base64,"));

        let payload = general_purpose::STANDARD
            .decode(preview.trim_start_matches("data:image/png;base64,"))
            .unwrap();
        let thumb = image::load_from_memory(&payload).unwrap();
        assert!(thumb.width() <= 256 && thumb.height() <= 256);
    }
}
