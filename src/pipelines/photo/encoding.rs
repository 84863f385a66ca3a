// SPDX-License-Identifier: GPL-3.0-only

//! Still-image encoding
//!
//! Encodes converted frames to JPEG (quality-controlled) or PNG, downscales
//! thumbnails, and hands results back either as files or as base64 data
//! URLs depending on the session's output mode.

use base64::Engine as _;
use image::imageops::{self, FilterType};
use image::{ImageBuffer, Rgb, RgbImage, Rgba};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::constants::{JPEG_QUALITY_FULLSIZE, JPEG_QUALITY_THUMBNAIL};
use crate::errors::EncodeError;
use crate::shaders::ConvertedImage;

/// Supported encoding formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodingFormat {
    /// JPEG format (lossy compression)
    Jpeg,
    /// PNG format (lossless compression)
    Png,
}

impl EncodingFormat {
    /// File extension for this format
    pub fn extension(&self) -> &'static str {
        match self {
            EncodingFormat::Jpeg => "jpg",
            EncodingFormat::Png => "png",
        }
    }

    /// MIME type used in data URLs
    pub fn mime_type(&self) -> &'static str {
        match self {
            EncodingFormat::Jpeg => "image/jpeg",
            EncodingFormat::Png => "image/png",
        }
    }
}

/// Encoded image data ready for saving or inline delivery
pub struct EncodedImage {
    pub data: Vec<u8>,
    pub format: EncodingFormat,
    pub width: u32,
    pub height: u32,
}

impl EncodedImage {
    /// Render as a base64 data URL for `data` output mode
    pub fn to_data_url(&self) -> String {
        let encoded = base64::engine::general_purpose::STANDARD.encode(&self.data);
        format!("data:{};base64,{}", self.format.mime_type(), encoded)
    }

    /// Write to disk at the given path
    pub fn save_to(&self, path: &Path) -> Result<PathBuf, EncodeError> {
        std::fs::write(path, &self.data)?;
        debug!(path = %path.display(), bytes = self.data.len(), "Saved encoded image");
        Ok(path.to_path_buf())
    }
}

/// Still-image encoder with format and quality settings
pub struct PhotoEncoder {
    format: EncodingFormat,
    jpeg_quality: u8,
}

impl PhotoEncoder {
    /// JPEG encoder at fullsize quality
    pub fn new() -> Self {
        Self {
            format: EncodingFormat::Jpeg,
            jpeg_quality: JPEG_QUALITY_FULLSIZE,
        }
    }

    /// JPEG encoder at thumbnail quality
    pub fn thumbnail() -> Self {
        Self {
            format: EncodingFormat::Jpeg,
            jpeg_quality: JPEG_QUALITY_THUMBNAIL,
        }
    }

    pub fn set_format(&mut self, format: EncodingFormat) {
        self.format = format;
    }

    /// Encode a converted frame at full resolution
    ///
    /// The frame must carry CPU pixels (converted with readback).
    pub fn encode(&self, image: &ConvertedImage) -> Result<EncodedImage, EncodeError> {
        let rgba = image
            .rgba
            .as_ref()
            .ok_or_else(|| EncodeError::Failure("frame has no CPU pixels".into()))?;
        self.encode_rgba(rgba, image.width, image.height)
    }

    /// Encode a converted frame downscaled by `ratio` (0 < ratio <= 1)
    pub fn encode_scaled(
        &self,
        image: &ConvertedImage,
        ratio: f64,
    ) -> Result<EncodedImage, EncodeError> {
        if !(ratio.is_finite() && ratio > 0.0 && ratio <= 1.0) {
            return Err(EncodeError::Failure(format!(
                "scale ratio {} outside (0, 1]",
                ratio
            )));
        }
        let rgba = image
            .rgba
            .as_ref()
            .ok_or_else(|| EncodeError::Failure("frame has no CPU pixels".into()))?;

        let src = ImageBuffer::<Rgba<u8>, &[u8]>::from_raw(image.width, image.height, rgba.as_slice())
            .ok_or_else(|| EncodeError::Failure("frame buffer shorter than dimensions".into()))?;

        let width = ((image.width as f64 * ratio).round() as u32).max(1);
        let height = ((image.height as f64 * ratio).round() as u32).max(1);
        let scaled = imageops::resize(&src, width, height, FilterType::Triangle);

        self.encode_rgba(scaled.as_raw(), width, height)
    }

    /// Encode raw RGBA pixels
    pub fn encode_rgba(
        &self,
        rgba: &[u8],
        width: u32,
        height: u32,
    ) -> Result<EncodedImage, EncodeError> {
        let expected = (width as usize) * (height as usize) * 4;
        if rgba.len() < expected {
            return Err(EncodeError::Failure(format!(
                "{} pixel bytes for {}x{}, need {}",
                rgba.len(),
                width,
                height,
                expected
            )));
        }

        let data = match self.format {
            EncodingFormat::Jpeg => {
                // JPEG has no alpha channel; drop it
                let rgb = rgba_to_rgb(rgba, width, height);
                encode_jpeg(&rgb, self.jpeg_quality)?
            }
            EncodingFormat::Png => encode_png(rgba, width, height)?,
        };

        info!(
            width,
            height,
            format = ?self.format,
            bytes = data.len(),
            "Encoded still image"
        );

        Ok(EncodedImage {
            data,
            format: self.format,
            width,
            height,
        })
    }
}

impl Default for PhotoEncoder {
    fn default() -> Self {
        Self::new()
    }
}

fn rgba_to_rgb(rgba: &[u8], width: u32, height: u32) -> RgbImage {
    let mut rgb = RgbImage::new(width, height);
    for (i, pixel) in rgb.pixels_mut().enumerate() {
        let offset = i * 4;
        *pixel = Rgb([rgba[offset], rgba[offset + 1], rgba[offset + 2]]);
    }
    rgb
}

fn encode_jpeg(image: &RgbImage, quality: u8) -> Result<Vec<u8>, EncodeError> {
    let mut buffer = Vec::new();
    let mut cursor = std::io::Cursor::new(&mut buffer);

    let mut encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut cursor, quality);
    encoder
        .encode(
            image.as_raw(),
            image.width(),
            image.height(),
            image::ExtendedColorType::Rgb8,
        )
        .map_err(|e| EncodeError::Failure(format!("JPEG encoding failed: {}", e)))?;

    Ok(buffer)
}

fn encode_png(rgba: &[u8], width: u32, height: u32) -> Result<Vec<u8>, EncodeError> {
    let mut buffer = Vec::new();

    let encoder = image::codecs::png::PngEncoder::new(std::io::Cursor::new(&mut buffer));
    image::ImageEncoder::write_image(
        encoder,
        &rgba[..(width as usize) * (height as usize) * 4],
        width,
        height,
        image::ExtendedColorType::Rgba8,
    )
    .map_err(|e| EncodeError::Failure(format!("PNG encoding failed: {}", e)))?;

    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Instant;

    fn test_image(width: u32, height: u32) -> ConvertedImage {
        ConvertedImage {
            width,
            height,
            texture: None,
            rgba: Some(Arc::new(vec![128u8; (width * height * 4) as usize])),
            pts_ns: None,
            captured_at: Instant::now(),
        }
    }

    #[test]
    fn jpeg_output_has_magic_bytes() {
        let encoded = PhotoEncoder::new().encode(&test_image(32, 16)).unwrap();
        assert_eq!(&encoded.data[..2], &[0xFF, 0xD8]);
        assert_eq!(encoded.width, 32);
        assert_eq!(encoded.format.extension(), "jpg");
    }

    #[test]
    fn png_output_has_magic_bytes() {
        let mut encoder = PhotoEncoder::new();
        encoder.set_format(EncodingFormat::Png);
        let encoded = encoder.encode(&test_image(8, 8)).unwrap();
        assert_eq!(&encoded.data[..4], &[0x89, b'P', b'N', b'G']);
    }

    #[test]
    fn thumbnail_scales_dimensions() {
        let encoded = PhotoEncoder::thumbnail()
            .encode_scaled(&test_image(120, 60), 1.0 / 6.0)
            .unwrap();
        assert_eq!(encoded.width, 20);
        assert_eq!(encoded.height, 10);
    }

    #[test]
    fn bad_ratio_rejected() {
        let image = test_image(16, 16);
        let encoder = PhotoEncoder::thumbnail();
        assert!(encoder.encode_scaled(&image, 0.0).is_err());
        assert!(encoder.encode_scaled(&image, 1.5).is_err());
        assert!(encoder.encode_scaled(&image, f64::NAN).is_err());
    }

    #[test]
    fn short_buffer_rejected() {
        let err = PhotoEncoder::new().encode_rgba(&[0u8; 10], 32, 32).unwrap_err();
        assert!(matches!(err, EncodeError::Failure(_)));
    }

    #[test]
    fn data_url_has_mime_prefix() {
        let encoded = PhotoEncoder::new().encode(&test_image(8, 8)).unwrap();
        assert!(encoded.to_data_url().starts_with("data:image/jpeg;base64,"));
    }

    #[test]
    fn frame_without_pixels_is_an_error() {
        let image = ConvertedImage {
            width: 8,
            height: 8,
            texture: None,
            rgba: None,
            pts_ns: None,
            captured_at: Instant::now(),
        };
        assert!(PhotoEncoder::new().encode(&image).is_err());
    }
}
