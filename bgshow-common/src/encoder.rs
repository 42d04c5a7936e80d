use std::fs;
use std::io::Cursor;
use std::path::Path;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use image::{imageops, DynamicImage, ImageFormat, RgbImage};
use serde::{Serialize, Deserialize};
use crate::error::EncodeError;
use crate::playlist::ImageEntry;
use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodeOptions {
    pub resize: bool,
    pub max_width: u32,
    pub max_height: u32,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            resize: false,
            max_width: 1920,
            max_height: 1080,
        }
    }
}

/// Image payload ready for a renderer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    /// A `data:` URI, or the URL itself for external entries.
    pub data: String,
    /// EXIF orientation (1-8) the renderer still has to apply. Always 1 once
    /// the image has been resized, since the pixels are rotated then.
    pub orientation: u16,
}

pub fn encode_entry(entry: &ImageEntry, options: &EncodeOptions) -> Result<EncodedImage> {
    if !entry.is_local() {
        return Ok(EncodedImage {
            data: entry.path.to_string_lossy().to_string(),
            orientation: 1,
        });
    }

    let bytes = fs::read(&entry.path).map_err(|e| EncodeError::FileRead {
        path: entry.path.clone(),
        source: e,
    })?;
    let orientation = read_orientation(&bytes).unwrap_or(1);

    if options.resize {
        let resized = resize_to_jpeg(&entry.path, &bytes, orientation, options)?;
        return Ok(EncodedImage {
            data: format!("data:image/jpeg;base64,{}", STANDARD.encode(resized)),
            orientation: 1,
        });
    }

    Ok(EncodedImage {
        data: format!("data:{};base64,{}", mime_type(&entry.path), STANDARD.encode(&bytes)),
        orientation,
    })
}

fn mime_type(path: &Path) -> String {
    let ext = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg".to_string(),
        "" => "application/octet-stream".to_string(),
        other => format!("image/{}", other),
    }
}

fn read_orientation(bytes: &[u8]) -> Option<u16> {
    let exif = exif::Reader::new()
        .read_from_container(&mut Cursor::new(bytes))
        .ok()?;
    let field = exif.get_field(exif::Tag::Orientation, exif::In::PRIMARY)?;
    field.value.get_uint(0).map(|val| val as u16)
}

fn resize_to_jpeg(path: &Path, bytes: &[u8], orientation: u16, options: &EncodeOptions) -> Result<Vec<u8>> {
    let decoded = image::load_from_memory(bytes).map_err(|e| EncodeError::Decode {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    let img = apply_orientation(decoded.to_rgb8(), orientation);
    let (width, height) = fit_within(img.width(), img.height(), options.max_width, options.max_height);
    let img = if (width, height) == img.dimensions() {
        img
    } else {
        log::debug!("Resizing {:?} to {}x{}", path, width, height);
        imageops::resize(&img, width, height, imageops::FilterType::Triangle)
    };

    let mut out = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img)
        .write_to(&mut out, ImageFormat::Jpeg)
        .map_err(|e| EncodeError::Reencode {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
    Ok(out.into_inner())
}

fn apply_orientation(img: RgbImage, orientation: u16) -> RgbImage {
    match orientation {
        2 => imageops::flip_horizontal(&img),
        3 => imageops::rotate180(&img),
        4 => imageops::flip_vertical(&img),
        // transpose
        5 => imageops::flip_horizontal(&imageops::rotate90(&img)),
        6 => imageops::rotate90(&img),
        // transverse
        7 => imageops::flip_horizontal(&imageops::rotate270(&img)),
        8 => imageops::rotate270(&img),
        _ => img,
    }
}

/// Largest size with the same aspect ratio that fits the bounds. Never
/// enlarges.
fn fit_within(width: u32, height: u32, max_width: u32, max_height: u32) -> (u32, u32) {
    if width <= max_width && height <= max_height {
        return (width, height);
    }

    let scale = f64::min(
        f64::from(max_width) / f64::from(width),
        f64::from(max_height) / f64::from(height),
    );
    let scaled = |dim: u32| ((f64::from(dim) * scale).round() as u32).max(1);
    (scaled(width), scaled(height))
}
