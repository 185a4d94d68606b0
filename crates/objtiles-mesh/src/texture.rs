//! Depth-dependent texture downsampling and encoding.

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{DynamicImage, ExtendedColorType, ImageEncoder, RgbaImage};

use crate::atlas::AtlasLayout;
use crate::error::{MeshError, MeshResult};

/// Output image format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureEncoding {
    Png,
    Jpeg { quality: u8 },
}

impl TextureEncoding {
    #[must_use]
    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg { .. } => "image/jpeg",
        }
    }
}

/// How much of a tile's texture survives at a given depth.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompressionLevel {
    /// Scale applied to both texture dimensions, in `(0, 1]`.
    pub resolution_fraction: f64,
    pub encoding: TextureEncoding,
}

impl CompressionLevel {
    pub const FULL: Self = Self {
        resolution_fraction: 1.0,
        encoding: TextureEncoding::Png,
    };

    /// Geometric error of a tile whose source texels measure `texel_size`
    /// world units. Leaves carry full detail and report zero.
    #[must_use]
    pub fn geometric_error(&self, texel_size: f64, is_leaf: bool) -> f64 {
        if is_leaf {
            0.0
        } else {
            texel_size / self.resolution_fraction
        }
    }

    /// Margin in source texels that still spans `margin` texels once the
    /// texture is downsampled to this level.
    #[must_use]
    pub fn source_margin(&self, margin: u32) -> u32 {
        (f64::from(margin) / self.resolution_fraction).ceil() as u32
    }
}

/// Maps tree depth to a [`CompressionLevel`].
///
/// Leaves keep the full texture losslessly. Internal nodes halve resolution
/// per level above the deepest level, down to `min_resolution_fraction`, and
/// get a JPEG quality interpolated between the bounds. Both quantities are
/// non-decreasing in depth.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TexturePolicy {
    pub min_resolution_fraction: f64,
    pub min_jpeg_quality: u8,
    pub max_jpeg_quality: u8,
}

impl Default for TexturePolicy {
    fn default() -> Self {
        Self {
            min_resolution_fraction: 0.0625,
            min_jpeg_quality: 60,
            max_jpeg_quality: 90,
        }
    }
}

impl TexturePolicy {
    #[must_use]
    pub fn level(&self, depth: u32, height: u32, is_leaf: bool) -> CompressionLevel {
        if is_leaf || height == 0 {
            return CompressionLevel::FULL;
        }
        let levels_below = height.saturating_sub(depth);
        let fraction = 0.5f64
            .powi(levels_below as i32)
            .max(self.min_resolution_fraction)
            .min(1.0);

        let lo = f64::from(self.min_jpeg_quality.min(self.max_jpeg_quality));
        let hi = f64::from(self.max_jpeg_quality.max(self.min_jpeg_quality));
        let t = f64::from(depth.min(height)) / f64::from(height);
        let quality = (lo + (hi - lo) * t).round().clamp(1.0, 100.0) as u8;

        CompressionLevel {
            resolution_fraction: fraction,
            encoding: TextureEncoding::Jpeg { quality },
        }
    }
}

/// An encoded texture ready to embed in a glTF buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressedTexture {
    pub bytes: Vec<u8>,
    pub mime_type: &'static str,
    pub width: u32,
    pub height: u32,
}

pub(crate) fn scaled(dim: u32, fraction: f64) -> u32 {
    ((f64::from(dim) * fraction).round() as u32).clamp(1, dim.max(1))
}

/// Render the repacked texture described by `atlas` at the level's
/// resolution and encode it.
///
/// # Errors
///
/// [`MeshError::TextureEncode`] if the encoder fails.
pub fn compress(
    source: &RgbaImage,
    atlas: &AtlasLayout,
    level: &CompressionLevel,
) -> MeshResult<CompressedTexture> {
    let img = atlas.render(source, level.resolution_fraction);
    let (width, height) = img.dimensions();

    let mut bytes = Vec::new();
    match level.encoding {
        TextureEncoding::Png => PngEncoder::new(&mut bytes).write_image(
            img.as_raw(),
            width,
            height,
            ExtendedColorType::Rgba8,
        ),
        TextureEncoding::Jpeg { quality } => {
            let rgb = DynamicImage::ImageRgba8(img).into_rgb8();
            JpegEncoder::new_with_quality(&mut bytes, quality).write_image(
                rgb.as_raw(),
                width,
                height,
                ExtendedColorType::Rgb8,
            )
        }
    }
    .map_err(MeshError::TextureEncode)?;

    Ok(CompressedTexture {
        bytes,
        mime_type: level.encoding.mime_type(),
        width,
        height,
    })
}
