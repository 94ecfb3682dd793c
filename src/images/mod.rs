//! Image re-encoding on top of the `image` crate.

pub mod paths;

use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageFormat};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ImageError {
    #[error("Unsupported image format: {0}")]
    UnsupportedFormat(String),

    #[error("Invalid options: {0}")]
    InvalidOptions(String),

    #[error("Decode failed: {0}")]
    Decode(String),

    #[error("Encode failed: {0}")]
    Encode(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Webp,
    Jpeg,
    Png,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Webp => "webp",
            OutputFormat::Jpeg => "jpg",
            OutputFormat::Png => "png",
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            OutputFormat::Webp => "image/webp",
            OutputFormat::Jpeg => "image/jpeg",
            OutputFormat::Png => "image/png",
        }
    }

    /// Whether `quality` has any effect on the output
    pub fn is_lossy(self) -> bool {
        !matches!(self, OutputFormat::Png)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptimizeOptions {
    pub format: OutputFormat,
    /// 1..=100; PNG ignores it
    pub quality: u8,
    /// Downscale to this width, never upscale
    pub max_width: Option<u32>,
}

impl OptimizeOptions {
    fn validate(&self) -> Result<(), ImageError> {
        if !(1..=100).contains(&self.quality) {
            return Err(ImageError::InvalidOptions(format!("quality {} is outside 1..=100", self.quality)));
        }
        if self.max_width == Some(0) {
            return Err(ImageError::InvalidOptions("max width must be positive".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct ProcessedImage {
    pub bytes: Vec<u8>,
    pub format: OutputFormat,
    pub width: u32,
    pub height: u32,
    pub original_width: u32,
    pub original_height: u32,
    pub original_bytes: usize,
}

impl ProcessedImage {
    pub fn content_type(&self) -> &'static str {
        self.format.content_type()
    }

    pub fn sha256(&self) -> String {
        Sha256::digest(&self.bytes)
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect()
    }

    /// Output size relative to input, e.g. 0.35
    pub fn ratio(&self) -> f64 {
        if self.original_bytes == 0 {
            return 1.0;
        }
        self.bytes.len() as f64 / self.original_bytes as f64
    }
}

/// Content type sniffed from the bytes, for formats the decoder understands
pub fn sniff_content_type(bytes: &[u8]) -> Option<&'static str> {
    match image::guess_format(bytes).ok()? {
        ImageFormat::Jpeg => Some("image/jpeg"),
        ImageFormat::Png => Some("image/png"),
        ImageFormat::WebP => Some("image/webp"),
        _ => None,
    }
}

fn decode(bytes: &[u8]) -> Result<DynamicImage, ImageError> {
    if sniff_content_type(bytes).is_none() {
        return Err(ImageError::UnsupportedFormat("expected JPEG, PNG or WebP data".to_string()));
    }
    image::load_from_memory(bytes).map_err(|e| ImageError::Decode(e.to_string()))
}

fn encode(img: &DynamicImage, format: OutputFormat, quality: u8) -> Result<Vec<u8>, ImageError> {
    let mut buf = Cursor::new(Vec::new());
    let result = match format {
        // JPEG has no alpha channel
        OutputFormat::Jpeg => DynamicImage::ImageRgb8(img.to_rgb8())
            .write_with_encoder(JpegEncoder::new_with_quality(&mut buf, quality)),
        OutputFormat::Png => img.write_with_encoder(PngEncoder::new(&mut buf)),
        // libwebp, since the `image` crate only writes lossless WebP
        OutputFormat::Webp => {
            let rgba = img.to_rgba8();
            let encoded = webp::Encoder::from_rgba(rgba.as_raw(), rgba.width(), rgba.height())
                .encode(f32::from(quality));
            return Ok(encoded.to_vec());
        }
    };
    result.map_err(|e| ImageError::Encode(e.to_string()))?;
    Ok(buf.into_inner())
}

/// Scale down so that width <= max_width and height <= max_height, keeping aspect
fn fit_within(img: DynamicImage, max_width: u32, max_height: u32) -> DynamicImage {
    let (width, height) = img.dimensions();
    if width <= max_width && height <= max_height {
        return img;
    }
    img.resize(max_width, max_height, FilterType::Lanczos3)
}

pub fn optimize(bytes: &[u8], options: &OptimizeOptions) -> Result<ProcessedImage, ImageError> {
    options.validate()?;

    let img = decode(bytes)?;
    let (original_width, original_height) = img.dimensions();

    let img = match options.max_width {
        Some(max_width) => fit_within(img, max_width, u32::MAX),
        None => img,
    };
    let (width, height) = img.dimensions();
    let encoded = encode(&img, options.format, options.quality)?;

    tracing::debug!(
        "Optimized {}x{} -> {}x{} {:?} ({} -> {} bytes)",
        original_width,
        original_height,
        width,
        height,
        options.format,
        bytes.len(),
        encoded.len()
    );

    Ok(ProcessedImage {
        bytes: encoded,
        format: options.format,
        width,
        height,
        original_width,
        original_height,
        original_bytes: bytes.len(),
    })
}

/// PNG that fits in a `max_dimension` square, the input shape the n8n workflow expects
pub fn to_n8n_compatible(bytes: &[u8], max_dimension: u32) -> Result<ProcessedImage, ImageError> {
    if max_dimension == 0 {
        return Err(ImageError::InvalidOptions("max dimension must be positive".to_string()));
    }

    let img = decode(bytes)?;
    let (original_width, original_height) = img.dimensions();
    let img = fit_within(img, max_dimension, max_dimension);
    let (width, height) = img.dimensions();

    Ok(ProcessedImage {
        bytes: encode(&img, OutputFormat::Png, 100)?,
        format: OutputFormat::Png,
        width,
        height,
        original_width,
        original_height,
        original_bytes: bytes.len(),
    })
}
