use image::{DynamicImage, ImageFormat};
use thiserror::Error;

/// Reasons an upload is rejected before detection
///
/// All variants are user-correctable and surfaced verbatim.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IngestError {
    #[error("Invalid image: the uploaded file is empty")]
    Empty,

    #[error("Invalid image: unsupported media type '{0}' (expected png, jpeg or webp)")]
    UnsupportedType(String),

    #[error("Invalid image: declared as {declared} but the content is {actual}")]
    TypeMismatch { declared: String, actual: String },

    #[error("Invalid image: could not decode {format} data: {reason}")]
    Decode { format: String, reason: String },
}

impl IngestError {
    pub fn suggestion(&self) -> &'static str {
        "Upload a non-empty PNG, JPEG or WebP photo of a landmark."
    }
}

/// A validated upload, decoded once and kept for the rest of the request
#[derive(Debug, Clone)]
pub struct UploadedImage {
    bytes: Vec<u8>,
    format: ImageFormat,
    bitmap: DynamicImage,
}

impl UploadedImage {
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn format(&self) -> ImageFormat {
        self.format
    }

    pub fn media_type(&self) -> &'static str {
        media_type(self.format)
    }

    pub fn bitmap(&self) -> &DynamicImage {
        &self.bitmap
    }

    pub fn width(&self) -> u32 {
        self.bitmap.width()
    }

    pub fn height(&self) -> u32 {
        self.bitmap.height()
    }
}

/// Formats accepted at the upload boundary
pub const SUPPORTED_FORMATS: [ImageFormat; 3] = [ImageFormat::Png, ImageFormat::Jpeg, ImageFormat::WebP];

/// Map a declared media type (or bare extension) to a supported format
///
/// Parameters such as `; charset=...` are ignored.
pub fn parse_declared_type(declared: &str) -> Option<ImageFormat> {
    let essence = declared.split(';').next().unwrap_or("").trim().to_ascii_lowercase();

    match essence.as_str() {
        "image/png" | "png" => Some(ImageFormat::Png),
        "image/jpeg" | "image/jpg" | "image/pjpeg" | "jpeg" | "jpg" => Some(ImageFormat::Jpeg),
        "image/webp" | "webp" => Some(ImageFormat::WebP),
        _ => None,
    }
}

pub fn media_type(format: ImageFormat) -> &'static str {
    match format {
        ImageFormat::Png => "image/png",
        ImageFormat::Jpeg => "image/jpeg",
        ImageFormat::WebP => "image/webp",
        _ => "application/octet-stream",
    }
}

fn format_name(format: ImageFormat) -> String {
    format!("{:?}", format).to_ascii_uppercase()
}

/// Validate and decode an uploaded image
pub fn ingest(raw: Vec<u8>, declared_type: &str) -> Result<UploadedImage, IngestError> {
    if raw.is_empty() {
        return Err(IngestError::Empty);
    }

    let declared = parse_declared_type(declared_type)
        .ok_or_else(|| IngestError::UnsupportedType(declared_type.trim().to_string()))?;

    // Sniff the real format so a mislabelled upload fails here, not at the vision service
    if let Ok(actual) = image::guess_format(&raw) {
        if actual != declared {
            return Err(IngestError::TypeMismatch {
                declared: format_name(declared),
                actual: format_name(actual),
            });
        }
    }

    let bitmap = image::load_from_memory_with_format(&raw, declared).map_err(|e| IngestError::Decode {
        format: format_name(declared),
        reason: e.to_string(),
    })?;

    tracing::debug!(
        "Ingested {} image: {}x{} ({} bytes)",
        format_name(declared),
        bitmap.width(),
        bitmap.height(),
        raw.len()
    );

    Ok(UploadedImage {
        bytes: raw,
        format: declared,
        bitmap,
    })
}
