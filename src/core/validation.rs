// Field-level validation for user-submitted forms

use base64::Engine;
use image::{GenericImageView, ImageFormat};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::error::{AppError, AppResult};

pub const REQUIRED_MESSAGE: &str = "This field is required.";
pub const INVALID_IMAGE_MESSAGE: &str =
    "Upload a valid image. The file you uploaded was either not an image or a corrupted image.";

static USERNAME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[\w.@+-]{1,150}$").unwrap());
static SLUG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[-a-zA-Z0-9_]{1,100}$").unwrap());

/// Strip surrounding whitespace and reject an empty result
pub fn clean_text(field: &str, value: &str) -> AppResult<String> {
    let text = value.trim();
    if text.is_empty() {
        return Err(AppError::field(field, REQUIRED_MESSAGE));
    }
    Ok(text.to_string())
}

pub fn validate_username(username: &str) -> AppResult<()> {
    if USERNAME_RE.is_match(username) {
        Ok(())
    } else {
        Err(AppError::field(
            "username",
            "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.",
        ))
    }
}

pub fn validate_slug(slug: &str) -> AppResult<()> {
    if SLUG_RE.is_match(slug) {
        Ok(())
    } else {
        Err(AppError::field(
            "slug",
            "Enter a valid slug consisting of letters, numbers, underscores or hyphens.",
        ))
    }
}

/// Formats accepted for post images, with the extension they are stored under
fn stored_extension(format: ImageFormat) -> Option<&'static str> {
    match format {
        ImageFormat::Png => Some("png"),
        ImageFormat::Jpeg => Some("jpg"),
        ImageFormat::Gif => Some("gif"),
        ImageFormat::WebP => Some("webp"),
        ImageFormat::Bmp => Some("bmp"),
        _ => None,
    }
}

/// An upload that decoded fully as one of the accepted image formats
#[derive(Debug, Clone)]
pub struct ValidImage {
    pub format: ImageFormat,
    pub extension: &'static str,
    pub bytes: Vec<u8>,
}

/// Decode a base64 upload and check it is a complete, readable image.
///
/// CPU-bound; call from async code through `spawn_blocking`.
pub fn clean_image(encoded: &str) -> AppResult<ValidImage> {
    let invalid = || AppError::field("image", INVALID_IMAGE_MESSAGE);

    let bytes = base64::engine::general_purpose::STANDARD
        .decode(encoded.trim())
        .map_err(|_| invalid())?;

    let format = image::guess_format(&bytes).map_err(|_| invalid())?;
    let extension = stored_extension(format).ok_or_else(invalid)?;

    let decoded = image::load_from_memory_with_format(&bytes, format).map_err(|e| {
        debug!("Rejected {:?} upload: {}", format, e);
        invalid()
    })?;
    let (width, height) = decoded.dimensions();
    debug!(width, height, "Accepted {:?} upload", format);

    Ok(ValidImage {
        format,
        extension,
        bytes,
    })
}
