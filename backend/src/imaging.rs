use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView};
use sha2::{Digest, Sha256};

pub const MAX_DIMENSION: u32 = 640;
pub const JPEG_QUALITY: u8 = 80;
pub const JPEG_MIME: &str = "image/jpeg";

#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    #[error("Image data is empty")]
    Empty,
    #[error("Image payload of {size} bytes exceeds the {limit} byte limit")]
    TooLarge { size: usize, limit: usize },
    #[error("Image data is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("Image could not be decoded: {0}")]
    Decode(#[source] image::ImageError),
    #[error("Image could not be re-encoded: {0}")]
    Encode(#[source] image::ImageError),
}

/// Request-scoped image after downsampling, in every encoding the adapters need.
#[derive(Debug, Clone)]
pub struct NormalizedImage {
    pub jpeg: Vec<u8>,
    pub base64: String,
    pub data_uri: String,
    pub width: u32,
    pub height: u32,
    pub digest: String,
}

impl NormalizedImage {
    pub fn mime_type(&self) -> &'static str {
        JPEG_MIME
    }
}

/// Removes an optional `data:<mime>;base64,` header and any embedded whitespace.
pub fn strip_data_uri(payload: &str) -> String {
    let trimmed = payload.trim();
    let body = match trimmed.split_once(',') {
        Some((header, body)) if header.starts_with("data:") || header.ends_with(";base64") => body,
        _ => trimmed,
    };
    body.chars().filter(|c| !c.is_whitespace()).collect()
}

pub fn normalize(payload: &str, max_bytes: usize) -> Result<NormalizedImage, ImageError> {
    let encoded = strip_data_uri(payload);
    if encoded.is_empty() {
        return Err(ImageError::Empty);
    }
    // base64 inflates by 4/3; reject before allocating the decoded buffer
    let estimated = encoded.len() / 4 * 3;
    if estimated > max_bytes {
        return Err(ImageError::TooLarge {
            size: estimated,
            limit: max_bytes,
        });
    }

    let raw = BASE64.decode(encoded.as_bytes())?;
    if raw.is_empty() {
        return Err(ImageError::Empty);
    }

    let decoded = image::load_from_memory(&raw).map_err(ImageError::Decode)?;
    let resized = bound_dimensions(decoded);
    let (width, height) = resized.dimensions();

    let mut jpeg = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut jpeg, JPEG_QUALITY);
    DynamicImage::ImageRgb8(resized.to_rgb8())
        .write_with_encoder(encoder)
        .map_err(ImageError::Encode)?;

    let base64 = BASE64.encode(&jpeg);
    let data_uri = format!("data:{};base64,{}", JPEG_MIME, base64);
    let digest = calculate_image_hash(&jpeg);

    log::debug!(
        "Normalized image {}x{} ({} bytes in, {} bytes out, sha256 {})",
        width,
        height,
        raw.len(),
        jpeg.len(),
        digest
    );

    Ok(NormalizedImage {
        jpeg,
        base64,
        data_uri,
        width,
        height,
        digest,
    })
}

fn bound_dimensions(image: DynamicImage) -> DynamicImage {
    let (width, height) = image.dimensions();
    if width <= MAX_DIMENSION && height <= MAX_DIMENSION {
        return image;
    }
    image.resize(MAX_DIMENSION, MAX_DIMENSION, FilterType::Triangle)
}

pub fn calculate_image_hash(image_data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(image_data);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use image::{ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;

    pub(crate) fn png_base64(width: u32, height: u32) -> String {
        let img = RgbImage::from_fn(width, height, |x, y| Rgb([(x % 256) as u8, (y % 256) as u8, 128]));
        let mut bytes = Vec::new();
        DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        BASE64.encode(bytes)
    }

    const LIMIT: usize = 20 * 1024 * 1024;

    #[test]
    fn large_image_is_downsampled_preserving_aspect() {
        let payload = format!("data:image/png;base64,{}", png_base64(1280, 960));
        let image = normalize(&payload, LIMIT).unwrap();
        assert_eq!((image.width, image.height), (640, 480));
        assert!(image.data_uri.starts_with("data:image/jpeg;base64,"));
        assert!(image.data_uri.ends_with(&image.base64));
        assert_eq!(image.digest, calculate_image_hash(&image.jpeg));
        assert_eq!(
            image::guess_format(&image.jpeg).unwrap(),
            ImageFormat::Jpeg
        );
    }

    #[test]
    fn tall_image_bounds_height() {
        let image = normalize(&png_base64(300, 1200), LIMIT).unwrap();
        assert_eq!(image.height, 640);
        assert_eq!(image.width, 160);
    }

    #[test]
    fn small_image_is_not_upscaled() {
        let image = normalize(&png_base64(120, 80), LIMIT).unwrap();
        assert_eq!((image.width, image.height), (120, 80));
    }

    #[test]
    fn raw_base64_without_prefix_is_accepted() {
        assert!(normalize(&png_base64(16, 16), LIMIT).is_ok());
    }

    #[test]
    fn empty_payloads_are_rejected() {
        assert!(matches!(normalize("", LIMIT), Err(ImageError::Empty)));
        assert!(matches!(normalize("data:image/png;base64,", LIMIT), Err(ImageError::Empty)));
    }

    #[test]
    fn invalid_payloads_are_rejected() {
        assert!(matches!(normalize("***not base64***", LIMIT), Err(ImageError::Base64(_))));
        let not_an_image = BASE64.encode(b"hello world, definitely not pixels");
        assert!(matches!(normalize(&not_an_image, LIMIT), Err(ImageError::Decode(_))));
    }

    #[test]
    fn oversized_payload_is_rejected() {
        let payload = png_base64(64, 64);
        assert!(matches!(normalize(&payload, 16), Err(ImageError::TooLarge { .. })));
    }

    #[test]
    fn strip_handles_prefix_and_whitespace() {
        assert_eq!(strip_data_uri("data:image/jpeg;base64,QUJD\nREVG"), "QUJDREVG");
        assert_eq!(strip_data_uri("  QUJD  "), "QUJD");
    }
}
