use std::io::Cursor;
use std::sync::Arc;

use base64::{engine::general_purpose, Engine as _};
use image::ImageReader;

use crate::llm::media::detect_mime_type;

const ACCEPTED_MIME_TYPES: [&str; 3] = ["image/jpeg", "image/png", "image/webp"];

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum UploadError {
    #[error("Please send a PNG, JPG, or WEBP image.")]
    NotAnImage,
    #[error("The image is too large ({size} bytes, limit {limit}).")]
    TooLarge { size: usize, limit: usize },
    #[error("The image could not be read. Please try another file.")]
    Undecodable,
}

/// Image bytes ready to travel over the wire, shared by uploads and AI edits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhotoPayload {
    bytes: Arc<[u8]>,
    mime_type: String,
    base64: String,
}

impl PhotoPayload {
    pub fn new(bytes: Vec<u8>, mime_type: impl Into<String>) -> Self {
        let base64 = general_purpose::STANDARD.encode(&bytes);
        Self {
            bytes: bytes.into(),
            mime_type: mime_type.into(),
            base64,
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn base64(&self) -> &str {
        &self.base64
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedImage {
    pub file_name: Option<String>,
    pub payload: PhotoPayload,
    pub width: u32,
    pub height: u32,
}

impl UploadedImage {
    /// Sniffs the real format from the bytes; the declared MIME type is only a
    /// fallback for files `infer` cannot classify.
    pub fn from_bytes(
        bytes: Vec<u8>,
        declared_mime: Option<&str>,
        file_name: Option<String>,
        max_bytes: usize,
    ) -> Result<Self, UploadError> {
        if bytes.is_empty() {
            return Err(UploadError::Undecodable);
        }
        if bytes.len() > max_bytes {
            return Err(UploadError::TooLarge {
                size: bytes.len(),
                limit: max_bytes,
            });
        }

        let mime_type = detect_mime_type(&bytes)
            .or_else(|| declared_mime.map(|value| value.trim().to_ascii_lowercase()))
            .map(|value| normalize_mime(&value))
            .ok_or(UploadError::NotAnImage)?;
        if !ACCEPTED_MIME_TYPES.contains(&mime_type.as_str()) {
            return Err(UploadError::NotAnImage);
        }

        let (width, height) = ImageReader::new(Cursor::new(bytes.as_slice()))
            .with_guessed_format()
            .map_err(|_| UploadError::Undecodable)?
            .into_dimensions()
            .map_err(|_| UploadError::Undecodable)?;

        Ok(Self {
            file_name,
            payload: PhotoPayload::new(bytes, mime_type),
            width,
            height,
        })
    }
}

fn normalize_mime(value: &str) -> String {
    match value {
        "image/jpg" | "image/pjpeg" => "image/jpeg".to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// A real 2x3 PNG built with the `image` encoder.
    pub(crate) fn sample_png() -> Vec<u8> {
        let buffer = image::RgbImage::from_pixel(2, 3, image::Rgb([240, 240, 240]));
        let mut out = Cursor::new(Vec::new());
        buffer
            .write_to(&mut out, image::ImageFormat::Png)
            .expect("encode png");
        out.into_inner()
    }

    #[test]
    fn accepts_png_and_reads_dimensions() {
        let upload =
            UploadedImage::from_bytes(sample_png(), None, Some("me.png".into()), 1 << 20)
                .expect("png accepted");
        assert_eq!(upload.payload.mime_type(), "image/png");
        assert_eq!((upload.width, upload.height), (2, 3));
        assert_eq!(
            general_purpose::STANDARD
                .decode(upload.payload.base64())
                .unwrap(),
            upload.payload.bytes()
        );
    }

    #[test]
    fn sniffed_type_wins_over_declared_type() {
        let upload =
            UploadedImage::from_bytes(sample_png(), Some("image/jpeg"), None, 1 << 20).unwrap();
        assert_eq!(upload.payload.mime_type(), "image/png");
    }

    #[test]
    fn rejects_non_images() {
        let pdf = b"%PDF-1.4\n%some document body".to_vec();
        assert_eq!(
            UploadedImage::from_bytes(pdf, Some("application/pdf"), None, 1 << 20),
            Err(UploadError::NotAnImage)
        );
    }

    #[test]
    fn rejects_oversized_files() {
        let bytes = sample_png();
        let size = bytes.len();
        assert_eq!(
            UploadedImage::from_bytes(bytes, None, None, 8),
            Err(UploadError::TooLarge { size, limit: 8 })
        );
    }

    #[test]
    fn rejects_truncated_image_data() {
        let mut bytes = sample_png();
        bytes.truncate(20);
        assert_eq!(
            UploadedImage::from_bytes(bytes, None, None, 1 << 20),
            Err(UploadError::Undecodable)
        );
    }
}
