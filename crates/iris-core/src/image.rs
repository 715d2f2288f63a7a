//! Image attachment and preview derivation.
//!
//! Any bytes are accepted here; validating type and size is the backend's
//! job. The preview is a base64 data URI, and pixel resolution is read from
//! the image header when the format is recognized.

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Pixel dimensions of a decoded image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// An image attached to the current session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachedImage {
    pub file_name: String,
    pub media_type: String,
    pub bytes: Vec<u8>,
    /// `data:<media type>;base64,<payload>`
    pub preview: String,
    pub resolution: Option<Resolution>,
}

impl AttachedImage {
    /// Build an attachment from raw bytes.
    ///
    /// When `media_type` is `None` it is guessed from the file extension.
    pub fn from_bytes(file_name: impl Into<String>, media_type: Option<&str>, bytes: Vec<u8>) -> Self {
        let file_name = file_name.into();
        let media_type = media_type
            .map(str::to_string)
            .unwrap_or_else(|| guess_media_type(&file_name));
        let preview = data_uri(&media_type, &bytes);
        let resolution = read_resolution(&bytes);

        if resolution.is_none() {
            log::debug!("Could not read image dimensions for {}", file_name);
        }

        Self {
            file_name,
            media_type,
            bytes,
            preview,
            resolution,
        }
    }

    /// Read an attachment from disk.
    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let bytes = std::fs::read(path)?;
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("image")
            .to_string();
        Ok(Self::from_bytes(file_name, None, bytes))
    }

    pub fn byte_size(&self) -> usize {
        self.bytes.len()
    }
}

fn guess_media_type(file_name: &str) -> String {
    mime_guess::from_path(file_name)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}

/// Encode bytes as a base64 data URI.
pub fn data_uri(media_type: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", media_type, BASE64_STANDARD.encode(bytes))
}

fn read_resolution(bytes: &[u8]) -> Option<Resolution> {
    let size = imagesize::blob_size(bytes).ok()?;
    Some(Resolution {
        width: u32::try_from(size.width).ok()?,
        height: u32::try_from(size.height).ok()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Minimal 3x2 PNG header (signature + IHDR), enough for size detection.
    fn png_header(width: u32, height: u32) -> Vec<u8> {
        let mut bytes = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
        bytes.extend_from_slice(&13u32.to_be_bytes());
        bytes.extend_from_slice(b"IHDR");
        bytes.extend_from_slice(&width.to_be_bytes());
        bytes.extend_from_slice(&height.to_be_bytes());
        bytes.extend_from_slice(&[8, 6, 0, 0, 0]);
        bytes.extend_from_slice(&[0, 0, 0, 0]);
        bytes
    }

    #[test]
    fn preview_is_a_data_uri() {
        let image = AttachedImage::from_bytes("a.png", Some("image/png"), vec![1, 2, 3]);
        assert_eq!(image.preview, "data:image/png;base64,AQID");
        assert_eq!(image.byte_size(), 3);
    }

    #[test]
    fn media_type_guessed_from_extension() {
        let image = AttachedImage::from_bytes("photo.jpg", None, vec![0]);
        assert_eq!(image.media_type, "image/jpeg");
    }

    #[test]
    fn unknown_extension_falls_back_to_octet_stream() {
        let image = AttachedImage::from_bytes("blob", None, vec![0]);
        assert_eq!(image.media_type, "application/octet-stream");
    }

    #[test]
    fn resolution_read_from_png_header() {
        let image = AttachedImage::from_bytes("a.png", None, png_header(3, 2));
        assert_eq!(image.resolution, Some(Resolution { width: 3, height: 2 }));
    }

    #[test]
    fn garbage_bytes_have_no_resolution() {
        let image = AttachedImage::from_bytes("a.png", None, b"not an image".to_vec());
        assert!(image.resolution.is_none());
    }

    #[test]
    fn from_path_reads_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chart.png");
        std::fs::write(&path, png_header(10, 20)).unwrap();

        let image = AttachedImage::from_path(&path).unwrap();
        assert_eq!(image.file_name, "chart.png");
        assert_eq!(image.resolution.unwrap().to_string(), "10x20");
    }
}
