//! In-memory blobs addressed by `blob:` object URLs, and `data:` URL encoding.
//!
//! Object URLs stay valid until revoked; the registry is the only owner of
//! the bytes behind them.

use std::collections::HashMap;

use base64::{engine::general_purpose::STANDARD, Engine};
use image::ImageFormat;
use log::debug;

use crate::detection::{FaceOverlayError, FaceOverlayResult};

const OBJECT_URL_PREFIX: &str = "blob:face-overlay/";

/// Binary payload with its MIME type and an optional file name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Blob {
    pub bytes: Vec<u8>,
    pub mime: String,
    pub name: Option<String>,
}

/// Reference to a blob held by a [`BlobRegistry`].
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ObjectUrl(String);

impl ObjectUrl {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ObjectUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Default)]
pub struct BlobRegistry {
    blobs: HashMap<ObjectUrl, Blob>,
    next_id: u64,
}

impl BlobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `blob` and returns a fresh URL for it.
    pub fn create_object_url(&mut self, blob: Blob) -> ObjectUrl {
        self.next_id += 1;
        let url = ObjectUrl(format!("{OBJECT_URL_PREFIX}{}", self.next_id));
        debug!("Created {url} ({} bytes)", blob.bytes.len());
        self.blobs.insert(url.clone(), blob);
        url
    }

    /// Releases the blob behind `url`. Revoking an unknown URL is a no-op.
    pub fn revoke_object_url(&mut self, url: &ObjectUrl) {
        if self.blobs.remove(url).is_some() {
            debug!("Revoked {url}");
        }
    }

    pub fn get(&self, url: &ObjectUrl) -> FaceOverlayResult<&Blob> {
        self.blobs
            .get(url)
            .ok_or_else(|| FaceOverlayError::UnknownObjectUrl(url.to_string()))
    }

    /// Number of URLs not yet revoked.
    pub fn live_count(&self) -> usize {
        self.blobs.len()
    }
}

/// MIME type of an encoded image, if it is one the image decoder understands.
pub fn image_mime(bytes: &[u8]) -> Option<&'static str> {
    match image::guess_format(bytes).ok()? {
        ImageFormat::Png => Some("image/png"),
        ImageFormat::Jpeg => Some("image/jpeg"),
        ImageFormat::Gif => Some("image/gif"),
        ImageFormat::WebP => Some("image/webp"),
        ImageFormat::Bmp => Some("image/bmp"),
        _ => None,
    }
}

/// Encodes bytes as a base64 `data:` URL.
pub fn to_data_url(mime: &str, bytes: &[u8]) -> String {
    format!("data:{mime};base64,{}", STANDARD.encode(bytes))
}

/// Decodes a base64 `data:` URL back into its bytes.
pub fn decode_data_url(url: &str) -> FaceOverlayResult<Vec<u8>> {
    let invalid = || FaceOverlayError::InvalidDataUrl(url.chars().take(32).collect());
    let rest = url.strip_prefix("data:").ok_or_else(invalid)?;
    let (header, payload) = rest.split_once(',').ok_or_else(invalid)?;
    if !header.ends_with(";base64") {
        return Err(invalid());
    }
    STANDARD.decode(payload).map_err(|_| invalid())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blob(bytes: &[u8]) -> Blob {
        Blob {
            bytes: bytes.to_vec(),
            mime: "image/jpeg".to_string(),
            name: None,
        }
    }

    #[test]
    fn urls_are_unique_and_revocable() {
        let mut registry = BlobRegistry::new();
        let first = registry.create_object_url(blob(b"a"));
        let second = registry.create_object_url(blob(b"b"));
        assert_ne!(first, second);
        assert!(first.as_str().starts_with("blob:"));
        assert_eq!(registry.live_count(), 2);

        registry.revoke_object_url(&first);
        assert_eq!(registry.live_count(), 1);
        assert!(registry.get(&first).is_err());
        assert_eq!(registry.get(&second).unwrap().bytes, b"b");

        registry.revoke_object_url(&first);
        assert_eq!(registry.live_count(), 1);
    }

    #[test]
    fn data_url_round_trip() {
        let url = to_data_url("image/png", &[1, 2, 3, 250]);
        assert!(url.starts_with("data:image/png;base64,"));
        assert_eq!(decode_data_url(&url).unwrap(), vec![1, 2, 3, 250]);
    }

    #[test]
    fn rejects_non_base64_data_urls() {
        assert!(decode_data_url("data:text/plain,hello").is_err());
        assert!(decode_data_url("blob:face-overlay/1").is_err());
    }

    #[test]
    fn recognizes_image_mimes() {
        assert_eq!(image_mime(&[0xFF, 0xD8, 0xFF, 0xE0]), Some("image/jpeg"));
        assert_eq!(image_mime(b"not an image"), None);
    }
}
