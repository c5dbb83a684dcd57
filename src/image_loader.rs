//! # Image Loading and Decoding
//!
//! Resolves image sources to bytes and decodes them to RGBA8 for the
//! rasterizer. Sources can be `data:` URIs, raw base64, file paths
//! (relative ones resolve against the configured asset directory), or
//! `http(s)` URLs when the `http` feature is on.
//!
//! [`AssetStore`] is the image readiness barrier: `load_all` settles every
//! source, success or failure, before anything is painted. A failed image
//! never fails the export; it becomes [`ImageSlot::Failed`] and paints as a
//! placeholder.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::LaminaError;

/// A decoded image ready for painting.
#[derive(Debug, Clone)]
pub struct LoadedImage {
    /// width * height * 4 bytes, non-premultiplied RGBA.
    pub rgba: Vec<u8>,
    pub width_px: u32,
    pub height_px: u32,
}

/// Fetches raw bytes for an image `src`.
pub trait ImageSource {
    fn fetch(&self, src: &str) -> Result<Vec<u8>, LaminaError>;
}

/// Data URIs, base64, files, and (with the `http` feature) remote URLs.
pub struct DefaultImageSource {
    asset_dir: Option<PathBuf>,
    timeout: Duration,
    #[cfg(all(feature = "http", not(target_arch = "wasm32")))]
    client: Option<reqwest::blocking::Client>,
}

impl DefaultImageSource {
    pub fn new(asset_dir: Option<PathBuf>, timeout_ms: u64) -> Self {
        let timeout = Duration::from_millis(timeout_ms);
        Self {
            asset_dir,
            timeout,
            #[cfg(all(feature = "http", not(target_arch = "wasm32")))]
            client: reqwest::blocking::Client::builder()
                .timeout(timeout)
                .build()
                .map_err(|e| log::warn!("HTTP client unavailable, remote images disabled: {}", e))
                .ok(),
        }
    }

    #[cfg(all(feature = "http", not(target_arch = "wasm32")))]
    fn fetch_remote(&self, url: &str) -> Result<Vec<u8>, LaminaError> {
        let client = self
            .client
            .as_ref()
            .ok_or_else(|| LaminaError::Image(format!("no HTTP client for '{url}'")))?;
        let response = client.get(url).send().map_err(|e| {
            if e.is_timeout() {
                LaminaError::Image(format!(
                    "'{}' timed out after {}ms",
                    url,
                    self.timeout.as_millis()
                ))
            } else {
                LaminaError::Image(format!("'{url}': {e}"))
            }
        })?;
        if !response.status().is_success() {
            return Err(LaminaError::Image(format!(
                "'{}' returned HTTP {}",
                url,
                response.status()
            )));
        }
        response
            .bytes()
            .map(|b| b.to_vec())
            .map_err(|e| LaminaError::Image(format!("'{url}': {e}")))
    }

    #[cfg(not(all(feature = "http", not(target_arch = "wasm32"))))]
    fn fetch_remote(&self, url: &str) -> Result<Vec<u8>, LaminaError> {
        Err(LaminaError::Image(format!(
            "remote image '{}' needs the http feature (timeout {}ms)",
            url,
            self.timeout.as_millis()
        )))
    }
}

impl ImageSource for DefaultImageSource {
    fn fetch(&self, src: &str) -> Result<Vec<u8>, LaminaError> {
        if src.starts_with("http://") || src.starts_with("https://") {
            return self.fetch_remote(src);
        }
        read_local_source(src, self.asset_dir.as_deref())
    }
}

/// Resolve a non-remote source string to raw bytes.
///
/// - `data:...;base64,...`: the decoded payload
/// - an absolute or `./`-style path, or a relative path that exists under
///   `base_dir`: the file contents
/// - anything else: raw base64
pub fn read_local_source(src: &str, base_dir: Option<&Path>) -> Result<Vec<u8>, LaminaError> {
    if let Some(rest) = src.strip_prefix("data:") {
        let (meta, payload) = rest
            .split_once(',')
            .ok_or_else(|| LaminaError::Image("invalid data URI: missing comma".to_string()))?;
        return if meta.ends_with(";base64") {
            base64_decode(payload)
        } else {
            Ok(payload.as_bytes().to_vec())
        };
    }

    if let Some(path) = resolve_path(src, base_dir) {
        #[cfg(not(target_arch = "wasm32"))]
        {
            return std::fs::read(&path)
                .map_err(|e| LaminaError::Image(format!("failed to read '{}': {}", path.display(), e)));
        }
        #[cfg(target_arch = "wasm32")]
        {
            return Err(LaminaError::Image(format!(
                "file path '{}' not supported in WASM, use a data URI",
                path.display()
            )));
        }
    }

    base64_decode(src)
}

/// Only explicit path prefixes, or relative paths that exist under the
/// asset dir, count as files. Base64 contains '/' too.
fn resolve_path(src: &str, base_dir: Option<&Path>) -> Option<PathBuf> {
    let explicit = src.starts_with('/') || src.starts_with("./") || src.starts_with("../");
    match base_dir {
        Some(dir) if !src.starts_with('/') => {
            let candidate = dir.join(src);
            (explicit || candidate.is_file()).then_some(candidate)
        }
        _ => explicit.then(|| PathBuf::from(src)),
    }
}

fn base64_decode(input: &str) -> Result<Vec<u8>, LaminaError> {
    use base64::Engine;
    let compact: String = input.chars().filter(|c| !c.is_whitespace()).collect();
    base64::engine::general_purpose::STANDARD
        .decode(compact)
        .map_err(|e| LaminaError::Image(format!("base64 decode error: {e}")))
}

/// Detect the format from magic bytes and decode to RGBA8.
pub fn decode_image_bytes(data: &[u8]) -> Result<LoadedImage, LaminaError> {
    if data.len() < 4 {
        return Err(LaminaError::Image("image data too short".to_string()));
    }
    if !(is_jpeg(data) || is_png(data) || is_webp(data)) {
        return Err(LaminaError::Image(
            "unsupported image format (expected JPEG, PNG or WebP)".to_string(),
        ));
    }

    let img = image::load_from_memory(data)
        .map_err(|e| LaminaError::Image(format!("failed to decode image: {e}")))?;
    let rgba = img.to_rgba8();
    Ok(LoadedImage {
        width_px: rgba.width(),
        height_px: rgba.height(),
        rgba: rgba.into_raw(),
    })
}

fn is_jpeg(data: &[u8]) -> bool {
    data.len() >= 2 && data[0] == 0xFF && data[1] == 0xD8
}

fn is_png(data: &[u8]) -> bool {
    data.len() >= 4 && data[0] == 0x89 && data[1] == 0x50 && data[2] == 0x4E && data[3] == 0x47
}

fn is_webp(data: &[u8]) -> bool {
    data.len() >= 12 && &data[0..4] == b"RIFF" && &data[8..12] == b"WEBP"
}

/// The settled state of one image source.
#[derive(Debug, Clone)]
pub enum ImageSlot {
    Ready(LoadedImage),
    Failed(String),
}

/// Decoded images keyed by their `src` string.
pub struct AssetStore {
    source: Box<dyn ImageSource>,
    slots: HashMap<String, ImageSlot>,
}

impl AssetStore {
    pub fn new(source: Box<dyn ImageSource>) -> Self {
        Self {
            source,
            slots: HashMap::new(),
        }
    }

    /// A store backed by [`DefaultImageSource`].
    pub fn with_defaults(asset_dir: Option<PathBuf>, timeout_ms: u64) -> Self {
        Self::new(Box::new(DefaultImageSource::new(asset_dir, timeout_ms)))
    }

    /// Load every source not already settled. Returns how many failed.
    pub fn load_all<'a>(&mut self, srcs: impl IntoIterator<Item = &'a str>) -> usize {
        let mut failed = 0;
        for src in srcs {
            if self.slots.contains_key(src) {
                continue;
            }
            let slot = match self.source.fetch(src).and_then(|b| decode_image_bytes(&b)) {
                Ok(img) => {
                    log::debug!("Loaded image {}x{} from {}", img.width_px, img.height_px, short(src));
                    ImageSlot::Ready(img)
                }
                Err(e) => {
                    log::warn!("Image {} unavailable, using placeholder: {}", short(src), e);
                    failed += 1;
                    ImageSlot::Failed(e.to_string())
                }
            };
            self.slots.insert(src.to_string(), slot);
        }
        failed
    }

    pub fn slot(&self, src: &str) -> Option<&ImageSlot> {
        self.slots.get(src)
    }

    /// The decoded image, if it loaded.
    pub fn image(&self, src: &str) -> Option<&LoadedImage> {
        match self.slots.get(src)? {
            ImageSlot::Ready(img) => Some(img),
            ImageSlot::Failed(_) => None,
        }
    }

    /// Intrinsic dimensions, if the image loaded.
    pub fn dimensions(&self, src: &str) -> Option<(u32, u32)> {
        self.image(src).map(|img| (img.width_px, img.height_px))
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn clear(&mut self) {
        self.slots.clear();
    }
}

/// Data URIs make for unreadable logs.
fn short(src: &str) -> String {
    if src.len() > 64 {
        let cut = (0..=48).rev().find(|i| src.is_char_boundary(*i)).unwrap_or(0);
        format!("{}…", &src[..cut])
    } else {
        src.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png_bytes(w: u32, h: u32) -> Vec<u8> {
        let img = image::RgbaImage::from_pixel(w, h, image::Rgba([255, 0, 0, 255]));
        let mut buf = Vec::new();
        let encoder = image::codecs::png::PngEncoder::new(&mut buf);
        image::ImageEncoder::write_image(encoder, img.as_raw(), w, h, image::ColorType::Rgba8)
            .unwrap();
        buf
    }

    fn data_uri(bytes: &[u8]) -> String {
        use base64::Engine;
        format!(
            "data:image/png;base64,{}",
            base64::engine::general_purpose::STANDARD.encode(bytes)
        )
    }

    #[test]
    fn test_magic_bytes() {
        assert!(is_jpeg(&[0xFF, 0xD8, 0xFF, 0xE0]));
        assert!(is_png(&[0x89, 0x50, 0x4E, 0x47]));
        assert!(!is_png(&[0xFF, 0xD8, 0xFF, 0xE0]));
        assert!(is_webp(b"RIFF\0\0\0\0WEBPVP8 "));
    }

    #[test]
    fn test_invalid_data_uri() {
        assert!(read_local_source("data:image/png;base64", None).is_err());
    }

    #[test]
    fn test_too_short_or_unknown_data() {
        assert!(decode_image_bytes(&[0x00, 0x01]).is_err());
        assert!(decode_image_bytes(&[0x00, 0x01, 0x02, 0x03, 0x04]).is_err());
    }

    #[test]
    fn test_decode_png_to_rgba() {
        let loaded = decode_image_bytes(&png_bytes(2, 3)).unwrap();
        assert_eq!((loaded.width_px, loaded.height_px), (2, 3));
        assert_eq!(loaded.rgba.len(), 2 * 3 * 4);
        assert_eq!(&loaded.rgba[0..4], &[255, 0, 0, 255]);
    }

    #[test]
    fn test_decode_jpeg() {
        let img = image::RgbImage::from_fn(2, 2, |_, _| image::Rgb([0, 128, 255]));
        let mut buf = Vec::new();
        let encoder = image::codecs::jpeg::JpegEncoder::new(&mut buf);
        image::ImageEncoder::write_image(encoder, img.as_raw(), 2, 2, image::ColorType::Rgb8)
            .unwrap();
        let loaded = decode_image_bytes(&buf).unwrap();
        assert_eq!((loaded.width_px, loaded.height_px), (2, 2));
    }

    #[test]
    fn test_store_records_failures_without_erroring() {
        let mut store = AssetStore::with_defaults(None, 1000);
        let good = data_uri(&png_bytes(4, 2));
        let failed = store.load_all([good.as_str(), "./missing/image.png"]);
        assert_eq!(failed, 1);
        assert_eq!(store.dimensions(&good), Some((4, 2)));
        assert!(matches!(
            store.slot("./missing/image.png"),
            Some(ImageSlot::Failed(_))
        ));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_store_skips_settled_sources() {
        let mut store = AssetStore::with_defaults(None, 1000);
        assert_eq!(store.load_all(["not-base64!"]), 1);
        assert_eq!(store.load_all(["not-base64!"]), 0);
    }

    #[test]
    fn test_relative_path_resolves_against_asset_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("micro.png"), png_bytes(3, 3)).unwrap();
        let mut store = AssetStore::with_defaults(Some(dir.path().to_path_buf()), 1000);
        assert_eq!(store.load_all(["micro.png"]), 0);
        assert_eq!(store.dimensions("micro.png"), Some((3, 3)));
    }

    struct Refusing;

    impl ImageSource for Refusing {
        fn fetch(&self, src: &str) -> Result<Vec<u8>, LaminaError> {
            Err(LaminaError::Image(format!("refused {src}")))
        }
    }

    #[test]
    fn test_custom_source() {
        let mut store = AssetStore::new(Box::new(Refusing));
        assert_eq!(store.load_all(["a", "b"]), 2);
        assert!(store.image("a").is_none());
    }
}
