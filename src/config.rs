//! Export configuration.
//!
//! Everything about how a report is paged and captured lives here, read once
//! and shared by preview and export: the page geometry, the letterhead, fonts,
//! image loading and the capture settings. Every field has a default, so `{}`
//! is a valid configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::LaminaError;
use crate::flow::{FlowOptions, PageGeometry};
use crate::font::FontEntry;
use crate::model::Metadata;
use crate::normalize::{Labels, NormalizeOptions};

const DEFAULT_HEADER: &str = r#"<div class="letterhead" style="border-bottom: 1px solid #555; padding: 6px 0">
<p style="margin:0; font-size: 1.3em; font-weight: bold">Pathology Laboratory</p>
<p style="margin:0">{branch}</p>
</div>"#;

const DEFAULT_FOOTER: &str = r#"<div class="letterhead" style="border-top: 1px solid #999; padding-top: 4px">
<p style="margin:0; text-align: right">Folio {folio} | Page {page} of {pages}</p>
<p style="margin:0">{user}</p>
</div>"#;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExportConfig {
    pub geometry: PageGeometry,
    /// Capture scale. 2.0 doubles the pixel density of every page.
    pub device_pixel_ratio: f64,
    pub jpeg_quality: u8,
    /// Name of the downloaded file.
    pub filename: String,

    pub fonts: Vec<FontEntry>,
    pub default_font_family: String,
    pub base_font_size: f64,
    /// Appended after the report stylesheet.
    pub extra_css: Option<String>,

    /// Letterhead fragments. `{page}`, `{pages}`, `{branch}`, `{user}` and
    /// `{folio}` are substituted per page.
    pub header_html: String,
    pub footer_html: String,

    /// Base directory for relative image and font paths.
    pub asset_dir: Option<PathBuf>,
    pub image_timeout_ms: u64,

    pub flow: FlowOptions,
    pub labels: Labels,
    pub thumbnail_height_px: f64,
    pub prefer_thumbnails: bool,

    pub metadata: Metadata,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            geometry: PageGeometry::default(),
            device_pixel_ratio: 2.0,
            jpeg_quality: 92,
            filename: "report.pdf".to_string(),
            fonts: Vec::new(),
            default_font_family: "Helvetica".to_string(),
            base_font_size: 14.0,
            extra_css: None,
            header_html: DEFAULT_HEADER.to_string(),
            footer_html: DEFAULT_FOOTER.to_string(),
            asset_dir: None,
            image_timeout_ms: 10_000,
            flow: FlowOptions::default(),
            labels: Labels::default(),
            thumbnail_height_px: 170.0,
            prefer_thumbnails: true,
            metadata: Metadata::default(),
        }
    }
}

impl ExportConfig {
    pub fn from_json(json: &str) -> Result<Self, LaminaError> {
        serde_json::from_str(json).map_err(|e| LaminaError::parse("configuration", e))
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, LaminaError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn normalize_options(&self) -> NormalizeOptions {
        NormalizeOptions {
            labels: self.labels.clone(),
            thumbnail_height_px: self.thumbnail_height_px,
            prefer_thumbnails: self.prefer_thumbnails,
        }
    }
}
