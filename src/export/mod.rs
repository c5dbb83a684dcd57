//! # Rasterize-and-Paginate Exporter
//!
//! Captures every composed page as a bitmap and wraps the bitmaps in a PDF,
//! one Letter page each, full-bleed. The stages are sequential barriers:
//!
//! 1. fonts are already loaded (a [`FontContext`] only exists loaded)
//! 2. every image on every page settles, to pixels or to a failure
//! 3. each page is laid out and rasterized, in order
//! 4. the bitmaps become PDF pages
//!
//! A failed image is not an error: the page renders a placeholder. A failed
//! page capture is: it aborts the export and no document comes out.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use crate::config::ExportConfig;
use crate::error::LaminaError;
use crate::flow::{PageContainer, PageGeometry};
use crate::font::FontContext;
use crate::image_loader::AssetStore;
use crate::layout::LayoutEngine;
use crate::model::Metadata;
use crate::pdf::PdfWriter;
use crate::raster::Rasterizer;
use crate::style::Stylesheet;

/// The finished download.
#[derive(Debug, Clone)]
pub struct ExportedDocument {
    pub filename: String,
    pub bytes: Vec<u8>,
    pub page_count: usize,
}

impl ExportedDocument {
    /// Write the file into `dir` under its fixed name.
    pub fn save_in(&self, dir: impl AsRef<Path>) -> Result<PathBuf, LaminaError> {
        let path = dir.as_ref().join(&self.filename);
        std::fs::write(&path, &self.bytes)?;
        log::info!("Saved {} ({} bytes)", path.display(), self.bytes.len());
        Ok(path)
    }
}

pub struct Exporter<'a> {
    fonts: &'a FontContext,
    styles: &'a Stylesheet,
    geometry: PageGeometry,
    device_pixel_ratio: f64,
    jpeg_quality: u8,
    filename: String,
    metadata: Metadata,
    in_flight: AtomicBool,
}

/// Clears the in-flight flag however the export ends.
struct InFlight<'g>(&'g AtomicBool);

impl<'g> InFlight<'g> {
    fn acquire(flag: &'g AtomicBool) -> Result<Self, LaminaError> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| LaminaError::ExportInProgress)?;
        Ok(Self(flag))
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl<'a> Exporter<'a> {
    pub fn new(fonts: &'a FontContext, styles: &'a Stylesheet, config: &ExportConfig) -> Self {
        Self {
            fonts,
            styles,
            geometry: config.geometry,
            device_pixel_ratio: config.device_pixel_ratio,
            jpeg_quality: config.jpeg_quality,
            filename: config.filename.clone(),
            metadata: config.metadata.clone(),
            in_flight: AtomicBool::new(false),
        }
    }

    /// Replace the Info dictionary fields taken from the configuration.
    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Export `pages`. `Ok(None)` when there is nothing to export.
    pub fn export(
        &self,
        pages: &[PageContainer],
        assets: &mut AssetStore,
    ) -> Result<Option<ExportedDocument>, LaminaError> {
        let _guard = InFlight::acquire(&self.in_flight)?;
        if pages.is_empty() {
            log::info!("No pages to export");
            return Ok(None);
        }

        let mut srcs = Vec::new();
        for page in pages {
            for node in page.header.iter().chain(&page.body).chain(&page.footer) {
                node.image_sources(&mut srcs);
            }
        }
        let failed = assets.load_all(srcs.iter().map(String::as_str));
        if failed > 0 {
            log::warn!("{} of {} images will render as placeholders", failed, srcs.len());
        }

        let assets: &AssetStore = assets;
        let engine = LayoutEngine::new(self.fonts, self.styles, assets);
        let rasterizer = Rasterizer::new(self.fonts, assets, self.device_pixel_ratio, self.jpeg_quality);
        let mut rendered = Vec::with_capacity(pages.len());
        for page in pages {
            let layout = engine.layout_page(page, &self.geometry);
            let bitmap = rasterizer.rasterize(page.index, &layout)?;
            log::debug!(
                "Captured page {} at {}x{} ({} bytes)",
                page.index + 1,
                bitmap.width_px,
                bitmap.height_px,
                bitmap.jpeg.len()
            );
            rendered.push(bitmap);
        }

        let bytes = PdfWriter::new().write(
            &rendered,
            &self.metadata,
            self.geometry.page_width_pt(),
            self.geometry.page_height_pt(),
        );
        log::info!("Exported {} pages, {} bytes", rendered.len(), bytes.len());
        Ok(Some(ExportedDocument {
            filename: self.filename.clone(),
            bytes,
            page_count: rendered.len(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::html::parse_fragment;
    use crate::image_loader::ImageSource;
    use std::time::Duration;

    struct SlowMissing(Duration);

    impl ImageSource for SlowMissing {
        fn fetch(&self, src: &str) -> Result<Vec<u8>, LaminaError> {
            std::thread::sleep(self.0);
            Err(LaminaError::Image(format!("{src} not found")))
        }
    }

    fn container(index: usize, html: &str) -> PageContainer {
        PageContainer {
            index,
            header: parse_fragment("<p>Lab</p>"),
            body: parse_fragment(html),
            footer: vec![],
        }
    }

    fn small_config() -> ExportConfig {
        ExportConfig {
            device_pixel_ratio: 0.5,
            ..Default::default()
        }
    }

    #[test]
    fn empty_page_list_exports_nothing() {
        let fonts = FontContext::new();
        let styles = Stylesheet::new("Helvetica", 14.0, None);
        let exporter = Exporter::new(&fonts, &styles, &small_config());
        let mut assets = AssetStore::with_defaults(None, 1000);
        assert!(exporter.export(&[], &mut assets).unwrap().is_none());
    }

    #[test]
    fn one_pdf_page_per_container() {
        let fonts = FontContext::new();
        let styles = Stylesheet::new("Helvetica", 14.0, None);
        let exporter = Exporter::new(&fonts, &styles, &small_config());
        let mut assets = AssetStore::with_defaults(None, 1000);
        let pages = vec![container(0, "<p>uno</p>"), container(1, "<p>dos</p>")];
        let doc = exporter.export(&pages, &mut assets).unwrap().unwrap();
        assert_eq!(doc.page_count, 2);
        assert_eq!(doc.filename, "report.pdf");
        assert!(doc.bytes.starts_with(b"%PDF-1.7"));
        assert!(String::from_utf8_lossy(&doc.bytes).contains("/Count 2"));
    }

    #[test]
    fn broken_image_does_not_fail_export() {
        let fonts = FontContext::new();
        let styles = Stylesheet::new("Helvetica", 14.0, None);
        let exporter = Exporter::new(&fonts, &styles, &small_config());
        let mut assets = AssetStore::new(Box::new(SlowMissing(Duration::ZERO)));
        let pages = vec![container(0, r#"<img src="https://lab.invalid/x.jpg">"#)];
        let doc = exporter.export(&pages, &mut assets).unwrap().unwrap();
        assert_eq!(doc.page_count, 1);
        assert_eq!(assets.len(), 1);
    }

    #[test]
    fn concurrent_export_is_rejected() {
        let fonts = FontContext::new();
        let styles = Stylesheet::new("Helvetica", 14.0, None);
        let exporter = Exporter::new(&fonts, &styles, &small_config());
        let pages = vec![container(0, r#"<img src="slow.png">"#)];

        std::thread::scope(|s| {
            let first = s.spawn(|| {
                let mut assets = AssetStore::new(Box::new(SlowMissing(Duration::from_millis(400))));
                exporter.export(&pages, &mut assets)
            });
            std::thread::sleep(Duration::from_millis(100));
            let mut assets = AssetStore::with_defaults(None, 1000);
            let second = exporter.export(&pages, &mut assets);
            assert!(matches!(second, Err(LaminaError::ExportInProgress)));
            assert!(first.join().unwrap().unwrap().is_some());
        });

        // The guard is released once the first export finishes.
        let mut assets = AssetStore::with_defaults(None, 1000);
        assert!(exporter.export(&pages, &mut assets).is_ok());
    }

    #[test]
    fn raster_failure_names_the_page() {
        let fonts = FontContext::new();
        let styles = Stylesheet::new("Helvetica", 14.0, None);
        let mut config = small_config();
        config.geometry.page_height_mm = 0.0;
        let exporter = Exporter::new(&fonts, &styles, &config);
        let mut assets = AssetStore::with_defaults(None, 1000);
        let err = exporter
            .export(&[container(0, "<p>x</p>")], &mut assets)
            .unwrap_err();
        assert!(matches!(err, LaminaError::Raster { page: 0, .. }));
    }

    #[test]
    fn saves_under_fixed_filename() {
        let dir = tempfile::tempdir().unwrap();
        let doc = ExportedDocument {
            filename: "report.pdf".to_string(),
            bytes: b"%PDF-1.7".to_vec(),
            page_count: 1,
        };
        let path = doc.save_in(dir.path()).unwrap();
        assert_eq!(path, dir.path().join("report.pdf"));
        assert_eq!(std::fs::read(path).unwrap(), b"%PDF-1.7");
    }
}
