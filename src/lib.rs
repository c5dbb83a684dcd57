//! # Lamina
//!
//! Page-flow pagination and raster PDF export for pathology reports.
//!
//! A report is not laid out on an endless canvas and cut afterwards. Its
//! content flows *into* fixed Letter pages: every block is measured against
//! the page body it would land in, and anything that does not fit is moved
//! to a new page or split between pages. The composed pages are then
//! captured as bitmaps and bound into a PDF, so what was previewed is
//! exactly what gets downloaded.
//!
//! ## Architecture
//!
//! ```text
//! ReportDocument (JSON/API)
//!       ↓
//!   [normalize] – ordered content tree, gated by report type
//!       ↓
//!   [flow]      – greedy first-fit into page bodies, measured by [layout]
//!       ↓
//!   [export]    – images settle, each page is laid out and rasterized
//!       ↓
//!   [pdf]       – one full-bleed JPEG per page
//! ```

pub mod config;
pub mod dom;
pub mod error;
pub mod export;
pub mod flow;
pub mod font;
pub mod image_loader;
pub mod layout;
pub mod model;
pub mod normalize;
pub mod pdf;
pub mod preview;
pub mod raster;
pub mod style;
pub mod text;

#[cfg(feature = "wasm")]
pub mod wasm;

pub use config::ExportConfig;
pub use error::LaminaError;
pub use export::ExportedDocument;
pub use model::{ReportDocument, ReportType, SessionContext};
pub use preview::ReportPreview;

/// Page and export a report in one call.
///
/// `Ok(None)` only if pagination produced no pages, which a report never
/// does: an empty report still fills one page.
pub fn render_report(
    report: &ReportDocument,
    config: ExportConfig,
    session: SessionContext,
) -> Result<Option<ExportedDocument>, LaminaError> {
    let mut preview = ReportPreview::new(config, session);
    preview.refresh(report);
    preview.export()
}

/// Parse a report from JSON, then [`render_report`] it.
pub fn render_report_json(
    json: &str,
    config: ExportConfig,
    session: SessionContext,
) -> Result<Option<ExportedDocument>, LaminaError> {
    let report = parse_report(json)?;
    render_report(&report, config, session)
}

pub fn parse_report(json: &str) -> Result<ReportDocument, LaminaError> {
    serde_json::from_str(json).map_err(|e| LaminaError::parse("report", e))
}
