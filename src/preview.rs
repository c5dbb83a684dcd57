//! # Report Preview
//!
//! The live page list for a report being edited. Every change to the report
//! data re-runs the whole chain: normalize, load images, flow, paginate.
//! Nothing is patched in place; the previous pages are thrown away first.
//!
//! Fonts load once, when the preview is created. Images are cached across
//! refreshes by `src`, so re-paging after an edit does not refetch them.
//!
//! The session fills the letterhead placeholders and whatever PDF metadata
//! the configuration leaves unset.

use crate::config::ExportConfig;
use crate::dom::html::parse_fragment;
use crate::dom::ContentNode;
use crate::error::LaminaError;
use crate::export::{ExportedDocument, Exporter};
use crate::flow::{paginate, FlowEngine, PageChrome, PageContainer};
use crate::font::FontContext;
use crate::image_loader::AssetStore;
use crate::layout::{BodyMeasure, LayoutEngine};
use crate::model::{Metadata, ReportDocument, SessionContext};
use crate::normalize::normalize;
use crate::style::Stylesheet;

pub struct ReportPreview {
    config: ExportConfig,
    session: SessionContext,
    fonts: FontContext,
    styles: Stylesheet,
    header: Vec<ContentNode>,
    footer: Vec<ContentNode>,
    assets: AssetStore,
    pages: Vec<PageContainer>,
    /// Folio of the report last paged.
    folio: Option<String>,
}

impl ReportPreview {
    pub fn new(config: ExportConfig, session: SessionContext) -> Self {
        let assets = AssetStore::with_defaults(config.asset_dir.clone(), config.image_timeout_ms);
        Self::with_assets(config, session, assets)
    }

    /// A preview that loads images through `assets`.
    pub fn with_assets(config: ExportConfig, session: SessionContext, assets: AssetStore) -> Self {
        let fonts = FontContext::load(&config.fonts, config.asset_dir.as_deref());
        let styles = Stylesheet::new(
            &config.default_font_family,
            config.base_font_size,
            config.extra_css.as_deref(),
        );
        Self {
            header: parse_fragment(&config.header_html),
            footer: parse_fragment(&config.footer_html),
            config,
            session,
            fonts,
            styles,
            assets,
            pages: Vec::new(),
            folio: None,
        }
    }

    /// Re-page `report` from scratch.
    pub fn refresh(&mut self, report: &ReportDocument) -> &[PageContainer] {
        self.pages.clear();

        let nodes = normalize(report, &self.config.normalize_options());
        let mut srcs = Vec::new();
        for node in nodes.iter().chain(&self.header).chain(&self.footer) {
            node.image_sources(&mut srcs);
        }
        self.assets.load_all(srcs.iter().map(String::as_str));

        let engine = LayoutEngine::new(&self.fonts, &self.styles, &self.assets);
        let measure = BodyMeasure::new(engine, self.config.geometry);
        let bodies = FlowEngine::new(&measure, self.config.flow).flow(&nodes);

        self.folio = report.base.folio.clone();
        let mut placeholders = self.session.placeholders();
        placeholders.push(("{folio}", self.folio.clone().unwrap_or_default()));
        let chrome = PageChrome {
            header: self.header.clone(),
            footer: self.footer.clone(),
            placeholders,
        };
        self.pages = paginate(bodies, &chrome);
        log::info!(
            "Paged {:?} report into {} pages",
            report.report_type,
            self.pages.len()
        );
        &self.pages
    }

    pub fn pages(&self) -> &[PageContainer] {
        &self.pages
    }

    /// Capture the current pages. `Ok(None)` before the first refresh.
    pub fn export(&mut self) -> Result<Option<ExportedDocument>, LaminaError> {
        Exporter::new(&self.fonts, &self.styles, &self.config)
            .with_metadata(self.metadata())
            .export(&self.pages, &mut self.assets)
    }

    /// Configured metadata, completed from the session and the folio.
    pub fn metadata(&self) -> Metadata {
        let mut metadata = self.config.metadata.clone();
        if metadata.title.is_none() {
            metadata.title = self.folio.as_ref().map(|folio| format!("Folio {folio}"));
        }
        self.session.fill_metadata(&mut metadata);
        metadata
    }

    pub fn config(&self) -> &ExportConfig {
        &self.config
    }
}
