//! Integration tests for the lamina pipeline.
//!
//! These tests exercise the full path from a report to PDF bytes.
//! They verify:
//! - pages hold the normalized content in order, once each
//! - every page body fits its geometry
//! - oversized sections split across pages and reconstruct exactly
//! - broken images degrade without changing pagination
//! - the PDF has one page per composed page

use base64::Engine as _;
use lamina::dom::{text_of, ContentNode};
use lamina::export::Exporter;
use lamina::flow::{Measure, PageContainer, PageGeometry, SplitMode};
use lamina::font::FontContext;
use lamina::image_loader::AssetStore;
use lamina::layout::{BodyMeasure, LayoutEngine};
use lamina::model::ImageRef;
use lamina::normalize::normalize;
use lamina::style::Stylesheet;
use lamina::*;

// ─── Helpers ────────────────────────────────────────────────────

fn fast_config() -> ExportConfig {
    ExportConfig {
        device_pixel_ratio: 0.5,
        ..Default::default()
    }
}

fn pages_for(report: &ReportDocument, config: ExportConfig) -> Vec<PageContainer> {
    let mut preview = ReportPreview::new(config, SessionContext::default());
    preview.refresh(report).to_vec()
}

fn body_text(pages: &[PageContainer]) -> String {
    pages.iter().map(|p| text_of(&p.body)).collect()
}

fn paragraphs(n: usize) -> String {
    (0..n)
        .map(|i| format!("<p>Fragmento {i}: epitelio escamoso sin atipia y estroma fibroso.</p>"))
        .collect()
}

fn biopsy_with_microscopic(html: String) -> ReportDocument {
    let mut report = ReportDocument::new(ReportType::Biopsy);
    report.base.patient_name = Some("Ana Torres".to_string());
    report.base.folio = Some("B-2024-0001".to_string());
    report.sections.macroscopic = Some("<p>Fragmento de 1 cm.</p>".to_string());
    report.sections.microscopic = Some(html);
    report
}

fn count(haystack: &[u8], needle: &[u8]) -> usize {
    haystack.windows(needle.len()).filter(|w| *w == needle).count()
}

fn png_data_uri() -> String {
    let img = image::RgbaImage::from_pixel(8, 6, image::Rgba([200, 40, 40, 255]));
    let mut bytes = std::io::Cursor::new(Vec::new());
    img.write_to(&mut bytes, image::ImageOutputFormat::Png).unwrap();
    format!(
        "data:image/png;base64,{}",
        base64::engine::general_purpose::STANDARD.encode(bytes.into_inner())
    )
}

// ─── Pagination ─────────────────────────────────────────────────

#[test]
fn short_report_is_one_page() {
    let report = biopsy_with_microscopic("<p>Sin alteraciones.</p>".to_string());
    let pages = pages_for(&report, fast_config());
    assert_eq!(pages.len(), 1);
}

#[test]
fn empty_report_still_fills_one_page() {
    let pages = pages_for(&ReportDocument::new(ReportType::Cytology), fast_config());
    assert_eq!(pages.len(), 1);
    assert!(!pages[0].body.is_empty());
}

#[test]
fn oversized_section_spans_three_pages_in_order() {
    let report = biopsy_with_microscopic(paragraphs(120));
    let config = fast_config();
    let nodes = normalize(&report, &config.normalize_options());
    let pages = pages_for(&report, config);

    assert!(pages.len() >= 3, "only {} pages", pages.len());
    // Order preserved, nothing duplicated or lost.
    assert_eq!(body_text(&pages), text_of(&nodes));
    for (i, page) in pages.iter().enumerate() {
        assert_eq!(page.index, i);
    }
}

#[test]
fn every_page_body_fits() {
    let report = biopsy_with_microscopic(paragraphs(90));
    let pages = pages_for(&report, fast_config());

    let fonts = FontContext::new();
    let styles = Stylesheet::new("Helvetica", 14.0, None);
    let assets = AssetStore::with_defaults(None, 1000);
    let measure = BodyMeasure::new(
        LayoutEngine::new(&fonts, &styles, &assets),
        PageGeometry::default(),
    );
    for page in &pages {
        let height = measure.measure(&page.body);
        assert!(
            height <= measure.body_height() + 0.5,
            "page {} is {height}px tall",
            page.index
        );
    }
}

#[test]
fn long_paragraph_is_split_and_reconstructs() {
    let words = "células inflamatorias mononucleares ".repeat(400);
    let report = biopsy_with_microscopic(format!("<p>{words}</p>"));
    let config = fast_config();
    let nodes = normalize(&report, &config.normalize_options());
    let pages = pages_for(&report, config);
    assert!(pages.len() >= 2);
    assert_eq!(body_text(&pages), text_of(&nodes));
}

#[test]
fn pagination_is_idempotent() {
    let report = biopsy_with_microscopic(paragraphs(70));
    let mut preview = ReportPreview::new(fast_config(), SessionContext::default());
    let first = preview.refresh(&report).to_vec();
    let second = preview.refresh(&report).to_vec();
    assert_eq!(first, second);
}

#[test]
fn urinary_cytology_gating() {
    let mut report = ReportDocument::new(ReportType::UrinaryCytology);
    report.sections.macroscopic = Some("<p>ignored</p>".to_string());
    report.sections.urinary_cytology = Some("<p>Negativo para malignidad.</p>".to_string());
    let text = body_text(&pages_for(&report, fast_config()));
    assert!(text.contains("Urinary cytology"));
    assert!(text.contains("Negativo para malignidad."));
    assert!(!text.contains("Macroscopic"));
    assert!(!text.contains("Microscopic"));
    assert!(!text.contains("ignored"));
}

#[test]
fn reopen_mode_keeps_list_numbering() {
    let items: String = (0..90).map(|i| format!("<li>Hallazgo {i}</li>")).collect();
    let report = biopsy_with_microscopic(format!("<ol>{items}</ol>"));
    let mut config = fast_config();
    config.flow.split_mode = SplitMode::Reopen;
    let pages = pages_for(&report, config);
    assert!(pages.len() >= 2);

    fn first_ol(nodes: &[ContentNode]) -> Option<&lamina::dom::Element> {
        nodes.iter().filter_map(ContentNode::as_element).find_map(|el| {
            if el.tag == "ol" {
                Some(el)
            } else {
                first_ol(&el.children)
            }
        })
    }
    let lists: Vec<Option<&lamina::dom::Element>> =
        pages.iter().map(|p| first_ol(&p.body)).collect();
    let first = lists.iter().position(Option::is_some).unwrap();
    let placed = lists[first].unwrap().children.len();
    let continued = lists[first + 1].expect("the list reopens on the next page");
    let start: usize = continued.get_attr("start").unwrap().parse().unwrap();
    assert_eq!(start, placed + 1);
}

#[test]
fn letter_geometry_constants() {
    let g = PageGeometry::default();
    assert!((g.body_height_px() - 874.6).abs() < 0.05);
    assert!((g.content_width_px() - 680.0).abs() < 0.1);
    assert!((g.page_width_pt() - 612.0).abs() < 0.01);
    assert!((g.page_height_pt() - 792.0).abs() < 0.01);
}

// ─── Export ─────────────────────────────────────────────────────

#[test]
fn pdf_has_one_page_per_container() {
    let report = biopsy_with_microscopic(paragraphs(80));
    let mut preview = ReportPreview::new(fast_config(), SessionContext::default());
    let n = preview.refresh(&report).len();
    let doc = preview.export().unwrap().unwrap();
    assert_eq!(doc.page_count, n);
    assert_eq!(count(&doc.bytes, b"/Type /Page "), n);
    assert_eq!(count(&doc.bytes, b"/DCTDecode"), n);
    assert!(doc.bytes.starts_with(b"%PDF-1.7"));
}

#[test]
fn broken_image_keeps_page_count() {
    let good = png_data_uri();
    let mut healthy = biopsy_with_microscopic(paragraphs(30));
    healthy.images = (0..4)
        .map(|i| ImageRef {
            url: good.clone(),
            thumbnail_url: None,
            caption: Some(format!("HE {i}")),
        })
        .collect();
    let mut broken = healthy.clone();
    broken.images[1].url = "/definitely/missing/slide.jpg".to_string();

    let mut a = ReportPreview::new(fast_config(), SessionContext::default());
    let mut b = ReportPreview::new(fast_config(), SessionContext::default());
    let pages_a = a.refresh(&healthy).len();
    let pages_b = b.refresh(&broken).len();
    assert_eq!(pages_a, pages_b);

    let doc_a = a.export().unwrap().unwrap();
    let doc_b = b.export().unwrap().unwrap();
    assert_eq!(doc_a.page_count, doc_b.page_count);
}

#[test]
fn zero_pages_produce_no_file() {
    let fonts = FontContext::new();
    let styles = Stylesheet::new("Helvetica", 14.0, None);
    let exporter = Exporter::new(&fonts, &styles, &fast_config());
    let mut assets = AssetStore::with_defaults(None, 1000);
    assert!(exporter.export(&[], &mut assets).unwrap().is_none());
}

#[test]
fn render_report_json_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let json = r#"{
        "reportType": "Histopatologia",
        "base": { "patientName": "José Núñez", "folio": "H-77" },
        "sections": { "diagnosis": "<p><b>Adenocarcinoma</b> moderadamente diferenciado.</p>" }
    }"#;
    let doc = render_report_json(json, fast_config(), SessionContext::default())
        .unwrap()
        .unwrap();
    assert_eq!(doc.page_count, 1);
    let path = doc.save_in(dir.path()).unwrap();
    assert_eq!(path.file_name().unwrap(), "report.pdf");
    assert_eq!(std::fs::read(path).unwrap(), doc.bytes);
}

#[test]
fn malformed_report_json_has_hint() {
    let err = render_report_json(
        r#"{ "reportType": "Autopsia" }"#,
        fast_config(),
        SessionContext::default(),
    )
    .unwrap_err();
    assert!(matches!(err, LaminaError::Parse { what: "report", .. }));
    assert!(err.hint().unwrap().contains("reportType"));
}

#[test]
fn permuted_text_exports_differently() {
    let config = ExportConfig {
        device_pixel_ratio: 1.0,
        ..Default::default()
    };
    let render = |diagnosis: &str| {
        let mut report = ReportDocument::new(ReportType::Biopsy);
        report.sections.diagnosis = Some(format!("<p>{diagnosis}</p>"));
        render_report(&report, config.clone(), SessionContext::default())
            .unwrap()
            .unwrap()
    };
    let a = render("nu nu nu benigno");
    let b = render("un un un benigno");
    assert_eq!(a.page_count, b.page_count);
    assert_ne!(a.bytes, b.bytes, "different diagnosis text produced identical PDFs");
}

#[test]
fn session_reaches_pdf_info() {
    let session = SessionContext {
        tenant_id: Some("lab-7".to_string()),
        branch_name: Some("Sucursal Centro".to_string()),
        user_name: Some("DrRivas".to_string()),
        ..Default::default()
    };
    let report = biopsy_with_microscopic("<p>Sin alteraciones.</p>".to_string());
    let doc = render_report(&report, fast_config(), session).unwrap().unwrap();
    let text = String::from_utf8_lossy(&doc.bytes);
    assert!(text.contains("/Author (DrRivas)"));
    assert!(text.contains("/Subject (Sucursal Centro)"));
    assert!(text.contains("/Title (Folio B-2024-0001)"));
    assert!(text.contains("/Keywords (tenant:lab-7)"));
}
