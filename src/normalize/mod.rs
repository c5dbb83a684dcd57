//! # Content Normalizer
//!
//! Turns a [`ReportDocument`] into the ordered content tree the flow engine
//! paginates. The order is fixed:
//!
//! identification (patient, exam, folio) → reception date → age → specimen
//! → submission diagnosis → divider → macroscopic → microscopic → images →
//! cytomorphology → interpretation → diagnosis → comment → urinary cytology
//! → immunofluorescence → special stains → electron microscopy
//!
//! Report flags gate the age field and every rich-text section. A gated-in
//! section with no value still renders, showing the placeholder text; the
//! submission diagnosis is the one field that is left out instead.

use serde::{Deserialize, Serialize};

use crate::dom::html::parse_fragment;
use crate::dom::{ContentNode, Element};
use crate::model::{ImageRef, ReportDocument};

/// Visible labels. Defaults are English.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Labels {
    pub patient: String,
    pub exam: String,
    pub folio: String,
    pub reception_date: String,
    pub age: String,
    pub specimen: String,
    pub submission_diagnosis: String,
    pub macroscopic: String,
    pub microscopic: String,
    pub cytomorphology: String,
    pub interpretation: String,
    pub diagnosis: String,
    pub comment: String,
    pub urinary_cytology: String,
    pub immunofluorescence: String,
    pub special_stains: String,
    pub electron_microscopy: String,
    /// Shown in place of a missing value.
    pub placeholder: String,
}

impl Default for Labels {
    fn default() -> Self {
        let s = |v: &str| v.to_string();
        Self {
            patient: s("Patient"),
            exam: s("Exam"),
            folio: s("Folio"),
            reception_date: s("Reception date"),
            age: s("Age"),
            specimen: s("Specimen"),
            submission_diagnosis: s("Submission diagnosis"),
            macroscopic: s("Macroscopic description"),
            microscopic: s("Microscopic description"),
            cytomorphology: s("Cytomorphology"),
            interpretation: s("Interpretation"),
            diagnosis: s("Diagnosis"),
            comment: s("Comment"),
            urinary_cytology: s("Urinary cytology"),
            immunofluorescence: s("Immunofluorescence"),
            special_stains: s("Special stains"),
            electron_microscopy: s("Electron microscopy"),
            placeholder: s("(unspecified)"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NormalizeOptions {
    pub labels: Labels,
    /// Fixed height of each image in the images grid.
    pub thumbnail_height_px: f64,
    /// Use `thumbnail_url` over `url` when both exist.
    pub prefer_thumbnails: bool,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self {
            labels: Labels::default(),
            thumbnail_height_px: 170.0,
            prefer_thumbnails: true,
        }
    }
}

/// Build the content tree for `report`.
pub fn normalize(report: &ReportDocument, opts: &NormalizeOptions) -> Vec<ContentNode> {
    let flags = report.effective_flags();
    let base = &report.base;
    let sections = &report.sections;
    let labels = &opts.labels;
    let mut out = Vec::new();

    out.push(
        Element::new("div")
            .attr("class", "identification")
            .child(field(&labels.patient, base.patient_name.as_deref(), labels))
            .child(field(&labels.exam, base.exam.as_deref(), labels))
            .child(field(&labels.folio, base.folio.as_deref(), labels))
            .into(),
    );
    out.push(field(&labels.reception_date, base.reception_date.as_deref(), labels).into());
    if flags.age {
        out.push(field(&labels.age, base.age.as_deref(), labels).into());
    }
    out.push(field(&labels.specimen, base.specimen.as_deref(), labels).into());
    if let Some(dx) = base.submission_diagnosis.as_deref().filter(|v| !v.trim().is_empty()) {
        out.push(field(&labels.submission_diagnosis, Some(dx), labels).into());
    }
    out.push(Element::new("hr").attr("class", "divider").into());

    let mut section = |enabled: bool, title: &str, html: Option<&str>| {
        if enabled {
            out.extend(rich_section(title, html, &labels.placeholder));
        }
    };
    section(flags.macroscopic, &labels.macroscopic, sections.macroscopic.as_deref());
    section(flags.microscopic, &labels.microscopic, sections.microscopic.as_deref());

    if !report.images.is_empty() {
        out.push(image_grid(&report.images, opts));
    }

    let mut section = |enabled: bool, title: &str, html: Option<&str>| {
        if enabled {
            out.extend(rich_section(title, html, &labels.placeholder));
        }
    };
    section(flags.cytomorphology, &labels.cytomorphology, sections.cytomorphology.as_deref());
    section(flags.interpretation, &labels.interpretation, sections.interpretation.as_deref());
    section(flags.diagnosis, &labels.diagnosis, sections.diagnosis.as_deref());
    section(flags.comment, &labels.comment, sections.comment.as_deref());
    section(flags.urinary_cytology, &labels.urinary_cytology, sections.urinary_cytology.as_deref());
    section(
        flags.immunofluorescence,
        &labels.immunofluorescence,
        sections.immunofluorescence.as_deref(),
    );
    section(flags.special_stains, &labels.special_stains, sections.special_stains.as_deref());
    section(
        flags.electron_microscopy,
        &labels.electron_microscopy,
        sections.electron_microscopy.as_deref(),
    );

    log::debug!("Normalized {:?} report into {} nodes", report.report_type, out.len());
    out
}

/// `Label: value` paragraph. Blank values show the placeholder.
fn field(label: &str, value: Option<&str>, labels: &Labels) -> Element {
    let value = value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(&labels.placeholder);
    Element::new("p")
        .attr("class", "field")
        .child(
            Element::new("span")
                .attr("class", "field-label")
                .text(format!("{label}: ")),
        )
        .text(value)
}

/// Heading plus the editor fragment. A fragment that renders nothing counts
/// as missing.
fn rich_section(title: &str, html: Option<&str>, placeholder: &str) -> [ContentNode; 2] {
    let heading = Element::new("h3").attr("class", "section-title").text(title);
    let parsed = html.map(parse_fragment).unwrap_or_default();
    let body = Element::new("div").attr("class", "section-body");
    let body = if renders_something(&parsed) {
        body.children(parsed)
    } else {
        body.child(Element::new("p").attr("class", "placeholder").text(placeholder))
    };
    [heading.into(), body.into()]
}

/// Visible text or at least one image. Editors leave `<p><br></p>` behind
/// for an emptied field.
fn renders_something(nodes: &[ContentNode]) -> bool {
    let mut srcs = Vec::new();
    nodes.iter().any(|n| {
        n.image_sources(&mut srcs);
        !n.text_content().trim().is_empty() || !srcs.is_empty()
    })
}

fn image_grid(images: &[ImageRef], opts: &NormalizeOptions) -> ContentNode {
    let cards = images.iter().map(|image| {
        let src = match (&image.thumbnail_url, opts.prefer_thumbnails) {
            (Some(thumb), true) if !thumb.trim().is_empty() => thumb.as_str(),
            _ => image.url.as_str(),
        };
        let caption = image.caption.as_deref().map(str::trim).filter(|c| !c.is_empty());
        let mut card = Element::new("figure").attr("class", "image-card").child(
            Element::new("img")
                .attr("class", "image-thumb")
                .attr("src", src)
                .attr("height", format!("{}", opts.thumbnail_height_px))
                .attr("alt", caption.unwrap_or("")),
        );
        if let Some(caption) = caption {
            card = card.child(
                Element::new("figcaption")
                    .attr("class", "image-caption")
                    .text(caption),
            );
        }
        card.into()
    });
    Element::new("div")
        .attr("class", "image-grid")
        .children(cards)
        .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ReportFlags, ReportType};

    fn titles(nodes: &[ContentNode]) -> Vec<String> {
        nodes
            .iter()
            .filter_map(ContentNode::as_element)
            .filter(|el| el.has_class("section-title"))
            .map(|el| ContentNode::Element(el.clone()).text_content())
            .collect()
    }

    #[test]
    fn histopathology_sections_in_canonical_order() {
        let report = ReportDocument::new(ReportType::Histopathology);
        let nodes = normalize(&report, &NormalizeOptions::default());
        assert_eq!(
            titles(&nodes),
            vec![
                "Macroscopic description",
                "Microscopic description",
                "Diagnosis",
                "Comment",
                "Special stains"
            ]
        );
        assert!(nodes[0].as_element().unwrap().has_class("identification"));
    }

    #[test]
    fn urinary_cytology_has_no_tissue_sections() {
        let report = ReportDocument::new(ReportType::UrinaryCytology);
        let nodes = normalize(&report, &NormalizeOptions::default());
        assert_eq!(titles(&nodes), vec!["Urinary cytology", "Diagnosis", "Comment"]);
    }

    #[test]
    fn missing_section_renders_placeholder() {
        let mut report = ReportDocument::new(ReportType::Biopsy);
        report.sections.macroscopic = Some("<p>Fragmento de 2 cm</p>".to_string());
        report.sections.microscopic = Some("<p><br></p>".to_string());
        let nodes = normalize(&report, &NormalizeOptions::default());
        let bodies: Vec<String> = nodes
            .iter()
            .filter(|n| n.as_element().is_some_and(|e| e.has_class("section-body")))
            .map(ContentNode::text_content)
            .collect();
        assert_eq!(bodies[0], "Fragmento de 2 cm");
        assert_eq!(bodies[1], "(unspecified)");
    }

    #[test]
    fn submission_diagnosis_omitted_when_blank() {
        let mut report = ReportDocument::new(ReportType::Biopsy);
        report.base.submission_diagnosis = Some("   ".to_string());
        let text: String = normalize(&report, &NormalizeOptions::default())
            .iter()
            .map(ContentNode::text_content)
            .collect();
        assert!(!text.contains("Submission diagnosis"));

        report.base.submission_diagnosis = Some("Lesión pigmentada".to_string());
        let text: String = normalize(&report, &NormalizeOptions::default())
            .iter()
            .map(ContentNode::text_content)
            .collect();
        assert!(text.contains("Submission diagnosis: Lesión pigmentada"));
    }

    #[test]
    fn age_only_when_flagged() {
        let mut report = ReportDocument::new(ReportType::Biopsy);
        report.base.age = Some("54".to_string());
        let text: String = normalize(&report, &NormalizeOptions::default())
            .iter()
            .map(ContentNode::text_content)
            .collect();
        assert!(!text.contains("Age"));

        report.flags = Some(ReportFlags {
            age: true,
            ..Default::default()
        });
        let text: String = normalize(&report, &NormalizeOptions::default())
            .iter()
            .map(ContentNode::text_content)
            .collect();
        assert!(text.contains("Age: 54"));
    }

    #[test]
    fn image_grid_follows_microscopic_and_prefers_thumbnails() {
        let mut report = ReportDocument::new(ReportType::Biopsy);
        report.images = vec![
            ImageRef {
                url: "full.jpg".to_string(),
                thumbnail_url: Some("thumb.jpg".to_string()),
                caption: Some("HE 40x".to_string()),
            },
            ImageRef {
                url: "other.jpg".to_string(),
                thumbnail_url: None,
                caption: None,
            },
        ];
        let nodes = normalize(&report, &NormalizeOptions::default());
        let grid_pos = nodes
            .iter()
            .position(|n| n.as_element().is_some_and(|e| e.has_class("image-grid")))
            .unwrap();
        // identification, reception, specimen, hr, 2 × (title, body)
        assert_eq!(grid_pos, 8);
        let mut srcs = Vec::new();
        nodes[grid_pos].image_sources(&mut srcs);
        assert_eq!(srcs, vec!["thumb.jpg", "other.jpg"]);
        let cards = &nodes[grid_pos].as_element().unwrap().children;
        assert_eq!(cards[0].as_element().unwrap().children.len(), 2);
        assert_eq!(cards[1].as_element().unwrap().children.len(), 1);
    }

    #[test]
    fn no_images_no_grid() {
        let report = ReportDocument::new(ReportType::Biopsy);
        let nodes = normalize(&report, &NormalizeOptions::default());
        assert!(!nodes
            .iter()
            .any(|n| n.as_element().is_some_and(|e| e.has_class("image-grid"))));
    }

    #[test]
    fn custom_labels_are_used() {
        let opts = NormalizeOptions {
            labels: Labels {
                patient: "Paciente".to_string(),
                placeholder: "(sin dato)".to_string(),
                ..Default::default()
            },
            ..Default::default()
        };
        let nodes = normalize(&ReportDocument::new(ReportType::Cytology), &opts);
        assert!(nodes[0].text_content().starts_with("Paciente: (sin dato)"));
    }
}
