//! # Report Model
//!
//! The logical pathology report that seeds pagination. It is built fresh from
//! editor state on every render; the backend stays authoritative once saved,
//! so nothing here is persisted by the crate.
//!
//! The set of report types is closed. Each type maps to a fixed
//! [`ReportFlags`] record through an exhaustive `match`, so adding a new type
//! is a compile error until its sections are decided.

pub mod session;

use serde::{Deserialize, Serialize};

pub use session::SessionContext;

/// A complete report ready for normalization.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportDocument {
    /// Which kind of study this report belongs to.
    pub report_type: ReportType,

    /// Identification fields shown in the opening block.
    #[serde(default)]
    pub base: BaseInfo,

    /// Rich-text sections, each an HTML fragment from the editor.
    #[serde(default)]
    pub sections: Sections,

    /// Attached microscopy images, in display order.
    #[serde(default)]
    pub images: Vec<ImageRef>,

    /// Explicit section gating. When absent, the report type decides.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flags: Option<ReportFlags>,
}

impl ReportDocument {
    /// An empty report of the given type.
    pub fn new(report_type: ReportType) -> Self {
        Self {
            report_type,
            base: BaseInfo::default(),
            sections: Sections::default(),
            images: Vec::new(),
            flags: None,
        }
    }

    /// The flags that actually gate normalization.
    pub fn effective_flags(&self) -> ReportFlags {
        self.flags.unwrap_or_else(|| self.report_type.flags())
    }
}

/// The closed set of report types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReportType {
    #[serde(rename = "Histopatologia")]
    Histopathology,
    #[serde(rename = "Biopsia")]
    Biopsy,
    #[serde(rename = "Citologia")]
    Cytology,
    #[serde(rename = "Citologia_urinaria")]
    UrinaryCytology,
    #[serde(rename = "Papanicolaou")]
    Papanicolaou,
    #[serde(rename = "Biopsia_renal")]
    RenalBiopsy,
    #[serde(rename = "Inmunofluorescencia")]
    Immunofluorescence,
}

impl ReportType {
    /// All report types, in menu order.
    pub const ALL: [ReportType; 7] = [
        ReportType::Histopathology,
        ReportType::Biopsy,
        ReportType::Cytology,
        ReportType::UrinaryCytology,
        ReportType::Papanicolaou,
        ReportType::RenalBiopsy,
        ReportType::Immunofluorescence,
    ];

    /// The wire tag used by the backend.
    pub fn tag(&self) -> &'static str {
        match self {
            ReportType::Histopathology => "Histopatologia",
            ReportType::Biopsy => "Biopsia",
            ReportType::Cytology => "Citologia",
            ReportType::UrinaryCytology => "Citologia_urinaria",
            ReportType::Papanicolaou => "Papanicolaou",
            ReportType::RenalBiopsy => "Biopsia_renal",
            ReportType::Immunofluorescence => "Inmunofluorescencia",
        }
    }

    /// The fixed section gating for this report type.
    pub fn flags(&self) -> ReportFlags {
        let none = ReportFlags::default();
        match self {
            ReportType::Histopathology => ReportFlags {
                macroscopic: true,
                microscopic: true,
                diagnosis: true,
                comment: true,
                special_stains: true,
                ..none
            },
            ReportType::Biopsy => ReportFlags {
                macroscopic: true,
                microscopic: true,
                diagnosis: true,
                comment: true,
                ..none
            },
            ReportType::Cytology => ReportFlags {
                age: true,
                cytomorphology: true,
                interpretation: true,
                diagnosis: true,
                comment: true,
                ..none
            },
            ReportType::UrinaryCytology => ReportFlags {
                age: true,
                urinary_cytology: true,
                diagnosis: true,
                comment: true,
                ..none
            },
            ReportType::Papanicolaou => ReportFlags {
                age: true,
                cytomorphology: true,
                interpretation: true,
                comment: true,
                ..none
            },
            ReportType::RenalBiopsy => ReportFlags {
                macroscopic: true,
                microscopic: true,
                diagnosis: true,
                comment: true,
                immunofluorescence: true,
                special_stains: true,
                electron_microscopy: true,
                ..none
            },
            ReportType::Immunofluorescence => ReportFlags {
                immunofluorescence: true,
                diagnosis: true,
                comment: true,
                ..none
            },
        }
    }
}

/// Which sections and fields apply to a report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReportFlags {
    pub age: bool,
    pub macroscopic: bool,
    pub microscopic: bool,
    pub cytomorphology: bool,
    pub interpretation: bool,
    pub diagnosis: bool,
    pub comment: bool,
    pub urinary_cytology: bool,
    pub immunofluorescence: bool,
    pub special_stains: bool,
    pub electron_microscopy: bool,
}

/// Identification fields. Every field is optional upstream.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BaseInfo {
    pub patient_name: Option<String>,
    pub exam: Option<String>,
    /// Folio / accession code.
    pub folio: Option<String>,
    pub reception_date: Option<String>,
    pub specimen: Option<String>,
    pub age: Option<String>,
    /// Clinical diagnosis sent with the specimen. Omitted when absent.
    pub submission_diagnosis: Option<String>,
}

/// Rich-text report sections. Each is an HTML fragment or null.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Sections {
    pub macroscopic: Option<String>,
    pub microscopic: Option<String>,
    pub cytomorphology: Option<String>,
    pub interpretation: Option<String>,
    pub diagnosis: Option<String>,
    pub comment: Option<String>,
    pub urinary_cytology: Option<String>,
    pub immunofluorescence: Option<String>,
    pub special_stains: Option<String>,
    pub electron_microscopy: Option<String>,
}

/// A reference to an attached image.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageRef {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
}

/// Document metadata embedded in the PDF Info dictionary.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Metadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub keywords: Option<String>,
    pub creator: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urinary_cytology_excludes_tissue_sections() {
        let flags = ReportType::UrinaryCytology.flags();
        assert!(flags.urinary_cytology);
        assert!(!flags.macroscopic);
        assert!(!flags.microscopic);
        assert!(!flags.interpretation);
    }

    #[test]
    fn report_type_round_trips_original_tags() {
        for ty in ReportType::ALL {
            let json = serde_json::to_string(&ty).unwrap();
            assert_eq!(json, format!("\"{}\"", ty.tag()));
            let back: ReportType = serde_json::from_str(&json).unwrap();
            assert_eq!(back, ty);
        }
    }

    #[test]
    fn unknown_report_type_is_rejected() {
        let result = serde_json::from_str::<ReportType>("\"Autopsia\"");
        assert!(result.is_err());
    }

    #[test]
    fn explicit_flags_override_report_type() {
        let mut report = ReportDocument::new(ReportType::Biopsy);
        assert!(report.effective_flags().macroscopic);
        report.flags = Some(ReportFlags {
            comment: true,
            ..Default::default()
        });
        let flags = report.effective_flags();
        assert!(!flags.macroscopic);
        assert!(flags.comment);
    }

    #[test]
    fn minimal_json_report_deserializes_with_defaults() {
        let report: ReportDocument =
            serde_json::from_str(r#"{ "reportType": "Citologia" }"#).unwrap();
        assert_eq!(report.report_type, ReportType::Cytology);
        assert!(report.base.patient_name.is_none());
        assert!(report.images.is_empty());
    }
}
