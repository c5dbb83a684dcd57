//! Page geometry: one Letter page split into header, body and footer bands.
//!
//! Geometry belongs to the configuration. Preview and export read the same
//! value, so a page body measured during flow is exactly the region the
//! rasterizer paints.

use serde::{Deserialize, Serialize};

use crate::style::PX_PER_MM;

/// Points per millimetre.
pub const PT_PER_MM: f64 = 72.0 / 25.4;

/// An axis-aligned rectangle in CSS pixels, page-relative.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PageGeometry {
    pub page_width_mm: f64,
    pub page_height_mm: f64,
    pub margin_left_mm: f64,
    pub margin_right_mm: f64,
    pub margin_top_mm: f64,
    pub margin_bottom_mm: f64,
    /// Height of the letterhead band above the body.
    pub header_mm: f64,
    /// Height of the footer band below the body.
    pub footer_mm: f64,
    pub px_per_mm: f64,
}

impl Default for PageGeometry {
    /// US Letter with the laboratory letterhead bands.
    fn default() -> Self {
        Self {
            page_width_mm: 215.9,
            page_height_mm: 279.4,
            margin_left_mm: 18.0,
            margin_right_mm: 18.0,
            margin_top_mm: 0.0,
            margin_bottom_mm: 0.0,
            header_mm: 28.0,
            footer_mm: 20.0,
            px_per_mm: PX_PER_MM,
        }
    }
}

impl PageGeometry {
    pub fn page_width_px(&self) -> f64 {
        self.page_width_mm * self.px_per_mm
    }

    pub fn page_height_px(&self) -> f64 {
        self.page_height_mm * self.px_per_mm
    }

    pub fn page_width_pt(&self) -> f64 {
        self.page_width_mm * PT_PER_MM
    }

    pub fn page_height_pt(&self) -> f64 {
        self.page_height_mm * PT_PER_MM
    }

    pub fn content_width_px(&self) -> f64 {
        (self.page_width_mm - self.margin_left_mm - self.margin_right_mm) * self.px_per_mm
    }

    /// Fixed height every page body must fit in.
    pub fn body_height_px(&self) -> f64 {
        let mm = self.page_height_mm
            - self.margin_top_mm
            - self.margin_bottom_mm
            - self.header_mm
            - self.footer_mm;
        mm.max(0.0) * self.px_per_mm
    }

    pub fn header_rect(&self) -> Rect {
        Rect {
            x: self.margin_left_mm * self.px_per_mm,
            y: self.margin_top_mm * self.px_per_mm,
            width: self.content_width_px(),
            height: self.header_mm * self.px_per_mm,
        }
    }

    pub fn body_rect(&self) -> Rect {
        Rect {
            x: self.margin_left_mm * self.px_per_mm,
            y: (self.margin_top_mm + self.header_mm) * self.px_per_mm,
            width: self.content_width_px(),
            height: self.body_height_px(),
        }
    }

    pub fn footer_rect(&self) -> Rect {
        let body = self.body_rect();
        Rect {
            x: body.x,
            y: body.y + body.height,
            width: self.content_width_px(),
            height: self.footer_mm * self.px_per_mm,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn letter_body_and_content_sizes() {
        let g = PageGeometry::default();
        // (279.4 - 48) mm at 96 dpi
        assert!((g.body_height_px() - 874.58).abs() < 0.01);
        // (215.9 - 36) mm at 96 dpi
        assert!((g.content_width_px() - 679.94).abs() < 0.01);
    }

    #[test]
    fn letter_page_is_612_by_792_points() {
        let g = PageGeometry::default();
        assert!((g.page_width_pt() - 612.0).abs() < 0.01);
        assert!((g.page_height_pt() - 792.0).abs() < 0.01);
    }

    #[test]
    fn bands_tile_the_page() {
        let g = PageGeometry::default();
        let header = g.header_rect();
        let body = g.body_rect();
        let footer = g.footer_rect();
        assert!((header.y + header.height - body.y).abs() < 1e-9);
        assert!((footer.y + footer.height - g.page_height_px()).abs() < 1e-6);
    }

    #[test]
    fn oversized_bands_clamp_body_to_zero() {
        let g = PageGeometry {
            header_mm: 200.0,
            footer_mm: 200.0,
            ..Default::default()
        };
        assert_eq!(g.body_height_px(), 0.0);
    }
}
