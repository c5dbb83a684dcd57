//! # PDF Serializer
//!
//! Wraps captured page bitmaps in a valid PDF file.
//!
//! This is a from-scratch PDF 1.7 writer. Every page is one JPEG image
//! XObject painted full-bleed, so the file needs no fonts and no graphics
//! beyond a single `Do`.
//!
//! ## PDF Structure (simplified)
//!
//! ```text
//! %PDF-1.7            <- header
//! 1 0 obj ... endobj  <- catalog
//! 2 0 obj ... endobj  <- page tree
//! 3 0 obj ... endobj  <- per page: image, content stream, page
//! ...
//! xref                <- cross-reference table (byte offsets of each object)
//! trailer             <- points to the root object
//! %%EOF
//! ```

use std::fmt::Write as FmtWrite; // for write! on String
use std::io::Write as IoWrite; // for write! on Vec<u8>

use miniz_oxide::deflate::compress_to_vec_zlib;

use crate::model::Metadata;
use crate::raster::RenderedPage;

pub struct PdfWriter;

/// Tracks allocated PDF objects during writing.
struct PdfBuilder {
    /// Index 0 is the free-list head; real objects start at 1.
    objects: Vec<Vec<u8>>,
}

impl PdfBuilder {
    fn push(&mut self, data: Vec<u8>) -> usize {
        self.objects.push(data);
        self.objects.len() - 1
    }
}

impl Default for PdfWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl PdfWriter {
    pub fn new() -> Self {
        Self
    }

    /// Write one `page_w_pt × page_h_pt` page per rendered bitmap.
    pub fn write(
        &self,
        pages: &[RenderedPage],
        metadata: &Metadata,
        page_w_pt: f64,
        page_h_pt: f64,
    ) -> Vec<u8> {
        // 0 = placeholder (PDF objects are 1-indexed)
        // 1 = Catalog
        // 2 = Pages (page tree root)
        let mut builder = PdfBuilder {
            objects: vec![Vec::new(), Vec::new(), Vec::new()],
        };

        let mut page_obj_ids = Vec::with_capacity(pages.len());
        for page in pages {
            let image_id = builder.push(Self::image_xobject(page));

            let content = format!(
                "q\n{:.2} 0 0 {:.2} 0 0 cm\n/Im0 Do\nQ\n",
                page_w_pt, page_h_pt
            );
            let compressed = compress_to_vec_zlib(content.as_bytes(), 6);
            let mut content_data: Vec<u8> = Vec::new();
            let _ = write!(
                content_data,
                "<< /Length {} /Filter /FlateDecode >>\nstream\n",
                compressed.len()
            );
            content_data.extend_from_slice(&compressed);
            content_data.extend_from_slice(b"\nendstream");
            let content_id = builder.push(content_data);

            let page_dict = format!(
                "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {:.2} {:.2}] \
                 /Contents {} 0 R /Resources << /XObject << /Im0 {} 0 R >> >> >>",
                page_w_pt, page_h_pt, content_id, image_id
            );
            page_obj_ids.push(builder.push(page_dict.into_bytes()));
        }

        builder.objects[1] = b"<< /Type /Catalog /Pages 2 0 R >>".to_vec();

        let kids: String = page_obj_ids
            .iter()
            .map(|id| format!("{} 0 R", id))
            .collect::<Vec<_>>()
            .join(" ");
        builder.objects[2] = format!(
            "<< /Type /Pages /Kids [{}] /Count {} >>",
            kids,
            page_obj_ids.len()
        )
        .into_bytes();

        let info_id = builder.push(Self::info_dict(metadata).into_bytes());
        log::debug!("PDF: {} pages, {} objects", pages.len(), builder.objects.len() - 1);
        Self::serialize(&builder, info_id)
    }

    fn image_xobject(page: &RenderedPage) -> Vec<u8> {
        let mut obj_data: Vec<u8> = Vec::new();
        let _ = write!(
            obj_data,
            "<< /Type /XObject /Subtype /Image \
             /Width {} /Height {} \
             /ColorSpace /DeviceRGB \
             /BitsPerComponent 8 \
             /Filter /DCTDecode \
             /Length {} >>\nstream\n",
            page.width_px,
            page.height_px,
            page.jpeg.len()
        );
        obj_data.extend_from_slice(&page.jpeg);
        obj_data.extend_from_slice(b"\nendstream");
        obj_data
    }

    fn info_dict(metadata: &Metadata) -> String {
        let mut info = String::from("<< ");
        let fields = [
            ("Title", &metadata.title),
            ("Author", &metadata.author),
            ("Subject", &metadata.subject),
            ("Keywords", &metadata.keywords),
        ];
        for (key, value) in fields {
            if let Some(value) = value {
                let _ = write!(info, "/{} {} ", key, Self::text_string(value));
            }
        }
        let creator = metadata.creator.as_deref().unwrap_or("lamina");
        let _ = write!(
            info,
            "/Creator {} /Producer (lamina {}) >>",
            Self::text_string(creator),
            env!("CARGO_PKG_VERSION")
        );
        info
    }

    /// A PDF text string: literal for ASCII, UTF-16BE hex otherwise.
    fn text_string(s: &str) -> String {
        if s.is_ascii() {
            return format!("({})", Self::escape_pdf_string(s));
        }
        let mut hex = String::from("<FEFF");
        for unit in s.encode_utf16() {
            let _ = write!(hex, "{:04X}", unit);
        }
        hex.push('>');
        hex
    }

    /// Escape special characters in a PDF string.
    fn escape_pdf_string(s: &str) -> String {
        s.replace('\\', "\\\\")
            .replace('(', "\\(")
            .replace(')', "\\)")
    }

    /// Serialize all objects into the final PDF byte stream.
    fn serialize(builder: &PdfBuilder, info_obj_id: usize) -> Vec<u8> {
        let mut output: Vec<u8> = Vec::new();
        let mut offsets: Vec<usize> = vec![0; builder.objects.len()];

        // Header
        output.extend_from_slice(b"%PDF-1.7\n");
        output.extend_from_slice(b"%\xe2\xe3\xcf\xd3\n");

        for (i, obj) in builder.objects.iter().enumerate().skip(1) {
            offsets[i] = output.len();
            let header = format!("{} 0 obj\n", i);
            output.extend_from_slice(header.as_bytes());
            output.extend_from_slice(obj);
            output.extend_from_slice(b"\nendobj\n\n");
        }

        let xref_offset = output.len();
        let _ = write!(output, "xref\n0 {}\n", builder.objects.len());
        let _ = write!(output, "0000000000 65535 f \n");
        for offset in offsets.iter().skip(1) {
            let _ = write!(output, "{:010} 00000 n \n", offset);
        }

        let _ = write!(
            output,
            "trailer\n<< /Size {} /Root 1 0 R /Info {} 0 R >>\nstartxref\n{}\n%%EOF\n",
            builder.objects.len(),
            info_obj_id,
            xref_offset
        );

        output
    }
}
