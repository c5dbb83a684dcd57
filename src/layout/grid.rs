//! # Grid and Table Layout
//!
//! Both containers reduce to the same thing here: rows of cells over
//! fractional tracks. A grid has `repeat(N, 1fr)` columns with a gap and
//! auto-placed items; a table gives each row its own tracks, weighted by
//! `colspan`. Cells in a row stretch to the tallest one.

use super::{rect_command, LayoutElement, LayoutEngine};
use crate::dom::Element;
use crate::style::{Dimension, Display, ResolvedStyle};

/// Split `available` (minus gaps) between tracks proportionally to their
/// fractional weights.
pub fn resolve_tracks(weights: &[f64], available: f64, gap: f64) -> Vec<f64> {
    if weights.is_empty() {
        return vec![];
    }
    let total_gap = gap * (weights.len() - 1) as f64;
    let space = (available - total_gap).max(0.0);
    let total_fr: f64 = weights.iter().sum();
    if total_fr <= 0.0 {
        return vec![0.0; weights.len()];
    }
    weights.iter().map(|w| space * w / total_fr).collect()
}

/// Stretch every cell of a row to the row's height.
fn stretch(cells: &mut [LayoutElement], margins: &[(f64, f64)], row_height: f64) {
    for (cell, (top, bottom)) in cells.iter_mut().zip(margins) {
        cell.height = (row_height - top - bottom).max(cell.height);
    }
}

impl LayoutEngine<'_> {
    /// `display: grid` with equal columns. Rows are separated by the gap.
    pub(super) fn layout_grid(
        &self,
        el: &Element,
        style: &ResolvedStyle,
        x: f64,
        y: f64,
        width: f64,
        out: &mut Vec<LayoutElement>,
    ) -> f64 {
        let columns = style.grid_columns.max(1);
        let tracks = resolve_tracks(&vec![1.0; columns], width, style.gap);
        let items: Vec<(&Element, ResolvedStyle)> = el
            .children
            .iter()
            .filter_map(|c| c.as_element())
            .map(|item| (item, self.styles.resolve(item, style)))
            .filter(|(_, s)| s.display != Display::None)
            .collect();

        let mut row_y = y;
        for (row_index, row) in items.chunks(columns).enumerate() {
            if row_index > 0 {
                row_y += style.gap;
            }
            let mut cells = Vec::with_capacity(row.len());
            let mut margins = Vec::with_capacity(row.len());
            let mut row_height = 0.0_f64;
            let mut cell_x = x;
            for ((item, item_style), track) in row.iter().zip(&tracks) {
                let top = row_y + item_style.margin.top;
                let cell = self.layout_box(item, item_style, cell_x, top, *track, None);
                row_height =
                    row_height.max(item_style.margin.top + cell.height + item_style.margin.bottom);
                margins.push((item_style.margin.top, item_style.margin.bottom));
                cells.push(cell);
                cell_x += track + style.gap;
            }
            stretch(&mut cells, &margins, row_height);
            out.extend(cells);
            row_y += row_height;
        }
        row_y - y
    }

    /// Rows directly under the table or inside `thead`/`tbody`/`tfoot`,
    /// stacked without gaps. Other children (a `caption`) lay out as blocks.
    pub(super) fn layout_table(
        &self,
        el: &Element,
        style: &ResolvedStyle,
        x: f64,
        y: f64,
        width: f64,
        out: &mut Vec<LayoutElement>,
    ) -> f64 {
        let mut cursor = y;
        for child in el.children.iter().filter_map(|c| c.as_element()) {
            let child_style = self.styles.resolve(child, style);
            match child_style.display {
                Display::None => {}
                Display::TableRowGroup => {
                    for row in child.children.iter().filter_map(|c| c.as_element()) {
                        let row_style = self.styles.resolve(row, &child_style);
                        if row_style.display == Display::TableRow {
                            cursor += self.layout_row(row, &row_style, x, cursor, width, out);
                        }
                    }
                }
                Display::TableRow => {
                    cursor += self.layout_row(child, &child_style, x, cursor, width, out);
                }
                _ => {
                    let top = cursor + child_style.margin.top;
                    let boxed = self.layout_box(child, &child_style, x, top, width, None);
                    cursor = top + boxed.height + child_style.margin.bottom;
                    out.push(boxed);
                }
            }
        }
        cursor - y
    }

    fn layout_row(
        &self,
        row: &Element,
        row_style: &ResolvedStyle,
        x: f64,
        y: f64,
        width: f64,
        out: &mut Vec<LayoutElement>,
    ) -> f64 {
        let cells: Vec<(&Element, ResolvedStyle, f64)> = row
            .children
            .iter()
            .filter_map(|c| c.as_element())
            .map(|cell| {
                let mut s = self.styles.resolve(cell, row_style);
                // Columns come from colspan weights, not cell widths.
                s.width = Dimension::Auto;
                s.margin = Default::default();
                let span = cell
                    .get_attr("colspan")
                    .and_then(|v| v.trim().parse::<usize>().ok())
                    .unwrap_or(1)
                    .max(1);
                (cell, s, span as f64)
            })
            .filter(|(_, s, _)| s.display != Display::None)
            .collect();
        if cells.is_empty() {
            return 0.0;
        }

        let weights: Vec<f64> = cells.iter().map(|(_, _, span)| *span).collect();
        let tracks = resolve_tracks(&weights, width, 0.0);

        let mut boxes = Vec::with_capacity(cells.len());
        let mut cell_x = x;
        for ((cell, cell_style, _), track) in cells.iter().zip(&tracks) {
            boxes.push(self.layout_box(cell, cell_style, cell_x, y, *track, None));
            cell_x += track;
        }
        let row_height = boxes.iter().map(|b| b.height).fold(0.0, f64::max);
        let margins = vec![(0.0, 0.0); boxes.len()];
        stretch(&mut boxes, &margins, row_height);

        out.push(LayoutElement {
            x,
            y,
            width,
            height: row_height,
            draw: rect_command(row_style),
            children: boxes,
        });
        row_height
    }
}
