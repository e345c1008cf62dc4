use crate::model::{PageGeometry, Side, VerticalAlign};

use super::paginate::{DrawOp, FIT_EPSILON, Fragment, layout_blocks};
use super::{Table, TableCell};

/// A cell laid out at its final x position, with its content fragments.
struct PlacedCell<'t> {
    cell: &'t TableCell,
    row: usize,
    x: f32,
    width: f32,
    content: Vec<Fragment>,
    content_height: f32,
}

/// Lay out a table into row fragments.
///
/// Rows joined by a rowspan form one band, kept on a single page when it
/// fits. A taller band is split between rows, and a single row taller than
/// the page content area is sliced between its lines.
pub(super) fn layout_table(table: &Table, x: f32, width: f32, geometry: &PageGeometry) -> Vec<Fragment> {
    let pad = geometry.cell_padding;
    let col_w = width / table.columns.max(1) as f32;
    let min_row_h = geometry.line_pitch(geometry.font_size) + 2.0 * pad;

    let cells: Vec<PlacedCell> = table
        .rows
        .iter()
        .enumerate()
        .flat_map(|(ri, row)| row.cells.iter().map(move |cell| (ri, cell)))
        .map(|(row, cell)| {
            let cell_x = x + cell.column as f32 * col_w;
            let cell_w = col_w * cell.colspan as f32;
            let inner_w = (cell_w - 2.0 * pad).max(1.0);
            let content = trim_spacers(layout_blocks(&cell.content, cell_x + pad, inner_w, geometry));
            let content_height = content.iter().map(|f| f.height).sum();
            PlacedCell {
                cell,
                row,
                x: cell_x,
                width: cell_w,
                content,
                content_height,
            }
        })
        .collect();

    let row_count = table.rows.len();
    let mut row_h = vec![min_row_h; row_count];
    for pc in cells.iter().filter(|pc| pc.cell.rowspan == 1) {
        row_h[pc.row] = row_h[pc.row].max(pc.content_height + 2.0 * pad);
    }
    for pc in cells.iter().filter(|pc| pc.cell.rowspan > 1) {
        let last = (pc.row + pc.cell.rowspan as usize - 1).min(row_count - 1);
        let have: f32 = row_h[pc.row..=last].iter().sum();
        let need = pc.content_height + 2.0 * pad;
        if need > have {
            row_h[last] += need - have;
        }
    }

    let mut fragments = Vec::new();
    let mut band_start = 0;
    while band_start < row_count {
        let mut band_end = band_start;
        let mut r = band_start;
        while r <= band_end {
            for pc in cells.iter().filter(|pc| pc.row == r) {
                band_end = band_end.max((r + pc.cell.rowspan as usize - 1).min(row_count - 1));
            }
            r += 1;
        }

        let band_cells: Vec<&PlacedCell> = cells
            .iter()
            .filter(|pc| (band_start..=band_end).contains(&pc.row))
            .collect();
        let band_h: f32 = row_h[band_start..=band_end].iter().sum();

        if band_h > geometry.content_height() + FIT_EPSILON {
            fragments.extend(split_band(&band_cells, &row_h, band_start, band_end, geometry));
        } else {
            let mut ops = BandOps::default();
            for pc in &band_cells {
                let top: f32 = row_h[band_start..pc.row].iter().sum();
                let last = (pc.row + pc.cell.rowspan as usize - 1).min(band_end);
                let height: f32 = row_h[pc.row..=last].iter().sum();
                ops.draw_cell(pc, &pc.content, top, height, pad);
            }
            fragments.push(ops.into_fragment(band_h));
        }
        band_start = band_end + 1;
    }
    fragments
}

fn trim_spacers(mut frags: Vec<Fragment>) -> Vec<Fragment> {
    while frags.last().is_some_and(|f| f.spacer) {
        frags.pop();
    }
    let lead = frags.iter().take_while(|f| f.spacer).count();
    frags.drain(..lead);
    frags
}

/// Split a band taller than the page content area. Cuts fall between rows
/// where possible and a row that is still too tall is cut between its
/// lines. A cell crossing a cut carries its remaining content into the
/// following slices.
fn split_band(
    cells: &[&PlacedCell],
    row_h: &[f32],
    first: usize,
    last: usize,
    geometry: &PageGeometry,
) -> Vec<Fragment> {
    let pad = geometry.cell_padding;
    let limit = geometry.content_height();
    let slicer = Slicer {
        cells,
        room: (limit - 2.0 * pad).max(1.0),
        min_row_h: geometry.line_pitch(geometry.font_size) + 2.0 * pad,
        pad,
    };
    let span_end = |pc: &PlacedCell| (pc.row + pc.cell.rowspan as usize - 1).min(last);

    let mut runs = Vec::new();
    let mut start = first;
    let mut used = 0.0f32;
    for r in first..=last {
        if r > start && used + row_h[r] > limit + FIT_EPSILON {
            runs.push((start, r - 1));
            start = r;
            used = 0.0;
        }
        used += row_h[r];
    }
    runs.push((start, last));

    // Per cell: index of the next content fragment to draw.
    let mut taken = vec![0usize; cells.len()];
    let mut fragments = Vec::new();
    for (lo, hi) in runs {
        let crossing: Vec<usize> = (0..cells.len())
            .filter(|&i| cells[i].row <= hi && span_end(cells[i]) >= lo)
            .collect();
        let ending: Vec<usize> = crossing
            .iter()
            .copied()
            .filter(|&i| span_end(cells[i]) <= hi)
            .collect();
        let run_h: f32 = row_h[lo..=hi].iter().sum();

        if run_h > limit + FIT_EPSILON {
            fragments.extend(slicer.slice(&crossing, &ending, &mut taken));
            continue;
        }

        let mut ops = BandOps::default();
        for &i in &crossing {
            let pc = cells[i];
            let top_row = pc.row.max(lo);
            let end_row = span_end(pc).min(hi);
            let top: f32 = row_h[lo..top_row].iter().sum();
            let height: f32 = row_h[top_row..=end_row].iter().sum();
            if pc.row >= lo && span_end(pc) <= hi {
                taken[i] = pc.content.len();
                ops.draw_cell(pc, &pc.content, top, height, pad);
            } else {
                let from = taken[i];
                taken[i] = fit(&pc.content, from, height - 2.0 * pad, false);
                ops.draw_cell_part(pc, &pc.content[from..taken[i]], top, height, pad, VerticalAlign::Top);
            }
        }
        fragments.push(ops.into_fragment(run_h));

        let spill: Vec<usize> = ending
            .into_iter()
            .filter(|&i| taken[i] < cells[i].content.len())
            .collect();
        if !spill.is_empty() {
            fragments.extend(slicer.slice(&spill, &spill, &mut taken));
        }
    }
    fragments
}

struct Slicer<'a, 't> {
    cells: &'a [&'a PlacedCell<'t>],
    room: f32,
    min_row_h: f32,
    pad: f32,
}

impl Slicer<'_, '_> {
    /// Emit page-sized slices until every cell in `finish` has drawn all of
    /// its content. Each cell in `draw` is boxed on every slice.
    fn slice(&self, draw: &[usize], finish: &[usize], taken: &mut [usize]) -> Vec<Fragment> {
        let mut out = Vec::new();
        loop {
            let parts: Vec<(usize, usize, usize)> = draw
                .iter()
                .map(|&i| (i, taken[i], fit(&self.cells[i].content, taken[i], self.room, true)))
                .collect();
            let slice_h = parts
                .iter()
                .map(|&(i, from, to)| {
                    self.cells[i].content[from..to].iter().map(|f| f.height).sum::<f32>() + 2.0 * self.pad
                })
                .fold(self.min_row_h, f32::max);

            let mut ops = BandOps::default();
            for &(i, from, to) in &parts {
                taken[i] = to;
                let pc = self.cells[i];
                ops.draw_cell_part(pc, &pc.content[from..to], 0.0, slice_h, self.pad, VerticalAlign::Top);
            }
            out.push(ops.into_fragment(slice_h));

            if finish.iter().all(|&i| taken[i] >= self.cells[i].content.len()) {
                return out;
            }
        }
    }
}

/// End of the content run starting at `from` that fits in `room`. With
/// `force` at least one fragment is taken.
fn fit(content: &[Fragment], from: usize, room: f32, force: bool) -> usize {
    let mut used = 0.0f32;
    let mut end = from;
    while let Some(frag) = content.get(end) {
        if used + frag.height > room + FIT_EPSILON && !(force && end == from) {
            break;
        }
        used += frag.height;
        end += 1;
    }
    end
}

/// Draw operations of a band, layered so that borders paint over content.
#[derive(Default)]
struct BandOps {
    backgrounds: Vec<DrawOp>,
    content: Vec<DrawOp>,
    borders: Vec<DrawOp>,
}

impl BandOps {
    fn draw_cell(&mut self, pc: &PlacedCell, content: &[Fragment], top: f32, height: f32, pad: f32) {
        self.draw_cell_part(pc, content, top, height, pad, pc.cell.vertical_align);
    }

    fn draw_cell_part(
        &mut self,
        pc: &PlacedCell,
        content: &[Fragment],
        top: f32,
        height: f32,
        pad: f32,
        valign: VerticalAlign,
    ) {
        if let Some(color) = pc.cell.background {
            self.backgrounds.push(DrawOp::Rect {
                x: pc.x,
                y: top,
                width: pc.width,
                height,
                color,
            });
        }

        let content_h: f32 = content.iter().map(|f| f.height).sum();
        let free = (height - 2.0 * pad - content_h).max(0.0);
        let mut y = top
            + pad
            + match valign {
                VerticalAlign::Top => 0.0,
                VerticalAlign::Middle => free / 2.0,
                VerticalAlign::Bottom => free,
            };
        for frag in content {
            self.content.extend(frag.ops.iter().cloned().map(|op| op.shifted(y)));
            y += frag.height;
        }

        let (left, right, bottom) = (pc.x, pc.x + pc.width, top + height);
        for (side, border) in Side::ALL.iter().zip(pc.cell.borders) {
            let Some(b) = border else {
                continue;
            };
            let (x1, y1, x2, y2) = match side {
                Side::Top => (left, top, right, top),
                Side::Bottom => (left, bottom, right, bottom),
                Side::Left => (left, top, left, bottom),
                Side::Right => (right, top, right, bottom),
            };
            self.borders.push(DrawOp::Line {
                x1,
                y1,
                x2,
                y2,
                width: b.width,
                color: b.color,
            });
        }
    }

    fn into_fragment(self, height: f32) -> Fragment {
        let mut ops = self.backgrounds;
        ops.extend(self.content);
        ops.extend(self.borders);
        Fragment {
            height,
            ops,
            spacer: false,
            baseline: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{FlowNode, build_flow};

    fn geometry() -> PageGeometry {
        PageGeometry {
            page_width: 300.0,
            page_height: 200.0,
            margin_top: 20.0,
            margin_bottom: 20.0,
            margin_left: 20.0,
            margin_right: 20.0,
            font_size: 10.0,
            line_height: 1.2,
            paragraph_spacing: 0.0,
            cell_padding: 2.0,
            print_page_numbers: false,
        }
    }

    fn first_table(html: &str) -> Table {
        match build_flow(html).into_iter().next() {
            Some(FlowNode::Table(t)) => t,
            other => panic!("expected table, got {other:?}"),
        }
    }

    #[test]
    fn one_fragment_per_row() {
        let t = first_table("<table><tr><td>a</td></tr><tr><td>b</td></tr></table>");
        let frags = layout_table(&t, 0.0, 200.0, &geometry());
        assert_eq!(frags.len(), 2);
        assert!((frags[0].height - 16.0).abs() < 0.01);
    }

    #[test]
    fn rowspan_rows_form_one_band() {
        let t = first_table(
            "<table><tr><td rowspan=\"2\">a</td><td>b</td></tr><tr><td>c</td></tr><tr><td>d</td><td>e</td></tr></table>",
        );
        let frags = layout_table(&t, 0.0, 200.0, &geometry());
        assert_eq!(frags.len(), 2);
        assert!((frags[0].height - 32.0).abs() < 0.01);
    }

    #[test]
    fn oversize_row_is_sliced() {
        let body = "<p>line</p>".repeat(30);
        let t = first_table(&format!("<table><tr><td>{body}</td></tr></table>"));
        let frags = layout_table(&t, 0.0, 200.0, &geometry());
        assert!(frags.len() >= 3, "{}", frags.len());
        assert!(frags.iter().all(|f| f.height <= geometry().content_height() + 0.01));
    }

    #[test]
    fn tall_rowspan_band_is_split_between_rows() {
        let mut rows = String::from("<tr><td rowspan=\"12\">side</td><td>r0</td></tr>");
        for i in 1..12 {
            rows.push_str(&format!("<tr><td>r{i}</td></tr>"));
        }
        let t = first_table(&format!("<table>{rows}</table>"));
        let frags = layout_table(&t, 0.0, 200.0, &geometry());
        // twelve 16pt rows on a 160pt page: ten, then two
        let heights: Vec<f32> = frags.iter().map(|f| f.height).collect();
        assert_eq!(heights.len(), 2, "{heights:?}");
        assert!((heights[0] - 160.0).abs() < 0.01 && (heights[1] - 32.0).abs() < 0.01, "{heights:?}");
        let texts = |f: &Fragment| {
            f.ops
                .iter()
                .filter_map(|op| match op {
                    DrawOp::Text { text, .. } => Some(text.clone()),
                    _ => None,
                })
                .collect::<Vec<_>>()
        };
        assert!(texts(&frags[0]).contains(&"side".to_string()));
        assert!(texts(&frags[1]).contains(&"r11".to_string()));
    }

    #[test]
    fn spanning_cell_content_continues_after_cut() {
        let side = "<p>s</p>".repeat(20);
        let t = first_table(&format!(
            "<table><tr><td rowspan=\"2\">{side}</td><td>a</td></tr><tr><td>b</td></tr></table>"
        ));
        let frags = layout_table(&t, 0.0, 200.0, &geometry());
        assert!(frags.len() >= 2, "{}", frags.len());
        assert!(frags.iter().all(|f| f.height <= geometry().content_height() + 0.01));
        let lines: usize = frags
            .iter()
            .flat_map(|f| &f.ops)
            .filter(|op| matches!(op, DrawOp::Text { text, .. } if text == "s"))
            .count();
        assert_eq!(lines, 20);
    }

    #[test]
    fn borders_paint_last() {
        let t = first_table("<table><tr><td style=\"background-color:#0000ff\">a</td></tr></table>");
        let frags = layout_table(&t, 0.0, 200.0, &geometry());
        let ops = &frags[0].ops;
        assert!(matches!(ops.first(), Some(DrawOp::Rect { color: [0, 0, 255], .. })));
        assert!(matches!(ops.last(), Some(DrawOp::Line { .. })));
        assert_eq!(ops.iter().filter(|op| matches!(op, DrawOp::Line { .. })).count(), 4);
    }
}
