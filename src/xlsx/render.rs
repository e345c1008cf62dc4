use std::collections::HashMap;

use crate::html::{escape_attr, escape_text, format_style};
use crate::units::format_percent;

use super::{CellRange, CellRef, DEFAULT_COLUMN_PX, StyleTable, Worksheet};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MergeEntry {
    pub colspan: u32,
    pub rowspan: u32,
    /// Covered by another cell's merge; not emitted.
    pub skip: bool,
}

impl Default for MergeEntry {
    fn default() -> Self {
        Self {
            colspan: 1,
            rowspan: 1,
            skip: false,
        }
    }
}

/// Per-cell span information derived from a worksheet's merge ranges.
#[derive(Debug, Default)]
pub struct MergeMap {
    entries: HashMap<CellRef, MergeEntry>,
}

impl MergeMap {
    /// Overlapping ranges are resolved in favour of the first one listed.
    pub fn build(merges: &[CellRange]) -> Self {
        let mut entries = HashMap::new();
        for range in merges {
            let cells: Vec<CellRef> = (range.start.row..=range.end.row)
                .flat_map(|r| (range.start.col..=range.end.col).map(move |c| CellRef::new(r, c)))
                .collect();
            if cells.iter().any(|c| entries.contains_key(c)) {
                log::warn!("merge range {range:?} overlaps an earlier merge, ignored");
                continue;
            }
            for cell in cells {
                let entry = if cell == range.start {
                    MergeEntry {
                        colspan: range.width(),
                        rowspan: range.height(),
                        skip: false,
                    }
                } else {
                    MergeEntry {
                        skip: true,
                        ..MergeEntry::default()
                    }
                };
                entries.insert(cell, entry);
            }
        }
        Self { entries }
    }

    pub fn get(&self, at: CellRef) -> MergeEntry {
        self.entries.get(&at).copied().unwrap_or_default()
    }
}

/// Column widths of `range` as percentages of their sum.
pub fn column_percentages(sheet: &Worksheet, range: CellRange) -> Vec<f32> {
    let px: Vec<f32> = (range.start.col..=range.end.col)
        .map(|c| {
            sheet
                .column_widths_px
                .get(&c)
                .copied()
                .filter(|w| *w > 0.0)
                .unwrap_or(DEFAULT_COLUMN_PX)
        })
        .collect();
    let total: f32 = px.iter().sum();
    px.iter().map(|w| w / total * 100.0).collect()
}

/// Render a worksheet's used range as an HTML table.
///
/// The first row is emitted as header cells. `styles` supplies alignment,
/// fill and number formats; cells whose style index is out of range keep
/// their raw value and structural styling only. An empty sheet renders as
/// an empty string.
pub fn render_worksheet(sheet: &Worksheet, styles: Option<&StyleTable>) -> String {
    let Some(range) = sheet.used_range() else {
        return String::new();
    };
    let merges = MergeMap::build(&sheet.merges);
    let widths = column_percentages(sheet, range);

    let mut out = String::from("<table style=\"width:100%\"><colgroup>");
    for w in &widths {
        out.push_str(&format!("<col style=\"width:{}\">", format_percent(*w)));
    }
    out.push_str("</colgroup>");

    for row in range.start.row..=range.end.row {
        let tag = if row == range.start.row { "th" } else { "td" };
        out.push_str("<tr>");
        for col in range.start.col..=range.end.col {
            let at = CellRef::new(row, col);
            let span = merges.get(at);
            if span.skip {
                continue;
            }
            let cell = sheet.cells.get(&at);

            out.push('<');
            out.push_str(tag);
            if span.colspan > 1 {
                out.push_str(&format!(" colspan=\"{}\"", span.colspan));
            }
            if span.rowspan > 1 {
                out.push_str(&format!(" rowspan=\"{}\"", span.rowspan));
            }
            let first = (col - range.start.col) as usize;
            let span_width: f32 = widths[first..(first + span.colspan as usize).min(widths.len())]
                .iter()
                .sum();
            let mut css: Vec<(String, String)> = vec![("width".into(), format_percent(span_width))];
            if let Some(format) = styles.and_then(|s| s.get(cell.and_then(|c| c.style))) {
                if let Some(h) = format.horizontal {
                    css.push(("text-align".into(), h.css().into()));
                }
                if let Some(v) = format.vertical {
                    css.push(("vertical-align".into(), v.css().into()));
                }
                if let Some(fill) = &format.fill {
                    css.push(("background-color".into(), fill.clone()));
                }
            }
            out.push_str(" style=\"");
            out.push_str(&escape_attr(&format_style(&css)));
            out.push('"');
            out.push('>');

            let text = match (cell, styles) {
                (Some(c), Some(s)) => s.display(c),
                (Some(c), None) => c.value.raw_text(),
                (None, _) => String::new(),
            };
            let lines: Vec<String> = text
                .replace("\r\n", "\n")
                .split('\n')
                .map(escape_text)
                .collect();
            out.push_str(&lines.join("<br>"));

            out.push_str("</");
            out.push_str(tag);
            out.push('>');
        }
        out.push_str("</tr>");
    }
    out.push_str("</table>");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xlsx::CellValue;

    #[test]
    fn merge_map_marks_covered_cells() {
        let map = MergeMap::build(&[CellRange::parse_a1("A1:B2").unwrap()]);
        assert_eq!(
            map.get(CellRef::new(0, 0)),
            MergeEntry { colspan: 2, rowspan: 2, skip: false }
        );
        assert!(map.get(CellRef::new(0, 1)).skip);
        assert!(map.get(CellRef::new(1, 0)).skip);
        assert!(map.get(CellRef::new(1, 1)).skip);
        assert!(!map.get(CellRef::new(2, 0)).skip);
    }

    #[test]
    fn overlapping_merge_is_ignored() {
        let map = MergeMap::build(&[
            CellRange::parse_a1("A1:B1").unwrap(),
            CellRange::parse_a1("B1:C1").unwrap(),
        ]);
        assert_eq!(map.get(CellRef::new(0, 0)).colspan, 2);
        assert!(!map.get(CellRef::new(0, 2)).skip);
    }

    #[test]
    fn newlines_become_breaks() {
        let mut sheet = Worksheet::default();
        sheet.set("A1", CellValue::Text("a & b\nc".into()));
        let html = render_worksheet(&sheet, None);
        assert!(html.contains(">a &amp; b<br>c</th>"), "{html}");
    }

    #[test]
    fn empty_sheet_renders_nothing() {
        assert_eq!(render_worksheet(&Worksheet::default(), None), "");
    }
}
