mod format;
mod render;

use std::collections::{BTreeMap, HashMap};
use std::io::Cursor;

use crate::docx::read_zip_text;
use crate::error::{Error, Result};
use crate::model::{Alignment, VerticalAlign};
use crate::units::parse_hex_color;

pub use format::{builtin_format_code, format_value};
pub use render::{MergeEntry, MergeMap, column_percentages, render_worksheet};

const SML_NS: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
const REL_NS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

/// Column width used when a worksheet gives no hint, in pixels.
pub const DEFAULT_COLUMN_PX: f32 = 80.0;

fn is_sml(node: roxmltree::Node, name: &str) -> bool {
    node.tag_name().name() == name && node.tag_name().namespace() == Some(SML_NS)
}

fn sml<'a>(node: roxmltree::Node<'a, 'a>, name: &str) -> Option<roxmltree::Node<'a, 'a>> {
    node.children().find(|n| is_sml(*n, name))
}

/// Zero-based cell coordinate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellRef {
    pub row: u32,
    pub col: u32,
}

impl CellRef {
    pub fn new(row: u32, col: u32) -> Self {
        Self { row, col }
    }

    /// Parse an A1 reference (`$` anchors allowed).
    pub fn parse_a1(s: &str) -> Option<Self> {
        let s = s.replace('$', "");
        let split = s.find(|c: char| c.is_ascii_digit())?;
        let (letters, digits) = s.split_at(split);
        if letters.is_empty() || !letters.chars().all(|c| c.is_ascii_alphabetic()) {
            return None;
        }
        let col = letters
            .chars()
            .try_fold(0u32, |acc, c| {
                acc.checked_mul(26)?
                    .checked_add(c.to_ascii_uppercase() as u32 - 'A' as u32 + 1)
            })?;
        let row: u32 = digits.parse().ok()?;
        if row == 0 {
            return None;
        }
        Some(Self::new(row - 1, col - 1))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CellRange {
    pub start: CellRef,
    pub end: CellRef,
}

impl CellRange {
    pub fn parse_a1(s: &str) -> Option<Self> {
        let (a, b) = s.split_once(':').unwrap_or((s, s));
        let a = CellRef::parse_a1(a)?;
        let b = CellRef::parse_a1(b)?;
        Some(Self {
            start: CellRef::new(a.row.min(b.row), a.col.min(b.col)),
            end: CellRef::new(a.row.max(b.row), a.col.max(b.col)),
        })
    }

    pub fn contains(&self, r: CellRef) -> bool {
        (self.start.row..=self.end.row).contains(&r.row)
            && (self.start.col..=self.end.col).contains(&r.col)
    }

    pub fn width(&self) -> u32 {
        self.end.col - self.start.col + 1
    }

    pub fn height(&self) -> u32 {
        self.end.row - self.start.row + 1
    }

    fn union(self, other: CellRange) -> CellRange {
        CellRange {
            start: CellRef::new(self.start.row.min(other.start.row), self.start.col.min(other.start.col)),
            end: CellRef::new(self.end.row.max(other.end.row), self.end.col.max(other.end.col)),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum CellValue {
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
    Error(String),
}

impl CellValue {
    /// Raw stringification used when no display format applies.
    pub fn raw_text(&self) -> String {
        match self {
            CellValue::Empty => String::new(),
            CellValue::Text(s) | CellValue::Error(s) => s.clone(),
            CellValue::Number(n) => format::general(*n),
            CellValue::Bool(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SheetCell {
    pub value: CellValue,
    /// Index into the workbook's `cellXfs` table.
    pub style: Option<usize>,
}

#[derive(Clone, Debug, Default)]
pub struct Worksheet {
    pub name: String,
    pub cells: BTreeMap<CellRef, SheetCell>,
    pub merges: Vec<CellRange>,
    /// Zero-based column → width in pixels.
    pub column_widths_px: HashMap<u32, f32>,
}

impl Worksheet {
    /// Bounding box of all non-empty cells and merge ranges.
    pub fn used_range(&self) -> Option<CellRange> {
        let cells = self
            .cells
            .iter()
            .filter(|(_, c)| c.value != CellValue::Empty)
            .map(|(r, _)| CellRange { start: *r, end: *r });
        cells
            .chain(self.merges.iter().copied())
            .reduce(CellRange::union)
    }

    pub fn set(&mut self, a1: &str, value: CellValue) {
        if let Some(r) = CellRef::parse_a1(a1) {
            self.cells.insert(r, SheetCell { value, style: None });
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct CellFormat {
    pub horizontal: Option<Alignment>,
    pub vertical: Option<VerticalAlign>,
    pub fill: Option<String>,
    pub num_fmt_id: u32,
    /// Custom format code; built-in ids are resolved through [`builtin_format_code`].
    pub format_code: Option<String>,
}

impl CellFormat {
    pub fn number_format(&self) -> Option<&str> {
        self.format_code
            .as_deref()
            .or_else(|| builtin_format_code(self.num_fmt_id))
    }
}

/// The workbook's `cellXfs` table.
#[derive(Clone, Debug, Default)]
pub struct StyleTable {
    pub formats: Vec<CellFormat>,
}

impl StyleTable {
    pub fn get(&self, index: Option<usize>) -> Option<&CellFormat> {
        let i = index?;
        let f = self.formats.get(i);
        if f.is_none() {
            log::warn!("cell style index {i} out of range ({} styles)", self.formats.len());
        }
        f
    }

    /// Cell text as the workbook would display it.
    pub fn display(&self, cell: &SheetCell) -> String {
        match (&cell.value, self.get(cell.style).and_then(CellFormat::number_format)) {
            (CellValue::Number(n), Some(code)) => format_value(*n, code),
            (v, _) => v.raw_text(),
        }
    }
}

pub struct Workbook {
    pub sheets: Vec<Worksheet>,
    pub styles: StyleTable,
}

pub fn read_workbook(bytes: &[u8]) -> Result<Workbook> {
    let mut zip = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| Error::CorruptArchive(format!("not a ZIP archive: {e}")))?;

    let workbook_xml = read_zip_text(&mut zip, "xl/workbook.xml")
        .ok_or_else(|| Error::CorruptArchive("missing xl/workbook.xml".into()))?;
    let rels = read_zip_text(&mut zip, "xl/_rels/workbook.xml.rels")
        .map(|xml| parse_rels(&xml))
        .unwrap_or_default();
    let shared = read_zip_text(&mut zip, "xl/sharedStrings.xml")
        .map(|xml| parse_shared_strings(&xml))
        .unwrap_or_default();
    let styles = read_zip_text(&mut zip, "xl/styles.xml")
        .map(|xml| parse_styles(&xml))
        .unwrap_or_default();

    let wb = roxmltree::Document::parse(&workbook_xml)
        .map_err(|e| Error::CorruptArchive(format!("xl/workbook.xml: {e}")))?;
    let mut sheets = Vec::new();
    let sheet_nodes = sml(wb.root_element(), "sheets")
        .into_iter()
        .flat_map(|s| s.children())
        .filter(|n| is_sml(*n, "sheet"));
    for (i, node) in sheet_nodes.enumerate() {
        let name = node.attribute("name").unwrap_or("Sheet").to_string();
        let path = node
            .attribute((REL_NS, "id"))
            .and_then(|rid| rels.get(rid))
            .map(|target| resolve_part(target))
            .unwrap_or_else(|| format!("xl/worksheets/sheet{}.xml", i + 1));
        let Some(xml) = read_zip_text(&mut zip, &path) else {
            log::warn!("worksheet {name:?} missing part {path}");
            continue;
        };
        let mut sheet = parse_worksheet(&xml, &shared)
            .map_err(|e| Error::CorruptArchive(format!("{path}: {e}")))?;
        sheet.name = name;
        sheets.push(sheet);
    }

    Ok(Workbook { sheets, styles })
}

/// Convert the first non-empty worksheet into an HTML table.
pub fn import(bytes: &[u8]) -> Result<String> {
    let workbook = read_workbook(bytes)?;
    let sheet = workbook
        .sheets
        .iter()
        .find(|s| s.used_range().is_some())
        .ok_or(Error::NoUsableContent)?;
    log::debug!(
        "xlsx: rendering sheet {:?} ({} cells, {} merges)",
        sheet.name,
        sheet.cells.len(),
        sheet.merges.len()
    );
    Ok(render_worksheet(sheet, Some(&workbook.styles)))
}

fn resolve_part(target: &str) -> String {
    match target.strip_prefix('/') {
        Some(abs) => abs.to_string(),
        None => format!("xl/{}", target.trim_start_matches("./")),
    }
}

fn parse_rels(xml: &str) -> HashMap<String, String> {
    let Ok(doc) = roxmltree::Document::parse(xml) else {
        return HashMap::new();
    };
    doc.root_element()
        .children()
        .filter(|n| n.tag_name().name() == "Relationship")
        .filter_map(|n| Some((n.attribute("Id")?.to_string(), n.attribute("Target")?.to_string())))
        .collect()
}

fn parse_shared_strings(xml: &str) -> Vec<String> {
    let doc = match roxmltree::Document::parse(xml) {
        Ok(d) => d,
        Err(e) => {
            log::warn!("xl/sharedStrings.xml unreadable: {e}");
            return Vec::new();
        }
    };
    doc.root_element()
        .children()
        .filter(|n| is_sml(*n, "si"))
        .map(rich_text)
        .collect()
}

/// Concatenate `t` elements, skipping phonetic runs.
fn rich_text(node: roxmltree::Node) -> String {
    node.descendants()
        .filter(|n| is_sml(*n, "t") && !n.ancestors().any(|a| is_sml(a, "rPh")))
        .filter_map(|n| n.text())
        .collect()
}

fn parse_styles(xml: &str) -> StyleTable {
    let doc = match roxmltree::Document::parse(xml) {
        Ok(d) => d,
        Err(e) => {
            log::warn!("xl/styles.xml unreadable, cells keep structural styling only: {e}");
            return StyleTable::default();
        }
    };
    let root = doc.root_element();

    let num_fmts: HashMap<u32, String> = sml(root, "numFmts")
        .into_iter()
        .flat_map(|n| n.children())
        .filter(|n| is_sml(*n, "numFmt"))
        .filter_map(|n| {
            Some((
                n.attribute("numFmtId")?.parse().ok()?,
                n.attribute("formatCode")?.to_string(),
            ))
        })
        .collect();

    let fills: Vec<Option<String>> = sml(root, "fills")
        .into_iter()
        .flat_map(|n| n.children())
        .filter(|n| is_sml(*n, "fill"))
        .map(|fill| {
            let pattern = sml(fill, "patternFill")?;
            if pattern.attribute("patternType") != Some("solid") {
                return None;
            }
            let rgb = sml(pattern, "fgColor")?.attribute("rgb")?;
            // ARGB: drop the alpha byte
            let hex = if rgb.len() == 8 { rgb.get(2..)? } else { rgb };
            let [r, g, b] = parse_hex_color(hex)?;
            Some(format!("#{r:02x}{g:02x}{b:02x}"))
        })
        .collect();

    let formats = sml(root, "cellXfs")
        .into_iter()
        .flat_map(|n| n.children())
        .filter(|n| is_sml(*n, "xf"))
        .map(|xf| {
            let num_fmt_id = xf
                .attribute("numFmtId")
                .and_then(|v| v.parse().ok())
                .unwrap_or(0);
            let fill = xf
                .attribute("fillId")
                .and_then(|v| v.parse::<usize>().ok())
                .and_then(|i| fills.get(i).cloned().flatten());
            let alignment = sml(xf, "alignment");
            let horizontal = alignment
                .and_then(|a| a.attribute("horizontal"))
                .and_then(|h| match h {
                    "centerContinuous" => Some(Alignment::Center),
                    "distributed" => Some(Alignment::Justify),
                    other => Alignment::from_css(other),
                });
            let vertical = alignment
                .and_then(|a| a.attribute("vertical"))
                .and_then(|v| match v {
                    "top" => Some(VerticalAlign::Top),
                    "center" => Some(VerticalAlign::Middle),
                    "bottom" => Some(VerticalAlign::Bottom),
                    _ => None,
                });
            CellFormat {
                horizontal,
                vertical,
                fill,
                num_fmt_id,
                format_code: num_fmts.get(&num_fmt_id).cloned(),
            }
        })
        .collect();

    StyleTable { formats }
}

fn parse_worksheet(xml: &str, shared: &[String]) -> std::result::Result<Worksheet, roxmltree::Error> {
    let doc = roxmltree::Document::parse(xml)?;
    let root = doc.root_element();
    let mut sheet = Worksheet::default();

    for col in sml(root, "cols")
        .into_iter()
        .flat_map(|n| n.children())
        .filter(|n| is_sml(*n, "col"))
    {
        let (Some(min), Some(max), Some(width)) = (
            col.attribute("min").and_then(|v| v.parse::<u32>().ok()),
            col.attribute("max").and_then(|v| v.parse::<u32>().ok()),
            col.attribute("width").and_then(|v| v.parse::<f32>().ok()),
        ) else {
            continue;
        };
        let px = (width * 7.0 + 5.0).round();
        // Whole-sheet <col> ranges would otherwise allocate 16k entries.
        for c in min..=max.min(min + 1024) {
            sheet.column_widths_px.insert(c - 1, px);
        }
    }

    for row in sml(root, "sheetData")
        .into_iter()
        .flat_map(|n| n.children())
        .filter(|n| is_sml(*n, "row"))
    {
        let row_index = row.attribute("r").and_then(|v| v.parse::<u32>().ok());
        let mut next_col = 0u32;
        for c in row.children().filter(|n| is_sml(*n, "c")) {
            let at = match c.attribute("r").and_then(CellRef::parse_a1) {
                Some(r) => r,
                None => CellRef::new(row_index.unwrap_or(1).saturating_sub(1), next_col),
            };
            next_col = at.col + 1;
            let raw = sml(c, "v").and_then(|v| v.text()).unwrap_or("");
            let value = match c.attribute("t").unwrap_or("n") {
                "s" => raw
                    .parse::<usize>()
                    .ok()
                    .and_then(|i| shared.get(i))
                    .map(|s| CellValue::Text(s.clone()))
                    .unwrap_or(CellValue::Empty),
                "inlineStr" => sml(c, "is")
                    .map(|is| CellValue::Text(rich_text(is)))
                    .unwrap_or(CellValue::Empty),
                "str" => CellValue::Text(raw.to_string()),
                "b" => CellValue::Bool(raw == "1"),
                "e" => CellValue::Error(raw.to_string()),
                _ if raw.is_empty() => CellValue::Empty,
                _ => raw
                    .parse::<f64>()
                    .map(CellValue::Number)
                    .unwrap_or_else(|_| CellValue::Text(raw.to_string())),
            };
            let style = c.attribute("s").and_then(|v| v.parse::<usize>().ok());
            sheet.cells.insert(at, SheetCell { value, style });
        }
    }

    sheet.merges = sml(root, "mergeCells")
        .into_iter()
        .flat_map(|n| n.children())
        .filter(|n| is_sml(*n, "mergeCell"))
        .filter_map(|n| {
            let r = n.attribute("ref")?;
            let range = CellRange::parse_a1(r);
            if range.is_none() {
                log::warn!("ignoring invalid merge range {r:?}");
            }
            range
        })
        .collect();

    Ok(sheet)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn a1_references() {
        assert_eq!(CellRef::parse_a1("A1"), Some(CellRef::new(0, 0)));
        assert_eq!(CellRef::parse_a1("$AB$12"), Some(CellRef::new(11, 27)));
        assert_eq!(CellRef::parse_a1("A0"), None);
        let r = CellRange::parse_a1("C3:A1").unwrap();
        assert_eq!((r.width(), r.height()), (3, 3));
        assert!(r.contains(CellRef::new(1, 1)));
    }

    #[test]
    fn used_range_covers_merges() {
        let mut sheet = Worksheet::default();
        sheet.set("B2", CellValue::Text("x".into()));
        sheet.merges.push(CellRange::parse_a1("B2:D3").unwrap());
        let r = sheet.used_range().unwrap();
        assert_eq!(r.start, CellRef::new(1, 1));
        assert_eq!(r.end, CellRef::new(2, 3));
    }

    #[test]
    fn fill_colours_tolerate_odd_values() {
        let styles = "<styleSheet xmlns=\"http://schemas.openxmlformats.org/spreadsheetml/2006/main\">\
             <fills count=\"4\">\
             <fill><patternFill patternType=\"solid\"><fgColor rgb=\"FF00FF00\"/></patternFill></fill>\
             <fill><patternFill patternType=\"solid\"><fgColor rgb=\"a\u{e9}12345\"/></patternFill></fill>\
             <fill><patternFill patternType=\"solid\"><fgColor rgb=\"zzzzzz\"/></patternFill></fill>\
             <fill><patternFill patternType=\"solid\"><fgColor rgb=\"0000FF\"/></patternFill></fill>\
             </fills>\
             <cellXfs count=\"4\"><xf fillId=\"0\"/><xf fillId=\"1\"/><xf fillId=\"2\"/><xf fillId=\"3\"/></cellXfs>\
             </styleSheet>";
        let table = parse_styles(styles);
        let fills: Vec<Option<&str>> = table.formats.iter().map(|f| f.fill.as_deref()).collect();
        assert_eq!(fills, vec![Some("#00ff00"), None, None, Some("#0000ff")]);
    }
}
