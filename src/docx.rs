mod tables;

use std::collections::HashMap;
use std::io::{Cursor, Read, Seek};

use crate::error::{Error, Result};
use crate::html::{escape_attr, escape_text, format_style};
use crate::model::{StyledCell, StyledTable};
use crate::units::{format_points, twips_to_pts};

pub use tables::{cell_css, extract_tables};

pub(crate) const WML_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";

/// Block wrappers that are transparent for conversion purposes.
const TRANSPARENT_BLOCKS: &[&str] = &["sdt", "sdtContent", "customXml", "smartTag"];

pub(crate) fn is_wml(node: roxmltree::Node, name: &str) -> bool {
    node.tag_name().name() == name && node.tag_name().namespace() == Some(WML_NS)
}

/// Parse a WML boolean toggle element (e.g., w:b, w:i).
/// Present with no val or val != "0"/"false" means true.
pub(crate) fn wml_bool(parent: roxmltree::Node, name: &str) -> Option<bool> {
    wml(parent, name).map(|n| {
        n.attribute((WML_NS, "val"))
            .is_none_or(|v| v != "0" && v != "false")
    })
}

pub(crate) fn wml<'a>(node: roxmltree::Node<'a, 'a>, name: &str) -> Option<roxmltree::Node<'a, 'a>> {
    node.children().find(|n| is_wml(*n, name))
}

pub(crate) fn wml_attr<'a>(node: roxmltree::Node<'a, 'a>, child: &str) -> Option<&'a str> {
    wml(node, child).and_then(|n| n.attribute((WML_NS, "val")))
}

/// Flatten structured-document wrappers and collect effective block children.
pub(crate) fn collect_block_nodes<'a>(parent: roxmltree::Node<'a, 'a>) -> Vec<roxmltree::Node<'a, 'a>> {
    let mut nodes = Vec::new();
    for child in parent.children() {
        let name = child.tag_name().name();
        if child.tag_name().namespace() == Some(WML_NS) && TRANSPARENT_BLOCKS.contains(&name) {
            let inner = if name == "sdt" { wml(child, "sdtContent") } else { Some(child) };
            if let Some(content) = inner {
                nodes.extend(collect_block_nodes(content));
            }
        } else {
            nodes.push(child);
        }
    }
    nodes
}

pub(crate) fn read_zip_text<R: Read + Seek>(zip: &mut zip::ZipArchive<R>, name: &str) -> Option<String> {
    let mut file = zip.by_name(name).ok()?;
    let mut s = String::new();
    file.read_to_string(&mut s).ok()?;
    Some(s)
}

/// `(numId, ilvl)` → whether the level is an ordered list.
struct NumberingInfo {
    ordered: HashMap<(String, u8), bool>,
}

impl NumberingInfo {
    fn is_ordered(&self, num_id: &str, ilvl: u8) -> bool {
        self.ordered
            .get(&(num_id.to_string(), ilvl))
            .or_else(|| self.ordered.get(&(num_id.to_string(), 0)))
            .copied()
            .unwrap_or(false)
    }
}

fn parse_numbering<R: Read + Seek>(zip: &mut zip::ZipArchive<R>) -> NumberingInfo {
    let mut ordered = HashMap::new();
    let Some(xml_content) = read_zip_text(zip, "word/numbering.xml") else {
        return NumberingInfo { ordered };
    };
    let xml = match roxmltree::Document::parse(&xml_content) {
        Ok(xml) => xml,
        Err(e) => {
            log::warn!("word/numbering.xml unreadable, lists become bullets: {e}");
            return NumberingInfo { ordered };
        }
    };
    let root = xml.root_element();

    let mut abstract_levels: HashMap<&str, Vec<(u8, bool)>> = HashMap::new();
    for node in root.children().filter(|n| is_wml(*n, "abstractNum")) {
        let Some(abs_id) = node.attribute((WML_NS, "abstractNumId")) else {
            continue;
        };
        let levels = node
            .children()
            .filter(|n| is_wml(*n, "lvl"))
            .filter_map(|lvl| {
                let ilvl = lvl.attribute((WML_NS, "ilvl"))?.parse::<u8>().ok()?;
                let fmt = wml_attr(lvl, "numFmt").unwrap_or("bullet");
                Some((ilvl, fmt != "bullet" && fmt != "none"))
            })
            .collect();
        abstract_levels.insert(abs_id, levels);
    }
    for node in root.children().filter(|n| is_wml(*n, "num")) {
        let (Some(num_id), Some(abs_id)) = (
            node.attribute((WML_NS, "numId")),
            wml_attr(node, "abstractNumId"),
        ) else {
            continue;
        };
        for &(ilvl, is_ordered) in abstract_levels.get(abs_id).into_iter().flatten() {
            ordered.insert((num_id.to_string(), ilvl), is_ordered);
        }
    }
    NumberingInfo { ordered }
}

/// Convert a DOCX package into (un-normalised) canonical HTML.
pub fn import(bytes: &[u8]) -> Result<String> {
    let mut zip = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| Error::CorruptArchive(format!("not a ZIP archive: {e}")))?;

    let xml_content = read_zip_text(&mut zip, "word/document.xml")
        .ok_or_else(|| Error::CorruptArchive("missing word/document.xml".into()))?;
    let numbering = parse_numbering(&mut zip);

    let xml = roxmltree::Document::parse(&xml_content)
        .map_err(|e| Error::CorruptArchive(format!("word/document.xml: {e}")))?;
    let root = xml.root_element();
    let body = wml(root, "body")
        .ok_or_else(|| Error::CorruptArchive("word/document.xml has no w:body".into()))?;

    let styled = tables::extract_from(root);
    let table_index: HashMap<roxmltree::NodeId, usize> = root
        .descendants()
        .filter(|n| is_wml(*n, "tbl"))
        .enumerate()
        .map(|(i, n)| (n.id(), i))
        .collect();
    log::debug!("docx: {} tables with style matrix", styled.len());

    let has_text = body
        .descendants()
        .any(|n| is_wml(n, "t") && n.text().is_some_and(|t| !t.trim().is_empty()));
    if !has_text && styled.is_empty() {
        return Err(Error::NoUsableContent);
    }

    let mut writer = HtmlWriter {
        styled: &styled,
        table_index: &table_index,
        numbering: &numbering,
        out: String::new(),
    };
    writer.write_blocks(body);
    Ok(writer.out)
}

struct HtmlWriter<'s> {
    styled: &'s [StyledTable],
    table_index: &'s HashMap<roxmltree::NodeId, usize>,
    numbering: &'s NumberingInfo,
    out: String,
}

#[derive(Clone, Copy, PartialEq, Default)]
struct RunFormat {
    bold: bool,
    italic: bool,
    underline: bool,
}

enum Segment {
    Text(RunFormat, String),
    Break,
}

impl HtmlWriter<'_> {
    fn write_blocks(&mut self, parent: roxmltree::Node) {
        let mut open_list: Option<bool> = None;
        for node in collect_block_nodes(parent) {
            if node.tag_name().namespace() != Some(WML_NS) {
                continue;
            }
            match node.tag_name().name() {
                "p" => {
                    let list = wml(node, "pPr").and_then(|ppr| wml(ppr, "numPr")).map(|num_pr| {
                        let num_id = wml_attr(num_pr, "numId").unwrap_or("0");
                        let ilvl = wml_attr(num_pr, "ilvl")
                            .and_then(|v| v.parse::<u8>().ok())
                            .unwrap_or(0);
                        (num_id != "0", self.numbering.is_ordered(num_id, ilvl))
                    });
                    match list {
                        Some((true, ordered)) => {
                            if open_list != Some(ordered) {
                                self.close_list(&mut open_list);
                                self.out.push_str(if ordered { "<ol>" } else { "<ul>" });
                                open_list = Some(ordered);
                            }
                            self.out.push_str("<li>");
                            self.write_inline(node);
                            self.out.push_str("</li>");
                        }
                        _ => {
                            self.close_list(&mut open_list);
                            self.write_paragraph(node);
                        }
                    }
                }
                "tbl" => {
                    self.close_list(&mut open_list);
                    self.write_table(node);
                }
                _ => {}
            }
        }
        self.close_list(&mut open_list);
    }

    fn close_list(&mut self, open_list: &mut Option<bool>) {
        if let Some(ordered) = open_list.take() {
            self.out.push_str(if ordered { "</ol>" } else { "</ul>" });
        }
    }

    fn write_paragraph(&mut self, p: roxmltree::Node) {
        let align = wml(p, "pPr")
            .and_then(|ppr| wml_attr(ppr, "jc"))
            .and_then(tables::parse_jc);
        match align {
            Some(a) => {
                self.out.push_str("<p style=\"text-align:");
                self.out.push_str(a.css());
                self.out.push_str("\">");
            }
            None => self.out.push_str("<p>"),
        }
        self.write_inline(p);
        self.out.push_str("</p>");
    }

    fn write_inline(&mut self, p: roxmltree::Node) {
        let mut segments = Vec::new();
        collect_segments(p, &mut segments);

        let mut merged: Vec<Segment> = Vec::new();
        for seg in segments {
            if let Segment::Text(fmt, text) = &seg
                && let Some(Segment::Text(prev_fmt, prev)) = merged.last_mut()
                && *prev_fmt == *fmt
            {
                prev.push_str(text);
                continue;
            }
            merged.push(seg);
        }

        for seg in merged {
            match seg {
                Segment::Break => self.out.push_str("<br>"),
                Segment::Text(fmt, text) => {
                    let mut open = String::new();
                    let mut close = String::new();
                    for (on, tag) in [(fmt.bold, "strong"), (fmt.italic, "em"), (fmt.underline, "u")] {
                        if on {
                            open.push_str(&format!("<{tag}>"));
                            close.insert_str(0, &format!("</{tag}>"));
                        }
                    }
                    self.out.push_str(&open);
                    self.out.push_str(&escape_text(&text));
                    self.out.push_str(&close);
                }
            }
        }
    }

    fn write_table(&mut self, tbl: roxmltree::Node) {
        let empty = StyledTable::default();
        let styled = self
            .table_index
            .get(&tbl.id())
            .and_then(|&i| self.styled.get(i))
            .unwrap_or(&empty);

        self.out.push_str("<table>");

        let grid: Vec<f32> = wml(tbl, "tblGrid")
            .into_iter()
            .flat_map(|g| g.children())
            .filter(|n| is_wml(*n, "gridCol"))
            .filter_map(|n| n.attribute((WML_NS, "w")).and_then(|v| v.parse::<f32>().ok()))
            .collect();
        if !grid.is_empty() {
            self.out.push_str("<colgroup>");
            for w in &grid {
                self.out.push_str(&format!(
                    "<col style=\"width:{}\">",
                    format_points(twips_to_pts(*w))
                ));
            }
            self.out.push_str("</colgroup>");
        }

        let layout = vertical_merge_layout(tbl);
        for (ri, tr) in tables::table_rows(tbl).into_iter().enumerate() {
            let header = wml(tr, "trPr").and_then(|pr| wml(pr, "tblHeader")).is_some();
            let tag = if header { "th" } else { "td" };
            self.out.push_str("<tr>");
            for (ci, tc) in tables::row_cells(tr).into_iter().enumerate() {
                let Some(&rowspan) = layout.get(&(ri, ci)) else {
                    continue;
                };
                let default_cell = StyledCell::default();
                let cell = styled
                    .rows
                    .get(ri)
                    .and_then(|r| r.cells.get(ci))
                    .unwrap_or(&default_cell);

                self.out.push('<');
                self.out.push_str(tag);
                if cell.colspan > 1 {
                    self.out.push_str(&format!(" colspan=\"{}\"", cell.colspan));
                }
                if rowspan > 1 {
                    self.out.push_str(&format!(" rowspan=\"{}\"", rowspan));
                }
                let css = cell_css(cell);
                if !css.is_empty() {
                    self.out.push_str(" style=\"");
                    self.out.push_str(&escape_attr(&format_style(&css)));
                    self.out.push('"');
                }
                self.out.push('>');
                self.write_blocks(tc);
                self.out.push_str("</");
                self.out.push_str(tag);
                self.out.push('>');
            }
            self.out.push_str("</tr>");
        }
        self.out.push_str("</table>");
    }
}

fn collect_segments(parent: roxmltree::Node, out: &mut Vec<Segment>) {
    for child in parent.children() {
        if child.tag_name().namespace() != Some(WML_NS) {
            continue;
        }
        match child.tag_name().name() {
            "r" => {
                let rpr = wml(child, "rPr");
                let fmt = RunFormat {
                    bold: rpr.and_then(|n| wml_bool(n, "b")).unwrap_or(false),
                    italic: rpr.and_then(|n| wml_bool(n, "i")).unwrap_or(false),
                    underline: rpr
                        .and_then(|n| wml_attr(n, "u"))
                        .is_some_and(|v| v != "none"),
                };
                for part in child.children() {
                    if part.tag_name().namespace() != Some(WML_NS) {
                        continue;
                    }
                    match part.tag_name().name() {
                        "t" => out.push(Segment::Text(fmt, part.text().unwrap_or("").to_string())),
                        "tab" => out.push(Segment::Text(fmt, " ".into())),
                        "br" | "cr" => out.push(Segment::Break),
                        "noBreakHyphen" => out.push(Segment::Text(fmt, "-".into())),
                        _ => {}
                    }
                }
            }
            "hyperlink" | "ins" | "smartTag" | "customXml" | "fldSimple" => {
                collect_segments(child, out);
            }
            "sdt" => {
                if let Some(content) = wml(child, "sdtContent") {
                    collect_segments(content, out);
                }
            }
            _ => {}
        }
    }
}

/// `(row, cell)` → rowspan for every cell that is emitted. Continuation
/// cells of a vertical merge are absent from the map.
fn vertical_merge_layout(tbl: roxmltree::Node) -> HashMap<(usize, usize), u32> {
    #[derive(Clone, Copy, PartialEq)]
    enum VMerge {
        None,
        Restart,
        Continue,
    }

    // (grid column, vmerge) per cell, per row
    let rows: Vec<Vec<(usize, VMerge)>> = tables::table_rows(tbl)
        .into_iter()
        .map(|tr| {
            let mut grid_col = 0usize;
            tables::row_cells(tr)
                .into_iter()
                .map(|tc| {
                    let pr = wml(tc, "tcPr");
                    let span = pr
                        .and_then(|pr| wml_attr(pr, "gridSpan"))
                        .and_then(|v| v.parse::<usize>().ok())
                        .unwrap_or(1)
                        .max(1);
                    let vmerge = pr
                        .and_then(|pr| wml(pr, "vMerge"))
                        .map(|n| match n.attribute((WML_NS, "val")) {
                            Some("restart") => VMerge::Restart,
                            _ => VMerge::Continue,
                        })
                        .unwrap_or(VMerge::None);
                    let at = grid_col;
                    grid_col = grid_col.saturating_add(span);
                    (at, vmerge)
                })
                .collect()
        })
        .collect();

    let mut layout = HashMap::new();
    for (ri, row) in rows.iter().enumerate() {
        for (ci, &(grid_col, vmerge)) in row.iter().enumerate() {
            match vmerge {
                VMerge::Continue if ri > 0 => continue,
                VMerge::Restart => {
                    let extra = rows[ri + 1..]
                        .iter()
                        .take_while(|r| {
                            r.iter()
                                .any(|&(gc, vm)| gc == grid_col && vm == VMerge::Continue)
                        })
                        .count();
                    layout.insert((ri, ci), 1 + extra as u32);
                }
                _ => {
                    layout.insert((ri, ci), 1);
                }
            }
        }
    }
    layout
}
