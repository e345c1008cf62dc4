//! Canonical HTML → page-flow tree → paginated pages.

mod paginate;
mod table;
mod text;

use std::sync::LazyLock;

use regex::Regex;

use crate::html::{Document, NodeData, NodeId, parse_style, style_value};
use crate::model::{Alignment, Side, VerticalAlign};
use crate::units::{normalize_color, parse_css_length, parse_hex_color};

pub use paginate::{DrawOp, PageNode, paginate};

/// Auto-generated heading the editor places at the top of an Act or Agreement body.
static TITLE_PARAGRAPH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?is)^\s*<p(?:\s[^>]*)?>\s*<strong>\s*(?:act|agreement)\s+(?:number|no\.?|nº|n\.º|#)[^<]*</strong>\s*</p>",
    )
    .expect("valid title paragraph regex")
});

/// Nesting depth beyond which tables inside cells are dropped.
const MAX_TABLE_DEPTH: usize = 8;

#[derive(Clone, Debug, PartialEq)]
pub struct InlineRun {
    pub text: String,
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Inline {
    Run(InlineRun),
    LineBreak,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Paragraph {
    pub inlines: Vec<Inline>,
    pub align: Alignment,
    /// Overrides the page geometry's base font size.
    pub font_size: Option<f32>,
}

impl Paragraph {
    /// A single-run paragraph.
    pub fn plain(text: &str, align: Alignment, bold: bool) -> Self {
        Self {
            inlines: vec![Inline::Run(InlineRun {
                text: text.to_string(),
                bold,
                italic: false,
                underline: false,
            })],
            align,
            font_size: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ListItem {
    /// Bullet or running number, e.g. `•` or `3.`.
    pub label: String,
    pub content: Vec<FlowNode>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct List {
    pub ordered: bool,
    pub items: Vec<ListItem>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CellBorder {
    pub width: f32,
    pub color: [u8; 3],
}

impl CellBorder {
    /// Substituted when a cell declares no border of its own.
    pub const HAIRLINE: CellBorder = CellBorder {
        width: 0.5,
        color: [0, 0, 0],
    };
}

#[derive(Clone, Debug, PartialEq)]
pub struct TableCell {
    /// First grid column occupied by the cell.
    pub column: u32,
    pub colspan: u32,
    pub rowspan: u32,
    /// `100 / columns * colspan`.
    pub width_percent: f32,
    pub header: bool,
    pub background: Option<[u8; 3]>,
    pub vertical_align: VerticalAlign,
    /// Indexed like [`Side::ALL`]; `None` draws nothing on that side.
    pub borders: [Option<CellBorder>; 4],
    pub content: Vec<FlowNode>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TableRow {
    pub cells: Vec<TableCell>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Table {
    pub columns: u32,
    pub rows: Vec<TableRow>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum FlowNode {
    Paragraph(Paragraph),
    /// An empty paragraph; keeps its line of vertical space.
    BlankLine,
    List(List),
    Table(Table),
}

impl FlowNode {
    /// Centred bold single-line heading.
    pub fn heading(text: &str) -> Self {
        FlowNode::Paragraph(Paragraph::plain(text, Alignment::Center, true))
    }
}

/// Drop the auto-generated title paragraph, if the document starts with one.
pub fn strip_title(html: &str) -> &str {
    match TITLE_PARAGRAPH.find(html) {
        Some(m) => &html[m.end()..],
        None => html,
    }
}

/// Build the page-flow tree of a canonical document.
///
/// Blocks that cannot be laid out (a table without rows, table parts outside
/// a table, an empty list) are dropped with a warning.
pub fn build_flow(html: &str) -> Vec<FlowNode> {
    let doc = Document::parse(strip_title(html));
    collect_blocks(&doc, Document::ROOT, Inherited::default())
}

/// Properties passed down from enclosing cells and headings.
#[derive(Clone, Copy, Default)]
struct Inherited {
    align: Option<Alignment>,
    font_size: Option<f32>,
    bold: bool,
    depth: usize,
}

const CONTAINERS: &[&str] = &[
    "div", "blockquote", "li", "section", "article", "center", "body", "html", "dd", "dt",
];

const TABLE_PARTS: &[&str] = &[
    "tr", "td", "th", "thead", "tbody", "tfoot", "colgroup", "col", "caption",
];

fn is_block(name: &str) -> bool {
    matches!(name, "p" | "ul" | "ol" | "table" | "h1" | "h2" | "h3" | "h4" | "h5" | "h6")
        || CONTAINERS.contains(&name)
        || TABLE_PARTS.contains(&name)
}

fn collect_blocks(doc: &Document, parent: NodeId, ctx: Inherited) -> Vec<FlowNode> {
    let mut out = Vec::new();
    let mut pending: Vec<NodeId> = Vec::new();

    for &child in doc.children(parent) {
        let Some(name) = doc.name(child).filter(|n| is_block(n)) else {
            pending.push(child);
            continue;
        };
        flush_inline(doc, &mut pending, ctx, &mut out);
        match name {
            "p" => out.push(paragraph(doc, child, ctx)),
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                out.push(paragraph(doc, child, Inherited { bold: true, ..ctx }))
            }
            "ul" | "ol" => match list(doc, child, name == "ol", ctx) {
                Some(l) => out.push(FlowNode::List(l)),
                None => log::warn!("dropping <{name}> without items"),
            },
            "table" => {
                if ctx.depth >= MAX_TABLE_DEPTH {
                    log::warn!("dropping table nested {} levels deep", ctx.depth);
                } else if let Some(t) = table(doc, child, ctx) {
                    out.push(FlowNode::Table(t));
                } else {
                    log::warn!("dropping table without rows");
                }
            }
            _ if TABLE_PARTS.contains(&name) => {
                log::warn!("dropping stray <{name}> outside a table");
            }
            _ => {
                let style = parse_style(doc.attr(child, "style").unwrap_or(""));
                out.extend(collect_blocks(doc, child, inherit_style(&style, ctx)));
            }
        }
    }
    flush_inline(doc, &mut pending, ctx, &mut out);
    out
}

/// Wrap loose inline content into a paragraph unless it is blank.
fn flush_inline(doc: &Document, pending: &mut Vec<NodeId>, ctx: Inherited, out: &mut Vec<FlowNode>) {
    if pending.is_empty() {
        return;
    }
    let mut inlines = Vec::new();
    for id in pending.drain(..) {
        collect_inline(doc, id, ctx_format(ctx), &mut inlines);
    }
    if has_visible_text(&inlines) {
        out.push(FlowNode::Paragraph(Paragraph {
            inlines,
            align: ctx.align.unwrap_or(Alignment::Justify),
            font_size: ctx.font_size,
        }));
    }
}

fn inherit_style(style: &[(String, String)], ctx: Inherited) -> Inherited {
    Inherited {
        align: style_value(style, "text-align")
            .and_then(Alignment::from_css)
            .or(ctx.align),
        font_size: style_value(style, "font-size")
            .and_then(|v| parse_css_length(v).ok())
            .filter(|v| *v > 0.0)
            .or(ctx.font_size),
        ..ctx
    }
}

fn paragraph(doc: &Document, p: NodeId, ctx: Inherited) -> FlowNode {
    let style = parse_style(doc.attr(p, "style").unwrap_or(""));
    let ctx = inherit_style(&style, ctx);
    let mut inlines = Vec::new();
    for &child in doc.children(p) {
        collect_inline(doc, child, ctx_format(ctx), &mut inlines);
    }
    if !has_visible_text(&inlines) {
        return FlowNode::BlankLine;
    }
    FlowNode::Paragraph(Paragraph {
        inlines,
        align: ctx.align.unwrap_or(Alignment::Justify),
        font_size: ctx.font_size,
    })
}

#[derive(Clone, Copy)]
struct Format {
    bold: bool,
    italic: bool,
    underline: bool,
}

fn ctx_format(ctx: Inherited) -> Format {
    Format {
        bold: ctx.bold,
        italic: false,
        underline: false,
    }
}

fn collect_inline(doc: &Document, id: NodeId, fmt: Format, out: &mut Vec<Inline>) {
    match &doc.node(id).data {
        NodeData::Text(text) => {
            if let Some(Inline::Run(prev)) = out.last_mut()
                && prev.bold == fmt.bold
                && prev.italic == fmt.italic
                && prev.underline == fmt.underline
            {
                prev.text.push_str(text);
                return;
            }
            out.push(Inline::Run(InlineRun {
                text: text.clone(),
                bold: fmt.bold,
                italic: fmt.italic,
                underline: fmt.underline,
            }));
        }
        NodeData::Element { name, .. } => {
            let fmt = match name.as_str() {
                "br" => {
                    out.push(Inline::LineBreak);
                    return;
                }
                "strong" | "b" => Format { bold: true, ..fmt },
                "em" | "i" => Format { italic: true, ..fmt },
                "u" => Format { underline: true, ..fmt },
                _ => fmt,
            };
            for &child in doc.children(id) {
                collect_inline(doc, child, fmt, out);
            }
        }
        NodeData::Root => {}
    }
}

fn has_visible_text(inlines: &[Inline]) -> bool {
    inlines.iter().any(|i| match i {
        Inline::Run(r) => !r.text.trim().is_empty(),
        Inline::LineBreak => false,
    })
}

fn list(doc: &Document, id: NodeId, ordered: bool, ctx: Inherited) -> Option<List> {
    let items: Vec<ListItem> = doc
        .element_children(id)
        .filter(|&c| doc.is_element(c, "li"))
        .enumerate()
        .map(|(i, li)| {
            let style = parse_style(doc.attr(li, "style").unwrap_or(""));
            ListItem {
                label: if ordered { format!("{}.", i + 1) } else { "\u{2022}".to_string() },
                content: collect_blocks(doc, li, inherit_style(&style, ctx)),
            }
        })
        .collect();
    (!items.is_empty()).then_some(List { ordered, items })
}

fn table(doc: &Document, id: NodeId, ctx: Inherited) -> Option<Table> {
    let rows: Vec<Vec<NodeId>> = doc
        .table_rows(id)
        .into_iter()
        .map(|r| doc.row_cells(r))
        .collect();
    if rows.iter().all(|cells| cells.is_empty()) {
        return None;
    }
    let row_count = rows.len() as u32;

    let span_columns = rows
        .iter()
        .map(|cells| {
            cells
                .iter()
                .fold(0u32, |n, &c| n.saturating_add(doc.span_attr(c, "colspan")))
        })
        .max()
        .unwrap_or(0);

    // Per grid column, the first row not covered by a rowspan from above.
    let mut free_from: Vec<u32> = Vec::new();
    let mut placed: Vec<Vec<(NodeId, u32, u32, u32)>> = Vec::new();
    let mut extent = 0u32;
    for (ri, cells) in rows.iter().enumerate() {
        let ri = ri as u32;
        let mut col = 0u32;
        let mut row = Vec::new();
        for &cell in cells {
            while free_from.get(col as usize).is_some_and(|&r| r > ri) {
                col = col.saturating_add(1);
            }
            let colspan = doc.span_attr(cell, "colspan");
            let rowspan = doc.span_attr(cell, "rowspan").min(row_count - ri);
            let end = col.saturating_add(colspan);
            if free_from.len() < end as usize {
                free_from.resize(end as usize, 0);
            }
            for slot in &mut free_from[col as usize..end as usize] {
                *slot = (*slot).max(ri + rowspan);
            }
            row.push((cell, col, colspan, rowspan));
            col = end;
            extent = extent.max(col);
        }
        placed.push(row);
    }
    let columns = span_columns.max(extent).max(1);

    let rows = placed
        .into_iter()
        .map(|cells| TableRow {
            cells: cells
                .into_iter()
                .map(|(cell, column, colspan, rowspan)| {
                    table_cell(doc, cell, column, colspan, rowspan, columns, ctx)
                })
                .collect(),
        })
        .collect();
    Some(Table { columns, rows })
}

fn table_cell(
    doc: &Document,
    cell: NodeId,
    column: u32,
    colspan: u32,
    rowspan: u32,
    columns: u32,
    ctx: Inherited,
) -> TableCell {
    let style = parse_style(doc.attr(cell, "style").unwrap_or(""));
    let header = doc.is_element(cell, "th");
    let background = style_value(&style, "background-color").and_then(css_color);
    let vertical_align = match style_value(&style, "vertical-align") {
        Some("middle") | Some("center") => VerticalAlign::Middle,
        Some("bottom") => VerticalAlign::Bottom,
        _ => VerticalAlign::Top,
    };
    let inner = Inherited {
        bold: ctx.bold || header,
        depth: ctx.depth + 1,
        ..inherit_style(&style, ctx)
    };
    TableCell {
        column,
        colspan,
        rowspan,
        width_percent: 100.0 / columns as f32 * colspan as f32,
        header,
        background,
        vertical_align,
        borders: cell_borders(&style),
        content: collect_blocks(doc, cell, inner),
    }
}

fn css_color(value: &str) -> Option<[u8; 3]> {
    normalize_color(value).and_then(|c| parse_hex_color(&c))
}

fn cell_borders(style: &[(String, String)]) -> [Option<CellBorder>; 4] {
    let shorthand = style_value(style, "border").map(parse_border);
    Side::ALL.map(|side| match style_value(style, &format!("border-{}", side.name())) {
        Some(v) => parse_border(v),
        None => shorthand.unwrap_or(Some(CellBorder::HAIRLINE)),
    })
}

/// Parse a border shorthand such as `1pt solid #ff0000`.
fn parse_border(value: &str) -> Option<CellBorder> {
    let mut border = CellBorder::HAIRLINE;
    for token in value.split_whitespace() {
        match token {
            "none" | "hidden" => return None,
            t if t.starts_with('#') || t.starts_with("rgb") => {
                if let Some(rgb) = css_color(t) {
                    border.color = rgb;
                }
            }
            t if t.starts_with(|c: char| c.is_ascii_digit() || c == '.') => {
                if let Ok(w) = parse_css_length(t) {
                    border.width = w;
                }
            }
            _ => {}
        }
    }
    (border.width > 0.0).then_some(border)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_paragraph_is_stripped() {
        let flow = build_flow("<p><strong>Act number 12 of 2024</strong></p><p>Body</p>");
        assert_eq!(flow.len(), 1);
        let FlowNode::Paragraph(p) = &flow[0] else {
            panic!("expected paragraph");
        };
        assert_eq!(p.inlines.len(), 1);
    }

    #[test]
    fn ordinary_bold_opening_is_kept() {
        let flow = build_flow("<p><strong>Attendance</strong></p>");
        assert!(matches!(flow[0], FlowNode::Paragraph(_)));
    }

    #[test]
    fn empty_paragraphs_become_blank_lines() {
        let flow = build_flow("<p></p><p>&nbsp;</p><p><br></p>");
        assert_eq!(flow, vec![FlowNode::BlankLine; 3]);
    }

    #[test]
    fn loose_text_is_wrapped() {
        let flow = build_flow("before<table><tr><td>x</td></tr></table>  after ");
        assert_eq!(flow.len(), 3);
        assert!(matches!(flow[0], FlowNode::Paragraph(_)));
        assert!(matches!(flow[1], FlowNode::Table(_)));
        assert!(matches!(flow[2], FlowNode::Paragraph(_)));
    }

    #[test]
    fn paragraph_alignment_defaults_to_justify() {
        let flow = build_flow("<p>a</p><p style=\"text-align:center\">b</p>");
        let aligns: Vec<Alignment> = flow
            .iter()
            .filter_map(|n| match n {
                FlowNode::Paragraph(p) => Some(p.align),
                _ => None,
            })
            .collect();
        assert_eq!(aligns, vec![Alignment::Justify, Alignment::Center]);
    }

    #[test]
    fn inline_formatting_is_tracked() {
        let flow = build_flow("<p>plain <strong>bold <em>both</em></strong><u>under</u></p>");
        let FlowNode::Paragraph(p) = &flow[0] else {
            panic!("expected paragraph");
        };
        let runs: Vec<(&str, bool, bool, bool)> = p
            .inlines
            .iter()
            .filter_map(|i| match i {
                Inline::Run(r) => Some((r.text.as_str(), r.bold, r.italic, r.underline)),
                Inline::LineBreak => None,
            })
            .collect();
        assert_eq!(
            runs,
            vec![
                ("plain ", false, false, false),
                ("bold ", true, false, false),
                ("both", true, true, false),
                ("under", false, false, true),
            ]
        );
    }

    #[test]
    fn ordered_list_numbers_items() {
        let flow = build_flow("<ol><li>one</li><li>two</li></ol><ul><li>x</li></ul>");
        let FlowNode::List(ol) = &flow[0] else {
            panic!("expected list");
        };
        let labels: Vec<&str> = ol.items.iter().map(|i| i.label.as_str()).collect();
        assert_eq!(labels, vec!["1.", "2."]);
        let FlowNode::List(ul) = &flow[1] else {
            panic!("expected list");
        };
        assert_eq!(ul.items[0].label, "\u{2022}");
    }

    #[test]
    fn colspan_widths_fill_the_row() {
        let flow = build_flow(
            "<table><tr><td colspan=\"2\">a</td><td>b</td></tr><tr><td>c</td><td>d</td><td>e</td></tr></table>",
        );
        let FlowNode::Table(t) = &flow[0] else {
            panic!("expected table");
        };
        assert_eq!(t.columns, 3);
        for row in &t.rows {
            let total: f32 = row.cells.iter().map(|c| c.width_percent).sum();
            assert!((total - 100.0).abs() < 0.01, "{total}");
        }
    }

    #[test]
    fn rowspan_shifts_following_cells() {
        let flow = build_flow(
            "<table><tr><td rowspan=\"2\">a</td><td>b</td></tr><tr><td>c</td></tr></table>",
        );
        let FlowNode::Table(t) = &flow[0] else {
            panic!("expected table");
        };
        assert_eq!(t.columns, 2);
        assert_eq!(t.rows[1].cells[0].column, 1);
        assert_eq!(t.rows[0].cells[0].rowspan, 2);
    }

    #[test]
    fn header_cells_are_bold_and_borders_default_to_hairline() {
        let flow = build_flow(
            "<table><tr><th>h</th><td style=\"border-top:none;border-left:2pt solid #ff0000\">d</td></tr></table>",
        );
        let FlowNode::Table(t) = &flow[0] else {
            panic!("expected table");
        };
        let th = &t.rows[0].cells[0];
        assert!(th.header);
        let FlowNode::Paragraph(p) = &th.content[0] else {
            panic!("expected paragraph");
        };
        assert!(matches!(&p.inlines[0], Inline::Run(r) if r.bold));
        assert_eq!(th.borders, [Some(CellBorder::HAIRLINE); 4]);

        let td = &t.rows[0].cells[1];
        assert_eq!(td.borders[0], None);
        assert_eq!(td.borders[1], Some(CellBorder { width: 2.0, color: [255, 0, 0] }));
    }

    #[test]
    fn stray_table_parts_are_dropped() {
        let flow = build_flow("<td>orphan</td><p>kept</p>");
        assert_eq!(flow.len(), 1);
    }
}
