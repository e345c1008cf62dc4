use roxmltree::Node;

use crate::model::{
    Alignment, BorderSpec, CellWidth, Side, StyledCell, StyledRow, StyledTable, VerticalAlign,
    WidthUnit,
};
use crate::units::{format_percent, format_points, normalize_color, twips_to_pts};

use super::{WML_NS, collect_block_nodes, is_wml, wml, wml_attr};

/// Extract the style matrix of every table in a `word/document.xml` body.
///
/// Tables are returned depth-first in order of first appearance, nested
/// tables included. Unparseable XML yields no tables.
pub fn extract_tables(document_xml: &str) -> Vec<StyledTable> {
    match roxmltree::Document::parse(document_xml) {
        Ok(xml) => extract_from(xml.root_element()),
        Err(e) => {
            log::warn!("table style extraction skipped: {e}");
            Vec::new()
        }
    }
}

pub(super) fn extract_from(root: Node) -> Vec<StyledTable> {
    root.descendants()
        .filter(|n| is_wml(*n, "tbl"))
        .map(extract_table)
        .collect()
}

pub(super) fn table_rows<'a>(tbl: Node<'a, 'a>) -> Vec<Node<'a, 'a>> {
    collect_block_nodes(tbl)
        .into_iter()
        .filter(|n| is_wml(*n, "tr"))
        .collect()
}

pub(super) fn row_cells<'a>(tr: Node<'a, 'a>) -> Vec<Node<'a, 'a>> {
    collect_block_nodes(tr)
        .into_iter()
        .filter(|n| is_wml(*n, "tc"))
        .collect()
}

fn extract_table(tbl: Node) -> StyledTable {
    let rows = table_rows(tbl)
        .into_iter()
        .map(|tr| {
            let mut row = StyledRow {
                cells: row_cells(tr).into_iter().map(extract_cell).collect(),
            };
            row.normalize_percent_widths();
            row
        })
        .collect();
    StyledTable { rows }
}

fn extract_cell(tc: Node) -> StyledCell {
    let tc_pr = wml(tc, "tcPr");

    let width = tc_pr.and_then(|pr| wml(pr, "tcW")).and_then(parse_cell_width);

    let colspan = tc_pr
        .and_then(|pr| wml_attr(pr, "gridSpan"))
        .and_then(|v| v.parse::<u32>().ok())
        .filter(|&v| v >= 1)
        .unwrap_or(1);

    let vertical_align = tc_pr
        .and_then(|pr| wml_attr(pr, "vAlign"))
        .and_then(|v| match v {
            "top" => Some(VerticalAlign::Top),
            "center" => Some(VerticalAlign::Middle),
            "bottom" => Some(VerticalAlign::Bottom),
            _ => None,
        });

    let shading = tc_pr
        .and_then(|pr| wml(pr, "shd"))
        .and_then(|shd| shd.attribute((WML_NS, "fill")))
        .filter(|f| *f != "auto" && *f != "none")
        .and_then(normalize_color);

    let mut borders = std::collections::BTreeMap::new();
    if let Some(bdr) = tc_pr.and_then(|pr| wml(pr, "tcBorders")) {
        for side in Side::ALL {
            let node = match side {
                Side::Left => wml(bdr, "left").or_else(|| wml(bdr, "start")),
                Side::Right => wml(bdr, "right").or_else(|| wml(bdr, "end")),
                _ => wml(bdr, side.name()),
            };
            if let Some(spec) = node.and_then(parse_border) {
                borders.insert(side, spec);
            }
        }
    }

    // Font and alignment come from the first run of the first paragraph only.
    let first_para = collect_block_nodes(tc).into_iter().find(|n| is_wml(*n, "p"));
    let text_align = first_para
        .and_then(|p| wml(p, "pPr"))
        .and_then(|ppr| wml_attr(ppr, "jc"))
        .and_then(parse_jc);
    let first_rpr = first_para
        .and_then(|p| p.descendants().find(|n| is_wml(*n, "r")))
        .and_then(|r| wml(r, "rPr"));
    let font_size_pt = first_rpr
        .and_then(|rpr| wml_attr(rpr, "sz"))
        .and_then(|v| v.parse::<f32>().ok())
        .map(|half_points| half_points / 2.0);
    let font_family = first_rpr.and_then(|rpr| wml(rpr, "rFonts")).and_then(|f| {
        f.attribute((WML_NS, "ascii"))
            .or_else(|| f.attribute((WML_NS, "hAnsi")))
            .map(str::to_string)
    });

    StyledCell {
        width,
        shading,
        vertical_align,
        borders,
        colspan,
        rowspan: 1,
        font_size_pt,
        font_family,
        text_align,
    }
}

fn parse_cell_width(tcw: Node) -> Option<CellWidth> {
    let raw = tcw.attribute((WML_NS, "w"))?;
    match tcw.attribute((WML_NS, "type")).unwrap_or("dxa") {
        "pct" => {
            // Either "50%" or fiftieths of a percent ("2500").
            let value = match raw.strip_suffix('%') {
                Some(p) => p.parse::<f32>().ok()?,
                None => raw.parse::<f32>().ok()? / 50.0,
            };
            Some(CellWidth {
                value,
                unit: WidthUnit::Percent,
            })
        }
        "dxa" => raw.parse::<f32>().ok().map(|value| CellWidth {
            value,
            unit: WidthUnit::Twip,
        }),
        _ => None,
    }
}

fn parse_border(node: Node) -> Option<BorderSpec> {
    let val = node.attribute((WML_NS, "val"));
    let sz = node.attribute((WML_NS, "sz"));
    if val.is_none() && sz.is_none() {
        return None;
    }
    let style = match val.unwrap_or("single") {
        "nil" | "none" => "none",
        "double" | "triple" => "double",
        "dotted" => "dotted",
        "dashed" | "dashSmallGap" | "dotDash" | "dotDotDash" => "dashed",
        _ => "solid",
    };
    let width_pt = sz
        .and_then(|v| v.parse::<f32>().ok())
        .map(|eighths| eighths / 8.0)
        .unwrap_or(0.5);
    let color = node
        .attribute((WML_NS, "color"))
        .filter(|c| *c != "auto")
        .and_then(normalize_color);
    Some(BorderSpec {
        style: style.to_string(),
        width_pt,
        color,
    })
}

pub(super) fn parse_jc(val: &str) -> Option<Alignment> {
    match val {
        "left" | "start" => Some(Alignment::Left),
        "center" => Some(Alignment::Center),
        "right" | "end" => Some(Alignment::Right),
        "both" | "distribute" => Some(Alignment::Justify),
        _ => None,
    }
}

/// Inline CSS declarations for a styled cell.
pub fn cell_css(cell: &StyledCell) -> Vec<(String, String)> {
    let mut decls = Vec::new();
    match cell.width {
        Some(CellWidth { value, unit: WidthUnit::Twip }) => {
            decls.push(("width".into(), format_points(twips_to_pts(value))));
        }
        Some(CellWidth { value, unit: WidthUnit::Percent }) => {
            decls.push(("width".into(), format_percent(value)));
        }
        None => {}
    }
    if let Some(fill) = &cell.shading {
        decls.push(("background-color".into(), fill.clone()));
    }
    if let Some(va) = cell.vertical_align {
        decls.push(("vertical-align".into(), va.css().into()));
    }
    for (side, b) in &cell.borders {
        let value = if b.style == "none" {
            "none".to_string()
        } else {
            format!(
                "{}pt {} {}",
                (b.width_pt * 100.0).round() / 100.0,
                b.style,
                b.color.as_deref().unwrap_or("#000000")
            )
        };
        decls.push((format!("border-{}", side.name()), value));
    }
    if let Some(size) = cell.font_size_pt {
        decls.push(("font-size".into(), format!("{size}pt")));
    }
    if let Some(family) = &cell.font_family {
        decls.push(("font-family".into(), family.clone()));
    }
    if let Some(align) = cell.text_align {
        decls.push(("text-align".into(), align.css().into()));
    }
    decls
}
