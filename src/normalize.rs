//! Canonical-document normaliser.
//!
//! Two passes run in sequence over the arena tree: cell style elevation,
//! then sanitation. The pipeline is idempotent.

use crate::html::{Document, MAX_COLSPAN, NodeId, format_style, parse_style, style_value};
use crate::units::{format_points, normalize_color, parse_css_length};

/// Properties copied from a cell's first styled descendant onto the cell.
const ELEVATED_PROPERTIES: &[&str] = &[
    "text-align",
    "font-size",
    "vertical-align",
    "font-family",
    "background-color",
    "padding",
];

const ALLOWED_ELEMENTS: &[&str] = &[
    "p", "br", "strong", "b", "em", "i", "u", "s", "sub", "sup", "span", "div", "h1", "h2", "h3",
    "h4", "h5", "h6", "ul", "ol", "li", "table", "thead", "tbody", "tfoot", "tr", "td", "th",
    "colgroup", "col",
];

const DROPPED_WITH_CONTENT: &[&str] = &[
    "script", "style", "iframe", "object", "embed", "head", "meta", "link", "title", "noscript",
    "template", "svg", "math",
];

const ALLOWED_ATTRIBUTES: &[&str] = &["style", "colspan", "rowspan", "span"];

/// Inline wrappers that are dropped when they hold nothing.
const INLINE_RUNS: &[&str] = &["span", "strong", "b", "em", "i", "u", "s", "sub", "sup"];

/// Elements never removed for being empty.
const STRUCTURAL: &[&str] = &[
    "table", "thead", "tbody", "tfoot", "tr", "td", "th", "colgroup", "col", "br",
];

/// Vendor-private characters removed from text.
const VENDOR_CHARS: &[char] = &[
    '\u{FFFC}', // object replacement
    '\u{200B}', // zero width space
    '\u{200C}', // zero width non-joiner
    '\u{200D}', // zero width joiner
    '\u{2060}', // word joiner
    '\u{FEFF}', // zero width no-break space / BOM
    '\u{00AD}', // soft hyphen
    '\u{200E}', '\u{200F}', // LRM, RLM
    '\u{202A}', '\u{202B}', '\u{202C}', '\u{202D}', '\u{202E}', // embeddings / overrides
    '\u{2066}', '\u{2067}', '\u{2068}', '\u{2069}', // isolates
    '\u{F0B7}', '\u{F0A7}', '\u{F0D8}', '\u{F076}', '\u{F0FC}', '\u{F0A8}', '\u{F02D}', // symbol-font bullets
];

pub fn is_allowed_style_property(prop: &str) -> bool {
    prop.starts_with("border")
        || prop.starts_with("padding")
        || matches!(
            prop,
            "text-align"
                | "width"
                | "background-color"
                | "font-size"
                | "font-family"
                | "vertical-align"
        )
}

/// Normalise any HTML fragment into a canonical document string.
///
/// Total: malformed markup is parsed tolerantly and never rejected.
pub fn normalize(html: &str) -> String {
    let t0 = std::time::Instant::now();
    let mut doc = Document::parse(html);
    let elevated = elevate_cell_styles(&mut doc);
    sanitize(&mut doc);
    let out = doc.serialize();
    log::debug!(
        "normalize: {} bytes in, {} bytes out, {} cells elevated, {:.2}ms",
        html.len(),
        out.len(),
        elevated,
        t0.elapsed().as_secs_f64() * 1000.0
    );
    out
}

fn is_cell(doc: &Document, id: NodeId) -> bool {
    matches!(doc.name(id), Some("td" | "th"))
}

/// Copy whitelisted properties from each cell's first styled descendant onto
/// the cell when the cell does not already declare them. Returns the number of
/// cells that changed.
pub fn elevate_cell_styles(doc: &mut Document) -> usize {
    let cells: Vec<NodeId> = doc
        .descendants(Document::ROOT)
        .into_iter()
        .filter(|&n| is_cell(doc, n))
        .collect();

    let mut changed = 0;
    for cell in cells {
        let source = doc.descendants(cell).into_iter().find(|&d| {
            matches!(doc.name(d), Some("p" | "span" | "div"))
                && has_content(doc, d)
                && doc.attr(d, "style").is_some_and(|s| {
                    parse_style(s)
                        .iter()
                        .any(|(k, _)| ELEVATED_PROPERTIES.contains(&k.as_str()))
                })
        });
        let Some(source) = source else {
            continue;
        };
        let source_decls = parse_style(doc.attr(source, "style").unwrap_or_default());
        let mut cell_decls = parse_style(doc.attr(cell, "style").unwrap_or_default());
        let mut touched = false;
        for prop in ELEVATED_PROPERTIES {
            if style_value(&cell_decls, prop).is_some() {
                continue;
            }
            if let Some(v) = style_value(&source_decls, prop) {
                cell_decls.push((prop.to_string(), v.to_string()));
                touched = true;
            }
        }
        if touched {
            doc.set_attr(cell, "style", &format_style(&cell_decls));
            changed += 1;
        }
    }
    changed
}

/// Strip foreign and disallowed markup, vendor characters, and empty runs;
/// fill empty cells; reconcile colgroups with the real column count.
pub fn sanitize(doc: &mut Document) {
    for id in doc.descendants(Document::ROOT) {
        let Some(name) = doc.name(id) else {
            continue;
        };
        if DROPPED_WITH_CONTENT.contains(&name) {
            doc.detach(id);
        }
    }

    for id in doc.descendants(Document::ROOT).into_iter().rev() {
        let Some(name) = doc.name(id) else {
            if let Some(t) = doc.text(id) {
                let stripped: String = t.chars().filter(|c| !VENDOR_CHARS.contains(c)).collect();
                if stripped.is_empty() {
                    doc.detach(id);
                } else if stripped.len() != t.len() {
                    doc.set_text(id, stripped);
                }
            }
            continue;
        };
        if name.contains(':') || !ALLOWED_ELEMENTS.contains(&name) {
            doc.unwrap_node(id);
            continue;
        }
        doc.retain_attrs(id, |k| ALLOWED_ATTRIBUTES.contains(&k));
        clamp_spans(doc, id);
        filter_style(doc, id);
    }

    remove_empty_elements(doc);
    doc.merge_text_nodes(Document::ROOT);
    collapse_whitespace(doc);
    fill_empty_cells(doc);
    reconcile_colgroups(doc);
}

/// Rewrite span attributes to the value layout will use.
fn clamp_spans(doc: &mut Document, id: NodeId) {
    for key in ["colspan", "rowspan", "span"] {
        let span = doc.span_attr(id, key).to_string();
        if doc.attr(id, key).is_some_and(|raw| raw.trim() != span) {
            log::debug!("{key} clamped to {span}");
            doc.set_attr(id, key, &span);
        }
    }
}

fn filter_style(doc: &mut Document, id: NodeId) {
    let Some(style) = doc.attr(id, "style") else {
        return;
    };
    let decls: Vec<(String, String)> = parse_style(style)
        .into_iter()
        .filter(|(k, _)| is_allowed_style_property(k))
        .filter_map(|(k, v)| normalize_declaration(&k, &v).map(|v| (k, v)))
        .collect();
    if decls.is_empty() {
        doc.remove_attr(id, "style");
    } else {
        doc.set_attr(id, "style", &format_style(&decls));
    }
}

/// Point widths get one decimal, border colours and backgrounds become hex.
fn normalize_declaration(prop: &str, value: &str) -> Option<String> {
    if prop == "width" && value.ends_with("pt") {
        return match parse_css_length(value) {
            Ok(pt) => Some(format_points(pt)),
            Err(e) => {
                log::warn!("dropping width: {e}");
                None
            }
        };
    }
    if prop == "background-color" {
        return normalize_color(value);
    }
    if prop.starts_with("border") && !prop.ends_with("-width") && !prop.ends_with("-style") {
        let (head, last) = split_trailing_token(value);
        if last.is_empty() {
            return None;
        }
        if is_border_keyword(last) {
            return Some(value.to_string());
        }
        let color = normalize_color(last)?;
        let parts: Vec<&str> = head.split_whitespace().collect();
        if parts.is_empty() {
            return Some(color);
        }
        return Some(format!("{} {}", parts.join(" "), color));
    }
    Some(value.to_string())
}

/// Split the last token off a shorthand value. A trailing `rgb(...)` or
/// `rgba(...)` stays one token even when it contains spaces.
fn split_trailing_token(value: &str) -> (&str, &str) {
    let v = value.trim();
    if v.ends_with(')')
        && let Some(at) = v.to_ascii_lowercase().rfind("rgb")
    {
        return (&v[..at], &v[at..]);
    }
    match v.rfind(|c: char| c.is_ascii_whitespace()) {
        Some(at) => (&v[..at], &v[at + 1..]),
        None => ("", v),
    }
}

fn is_border_keyword(token: &str) -> bool {
    let t = token.to_ascii_lowercase();
    parse_css_length(&t).is_ok()
        || matches!(
            t.as_str(),
            "none"
                | "hidden"
                | "solid"
                | "double"
                | "dashed"
                | "dotted"
                | "groove"
                | "ridge"
                | "inset"
                | "outset"
                | "thin"
                | "medium"
                | "thick"
                | "inherit"
                | "initial"
        )
}

fn is_blank(s: &str) -> bool {
    s.chars().all(|c| c.is_ascii_whitespace())
}

/// True when a subtree shows anything: non-blank text, a line break, or table
/// structure.
pub(crate) fn has_content(doc: &Document, id: NodeId) -> bool {
    if let Some(t) = doc.text(id) {
        return t.chars().any(|c| !c.is_ascii_whitespace() && !VENDOR_CHARS.contains(&c));
    }
    if matches!(doc.name(id), Some(n) if STRUCTURAL.contains(&n)) {
        return true;
    }
    doc.children(id).iter().any(|&c| has_content(doc, c))
}

fn inside_cell(doc: &Document, id: NodeId) -> bool {
    let mut cur = doc.parent(id);
    while let Some(p) = cur {
        if is_cell(doc, p) {
            return true;
        }
        cur = doc.parent(p);
    }
    false
}

fn remove_empty_elements(doc: &mut Document) {
    for id in doc.descendants(Document::ROOT).into_iter().rev() {
        let Some(name) = doc.name(id) else {
            continue;
        };
        if STRUCTURAL.contains(&name) || has_content(doc, id) {
            continue;
        }
        if INLINE_RUNS.contains(&name) || inside_cell(doc, id) {
            doc.detach(id);
        }
    }
}

fn collapse_whitespace(doc: &mut Document) {
    for id in doc.descendants(Document::ROOT) {
        let Some(t) = doc.text(id) else {
            continue;
        };
        let mut out = String::with_capacity(t.len());
        let mut in_ws = false;
        for c in t.chars() {
            if c.is_ascii_whitespace() {
                if !in_ws {
                    out.push(' ');
                }
                in_ws = true;
            } else {
                out.push(c);
                in_ws = false;
            }
        }
        if out != t {
            doc.set_text(id, out);
        }
    }
}

fn fill_empty_cells(doc: &mut Document) {
    let cells: Vec<NodeId> = doc
        .descendants(Document::ROOT)
        .into_iter()
        .filter(|&n| is_cell(doc, n))
        .collect();
    for cell in cells {
        let empty = doc
            .children(cell)
            .iter()
            .all(|&c| doc.text(c).is_some_and(is_blank));
        if empty {
            doc.clear_children(cell);
            doc.append_text(cell, "\u{a0}");
        }
    }
}

/// Number of grid columns a table really has: the widest row by colspan sum.
pub fn table_column_count(doc: &Document, table: NodeId) -> u32 {
    doc.table_rows(table)
        .into_iter()
        .map(|row| {
            doc.row_cells(row)
                .into_iter()
                .fold(0u32, |n, c| n.saturating_add(doc.span_attr(c, "colspan")))
        })
        .max()
        .unwrap_or(0)
}

fn reconcile_colgroups(doc: &mut Document) {
    let tables: Vec<NodeId> = doc
        .descendants(Document::ROOT)
        .into_iter()
        .filter(|&n| doc.is_element(n, "table"))
        .collect();
    for table in tables {
        let columns = table_column_count(doc, table);
        if columns == 0 {
            continue;
        }
        let colgroups: Vec<NodeId> = doc
            .element_children(table)
            .filter(|&c| doc.is_element(c, "colgroup"))
            .collect();
        for colgroup in colgroups {
            resize_colgroup(doc, colgroup, columns);
        }
    }
}

fn resize_colgroup(doc: &mut Document, colgroup: NodeId, columns: u32) {
    let cols: Vec<NodeId> = doc
        .element_children(colgroup)
        .filter(|&c| doc.is_element(c, "col"))
        .collect();
    let mut total = 0u32;
    let mut keep = 0usize;
    for &col in &cols {
        if total >= columns {
            break;
        }
        let span = doc.span_attr(col, "span");
        if total.saturating_add(span) > columns {
            let rest = columns - total;
            if rest == 1 {
                doc.remove_attr(col, "span");
            } else {
                doc.set_attr(col, "span", &rest.to_string());
            }
            total = columns;
        } else {
            total += span;
        }
        keep += 1;
    }
    for &col in &cols[keep..] {
        doc.detach(col);
    }
    if total < columns {
        log::debug!("colgroup widened from {} to {} columns", total, columns);
    }
    while total < columns {
        let span = (columns - total).min(MAX_COLSPAN);
        let attrs = match span {
            1 => Vec::new(),
            n => vec![("span".to_string(), n.to_string())],
        };
        doc.append_element(colgroup, "col", attrs);
        total += span;
    }
}
