use crate::fonts::{FontStyle, text_width};
use crate::model::PageGeometry;

use super::text::{baseline_offset, build_lines, line_ops};
use super::{FlowNode, List, Paragraph, table};

/// Heights are compared with this tolerance so that accumulated rounding
/// does not push an exactly fitting line onto the next page.
pub(super) const FIT_EPSILON: f32 = 0.01;

/// Indent of list item content from the label column.
const LIST_INDENT: f32 = 18.0;

/// A primitive drawing operation. Coordinates are in points measured from
/// the top-left corner; `y` of text is its baseline.
#[derive(Clone, Debug, PartialEq)]
pub enum DrawOp {
    Text {
        x: f32,
        y: f32,
        size: f32,
        style: FontStyle,
        text: String,
    },
    Rect {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        color: [u8; 3],
    },
    Line {
        x1: f32,
        y1: f32,
        x2: f32,
        y2: f32,
        width: f32,
        color: [u8; 3],
    },
}

impl DrawOp {
    pub(super) fn shifted(mut self, dy: f32) -> Self {
        match &mut self {
            DrawOp::Text { y, .. } | DrawOp::Rect { y, .. } => *y += dy,
            DrawOp::Line { y1, y2, .. } => {
                *y1 += dy;
                *y2 += dy;
            }
        }
        self
    }
}

/// One physical page of a rendered document.
#[derive(Clone, Debug, PartialEq)]
pub struct PageNode {
    /// Printed page number.
    pub number: u32,
    pub ops: Vec<DrawOp>,
}

impl PageNode {
    /// Visible words on the page, in drawing order, separated by spaces.
    pub fn text(&self) -> String {
        self.ops
            .iter()
            .filter_map(|op| match op {
                DrawOp::Text { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// An unbreakable slice of laid-out content. Ops are positioned with
/// absolute x and y relative to the fragment's top edge.
pub(super) struct Fragment {
    pub(super) height: f32,
    pub(super) ops: Vec<DrawOp>,
    /// Vertical spacing; dropped at the top of a page.
    pub(super) spacer: bool,
    /// Baseline of the fragment's first text line, for list labels.
    pub(super) baseline: Option<f32>,
}

impl Fragment {
    fn spacer(height: f32) -> Self {
        Self {
            height,
            ops: Vec::new(),
            spacer: true,
            baseline: None,
        }
    }
}

/// Lay out a block sequence into a column starting at `x`, `width` wide.
pub(super) fn layout_blocks(nodes: &[FlowNode], x: f32, width: f32, geometry: &PageGeometry) -> Vec<Fragment> {
    let mut out = Vec::new();
    for node in nodes {
        match node {
            FlowNode::Paragraph(p) => layout_paragraph(p, x, width, geometry, &mut out),
            FlowNode::BlankLine => {
                out.push(Fragment {
                    height: geometry.line_pitch(geometry.font_size),
                    ops: Vec::new(),
                    spacer: false,
                    baseline: None,
                });
                push_spacing(geometry, &mut out);
            }
            FlowNode::List(l) => layout_list(l, x, width, geometry, &mut out),
            FlowNode::Table(t) => {
                out.extend(table::layout_table(t, x, width, geometry));
                push_spacing(geometry, &mut out);
            }
        }
    }
    out
}

fn push_spacing(geometry: &PageGeometry, out: &mut Vec<Fragment>) {
    if geometry.paragraph_spacing > 0.0 {
        out.push(Fragment::spacer(geometry.paragraph_spacing));
    }
}

fn layout_paragraph(p: &Paragraph, x: f32, width: f32, geometry: &PageGeometry, out: &mut Vec<Fragment>) {
    let font_size = p.font_size.unwrap_or(geometry.font_size);
    let pitch = geometry.line_pitch(font_size);
    for line in build_lines(&p.inlines, font_size, width) {
        out.push(Fragment {
            height: pitch,
            ops: line_ops(&line, x, width, p.align, font_size, pitch),
            spacer: false,
            baseline: Some(baseline_offset(font_size, pitch)),
        });
    }
    push_spacing(geometry, out);
}

fn layout_list(list: &List, x: f32, width: f32, geometry: &PageGeometry, out: &mut Vec<Fragment>) {
    let font_size = geometry.font_size;
    let pitch = geometry.line_pitch(font_size);
    let indent = LIST_INDENT.min(width / 2.0);
    for item in &list.items {
        let mut frags: Vec<Fragment> = layout_blocks(&item.content, x + indent, width - indent, geometry)
            .into_iter()
            .skip_while(|f| f.spacer)
            .collect();
        let label_frag = match frags.iter().position(|f| !f.spacer) {
            Some(i) => i,
            None => {
                frags.insert(
                    0,
                    Fragment {
                        height: pitch,
                        ops: Vec::new(),
                        spacer: false,
                        baseline: None,
                    },
                );
                0
            }
        };
        let target = &mut frags[label_frag];
        let baseline = target.baseline.unwrap_or(baseline_offset(font_size, pitch));
        let label_w = text_width(&item.label, font_size, FontStyle::Regular);
        target.ops.push(DrawOp::Text {
            x: (x + indent - label_w - 4.0).max(x),
            y: baseline,
            size: font_size,
            style: FontStyle::Regular,
            text: item.label.clone(),
        });
        out.extend(frags);
    }
}

/// Stack `flow` onto pages of `geometry`, numbering them from `start_page`.
/// A document always yields at least one page.
pub fn paginate(flow: &[FlowNode], start_page: u32, geometry: &PageGeometry) -> Vec<PageNode> {
    let fragments = layout_blocks(flow, geometry.margin_left, geometry.content_width(), geometry);
    let limit = geometry.content_height();

    let mut pages: Vec<Vec<DrawOp>> = Vec::new();
    let mut ops: Vec<DrawOp> = Vec::new();
    let mut used = 0.0f32;
    let mut page_empty = true;

    for frag in fragments {
        if frag.spacer && page_empty {
            continue;
        }
        if !page_empty && used + frag.height > limit + FIT_EPSILON {
            pages.push(std::mem::take(&mut ops));
            used = 0.0;
            page_empty = true;
            if frag.spacer {
                continue;
            }
        }
        if frag.height > limit + FIT_EPSILON {
            log::warn!(
                "block of {:.1}pt exceeds the {:.1}pt content height and overflows the page",
                frag.height,
                limit
            );
        }
        let top = geometry.margin_top + used;
        ops.extend(frag.ops.into_iter().map(|op| op.shifted(top)));
        used += frag.height;
        page_empty = false;
    }
    pages.push(ops);

    pages
        .into_iter()
        .enumerate()
        .map(|(i, mut ops)| {
            let number = start_page.saturating_add(i as u32);
            if geometry.print_page_numbers {
                ops.push(page_number_op(number, geometry));
            }
            PageNode { number, ops }
        })
        .collect()
}

fn page_number_op(number: u32, geometry: &PageGeometry) -> DrawOp {
    let text = number.to_string();
    let size = geometry.font_size;
    let w = text_width(&text, size, FontStyle::Regular);
    DrawOp::Text {
        x: (geometry.page_width - w) / 2.0,
        y: geometry.page_height - geometry.margin_bottom / 2.0 + size * 0.3,
        size,
        style: FontStyle::Regular,
        text,
    }
}
