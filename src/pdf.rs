use pdf_writer::{Content, Filter, Name, Pdf, Rect, Ref, Str};

use crate::fonts::{FontStyle, register_fonts, to_winansi_bytes};
use crate::layout::{DrawOp, PageNode};
use crate::model::PageGeometry;

/// Serialise laid-out pages into a PDF document.
pub fn write_pdf(pages: &[PageNode], geometry: &PageGeometry) -> Vec<u8> {
    let t0 = std::time::Instant::now();
    let mut pdf = Pdf::new();
    let mut next_id = 1i32;
    let mut alloc = || {
        let r = Ref::new(next_id);
        next_id += 1;
        r
    };

    let catalog_id = alloc();
    let pages_id = alloc();
    let fonts = register_fonts(&mut pdf, &mut alloc);

    let n = pages.len();
    let page_ids: Vec<Ref> = (0..n).map(|_| alloc()).collect();
    let content_ids: Vec<Ref> = (0..n).map(|_| alloc()).collect();

    for (i, page) in pages.iter().enumerate() {
        let mut content = Content::new();
        for op in &page.ops {
            draw(&mut content, op, geometry.page_height);
        }
        let raw = content.finish();
        let compressed = miniz_oxide::deflate::compress_to_vec_zlib(raw.as_slice(), 6);
        pdf.stream(content_ids[i], &compressed).filter(Filter::FlateDecode);
    }

    pdf.catalog(catalog_id).pages(pages_id);
    pdf.pages(pages_id)
        .kids(page_ids.iter().copied())
        .count(n as i32);

    for i in 0..n {
        let mut page = pdf.page(page_ids[i]);
        page.media_box(Rect::new(0.0, 0.0, geometry.page_width, geometry.page_height))
            .parent(pages_id)
            .contents(content_ids[i]);
        let mut resources = page.resources();
        let mut font_dict = resources.fonts();
        for entry in &fonts {
            font_dict.pair(Name(entry.style.resource_name().as_bytes()), entry.font_ref);
        }
    }

    let bytes = pdf.finish();
    log::debug!(
        "write_pdf: {n} pages, {} bytes in {:.1}ms",
        bytes.len(),
        t0.elapsed().as_secs_f64() * 1000.0
    );
    bytes
}

/// Emit one drawing operation. Layout coordinates grow downwards from the
/// top edge; PDF user space grows upwards from the bottom.
fn draw(content: &mut Content, op: &DrawOp, page_height: f32) {
    match op {
        DrawOp::Text {
            x,
            y,
            size,
            style,
            text,
        } => {
            let font: FontStyle = *style;
            content
                .begin_text()
                .set_font(Name(font.resource_name().as_bytes()), *size)
                .next_line(*x, page_height - y)
                .show(Str(&to_winansi_bytes(text)))
                .end_text();
        }
        DrawOp::Rect {
            x,
            y,
            width,
            height,
            color: [r, g, b],
        } => {
            content.save_state();
            content.set_fill_rgb(*r as f32 / 255.0, *g as f32 / 255.0, *b as f32 / 255.0);
            content.rect(*x, page_height - y - height, *width, *height);
            content.fill_nonzero();
            content.restore_state();
        }
        DrawOp::Line {
            x1,
            y1,
            x2,
            y2,
            width,
            color: [r, g, b],
        } => {
            content.save_state();
            content.set_line_width(*width);
            content.set_stroke_rgb(*r as f32 / 255.0, *g as f32 / 255.0, *b as f32 / 255.0);
            content.move_to(*x1, page_height - y1);
            content.line_to(*x2, page_height - y2);
            content.stroke();
            content.restore_state();
        }
    }
}

/// Count page objects in a PDF: `/Type /Page` entries, excluding `/Pages`.
pub fn count_page_markers(pdf: &[u8]) -> u32 {
    const TYPE: &[u8] = b"/Type";
    const PAGE: &[u8] = b"/Page";
    let mut count = 0;
    let mut i = 0;
    while i + TYPE.len() <= pdf.len() {
        if &pdf[i..i + TYPE.len()] != TYPE {
            i += 1;
            continue;
        }
        let mut j = i + TYPE.len();
        while j < pdf.len() && pdf[j].is_ascii_whitespace() {
            j += 1;
        }
        if pdf[j..].starts_with(PAGE) {
            let next = pdf.get(j + PAGE.len()).copied();
            if !next.is_some_and(|c| c.is_ascii_alphanumeric()) {
                count += 1;
            }
        }
        i = j.max(i + 1);
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_markers_skip_page_tree() {
        let sample = b"<< /Type /Pages /Count 2 >> << /Type /Page >> <</Type/Page/Parent 2 0 R>>";
        assert_eq!(count_page_markers(sample), 2);
        assert_eq!(count_page_markers(b""), 0);
    }

    #[test]
    fn written_pdf_has_one_marker_per_page() {
        let geometry = PageGeometry::default();
        let pages: Vec<PageNode> = (1..=3)
            .map(|number| PageNode {
                number,
                ops: vec![DrawOp::Text {
                    x: 72.0,
                    y: 100.0,
                    size: 11.0,
                    style: FontStyle::Bold,
                    text: format!("page {number}"),
                }],
            })
            .collect();
        let bytes = write_pdf(&pages, &geometry);
        assert!(bytes.starts_with(b"%PDF-"));
        assert_eq!(count_page_markers(&bytes), 3);
    }
}
