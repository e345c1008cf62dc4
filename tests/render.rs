mod common;

use actbook::layout::DrawOp;
use actbook::{PageGeometry, count_page_markers, render_paginated};

use common::{blank_lines, small_page};

#[test]
fn page_count_follows_content_height() {
    common::init_logging();
    let geometry = small_page();
    for (lines, pages) in [(1, 1), (13, 1), (14, 2), (26, 2), (27, 3)] {
        let rendered = render_paginated(&blank_lines(lines), 1, &geometry).unwrap();
        assert_eq!(rendered.pages.len(), pages, "{lines} lines");
        assert_eq!(rendered.page_count as usize, pages, "{lines} lines");
        assert_eq!(count_page_markers(&rendered.pdf), pages as u32);
    }
}

#[test]
fn empty_document_still_has_a_page() {
    let rendered = render_paginated("", 3, &small_page()).unwrap();
    assert_eq!(rendered.page_count, 1);
    assert_eq!(rendered.pages[0].number, 3);
}

#[test]
fn pages_are_numbered_from_start_page() {
    let rendered = render_paginated(&blank_lines(14), 5, &small_page()).unwrap();
    let numbers: Vec<u32> = rendered.pages.iter().map(|p| p.number).collect();
    assert_eq!(numbers, vec![5, 6]);
    assert_eq!(rendered.pages[1].text(), "6");
}

#[test]
fn page_numbers_can_be_suppressed() {
    let geometry = PageGeometry {
        print_page_numbers: false,
        ..small_page()
    };
    let rendered = render_paginated(&blank_lines(3), 1, &geometry).unwrap();
    assert!(rendered.pages[0].ops.is_empty());
}

#[test]
fn generated_title_is_not_rendered() {
    let html = "<p><strong>Act No. 12/2024</strong></p><p>Attendance</p>";
    let rendered = render_paginated(html, 1, &small_page()).unwrap();
    let text = rendered.pages[0].text();
    assert!(!text.contains("12/2024"), "{text}");
    assert!(text.starts_with("Attendance"), "{text}");
}

#[test]
fn long_table_continues_on_next_page() {
    let rows: String = (0..40)
        .map(|i| format!("<tr><td>row {i}</td><td>value</td></tr>"))
        .collect();
    let html = format!("<table>{rows}</table>");
    let rendered = render_paginated(&html, 1, &small_page()).unwrap();
    assert!(rendered.page_count >= 3, "{}", rendered.page_count);

    let all: String = rendered.pages.iter().map(|p| p.text()).collect::<Vec<_>>().join(" ");
    for i in 0..40 {
        assert!(all.contains(&format!("row {i} ")), "row {i} missing");
    }
}

#[test]
fn cell_widths_follow_colspan() {
    let html = "<table><tr><td colspan=\"2\">wide</td><td>narrow</td></tr></table>";
    let geometry = PageGeometry {
        print_page_numbers: false,
        ..small_page()
    };
    let rendered = render_paginated(html, 1, &geometry).unwrap();
    let xs: Vec<f32> = rendered.pages[0]
        .ops
        .iter()
        .filter_map(|op| match op {
            DrawOp::Text { x, .. } => Some(*x),
            _ => None,
        })
        .collect();
    // 260pt of content width over three columns; "narrow" starts in the third
    let third = 20.0 + 260.0 * 2.0 / 3.0;
    assert!(xs[0] < third && xs[1] > third, "{xs:?}");
}

#[test]
fn output_is_a_pdf() {
    let rendered = render_paginated("<p>hello</p>", 1, &PageGeometry::default()).unwrap();
    assert!(rendered.pdf.starts_with(b"%PDF-"));
    assert!(rendered.pdf.ends_with(b"%%EOF\n") || rendered.pdf.ends_with(b"%%EOF"));
}

#[test]
fn named_entities_render_as_characters() {
    let html = "<p>Sesi&oacute;n ordinaria &ndash; Alcald&iacute;a&hellip;</p>";
    let rendered = render_paginated(html, 1, &small_page()).unwrap();
    let words: String = rendered.pages[0].text().split_whitespace().collect();
    assert!(words.starts_with("Sesiónordinaria–Alcaldía…"), "{words}");
}

#[test]
fn tall_rowspan_is_split_across_pages() {
    let geometry = small_page();
    let mut rows = String::from("<tr><td rowspan=\"60\">Attendees</td><td>row 0</td></tr>");
    for i in 1..60 {
        rows.push_str(&format!("<tr><td>row {i}</td></tr>"));
    }
    let rendered = render_paginated(&format!("<table>{rows}</table>"), 1, &geometry).unwrap();
    assert!(rendered.page_count >= 6, "{}", rendered.page_count);

    for page in &rendered.pages {
        for op in &page.ops {
            if let DrawOp::Text { y, text, .. } = op {
                assert!(*y <= geometry.page_height, "{text} drawn at {y}");
            }
        }
    }
    let all: String = rendered.pages.iter().map(|p| p.text()).collect::<Vec<_>>().join(" ");
    for i in 0..60 {
        assert!(all.contains(&format!("row {i} ")), "row {i} missing");
    }
}
