#![allow(dead_code)]

use std::io::{Cursor, Write};

use actbook::PageGeometry;
use zip::write::SimpleFileOptions;

const W_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";
const S_NS: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
const R_NS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Build an in-memory ZIP package from `(part name, contents)` pairs.
pub fn package(parts: &[(&str, &str)]) -> Vec<u8> {
    let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for (name, contents) in parts {
        zip.start_file(*name, SimpleFileOptions::default())
            .expect("start zip entry");
        zip.write_all(contents.as_bytes()).expect("write zip entry");
    }
    zip.finish().expect("finish zip").into_inner()
}

/// A DOCX package whose `w:body` holds `body_xml`.
pub fn docx(body_xml: &str) -> Vec<u8> {
    let document = format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\
         <w:document xmlns:w=\"{W_NS}\"><w:body>{body_xml}</w:body></w:document>"
    );
    package(&[("word/document.xml", &document)])
}

pub fn para(text: &str) -> String {
    format!("<w:p><w:r><w:t xml:space=\"preserve\">{text}</w:t></w:r></w:p>")
}

/// A table cell with optional `w:tcPr` content.
pub fn tc(props: &str, text: &str) -> String {
    let pr = if props.is_empty() {
        String::new()
    } else {
        format!("<w:tcPr>{props}</w:tcPr>")
    };
    format!("<w:tc>{pr}{}</w:tc>", para(text))
}

pub fn tbl(grid_twips: &[u32], rows: &[Vec<String>]) -> String {
    let grid: String = grid_twips
        .iter()
        .map(|w| format!("<w:gridCol w:w=\"{w}\"/>"))
        .collect();
    let rows: String = rows
        .iter()
        .map(|cells| format!("<w:tr>{}</w:tr>", cells.concat()))
        .collect();
    format!("<w:tbl><w:tblGrid>{grid}</w:tblGrid>{rows}</w:tbl>")
}

/// A single-sheet XLSX package. `sheet_inner` goes inside `<worksheet>`.
pub fn xlsx(sheet_inner: &str, shared_strings: &[&str], styles: Option<&str>) -> Vec<u8> {
    let workbook = format!(
        "<workbook xmlns=\"{S_NS}\" xmlns:r=\"{R_NS}\">\
         <sheets><sheet name=\"Sheet1\" sheetId=\"1\" r:id=\"rId1\"/></sheets></workbook>"
    );
    let rels = "<Relationships xmlns=\"http://schemas.openxmlformats.org/package/2006/relationships\">\
         <Relationship Id=\"rId1\" Type=\"worksheet\" Target=\"worksheets/sheet1.xml\"/>\
         </Relationships>";
    let sheet = format!("<worksheet xmlns=\"{S_NS}\">{sheet_inner}</worksheet>");
    let sst: String = shared_strings
        .iter()
        .map(|s| format!("<si><t>{s}</t></si>"))
        .collect();
    let sst = format!("<sst xmlns=\"{S_NS}\">{sst}</sst>");

    let mut parts = vec![
        ("xl/workbook.xml", workbook.as_str()),
        ("xl/_rels/workbook.xml.rels", rels),
        ("xl/worksheets/sheet1.xml", sheet.as_str()),
        ("xl/sharedStrings.xml", sst.as_str()),
    ];
    let styles_xml = styles.map(|s| format!("<styleSheet xmlns=\"{S_NS}\">{s}</styleSheet>"));
    if let Some(s) = &styles_xml {
        parts.push(("xl/styles.xml", s.as_str()));
    }
    package(&parts)
}

/// A small page: 160pt of content height, 12pt line pitch, 13 lines.
pub fn small_page() -> PageGeometry {
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
        print_page_numbers: true,
    }
}

/// Canonical HTML that fills exactly `lines` lines of [`small_page`].
pub fn blank_lines(lines: usize) -> String {
    "<p></p>".repeat(lines)
}

/// Extract percentage values of `width:` declarations in document order.
pub fn widths(html: &str) -> Vec<f32> {
    html.match_indices("width:")
        .filter_map(|(i, _)| {
            let rest = &html[i + "width:".len()..];
            let end = rest.find('%')?;
            rest[..end].parse().ok()
        })
        .collect()
}
