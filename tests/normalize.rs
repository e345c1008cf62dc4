use actbook::normalize;

#[test]
fn normalizing_twice_changes_nothing() {
    let inputs = [
        "<table><tr><td><p style=\"text-align:center;font-size:12pt\">a</p></td><td></td></tr></table>",
        "<p style=\"color:red;text-align:center\">x\u{200B}y</p><script>alert(1)</script>",
        "<o:p></o:p><table><colgroup><col></colgroup><tr><td colspan=\"2\">  wide  </td><td>c</td></tr></table>",
        "<ul><li>one<li>two</ul><div><span></span>text</div>",
    ];
    for input in inputs {
        let once = normalize(input);
        assert_eq!(normalize(&once), once, "input: {input}");
    }
}

#[test]
fn disallowed_style_properties_are_dropped() {
    let out = normalize("<p style=\"color:red;text-align:center\">x</p>");
    assert!(out.contains("text-align:center"), "{out}");
    assert!(!out.contains("color"), "{out}");
}

#[test]
fn paragraph_styles_are_elevated_onto_cells() {
    let out = normalize(
        "<table><tr><td><p style=\"text-align:right;font-size:9pt\">1</p></td></tr></table>",
    );
    let td = out.split("<td").nth(1).unwrap();
    let td_open = &td[..td.find('>').unwrap()];
    assert!(td_open.contains("text-align:right"), "{out}");
    assert!(td_open.contains("font-size:9pt"), "{out}");
}

#[test]
fn cell_keeps_its_own_declaration() {
    let out = normalize(
        "<table><tr><td style=\"text-align:left\"><p style=\"text-align:right\">1</p></td></tr></table>",
    );
    let td = out.split("<td").nth(1).unwrap();
    let td_open = &td[..td.find('>').unwrap()];
    assert!(td_open.contains("text-align:left"), "{out}");
    assert!(!td_open.contains("text-align:right"), "{out}");
}

#[test]
fn executable_and_foreign_content_is_removed() {
    let out = normalize(
        "<p onclick=\"x()\">ok</p><script>bad()</script><iframe src=\"x\"></iframe><w:sdt>keep</w:sdt>",
    );
    assert!(!out.contains("script"), "{out}");
    assert!(!out.contains("bad()"), "{out}");
    assert!(!out.contains("onclick"), "{out}");
    assert!(!out.contains("iframe"), "{out}");
    assert!(!out.contains("w:sdt"), "{out}");
}

#[test]
fn empty_cells_become_non_breaking_space() {
    let out = normalize("<table><tr><td><span></span></td><td>x</td></tr></table>");
    assert!(out.contains("<td>&nbsp;</td>") || out.contains("<td>\u{a0}</td>"), "{out}");
}

#[test]
fn colgroup_matches_widest_row() {
    let out = normalize(
        "<table><colgroup><col><col><col><col></colgroup>\
         <tr><td colspan=\"2\">a</td><td>b</td></tr><tr><td>c</td></tr></table>",
    );
    assert_eq!(out.matches("<col").count() - out.matches("<colgroup").count(), 3, "{out}");
}

#[test]
fn vendor_characters_are_stripped() {
    let out = normalize("<p>a\u{00AD}b\u{FEFF}c\u{F0B7}</p>");
    assert!(out.contains("<p>abc</p>"), "{out}");
}

#[test]
fn named_entities_are_decoded() {
    let out = normalize("<p>Sesi&oacute;n ordinaria &ndash; Alcald&iacute;a&hellip;</p>");
    assert!(out.contains("<p>Sesión ordinaria – Alcaldía…</p>"), "{out}");
    assert!(!out.contains("&oacute;") && !out.contains("&amp;"), "{out}");
}

#[test]
fn huge_spans_are_bounded() {
    let out = normalize(
        "<table><colgroup><col span=\"4294967295\"></colgroup>\
         <tr><td colspan=\"4294967295\">a</td><td colspan=\"4294967295\">b</td></tr></table>",
    );
    assert!(out.contains("colspan=\"1000\""), "{out}");
    assert!(!out.contains("4294967295"), "{out}");
    // two cells of the largest span
    let cols = out.matches("<col").count() - out.matches("<colgroup").count();
    assert!(cols <= 2, "{cols} col elements");
    assert_eq!(normalize(&out), out);

    let rendered = actbook::render_paginated(&out, 1, &actbook::PageGeometry::default()).unwrap();
    assert!(rendered.page_count >= 1);
}

#[test]
fn point_widths_get_one_decimal() {
    let out = normalize("<table><tr><td style=\"width:120.456pt\">a</td><td style=\"width:30%\">b</td></tr></table>");
    assert!(out.contains("width:120.5pt"), "{out}");
    assert!(out.contains("width:30%"), "{out}");
}

#[test]
fn border_colours_become_hex() {
    let out = normalize(
        "<table><tr>\
         <td style=\"border-top:1pt solid windowtext;border-left:0.5pt dashed #F00\">a</td>\
         <td style=\"border-bottom:1pt solid rgb(0, 128, 255);border-right:none\">b</td>\
         </tr></table>",
    );
    assert!(out.contains("border-top:1pt solid #000000"), "{out}");
    assert!(out.contains("border-left:0.5pt dashed #ff0000"), "{out}");
    assert!(out.contains("border-bottom:1pt solid #0080ff"), "{out}");
    assert!(out.contains("border-right:none"), "{out}");
    assert_eq!(normalize(&out), out);
}

#[test]
fn background_colours_become_hex() {
    let out = normalize("<table><tr><td style=\"background-color:RGB(255,255,0)\">a</td></tr></table>");
    assert!(out.contains("background-color:#ffff00"), "{out}");
}
