use pdf_writer::{Name, Pdf, Ref};

/// Helvetica ascender at 1000 units/em, as a fraction of the font size.
pub(crate) const ASCENDER_RATIO: f32 = 0.718;

/// The four faces of the base-14 Helvetica family used for all text.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum FontStyle {
    #[default]
    Regular,
    Bold,
    Italic,
    BoldItalic,
}

impl FontStyle {
    pub(crate) const ALL: [FontStyle; 4] = [
        FontStyle::Regular,
        FontStyle::Bold,
        FontStyle::Italic,
        FontStyle::BoldItalic,
    ];

    pub fn from_flags(bold: bool, italic: bool) -> Self {
        match (bold, italic) {
            (false, false) => FontStyle::Regular,
            (true, false) => FontStyle::Bold,
            (false, true) => FontStyle::Italic,
            (true, true) => FontStyle::BoldItalic,
        }
    }

    pub fn is_bold(self) -> bool {
        matches!(self, FontStyle::Bold | FontStyle::BoldItalic)
    }

    fn base_font(self) -> &'static [u8] {
        match self {
            FontStyle::Regular => b"Helvetica",
            FontStyle::Bold => b"Helvetica-Bold",
            FontStyle::Italic => b"Helvetica-Oblique",
            FontStyle::BoldItalic => b"Helvetica-BoldOblique",
        }
    }

    /// Resource name used in page content streams.
    pub(crate) fn resource_name(self) -> &'static str {
        match self {
            FontStyle::Regular => "F1",
            FontStyle::Bold => "F2",
            FontStyle::Italic => "F3",
            FontStyle::BoldItalic => "F4",
        }
    }
}

pub(crate) struct FontEntry {
    pub(crate) style: FontStyle,
    pub(crate) font_ref: Ref,
}

/// Write the four Type1 font dictionaries and return their references.
pub(crate) fn register_fonts(pdf: &mut Pdf, alloc: &mut impl FnMut() -> Ref) -> Vec<FontEntry> {
    FontStyle::ALL
        .into_iter()
        .map(|style| {
            let font_ref = alloc();
            pdf.type1_font(font_ref)
                .base_font(Name(style.base_font()))
                .encoding_predefined(Name(b"WinAnsiEncoding"));
            FontEntry { style, font_ref }
        })
        .collect()
}

/// Approximate Helvetica width of a WinAnsi byte at 1000 units/em.
fn helvetica_width(b: u8) -> f32 {
    match b {
        32 => 278.0,                          // space
        33..=47 => 333.0,                     // punctuation
        48..=57 => 556.0,                     // digits
        58..=64 => 333.0,                     // more punctuation
        73 | 74 => 278.0,                     // I J (narrow uppercase)
        77 => 833.0,                          // M (wide)
        65..=90 => 667.0,                     // uppercase A-Z (average)
        91..=96 => 333.0,                     // brackets etc.
        102 | 105 | 106 | 108 | 116 => 278.0, // narrow lowercase: f i j l t
        109 | 119 => 833.0,                   // m w (wide)
        97..=122 => 556.0,                    // lowercase a-z (average)
        0x95 => 350.0,                        // bullet
        0x96 => 556.0,
        0x97 => 1000.0,
        _ => 556.0,
    }
}

pub(crate) fn char_width_1000(ch: char, style: FontStyle) -> f32 {
    let w = match char_to_winansi(ch) {
        Some(b) if b >= 32 => helvetica_width(b),
        Some(_) => 0.0,
        None => helvetica_width(b'?'),
    };
    if style.is_bold() { w * 1.06 } else { w }
}

pub(crate) fn text_width(text: &str, font_size: f32, style: FontStyle) -> f32 {
    text.chars()
        .map(|ch| char_width_1000(ch, style) * font_size / 1000.0)
        .sum()
}

/// Map a single Unicode char to its WinAnsi byte.
fn char_to_winansi(c: char) -> Option<u8> {
    Some(match c as u32 {
        0x0000..=0x007F => c as u8,
        0x00A0..=0x00FF => c as u8,
        0x20AC => 0x80,
        0x201A => 0x82,
        0x0192 => 0x83,
        0x201E => 0x84,
        0x2026 => 0x85,
        0x2020 => 0x86,
        0x2021 => 0x87,
        0x02C6 => 0x88,
        0x2030 => 0x89,
        0x0160 => 0x8A,
        0x2039 => 0x8B,
        0x0152 => 0x8C,
        0x017D => 0x8E,
        0x2018 => 0x91,
        0x2019 => 0x92,
        0x201C => 0x93,
        0x201D => 0x94,
        0x2022 => 0x95,
        0x2013 => 0x96,
        0x2014 => 0x97,
        0x02DC => 0x98,
        0x2122 => 0x99,
        0x0161 => 0x9A,
        0x203A => 0x9B,
        0x0153 => 0x9C,
        0x017E => 0x9E,
        0x0178 => 0x9F,
        _ => return None,
    })
}

/// Convert a UTF-8 string to WinAnsi (Windows-1252) bytes for PDF Str encoding.
/// Characters outside the code page become `?`.
pub(crate) fn to_winansi_bytes(s: &str) -> Vec<u8> {
    s.chars().map(|c| char_to_winansi(c).unwrap_or(b'?')).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn winansi_maps_typographic_punctuation() {
        assert_eq!(to_winansi_bytes("a\u{2019}b"), vec![b'a', 0x92, b'b']);
        assert_eq!(to_winansi_bytes("\u{00e9}"), vec![0xE9]);
        assert_eq!(to_winansi_bytes("\u{4e2d}"), vec![b'?']);
    }

    #[test]
    fn bold_text_is_wider() {
        let regular = text_width("Municipal", 10.0, FontStyle::Regular);
        let bold = text_width("Municipal", 10.0, FontStyle::Bold);
        assert!(bold > regular);
        assert_eq!(text_width("", 10.0, FontStyle::Regular), 0.0);
    }
}
