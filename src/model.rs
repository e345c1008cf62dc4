use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Alignment {
    Left,
    Center,
    Right,
    Justify,
}

impl Alignment {
    pub fn css(self) -> &'static str {
        match self {
            Alignment::Left => "left",
            Alignment::Center => "center",
            Alignment::Right => "right",
            Alignment::Justify => "justify",
        }
    }

    pub fn from_css(val: &str) -> Option<Self> {
        match val.trim().to_ascii_lowercase().as_str() {
            "left" | "start" => Some(Alignment::Left),
            "center" => Some(Alignment::Center),
            "right" | "end" => Some(Alignment::Right),
            "justify" => Some(Alignment::Justify),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerticalAlign {
    Top,
    Middle,
    Bottom,
}

impl VerticalAlign {
    pub fn css(self) -> &'static str {
        match self {
            VerticalAlign::Top => "top",
            VerticalAlign::Middle => "middle",
            VerticalAlign::Bottom => "bottom",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum WidthUnit {
    Twip,
    Percent,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CellWidth {
    pub value: f32,
    pub unit: WidthUnit,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Top,
    Left,
    Bottom,
    Right,
}

impl Side {
    pub const ALL: [Side; 4] = [Side::Top, Side::Left, Side::Bottom, Side::Right];

    pub fn name(self) -> &'static str {
        match self {
            Side::Top => "top",
            Side::Left => "left",
            Side::Bottom => "bottom",
            Side::Right => "right",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BorderSpec {
    /// CSS border style (`solid`, `double`, `dashed`, `dotted`, `none`).
    pub style: String,
    pub width_pt: f32,
    /// `#rrggbb`, or `None` for automatic (black).
    pub color: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StyledCell {
    pub width: Option<CellWidth>,
    pub shading: Option<String>,
    pub vertical_align: Option<VerticalAlign>,
    pub borders: BTreeMap<Side, BorderSpec>,
    pub colspan: u32,
    pub rowspan: u32,
    pub font_size_pt: Option<f32>,
    pub font_family: Option<String>,
    pub text_align: Option<Alignment>,
}

impl Default for StyledCell {
    fn default() -> Self {
        Self {
            width: None,
            shading: None,
            vertical_align: None,
            borders: BTreeMap::new(),
            colspan: 1,
            rowspan: 1,
            font_size_pt: None,
            font_family: None,
            text_align: None,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StyledRow {
    pub cells: Vec<StyledCell>,
}

impl StyledRow {
    /// Scale percent widths down so the row's cells total at most 100%.
    /// A spanning cell's percent already covers all of its columns.
    pub fn normalize_percent_widths(&mut self) {
        let total: f32 = self
            .cells
            .iter()
            .filter_map(|c| c.width)
            .filter(|w| w.unit == WidthUnit::Percent)
            .map(|w| w.value)
            .sum();
        if total <= 100.0 {
            return;
        }
        let scale = 100.0 / total;
        for cell in &mut self.cells {
            if let Some(w) = cell.width.as_mut()
                && w.unit == WidthUnit::Percent
            {
                w.value *= scale;
            }
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StyledTable {
    pub rows: Vec<StyledRow>,
}

/// Fixed page geometry used by the block layout renderer. All values in points.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageGeometry {
    pub page_width: f32,
    pub page_height: f32,
    pub margin_top: f32,
    pub margin_bottom: f32,
    pub margin_left: f32,
    pub margin_right: f32,
    pub font_size: f32,
    /// Line height as a multiple of the font size.
    pub line_height: f32,
    pub paragraph_spacing: f32,
    pub cell_padding: f32,
    pub print_page_numbers: bool,
}

impl Default for PageGeometry {
    fn default() -> Self {
        Self {
            page_width: 595.28,
            page_height: 841.89,
            margin_top: 72.0,
            margin_bottom: 72.0,
            margin_left: 72.0,
            margin_right: 72.0,
            font_size: 11.0,
            line_height: 1.2,
            paragraph_spacing: 4.0,
            cell_padding: 3.0,
            print_page_numbers: true,
        }
    }
}

impl PageGeometry {
    pub fn content_width(&self) -> f32 {
        (self.page_width - self.margin_left - self.margin_right).max(1.0)
    }

    pub fn content_height(&self) -> f32 {
        (self.page_height - self.margin_top - self.margin_bottom).max(1.0)
    }

    pub fn line_pitch(&self, font_size: f32) -> f32 {
        font_size * self.line_height
    }
}

/// Book-level numbering settings persisted next to the Acts.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BookSettings {
    pub title: String,
    /// Cover and index pages that precede the first Act.
    pub front_matter_pages: u32,
    /// Leading unnumbered pages subtracted from printed page numbers.
    pub page_numbering_offset: u32,
}

impl Default for BookSettings {
    fn default() -> Self {
        Self {
            title: String::new(),
            front_matter_pages: 1,
            page_numbering_offset: 0,
        }
    }
}

impl BookSettings {
    pub fn first_act_start(&self) -> u32 {
        self.front_matter_pages
            .saturating_add(1)
            .saturating_sub(self.page_numbering_offset)
            .max(1)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageOffsetEntry {
    pub act_id: String,
    pub start_page: u32,
    pub page_count: u32,
    pub end_page: u32,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageOffsetTable {
    pub entries: Vec<PageOffsetEntry>,
}

impl PageOffsetTable {
    pub fn get(&self, act_id: &str) -> Option<&PageOffsetEntry> {
        self.entries.iter().find(|e| e.act_id == act_id)
    }

    /// Last printed page of the book, or `None` for an empty book.
    pub fn last_page(&self) -> Option<u32> {
        self.entries.last().map(|e| e.end_page)
    }
}
