pub mod docx;
mod error;
mod fonts;
pub mod html;
pub mod layout;
mod model;
mod normalize;
pub mod pages;
mod pdf;
pub mod units;
pub mod xlsx;

pub use error::{Error, Result};
pub use fonts::FontStyle;
pub use model::{
    Alignment, BookSettings, BorderSpec, CellWidth, PageGeometry, PageOffsetEntry, PageOffsetTable,
    Side, StyledCell, StyledRow, StyledTable, VerticalAlign, WidthUnit,
};
pub use normalize::{elevate_cell_styles, normalize, sanitize, table_column_count};
pub use pages::{
    ActHeader, ActPages, ActSource, Book, RenderedBook, recompute_offsets, render_book, save_act,
    thread_offsets,
};
pub use pdf::{count_page_markers, write_pdf};

use std::path::Path;
use std::time::Instant;

use layout::{FlowNode, PageNode};

/// Source format of an imported document.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ImportFormat {
    Docx,
    Xlsx,
}

impl ImportFormat {
    /// Parse a declared format name (`docx` / `xlsx`, case-insensitive).
    pub fn from_name(name: &str) -> Result<Self> {
        match name.trim().trim_start_matches('.').to_ascii_lowercase().as_str() {
            "docx" => Ok(Self::Docx),
            "xlsx" => Ok(Self::Xlsx),
            other => Err(Error::UnsupportedFormat(other.to_string())),
        }
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .ok_or_else(|| Error::UnsupportedFormat(path.display().to_string()))?;
        Self::from_name(ext)
    }
}

/// Import a DOCX or XLSX buffer as canonical HTML: tables with their styles
/// elevated onto cells and everything outside the whitelist removed.
pub fn import_document(bytes: &[u8], format: ImportFormat) -> Result<String> {
    let t0 = Instant::now();

    let raw = match format {
        ImportFormat::Docx => docx::import(bytes)?,
        ImportFormat::Xlsx => xlsx::import(bytes)?,
    };
    let t_import = t0.elapsed();

    let html = normalize(&raw);
    let t_total = t0.elapsed();

    log::info!(
        "Timing: import={:.1}ms, normalize={:.1}ms, total={:.1}ms (input {} bytes, output {} bytes)",
        t_import.as_secs_f64() * 1000.0,
        (t_total - t_import).as_secs_f64() * 1000.0,
        t_total.as_secs_f64() * 1000.0,
        bytes.len(),
        html.len(),
    );

    Ok(html)
}

/// A laid-out document and its PDF serialisation.
#[derive(Clone, Debug)]
pub struct RenderedDocument {
    pub pages: Vec<PageNode>,
    /// Page objects counted in `pdf`.
    pub page_count: u32,
    pub pdf: Vec<u8>,
}

/// Paginate canonical HTML, numbering pages from `start_page`.
pub fn render_paginated(html: &str, start_page: u32, geometry: &PageGeometry) -> Result<RenderedDocument> {
    render_flow(&layout::build_flow(html), start_page, geometry)
}

pub(crate) fn render_flow(flow: &[FlowNode], start_page: u32, geometry: &PageGeometry) -> Result<RenderedDocument> {
    let t0 = Instant::now();

    let pages = layout::paginate(flow, start_page, geometry);
    crate::pages::end_page(start_page, pages.len() as u32)?;
    let t_layout = t0.elapsed();

    let pdf = write_pdf(&pages, geometry);
    let page_count = count_page_markers(&pdf);
    let t_total = t0.elapsed();

    if page_count as usize != pages.len() {
        return Err(Error::PaginationInconsistency(format!(
            "laid out {} pages but the PDF holds {page_count}",
            pages.len()
        )));
    }

    log::info!(
        "Timing: layout={:.1}ms, pdf={:.1}ms, total={:.1}ms ({} pages from {start_page}, {} bytes)",
        t_layout.as_secs_f64() * 1000.0,
        (t_total - t_layout).as_secs_f64() * 1000.0,
        t_total.as_secs_f64() * 1000.0,
        page_count,
        pdf.len(),
    );

    Ok(RenderedDocument {
        pages,
        page_count,
        pdf,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_names() {
        assert_eq!(ImportFormat::from_name("DOCX").unwrap(), ImportFormat::Docx);
        assert_eq!(ImportFormat::from_name(".xlsx").unwrap(), ImportFormat::Xlsx);
        assert!(matches!(
            ImportFormat::from_name("pdf"),
            Err(Error::UnsupportedFormat(_))
        ));
        assert_eq!(
            ImportFormat::from_path(Path::new("minutes/act.docx")).unwrap(),
            ImportFormat::Docx
        );
    }
}
