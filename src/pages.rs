//! Page numbering across the Acts of a book.
//!
//! Each Act is paginated on its own when saved; the resulting page count is
//! stored with the Act. Start pages are never maintained incrementally: they
//! are threaded from scratch through the stored counts whenever the book is
//! rendered or reordered.

use std::collections::{HashMap, HashSet};
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::html::escape_text;
use crate::layout::{self, FlowNode, PageNode};
use crate::model::{BookSettings, PageGeometry, PageOffsetEntry, PageOffsetTable};
use crate::pdf::{count_page_markers, write_pdf};
use crate::{RenderedDocument, render_flow};

/// Structured heading rendered above an Act's body.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActHeader {
    pub title: String,
}

/// Page span of one Act as persisted after a save.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActPages {
    pub start_page: u32,
    pub page_count: u32,
    pub end_page: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActSource {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    pub content: String,
    /// Page count recorded at the Act's last save.
    #[serde(default)]
    pub page_count: Option<u32>,
}

impl ActSource {
    pub fn header(&self) -> Option<ActHeader> {
        self.title.as_ref().map(|title| ActHeader {
            title: title.clone(),
        })
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Book {
    #[serde(default)]
    pub settings: BookSettings,
    pub acts: Vec<ActSource>,
}

pub struct RenderedBook {
    pub document: RenderedDocument,
    pub offsets: PageOffsetTable,
}

/// Flow of an Act: its header (if any) followed by the body.
pub fn act_flow(content: &str, header: Option<&ActHeader>) -> Vec<FlowNode> {
    let mut flow = Vec::new();
    if let Some(h) = header {
        flow.push(FlowNode::heading(&h.title));
        flow.push(FlowNode::BlankLine);
    }
    flow.extend(layout::build_flow(content));
    flow
}

/// Paginate one Act on its own, starting at `start_page`, and report its span.
pub fn save_act(
    content: &str,
    header: Option<&ActHeader>,
    start_page: u32,
    geometry: &PageGeometry,
) -> Result<ActPages> {
    let rendered = render_flow(&act_flow(content, header), start_page, geometry)?;
    let page_count = rendered.page_count;
    Ok(ActPages {
        start_page,
        page_count,
        end_page: end_page(start_page, page_count)?,
    })
}

/// Last page of `page_count` pages numbered from `start_page`.
pub(crate) fn end_page(start_page: u32, page_count: u32) -> Result<u32> {
    start_page
        .checked_add(page_count.saturating_sub(1))
        .ok_or_else(|| {
            Error::PaginationInconsistency(format!(
                "{page_count} pages from page {start_page} overflow the page numbers"
            ))
        })
}

/// First page after one ending at `end_page`.
fn next_page(end_page: u32) -> Result<u32> {
    end_page.checked_add(1).ok_or_else(|| {
        Error::PaginationInconsistency(format!("no page number follows page {end_page}"))
    })
}

/// Thread start pages through stored page counts in `order`.
///
/// Fails with [`Error::PaginationInconsistency`] when an Act has no stored
/// count, a count of zero, or appears twice.
pub fn thread_offsets(
    order: &[String],
    counts: &HashMap<String, u32>,
    settings: &BookSettings,
) -> Result<PageOffsetTable> {
    let mut seen = HashSet::new();
    let mut entries = Vec::with_capacity(order.len());
    let mut next = Ok(settings.first_act_start());
    for id in order {
        let start = next?;
        if !seen.insert(id.as_str()) {
            return Err(Error::PaginationInconsistency(format!(
                "act {id} appears twice in the book"
            )));
        }
        let page_count = *counts.get(id).ok_or_else(|| {
            Error::PaginationInconsistency(format!("no page count recorded for act {id}"))
        })?;
        if page_count == 0 {
            return Err(Error::PaginationInconsistency(format!(
                "act {id} has a page count of 0"
            )));
        }
        let end_page = end_page(start, page_count)?;
        entries.push(PageOffsetEntry {
            act_id: id.clone(),
            start_page: start,
            page_count,
            end_page,
        });
        next = next_page(end_page);
    }
    Ok(PageOffsetTable { entries })
}

/// Re-paginate every Act in order and thread the offsets from scratch.
pub fn recompute_offsets(
    acts: &[ActSource],
    settings: &BookSettings,
    geometry: &PageGeometry,
) -> Result<PageOffsetTable> {
    let t0 = Instant::now();
    let mut counts = HashMap::new();
    let mut next = Ok(settings.first_act_start());
    for act in acts {
        let start = next?;
        let pages = save_act(&act.content, act.header().as_ref(), start, geometry)?;
        log::debug!(
            "act {}: pages {}..={} ({})",
            act.id,
            pages.start_page,
            pages.end_page,
            pages.page_count
        );
        counts.insert(act.id.clone(), pages.page_count);
        next = next_page(pages.end_page);
    }
    let order: Vec<String> = acts.iter().map(|a| a.id.clone()).collect();
    let table = thread_offsets(&order, &counts, settings)?;
    log::info!(
        "Offsets: {} acts, last page {:?}, {:.1}ms",
        table.entries.len(),
        table.last_page(),
        t0.elapsed().as_secs_f64() * 1000.0
    );
    Ok(table)
}

/// Front matter: cover heading followed by the index of Acts.
fn front_matter_flow(book: &Book, offsets: &PageOffsetTable) -> Vec<FlowNode> {
    let mut html = String::from("<table><tr><th>Act</th><th>Page</th></tr>");
    for (act, entry) in book.acts.iter().zip(&offsets.entries) {
        let title = act.title.as_deref().unwrap_or(&act.id);
        html.push_str(&format!(
            "<tr><td style=\"text-align:left\">{}</td><td style=\"text-align:right\">{}</td></tr>",
            escape_text(title),
            entry.start_page
        ));
    }
    html.push_str("</table>");

    let title = if book.settings.title.is_empty() {
        "Book"
    } else {
        book.settings.title.as_str()
    };
    let mut flow = vec![FlowNode::heading(title), FlowNode::BlankLine];
    flow.extend(layout::build_flow(&html));
    flow
}

/// Render the whole book: front matter, then every Act at its threaded
/// start page.
///
/// Blocks with [`Error::PaginationInconsistency`] when an Act has no stored
/// page count, when an Act no longer renders to its stored count, or when
/// the front matter outgrows `front_matter_pages`.
pub fn render_book(book: &Book, geometry: &PageGeometry) -> Result<RenderedBook> {
    let t0 = Instant::now();
    let order: Vec<String> = book.acts.iter().map(|a| a.id.clone()).collect();
    let counts: HashMap<String, u32> = book
        .acts
        .iter()
        .filter_map(|a| Some((a.id.clone(), a.page_count?)))
        .collect();
    let offsets = thread_offsets(&order, &counts, &book.settings)?;

    let mut pages: Vec<PageNode> = Vec::new();
    let reserved = book.settings.front_matter_pages as usize;
    if reserved > 0 {
        let unnumbered = PageGeometry {
            print_page_numbers: false,
            ..geometry.clone()
        };
        let front = layout::paginate(&front_matter_flow(book, &offsets), 1, &unnumbered);
        if front.len() > reserved {
            return Err(Error::PaginationInconsistency(format!(
                "front matter needs {} pages but {reserved} are reserved",
                front.len()
            )));
        }
        pages.extend(front);
        while pages.len() < reserved {
            pages.push(PageNode {
                number: pages.len() as u32 + 1,
                ops: Vec::new(),
            });
        }
    }

    for (act, entry) in book.acts.iter().zip(&offsets.entries) {
        let flow = act_flow(&act.content, act.header().as_ref());
        let act_pages = layout::paginate(&flow, entry.start_page, geometry);
        if act_pages.len() as u32 != entry.page_count {
            return Err(Error::PaginationInconsistency(format!(
                "act {} renders to {} pages but {} are recorded",
                act.id,
                act_pages.len(),
                entry.page_count
            )));
        }
        pages.extend(act_pages);
    }
    let t_layout = t0.elapsed();

    let pdf = write_pdf(&pages, geometry);
    let page_count = count_page_markers(&pdf);
    let t_total = t0.elapsed();
    log::info!(
        "Book: {} acts, {} pages, layout={:.1}ms, pdf={:.1}ms",
        book.acts.len(),
        page_count,
        t_layout.as_secs_f64() * 1000.0,
        (t_total - t_layout).as_secs_f64() * 1000.0
    );

    Ok(RenderedBook {
        document: RenderedDocument {
            pages,
            page_count,
            pdf,
        },
        offsets,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counts(pairs: &[(&str, u32)]) -> HashMap<String, u32> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    fn ids(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn first_act_follows_the_cover() {
        let table = thread_offsets(&ids(&["a"]), &counts(&[("a", 2)]), &BookSettings::default()).unwrap();
        assert_eq!(table.entries[0].start_page, 2);
        assert_eq!(table.entries[0].end_page, 3);
    }

    #[test]
    fn offset_never_starts_before_page_one() {
        let settings = BookSettings {
            page_numbering_offset: 5,
            ..BookSettings::default()
        };
        let table = thread_offsets(&ids(&["a"]), &counts(&[("a", 1)]), &settings).unwrap();
        assert_eq!(table.entries[0].start_page, 1);
    }

    #[test]
    fn duplicate_act_is_inconsistent() {
        let err = thread_offsets(&ids(&["a", "a"]), &counts(&[("a", 1)]), &BookSettings::default())
            .unwrap_err();
        assert!(matches!(err, Error::PaginationInconsistency(_)));
    }

    #[test]
    fn zero_count_is_inconsistent() {
        let err = thread_offsets(&ids(&["a"]), &counts(&[("a", 0)]), &BookSettings::default())
            .unwrap_err();
        assert!(matches!(err, Error::PaginationInconsistency(_)));
    }

    #[test]
    fn page_numbers_past_u32_are_inconsistent() {
        let err = thread_offsets(
            &ids(&["a", "b"]),
            &counts(&[("a", u32::MAX), ("b", 1)]),
            &BookSettings::default(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::PaginationInconsistency(_)), "{err}");

        // the last representable page is still usable
        let table = thread_offsets(&ids(&["a"]), &counts(&[("a", u32::MAX - 1)]), &BookSettings::default())
            .unwrap();
        assert_eq!(table.last_page(), Some(u32::MAX));
        let err = thread_offsets(
            &ids(&["a", "b"]),
            &counts(&[("a", u32::MAX - 1), ("b", 1)]),
            &BookSettings::default(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::PaginationInconsistency(_)), "{err}");
    }

    #[test]
    fn huge_front_matter_saturates() {
        let settings = BookSettings {
            front_matter_pages: u32::MAX,
            ..BookSettings::default()
        };
        assert_eq!(settings.first_act_start(), u32::MAX);
    }
}
