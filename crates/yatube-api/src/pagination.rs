//! Page-number pagination over ordered feeds.
//!
//! The page token comes straight from the query string, so anything goes:
//! missing or non-numeric tokens select the first page, numbers below one
//! select the first page, numbers past the end select the last page.

use serde::Deserialize;

use yatube_types::api::PageResponse;

/// Items per feed page.
pub const PAGE_SIZE: usize = 10;

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
}

/// Page number asked for by the client, before clamping to the page range.
pub fn requested_page(raw: Option<&str>) -> usize {
    raw.and_then(|s| s.trim().parse::<i64>().ok())
        .map(|n| n.max(1) as usize)
        .unwrap_or(1)
}

/// One page of an ordered sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// 1-based, always within `1..=num_pages`.
    pub number: usize,
    pub num_pages: usize,
    /// Items in the whole sequence.
    pub count: usize,
}

impl<T> Page<T> {
    pub fn has_next(&self) -> bool {
        self.number < self.num_pages
    }

    pub fn has_previous(&self) -> bool {
        self.number > 1
    }

    pub fn into_response<U>(self, f: impl FnMut(T) -> U) -> PageResponse<U> {
        let has_next = self.has_next();
        let has_previous = self.has_previous();
        PageResponse {
            items: self.items.into_iter().map(f).collect(),
            number: self.number,
            num_pages: self.num_pages,
            count: self.count,
            has_next,
            has_previous,
        }
    }
}

/// Number of pages for `count` items. An empty sequence still has one page.
pub fn num_pages(count: usize, page_size: usize) -> usize {
    count.div_ceil(page_size).max(1)
}

/// Slices a sequence of `count` items into the page selected by `raw_page`.
///
/// `fetch(limit, offset)` loads the window; it is called exactly once.
pub fn paginate<T, E, F>(
    count: usize,
    raw_page: Option<&str>,
    page_size: usize,
    fetch: F,
) -> Result<Page<T>, E>
where
    F: FnOnce(usize, usize) -> Result<Vec<T>, E>,
{
    let num_pages = num_pages(count, page_size);
    let number = requested_page(raw_page).min(num_pages);
    let items = fetch(page_size, (number - 1) * page_size)?;
    Ok(Page {
        items,
        number,
        num_pages,
        count,
    })
}
