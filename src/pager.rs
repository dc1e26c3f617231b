//! Walks a paged endpoint until the server runs out of items.

use crate::api::FetchError;

/// Where the next page starts.
///
/// Only the client knows how to turn it into a request, callers just hand it
/// back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageCursor {
    offset: usize,
}

impl PageCursor {
    pub(crate) fn at(offset: usize) -> PageCursor {
        PageCursor { offset }
    }

    pub(crate) fn offset(&self) -> usize {
        self.offset
    }
}

/// A single page of items, `next` is `None` after the last page.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next: Option<PageCursor>,
}

/// Something that can be asked for one page at a time.
#[allow(async_fn_in_trait)]
pub trait PageSource<T> {
    /// `cursor` is `None` for the first page.
    async fn fetch_page(&self, cursor: Option<PageCursor>) -> Result<Page<T>, FetchError>;
}

/// Fetch every page and concatenate the items in arrival order.
///
/// Stops when the source returns no cursor or an empty page. The first error
/// is returned as is and the items fetched so far are dropped.
pub async fn fetch_all<T, S>(source: &S) -> Result<Vec<T>, FetchError>
where
    S: PageSource<T>,
{
    let mut items = Vec::new();
    let mut cursor = None;
    let mut pages = 0usize;

    loop {
        let page = source.fetch_page(cursor).await?;
        pages += 1;

        if page.items.is_empty() {
            if page.next.is_some() {
                log::warn!("empty page {} still had a cursor, stopping", pages);
            }
            break;
        }

        log::debug!("page {}: {} items", pages, page.items.len());
        items.extend(page.items);

        match page.next {
            Some(next) => cursor = Some(next),
            None => break,
        }
    }

    Ok(items)
}
