use serde::Serialize;

/// One page of a filtered list.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Zero-based index that was requested.
    pub page: usize,
    pub page_size: usize,
    pub total_pages: usize,
    /// Length of the whole filtered list.
    pub total_items: usize,
}

impl<T> Page<T> {
    pub fn has_prev(&self) -> bool {
        self.page > 0
    }

    pub fn has_next(&self) -> bool {
        self.page + 1 < self.total_pages
    }
}

/// Slices `items` into the requested page.
///
/// Lists that fit in one page are returned whole. The page index is not
/// clamped: asking past the end yields an empty page.
pub fn paginate<T: Clone>(items: &[T], page_size: usize, page: usize) -> Page<T> {
    let total_items = items.len();

    if page_size == 0 || total_items <= page_size {
        return Page {
            items: items.to_vec(),
            page,
            page_size,
            total_pages: 1,
            total_items,
        };
    }

    let total_pages = total_items.div_ceil(page_size);
    let start = page.saturating_mul(page_size).min(total_items);
    let end = start.saturating_add(page_size).min(total_items);

    Page {
        items: items[start..end].to_vec(),
        page,
        page_size,
        total_pages,
        total_items,
    }
}
