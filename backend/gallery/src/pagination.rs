//! Fixed-size pages over an ordered list.
//!
//! Navigation never wraps. A disabled button is a `None` target.
use serde::Deserialize;

#[derive(Debug, PartialEq, Eq)]
pub struct Page<'a, T> {
    pub items: &'a [T],
    pub page_index: usize,
    pub total_pages: usize,
    /// Offset of the first visible item.
    pub start: usize,
}

pub fn total_pages(len: usize, page_size: usize) -> usize {
    len.div_ceil(page_size.max(1))
}

pub fn paginate<T>(items: &[T], page_size: usize, page_index: usize) -> Page<'_, T> {
    let page_size = page_size.max(1);
    let start = page_index.saturating_mul(page_size).min(items.len());
    let end = start.saturating_add(page_size).min(items.len());

    Page {
        items: &items[start..end],
        page_index,
        total_pages: total_pages(items.len(), page_size),
        start,
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageNav {
    First,
    Previous,
    Next,
    Last,
}

impl PageNav {
    pub fn target(self, current: usize, total_pages: usize) -> Option<usize> {
        if total_pages == 0 {
            return None;
        }

        match self {
            PageNav::First => Some(0),
            PageNav::Previous => current.checked_sub(1),
            PageNav::Next => Some(current + 1).filter(|next| *next < total_pages),
            PageNav::Last => Some(total_pages - 1),
        }
    }
}
