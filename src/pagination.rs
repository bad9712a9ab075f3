//! Client-side pagination for the listing screen.

/// Sheets shown per page.
pub const PAGE_SIZE: usize = 5;

/// Number of pages needed for `len` items. Zero items means zero pages.
pub fn total_pages(len: usize) -> usize {
    len.div_ceil(PAGE_SIZE)
}

/// Current page of a paginated list. Pages are one-based and the page never
/// leaves `1..=max(total_pages, 1)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaginationState {
    current_page: usize,
}

impl Default for PaginationState {
    fn default() -> Self {
        Self { current_page: 1 }
    }
}

impl PaginationState {
    pub fn current_page(&self) -> usize {
        self.current_page
    }

    /// Items belonging to the current page.
    pub fn visible_slice<'a, T>(&self, items: &'a [T]) -> &'a [T] {
        visible_slice(items, self.current_page)
    }

    /// Jump to `target` if it names an existing page. Out-of-range targets
    /// leave the state untouched. Returns whether the page changed.
    pub fn change_page(&mut self, target: usize, len: usize) -> bool {
        if target < 1 || target > total_pages(len) || target == self.current_page {
            return false;
        }
        self.current_page = target;
        true
    }

    pub fn next_page(&mut self, len: usize) -> bool {
        self.change_page(self.current_page + 1, len)
    }

    pub fn previous_page(&mut self, len: usize) -> bool {
        match self.current_page.checked_sub(1) {
            Some(target) => self.change_page(target, len),
            None => false,
        }
    }

    /// Pull the page back into range after the collection changed size.
    pub fn clamp(&mut self, len: usize) {
        let last = total_pages(len).max(1);
        self.current_page = self.current_page.clamp(1, last);
    }
}

/// `items[(page-1)*PAGE_SIZE .. min(page*PAGE_SIZE, len))`. Pages past the end
/// (and page zero) yield an empty slice.
pub fn visible_slice<T>(items: &[T], page: usize) -> &[T] {
    if page == 0 {
        return &[];
    }
    let start = (page - 1).saturating_mul(PAGE_SIZE);
    if start >= items.len() {
        return &[];
    }
    let end = start.saturating_add(PAGE_SIZE).min(items.len());
    &items[start..end]
}
