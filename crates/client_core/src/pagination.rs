use std::fmt;

const MIN_VISIBLE_PAGES: u32 = 3;

/// Number of pages needed for `total_items`; never zero. A zero page size is
/// read as one item per page.
pub fn total_pages(total_items: u64, page_size: u32) -> u32 {
    let size = u64::from(page_size.max(1));
    let pages = total_items.div_ceil(size).max(1);
    u32::try_from(pages).unwrap_or(u32::MAX)
}

pub fn clamp_page(page: i64, total_pages: u32) -> u32 {
    let total = total_pages.max(1);
    if page < 1 {
        1
    } else if page > i64::from(total) {
        total
    } else {
        page as u32
    }
}

/// Page numbers for a windowed pager such as `1 4 5 [6] 7 8 42`: the first and
/// last page are always present and the rest is a run of consecutive pages
/// around `current_page`.
pub fn build_page_numbers(current_page: i64, total_pages: u32, max_visible: u32) -> Vec<u32> {
    let total = total_pages.max(1);
    let max = max_visible.max(MIN_VISIBLE_PAGES);
    let current = i64::from(clamp_page(current_page, total));

    if total <= max {
        return (1..=total).collect();
    }

    let inner_slots = i64::from(max - 2);
    let last_inner = i64::from(total) - 1;
    let mut start = current - inner_slots / 2;
    let mut end = current + (inner_slots + 1) / 2 - 1;

    if start < 2 {
        start = 2;
        end = start + inner_slots - 1;
    }
    if end > last_inner {
        end = last_inner;
        start = end - inner_slots + 1;
    }

    let mut pages = Vec::with_capacity(max as usize);
    pages.push(1);
    pages.extend((start..=end).map(|page| page as u32));
    pages.push(total);
    pages
}

/// Pager caption: current page, page count and, when known, the page size and
/// item total.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageSummary {
    pub current_page: u32,
    pub total_pages: u32,
    pub page_size: u32,
    pub total_items: u64,
}

impl PageSummary {
    pub fn new(current_page: u32, total_items: u64, page_size: u32) -> Self {
        Self {
            current_page,
            total_pages: total_pages(total_items, page_size),
            page_size,
            total_items,
        }
    }

    pub fn has_previous(&self) -> bool {
        self.current_page > 1
    }

    pub fn has_next(&self) -> bool {
        self.current_page < self.total_pages
    }
}

impl fmt::Display for PageSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "page {} of {}", self.current_page, self.total_pages)?;
        if self.total_items > 0 && self.page_size > 0 {
            write!(
                f,
                " · {} per page · {} total",
                self.page_size, self.total_items
            )?;
        }
        Ok(())
    }
}
