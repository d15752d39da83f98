// Pagination over ordered result sets with clamping page lookup

use serde::Serialize;

/// Every feed is cut into pages of this many posts
pub const POSTS_PER_PAGE: i64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Paginator {
    pub count: i64,
    pub per_page: i64,
    pub num_pages: i64,
}

impl Paginator {
    pub fn new(count: i64, per_page: i64) -> Self {
        let per_page = per_page.max(1);
        let count = count.max(0);
        // An empty listing still renders one (empty) page
        let num_pages = ((count + per_page - 1) / per_page).max(1);
        Self {
            count,
            per_page,
            num_pages,
        }
    }

    /// Resolve a raw `page` query value to a valid page number.
    /// Missing or non-numeric values yield the first page; out-of-range
    /// numbers are clamped to the first or last page.
    pub fn clamp_number(&self, raw: Option<&str>) -> i64 {
        match raw.and_then(|r| r.trim().parse::<i64>().ok()) {
            Some(n) if n < 1 => 1,
            Some(n) if n > self.num_pages => self.num_pages,
            Some(n) => n,
            None => 1,
        }
    }

    /// Row offset of the first item on `number`
    pub fn offset(&self, number: i64) -> i64 {
        (number - 1) * self.per_page
    }

    pub fn page<T>(&self, number: i64, object_list: Vec<T>) -> Page<T> {
        Page {
            number,
            num_pages: self.num_pages,
            has_next: number < self.num_pages,
            has_previous: number > 1,
            object_list,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub number: i64,
    pub num_pages: i64,
    pub has_next: bool,
    pub has_previous: bool,
    pub object_list: Vec<T>,
}

impl<T> Page<T> {
    pub fn next_page_number(&self) -> Option<i64> {
        self.has_next.then_some(self.number + 1)
    }

    pub fn previous_page_number(&self) -> Option<i64> {
        self.has_previous.then_some(self.number - 1)
    }

    /// Identity used for caching a rendered page, e.g. `<Page 2 of 5>`
    pub fn label(number: i64, num_pages: i64) -> String {
        format!("<Page {} of {}>", number, num_pages)
    }
}
