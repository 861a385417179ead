//! Page index and page size for the ticket listing.

use std::{fmt, str::FromStr};

use thiserror::Error;

pub const DEFAULT_PAGE_SIZE: PageSize = PageSize::Fixed(20);

/// Sizes offered by the page-size selector.
pub const PAGE_SIZE_OPTIONS: [PageSize; 6] = [
    PageSize::Fixed(5),
    PageSize::Fixed(10),
    PageSize::Fixed(20),
    PageSize::Fixed(25),
    PageSize::Fixed(50),
    PageSize::All,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PageSize {
    Fixed(u32),
    All,
}

impl PageSize {
    /// Maps a raw selector value. Zero and negative sentinels mean "all rows".
    pub fn from_raw(raw: i64) -> Self {
        if raw <= 0 {
            return Self::All;
        }
        Self::Fixed(u32::try_from(raw).unwrap_or(u32::MAX))
    }

    /// Value sent to the directory; zero requests an unbounded page.
    pub fn wire_value(self) -> u32 {
        match self {
            Self::Fixed(size) => size,
            Self::All => 0,
        }
    }

    /// Folds `Fixed(0)` into `All` so both spellings compare equal.
    pub fn normalized(self) -> Self {
        match self.limit() {
            Some(_) => self,
            None => Self::All,
        }
    }

    pub fn limit(self) -> Option<u32> {
        match self {
            Self::Fixed(0) | Self::All => None,
            Self::Fixed(size) => Some(size),
        }
    }
}

impl Default for PageSize {
    fn default() -> Self {
        DEFAULT_PAGE_SIZE
    }
}

impl fmt::Display for PageSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.limit() {
            Some(size) => write!(f, "{size}"),
            None => f.write_str("All"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid page size '{0}'")]
pub struct InvalidPageSize(pub String);

impl FromStr for PageSize {
    type Err = InvalidPageSize;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        if trimmed.eq_ignore_ascii_case("all") {
            return Ok(Self::All);
        }
        trimmed
            .parse::<i64>()
            .map(Self::from_raw)
            .map_err(|_| InvalidPageSize(value.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaginationState {
    page: u32,
    page_size: PageSize,
    default_page_size: PageSize,
}

impl PaginationState {
    pub fn new(default_page_size: PageSize) -> Self {
        let default_page_size = default_page_size.normalized();
        Self {
            page: 0,
            page_size: default_page_size,
            default_page_size,
        }
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn page_size(&self) -> PageSize {
        self.page_size
    }

    pub fn default_page_size(&self) -> PageSize {
        self.default_page_size
    }

    /// Moves to `page` at `page_size`. A different page size always lands on
    /// the first page.
    pub fn on_change(&mut self, page: u32, page_size: PageSize) {
        let page_size = page_size.normalized();
        if page_size != self.page_size {
            self.page = 0;
            self.page_size = page_size;
        } else {
            self.page = page;
        }
    }

    pub fn reset(&mut self) {
        self.page = 0;
        self.page_size = self.default_page_size;
    }

    /// Number of pages needed for `total` rows; never less than one.
    pub fn page_count(&self, total: u64) -> u64 {
        match self.page_size.limit() {
            Some(size) => total.div_ceil(u64::from(size)).max(1),
            None => 1,
        }
    }
}

impl Default for PaginationState {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

#[cfg(test)]
#[path = "tests/pagination_tests.rs"]
mod tests;
