use serde::Serialize;

/// Pagination query parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaginationParams {
    pub page: u32,
    pub limit: u32,
}

impl PaginationParams {
    pub fn new(page: Option<u32>, limit: Option<u32>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            limit: limit.unwrap_or(50).clamp(1, 100),
        }
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.limit)
    }
}

impl Default for PaginationParams {
    fn default() -> Self {
        Self::new(None, None)
    }
}

/// Paginated response wrapper
#[derive(Debug, Clone, Serialize)]
pub struct PaginatedResult<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub limit: u32,
    pub total_pages: u32,
}

impl<T> PaginatedResult<T> {
    pub fn new(items: Vec<T>, total: u64, page: u32, limit: u32) -> Self {
        let total_pages = total.div_ceil(u64::from(limit.max(1))) as u32;
        Self {
            items,
            total,
            page,
            limit,
            total_pages,
        }
    }

    /// Slice an already-filtered, already-sorted list into one page.
    pub fn from_vec(all: Vec<T>, params: PaginationParams) -> Self {
        let total = all.len() as u64;
        let items = all
            .into_iter()
            .skip(params.offset() as usize)
            .take(params.limit as usize)
            .collect();
        Self::new(items, total, params.page, params.limit)
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> PaginatedResult<U> {
        PaginatedResult {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            limit: self.limit,
            total_pages: self.total_pages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn params_are_clamped() {
        let p = PaginationParams::new(Some(0), Some(1000));
        assert_eq!(p.page, 1);
        assert_eq!(p.limit, 100);
    }

    #[test]
    fn from_vec_slices_requested_page() {
        let page = PaginatedResult::from_vec((1..=7).collect::<Vec<_>>(), PaginationParams::new(Some(2), Some(3)));
        assert_eq!(page.items, vec![4, 5, 6]);
        assert_eq!(page.total, 7);
        assert_eq!(page.total_pages, 3);
    }
}
