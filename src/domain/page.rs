/// 1-based page window over an ordered result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub page_size: u32,
}

impl PageRequest {
    pub fn new(page: u32, page_size: u32) -> Self {
        Self { page, page_size }
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page.saturating_sub(1)) * i64::from(self.page_size)
    }

    pub fn limit(&self) -> i64 {
        i64::from(self.page_size)
    }

    /// Page 1 always exists, even over an empty set.
    pub fn is_within(&self, total: i64) -> bool {
        self.page >= 1 && (self.page == 1 || self.offset() < total)
    }

    pub fn has_next(&self, total: i64) -> bool {
        self.offset() + self.limit() < total
    }
}

#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
}

impl<T> Page<T> {
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_page_of_empty_set_is_valid() {
        let page = PageRequest::new(1, 10);
        assert!(page.is_within(0));
        assert!(!page.has_next(0));
    }

    #[test]
    fn pages_past_the_end_are_rejected() {
        assert!(PageRequest::new(2, 10).is_within(11));
        assert!(!PageRequest::new(2, 10).is_within(10));
        assert!(!PageRequest::new(0, 10).is_within(5));
    }

    #[test]
    fn offsets_are_zero_based() {
        let page = PageRequest::new(3, 10);
        assert_eq!(page.offset(), 20);
        assert!(page.has_next(31));
        assert!(!page.has_next(30));
    }
}
