//! Page/limit normalization for snippet listings.

/// Configured bounds applied to caller-supplied limits.
#[derive(Debug, Clone, Copy)]
pub struct PageLimits {
    pub default_limit: u32,
    pub max_limit: u32,
}

impl Default for PageLimits {
    fn default() -> Self {
        Self {
            default_limit: 20,
            max_limit: 100,
        }
    }
}

/// A normalized listing request: page and limit are always >= 1, the limit is
/// capped, and a blank tag filter collapses to no filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
    pub page: u32,
    pub limit: u32,
    pub tag: Option<String>,
}

impl ListQuery {
    pub fn normalized(page: i64, limit: i64, tag: Option<String>, limits: &PageLimits) -> Self {
        let page = if page < 1 { 1 } else { page.min(i64::from(u32::MAX)) as u32 };
        let limit = if limit < 1 {
            limits.default_limit
        } else {
            (limit.min(i64::from(limits.max_limit)) as u32).min(limits.max_limit)
        };
        let tag = tag.and_then(|tag| {
            let trimmed = tag.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        });
        Self { page, limit, tag }
    }

    /// Row offset for the durable store.
    pub fn offset(&self) -> i64 {
        i64::from(self.page - 1) * i64::from(self.limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_below_one_becomes_first_page() {
        let query = ListQuery::normalized(-3, 10, None, &PageLimits::default());
        assert_eq!(query.page, 1);
        assert_eq!(query.offset(), 0);
    }

    #[test]
    fn limit_below_one_falls_back_to_default() {
        let limits = PageLimits {
            default_limit: 25,
            max_limit: 50,
        };
        let query = ListQuery::normalized(1, 0, None, &limits);
        assert_eq!(query.limit, 25);
    }

    #[test]
    fn limit_above_max_is_capped() {
        let limits = PageLimits {
            default_limit: 20,
            max_limit: 100,
        };
        let query = ListQuery::normalized(1, 5_000, None, &limits);
        assert_eq!(query.limit, 100);
    }

    #[test]
    fn blank_tag_collapses_to_no_filter() {
        let query = ListQuery::normalized(1, 10, Some("   ".to_string()), &PageLimits::default());
        assert_eq!(query.tag, None);

        let query = ListQuery::normalized(1, 10, Some(" go ".to_string()), &PageLimits::default());
        assert_eq!(query.tag.as_deref(), Some("go"));
    }

    #[test]
    fn offset_advances_with_page() {
        let query = ListQuery::normalized(3, 10, None, &PageLimits::default());
        assert_eq!(query.offset(), 20);
    }
}
