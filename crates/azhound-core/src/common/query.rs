/// Server-side shaping of a list request.
///
/// Every field is optional; an empty query lists the whole collection with the
/// server's default page size. The paging hint (`top`) only applies to the first
/// request, continuation links already carry it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ListQuery {
    pub filter: Option<String>,
    pub search: Option<String>,
    pub order_by: Option<String>,
    pub select: Vec<String>,
    pub expand: Option<String>,
    pub top: Option<u32>,
}

impl ListQuery {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    #[must_use]
    pub fn search(mut self, search: impl Into<String>) -> Self {
        self.search = Some(search.into());
        self
    }

    #[must_use]
    pub fn order_by(mut self, order_by: impl Into<String>) -> Self {
        self.order_by = Some(order_by.into());
        self
    }

    #[must_use]
    pub fn select<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.select = columns.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn expand(mut self, expand: impl Into<String>) -> Self {
        self.expand = Some(expand.into());
        self
    }

    #[must_use]
    pub const fn top(mut self, top: u32) -> Self {
        self.top = Some(top);
        self
    }

    /// Returns the query parameters in the order they are sent.
    ///
    /// Empty values are skipped so callers can forward the pairs verbatim.
    pub fn params(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::with_capacity(6);
        if let Some(filter) = self.filter.as_deref().filter(|f| !f.is_empty()) {
            params.push(("$filter", filter.to_string()));
        }
        if let Some(search) = self.search.as_deref().filter(|s| !s.is_empty()) {
            params.push(("$search", search.to_string()));
        }
        if let Some(order_by) = self.order_by.as_deref().filter(|o| !o.is_empty()) {
            params.push(("$orderby", order_by.to_string()));
        }
        if !self.select.is_empty() {
            params.push(("$select", self.select.join(",")));
        }
        if let Some(expand) = self.expand.as_deref().filter(|e| !e.is_empty()) {
            params.push(("$expand", expand.to_string()));
        }
        if let Some(top) = self.top {
            params.push(("$top", top.to_string()));
        }
        params
    }
}
