//! Paginated listing of enclave and key names.

use crate::error::WireError;
use crate::wire::{messages, WireMapping};

/// Number of names a page holds when the request sets no limit.
pub const DEFAULT_LIST_LIMIT: usize = 100;

/// Lists names starting with a prefix.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListRequest {
    /// Name prefix; empty matches everything.
    pub prefix: String,
    /// Resume strictly after this name; empty starts at the beginning.
    pub continue_at: String,
    /// Page size; `0` or less selects the server default.
    pub limit: i32,
}

impl ListRequest {
    /// Lists names with a prefix, starting at the beginning.
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            ..Default::default()
        }
    }

    /// Returns the request for the page after `response`, or `None` if
    /// `response` was the last page.
    pub fn next_page(&self, response: &ListResponse) -> Option<Self> {
        if response.continue_at.is_empty() {
            return None;
        }
        Some(Self {
            prefix: self.prefix.clone(),
            continue_at: response.continue_at.clone(),
            limit: self.limit,
        })
    }

    /// Selects one page from `names`, which must be sorted ascending.
    ///
    /// A cursor that does not start with the prefix selects nothing.
    pub fn page<'a, I>(&self, names: I, default_limit: usize) -> ListResponse
    where
        I: IntoIterator<Item = &'a str>,
    {
        if !self.continue_at.is_empty() && !self.continue_at.starts_with(&self.prefix) {
            return ListResponse::default();
        }

        let limit = usize::try_from(self.limit)
            .ok()
            .filter(|n| *n > 0)
            .unwrap_or(default_limit);

        let mut matching = names
            .into_iter()
            .filter(|name| name.starts_with(&self.prefix))
            .filter(|name| self.continue_at.is_empty() || *name > self.continue_at.as_str());

        let items: Vec<String> = matching.by_ref().take(limit).map(str::to_string).collect();
        let continue_at = match (matching.next(), items.last()) {
            (Some(_), Some(last)) => last.clone(),
            _ => String::new(),
        };

        ListResponse { items, continue_at }
    }
}

impl WireMapping for ListRequest {
    type Wire = messages::ListRequest;

    fn to_wire(&self) -> Result<Self::Wire, WireError> {
        Ok(messages::ListRequest {
            prefix: self.prefix.clone(),
            continue_at: self.continue_at.clone(),
            limit: self.limit,
        })
    }

    fn from_wire(wire: Self::Wire) -> Result<Self, WireError> {
        Ok(Self {
            prefix: wire.prefix,
            continue_at: wire.continue_at,
            limit: wire.limit,
        })
    }
}

/// One page of names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListResponse {
    /// Names in ascending order.
    pub items: Vec<String>,
    /// Last returned name if more remain, empty otherwise.
    pub continue_at: String,
}

impl WireMapping for ListResponse {
    type Wire = messages::ListResponse;

    fn to_wire(&self) -> Result<Self::Wire, WireError> {
        Ok(messages::ListResponse {
            items: self.items.clone(),
            continue_at: self.continue_at.clone(),
        })
    }

    fn from_wire(wire: Self::Wire) -> Result<Self, WireError> {
        Ok(Self {
            items: wire.items,
            continue_at: wire.continue_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NAMES: &[&str] = &["bar", "foo-1", "foo-2", "foo-3", "zed"];

    fn page(req: &ListRequest) -> ListResponse {
        req.page(NAMES.iter().copied(), DEFAULT_LIST_LIMIT)
    }

    #[test]
    fn test_page_with_limit() {
        let req = ListRequest {
            prefix: "foo".to_string(),
            limit: 1,
            ..Default::default()
        };
        let resp = page(&req);

        assert_eq!(resp.items, vec!["foo-1"]);
        assert_eq!(resp.continue_at, "foo-1");
    }

    #[test]
    fn test_continue_does_not_repeat() {
        let req = ListRequest {
            prefix: "foo".to_string(),
            continue_at: "foo-1".to_string(),
            limit: 0,
        };
        let resp = page(&req);

        assert_eq!(resp.items, vec!["foo-2", "foo-3"]);
        assert!(resp.continue_at.is_empty());
    }

    #[test]
    fn test_cursor_outside_prefix_is_empty() {
        let req = ListRequest {
            prefix: "foo".to_string(),
            continue_at: "bar".to_string(),
            limit: 10,
        };
        assert_eq!(page(&req), ListResponse::default());
    }

    #[test]
    fn test_negative_limit_uses_default() {
        let req = ListRequest {
            limit: -5,
            ..Default::default()
        };
        let resp = req.page(NAMES.iter().copied(), 2);

        assert_eq!(resp.items, vec!["bar", "foo-1"]);
        assert_eq!(resp.continue_at, "foo-1");
    }

    #[test]
    fn test_exact_fit_has_no_cursor() {
        let req = ListRequest {
            prefix: "foo".to_string(),
            limit: 3,
            ..Default::default()
        };
        let resp = page(&req);

        assert_eq!(resp.items.len(), 3);
        assert!(resp.continue_at.is_empty());
    }

    #[test]
    fn test_next_page_walks_all() {
        let mut req = ListRequest {
            limit: 2,
            ..Default::default()
        };
        let mut seen = Vec::new();
        loop {
            let resp = page(&req);
            seen.extend(resp.items.clone());
            match req.next_page(&resp) {
                Some(next) => req = next,
                None => break,
            }
        }
        assert_eq!(seen, NAMES);
    }
}
