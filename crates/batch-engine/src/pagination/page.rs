//! Page and page request types

use serde::{Deserialize, Serialize};

/// One bounded response from a paginated listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    /// Items in remote-defined order
    pub items: Vec<T>,

    /// Continuation token; `None` or empty means this is the last page
    #[serde(default)]
    pub next_token: Option<String>,
}

impl<T> Page<T> {
    /// A page followed by more pages
    pub fn new(items: Vec<T>, next_token: impl Into<String>) -> Self {
        Self {
            items,
            next_token: Some(next_token.into()),
        }
    }

    /// The final page
    pub fn last(items: Vec<T>) -> Self {
        Self {
            items,
            next_token: None,
        }
    }

    /// The token to request next, if the listing continues
    pub fn continuation(&self) -> Option<&str> {
        self.next_token.as_deref().filter(|t| !t.is_empty())
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Arguments for fetching a single page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageRequest {
    /// Token returned by the previous page; `None` for the first page
    pub token: Option<String>,

    /// Page size hint passed to the remote API
    pub page_size: Option<u32>,
}

impl PageRequest {
    /// Request for the first page
    pub fn first(page_size: Option<u32>) -> Self {
        Self {
            token: None,
            page_size,
        }
    }

    /// Request for the page following `token`
    pub fn after(token: impl Into<String>, page_size: Option<u32>) -> Self {
        Self {
            token: Some(token.into()),
            page_size,
        }
    }

    pub fn is_first(&self) -> bool {
        self.token.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_continuation() {
        assert_eq!(Page::new(vec![1], "t1").continuation(), Some("t1"));
        assert_eq!(Page::new(vec![1], "").continuation(), None);
        assert_eq!(Page::last(vec![1]).continuation(), None);
    }

    #[test]
    fn test_page_request() {
        let first = PageRequest::first(Some(200));
        assert!(first.is_first());
        assert_eq!(first.page_size, Some(200));

        let next = PageRequest::after("abc", None);
        assert!(!next.is_first());
        assert_eq!(next.token.as_deref(), Some("abc"));
    }

    #[test]
    fn test_deserialize_without_token() {
        let page: Page<String> = serde_json::from_str(r#"{"items":["a","b"]}"#).unwrap();
        assert_eq!(page.items, vec!["a", "b"]);
        assert!(page.continuation().is_none());
    }
}
