//! Highlight request types and validation

use serde::{Deserialize, Serialize};

/// Unique identifier for highlight requests
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RequestId(pub u64);

impl RequestId {
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }
}

/// Ask to locate and highlight an answer fragment on a page.
///
/// Wire shape of the assistant's citation message; `page` is 1-based.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HighlightRequest {
    pub page: i64,
    #[serde(default)]
    pub search_term: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exact_match: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paragraph_context: Option<String>,
}

impl HighlightRequest {
    pub fn new(page: i64, search_term: impl Into<String>) -> Self {
        Self {
            page,
            search_term: search_term.into(),
            exact_match: None,
            paragraph_context: None,
        }
    }

    #[must_use]
    pub fn with_exact_match(mut self, exact: impl Into<String>) -> Self {
        self.exact_match = Some(exact.into());
        self
    }

    #[must_use]
    pub fn with_paragraph_context(mut self, context: impl Into<String>) -> Self {
        self.paragraph_context = Some(context.into());
        self
    }

    /// Term shown to the user: the search term, or the exact quote when the
    /// search term is blank.
    #[must_use]
    pub fn display_term(&self) -> &str {
        let term = self.search_term.trim();
        if term.is_empty() {
            self.exact_match.as_deref().map(str::trim).unwrap_or_default()
        } else {
            term
        }
    }

    /// Check the request against the document's page range.
    ///
    /// On success returns the 0-indexed target page.
    pub fn validate(&self, page_count: usize) -> Result<usize, RequestFault> {
        let has_exact = self
            .exact_match
            .as_deref()
            .is_some_and(|m| !m.trim().is_empty());
        if self.search_term.trim().is_empty() && !has_exact {
            return Err(RequestFault::EmptySearchTerm);
        }

        if self.page < 1 {
            return Err(RequestFault::PageNotPositive { page: self.page });
        }

        let page = usize::try_from(self.page).map_err(|_| RequestFault::PageOutOfRange {
            page: self.page,
            total: page_count,
        })?;
        if page > page_count {
            return Err(RequestFault::PageOutOfRange {
                page: self.page,
                total: page_count,
            });
        }

        Ok(page - 1)
    }
}

/// Reasons a request is dropped before reaching the matcher
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RequestFault {
    #[error("request carries no search term")]
    EmptySearchTerm,

    #[error("page {page} is not a valid page number")]
    PageNotPositive { page: i64 },

    #[error("page {page} is outside the document (1..={total})")]
    PageOutOfRange { page: i64, total: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_in_range_request() {
        let request = HighlightRequest::new(5, "quantitative analysis");
        assert_eq!(request.validate(10), Ok(4));
    }

    #[test]
    fn rejects_blank_terms() {
        let request = HighlightRequest::new(1, "   ");
        assert_eq!(request.validate(10), Err(RequestFault::EmptySearchTerm));

        let request = HighlightRequest::new(1, "").with_exact_match("\t");
        assert_eq!(request.validate(10), Err(RequestFault::EmptySearchTerm));
    }

    #[test]
    fn exact_match_alone_is_enough() {
        let request = HighlightRequest::new(2, "").with_exact_match("the data");
        assert_eq!(request.validate(10), Ok(1));
        assert_eq!(request.display_term(), "the data");
    }

    #[test]
    fn rejects_pages_outside_document() {
        let request = HighlightRequest::new(12, "methodology");
        assert_eq!(
            request.validate(10),
            Err(RequestFault::PageOutOfRange { page: 12, total: 10 })
        );

        let request = HighlightRequest::new(0, "methodology");
        assert_eq!(
            request.validate(10),
            Err(RequestFault::PageNotPositive { page: 0 })
        );
    }

    #[test]
    fn deserializes_assistant_message() {
        let json = r#"{
            "page": 5,
            "searchTerm": "quantitative analysis",
            "exactMatch": "We employed quantitative analysis methods",
            "paragraphContext": "In this study we employed quantitative analysis"
        }"#;

        let request: HighlightRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.page, 5);
        assert_eq!(request.search_term, "quantitative analysis");
        assert_eq!(
            request.exact_match.as_deref(),
            Some("We employed quantitative analysis methods")
        );
        assert!(request.paragraph_context.is_some());
    }

    #[test]
    fn missing_search_term_deserializes_as_blank() {
        let request: HighlightRequest = serde_json::from_str(r#"{"page": 3}"#).unwrap();
        assert_eq!(request.validate(10), Err(RequestFault::EmptySearchTerm));
    }
}
