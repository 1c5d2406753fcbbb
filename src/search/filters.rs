use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub const DEFAULT_LIMIT: usize = 20;
pub const MAX_LIMIT: usize = 100;

/// Caller-supplied search request: an optional DSL query plus structured
/// filters. Both are compiled and ANDed together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SearchOptions {
    pub query: Option<String>,
    pub from_email: Option<String>,
    pub subject: Option<String>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub has_attachments: Option<bool>,
    pub is_read: Option<bool>,
    pub is_starred: Option<bool>,
    pub account_ids: Option<Vec<String>>,
    pub labels: Option<Vec<String>>,
    pub limit: usize,
    pub offset: usize,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            query: None,
            from_email: None,
            subject: None,
            date_from: None,
            date_to: None,
            has_attachments: None,
            is_read: None,
            is_starred: None,
            account_ids: None,
            labels: None,
            limit: DEFAULT_LIMIT,
            offset: 0,
        }
    }
}

impl SearchOptions {
    pub fn with_query(query: impl Into<String>) -> Self {
        Self {
            query: Some(query.into()),
            ..Self::default()
        }
    }

    /// The query string, if it has any non-whitespace content.
    pub fn query_text(&self) -> Option<&str> {
        self.query
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }

    /// Page size clamped to `1..=max_limit`; zero selects `default_limit`.
    pub fn effective_limit(&self, default_limit: usize, max_limit: usize) -> usize {
        let max_limit = max_limit.max(1);
        if self.limit == 0 {
            default_limit.clamp(1, max_limit)
        } else {
            self.limit.min(max_limit)
        }
    }

    /// Stable fingerprint of the structured filters, used in cache keys so
    /// two requests with the same query but different filters never share
    /// a cached page.
    pub fn filter_fingerprint(&self) -> String {
        let filters = Self {
            query: None,
            limit: 0,
            offset: 0,
            ..self.clone()
        };
        serde_json::to_string(&filters).unwrap_or_default()
    }
}
