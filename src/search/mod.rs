pub mod filters;
pub mod help;
pub mod predicate;
pub mod query;
pub mod relative;
pub mod sql;
pub mod suggest;

pub use self::filters::SearchOptions;
pub use self::help::{search_operator_help, OperatorCategory, OperatorHelp};
pub use self::predicate::PredicateSet;
pub use self::query::{parse_query, ParsedQuery};
pub use self::sql::SqlWhereClause;

use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::cache::SearchCache;
use crate::config::{Config, SearchConfig, SuggestionConfig};
use crate::db::models::Message;
use crate::db::{Database, DbError, ValueCount};
use crate::error::Result;

/// Message source the executor runs compiled predicates against.
pub trait MessageStore {
    /// One page of matching messages, newest first.
    fn fetch_page(
        &self,
        predicates: &PredicateSet,
        limit: usize,
        offset: usize,
    ) -> std::result::Result<Vec<Message>, DbError>;

    /// Number of matching messages, ignoring pagination.
    fn count_matching(&self, predicates: &PredicateSet) -> std::result::Result<u64, DbError>;

    fn top_senders(&self, user_id: &str, limit: usize)
        -> std::result::Result<Vec<ValueCount>, DbError>;

    fn top_subjects(
        &self,
        user_id: &str,
        limit: usize,
    ) -> std::result::Result<Vec<ValueCount>, DbError>;
}

impl MessageStore for Database {
    fn fetch_page(
        &self,
        predicates: &PredicateSet,
        limit: usize,
        offset: usize,
    ) -> std::result::Result<Vec<Message>, DbError> {
        self.find_messages(&predicates.to_sql_where(), limit, offset)
    }

    fn count_matching(&self, predicates: &PredicateSet) -> std::result::Result<u64, DbError> {
        self.count_messages(&predicates.to_sql_where())
    }

    fn top_senders(
        &self,
        user_id: &str,
        limit: usize,
    ) -> std::result::Result<Vec<ValueCount>, DbError> {
        Database::top_senders(self, user_id, limit)
    }

    fn top_subjects(
        &self,
        user_id: &str,
        limit: usize,
    ) -> std::result::Result<Vec<ValueCount>, DbError> {
        Database::top_subjects(self, user_id, limit)
    }
}

impl<T: MessageStore + ?Sized> MessageStore for &T {
    fn fetch_page(
        &self,
        predicates: &PredicateSet,
        limit: usize,
        offset: usize,
    ) -> std::result::Result<Vec<Message>, DbError> {
        (**self).fetch_page(predicates, limit, offset)
    }

    fn count_matching(&self, predicates: &PredicateSet) -> std::result::Result<u64, DbError> {
        (**self).count_matching(predicates)
    }

    fn top_senders(
        &self,
        user_id: &str,
        limit: usize,
    ) -> std::result::Result<Vec<ValueCount>, DbError> {
        (**self).top_senders(user_id, limit)
    }

    fn top_subjects(
        &self,
        user_id: &str,
        limit: usize,
    ) -> std::result::Result<Vec<ValueCount>, DbError> {
        (**self).top_subjects(user_id, limit)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    pub messages: Vec<Message>,
    pub total_count: u64,
    pub search_time_ms: u64,
    pub suggestions: Vec<String>,
    pub parsed_query: Option<ParsedQuery>,
    /// Whether the page was served from the cache.
    pub cached: bool,
}

#[derive(Serialize, Deserialize)]
struct CachedPage {
    messages: Vec<Message>,
    total_count: u64,
}

pub struct SearchService<S, C> {
    store: S,
    cache: C,
    search: SearchConfig,
    suggestions: SuggestionConfig,
}

impl<S: MessageStore, C: SearchCache> SearchService<S, C> {
    pub fn new(store: S, cache: C, config: &Config) -> Self {
        Self {
            store,
            cache,
            search: config.search.clone(),
            suggestions: config.suggestions.clone(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Run one search for `user_id`. Results never include another user's
    /// messages. Only store failures are returned as errors; cache and
    /// suggestion failures are logged and absorbed.
    pub async fn search_emails(&self, user_id: &str, options: &SearchOptions) -> Result<SearchResult> {
        let started = Instant::now();
        let query = options.query_text();
        let parsed = query.map(parse_query);
        let limit = options.effective_limit(self.search.default_limit, self.search.max_limit);
        let offset = options.offset;

        let cache_key = query
            .filter(|_| offset == 0)
            .and_then(|query| self.cache_key(user_id, options, limit, query));

        if let Some(key) = cache_key.as_deref() {
            if let Some(page) = self.read_cache(key).await {
                let result = SearchResult {
                    messages: page.messages,
                    total_count: page.total_count,
                    search_time_ms: elapsed_ms(started),
                    suggestions: Vec::new(),
                    parsed_query: parsed,
                    cached: true,
                };
                tracing::info!(
                    user_id,
                    returned = result.messages.len(),
                    total = result.total_count,
                    elapsed_ms = result.search_time_ms,
                    cached = true,
                    "search served from cache"
                );
                return Ok(result);
            }
        }

        let predicates = PredicateSet::compile(user_id, parsed.as_ref(), options);
        tracing::debug!(user_id, predicates = predicates.len(), limit, offset, "compiled search");

        let messages = self
            .store
            .fetch_page(&predicates, limit, offset)
            .inspect_err(|error| tracing::error!(user_id, error = %error, "search query failed"))?;
        let total_count = self
            .store
            .count_matching(&predicates)
            .inspect_err(|error| tracing::error!(user_id, error = %error, "search count failed"))?;

        if let Some(key) = cache_key.as_deref() {
            self.write_cache(key, &messages, total_count).await;
        }

        let suggestions = match query {
            Some(query) if messages.is_empty() => {
                suggest::suggest(&self.store, user_id, query, &self.suggestions)
            }
            _ => Vec::new(),
        };

        let result = SearchResult {
            messages,
            total_count,
            search_time_ms: elapsed_ms(started),
            suggestions,
            parsed_query: parsed,
            cached: false,
        };
        tracing::info!(
            user_id,
            returned = result.messages.len(),
            total = result.total_count,
            elapsed_ms = result.search_time_ms,
            cached = false,
            "search completed"
        );
        Ok(result)
    }

    /// `<namespace>:` followed by the JSON array of the page's identity.
    /// JSON quoting keeps each field separate, so no user id or query text
    /// can reproduce another user's key.
    fn cache_key(
        &self,
        user_id: &str,
        options: &SearchOptions,
        limit: usize,
        query: &str,
    ) -> Option<String> {
        let identity = (user_id, options.offset, limit, options.filter_fingerprint(), query);
        match serde_json::to_string(&identity) {
            Ok(encoded) => Some(format!("{}:{encoded}", self.search.cache_namespace)),
            Err(error) => {
                tracing::warn!(error = %error, "failed to build cache key, skipping cache");
                None
            }
        }
    }

    async fn read_cache(&self, key: &str) -> Option<CachedPage> {
        let raw = match self.cache.get(key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(error) => {
                tracing::warn!(error = %error, "search cache read failed, treating as miss");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(page) => Some(page),
            Err(error) => {
                tracing::warn!(error = %error, "discarding unreadable cached page");
                None
            }
        }
    }

    async fn write_cache(&self, key: &str, messages: &[Message], total_count: u64) {
        let ttl = self.search.cache_ttl();
        if ttl.is_zero() {
            return;
        }
        let page = CachedPage {
            messages: messages.to_vec(),
            total_count,
        };
        let payload = match serde_json::to_string(&page) {
            Ok(payload) => payload,
            Err(error) => {
                tracing::warn!(error = %error, "failed to encode page for cache");
                return;
            }
        };
        if let Err(error) = self.cache.set(key, payload, ttl).await {
            tracing::warn!(error = %error, "search cache write failed");
        }
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
