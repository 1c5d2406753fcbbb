//! Alternative queries offered when a search comes back empty.

use crate::config::SuggestionConfig;
use crate::db::DbError;

use super::MessageStore;

/// Propose alternative queries for `query`. Never fails: store errors are
/// logged and yield an empty list.
///
/// Order: matching senders, then matching subjects, then the generic
/// rewrites for plain-text queries, capped at `max_suggestions`.
pub fn suggest<S: MessageStore + ?Sized>(
    store: &S,
    user_id: &str,
    query: &str,
    config: &SuggestionConfig,
) -> Vec<String> {
    let query = query.trim();
    if query.is_empty() || config.max_suggestions == 0 {
        return Vec::new();
    }

    match collect(store, user_id, query, config) {
        Ok(suggestions) => suggestions,
        Err(error) => {
            tracing::warn!(user_id, query, error = %error, "suggestion lookup failed");
            Vec::new()
        }
    }
}

fn collect<S: MessageStore + ?Sized>(
    store: &S,
    user_id: &str,
    query: &str,
    config: &SuggestionConfig,
) -> Result<Vec<String>, DbError> {
    let senders = store.top_senders(user_id, config.pool_size)?;
    let subjects = store.top_subjects(user_id, config.pool_size)?;
    let needle = query.to_lowercase();

    let mut suggestions = Vec::new();
    let mut push = |candidate: String| {
        if !suggestions.contains(&candidate) {
            suggestions.push(candidate);
        }
    };

    for sender in senders
        .iter()
        .filter(|s| s.value.to_lowercase().contains(&needle))
    {
        push(format!("from:{}", sender.value));
    }
    for subject in subjects
        .iter()
        .filter(|s| s.value.to_lowercase().contains(&needle))
    {
        push(format!("subject:\"{}\"", subject.value));
    }
    if !query.contains(':') {
        push(format!("from:{query}"));
        push(format!("subject:{query}"));
        push(format!("{query} has:attachment"));
    }

    suggestions.truncate(config.max_suggestions);
    Ok(suggestions)
}

#[cfg(test)]
mod tests {
    use super::suggest;
    use crate::config::SuggestionConfig;
    use crate::db::models::Message;
    use crate::db::{DbError, ValueCount};
    use crate::search::predicate::PredicateSet;
    use crate::search::MessageStore;

    struct StubStore {
        senders: Vec<&'static str>,
        subjects: Vec<&'static str>,
        fail: bool,
    }

    fn counts(values: &[&'static str]) -> Vec<ValueCount> {
        values
            .iter()
            .map(|v| ValueCount {
                value: v.to_string(),
                count: 1,
            })
            .collect()
    }

    impl MessageStore for StubStore {
        fn fetch_page(
            &self,
            _predicates: &PredicateSet,
            _limit: usize,
            _offset: usize,
        ) -> Result<Vec<Message>, DbError> {
            Ok(Vec::new())
        }

        fn count_matching(&self, _predicates: &PredicateSet) -> Result<u64, DbError> {
            Ok(0)
        }

        fn top_senders(&self, _user_id: &str, limit: usize) -> Result<Vec<ValueCount>, DbError> {
            if self.fail {
                return Err(DbError::Config("store offline".to_string()));
            }
            Ok(counts(&self.senders).into_iter().take(limit).collect())
        }

        fn top_subjects(&self, _user_id: &str, limit: usize) -> Result<Vec<ValueCount>, DbError> {
            Ok(counts(&self.subjects).into_iter().take(limit).collect())
        }
    }

    fn store() -> StubStore {
        StubStore {
            senders: vec!["alice@example.com", "bob@example.com", "alicia@corp.com"],
            subjects: vec!["Alice's birthday", "Budget"],
            fail: false,
        }
    }

    #[test]
    fn matching_sender_always_suggested_and_capped() {
        let suggestions = suggest(&store(), "user-1", "ali", &SuggestionConfig::default());
        assert_eq!(
            suggestions,
            vec![
                "from:alice@example.com",
                "from:alicia@corp.com",
                "subject:\"Alice's birthday\"",
                "from:ali",
                "subject:ali",
            ]
        );
    }

    #[test]
    fn operator_queries_get_no_generic_rewrites() {
        let suggestions = suggest(&store(), "user-1", "from:bob", &SuggestionConfig::default());
        assert!(suggestions.is_empty());

        let suggestions = suggest(&store(), "user-1", "BOB", &SuggestionConfig::default());
        assert_eq!(
            suggestions,
            vec![
                "from:bob@example.com",
                "from:BOB",
                "subject:BOB",
                "BOB has:attachment"
            ]
        );
    }

    #[test]
    fn store_errors_yield_empty_list() {
        let failing = StubStore {
            fail: true,
            ..store()
        };
        assert!(suggest(&failing, "user-1", "ali", &SuggestionConfig::default()).is_empty());
    }

    #[test]
    fn custom_cap_is_respected() {
        let config = SuggestionConfig {
            pool_size: 10,
            max_suggestions: 2,
        };
        let suggestions = suggest(&store(), "user-1", "zzz", &config);
        assert_eq!(suggestions, vec!["from:zzz", "subject:zzz"]);
    }

    #[test]
    fn blank_query_has_no_suggestions() {
        assert!(suggest(&store(), "user-1", "  ", &SuggestionConfig::default()).is_empty());
    }
}
