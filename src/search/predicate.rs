//! Compiles a [`ParsedQuery`] plus structured [`SearchOptions`] into a
//! conjunctive set of message predicates.
//!
//! Predicates are plain data: they can be evaluated in memory with
//! [`PredicateSet::matches`] or lowered to SQL by `search::sql`.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::Serialize;

use crate::db::models::Message;

use super::filters::SearchOptions;
use super::query::ParsedQuery;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressField {
    From,
    To,
    Cc,
    Bcc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageFlag {
    Read,
    Starred,
    Important,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SizeComparison {
    Larger,
    Smaller,
}

/// One boolean condition over a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Predicate {
    /// Message belongs to this user. Always present, never derived from the query.
    OwnerScope { user_id: String },
    AccountIn { account_ids: Vec<String> },
    /// Address field contains any needle; when negated, contains none of them.
    AddressContainsAny {
        field: AddressField,
        needles: Vec<String>,
        negated: bool,
    },
    SubjectContainsAny { needles: Vec<String>, negated: bool },
    FlagEquals { flag: MessageFlag, expected: bool },
    /// `expected = true`: at least one attachment; `false`: none.
    AttachmentExists { expected: bool },
    AttachmentNameContainsAny { needles: Vec<String> },
    AttachmentSizeCompare { comparison: SizeComparison, bytes: u64 },
    /// Inclusive bounds on the send timestamp.
    DateRange {
        after: Option<DateTime<Utc>>,
        before: Option<DateTime<Utc>>,
    },
    FolderIn { folders: Vec<String> },
    LabelAny { labels: Vec<String> },
    /// Every term must appear in subject, body text, body html or sender.
    TextContainsAny { terms: Vec<String> },
}

/// Case folding shared by in-memory matching and the SQL fold function.
pub fn fold_case(value: &str) -> String {
    value.to_lowercase()
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    fold_case(haystack).contains(&fold_case(needle))
}

fn any_contains(haystack: Option<&str>, needles: &[String]) -> bool {
    let haystack = haystack.unwrap_or("");
    needles.iter().any(|needle| contains_ci(haystack, needle))
}

impl Predicate {
    pub fn matches(&self, message: &Message) -> bool {
        match self {
            Self::OwnerScope { user_id } => message.user_id == *user_id,
            Self::AccountIn { account_ids } => account_ids.contains(&message.account_id),
            Self::AddressContainsAny {
                field,
                needles,
                negated,
            } => {
                let hit = match field {
                    AddressField::From => any_contains(message.from_address.as_deref(), needles),
                    AddressField::To => message
                        .to_addresses
                        .iter()
                        .any(|a| any_contains(Some(a), needles)),
                    AddressField::Cc => message
                        .cc_addresses
                        .iter()
                        .any(|a| any_contains(Some(a), needles)),
                    AddressField::Bcc => message
                        .bcc_addresses
                        .iter()
                        .any(|a| any_contains(Some(a), needles)),
                };
                hit != *negated
            }
            Self::SubjectContainsAny { needles, negated } => {
                any_contains(message.subject.as_deref(), needles) != *negated
            }
            Self::FlagEquals { flag, expected } => {
                let actual = match flag {
                    MessageFlag::Read => message.is_read,
                    MessageFlag::Starred => message.is_starred,
                    MessageFlag::Important => message.is_important,
                };
                actual == *expected
            }
            Self::AttachmentExists { expected } => message.has_attachments() == *expected,
            Self::AttachmentNameContainsAny { needles } => message
                .attachments
                .iter()
                .any(|a| any_contains(Some(&a.filename), needles)),
            Self::AttachmentSizeCompare { comparison, bytes } => {
                message.attachments.iter().any(|a| match comparison {
                    SizeComparison::Larger => a.size_bytes > *bytes,
                    SizeComparison::Smaller => a.size_bytes < *bytes,
                })
            }
            Self::DateRange { after, before } => {
                after.map_or(true, |bound| message.sent_at >= bound)
                    && before.map_or(true, |bound| message.sent_at <= bound)
            }
            Self::FolderIn { folders } => message.folder.as_deref().is_some_and(|folder| {
                let folder = fold_case(folder);
                folders.iter().any(|f| fold_case(f) == folder)
            }),
            Self::LabelAny { labels } => message.labels.iter().any(|label| {
                labels
                    .iter()
                    .any(|wanted| fold_case(wanted) == fold_case(label))
            }),
            Self::TextContainsAny { terms } => terms.iter().all(|term| {
                [
                    message.subject.as_deref(),
                    message.body_text.as_deref(),
                    message.body_html.as_deref(),
                    message.from_address.as_deref(),
                ]
                .into_iter()
                .flatten()
                .any(|field| contains_ci(field, term))
            }),
        }
    }
}

/// Conjunction of predicates. The first entry is always the owner scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PredicateSet {
    predicates: Vec<Predicate>,
}

impl PredicateSet {
    /// A set that only scopes to the owning user.
    pub fn for_user(user_id: &str) -> Self {
        Self {
            predicates: vec![Predicate::OwnerScope {
                user_id: user_id.to_string(),
            }],
        }
    }

    /// Compile the parsed query (if any) and the explicit options.
    pub fn compile(user_id: &str, parsed: Option<&ParsedQuery>, options: &SearchOptions) -> Self {
        let mut set = Self::for_user(user_id);

        if let Some(account_ids) = options.account_ids.as_ref().filter(|ids| !ids.is_empty()) {
            set.push(Predicate::AccountIn {
                account_ids: account_ids.clone(),
            });
        }

        if let Some(parsed) = parsed {
            set.compile_parsed(parsed);
        }
        set.compile_explicit(options);
        set
    }

    fn push(&mut self, predicate: Predicate) {
        self.predicates.push(predicate);
    }

    fn push_address(&mut self, field: AddressField, needles: &[String], negated: bool) {
        if !needles.is_empty() {
            self.push(Predicate::AddressContainsAny {
                field,
                needles: needles.to_vec(),
                negated,
            });
        }
    }

    fn push_subject(&mut self, needles: &[String], negated: bool) {
        if !needles.is_empty() {
            self.push(Predicate::SubjectContainsAny {
                needles: needles.to_vec(),
                negated,
            });
        }
    }

    fn compile_parsed(&mut self, parsed: &ParsedQuery) {
        let negations = &parsed.negations;

        self.push_address(AddressField::From, &parsed.from, false);
        self.push_address(AddressField::From, &negations.from, true);
        self.push_address(AddressField::To, &parsed.to, false);
        self.push_address(AddressField::To, &negations.to, true);
        self.push_address(AddressField::Cc, &parsed.cc, false);
        self.push_address(AddressField::Bcc, &parsed.bcc, false);

        self.push_subject(&parsed.subject, false);
        self.push_subject(&negations.subject, true);

        if parsed.has.iter().any(|v| is_attachment_keyword(v)) {
            self.push(Predicate::AttachmentExists { expected: true });
        }
        if negations.has.iter().any(|v| is_attachment_keyword(v)) {
            self.push(Predicate::AttachmentExists { expected: false });
        }

        for value in &parsed.is {
            if let Some((flag, expected)) = status_flag(value) {
                self.push(Predicate::FlagEquals { flag, expected });
            }
        }
        for value in &negations.is {
            if let Some((flag, expected)) = status_flag(value) {
                self.push(Predicate::FlagEquals {
                    flag,
                    expected: !expected,
                });
            }
        }

        if !parsed.in_folder.is_empty() {
            self.push(Predicate::FolderIn {
                folders: parsed.in_folder.clone(),
            });
        }
        if !parsed.label.is_empty() {
            self.push(Predicate::LabelAny {
                labels: parsed.label.clone(),
            });
        }

        if !parsed.filename.is_empty() {
            self.push(Predicate::AttachmentNameContainsAny {
                needles: parsed.filename.clone(),
            });
        }
        if let Some(bytes) = parsed.larger {
            self.push(Predicate::AttachmentSizeCompare {
                comparison: SizeComparison::Larger,
                bytes,
            });
        }
        if let Some(bytes) = parsed.smaller {
            self.push(Predicate::AttachmentSizeCompare {
                comparison: SizeComparison::Smaller,
                bytes,
            });
        }

        if parsed.after.is_some() || parsed.before.is_some() {
            self.push(Predicate::DateRange {
                after: parsed.after,
                before: parsed.before,
            });
        }

        if !parsed.text_search.is_empty() {
            self.push(Predicate::TextContainsAny {
                terms: parsed.text_search.clone(),
            });
        }
    }

    fn compile_explicit(&mut self, options: &SearchOptions) {
        if let Some(from) = non_blank(options.from_email.as_deref()) {
            self.push_address(AddressField::From, &[from.to_string()], false);
        }
        if let Some(subject) = non_blank(options.subject.as_deref()) {
            self.push_subject(&[subject.to_string()], false);
        }

        let after = options.date_from.and_then(start_of_day);
        let before = options.date_to.and_then(end_of_day);
        if after.is_some() || before.is_some() {
            self.push(Predicate::DateRange { after, before });
        }

        if let Some(expected) = options.has_attachments {
            self.push(Predicate::AttachmentExists { expected });
        }
        if let Some(expected) = options.is_read {
            self.push(Predicate::FlagEquals {
                flag: MessageFlag::Read,
                expected,
            });
        }
        if let Some(expected) = options.is_starred {
            self.push(Predicate::FlagEquals {
                flag: MessageFlag::Starred,
                expected,
            });
        }

        if let Some(labels) = options.labels.as_ref().filter(|labels| !labels.is_empty()) {
            self.push(Predicate::LabelAny {
                labels: labels.clone(),
            });
        }
    }

    pub fn user_id(&self) -> &str {
        match self.predicates.first() {
            Some(Predicate::OwnerScope { user_id }) => user_id,
            _ => "",
        }
    }

    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    pub fn len(&self) -> usize {
        self.predicates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    pub fn matches(&self, message: &Message) -> bool {
        self.predicates.iter().all(|p| p.matches(message))
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

fn is_attachment_keyword(value: &str) -> bool {
    matches!(
        value.to_ascii_lowercase().as_str(),
        "attachment" | "attachments"
    )
}

/// Map an `is:` value to the flag it tests and the expected state.
fn status_flag(value: &str) -> Option<(MessageFlag, bool)> {
    match value.to_ascii_lowercase().as_str() {
        "read" => Some((MessageFlag::Read, true)),
        "unread" => Some((MessageFlag::Read, false)),
        "starred" | "star" => Some((MessageFlag::Starred, true)),
        "important" => Some((MessageFlag::Important, true)),
        _ => None,
    }
}

fn start_of_day(date: NaiveDate) -> Option<DateTime<Utc>> {
    Some(Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0)?))
}

fn end_of_day(date: NaiveDate) -> Option<DateTime<Utc>> {
    Some(Utc.from_utc_datetime(&date.and_hms_opt(23, 59, 59)?))
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::*;
    use crate::db::models::Attachment;
    use crate::search::query::parse_query_at;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 16, 12, 0, 0)
            .single()
            .expect("valid now")
    }

    fn message(id: &str, user_id: &str, from: &str) -> Message {
        Message {
            id: id.to_string(),
            user_id: user_id.to_string(),
            account_id: format!("{user_id}-acc"),
            thread_id: None,
            subject: Some(format!("Subject of {id}")),
            from_address: Some(from.to_string()),
            from_name: None,
            to_addresses: vec!["owner@example.com".to_string()],
            cc_addresses: vec![],
            bcc_addresses: vec![],
            body_text: Some("plain body".to_string()),
            body_html: None,
            sent_at: now() - Duration::days(1),
            is_read: false,
            is_starred: false,
            is_important: false,
            folder: Some("INBOX".to_string()),
            labels: vec!["Work".to_string()],
            attachments: vec![],
        }
    }

    fn attachment(message_id: &str, filename: &str, size_bytes: u64) -> Attachment {
        Attachment {
            id: format!("{message_id}-{filename}"),
            message_id: message_id.to_string(),
            filename: filename.to_string(),
            content_type: None,
            size_bytes,
        }
    }

    fn compile(query: &str) -> PredicateSet {
        let parsed = parse_query_at(query, now());
        PredicateSet::compile("user-1", Some(&parsed), &SearchOptions::default())
    }

    #[test]
    fn owner_scope_is_always_first() {
        let set = compile("");
        assert_eq!(set.len(), 1);
        assert_eq!(set.user_id(), "user-1");
        assert!(matches!(
            set.predicates()[0],
            Predicate::OwnerScope { .. }
        ));
    }

    #[test]
    fn unread_requires_is_read_false_and_negation_flips() {
        let set = compile("is:unread");
        assert!(set.predicates().contains(&Predicate::FlagEquals {
            flag: MessageFlag::Read,
            expected: false
        }));

        let set = compile("-is:unread");
        assert!(set.predicates().contains(&Predicate::FlagEquals {
            flag: MessageFlag::Read,
            expected: true
        }));

        let mut unread = message("m1", "user-1", "a@x.com");
        assert!(compile("is:unread").matches(&unread));
        assert!(!compile("-is:unread").matches(&unread));
        unread.is_read = true;
        assert!(compile("-is:unread").matches(&unread));
    }

    #[test]
    fn star_and_important_flags() {
        let mut m = message("m1", "user-1", "a@x.com");
        assert!(!compile("is:star").matches(&m));
        m.is_starred = true;
        assert!(compile("is:starred").matches(&m));
        assert!(!compile("-is:starred").matches(&m));
        assert!(!compile("is:important").matches(&m));
        m.is_important = true;
        assert!(compile("is:important").matches(&m));
    }

    #[test]
    fn unknown_status_and_has_values_compile_to_nothing() {
        assert_eq!(compile("is:snoozed has:drive").len(), 1);
    }

    #[test]
    fn from_is_or_within_operator_and_case_insensitive() {
        let set = compile("from:ALICE from:bob");
        assert!(set.matches(&message("m1", "user-1", "alice@x.com")));
        assert!(set.matches(&message("m2", "user-1", "Bob@x.com")));
        assert!(!set.matches(&message("m3", "user-1", "carol@x.com")));
    }

    #[test]
    fn negated_addresses_must_match_none() {
        let set = compile("-from:alice -from:bob");
        assert!(!set.matches(&message("m1", "user-1", "alice@x.com")));
        assert!(!set.matches(&message("m2", "user-1", "bob@x.com")));
        assert!(set.matches(&message("m3", "user-1", "carol@x.com")));
    }

    #[test]
    fn negated_from_matches_message_without_sender() {
        let mut m = message("m1", "user-1", "x");
        m.from_address = None;
        assert!(compile("-from:alice").matches(&m));
        assert!(!compile("from:alice").matches(&m));
    }

    #[test]
    fn recipient_fields() {
        let mut m = message("m1", "user-1", "a@x.com");
        m.cc_addresses = vec!["carol@x.com".to_string()];
        m.bcc_addresses = vec!["dan@x.com".to_string()];
        assert!(compile("to:owner").matches(&m));
        assert!(!compile("-to:owner").matches(&m));
        assert!(compile("cc:carol").matches(&m));
        assert!(compile("bcc:dan").matches(&m));
        assert!(!compile("cc:dan").matches(&m));
    }

    #[test]
    fn attachment_predicates() {
        let mut m = message("m1", "user-1", "a@x.com");
        assert!(!compile("has:attachment").matches(&m));
        assert!(compile("-has:attachment").matches(&m));

        m.attachments = vec![
            attachment("m1", "Report.PDF", 2 * 1024 * 1024),
            attachment("m1", "logo.png", 4 * 1024),
        ];
        assert!(compile("has:attachment").matches(&m));
        assert!(!compile("-has:attachment").matches(&m));
        assert!(compile("filename:report").matches(&m));
        assert!(!compile("filename:invoice").matches(&m));
        assert!(compile("larger:1M").matches(&m));
        assert!(!compile("larger:2M").matches(&m));
        assert!(compile("smaller:5K").matches(&m));
        assert!(!compile("smaller:4K").matches(&m));
    }

    #[test]
    fn date_bounds_are_inclusive() {
        let mut m = message("m1", "user-1", "a@x.com");
        m.sent_at = Utc
            .with_ymd_and_hms(2024, 1, 15, 0, 0, 0)
            .single()
            .expect("valid date");
        assert!(compile("after:2024-01-15").matches(&m));
        assert!(compile("before:2024-01-15").matches(&m));
        assert!(!compile("after:2024-01-16").matches(&m));
        assert!(!compile("before:2024-01-14").matches(&m));
    }

    #[test]
    fn relative_dates_compile_to_ranges() {
        let m = message("m1", "user-1", "a@x.com");
        assert!(compile("newer_than:7d").matches(&m));
        assert!(!compile("older_than:7d").matches(&m));
    }

    #[test]
    fn free_text_terms_are_anded_across_fields() {
        let mut m = message("m1", "user-1", "alice@x.com");
        m.subject = Some("Quarterly budget".to_string());
        m.body_html = Some("<p>Review the forecast</p>".to_string());
        assert!(compile("budget forecast").matches(&m));
        assert!(compile("ALICE budget").matches(&m));
        assert!(compile("\"quarterly budget\"").matches(&m));
        assert!(!compile("budget missing").matches(&m));
    }

    #[test]
    fn folder_and_label_matching_ignore_case() {
        let m = message("m1", "user-1", "a@x.com");
        assert!(compile("in:inbox").matches(&m));
        assert!(!compile("in:sent").matches(&m));
        assert!(compile("label:work").matches(&m));
        assert!(compile("label:personal label:WORK").matches(&m));
        assert!(!compile("label:personal").matches(&m));
    }

    #[test]
    fn explicit_filters_are_anded_with_query() {
        let parsed = parse_query_at("from:alice", now());
        let options = SearchOptions {
            subject: Some("budget".to_string()),
            is_read: Some(true),
            ..SearchOptions::default()
        };
        let set = PredicateSet::compile("user-1", Some(&parsed), &options);

        let mut m = message("m1", "user-1", "alice@x.com");
        m.subject = Some("Budget".to_string());
        assert!(!set.matches(&m));
        m.is_read = true;
        assert!(set.matches(&m));
        m.from_address = Some("bob@x.com".to_string());
        assert!(!set.matches(&m));
    }

    #[test]
    fn explicit_date_range_covers_whole_days() {
        let options = SearchOptions {
            date_from: NaiveDate::from_ymd_opt(2024, 1, 15),
            date_to: NaiveDate::from_ymd_opt(2024, 1, 15),
            ..SearchOptions::default()
        };
        let set = PredicateSet::compile("user-1", None, &options);
        let mut m = message("m1", "user-1", "a@x.com");
        m.sent_at = Utc
            .with_ymd_and_hms(2024, 1, 15, 23, 30, 0)
            .single()
            .expect("valid date");
        assert!(set.matches(&m));
        m.sent_at += Duration::hours(1);
        assert!(!set.matches(&m));
    }

    #[test]
    fn explicit_account_ids_restrict_but_empty_list_does_not() {
        let m = message("m1", "user-1", "a@x.com");
        let restricted = SearchOptions {
            account_ids: Some(vec!["other-acc".to_string()]),
            ..SearchOptions::default()
        };
        assert!(!PredicateSet::compile("user-1", None, &restricted).matches(&m));

        let empty = SearchOptions {
            account_ids: Some(vec![]),
            ..SearchOptions::default()
        };
        assert!(PredicateSet::compile("user-1", None, &empty).matches(&m));
    }

    #[test]
    fn no_operator_combination_escapes_owner_scope() {
        let queries = [
            "",
            "from:victim",
            "-from:victim",
            "to:owner cc:x bcc:y",
            "is:read -is:read is:unread",
            "has:attachment -has:attachment",
            "in:inbox label:work filename:a larger:0 smaller:99999999",
            "after:1970-01-01 before:2999-12-31",
            "user_id:user-2 user-2 \"user-2\"",
            "-subject:\"\" subject:\"' OR 1=1 --\"",
            "newer_than:100y older_than:0d",
        ];
        let account_sets = [
            None,
            Some(vec![]),
            Some(vec!["user-2-acc".to_string()]),
            Some(vec!["user-1-acc".to_string(), "user-2-acc".to_string()]),
        ];

        let mut foreign = message("m-foreign", "user-2", "victim@x.com");
        foreign.subject = Some("user-2 ' OR 1=1 --".to_string());
        foreign.attachments = vec![attachment("m-foreign", "a.txt", 10)];
        let mut foreign_read = foreign.clone();
        foreign_read.is_read = true;

        for query in queries {
            for account_ids in &account_sets {
                for has_attachments in [None, Some(true), Some(false)] {
                    let options = SearchOptions {
                        account_ids: account_ids.clone(),
                        has_attachments,
                        ..SearchOptions::default()
                    };
                    let parsed = parse_query_at(query, now());
                    let set = PredicateSet::compile("user-1", Some(&parsed), &options);
                    assert_eq!(set.user_id(), "user-1");
                    assert!(
                        !set.matches(&foreign) && !set.matches(&foreign_read),
                        "query {query:?} with {options:?} leaked a foreign message"
                    );
                }
            }
        }
    }
}
