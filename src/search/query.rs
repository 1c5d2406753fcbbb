//! Search query parser.
//!
//! Turns a Gmail-style query string into a structured [`ParsedQuery`] in a
//! single left-to-right pass.
//!
//! # Supported syntax
//!
//! **Address and subject**: `from:alice`, `to:bob@x.com`, `cc:`, `bcc:`,
//! `subject:invoice`, `subject:"quarterly report"`
//!
//! **Status and location**: `is:unread`, `is:starred`, `is:important`,
//! `has:attachment`, `in:inbox`, `label:work`
//!
//! **Attachments**: `filename:report.pdf`, `larger:10M`, `smaller:500K`
//!
//! **Dates**: `before:2024-06-01`, `after:2024/01/01`, `older_than:1y`,
//! `newer_than:7d`
//!
//! **Negation**: `-from:`, `-to:`, `-subject:`, `-has:`, `-is:`
//!
//! Everything else is free text; `"quoted phrases"` stay together.
//! Operators repeat as OR within the operator and AND across operators.
//! Operator keywords are case-insensitive, values are kept verbatim.
//!
//! Operator tokens with a missing or malformed value, and negations of
//! operators that cannot be negated, are collected in
//! [`ParsedQuery::unparsed`] and have no filtering effect.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::relative::{parse_absolute_date, resolve_byte_size, resolve_relative_duration};

/// Negated operator values. Only these operators support a `-` prefix.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Negations {
    pub from: Vec<String>,
    pub to: Vec<String>,
    pub subject: Vec<String>,
    pub has: Vec<String>,
    pub is: Vec<String>,
}

impl Negations {
    pub fn is_empty(&self) -> bool {
        self.from.is_empty()
            && self.to.is_empty()
            && self.subject.is_empty()
            && self.has.is_empty()
            && self.is.is_empty()
    }
}

/// A fully parsed search query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedQuery {
    pub from: Vec<String>,
    pub to: Vec<String>,
    pub cc: Vec<String>,
    pub bcc: Vec<String>,
    pub subject: Vec<String>,
    pub has: Vec<String>,
    pub is: Vec<String>,
    #[serde(rename = "in")]
    pub in_folder: Vec<String>,
    pub label: Vec<String>,
    pub filename: Vec<String>,
    pub before: Option<DateTime<Utc>>,
    pub after: Option<DateTime<Utc>>,
    /// Raw `older_than:` token, kept after resolving into `before`.
    pub older_than: Option<String>,
    /// Raw `newer_than:` token, kept after resolving into `after`.
    pub newer_than: Option<String>,
    pub larger: Option<u64>,
    pub smaller: Option<u64>,
    /// Free text: quoted phrases first, then bare words, each in input order.
    pub text_search: Vec<String>,
    pub negations: Negations,
    /// Operator tokens that were recognized but could not be applied.
    pub unparsed: Vec<String>,
}

impl ParsedQuery {
    /// True when the query carries no filter and no free text.
    pub fn is_empty(&self) -> bool {
        self.from.is_empty()
            && self.to.is_empty()
            && self.cc.is_empty()
            && self.bcc.is_empty()
            && self.subject.is_empty()
            && self.has.is_empty()
            && self.is.is_empty()
            && self.in_folder.is_empty()
            && self.label.is_empty()
            && self.filename.is_empty()
            && self.before.is_none()
            && self.after.is_none()
            && self.larger.is_none()
            && self.smaller.is_none()
            && self.text_search.is_empty()
            && self.negations.is_empty()
    }
}

/// The fixed operator vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    From,
    To,
    Cc,
    Bcc,
    Subject,
    Has,
    Is,
    In,
    Label,
    Filename,
    Before,
    After,
    OlderThan,
    NewerThan,
    Larger,
    Smaller,
}

impl Operator {
    pub const ALL: [Operator; 16] = [
        Self::From,
        Self::To,
        Self::Cc,
        Self::Bcc,
        Self::Subject,
        Self::Has,
        Self::Is,
        Self::In,
        Self::Label,
        Self::Filename,
        Self::Before,
        Self::After,
        Self::OlderThan,
        Self::NewerThan,
        Self::Larger,
        Self::Smaller,
    ];

    pub fn keyword(self) -> &'static str {
        match self {
            Self::From => "from",
            Self::To => "to",
            Self::Cc => "cc",
            Self::Bcc => "bcc",
            Self::Subject => "subject",
            Self::Has => "has",
            Self::Is => "is",
            Self::In => "in",
            Self::Label => "label",
            Self::Filename => "filename",
            Self::Before => "before",
            Self::After => "after",
            Self::OlderThan => "older_than",
            Self::NewerThan => "newer_than",
            Self::Larger => "larger",
            Self::Smaller => "smaller",
        }
    }

    /// Case-insensitive keyword lookup.
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|op| op.keyword().eq_ignore_ascii_case(keyword))
    }

    pub fn supports_negation(self) -> bool {
        matches!(
            self,
            Self::From | Self::To | Self::Subject | Self::Has | Self::Is
        )
    }

    /// Operators whose value may be a `"quoted phrase"`.
    pub fn accepts_phrase(self) -> bool {
        matches!(self, Self::Subject | Self::Filename)
    }
}

/// Parse a query string relative to the current time.
///
/// Never fails: unrecognized syntax is treated as free text.
pub fn parse_query(input: &str) -> ParsedQuery {
    parse_query_at(input, Utc::now())
}

/// Parse a query string, resolving relative dates against `now`.
pub fn parse_query_at(input: &str, now: DateTime<Utc>) -> ParsedQuery {
    let mut parsed = ParsedQuery::default();
    let mut phrases = Vec::new();
    let mut words = Vec::new();

    for token in Scanner::new(input) {
        match token {
            Token::Phrase(phrase) => phrases.push(phrase.to_string()),
            Token::Word(word) => words.push(word.to_string()),
            Token::Operator {
                raw,
                operator,
                negated,
                value,
            } => {
                if !apply_operator(&mut parsed, operator, negated, value, now) {
                    parsed.unparsed.push(raw.to_string());
                }
            }
        }
    }

    parsed.text_search = phrases;
    parsed.text_search.extend(words);
    parsed
}

/// Record one operator occurrence. Returns `false` when the token cannot be
/// applied and must be reported as unparsed.
fn apply_operator(
    parsed: &mut ParsedQuery,
    operator: Operator,
    negated: bool,
    value: Option<&str>,
    now: DateTime<Utc>,
) -> bool {
    let Some(value) = value.filter(|v| !v.is_empty()) else {
        return false;
    };
    if negated && !operator.supports_negation() {
        return false;
    }

    match operator {
        Operator::From => push_term(&mut parsed.from, &mut parsed.negations.from, value, negated),
        Operator::To => push_term(&mut parsed.to, &mut parsed.negations.to, value, negated),
        Operator::Subject => push_term(
            &mut parsed.subject,
            &mut parsed.negations.subject,
            value,
            negated,
        ),
        Operator::Has => push_term(&mut parsed.has, &mut parsed.negations.has, value, negated),
        Operator::Is => push_term(&mut parsed.is, &mut parsed.negations.is, value, negated),
        Operator::Cc => push_unique(&mut parsed.cc, value),
        Operator::Bcc => push_unique(&mut parsed.bcc, value),
        Operator::In => push_unique(&mut parsed.in_folder, value),
        Operator::Label => push_unique(&mut parsed.label, value),
        Operator::Filename => push_unique(&mut parsed.filename, value),
        Operator::Before => match parse_absolute_date(value) {
            Some(date) => parsed.before = Some(date),
            None => return false,
        },
        Operator::After => match parse_absolute_date(value) {
            Some(date) => parsed.after = Some(date),
            None => return false,
        },
        Operator::OlderThan => match resolve_relative_duration(value, now) {
            Some(date) => {
                parsed.before = Some(date);
                parsed.older_than = Some(value.to_string());
            }
            None => return false,
        },
        Operator::NewerThan => match resolve_relative_duration(value, now) {
            Some(date) => {
                parsed.after = Some(date);
                parsed.newer_than = Some(value.to_string());
            }
            None => return false,
        },
        Operator::Larger => match resolve_byte_size(value) {
            Some(bytes) => parsed.larger = Some(bytes),
            None => return false,
        },
        Operator::Smaller => match resolve_byte_size(value) {
            Some(bytes) => parsed.smaller = Some(bytes),
            None => return false,
        },
    }
    true
}

/// A value lives in exactly one of the positive or negated lists; the most
/// recent occurrence decides which.
fn push_term(positive: &mut Vec<String>, negative: &mut Vec<String>, value: &str, negated: bool) {
    let (target, other) = if negated {
        (negative, positive)
    } else {
        (positive, negative)
    };
    other.retain(|existing| existing != value);
    push_unique(target, value);
}

fn push_unique(list: &mut Vec<String>, value: &str) {
    if !list.iter().any(|existing| existing == value) {
        list.push(value.to_string());
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token<'a> {
    Word(&'a str),
    Phrase(&'a str),
    Operator {
        /// The full source slice, including any `-` prefix.
        raw: &'a str,
        operator: Operator,
        negated: bool,
        value: Option<&'a str>,
    },
}

/// Stateless left-to-right tokenizer over byte positions.
struct Scanner<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Scanner<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn skip_whitespace(&mut self) {
        let rest = self.rest();
        let trimmed = rest.trim_start();
        self.pos += rest.len() - trimmed.len();
    }

    /// If the text at `at` is a closed `"..."` phrase with non-empty content,
    /// return the content and the position just past the closing quote.
    fn closed_phrase_at(&self, at: usize) -> Option<(&'a str, usize)> {
        let tail = self.input.get(at..)?.strip_prefix('"')?;
        let close = tail.find('"')?;
        if close == 0 {
            return None;
        }
        Some((&tail[..close], at + 1 + close + 1))
    }

    /// End of a bare run starting at `from`: the next whitespace, or the start
    /// of a closed quoted phrase when `stop_at_phrase` is set.
    fn bare_end(&self, from: usize, stop_at_phrase: bool) -> usize {
        for (offset, ch) in self.input[from..].char_indices() {
            let at = from + offset;
            if ch.is_whitespace() {
                return at;
            }
            if stop_at_phrase && ch == '"' && at > from && self.closed_phrase_at(at).is_some() {
                return at;
            }
        }
        self.input.len()
    }

    /// Try to read `-?keyword:` at the cursor.
    fn operator_prefix(&self) -> Option<(Operator, bool, usize)> {
        let rest = self.rest();
        let (negated, body) = match rest.strip_prefix('-') {
            Some(stripped) => (true, stripped),
            None => (false, rest),
        };
        let keyword_len = body
            .char_indices()
            .find(|(_, c)| !(c.is_ascii_alphabetic() || *c == '_'))
            .map_or(body.len(), |(idx, _)| idx);
        if keyword_len == 0 || !body[keyword_len..].starts_with(':') {
            return None;
        }
        let operator = Operator::from_keyword(&body[..keyword_len])?;
        let value_start = self.pos + usize::from(negated) + keyword_len + 1;
        Some((operator, negated, value_start))
    }

    fn read_operator(&mut self, operator: Operator, negated: bool, value_start: usize) -> Token<'a> {
        let start = self.pos;
        let starts_with_space = self.input[value_start..]
            .chars()
            .next()
            .map_or(true, char::is_whitespace);

        let (value, end) = if starts_with_space {
            (None, value_start)
        } else if let Some((phrase, end)) = operator
            .accepts_phrase()
            .then(|| self.closed_phrase_at(value_start))
            .flatten()
        {
            (Some(phrase), end)
        } else {
            let end = self.bare_end(value_start, false);
            (Some(&self.input[value_start..end]), end)
        };

        self.pos = end;
        Token::Operator {
            raw: &self.input[start..end],
            operator,
            negated,
            value,
        }
    }
}

impl<'a> Iterator for Scanner<'a> {
    type Item = Token<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        self.skip_whitespace();
        if self.pos >= self.input.len() {
            return None;
        }

        if let Some((phrase, end)) = self.closed_phrase_at(self.pos) {
            self.pos = end;
            return Some(Token::Phrase(phrase));
        }

        if let Some((operator, negated, value_start)) = self.operator_prefix() {
            return Some(self.read_operator(operator, negated, value_start));
        }

        let start = self.pos;
        let end = self.bare_end(start, true);
        self.pos = end;
        Some(Token::Word(&self.input[start..end]))
    }
}
