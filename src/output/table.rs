use chrono::{DateTime, Utc};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::db::models::Message;
use crate::db::DatabaseStats;
use crate::search::{OperatorCategory, ParsedQuery, SearchResult};

const FLAGS_WIDTH: usize = 4;
const FROM_WIDTH: usize = 24;
const SUBJECT_WIDTH: usize = 52;
const DATE_WIDTH: usize = 12;
const DISPLAY_TIME: &str = "%Y-%m-%d %H:%M:%S UTC";

pub fn format_search_result(result: &SearchResult) -> String {
    let mut out = String::new();

    if result.messages.is_empty() {
        out.push_str("No emails found.\n");
    } else {
        out.push_str(&format!(
            "{:<flags$}  {:<from$}  {:<subject$}  {:<date$}\n",
            "",
            "From",
            "Subject",
            "Date",
            flags = FLAGS_WIDTH,
            from = FROM_WIDTH,
            subject = SUBJECT_WIDTH,
            date = DATE_WIDTH,
        ));
        out.push_str(&format!(
            "{}  {}  {}  {}\n",
            "-".repeat(FLAGS_WIDTH),
            "-".repeat(FROM_WIDTH),
            "-".repeat(SUBJECT_WIDTH),
            "-".repeat(DATE_WIDTH)
        ));

        let now = Utc::now();
        for message in &result.messages {
            let from = message
                .from_name
                .as_deref()
                .or(message.from_address.as_deref())
                .unwrap_or("(unknown)");
            let subject = message.subject.as_deref().unwrap_or("(no subject)");
            out.push_str(&format!(
                "{}  {}  {}  {}\n",
                pad(&flags(message), FLAGS_WIDTH),
                pad(&truncate_for_width(from, FROM_WIDTH), FROM_WIDTH),
                pad(&truncate_for_width(subject, SUBJECT_WIDTH), SUBJECT_WIDTH),
                truncate_for_width(&relative_date(&message.sent_at, now), DATE_WIDTH),
            ));
        }
    }

    out.push('\n');
    out.push_str(&format!(
        "Showing {} of {} ({} ms{})\n",
        result.messages.len(),
        result.total_count,
        result.search_time_ms,
        if result.cached { ", cached" } else { "" }
    ));

    if !result.suggestions.is_empty() {
        out.push_str("\nTry instead:\n");
        for suggestion in &result.suggestions {
            out.push_str(&format!("  {suggestion}\n"));
        }
    }

    if let Some(unparsed) = result
        .parsed_query
        .as_ref()
        .map(|parsed| &parsed.unparsed)
        .filter(|unparsed| !unparsed.is_empty())
    {
        out.push_str(&format!("\nIgnored: {}\n", unparsed.join(" ")));
    }

    out
}

pub fn format_parsed_query(parsed: &ParsedQuery) -> String {
    let mut rows: Vec<(&str, String)> = Vec::new();
    let mut list = |label: &'static str, values: &[String]| {
        if !values.is_empty() {
            rows.push((label, values.join(", ")));
        }
    };

    list("from", &parsed.from);
    list("to", &parsed.to);
    list("cc", &parsed.cc);
    list("bcc", &parsed.bcc);
    list("subject", &parsed.subject);
    list("has", &parsed.has);
    list("is", &parsed.is);
    list("in", &parsed.in_folder);
    list("label", &parsed.label);
    list("filename", &parsed.filename);
    list("text", &parsed.text_search);
    list("-from", &parsed.negations.from);
    list("-to", &parsed.negations.to);
    list("-subject", &parsed.negations.subject);
    list("-has", &parsed.negations.has);
    list("-is", &parsed.negations.is);
    list("unparsed", &parsed.unparsed);

    if let Some(after) = &parsed.after {
        rows.push(("after", after.format(DISPLAY_TIME).to_string()));
    }
    if let Some(before) = &parsed.before {
        rows.push(("before", before.format(DISPLAY_TIME).to_string()));
    }
    if let Some(larger) = parsed.larger {
        rows.push(("larger", format!("{larger} bytes")));
    }
    if let Some(smaller) = parsed.smaller {
        rows.push(("smaller", format!("{smaller} bytes")));
    }

    if rows.is_empty() {
        return "Empty query.".to_string();
    }

    let mut out = String::new();
    for (label, value) in rows {
        out.push_str(&format!("{label:<10} {value}\n"));
    }
    out
}

pub fn format_operator_help(help: &[OperatorCategory]) -> String {
    let mut out = String::new();
    for (idx, category) in help.iter().enumerate() {
        if idx > 0 {
            out.push('\n');
        }
        out.push_str(category.category);
        out.push('\n');
        out.push_str(&"-".repeat(category.category.width()));
        out.push('\n');
        for op in category.operators {
            out.push_str(&format!(
                "  {:<16} {:<52} {}\n",
                op.operator, op.description, op.example
            ));
        }
    }
    out
}

pub fn format_stats(stats: &DatabaseStats) -> String {
    let mut out = String::new();
    out.push_str("Mailsift Stats\n");
    out.push_str("==============\n");
    out.push_str(&format!("Accounts:    {}\n", stats.total_accounts));
    out.push_str(&format!("Messages:    {}\n", stats.total_messages));
    out.push_str(&format!("Attachments: {}\n", stats.total_attachments));

    if !stats.messages_by_account.is_empty() {
        out.push('\n');
        out.push_str("Messages by account\n");
        out.push_str("-------------------\n");
        for row in &stats.messages_by_account {
            out.push_str(&format!(
                "{} {:>8}\n",
                pad(&truncate_for_width(&row.account_id, 24), 24),
                row.count
            ));
        }
    }

    out
}

/// Unread, starred, important and attachment markers.
fn flags(message: &Message) -> String {
    [
        (!message.is_read, '*'),
        (message.is_starred, 's'),
        (message.is_important, '!'),
        (message.has_attachments(), '@'),
    ]
    .into_iter()
    .map(|(set, marker)| if set { marker } else { ' ' })
    .collect()
}

fn relative_date(sent_at: &DateTime<Utc>, now: DateTime<Utc>) -> String {
    let delta = now.signed_duration_since(*sent_at);
    if delta.num_seconds() < 0 {
        return "in future".to_string();
    }
    if delta.num_minutes() < 1 {
        return "just now".to_string();
    }
    if delta.num_hours() < 1 {
        return format!("{}m ago", delta.num_minutes());
    }
    if delta.num_hours() < 24 {
        return format!("{}h ago", delta.num_hours());
    }
    if delta.num_days() == 1 {
        return "yesterday".to_string();
    }
    if delta.num_days() < 7 {
        return format!("{}d ago", delta.num_days());
    }
    sent_at.format("%Y-%m-%d").to_string()
}

/// Left-align by display width; `format!` padding counts chars, not columns.
fn pad(value: &str, width: usize) -> String {
    let used = UnicodeWidthStr::width(value);
    let mut out = value.to_string();
    out.push_str(&" ".repeat(width.saturating_sub(used)));
    out
}

fn truncate_for_width(value: &str, max_width: usize) -> String {
    if UnicodeWidthStr::width(value) <= max_width {
        return value.to_string();
    }

    if max_width <= 1 {
        return "…".to_string();
    }

    let mut out = String::new();
    let mut width = 0usize;
    for c in value.chars() {
        let cw = UnicodeWidthChar::width(c).unwrap_or(0);
        if width + cw + 1 > max_width {
            break;
        }
        out.push(c);
        width += cw;
    }
    out.push('…');
    out
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};
    use unicode_width::UnicodeWidthStr;

    use crate::db::models::Message;
    use crate::search::{parse_query, search_operator_help, SearchResult};

    use super::{
        format_operator_help, format_parsed_query, format_search_result, relative_date,
        truncate_for_width,
    };

    fn sample_message() -> Message {
        Message {
            id: "msg-1".to_string(),
            user_id: "user-1".to_string(),
            account_id: "acc-1".to_string(),
            thread_id: None,
            subject: Some("A very long subject line that should be truncated in table output because it exceeds width".to_string()),
            from_address: Some("sender@example.com".to_string()),
            from_name: Some("Sender Name".to_string()),
            to_addresses: vec!["owner@example.com".to_string()],
            cc_addresses: vec![],
            bcc_addresses: vec![],
            body_text: Some("Body".to_string()),
            body_html: None,
            sent_at: Utc::now() - Duration::hours(2),
            is_read: false,
            is_starred: true,
            is_important: false,
            folder: Some("inbox".to_string()),
            labels: vec![],
            attachments: vec![],
        }
    }

    fn result(messages: Vec<Message>, suggestions: Vec<String>) -> SearchResult {
        SearchResult {
            total_count: messages.len() as u64,
            messages,
            search_time_ms: 3,
            suggestions,
            parsed_query: Some(parse_query("from:sender before:someday")),
            cached: false,
        }
    }

    #[test]
    fn search_output_has_headers_and_footer() {
        let rendered = format_search_result(&result(vec![sample_message()], vec![]));
        assert!(rendered.contains("From"));
        assert!(rendered.contains("Subject"));
        assert!(rendered.contains("Sender Name"));
        assert!(rendered.contains("2h ago"));
        assert!(rendered.contains("Showing 1 of 1 (3 ms)"));
        assert!(rendered.contains("Ignored: before:someday"));
    }

    #[test]
    fn empty_search_lists_suggestions() {
        let rendered = format_search_result(&result(vec![], vec!["from:alice".to_string()]));
        assert!(rendered.starts_with("No emails found."));
        assert!(rendered.contains("Try instead:\n  from:alice"));
    }

    #[test]
    fn truncation_respects_display_width() {
        let truncated = truncate_for_width("日本語のメールの件名", 9);
        assert!(truncated.ends_with('…'));
        assert!(UnicodeWidthStr::width(truncated.as_str()) <= 9);
        assert_eq!(truncate_for_width("short", 10), "short");
    }

    #[test]
    fn relative_dates() {
        let now = Utc
            .with_ymd_and_hms(2026, 5, 10, 12, 0, 0)
            .single()
            .expect("valid now");
        assert_eq!(relative_date(&now, now), "just now");
        assert_eq!(relative_date(&(now - Duration::days(1)), now), "yesterday");
        assert_eq!(relative_date(&(now - Duration::days(3)), now), "3d ago");
        assert_eq!(relative_date(&(now - Duration::days(30)), now), "2026-04-10");
    }

    #[test]
    fn parsed_query_lists_populated_fields() {
        let rendered = format_parsed_query(&parse_query("from:alice -is:read report larger:1K"));
        assert!(rendered.contains("from       alice"));
        assert!(rendered.contains("-is        read"));
        assert!(rendered.contains("text       report"));
        assert!(rendered.contains("larger     1024 bytes"));
        assert_eq!(format_parsed_query(&parse_query("")), "Empty query.");
    }

    #[test]
    fn operator_help_lists_categories() {
        let rendered = format_operator_help(search_operator_help());
        assert!(rendered.starts_with("From/To/Subject\n---------------\n"));
        assert!(rendered.contains("newer_than:"));
    }
}
