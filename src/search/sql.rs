//! Lowers a [`PredicateSet`] to a parameterized SQLite `WHERE` clause over
//! `messages m`. Every user-supplied value travels as a bound parameter.
//!
//! Case-insensitive comparisons fold both sides with [`FOLD_FUNCTION`], a
//! scalar function backed by [`fold_case`], so SQLite and
//! [`PredicateSet::matches`] agree on non-ASCII text.

use rusqlite::functions::FunctionFlags;
use rusqlite::types::Value;
use rusqlite::Connection;

use crate::db::models::format_timestamp;

use super::predicate::{
    fold_case, AddressField, MessageFlag, Predicate, PredicateSet, SizeComparison,
};

/// Name of the Unicode case-folding SQL function.
pub const FOLD_FUNCTION: &str = "mailsift_fold";

/// Register the SQL functions the generated clauses rely on.
pub fn register_functions(conn: &Connection) -> rusqlite::Result<()> {
    conn.create_scalar_function(
        FOLD_FUNCTION,
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let value: Option<String> = ctx.get(0)?;
            Ok(value.map(|value| fold_case(&value)))
        },
    )
}

#[derive(Debug, Clone, PartialEq)]
pub struct SqlWhereClause {
    pub clause: String,
    pub params: Vec<Value>,
}

/// `%needle%` with LIKE wildcards escaped (paired with `ESCAPE '\'`).
fn like_pattern(needle: &str) -> String {
    let mut escaped = String::with_capacity(needle.len() + 2);
    escaped.push('%');
    for ch in fold_case(needle).chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped.push('%');
    escaped
}

fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

/// `(expr LIKE ? OR expr LIKE ? ...)` for each needle.
fn any_like(expr: &str, needles: &[String], params: &mut Vec<Value>) -> String {
    let alternatives = needles
        .iter()
        .map(|needle| {
            params.push(Value::Text(like_pattern(needle)));
            format!("{FOLD_FUNCTION}({expr}) LIKE ? ESCAPE '\\'")
        })
        .collect::<Vec<_>>();
    format!("({})", alternatives.join(" OR "))
}

fn folded_in(expr: &str, values: &[String], params: &mut Vec<Value>) -> String {
    params.extend(values.iter().map(|v| Value::Text(fold_case(v))));
    format!("{FOLD_FUNCTION}({expr}) IN ({})", placeholders(values.len()))
}

fn attachment_exists(condition: &str) -> String {
    format!("EXISTS (SELECT 1 FROM attachments a WHERE a.message_id = m.id AND {condition})")
}

fn predicate_sql(predicate: &Predicate, params: &mut Vec<Value>) -> String {
    match predicate {
        Predicate::OwnerScope { user_id } => {
            params.push(Value::Text(user_id.clone()));
            "m.user_id = ?".to_string()
        }
        Predicate::AccountIn { account_ids } => {
            params.extend(account_ids.iter().cloned().map(Value::Text));
            format!("m.account_id IN ({})", placeholders(account_ids.len()))
        }
        Predicate::AddressContainsAny {
            field,
            needles,
            negated,
        } => {
            let matched = match field {
                AddressField::From => any_like("COALESCE(m.from_address, '')", needles, params),
                AddressField::To => json_list_like("m.to_addresses", needles, params),
                AddressField::Cc => json_list_like("m.cc_addresses", needles, params),
                AddressField::Bcc => json_list_like("m.bcc_addresses", needles, params),
            };
            negate_if(matched, *negated)
        }
        Predicate::SubjectContainsAny { needles, negated } => {
            negate_if(any_like("COALESCE(m.subject, '')", needles, params), *negated)
        }
        Predicate::FlagEquals { flag, expected } => {
            let column = match flag {
                MessageFlag::Read => "m.is_read",
                MessageFlag::Starred => "m.is_starred",
                MessageFlag::Important => "m.is_important",
            };
            params.push(Value::Integer(i64::from(*expected)));
            format!("{column} = ?")
        }
        Predicate::AttachmentExists { expected } => {
            let exists = "EXISTS (SELECT 1 FROM attachments a WHERE a.message_id = m.id)";
            if *expected {
                exists.to_string()
            } else {
                format!("NOT {exists}")
            }
        }
        Predicate::AttachmentNameContainsAny { needles } => {
            attachment_exists(&any_like("a.filename", needles, params))
        }
        Predicate::AttachmentSizeCompare { comparison, bytes } => {
            let op = match comparison {
                SizeComparison::Larger => ">",
                SizeComparison::Smaller => "<",
            };
            params.push(Value::Integer(i64::try_from(*bytes).unwrap_or(i64::MAX)));
            attachment_exists(&format!("a.size_bytes {op} ?"))
        }
        Predicate::DateRange { after, before } => {
            let mut bounds = Vec::new();
            if let Some(after) = after {
                params.push(Value::Text(format_timestamp(after)));
                bounds.push("m.sent_at >= ?");
            }
            if let Some(before) = before {
                params.push(Value::Text(format_timestamp(before)));
                bounds.push("m.sent_at <= ?");
            }
            if bounds.is_empty() {
                "1 = 1".to_string()
            } else {
                format!("({})", bounds.join(" AND "))
            }
        }
        Predicate::FolderIn { folders } => {
            folded_in("COALESCE(m.folder, '')", folders, params)
        }
        Predicate::LabelAny { labels } => format!(
            "EXISTS (SELECT 1 FROM json_each(COALESCE(m.labels, '[]')) l WHERE {})",
            folded_in("l.value", labels, params)
        ),
        Predicate::TextContainsAny { terms } => {
            let per_term = terms
                .iter()
                .map(|term| {
                    let fields = [
                        "COALESCE(m.subject, '')",
                        "COALESCE(m.body_text, '')",
                        "COALESCE(m.body_html, '')",
                        "COALESCE(m.from_address, '')",
                    ];
                    let alternatives = fields
                        .iter()
                        .map(|field| {
                            params.push(Value::Text(like_pattern(term)));
                            format!("{FOLD_FUNCTION}({field}) LIKE ? ESCAPE '\\'")
                        })
                        .collect::<Vec<_>>();
                    format!("({})", alternatives.join(" OR "))
                })
                .collect::<Vec<_>>();
            format!("({})", per_term.join(" AND "))
        }
    }
}

fn json_list_like(column: &str, needles: &[String], params: &mut Vec<Value>) -> String {
    format!(
        "EXISTS (SELECT 1 FROM json_each(COALESCE({column}, '[]')) j WHERE {})",
        any_like("j.value", needles, params)
    )
}

fn negate_if(clause: String, negated: bool) -> String {
    if negated {
        format!("NOT {clause}")
    } else {
        clause
    }
}

impl PredicateSet {
    pub fn to_sql_where(&self) -> SqlWhereClause {
        let mut params = Vec::new();
        let fragments = self
            .predicates()
            .iter()
            .map(|predicate| predicate_sql(predicate, &mut params))
            .collect::<Vec<_>>();

        SqlWhereClause {
            clause: if fragments.is_empty() {
                "1 = 1".to_string()
            } else {
                fragments.join(" AND ")
            },
            params,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use rusqlite::types::Value;
    use rusqlite::Connection;

    use super::{like_pattern, register_functions};
    use crate::search::filters::SearchOptions;
    use crate::search::predicate::PredicateSet;
    use crate::search::query::parse_query_at;

    fn where_for(query: &str, options: &SearchOptions) -> super::SqlWhereClause {
        let now = Utc
            .with_ymd_and_hms(2026, 10, 16, 12, 0, 0)
            .single()
            .expect("valid now");
        let parsed = parse_query_at(query, now);
        PredicateSet::compile("user-1", Some(&parsed), options).to_sql_where()
    }

    #[test]
    fn like_wildcards_are_escaped() {
        assert_eq!(like_pattern("50%_off\\"), "%50\\%\\_off\\\\%");
        assert_eq!(like_pattern("plain"), "%plain%");
    }

    #[test]
    fn like_needles_are_folded() {
        assert_eq!(like_pattern("RÉUNION"), "%réunion%");
        assert_eq!(like_pattern("JOSÉ@X.COM"), "%josé@x.com%");
    }

    #[test]
    fn fold_function_lowercases_unicode() {
        let conn = Connection::open_in_memory().expect("open in-memory db");
        register_functions(&conn).expect("register functions");

        let folded: String = conn
            .query_row("SELECT mailsift_fold('ÉLÉMENTS Été')", [], |row| row.get(0))
            .expect("fold text");
        assert_eq!(folded, "éléments été");

        let null: Option<String> = conn
            .query_row("SELECT mailsift_fold(NULL)", [], |row| row.get(0))
            .expect("fold null");
        assert!(null.is_none());

        let hit: bool = conn
            .query_row(
                "SELECT mailsift_fold('Réunion hebdo') LIKE ? ESCAPE '\\'",
                [like_pattern("RÉUNION")],
                |row| row.get(0),
            )
            .expect("like on folded text");
        assert!(hit);
    }

    #[test]
    fn owner_scope_leads_every_clause() {
        let clause = where_for("", &SearchOptions::default());
        assert_eq!(clause.clause, "m.user_id = ?");
        assert_eq!(clause.params, vec![Value::Text("user-1".to_string())]);
    }

    #[test]
    fn where_contains_expected_fragments() {
        let options = SearchOptions {
            account_ids: Some(vec!["acc-1".to_string(), "acc-2".to_string()]),
            is_starred: Some(true),
            ..SearchOptions::default()
        };
        let clause = where_for(
            "from:alice -subject:spam has:attachment larger:1M is:unread label:work in:inbox report",
            &options,
        );

        assert!(clause.clause.starts_with("m.user_id = ?"));
        assert!(clause.clause.contains("m.account_id IN (?, ?)"));
        assert!(clause
            .clause
            .contains("mailsift_fold(COALESCE(m.from_address, '')) LIKE ?"));
        assert!(clause
            .clause
            .contains("NOT (mailsift_fold(COALESCE(m.subject, '')) LIKE ?"));
        assert!(clause
            .clause
            .contains("EXISTS (SELECT 1 FROM attachments a WHERE a.message_id = m.id)"));
        assert!(clause.clause.contains("a.size_bytes > ?"));
        assert!(clause.clause.contains("m.is_read = ?"));
        assert!(clause.clause.contains("m.is_starred = ?"));
        assert!(clause.clause.contains("json_each(COALESCE(m.labels, '[]'))"));
        assert!(clause
            .clause
            .contains("mailsift_fold(COALESCE(m.folder, '')) IN (?)"));
        assert!(clause
            .clause
            .contains("mailsift_fold(COALESCE(m.body_html, '')) LIKE ?"));

        // user, 2 accounts, from, subject, is_read, folder, label, size,
        // 4 text fields, is_starred
        assert_eq!(clause.params.len(), 14);
        assert!(clause.params.contains(&Value::Integer(1024 * 1024)));
        assert!(clause.params.contains(&Value::Text("inbox".to_string())));
    }

    #[test]
    fn negated_has_attachment_uses_not_exists() {
        let clause = where_for("-has:attachment", &SearchOptions::default());
        assert!(clause.clause.contains("NOT EXISTS (SELECT 1 FROM attachments"));
    }

    #[test]
    fn date_bounds_bind_canonical_timestamps() {
        let clause = where_for("after:2024-01-01 before:2024-02-01", &SearchOptions::default());
        assert!(clause.clause.contains("(m.sent_at >= ? AND m.sent_at <= ?)"));
        assert!(clause
            .params
            .contains(&Value::Text("2024-01-01T00:00:00.000000000Z".to_string())));
        assert!(clause
            .params
            .contains(&Value::Text("2024-02-01T00:00:00.000000000Z".to_string())));
    }
}
