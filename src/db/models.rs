use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Result as SqlResult, Row};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Account {
    pub account_id: String,
    pub user_id: String,
    pub email_address: String,
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Attachment {
    pub id: String,
    pub message_id: String,
    pub filename: String,
    pub content_type: Option<String>,
    pub size_bytes: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    pub id: String,
    pub user_id: String,
    pub account_id: String,
    pub thread_id: Option<String>,
    pub subject: Option<String>,
    pub from_address: Option<String>,
    pub from_name: Option<String>,
    pub to_addresses: Vec<String>,
    pub cc_addresses: Vec<String>,
    pub bcc_addresses: Vec<String>,
    pub body_text: Option<String>,
    pub body_html: Option<String>,
    pub sent_at: DateTime<Utc>,
    pub is_read: bool,
    pub is_starred: bool,
    pub is_important: bool,
    pub folder: Option<String>,
    pub labels: Vec<String>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

/// Canonical on-disk timestamp form. Every stored and compared timestamp
/// goes through this so lexical order in SQLite equals chronological order.
/// Fixed nanosecond width keeps full precision and the ordering.
pub fn format_timestamp(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_json_array(raw: Option<String>) -> Vec<String> {
    raw.and_then(|s| serde_json::from_str::<Vec<String>>(&s).ok())
        .unwrap_or_default()
}

fn parse_timestamp(raw: String) -> SqlResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&raw)
        .map(|value| value.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                raw.len(),
                rusqlite::types::Type::Text,
                Box::new(e),
            )
        })
}

impl Account {
    pub fn from_row(row: &Row<'_>) -> SqlResult<Self> {
        Ok(Self {
            account_id: row.get("account_id")?,
            user_id: row.get("user_id")?,
            email_address: row.get("email_address")?,
            display_name: row.get("display_name")?,
        })
    }
}

impl Attachment {
    pub fn from_row(row: &Row<'_>) -> SqlResult<Self> {
        let size: i64 = row.get("size_bytes")?;
        Ok(Self {
            id: row.get("id")?,
            message_id: row.get("message_id")?,
            filename: row.get("filename")?,
            content_type: row.get("content_type")?,
            size_bytes: u64::try_from(size).unwrap_or(0),
        })
    }
}

impl Message {
    /// Builds a message from a row; attachments are loaded separately.
    pub fn from_row(row: &Row<'_>) -> SqlResult<Self> {
        Ok(Self {
            id: row.get("id")?,
            user_id: row.get("user_id")?,
            account_id: row.get("account_id")?,
            thread_id: row.get("thread_id")?,
            subject: row.get("subject")?,
            from_address: row.get("from_address")?,
            from_name: row.get("from_name")?,
            to_addresses: parse_json_array(row.get("to_addresses")?),
            cc_addresses: parse_json_array(row.get("cc_addresses")?),
            bcc_addresses: parse_json_array(row.get("bcc_addresses")?),
            body_text: row.get("body_text")?,
            body_html: row.get("body_html")?,
            sent_at: parse_timestamp(row.get("sent_at")?)?,
            is_read: row.get("is_read")?,
            is_starred: row.get("is_starred")?,
            is_important: row.get("is_important")?,
            folder: row.get("folder")?,
            labels: parse_json_array(row.get("labels")?),
            attachments: Vec::new(),
        })
    }

    pub fn has_attachments(&self) -> bool {
        !self.attachments.is_empty()
    }
}
