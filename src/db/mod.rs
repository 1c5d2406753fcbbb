use std::path::{Path, PathBuf};

use rusqlite::{params, params_from_iter, Connection};
use serde::Serialize;
use thiserror::Error;

use self::models::{format_timestamp, Account, Attachment, Message};
use crate::search::sql::{self, SqlWhereClause};

#[derive(Debug, Error)]
pub enum DbError {
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    #[error("json serialization: {0}")]
    Json(#[from] serde_json::Error),

    #[error("filesystem: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Config(String),
}

pub mod migrations;
pub mod models;
pub mod schema;

const MESSAGE_COLUMNS: &str = r#"
    m.id, m.user_id, m.account_id, m.thread_id, m.subject, m.from_address, m.from_name,
    m.to_addresses, m.cc_addresses, m.bcc_addresses, m.body_text, m.body_html,
    m.sent_at, m.is_read, m.is_starred, m.is_important, m.folder, m.labels
"#;

/// How often a value occurs across one user's messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValueCount {
    pub value: String,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct AccountMessageCount {
    pub account_id: String,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DatabaseStats {
    pub total_accounts: i64,
    pub total_messages: i64,
    pub total_attachments: i64,
    pub messages_by_account: Vec<AccountMessageCount>,
}

pub struct Database {
    conn: Connection,
    path: PathBuf,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self, DbError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.execute("PRAGMA foreign_keys = ON", [])?;
        sql::register_functions(&conn)?;

        let db = Self {
            conn,
            path: path.to_path_buf(),
        };
        db.run_migrations()?;
        Ok(db)
    }

    fn run_migrations(&self) -> Result<(), DbError> {
        migrations::migrate(&self.conn)
            .map_err(|e| DbError::Config(format!("migration failed: {e}")))
    }

    pub fn default_db_path() -> Result<PathBuf, DbError> {
        let home = dirs::home_dir()
            .ok_or_else(|| DbError::Config("failed to determine home directory".to_string()))?;
        Ok(home.join(".mailsift").join("mailsift.db"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn insert_account(&self, account: &Account) -> Result<(), DbError> {
        self.conn.execute(
            r#"
            INSERT INTO accounts (account_id, user_id, email_address, display_name)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(account_id) DO UPDATE SET
                user_id = excluded.user_id,
                email_address = excluded.email_address,
                display_name = excluded.display_name
            "#,
            params![
                account.account_id,
                account.user_id,
                account.email_address,
                account.display_name,
            ],
        )?;
        Ok(())
    }

    pub fn list_accounts(&self, user_id: &str) -> Result<Vec<Account>, DbError> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT account_id, user_id, email_address, display_name
            FROM accounts
            WHERE user_id = ?
            ORDER BY email_address ASC
            "#,
        )?;

        let accounts = stmt
            .query_map([user_id], Account::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(accounts)
    }

    /// Insert or replace a message together with its attachments. Either
    /// everything is written or nothing is.
    pub fn insert_message(&self, message: &Message) -> Result<(), DbError> {
        let to_addresses = serde_json::to_string(&message.to_addresses)?;
        let cc_addresses = serde_json::to_string(&message.cc_addresses)?;
        let bcc_addresses = serde_json::to_string(&message.bcc_addresses)?;
        let labels = serde_json::to_string(&message.labels)?;

        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            r#"
            INSERT OR REPLACE INTO messages (
                id, user_id, account_id, thread_id, subject, from_address, from_name,
                to_addresses, cc_addresses, bcc_addresses, body_text, body_html,
                sent_at, is_read, is_starred, is_important, folder, labels
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                message.id,
                message.user_id,
                message.account_id,
                message.thread_id,
                message.subject,
                message.from_address,
                message.from_name,
                to_addresses,
                cc_addresses,
                bcc_addresses,
                message.body_text,
                message.body_html,
                format_timestamp(&message.sent_at),
                message.is_read,
                message.is_starred,
                message.is_important,
                message.folder,
                labels,
            ],
        )?;

        tx.execute("DELETE FROM attachments WHERE message_id = ?", [&message.id])?;
        for attachment in &message.attachments {
            insert_attachment(&tx, &message.id, attachment)?;
        }

        tx.commit()?;
        Ok(())
    }

    pub fn get_message(&self, id: &str) -> Result<Option<Message>, DbError> {
        let sql = format!("SELECT {MESSAGE_COLUMNS} FROM messages m WHERE m.id = ?");
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query([id])?;
        let Some(row) = rows.next()? else {
            return Ok(None);
        };
        let mut message = Message::from_row(row)?;
        message.attachments = self.attachments_for(&message.id)?;
        Ok(Some(message))
    }

    fn attachments_for(&self, message_id: &str) -> Result<Vec<Attachment>, DbError> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, message_id, filename, content_type, size_bytes
            FROM attachments
            WHERE message_id = ?
            ORDER BY filename ASC, id ASC
            "#,
        )?;
        let attachments = stmt
            .query_map([message_id], Attachment::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(attachments)
    }

    /// One page of messages matching `filter`, newest first.
    pub fn find_messages(
        &self,
        filter: &SqlWhereClause,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Message>, DbError> {
        let sql = format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages m WHERE {} ORDER BY m.sent_at DESC, m.id ASC LIMIT ? OFFSET ?",
            filter.clause
        );
        let mut params_vec = filter.params.clone();
        params_vec.push(rusqlite::types::Value::Integer(limit as i64));
        params_vec.push(rusqlite::types::Value::Integer(offset as i64));

        let mut stmt = self.conn.prepare(&sql)?;
        let mut messages = stmt
            .query_map(params_from_iter(params_vec.iter()), Message::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        for message in &mut messages {
            message.attachments = self.attachments_for(&message.id)?;
        }
        Ok(messages)
    }

    /// Number of messages matching `filter`, ignoring pagination.
    pub fn count_messages(&self, filter: &SqlWhereClause) -> Result<u64, DbError> {
        let sql = format!("SELECT COUNT(*) FROM messages m WHERE {}", filter.clause);
        let count: i64 = self
            .conn
            .query_row(&sql, params_from_iter(filter.params.iter()), |row| {
                row.get(0)
            })?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    pub fn top_senders(&self, user_id: &str, limit: usize) -> Result<Vec<ValueCount>, DbError> {
        self.top_values(user_id, "from_address", limit)
    }

    pub fn top_subjects(&self, user_id: &str, limit: usize) -> Result<Vec<ValueCount>, DbError> {
        self.top_values(user_id, "subject", limit)
    }

    /// Most frequent non-empty values of `column` among a user's messages.
    fn top_values(
        &self,
        user_id: &str,
        column: &'static str,
        limit: usize,
    ) -> Result<Vec<ValueCount>, DbError> {
        let sql = format!(
            r#"
            SELECT {column} AS value, COUNT(*) AS count
            FROM messages
            WHERE user_id = ? AND {column} IS NOT NULL AND {column} != ''
            GROUP BY {column}
            ORDER BY count DESC, value ASC
            LIMIT ?
            "#
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let values = stmt
            .query_map(params![user_id, limit as i64], |row| {
                Ok(ValueCount {
                    value: row.get(0)?,
                    count: row.get(1)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(values)
    }

    pub fn get_stats(&self) -> Result<DatabaseStats, DbError> {
        let total_accounts: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM accounts", [], |row| row.get(0))?;
        let total_messages: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM messages", [], |row| row.get(0))?;
        let total_attachments: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM attachments", [], |row| row.get(0))?;

        let mut stmt = self.conn.prepare(
            "SELECT account_id, COUNT(*) AS count FROM messages GROUP BY account_id ORDER BY count DESC",
        )?;
        let messages_by_account = stmt
            .query_map([], |row| {
                Ok(AccountMessageCount {
                    account_id: row.get(0)?,
                    count: row.get(1)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(DatabaseStats {
            total_accounts,
            total_messages,
            total_attachments,
            messages_by_account,
        })
    }
}

fn insert_attachment(
    conn: &Connection,
    message_id: &str,
    attachment: &Attachment,
) -> Result<(), DbError> {
    let size = i64::try_from(attachment.size_bytes)
        .map_err(|_| DbError::Config(format!("attachment {} too large", attachment.id)))?;
    conn.execute(
        r#"
        INSERT OR REPLACE INTO attachments (id, message_id, filename, content_type, size_bytes)
        VALUES (?, ?, ?, ?, ?)
        "#,
        params![
            attachment.id,
            message_id,
            attachment.filename,
            attachment.content_type,
            size,
        ],
    )?;
    Ok(())
}
