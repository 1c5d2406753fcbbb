use anyhow::Result;
use rusqlite::Connection;

pub fn create_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS accounts (
            account_id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            email_address TEXT NOT NULL,
            display_name TEXT
        );

        CREATE TABLE IF NOT EXISTS messages (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            account_id TEXT NOT NULL REFERENCES accounts(account_id) ON DELETE CASCADE,
            thread_id TEXT,
            subject TEXT,
            from_address TEXT,
            from_name TEXT,
            to_addresses TEXT,
            cc_addresses TEXT,
            bcc_addresses TEXT,
            body_text TEXT,
            body_html TEXT,
            sent_at TEXT NOT NULL,
            is_read BOOLEAN NOT NULL DEFAULT false,
            is_starred BOOLEAN NOT NULL DEFAULT false,
            is_important BOOLEAN NOT NULL DEFAULT false,
            folder TEXT,
            labels TEXT
        );

        CREATE TABLE IF NOT EXISTS attachments (
            id TEXT PRIMARY KEY,
            message_id TEXT NOT NULL REFERENCES messages(id) ON DELETE CASCADE,
            filename TEXT NOT NULL,
            content_type TEXT,
            size_bytes INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS sync_state (
            key TEXT PRIMARY KEY,
            value TEXT,
            updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now'))
        );

        CREATE INDEX IF NOT EXISTS idx_accounts_user_id ON accounts(user_id);
        CREATE INDEX IF NOT EXISTS idx_messages_user_sent ON messages(user_id, sent_at DESC);
        CREATE INDEX IF NOT EXISTS idx_messages_account_id ON messages(account_id);
        CREATE INDEX IF NOT EXISTS idx_messages_from_address ON messages(from_address);
        CREATE INDEX IF NOT EXISTS idx_attachments_message_id ON attachments(message_id);
        "#,
    )?;

    Ok(())
}
