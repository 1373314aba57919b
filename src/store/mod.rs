//! Conversation store backed by SQLite
//!
//! Owns sessions, chats, messages and uploaded files. Every operation opens
//! its own connection, so a [`ConversationStore`] can be shared freely
//! between threads; SQLite's locking plus `BEGIN IMMEDIATE` transactions
//! serialize writers.
//!
//! Message order within a chat is `(created_at, seq)`. `append_message`
//! assigns `created_at = max(now, chat.updated_at + 1µs)` inside the same
//! transaction that advances `chats.updated_at`, so timestamps within a chat
//! strictly increase in insertion order.

use crate::backend::Role;
use crate::error::{LaimError, Result};
use chrono::{DateTime, Duration, SecondsFormat, SubsecRound, Utc};
use directories::ProjectDirs;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use uuid::Uuid;

pub mod async_store;
pub mod types;

pub use async_store::AsyncStore;
pub use types::{Chat, ChatSummary, Message, Session, StoredFile};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS sessions (
    id TEXT PRIMARY KEY,
    created_at TEXT NOT NULL,
    last_seen_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS chats (
    id TEXT PRIMARY KEY,
    session_id TEXT NOT NULL REFERENCES sessions(id) ON DELETE CASCADE,
    title TEXT NOT NULL,
    model TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_chats_session ON chats(session_id, updated_at);

CREATE TABLE IF NOT EXISTS messages (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    id TEXT NOT NULL UNIQUE,
    chat_id TEXT NOT NULL REFERENCES chats(id) ON DELETE CASCADE,
    role TEXT NOT NULL CHECK (role IN ('user', 'assistant', 'system')),
    content TEXT NOT NULL,
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_messages_chat ON messages(chat_id, created_at, seq);

CREATE TABLE IF NOT EXISTS files (
    id TEXT PRIMARY KEY,
    session_id TEXT NOT NULL REFERENCES sessions(id) ON DELETE CASCADE,
    message_id TEXT REFERENCES messages(id) ON DELETE SET NULL,
    filename TEXT NOT NULL,
    mime_type TEXT NOT NULL,
    size INTEGER NOT NULL,
    data BLOB NOT NULL,
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_files_message ON files(message_id);
";

/// Attach a storage context to rusqlite failures
trait StorageContext<T> {
    fn storage(self, context: &str) -> Result<T>;
}

impl<T> StorageContext<T> for std::result::Result<T, rusqlite::Error> {
    fn storage(self, context: &str) -> Result<T> {
        self.map_err(|e| LaimError::Storage(format!("{}: {}", context, e)).into())
    }
}

fn format_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

fn ts_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn role_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Role> {
    let raw: String = row.get(idx)?;
    raw.parse::<Role>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn chat_from_row(row: &Row<'_>) -> rusqlite::Result<Chat> {
    Ok(Chat {
        id: row.get(0)?,
        session_id: row.get(1)?,
        title: row.get(2)?,
        model: row.get(3)?,
        created_at: ts_column(row, 4)?,
        updated_at: ts_column(row, 5)?,
    })
}

fn session_from_row(row: &Row<'_>) -> rusqlite::Result<Session> {
    Ok(Session {
        id: row.get(0)?,
        created_at: ts_column(row, 1)?,
        last_seen_at: ts_column(row, 2)?,
    })
}

fn file_from_row(row: &Row<'_>) -> rusqlite::Result<StoredFile> {
    let size: i64 = row.get(5)?;
    Ok(StoredFile {
        id: row.get(0)?,
        session_id: row.get(1)?,
        message_id: row.get(2)?,
        filename: row.get(3)?,
        mime_type: row.get(4)?,
        size: size as usize,
        created_at: ts_column(row, 6)?,
    })
}

const CHAT_COLUMNS: &str = "id, session_id, title, model, created_at, updated_at";

/// Storage backend for sessions, chats, messages and files
pub struct ConversationStore {
    db_path: PathBuf,
}

impl ConversationStore {
    /// Create a store in the user's data directory
    ///
    /// The database file is `history.db` under the platform data directory
    /// for `laim`.
    pub fn new() -> Result<Self> {
        let proj_dirs = ProjectDirs::from("org", "laim", "laim")
            .ok_or_else(|| LaimError::Storage("Could not determine data directory".into()))?;
        Self::new_with_path(proj_dirs.data_dir().join("history.db"))
    }

    /// Create a store at `db_path`, or in the data directory when `None`
    pub fn open_configured(db_path: Option<&Path>) -> Result<Self> {
        match db_path {
            Some(path) => Self::new_with_path(path),
            None => Self::new(),
        }
    }

    /// Create a store that uses the specified database path
    ///
    /// Parent directories are created as needed and the schema is applied.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use laim::store::ConversationStore;
    ///
    /// let store = ConversationStore::new_with_path("/tmp/laim_history.db").unwrap();
    /// ```
    pub fn new_with_path<P: Into<PathBuf>>(db_path: P) -> Result<Self> {
        let db_path = db_path.into();

        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    LaimError::Storage(format!(
                        "Failed to create parent directory for database: {}",
                        e
                    ))
                })?;
            }
        }

        let store = Self { db_path };
        store.init()?;
        tracing::info!("Conversation store at {}", store.db_path.display());
        Ok(store)
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn open(&self) -> Result<Connection> {
        let conn = Connection::open(&self.db_path).storage("Failed to open database")?;
        conn.busy_timeout(std::time::Duration::from_secs(5))
            .storage("Failed to set busy timeout")?;
        conn.pragma_update(None, "foreign_keys", "ON")
            .storage("Failed to enable foreign keys")?;
        Ok(conn)
    }

    fn init(&self) -> Result<()> {
        let conn = self.open()?;
        // WAL lets readers proceed while a turn is being appended.
        let _mode: String = conn
            .query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))
            .storage("Failed to set journal mode")?;
        conn.execute_batch(SCHEMA)
            .storage("Failed to create tables")?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Sessions
    // ------------------------------------------------------------------

    /// Issue a new session
    pub fn create_session(&self) -> Result<Session> {
        let conn = self.open()?;
        let ts = now();
        let session = Session {
            id: Uuid::new_v4().to_string(),
            created_at: ts,
            last_seen_at: ts,
        };
        conn.execute(
            "INSERT INTO sessions (id, created_at, last_seen_at) VALUES (?1, ?2, ?3)",
            params![session.id, format_ts(ts), format_ts(ts)],
        )
        .storage("Failed to insert session")?;
        tracing::debug!("Created session {}", session.id);
        Ok(session)
    }

    pub fn get_session(&self, id: &str) -> Result<Option<Session>> {
        let conn = self.open()?;
        conn.query_row(
            "SELECT id, created_at, last_seen_at FROM sessions WHERE id = ?1",
            params![id],
            session_from_row,
        )
        .optional()
        .storage("Failed to query session")
    }

    /// Refresh a session's last-seen timestamp
    ///
    /// # Errors
    ///
    /// `LaimError::NotFound` when the session was never issued
    pub fn touch_session(&self, id: &str) -> Result<Session> {
        let conn = self.open()?;
        let changed = conn
            .execute(
                "UPDATE sessions SET last_seen_at = ?1 WHERE id = ?2",
                params![format_ts(now()), id],
            )
            .storage("Failed to update session")?;
        if changed == 0 {
            return Err(LaimError::NotFound(format!("session {}", id)).into());
        }
        conn.query_row(
            "SELECT id, created_at, last_seen_at FROM sessions WHERE id = ?1",
            params![id],
            session_from_row,
        )
        .storage("Failed to query session")
    }

    // ------------------------------------------------------------------
    // Chats
    // ------------------------------------------------------------------

    /// Create an empty chat owned by `session_id`
    pub fn create_chat(&self, session_id: &str, title: &str, model: &str) -> Result<Chat> {
        let conn = self.open()?;

        let known: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM sessions WHERE id = ?1",
                params![session_id],
                |r| r.get(0),
            )
            .optional()
            .storage("Failed to query session")?;
        if known.is_none() {
            return Err(LaimError::NotFound(format!("session {}", session_id)).into());
        }

        let ts = now();
        let chat = Chat {
            id: Uuid::new_v4().to_string(),
            session_id: session_id.to_string(),
            title: title.to_string(),
            model: model.to_string(),
            created_at: ts,
            updated_at: ts,
        };
        conn.execute(
            "INSERT INTO chats (id, session_id, title, model, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                chat.id,
                chat.session_id,
                chat.title,
                chat.model,
                format_ts(ts),
                format_ts(ts)
            ],
        )
        .storage("Failed to insert chat")?;

        tracing::debug!("Created chat {} for session {}", chat.id, session_id);
        Ok(chat)
    }

    pub fn get_chat(&self, chat_id: &str) -> Result<Option<Chat>> {
        let conn = self.open()?;
        conn.query_row(
            &format!("SELECT {} FROM chats WHERE id = ?1", CHAT_COLUMNS),
            params![chat_id],
            chat_from_row,
        )
        .optional()
        .storage("Failed to query chat")
    }

    /// Chats of a session, most recently updated first
    pub fn list_chats(&self, session_id: &str) -> Result<Vec<ChatSummary>> {
        let conn = self.open()?;
        let mut stmt = conn
            .prepare(
                "SELECT c.id, c.session_id, c.title, c.model, c.created_at, c.updated_at,
                        (SELECT COUNT(*) FROM messages m WHERE m.chat_id = c.id)
                 FROM chats c
                 WHERE c.session_id = ?1
                 ORDER BY c.updated_at DESC, c.rowid DESC",
            )
            .storage("Failed to prepare statement")?;

        let rows = stmt
            .query_map(params![session_id], |row| {
                let count: i64 = row.get(6)?;
                Ok(ChatSummary {
                    chat: chat_from_row(row)?,
                    message_count: count as usize,
                })
            })
            .storage("Failed to query chats")?;

        rows.collect::<rusqlite::Result<Vec<_>>>()
            .storage("Failed to read chat row")
    }

    /// Change a chat's title; does not touch `updated_at`
    pub fn rename_chat(&self, chat_id: &str, title: &str) -> Result<Chat> {
        let conn = self.open()?;
        let changed = conn
            .execute(
                "UPDATE chats SET title = ?1 WHERE id = ?2",
                params![title, chat_id],
            )
            .storage("Failed to rename chat")?;
        if changed == 0 {
            return Err(LaimError::NotFound(format!("chat {}", chat_id)).into());
        }
        conn.query_row(
            &format!("SELECT {} FROM chats WHERE id = ?1", CHAT_COLUMNS),
            params![chat_id],
            chat_from_row,
        )
        .storage("Failed to query chat")
    }

    /// Delete a chat and its messages; attached files are detached
    ///
    /// Returns whether a chat was removed.
    pub fn delete_chat(&self, chat_id: &str) -> Result<bool> {
        let conn = self.open()?;
        let changed = conn
            .execute("DELETE FROM chats WHERE id = ?1", params![chat_id])
            .storage("Failed to delete chat")?;
        Ok(changed > 0)
    }

    // ------------------------------------------------------------------
    // Messages
    // ------------------------------------------------------------------

    /// Append a message to a chat and advance the chat's `updated_at`
    ///
    /// `file_refs` are ids of uploaded files; each must belong to the chat's
    /// session and not yet be attached to another message.
    ///
    /// # Errors
    ///
    /// - `LaimError::NotFound` if the chat does not exist
    /// - `LaimError::InvalidRequest` if a file reference is unusable
    /// - `LaimError::Storage` on database failure
    pub fn append_message(
        &self,
        chat_id: &str,
        role: Role,
        content: &str,
        file_refs: &[String],
    ) -> Result<Message> {
        let mut conn = self.open()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .storage("Failed to start transaction")?;

        let last: Option<String> = tx
            .query_row(
                "SELECT updated_at FROM chats WHERE id = ?1",
                params![chat_id],
                |r| r.get(0),
            )
            .optional()
            .storage("Failed to query chat")?;
        let last = last.ok_or_else(|| LaimError::NotFound(format!("chat {}", chat_id)))?;
        let last = DateTime::parse_from_rfc3339(&last)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| LaimError::Storage(format!("Corrupt chat timestamp: {}", e)))?;

        let current = now();
        let created_at = if current > last {
            current
        } else {
            last + Duration::microseconds(1)
        };

        let message = Message {
            id: Uuid::new_v4().to_string(),
            chat_id: chat_id.to_string(),
            role,
            content: content.to_string(),
            files: file_refs.to_vec(),
            created_at,
        };

        tx.execute(
            "INSERT INTO messages (id, chat_id, role, content, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                message.id,
                chat_id,
                role.as_str(),
                content,
                format_ts(created_at)
            ],
        )
        .storage("Failed to insert message")?;

        tx.execute(
            "UPDATE chats SET updated_at = ?1 WHERE id = ?2",
            params![format_ts(created_at), chat_id],
        )
        .storage("Failed to update chat")?;

        for file_id in file_refs {
            let linked = tx
                .execute(
                    "UPDATE files SET message_id = ?1
                     WHERE id = ?2
                       AND message_id IS NULL
                       AND session_id = (SELECT session_id FROM chats WHERE id = ?3)",
                    params![message.id, file_id, chat_id],
                )
                .storage("Failed to link file")?;
            if linked == 0 {
                return Err(LaimError::InvalidRequest(format!(
                    "file {} is unknown, already attached, or owned by another session",
                    file_id
                ))
                .into());
            }
        }

        tx.commit().storage("Failed to commit transaction")?;
        Ok(message)
    }

    /// Messages of a chat, oldest first
    pub fn list_messages(&self, chat_id: &str) -> Result<Vec<Message>> {
        let conn = self.open()?;

        let mut files: HashMap<String, Vec<String>> = HashMap::new();
        {
            let mut stmt = conn
                .prepare(
                    "SELECT f.message_id, f.id FROM files f
                     JOIN messages m ON m.id = f.message_id
                     WHERE m.chat_id = ?1
                     ORDER BY f.created_at, f.rowid",
                )
                .storage("Failed to prepare statement")?;
            let rows = stmt
                .query_map(params![chat_id], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
                })
                .storage("Failed to query files")?;
            for row in rows {
                let (message_id, file_id) = row.storage("Failed to read file row")?;
                files.entry(message_id).or_default().push(file_id);
            }
        }

        let mut stmt = conn
            .prepare(
                "SELECT id, chat_id, role, content, created_at FROM messages
                 WHERE chat_id = ?1
                 ORDER BY created_at ASC, seq ASC",
            )
            .storage("Failed to prepare statement")?;
        let rows = stmt
            .query_map(params![chat_id], |row| {
                Ok(Message {
                    id: row.get(0)?,
                    chat_id: row.get(1)?,
                    role: role_column(row, 2)?,
                    content: row.get(3)?,
                    files: Vec::new(),
                    created_at: ts_column(row, 4)?,
                })
            })
            .storage("Failed to query messages")?;

        let mut messages = rows
            .collect::<rusqlite::Result<Vec<_>>>()
            .storage("Failed to read message row")?;
        for message in &mut messages {
            if let Some(ids) = files.remove(&message.id) {
                message.files = ids;
            }
        }
        Ok(messages)
    }

    // ------------------------------------------------------------------
    // Files
    // ------------------------------------------------------------------

    /// Store an uploaded blob for later attachment
    pub fn store_file(
        &self,
        session_id: &str,
        filename: &str,
        mime_type: &str,
        data: &[u8],
    ) -> Result<StoredFile> {
        let conn = self.open()?;
        let file = StoredFile {
            id: Uuid::new_v4().to_string(),
            session_id: session_id.to_string(),
            message_id: None,
            filename: filename.to_string(),
            mime_type: mime_type.to_string(),
            size: data.len(),
            created_at: now(),
        };
        conn.execute(
            "INSERT INTO files (id, session_id, message_id, filename, mime_type, size, data, created_at)
             VALUES (?1, ?2, NULL, ?3, ?4, ?5, ?6, ?7)",
            params![
                file.id,
                session_id,
                filename,
                mime_type,
                data.len() as i64,
                data,
                format_ts(file.created_at)
            ],
        )
        .storage("Failed to insert file")?;
        Ok(file)
    }

    pub fn get_file(&self, file_id: &str) -> Result<Option<StoredFile>> {
        let conn = self.open()?;
        conn.query_row(
            "SELECT id, session_id, message_id, filename, mime_type, size, created_at
             FROM files WHERE id = ?1",
            params![file_id],
            file_from_row,
        )
        .optional()
        .storage("Failed to query file")
    }
}
