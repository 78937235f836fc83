//! SQLite storage for institutional documents and chat sessions.
//!
//! The store is the sole source of truth the retrieval pipeline reads from.
//! It performs no indexing of its own: ranking happens in `uema-rag`.

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use uema_core::{ChatRole, ChatTurn, Document, UemaError, UserContext};

/// Store statistics.
///
/// # Examples
///
/// ```
/// use uema_store::StoreStats;
///
/// let stats = StoreStats {
///     total_documents: 3,
///     published_documents: 2,
///     total_sessions: 1,
///     total_messages: 4,
///     total_size_bytes: 2048,
/// };
/// assert_eq!(stats.total_documents - stats.published_documents, 1);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreStats {
    pub total_documents: usize,
    pub published_documents: usize,
    pub total_sessions: usize,
    pub total_messages: usize,
    /// Sum of the `size` field over all documents.
    pub total_size_bytes: u64,
}

/// A persisted chat session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub id: i64,
    pub owner: String,
    pub created_at: DateTime<Utc>,
    pub message_count: usize,
}

/// SQLite-backed document and chat session store.
///
/// # Examples
///
/// ```
/// use uema_core::{Document, Sector};
/// use uema_store::DocumentStore;
///
/// let store = DocumentStore::in_memory().unwrap();
/// store.insert_document(&Document::new("d1", "Edital 01/2025", Sector::Prog)).unwrap();
/// assert_eq!(store.list_documents().unwrap().len(), 1);
/// ```
pub struct DocumentStore {
    conn: Connection,
}

impl DocumentStore {
    /// Open or create a store database at the given path.
    ///
    /// Creates the parent directory and tables if they don't exist.
    ///
    /// # Errors
    ///
    /// Returns [`UemaError::Database`] if the database cannot be opened.
    pub fn open(path: &Path) -> Result<Self, UemaError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    UemaError::Database(format!("failed to create store directory: {e}"))
                })?;
            }
        }
        let conn = Connection::open(path)
            .map_err(|e| UemaError::Database(format!("failed to open database: {e}")))?;

        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    /// Create an in-memory store (for tests and demos).
    ///
    /// # Errors
    ///
    /// Returns [`UemaError::Database`] if schema creation fails.
    pub fn in_memory() -> Result<Self, UemaError> {
        let conn = Connection::open_in_memory().map_err(|e| {
            UemaError::Database(format!("failed to create in-memory database: {e}"))
        })?;

        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<(), UemaError> {
        self.conn
            .execute_batch(
                "
                PRAGMA foreign_keys = ON;

                CREATE TABLE IF NOT EXISTS documents (
                    id TEXT PRIMARY KEY,
                    title TEXT NOT NULL,
                    doc_type TEXT NOT NULL,
                    sector TEXT NOT NULL,
                    status TEXT NOT NULL,
                    tags TEXT NOT NULL,
                    summary TEXT,
                    content TEXT,
                    size INTEGER NOT NULL,
                    author TEXT NOT NULL,
                    created_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS chat_sessions (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    owner TEXT NOT NULL,
                    created_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS chat_messages (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    session_id INTEGER NOT NULL,
                    role TEXT NOT NULL,
                    content TEXT NOT NULL,
                    created_at TEXT NOT NULL,
                    FOREIGN KEY (session_id) REFERENCES chat_sessions(id) ON DELETE CASCADE
                );

                CREATE INDEX IF NOT EXISTS chat_messages_session
                    ON chat_messages(session_id, id);
                ",
            )
            .map_err(|e| UemaError::Database(format!("failed to create schema: {e}")))?;

        Ok(())
    }

    /// Insert a new document.
    ///
    /// # Errors
    ///
    /// Returns [`UemaError::Database`] if a document with the same id exists.
    pub fn insert_document(&self, doc: &Document) -> Result<(), UemaError> {
        let tags = serde_json::to_string(&doc.tags)?;
        let size = stored_size(doc)?;
        self.conn
            .execute(
                "INSERT INTO documents
                    (id, title, doc_type, sector, status, tags, summary, content, size, author, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    doc.id,
                    doc.title,
                    doc.doc_type.to_string(),
                    doc.sector.code(),
                    doc.status.to_string(),
                    tags,
                    doc.summary,
                    doc.content,
                    size,
                    doc.author,
                    doc.created_at.to_rfc3339(),
                ],
            )
            .map_err(|e| UemaError::Database(format!("failed to insert document {}: {e}", doc.id)))?;

        Ok(())
    }

    /// Replace every field of an existing document except its creation date.
    ///
    /// # Errors
    ///
    /// Returns [`UemaError::NotFound`] if no document has `doc.id`.
    pub fn update_document(&self, doc: &Document) -> Result<(), UemaError> {
        let tags = serde_json::to_string(&doc.tags)?;
        let size = stored_size(doc)?;
        let changed = self
            .conn
            .execute(
                "UPDATE documents
                 SET title = ?2, doc_type = ?3, sector = ?4, status = ?5, tags = ?6,
                     summary = ?7, content = ?8, size = ?9, author = ?10
                 WHERE id = ?1",
                params![
                    doc.id,
                    doc.title,
                    doc.doc_type.to_string(),
                    doc.sector.code(),
                    doc.status.to_string(),
                    tags,
                    doc.summary,
                    doc.content,
                    size,
                    doc.author,
                ],
            )
            .map_err(|e| UemaError::Database(format!("failed to update document: {e}")))?;

        if changed == 0 {
            return Err(UemaError::NotFound(format!("document {}", doc.id)));
        }
        Ok(())
    }

    /// Delete a document by id.
    ///
    /// # Errors
    ///
    /// Returns [`UemaError::NotFound`] if the id does not exist.
    pub fn delete_document(&self, id: &str) -> Result<(), UemaError> {
        let changed = self
            .conn
            .execute("DELETE FROM documents WHERE id = ?1", params![id])
            .map_err(|e| UemaError::Database(format!("failed to delete document: {e}")))?;

        if changed == 0 {
            return Err(UemaError::NotFound(format!("document {id}")));
        }
        Ok(())
    }

    /// Fetch a single document.
    ///
    /// # Errors
    ///
    /// Returns [`UemaError::Database`] on query failure or a corrupt row.
    pub fn get_document(&self, id: &str) -> Result<Option<Document>, UemaError> {
        fetch_document(&self.conn, id)
    }

    /// List every document, newest first (ties broken by id).
    ///
    /// # Errors
    ///
    /// Returns [`UemaError::Database`] on query failure or a corrupt row.
    pub fn list_documents(&self) -> Result<Vec<Document>, UemaError> {
        let mut stmt = self
            .conn
            .prepare(&format!(
                "SELECT {DOCUMENT_COLUMNS} FROM documents ORDER BY created_at DESC, id ASC"
            ))
            .map_err(|e| UemaError::Database(format!("failed to prepare query: {e}")))?;

        let rows = stmt
            .query_map([], RawDocument::from_row)
            .map_err(|e| UemaError::Database(format!("failed to query documents: {e}")))?;

        let mut docs = Vec::new();
        for row in rows {
            let raw = row.map_err(|e| UemaError::Database(format!("failed to read row: {e}")))?;
            docs.push(raw.into_document()?);
        }

        Ok(docs)
    }

    /// Import a JSON array of documents on behalf of `user`.
    ///
    /// Parses the array, then behaves like [`DocumentStore::import_documents`].
    ///
    /// # Errors
    ///
    /// Returns [`UemaError::Serialization`] if the JSON is not an array of
    /// documents, plus every error of [`DocumentStore::import_documents`].
    pub fn import_json(&mut self, json: &str, user: &UserContext) -> Result<usize, UemaError> {
        let docs: Vec<Document> = serde_json::from_str(json)?;
        self.import_documents(&docs, user)
    }

    /// Write `docs` on behalf of `user`, replacing any with the same id.
    ///
    /// `user` must be able to edit every incoming document and every stored
    /// document it replaces. Runs in a single transaction: one refusal or
    /// failure writes nothing. Returns the number of documents written.
    ///
    /// # Errors
    ///
    /// - [`UemaError::PermissionDenied`] if `user` may not write one of the
    ///   documents or may not edit the one it would replace.
    /// - [`UemaError::Database`] if the write fails or a size does not fit.
    ///
    /// # Examples
    ///
    /// ```
    /// use uema_core::{Document, Sector, UemaError, UserContext, UserRole};
    /// use uema_store::DocumentStore;
    ///
    /// let mut store = DocumentStore::in_memory().unwrap();
    /// let admin = UserContext::new("admin", UserRole::Admin);
    /// let doc = Document::new("d1", "Edital 01/2025", Sector::Prog);
    /// assert_eq!(store.import_documents(&[doc.clone()], &admin).unwrap(), 1);
    ///
    /// let viewer = UserContext::new("bruno", UserRole::Viewer);
    /// let err = store.import_documents(&[doc], &viewer).unwrap_err();
    /// assert!(matches!(err, UemaError::PermissionDenied(_)));
    /// ```
    pub fn import_documents(
        &mut self,
        docs: &[Document],
        user: &UserContext,
    ) -> Result<usize, UemaError> {
        let tx = self
            .conn
            .transaction()
            .map_err(|e| UemaError::Database(format!("failed to begin transaction: {e}")))?;

        for doc in docs {
            if !user.can_edit(doc) {
                return Err(import_denied(user, doc));
            }
            if let Some(existing) = fetch_document(&tx, &doc.id)? {
                if !user.can_edit(&existing) {
                    return Err(import_denied(user, &existing));
                }
            }

            let tags = serde_json::to_string(&doc.tags)?;
            tx.execute(
                "INSERT OR REPLACE INTO documents
                    (id, title, doc_type, sector, status, tags, summary, content, size, author, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    doc.id,
                    doc.title,
                    doc.doc_type.to_string(),
                    doc.sector.code(),
                    doc.status.to_string(),
                    tags,
                    doc.summary,
                    doc.content,
                    stored_size(doc)?,
                    doc.author,
                    doc.created_at.to_rfc3339(),
                ],
            )
            .map_err(|e| UemaError::Database(format!("failed to import document {}: {e}", doc.id)))?;
        }

        tx.commit()
            .map_err(|e| UemaError::Database(format!("failed to commit import: {e}")))?;

        tracing::info!(count = docs.len(), user = %user.name, "imported documents");
        Ok(docs.len())
    }

    /// Owner of a chat session, or `None` if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`UemaError::Database`] on query failure.
    pub fn session_owner(&self, session_id: i64) -> Result<Option<String>, UemaError> {
        self.conn
            .query_row(
                "SELECT owner FROM chat_sessions WHERE id = ?1",
                params![session_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| UemaError::Database(format!("failed to look up session: {e}")))
    }

    /// Start a new chat session owned by `owner`.
    ///
    /// # Errors
    ///
    /// Returns [`UemaError::Database`] on insert failure.
    pub fn create_session(&self, owner: &str) -> Result<i64, UemaError> {
        self.conn
            .execute(
                "INSERT INTO chat_sessions (owner, created_at) VALUES (?1, ?2)",
                params![owner, Utc::now().to_rfc3339()],
            )
            .map_err(|e| UemaError::Database(format!("failed to create session: {e}")))?;

        Ok(self.conn.last_insert_rowid())
    }

    /// Append a message to a session.
    ///
    /// # Errors
    ///
    /// Returns [`UemaError::NotFound`] if the session does not exist.
    pub fn append_message(
        &self,
        session_id: i64,
        role: ChatRole,
        content: &str,
    ) -> Result<(), UemaError> {
        if !self.session_exists(session_id)? {
            return Err(UemaError::NotFound(format!("chat session {session_id}")));
        }

        self.conn
            .execute(
                "INSERT INTO chat_messages (session_id, role, content, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![session_id, role.to_string(), content, Utc::now().to_rfc3339()],
            )
            .map_err(|e| UemaError::Database(format!("failed to append message: {e}")))?;

        Ok(())
    }

    /// Append a question and its answer to a session as one write.
    ///
    /// Either both messages are stored or neither is.
    ///
    /// # Errors
    ///
    /// Returns [`UemaError::NotFound`] if the session does not exist, or
    /// [`UemaError::Database`] if either insert fails.
    pub fn append_exchange(
        &self,
        session_id: i64,
        question: &str,
        answer: &str,
    ) -> Result<(), UemaError> {
        if !self.session_exists(session_id)? {
            return Err(UemaError::NotFound(format!("chat session {session_id}")));
        }

        let tx = self
            .conn
            .unchecked_transaction()
            .map_err(|e| UemaError::Database(format!("failed to begin transaction: {e}")))?;

        let now = Utc::now().to_rfc3339();
        for (role, content) in [(ChatRole::User, question), (ChatRole::Assistant, answer)] {
            tx.execute(
                "INSERT INTO chat_messages (session_id, role, content, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![session_id, role.to_string(), content, now],
            )
            .map_err(|e| UemaError::Database(format!("failed to append message: {e}")))?;
        }

        tx.commit()
            .map_err(|e| UemaError::Database(format!("failed to commit exchange: {e}")))
    }

    /// The last `limit` messages of a session, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`UemaError::NotFound`] if the session does not exist.
    pub fn history(&self, session_id: i64, limit: usize) -> Result<Vec<ChatTurn>, UemaError> {
        if !self.session_exists(session_id)? {
            return Err(UemaError::NotFound(format!("chat session {session_id}")));
        }

        let mut stmt = self
            .conn
            .prepare(
                "SELECT role, content FROM chat_messages
                 WHERE session_id = ?1 ORDER BY id DESC LIMIT ?2",
            )
            .map_err(|e| UemaError::Database(format!("failed to prepare query: {e}")))?;

        let rows = stmt
            .query_map(params![session_id, limit as i64], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })
            .map_err(|e| UemaError::Database(format!("failed to query messages: {e}")))?;

        let mut turns = Vec::new();
        for row in rows {
            let (role, content) =
                row.map_err(|e| UemaError::Database(format!("failed to read row: {e}")))?;
            let role = role.parse::<ChatRole>().map_err(UemaError::Database)?;
            turns.push(ChatTurn { role, content });
        }
        turns.reverse();

        Ok(turns)
    }

    /// Sessions owned by `owner`, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`UemaError::Database`] on query failure.
    pub fn list_sessions(&self, owner: &str) -> Result<Vec<SessionInfo>, UemaError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT s.id, s.owner, s.created_at, COUNT(m.id)
                 FROM chat_sessions s
                 LEFT JOIN chat_messages m ON m.session_id = s.id
                 WHERE s.owner = ?1
                 GROUP BY s.id
                 ORDER BY s.id DESC",
            )
            .map_err(|e| UemaError::Database(format!("failed to prepare query: {e}")))?;

        let rows = stmt
            .query_map(params![owner], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, i64>(3)?,
                ))
            })
            .map_err(|e| UemaError::Database(format!("failed to query sessions: {e}")))?;

        let mut sessions = Vec::new();
        for row in rows {
            let (id, owner, created_at, count) =
                row.map_err(|e| UemaError::Database(format!("failed to read row: {e}")))?;
            sessions.push(SessionInfo {
                id,
                owner,
                created_at: parse_timestamp(&created_at)?,
                message_count: count as usize,
            });
        }

        Ok(sessions)
    }

    /// Get store statistics.
    ///
    /// # Errors
    ///
    /// Returns [`UemaError::Database`] on query failure.
    ///
    /// # Examples
    ///
    /// ```
    /// use uema_store::DocumentStore;
    ///
    /// let store = DocumentStore::in_memory().unwrap();
    /// let stats = store.stats().unwrap();
    /// assert_eq!(stats.total_documents, 0);
    /// assert_eq!(stats.total_sessions, 0);
    /// ```
    pub fn stats(&self) -> Result<StoreStats, UemaError> {
        let count = |sql: &str| -> Result<i64, UemaError> {
            self.conn
                .query_row(sql, [], |row| row.get(0))
                .map_err(|e| UemaError::Database(format!("failed to compute stats: {e}")))
        };

        Ok(StoreStats {
            total_documents: count("SELECT COUNT(*) FROM documents")? as usize,
            published_documents: count(
                "SELECT COUNT(*) FROM documents WHERE status = 'published'",
            )? as usize,
            total_sessions: count("SELECT COUNT(*) FROM chat_sessions")? as usize,
            total_messages: count("SELECT COUNT(*) FROM chat_messages")? as usize,
            total_size_bytes: count("SELECT COALESCE(SUM(size), 0) FROM documents")? as u64,
        })
    }

    fn session_exists(&self, session_id: i64) -> Result<bool, UemaError> {
        let count: i64 = self
            .conn
            .query_row(
                "SELECT COUNT(*) FROM chat_sessions WHERE id = ?1",
                params![session_id],
                |row| row.get(0),
            )
            .map_err(|e| UemaError::Database(format!("failed to check session: {e}")))?;

        Ok(count > 0)
    }
}

const DOCUMENT_COLUMNS: &str =
    "id, title, doc_type, sector, status, tags, summary, content, size, author, created_at";

fn fetch_document(conn: &Connection, id: &str) -> Result<Option<Document>, UemaError> {
    let raw = conn
        .query_row(
            &format!("SELECT {DOCUMENT_COLUMNS} FROM documents WHERE id = ?1"),
            params![id],
            RawDocument::from_row,
        )
        .optional()
        .map_err(|e| UemaError::Database(format!("failed to get document: {e}")))?;

    raw.map(RawDocument::into_document).transpose()
}

/// SQLite integers are signed; sizes past `i64::MAX` are refused.
fn stored_size(doc: &Document) -> Result<i64, UemaError> {
    i64::try_from(doc.size).map_err(|_| {
        UemaError::Database(format!("size {} of document {} is too large", doc.size, doc.id))
    })
}

fn import_denied(user: &UserContext, doc: &Document) -> UemaError {
    UemaError::PermissionDenied(format!(
        "{} ({}) may not write document '{}' in sector {}",
        user.name, user.role, doc.id, doc.sector
    ))
}

/// Row as stored; enum and timestamp columns are still text.
struct RawDocument {
    id: String,
    title: String,
    doc_type: String,
    sector: String,
    status: String,
    tags: String,
    summary: Option<String>,
    content: Option<String>,
    size: i64,
    author: String,
    created_at: String,
}

impl RawDocument {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            title: row.get(1)?,
            doc_type: row.get(2)?,
            sector: row.get(3)?,
            status: row.get(4)?,
            tags: row.get(5)?,
            summary: row.get(6)?,
            content: row.get(7)?,
            size: row.get(8)?,
            author: row.get(9)?,
            created_at: row.get(10)?,
        })
    }

    fn into_document(self) -> Result<Document, UemaError> {
        let corrupt = |field: &str, e: String| {
            UemaError::Database(format!("corrupt {field} in document {}: {e}", self.id))
        };

        Ok(Document {
            doc_type: self.doc_type.parse().map_err(|e| corrupt("type", e))?,
            sector: self.sector.parse().map_err(|e| corrupt("sector", e))?,
            status: self.status.parse().map_err(|e| corrupt("status", e))?,
            tags: serde_json::from_str(&self.tags).map_err(|e| corrupt("tags", e.to_string()))?,
            created_at: parse_timestamp(&self.created_at)?,
            size: u64::try_from(self.size).map_err(|e| corrupt("size", e.to_string()))?,
            summary: self.summary,
            content: self.content,
            author: self.author,
            title: self.title,
            id: self.id,
        })
    }
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, UemaError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| UemaError::Database(format!("invalid timestamp {value:?}: {e}")))
}
