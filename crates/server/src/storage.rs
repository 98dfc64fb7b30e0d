//! SQLite mirror store.
//!
//! Holds identities, mirrored sessions/messages, and pending OAuth states.
//! The chat backend stays the system of record for sessions and messages —
//! everything here is rebuildable by replaying backend responses.
//!
//! The connection lives behind a mutex; guards must be scoped so they are
//! dropped before any `.await`.

use anyhow::{Context, Result};
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use chatfront_api::db::{self as dbq, migrations::MIGRATIONS};
use chatfront_api::{ConversationHistory, HistoryMessage, Identity, MessageRole};

/// SQLite datetime format used throughout the store.
const DATETIME_FMT: &str = "%Y-%m-%d %H:%M:%S";

/// How long a pending OAuth state stays valid.
const OAUTH_STATE_TTL_MINUTES: i64 = 10;

/// Shared database state.
#[derive(Clone)]
pub struct Db {
    conn: Arc<Mutex<Connection>>,
}

impl Db {
    pub fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().expect("database mutex poisoned")
    }
}

/// Initialize the database: open connection, enable WAL, run migrations.
pub fn init_db(data_dir: &Path) -> Result<Db> {
    std::fs::create_dir_all(data_dir)?;
    let db_path = data_dir.join("chatfront.db");
    let conn = Connection::open(&db_path).context("opening SQLite database")?;

    // WAL keeps concurrent readers cheap while one writer syncs the mirror
    conn.execute_batch("PRAGMA journal_mode=WAL;")?;
    conn.execute_batch("PRAGMA foreign_keys=ON;")?;

    run_migrations(&conn)?;

    Ok(Db {
        conn: Arc::new(Mutex::new(conn)),
    })
}

fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS _migrations (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )?;

    for &(name, sql) in MIGRATIONS {
        let already_applied: bool = conn
            .query_row(
                "SELECT COUNT(*) > 0 FROM _migrations WHERE name = ?1",
                [name],
                |row| row.get(0),
            )
            .unwrap_or(false);

        if !already_applied {
            conn.execute_batch(sql)
                .with_context(|| format!("running migration {name}"))?;
            conn.execute("INSERT INTO _migrations (name) VALUES (?1)", [name])?;
            tracing::info!("Applied migration: {name}");
        }
    }

    Ok(())
}

// ── sea-query bridge ────────────────────────────────────────────────────────

fn bind_values(values: sea_query::Values) -> Vec<rusqlite::types::Value> {
    use rusqlite::types::Value as Sql;
    use sea_query::Value as Sq;

    values
        .0
        .into_iter()
        .map(|v| match v {
            Sq::Bool(Some(b)) => Sql::Integer(b as i64),
            Sq::BigInt(Some(i)) => Sql::Integer(i),
            Sq::Int(Some(i)) => Sql::Integer(i as i64),
            Sq::Double(Some(f)) => Sql::Real(f),
            Sq::String(Some(s)) => Sql::Text(*s),
            Sq::Bytes(Some(b)) => Sql::Blob(*b),
            _ => Sql::Null,
        })
        .collect()
}

/// Execute a built statement.
pub fn sq_execute(conn: &Connection, built: dbq::Built) -> rusqlite::Result<usize> {
    let (sql, values) = built;
    conn.execute(&sql, rusqlite::params_from_iter(bind_values(values)))
}

/// Run a built query expected to return one row.
pub fn sq_query_row<T, F>(conn: &Connection, built: dbq::Built, f: F) -> rusqlite::Result<T>
where
    F: FnOnce(&rusqlite::Row<'_>) -> rusqlite::Result<T>,
{
    let (sql, values) = built;
    conn.query_row(&sql, rusqlite::params_from_iter(bind_values(values)), f)
}

/// Run a built query and collect all rows.
pub fn sq_query_map<T, F>(conn: &Connection, built: dbq::Built, f: F) -> rusqlite::Result<Vec<T>>
where
    F: FnMut(&rusqlite::Row<'_>) -> rusqlite::Result<T>,
{
    let (sql, values) = built;
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(rusqlite::params_from_iter(bind_values(values)), f)?;
    rows.collect()
}

fn now_sqlite() -> String {
    chrono::Utc::now().format(DATETIME_FMT).to_string()
}

// ── Identities ──────────────────────────────────────────────────────────────

/// Upsert an identity after a successful login; refreshes `last_login`.
pub fn upsert_identity(
    db: &Db,
    email: &str,
    display_name: Option<&str>,
    picture_url: Option<&str>,
) -> rusqlite::Result<()> {
    let conn = db.conn();
    sq_execute(
        &conn,
        dbq::identities::upsert(email, display_name, picture_url, &now_sqlite()),
    )?;
    Ok(())
}

/// Look up an identity by email. `Ok(None)` when no row exists.
pub fn find_identity(db: &Db, email: &str) -> rusqlite::Result<Option<Identity>> {
    let conn = db.conn();
    let result = sq_query_row(&conn, dbq::identities::get_by_email(email), |row| {
        Ok(Identity {
            email: row.get(0)?,
            display_name: row.get(1)?,
            picture_url: row.get(2)?,
        })
    });
    match result {
        Ok(identity) => Ok(Some(identity)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e),
    }
}

// ── History mirror ──────────────────────────────────────────────────────────

/// Mirror a backend history response: upsert the session row, then every
/// message keyed by `(session_id, timestamp)`.
///
/// Idempotent — re-applying the same response, or two concurrent syncs of
/// the same session, converge on identical stored state.
pub fn sync_history(db: &Db, history: &ConversationHistory) -> rusqlite::Result<()> {
    let conn = db.conn();
    sq_execute(
        &conn,
        dbq::sessions::upsert(
            &history.session_id,
            &history.email_id,
            &history.created_at,
            &history.updated_at,
        ),
    )?;
    for msg in &history.messages {
        sq_execute(
            &conn,
            dbq::messages::upsert(
                &history.session_id,
                msg.role.as_str(),
                &msg.content,
                &msg.timestamp,
            ),
        )?;
    }
    Ok(())
}

/// Read a mirrored history. `Ok(None)` when the session was never mirrored.
pub fn read_history(db: &Db, session_id: &str) -> rusqlite::Result<Option<ConversationHistory>> {
    let conn = db.conn();
    let session = sq_query_row(&conn, dbq::sessions::get_by_id(session_id), |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, String>(3)?,
        ))
    });
    let (session_id, email_id, created_at, updated_at) = match session {
        Ok(row) => row,
        Err(rusqlite::Error::QueryReturnedNoRows) => return Ok(None),
        Err(e) => return Err(e),
    };

    let messages = sq_query_map(&conn, dbq::messages::list_by_session(&session_id), |row| {
        let role: String = row.get(0)?;
        let role = MessageRole::parse(&role).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                0,
                rusqlite::types::Type::Text,
                format!("unknown message role '{role}'").into(),
            )
        })?;
        Ok(HistoryMessage {
            role,
            content: row.get(1)?,
            timestamp: row.get(2)?,
        })
    })?;

    Ok(Some(ConversationHistory {
        session_id,
        email_id,
        created_at,
        updated_at,
        messages,
    }))
}

/// Remove one mirrored session and its messages.
pub fn clear_by_session(db: &Db, session_id: &str) -> rusqlite::Result<()> {
    let conn = db.conn();
    sq_execute(&conn, dbq::messages::delete_by_session(session_id))?;
    sq_execute(&conn, dbq::sessions::delete_by_id(session_id))?;
    Ok(())
}

/// Remove every mirrored session owned by an email, and their messages.
pub fn clear_by_email(db: &Db, email: &str) -> rusqlite::Result<()> {
    let conn = db.conn();
    // Collect session ids before deleting the session rows
    let session_ids: Vec<String> =
        sq_query_map(&conn, dbq::sessions::ids_by_email(email), |row| row.get(0))?;
    for session_id in &session_ids {
        sq_execute(&conn, dbq::messages::delete_by_session(session_id))?;
    }
    sq_execute(&conn, dbq::sessions::delete_by_email(email))?;
    Ok(())
}

// ── OAuth states ────────────────────────────────────────────────────────────

/// Record a pending OAuth state with a short expiry.
pub fn insert_oauth_state(db: &Db, state: &str) -> rusqlite::Result<()> {
    let now = chrono::Utc::now();
    let expires_at = (now + chrono::Duration::minutes(OAUTH_STATE_TTL_MINUTES))
        .format(DATETIME_FMT)
        .to_string();
    let conn = db.conn();
    sq_execute(
        &conn,
        dbq::oauth_states::insert(state, &now.format(DATETIME_FMT).to_string(), &expires_at),
    )?;
    Ok(())
}

/// Validate and consume an OAuth state. Single use: the row is deleted
/// whether or not it was still valid.
pub fn consume_oauth_state(db: &Db, state: &str) -> rusqlite::Result<bool> {
    let conn = db.conn();
    let expires_at = sq_query_row(&conn, dbq::oauth_states::get(state), |row| {
        row.get::<_, String>(0)
    });
    let expires_at = match expires_at {
        Ok(value) => value,
        Err(rusqlite::Error::QueryReturnedNoRows) => return Ok(false),
        Err(e) => return Err(e),
    };
    sq_execute(&conn, dbq::oauth_states::delete(state))?;

    Ok(now_sqlite() <= expires_at)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> (tempfile::TempDir, Db) {
        let dir = tempfile::tempdir().unwrap();
        let db = init_db(dir.path()).unwrap();
        (dir, db)
    }

    fn history(session_id: &str, email: &str, messages: &[(&str, &str)]) -> ConversationHistory {
        ConversationHistory {
            session_id: session_id.into(),
            email_id: email.into(),
            created_at: "2024-01-01 00:00:00".into(),
            updated_at: "2024-01-02 00:00:00".into(),
            messages: messages
                .iter()
                .map(|(content, timestamp)| HistoryMessage {
                    role: MessageRole::User,
                    content: (*content).into(),
                    timestamp: (*timestamp).into(),
                })
                .collect(),
        }
    }

    #[test]
    fn identity_upsert_is_keyed_by_email() {
        let (_dir, db) = test_db();
        upsert_identity(&db, "a@x.com", Some("A"), None).unwrap();
        upsert_identity(&db, "a@x.com", Some("A2"), Some("http://pic")).unwrap();

        let identity = find_identity(&db, "a@x.com").unwrap().unwrap();
        assert_eq!(identity.display_name.as_deref(), Some("A2"));
        assert_eq!(identity.picture_url.as_deref(), Some("http://pic"));

        let count: i64 = db
            .conn()
            .query_row("SELECT COUNT(*) FROM identities", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn missing_identity_resolves_to_none() {
        let (_dir, db) = test_db();
        assert!(find_identity(&db, "ghost@x.com").unwrap().is_none());
    }

    #[test]
    fn sync_history_twice_is_idempotent() {
        let (_dir, db) = test_db();
        let h = history(
            "s1",
            "a@x.com",
            &[("hello", "2024-01-01 00:00:01"), ("world", "2024-01-01 00:00:02")],
        );
        sync_history(&db, &h).unwrap();
        sync_history(&db, &h).unwrap();

        let stored = read_history(&db, "s1").unwrap().unwrap();
        assert_eq!(stored.messages.len(), 2);
        assert_eq!(stored.email_id, "a@x.com");
    }

    #[test]
    fn duplicate_timestamp_overwrites_instead_of_duplicating() {
        let (_dir, db) = test_db();
        sync_history(&db, &history("s1", "a@x.com", &[("first", "2024-01-01 00:00:01")])).unwrap();
        sync_history(&db, &history("s1", "a@x.com", &[("revised", "2024-01-01 00:00:01")]))
            .unwrap();

        let stored = read_history(&db, "s1").unwrap().unwrap();
        assert_eq!(stored.messages.len(), 1);
        assert_eq!(stored.messages[0].content, "revised");
    }

    #[test]
    fn messages_read_back_oldest_first() {
        let (_dir, db) = test_db();
        sync_history(
            &db,
            &history(
                "s1",
                "a@x.com",
                &[("later", "2024-01-01 00:00:09"), ("earlier", "2024-01-01 00:00:01")],
            ),
        )
        .unwrap();

        let stored = read_history(&db, "s1").unwrap().unwrap();
        assert_eq!(stored.messages[0].content, "earlier");
        assert_eq!(stored.messages[1].content, "later");
    }

    #[test]
    fn clear_by_session_leaves_other_sessions_untouched() {
        let (_dir, db) = test_db();
        sync_history(&db, &history("s1", "a@x.com", &[("one", "2024-01-01 00:00:01")])).unwrap();
        sync_history(&db, &history("s2", "a@x.com", &[("two", "2024-01-01 00:00:02")])).unwrap();

        clear_by_session(&db, "s1").unwrap();

        assert!(read_history(&db, "s1").unwrap().is_none());
        let kept = read_history(&db, "s2").unwrap().unwrap();
        assert_eq!(kept.messages.len(), 1);
    }

    #[test]
    fn clear_by_email_removes_all_and_only_that_email() {
        let (_dir, db) = test_db();
        sync_history(&db, &history("s1", "a@x.com", &[("one", "2024-01-01 00:00:01")])).unwrap();
        sync_history(&db, &history("s2", "a@x.com", &[("two", "2024-01-01 00:00:02")])).unwrap();
        sync_history(&db, &history("s3", "b@x.com", &[("three", "2024-01-01 00:00:03")])).unwrap();

        clear_by_email(&db, "a@x.com").unwrap();

        assert!(read_history(&db, "s1").unwrap().is_none());
        assert!(read_history(&db, "s2").unwrap().is_none());
        assert!(read_history(&db, "s3").unwrap().is_some());

        let orphans: i64 = db
            .conn()
            .query_row(
                "SELECT COUNT(*) FROM messages WHERE session_id IN ('s1', 's2')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(orphans, 0);
    }

    #[test]
    fn oauth_state_is_single_use() {
        let (_dir, db) = test_db();
        insert_oauth_state(&db, "st4te").unwrap();
        assert!(consume_oauth_state(&db, "st4te").unwrap());
        assert!(!consume_oauth_state(&db, "st4te").unwrap());
        assert!(!consume_oauth_state(&db, "never-issued").unwrap());
    }
}
