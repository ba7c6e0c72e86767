use std::path::Path;

use rusqlite::{Connection, OptionalExtension};

use crate::{event::Event, session::Session, settings::Settings};

/// Persistence port used by the engine.
pub trait Store: Send {
    /// Prunes events with `ts < horizon_ts`, appends `batch` in order, then
    /// keeps the `max_events` rows with the latest `ts` (append order breaks
    /// ties). All or nothing.
    fn append_events(&mut self, batch: &[Event], horizon_ts: i64, max_events: usize) -> anyhow::Result<()>;
    fn events_since(&mut self, since_ts: i64) -> anyhow::Result<Vec<Event>>;
    fn event_count(&mut self) -> anyhow::Result<usize>;

    fn load_settings(&mut self) -> anyhow::Result<Option<Settings>>;
    fn save_settings(&mut self, settings: &Settings, updated_at: i64) -> anyhow::Result<()>;

    fn load_current_session(&mut self) -> anyhow::Result<Option<Session>>;
    fn save_current_session(&mut self, session: &Session) -> anyhow::Result<()>;

    /// Adds a finished session to history, keeping the newest `cap` sessions.
    fn archive_session(&mut self, session: &Session, cap: usize) -> anyhow::Result<()>;
    /// History sessions, oldest first.
    fn load_sessions(&mut self) -> anyhow::Result<Vec<Session>>;
    fn prune_sessions(&mut self, cutoff_ts: i64) -> anyhow::Result<usize>;
}

/// Returns the stored settings, writing `defaults` first when none exist yet.
pub fn load_or_init_settings(
    store: &mut dyn Store,
    defaults: Settings,
    now: i64,
) -> anyhow::Result<Settings> {
    if let Some(settings) = store.load_settings()? {
        return Ok(settings);
    }
    store.save_settings(&defaults, now)?;
    Ok(defaults)
}

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        init_db(&conn)?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> anyhow::Result<Self> {
        let conn = Connection::open_in_memory()?;
        init_db(&conn)?;
        Ok(Self { conn })
    }
}

fn init_db(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
PRAGMA journal_mode = WAL;
PRAGMA synchronous = NORMAL;

CREATE TABLE IF NOT EXISTS events (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  ts INTEGER NOT NULL,
  type TEXT NOT NULL,
  url TEXT NOT NULL,
  payload_json TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_events_ts ON events(ts);

CREATE TABLE IF NOT EXISTS settings (
  id INTEGER PRIMARY KEY CHECK (id = 1),
  payload_json TEXT NOT NULL,
  updated_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS sessions (
  start_time INTEGER PRIMARY KEY,
  payload_json TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS current_session (
  id INTEGER PRIMARY KEY CHECK (id = 1),
  payload_json TEXT NOT NULL
);
"#,
    )
}

fn insert_events(conn: &Connection, batch: &[(i64, &str, &str, String)]) -> rusqlite::Result<()> {
    let mut stmt =
        conn.prepare("INSERT INTO events (ts, type, url, payload_json) VALUES (?1, ?2, ?3, ?4)")?;
    for (ts, kind, url, payload) in batch {
        stmt.execute((ts, kind, url, payload))?;
    }
    Ok(())
}

fn trim_events(conn: &Connection, max_events: usize) -> rusqlite::Result<usize> {
    conn.execute(
        r#"
DELETE FROM events WHERE id NOT IN (
  SELECT id FROM events ORDER BY ts DESC, id DESC LIMIT ?1
)
        "#,
        [max_events as i64],
    )
}

fn trim_sessions(conn: &Connection, cap: usize) -> rusqlite::Result<usize> {
    conn.execute(
        r#"
DELETE FROM sessions WHERE start_time NOT IN (
  SELECT start_time FROM sessions ORDER BY start_time DESC LIMIT ?1
)
        "#,
        [cap as i64],
    )
}

impl Store for SqliteStore {
    fn append_events(&mut self, batch: &[Event], horizon_ts: i64, max_events: usize) -> anyhow::Result<()> {
        let mut rows = Vec::with_capacity(batch.len());
        for e in batch {
            rows.push((e.ts, e.type_name(), e.url.as_str(), serde_json::to_string(e)?));
        }

        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM events WHERE ts < ?1", [horizon_ts])?;
        insert_events(&tx, &rows)?;
        trim_events(&tx, max_events)?;
        tx.commit()?;
        Ok(())
    }

    fn events_since(&mut self, since_ts: i64) -> anyhow::Result<Vec<Event>> {
        let mut stmt = self
            .conn
            .prepare("SELECT payload_json FROM events WHERE ts >= ?1 ORDER BY id ASC")?;
        let rows = stmt.query_map([since_ts], |row| row.get::<_, String>(0))?;

        let mut out = Vec::new();
        for r in rows {
            let raw = r?;
            match serde_json::from_str::<Event>(&raw) {
                Ok(e) => out.push(e),
                Err(err) => tracing::warn!("skipping unreadable event row: {err}"),
            }
        }
        Ok(out)
    }

    fn event_count(&mut self) -> anyhow::Result<usize> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM events", [], |row| row.get(0))?;
        Ok(n as usize)
    }

    fn load_settings(&mut self) -> anyhow::Result<Option<Settings>> {
        let raw: Option<String> = self
            .conn
            .query_row("SELECT payload_json FROM settings WHERE id = 1", [], |row| row.get(0))
            .optional()?;
        match raw {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    fn save_settings(&mut self, settings: &Settings, updated_at: i64) -> anyhow::Result<()> {
        let payload = serde_json::to_string(settings)?;
        self.conn.execute(
            r#"
INSERT INTO settings (id, payload_json, updated_at)
VALUES (1, ?1, ?2)
ON CONFLICT(id) DO UPDATE SET
  payload_json=excluded.payload_json,
  updated_at=excluded.updated_at
            "#,
            (payload, updated_at),
        )?;
        Ok(())
    }

    fn load_current_session(&mut self) -> anyhow::Result<Option<Session>> {
        let raw: Option<String> = self
            .conn
            .query_row(
                "SELECT payload_json FROM current_session WHERE id = 1",
                [],
                |row| row.get(0),
            )
            .optional()?;
        match raw {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    fn save_current_session(&mut self, session: &Session) -> anyhow::Result<()> {
        let payload = serde_json::to_string(session)?;
        self.conn.execute(
            r#"
INSERT INTO current_session (id, payload_json)
VALUES (1, ?1)
ON CONFLICT(id) DO UPDATE SET payload_json=excluded.payload_json
            "#,
            [payload],
        )?;
        Ok(())
    }

    fn archive_session(&mut self, session: &Session, cap: usize) -> anyhow::Result<()> {
        let payload = serde_json::to_string(session)?;
        let tx = self.conn.transaction()?;
        tx.execute(
            r#"
INSERT INTO sessions (start_time, payload_json)
VALUES (?1, ?2)
ON CONFLICT(start_time) DO NOTHING
            "#,
            (session.start_time, payload),
        )?;
        trim_sessions(&tx, cap)?;
        tx.commit()?;
        Ok(())
    }

    fn load_sessions(&mut self) -> anyhow::Result<Vec<Session>> {
        let mut stmt = self
            .conn
            .prepare("SELECT payload_json FROM sessions ORDER BY start_time ASC")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

        let mut out = Vec::new();
        for r in rows {
            let raw = r?;
            match serde_json::from_str::<Session>(&raw) {
                Ok(s) => out.push(s),
                Err(err) => tracing::warn!("skipping unreadable session row: {err}"),
            }
        }
        Ok(out)
    }

    fn prune_sessions(&mut self, cutoff_ts: i64) -> anyhow::Result<usize> {
        let n = self
            .conn
            .execute("DELETE FROM sessions WHERE start_time < ?1", [cutoff_ts])?;
        Ok(n)
    }
}
