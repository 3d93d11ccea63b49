//! SQLite-backed [`DocumentStore`].
//!
//! Every document is stored as JSON text in a per-collection table, with
//! the few columns queries filter on promoted alongside:
//!
//! ```sql
//! CREATE TABLE episodic_memories (
//!     id         TEXT PRIMARY KEY,
//!     npc_id     TEXT NOT NULL,
//!     tier       TEXT NOT NULL,
//!     created_at TEXT NOT NULL,
//!     data       TEXT NOT NULL
//! );
//! ```
//!
//! - WAL mode for concurrent reads while a turn writes
//! - JSON documents keep the schema stable as record types grow
//! - timestamps are fixed-width RFC 3339 so text order is time order

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{AnimaError, Result};
use crate::memory::{EpisodicMemory, Npc, PersonaFact, PersonaProfile, TurnTrace, WorldKnowledge};
use crate::store::DocumentStore;
use crate::types::MemoryTier;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS npcs (
    id         TEXT PRIMARY KEY,
    updated_at TEXT NOT NULL,
    data       TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS personas (
    id         TEXT PRIMARY KEY,
    updated_at TEXT NOT NULL,
    data       TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS worlds (
    id         TEXT PRIMARY KEY,
    updated_at TEXT NOT NULL,
    data       TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS persona_facts (
    id         TEXT PRIMARY KEY,
    persona_id TEXT NOT NULL,
    npc_id     TEXT,
    created_at TEXT NOT NULL,
    data       TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_facts_persona ON persona_facts (persona_id);
CREATE INDEX IF NOT EXISTS idx_facts_npc ON persona_facts (npc_id);
CREATE TABLE IF NOT EXISTS episodic_memories (
    id         TEXT PRIMARY KEY,
    npc_id     TEXT NOT NULL,
    tier       TEXT NOT NULL,
    created_at TEXT NOT NULL,
    data       TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_memories_npc ON episodic_memories (npc_id, created_at);
CREATE TABLE IF NOT EXISTS turn_traces (
    id         TEXT PRIMARY KEY,
    npc_id     TEXT NOT NULL,
    created_at TEXT NOT NULL,
    data       TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_traces_npc ON turn_traces (npc_id, created_at);
";

fn ts(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn tier_str(tier: MemoryTier) -> &'static str {
    match tier {
        MemoryTier::Ephemeral => "ephemeral",
        MemoryTier::Durable => "durable",
    }
}

fn encode<T: Serialize>(doc: &T) -> Result<String> {
    Ok(serde_json::to_string(doc)?)
}

fn decode<T: DeserializeOwned>(data: &str) -> Result<T> {
    Ok(serde_json::from_str(data)?)
}

fn decode_all<T: DeserializeOwned>(rows: Vec<String>) -> Result<Vec<T>> {
    rows.iter().map(|d| decode(d)).collect()
}

fn decode_opt<T: DeserializeOwned>(row: Option<String>) -> Result<Option<T>> {
    row.map(|d| decode(&d)).transpose()
}

fn upsert(conn: &Connection, table: &str, id: &str, data: &str) -> Result<()> {
    let sql = format!(
        "INSERT INTO {table} (id, updated_at, data) VALUES (?1, ?2, ?3)
         ON CONFLICT(id) DO UPDATE SET updated_at = excluded.updated_at, data = excluded.data"
    );
    conn.execute(&sql, params![id, ts(&Utc::now()), data])?;
    debug!(table, id, "document upserted");
    Ok(())
}

fn fetch(conn: &Connection, table: &str, id: &str) -> Result<Option<String>> {
    let mut stmt = conn.prepare_cached(&format!("SELECT data FROM {table} WHERE id = ?1"))?;
    Ok(stmt.query_row(params![id], |row| row.get(0)).optional()?)
}

fn fetch_many(conn: &Connection, sql: &str, args: &[&dyn rusqlite::ToSql]) -> Result<Vec<String>> {
    let mut stmt = conn.prepare_cached(sql)?;
    let rows = stmt
        .query_map(args, |row| row.get::<_, String>(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ---------------------------------------------------------------------------
// SqliteDocumentStore
// ---------------------------------------------------------------------------

/// Handle to an open SQLite document database.
///
/// Statements run on tokio's blocking pool so a slow disk never stalls the
/// async workers; one connection serialises them.
///
/// # Usage
///
/// ```no_run
/// # use anima_core::store::{DocumentStore, SqliteDocumentStore};
/// # use anima_core::memory::Npc;
/// # async fn demo() -> anima_core::Result<()> {
/// let store = SqliteDocumentStore::open("anima.db", true)?;
/// store.put_npc(&Npc::new("npc_1", "Bran", "guard", "p1", "w1")).await?;
/// let npc = store.get_npc("npc_1").await?;
/// # Ok(())
/// # }
/// ```
pub struct SqliteDocumentStore {
    conn: Arc<Mutex<Connection>>,
    db_path: PathBuf,
}

impl std::fmt::Debug for SqliteDocumentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteDocumentStore")
            .field("db_path", &self.db_path)
            .finish_non_exhaustive()
    }
}

impl SqliteDocumentStore {
    /// Open (or create) a database at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`AnimaError::Database`](crate::AnimaError::Database) on
    /// SQLite failures.
    pub fn open<P: AsRef<Path>>(path: P, wal_mode: bool) -> Result<Self> {
        let db_path = path.as_ref().to_path_buf();
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let conn = Connection::open_with_flags(&db_path, flags)?;

        if wal_mode {
            conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        }
        conn.execute_batch("PRAGMA synchronous = NORMAL;")?;
        conn.execute_batch("PRAGMA busy_timeout = 5000;")?;
        conn.execute_batch(SCHEMA)?;

        info!(path = %db_path.display(), wal = wal_mode, "document store opened");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            db_path,
        })
    }

    /// Open an in-memory database.
    ///
    /// # Errors
    ///
    /// Returns [`AnimaError::Database`](crate::AnimaError::Database) on
    /// SQLite failures.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            db_path: PathBuf::from(":memory:"),
        })
    }

    /// Path of the database file.
    #[must_use]
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Run `op` against the connection on the blocking pool.
    async fn blocking<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || op(&conn.lock()))
            .await
            .map_err(|e| {
                warn!(error = %e, "document store task panicked");
                AnimaError::Io(std::io::Error::other(e))
            })?
    }

    async fn get_doc<T: DeserializeOwned>(&self, table: &'static str, id: &str) -> Result<Option<T>> {
        let id = id.to_string();
        decode_opt(self.blocking(move |c| fetch(c, table, &id)).await?)
    }

    async fn put_doc<T: Serialize>(&self, table: &'static str, id: &str, doc: &T) -> Result<()> {
        let id = id.to_string();
        let data = encode(doc)?;
        self.blocking(move |c| upsert(c, table, &id, &data)).await
    }

    async fn list_docs<T: DeserializeOwned>(&self, sql: &'static str) -> Result<Vec<T>> {
        decode_all(self.blocking(move |c| fetch_many(c, sql, &[])).await?)
    }

    async fn docs_where<T: DeserializeOwned>(&self, sql: &'static str, key: &str) -> Result<Vec<T>> {
        let key = key.to_string();
        decode_all(self.blocking(move |c| fetch_many(c, sql, &[&key])).await?)
    }
}

#[async_trait]
impl DocumentStore for SqliteDocumentStore {
    async fn get_npc(&self, id: &str) -> Result<Option<Npc>> {
        self.get_doc("npcs", id).await
    }

    async fn put_npc(&self, npc: &Npc) -> Result<()> {
        self.put_doc("npcs", &npc.id, npc).await
    }

    async fn get_persona(&self, id: &str) -> Result<Option<PersonaProfile>> {
        self.get_doc("personas", id).await
    }

    async fn put_persona(&self, persona: &PersonaProfile) -> Result<()> {
        self.put_doc("personas", &persona.id, persona).await
    }

    async fn list_personas(&self) -> Result<Vec<PersonaProfile>> {
        self.list_docs("SELECT data FROM personas ORDER BY rowid").await
    }

    async fn get_world(&self, id: &str) -> Result<Option<WorldKnowledge>> {
        self.get_doc("worlds", id).await
    }

    async fn put_world(&self, world: &WorldKnowledge) -> Result<()> {
        self.put_doc("worlds", &world.id, world).await
    }

    async fn list_worlds(&self) -> Result<Vec<WorldKnowledge>> {
        self.list_docs("SELECT data FROM worlds ORDER BY rowid").await
    }

    async fn insert_fact(&self, fact: &PersonaFact) -> Result<()> {
        let (id, persona_id, npc_id) = (fact.id.clone(), fact.persona_id.clone(), fact.npc_id.clone());
        let (created_at, data) = (ts(&fact.created_at), encode(fact)?);
        self.blocking(move |c| {
            c.execute(
                "INSERT INTO persona_facts (id, persona_id, npc_id, created_at, data)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![id, persona_id, npc_id, created_at, data],
            )?;
            Ok(())
        })
        .await
    }

    async fn facts_by_persona(&self, persona_id: &str) -> Result<Vec<PersonaFact>> {
        self.docs_where(
            "SELECT data FROM persona_facts WHERE persona_id = ?1 ORDER BY created_at, rowid",
            persona_id,
        )
        .await
    }

    async fn facts_by_npc(&self, npc_id: &str) -> Result<Vec<PersonaFact>> {
        self.docs_where(
            "SELECT data FROM persona_facts WHERE npc_id = ?1 ORDER BY created_at, rowid",
            npc_id,
        )
        .await
    }

    async fn all_facts(&self) -> Result<Vec<PersonaFact>> {
        self.list_docs("SELECT data FROM persona_facts ORDER BY created_at, rowid").await
    }

    async fn insert_memory(&self, memory: &EpisodicMemory) -> Result<()> {
        let (id, npc_id, tier) = (memory.id.clone(), memory.npc_id.clone(), tier_str(memory.tier));
        let (created_at, data) = (ts(&memory.created_at), encode(memory)?);
        self.blocking(move |c| {
            c.execute(
                "INSERT INTO episodic_memories (id, npc_id, tier, created_at, data)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![id, npc_id, tier, created_at, data],
            )?;
            Ok(())
        })
        .await
    }

    async fn get_memory(&self, id: &str) -> Result<Option<EpisodicMemory>> {
        self.get_doc("episodic_memories", id).await
    }

    async fn set_memory_tier(&self, id: &str, tier: MemoryTier) -> Result<bool> {
        let id = id.to_string();
        self.blocking(move |c| {
            let Some(data) = fetch(c, "episodic_memories", &id)? else {
                return Ok(false);
            };
            let mut memory: EpisodicMemory = decode(&data)?;
            memory.tier = tier;
            let changed = c.execute(
                "UPDATE episodic_memories SET tier = ?2, data = ?3 WHERE id = ?1",
                params![id, tier_str(tier), encode(&memory)?],
            )?;
            Ok(changed > 0)
        })
        .await
    }

    async fn recent_memories(
        &self,
        npc_id: &str,
        limit: usize,
        tier: Option<MemoryTier>,
    ) -> Result<Vec<EpisodicMemory>> {
        let npc_id = npc_id.to_string();
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = self
            .blocking(move |c| match tier {
                Some(tier) => fetch_many(
                    c,
                    "SELECT data FROM episodic_memories WHERE npc_id = ?1 AND tier = ?2
                     ORDER BY created_at DESC, rowid DESC LIMIT ?3",
                    &[&npc_id, &tier_str(tier), &limit],
                ),
                None => fetch_many(
                    c,
                    "SELECT data FROM episodic_memories WHERE npc_id = ?1
                     ORDER BY created_at DESC, rowid DESC LIMIT ?2",
                    &[&npc_id, &limit],
                ),
            })
            .await?;
        decode_all(rows)
    }

    async fn durable_memories(&self) -> Result<Vec<EpisodicMemory>> {
        self.list_docs("SELECT data FROM episodic_memories WHERE tier = 'durable' ORDER BY created_at, rowid")
            .await
    }

    async fn insert_trace(&self, trace: &TurnTrace) -> Result<()> {
        let (id, npc_id) = (trace.trace_id.clone(), trace.npc_id.clone());
        let (created_at, data) = (ts(&trace.created_at), encode(trace)?);
        self.blocking(move |c| {
            c.execute(
                "INSERT INTO turn_traces (id, npc_id, created_at, data) VALUES (?1, ?2, ?3, ?4)",
                params![id, npc_id, created_at, data],
            )?;
            Ok(())
        })
        .await
    }

    async fn get_trace(&self, id: &str) -> Result<Option<TurnTrace>> {
        self.get_doc("turn_traces", id).await
    }

    async fn traces_by_npc(&self, npc_id: &str, limit: usize) -> Result<Vec<TurnTrace>> {
        let npc_id = npc_id.to_string();
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = self
            .blocking(move |c| {
                fetch_many(
                    c,
                    "SELECT data FROM turn_traces WHERE npc_id = ?1 ORDER BY created_at DESC, rowid DESC LIMIT ?2",
                    &[&npc_id, &limit],
                )
            })
            .await?;
        decode_all(rows)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
