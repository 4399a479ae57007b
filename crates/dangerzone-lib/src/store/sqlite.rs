//! SQLite storage backend with an R*Tree spatial index.
//!
//! Layout:
//!
//! ```text
//! zones        seq (rowid, insertion order) | zone_id (unique) | name | geometry (JSON)
//!              | properties (JSON) | created_at | updated_at
//! zone_bounds  R*Tree virtual table: seq | min_lng, max_lng | min_lat, max_lat
//! ```
//!
//! `zone_bounds` is the compound spatial index used for candidate lookups;
//! the secondary index on `name` is a lookup convenience only. Every operation
//! opens its own connection on the blocking pool. The database runs in WAL
//! mode so readers never wait on the single writer, and inserts/deletes touch
//! both tables inside one transaction. That transaction commits through the
//! caller's [`WriteGate`]; a write whose deadline passed while it waited on
//! the database lock is rolled back instead of committed.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::geometry::BoundingBox;
use crate::store::backend::{StorageBackend, StoredZone, WriteGate};
use crate::zone::{Zone, ZoneId};

/// How long a connection waits on a locked database before giving up.
const BUSY_TIMEOUT: Duration = Duration::from_secs(2);

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS zones (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    zone_id TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL,
    geometry TEXT NOT NULL,
    properties TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS zones_name_idx ON zones(name);
CREATE VIRTUAL TABLE IF NOT EXISTS zone_bounds USING rtree(
    seq,
    min_lng, max_lng,
    min_lat, max_lat
);
";

const SELECT_ZONE: &str =
    "SELECT zone_id, name, geometry, properties, created_at, updated_at FROM zones";

/// Zone columns as stored, before JSON and timestamp decoding.
struct ZoneRow {
    zone_id: String,
    name: String,
    geometry: String,
    properties: String,
    created_at: String,
    updated_at: String,
}

impl ZoneRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            zone_id: row.get(0)?,
            name: row.get(1)?,
            geometry: row.get(2)?,
            properties: row.get(3)?,
            created_at: row.get(4)?,
            updated_at: row.get(5)?,
        })
    }

    fn into_zone(self) -> Result<Zone> {
        let id = ZoneId::parse(&self.zone_id)
            .map_err(|_| Error::internal(format!("corrupt zone id '{}'", self.zone_id)))?;
        Ok(Zone {
            id,
            name: self.name,
            geometry: serde_json::from_str(&self.geometry)?,
            properties: serde_json::from_str(&self.properties)?,
            created_at: parse_timestamp(&self.created_at)?,
            updated_at: parse_timestamp(&self.updated_at)?,
        })
    }
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| Error::internal(format!("corrupt timestamp '{}': {}", raw, e)))
}

fn format_timestamp(t: &DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn collect_zones(rows: Vec<ZoneRow>) -> Result<Vec<Zone>> {
    rows.into_iter().map(ZoneRow::into_zone).collect()
}

/// File-backed storage using SQLite.
#[derive(Debug, Clone)]
pub struct SqliteBackend {
    path: PathBuf,
}

impl SqliteBackend {
    /// Open (creating if needed) the database and apply the schema.
    ///
    /// Fails when the file cannot be opened or is not a usable database;
    /// the zone store retries this during startup.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let backend = Self {
            path: path.as_ref().to_path_buf(),
        };
        let init = backend.clone();
        run_blocking(move || init.initialize()).await?;
        Ok(backend)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn initialize(&self) -> Result<()> {
        let conn = self.connect()?;
        let mode: String = conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
        conn.execute_batch(SCHEMA)?;
        info!(path = %self.path.display(), journal_mode = %mode, "sqlite zone store ready");
        Ok(())
    }

    fn connect(&self) -> Result<Connection> {
        let conn = Connection::open(&self.path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        Ok(conn)
    }

    fn with_connection<T, F>(&self, op: F) -> impl std::future::Future<Output = Result<T>> + Send
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
    {
        let backend = self.clone();
        run_blocking(move || {
            let mut conn = backend.connect()?;
            op(&mut conn)
        })
    }
}

async fn run_blocking<T, F>(op: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(op)
        .await
        .map_err(|e| Error::internal(format!("sqlite worker failed: {}", e)))?
}

#[async_trait]
impl StorageBackend for SqliteBackend {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    async fn ping(&self) -> Result<()> {
        self.with_connection(|conn| {
            conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
            Ok(())
        })
        .await
    }

    async fn insert(&self, stored: StoredZone, gate: WriteGate) -> Result<()> {
        let geometry = serde_json::to_string(&stored.zone.geometry)?;
        let properties = serde_json::to_string(&stored.zone.properties)?;

        self.with_connection(move |conn| {
            if gate.is_cancelled() {
                return Err(Error::unavailable("insert abandoned before it started"));
            }
            let tx = conn.transaction()?;
            let zone = &stored.zone;
            tx.execute(
                "INSERT INTO zones (zone_id, name, geometry, properties, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    zone.id.to_string(),
                    zone.name,
                    geometry,
                    properties,
                    format_timestamp(&zone.created_at),
                    format_timestamp(&zone.updated_at),
                ],
            )?;
            let seq = tx.last_insert_rowid();
            let b = stored.bounds;
            tx.execute(
                "INSERT INTO zone_bounds (seq, min_lng, max_lng, min_lat, max_lat)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![seq, b.min_lng, b.max_lng, b.min_lat, b.max_lat],
            )?;
            gate.commit(|| Ok(tx.commit()?))?;
            debug!(zone_id = %zone.id, seq, "zone inserted");
            Ok(())
        })
        .await
    }

    async fn all(&self) -> Result<Vec<Zone>> {
        let rows = self
            .with_connection(|conn| {
                let mut stmt = conn.prepare(&format!("{} ORDER BY seq", SELECT_ZONE))?;
                let rows = stmt
                    .query_map([], ZoneRow::from_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(rows)
            })
            .await?;
        collect_zones(rows)
    }

    async fn get(&self, id: ZoneId) -> Result<Option<Zone>> {
        let row = self
            .with_connection(move |conn| {
                let row = conn
                    .query_row(
                        &format!("{} WHERE zone_id = ?1", SELECT_ZONE),
                        params![id.to_string()],
                        ZoneRow::from_row,
                    )
                    .optional()?;
                Ok(row)
            })
            .await?;
        row.map(ZoneRow::into_zone).transpose()
    }

    async fn remove(&self, id: ZoneId, gate: WriteGate) -> Result<Option<Zone>> {
        let row = self
            .with_connection(move |conn| {
                if gate.is_cancelled() {
                    return Err(Error::unavailable("delete abandoned before it started"));
                }
                let tx = conn.transaction()?;
                let found = tx
                    .query_row(
                        "SELECT seq, zone_id, name, geometry, properties, created_at, updated_at
                         FROM zones WHERE zone_id = ?1",
                        params![id.to_string()],
                        |row| {
                            let seq: i64 = row.get(0)?;
                            Ok((
                                seq,
                                ZoneRow {
                                    zone_id: row.get(1)?,
                                    name: row.get(2)?,
                                    geometry: row.get(3)?,
                                    properties: row.get(4)?,
                                    created_at: row.get(5)?,
                                    updated_at: row.get(6)?,
                                },
                            ))
                        },
                    )
                    .optional()?;

                let Some((seq, row)) = found else {
                    return Ok(None);
                };
                tx.execute("DELETE FROM zone_bounds WHERE seq = ?1", params![seq])?;
                tx.execute("DELETE FROM zones WHERE seq = ?1", params![seq])?;
                gate.commit(|| Ok(tx.commit()?))?;
                Ok(Some(row))
            })
            .await?;
        row.map(ZoneRow::into_zone).transpose()
    }

    async fn candidates(&self, bbox: BoundingBox) -> Result<Vec<Zone>> {
        let rows = self
            .with_connection(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT z.zone_id, z.name, z.geometry, z.properties, z.created_at, z.updated_at
                     FROM zones z
                     JOIN zone_bounds b ON b.seq = z.seq
                     WHERE b.max_lng >= ?1 AND b.min_lng <= ?3
                       AND b.max_lat >= ?2 AND b.min_lat <= ?4
                     ORDER BY z.seq",
                )?;
                let rows = stmt
                    .query_map(
                        params![bbox.min_lng, bbox.min_lat, bbox.max_lng, bbox.max_lat],
                        ZoneRow::from_row,
                    )?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(rows)
            })
            .await?;
        collect_zones(rows)
    }
}
