//! Append-only SQLite log of [`ResultRow`]s.

use chrono::DateTime;
use rusqlite::{params, Connection, Params, Transaction};
use std::path::Path;
use tracing::{debug, info};

use crate::domain::ResultRow;
use crate::error::{MetricsError, Result};

const CREATE_RESULTS_TABLE: &str = "
CREATE TABLE IF NOT EXISTS results (
    timestamp INTEGER NOT NULL,
    projectId INTEGER,
    query TEXT,
    oldResults INTEGER,
    crntResults INTEGER
);
";

const INSERT_RESULT: &str = "INSERT INTO results (timestamp, projectId, query, oldResults, crntResults) VALUES (?1, ?2, ?3, ?4, ?5)";

// rowid keeps insertion order stable for rows sharing a timestamp.
const SELECT_ALL: &str = "SELECT timestamp, projectId, query, oldResults, crntResults FROM results ORDER BY timestamp ASC, rowid ASC";
const SELECT_BY_QUERY: &str = "SELECT timestamp, projectId, query, oldResults, crntResults FROM results WHERE query = ?1 ORDER BY timestamp ASC, rowid ASC";

/// Something statements can be executed against: the connection itself or
/// an open transaction on it.
pub trait Persists {
    fn exec<P: Params>(&self, sql: &str, params: P) -> Result<usize>;
}

impl Persists for Connection {
    fn exec<P: Params>(&self, sql: &str, params: P) -> Result<usize> {
        Ok(self.execute(sql, params)?)
    }
}

impl Persists for Transaction<'_> {
    fn exec<P: Params>(&self, sql: &str, params: P) -> Result<usize> {
        Ok(self.execute(sql, params)?)
    }
}

/// Insert a single row through any executor.
pub fn save_result<E: Persists>(exe: &E, row: &ResultRow) -> Result<()> {
    exe.exec(
        INSERT_RESULT,
        params![
            row.timestamp.timestamp_millis(),
            row.project_id,
            row.query_name,
            row.old_count,
            row.new_count
        ],
    )?;
    debug!(query = %row.query_name, "result inserted");
    Ok(())
}

/// Results database handle.
pub struct ResultStore {
    conn: Connection,
}

impl ResultStore {
    /// Open or create the store at `path`, creating parent directories.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.migrate()?;
        info!("Database opened at {}", path.display());
        Ok(store)
    }

    /// Open a store that lives only as long as this value.
    pub fn open_in_memory() -> Result<Self> {
        let store = Self {
            conn: Connection::open_in_memory()?,
        };
        store.migrate()?;
        Ok(store)
    }

    /// Delete the database file. A missing file is not an error.
    pub fn reset(path: &Path) -> Result<()> {
        info!("dropping database {}", path.display());
        match std::fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(MetricsError::Io(e)),
        }
    }

    /// Create the results table if it does not exist yet.
    pub fn migrate(&self) -> Result<()> {
        self.conn.execute_batch(CREATE_RESULTS_TABLE)?;
        Ok(())
    }

    /// Insert all rows in one transaction; either all are committed or none.
    pub fn save(&mut self, rows: &[ResultRow]) -> Result<()> {
        let tx = self.conn.transaction()?;
        for row in rows {
            save_result(&tx, row)?;
        }
        tx.commit()?;
        info!("Saved {} results", rows.len());
        Ok(())
    }

    /// Every saved row, oldest first.
    pub fn load_all(&self) -> Result<Vec<ResultRow>> {
        self.load(SELECT_ALL, params![])
    }

    /// Rows for one query name, oldest first.
    pub fn load_by_query(&self, name: &str) -> Result<Vec<ResultRow>> {
        self.load(SELECT_BY_QUERY, [name])
    }

    fn load<P: Params>(&self, sql: &str, params: P) -> Result<Vec<ResultRow>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(params, |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, i64>(3)?,
                row.get::<_, i64>(4)?,
            ))
        })?;

        let mut results = Vec::new();
        for row in rows {
            let (millis, project_id, query_name, old_count, new_count) = row?;
            let timestamp = DateTime::from_timestamp_millis(millis).ok_or_else(|| {
                MetricsError::Decode(format!("timestamp {} out of range", millis))
            })?;
            results.push(ResultRow {
                timestamp,
                project_id,
                query_name,
                old_count,
                new_count,
            });
        }
        Ok(results)
    }
}
