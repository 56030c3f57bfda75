//! SQLite Connection
//!
//! Implements the Connection port on rusqlite. Blocking calls run on
//! Tokio's blocking pool; the session itself sits behind a mutex so one
//! statement runs at a time.

use crate::domain::entities::Row;
use crate::domain::errors::BackendError;
use crate::domain::ports::{Connection, Transaction};
use crate::domain::value_objects::Value;
use async_trait::async_trait;
use parking_lot::Mutex;
use rusqlite::types::{ToSql, ToSqlOutput, Value as SqlValue, ValueRef};
use rusqlite::{params_from_iter, OpenFlags};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

type Session = Arc<Mutex<rusqlite::Connection>>;

/// A single SQLite session.
///
/// `$1..$n` markers are SQLite named parameters; their indices follow
/// first appearance, so positional binding lines up with the marker
/// numbers the translator produced.
pub struct SqliteConnection {
    id: String,
    session: Session,
}

impl SqliteConnection {
    /// Open (or create) a database file for reading and writing.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, BackendError> {
        let path = path.as_ref();
        let conn = rusqlite::Connection::open(path)?;
        Self::from_rusqlite(path.display().to_string(), conn)
    }

    /// Open an existing database file read-only, as a replica would be.
    pub fn open_read_only(path: impl AsRef<Path>) -> Result<Self, BackendError> {
        let path = path.as_ref();
        let conn = rusqlite::Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        Self::from_rusqlite(format!("{} (read-only)", path.display()), conn)
    }

    /// Open a private in-memory database.
    pub fn open_in_memory(id: impl Into<String>) -> Result<Self, BackendError> {
        let conn = rusqlite::Connection::open_in_memory()?;
        Self::from_rusqlite(id.into(), conn)
    }

    fn from_rusqlite(id: String, conn: rusqlite::Connection) -> Result<Self, BackendError> {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        tracing::debug!(connection = %id, "sqlite connection opened");
        Ok(Self {
            id,
            session: Arc::new(Mutex::new(conn)),
        })
    }

    /// Replace the identifier reported in logs and topology.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    async fn with_session<F, T>(&self, f: F) -> Result<T, BackendError>
    where
        F: FnOnce(&rusqlite::Connection) -> rusqlite::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        run_blocking(self.session.clone(), f).await
    }
}

async fn run_blocking<F, T>(session: Session, f: F) -> Result<T, BackendError>
where
    F: FnOnce(&rusqlite::Connection) -> rusqlite::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let result = tokio::task::spawn_blocking(move || {
        let guard = session.lock();
        f(&guard)
    })
    .await?;
    Ok(result?)
}

fn read_row(row: &rusqlite::Row<'_>, columns: &[String]) -> rusqlite::Result<Row> {
    let values = (0..columns.len())
        .map(|i| row.get_ref(i).map(Value::from))
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(Row::new(columns.to_vec(), values))
}

fn column_names(stmt: &rusqlite::Statement<'_>) -> Vec<String> {
    stmt.column_names().into_iter().map(String::from).collect()
}

#[async_trait]
impl Connection for SqliteConnection {
    fn id(&self) -> &str {
        &self.id
    }

    async fn execute(&self, query: &str, params: &[Value]) -> Result<(), BackendError> {
        let query = query.to_string();
        let params = params.to_vec();
        self.with_session(move |conn| {
            conn.execute(&query, params_from_iter(params.iter()))?;
            Ok(())
        })
        .await
    }

    async fn execute_batch(&self, query: &str, batch: &[Vec<Value>]) -> Result<(), BackendError> {
        let query = query.to_string();
        let batch = batch.to_vec();
        self.with_session(move |conn| {
            let mut stmt = conn.prepare(&query)?;
            for values in &batch {
                stmt.execute(params_from_iter(values.iter()))?;
            }
            Ok(())
        })
        .await
    }

    async fn fetch_all(&self, query: &str, params: &[Value]) -> Result<Vec<Row>, BackendError> {
        let query = query.to_string();
        let params = params.to_vec();
        self.with_session(move |conn| {
            let mut stmt = conn.prepare(&query)?;
            let columns = column_names(&stmt);
            let mut rows = stmt.query(params_from_iter(params.iter()))?;

            let mut out = Vec::new();
            while let Some(row) = rows.next()? {
                out.push(read_row(row, &columns)?);
            }
            Ok(out)
        })
        .await
    }

    async fn fetch_one(&self, query: &str, params: &[Value]) -> Result<Option<Row>, BackendError> {
        let query = query.to_string();
        let params = params.to_vec();
        self.with_session(move |conn| {
            let mut stmt = conn.prepare(&query)?;
            let columns = column_names(&stmt);
            let mut rows = stmt.query(params_from_iter(params.iter()))?;

            match rows.next()? {
                Some(row) => Ok(Some(read_row(row, &columns)?)),
                None => Ok(None),
            }
        })
        .await
    }

    async fn begin_transaction(&self) -> Result<Box<dyn Transaction>, BackendError> {
        self.with_session(|conn| conn.execute_batch("BEGIN")).await?;
        Ok(Box::new(SqliteTransaction {
            connection_id: self.id.clone(),
            session: self.session.clone(),
            finished: false,
        }))
    }
}

/// Transaction opened with `BEGIN` on a [`SqliteConnection`].
///
/// Dropping an unfinished transaction rolls it back.
pub struct SqliteTransaction {
    connection_id: String,
    session: Session,
    finished: bool,
}

#[async_trait]
impl Transaction for SqliteTransaction {
    async fn commit(&mut self) -> Result<(), BackendError> {
        run_blocking(self.session.clone(), |conn| conn.execute_batch("COMMIT")).await?;
        self.finished = true;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), BackendError> {
        // Marked finished first: a failed ROLLBACK is not retried on drop
        self.finished = true;
        run_blocking(self.session.clone(), |conn| conn.execute_batch("ROLLBACK")).await
    }
}

impl Drop for SqliteTransaction {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        match self.session.try_lock() {
            Some(conn) => {
                if let Err(e) = conn.execute_batch("ROLLBACK") {
                    tracing::warn!(connection = %self.connection_id, error = %e, "rollback on drop failed");
                }
            }
            None => tracing::warn!(
                connection = %self.connection_id,
                "session busy, transaction left open on drop"
            ),
        }
    }
}

// ===== Type mapping =====

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null => ToSqlOutput::Owned(SqlValue::Null),
            Value::Bool(b) => ToSqlOutput::Owned(SqlValue::Integer(i64::from(*b))),
            Value::Int(i) => ToSqlOutput::Owned(SqlValue::Integer(*i)),
            Value::Float(f) => ToSqlOutput::Owned(SqlValue::Real(*f)),
            Value::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            Value::Blob(b) => ToSqlOutput::Borrowed(ValueRef::Blob(b)),
        })
    }
}

impl From<ValueRef<'_>> for Value {
    fn from(value: ValueRef<'_>) -> Self {
        match value {
            ValueRef::Null => Value::Null,
            ValueRef::Integer(i) => Value::Int(i),
            ValueRef::Real(f) => Value::Float(f),
            ValueRef::Text(t) => Value::Text(String::from_utf8_lossy(t).into_owned()),
            ValueRef::Blob(b) => Value::Blob(b.to_vec()),
        }
    }
}

impl From<rusqlite::Error> for BackendError {
    fn from(e: rusqlite::Error) -> Self {
        BackendError::with_source(e.to_string(), e)
    }
}

impl From<tokio::task::JoinError> for BackendError {
    fn from(e: tokio::task::JoinError) -> Self {
        BackendError::with_source("sqlite worker task failed", e)
    }
}
