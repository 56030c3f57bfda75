//! Connection Port
//!
//! Defines the capability the router needs from a live database session.
//! Implementations may wrap SQLite, PostgreSQL or an in-memory fake.

use crate::domain::entities::Row;
use crate::domain::errors::BackendError;
use crate::domain::value_objects::Value;
use async_trait::async_trait;
use std::sync::Arc;

/// A connection shared between the router and whoever created it.
///
/// Identity matters: the router hands out clones of the same `Arc`,
/// never a new session.
pub type SharedConnection = Arc<dyn Connection>;

/// One live database session.
///
/// This is an outbound port. Queries arrive already translated to
/// `$1..$n` positional markers, with values in marker order.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Stable identifier used in logs and topology reports.
    fn id(&self) -> &str;

    /// Execute a statement that returns no rows.
    async fn execute(&self, query: &str, params: &[Value]) -> Result<(), BackendError>;

    /// Prepare a statement once and execute it for every value set.
    async fn execute_batch(&self, query: &str, batch: &[Vec<Value>]) -> Result<(), BackendError>;

    /// Prepare a statement and return every row it produces.
    async fn fetch_all(&self, query: &str, params: &[Value]) -> Result<Vec<Row>, BackendError>;

    /// Return the first row, or None when the query matches nothing.
    async fn fetch_one(&self, query: &str, params: &[Value]) -> Result<Option<Row>, BackendError> {
        Ok(self.fetch_all(query, params).await?.into_iter().next())
    }

    /// Return the first column of the first row, or None when the query
    /// matches nothing.
    async fn fetch_scalar(&self, query: &str, params: &[Value]) -> Result<Option<Value>, BackendError> {
        Ok(self
            .fetch_one(query, params)
            .await?
            .and_then(|row| row.into_values().into_iter().next()))
    }

    /// Start a transaction owned by this session.
    async fn begin_transaction(&self) -> Result<Box<dyn Transaction>, BackendError>;
}

/// Handle to an open transaction on one connection.
#[async_trait]
pub trait Transaction: Send + Sync {
    async fn commit(&mut self) -> Result<(), BackendError>;

    async fn rollback(&mut self) -> Result<(), BackendError>;
}
