//! Connection Router - Main application use case
//!
//! Translates named parameters, picks the connection that must serve each
//! statement, and owns the transaction lifecycle on the primary.

use crate::domain::entities::{ConnectionTopology, Row};
use crate::domain::errors::RouterError;
use crate::domain::ports::{SharedConnection, Transaction};
use crate::domain::services::{NamedQuery, ReadContext, RoutingPolicy, WeightedPool};
use crate::domain::value_objects::{Params, Role, Value};
use futures::future::BoxFuture;
use std::collections::HashMap;

/// Transaction lifecycle of a router.
enum TransactionState {
    Idle,
    Active(Box<dyn Transaction>),
}

impl TransactionState {
    fn is_active(&self) -> bool {
        matches!(self, Self::Active(_))
    }
}

/// Read/write router in front of one primary and weighted secondaries.
///
/// The router is meant for one unit of work at a time (one request, one
/// job). Connections can be shared between routers; routing state cannot.
///
/// Routing rules:
/// 1. Writes and transactions always use the primary
/// 2. Reads use a weighted secondary unless the policy pins them to the
///    primary (safe mode after a write, `force_primary`, an open
///    transaction, or no secondaries)
pub struct ConnectionRouter {
    policy: RoutingPolicy,
    primary: Option<SharedConnection>,
    secondaries: WeightedPool<SharedConnection>,
    transaction: TransactionState,
    has_used_primary: bool,
}

impl ConnectionRouter {
    /// Create a router with no connections.
    ///
    /// With `safe_mode` on, every read after the first use of the primary
    /// also goes to the primary, so callers always see their own writes.
    pub fn new(safe_mode: bool) -> Self {
        Self {
            policy: RoutingPolicy::new(safe_mode),
            primary: None,
            secondaries: WeightedPool::new(),
            transaction: TransactionState::Idle,
            has_used_primary: false,
        }
    }

    pub fn safe_mode(&self) -> bool {
        self.policy.safe_mode()
    }

    /// Whether the primary has been handed out. Never resets.
    pub fn has_used_primary(&self) -> bool {
        self.has_used_primary
    }

    pub fn in_transaction(&self) -> bool {
        self.transaction.is_active()
    }

    // ===== Registration =====

    /// Set the primary connection, replacing any previous one.
    pub fn register_primary(&mut self, connection: SharedConnection) {
        if let Some(previous) = &self.primary {
            tracing::warn!(
                previous = previous.id(),
                connection = connection.id(),
                "replacing primary connection"
            );
        }
        tracing::info!(connection = connection.id(), "registered primary connection");
        self.primary = Some(connection);
    }

    /// Add a secondary connection with a positive weight.
    pub fn register_secondary(&mut self, connection: SharedConnection, weight: i64) -> Result<(), RouterError> {
        let id = connection.id().to_string();
        self.secondaries.add(connection, weight)?;
        tracing::info!(
            connection = %id,
            weight,
            total_weight = self.secondaries.total_weight(),
            "registered secondary connection"
        );
        Ok(())
    }

    /// Register a connection under a role. The weight is ignored for the
    /// primary.
    pub fn add_connection(
        &mut self,
        connection: SharedConnection,
        role: Role,
        weight: i64,
    ) -> Result<(), RouterError> {
        match role {
            Role::Primary => {
                self.register_primary(connection);
                Ok(())
            }
            Role::Secondary => self.register_secondary(connection, weight),
        }
    }

    /// The registered primary and secondaries, in registration order.
    pub fn describe_connections(&self) -> ConnectionTopology {
        ConnectionTopology {
            primary: self.primary.clone(),
            secondaries: self.secondaries.all().cloned().collect(),
        }
    }

    // ===== Connection selection =====

    /// Return the primary and mark it as used.
    ///
    /// The flag is set even when no primary is registered, matching the
    /// router's view that a write was attempted.
    pub fn select_write_connection(&mut self) -> Result<SharedConnection, RouterError> {
        self.has_used_primary = true;
        self.primary.clone().ok_or(RouterError::NoPrimaryConnection)
    }

    /// Return the connection that should serve a read.
    ///
    /// # Arguments
    /// * `force_primary` - Bypass the secondaries for this read
    ///
    /// # Returns
    /// The primary or a weighted secondary, depending on [`RoutingPolicy`]
    pub fn select_read_connection(&mut self, force_primary: bool) -> Result<SharedConnection, RouterError> {
        let route = self.policy.route_read(ReadContext {
            has_used_primary: self.has_used_primary,
            in_transaction: self.transaction.is_active(),
            has_secondaries: !self.secondaries.is_empty(),
            force_primary,
        });

        let connection = if route.uses_primary() {
            self.select_write_connection()?
        } else {
            self.secondaries.select()?.clone()
        };

        tracing::debug!(connection = connection.id(), route = ?route, "routed read");
        Ok(connection)
    }

    // ===== Transactions =====

    /// Open a transaction on the primary.
    ///
    /// Returns `Ok(false)` without touching anything when a transaction is
    /// already open.
    pub async fn begin_transaction(&mut self) -> Result<bool, RouterError> {
        if self.transaction.is_active() {
            tracing::debug!("transaction already active, not starting another");
            return Ok(false);
        }

        let connection = self.select_write_connection()?;
        let handle = connection.begin_transaction().await?;
        self.transaction = TransactionState::Active(handle);
        tracing::debug!(connection = connection.id(), "transaction started");
        Ok(true)
    }

    /// Commit the open transaction. Returns `Ok(false)` when none is open.
    ///
    /// A failed commit leaves the transaction open so it can be rolled back.
    pub async fn commit_transaction(&mut self) -> Result<bool, RouterError> {
        let mut handle = match std::mem::replace(&mut self.transaction, TransactionState::Idle) {
            TransactionState::Idle => return Ok(false),
            TransactionState::Active(handle) => handle,
        };

        if let Err(e) = handle.commit().await {
            self.transaction = TransactionState::Active(handle);
            return Err(e.into());
        }

        tracing::debug!("transaction committed");
        Ok(true)
    }

    /// Roll back the open transaction. Returns `Ok(false)` when none is open.
    ///
    /// The router is idle afterwards even if the rollback itself failed.
    pub async fn rollback_transaction(&mut self) -> Result<bool, RouterError> {
        let mut handle = match std::mem::replace(&mut self.transaction, TransactionState::Idle) {
            TransactionState::Idle => return Ok(false),
            TransactionState::Active(handle) => handle,
        };

        handle.rollback().await?;
        tracing::debug!("transaction rolled back");
        Ok(true)
    }

    /// Run `body` inside a transaction.
    ///
    /// Commits when `body` succeeds and returns its value. When `body` (or
    /// the commit) fails, rolls back and returns that original error; a
    /// failing rollback is logged and otherwise ignored.
    ///
    /// ```ignore
    /// let id = router
    ///     .run_in_transaction(|r| {
    ///         Box::pin(async move {
    ///             r.execute("INSERT INTO fruits (name) VALUES (:name)", Some(params([("name", "kiwi")]))).await?;
    ///             r.fetch_scalar("SELECT last_insert_rowid()", None, false).await
    ///         })
    ///     })
    ///     .await?;
    /// ```
    pub async fn run_in_transaction<F, T, E>(&mut self, body: F) -> Result<T, E>
    where
        F: for<'r> FnOnce(&'r mut ConnectionRouter) -> BoxFuture<'r, Result<T, E>>,
        E: From<RouterError>,
    {
        let outcome = match self.begin_transaction().await {
            Ok(_) => match body(self).await {
                Ok(value) => self.commit_transaction().await.map(|_| value).map_err(E::from),
                Err(e) => Err(e),
            },
            Err(e) => Err(E::from(e)),
        };

        if outcome.is_err() {
            if let Err(rollback_err) = self.rollback_transaction().await {
                tracing::warn!(error = %rollback_err, "rollback failed after transaction error");
            }
        }

        outcome
    }

    // ===== Statements =====

    /// Execute a write statement on the primary.
    pub async fn execute(&mut self, query: &str, params: Option<Params>) -> Result<(), RouterError> {
        let named = NamedQuery::new(query, params.unwrap_or_default())?;
        let connection = self.select_write_connection()?;
        connection
            .execute(named.positional_query(), single_values(&named))
            .await?;
        Ok(())
    }

    /// Execute a write statement once per parameter map, on the primary.
    ///
    /// A missing batch is an error, not an empty no-op.
    pub async fn execute_many(&mut self, query: &str, params: Option<Vec<Params>>) -> Result<(), RouterError> {
        let batch = params.ok_or(RouterError::MissingBatchParameters)?;
        let named = NamedQuery::new(query, batch)?;
        let connection = self.select_write_connection()?;
        connection
            .execute_batch(
                named.positional_query(),
                named.positional_params().as_batch().unwrap_or(&[]),
            )
            .await?;
        Ok(())
    }

    pub async fn fetch_all(
        &mut self,
        query: &str,
        params: Option<Params>,
        force_primary: bool,
    ) -> Result<Vec<Row>, RouterError> {
        let (named, connection) = self.prepare_read(query, params, force_primary)?;
        Ok(connection
            .fetch_all(named.positional_query(), single_values(&named))
            .await?)
    }

    /// First matching row, or `None`.
    pub async fn fetch_one(
        &mut self,
        query: &str,
        params: Option<Params>,
        force_primary: bool,
    ) -> Result<Option<Row>, RouterError> {
        let (named, connection) = self.prepare_read(query, params, force_primary)?;
        Ok(connection
            .fetch_one(named.positional_query(), single_values(&named))
            .await?)
    }

    /// First column of the first matching row, or `None`.
    pub async fn fetch_scalar(
        &mut self,
        query: &str,
        params: Option<Params>,
        force_primary: bool,
    ) -> Result<Option<Value>, RouterError> {
        let (named, connection) = self.prepare_read(query, params, force_primary)?;
        Ok(connection
            .fetch_scalar(named.positional_query(), single_values(&named))
            .await?)
    }

    /// The value at `index` from every row.
    pub async fn fetch_column(
        &mut self,
        query: &str,
        params: Option<Params>,
        index: usize,
        force_primary: bool,
    ) -> Result<Vec<Value>, RouterError> {
        let rows = self.fetch_all(query, params, force_primary).await?;
        rows.into_iter()
            .map(|row| {
                let width = row.len();
                row.into_values()
                    .into_iter()
                    .nth(index)
                    .ok_or(RouterError::ColumnIndexOutOfRange { index, width })
            })
            .collect()
    }

    /// Map the first column of each row to the second. Later rows win on
    /// duplicate keys.
    pub async fn fetch_key_value_pairs(
        &mut self,
        query: &str,
        params: Option<Params>,
        force_primary: bool,
    ) -> Result<HashMap<Value, Value>, RouterError> {
        let rows = self.fetch_all(query, params, force_primary).await?;
        let mut pairs = HashMap::with_capacity(rows.len());
        for row in rows {
            let width = row.len();
            let mut values = row.into_values().into_iter();
            match (values.next(), values.next()) {
                (Some(key), Some(value)) => {
                    pairs.insert(key, value);
                }
                _ => return Err(RouterError::ColumnIndexOutOfRange { index: 1, width }),
            }
        }
        Ok(pairs)
    }

    /// Translate first so bad input never counts as a use of the primary.
    fn prepare_read(
        &mut self,
        query: &str,
        params: Option<Params>,
        force_primary: bool,
    ) -> Result<(NamedQuery, SharedConnection), RouterError> {
        let named = NamedQuery::new(query, params.unwrap_or_default())?;
        let connection = self.select_read_connection(force_primary)?;
        Ok((named, connection))
    }
}

impl Default for ConnectionRouter {
    fn default() -> Self {
        Self::new(true)
    }
}

fn single_values(named: &NamedQuery) -> &[Value] {
    named.positional_params().as_single().unwrap_or(&[])
}
