//! Domain Entities - Core business objects
//!
//! Rows returned by the Connection port and the connection topology
//! reported by the router.

use crate::domain::ports::SharedConnection;
use crate::domain::value_objects::Value;
use serde::ser::{Serialize, SerializeMap, Serializer};

/// One result row: column names paired with values, in select order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row {
    columns: Vec<String>,
    values: Vec<Value>,
}

impl Row {
    /// Create a row. Extra names or values beyond the shorter list are dropped.
    pub fn new(columns: Vec<String>, values: Vec<Value>) -> Self {
        let width = columns.len().min(values.len());
        let mut columns = columns;
        let mut values = values;
        columns.truncate(width);
        values.truncate(width);
        Self { columns, values }
    }

    /// Build a row from `(column, value)` pairs.
    pub fn from_pairs<K, V, I>(pairs: I) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        let (columns, values) = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .unzip();
        Self { columns, values }
    }

    /// Value at a positional index.
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Value of the first column with the given name.
    pub fn get_by_name(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|c| c == column)
            .and_then(|i| self.values.get(i))
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (column, value) in self.columns.iter().zip(&self.values) {
            map.serialize_entry(column, value)?;
        }
        map.end()
    }
}

/// Snapshot of the connections registered with a router.
#[derive(Clone, Default)]
pub struct ConnectionTopology {
    /// The primary connection, if one was registered
    pub primary: Option<SharedConnection>,
    /// Secondary connections in registration order
    pub secondaries: Vec<SharedConnection>,
}

impl ConnectionTopology {
    /// Connection ids, primary first (if any), then secondaries.
    pub fn ids(&self) -> Vec<String> {
        self.primary
            .iter()
            .chain(self.secondaries.iter())
            .map(|c| c.id().to_string())
            .collect()
    }
}

impl std::fmt::Debug for ConnectionTopology {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionTopology")
            .field("primary", &self.primary.as_ref().map(|c| c.id().to_string()))
            .field(
                "secondaries",
                &self.secondaries.iter().map(|c| c.id()).collect::<Vec<_>>(),
            )
            .finish()
    }
}
