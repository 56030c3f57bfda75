//! query-router Library
//!
//! Read/write routing in front of a primary database connection and
//! weighted read replicas, with named-to-positional parameter translation.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;

// Re-export commonly used types
pub use adapters::outbound::SqliteConnection;
pub use application::ConnectionRouter;
pub use config::{load_config, Config, ConnectionConfig};
pub use domain::entities::{ConnectionTopology, Row};
pub use domain::errors::{BackendError, RouterError};
pub use domain::ports::{Connection, SharedConnection, Transaction};
pub use domain::services::{NamedQuery, PositionalParams, WeightedPool};
pub use domain::value_objects::{params, ParamSet, Params, Role, Value};
