//! Domain Layer
//!
//! Routing rules, parameter translation and weighted selection. Nothing
//! here performs I/O; sessions are reached through the Connection port.

pub mod entities;
pub mod errors;
pub mod ports;
pub mod services;
pub mod value_objects;

pub use entities::{ConnectionTopology, Row};
pub use errors::{BackendError, RouterError};
pub use value_objects::{params, ParamSet, Params, Role, Value};
