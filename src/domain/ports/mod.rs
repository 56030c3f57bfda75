mod connection;

pub use connection::{Connection, SharedConnection, Transaction};
