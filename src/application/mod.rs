//! Application Layer
//!
//! Use cases built on the domain services and ports.

mod connection_router;

pub use connection_router::ConnectionRouter;
