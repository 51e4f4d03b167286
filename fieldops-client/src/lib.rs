//! FieldOps client library exports.
//!
//! The [`Backend`] trait is the only boundary a collection cache talks to.
//! [`RestBackend`] speaks to the hosted database over PostgREST-style HTTP
//! plus a Phoenix-channel realtime socket; [`MemoryBackend`] keeps the same
//! contract in-process.

pub mod backend;
pub mod config;
pub mod error;
pub mod memory;
pub mod realtime;
pub mod rest;

pub use backend::{Backend, Subscription};
pub use config::{ClientConfig, ConfigError, ReconnectConfig};
pub use error::{BackendError, BackendResult};
pub use memory::{MemoryBackend, Operation};
pub use realtime::RealtimeClient;
pub use rest::RestBackend;
