//! Search-engine cluster access.
//!
//! Provides the `ClusterBackend` trait, the HTTP-backed `ClusterClient`, an
//! in-process `MemoryCluster`, the per-(host, port) `ClusterPool`, the typed
//! `ClusterOperation` descriptor, and the critical/dispensable `ClusterFanout`.

pub mod backend;
pub mod client;
pub mod fanout;
pub mod memory;
pub mod operation;
pub mod pool;

pub use backend::ClusterBackend;
pub use client::ClusterClient;
pub use fanout::{ClusterFanout, ErrorSink, LoggingErrorSink};
pub use memory::MemoryCluster;
pub use operation::{ClusterOperation, OperationOutput};
pub use pool::ClusterPool;
