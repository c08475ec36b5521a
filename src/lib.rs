//! Switchyard: alias-based index lifecycle management for search clusters.

pub mod cluster;
pub mod config;
pub mod error;
pub mod feed;
pub mod lifecycle;
pub mod mapping;
pub mod metrics;
pub mod policy;
pub mod query;
pub mod server;
pub mod startup;
pub mod types;
