//! Client-side high-availability layer for Aurora-style MySQL-compatible clusters.
//!
//! A [`proxy::FailoverProxyLink`] sits in front of a real connection handle
//! ([`mysql_client::MysqlClient`]) and, on a network-class failure, races a recovery strategy
//! appropriate to the role of the lost host:
//!
//! - [`reader_failover::ReaderFailoverEngine`] — parallel connection attempts across the reader
//!   set, bounded by a deadline.
//! - [`writer_failover::WriterFailoverEngine`] — reconnect-to-original-writer raced against
//!   wait-for-new-writer.
//!
//! Both engines run on a shared, never-shrinking [`pool::FailoverPool`] and coordinate through
//! the cancellable countdown primitive in [`sync_primitive::FailoverSync`].
//!
//! Cluster membership and host health are supplied by caller-provided
//! [`topology_service::TopologyService`] and [`connection_handler::ConnectionHandler`]
//! implementations — this crate never speaks the MySQL wire protocol itself.

pub mod config;
pub mod connection_handler;
pub mod error;
pub mod host;
pub mod mysql_client;
pub mod pool;
pub mod proxy;
pub mod reader_failover;
pub mod result;
pub mod sync_primitive;
pub mod topology;
pub mod topology_service;
pub mod writer_failover;

pub use config::{FailoverConfig, FailoverConfigBuilder, FailoverMode};
pub use connection_handler::ConnectionHandler;
pub use error::{Error, Result, Sentinel};
pub use host::{HealthStatus, HostInfo, HostKey, HostRole};
pub use mysql_client::{MysqlClient, QueryOutcome};
pub use pool::FailoverPool;
pub use proxy::{CustomErrorSlot, FailoverProxyLink, ProxyLink, TerminalLink};
pub use reader_failover::ReaderFailoverEngine;
pub use result::FailoverResult;
pub use sync_primitive::FailoverSync;
pub use topology::Topology;
pub use topology_service::TopologyService;
pub use writer_failover::WriterFailoverEngine;
