use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::{FailoverConfig, FailoverMode};
use crate::error::{Error, Result, Sentinel};
use crate::host::{HostInfo, HostRole};
use crate::mysql_client::{MysqlClient, QueryOutcome};
use crate::proxy::{CustomErrorSlot, ProxyLink};
use crate::reader_failover::ReaderFailoverEngine;
use crate::result::FailoverResult;
use crate::topology::Topology;
use crate::topology_service::TopologyService;
use crate::writer_failover::WriterFailoverEngine;

/// The interceptor link (spec §4.8, C8): the only link in this crate's chain that actually looks
/// at what comes back from the link beneath it. On a network-class failure it runs the
/// appropriate engine, splices in the recovered handle, and arms a sentinel SQLSTATE so the
/// caller's next diagnostic poll sees what happened.
///
/// Grounded on the original's `CONNECTION_PROXY` subclasses that override `error()` and the
/// handful of methods that can observe a dead socket — everything else is pure forwarding,
/// mirrored here through [`TerminalLink`](super::TerminalLink) sitting beneath this link.
pub struct FailoverProxyLink {
    next: Box<dyn ProxyLink>,
    topology_service: Arc<dyn TopologyService>,
    reader_engine: Arc<ReaderFailoverEngine>,
    writer_engine: Arc<WriterFailoverEngine>,
    config: FailoverConfig,
    current_host: Mutex<HostInfo>,
    current_topology: Mutex<Topology>,
    errors: CustomErrorSlot,
}

impl FailoverProxyLink {
    pub fn new(
        next: Box<dyn ProxyLink>,
        current_host: HostInfo,
        current_topology: Topology,
        topology_service: Arc<dyn TopologyService>,
        reader_engine: Arc<ReaderFailoverEngine>,
        writer_engine: Arc<WriterFailoverEngine>,
        config: FailoverConfig,
    ) -> Self {
        FailoverProxyLink {
            next,
            topology_service,
            reader_engine,
            writer_engine,
            config,
            current_host: Mutex::new(current_host),
            current_topology: Mutex::new(current_topology),
            errors: CustomErrorSlot::new(),
        }
    }

    fn choose_and_run_failover(&self, current_host: &HostInfo, topology: &Topology) -> FailoverResult {
        match self.config.failover_mode {
            FailoverMode::StrictWriter => self.writer_engine.failover(topology),
            FailoverMode::StrictReader => self.reader_engine.failover(topology),
            FailoverMode::ReaderOrWriter => {
                if current_host.role == HostRole::Writer {
                    self.writer_engine.failover(topology)
                } else {
                    self.reader_engine.failover(topology)
                }
            }
        }
    }

    /// Runs the appropriate engine in response to a network-class error, swaps the recovered
    /// handle into the chain, and returns the sentinel error that should be surfaced for this
    /// call (spec §4.8 / §7).
    fn handle_network_failure(&mut self, mid_transaction: bool) -> Error {
        if !self.config.enable_cluster_failover {
            return Error::NetworkFailure { mid_transaction };
        }

        let topology = self.current_topology.lock().clone();
        let current_host = self.current_host.lock().clone();
        let result = self.choose_and_run_failover(&current_host, &topology);

        if !result.connected {
            self.errors
                .arm(Sentinel::RecoveryFailed, "failover did not find a reachable host");
            tracing::warn!(host = %current_host, "cluster failover exhausted without reconnecting");
            return Error::Sentinel(Sentinel::RecoveryFailed);
        }

        let new_conn = result
            .new_connection
            .expect("a connected FailoverResult always carries a connection");
        let new_host = result
            .new_host
            .expect("a connected FailoverResult always carries a host");

        // The old handle's connection is already gone; drop it and splice in the new one.
        drop(self.next.move_handle());
        self.next.set_connection(new_conn);
        *self.current_host.lock() = new_host.clone();
        if let Some(new_topology) = result.new_topology {
            *self.current_topology.lock() = new_topology;
        }

        let sentinel = if mid_transaction {
            Sentinel::TransactionResolutionUnknown
        } else {
            Sentinel::NewServerRecovered
        };
        self.errors
            .arm(sentinel, format!("connection recovered onto {new_host}"));
        tracing::info!(host = %new_host, %sentinel, "cluster failover recovered a connection");
        Error::Sentinel(sentinel)
    }

    fn intercept<T>(&mut self, outcome: Result<T>) -> Result<T> {
        match outcome {
            Err(Error::NetworkFailure { mid_transaction }) => {
                Err(self.handle_network_failure(mid_transaction))
            }
            other => other,
        }
    }
}

impl ProxyLink for FailoverProxyLink {
    fn query(&mut self, sql: &str) -> Result<QueryOutcome> {
        let outcome = self.next.query(sql);
        self.intercept(outcome)
    }

    fn real_query(&mut self, sql: &str) -> Result<QueryOutcome> {
        let outcome = self.next.real_query(sql);
        self.intercept(outcome)
    }

    fn ping(&mut self) -> Result<()> {
        let outcome = self.next.ping();
        self.intercept(outcome)
    }

    fn autocommit(&mut self, enabled: bool) -> Result<()> {
        let outcome = self.next.autocommit(enabled);
        self.intercept(outcome)
    }

    fn change_user(&mut self, user: &str, password: &str, database: &str) -> Result<()> {
        let outcome = self.next.change_user(user, password, database);
        self.intercept(outcome)
    }

    fn select_db(&mut self, database: &str) -> Result<()> {
        let outcome = self.next.select_db(database);
        self.intercept(outcome)
    }

    fn set_character_set(&mut self, charset: &str) -> Result<()> {
        let outcome = self.next.set_character_set(charset);
        self.intercept(outcome)
    }

    fn close(&mut self) -> Result<()> {
        self.next.close()
    }

    fn error(&self) -> Option<String> {
        if let Some((sentinel, message)) = self.errors.take() {
            return Some(format!("{sentinel}: {message}"));
        }
        self.next.error()
    }

    fn error_code(&self) -> u32 {
        self.next.error_code()
    }

    fn sqlstate(&self) -> String {
        if let Some((sentinel, _)) = self.errors.take() {
            return sentinel.code().to_string();
        }
        self.next.sqlstate()
    }

    fn has_open_transaction(&self) -> bool {
        self.next.has_open_transaction()
    }

    /// `new` always wires up `next` at construction, so there is no reachable unlinked state to
    /// transition out of: this always reports already-linked and leaves `self.next` untouched.
    fn set_next(&mut self, _next: Box<dyn ProxyLink>) -> Result<()> {
        Err(Error::AlreadyLinked)
    }

    fn move_handle(&mut self) -> Option<Box<dyn MysqlClient>> {
        self.next.move_handle()
    }

    fn set_connection(&mut self, handle: Box<dyn MysqlClient>) {
        self.next.set_connection(handle)
    }
}
