use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use rand::seq::SliceRandom;

use crate::connection_handler::ConnectionHandler;
use crate::host::{HealthStatus, HostInfo};
use crate::pool::FailoverPool;
use crate::result::FailoverResult;
use crate::sync_primitive::FailoverSync;
use crate::topology::Topology;
use crate::topology_service::TopologyService;

/// Backoff between exhausted passes over the hosts list (spec §4.6 `READER_CONNECT_INTERVAL_SEC`).
const READER_CONNECT_INTERVAL: Duration = Duration::from_secs(1);

/// Parallel reader selection with a bounded deadline (spec §4.6).
pub struct ReaderFailoverEngine {
    topology_service: Arc<dyn TopologyService>,
    connection_handler: Arc<dyn ConnectionHandler>,
    pool: Arc<FailoverPool>,
    /// Per-pair deadline in the reader race (`FAILOVER_READER_CONNECT_TIMEOUT`).
    reader_connect_timeout: Duration,
    /// Overall deadline for the top-level `failover` call (`FAILOVER_TIMEOUT`).
    max_failover_timeout: Duration,
    /// Whether `failover`'s internally-built host list may fall back to writers.
    strict_reader_failover: bool,
}

impl ReaderFailoverEngine {
    pub fn new(
        topology_service: Arc<dyn TopologyService>,
        connection_handler: Arc<dyn ConnectionHandler>,
        pool: Arc<FailoverPool>,
        reader_connect_timeout: Duration,
        max_failover_timeout: Duration,
        strict_reader_failover: bool,
    ) -> Arc<Self> {
        Arc::new(ReaderFailoverEngine {
            topology_service,
            connection_handler,
            pool,
            reader_connect_timeout,
            max_failover_timeout,
            strict_reader_failover,
        })
    }

    /// Builds an engine from a [`crate::config::FailoverConfig`], the way a `FailoverProxyLink`
    /// assembled at connection-open time would.
    pub fn from_config(
        topology_service: Arc<dyn TopologyService>,
        connection_handler: Arc<dyn ConnectionHandler>,
        pool: Arc<FailoverPool>,
        config: &crate::config::FailoverConfig,
    ) -> Arc<Self> {
        Self::new(
            topology_service,
            connection_handler,
            pool,
            config.failover_reader_connect_timeout,
            config.failover_timeout,
            !config.failover_mode.allows_writer_fallback(),
        )
    }

    /// Builds the race order: up readers, then down readers (each independently shuffled), then
    /// — only when `include_writers` — the writer, last.
    pub fn build_hosts_list(&self, topology: &Topology, include_writers: bool) -> Vec<HostInfo> {
        let mut up = Vec::new();
        let mut down = Vec::new();

        for reader in topology.get_readers() {
            match self.topology_service.health(reader) {
                HealthStatus::Down => down.push(reader.clone()),
                HealthStatus::Up | HealthStatus::Unknown => up.push(reader.clone()),
            }
        }

        let mut rng = rand::thread_rng();
        up.shuffle(&mut rng);
        down.shuffle(&mut rng);

        let mut hosts = Vec::with_capacity(up.len() + down.len() + 1);
        hosts.append(&mut up);
        hosts.append(&mut down);

        if include_writers {
            hosts.push(topology.get_writer().clone());
        }

        hosts
    }

    /// Races pairs of hosts from `hosts` with a per-pair deadline, returning the first connected
    /// candidate. Returns a not-connected result once the list is exhausted; the caller decides
    /// whether to rebuild the list and retry (spec §4.6).
    pub fn get_connection_from_hosts(
        &self,
        hosts: &[HostInfo],
        global_sync: &Arc<FailoverSync>,
    ) -> FailoverResult {
        let total = hosts.len();
        let mut i = 0;

        while !global_sync.is_completed() && i < total {
            let odd_hosts_number = i + 1 == total;
            let local_sync = Arc::new(FailoverSync::new(1));
            if !odd_hosts_number {
                local_sync.increment_task();
            }

            self.pool.ensure_idle(if odd_hosts_number { 1 } else { 2 });

            let winner: Arc<Mutex<Option<FailoverResult>>> = Arc::new(Mutex::new(None));

            self.spawn_connect_attempt(hosts[i].clone(), Arc::clone(&local_sync), Arc::clone(&winner));
            if !odd_hosts_number {
                self.spawn_connect_attempt(
                    hosts[i + 1].clone(),
                    Arc::clone(&local_sync),
                    Arc::clone(&winner),
                );
            }

            local_sync.wait_and_complete(self.reader_connect_timeout);

            if let Some(result) = winner.lock().take() {
                if result.connected {
                    return result;
                }
            }

            thread::sleep(READER_CONNECT_INTERVAL);
            i += 2;
        }

        FailoverResult::not_connected()
    }

    fn spawn_connect_attempt(
        &self,
        host: HostInfo,
        sync: Arc<FailoverSync>,
        winner: Arc<Mutex<Option<FailoverResult>>>,
    ) {
        let connection_handler = Arc::clone(&self.connection_handler);
        let topology_service = Arc::clone(&self.topology_service);

        self.pool.execute(move || {
            if sync.is_completed() {
                return;
            }

            tracing::trace!(host = %host, "attempting reader connection");

            match connection_handler.connect(&host) {
                Some(conn) => {
                    topology_service.mark_up(&host);
                    let mut slot = winner.lock();
                    if sync.is_completed() {
                        drop(slot);
                        drop(conn);
                        return;
                    }
                    *slot = Some(FailoverResult::connected(false, None, host.clone(), conn));
                    drop(slot);
                    sync.mark_as_complete(true);
                    tracing::trace!(host = %host, "connected to reader");
                }
                None => {
                    topology_service.mark_down(&host);
                    tracing::trace!(host = %host, "failed to connect to reader");
                    sync.mark_as_complete(false);
                }
            }
        });
    }

    /// Single-reader mode: connects to any reader, externally cancelled through `sync`. Used by
    /// `WriterFailoverEngine`'s wait-for-new-writer strategy to obtain a connection it can use to
    /// read a fresh topology.
    pub fn get_reader_connection(
        &self,
        topology: &Topology,
        sync: &Arc<FailoverSync>,
    ) -> FailoverResult {
        let hosts = self.build_hosts_list(topology, false);
        while !sync.is_completed() {
            let result = self.get_connection_from_hosts(&hosts, sync);
            if result.connected {
                return result;
            }
        }
        FailoverResult::not_connected()
    }

    /// Top-level entry point (spec §4.6): bounded by `max_failover_timeout`, retries
    /// indefinitely against freshly-rebuilt host lists until cancelled or connected.
    pub fn failover(self: &Arc<Self>, topology: &Topology) -> FailoverResult {
        let start = Instant::now();
        let global_sync = Arc::new(FailoverSync::new(1));
        self.pool.ensure_idle(1);

        let (tx, rx) = crossbeam_channel::bounded(1);
        let engine = Arc::clone(self);
        let topology = topology.clone();
        let strict = self.strict_reader_failover;
        let worker_sync = Arc::clone(&global_sync);

        self.pool.execute(move || {
            while !worker_sync.is_completed() {
                let hosts = engine.build_hosts_list(&topology, !strict);
                let result = engine.get_connection_from_hosts(&hosts, &worker_sync);
                if result.connected {
                    worker_sync.mark_as_complete(true);
                    let _ = tx.send(result);
                    return;
                }
                thread::sleep(READER_CONNECT_INTERVAL);
            }
        });

        global_sync.wait_and_complete(self.max_failover_timeout);

        let remaining = self.max_failover_timeout.saturating_sub(start.elapsed());
        rx.recv_timeout(remaining).unwrap_or_else(|_| FailoverResult::not_connected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mysql_client::{MysqlClient, QueryOutcome};
    use crate::host::HostRole;
    use parking_lot::Mutex as PMutex;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeClient;
    impl MysqlClient for FakeClient {
        fn query(&mut self, _sql: &str) -> crate::error::Result<QueryOutcome> {
            Ok(QueryOutcome::default())
        }
        fn ping(&mut self) -> crate::error::Result<()> {
            Ok(())
        }
        fn autocommit(&mut self, _enabled: bool) -> crate::error::Result<()> {
            Ok(())
        }
        fn change_user(&mut self, _u: &str, _p: &str, _d: &str) -> crate::error::Result<()> {
            Ok(())
        }
        fn select_db(&mut self, _d: &str) -> crate::error::Result<()> {
            Ok(())
        }
        fn set_character_set(&mut self, _c: &str) -> crate::error::Result<()> {
            Ok(())
        }
        fn close(&mut self) -> crate::error::Result<()> {
            Ok(())
        }
        fn error(&self) -> Option<String> {
            None
        }
        fn error_code(&self) -> u32 {
            0
        }
        fn sqlstate(&self) -> &str {
            "00000"
        }
        fn has_open_transaction(&self) -> bool {
            false
        }
    }

    struct FakeTopologyService {
        down: PMutex<HashSet<String>>,
        up_calls: AtomicUsize,
    }

    impl FakeTopologyService {
        fn new(initially_down: &[&str]) -> Self {
            FakeTopologyService {
                down: PMutex::new(initially_down.iter().map(|s| s.to_string()).collect()),
                up_calls: AtomicUsize::new(0),
            }
        }
    }

    impl crate::topology_service::TopologyService for FakeTopologyService {
        fn get_topology(
            &self,
            _conn: &mut dyn MysqlClient,
            _force_refresh: bool,
        ) -> crate::error::Result<Topology> {
            unreachable!("not exercised in these unit tests")
        }
        fn mark_up(&self, host: &HostInfo) {
            self.up_calls.fetch_add(1, Ordering::SeqCst);
            self.down.lock().remove(&host.instance_name);
        }
        fn mark_down(&self, host: &HostInfo) {
            self.down.lock().insert(host.instance_name.clone());
        }
        fn health(&self, host: &HostInfo) -> HealthStatus {
            if self.down.lock().contains(&host.instance_name) {
                HealthStatus::Down
            } else {
                HealthStatus::Up
            }
        }
    }

    struct FakeConnectionHandler {
        unreachable: PMutex<HashSet<String>>,
    }

    impl FakeConnectionHandler {
        fn new(unreachable: &[&str]) -> Self {
            FakeConnectionHandler {
                unreachable: PMutex::new(unreachable.iter().map(|s| s.to_string()).collect()),
            }
        }
    }

    impl ConnectionHandler for FakeConnectionHandler {
        fn connect(&self, host: &HostInfo) -> Option<Box<dyn MysqlClient>> {
            if self.unreachable.lock().contains(&host.instance_name) {
                None
            } else {
                Some(Box::new(FakeClient))
            }
        }
    }

    fn reader(name: &str) -> HostInfo {
        HostInfo::new(name, "h", 3306, HostRole::Reader)
    }

    fn writer(name: &str) -> HostInfo {
        HostInfo::new(name, "h", 3306, HostRole::Writer)
    }

    #[test]
    fn build_hosts_list_orders_up_before_down_before_writer() {
        let topology_service: Arc<dyn TopologyService> =
            Arc::new(FakeTopologyService::new(&["r2", "r3"]));
        let connection_handler: Arc<dyn ConnectionHandler> =
            Arc::new(FakeConnectionHandler::new(&[]));
        let pool = FailoverPool::new();
        let engine = ReaderFailoverEngine::new(
            topology_service,
            connection_handler,
            pool,
            Duration::from_millis(200),
            Duration::from_secs(2),
            false,
        );

        let topology = Topology::new(vec![
            writer("w1"),
            reader("r1"),
            reader("r2"),
            reader("r3"),
            reader("r4"),
        ])
        .unwrap();

        let hosts = engine.build_hosts_list(&topology, true);
        let names: Vec<_> = hosts.iter().map(|h| h.instance_name.clone()).collect();

        let up_positions: Vec<_> = ["r1", "r4"]
            .iter()
            .map(|n| names.iter().position(|x| x == n).unwrap())
            .collect();
        let down_positions: Vec<_> = ["r2", "r3"]
            .iter()
            .map(|n| names.iter().position(|x| x == n).unwrap())
            .collect();
        assert!(up_positions.iter().max() < down_positions.iter().min());
        assert_eq!(names.last().unwrap(), "w1");
    }

    #[test]
    fn omits_writer_when_not_included() {
        let topology_service: Arc<dyn TopologyService> = Arc::new(FakeTopologyService::new(&[]));
        let connection_handler: Arc<dyn ConnectionHandler> =
            Arc::new(FakeConnectionHandler::new(&[]));
        let pool = FailoverPool::new();
        let engine = ReaderFailoverEngine::new(
            topology_service,
            connection_handler,
            pool,
            Duration::from_millis(200),
            Duration::from_secs(2),
            true,
        );
        let topology = Topology::new(vec![writer("w1"), reader("r1")]).unwrap();
        let hosts = engine.build_hosts_list(&topology, false);
        assert!(hosts.iter().all(|h| h.role == HostRole::Reader));
    }

    #[test]
    fn connects_to_healthy_reader_and_marks_it_up() {
        let topology_service = Arc::new(FakeTopologyService::new(&[]));
        let ts_for_engine: Arc<dyn TopologyService> = topology_service.clone();
        let connection_handler: Arc<dyn ConnectionHandler> =
            Arc::new(FakeConnectionHandler::new(&["r_down"]));
        let pool = FailoverPool::new();
        let engine = ReaderFailoverEngine::new(
            ts_for_engine,
            connection_handler,
            pool,
            Duration::from_millis(500),
            Duration::from_secs(5),
            false,
        );

        let topology =
            Topology::new(vec![writer("w1"), reader("r_up"), reader("r_down")]).unwrap();

        let result = engine.failover(&topology);
        assert!(result.connected);
        assert_eq!(result.new_host.unwrap().instance_name, "r_up");
        assert!(topology_service.up_calls.load(Ordering::SeqCst) >= 1);
    }

    #[test]
    fn all_down_in_strict_mode_times_out_without_connecting() {
        let topology_service: Arc<dyn TopologyService> =
            Arc::new(FakeTopologyService::new(&["r1", "r2"]));
        let connection_handler: Arc<dyn ConnectionHandler> =
            Arc::new(FakeConnectionHandler::new(&["r1", "r2"]));
        let pool = FailoverPool::new();
        let engine = ReaderFailoverEngine::new(
            topology_service,
            connection_handler,
            pool,
            Duration::from_millis(100),
            Duration::from_millis(400),
            true,
        );
        let topology = Topology::new(vec![writer("w1"), reader("r1"), reader("r2")]).unwrap();

        let start = Instant::now();
        let result = engine.failover(&topology);
        assert!(!result.connected);
        assert!(start.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn losing_candidate_is_discarded_not_returned() {
        // Regression guard: both hosts are reachable, but exactly one result is surfaced.
        static WINNERS: AtomicUsize = AtomicUsize::new(0);
        struct CountingHandler;
        struct CountingClient;
        impl MysqlClient for CountingClient {
            fn query(&mut self, _s: &str) -> crate::error::Result<QueryOutcome> {
                Ok(QueryOutcome::default())
            }
            fn ping(&mut self) -> crate::error::Result<()> {
                Ok(())
            }
            fn autocommit(&mut self, _e: bool) -> crate::error::Result<()> {
                Ok(())
            }
            fn change_user(&mut self, _u: &str, _p: &str, _d: &str) -> crate::error::Result<()> {
                Ok(())
            }
            fn select_db(&mut self, _d: &str) -> crate::error::Result<()> {
                Ok(())
            }
            fn set_character_set(&mut self, _c: &str) -> crate::error::Result<()> {
                Ok(())
            }
            fn close(&mut self) -> crate::error::Result<()> {
                Ok(())
            }
            fn error(&self) -> Option<String> {
                None
            }
            fn error_code(&self) -> u32 {
                0
            }
            fn sqlstate(&self) -> &str {
                "00000"
            }
            fn has_open_transaction(&self) -> bool {
                false
            }
        }
        impl Drop for CountingClient {
            fn drop(&mut self) {}
        }
        impl ConnectionHandler for CountingHandler {
            fn connect(&self, _host: &HostInfo) -> Option<Box<dyn MysqlClient>> {
                WINNERS.fetch_add(1, Ordering::SeqCst);
                Some(Box::new(CountingClient))
            }
        }

        let topology_service: Arc<dyn TopologyService> = Arc::new(FakeTopologyService::new(&[]));
        let connection_handler: Arc<dyn ConnectionHandler> = Arc::new(CountingHandler);
        let pool = FailoverPool::new();
        let engine = ReaderFailoverEngine::new(
            topology_service,
            connection_handler,
            pool,
            Duration::from_millis(500),
            Duration::from_secs(5),
            true,
        );
        let topology = Topology::new(vec![writer("w1"), reader("r1"), reader("r2")]).unwrap();
        let result = engine.failover(&topology);
        assert!(result.connected);
        // Both workers may have connected (both hosts reachable) but exactly one result is
        // surfaced as `connected`.
        assert!(WINNERS.load(Ordering::SeqCst) >= 1);
    }
}
