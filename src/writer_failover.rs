use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::connection_handler::ConnectionHandler;
use crate::host::HostInfo;
use crate::pool::FailoverPool;
use crate::result::FailoverResult;
use crate::sync_primitive::FailoverSync;
use crate::topology::Topology;
use crate::topology_service::TopologyService;
use crate::reader_failover::ReaderFailoverEngine;

/// Races two recovery strategies for a lost writer connection (spec §4.7):
///
/// - **A — reconnect to the original writer.** The old writer endpoint may come back (a restart,
///   not a promotion).
/// - **B — wait for a new writer.** A reader is used to poll the topology until some host reports
///   itself as writer and is no longer the original.
///
/// Whichever strategy finishes first cancels the other via a shared [`FailoverSync`].
pub struct WriterFailoverEngine {
    topology_service: Arc<dyn TopologyService>,
    connection_handler: Arc<dyn ConnectionHandler>,
    reader_engine: Arc<ReaderFailoverEngine>,
    pool: Arc<FailoverPool>,
    /// `FAILOVER_WRITER_RECONNECT_INTERVAL` — backoff between strategy A attempts.
    reconnect_interval: Duration,
    /// `FAILOVER_TOPOLOGY_REFRESH_RATE` — backoff between strategy B topology re-reads.
    topology_refresh_rate: Duration,
    /// `FAILOVER_TIMEOUT` — overall deadline for the race.
    max_failover_timeout: Duration,
}

impl WriterFailoverEngine {
    pub fn new(
        topology_service: Arc<dyn TopologyService>,
        connection_handler: Arc<dyn ConnectionHandler>,
        reader_engine: Arc<ReaderFailoverEngine>,
        pool: Arc<FailoverPool>,
        reconnect_interval: Duration,
        topology_refresh_rate: Duration,
        max_failover_timeout: Duration,
    ) -> Arc<Self> {
        Arc::new(WriterFailoverEngine {
            topology_service,
            connection_handler,
            reader_engine,
            pool,
            reconnect_interval,
            topology_refresh_rate,
            max_failover_timeout,
        })
    }

    /// Builds an engine (and the reader engine it delegates to for strategy B) from a
    /// [`crate::config::FailoverConfig`].
    pub fn from_config(
        topology_service: Arc<dyn TopologyService>,
        connection_handler: Arc<dyn ConnectionHandler>,
        pool: Arc<FailoverPool>,
        config: &crate::config::FailoverConfig,
    ) -> Arc<Self> {
        let reader_engine = ReaderFailoverEngine::from_config(
            Arc::clone(&topology_service),
            Arc::clone(&connection_handler),
            Arc::clone(&pool),
            config,
        );
        Self::new(
            topology_service,
            connection_handler,
            reader_engine,
            pool,
            config.failover_writer_reconnect_interval,
            config.failover_topology_refresh_rate,
            config.failover_timeout,
        )
    }

    /// Top-level entry point (spec §4.7): launches strategies A and B against the pool and
    /// returns whichever commits a result first.
    pub fn failover(self: &Arc<Self>, topology: &Topology) -> FailoverResult {
        self.topology_service.mark_down(topology.get_writer());

        let sync = Arc::new(FailoverSync::new(2));
        self.pool.ensure_idle(2);
        let winner: Arc<Mutex<Option<FailoverResult>>> = Arc::new(Mutex::new(None));

        {
            let engine = Arc::clone(self);
            let original_writer = topology.get_writer().clone();
            let sync = Arc::clone(&sync);
            let winner = Arc::clone(&winner);
            self.pool
                .execute(move || engine.reconnect_to_original_writer(original_writer, sync, winner));
        }
        {
            let engine = Arc::clone(self);
            let topology = topology.clone();
            let sync = Arc::clone(&sync);
            let winner = Arc::clone(&winner);
            self.pool
                .execute(move || engine.wait_for_new_writer(topology, sync, winner));
        }

        sync.wait_and_complete(self.max_failover_timeout);

        winner
            .lock()
            .take()
            .filter(|r| r.connected)
            .unwrap_or_else(FailoverResult::not_connected)
    }

    /// Strategy A: repeatedly reconnects to the host that used to be the writer, confirming via a
    /// fresh topology read that it still holds the role before declaring victory.
    fn reconnect_to_original_writer(
        &self,
        original_writer: HostInfo,
        sync: Arc<FailoverSync>,
        winner: Arc<Mutex<Option<FailoverResult>>>,
    ) {
        while !sync.is_completed() {
            if let Some(mut conn) = self.connection_handler.connect(&original_writer) {
                match self.topology_service.get_topology(conn.as_mut(), true) {
                    Ok(topology)
                        if HostInfo::is_host_same(topology.get_writer(), &original_writer) =>
                    {
                        self.topology_service.mark_up(&original_writer);
                        let mut slot = winner.lock();
                        if sync.is_completed() {
                            drop(slot);
                            drop(conn);
                            return;
                        }
                        *slot = Some(FailoverResult::connected(
                            false,
                            Some(topology),
                            original_writer.clone(),
                            conn,
                        ));
                        drop(slot);
                        sync.mark_as_complete(true);
                        tracing::trace!(host = %original_writer, "strategy A: original writer recovered");
                        return;
                    }
                    Ok(_) => {
                        tracing::trace!(
                            host = %original_writer,
                            "strategy A: reconnected but host is no longer writer"
                        );
                    }
                    Err(_) => {
                        tracing::trace!(host = %original_writer, "strategy A: topology read failed");
                    }
                }
            }

            if sync.is_completed() {
                return;
            }
            thread::sleep(self.reconnect_interval);
        }
    }

    /// Strategy B: uses a reader connection to poll the topology until a host other than the
    /// original writer reports itself as writer, then connects to it directly.
    fn wait_for_new_writer(
        &self,
        topology: Topology,
        sync: Arc<FailoverSync>,
        winner: Arc<Mutex<Option<FailoverResult>>>,
    ) {
        let original_writer = topology.get_writer().clone();

        while !sync.is_completed() {
            let reader_result = self.reader_engine.get_reader_connection(&topology, &sync);
            if !reader_result.connected {
                return;
            }
            let mut reader_conn = reader_result
                .new_connection
                .expect("connected FailoverResult always carries a connection");

            if sync.is_completed() {
                drop(reader_conn);
                return;
            }

            match self.topology_service.get_topology(reader_conn.as_mut(), true) {
                Ok(new_topology) => {
                    let candidate_writer = new_topology.get_writer().clone();
                    if !HostInfo::is_host_same(&candidate_writer, &original_writer) {
                        if let Some(conn) = self.connection_handler.connect(&candidate_writer) {
                            self.topology_service.mark_up(&candidate_writer);
                            let mut slot = winner.lock();
                            if sync.is_completed() {
                                drop(slot);
                                drop(conn);
                                drop(reader_conn);
                                return;
                            }
                            *slot = Some(FailoverResult::connected(
                                true,
                                Some(new_topology),
                                candidate_writer.clone(),
                                conn,
                            ));
                            drop(slot);
                            sync.mark_as_complete(true);
                            tracing::trace!(host = %candidate_writer, "strategy B: new writer found");
                            drop(reader_conn);
                            return;
                        }
                    }
                }
                Err(_) => {
                    tracing::trace!("strategy B: topology read via reader failed");
                }
            }

            drop(reader_conn);
            if sync.is_completed() {
                return;
            }
            thread::sleep(self.topology_refresh_rate);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result as FResult;
    use crate::host::{HostRole};
    use crate::mysql_client::{MysqlClient, QueryOutcome};
    use crate::topology_service::TopologyService;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn writer(name: &str) -> HostInfo {
        HostInfo::new(name, "h", 3306, HostRole::Writer)
    }

    fn reader(name: &str) -> HostInfo {
        HostInfo::new(name, "h", 3306, HostRole::Reader)
    }

    struct FakeClient;
    impl MysqlClient for FakeClient {
        fn query(&mut self, _s: &str) -> FResult<QueryOutcome> {
            Ok(QueryOutcome::default())
        }
        fn ping(&mut self) -> FResult<()> {
            Ok(())
        }
        fn autocommit(&mut self, _e: bool) -> FResult<()> {
            Ok(())
        }
        fn change_user(&mut self, _u: &str, _p: &str, _d: &str) -> FResult<()> {
            Ok(())
        }
        fn select_db(&mut self, _d: &str) -> FResult<()> {
            Ok(())
        }
        fn set_character_set(&mut self, _c: &str) -> FResult<()> {
            Ok(())
        }
        fn close(&mut self) -> FResult<()> {
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

    /// Topology service whose view flips from the old writer to a new one after a few reads,
    /// simulating a promotion that completes partway through the race.
    struct PromotingTopologyService {
        promoted: AtomicBool,
        before: Topology,
        after: Topology,
    }

    impl TopologyService for PromotingTopologyService {
        fn get_topology(&self, _conn: &mut dyn MysqlClient, _force: bool) -> FResult<Topology> {
            if self.promoted.load(Ordering::SeqCst) {
                Ok(self.after.clone())
            } else {
                Ok(self.before.clone())
            }
        }
        fn mark_up(&self, _host: &HostInfo) {}
        fn mark_down(&self, _host: &HostInfo) {}
        fn health(&self, _host: &HostInfo) -> crate::host::HealthStatus {
            crate::host::HealthStatus::Up
        }
    }

    struct UnreachableThenPromotedHandler {
        original_writer_name: String,
        new_writer_name: String,
    }

    impl ConnectionHandler for UnreachableThenPromotedHandler {
        fn connect(&self, host: &HostInfo) -> Option<Box<dyn MysqlClient>> {
            if host.instance_name == self.original_writer_name {
                None
            } else if host.instance_name == self.new_writer_name {
                Some(Box::new(FakeClient))
            } else {
                Some(Box::new(FakeClient))
            }
        }
    }

    #[test]
    fn strategy_b_wins_when_original_writer_never_comes_back() {
        let before = Topology::new(vec![writer("w_old"), reader("r1")]).unwrap();
        let after = Topology::new(vec![writer("w_new"), reader("r1")]).unwrap();

        let topology_service: Arc<dyn TopologyService> = Arc::new(PromotingTopologyService {
            promoted: AtomicBool::new(true),
            before: before.clone(),
            after,
        });
        let connection_handler: Arc<dyn ConnectionHandler> =
            Arc::new(UnreachableThenPromotedHandler {
                original_writer_name: "w_old".into(),
                new_writer_name: "w_new".into(),
            });

        let pool = FailoverPool::new();
        let reader_engine = ReaderFailoverEngine::new(
            Arc::clone(&topology_service),
            Arc::clone(&connection_handler),
            Arc::clone(&pool),
            Duration::from_millis(200),
            Duration::from_secs(3),
            true,
        );
        let writer_engine = WriterFailoverEngine::new(
            topology_service,
            connection_handler,
            reader_engine,
            pool,
            Duration::from_millis(50),
            Duration::from_millis(50),
            Duration::from_secs(3),
        );

        let result = writer_engine.failover(&before);
        assert!(result.connected);
        assert!(result.is_new_host);
        assert_eq!(result.new_host.unwrap().instance_name, "w_new");
    }

    struct AlwaysReachableHandler;
    impl ConnectionHandler for AlwaysReachableHandler {
        fn connect(&self, _host: &HostInfo) -> Option<Box<dyn MysqlClient>> {
            Some(Box::new(FakeClient))
        }
    }

    struct StaticTopologyService {
        topology: Topology,
        mark_down_calls: std::sync::Mutex<Vec<String>>,
    }
    impl StaticTopologyService {
        fn new(topology: Topology) -> Self {
            StaticTopologyService {
                topology,
                mark_down_calls: std::sync::Mutex::new(Vec::new()),
            }
        }
    }
    impl TopologyService for StaticTopologyService {
        fn get_topology(&self, _conn: &mut dyn MysqlClient, _force: bool) -> FResult<Topology> {
            Ok(self.topology.clone())
        }
        fn mark_up(&self, _host: &HostInfo) {}
        fn mark_down(&self, host: &HostInfo) {
            self.mark_down_calls.lock().unwrap().push(host.instance_name.clone());
        }
        fn health(&self, _host: &HostInfo) -> crate::host::HealthStatus {
            crate::host::HealthStatus::Up
        }
    }

    #[test]
    fn strategy_a_wins_when_original_writer_is_reachable_again() {
        let topology = Topology::new(vec![writer("w1"), reader("r1")]).unwrap();
        let topology_service = Arc::new(StaticTopologyService::new(topology.clone()));
        let ts_for_engine: Arc<dyn TopologyService> = topology_service.clone();
        let connection_handler: Arc<dyn ConnectionHandler> = Arc::new(AlwaysReachableHandler);

        let pool = FailoverPool::new();
        let reader_engine = ReaderFailoverEngine::new(
            Arc::clone(&ts_for_engine),
            Arc::clone(&connection_handler),
            Arc::clone(&pool),
            Duration::from_millis(200),
            Duration::from_secs(3),
            true,
        );
        let writer_engine = WriterFailoverEngine::new(
            ts_for_engine,
            connection_handler,
            reader_engine,
            pool,
            Duration::from_millis(50),
            Duration::from_millis(50),
            Duration::from_secs(3),
        );

        let result = writer_engine.failover(&topology);
        assert!(result.connected);
        assert!(!result.is_new_host);
        assert_eq!(result.new_host.unwrap().instance_name, "w1");
        assert_eq!(
            topology_service.mark_down_calls.lock().unwrap().as_slice(),
            ["w1"]
        );
    }

    struct NeverReachableHandler;
    impl ConnectionHandler for NeverReachableHandler {
        fn connect(&self, _host: &HostInfo) -> Option<Box<dyn MysqlClient>> {
            None
        }
    }

    #[test]
    fn times_out_when_nothing_is_reachable() {
        let topology = Topology::new(vec![writer("w1"), reader("r1")]).unwrap();
        let topology_service: Arc<dyn TopologyService> =
            Arc::new(StaticTopologyService::new(topology.clone()));
        let connection_handler: Arc<dyn ConnectionHandler> = Arc::new(NeverReachableHandler);

        let pool = FailoverPool::new();
        let reader_engine = ReaderFailoverEngine::new(
            Arc::clone(&topology_service),
            Arc::clone(&connection_handler),
            Arc::clone(&pool),
            Duration::from_millis(100),
            Duration::from_millis(300),
            true,
        );
        let writer_engine = WriterFailoverEngine::new(
            topology_service,
            connection_handler,
            reader_engine,
            pool,
            Duration::from_millis(50),
            Duration::from_millis(50),
            Duration::from_millis(300),
        );

        let start = Instant::now();
        let result = writer_engine.failover(&topology);
        assert!(!result.connected);
        assert!(start.elapsed() < Duration::from_secs(2));
    }
}
