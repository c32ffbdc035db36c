use crate::error::Result;
use crate::host::{HealthStatus, HostInfo};
use crate::mysql_client::MysqlClient;
use crate::topology::Topology;

/// Oracle for cluster membership and per-host health.
///
/// `get_topology` is the only operation that may block on I/O (spec §4.5); `mark_up`/`mark_down`
/// are advisory hints (spec §9) consumed by [`crate::reader_failover::ReaderFailoverEngine`]'s
/// host ordering.
pub trait TopologyService: Send + Sync {
    /// Issues the topology query over `conn`. May return a cached snapshot when
    /// `!force_refresh` and the cache is within `TOPOLOGY_REFRESH_RATE`.
    fn get_topology(&self, conn: &mut dyn MysqlClient, force_refresh: bool) -> Result<Topology>;

    fn mark_up(&self, host: &HostInfo);

    fn mark_down(&self, host: &HostInfo);

    /// Current health hint for `host`. Defaults to `Unknown` for hosts never observed.
    fn health(&self, host: &HostInfo) -> HealthStatus;
}
