use crate::host::HostInfo;
use crate::mysql_client::MysqlClient;
use crate::topology::Topology;

/// Outcome of a reader- or writer-failover attempt (spec §3 `FailoverResult`).
///
/// On `connected == false` every other field is `None` — there is nothing to discard.
pub struct FailoverResult {
    pub connected: bool,
    pub is_new_host: bool,
    pub new_topology: Option<Topology>,
    pub new_host: Option<HostInfo>,
    pub new_connection: Option<Box<dyn MysqlClient>>,
}

impl FailoverResult {
    pub fn not_connected() -> Self {
        FailoverResult {
            connected: false,
            is_new_host: false,
            new_topology: None,
            new_host: None,
            new_connection: None,
        }
    }

    pub fn connected(
        is_new_host: bool,
        new_topology: Option<Topology>,
        new_host: HostInfo,
        new_connection: Box<dyn MysqlClient>,
    ) -> Self {
        FailoverResult {
            connected: true,
            is_new_host,
            new_topology,
            new_host: Some(new_host),
            new_connection: Some(new_connection),
        }
    }
}

impl std::fmt::Debug for FailoverResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FailoverResult")
            .field("connected", &self.connected)
            .field("is_new_host", &self.is_new_host)
            .field("new_host", &self.new_host)
            .finish()
    }
}
