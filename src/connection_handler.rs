use crate::host::HostInfo;
use crate::mysql_client::MysqlClient;

/// Opens physical connections to a named host.
///
/// Must be safe to call concurrently from worker threads (spec §4.4): all configuration it needs
/// (timeouts, TLS, credentials) is captured at construction time, so `connect` takes nothing but
/// the target host.
pub trait ConnectionHandler: Send + Sync {
    /// Opens a new physical connection to `host`. Returns `None` on failure — this never panics
    /// or blocks indefinitely; `CONNECT_TIMEOUT`/`NETWORK_TIMEOUT` bound it internally.
    fn connect(&self, host: &HostInfo) -> Option<Box<dyn MysqlClient>>;
}
