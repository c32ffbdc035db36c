use std::time::Duration;

use crate::error::{Error, Result};

/// Which role(s) a `FailoverProxy` link is willing to fail over to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailoverMode {
    /// Always fail over to the writer, regardless of which role we were bound to.
    StrictWriter,
    /// Fail over to a reader, unless we were bound to the writer (the common case).
    ReaderOrWriter,
    /// Fail over to a reader only; never falls back to the writer.
    StrictReader,
}

impl FailoverMode {
    /// Whether `ReaderFailoverEngine::build_hosts_list` may append writers as a last resort.
    pub fn allows_writer_fallback(self) -> bool {
        !matches!(self, FailoverMode::StrictReader)
    }
}

/// Typed surface for the recognized configuration keys of spec §6.
#[derive(Debug, Clone)]
pub struct FailoverConfig {
    /// `ENABLE_CLUSTER_FAILOVER` — master toggle for the `FailoverProxy` link.
    pub enable_cluster_failover: bool,
    /// `FAILOVER_MODE`.
    pub failover_mode: FailoverMode,
    /// `FAILOVER_TIMEOUT` — deadline for an engine's top-level `failover` call.
    pub failover_timeout: Duration,
    /// `FAILOVER_TOPOLOGY_REFRESH_RATE` — interval between topology re-reads in writer strategy B.
    pub failover_topology_refresh_rate: Duration,
    /// `FAILOVER_WRITER_RECONNECT_INTERVAL` — backoff in writer strategy A.
    pub failover_writer_reconnect_interval: Duration,
    /// `FAILOVER_READER_CONNECT_TIMEOUT` — per-pair deadline in the reader race.
    pub failover_reader_connect_timeout: Duration,
    /// `TOPOLOGY_REFRESH_RATE` — how stale a cached topology may be.
    pub topology_refresh_rate: Duration,
    /// `CONNECT_TIMEOUT` — forwarded to `ConnectionHandler`.
    pub connect_timeout: Duration,
    /// `NETWORK_TIMEOUT` — forwarded to `ConnectionHandler`.
    pub network_timeout: Duration,
    /// `HOST_PATTERN` — template for resolving instance names to endpoints. Only consumed by the
    /// `ConnectionHandler` implementation; carried here so it travels with the rest of the config.
    pub host_pattern: Option<String>,
}

impl Default for FailoverConfig {
    fn default() -> Self {
        FailoverConfig {
            enable_cluster_failover: true,
            failover_mode: FailoverMode::ReaderOrWriter,
            failover_timeout: Duration::from_secs(60),
            failover_topology_refresh_rate: Duration::from_millis(5000),
            failover_writer_reconnect_interval: Duration::from_millis(5000),
            failover_reader_connect_timeout: Duration::from_millis(30_000),
            topology_refresh_rate: Duration::from_millis(30_000),
            connect_timeout: Duration::from_secs(30),
            network_timeout: Duration::from_secs(30),
            host_pattern: None,
        }
    }
}

impl FailoverConfig {
    pub fn builder() -> FailoverConfigBuilder {
        FailoverConfigBuilder::default()
    }
}

/// Builder for [`FailoverConfig`], in the style of `libsql`'s `database::Builder`.
#[derive(Debug, Clone, Default)]
pub struct FailoverConfigBuilder {
    inner: FailoverConfig,
}

macro_rules! duration_setter {
    ($name:ident, $field:ident) => {
        pub fn $name(mut self, value: Duration) -> Self {
            self.inner.$field = value;
            self
        }
    };
}

impl FailoverConfigBuilder {
    pub fn enable_cluster_failover(mut self, enabled: bool) -> Self {
        self.inner.enable_cluster_failover = enabled;
        self
    }

    pub fn failover_mode(mut self, mode: FailoverMode) -> Self {
        self.inner.failover_mode = mode;
        self
    }

    duration_setter!(failover_timeout, failover_timeout);
    duration_setter!(
        failover_topology_refresh_rate,
        failover_topology_refresh_rate
    );
    duration_setter!(
        failover_writer_reconnect_interval,
        failover_writer_reconnect_interval
    );
    duration_setter!(
        failover_reader_connect_timeout,
        failover_reader_connect_timeout
    );
    duration_setter!(topology_refresh_rate, topology_refresh_rate);
    duration_setter!(connect_timeout, connect_timeout);
    duration_setter!(network_timeout, network_timeout);

    pub fn host_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.inner.host_pattern = Some(pattern.into());
        self
    }

    /// Validates and finalizes the configuration (spec §7 item 5: configuration errors are
    /// fatal at construction).
    pub fn build(self) -> Result<FailoverConfig> {
        if self.inner.failover_timeout.is_zero() {
            return Err(Error::Configuration(
                "failover_timeout must be non-zero".into(),
            ));
        }
        if self.inner.failover_reader_connect_timeout.is_zero() {
            return Err(Error::Configuration(
                "failover_reader_connect_timeout must be non-zero".into(),
            ));
        }
        Ok(self.inner)
    }
}
