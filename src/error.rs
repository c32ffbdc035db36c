use std::fmt;

/// Sentinel SQLSTATEs surfaced through [`crate::proxy::ProxyLink::error`]/`sqlstate` after a
/// failover attempt. Part of the public contract: callers match on these to decide whether a
/// statement is safely retryable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sentinel {
    /// Communication link failure; recovery succeeded, but against a different server (or the
    /// reader we were bound to was lost).
    NewServerRecovered,
    /// Communication link failure; recovery failed. The chain stays bound to the dead handle so
    /// the caller can disconnect cleanly.
    RecoveryFailed,
    /// Communication failure while a transaction was open: its outcome is unknown.
    TransactionResolutionUnknown,
}

impl Sentinel {
    /// The SQLSTATE code tests and callers depend on.
    pub const fn code(self) -> &'static str {
        match self {
            Sentinel::NewServerRecovered => "08S02",
            Sentinel::RecoveryFailed => "08S01",
            Sentinel::TransactionResolutionUnknown => "08007",
        }
    }
}

impl fmt::Display for Sentinel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// A downstream call reported the physical connection is gone. `mid_transaction` is true iff
    /// the native handle reports an open transaction at the moment of failure (spec §4.8 step 4).
    #[error("network-class failure (mid_transaction={mid_transaction})")]
    NetworkFailure { mid_transaction: bool },

    /// A failover attempt concluded; the synthetic SQLSTATE to surface to the caller.
    #[error("failover sentinel: {0}")]
    Sentinel(Sentinel),

    /// `Topology` was constructed from zero hosts, or with more than one writer.
    #[error("invalid topology: {0}")]
    InvalidTopology(String),

    /// `ProxyLink::set_next` called on a link that is already linked.
    #[error("link is already linked to a successor")]
    AlreadyLinked,

    /// `ProxyLink` operation invoked on a link with no successor and no native handle.
    #[error("chain has no terminal connection")]
    NoConnection,

    /// Construction-time configuration error (spec §7 item 5): a required collaborator or
    /// setting was missing or malformed.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// The underlying `MysqlClient` reported a native driver error unrelated to connectivity.
    #[error("native error: {0}")]
    Native(String),
}

pub type Result<T> = std::result::Result<T, Error>;
