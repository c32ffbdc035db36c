use std::fmt;
use std::hash::{Hash, Hasher};

/// Role of an instance within a primary-replica cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostRole {
    Writer,
    Reader,
}

/// Health as tracked by a [`crate::topology_service::TopologyService`]. Advisory, not
/// authoritative (spec §9 "Health hints"): a `Down` hint only biases ordering, it is never
/// treated as proof a host is unreachable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HealthStatus {
    Up,
    Down,
    Unknown,
}

/// Membership/role record for one cluster instance, as it appears inside a [`crate::Topology`]
/// snapshot.
///
/// `HostInfo` is immutable and carries no health bit: health lives in the
/// [`crate::topology_service::TopologyService`], keyed by the same identity rule as
/// [`HostInfo::is_host_same`] (see `DESIGN.md`).
#[derive(Debug, Clone)]
pub struct HostInfo {
    pub instance_name: String,
    pub host: String,
    pub port: u16,
    pub role: HostRole,
}

impl HostInfo {
    pub fn new(
        instance_name: impl Into<String>,
        host: impl Into<String>,
        port: u16,
        role: HostRole,
    ) -> Self {
        Self {
            instance_name: instance_name.into(),
            host: host.into(),
            port,
            role,
        }
    }

    pub fn host_port_pair(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Identity used for equality, hashing, and as a `TopologyService` health-map key:
    /// `instance_name` when non-empty, else `(host, port)`.
    fn identity(&self) -> HostIdentity<'_> {
        if self.instance_name.is_empty() {
            HostIdentity::HostPort(&self.host, self.port)
        } else {
            HostIdentity::Instance(&self.instance_name)
        }
    }

    /// Whether two hosts refer to the same physical instance.
    pub fn is_host_same(a: &HostInfo, b: &HostInfo) -> bool {
        a.identity() == b.identity()
    }
}

#[derive(PartialEq, Eq)]
enum HostIdentity<'a> {
    Instance(&'a str),
    HostPort(&'a str, u16),
}

impl PartialEq for HostInfo {
    fn eq(&self, other: &Self) -> bool {
        HostInfo::is_host_same(self, other)
    }
}

impl Eq for HostInfo {}

impl Hash for HostInfo {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self.identity() {
            HostIdentity::Instance(name) => {
                0u8.hash(state);
                name.hash(state);
            }
            HostIdentity::HostPort(host, port) => {
                1u8.hash(state);
                host.hash(state);
                port.hash(state);
            }
        }
    }
}

impl fmt::Display for HostInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.instance_name.is_empty() {
            write!(f, "{}", self.host_port_pair())
        } else {
            write!(f, "{} ({})", self.instance_name, self.host_port_pair())
        }
    }
}

/// A hashable, owned stand-in for a `HostInfo`'s identity, used as a map key by
/// `TopologyService` implementations.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HostKey(String, u16, bool);

impl HostKey {
    pub fn of(host: &HostInfo) -> Self {
        if host.instance_name.is_empty() {
            HostKey(host.host.clone(), host.port, false)
        } else {
            HostKey(host.instance_name.clone(), 0, true)
        }
    }
}
