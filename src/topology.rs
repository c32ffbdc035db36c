use crate::error::{Error, Result};
use crate::host::{HostInfo, HostRole};

/// A cluster membership snapshot: exactly one writer plus zero or more readers.
///
/// Value-typed and freely shareable (`Clone`); a [`crate::topology_service::TopologyService`]
/// hands out a fresh one on every [`crate::topology_service::TopologyService::get_topology`]
/// call.
#[derive(Debug, Clone)]
pub struct Topology {
    hosts: Vec<HostInfo>,
    writer_idx: usize,
}

impl Topology {
    /// Builds a snapshot, enforcing the invariants from spec §3: at least one host, and exactly
    /// one writer.
    pub fn new(hosts: Vec<HostInfo>) -> Result<Self> {
        if hosts.is_empty() {
            return Err(Error::InvalidTopology("topology has no hosts".into()));
        }

        let writer_positions: Vec<usize> = hosts
            .iter()
            .enumerate()
            .filter(|(_, h)| h.role == HostRole::Writer)
            .map(|(i, _)| i)
            .collect();

        match writer_positions.as_slice() {
            [] => Err(Error::InvalidTopology("topology has no writer".into())),
            [idx] => Ok(Topology {
                hosts,
                writer_idx: *idx,
            }),
            _ => Err(Error::InvalidTopology(
                "topology has more than one writer".into(),
            )),
        }
    }

    pub fn total_hosts(&self) -> usize {
        self.hosts.len()
    }

    pub fn get_writer(&self) -> &HostInfo {
        &self.hosts[self.writer_idx]
    }

    pub fn get_readers(&self) -> impl Iterator<Item = &HostInfo> {
        self.hosts
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != self.writer_idx)
            .map(|(_, h)| h)
    }

    pub fn hosts(&self) -> &[HostInfo] {
        &self.hosts
    }
}
