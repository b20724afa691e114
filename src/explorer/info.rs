use std::net::SocketAddr;

use crate::common::NodeId;

use super::{ExecState, PeerExplorer};

/// Information and statistics about this discovery node.
#[derive(Debug, Clone)]
pub struct Info {
    id: NodeId,
    local_addr: SocketAddr,
    state: ExecState,
    established_connections: usize,
    distance_table_size: usize,
    pending_pings: usize,
    pending_find_nodes: usize,
    challenges: usize,
    boot_retries: u32,
}

impl Info {
    /// This Node's [NodeId]
    pub fn id(&self) -> &NodeId {
        &self.id
    }
    /// Local UDP socket address that this node is listening on.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
    pub fn state(&self) -> ExecState {
        self.state
    }
    /// Number of peers currently considered alive.
    pub fn established_connections(&self) -> usize {
        self.established_connections
    }
    pub fn distance_table_size(&self) -> usize {
        self.distance_table_size
    }
    /// Pings waiting for a pong.
    pub fn pending_pings(&self) -> usize {
        self.pending_pings
    }
    /// Find node requests waiting for neighbors.
    pub fn pending_find_nodes(&self) -> usize {
        self.pending_find_nodes
    }
    /// Unresolved challenges over full buckets.
    pub fn challenges(&self) -> usize {
        self.challenges
    }
    /// Number of times the boot nodes were reloaded after getting disconnected.
    pub fn boot_retries(&self) -> u32 {
        self.boot_retries
    }
}

impl From<&PeerExplorer> for Info {
    fn from(explorer: &PeerExplorer) -> Self {
        Self {
            id: explorer.local_node.id,
            local_addr: explorer.local_node.address,
            state: explorer.state,
            established_connections: explorer.established_connections.len(),
            distance_table_size: explorer.distance_table.size(),
            pending_pings: explorer.pending_ping_requests.len(),
            pending_find_nodes: explorer.pending_find_node_requests.len(),
            challenges: explorer.challenges.count(),
            boot_retries: explorer.boot_retries,
        }
    }
}
