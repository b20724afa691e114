//! Struct and implementation of a peer on the discovery network.
use std::{
    hash::{Hash, Hasher},
    net::SocketAddr,
};

use crate::common::NodeId;

#[derive(Debug, Clone, Copy, Eq)]
/// A peer: its identity and the UDP address it was seen at.
///
/// Two nodes are equal if their ids are equal, regardless of their addresses.
pub struct Node {
    pub id: NodeId,
    pub address: SocketAddr,
}

impl Node {
    /// Creates a new Node from an id and socket address.
    pub fn new(id: NodeId, address: SocketAddr) -> Node {
        Node { id, address }
    }

    /// Creates a node with a random id, useful in tests.
    pub fn random(address: SocketAddr) -> Node {
        Node::new(NodeId::random(), address)
    }

    /// `host:port` form of this node's address, the key of known hosts.
    pub fn address_string(&self) -> String {
        self.address.to_string()
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Hash for Node {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state)
    }
}
