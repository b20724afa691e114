//! Ban predicates consulted before talking to advertised peers.

use std::collections::HashSet;
use std::fmt::Debug;
use std::net::IpAddr;

use crate::common::NodeId;

/// Reputation oracle deciding which peers this node refuses to contact.
///
/// Consulted for every node advertised in a NEIGHBORS response, so
/// implementations need to be fast and must not block.
pub trait PeerReputation: Debug + Send + Sync {
    /// Returns `true` if nodes at this ip should be ignored.
    fn is_address_banned(&self, address: &IpAddr) -> bool;

    /// Returns `true` if this node id should be ignored.
    fn is_node_id_banned(&self, node_id: &NodeId) -> bool;
}

#[derive(Debug, Default, Clone, Copy)]
/// Default [PeerReputation] that bans no one.
pub struct NoBans;

impl PeerReputation for NoBans {
    fn is_address_banned(&self, _address: &IpAddr) -> bool {
        false
    }

    fn is_node_id_banned(&self, _node_id: &NodeId) -> bool {
        false
    }
}

#[derive(Debug, Default, Clone)]
/// A static set of banned addresses and node ids.
pub struct BanList {
    addresses: HashSet<IpAddr>,
    node_ids: HashSet<NodeId>,
}

impl BanList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ban_address(mut self, address: IpAddr) -> Self {
        self.addresses.insert(address);
        self
    }

    pub fn ban_node_id(mut self, node_id: NodeId) -> Self {
        self.node_ids.insert(node_id);
        self
    }
}

impl PeerReputation for BanList {
    fn is_address_banned(&self, address: &IpAddr) -> bool {
        self.addresses.contains(address)
    }

    fn is_node_id_banned(&self, node_id: &NodeId) -> bool {
        self.node_ids.contains(node_id)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn ban_list() {
        let id = NodeId::random();
        let ip: IpAddr = "10.0.0.1".parse().unwrap();

        let bans = BanList::new().ban_address(ip).ban_node_id(id);

        assert!(bans.is_address_banned(&ip));
        assert!(!bans.is_address_banned(&"10.0.0.2".parse().unwrap()));
        assert!(bans.is_node_id_banned(&id));
        assert!(!bans.is_node_id_banned(&NodeId::random()));

        assert!(!NoBans.is_address_banned(&ip));
        assert!(!NoBans.is_node_id_banned(&id));
    }
}
